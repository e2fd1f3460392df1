//! Application layer containing the admission workflow orchestration.
//!
//! `AdmissionEngine` owns the ports and exposes one method per workflow
//! operation. Handlers keep no state between calls; everything they need is
//! read from and written back to the application store.

pub mod admin;
pub mod callback;
pub mod payment;
pub mod slot_booking;
pub mod status;
pub mod submission;

use crate::domain::amount::{Amount, DEFAULT_FEE};
use crate::domain::application::ApplicationRecord;
use crate::domain::payment::GatewayCredentials;
use crate::domain::ports::{AdminLogStoreBox, ApplicationStoreBox, Clock, ClockBox, PaymentGatewayBox};
use crate::domain::slot::SlotPolicy;
use crate::error::{AdmissionError, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_ADMISSION_PERIOD: &str = "2025-2026";
pub const DEFAULT_CURRENCY: &str = "EGP";
pub const DEFAULT_ITEM_DESCRIPTION: &str = "Admission Fee";
pub const DEFAULT_PHONE_COUNTRY_CODE: &str = "+20";

/// Read-modify-write rounds a handler attempts before reporting
/// `CONCURRENT_UPDATE`.
const MAX_WRITE_ATTEMPTS: usize = 8;

/// Payment gateway settings. Credentials stay optional here so a missing one
/// is reported per request as `MISSING_ENV` rather than at startup.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub api_key: Option<SecretString>,
    pub api_password: Option<SecretString>,
    pub site_url: Option<String>,
    /// Overrides `{site_url}/payment-callback`.
    pub callback_url: Option<String>,
    pub default_fee: Amount,
    pub currency: String,
    pub item_description: String,
    pub phone_country_code: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_password: None,
            site_url: None,
            callback_url: None,
            default_fee: DEFAULT_FEE,
            currency: DEFAULT_CURRENCY.to_string(),
            item_description: DEFAULT_ITEM_DESCRIPTION.to_string(),
            phone_country_code: DEFAULT_PHONE_COUNTRY_CODE.to_string(),
        }
    }
}

/// Gateway settings with every required value present.
#[derive(Debug, Clone)]
pub struct ResolvedPayment {
    pub credentials: GatewayCredentials,
    pub callback_url: String,
}

impl PaymentSettings {
    /// Names of the required settings that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank_secret(&self.api_key) {
            missing.push("GEIDEA_API_KEY");
        }
        if blank_secret(&self.api_password) {
            missing.push("GEIDEA_API_PASSWORD");
        }
        if self.site_url.as_deref().is_none_or(|s| s.trim().is_empty()) {
            missing.push("SITE_URL");
        }
        missing
    }

    pub fn resolve(&self) -> Result<ResolvedPayment> {
        let missing = self.missing();
        let (Some(api_key), Some(api_password), Some(site_url), true) = (
            &self.api_key,
            &self.api_password,
            &self.site_url,
            missing.is_empty(),
        ) else {
            return Err(AdmissionError::MissingEnv(missing));
        };

        let callback_url = match self.callback_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/payment-callback", site_url.trim().trim_end_matches('/')),
        };

        Ok(ResolvedPayment {
            credentials: GatewayCredentials {
                api_key: api_key.clone(),
                api_password: api_password.clone(),
            },
            callback_url,
        })
    }
}

fn blank_secret(secret: &Option<SecretString>) -> bool {
    secret
        .as_ref()
        .is_none_or(|s| s.expose_secret().trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Admission period applied when a submission does not name one.
    pub admission_period: String,
    pub slot_policy: SlotPolicy,
    pub payment: PaymentSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            admission_period: DEFAULT_ADMISSION_PERIOD.to_string(),
            slot_policy: SlotPolicy::default(),
            payment: PaymentSettings::default(),
        }
    }
}

/// The main entry point for the admission workflow.
///
/// `AdmissionEngine` owns the storage backends, the payment gateway and the
/// clock. Handlers read a record, change it, and write it back through the
/// store's versioned `update`; when another request wrote in between, the
/// handler reads again and re-applies its change.
pub struct AdmissionEngine {
    applications: ApplicationStoreBox,
    admin_log: AdminLogStoreBox,
    gateway: PaymentGatewayBox,
    clock: ClockBox,
    settings: EngineSettings,
}

impl AdmissionEngine {
    pub fn new(
        applications: ApplicationStoreBox,
        admin_log: AdminLogStoreBox,
        gateway: PaymentGatewayBox,
        clock: ClockBox,
        settings: EngineSettings,
    ) -> Self {
        Self {
            applications,
            admin_log,
            gateway,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Exact email match first, then a case-insensitive one.
    async fn locate_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>> {
        if let Some(record) = self.applications.find_by_email(email).await? {
            return Ok(Some(record));
        }
        Ok(self.applications.find_by_email_ignore_case(email).await?)
    }
}

/// `parent@example.com` becomes `par***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(3).collect();
            format!("{visible}***@{domain}")
        }
        None => "***".to_string(),
    }
}
