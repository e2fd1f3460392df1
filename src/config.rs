use crate::application::{DEFAULT_ADMISSION_PERIOD, DEFAULT_CURRENCY, EngineSettings, PaymentSettings};
use crate::domain::amount::Amount;
use crate::infrastructure::geidea::DEFAULT_ENDPOINT;
use crate::interfaces::http::auth::{AdminAuth, AdminCredentials, CallbackVerifier};
use clap::Parser;
use rust_decimal::Decimal;
use secrecy::SecretString;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("admission fee must be a positive amount, got {0}")]
    InvalidFee(Decimal),
    #[error("ADMIN_PASSWORD_SHA256 must be 64 hex characters: {0}")]
    InvalidAdminHash(#[from] hex::FromHexError),
    #[error("ADMIN_EMAIL and ADMIN_PASSWORD_SHA256 must be set together")]
    IncompleteAdmin,
    #[error("session TTL must be at least one minute")]
    InvalidSessionTtl,
}

/// Service configuration. Every option can come from a flag or from the
/// environment variable named beside it.
#[derive(Parser, Clone)]
#[command(author, version, about = "School admissions workflow service", long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Admission period applied to submissions that do not name one
    #[arg(long, env = "ADMISSION_PERIOD", default_value = DEFAULT_ADMISSION_PERIOD)]
    pub admission_period: String,

    /// Fee charged when a payment request names no amount
    #[arg(long, env = "ADMISSION_FEE", default_value = "20")]
    pub admission_fee: Decimal,

    #[arg(long, env = "PAYMENT_CURRENCY", default_value = DEFAULT_CURRENCY)]
    pub currency: String,

    /// Geidea direct eInvoice endpoint
    #[arg(long, env = "GEIDEA_API_URL", default_value = DEFAULT_ENDPOINT)]
    pub gateway_url: String,

    #[arg(long, env = "GEIDEA_API_KEY", hide_env_values = true)]
    pub gateway_api_key: Option<String>,

    #[arg(long, env = "GEIDEA_API_PASSWORD", hide_env_values = true)]
    pub gateway_api_password: Option<String>,

    /// Seconds to wait for the payment gateway
    #[arg(long, env = "GEIDEA_TIMEOUT_SECS", default_value_t = 15)]
    pub gateway_timeout_secs: u64,

    /// Public site URL; the default callback URL is built from it
    #[arg(long, env = "SITE_URL")]
    pub site_url: Option<String>,

    #[arg(long, env = "GEIDEA_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// When set, callbacks must carry a matching x-signature header
    #[arg(long, env = "GEIDEA_CALLBACK_SECRET", hide_env_values = true)]
    pub callback_secret: Option<String>,

    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Hex SHA-256 digest of the administrator password
    #[arg(long, env = "ADMIN_PASSWORD_SHA256", hide_env_values = true)]
    pub admin_password_sha256: Option<String>,

    /// Key for admin session tokens; a random one is used when absent
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    #[arg(long, env = "SESSION_TTL_MINUTES", default_value_t = 480)]
    pub session_ttl_minutes: i64,

    /// Print the resolved configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn secret(value: &Option<String>) -> Option<SecretString> {
    present(value).map(|v| SecretString::from(v.to_string()))
}

impl Config {
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let default_fee =
            Amount::new(self.admission_fee).map_err(|_| ConfigError::InvalidFee(self.admission_fee))?;

        Ok(EngineSettings {
            admission_period: self.admission_period.trim().to_string(),
            payment: PaymentSettings {
                api_key: secret(&self.gateway_api_key),
                api_password: secret(&self.gateway_api_password),
                site_url: present(&self.site_url).map(str::to_string),
                callback_url: present(&self.callback_url).map(str::to_string),
                default_fee,
                currency: self.currency.trim().to_string(),
                ..PaymentSettings::default()
            },
            ..EngineSettings::default()
        })
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs.max(1))
    }

    pub fn admin_credentials(&self) -> Result<Option<AdminCredentials>, ConfigError> {
        match (present(&self.admin_email), present(&self.admin_password_sha256)) {
            (Some(email), Some(hash)) => Ok(Some(AdminCredentials::from_hex(email, hash)?)),
            (None, None) => Ok(None),
            _ => Err(ConfigError::IncompleteAdmin),
        }
    }

    pub fn admin_auth(&self) -> Result<AdminAuth, ConfigError> {
        if self.session_ttl_minutes < 1 {
            return Err(ConfigError::InvalidSessionTtl);
        }
        let session_secret = secret(&self.session_secret).unwrap_or_else(|| {
            SecretString::from(format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()))
        });
        Ok(AdminAuth::new(
            self.admin_credentials()?,
            session_secret,
            chrono::Duration::minutes(self.session_ttl_minutes),
        ))
    }

    pub fn callback_verifier(&self) -> Option<CallbackVerifier> {
        secret(&self.callback_secret).map(CallbackVerifier::new)
    }

    /// Which storage backend this build will actually use.
    pub fn storage_backend(&self) -> &'static str {
        match (&self.db_path, cfg!(feature = "storage-rocksdb")) {
            (Some(_), true) => "rocksdb",
            (Some(_), false) => "in-memory (db path ignored: built without storage-rocksdb)",
            (None, _) => "in-memory",
        }
    }

    /// Human-readable configuration with secrets redacted.
    pub fn summary(&self) -> String {
        fn secret_state(value: &Option<String>) -> &'static str {
            if present(value).is_some() { "<redacted>" } else { "<missing>" }
        }
        fn enabled(on: bool) -> &'static str {
            if on { "enabled" } else { "disabled" }
        }

        let missing = match self.engine_settings() {
            Ok(settings) => settings.payment.missing(),
            Err(_) => Vec::new(),
        };
        let callback_url = present(&self.callback_url)
            .map(str::to_string)
            .or_else(|| {
                present(&self.site_url)
                    .map(|site| format!("{}/payment-callback", site.trim_end_matches('/')))
            })
            .unwrap_or_else(|| "<missing>".to_string());

        let mut out = String::new();
        let _ = writeln!(out, "bind: {}", self.bind);
        let _ = writeln!(out, "storage: {}", self.storage_backend());
        if let Some(path) = &self.db_path {
            let _ = writeln!(out, "db_path: {}", path.display());
        }
        let _ = writeln!(out, "admission_period: {}", self.admission_period);
        let _ = writeln!(out, "admission_fee: {} {}", self.admission_fee, self.currency);
        let _ = writeln!(out, "gateway_url: {}", self.gateway_url);
        let _ = writeln!(out, "gateway_timeout: {}s", self.gateway_timeout().as_secs());
        let _ = writeln!(out, "gateway_api_key: {}", secret_state(&self.gateway_api_key));
        let _ = writeln!(out, "gateway_api_password: {}", secret_state(&self.gateway_api_password));
        let _ = writeln!(out, "site_url: {}", present(&self.site_url).unwrap_or("<missing>"));
        let _ = writeln!(out, "callback_url: {callback_url}");
        let _ = writeln!(out, "callback_signature: {}", enabled(present(&self.callback_secret).is_some()));
        let _ = writeln!(out, "admin_login: {}", enabled(present(&self.admin_email).is_some()));
        let _ = writeln!(out, "session_ttl: {}m", self.session_ttl_minutes);
        let _ = writeln!(
            out,
            "missing: {}",
            if missing.is_empty() { "none".to_string() } else { missing.join(", ") }
        );
        out
    }
}
