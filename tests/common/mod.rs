#![allow(dead_code)]

use admissions::application::{AdmissionEngine, EngineSettings, PaymentSettings};
use admissions::domain::payment::{GatewayCredentials, PaymentIntent, PaymentIntentRequest};
use admissions::domain::ports::PaymentGateway;
use admissions::domain::profile::{ApplicantProfile, Guardian};
use admissions::error::GatewayError;
use admissions::infrastructure::clock::FixedClock;
use admissions::infrastructure::in_memory::{InMemoryAdminLogStore, InMemoryApplicationStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Monday 2026-10-12, 08:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap()
}

pub const NEXT_MONDAY: &str = "2026-10-19";
pub const NEXT_FRIDAY: &str = "2026-10-23";
pub const LAST_MONDAY: &str = "2026-10-05";

pub fn profile(email: &str) -> ApplicantProfile {
    ApplicantProfile {
        primary_email: email.to_string(),
        student_first_name: Some("Laila".into()),
        student_last_name: Some("Hassan".into()),
        grade: Some("KG1".into()),
        father: Guardian {
            name: Some("Omar Hassan".into()),
            phone: Some("+20 100 555 1234".into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// What the mock gateway answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Intent { id: String, url: String },
    Status(u16, Value),
    Timeout,
}

impl Reply {
    pub fn intent(id: &str, url: &str) -> Self {
        Self::Intent {
            id: id.to_string(),
            url: url.to_string(),
        }
    }
}

/// Counting gateway double. Queued replies are used first, then the
/// fallback reply for every later call. Clones share all state.
#[derive(Clone)]
pub struct MockGateway {
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<PaymentIntentRequest>>>,
    queued: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Arc<Mutex<Reply>>,
}

impl MockGateway {
    pub fn new(fallback: Reply) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            queued: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(fallback)),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.queued.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PaymentIntentRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_intent(
        &self,
        _credentials: &GatewayCredentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());

        match reply {
            Reply::Intent { id, url } => Ok(PaymentIntent {
                intent_id: id,
                payment_url: url,
            }),
            Reply::Status(status, body) => Err(GatewayError::Status { status, body }),
            Reply::Timeout => Err(GatewayError::Timeout(Duration::from_secs(15))),
        }
    }
}

pub fn configured_settings() -> EngineSettings {
    EngineSettings {
        payment: PaymentSettings {
            api_key: Some(SecretString::from("test-key".to_string())),
            api_password: Some(SecretString::from("test-password".to_string())),
            site_url: Some("https://school.example".into()),
            ..PaymentSettings::default()
        },
        ..EngineSettings::default()
    }
}

/// An engine over in-memory stores with handles kept for inspection.
pub struct Harness {
    pub engine: AdmissionEngine,
    pub applications: InMemoryApplicationStore,
    pub admin_log: InMemoryAdminLogStore,
    pub gateway: MockGateway,
    pub clock: FixedClock,
}

pub fn harness() -> Harness {
    harness_with(configured_settings())
}

pub fn harness_with(settings: EngineSettings) -> Harness {
    let applications = InMemoryApplicationStore::new();
    let admin_log = InMemoryAdminLogStore::new();
    let gateway = MockGateway::new(Reply::intent("PI123", "https://pay/x"));
    let clock = FixedClock::new(monday_morning());

    let engine = AdmissionEngine::new(
        Box::new(applications.clone()),
        Box::new(admin_log.clone()),
        Box::new(gateway.clone()),
        Box::new(clock.clone()),
        settings,
    );

    Harness {
        engine,
        applications,
        admin_log,
        gateway,
        clock,
    }
}
