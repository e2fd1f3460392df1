mod common;

use admissions::application::AdmissionEngine;
use admissions::application::admin::ApplicationUpdate;
use admissions::application::callback::{CallbackOutcome, PaymentNotification};
use admissions::application::payment::InitiatePayment;
use admissions::domain::application::{ApplicationId, ApplicationRecord};
use admissions::domain::ports::ApplicationStore;
use admissions::domain::status::PaymentStatus;
use admissions::error::StoreError;
use admissions::infrastructure::clock::FixedClock;
use admissions::infrastructure::in_memory::{InMemoryAdminLogStore, InMemoryApplicationStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use common::{MockGateway, NEXT_MONDAY, Reply, configured_settings, monday_morning, profile};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Read {
    Email,
    Id,
}

/// Holds the next read of the chosen kind open until `resume` is notified,
/// so another request can write in between.
#[derive(Clone, Default)]
struct PausingStore {
    inner: InMemoryApplicationStore,
    pause_on: Arc<Mutex<Option<Read>>>,
    paused: Arc<Notify>,
    resume: Arc<Notify>,
}

impl PausingStore {
    fn pause_next(&self, read: Read) {
        *self.pause_on.lock().unwrap() = Some(read);
    }

    async fn hold(&self, read: Read) {
        let armed = {
            let mut pause_on = self.pause_on.lock().unwrap();
            if *pause_on == Some(read) {
                *pause_on = None;
                true
            } else {
                false
            }
        };
        if armed {
            self.paused.notify_one();
            self.resume.notified().await;
        }
    }
}

#[async_trait]
impl ApplicationStore for PausingStore {
    async fn insert(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        self.inner.insert(record).await
    }

    async fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        self.inner.update(record).await
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        let found = self.inner.get(id).await?;
        self.hold(Read::Id).await;
        Ok(found)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        let found = self.inner.find_by_email(email).await?;
        self.hold(Read::Email).await;
        Ok(found)
    }

    async fn find_by_email_ignore_case(
        &self,
        email: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let found = self.inner.find_by_email_ignore_case(email).await?;
        self.hold(Read::Email).await;
        Ok(found)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.inner.find_by_transaction_id(transaction_id).await
    }

    async fn delete(&self, id: ApplicationId, version: u64) -> Result<bool, StoreError> {
        self.inner.delete(id, version).await
    }

    async fn all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.inner.all().await
    }
}

fn setup() -> (Arc<AdmissionEngine>, PausingStore) {
    let store = PausingStore::default();
    let engine = AdmissionEngine::new(
        Box::new(store.clone()),
        Box::new(InMemoryAdminLogStore::new()),
        Box::new(MockGateway::new(Reply::intent("PI123", "https://pay/x"))),
        Box::new(FixedClock::new(monday_morning())),
        configured_settings(),
    );
    (Arc::new(engine), store)
}

fn success(intent: &str) -> PaymentNotification {
    PaymentNotification {
        payment_intent_id: Some(intent.into()),
        status: Some("SUCCESS".into()),
        ..Default::default()
    }
}

/// Submitted, booked and with PI123 open.
async fn initiated(engine: &AdmissionEngine) -> ApplicationId {
    let record = engine.submit(profile("a@x.com")).await.unwrap();
    engine
        .book_test_slot("a@x.com", NEXT_MONDAY, "10")
        .await
        .unwrap();
    engine
        .initiate_payment(InitiatePayment {
            email: Some(json!("a@x.com")),
            amount: None,
        })
        .await
        .unwrap();
    record.id
}

#[tokio::test]
async fn test_rebooking_keeps_payment_that_landed_meanwhile() {
    let (engine, store) = setup();
    let id = initiated(&engine).await;

    store.pause_next(Read::Email);
    let rebook = tokio::spawn({
        let engine = engine.clone();
        async move { engine.book_test_slot("a@x.com", "2026-10-20", "11").await }
    });
    store.paused.notified().await;

    let outcome = engine.handle_payment_callback(success("PI123")).await.unwrap();
    assert_eq!(outcome, CallbackOutcome::Applied(PaymentStatus::Paid));
    store.resume.notify_one();

    let rebooked = rebook.await.unwrap().unwrap();
    assert_eq!(rebooked.payment_status, PaymentStatus::Paid);
    assert_eq!(rebooked.test_date, NaiveDate::from_ymd_opt(2026, 10, 20));

    let stored = engine.get_application(id).await.unwrap();
    assert_eq!(stored, rebooked);
}

#[tokio::test]
async fn test_admin_edit_keeps_payment_that_landed_meanwhile() {
    let (engine, store) = setup();
    let id = initiated(&engine).await;

    store.pause_next(Read::Id);
    let edit = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .update_application(
                    id,
                    ApplicationUpdate {
                        admin_notes: Some("Called the father".into()),
                        ..Default::default()
                    },
                    "admin@school.example",
                )
                .await
        }
    });
    store.paused.notified().await;

    engine.handle_payment_callback(success("PI123")).await.unwrap();
    store.resume.notify_one();

    let edited = edit.await.unwrap().unwrap();
    assert_eq!(edited.payment_status, PaymentStatus::Paid);
    assert_eq!(edited.admin_notes.as_deref(), Some("Called the father"));
}

#[tokio::test]
async fn test_withdraw_loses_to_payment_started_meanwhile() {
    let (engine, store) = setup();
    let record = engine.submit(profile("a@x.com")).await.unwrap();

    store.pause_next(Read::Id);
    let withdraw = tokio::spawn({
        let engine = engine.clone();
        async move { engine.withdraw(record.id, "a@x.com").await }
    });
    store.paused.notified().await;

    let session = engine
        .initiate_payment(InitiatePayment {
            email: Some(json!("a@x.com")),
            amount: None,
        })
        .await
        .unwrap();
    store.resume.notify_one();

    let err = withdraw.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    let stored = engine.get_application(record.id).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Initiated);
    assert_eq!(
        stored.payment_transaction_id.as_deref(),
        Some(session.payment_intent_id.as_str())
    );
}

#[tokio::test]
async fn test_late_admin_edit_does_not_restore_withdrawn_record() {
    let (engine, store) = setup();
    let record = engine.submit(profile("a@x.com")).await.unwrap();

    store.pause_next(Read::Id);
    let edit = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .update_application(
                    record.id,
                    ApplicationUpdate {
                        admin_notes: Some("late".into()),
                        ..Default::default()
                    },
                    "admin@school.example",
                )
                .await
        }
    });
    store.paused.notified().await;

    engine.withdraw(record.id, "a@x.com").await.unwrap();
    store.resume.notify_one();

    let err = edit.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "APPLICATION_NOT_FOUND");

    let view = engine.application_status("a@x.com").await.unwrap();
    assert!(view.application.is_none());
    engine.submit(profile("a@x.com")).await.unwrap();
}
