use super::admin_log::AdminLogEntry;
use super::application::{ApplicationId, ApplicationRecord};
use super::payment::{GatewayCredentials, PaymentIntent, PaymentIntentRequest};
use crate::error::{GatewayError, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Persistence for application records.
///
/// Implementations must make `insert` atomic with respect to the
/// (lower-cased email, admission period) key: of two concurrent inserts for
/// the same key exactly one succeeds and the other gets
/// [`StoreError::Conflict`].
///
/// `update` and `delete` are compare-and-swap on [`ApplicationRecord::version`]:
/// a write based on an outdated read fails with [`StoreError::Stale`], and a
/// write to a removed record fails with [`StoreError::NotFound`] instead of
/// bringing it back.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(&self, record: ApplicationRecord) -> Result<(), StoreError>;
    /// Replaces the stored record if it is still at `record.version`, and
    /// returns it as written with the next version.
    async fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError>;
    async fn get(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;
    /// Most recent record whose primary email matches exactly.
    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, StoreError>;
    /// Most recent record whose primary email matches ignoring case.
    async fn find_by_email_ignore_case(
        &self,
        email: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    /// Removes the record if it is still at `version`. `Ok(false)` when it
    /// is already gone.
    async fn delete(&self, id: ApplicationId, version: u64) -> Result<bool, StoreError>;
    async fn all(&self) -> Result<Vec<ApplicationRecord>, StoreError>;
}

#[async_trait]
pub trait AdminLogStore: Send + Sync {
    async fn append(&self, entry: AdminLogEntry) -> Result<(), StoreError>;
    /// All entries, newest first.
    async fn all(&self) -> Result<Vec<AdminLogEntry>, StoreError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        credentials: &GatewayCredentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub type ApplicationStoreBox = Box<dyn ApplicationStore>;
pub type AdminLogStoreBox = Box<dyn AdminLogStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
pub type ClockBox = Box<dyn Clock>;

/// Picks the newest record, ties broken by id for a stable answer.
pub fn latest(records: impl IntoIterator<Item = ApplicationRecord>) -> Option<ApplicationRecord> {
    records
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}
