use crate::domain::admin_log::AdminLogEntry;
use crate::domain::application::{ApplicationId, ApplicationRecord, email_key};
use crate::domain::ports::{AdminLogStore, ApplicationStore, latest};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for application records.
///
/// Uses `Arc<RwLock<HashMap<ApplicationId, ApplicationRecord>>>` so clones
/// share state. The duplicate check and the insert happen under one write
/// guard, which makes `insert` atomic per (email, period). `update` and
/// `delete` compare versions under the same guard.
#[derive(Default, Clone)]
pub struct InMemoryApplicationStore {
    records: Arc<RwLock<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn insert(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let key = record.email_key();
        let taken = records
            .values()
            .any(|r| r.email_key() == key && r.admission_period == record.admission_period);
        if taken {
            return Err(StoreError::Conflict {
                email: record.primary_email().to_string(),
                period: record.admission_period,
            });
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;
        if stored.version != record.version {
            return Err(StoreError::Stale(record.id));
        }
        record.version += 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        let records = self.records.read().await;
        let email = email.trim();
        Ok(latest(
            records
                .values()
                .filter(|r| r.primary_email() == email)
                .cloned(),
        ))
    }

    async fn find_by_email_ignore_case(
        &self,
        email: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let records = self.records.read().await;
        let key = email_key(email);
        Ok(latest(
            records.values().filter(|r| r.email_key() == key).cloned(),
        ))
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(latest(
            records
                .values()
                .filter(|r| r.payment_transaction_id.as_deref() == Some(transaction_id))
                .cloned(),
        ))
    }

    async fn delete(&self, id: ApplicationId, version: u64) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get(&id) {
            None => Ok(false),
            Some(stored) if stored.version != version => Err(StoreError::Stale(id)),
            Some(_) => Ok(records.remove(&id).is_some()),
        }
    }

    async fn all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

/// A thread-safe in-memory admin audit log.
#[derive(Default, Clone)]
pub struct InMemoryAdminLogStore {
    entries: Arc<RwLock<Vec<AdminLogEntry>>>,
}

impl InMemoryAdminLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminLogStore for InMemoryAdminLogStore {
    async fn append(&self, entry: AdminLogEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<AdminLogEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut all = entries.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::ApplicantProfile;
    use chrono::{Duration, TimeZone, Utc};

    fn record(email: &str, period: &str, minutes: i64) -> ApplicationRecord {
        let profile = ApplicantProfile {
            primary_email: email.into(),
            ..Default::default()
        };
        let created = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes);
        ApplicationRecord::new(profile, period.into(), created)
    }

    #[tokio::test]
    async fn test_insert_rejects_same_email_and_period() {
        let store = InMemoryApplicationStore::new();
        store.insert(record("a@x.com", "2025-2026", 0)).await.unwrap();

        let dup = store.insert(record("A@X.com", "2025-2026", 1)).await;
        assert!(matches!(dup, Err(StoreError::Conflict { .. })));

        // A different period is a different key.
        store.insert(record("a@x.com", "2026-2027", 2)).await.unwrap();
        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_inserts_yield_one_record() {
        let store = InMemoryApplicationStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(record("race@x.com", "2025-2026", i)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_email_lookup_exact_vs_ignore_case() {
        let store = InMemoryApplicationStore::new();
        let stored = record("Parent@X.com", "2025-2026", 0);
        store.insert(stored.clone()).await.unwrap();

        assert!(store.find_by_email("parent@x.com").await.unwrap().is_none());
        assert_eq!(
            store.find_by_email("Parent@X.com").await.unwrap().map(|r| r.id),
            Some(stored.id)
        );
        assert_eq!(
            store
                .find_by_email_ignore_case("  PARENT@x.COM ")
                .await
                .unwrap()
                .map(|r| r.id),
            Some(stored.id)
        );
    }

    #[tokio::test]
    async fn test_lookup_returns_most_recent() {
        let store = InMemoryApplicationStore::new();
        let older = record("a@x.com", "2024-2025", 0);
        let newer = record("a@x.com", "2025-2026", 30);
        store.insert(older).await.unwrap();
        store.insert(newer.clone()).await.unwrap();

        let found = store.find_by_email_ignore_case("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, newer.id);
    }

    #[tokio::test]
    async fn test_transaction_lookup_and_delete() {
        let store = InMemoryApplicationStore::new();
        let mut stored = record("a@x.com", "2025-2026", 0);
        store.insert(stored.clone()).await.unwrap();

        stored.payment_transaction_id = Some("PI123".into());
        let stored = store.update(stored).await.unwrap();
        assert_eq!(stored.version, 1);

        let found = store.find_by_transaction_id("PI123").await.unwrap().unwrap();
        assert_eq!(found, stored);
        assert!(store.find_by_transaction_id("pi123").await.unwrap().is_none());

        assert!(store.delete(stored.id, stored.version).await.unwrap());
        assert!(!store.delete(stored.id, stored.version).await.unwrap());
        assert!(store.get(stored.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_from_outdated_read_is_stale() {
        let store = InMemoryApplicationStore::new();
        let stored = record("a@x.com", "2025-2026", 0);
        store.insert(stored.clone()).await.unwrap();

        let mut first = stored.clone();
        first.admin_notes = Some("first".into());
        store.update(first).await.unwrap();

        let mut second = stored.clone();
        second.admin_notes = Some("second".into());
        assert!(matches!(store.update(second).await, Err(StoreError::Stale(_))));
        assert!(matches!(
            store.delete(stored.id, stored.version).await,
            Err(StoreError::Stale(_))
        ));

        let current = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(current.admin_notes.as_deref(), Some("first"));
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_update_does_not_restore_deleted_record() {
        let store = InMemoryApplicationStore::new();
        let stored = record("a@x.com", "2025-2026", 0);
        store.insert(stored.clone()).await.unwrap();
        assert!(store.delete(stored.id, 0).await.unwrap());

        assert!(matches!(store.update(stored.clone()).await, Err(StoreError::NotFound(_))));
        assert!(store.get(stored.id).await.unwrap().is_none());
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_log_newest_first() {
        let store = InMemoryAdminLogStore::new();
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        store
            .append(AdminLogEntry::new("FIRST", serde_json::json!({}), "admin", t0))
            .await
            .unwrap();
        store
            .append(AdminLogEntry::new(
                "SECOND",
                serde_json::json!({}),
                "admin",
                t0 + Duration::minutes(5),
            ))
            .await
            .unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all[0].action, "SECOND");
        assert_eq!(all[1].action, "FIRST");
    }
}
