use crate::domain::admin_log::AdminLogEntry;
use crate::domain::application::{ApplicationId, ApplicationRecord, email_key};
use crate::domain::ports::{AdminLogStore, ApplicationStore, latest};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for application records, keyed by id bytes.
pub const CF_APPLICATIONS: &str = "applications";
/// Column Family mapping `{email}\0{period}` to an application id.
pub const CF_EMAIL_INDEX: &str = "email_index";
/// Column Family mapping a gateway intent id to an application id.
pub const CF_PAYMENT_INDEX: &str = "payment_index";
/// Column Family for admin audit entries, keyed by timestamp then id.
pub const CF_ADMIN_LOG: &str = "admin_log";

/// A persistent store implementation using RocksDB.
///
/// Records and their secondary indexes live in separate Column Families and
/// are always written together in one `WriteBatch`. Writers serialize on a
/// process-wide lock so the duplicate check in `insert` and the version
/// check in `update` and `delete` cannot interleave with another write.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_APPLICATIONS, CF_EMAIL_INDEX, CF_PAYMENT_INDEX, CF_ADMIN_LOG]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("column family '{name}' not found")))
    }

    fn load(&self, id: &[u8]) -> Result<Option<ApplicationRecord>, StoreError> {
        let cf = self.cf(CF_APPLICATIONS)?;
        self.db
            .get_cf(cf, id)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Records indexed under this email key, across every admission period.
    fn records_for_email(&self, key: &str) -> Result<Vec<ApplicationRecord>, StoreError> {
        let cf = self.cf(CF_EMAIL_INDEX)?;
        let prefix = format!("{key}\0");
        let mut records = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (index_key, id) = item?;
            if !index_key.starts_with(prefix.as_bytes()) {
                break;
            }
            if let Some(record) = self.load(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn email_index_key(record: &ApplicationRecord) -> Vec<u8> {
    format!("{}\0{}", record.email_key(), record.admission_period).into_bytes()
}

fn log_key(entry: &AdminLogEntry) -> Vec<u8> {
    let mut key = entry.created_at.timestamp_millis().to_be_bytes().to_vec();
    key.extend_from_slice(entry.id.as_bytes());
    key
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[async_trait]
impl ApplicationStore for RocksDBStore {
    async fn insert(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let email_cf = self.cf(CF_EMAIL_INDEX)?;
        let index_key = email_index_key(&record);
        if self.db.get_pinned_cf(email_cf, &index_key)?.is_some() {
            return Err(StoreError::Conflict {
                email: record.primary_email().to_string(),
                period: record.admission_period,
            });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_APPLICATIONS)?, record.id.as_bytes(), serde_json::to_vec(&record)?);
        batch.put_cf(email_cf, index_key, record.id.as_bytes());
        if let Some(intent) = &record.payment_transaction_id {
            batch.put_cf(self.cf(CF_PAYMENT_INDEX)?, intent.as_bytes(), record.id.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn update(&self, mut record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        let _guard = self.write_lock.lock().await;

        let email_cf = self.cf(CF_EMAIL_INDEX)?;
        let payment_cf = self.cf(CF_PAYMENT_INDEX)?;
        let previous = self
            .load(record.id.as_bytes())?
            .ok_or(StoreError::NotFound(record.id))?;
        if previous.version != record.version {
            return Err(StoreError::Stale(record.id));
        }
        record.version += 1;

        let mut batch = WriteBatch::default();
        let old_key = email_index_key(&previous);
        if old_key != email_index_key(&record) {
            batch.delete_cf(email_cf, old_key);
        }
        if let Some(old_intent) = &previous.payment_transaction_id
            && record.payment_transaction_id.as_ref() != Some(old_intent)
        {
            batch.delete_cf(payment_cf, old_intent.as_bytes());
        }
        batch.put_cf(self.cf(CF_APPLICATIONS)?, record.id.as_bytes(), serde_json::to_vec(&record)?);
        batch.put_cf(email_cf, email_index_key(&record), record.id.as_bytes());
        if let Some(intent) = &record.payment_transaction_id {
            batch.put_cf(payment_cf, intent.as_bytes(), record.id.as_bytes());
        }
        self.db.write(batch)?;
        Ok(record)
    }

    async fn get(&self, id: ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        self.load(id.as_bytes())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, StoreError> {
        let email = email.trim();
        let records = self.records_for_email(&email_key(email))?;
        Ok(latest(
            records.into_iter().filter(|r| r.primary_email() == email),
        ))
    }

    async fn find_by_email_ignore_case(
        &self,
        email: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(latest(self.records_for_email(&email_key(email))?))
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let cf = self.cf(CF_PAYMENT_INDEX)?;
        let Some(id) = self.db.get_cf(cf, transaction_id.as_bytes())? else {
            return Ok(None);
        };
        // The index may point at a record that has since moved to a new intent.
        Ok(self
            .load(&id)?
            .filter(|r| r.payment_transaction_id.as_deref() == Some(transaction_id)))
    }

    async fn delete(&self, id: ApplicationId, version: u64) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let Some(record) = self.load(id.as_bytes())? else {
            return Ok(false);
        };
        if record.version != version {
            return Err(StoreError::Stale(id));
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_APPLICATIONS)?, id.as_bytes());
        batch.delete_cf(self.cf(CF_EMAIL_INDEX)?, email_index_key(&record));
        if let Some(intent) = &record.payment_transaction_id {
            batch.delete_cf(self.cf(CF_PAYMENT_INDEX)?, intent.as_bytes());
        }
        self.db.write(batch)?;
        Ok(true)
    }

    async fn all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let cf = self.cf(CF_APPLICATIONS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl AdminLogStore for RocksDBStore {
    async fn append(&self, entry: AdminLogEntry) -> Result<(), StoreError> {
        let cf = self.cf(CF_ADMIN_LOG)?;
        self.db.put_cf(cf, log_key(&entry), serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<AdminLogEntry>, StoreError> {
        let cf = self.cf(CF_ADMIN_LOG)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_key, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }
}
