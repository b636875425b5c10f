//! Sled-based document store for summary records.

use crate::summary::Bullets;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

const SUMMARIES_TREE: &str = "summaries";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A record about to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSummaryRecord {
    pub user_id: String,
    pub original_text: String,
    pub summary: Bullets,
    /// ISO-8601 UTC, millisecond precision
    pub timestamp: String,
}

impl NewSummaryRecord {
    /// Create a record stamped with the current time
    pub fn new(user_id: &str, original_text: &str, summary: Bullets) -> Self {
        Self {
            user_id: user_id.to_string(),
            original_text: original_text.to_string(),
            summary,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Just enough of a stored document to tell whose it is.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordOwner {
    user_id: String,
}

/// A stored summary with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: NewSummaryRecord,
}

impl SummaryRecord {
    pub fn user_id(&self) -> &str {
        &self.record.user_id
    }

    pub fn original_text(&self) -> &str {
        &self.record.original_text
    }

    pub fn summary(&self) -> &Bullets {
        &self.record.summary
    }

    pub fn timestamp(&self) -> &str {
        &self.record.timestamp
    }
}

/// External document store holding summary records.
///
/// Implementations are shared between sessions and synchronise themselves;
/// callers never lock around these operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Append one record and return its assigned id
    async fn append(&self, record: NewSummaryRecord) -> Result<String, StorageError>;

    /// All records belonging to `user_id`. Order is up to the
    /// implementation; [`Storage`] yields them in append order.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<SummaryRecord>, StorageError>;
}

/// Sled-backed summary store.
///
/// Records live in the `summaries` tree keyed by a big-endian id from
/// [`sled::Db::generate_id`], so key order matches append order.
pub struct Storage {
    db: sled::Db,
    summaries: sled::Tree,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// Open a throwaway store that is removed when dropped
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let summaries = db.open_tree(SUMMARIES_TREE)?;
        Ok(Self { db, summaries })
    }

    /// Store a record and return its id
    pub fn store(&self, record: &NewSummaryRecord) -> Result<String, StorageError> {
        let id = self.db.generate_id()?;
        let value = serde_json::to_vec(record)?;
        self.summaries.insert(id.to_be_bytes(), value)?;
        self.summaries.flush()?;
        info!(id, user_id = %record.user_id, "summary record stored");
        Ok(id.to_string())
    }

    /// List all records for a user, in append order.
    ///
    /// Only the owner field is read from other users' records, so a document
    /// this crate cannot parse never hides anyone else's history. Unreadable
    /// records are logged and skipped.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<SummaryRecord>, StorageError> {
        let mut results = Vec::new();
        for item in self.summaries.iter() {
            let (key, value) = item?;
            let id = Self::decode_id(&key);

            match serde_json::from_slice::<RecordOwner>(&value) {
                Ok(owner) if owner.user_id == user_id => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(id = %id, error = %e, "skipping record without a readable owner");
                    continue;
                }
            }

            match serde_json::from_slice::<NewSummaryRecord>(&value) {
                Ok(record) => results.push(SummaryRecord { id, record }),
                Err(e) => warn!(id = %id, user_id, error = %e, "skipping unreadable summary record"),
            }
        }
        Ok(results)
    }

    /// Get the number of stored records
    pub fn count(&self) -> usize {
        self.summaries.len()
    }

    fn decode_id(key: &[u8]) -> String {
        match <[u8; 8]>::try_from(key) {
            Ok(bytes) => u64::from_be_bytes(bytes).to_string(),
            Err(_) => String::from_utf8_lossy(key).into_owned(),
        }
    }
}

#[async_trait]
impl SummaryStore for Storage {
    async fn append(&self, record: NewSummaryRecord) -> Result<String, StorageError> {
        self.store(&record)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<SummaryRecord>, StorageError> {
        self.list_for_user(user_id)
    }
}
