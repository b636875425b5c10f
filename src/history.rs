//! Read-only view over a user's past summaries.

use crate::storage::{StorageError, SummaryRecord, SummaryStore};
use chrono::DateTime;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::error;

/// Fetches past records, newest first.
#[derive(Clone)]
pub struct HistoryReader {
    store: Arc<dyn SummaryStore>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self { store }
    }

    /// All records for `user_id` ordered by timestamp descending.
    ///
    /// Records sharing a timestamp are ordered by id, newest append first.
    pub async fn fetch(&self, user_id: &str) -> Result<Vec<SummaryRecord>, StorageError> {
        let mut records = self.store.find_by_user(user_id).await?;
        records.sort_by(|a, b| {
            timestamp_order(b.timestamp(), a.timestamp())
                .then_with(|| id_order(&b.id).cmp(&id_order(&a.id)))
        });
        Ok(records)
    }

    /// Like [`fetch`](Self::fetch), but a store failure is logged and
    /// presented as an empty history.
    pub async fn fetch_or_empty(&self, user_id: &str) -> Vec<SummaryRecord> {
        self.fetch(user_id).await.unwrap_or_else(|e| {
            error!(user_id, error = %e, "error fetching history");
            Vec::new()
        })
    }

    /// Refresh `state` from the store.
    pub async fn load(&self, state: &mut HistoryState, user_id: &str) {
        state.loading = true;
        state.error = None;
        match self.fetch(user_id).await {
            Ok(items) => state.items = items,
            Err(e) => {
                error!(user_id, error = %e, "error fetching history");
                state.items.clear();
                state.error = Some(e.to_string());
            }
        }
        state.loading = false;
    }
}

/// Compare as instants, so precision and offset do not matter. Falls back to
/// plain string order when either side is not RFC 3339.
fn timestamp_order(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Numeric ids sort numerically, anything else after them lexically.
fn id_order(id: &str) -> (u64, &str) {
    (id.parse().unwrap_or(u64::MAX), id)
}

/// What a history screen renders from.
#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    pub items: Vec<SummaryRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

impl HistoryState {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
