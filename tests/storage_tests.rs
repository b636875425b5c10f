use async_trait::async_trait;
use precis::history::{HistoryReader, HistoryState};
use precis::storage::{NewSummaryRecord, StorageError, SummaryRecord, SummaryStore};
use precis::{Bullets, Storage};
use std::sync::Arc;

fn bullets() -> Bullets {
    Bullets::try_from(vec![
        "One.".to_string(),
        "Two.".to_string(),
        "Three.".to_string(),
        "Four.".to_string(),
        "Five.".to_string(),
    ])
    .unwrap()
}

fn record(user: &str, text: &str, timestamp: &str) -> NewSummaryRecord {
    NewSummaryRecord {
        user_id: user.to_string(),
        original_text: text.to_string(),
        summary: bullets(),
        timestamp: timestamp.to_string(),
    }
}

#[test]
fn test_new_record_has_iso_timestamp() {
    let record = NewSummaryRecord::new("u", "text", bullets());
    let parsed = chrono::DateTime::parse_from_rfc3339(&record.timestamp).unwrap();
    assert_eq!(parsed.offset().local_minus_utc(), 0);
    assert!(record.timestamp.ends_with('Z'));
}

#[test]
fn test_record_uses_document_field_names() {
    let json = serde_json::to_value(record("u", "text", "2024-01-01T00:00:00.000Z")).unwrap();
    assert_eq!(json["userId"], "u");
    assert_eq!(json["originalText"], "text");
    assert_eq!(json["summary"].as_array().unwrap().len(), 5);
    assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
}

#[test]
fn test_store_assigns_distinct_ids() {
    let storage = Storage::temporary().unwrap();
    let first = storage.store(&record("u", "a", "2024-01-01T00:00:00.000Z")).unwrap();
    let second = storage.store(&record("u", "b", "2024-01-01T00:00:00.000Z")).unwrap();
    assert_ne!(first, second);
    assert_eq!(storage.count(), 2);
}

#[test]
fn test_records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = Storage::open(dir.path()).unwrap();
        storage.store(&record("u", "kept", "2024-01-01T00:00:00.000Z")).unwrap();
    }
    let storage = Storage::open(dir.path()).unwrap();
    let records = storage.list_for_user("u").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original_text(), "kept");
}

#[tokio::test]
async fn test_history_is_newest_first_and_per_user() {
    let storage = Arc::new(Storage::temporary().unwrap());
    storage.append(record("alice", "middle", "2024-03-02T10:00:00.000Z")).await.unwrap();
    storage.append(record("alice", "oldest", "2024-01-15T08:30:00.000Z")).await.unwrap();
    storage.append(record("bob", "other user", "2024-06-01T00:00:00.000Z")).await.unwrap();
    storage.append(record("alice", "newest", "2024-05-20T23:59:59.999Z")).await.unwrap();

    let history = HistoryReader::new(storage).fetch("alice").await.unwrap();
    let texts: Vec<_> = history.iter().map(|r| r.original_text()).collect();
    assert_eq!(texts, ["newest", "middle", "oldest"]);
    assert!(history.windows(2).all(|w| w[0].timestamp() >= w[1].timestamp()));
}

#[tokio::test]
async fn test_same_timestamp_prefers_latest_append() {
    let storage = Arc::new(Storage::temporary().unwrap());
    storage.append(record("u", "first", "2024-01-01T00:00:00.000Z")).await.unwrap();
    storage.append(record("u", "second", "2024-01-01T00:00:00.000Z")).await.unwrap();

    let history = HistoryReader::new(storage).fetch("u").await.unwrap();
    assert_eq!(history[0].original_text(), "second");
}

#[tokio::test]
async fn test_unknown_user_has_empty_history() {
    let storage = Arc::new(Storage::temporary().unwrap());
    storage.append(record("u", "text", "2024-01-01T00:00:00.000Z")).await.unwrap();

    let history = HistoryReader::new(storage).fetch("nobody").await.unwrap();
    assert!(history.is_empty());
}

/// A store that is always down.
struct UnavailableStore;

#[async_trait]
impl SummaryStore for UnavailableStore {
    async fn append(&self, _record: NewSummaryRecord) -> Result<String, StorageError> {
        Err(StorageError::DbError(sled::Error::Unsupported("offline".into())))
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<Vec<SummaryRecord>, StorageError> {
        Err(StorageError::DbError(sled::Error::Unsupported("offline".into())))
    }
}

#[tokio::test]
async fn test_store_failure_becomes_empty_state() {
    let reader = HistoryReader::new(Arc::new(UnavailableStore));

    assert!(reader.fetch("u").await.is_err());
    assert!(reader.fetch_or_empty("u").await.is_empty());

    let mut state = HistoryState::default();
    reader.load(&mut state, "u").await;
    assert!(state.is_empty());
    assert!(!state.loading);
    assert!(state.error.unwrap().contains("offline"));
}

#[tokio::test]
async fn test_history_orders_by_instant_not_text() {
    let storage = Arc::new(Storage::temporary().unwrap());
    storage.append(record("u", "older", "2024-01-01T00:00:00Z")).await.unwrap();
    storage.append(record("u", "newer", "2024-01-01T00:00:00.500Z")).await.unwrap();
    storage.append(record("u", "offset", "2024-01-01T01:00:00.250+01:00")).await.unwrap();

    let history = HistoryReader::new(storage).fetch("u").await.unwrap();
    let texts: Vec<_> = history.iter().map(|r| r.original_text()).collect();
    assert_eq!(texts, ["newer", "offset", "older"]);
}

#[test]
fn test_list_for_user_is_in_append_order() {
    let storage = Storage::temporary().unwrap();
    for text in ["first", "second", "third"] {
        storage.store(&record("u", text, "2024-01-01T00:00:00.000Z")).unwrap();
    }

    let texts: Vec<_> = storage
        .list_for_user("u")
        .unwrap()
        .into_iter()
        .map(|r| r.record.original_text)
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn test_foreign_records_do_not_break_history() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = sled::open(dir.path()).unwrap();
        let tree = db.open_tree("summaries").unwrap();
        let legacy = serde_json::json!({
            "userId": "bob",
            "originalText": "raw payload era",
            "summary": "{\"bullets\":[]}",
            "timestamp": "2023-12-31T00:00:00.000Z",
        });
        tree.insert(u64::MAX.to_be_bytes(), serde_json::to_vec(&legacy).unwrap())
            .unwrap();
        tree.insert(b"junk", b"not json at all".to_vec()).unwrap();
        tree.flush().unwrap();
    }

    let storage = Arc::new(Storage::open(dir.path()).unwrap());
    storage.append(record("alice", "fine", "2024-01-01T00:00:00.000Z")).await.unwrap();

    let reader = HistoryReader::new(storage);
    let alice = reader.fetch("alice").await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].original_text(), "fine");
    assert_eq!(reader.fetch_or_empty("alice").await.len(), 1);

    // Bob's own unreadable record is skipped rather than failing his history.
    assert!(reader.fetch("bob").await.unwrap().is_empty());
}
