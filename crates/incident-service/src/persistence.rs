//! JSON list encoding on top of the key-value state store
//!
//! Storage failures never reach callers: they are logged, counted, and the
//! in-memory list stays authoritative.

use common::StateStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use telemetry::metrics::STORAGE_FAILURES;
use uuid::Uuid;

/// Outcome of decoding a stored value
#[derive(Debug)]
pub(crate) enum Decoded<T> {
    /// Every readable record; unreadable ones are logged and skipped
    Records(Vec<T>),
    /// A non-empty array in which no record could be read
    Unreadable { skipped: usize },
    /// Valid JSON that is not an array
    NotAList,
    Malformed(String),
}

#[derive(Debug)]
pub(crate) enum Loaded<T> {
    Missing,
    Unavailable,
    Found(Decoded<T>),
}

/// Decode a stored JSON array record by record
///
/// One bad record (an unknown category from older data, say) must not cost
/// the rest of the list.
pub(crate) fn decode_list<T: DeserializeOwned>(key: &str, raw: &str) -> Decoded<T> {
    let items = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => return Decoded::NotAList,
        Err(e) => return Decoded::Malformed(e.to_string()),
    };

    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, index, error = %e, "skipping unreadable stored record");
                STORAGE_FAILURES.with_label_values(&[key, "decode"]).inc();
                None
            }
        })
        .collect();

    if records.is_empty() && total > 0 {
        return Decoded::Unreadable { skipped: total };
    }
    Decoded::Records(records)
}

pub(crate) async fn load_list<T: DeserializeOwned>(state: &dyn StateStore, key: &str) -> Loaded<T> {
    match state.get(key).await {
        Ok(Some(raw)) => Loaded::Found(decode_list(key, &raw)),
        Ok(None) => Loaded::Missing,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to read from storage");
            STORAGE_FAILURES.with_label_values(&[key, "read"]).inc();
            Loaded::Unavailable
        }
    }
}

pub(crate) fn encode_list<T: Serialize>(key: &str, records: &[T]) -> Option<String> {
    match serde_json::to_string(records) {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to serialize records");
            STORAGE_FAILURES.with_label_values(&[key, "encode"]).inc();
            None
        }
    }
}

/// Persist a whole list under `key`; returns whether it reached storage.
pub(crate) async fn save_list<T: Serialize>(
    state: &dyn StateStore,
    key: &str,
    records: &[T],
    origin: Uuid,
) -> bool {
    let Some(raw) = encode_list(key, records) else {
        return false;
    };

    match state.set(key, &raw, origin).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to write to storage, keeping in-memory state");
            STORAGE_FAILURES.with_label_values(&[key, "write"]).inc();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MemoryStateStore;

    #[test]
    fn test_decode_variants() {
        assert!(matches!(decode_list::<i64>("k", "[1,2]"), Decoded::Records(ref v) if v == &vec![1, 2]));
        assert!(matches!(decode_list::<i64>("k", "[]"), Decoded::Records(ref v) if v.is_empty()));
        assert!(matches!(decode_list::<i64>("k", "{\"a\":1}"), Decoded::NotAList));
        assert!(matches!(decode_list::<i64>("k", "null"), Decoded::NotAList));
        assert!(matches!(decode_list::<i64>("k", "[1,"), Decoded::Malformed(_)));
        assert!(matches!(
            decode_list::<i64>("k", "[\"x\", \"y\"]"),
            Decoded::Unreadable { skipped: 2 }
        ));
    }

    #[test]
    fn test_bad_record_does_not_drop_the_rest() {
        let before = STORAGE_FAILURES.with_label_values(&["mixed-list", "decode"]).get();

        let decoded = decode_list::<i64>("mixed-list", "[1, \"plumbing\", 3]");
        assert!(matches!(decoded, Decoded::Records(ref v) if v == &vec![1, 3]));

        let after = STORAGE_FAILURES.with_label_values(&["mixed-list", "decode"]).get();
        assert_eq!(after - before, 1);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let state = MemoryStateStore::new();
        assert!(matches!(load_list::<i64>(&state, "k").await, Loaded::Missing));

        assert!(save_list(&state, "k", &[3_i64, 4], Uuid::new_v4()).await);
        match load_list::<i64>(&state, "k").await {
            Loaded::Found(Decoded::Records(v)) => assert_eq!(v, vec![3, 4]),
            other => panic!("unexpected load result: {:?}", other),
        }
    }
}
