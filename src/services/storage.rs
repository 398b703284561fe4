use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The persistence capability: string values under string keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value. Absent keys, storage failures and corrupt
/// documents all come back as `None`; the latter two are logged.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring corrupt value under {}: {}", key, e);
            None
        }
    }
}

/// A JSON array decoded entry by entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredList<T> {
    pub items: Vec<T>,
    /// Set when the key held something that did not fully decode: a
    /// non-array document or at least one bad entry.
    pub damaged: bool,
}

/// Read a JSON array, keeping every entry that decodes and logging the
/// ones that don't. `None` means the key is absent or unreachable.
pub fn read_json_list<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Option<StoredList<T>> {
    let entries: Vec<serde_json::Value> = match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Ignoring corrupt list under {}: {}", key, e);
                return Some(StoredList {
                    items: Vec::new(),
                    damaged: true,
                });
            }
        },
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", key, e);
            return None;
        }
    };

    let total = entries.len();
    let items: Vec<T> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping entry {} under {}: {}", index, key, e);
                None
            }
        })
        .collect();

    Some(StoredList {
        damaged: items.len() != total,
        items,
    })
}

/// Encode and write a JSON value. Failures are logged, never returned.
pub fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(anyhow::Error::from)
        .and_then(|json| store.set(key, &json));
    if let Err(e) = result {
        tracing::error!("Failed to persist {}: {}", key, e);
    }
}

pub fn remove_key(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::error!("Failed to remove {}: {}", key, e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A store whose every operation fails.
    pub struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("storage unavailable")
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("quota exceeded")
        }

        fn remove(&self, _key: &str) -> Result<()> {
            anyhow::bail!("storage unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::BrokenStore;
    use super::*;
    use crate::services::Database;

    #[test]
    fn test_corrupt_json_reads_as_none() {
        let db = Database::new_in_memory().unwrap();
        db.set("chatbot-folders", "{not json").unwrap();
        assert_eq!(read_json::<Vec<String>>(&db, "chatbot-folders"), None);
    }

    #[test]
    fn test_round_trip_through_store() {
        let db = Database::new_in_memory().unwrap();
        write_json(&db, "k", &vec![1, 2, 3]);
        assert_eq!(read_json::<Vec<i32>>(&db, "k"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_list_keeps_entries_that_decode() {
        let db = Database::new_in_memory().unwrap();
        db.set("k", r#"[1, "two", 3]"#).unwrap();
        let list = read_json_list::<i32>(&db, "k").unwrap();
        assert_eq!(list.items, vec![1, 3]);
        assert!(list.damaged);

        db.set("k", "[4, 5]").unwrap();
        let list = read_json_list::<i32>(&db, "k").unwrap();
        assert_eq!(list.items, vec![4, 5]);
        assert!(!list.damaged);

        db.set("k", r#"{"not": "a list"}"#).unwrap();
        let list = read_json_list::<i32>(&db, "k").unwrap();
        assert!(list.items.is_empty());
        assert!(list.damaged);

        assert_eq!(read_json_list::<i32>(&db, "absent"), None);
        assert_eq!(read_json_list::<i32>(&BrokenStore, "k"), None);
    }

    #[test]
    fn test_broken_store_fails_soft() {
        write_json(&BrokenStore, "k", &1);
        remove_key(&BrokenStore, "k");
        assert_eq!(read_json::<i32>(&BrokenStore, "k"), None);
    }
}
