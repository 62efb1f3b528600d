//! Persistent storage for the alarm engine.
//!
//! This module provides:
//!
//! - A string-keyed key-value store abstraction (`KeyValueStore`)
//! - A JSON-file-backed implementation (`JsonFileStore`)
//! - An in-memory implementation for tests (`MemoryKvStore`)
//! - Typed accessors over the store (`AlarmStore`, favorites, token cache)
//!
//! Readers treat a missing key as "empty"; there is no schema migration.

mod error;
mod file;

pub use error::StoreError;
pub use file::JsonFileStore;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Alarm;

// ============================================================================
// Store keys
// ============================================================================

/// Keys used in the key-value store.
pub mod keys {
    /// The persisted alarm list.
    pub const ALARMS: &str = "alarms";
    /// Favorite radio stations.
    pub const FAVORITE_STATIONS: &str = "favoriteStations";
    /// Cached station country list with fetch timestamp.
    pub const CACHED_COUNTRIES: &str = "cachedCountries";
    /// Cached station tag list with fetch timestamp.
    pub const CACHED_TAGS: &str = "cachedTags";
    /// Cached music-service auth token.
    pub const AUTH_TOKEN: &str = "authToken";
}

// ============================================================================
// KeyValueStore
// ============================================================================

/// A durable string-keyed store of JSON-serialized values.
///
/// Implementations must treat reads of missing keys as `Ok(None)`.
pub trait KeyValueStore: Send + Sync {
    /// Reads the raw JSON payload stored under `key`.
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes the raw JSON payload under `key`, replacing any prior value.
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the value under `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Reads and decodes the value under `key`; a missing key yields `None`.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get_raw(key)? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            }),
    }
}

/// Encodes and writes `value` under `key`.
pub fn set_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(StoreError::Encode)?;
    store.set_raw(key, &raw)
}

// ============================================================================
// MemoryKvStore
// ============================================================================

/// In-memory key-value store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// AlarmStore
// ============================================================================

/// Typed alarm CRUD over the key-value store.
///
/// Holds no scheduling logic; the alarm manager layers notification
/// side effects on top of these operations.
#[derive(Clone)]
pub struct AlarmStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AlarmStore {
    /// Creates an alarm store over the given key-value store.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Loads all alarms. A missing key reads as an empty list.
    pub fn list(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(get_json(self.kv.as_ref(), keys::ALARMS)?.unwrap_or_default())
    }

    /// Loads a single alarm by id.
    pub fn get(&self, id: &str) -> Result<Option<Alarm>, StoreError> {
        Ok(self.list()?.into_iter().find(|a| a.id == id))
    }

    /// Inserts or replaces an alarm by id.
    pub fn upsert(&self, alarm: Alarm) -> Result<(), StoreError> {
        let mut alarms = self.list()?;
        if let Some(existing) = alarms.iter_mut().find(|a| a.id == alarm.id) {
            *existing = alarm;
        } else {
            alarms.push(alarm);
        }
        set_json(self.kv.as_ref(), keys::ALARMS, &alarms)
    }

    /// Removes an alarm by id. Returns true if an alarm was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut alarms = self.list()?;
        let before = alarms.len();
        alarms.retain(|a| a.id != id);
        let removed = alarms.len() != before;
        if removed {
            set_json(self.kv.as_ref(), keys::ALARMS, &alarms)?;
        }
        Ok(removed)
    }

    /// Replaces the whole alarm list.
    pub fn replace_all(&self, alarms: &[Alarm]) -> Result<(), StoreError> {
        set_json(self.kv.as_ref(), keys::ALARMS, &alarms)
    }
}

// ============================================================================
// Favorite stations
// ============================================================================

/// A favorited radio station, persisted for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStation {
    /// Station display name.
    pub name: String,
    /// Stream URL.
    pub url: String,
}

/// Loads the favorite station list; a missing key reads as empty.
pub fn load_favorites(store: &dyn KeyValueStore) -> Result<Vec<FavoriteStation>, StoreError> {
    Ok(get_json(store, keys::FAVORITE_STATIONS)?.unwrap_or_default())
}

/// Adds a station to the favorites if its URL is not already present.
pub fn add_favorite(
    store: &dyn KeyValueStore,
    station: FavoriteStation,
) -> Result<(), StoreError> {
    let mut favorites = load_favorites(store)?;
    if favorites.iter().any(|f| f.url == station.url) {
        return Ok(());
    }
    favorites.push(station);
    set_json(store, keys::FAVORITE_STATIONS, &favorites)
}

/// Removes a station from the favorites by URL.
pub fn remove_favorite(store: &dyn KeyValueStore, url: &str) -> Result<(), StoreError> {
    let mut favorites = load_favorites(store)?;
    favorites.retain(|f| f.url != url);
    set_json(store, keys::FAVORITE_STATIONS, &favorites)
}

// ============================================================================
// Cached catalog lists
// ============================================================================

/// A cached catalog list (station countries, tags) with its fetch time,
/// consumed by the read-only browsing clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedList {
    /// Unix epoch seconds of the fetch.
    pub fetched_at: i64,
    /// The cached entries.
    pub items: Vec<String>,
}

impl CachedList {
    /// Returns true if the cache is older than `max_age_secs` at `now`.
    #[must_use]
    pub fn is_stale(&self, max_age_secs: i64, now: i64) -> bool {
        now - self.fetched_at > max_age_secs
    }
}

/// Loads a cached catalog list; a missing key reads as `None`.
pub fn load_cached_list(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<CachedList>, StoreError> {
    get_json(store, key)
}

/// Writes a cached catalog list.
pub fn store_cached_list(
    store: &dyn KeyValueStore,
    key: &str,
    list: &CachedList,
) -> Result<(), StoreError> {
    set_json(store, key, list)
}

// ============================================================================
// Auth token cache
// ============================================================================

/// A cached bearer token with its expiry, written by the auth collaborator
/// and read by the music-service token provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedToken {
    /// The bearer token value.
    pub access_token: String,
    /// Unix epoch seconds after which the token is stale.
    pub expires_at: i64,
}

/// Loads the cached auth token, if any. A corrupt payload is treated as
/// missing (with a warning) so a bad cache never blocks playback setup.
pub fn load_cached_token(store: &dyn KeyValueStore) -> Option<CachedToken> {
    match get_json(store, keys::AUTH_TOKEN) {
        Ok(token) => token,
        Err(e) => {
            warn!("Ignoring unreadable token cache: {}", e);
            None
        }
    }
}

/// Writes the cached auth token.
pub fn store_cached_token(
    store: &dyn KeyValueStore,
    token: &CachedToken,
) -> Result<(), StoreError> {
    set_json(store, keys::AUTH_TOKEN, token)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlarmTime, StreamSpec};

    fn stream_alarm(id: &str) -> Alarm {
        let mut alarm = Alarm::new(AlarmTime::new(6, 30).unwrap());
        alarm.id = id.to_string();
        alarm.stream = Some(StreamSpec {
            url: "https://radio.example/live".to_string(),
            name: "Morning FM".to_string(),
        });
        alarm
    }

    // ------------------------------------------------------------------------
    // MemoryKvStore Tests
    // ------------------------------------------------------------------------

    mod memory_store_tests {
        use super::*;

        #[test]
        fn test_missing_key_reads_none() {
            let store = MemoryKvStore::new();
            assert!(store.get_raw("nope").unwrap().is_none());
        }

        #[test]
        fn test_set_then_get() {
            let store = MemoryKvStore::new();
            store.set_raw("k", "[1,2]").unwrap();
            assert_eq!(store.get_raw("k").unwrap().as_deref(), Some("[1,2]"));
        }

        #[test]
        fn test_remove_is_idempotent() {
            let store = MemoryKvStore::new();
            store.set_raw("k", "1").unwrap();
            store.remove("k").unwrap();
            store.remove("k").unwrap();
            assert!(store.get_raw("k").unwrap().is_none());
        }

        #[test]
        fn test_get_json_missing_key() {
            let store = MemoryKvStore::new();
            let value: Option<Vec<u32>> = get_json(&store, "nope").unwrap();
            assert!(value.is_none());
        }

        #[test]
        fn test_get_json_corrupt_payload() {
            let store = MemoryKvStore::new();
            store.set_raw("k", "not json").unwrap();
            let result: Result<Option<Vec<u32>>, _> = get_json(&store, "k");
            assert!(result.unwrap_err().is_corrupt_payload());
        }

        #[test]
        fn test_set_json_round_trip() {
            let store = MemoryKvStore::new();
            set_json(&store, "k", &vec![1u32, 2, 3]).unwrap();
            let value: Option<Vec<u32>> = get_json(&store, "k").unwrap();
            assert_eq!(value, Some(vec![1, 2, 3]));
        }
    }

    // ------------------------------------------------------------------------
    // AlarmStore Tests
    // ------------------------------------------------------------------------

    mod alarm_store_tests {
        use super::*;

        fn create_store() -> AlarmStore {
            AlarmStore::new(Arc::new(MemoryKvStore::new()))
        }

        #[test]
        fn test_list_empty() {
            let store = create_store();
            assert!(store.list().unwrap().is_empty());
        }

        #[test]
        fn test_upsert_inserts() {
            let store = create_store();
            store.upsert(stream_alarm("a1")).unwrap();

            let alarms = store.list().unwrap();
            assert_eq!(alarms.len(), 1);
            assert_eq!(alarms[0].id, "a1");
        }

        #[test]
        fn test_upsert_replaces_by_id() {
            let store = create_store();
            store.upsert(stream_alarm("a1")).unwrap();

            let mut updated = stream_alarm("a1");
            updated.enabled = false;
            store.upsert(updated).unwrap();

            let alarms = store.list().unwrap();
            assert_eq!(alarms.len(), 1);
            assert!(!alarms[0].enabled);
        }

        #[test]
        fn test_get_by_id() {
            let store = create_store();
            store.upsert(stream_alarm("a1")).unwrap();
            store.upsert(stream_alarm("a2")).unwrap();

            assert_eq!(store.get("a2").unwrap().unwrap().id, "a2");
            assert!(store.get("a3").unwrap().is_none());
        }

        #[test]
        fn test_delete() {
            let store = create_store();
            store.upsert(stream_alarm("a1")).unwrap();

            assert!(store.delete("a1").unwrap());
            assert!(!store.delete("a1").unwrap());
            assert!(store.list().unwrap().is_empty());
        }

        #[test]
        fn test_replace_all() {
            let store = create_store();
            store.upsert(stream_alarm("a1")).unwrap();

            store
                .replace_all(&[stream_alarm("b1"), stream_alarm("b2")])
                .unwrap();

            let alarms = store.list().unwrap();
            assert_eq!(alarms.len(), 2);
            assert_eq!(alarms[0].id, "b1");
        }

        #[test]
        fn test_snooze_round_trips_through_store() {
            let store = create_store();
            let mut alarm = stream_alarm("a1");
            alarm.snooze_until = Some(chrono::Local::now());
            store.upsert(alarm).unwrap();

            let loaded = store.get("a1").unwrap().unwrap();
            assert!(loaded.snooze_until.is_some());
        }
    }

    // ------------------------------------------------------------------------
    // Favorites / token Tests
    // ------------------------------------------------------------------------

    mod favorites_tests {
        use super::*;

        #[test]
        fn test_favorites_empty_by_default() {
            let store = MemoryKvStore::new();
            assert!(load_favorites(&store).unwrap().is_empty());
        }

        #[test]
        fn test_add_favorite_dedupes_by_url() {
            let store = MemoryKvStore::new();
            let station = FavoriteStation {
                name: "Morning FM".to_string(),
                url: "https://radio.example/live".to_string(),
            };

            add_favorite(&store, station.clone()).unwrap();
            add_favorite(&store, station).unwrap();

            assert_eq!(load_favorites(&store).unwrap().len(), 1);
        }

        #[test]
        fn test_remove_favorite() {
            let store = MemoryKvStore::new();
            add_favorite(
                &store,
                FavoriteStation {
                    name: "Morning FM".to_string(),
                    url: "https://radio.example/live".to_string(),
                },
            )
            .unwrap();

            remove_favorite(&store, "https://radio.example/live").unwrap();
            assert!(load_favorites(&store).unwrap().is_empty());
        }

        #[test]
        fn test_token_cache_round_trip() {
            let store = MemoryKvStore::new();
            assert!(load_cached_token(&store).is_none());

            let token = CachedToken {
                access_token: "abc".to_string(),
                expires_at: 1_700_000_000,
            };
            store_cached_token(&store, &token).unwrap();
            assert_eq!(load_cached_token(&store), Some(token));
        }

        #[test]
        fn test_corrupt_token_cache_reads_as_missing() {
            let store = MemoryKvStore::new();
            store.set_raw(keys::AUTH_TOKEN, "{broken").unwrap();
            assert!(load_cached_token(&store).is_none());
        }

        #[test]
        fn test_cached_list_round_trip_and_staleness() {
            let store = MemoryKvStore::new();
            assert!(load_cached_list(&store, keys::CACHED_COUNTRIES)
                .unwrap()
                .is_none());

            let list = CachedList {
                fetched_at: 1_000,
                items: vec!["JP".to_string(), "DE".to_string()],
            };
            store_cached_list(&store, keys::CACHED_COUNTRIES, &list).unwrap();

            let loaded = load_cached_list(&store, keys::CACHED_COUNTRIES)
                .unwrap()
                .unwrap();
            assert_eq!(loaded, list);
            assert!(!loaded.is_stale(3600, 2_000));
            assert!(loaded.is_stale(3600, 10_000));
        }
    }
}
