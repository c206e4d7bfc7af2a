//! Progress store: namespaced, JSON-valued key-value persistence.
//!
//! The store owns no policy. It builds collision-free keys, serializes
//! values, and decides how failures surface: reads fail soft to `None`,
//! writes report the error.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, StudyError};
use crate::models::StudyItem;

const ROOT: &str = "htgaa";

/// A durable string-keyed surface holding JSON text values.
pub trait Medium {
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Adds `delta` to the integer stored at `key` (absent counts as 0) as
    /// one indivisible step, returning the new value.
    fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Entries whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    fn clear_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Non-persistent medium for tests and degraded mode.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the backing medium going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Writes raw text, bypassing serialization. Lets tests plant corrupt data.
    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value)
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StudyError::MediumUnavailable("memory medium offline".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StudyError::MediumUnavailable("memory medium poisoned".into()))
    }
}

impl Medium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        // Guard is held across the whole read-modify-write
        let mut entries = self.entries()?;
        let current = match entries.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| StudyError::CorruptValue {
                    key: key.to_string(),
                })?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StudyError::CorruptValue {
                key: key.to_string(),
            })?;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries()?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}

// Per-item and per-topic fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Review,
    Wrong,
    LastAnswer,
    Visited,
    SecondsSpent,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Review => "review",
            Field::Wrong => "wrong",
            Field::LastAnswer => "last_answer",
            Field::Visited => "visited",
            Field::SecondsSpent => "seconds",
        }
    }
}

/// A fully namespaced key. Only the store's builders produce one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_component(name: &'static str, raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(StudyError::MalformedKey(format!("{} must not be empty", name)));
    }
    Ok(raw.replace('%', "%25").replace('/', "%2F"))
}

/// Persistence for one learner's progress.
pub struct ProgressStore<M: Medium> {
    medium: M,
    namespace: String,
}

impl<M: Medium> ProgressStore<M> {
    pub fn new(medium: M, learner: &str) -> Result<Self> {
        let namespace = format!("{}/{}/", ROOT, escape_component("learner", learner)?);
        Ok(Self { medium, namespace })
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn item_key(&self, item: &StudyItem, field: Field) -> Result<StoreKey> {
        Ok(StoreKey(format!(
            "{}item/{}/{}/{}/{}",
            self.namespace,
            escape_component("topic id", &item.topic_id)?,
            item.kind.as_str(),
            escape_component("item key", &item.item_key)?,
            field.as_str()
        )))
    }

    pub fn topic_key(&self, topic_id: &str, field: Field) -> Result<StoreKey> {
        Ok(StoreKey(format!(
            "{}topic/{}/{}",
            self.namespace,
            escape_component("topic id", topic_id)?,
            field.as_str()
        )))
    }

    pub fn activity_key(&self, date: NaiveDate) -> StoreKey {
        StoreKey(format!("{}{}", self.activity_prefix().0, date.format("%Y-%m-%d")))
    }

    pub fn activity_prefix(&self) -> StoreKey {
        StoreKey(format!("{}activity/", self.namespace))
    }

    /// Reads and decodes a value. Unavailable media and undecodable values
    /// both read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &StoreKey) -> Option<T> {
        let raw = match self.medium.read(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "read failed, treating as absent");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "corrupt value, treating as absent");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &StoreKey, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.medium.write(key.as_str(), &raw)?;
        debug!(key = key.as_str(), "stored value");
        Ok(())
    }

    pub fn increment(&self, key: &StoreKey, delta: i64) -> Result<i64> {
        if delta < 0 {
            return Err(StudyError::NegativeDelta(delta));
        }
        self.medium.increment(key.as_str(), delta)
    }

    /// Counter value, 0 when absent or unreadable.
    pub fn counter(&self, key: &StoreKey) -> u64 {
        self.get::<i64>(key)
            .map(|v| v.max(0) as u64)
            .unwrap_or(0)
    }

    /// Decoded entries under `prefix`, keyed by the remainder of each key.
    /// Entries that fail to decode are skipped.
    pub fn scan<T: DeserializeOwned>(&self, prefix: &StoreKey) -> Vec<(String, T)> {
        let entries = match self.medium.scan_prefix(prefix.as_str()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(prefix = prefix.as_str(), error = %e, "scan failed, treating as empty");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(key, raw)| {
                let suffix = key.strip_prefix(prefix.as_str())?.to_string();
                match serde_json::from_str(&raw) {
                    Ok(value) => Some((suffix, value)),
                    Err(e) => {
                        warn!(key = key.as_str(), error = %e, "skipping corrupt entry");
                        None
                    }
                }
            })
            .collect()
    }

    /// Clears every key of this learner. Returns how many were removed.
    pub fn reset(&self) -> Result<usize> {
        let removed = self.medium.clear_prefix(&self.namespace)?;
        debug!(namespace = self.namespace.as_str(), removed, "reset learner");
        Ok(removed)
    }
}
