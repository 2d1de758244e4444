/// Persistent preference store
///
/// One `ConfigStore` is built per process and handed by reference to every
/// consumer. It overlays the persisted blob on the built-in defaults, runs
/// legacy migrations on load and writes the whole set back on every `put`.
use crate::migration;
use crate::storage::BlobStore;
use crate::TuneError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub const KEY_THEME: &str = "theme";
pub const KEY_SECOND_ROW: &str = "secondRow";
pub const KEY_LIST_SORT: &str = "listSort";
pub const KEY_GOVERNOR: &str = "governor";
pub const KEY_COMPCACHE: &str = "compcache";
pub const KEY_SCHEDULER: &str = "scheduler";
pub const KEY_CONGESTION: &str = "congestion";
pub const KEY_VOLTAGE: &str = "voltage";

/// A single preference value as stored in the blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    /// Any other JSON shape found in the blob, kept as-is
    Other(serde_json::Value),
}

impl PrefValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Parse a command-line string: `true`/`false`, numbers, otherwise text
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => return PrefValue::Bool(true),
            "false" => return PrefValue::Bool(false),
            _ => {}
        }
        match raw.parse::<serde_json::Number>() {
            Ok(n) => PrefValue::Number(n),
            Err(_) => PrefValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{}", b),
            PrefValue::Number(n) => write!(f, "{}", n),
            PrefValue::Text(s) => write!(f, "{}", s),
            PrefValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::Text(s.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(s: String) -> Self {
        PrefValue::Text(s)
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Bool(b)
    }
}

impl From<i64> for PrefValue {
    fn from(n: i64) -> Self {
        PrefValue::Number(n.into())
    }
}

/// Setting key to value
pub type PreferenceSet = BTreeMap<String, PrefValue>;

/// Built-in defaults. Every known key appears here.
pub fn defaults() -> PreferenceSet {
    let mut prefs = PreferenceSet::new();

    // Global
    prefs.insert(KEY_THEME.into(), "palm-default".into());

    // List display
    prefs.insert(KEY_SECOND_ROW.into(), "version,maint".into());
    prefs.insert(KEY_LIST_SORT.into(), "default".into());

    // Tunables
    prefs.insert(KEY_GOVERNOR.into(), "ondemand".into());
    prefs.insert(KEY_COMPCACHE.into(), "disabled".into());
    prefs.insert(KEY_SCHEDULER.into(), "cfq".into());
    prefs.insert(KEY_CONGESTION.into(), "cubic".into());
    prefs.insert(KEY_VOLTAGE.into(), "".into());

    prefs
}

#[derive(Debug, Default)]
struct Cache {
    prefs: Option<PreferenceSet>,
    /// Last load could not read the stored blob; it must not be overwritten
    degraded: bool,
}

pub struct ConfigStore {
    storage: Box<dyn BlobStore>,
    cache: Mutex<Cache>,
}

impl ConfigStore {
    pub fn new(storage: impl BlobStore + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Current preferences.
    ///
    /// Loads from storage on first use or when `force_reload` is set. Storage
    /// failures are logged and leave the defaults in place.
    pub fn get(&self, force_reload: bool) -> PreferenceSet {
        let mut cache = self.lock();
        if force_reload || cache.prefs.is_none() {
            let (prefs, degraded) = self.load();
            cache.prefs = Some(prefs);
            cache.degraded = degraded;
        }
        cache.prefs.clone().unwrap_or_else(defaults)
    }

    /// Single value lookup through the cache
    pub fn value(&self, key: &str) -> Option<PrefValue> {
        self.get(false).get(key).cloned()
    }

    /// Set one key and write the whole set back
    pub fn put(&self, key: &str, value: impl Into<PrefValue>) {
        let value = value.into();
        self.merge(|prefs| {
            prefs.insert(key.to_string(), value);
        });
    }

    /// Set several keys with a single write
    pub fn put_entries<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PrefValue>,
    {
        self.merge(|prefs| {
            for (key, value) in entries {
                prefs.insert(key.into(), value.into());
            }
        });
    }

    /// Overwrite the whole blob, used for bulk restore
    pub fn put_all(&self, prefs: &PreferenceSet) {
        let mut cache = self.lock();
        self.persist(prefs);
        // Next get re-applies defaults and migrations on top of what was written
        cache.prefs = None;
        cache.degraded = false;
    }

    /// Restore the built-in defaults
    pub fn reset(&self) {
        info!("Resetting preferences to defaults");
        self.put_all(&defaults());
    }

    /// Read-merge-write under the cache lock so two updates cannot interleave.
    ///
    /// After a degraded load storage is re-read first; if it is still
    /// unreadable the change stays in memory and the blob is left alone.
    fn merge(&self, update: impl FnOnce(&mut PreferenceSet)) {
        let mut cache = self.lock();

        if cache.prefs.is_none() || cache.degraded {
            let (fresh, degraded) = self.load();
            if !degraded || cache.prefs.is_none() {
                cache.prefs = Some(fresh);
            }
            cache.degraded = degraded;
        }

        let degraded = cache.degraded;
        let prefs = cache.prefs.get_or_insert_with(defaults);
        update(prefs);

        if degraded {
            warn!("Stored preferences unreadable, keeping change in memory only");
        } else {
            self.persist(prefs);
        }
    }

    /// Defaults overlaid with the stored blob, and whether the blob was unreadable
    fn load(&self) -> (PreferenceSet, bool) {
        let mut prefs = defaults();

        match self.storage.read() {
            Ok(Some(blob)) => match serde_json::from_str::<PreferenceSet>(&blob) {
                Ok(persisted) => {
                    debug!(keys = persisted.len(), "Loaded persisted preferences");
                    for (key, value) in persisted {
                        let value = migration::migrate_value(&key, value);
                        prefs.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Preference blob unreadable, using defaults");
                    return (prefs, true);
                }
            },
            Ok(None) => {
                info!("No stored preferences, writing defaults");
                self.persist(&prefs);
            }
            Err(e) => {
                warn!(error = %e, "Preference storage unavailable, using defaults");
                return (prefs, true);
            }
        }

        (prefs, false)
    }

    fn persist(&self, prefs: &PreferenceSet) {
        let result = serde_json::to_string(prefs)
            .map_err(|e| TuneError::Serialization(e.to_string()))
            .and_then(|blob| self.storage.write(&blob));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist preferences");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
