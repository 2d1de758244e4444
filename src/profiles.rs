// Profile Manager
// Named snapshots of the tunable settings, stored inside the preference set

use crate::live_state::{CompcacheState, Live, LiveSnapshot};
use crate::preferences::{
    ConfigStore, KEY_COMPCACHE, KEY_CONGESTION, KEY_GOVERNOR, KEY_SCHEDULER, KEY_VOLTAGE,
    PrefValue, PreferenceSet,
};
use crate::{TuneError, TuneResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

/// Settings captured by a profile, in display order
pub const TUNABLES: [&str; 5] = [
    KEY_GOVERNOR,
    KEY_COMPCACHE,
    KEY_SCHEDULER,
    KEY_CONGESTION,
    KEY_VOLTAGE,
];

const PROFILE_PREFIX: &str = "profile.";
const SAVED_AT: &str = "savedAt";

fn profile_key(name: &str, field: &str) -> String {
    format!("{}{}.{}", PROFILE_PREFIX, name, field)
}

/// A saved snapshot of the tunables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
    pub settings: Vec<(String, PrefValue)>,
    pub saved_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn get(&self, setting: &str) -> Option<&PrefValue> {
        self.settings
            .iter()
            .find(|(key, _)| key == setting)
            .map(|(_, value)| value)
    }
}

/// How a summary row responds to taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Editability {
    Editable,
    /// Value could not be read right now
    Disabled,
    /// Device lacks the feature
    Unsupported,
}

/// Screen a row navigates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Screen {
    CpuFrequency,
    Compcache,
    IoScheduler,
    TcpCongestion,
    ProfileSave,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub name: &'static str,
    pub value: Option<String>,
    pub editability: Editability,
    pub target: Option<Screen>,
}

impl SummaryRow {
    fn editable(name: &'static str, value: String, target: Screen) -> Self {
        Self {
            name,
            value: Some(value),
            editability: Editability::Editable,
            target: Some(target),
        }
    }

    fn inert(name: &'static str, value: String, editability: Editability) -> Self {
        Self {
            name,
            value: Some(value),
            editability,
            target: None,
        }
    }
}

pub struct ProfileManager<'a> {
    store: &'a ConfigStore,
}

impl<'a> ProfileManager<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    /// Rows for the settings summary.
    ///
    /// Live values win; when a value is unavailable the stored preference is
    /// shown on a disabled row.
    pub fn build_summary(&self, live: &LiveSnapshot) -> Vec<SummaryRow> {
        let prefs = self.store.get(false);
        let stored = |key: &str| prefs.get(key).map(|v| v.to_string()).unwrap_or_default();

        let text_row = |name, value: &Live<String>, key: &str, target| match value {
            Live::Value(v) => SummaryRow::editable(name, v.clone(), target),
            Live::Unavailable => SummaryRow::inert(name, stored(key), Editability::Disabled),
        };

        let compcache = match &live.compcache {
            Live::Value(CompcacheState::Unsupported) => {
                SummaryRow::inert("Compressed Swap", "N/A".to_string(), Editability::Unsupported)
            }
            Live::Value(state) => {
                SummaryRow::editable("Compressed Swap", state.to_string(), Screen::Compcache)
            }
            Live::Unavailable => {
                SummaryRow::inert("Compressed Swap", stored(KEY_COMPCACHE), Editability::Disabled)
            }
        };

        vec![
            text_row("CPU Frequency", &live.governor, KEY_GOVERNOR, Screen::CpuFrequency),
            compcache,
            text_row("I/O Scheduler", &live.scheduler, KEY_SCHEDULER, Screen::IoScheduler),
            text_row("TCP Congestion", &live.congestion, KEY_CONGESTION, Screen::TcpCongestion),
            SummaryRow {
                name: "Save As New Profile",
                value: None,
                editability: Editability::Editable,
                target: Some(Screen::ProfileSave),
            },
        ]
    }

    /// Save the current tunables under `name`, replacing any profile of that name
    pub fn save(&self, name: &str) -> TuneResult<Profile> {
        validate_name(name)?;

        let prefs = self.store.get(false);
        let settings: Vec<(String, PrefValue)> = TUNABLES
            .iter()
            .filter_map(|key| prefs.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect();
        let saved_at = Utc::now();

        let entries = settings
            .iter()
            .map(|(key, value)| (profile_key(name, key), value.clone()))
            .chain(std::iter::once((
                profile_key(name, SAVED_AT),
                PrefValue::Text(saved_at.to_rfc3339()),
            )));
        self.store.put_entries(entries);

        info!(profile = name, "Saved profile");
        Ok(Profile {
            name: name.to_string(),
            settings,
            saved_at: Some(saved_at),
        })
    }

    pub fn load(&self, name: &str) -> TuneResult<Profile> {
        let prefs = self.store.get(false);
        let settings: Vec<(String, PrefValue)> = TUNABLES
            .iter()
            .filter_map(|key| {
                prefs
                    .get(&profile_key(name, key))
                    .map(|v| ((*key).to_string(), v.clone()))
            })
            .collect();

        if settings.is_empty() {
            return Err(TuneError::ProfileNotFound(name.to_string()));
        }

        let saved_at = prefs
            .get(&profile_key(name, SAVED_AT))
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Profile {
            name: name.to_string(),
            settings,
            saved_at,
        })
    }

    /// Preference set with the profile's values applied, ready for `ConfigStore::put_all`
    pub fn apply(&self, name: &str) -> TuneResult<PreferenceSet> {
        let profile = self.load(name)?;
        let mut prefs = self.store.get(false);
        for (key, value) in profile.settings {
            prefs.insert(key, value);
        }
        info!(profile = name, "Applied profile");
        Ok(prefs)
    }

    /// Change one setting inside a saved profile.
    ///
    /// Voltage strings are stored as given; the rail count is not checked.
    pub fn update(&self, name: &str, setting: &str, value: impl Into<PrefValue>) -> TuneResult<()> {
        if !TUNABLES.iter().any(|t| *t == setting) {
            return Err(TuneError::ConfigError(format!(
                "{} is not a profile setting",
                setting
            )));
        }
        self.load(name)?;
        self.store.put(&profile_key(name, setting), value);
        Ok(())
    }

    /// Saved profile names, sorted
    pub fn list(&self) -> Vec<String> {
        self.store
            .get(false)
            .keys()
            .filter_map(|key| key.strip_prefix(PROFILE_PREFIX))
            .filter_map(|rest| rest.rsplit_once('.'))
            .map(|(name, _)| name.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn validate_name(name: &str) -> TuneResult<()> {
    if name.trim().is_empty() || name.contains('.') {
        return Err(TuneError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}
