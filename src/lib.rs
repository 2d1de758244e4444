use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuneError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Invalid profile name: {0:?}")]
    InvalidProfileName(String),
    #[error("Invalid voltage: {0}")]
    InvalidVoltage(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type TuneResult<T> = Result<T, TuneError>;

pub mod config;
pub mod error_messages;
pub mod live_state;
pub mod migration;
pub mod poll;
pub mod preferences;
pub mod profiles;
pub mod storage;
pub mod voltage;

// Re-export commonly used types
pub use config::AppConfig;
pub use live_state::{CompcacheState, Live, LiveSnapshot, LiveStateClient};
pub use poll::PollController;
pub use preferences::{ConfigStore, PrefValue, PreferenceSet};
pub use profiles::{Profile, ProfileManager};
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use voltage::{VoltageBounds, VoltageChoice};
