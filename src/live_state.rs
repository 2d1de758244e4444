//! Live System State
//!
//! Trait-based abstraction over the service that reports the tunables the
//! kernel is actually running with. The sysfs reader is read-only; applying
//! values belongs to the privileged service, not this crate.

use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// A live reading, or an explicit marker that the device could not report it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Live<T> {
    Value(T),
    Unavailable,
}

impl<T> Live<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Live::Value(v) => Some(v),
            Live::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Live::Value(_))
    }
}

impl<T> Default for Live<T> {
    fn default() -> Self {
        Live::Unavailable
    }
}

impl<T> From<Option<T>> for Live<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Live::Unavailable, Live::Value)
    }
}

/// Compressed swap state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompcacheState {
    /// Kernel has no compressed swap support
    Unsupported,
    /// Supported but switched off
    Disabled,
    Enabled { mem_limit_kb: u64 },
}

impl std::fmt::Display for CompcacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompcacheState::Unsupported => write!(f, "unsupported"),
            CompcacheState::Disabled => write!(f, "disabled"),
            CompcacheState::Enabled { mem_limit_kb } => write!(f, "{} KB", mem_limit_kb),
        }
    }
}

/// Point-in-time view of the live tunables. Replaced whole on every poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub governor: Live<String>,
    pub compcache: Live<CompcacheState>,
    pub scheduler: Live<String>,
    pub congestion: Live<String>,
}

/// Source of live tunable values
pub trait LiveStateClient: Send + Sync + 'static {
    /// Current CPU frequency governor
    fn governor(&self) -> impl Future<Output = Live<String>> + Send;

    /// Current block I/O scheduler
    fn scheduler(&self) -> impl Future<Output = Live<String>> + Send;

    /// Current TCP congestion control algorithm
    fn congestion_control(&self) -> impl Future<Output = Live<String>> + Send;

    /// Compressed swap state
    fn compcache(&self) -> impl Future<Output = Live<CompcacheState>> + Send;

    /// All fields in one snapshot
    fn snapshot(&self) -> impl Future<Output = LiveSnapshot> + Send {
        async move {
            LiveSnapshot {
                governor: self.governor().await,
                compcache: self.compcache().await,
                scheduler: self.scheduler().await,
                congestion: self.congestion_control().await,
            }
        }
    }
}

/// Reads live values from sysfs/procfs
#[derive(Debug, Clone)]
pub struct SysfsLiveState {
    root: PathBuf,
    block_device: String,
}

impl SysfsLiveState {
    pub fn new() -> Self {
        Self::with_root("/", "mmcblk0")
    }

    /// Resolve all paths under `root`, for tests and chroots
    pub fn with_root(root: impl AsRef<Path>, block_device: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            block_device: block_device.to_string(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    fn read_line(&self, rel: &str) -> Option<String> {
        let path = self.path(rel);
        match fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Live value unreadable");
                None
            }
        }
    }
}

impl Default for SysfsLiveState {
    fn default() -> Self {
        Self::new()
    }
}

/// Active entry of a scheduler list such as `noop deadline [cfq]`
pub fn parse_active_scheduler(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|t| t.starts_with('[') && t.ends_with(']'))
        .map(|t| t.trim_matches(|c| c == '[' || c == ']').to_string())
}

/// `MemLimit` from `/proc/ramzswap`
pub fn parse_ramzswap_mem_limit(contents: &str) -> Option<u64> {
    contents
        .lines()
        .find(|l| l.trim_start().starts_with("MemLimit"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
}

impl LiveStateClient for SysfsLiveState {
    async fn governor(&self) -> Live<String> {
        self.read_line("sys/devices/system/cpu/cpu0/cpufreq/scaling_governor")
            .into()
    }

    async fn scheduler(&self) -> Live<String> {
        let rel = format!("sys/block/{}/queue/scheduler", self.block_device);
        self.read_line(&rel)
            .as_deref()
            .and_then(parse_active_scheduler)
            .into()
    }

    async fn congestion_control(&self) -> Live<String> {
        self.read_line("proc/sys/net/ipv4/tcp_congestion_control")
            .into()
    }

    async fn compcache(&self) -> Live<CompcacheState> {
        if let Ok(contents) = fs::read_to_string(self.path("proc/ramzswap")) {
            return Live::Value(match parse_ramzswap_mem_limit(&contents) {
                Some(mem_limit_kb) => CompcacheState::Enabled { mem_limit_kb },
                None => CompcacheState::Disabled,
            });
        }

        // zram exposes its size in bytes; 0 means configured but off
        if self.path("sys/block/zram0").exists() {
            return match self
                .read_line("sys/block/zram0/disksize")
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => Live::Value(CompcacheState::Disabled),
                Some(bytes) => Live::Value(CompcacheState::Enabled {
                    mem_limit_kb: bytes / 1024,
                }),
                None => Live::Unavailable,
            };
        }

        Live::Value(CompcacheState::Unsupported)
    }
}

/// Mock client with configurable values and an optional response gate
#[derive(Debug, Clone)]
pub struct MockLiveState {
    pub values: LiveSnapshot,
    gate: Option<Arc<Notify>>,
    requests: Arc<AtomicUsize>,
}

impl MockLiveState {
    pub fn new(values: LiveSnapshot) -> Self {
        Self {
            values,
            gate: None,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Typical supported device
    pub fn typical() -> Self {
        Self::new(LiveSnapshot {
            governor: Live::Value("ondemand".to_string()),
            compcache: Live::Value(CompcacheState::Enabled { mem_limit_kb: 16384 }),
            scheduler: Live::Value("cfq".to_string()),
            congestion: Live::Value("cubic".to_string()),
        })
    }

    /// Each snapshot waits for one `notify_one` on the returned gate
    pub fn gated(values: LiveSnapshot) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut mock = Self::new(values);
        mock.gate = Some(gate.clone());
        (mock, gate)
    }

    /// Number of snapshot requests served or pending
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl LiveStateClient for MockLiveState {
    async fn governor(&self) -> Live<String> {
        self.values.governor.clone()
    }

    async fn scheduler(&self) -> Live<String> {
        self.values.scheduler.clone()
    }

    async fn congestion_control(&self) -> Live<String> {
        self.values.congestion.clone()
    }

    async fn compcache(&self) -> Live<CompcacheState> {
        self.values.compcache.clone()
    }

    async fn snapshot(&self) -> LiveSnapshot {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.values.clone()
    }
}
