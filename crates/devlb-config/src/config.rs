//! Daemon configuration model
//!
//! The TOML file names the daemon's sockets and policy knobs, the
//! prediction-slot table, and the hardware queues. Queues may be omitted
//! entirely, in which case one exclusive queue is derived per slot (the
//! shape a bare hardware enumeration would produce).

use crate::{ConfigError, Result};
use devlb_sched::{AlwaysCpu, AlwaysGpu, DeviceKind, HwQueueConfig, Predictor, ScoreTable, SlotConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default fraction by which a substitute architecture may underperform
pub const DEFAULT_THRESHOLD: f32 = 0.2;

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// The equivalent tracing filter directive
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                message: format!("Invalid log level: {s}"),
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level to emit
    pub level: LogLevel,
}

/// One row of the static score table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Kernel identifier
    pub kernel: u32,
    /// One score per prediction slot, higher is better
    pub scores: Vec<f32>,
}

/// Which predictor scores incoming kernels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PredictorKind {
    /// Pin every kernel to CPU slots
    AlwaysCpu,
    /// Pin every kernel to GPU slots
    AlwaysGpu,
    /// Static per-kernel score table embedded in the config
    Table {
        /// Table rows, one per known kernel
        entries: Vec<TableEntry>,
    },
}

impl Default for PredictorKind {
    fn default() -> Self {
        Self::AlwaysCpu
    }
}

impl PredictorKind {
    /// Construct the configured predictor for the given slot classes
    pub fn build(&self, kinds: &[DeviceKind]) -> Result<Box<dyn Predictor>> {
        match self {
            Self::AlwaysCpu => Ok(Box::new(AlwaysCpu::new(kinds))),
            Self::AlwaysGpu => Ok(Box::new(AlwaysGpu::new(kinds))),
            Self::Table { entries } => {
                let rows = entries
                    .iter()
                    .map(|e| (e.kernel, e.scores.clone()));
                let table = ScoreTable::new(kinds.len(), rows)
                    .map_err(|e| ConfigError::Validation(e.to_string()))?;
                Ok(Box::new(table))
            }
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::AlwaysCpu => "always-cpu",
            Self::AlwaysGpu => "always-gpu",
            Self::Table { .. } => "table",
        }
    }
}

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on
    pub socket_path: PathBuf,
    /// PID file guarding against double starts
    pub pid_file: PathBuf,
    /// Acceptable fractional performance degradation for substitution
    pub threshold: f32,
    /// Predictor selection
    pub predictor: PredictorKind,
    /// Logging options
    pub log: LogConfig,
    /// Prediction-slot table, in predictor output order
    #[serde(rename = "slot")]
    pub slots: Vec<SlotConfig>,
    /// Hardware queues; derived from the slot table when empty
    #[serde(rename = "queue")]
    pub queues: Vec<HwQueueConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/devlb/devlb.sock"),
            pid_file: PathBuf::from("/run/devlb/devlb.pid"),
            threshold: DEFAULT_THRESHOLD,
            predictor: PredictorKind::default(),
            log: LogConfig::default(),
            slots: Vec::new(),
            queues: Vec::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&raw)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.fill_default_queues();
        Ok(config)
    }

    /// Derive one exclusive queue per slot when none are configured
    fn fill_default_queues(&mut self) {
        if !self.queues.is_empty() {
            return;
        }
        self.queues = self
            .slots
            .iter()
            .map(|slot| HwQueueConfig {
                platform: slot.platform,
                device: slot.device,
                compute_units: slot.compute_units,
                max_running: 1,
                kind: slot.kind,
                dynamic_partitioning: false,
            })
            .collect();
    }

    /// Apply `DEVLB_*` environment variable overrides
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DEVLB_SOCKET") {
            self.socket_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("DEVLB_PID_FILE") {
            self.pid_file = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var("DEVLB_THRESHOLD") {
            self.threshold = raw.parse().map_err(|_| {
                ConfigError::EnvVar(format!("DEVLB_THRESHOLD is not a number: {raw}"))
            })?;
        }
        if let Ok(raw) = std::env::var("DEVLB_LOG_LEVEL") {
            self.log.level = raw.parse()?;
        }
        Ok(())
    }
}
