//! Worker and ingest configuration
//!
//! Loaded from defaults, a TOML file, or environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | DEDUP_LOG_PATH | `<temp_dir>/numbers.log` | Durable log file |
//! | DEDUP_MAX_VALUE | 999999999 | Inclusive upper bound of the value domain |
//! | DEDUP_INDEX | bitset | Membership index: bitset or hashed |
//! | DEDUP_REPORT_INTERVAL_MS | 10000 | Statistics report period |
//! | DEDUP_INPUT_CAPACITY | 1024 | Bounded input channel capacity |
//! | DEDUP_BIND_ADDR | 0.0.0.0:4000 | Line ingest listen address |
//! | DEDUP_MAX_CLIENTS | 5 | Concurrent ingest clients |

use crate::membership::{IndexKind, DEFAULT_MAX_VALUE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOG_FILE: &str = "numbers.log";
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_INPUT_CAPACITY: usize = 1024;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";
pub const DEFAULT_MAX_CLIENTS: usize = 5;
pub const DEFAULT_DIGITS: usize = 9;

/// Explicit limits
const INPUT_CAPACITY_MAX: usize = 1 << 20;
const MAX_CLIENTS_MAX: usize = 1024;

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "could not read config '{}': {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "invalid config file: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Configuration for the dedup worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Durable log path (truncated at start)
    pub log_path: PathBuf,
    /// Inclusive upper bound of accepted values
    pub max_value: u64,
    /// Membership index implementation
    pub index: IndexKind,
    /// Period between statistics reports
    #[serde(with = "duration_millis")]
    pub report_interval: Duration,
    /// Capacity of the bounded input channel
    pub input_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            log_path: std::env::temp_dir().join(DEFAULT_LOG_FILE),
            max_value: DEFAULT_MAX_VALUE,
            index: IndexKind::Bitset,
            report_interval: DEFAULT_REPORT_INTERVAL,
            input_capacity: DEFAULT_INPUT_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Configuration for tests: log under `dir`, small domain, fast reports
    pub fn test(dir: &Path) -> Self {
        WorkerConfig {
            log_path: dir.join(DEFAULT_LOG_FILE),
            max_value: 1_000_000,
            index: IndexKind::Bitset,
            report_interval: Duration::from_millis(50),
            input_capacity: 64,
        }
    }

    /// Defaults overridden by `DEDUP_*` environment variables
    pub fn from_env() -> Self {
        let defaults = WorkerConfig::default();
        WorkerConfig {
            log_path: std::env::var("DEDUP_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
            max_value: env_parse("DEDUP_MAX_VALUE").unwrap_or(defaults.max_value),
            index: std::env::var("DEDUP_INDEX")
                .ok()
                .and_then(|s| IndexKind::parse(&s))
                .unwrap_or(defaults.index),
            report_interval: env_parse("DEDUP_REPORT_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.report_interval),
            input_capacity: env_parse("DEDUP_INPUT_CAPACITY")
                .unwrap_or(defaults.input_capacity)
                .min(INPUT_CAPACITY_MAX),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: WorkerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_interval.is_zero() {
            return Err(ConfigError::Invalid("report_interval must be non-zero".into()));
        }
        if self.input_capacity == 0 || self.input_capacity > INPUT_CAPACITY_MAX {
            return Err(ConfigError::Invalid(format!(
                "input_capacity must be in [1, {}], got {}",
                INPUT_CAPACITY_MAX, self.input_capacity
            )));
        }
        if self.max_value >= i64::MAX as u64 {
            return Err(ConfigError::Invalid(format!(
                "max_value must be below {}, got {}",
                i64::MAX,
                self.max_value
            )));
        }
        Ok(())
    }
}

/// Configuration for the line ingest server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub bind_addr: String,
    /// Clients served at once; further connections are closed
    pub max_clients: usize,
    /// Exact number of digits in a value line
    pub digits: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let defaults = IngestConfig::default();
        IngestConfig {
            bind_addr: std::env::var("DEDUP_BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_clients: env_parse("DEDUP_MAX_CLIENTS")
                .unwrap_or(defaults.max_clients)
                .clamp(1, MAX_CLIENTS_MAX),
            digits: defaults.digits,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
