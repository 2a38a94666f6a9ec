//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for server, storage, limits, retention, workers, and the
//! sweeper. Every section defaults sensibly so a completely empty `{}` file
//! is valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::task::TaskType;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub retention: RetentionConfig,
    pub worker: WorkerConfig,
    pub sweep: SweepConfig,
    pub convert: ConvertConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.limits.free_file_size_mb > self.limits.max_file_size_mb {
            warnings.push(format!(
                "limits.free_file_size_mb ({}) exceeds limits.max_file_size_mb ({}); \
                 the payment gate will never trigger",
                self.limits.free_file_size_mb, self.limits.max_file_size_mb
            ));
        }

        if self.retention.paid_hours < self.retention.free_hours {
            warnings.push("retention.paid_hours is shorter than retention.free_hours".into());
        }

        if self.worker.hard_timeout_mins <= self.worker.soft_timeout_mins {
            warnings.push(format!(
                "worker.hard_timeout_mins ({}) should exceed worker.soft_timeout_mins ({})",
                self.worker.hard_timeout_mins, self.worker.soft_timeout_mins
            ));
        }

        if self.worker.count == 0 {
            warnings.push("worker.count is 0; no tasks will be processed".into());
        }

        if self.storage.secret.is_empty() {
            warnings.push(
                "storage.secret is empty; a random signing secret will be generated at startup \
                 and signed URLs will not survive a restart"
                    .into(),
            );
        }

        for tt in TaskType::all() {
            if !self.convert.commands.contains_key(&tt) {
                warnings.push(format!(
                    "convert.commands has no entry for '{tt}'; such tasks will fail"
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            db_path: PathBuf::from("/data/pdfshift.db"),
        }
    }
}

/// Object-store settings (local filesystem backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored objects.
    pub base_path: PathBuf,
    /// HMAC secret for signed upload/download URLs.
    pub secret: String,
    /// Lifetime of issued signed URLs, in seconds.
    pub url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/data/storage"),
            secret: String::new(),
            url_ttl_secs: 30 * 60,
        }
    }
}

/// File size limits in megabytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Absolute maximum accepted file size.
    pub max_file_size_mb: u64,
    /// Above this size a confirmed payment is required.
    pub free_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 500,
            free_file_size_mb: 50,
        }
    }
}

/// Retention windows for task results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub free_hours: i64,
    pub paid_hours: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            free_hours: 1,
            paid_hours: 24,
        }
    }
}

impl RetentionConfig {
    /// The retention window for a task. Fixed at task creation and never
    /// recomputed afterwards.
    pub fn window(&self, is_paid: bool) -> chrono::Duration {
        if is_paid {
            chrono::Duration::hours(self.paid_hours)
        } else {
            chrono::Duration::hours(self.free_hours)
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent workers pulling from the dispatch queue.
    pub count: usize,
    /// Elapsed-time threshold after which a completed conversion is logged
    /// as slow.
    pub soft_timeout_mins: u64,
    /// Hard ceiling after which an in-flight conversion is aborted and the
    /// task fails with a timeout error.
    pub hard_timeout_mins: u64,
    /// Retry budget for transient storage/database faults.
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 2,
            soft_timeout_mins: 25,
            hard_timeout_mins: 30,
            max_retries: 3,
        }
    }
}

/// Retention sweeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Interval between sweep runs, in minutes.
    pub interval_mins: u64,
    /// Pending/processing tasks older than this are considered stalled and
    /// swept (crashed-worker hardening).
    pub stall_hours: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_mins: 10,
            stall_hours: 2,
        }
    }
}

/// Per-type external conversion commands.
///
/// Each command is a template with `{input}` and `{output}` placeholders,
/// e.g. `"soffice --headless --convert-to docx {input} --outdir {output}"`.
/// A task type without a configured command fails with
/// `UnsupportedTaskType`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub commands: HashMap<TaskType, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_valid() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.limits.max_file_size_mb, 500);
        assert_eq!(config.limits.free_file_size_mb, 50);
        assert_eq!(config.retention.free_hours, 1);
        assert_eq!(config.retention.paid_hours, 24);
        assert_eq!(config.sweep.interval_mins, 10);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config =
            Config::from_json(r#"{"limits": {"free_file_size_mb": 10}}"#).unwrap();
        assert_eq!(config.limits.free_file_size_mb, 10);
        assert_eq!(config.limits.max_file_size_mb, 500);
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(Config::from_json("not json").is_err());
    }

    #[test]
    fn retention_window() {
        let retention = RetentionConfig::default();
        assert_eq!(retention.window(false), chrono::Duration::hours(1));
        assert_eq!(retention.window(true), chrono::Duration::hours(24));
    }

    #[test]
    fn validate_flags_inverted_limits() {
        let mut config = Config::default();
        config.limits.max_file_size_mb = 10;
        config.limits.free_file_size_mb = 50;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("payment gate")));
    }

    #[test]
    fn validate_flags_missing_commands() {
        let config = Config::default();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("pdf2word")));
    }

    #[test]
    fn load_or_default_missing_file() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(config.server.port, 8000);
    }
}
