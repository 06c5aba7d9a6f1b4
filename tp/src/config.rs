//! TripPlan configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::plan::{DEFAULT_COLUMN_PENALTY, PlanLimits};
use crate::stream::DEFAULT_DONE_SENTINEL;

/// Main TripPlan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Plan generator backend
    pub generator: GeneratorConfig,

    /// Per-day item bounds
    pub plan: PlanConfig,

    /// Event-stream framing
    pub stream: StreamConfig,

    /// Place lookups after finalize
    pub enrichment: EnrichmentConfig,

    /// Drag and drop scoring
    pub reorder: ReorderConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let limits = self.plan.limits();
        if limits.min_items == 0 {
            return Err(eyre::eyre!("plan.min-items must be at least 1"));
        }
        if limits.min_items > limits.max_items {
            return Err(eyre::eyre!(
                "plan.min-items ({}) must not exceed plan.max-items ({})",
                limits.min_items,
                limits.max_items
            ));
        }
        if self.enrichment.enabled && self.enrichment.concurrency == 0 {
            return Err(eyre::eyre!("enrichment.concurrency must be at least 1"));
        }
        if self.stream.token_event == self.stream.final_event {
            return Err(eyre::eyre!(
                "stream.token-event and stream.final-event must differ (both are '{}')",
                self.stream.token_event
            ));
        }
        if !self.reorder.column_penalty.is_finite() || self.reorder.column_penalty < 0.0 {
            return Err(eyre::eyre!("reorder.column-penalty must be a non-negative number"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripplan.yml
        let local_config = PathBuf::from(".tripplan.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripplan/tripplan.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplan").join("tripplan.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".tripplan.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("tripplan").join("tripplan.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Plan generator backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Endpoint that accepts a plan request and answers with an event stream
    pub url: String,

    /// Environment variable holding an optional bearer token
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Connection attempts beyond the first
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/plan/stream".to_string(),
            api_key_env: "TRIPPLAN_API_KEY".to_string(),
            timeout_ms: 120_000,
            max_retries: 3,
        }
    }
}

impl GeneratorConfig {
    /// Bearer token from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }
}

/// Day-size bounds preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanMode {
    /// 3 to 5 items per day
    #[default]
    Strict,
    /// 3 to 7 items per day
    Legacy,
}

/// Per-day item bounds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub mode: PlanMode,

    /// Overrides the preset's minimum
    #[serde(rename = "min-items")]
    pub min_items: Option<usize>,

    /// Overrides the preset's maximum
    #[serde(rename = "max-items")]
    pub max_items: Option<usize>,
}

impl PlanConfig {
    pub fn limits(&self) -> PlanLimits {
        let preset = match self.mode {
            PlanMode::Strict => PlanLimits::STRICT,
            PlanMode::Legacy => PlanLimits::LEGACY,
        };
        PlanLimits {
            min_items: self.min_items.unwrap_or(preset.min_items),
            max_items: self.max_items.unwrap_or(preset.max_items),
        }
    }
}

/// Event-stream framing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Event name carrying text deltas
    #[serde(rename = "token-event")]
    pub token_event: String,

    /// Event name carrying the complete document
    #[serde(rename = "final-event")]
    pub final_event: String,

    /// Event name carrying a server-side error message
    #[serde(rename = "error-event")]
    pub error_event: String,

    /// Payload that marks the end of the stream; null disables it
    #[serde(rename = "done-sentinel")]
    pub done_sentinel: Option<String>,

    /// Decode an undelimited remainder at end of stream instead of dropping it
    #[serde(rename = "flush-trailing-frame")]
    pub flush_trailing_frame: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            token_event: "token".to_string(),
            final_event: "final".to_string(),
            error_event: "error".to_string(),
            done_sentinel: Some(DEFAULT_DONE_SENTINEL.to_string()),
            flush_trailing_frame: false,
        }
    }
}

/// Place lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,

    /// Lookup endpoint, queried with `?q=<title>&context=<destination>`
    pub url: String,

    /// Maximum lookups in flight
    pub concurrency: usize,

    /// Per-lookup timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:8080/api/places/lookup".to_string(),
            concurrency: 4,
            timeout_ms: 10_000,
        }
    }
}

/// Drag and drop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Score added to slots outside the pointer's column
    #[serde(rename = "column-penalty")]
    pub column_penalty: f64,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            column_penalty: DEFAULT_COLUMN_PENALTY,
        }
    }
}
