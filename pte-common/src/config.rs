//! Bootstrap configuration loading and root folder resolution
//!
//! Resolution priority for every value that supports it:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ENV_ROOT_FOLDER: &str = "PTE_ROOT_FOLDER";
/// Environment variable naming an explicit TOML config file
pub const ENV_CONFIG_PATH: &str = "PTE_CONFIG";
/// Environment variable carrying the oracle API key
pub const ENV_ORACLE_API_KEY: &str = "PTE_ORACLE_API_KEY";
/// Environment variable carrying the oracle endpoint URL
pub const ENV_ORACLE_ENDPOINT: &str = "PTE_ORACLE_ENDPOINT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "pte.db";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; missing values fall back to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit SQLite database path (overrides `<root_folder>/pte.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub credits: CreditConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// External assessment oracle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Assessment endpoint; no endpoint means heuristic-only scoring
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Upper bound on one oracle call
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: None,
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

/// Daily credit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditConfig {
    /// Allotment given to new ledgers; `-1` means unlimited
    #[serde(default = "default_daily_allotment")]
    pub default_daily_allotment: i64,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self { default_daily_allotment: default_daily_allotment() }
    }
}

/// Scoring pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,

    /// Attempts touched more recently than this are left to their current worker
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Stop sweeping an attempt after this many scoring passes (unset = no cap)
    #[serde(default)]
    pub max_scoring_attempts: Option<u32>,

    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Submissions allowed per user per rolling hour
    #[serde(default = "default_hourly_submission_limit")]
    pub hourly_submission_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_scoring_attempts: None,
            job_ttl_secs: default_job_ttl_secs(),
            event_capacity: default_event_capacity(),
            hourly_submission_limit: default_hourly_submission_limit(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    15_000
}

fn default_daily_allotment() -> i64 {
    4
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_sweep_batch_size() -> u32 {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_event_capacity() -> usize {
    1000
}

fn default_hourly_submission_limit() -> u32 {
    60
}

impl TomlConfig {
    /// Load and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.credits.default_daily_allotment < -1 {
            return Err(Error::Config(format!(
                "credits.default_daily_allotment must be -1 (unlimited) or >= 0, got {}",
                self.credits.default_daily_allotment
            )));
        }
        if self.pipeline.sweep_interval_secs == 0 {
            return Err(Error::Config("pipeline.sweep_interval_secs must be > 0".to_string()));
        }
        if self.pipeline.sweep_batch_size == 0 {
            return Err(Error::Config("pipeline.sweep_batch_size must be > 0".to_string()));
        }
        if self.pipeline.event_capacity == 0 {
            return Err(Error::Config("pipeline.event_capacity must be > 0".to_string()));
        }
        if self.oracle.timeout_ms == 0 {
            return Err(Error::Config("oracle.timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Load config from the resolved location, or defaults if no file exists
    ///
    /// An explicitly named file that cannot be read is an error; a missing
    /// default-location file is not.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                tracing::info!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply environment overrides for oracle settings
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_ORACLE_API_KEY) {
            if !key.trim().is_empty() {
                self.oracle.api_key = Some(key);
            }
        }
        if let Ok(endpoint) = std::env::var(ENV_ORACLE_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.oracle.endpoint = Some(endpoint);
            }
        }
    }

    /// Resolve the SQLite database path
    ///
    /// `database_path` wins; otherwise `<root_folder>/pte.db`.
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
    }
}

/// Root folder resolution following the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pte").join("pte-scoring.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pte"))
        .unwrap_or_else(|| PathBuf::from("./pte_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.pipeline.sweep_interval_secs, 300);
        assert_eq!(config.pipeline.sweep_batch_size, 10);
        assert_eq!(config.credits.default_daily_allotment, 4);
        assert_eq!(config.oracle.timeout_ms, 15_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = TomlConfig::parse(
            r#"
            port = 6000

            [pipeline]
            sweep_batch_size = 25
            max_scoring_attempts = 5

            [credits]
            default_daily_allotment = -1
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(6000));
        assert_eq!(config.pipeline.sweep_batch_size, 25);
        assert_eq!(config.pipeline.max_scoring_attempts, Some(5));
        assert_eq!(config.pipeline.sweep_interval_secs, 300);
        assert_eq!(config.credits.default_daily_allotment, -1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::parse("[credits]\ndefault_daily_allotment = -5").is_err());
        assert!(TomlConfig::parse("[pipeline]\nsweep_interval_secs = 0").is_err());
        assert!(TomlConfig::parse("[oracle]\ntimeout_ms = 0").is_err());
        assert!(TomlConfig::parse("port = \"not a number\"").is_err());
    }

    #[test]
    fn test_database_path_prefers_explicit_value() {
        let mut config = TomlConfig::default();
        assert_eq!(
            config.database_path(Path::new("/srv/pte")),
            PathBuf::from("/srv/pte/pte.db")
        );

        config.database_path = Some(PathBuf::from("/tmp/other.db"));
        assert_eq!(config.database_path(Path::new("/srv/pte")), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        assert_eq!(
            resolve_root_folder(Some(Path::new("/from/cli")), &config),
            PathBuf::from("/from/cli")
        );
    }
}
