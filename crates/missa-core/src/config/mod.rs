//! Configuration system for missa.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MissaError, MissaResult};

/// How the importer treats the monthly Personal limit for backdated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportQuotaPolicy {
    /// Reject rows that would exceed the limit, like live recording does.
    Enforce,
    /// Accept them, flag the events and list them in the import report.
    #[default]
    Relax,
}

impl FromStr for ImportQuotaPolicy {
    type Err = MissaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "relax" => Ok(Self::Relax),
            other => Err(MissaError::Configuration(format!(
                "unknown import quota policy '{}', expected 'enforce' or 'relax'",
                other
            ))),
        }
    }
}

/// Engine configuration, shared by every holder's engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding one SQLite database per holder.
    pub data_dir: PathBuf,
    /// Days between celebrations assumed when a Bulk intention has too little history.
    pub default_pace_days: f64,
    /// Maximum Personal celebrations per calendar month.
    pub personal_monthly_limit: u32,
    /// Monthly limit handling for historical imports.
    pub import_quota_policy: ImportQuotaPolicy,
    /// Pause active Bulk intentions when a Personal or Fixed-Date mass is celebrated.
    pub pause_bulk_on_priority_celebration: bool,
    /// Remaining count at or below which a Bulk intention raises a near-completion alert.
    pub near_completion_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let missa_dir = dirs::home_dir()
            .map(|h| h.join(".missa"))
            .unwrap_or_else(|| PathBuf::from(".missa"));

        Self {
            data_dir: missa_dir.join("holders"),
            default_pace_days: 1.0,
            personal_monthly_limit: 3,
            import_quota_policy: ImportQuotaPolicy::Relax,
            pause_bulk_on_priority_celebration: false,
            near_completion_threshold: 10,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> MissaResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| MissaError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| MissaError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| MissaError::Configuration(e.to_string()))?,
            _ => {
                return Err(MissaError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> MissaResult<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MISSA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(pace) = std::env::var("MISSA_DEFAULT_PACE_DAYS") {
            config.default_pace_days = pace.parse().map_err(|_| {
                MissaError::Configuration(format!("MISSA_DEFAULT_PACE_DAYS '{}' is not a number", pace))
            })?;
        }
        if let Ok(limit) = std::env::var("MISSA_PERSONAL_MONTHLY_LIMIT") {
            config.personal_monthly_limit = limit.parse().map_err(|_| {
                MissaError::Configuration(format!(
                    "MISSA_PERSONAL_MONTHLY_LIMIT '{}' is not a number",
                    limit
                ))
            })?;
        }
        if let Ok(policy) = std::env::var("MISSA_IMPORT_QUOTA_POLICY") {
            config.import_quota_policy = policy.parse()?;
        }
        if let Ok(flag) = std::env::var("MISSA_PAUSE_BULK_ON_PRIORITY") {
            config.pause_bulk_on_priority_celebration =
                matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(threshold) = std::env::var("MISSA_NEAR_COMPLETION_THRESHOLD") {
            config.near_completion_threshold = threshold.parse().map_err(|_| {
                MissaError::Configuration(format!(
                    "MISSA_NEAR_COMPLETION_THRESHOLD '{}' is not a number",
                    threshold
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> MissaResult<()> {
        if !(self.default_pace_days.is_finite() && self.default_pace_days > 0.0) {
            return Err(MissaError::Configuration(format!(
                "default_pace_days must be positive, got {}",
                self.default_pace_days
            )));
        }
        if self.personal_monthly_limit == 0 {
            return Err(MissaError::Configuration(
                "personal_monthly_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the per-holder database directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the fallback pace in days.
    pub fn default_pace_days(mut self, days: f64) -> Self {
        self.config.default_pace_days = days;
        self
    }

    /// Set the monthly Personal limit.
    pub fn personal_monthly_limit(mut self, limit: u32) -> Self {
        self.config.personal_monthly_limit = limit;
        self
    }

    /// Set the import quota policy.
    pub fn import_quota_policy(mut self, policy: ImportQuotaPolicy) -> Self {
        self.config.import_quota_policy = policy;
        self
    }

    /// Pause Bulk intentions whenever a priority mass is celebrated.
    pub fn pause_bulk_on_priority_celebration(mut self, enabled: bool) -> Self {
        self.config.pause_bulk_on_priority_celebration = enabled;
        self
    }

    /// Set the near-completion alert threshold.
    pub fn near_completion_threshold(mut self, remaining: u32) -> Self {
        self.config.near_completion_threshold = remaining;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
