//! Workflow timing configuration.
//!
//! The delays stand in for AI latency in the demo product and are not business
//! rules, so every one of them is configurable. Resolution order: TOML file
//! (`DRAFTING_CONFIG_PATH`, else `drafting/config/workflow.toml` searched from
//! the current directory upwards, else the built-in example), then individual
//! environment overrides.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKFLOW_CONFIG_PATH: &str = "drafting/config/workflow.toml";
const BUILTIN_WORKFLOW_CONFIG_TOML: &str = include_str!("../config/workflow.example.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub task_title: String,
    /// Upload -> "analyzing" notice
    pub analysis_notice_delay_ms: u64,
    /// Upload -> assumptions presented
    pub analysis_duration_ms: u64,
    /// Last answer -> begin-drafting confirmation
    pub confirmation_delay_ms: u64,
    pub drafting_duration_ms: u64,
    pub document_generation_duration_ms: u64,
    pub tick_interval_ms: u64,
    /// How often the session actor polls for due timers
    pub poll_interval_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            task_title: shared_types::DEFAULT_TASK_TITLE.to_string(),
            analysis_notice_delay_ms: 500,
            analysis_duration_ms: 3_000,
            confirmation_delay_ms: 1_000,
            drafting_duration_ms: 30_000,
            document_generation_duration_ms: 30_000,
            tick_interval_ms: 1_000,
            poll_interval_ms: 100,
        }
    }
}

impl WorkflowConfig {
    /// Millisecond-scale timings for tests and the demo binary.
    pub fn accelerated() -> Self {
        Self {
            analysis_notice_delay_ms: 5,
            analysis_duration_ms: 30,
            confirmation_delay_ms: 10,
            drafting_duration_ms: 300,
            document_generation_duration_ms: 300,
            tick_interval_ms: 10,
            poll_interval_ms: 5,
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from file and environment. Never fails; bad input is logged and
    /// the built-in defaults are kept.
    pub fn load() -> Self {
        let path = std::env::var("DRAFTING_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| find_default_config_path(DEFAULT_WORKFLOW_CONFIG_PATH));

        let mut config = match path {
            Some(path) => Self::from_path(&path).unwrap_or_else(|err| {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to load workflow config; using built-in defaults"
                );
                built_in_config()
            }),
            None => {
                tracing::info!("No workflow config file found; using built-in defaults");
                built_in_config()
            }
        };

        if let Err(err) = config.apply_overrides(|key| std::env::var(key).ok()) {
            tracing::warn!(error = %err, "Ignoring invalid workflow config override");
        }
        config
    }

    /// Apply `DRAFTING_*` overrides from `lookup`. Stops at the first invalid
    /// value, leaving earlier overrides applied.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(title) = lookup("DRAFTING_TASK_TITLE").filter(|v| !v.trim().is_empty()) {
            self.task_title = title;
        }

        let numeric: [(&str, &mut u64); 7] = [
            (
                "DRAFTING_ANALYSIS_NOTICE_DELAY_MS",
                &mut self.analysis_notice_delay_ms,
            ),
            ("DRAFTING_ANALYSIS_DURATION_MS", &mut self.analysis_duration_ms),
            ("DRAFTING_CONFIRMATION_DELAY_MS", &mut self.confirmation_delay_ms),
            ("DRAFTING_DURATION_MS", &mut self.drafting_duration_ms),
            (
                "DRAFTING_DOCUMENT_GENERATION_DURATION_MS",
                &mut self.document_generation_duration_ms,
            ),
            ("DRAFTING_TICK_INTERVAL_MS", &mut self.tick_interval_ms),
            ("DRAFTING_POLL_INTERVAL_MS", &mut self.poll_interval_ms),
        ];
        for (key, slot) in numeric {
            if let Some(raw) = lookup(key) {
                *slot = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidOverride {
                        key: key.to_string(),
                        value: raw.clone(),
                    })?;
            }
        }
        Ok(())
    }

    pub fn analysis_notice_delay(&self) -> Duration {
        millis(self.analysis_notice_delay_ms)
    }

    pub fn analysis_duration(&self) -> Duration {
        millis(self.analysis_duration_ms)
    }

    pub fn confirmation_delay(&self) -> Duration {
        millis(self.confirmation_delay_ms)
    }

    pub fn drafting_duration(&self) -> Duration {
        millis(self.drafting_duration_ms)
    }

    pub fn document_generation_duration(&self) -> Duration {
        millis(self.document_generation_duration_ms)
    }

    /// Tick period, never zero.
    pub fn tick_interval(&self) -> Duration {
        millis(self.tick_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

fn built_in_config() -> WorkflowConfig {
    WorkflowConfig::from_toml_str(BUILTIN_WORKFLOW_CONFIG_TOML).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to parse built-in workflow config");
        WorkflowConfig::default()
    })
}

fn find_default_config_path(relative_path: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_in_ancestors(&cwd, relative_path)
}

/// First existing file at `relative_path` under `start` or any of its
/// ancestors.
pub fn find_in_ancestors(start: &Path, relative_path: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(relative_path))
        .find(|candidate| candidate.is_file())
}

/// Load the nearest `.env` above the current directory into the process
/// environment. Returns the file that was loaded.
pub fn load_env_file() -> Option<PathBuf> {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            tracing::warn!(error = %err, "Cannot resolve current directory for .env lookup");
            return None;
        }
    };
    let Some(path) = find_in_ancestors(&cwd, ".env") else {
        tracing::info!(cwd = %cwd.display(), "No .env found; using process environment only");
        return None;
    };
    match dotenvy::from_path(&path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Loaded environment from .env");
            Some(path)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to load .env");
            None
        }
    }
}
