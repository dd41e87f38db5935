//! Executor settings, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::timing::DEFAULT_INDENT;

/// Configuration for the query executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Report evaluation timings when a search takes at least this many
    /// seconds. `None` disables timing unless a request asks for it.
    pub timing_threshold: Option<f64>,

    /// Spaces per nesting level in the timing report.
    pub timing_indent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timing_threshold: None,
            timing_indent: DEFAULT_INDENT,
        }
    }
}

impl ExecutorConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ExecutorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.timing_threshold {
            validate_threshold(threshold)?;
        }
        Ok(())
    }
}

/// Timing thresholds are a finite, non-negative number of seconds.
pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(QueryError::invalid_config(format!(
            "timing_threshold must be a non-negative number of seconds, got {threshold}"
        )));
    }
    Ok(())
}
