//! Pipeline execution configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Largest accepted `map_window_per_worker`
pub const MAX_MAP_WINDOW_PER_WORKER: usize = 256;

/// Largest accepted `max_parallelism`
pub const MAX_PARALLELISM: usize = 512;

/// Configuration applied when an iterator builds its stage cursors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// In-flight records allowed per parallel map worker
    pub map_window_per_worker: usize,

    /// Worker count used for autotuned parallel maps
    pub autotune_parallelism: usize,

    /// Upper bound on parallel map workers
    pub max_parallelism: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            map_window_per_worker: 2,
            autotune_parallelism: num_cpus::get(),
            max_parallelism: 64,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON; absent keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.display(), ?config, "loaded pipeline config");
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_MAP_WINDOW_PER_WORKER).contains(&self.map_window_per_worker) {
            return Err(Error::Config(format!(
                "map_window_per_worker must be between 1 and {MAX_MAP_WINDOW_PER_WORKER}"
            )));
        }
        if self.autotune_parallelism == 0 {
            return Err(Error::Config("autotune_parallelism must be at least 1".into()));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.max_parallelism) {
            return Err(Error::Config(format!("max_parallelism must be between 1 and {MAX_PARALLELISM}")));
        }
        Ok(())
    }

    /// In-flight record window for a parallel map with `workers` workers
    pub fn map_window(&self, workers: usize) -> Result<usize> {
        workers
            .checked_mul(self.map_window_per_worker)
            .ok_or_else(|| Error::Config(format!("map window for {workers} workers overflows")))
    }

    /// Clamp a requested worker count to the configured maximum
    pub fn clamp_parallelism(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_parallelism)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(r#"{"map_window_per_worker": 4}"#).unwrap();
        assert_eq!(config.map_window_per_worker, 4);
        assert_eq!(config.max_parallelism, 64);
    }

    #[test]
    fn zero_values_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"max_parallelism": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn oversized_window_and_parallelism_rejected() {
        let config = PipelineConfig {
            map_window_per_worker: usize::MAX / 2,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = PipelineConfig {
            max_parallelism: MAX_PARALLELISM + 1,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn map_window_overflow_is_config_error() {
        let config = PipelineConfig {
            map_window_per_worker: usize::MAX / 2,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.map_window(4), Err(Error::Config(_))));
        assert_eq!(PipelineConfig::default().map_window(4).unwrap(), 8);
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(PipelineConfig::from_json_str("{"), Err(Error::Config(_))));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"autotune_parallelism": 3}}"#).unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.autotune_parallelism, 3);
    }

    #[test]
    fn clamps_parallelism() {
        let config = PipelineConfig {
            max_parallelism: 8,
            ..PipelineConfig::default()
        };
        assert_eq!(config.clamp_parallelism(100), 8);
        assert_eq!(config.clamp_parallelism(0), 1);
    }
}
