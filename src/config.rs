use serde::{Deserialize, Serialize};

use crate::error::{GradientError, Result};

/// Work-group sizing for device dispatches.
///
/// - `layer_group_size` — 1-D group used by the single-layer kernel
/// - `tile_group`       — 2-D (neuron × sample) group used by the training kernels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layer_group_size: usize,
    pub tile_group: [usize; 2],
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { layer_group_size: 32, tile_group: [8, 8] }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layer_group_size == 0 || self.tile_group.contains(&0) {
            return Err(GradientError::Config(format!(
                "work-group sizes must be non-zero, got layer_group_size={} tile_group={:?}",
                self.layer_group_size, self.tile_group
            )));
        }
        Ok(())
    }

    /// Deserializes and validates a config from a JSON file.
    pub fn load_json(path: &str) -> Result<EngineConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: EngineConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_device_granularity() {
        let config = EngineConfig::default();
        assert_eq!(config.layer_group_size, 32);
        assert_eq!(config.tile_group, [8, 8]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "tile_group": [16, 4] }}"#).unwrap();
        let config = EngineConfig::load_json(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config, EngineConfig { layer_group_size: 32, tile_group: [16, 4] });
    }

    #[test]
    fn zero_group_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "layer_group_size": 0 }}"#).unwrap();
        let err = EngineConfig::load_json(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, GradientError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load_json(file.path().to_str().unwrap()),
            Err(GradientError::Config(_))
        ));
    }
}
