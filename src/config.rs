//! Vehicle configuration consumed by the decoder.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Name of the parameter that selects the SOC window of the updated BMU firmware.
pub const UPDATED_BMU_PARAM: &str = "updatedbmu";

/// Read access to named configuration parameters.
pub trait ConfigStore {
    /// Returns the boolean parameter `name`, or `default` when it is not set.
    fn get_bool_param(&self, name: &str, default: bool) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct BmsConfig {
    /// The BMU runs firmware with the 25..940 depth-of-discharge window.
    #[cfg_attr(feature = "serde", serde(default = "BmsConfig::default_updated_bmu"))]
    pub updated_bmu: bool,
}

impl BmsConfig {
    fn default_updated_bmu() -> bool {
        true
    }

    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(config_file_path: P) -> crate::error::Result<Self> {
        let path = config_file_path.as_ref();
        log::debug!("Loading config file from {path:?}");
        let config_file = std::fs::File::open(path)?;
        let config: Self = serde_yaml::from_reader(&config_file)?;
        Ok(config)
    }
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            updated_bmu: Self::default_updated_bmu(),
        }
    }
}

impl ConfigStore for BmsConfig {
    fn get_bool_param(&self, name: &str, default: bool) -> bool {
        match name {
            UPDATED_BMU_PARAM => self.updated_bmu,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updated_bmu_defaults_to_enabled() {
        let config = BmsConfig::default();
        assert!(config.get_bool_param(UPDATED_BMU_PARAM, false));
        assert!(!config.get_bool_param("unknown", false));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn parse_yaml() {
        let config: BmsConfig = serde_yaml::from_str("updated_bmu: false\n").unwrap();
        assert!(!config.updated_bmu);
        let config: BmsConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.updated_bmu);
    }
}
