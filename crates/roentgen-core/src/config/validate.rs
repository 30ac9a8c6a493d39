//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::labels::is_finding_label;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.inference.threshold) {
            return Err(ConfigError::ValidationError(
                "inference.threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.inference.no_finding_label.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.no_finding_label must not be empty".into(),
            ));
        }
        // The sentinel must stay distinguishable from a genuine finding.
        if is_finding_label(&self.inference.no_finding_label) {
            return Err(ConfigError::ValidationError(
                "inference.no_finding_label must not be a finding name".into(),
            ));
        }
        if self.model.checkpoint_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "model.checkpoint_path must not be empty".into(),
            ));
        }
        let device = self.model.device.to_lowercase();
        let valid_device = matches!(device.as_str(), "auto" | "cpu" | "cuda" | "gpu")
            || device
                .strip_prefix("cuda:")
                .is_some_and(|n| n.parse::<usize>().is_ok());
        if !valid_device {
            return Err(ConfigError::ValidationError(format!(
                "model.device '{}' is not one of auto, cpu, cuda, cuda:N",
                self.model.device
            )));
        }
        Ok(())
    }
}
