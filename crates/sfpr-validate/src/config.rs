use serde::{Deserialize, Serialize};

/// Smallest accepted EEPROM image, in bytes.
pub const DEFAULT_MIN_SIZE: usize = 128;
/// Largest accepted EEPROM image, in bytes.
pub const DEFAULT_MAX_SIZE: usize = 512;

/// Configuration for the validation pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Inclusive lower bound on blob size.
    pub min_size: usize,
    /// Inclusive upper bound on blob size.
    pub max_size: usize,
    /// Maximum length of the `name` field.
    pub max_name_len: usize,
    /// Maximum length of `vendor`, `model` and `serial`.
    pub max_field_len: usize,
    /// Compare the SFF-8472 identity in the image against the metadata.
    pub check_eeprom_identity: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            max_name_len: 255,
            max_field_len: 100,
            check_eeprom_identity: true,
        }
    }
}

impl ValidatorConfig {
    /// Check the configuration for internal consistency.
    pub fn check(&self) -> Result<(), String> {
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            ));
        }
        if self.max_field_len == 0 || self.max_name_len == 0 {
            return Err("field length limits must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds() {
        let c = ValidatorConfig::default();
        assert_eq!(c.min_size, 128);
        assert_eq!(c.max_size, 512);
        assert!(c.check().is_ok());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let c = ValidatorConfig {
            min_size: 600,
            ..Default::default()
        };
        assert!(c.check().unwrap_err().contains("exceeds"));
    }

    #[test]
    fn partial_toml_style_input_keeps_defaults() {
        let c: ValidatorConfig = serde_json::from_str(r#"{"max_size": 640}"#).unwrap();
        assert_eq!(c.max_size, 640);
        assert_eq!(c.min_size, 128);
    }
}
