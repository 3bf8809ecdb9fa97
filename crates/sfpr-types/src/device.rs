use std::fmt;

use serde::{Deserialize, Serialize};

/// The `(vendor, model, serial)` identity of a physical module.
///
/// Within one key the registry holds at most one live digest; two different
/// digests under the same key are a metadata conflict.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub vendor: String,
    pub model: String,
    pub serial: String,
}

impl DeviceKey {
    pub fn new(
        vendor: impl Into<String>,
        model: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            serial: serial.into(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.vendor, self.model, self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_fields() {
        let key = DeviceKey::new("CISCO-OEM", "SFP-H10GB-CU1M", "ABC123");
        assert_eq!(key.to_string(), "CISCO-OEM/SFP-H10GB-CU1M/ABC123");
    }

    #[test]
    fn keys_compare_exactly() {
        let a = DeviceKey::new("A", "B", "C");
        assert_eq!(a, DeviceKey::new("A", "B", "C"));
        assert_ne!(a, DeviceKey::new("A", "B", "c"));
    }
}
