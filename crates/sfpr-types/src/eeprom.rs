//! Identity fields embedded in an SFF-8472 A0h EEPROM page.
//!
//! The page stores the vendor name at bytes 20..36, the vendor part number
//! at 40..56 and the serial number at 68..84, each as space-padded ASCII.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::device::DeviceKey;

const VENDOR: Range<usize> = 20..36;
const MODEL: Range<usize> = 40..56;
const SERIAL: Range<usize> = 68..84;

/// Shortest image that carries all three identity fields.
pub const MIN_IDENTITY_LEN: usize = 96;

/// Vendor, part number and serial read from an EEPROM image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EepromIdentity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
}

/// One identity field where the image disagrees with the declared metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: &'static str,
    pub embedded: String,
    pub declared: String,
}

impl EepromIdentity {
    /// Read the identity fields. Returns `None` for images shorter than
    /// [`MIN_IDENTITY_LEN`].
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_IDENTITY_LEN {
            return None;
        }
        Some(Self {
            vendor: ascii_field(&data[VENDOR]),
            model: ascii_field(&data[MODEL]),
            serial: ascii_field(&data[SERIAL]),
        })
    }

    /// Compare against declared metadata.
    ///
    /// Empty embedded fields are skipped. Comparison ignores ASCII case and
    /// surrounding whitespace.
    pub fn mismatches(&self, declared: &DeviceKey) -> Vec<FieldMismatch> {
        [
            ("vendor", &self.vendor, &declared.vendor),
            ("model", &self.model, &declared.model),
            ("serial", &self.serial, &declared.serial),
        ]
        .into_iter()
        .filter(|(_, embedded, declared)| {
            !embedded.is_empty() && !embedded.eq_ignore_ascii_case(declared.trim())
        })
        .map(|(field, embedded, declared)| FieldMismatch {
            field,
            embedded: embedded.clone(),
            declared: declared.clone(),
        })
        .collect()
    }
}

/// Returns `true` if every byte is 0x00 or every byte is 0xFF.
pub fn is_blank_image(data: &[u8]) -> bool {
    !data.is_empty() && (data.iter().all(|&b| b == 0x00) || data.iter().all(|&b| b == 0xFF))
}

fn ascii_field(bytes: &[u8]) -> String {
    let text: String = bytes
        .iter()
        .filter(|&&b| b.is_ascii_graphic() || b == b' ')
        .map(|&b| b as char)
        .collect();
    text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(vendor: &[u8], model: &[u8], serial: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 256];
        data[20..20 + vendor.len()].copy_from_slice(vendor);
        data[40..40 + model.len()].copy_from_slice(model);
        data[68..68 + serial.len()].copy_from_slice(serial);
        data
    }

    #[test]
    fn parses_padded_fields() {
        let data = image(b"CISCO-OEM       ", b"SFP-H10GB-CU1M  ", b"ABC123          ");
        let id = EepromIdentity::parse(&data).unwrap();
        assert_eq!(id.vendor, "CISCO-OEM");
        assert_eq!(id.model, "SFP-H10GB-CU1M");
        assert_eq!(id.serial, "ABC123");
    }

    #[test]
    fn short_image_has_no_identity() {
        assert!(EepromIdentity::parse(&[0u8; 95]).is_none());
        assert!(EepromIdentity::parse(&[0u8; 96]).is_some());
    }

    #[test]
    fn zeroed_fields_are_empty() {
        let id = EepromIdentity::parse(&[0u8; 128]).unwrap();
        assert!(id.vendor.is_empty());
        assert!(id.model.is_empty());
        assert!(id.serial.is_empty());
    }

    #[test]
    fn control_bytes_are_dropped() {
        let id = EepromIdentity::parse(&[0x11u8; 128]).unwrap();
        assert!(id.vendor.is_empty());
    }

    #[test]
    fn non_ascii_bytes_are_dropped() {
        let data = image(&[0xFF; 16], b"M", b"S");
        let id = EepromIdentity::parse(&data).unwrap();
        assert!(id.vendor.is_empty());
    }

    #[test]
    fn mismatch_is_case_insensitive() {
        let data = image(b"cisco-oem", b"SFP-H10GB-CU1M", b"XYZ");
        let id = EepromIdentity::parse(&data).unwrap();
        let declared = DeviceKey::new("CISCO-OEM", "SFP-H10GB-CU1M", "ABC123");
        let mismatches = id.mismatches(&declared);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "serial");
        assert_eq!(mismatches[0].embedded, "XYZ");
    }

    #[test]
    fn empty_embedded_fields_never_mismatch() {
        let id = EepromIdentity::parse(&[0u8; 128]).unwrap();
        assert!(id.mismatches(&DeviceKey::new("A", "B", "C")).is_empty());
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank_image(&[0u8; 128]));
        assert!(is_blank_image(&[0xFF; 128]));
        let mut mixed = vec![0u8; 128];
        mixed[3] = 1;
        assert!(!is_blank_image(&mixed));
        assert!(!is_blank_image(&[]));
    }
}
