//! Field accessors over a single dissector CSV record.
//!
//! Per-field parse failures are swallowed here (§7 `FieldParseError`): a bad
//! integer or malformed hex string degrades to the type's default rather
//! than aborting the row.

use std::collections::HashMap;

/// One decoded CSV row from a field-stream invocation: field name -> raw
/// textual value (possibly empty, never absent for a requested field).
#[derive(Debug, Clone, Default)]
pub struct FieldRow(pub HashMap<String, String>);

impl FieldRow {
    pub fn get_str<'a>(&'a self, field: &str) -> &'a str {
        self.0.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn get_u64(&self, field: &str) -> u64 {
        self.get_str(field).trim().parse().unwrap_or(0)
    }

    pub fn get_u16(&self, field: &str) -> u16 {
        self.get_str(field).trim().parse().unwrap_or(0)
    }

    pub fn get_f64(&self, field: &str) -> f64 {
        self.get_str(field).trim().parse().unwrap_or(0.0)
    }

    /// Decodes a tshark hex-bytes field, tolerating both `aa:bb:cc` and
    /// `aabbcc` forms. Returns an empty vec on any malformed input.
    pub fn get_hex_bytes(&self, field: &str) -> Vec<u8> {
        let raw = self.get_str(field).trim();
        if raw.is_empty() {
            return Vec::new();
        }
        if raw.contains(':') {
            raw.split(':')
                .map(|part| u8::from_str_radix(part, 16))
                .collect::<Result<Vec<u8>, _>>()
                .unwrap_or_default()
        } else {
            hex::decode(raw).unwrap_or_default()
        }
    }

    pub fn is_present(&self, field: &str) -> bool {
        !self.get_str(field).is_empty()
    }
}
