//! Decoder configuration types
//!
//! Field selection is loaded from JSON of the form
//! `{"PTR": {"fields": ["TEST_NUM", "RESULT"]}, ...}`. Names are validated
//! later, when the selection is compiled into a
//! [`FieldSelection`](crate::fields::FieldSelection).

use crate::types::{Result, StdfError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Enabled field names for one record kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Record-kind name to enabled field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldConfig {
    records: BTreeMap<String, RecordFields>,
}

impl FieldConfig {
    /// Create an empty selection (only hoisted fields are extracted)
    pub fn new() -> Self {
        Self::default()
    }

    /// The selection used when no configuration file is given
    pub fn default_selection() -> Self {
        Self::new()
            .with_fields("PTR", &["TEST_NUM", "HEAD_NUM", "SITE_NUM", "TEST_FLG", "PARM_FLG", "RESULT"])
            .with_fields("MPR", &["TEST_NUM", "HEAD_NUM", "SITE_NUM", "TEST_FLG", "RTN_ICNT", "RSLT_CNT"])
            .with_fields("FTR", &["TEST_NUM", "HEAD_NUM", "SITE_NUM", "TEST_FLG", "CYCL_CNT", "NUM_FAIL"])
            .with_fields("HBR", &["HEAD_NUM", "SITE_NUM", "HBIN_NUM", "HBIN_CNT", "HBIN_PF"])
            .with_fields("SBR", &["HEAD_NUM", "SITE_NUM", "SBIN_NUM", "SBIN_CNT", "SBIN_PF"])
            .with_fields("PRR", &["HEAD_NUM", "SITE_NUM", "PART_FLG", "NUM_TEST", "HARD_BIN", "SOFT_BIN"])
    }

    /// Parse a JSON field configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON field configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("Loading field configuration: {:?}", path);
        let text = std::fs::read_to_string(path).map_err(|source| StdfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        if config.records.is_empty() {
            return Err(StdfError::InvalidConfig(format!(
                "{:?} enables no record kinds",
                path
            )));
        }
        Ok(config)
    }

    /// Builder method: enable fields for a record kind
    pub fn with_fields(mut self, kind: &str, fields: &[&str]) -> Self {
        for field in fields {
            self.enable(kind, field);
        }
        self
    }

    /// Enable one field, ignoring duplicates
    pub fn enable(&mut self, kind: &str, field: &str) {
        let entry = self.records.entry(kind.to_string()).or_default();
        if !entry.fields.iter().any(|f| f == field) {
            entry.fields.push(field.to_string());
        }
    }

    /// Configured kinds with their field names
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.records
            .iter()
            .map(|(kind, record)| (kind.as_str(), record.fields.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Options for the measurement generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Key of the coordinate tag, as in `Pixel=R12C34`
    #[serde(default = "default_tag_key")]
    pub tag_key: String,

    /// Only emit tests whose annotation carries the coordinate tag
    #[serde(default = "default_true")]
    pub coordinate_filter: bool,

    /// Externally supplied file fingerprint; computed from the file when unset
    #[serde(default)]
    pub fingerprint: Option<String>,
}

fn default_tag_key() -> String {
    "Pixel".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tag_key: default_tag_key(),
            coordinate_filter: true,
            fingerprint: None,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the coordinate tag key
    pub fn with_tag_key(mut self, key: impl Into<String>) -> Self {
        self.tag_key = key.into();
        self
    }

    /// Builder method: enable or disable the coordinate filter
    pub fn with_coordinate_filter(mut self, enabled: bool) -> Self {
        self.coordinate_filter = enabled;
        self
    }

    /// Builder method: use a fixed fingerprint instead of hashing the file
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_config_from_json() {
        let json = r#"{"PTR": {"fields": ["TEST_NUM", "RESULT"]}, "PRR": {"fields": []}}"#;
        let config = FieldConfig::from_json_str(json).unwrap();
        let entries: Vec<_> = config.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, "PTR");
        assert_eq!(entries[1].1, ["TEST_NUM".to_string(), "RESULT".to_string()]);
    }

    #[test]
    fn test_field_config_builder_dedups() {
        let config = FieldConfig::new()
            .with_fields("PTR", &["RESULT", "RESULT"])
            .with_fields("PTR", &["UNITS"]);
        let (_, fields) = config.entries().next().unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_default_selection_covers_common_kinds() {
        let config = FieldConfig::default_selection();
        let kinds: Vec<_> = config.entries().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, ["FTR", "HBR", "MPR", "PRR", "PTR", "SBR"]);
    }

    #[test]
    fn test_generator_config_defaults() {
        let config: GeneratorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.tag_key, "Pixel");
        assert!(config.coordinate_filter);

        let config = GeneratorConfig::new()
            .with_tag_key("Die")
            .with_coordinate_filter(false)
            .with_fingerprint("abc");
        assert_eq!(config.fingerprint.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            FieldConfig::from_json_str("{\"PTR\": 3}"),
            Err(StdfError::Json(_))
        ));
    }
}
