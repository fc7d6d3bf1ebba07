//! Field extraction
//!
//! A [`FieldSelection`] is compiled once from a [`FieldConfig`]: each
//! requested name is resolved against the static catalog for its kind, so
//! extracting a record walks only the enabled accessors and disabled fields
//! cost nothing. Unknown kinds and names are collected in a
//! [`ValidationReport`] and dropped.

pub mod catalog;
pub mod render;

pub use catalog::{catalog, FieldDef};
pub use render::{render_text, RenderField};

use crate::config::FieldConfig;
use crate::decoder::DecodedRecord;
use crate::records::RecordBody;
use crate::types::RecordKind;
use std::collections::BTreeMap;

/// A decoded record reduced to rendered fields plus a few typed values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// `None` for record types the decoder does not interpret
    pub kind: Option<RecordKind>,
    pub rec_typ: u8,
    pub rec_sub: u8,
    pub rec_len: u16,
    /// Enabled, present fields rendered as text
    pub fields: BTreeMap<&'static str, String>,

    // Hoisted values, filled for every kind that carries them
    pub test_num: Option<u32>,
    pub head_num: Option<u8>,
    pub site_num: Option<u8>,
    pub result: Option<f32>,
    pub test_txt: Option<String>,
    pub alarm_id: Option<String>,
    pub units: Option<String>,
}

impl Record {
    /// Rendered value of a field, if enabled and present
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Like [`field`](Self::field), but an empty value counts as missing
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.field(name).filter(|v| !v.is_empty())
    }
}

/// The enabled catalog entries for one record kind
#[derive(Debug, Clone)]
pub struct EnabledFieldSet {
    kind: RecordKind,
    fields: Vec<&'static FieldDef>,
}

impl EnabledFieldSet {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|def| def.name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, def: &'static FieldDef) {
        if !self.fields.iter().any(|d| d.name == def.name) {
            self.fields.push(def);
        }
    }
}

/// Problems found while compiling a field configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub unknown_kinds: Vec<String>,
    pub unknown_fields: Vec<(RecordKind, String)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.unknown_kinds.is_empty() && self.unknown_fields.is_empty()
    }

    /// Emit one warning per dropped entry
    pub fn log(&self) {
        for kind in &self.unknown_kinds {
            log::warn!("Field configuration names unknown record type {:?}; ignored", kind);
        }
        for (kind, field) in &self.unknown_fields {
            log::warn!("{} has no field {:?}; ignored", kind, field);
        }
    }
}

/// Enabled fields for every record kind
#[derive(Debug, Clone, Default)]
pub struct FieldSelection {
    sets: BTreeMap<RecordKind, EnabledFieldSet>,
}

impl FieldSelection {
    /// Resolve a configuration against the catalogs
    pub fn compile(config: &FieldConfig) -> (Self, ValidationReport) {
        let mut selection = Self::default();
        let mut report = ValidationReport::default();

        for (kind_name, names) in config.entries() {
            let Some(kind) = RecordKind::from_name(kind_name) else {
                report.unknown_kinds.push(kind_name.to_string());
                continue;
            };
            for name in names {
                if !selection.enable(kind, name) {
                    report.unknown_fields.push((kind, name.clone()));
                }
            }
        }

        (selection, report)
    }

    /// Enable one field; false if the kind has no such field
    pub fn enable(&mut self, kind: RecordKind, name: &str) -> bool {
        match catalog::find(kind, name) {
            Some(def) => {
                self.sets
                    .entry(kind)
                    .or_insert_with(|| EnabledFieldSet::new(kind))
                    .insert(def);
                true
            }
            None => false,
        }
    }

    /// Add a fixed set of fields known to exist in the catalogs
    pub fn union(&mut self, extra: &[(RecordKind, &[&str])]) {
        for (kind, names) in extra {
            for name in *names {
                if !self.enable(*kind, name) {
                    log::error!("{} has no field {:?}", kind, name);
                }
            }
        }
    }

    pub fn enabled(&self, kind: RecordKind) -> Option<&EnabledFieldSet> {
        self.sets.get(&kind)
    }

    pub fn is_enabled(&self, kind: RecordKind, name: &str) -> bool {
        self.enabled(kind)
            .is_some_and(|set| set.names().any(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Total enabled fields across all kinds
    pub fn field_count(&self) -> usize {
        self.sets.values().map(EnabledFieldSet::len).sum()
    }
}

/// Renders decoded records through a compiled selection
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    selection: FieldSelection,
}

impl FieldExtractor {
    pub fn new(selection: FieldSelection) -> Self {
        Self { selection }
    }

    /// Compile a configuration, logging anything that had to be dropped
    pub fn from_config(config: &FieldConfig) -> (Self, ValidationReport) {
        let (selection, report) = FieldSelection::compile(config);
        report.log();
        log::info!(
            "Field selection: {} fields across {} record types",
            selection.field_count(),
            selection.sets.len()
        );
        (Self::new(selection), report)
    }

    pub fn selection(&self) -> &FieldSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut FieldSelection {
        &mut self.selection
    }

    /// Render the enabled fields of one record
    pub fn extract(&self, decoded: &DecodedRecord) -> Record {
        let mut record = Record {
            kind: decoded.kind(),
            rec_typ: decoded.header.rec_typ,
            rec_sub: decoded.header.rec_sub,
            rec_len: decoded.header.rec_len,
            ..Record::default()
        };

        let Some(body) = &decoded.body else {
            return record;
        };

        hoist(body, &mut record);

        if let Some(set) = self.selection.enabled(body.kind()) {
            for def in &set.fields {
                if let Some(value) = (def.render)(body) {
                    record.fields.insert(def.name, value);
                }
            }
        }

        record
    }
}

fn text(value: &Option<crate::formats::RawText>) -> Option<String> {
    value.as_ref().map(render_text)
}

fn hoist(body: &RecordBody, record: &mut Record) {
    match body {
        RecordBody::Ptr(r) => {
            record.test_num = Some(r.test_num);
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
            record.result = Some(r.result);
            record.test_txt = text(&r.test_txt);
            record.alarm_id = text(&r.alarm_id);
            record.units = text(&r.units);
        }
        RecordBody::Mpr(r) => {
            record.test_num = Some(r.test_num);
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
            record.test_txt = text(&r.test_txt);
            record.alarm_id = text(&r.alarm_id);
            record.units = text(&r.units);
        }
        RecordBody::Ftr(r) => {
            record.test_num = Some(r.test_num);
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
            record.test_txt = text(&r.test_txt);
            record.alarm_id = text(&r.alarm_id);
        }
        RecordBody::Hbr(r) | RecordBody::Sbr(r) => {
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
        }
        RecordBody::Pir(r) => {
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
        }
        RecordBody::Prr(r) => {
            record.head_num = Some(r.head_num);
            record.site_num = Some(r.site_num);
        }
        RecordBody::Far(_) | RecordBody::Mir(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::RawText;
    use crate::records::Ptr;
    use crate::types::RecordHeader;

    fn ptr_record() -> DecodedRecord {
        let ptr = Ptr {
            test_num: 12,
            head_num: 1,
            site_num: 3,
            test_flg: 0,
            parm_flg: 0,
            result: 2.5,
            test_txt: Some(RawText::from_wire(4, b"IDDQ")),
            alarm_id: None,
            opt_flag: 0,
            res_scal: 0,
            llm_scal: 0,
            hlm_scal: 0,
            lo_limit: 0.0,
            hi_limit: 5.0,
            units: Some(RawText::from_wire(1, b"A")),
            c_resfmt: None,
            c_llmfmt: None,
            c_hlmfmt: None,
            lo_spec: 0.0,
            hi_spec: 0.0,
        };
        DecodedRecord {
            index: 0,
            offset: 0,
            header: RecordHeader { rec_len: 40, rec_typ: 15, rec_sub: 10 },
            body: Some(RecordBody::Ptr(Box::new(ptr))),
        }
    }

    #[test]
    fn test_compile_reports_unknown_entries() {
        let config = FieldConfig::new()
            .with_fields("PTR", &["RESULT", "BOGUS"])
            .with_fields("XYZ", &["A"]);
        let (selection, report) = FieldSelection::compile(&config);
        assert_eq!(report.unknown_kinds, vec!["XYZ".to_string()]);
        assert_eq!(report.unknown_fields, vec![(RecordKind::Ptr, "BOGUS".to_string())]);
        assert!(selection.is_enabled(RecordKind::Ptr, "RESULT"));
        assert_eq!(selection.field_count(), 1);
    }

    #[test]
    fn test_extract_only_enabled_fields() {
        let config = FieldConfig::new().with_fields("PTR", &["RESULT", "HI_LIMIT", "ALARM_ID"]);
        let (extractor, report) = FieldExtractor::from_config(&config);
        assert!(report.is_clean());

        let record = extractor.extract(&ptr_record());
        assert_eq!(record.kind, Some(RecordKind::Ptr));
        assert_eq!(record.field("RESULT"), Some("2.5"));
        assert_eq!(record.field("HI_LIMIT"), Some("5"));
        // enabled but absent
        assert_eq!(record.field("ALARM_ID"), None);
        // present but disabled
        assert_eq!(record.field("TEST_TXT"), None);
        assert_eq!(record.fields.len(), 2);
    }

    #[test]
    fn test_hoisted_fields_ignore_selection() {
        let extractor = FieldExtractor::default();
        let record = extractor.extract(&ptr_record());
        assert!(record.fields.is_empty());
        assert_eq!(record.test_num, Some(12));
        assert_eq!(record.site_num, Some(3));
        assert_eq!(record.result, Some(2.5));
        assert_eq!(record.test_txt.as_deref(), Some("IDDQ"));
        assert_eq!(record.units.as_deref(), Some("A"));
    }

    #[test]
    fn test_unknown_record_has_header_only() {
        let decoded = DecodedRecord {
            index: 5,
            offset: 100,
            header: RecordHeader { rec_len: 3, rec_typ: 50, rec_sub: 30 },
            body: None,
        };
        let record = FieldExtractor::default().extract(&decoded);
        assert_eq!(record.kind, None);
        assert_eq!((record.rec_typ, record.rec_sub, record.rec_len), (50, 30, 3));
        assert!(record.fields.is_empty());
    }
}
