//! Cross-product measurement generation
//!
//! Every part result (device) is combined with every test that passes the
//! coordinate filter, and every value of that test, into one
//! [`MeasurementTuple`]. Tests are prepared once up front; the per-device
//! loop only copies prepared data.

use crate::config::GeneratorConfig;
use crate::fields::Record;
use crate::ids::IdentifierManager;
use crate::types::{RecordKind, Result, StdfError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

/// Fields the generator reads from the field map
///
/// Unioned into every selection so a narrow user configuration cannot
/// starve generation.
pub const GENERATOR_FIELDS: &[(RecordKind, &[&str])] = &[
    (
        RecordKind::Mir,
        &[
            "FACIL_ID", "FLOOR_ID", "OPER_NAM", "SPEC_NAM", "LOT_ID", "PART_TYP", "NODE_NAM",
            "JOB_NAM", "JOB_REV", "SBLOT_ID", "START_T",
        ],
    ),
    (
        RecordKind::Prr,
        &["PART_ID", "PART_TXT", "SOFT_BIN", "HARD_BIN", "X_COORD", "Y_COORD"],
    ),
    (RecordKind::Ptr, &["RESULT", "TEST_FLG"]),
    (RecordKind::Mpr, &["RTN_RSLT", "TEST_FLG"]),
    (RecordKind::Ftr, &["TEST_FLG"]),
];

/// Lot metadata taken from the first MIR of a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LotContext {
    pub facility: String,
    pub operation: String,
    pub lot_name: String,
    pub equipment: String,
    pub program_name: String,
    pub program_version: String,
    /// `START_T`, seconds since the Unix epoch
    pub start_time: Option<u32>,
}

impl LotContext {
    /// Build from an extracted MIR, applying the field fallbacks
    pub fn from_mir(mir: &Record) -> Self {
        let pick = |primary: &str, fallback: Option<&str>| -> String {
            mir.non_empty(primary)
                .or_else(|| fallback.and_then(|f| mir.non_empty(f)))
                .unwrap_or_default()
                .to_string()
        };

        Self {
            facility: pick("FACIL_ID", Some("FLOOR_ID")),
            operation: pick("OPER_NAM", Some("SPEC_NAM")),
            lot_name: pick("LOT_ID", Some("PART_TYP")),
            equipment: pick("NODE_NAM", Some("JOB_NAM")),
            program_name: pick("JOB_REV", None),
            program_version: pick("SBLOT_ID", None),
            start_time: mir.field("START_T").and_then(|t| t.trim().parse().ok()),
        }
    }

    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        self.start_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::from(secs), 0))
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementTuple {
    pub device_id: u32,
    pub param_id: u32,
    pub x: i32,
    pub y: i32,
    pub value: f64,
    pub pass: bool,
    pub device_name: String,
    pub param_name: String,
    pub units: String,
    pub test_num: u32,
    /// Raw `TEST_FLG` byte of the test record
    pub test_flg: u8,
    /// Bin code text the pass flag was derived from
    pub bin_code: String,
    pub fingerprint: Arc<str>,
    #[serde(flatten)]
    pub lot: Arc<LotContext>,
}

/// Matches and strips `<key>=R<row>C<col>` annotations
#[derive(Debug, Clone)]
pub struct CoordinateTag {
    key: String,
    pattern: Regex,
    trailing: Regex,
    leading: Regex,
}

impl CoordinateTag {
    pub fn new(key: &str) -> Result<Self> {
        let escaped = regex::escape(key);
        let compile = |pattern: String| {
            Regex::new(&pattern)
                .map_err(|e| StdfError::InvalidConfig(format!("coordinate tag {:?}: {}", key, e)))
        };
        Ok(Self {
            key: key.to_string(),
            pattern: compile(format!(r"{}=R(\d+)C(\d+)", escaped))?,
            trailing: compile(format!(r";{}=R\d+C\d+", escaped))?,
            leading: compile(format!(r"^{}=R\d+C\d+;", escaped))?,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// `(x, y)` from the first tag in `text`: x is the column, y the row
    pub fn coordinates(&self, text: &str) -> Option<(i32, i32)> {
        let caps = self.pattern.captures(text)?;
        let row = caps.get(1)?.as_str().parse().ok()?;
        let col = caps.get(2)?.as_str().parse().ok()?;
        Some((col, row))
    }

    /// Remove the tag and its separator from a parameter name
    pub fn clean(&self, name: &str) -> String {
        let name = self.trailing.replace_all(name, "");
        self.leading.replace(&name, "").into_owned()
    }
}

/// Parse a comma separated value list
///
/// Tokens are trimmed and unparsable ones skipped. An input that yields no
/// value at all produces a single `0.0`.
pub fn parse_test_values(text: &str) -> Vec<f64> {
    let values: Vec<f64> = text
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse().ok())
        .collect();
    if values.is_empty() {
        vec![0.0]
    } else {
        values
    }
}

/// Counters from one generation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub tests_seen: u64,
    pub tests_matched: u64,
    pub devices: u64,
    pub measurements: u64,
}

/// A test reduced to what every device row needs
#[derive(Debug, Clone)]
struct PreparedTest {
    param_id: u32,
    param_name: String,
    units: String,
    test_num: u32,
    test_flg: u8,
    values: Vec<f64>,
    /// Tag coordinates, only when the filter is active
    position: Option<(i32, i32)>,
}

/// Per-device data shared by all of the device's rows
#[derive(Debug, Clone)]
struct Device {
    id: u32,
    name: String,
    bin_code: String,
    pass: bool,
    position: (i32, i32),
}

/// Expands part results and tests into measurement rows
#[derive(Debug, Clone)]
pub struct MeasurementGenerator {
    config: GeneratorConfig,
    tag: CoordinateTag,
}

impl MeasurementGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let tag = CoordinateTag::new(&config.tag_key)?;
        Ok(Self { config, tag })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn tag(&self) -> &CoordinateTag {
        &self.tag
    }

    /// Emit one row per device, filtered test and value
    ///
    /// `fingerprint` is only invoked when at least one row will be emitted.
    /// Fails only when an identifier namespace has no free id left.
    pub fn generate<F>(
        &self,
        parts: &[Record],
        tests: &[Record],
        lot: Arc<LotContext>,
        fingerprint: F,
        ids: &mut IdentifierManager,
    ) -> Result<(Vec<MeasurementTuple>, GenerationStats)>
    where
        F: FnOnce() -> Arc<str>,
    {
        let mut stats = GenerationStats {
            tests_seen: tests.len() as u64,
            ..GenerationStats::default()
        };

        let mut prepared = Vec::new();
        for test in tests {
            if let Some(test) = self.prepare_test(test, ids)? {
                prepared.push(test);
            }
        }
        stats.tests_matched = prepared.len() as u64;

        let devices = parts
            .iter()
            .map(|prr| self.prepare_device(prr, ids))
            .collect::<Result<Vec<_>>>()?;
        stats.devices = devices.len() as u64;

        let values_per_device: usize = prepared.iter().map(|t| t.values.len()).sum();
        let estimate = devices.len() * values_per_device;
        log::debug!(
            "Cross product: {} devices x {} tests ({} values) = {} rows",
            devices.len(),
            prepared.len(),
            values_per_device,
            estimate
        );
        if estimate == 0 {
            return Ok((Vec::new(), stats));
        }

        let fingerprint = fingerprint();
        let mut rows = Vec::with_capacity(estimate);
        for device in &devices {
            for test in &prepared {
                let (x, y) = test.position.unwrap_or(device.position);
                for &value in &test.values {
                    rows.push(MeasurementTuple {
                        device_id: device.id,
                        param_id: test.param_id,
                        x,
                        y,
                        value,
                        pass: device.pass,
                        device_name: device.name.clone(),
                        param_name: test.param_name.clone(),
                        units: test.units.clone(),
                        test_num: test.test_num,
                        test_flg: test.test_flg,
                        bin_code: device.bin_code.clone(),
                        fingerprint: Arc::clone(&fingerprint),
                        lot: Arc::clone(&lot),
                    });
                }
            }
        }
        stats.measurements = rows.len() as u64;
        Ok((rows, stats))
    }

    fn prepare_test(&self, test: &Record, ids: &mut IdentifierManager) -> Result<Option<PreparedTest>> {
        let annotation = test
            .alarm_id
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(test.test_txt.as_deref())
            .unwrap_or_default();

        let test_txt = test.test_txt.as_deref().unwrap_or_default();

        // Either text may carry the tag; the display annotation is tried first
        let position = if self.config.coordinate_filter {
            if !self.tag.matches(annotation) && !self.tag.matches(test_txt) {
                return Ok(None);
            }
            let coords = self
                .tag
                .coordinates(annotation)
                .or_else(|| self.tag.coordinates(test_txt));
            Some(coords.unwrap_or((0, 0)))
        } else {
            None
        };

        let param_name = self.tag.clean(annotation);
        let param_id = ids.get_param_id(&param_name)?;

        Ok(Some(PreparedTest {
            param_id,
            param_name,
            units: test.units.clone().unwrap_or_default(),
            test_num: test.test_num.unwrap_or_default(),
            test_flg: test
                .field("TEST_FLG")
                .and_then(|f| f.trim().parse().ok())
                .unwrap_or(0),
            values: parse_test_values(&value_text(test)),
            position,
        }))
    }

    fn prepare_device(&self, prr: &Record, ids: &mut IdentifierManager) -> Result<Device> {
        let name = prr
            .non_empty("PART_ID")
            .or_else(|| prr.field("PART_TXT"))
            .unwrap_or_default()
            .to_string();
        let bin_code = prr
            .non_empty("SOFT_BIN")
            .or_else(|| prr.field("HARD_BIN"))
            .unwrap_or_default()
            .to_string();
        let pass = bin_code.trim().parse::<i64>().map(|bin| bin == 1).unwrap_or(false);
        let coord = |name: &str| {
            prr.field(name)
                .and_then(|v| v.trim().parse::<i32>().ok())
                .unwrap_or(0)
        };
        let position = (coord("X_COORD"), coord("Y_COORD"));

        Ok(Device {
            id: ids.get_device_id(&name)?,
            name,
            bin_code,
            pass,
            position,
        })
    }
}

/// Value source of a test: result list, else scalar result text, else the
/// hoisted scalar
fn value_text(test: &Record) -> String {
    test.non_empty("RTN_RSLT")
        .or_else(|| test.non_empty("RESULT"))
        .map(str::to_string)
        .or_else(|| test.result.map(|r| r.to_string()))
        .unwrap_or_default()
}
