//! File processing pipeline
//!
//! Decoding a file needs no identifier state, so [`decode_file`] and
//! [`decode_reader`] are free functions that can run on worker threads.
//! [`Processor`] owns everything mutable (identifiers, the compiled tag
//! matcher, statistics) and turns decoded files into measurement rows.

use crate::config::{FieldConfig, GeneratorConfig};
use crate::decoder::{DecodeStats, RecordDecoder};
use crate::fields::{FieldExtractor, Record, ValidationReport};
use crate::formats::{RecordSource, StdfReader};
use crate::ids::{IdentifierManager, Namespace};
use crate::measurements::{LotContext, MeasurementGenerator, MeasurementTuple, GENERATOR_FIELDS};
use crate::types::{RecordKind, Result};
use serde::{Serialize, Serializer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Render a 64-bit digest the way fingerprints are stored
fn format_digest(digest: u64) -> String {
    format!("{:016x}", digest)
}

/// xxh3 fingerprint of a byte string
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format_digest(xxh3_64(bytes))
}

/// xxh3 fingerprint of a whole file
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(fingerprint_bytes(&bytes))
}

/// Where a file's fingerprint comes from
#[derive(Debug, Clone)]
enum FingerprintSource {
    /// Already known (hashed while streaming, or supplied)
    Known(Arc<str>),
    /// Hash the file on first use
    File(PathBuf),
}

/// Hashes every byte read through it
struct HashingReader<R> {
    inner: R,
    hasher: Xxh3,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Records of one file sorted for generation
#[derive(Debug, Clone)]
pub struct DecodedFile {
    /// Display name of the input
    pub source: String,
    /// First MIR of the file
    pub mir: Option<Record>,
    /// Part results, in stream order
    pub parts: Vec<Record>,
    /// PTR, MPR and FTR records, in stream order
    pub tests: Vec<Record>,
    pub stats: DecodeStats,
    pub decode_time: Duration,
    fingerprint: FingerprintSource,
}

impl DecodedFile {
    /// Lot metadata, empty when the file had no MIR
    pub fn lot_context(&self) -> LotContext {
        self.mir.as_ref().map(LotContext::from_mir).unwrap_or_default()
    }

    /// File fingerprint, hashing the file now if needed
    pub fn fingerprint(&self) -> Arc<str> {
        match &self.fingerprint {
            FingerprintSource::Known(fp) => Arc::clone(fp),
            FingerprintSource::File(path) => match fingerprint_file(path) {
                Ok(fp) => Arc::from(fp),
                Err(e) => {
                    log::warn!("Could not fingerprint {:?}: {}", path, e);
                    Arc::from("")
                }
            },
        }
    }
}

/// Decode and extract every record of an STDF file
///
/// Only a failure to open the file is an error; corruption inside the
/// stream is logged and counted in [`DecodedFile::stats`].
pub fn decode_file(path: &Path, extractor: &FieldExtractor) -> Result<DecodedFile> {
    let reader = StdfReader::open(path)?;
    let source = path.display().to_string();
    let mut file = decode_source(reader, extractor, source);
    file.fingerprint = FingerprintSource::File(path.to_path_buf());
    Ok(file)
}

/// Decode and extract every record from an already open byte source
///
/// The fingerprint is hashed from the bytes as they stream past.
pub fn decode_reader<R: Read>(reader: R, extractor: &FieldExtractor) -> DecodedFile {
    let mut reader = StdfReader::new(HashingReader {
        inner: reader,
        hasher: Xxh3::new(),
    });
    let mut file = decode_source(&mut reader, extractor, "<stream>".to_string());
    let digest = reader.into_inner().hasher.digest();
    file.fingerprint = FingerprintSource::Known(Arc::from(format_digest(digest)));
    file
}

fn decode_source<S: RecordSource>(source: S, extractor: &FieldExtractor, name: String) -> DecodedFile {
    let start = Instant::now();
    let mut decoder = RecordDecoder::new(source);
    let mut mir: Option<Record> = None;
    let mut parts = Vec::new();
    let mut tests = Vec::new();

    for decoded in decoder.by_ref() {
        let Some(kind) = decoded.kind() else {
            continue;
        };
        match kind {
            RecordKind::Mir if mir.is_none() => mir = Some(extractor.extract(&decoded)),
            RecordKind::Mir => log::debug!("Ignoring extra MIR at record {}", decoded.index),
            RecordKind::Prr => parts.push(extractor.extract(&decoded)),
            kind if kind.is_test() => tests.push(extractor.extract(&decoded)),
            _ => {}
        }
    }

    let (source, stats) = decoder.into_parts();
    source.close();
    let decode_time = start.elapsed();
    log::info!(
        "Decoded {}: {} records ({} corrupt, {} unknown), {} parts, {} tests in {:?}",
        name,
        stats.records_seen,
        stats.corrupt_records,
        stats.unknown_records,
        parts.len(),
        tests.len(),
        decode_time
    );

    DecodedFile {
        source: name,
        mir,
        parts,
        tests,
        stats,
        decode_time,
        fingerprint: FingerprintSource::Known(Arc::from("")),
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Statistics of the last processed file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub records_seen: u64,
    pub records_parsed: u64,
    pub corrupt_records: u64,
    pub unknown_records: u64,
    pub tests_seen: u64,
    pub tests_matched: u64,
    pub devices: u64,
    pub measurements: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub decode_time: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub generation_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_error: Option<String>,
}

impl RunStats {
    /// Fold another file's statistics into a running total
    pub fn accumulate(&mut self, other: &RunStats) {
        self.records_seen += other.records_seen;
        self.records_parsed += other.records_parsed;
        self.corrupt_records += other.corrupt_records;
        self.unknown_records += other.unknown_records;
        self.tests_seen += other.tests_seen;
        self.tests_matched += other.tests_matched;
        self.devices += other.devices;
        self.measurements += other.measurements;
        self.decode_time += other.decode_time;
        self.generation_time += other.generation_time;
        if self.stream_error.is_none() {
            self.stream_error = other.stream_error.clone();
        }
    }
}

/// Owns the per-run state of the ingest pipeline
///
/// One processor handles one file at a time; it is not meant to be shared
/// between threads.
pub struct Processor {
    extractor: FieldExtractor,
    report: ValidationReport,
    ids: IdentifierManager,
    generator: MeasurementGenerator,
    stats: RunStats,
}

impl Processor {
    /// Compile the field selection and the coordinate tag matcher
    pub fn new(fields: &FieldConfig, config: GeneratorConfig) -> Result<Self> {
        let (mut extractor, report) = FieldExtractor::from_config(fields);
        extractor.selection_mut().union(GENERATOR_FIELDS);
        let generator = MeasurementGenerator::new(config)?;

        Ok(Self {
            extractor,
            report,
            ids: IdentifierManager::new(),
            generator,
            stats: RunStats::default(),
        })
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    /// Configuration problems found at construction
    pub fn validation_report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn ids(&self) -> &IdentifierManager {
        &self.ids
    }

    /// Load existing identifiers before processing
    pub fn preseed(&mut self, devices: Vec<(String, u32)>, params: Vec<(String, u32)>) {
        self.ids.bulk_preseed(Namespace::Device, devices);
        self.ids.bulk_preseed(Namespace::Parameter, params);
    }

    /// Decode and generate one file
    ///
    /// Failing to open the file or running out of identifiers are the only
    /// errors; statistics are reset and record the reason.
    pub fn process_file(&mut self, path: &Path) -> Result<Vec<MeasurementTuple>> {
        match decode_file(path, &self.extractor) {
            Ok(file) => self.generate(file),
            Err(e) => {
                log::error!("Cannot process {:?}: {}", path, e);
                self.stats = RunStats {
                    stream_error: Some(e.to_string()),
                    ..RunStats::default()
                };
                Err(e)
            }
        }
    }

    /// Decode and generate from a byte source
    ///
    /// A supplied fingerprint wins over the one computed from the stream.
    pub fn process_reader<R: Read>(
        &mut self,
        reader: R,
        fingerprint: Option<&str>,
    ) -> Result<Vec<MeasurementTuple>> {
        let mut file = decode_reader(reader, &self.extractor);
        if let Some(fp) = fingerprint {
            file.fingerprint = FingerprintSource::Known(Arc::from(fp));
        }
        self.generate(file)
    }

    /// Generate rows for an already decoded file
    pub fn generate(&mut self, file: DecodedFile) -> Result<Vec<MeasurementTuple>> {
        let start = Instant::now();
        let lot = Arc::new(file.lot_context());
        let supplied = self.generator.config().fingerprint.clone();

        let generated = self.generator.generate(
            &file.parts,
            &file.tests,
            lot,
            || match supplied {
                Some(fp) => Arc::from(fp),
                None => file.fingerprint(),
            },
            &mut self.ids,
        );
        let (rows, gen_stats) = match generated {
            Ok(generated) => generated,
            Err(e) => {
                log::error!("Cannot generate measurements for {}: {}", file.source, e);
                self.stats = RunStats {
                    stream_error: Some(e.to_string()),
                    ..RunStats::default()
                };
                return Err(e);
            }
        };
        let generation_time = start.elapsed();

        log::info!(
            "Generated {} measurements for {} ({} devices, {}/{} tests matched) in {:?}",
            gen_stats.measurements,
            file.source,
            gen_stats.devices,
            gen_stats.tests_matched,
            gen_stats.tests_seen,
            generation_time
        );

        self.stats = RunStats {
            records_seen: file.stats.records_seen,
            records_parsed: file.stats.records_decoded,
            corrupt_records: file.stats.corrupt_records,
            unknown_records: file.stats.unknown_records,
            tests_seen: gen_stats.tests_seen,
            tests_matched: gen_stats.tests_matched,
            devices: gen_stats.devices,
            measurements: gen_stats.measurements,
            decode_time: file.decode_time,
            generation_time,
            stream_error: file.stats.stream_error.clone(),
        };
        Ok(rows)
    }

    pub fn new_device_mappings(&self) -> Vec<(String, u32)> {
        self.ids.get_new_device_mappings()
    }

    pub fn new_param_mappings(&self) -> Vec<(String, u32)> {
        self.ids.get_new_param_mappings()
    }

    /// Statistics of the last processed file
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint_bytes(b"stdf");
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp, fingerprint_bytes(b"stdf"));
        assert_ne!(fp, fingerprint_bytes(b"stdF"));
    }

    #[test]
    fn test_open_failure_resets_stats() {
        let mut processor = Processor::new(&FieldConfig::default_selection(), GeneratorConfig::default()).unwrap();
        let result = processor.process_file(Path::new("does/not/exist.stdf"));
        assert!(result.is_err());
        assert_eq!(processor.stats().records_seen, 0);
        assert!(processor.stats().stream_error.is_some());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = RunStats::default();
        let one = RunStats {
            records_seen: 4,
            measurements: 10,
            decode_time: Duration::from_millis(5),
            ..RunStats::default()
        };
        total.accumulate(&one);
        total.accumulate(&one);
        assert_eq!(total.records_seen, 8);
        assert_eq!(total.measurements, 20);
        assert_eq!(total.decode_time, Duration::from_millis(10));
    }

    #[test]
    fn test_run_stats_serializes_seconds() {
        let stats = RunStats {
            decode_time: Duration::from_millis(1500),
            ..RunStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["decode_time"], 1.5);
        assert!(json.get("stream_error").is_none());
    }
}
