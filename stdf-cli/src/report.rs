//! Run outputs
//!
//! Writes the measurement rows as JSON lines, the newly created identifier
//! mappings and the run statistics as JSON, and prints a short summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use stdf_decoder::{MeasurementTuple, RunStats};

pub const MEASUREMENTS_FILE: &str = "measurements.jsonl";
pub const NEW_DEVICES_FILE: &str = "new_devices.json";
pub const NEW_PARAMETERS_FILE: &str = "new_parameters.json";
pub const RUN_STATS_FILE: &str = "run_stats.json";

/// Streams measurement rows to a JSON lines file
pub struct MeasurementWriter {
    path: PathBuf,
    out: BufWriter<File>,
    rows: u64,
}

impl MeasurementWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            rows: 0,
        })
    }

    pub fn write_rows(&mut self, rows: &[MeasurementTuple]) -> Result<()> {
        for row in rows {
            serde_json::to_writer(&mut self.out, row)?;
            self.out.write_all(b"\n")?;
        }
        self.rows += rows.len() as u64;
        Ok(())
    }

    /// Flush and return the number of rows written
    pub fn finish(mut self) -> Result<u64> {
        self.out
            .flush()
            .with_context(|| format!("Failed to write {:?}", self.path))?;
        log::info!("Wrote {} measurements to {:?}", self.rows, self.path);
        Ok(self.rows)
    }
}

/// Write (key, id) pairs in the same shape the pre-seed loader reads
pub fn write_mappings(path: &Path, mappings: &[(String, u32)]) -> Result<()> {
    let json = serde_json::to_string_pretty(mappings)?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    log::info!("Wrote {} new mappings to {:?}", mappings.len(), path);
    Ok(())
}

/// Outcome of one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
}

impl FileReport {
    pub fn processed(path: &Path, stats: RunStats) -> Self {
        Self {
            path: path.to_path_buf(),
            error: None,
            stats: Some(stats),
        }
    }

    pub fn failed(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            error: Some(error),
            stats: None,
        }
    }
}

/// Everything `run_stats.json` records about a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub totals: RunStats,
    pub new_devices: usize,
    pub new_parameters: usize,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            totals: RunStats::default(),
            new_devices: 0,
            new_parameters: 0,
            files: Vec::new(),
        }
    }

    pub fn add(&mut self, file: FileReport) {
        if let Some(stats) = &file.stats {
            self.totals.accumulate(stats);
        }
        self.files.push(file);
    }

    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }

    pub fn print_summary(&self) {
        println!("STDF ingest summary ({})", self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for file in &self.files {
            match (&file.error, &file.stats) {
                (Some(error), _) => println!("  FAILED {}: {}", file.path.display(), error),
                (None, Some(stats)) => println!(
                    "  ok     {}: {} records, {} corrupt, {} measurements",
                    file.path.display(),
                    stats.records_seen,
                    stats.corrupt_records,
                    stats.measurements
                ),
                (None, None) => {}
            }
        }
        let t = &self.totals;
        println!(
            "Records:      {} seen, {} parsed, {} corrupt, {} unknown",
            t.records_seen,
            t.records_parsed,
            t.corrupt_records,
            t.unknown_records
        );
        println!("Tests:        {} seen, {} matched", t.tests_seen, t.tests_matched);
        println!("Devices:      {}", t.devices);
        println!("Measurements: {}", t.measurements);
        println!("New ids:      {} devices, {} parameters", self.new_devices, self.new_parameters);
        println!(
            "Time:         decode {:.3}s, generate {:.3}s",
            t.decode_time.as_secs_f64(),
            t.generation_time.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mappings_roundtrips_as_preseed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(NEW_DEVICES_FILE);
        write_mappings(&path, &[("B2".to_string(), 8)]).unwrap();

        let back: Vec<(String, u32)> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![("B2".to_string(), 8)]);
    }

    #[test]
    fn test_report_counts_failures() {
        let mut report = RunReport::new(Utc::now());
        report.add(FileReport::processed(
            Path::new("a.stdf"),
            RunStats {
                measurements: 5,
                ..RunStats::default()
            },
        ));
        report.add(FileReport::failed(Path::new("b.stdf"), "missing".to_string()));
        assert_eq!(report.failed_files(), 1);
        assert_eq!(report.totals.measurements, 5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"][1]["error"], "missing");
    }

    #[test]
    fn test_measurement_writer_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MEASUREMENTS_FILE);
        let writer = MeasurementWriter::create(&path).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
