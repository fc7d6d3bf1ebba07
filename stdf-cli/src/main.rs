//! STDF Ingest CLI Application
//!
//! Command-line front end for the stdf-decoder library. It adds:
//! - Input collection from file arguments and directories
//! - TOML application config, JSON field selection and identifier pre-seed
//! - Parallel decoding (one file per worker) with sequential generation
//! - JSON outputs for measurements, new identifiers and run statistics

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use stdf_decoder::{decode_file, FieldConfig, Processor};

mod config;
mod report;

use config::{AppConfig, ConfigError};
use report::{FileReport, MeasurementWriter, RunReport};

/// STDF Ingest - Flatten STDF test data into measurement rows
#[derive(Parser, Debug)]
#[command(name = "stdf-cli")]
#[command(about = "Decode STDF files into measurement rows", long_about = None)]
#[command(version)]
struct Args {
    /// STDF files to process
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Process every *.stdf / *.std file in this directory
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// JSON field selection (default: built-in selection)
    #[arg(short, long, value_name = "FILE")]
    fields: Option<PathBuf>,

    /// JSON file with existing device/parameter ids
    #[arg(short, long, value_name = "FILE")]
    preseed: Option<PathBuf>,

    /// Directory for output files (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Coordinate tag key, as in KEY=R1C2 (default: Pixel)
    #[arg(long, value_name = "KEY")]
    tag_key: Option<String>,

    /// Keep tests without a coordinate tag
    #[arg(long)]
    no_coordinate_filter: bool,

    /// Use this fingerprint instead of hashing the file (single file only)
    #[arg(long, value_name = "HEX")]
    fingerprint: Option<String>,

    /// Number of decode workers
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("STDF Ingest CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", stdf_decoder::VERSION);

    let app = resolve_config(&args)?;
    let inputs = collect_inputs(&app)?;
    run(&app, &inputs, args.quiet)
}

/// Merge the TOML config (if any) with command-line flags; flags win
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    app.input.files.extend(args.files.iter().cloned());
    if args.dir.is_some() {
        app.input.dir = args.dir.clone();
    }
    if args.fields.is_some() {
        app.input.fields = args.fields.clone();
    }
    if args.preseed.is_some() {
        app.input.preseed = args.preseed.clone();
    }
    if args.output_dir.is_some() {
        app.output.output_dir = args.output_dir.clone();
    }
    if let Some(key) = &args.tag_key {
        app.generator.tag_key = key.clone();
    }
    if args.no_coordinate_filter {
        app.generator.coordinate_filter = false;
    }
    if args.fingerprint.is_some() {
        app.generator.fingerprint = args.fingerprint.clone();
    }
    if args.jobs.is_some() {
        app.jobs = args.jobs;
    }
    Ok(app)
}

/// Explicit files first, then the sorted directory listing
fn collect_inputs(app: &AppConfig) -> Result<Vec<PathBuf>> {
    let mut inputs = app.input.files.clone();

    if let Some(dir) = &app.input.dir {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))? {
            let path = entry?.path();
            if path.is_file() && is_stdf_path(&path) {
                found.push(path);
            }
        }
        found.sort();
        log::info!("Found {} STDF files in {:?}", found.len(), dir);
        inputs.extend(found);
    }

    if inputs.is_empty() {
        return Err(ConfigError::NoInputs.into());
    }
    if app.generator.fingerprint.is_some() && inputs.len() > 1 {
        return Err(ConfigError::FingerprintWithManyFiles(inputs.len()).into());
    }
    Ok(inputs)
}

fn is_stdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("stdf") || e.eq_ignore_ascii_case("std"))
        .unwrap_or(false)
}

fn run(app: &AppConfig, inputs: &[PathBuf], quiet: bool) -> Result<()> {
    let mut run_report = RunReport::new(chrono::Utc::now());

    let fields = match &app.input.fields {
        Some(path) => FieldConfig::from_file(path)
            .with_context(|| format!("Failed to load field configuration: {:?}", path))?,
        None => FieldConfig::default_selection(),
    };
    let mut processor = Processor::new(&fields, app.generator.clone())?;

    if let Some(path) = &app.input.preseed {
        let preseed = config::load_preseed(path)?;
        processor.preseed(preseed.devices, preseed.parameters);
    }

    let output_dir = app.output.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
    let mut writer = MeasurementWriter::create(&output_dir.join(report::MEASUREMENTS_FILE))?;

    // Decoding touches no identifier state, so each batch decodes in parallel.
    // Generation stays sequential in input order to keep ids deterministic.
    // At most one batch of decoded files is held in memory.
    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = app.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build().context("Failed to start decode workers")?;
    let batch_size = pool.current_num_threads().max(1);

    for batch in inputs.chunks(batch_size) {
        let extractor = processor.extractor();
        let decoded: Vec<_> = pool.install(|| {
            batch
                .par_iter()
                .map(|path| (path, decode_file(path, extractor)))
                .collect()
        });

        for (path, result) in decoded {
            match result.and_then(|file| processor.generate(file)) {
                Ok(rows) => {
                    writer.write_rows(&rows)?;
                    run_report.add(FileReport::processed(path, processor.stats().clone()));
                }
                Err(e) => {
                    log::error!("Skipping {:?}: {}", path, e);
                    run_report.add(FileReport::failed(path, e.to_string()));
                }
            }
        }
    }
    writer.finish()?;

    let new_devices = processor.new_device_mappings();
    let new_params = processor.new_param_mappings();
    report::write_mappings(&output_dir.join(report::NEW_DEVICES_FILE), &new_devices)?;
    report::write_mappings(&output_dir.join(report::NEW_PARAMETERS_FILE), &new_params)?;

    run_report.new_devices = new_devices.len();
    run_report.new_parameters = new_params.len();
    run_report.finished_at = chrono::Utc::now();
    run_report.write(&output_dir.join(report::RUN_STATS_FILE))?;

    if !quiet {
        run_report.print_summary();
    }

    let failed = run_report.failed_files();
    if failed > 0 {
        anyhow::bail!("{} of {} input files could not be processed", failed, inputs.len());
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["stdf-cli"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_flags_override_config() {
        let args = args(&["a.stdf", "--tag-key", "Die", "--no-coordinate-filter", "-j", "2"]);
        let app = resolve_config(&args).unwrap();
        assert_eq!(app.input.files, vec![PathBuf::from("a.stdf")]);
        assert_eq!(app.generator.tag_key, "Die");
        assert!(!app.generator.coordinate_filter);
        assert_eq!(app.jobs, Some(2));
    }

    #[test]
    fn test_collect_inputs_from_dir_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.stdf", "a.STD", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let mut app = AppConfig::default();
        app.input.dir = Some(dir.path().to_path_buf());

        let inputs = collect_inputs(&app).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.STD", "b.stdf"]);
    }

    #[test]
    fn test_fingerprint_requires_single_file() {
        let args = args(&["a.stdf", "b.stdf", "--fingerprint", "abcd"]);
        let app = resolve_config(&args).unwrap();
        let err = collect_inputs(&app).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    fn write_lot(path: &Path, parts: &[&str]) {
        use stdf_decoder::formats::writer::{encode_kind, far_record, PayloadBuilder};
        use stdf_decoder::{Endian, RecordKind};

        let le = || PayloadBuilder::new(Endian::Little);
        let mut bytes = far_record(Endian::Little);
        let ptr = le().u4(1).u1(1).u1(1).u1(0).u1(0).r4(0.5).cn("VDD;Pixel=R1C1").build();
        bytes.extend(encode_kind(RecordKind::Ptr, &ptr, Endian::Little));
        for part in parts {
            let prr = le().u1(1).u1(1).u1(0).u2(1).u2(1).u2(1).i2(0).i2(0).u4(0).cn(part).build();
            bytes.extend(encode_kind(RecordKind::Prr, &prr, Endian::Little));
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_run_writes_outputs_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("lot.stdf");
        write_lot(&good, &["P1", "P2"]);
        let missing = dir.path().join("missing.stdf");

        let mut app = AppConfig::default();
        app.output.output_dir = Some(dir.path().join("out"));
        app.jobs = Some(2);

        let err = run(&app, &[good.clone(), missing], true).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));

        let out = dir.path().join("out");
        let rows = fs::read_to_string(out.join(report::MEASUREMENTS_FILE)).unwrap();
        assert_eq!(rows.lines().count(), 2);
        let devices: Vec<(String, u32)> =
            serde_json::from_str(&fs::read_to_string(out.join(report::NEW_DEVICES_FILE)).unwrap()).unwrap();
        assert_eq!(devices, vec![("P1".to_string(), 0), ("P2".to_string(), 1)]);
        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(report::RUN_STATS_FILE)).unwrap()).unwrap();
        assert_eq!(stats["totals"]["measurements"], 2);

        assert!(run(&app, &[good], true).is_ok());
    }

    #[test]
    fn test_batches_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let inputs: Vec<PathBuf> = ["A", "B", "C"]
            .iter()
            .map(|part| {
                let path = dir.path().join(format!("{}.stdf", part));
                write_lot(&path, &[*part]);
                path
            })
            .collect();

        let mut app = AppConfig::default();
        app.output.output_dir = Some(dir.path().join("out"));
        app.jobs = Some(1);
        run(&app, &inputs, true).unwrap();

        let out = dir.path().join("out");
        let devices: Vec<(String, u32)> =
            serde_json::from_str(&fs::read_to_string(out.join(report::NEW_DEVICES_FILE)).unwrap()).unwrap();
        assert_eq!(
            devices,
            vec![("A".to_string(), 0), ("B".to_string(), 1), ("C".to_string(), 2)]
        );
        let rows = fs::read_to_string(out.join(report::MEASUREMENTS_FILE)).unwrap();
        assert_eq!(rows.lines().count(), 3);
    }

    #[test]
    fn test_no_inputs_is_error() {
        let app = AppConfig::default();
        assert!(matches!(
            collect_inputs(&app).unwrap_err().downcast_ref::<ConfigError>(),
            Some(ConfigError::NoInputs)
        ));
    }
}
