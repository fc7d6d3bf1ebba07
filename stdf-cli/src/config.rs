//! Configuration loading and parsing
//!
//! The application config is TOML; command-line flags override it. The
//! identifier pre-seed file is JSON, as exported by the previous run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use stdf_decoder::GeneratorConfig;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Worker threads for decoding (default: one per core)
    #[serde(default)]
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Directory scanned for `*.stdf` and `*.std` files
    pub dir: Option<PathBuf>,
    /// JSON field selection
    pub fields: Option<PathBuf>,
    /// JSON identifier pre-seed
    pub preseed: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub output_dir: Option<PathBuf>,
}

/// Problems with the combined configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No input files given (pass FILE arguments or --dir)")]
    NoInputs,

    #[error("--fingerprint applies to a single input file, got {0}")]
    FingerprintWithManyFiles(usize),

    #[error("Preseed {namespace} id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId {
        namespace: &'static str,
        id: u32,
        first: String,
        second: String,
    },
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Existing identifiers exported by an earlier run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreseedFile {
    #[serde(default)]
    pub devices: Vec<(String, u32)>,
    #[serde(default)]
    pub parameters: Vec<(String, u32)>,
}

impl PreseedFile {
    /// Reject files that map one id to two keys
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_unique("device", &self.devices)?;
        check_unique("parameter", &self.parameters)
    }
}

fn check_unique(namespace: &'static str, pairs: &[(String, u32)]) -> std::result::Result<(), ConfigError> {
    let mut seen: HashMap<u32, &str> = HashMap::with_capacity(pairs.len());
    for (key, id) in pairs {
        if let Some(first) = seen.insert(*id, key.as_str()) {
            if first != key.as_str() {
                return Err(ConfigError::DuplicateId {
                    namespace,
                    id: *id,
                    first: first.to_string(),
                    second: key.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Load and validate an identifier pre-seed file
pub fn load_preseed(path: &Path) -> Result<PreseedFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read preseed file: {:?}", path))?;

    let preseed: PreseedFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse preseed file: {:?}", path))?;
    preseed.validate()?;

    log::info!(
        "Loaded preseed {:?}: {} devices, {} parameters",
        path,
        preseed.devices.len(),
        preseed.parameters.len()
    );
    Ok(preseed)
}
