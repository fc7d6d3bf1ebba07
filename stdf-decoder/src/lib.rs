//! STDF Decoder Library
//!
//! Decodes STDF V4 semiconductor test data and flattens it into measurement
//! rows, one per device, test and value.
//!
//! # Architecture
//!
//! - Frames the binary stream into records and decodes the record kinds the
//!   pipeline needs (FAR, MIR, HBR, SBR, PIR, PRR, PTR, MPR, FTR)
//! - Renders only the configured fields of each record as text
//! - Assigns stable integer ids to device and parameter names, with support
//!   for pre-seeding ids from an external store
//! - Expands part results and tests into measurement rows
//!
//! The library does NOT:
//! - Write to an analytical store
//! - Write STDF files (apart from the fixture encoder in [`formats::writer`])
//! - Parallelize; callers decode several files on worker threads if needed
//!
//! # Example Usage
//!
//! ```no_run
//! use stdf_decoder::{FieldConfig, GeneratorConfig, Processor};
//! use std::path::Path;
//!
//! let fields = FieldConfig::default_selection();
//! let config = GeneratorConfig::new().with_tag_key("Pixel");
//! let mut processor = Processor::new(&fields, config).unwrap();
//! processor.preseed(vec![("A1".to_string(), 7)], Vec::new());
//!
//! let rows = processor.process_file(Path::new("lot42.stdf")).unwrap();
//! println!("{} measurements", rows.len());
//!
//! for (device, id) in processor.new_device_mappings() {
//!     println!("new device {} -> {}", device, id);
//! }
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod fields;
pub mod formats;
pub mod ids;
pub mod measurements;
pub mod processor;
pub mod records;
pub mod types;

// Re-export main types for convenience
pub use config::{FieldConfig, GeneratorConfig};
pub use decoder::{DecodeStats, DecodedRecord, RecordDecoder};
pub use fields::{FieldExtractor, FieldSelection, Record, ValidationReport};
pub use formats::StdfReader;
pub use ids::{IdentifierManager, Namespace};
pub use measurements::{LotContext, MeasurementGenerator, MeasurementTuple};
pub use processor::{decode_file, decode_reader, DecodedFile, Processor, RunStats};
pub use types::{Endian, RecordKind, Result, StdfError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
