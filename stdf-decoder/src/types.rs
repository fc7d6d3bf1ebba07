//! Core types for the STDF decoder library
//!
//! This module defines the error types, record kinds and record headers shared
//! by the reader, the record decoder and the field extractor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, StdfError>;

/// Errors that can surface from the decoder library
///
/// Only stream-fatal conditions are returned to callers. Record and field
/// level problems are absorbed by the decoder and reported through stats.
#[derive(Debug, thiserror::Error)]
pub enum StdfError {
    #[error("Failed to open STDF file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected end of stream at byte {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: u64, needed: usize },

    #[error("Invalid field configuration: {0}")]
    InvalidConfig(String),

    #[error("No free {0} id left")]
    IdsExhausted(crate::ids::Namespace),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Field-level decode failure inside a single record payload
///
/// These never escape the decoder: the offending record is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field at offset {offset} needs {needed} bytes, only {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("record declares {declared} bytes but fields consumed {consumed}")]
    LengthMismatch { declared: usize, consumed: usize },
}

/// Byte order of multi-byte fields, fixed per file by the FAR record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Map a FAR `CPU_TYPE` to a byte order
    pub fn from_cpu_type(cpu_type: u8) -> Option<Self> {
        match cpu_type {
            1 => Some(Endian::Big),
            2 => Some(Endian::Little),
            _ => None,
        }
    }

    /// `CPU_TYPE` value written for this byte order
    pub fn cpu_type(self) -> u8 {
        match self {
            Endian::Big => 1,
            Endian::Little => 2,
        }
    }
}

/// Record kinds the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    /// File Attributes Record
    Far,
    /// Master Information Record (lot context)
    Mir,
    /// Hardware Bin Record
    Hbr,
    /// Software Bin Record
    Sbr,
    /// Part Information Record
    Pir,
    /// Part Results Record
    Prr,
    /// Parametric Test Record
    Ptr,
    /// Multiple-Result Parametric Record
    Mpr,
    /// Functional Test Record
    Ftr,
}

impl RecordKind {
    /// Every decodable kind, in catalog order
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Far,
        RecordKind::Mir,
        RecordKind::Hbr,
        RecordKind::Sbr,
        RecordKind::Pir,
        RecordKind::Prr,
        RecordKind::Ptr,
        RecordKind::Mpr,
        RecordKind::Ftr,
    ];

    /// Resolve a (REC_TYP, REC_SUB) pair
    pub fn from_header(rec_typ: u8, rec_sub: u8) -> Option<Self> {
        match (rec_typ, rec_sub) {
            (0, 10) => Some(RecordKind::Far),
            (1, 10) => Some(RecordKind::Mir),
            (1, 40) => Some(RecordKind::Hbr),
            (1, 50) => Some(RecordKind::Sbr),
            (5, 10) => Some(RecordKind::Pir),
            (5, 20) => Some(RecordKind::Prr),
            (15, 10) => Some(RecordKind::Ptr),
            (15, 15) => Some(RecordKind::Mpr),
            (15, 20) => Some(RecordKind::Ftr),
            _ => None,
        }
    }

    /// (REC_TYP, REC_SUB) for this kind
    pub fn header_codes(self) -> (u8, u8) {
        match self {
            RecordKind::Far => (0, 10),
            RecordKind::Mir => (1, 10),
            RecordKind::Hbr => (1, 40),
            RecordKind::Sbr => (1, 50),
            RecordKind::Pir => (5, 10),
            RecordKind::Prr => (5, 20),
            RecordKind::Ptr => (15, 10),
            RecordKind::Mpr => (15, 15),
            RecordKind::Ftr => (15, 20),
        }
    }

    /// Three-letter record name as used in field configuration
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Far => "FAR",
            RecordKind::Mir => "MIR",
            RecordKind::Hbr => "HBR",
            RecordKind::Sbr => "SBR",
            RecordKind::Pir => "PIR",
            RecordKind::Prr => "PRR",
            RecordKind::Ptr => "PTR",
            RecordKind::Mpr => "MPR",
            RecordKind::Ftr => "FTR",
        }
    }

    /// Look up a kind by its record name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    /// True for kinds that carry one test's outcome
    pub fn is_test(self) -> bool {
        matches!(self, RecordKind::Ptr | RecordKind::Mpr | RecordKind::Ftr)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 4-byte header preceding every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Payload length in bytes (header excluded)
    pub rec_len: u16,
    pub rec_typ: u8,
    pub rec_sub: u8,
}

impl RecordHeader {
    /// Size of the header on the wire
    pub const SIZE: usize = 4;

    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_header(self.rec_typ, self.rec_sub)
    }
}

impl fmt::Display for RecordHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{} ({}/{}, {} bytes)", kind, self.rec_typ, self.rec_sub, self.rec_len),
            None => write!(f, "unknown ({}/{}, {} bytes)", self.rec_typ, self.rec_sub, self.rec_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_header_roundtrip() {
        for kind in RecordKind::ALL {
            let (typ, sub) = kind.header_codes();
            assert_eq!(RecordKind::from_header(typ, sub), Some(kind));
        }
        assert_eq!(RecordKind::from_header(50, 30), None);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(RecordKind::from_name("PTR"), Some(RecordKind::Ptr));
        assert_eq!(RecordKind::from_name(" prr "), Some(RecordKind::Prr));
        assert_eq!(RecordKind::from_name("XYZ"), None);
    }

    #[test]
    fn test_endian_cpu_type() {
        assert_eq!(Endian::from_cpu_type(1), Some(Endian::Big));
        assert_eq!(Endian::from_cpu_type(2), Some(Endian::Little));
        assert_eq!(Endian::from_cpu_type(0), None);
        assert_eq!(Endian::from_cpu_type(Endian::Big.cpu_type()), Some(Endian::Big));
    }
}
