//! STDF stream framing, typed payload reads and the fixture encoder
//!
//! The reader only frames records; interpreting a payload is the job of
//! [`crate::records`], which reads fields through a [`FieldCursor`].

use crate::types::{Endian, Result};

pub mod cursor;
pub mod stdf;
pub mod writer;

// Re-export reader types
pub use cursor::{BitField, FieldCursor, RawText};
pub use stdf::{RawRecord, StdfReader};

/// Common trait for raw record sources
///
/// The record decoder only needs forward-only reads; no seeking, no restart.
pub trait RecordSource {
    /// Next framed record, `Ok(None)` at a clean end of stream
    fn read_next(&mut self) -> Result<Option<RawRecord>>;

    /// Byte order for payload fields
    fn endian(&self) -> Endian;

    /// Release the source once the stream is done
    fn close(self)
    where
        Self: Sized,
    {
    }
}

impl<S: RecordSource + ?Sized> RecordSource for &mut S {
    fn read_next(&mut self) -> Result<Option<RawRecord>> {
        (**self).read_next()
    }

    fn endian(&self) -> Endian {
        (**self).endian()
    }
}
