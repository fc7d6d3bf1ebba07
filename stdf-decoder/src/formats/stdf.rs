//! STDF V4 record framing
//!
//! Splits a byte stream into raw records (header + payload). Byte order is
//! taken from the File Attributes Record, which must open a well-formed file:
//!
//! - `CPU_TYPE` 1: big-endian (Sun/SPARC)
//! - `CPU_TYPE` 2: little-endian (x86)
//!
//! Anything else falls back to little-endian with a warning. Payload contents
//! are not interpreted here; see [`crate::records`].

use super::RecordSource;
use crate::types::{Endian, RecordHeader, RecordKind, Result, StdfError};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

/// One framed record as read from the stream
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub header: RecordHeader,
    pub payload: Vec<u8>,
    /// Byte offset of the header within the stream
    pub offset: u64,
}

/// Forward-only record reader over any byte source
pub struct StdfReader<R: Read> {
    reader: R,
    endian: Endian,
    offset: u64,
    records_read: u64,
}

impl StdfReader<BufReader<File>> {
    /// Open an STDF file with buffered reading
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening STDF file: {:?}", path);

        let file = File::open(path).map_err(|source| StdfError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> StdfReader<R> {
    /// Wrap an already open byte source
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            endian: Endian::default(),
            offset: 0,
            records_read: 0,
        }
    }

    /// Read the next record; `Ok(None)` at a clean end of stream
    pub fn read_next(&mut self) -> Result<Option<RawRecord>> {
        let record_offset = self.offset;

        let mut head = [0u8; RecordHeader::SIZE];
        let got = self.fill(&mut head)?;
        if got == 0 {
            return Ok(None);
        }
        if got < head.len() {
            return Err(StdfError::UnexpectedEof {
                offset: self.offset,
                needed: head.len() - got,
            });
        }

        let first = self.records_read == 0;
        if first {
            self.endian = Self::guess_byte_order(&head);
        }

        let rec_len = match self.endian {
            Endian::Little => u16::from_le_bytes([head[0], head[1]]),
            Endian::Big => u16::from_be_bytes([head[0], head[1]]),
        };
        let header = RecordHeader {
            rec_len,
            rec_typ: head[2],
            rec_sub: head[3],
        };

        let mut payload = vec![0u8; rec_len as usize];
        let got = self.fill(&mut payload)?;
        if got < payload.len() {
            return Err(StdfError::UnexpectedEof {
                offset: self.offset,
                needed: payload.len() - got,
            });
        }

        if first {
            self.confirm_byte_order(&header, &payload);
        }

        self.records_read += 1;
        log::trace!("Record {} at byte {}: {}", self.records_read, record_offset, header);

        Ok(Some(RawRecord {
            header,
            payload,
            offset: record_offset,
        }))
    }

    /// Release the underlying source
    pub fn close(self) {
        log::debug!(
            "Closing STDF stream after {} records ({} bytes)",
            self.records_read,
            self.offset
        );
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Give back the underlying byte source
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Provisional byte order from the first header: a FAR payload is 2 bytes
    fn guess_byte_order(head: &[u8; RecordHeader::SIZE]) -> Endian {
        if RecordKind::from_header(head[2], head[3]) != Some(RecordKind::Far) {
            log::warn!("STDF stream does not start with a FAR record, assuming little-endian");
            return Endian::Little;
        }
        if u16::from_be_bytes([head[0], head[1]]) == 2 {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    fn confirm_byte_order(&mut self, header: &RecordHeader, payload: &[u8]) {
        if header.kind() != Some(RecordKind::Far) {
            return;
        }
        match payload.first().copied().and_then(Endian::from_cpu_type) {
            Some(endian) => {
                log::debug!("FAR CPU_TYPE selects {:?} byte order", endian);
                self.endian = endian;
            }
            None => {
                log::warn!(
                    "Unsupported FAR CPU_TYPE {:?}, keeping {:?} byte order",
                    payload.first(),
                    self.endian
                );
            }
        }
    }

    /// Read until `buf` is full or the source ends; returns bytes read
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }
}

impl<R: Read> RecordSource for StdfReader<R> {
    fn read_next(&mut self) -> Result<Option<RawRecord>> {
        StdfReader::read_next(self)
    }

    fn endian(&self) -> Endian {
        self.endian
    }

    fn close(self) {
        StdfReader::close(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::writer::{encode_kind, far_record, PayloadBuilder};
    use std::io::Cursor;

    #[test]
    fn test_open_missing_file() {
        let result = StdfReader::open(Path::new("nonexistent.stdf"));
        assert!(matches!(result, Err(StdfError::Open { .. })));
    }

    #[test]
    fn test_reads_records_until_clean_eof() {
        let mut bytes = far_record(Endian::Little);
        let pir = PayloadBuilder::new(Endian::Little).u1(1).u1(2).build();
        bytes.extend(encode_kind(RecordKind::Pir, &pir, Endian::Little));

        let mut reader = StdfReader::new(Cursor::new(bytes));
        let far = reader.read_next().unwrap().unwrap();
        assert_eq!(far.header.kind(), Some(RecordKind::Far));
        let pir = reader.read_next().unwrap().unwrap();
        assert_eq!(pir.header.kind(), Some(RecordKind::Pir));
        assert_eq!(pir.payload, vec![1, 2]);
        assert_eq!(pir.offset, 6);
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn test_big_endian_detected_from_far() {
        let mut bytes = far_record(Endian::Big);
        let prr = PayloadBuilder::new(Endian::Big).u1(1).u1(1).u1(0).u2(300).build();
        bytes.extend(encode_kind(RecordKind::Prr, &prr, Endian::Big));

        let mut reader = StdfReader::new(Cursor::new(bytes));
        reader.read_next().unwrap();
        assert_eq!(reader.endian(), Endian::Big);
        let record = reader.read_next().unwrap().unwrap();
        assert_eq!(record.header.rec_len, 5);
    }

    #[test]
    fn test_cut_payload_is_unexpected_eof() {
        let mut bytes = far_record(Endian::Little);
        bytes.extend_from_slice(&[10, 0, 5, 20, 1, 2]);
        let mut reader = StdfReader::new(Cursor::new(bytes));
        reader.read_next().unwrap();
        assert!(matches!(
            reader.read_next(),
            Err(StdfError::UnexpectedEof { needed: 8, .. })
        ));
    }
}
