//! Record decoder
//!
//! Turns a framed record stream into a lazy, finite sequence of typed
//! records. A single corrupt record is logged, counted and skipped; the
//! stream only ends at end-of-stream or on a stream-level read failure.

use crate::formats::{RawRecord, RecordSource};
use crate::records::RecordBody;
use crate::types::{RecordHeader, RecordKind};
use serde::Serialize;

/// One record produced by the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Position of the record in the stream, counting from 0
    pub index: u64,
    /// Byte offset of the record header
    pub offset: u64,
    pub header: RecordHeader,
    /// `None` for kinds the decoder does not interpret
    pub body: Option<RecordBody>,
}

impl DecodedRecord {
    pub fn kind(&self) -> Option<RecordKind> {
        self.body.as_ref().map(RecordBody::kind)
    }

    pub fn is_unknown(&self) -> bool {
        self.body.is_none()
    }
}

/// Counters kept while decoding one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeStats {
    /// Every framed record, including corrupt and unknown ones
    pub records_seen: u64,
    /// Records of a known kind whose payload decoded cleanly
    pub records_decoded: u64,
    pub corrupt_records: u64,
    pub unknown_records: u64,
    /// Reason the stream ended early, if it did
    pub stream_error: Option<String>,
}

/// Iterator over decoded records
///
/// Wraps a [`RecordSource`] and dispatches each payload on its kind. The
/// iterator is fused: once the source ends or fails it keeps returning `None`.
pub struct RecordDecoder<S: RecordSource> {
    source: S,
    stats: DecodeStats,
    done: bool,
}

impl<S: RecordSource> RecordDecoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stats: DecodeStats::default(),
            done: false,
        }
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Stop iterating and hand back the source with the final counters
    pub fn into_parts(self) -> (S, DecodeStats) {
        (self.source, self.stats)
    }

    /// Decode one framed record; `None` when it had to be skipped
    fn decode_raw(&mut self, raw: RawRecord) -> Option<DecodedRecord> {
        let index = self.stats.records_seen;
        self.stats.records_seen += 1;

        let Some(kind) = raw.header.kind() else {
            log::debug!("Skipping payload of record {}: {}", index, raw.header);
            self.stats.unknown_records += 1;
            return Some(DecodedRecord {
                index,
                offset: raw.offset,
                header: raw.header,
                body: None,
            });
        };

        match RecordBody::parse(kind, &raw.payload, self.source.endian()) {
            Ok(body) => {
                self.stats.records_decoded += 1;
                Some(DecodedRecord {
                    index,
                    offset: raw.offset,
                    header: raw.header,
                    body: Some(body),
                })
            }
            Err(e) => {
                log::warn!(
                    "Corrupt {} record #{} at byte {}: {}; skipping",
                    kind,
                    index,
                    raw.offset,
                    e
                );
                self.stats.corrupt_records += 1;
                None
            }
        }
    }
}

impl<S: RecordSource> Iterator for RecordDecoder<S> {
    type Item = DecodedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.source.read_next() {
                Ok(Some(raw)) => {
                    if let Some(record) = self.decode_raw(raw) {
                        return Some(record);
                    }
                }
                Ok(None) => {
                    log::debug!("End of stream after {} records", self.stats.records_seen);
                    self.done = true;
                }
                Err(e) => {
                    log::warn!("STDF stream ended early: {}", e);
                    // A record cut short by end-of-stream is still one bad record
                    self.stats.records_seen += 1;
                    self.stats.corrupt_records += 1;
                    self.stats.stream_error = Some(e.to_string());
                    self.done = true;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::writer::{encode_kind, encode_record, encode_with_length, far_record, PayloadBuilder};
    use crate::formats::StdfReader;
    use crate::types::Endian;
    use std::io::Cursor;

    fn pir(site: u8) -> Vec<u8> {
        let payload = PayloadBuilder::new(Endian::Little).u1(1).u1(site).build();
        encode_kind(RecordKind::Pir, &payload, Endian::Little)
    }

    fn decoder(bytes: Vec<u8>) -> RecordDecoder<StdfReader<Cursor<Vec<u8>>>> {
        RecordDecoder::new(StdfReader::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_decodes_known_and_unknown_records() {
        let mut bytes = far_record(Endian::Little);
        bytes.extend(pir(1));
        bytes.extend(encode_record(50, 30, &[1, 2, 3], Endian::Little));
        bytes.extend(pir(2));

        let mut decoder = decoder(bytes);
        let records: Vec<_> = decoder.by_ref().collect();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].kind(), Some(RecordKind::Far));
        assert!(records[2].is_unknown());
        assert_eq!(records[3].index, 3);

        let stats = decoder.stats();
        assert_eq!(stats.records_seen, 4);
        assert_eq!(stats.records_decoded, 3);
        assert_eq!(stats.unknown_records, 1);
        assert_eq!(stats.corrupt_records, 0);
        assert_eq!(stats.stream_error, None);
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let mut bytes = far_record(Endian::Little);
        bytes.extend(pir(1));
        // PIR declaring 3 bytes: one byte left over after SITE_NUM
        bytes.extend(encode_with_length(5, 10, 3, &[1, 1, 9], Endian::Little));
        bytes.extend(pir(3));

        let mut decoder = decoder(bytes);
        let records: Vec<_> = decoder.by_ref().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].index, 3);
        assert_eq!(decoder.stats().corrupt_records, 1);
        assert_eq!(decoder.stats().records_seen, 4);
    }

    #[test]
    fn test_cut_stream_ends_with_error_recorded() {
        let mut bytes = far_record(Endian::Little);
        bytes.extend(pir(1));
        bytes.extend_from_slice(&[20, 0, 15, 10, 1, 2, 3]);

        let mut decoder = decoder(bytes);
        assert_eq!(decoder.by_ref().count(), 2);
        assert!(decoder.next().is_none());
        let (_, stats) = decoder.into_parts();
        assert_eq!(stats.corrupt_records, 1);
        assert!(stats.stream_error.is_some());
    }
}
