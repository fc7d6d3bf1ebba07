//! Record encoder
//!
//! The inverse of [`FieldCursor`](super::cursor::FieldCursor) for the data
//! types the decoder reads. Used to build fixtures and synthetic files.

use crate::types::{Endian, RecordKind};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Builds one record payload field by field
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    endian: Endian,
    buf: Vec<u8>,
}

macro_rules! scalar_writes {
    ($($name:ident => $ty:ty, $width:expr, $le:path, $be:path;)*) => {
        $(
            pub fn $name(mut self, value: $ty) -> Self {
                let mut bytes = [0u8; $width];
                match self.endian {
                    Endian::Little => $le(&mut bytes, value),
                    Endian::Big => $be(&mut bytes, value),
                }
                self.buf.extend_from_slice(&bytes);
                self
            }
        )*
    };
}

impl PayloadBuilder {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            buf: Vec::new(),
        }
    }

    pub fn u1(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn i1(self, value: i8) -> Self {
        self.u1(value as u8)
    }

    pub fn c1(self, value: char) -> Self {
        self.u1(value as u8)
    }

    scalar_writes! {
        u2 => u16, 2, LittleEndian::write_u16, BigEndian::write_u16;
        u4 => u32, 4, LittleEndian::write_u32, BigEndian::write_u32;
        i2 => i16, 2, LittleEndian::write_i16, BigEndian::write_i16;
        i4 => i32, 4, LittleEndian::write_i32, BigEndian::write_i32;
        r4 => f32, 4, LittleEndian::write_f32, BigEndian::write_f32;
        r8 => f64, 8, LittleEndian::write_f64, BigEndian::write_f64;
    }

    /// Length-prefixed text, truncated to 255 bytes
    pub fn cn(mut self, text: &str) -> Self {
        let bytes = &text.as_bytes()[..text.len().min(255)];
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Array of R4 without its count (the count is a separate field)
    pub fn xr4(self, values: &[f32]) -> Self {
        values.iter().fold(self, |b, v| b.r4(*v))
    }

    /// Array of U2 without its count
    pub fn xu2(self, values: &[u16]) -> Self {
        values.iter().fold(self, |b, v| b.u2(*v))
    }

    /// Nibble array packed two per byte, low nibble first
    pub fn xn1(mut self, nibbles: &[u8]) -> Self {
        for pair in nibbles.chunks(2) {
            let low = pair[0] & 0x0F;
            let high = pair.get(1).map(|n| n & 0x0F).unwrap_or(0);
            self.buf.push(low | (high << 4));
        }
        self
    }

    /// Bit field: bit count followed by the packed bytes
    pub fn dn(self, bit_count: u16, data: &[u8]) -> Self {
        self.u2(bit_count).raw(data)
    }

    /// Raw bytes, for deliberately malformed payloads
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Frame a payload with its 4-byte header
///
/// REC_LEN is a U2, so a payload past 65535 bytes is cut to that length.
pub fn encode_record(rec_typ: u8, rec_sub: u8, payload: &[u8], endian: Endian) -> Vec<u8> {
    let len = payload.len().min(u16::MAX as usize);
    if len < payload.len() {
        log::warn!(
            "Record {}/{} payload of {} bytes cut to {}",
            rec_typ,
            rec_sub,
            payload.len(),
            len
        );
    }
    encode_with_length(rec_typ, rec_sub, len as u16, &payload[..len], endian)
}

/// Frame a known record kind
pub fn encode_kind(kind: RecordKind, payload: &[u8], endian: Endian) -> Vec<u8> {
    let (typ, sub) = kind.header_codes();
    encode_record(typ, sub, payload, endian)
}

/// Frame a payload with an explicit (possibly wrong) declared length
pub fn encode_with_length(
    rec_typ: u8,
    rec_sub: u8,
    rec_len: u16,
    payload: &[u8],
    endian: Endian,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    let mut len = [0u8; 2];
    match endian {
        Endian::Little => LittleEndian::write_u16(&mut len, rec_len),
        Endian::Big => BigEndian::write_u16(&mut len, rec_len),
    }
    out.extend_from_slice(&len);
    out.push(rec_typ);
    out.push(rec_sub);
    out.extend_from_slice(payload);
    out
}

/// File Attributes Record announcing `endian`
pub fn far_record(endian: Endian) -> Vec<u8> {
    let payload = PayloadBuilder::new(endian).u1(endian.cpu_type()).u1(4).build();
    encode_kind(RecordKind::Far, &payload, endian)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_record_layout() {
        assert_eq!(far_record(Endian::Little), vec![2, 0, 0, 10, 2, 4]);
        assert_eq!(far_record(Endian::Big), vec![0, 2, 0, 10, 1, 4]);
    }

    #[test]
    fn test_payload_builder_mixed_fields() {
        let payload = PayloadBuilder::new(Endian::Little)
            .u4(0x01020304)
            .cn("ab")
            .xn1(&[1, 2, 3])
            .build();
        assert_eq!(payload, vec![4, 3, 2, 1, 2, b'a', b'b', 0x21, 0x03]);
    }

    #[test]
    fn test_oversized_payload_is_cut_to_u16() {
        let payload = vec![0x5A; u16::MAX as usize + 10];
        let framed = encode_record(50, 1, &payload, Endian::Little);
        assert_eq!(framed.len(), u16::MAX as usize + 4);
        assert_eq!(&framed[..4], &[0xFF, 0xFF, 50, 1]);
    }

    #[test]
    fn test_bit_field_layout() {
        let payload = PayloadBuilder::new(Endian::Big).dn(10, &[0xFF, 0x03]).build();
        assert_eq!(payload, vec![0, 10, 0xFF, 0x03]);
    }
}
