//! Typed field reads over one record payload
//!
//! Every read is bounded by the payload slice. A field whose first byte lies
//! at the payload end was omitted by the writer and reads as its default;
//! a field that starts inside the payload but does not fit is corruption.

use crate::types::{Endian, FieldError};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

type FieldResult<T> = std::result::Result<T, FieldError>;

/// A variable-length text field, kept in its wire form (length byte + bytes)
///
/// Rendering decides whether the leading byte really is a length prefix,
/// see [`crate::fields::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText(Vec<u8>);

impl RawText {
    /// Build from a length byte and the bytes that followed it
    pub fn from_wire(len: u8, content: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(content.len() + 1);
        raw.push(len);
        raw.extend_from_slice(content);
        RawText(raw)
    }

    /// Wrap bytes that carry no length prefix
    pub fn from_plain(text: &str) -> Self {
        RawText(text.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A `Dn` bit field: bit count plus the packed bytes holding those bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitField {
    pub bit_count: u16,
    pub data: Vec<u8>,
}

/// Forward-only reader over a record payload
pub struct FieldCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! scalar_reads {
    ($($name:ident => $ty:ty, $width:expr, $read:expr;)*) => {
        $(
            pub fn $name(&mut self) -> FieldResult<$ty> {
                let endian = self.endian;
                Ok(match self.take($width)? {
                    Some(bytes) => $read(endian, bytes),
                    None => <$ty>::default(),
                })
            }
        )*
    };
}

fn read_u16(endian: Endian, b: &[u8]) -> u16 {
    match endian {
        Endian::Little => LittleEndian::read_u16(b),
        Endian::Big => BigEndian::read_u16(b),
    }
}

fn read_u32(endian: Endian, b: &[u8]) -> u32 {
    match endian {
        Endian::Little => LittleEndian::read_u32(b),
        Endian::Big => BigEndian::read_u32(b),
    }
}

fn read_i16(endian: Endian, b: &[u8]) -> i16 {
    match endian {
        Endian::Little => LittleEndian::read_i16(b),
        Endian::Big => BigEndian::read_i16(b),
    }
}

fn read_i32(endian: Endian, b: &[u8]) -> i32 {
    match endian {
        Endian::Little => LittleEndian::read_i32(b),
        Endian::Big => BigEndian::read_i32(b),
    }
}

fn read_f32(endian: Endian, b: &[u8]) -> f32 {
    match endian {
        Endian::Little => LittleEndian::read_f32(b),
        Endian::Big => BigEndian::read_f32(b),
    }
}

fn read_f64(endian: Endian, b: &[u8]) -> f64 {
    match endian {
        Endian::Little => LittleEndian::read_f64(b),
        Endian::Big => BigEndian::read_f64(b),
    }
}

impl<'a> FieldCursor<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take `width` bytes of an optional field; `None` when it was omitted
    fn take(&mut self, width: usize) -> FieldResult<Option<&'a [u8]>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        self.take_exact(width).map(Some)
    }

    /// Take `width` bytes that the record has already promised
    fn take_exact(&mut self, width: usize) -> FieldResult<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < width {
            return Err(FieldError::Truncated {
                offset: self.pos,
                needed: width,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        Ok(bytes)
    }

    scalar_reads! {
        u1 => u8, 1, |_, b: &[u8]| b[0];
        u2 => u16, 2, read_u16;
        u4 => u32, 4, read_u32;
        i1 => i8, 1, |_, b: &[u8]| b[0] as i8;
        i2 => i16, 2, read_i16;
        i4 => i32, 4, read_i32;
        r4 => f32, 4, read_f32;
        r8 => f64, 8, read_f64;
    }

    /// Single character; blank when omitted
    pub fn c1(&mut self) -> FieldResult<char> {
        Ok(match self.take(1)? {
            Some(b) => b[0] as char,
            None => ' ',
        })
    }

    /// Length-prefixed text; `None` when omitted or zero-length
    pub fn cn(&mut self) -> FieldResult<Option<RawText>> {
        let Some(len) = self.take(1)? else {
            return Ok(None);
        };
        let len = len[0];
        if len == 0 {
            return Ok(None);
        }
        let content = self.take_exact(len as usize)?;
        Ok(Some(RawText::from_wire(len, content)))
    }

    /// Length-prefixed bytes; `None` when omitted or zero-length
    pub fn bn(&mut self) -> FieldResult<Option<Vec<u8>>> {
        let Some(len) = self.take(1)? else {
            return Ok(None);
        };
        let len = len[0] as usize;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(self.take_exact(len)?.to_vec()))
    }

    /// Bit-counted bytes; `None` when omitted or empty
    pub fn dn(&mut self) -> FieldResult<Option<BitField>> {
        let Some(raw) = self.take(2)? else {
            return Ok(None);
        };
        let bit_count = read_u16(self.endian, raw);
        if bit_count == 0 {
            return Ok(None);
        }
        let len = (bit_count as usize).div_ceil(8);
        let data = self.take_exact(len)?.to_vec();
        Ok(Some(BitField { bit_count, data }))
    }

    /// Count-bounded array of U1
    pub fn xu1(&mut self, count: u16) -> FieldResult<Option<Vec<u8>>> {
        self.array(count, 1, |_, b| b[0])
    }

    /// Count-bounded array of U2
    pub fn xu2(&mut self, count: u16) -> FieldResult<Option<Vec<u16>>> {
        self.array(count, 2, read_u16)
    }

    /// Count-bounded array of R4
    pub fn xr4(&mut self, count: u16) -> FieldResult<Option<Vec<f32>>> {
        self.array(count, 4, read_f32)
    }

    /// `count` nibbles packed two per byte, low nibble first
    pub fn xn1(&mut self, count: u16) -> FieldResult<Option<Vec<u8>>> {
        if count == 0 || self.remaining() == 0 {
            return Ok(None);
        }
        let bytes = self.take_exact((count as usize).div_ceil(2))?;
        let nibbles = (0..count as usize)
            .map(|i| {
                let byte = bytes[i / 2];
                if i % 2 == 0 { byte & 0x0F } else { byte >> 4 }
            })
            .collect();
        Ok(Some(nibbles))
    }

    fn array<T>(
        &mut self,
        count: u16,
        width: usize,
        read: fn(Endian, &[u8]) -> T,
    ) -> FieldResult<Option<Vec<T>>> {
        // A zero count means no array at all, not an empty one
        if count == 0 || self.remaining() == 0 {
            return Ok(None);
        }
        let bytes = self.take_exact(count as usize * width)?;
        let endian = self.endian;
        Ok(Some(bytes.chunks_exact(width).map(|chunk| read(endian, chunk)).collect()))
    }

    /// Check that the fields consumed exactly the declared payload
    pub fn finish(&self) -> FieldResult<()> {
        if self.pos != self.buf.len() {
            return Err(FieldError::LengthMismatch {
                declared: self.buf.len(),
                consumed: self.pos,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_little_and_big_endian() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut le = FieldCursor::new(&data, Endian::Little);
        assert_eq!(le.u2().unwrap(), 0x1234);
        assert_eq!(le.u4().unwrap(), 0x12345678);
        assert!(le.finish().is_ok());

        let mut be = FieldCursor::new(&data, Endian::Big);
        assert_eq!(be.u2().unwrap(), 0x3412);
    }

    #[test]
    fn test_omitted_trailing_fields_default() {
        let data = [7u8];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert_eq!(cursor.u1().unwrap(), 7);
        assert_eq!(cursor.u4().unwrap(), 0);
        assert_eq!(cursor.r4().unwrap(), 0.0);
        assert_eq!(cursor.c1().unwrap(), ' ');
        assert_eq!(cursor.cn().unwrap(), None);
        assert_eq!(cursor.xr4(3).unwrap(), None);
        assert!(cursor.finish().is_ok());
    }

    #[test]
    fn test_partial_scalar_is_truncation() {
        let data = [1u8, 2];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        let err = cursor.u4().unwrap_err();
        assert_eq!(
            err,
            FieldError::Truncated { offset: 0, needed: 4, remaining: 2 }
        );
    }

    #[test]
    fn test_cn_reads_declared_length_only() {
        let data = [3u8, b'a', b'b', b'c', 9];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        let text = cursor.cn().unwrap().unwrap();
        assert_eq!(text.as_bytes(), &[3, b'a', b'b', b'c']);
        assert_eq!(cursor.u1().unwrap(), 9);
    }

    #[test]
    fn test_cn_zero_length_is_absent() {
        let data = [0u8];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert_eq!(cursor.cn().unwrap(), None);
        assert!(cursor.finish().is_ok());
    }

    #[test]
    fn test_cn_length_past_payload_is_truncation() {
        let data = [10u8, b'a'];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert!(matches!(cursor.cn(), Err(FieldError::Truncated { .. })));
    }

    #[test]
    fn test_array_bounded_by_count() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&2.5f32.to_le_bytes());
        data.push(0xAA);
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert_eq!(cursor.xr4(2).unwrap(), Some(vec![1.5, 2.5]));
        assert_eq!(cursor.remaining(), 1);
        assert!(matches!(cursor.finish(), Err(FieldError::LengthMismatch { declared: 9, consumed: 8 })));
    }

    #[test]
    fn test_array_count_past_payload_is_truncation() {
        let data = [0u8; 6];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert!(matches!(cursor.xr4(2), Err(FieldError::Truncated { needed: 8, .. })));
    }

    #[test]
    fn test_nibbles_low_first() {
        let data = [0x21u8, 0x03];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        assert_eq!(cursor.xn1(3).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_dn_bit_count() {
        let data = [10u8, 0, 0xFF, 0x03];
        let mut cursor = FieldCursor::new(&data, Endian::Little);
        let bits = cursor.dn().unwrap().unwrap();
        assert_eq!(bits.bit_count, 10);
        assert_eq!(bits.data, vec![0xFF, 0x03]);
    }
}
