//! Text rendering of typed field values

use crate::formats::{BitField, RawText};
use std::fmt::Write;

/// Render a decoded field value as text
///
/// `None` means the field is absent and gets no entry in the field map.
pub trait RenderField {
    fn render(&self) -> Option<String>;
}

macro_rules! render_display {
    ($($ty:ty),*) => {
        $(
            impl RenderField for $ty {
                fn render(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

render_display!(u8, u16, u32, i8, i16, i32, f32, f64);

impl RenderField for char {
    fn render(&self) -> Option<String> {
        if *self == '\0' {
            Some(" ".to_string())
        } else {
            Some(self.to_string())
        }
    }
}

impl RenderField for Option<RawText> {
    fn render(&self) -> Option<String> {
        self.as_ref().map(render_text)
    }
}

/// U1 and nibble arrays
impl RenderField for Option<Vec<u8>> {
    fn render(&self) -> Option<String> {
        Some(join(self.as_deref().unwrap_or_default()))
    }
}

impl RenderField for Option<Vec<u16>> {
    fn render(&self) -> Option<String> {
        Some(join(self.as_deref().unwrap_or_default()))
    }
}

impl RenderField for Option<Vec<f32>> {
    fn render(&self) -> Option<String> {
        Some(join(self.as_deref().unwrap_or_default()))
    }
}

impl RenderField for Option<BitField> {
    fn render(&self) -> Option<String> {
        self.as_ref().map(|bits| hex(&bits.data))
    }
}

/// Decode a text field's wire bytes
///
/// If the leading byte is non-zero and no larger than the content after it
/// plus one, it is read as a length prefix. Otherwise the bytes are taken as
/// a plain string, ending at the first NUL. Short strings whose first
/// character happens to look like a valid length decode wrongly; this is an
/// accepted approximation.
pub fn render_text(raw: &RawText) -> String {
    let bytes = raw.as_bytes();
    let content = match bytes.split_first() {
        Some((&len, rest)) if len != 0 && len as usize <= rest.len() + 1 => {
            &rest[..rest.len().min(len as usize)]
        }
        _ => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            &bytes[..end]
        }
    };
    String::from_utf8_lossy(content).into_owned()
}

/// Lowercase hex of a byte string
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Render a `Bn` byte string; absent stays absent
pub fn render_bytes(bytes: &Option<Vec<u8>>) -> Option<String> {
    bytes.as_deref().map(hex)
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
