//! Built-in Encoding Modules.
//!
//! Unicode forms (`UTF-8`, `UTF-16*`, `UTF-32*`, `UTF-7`) emit the `UCS`
//! charset. Legacy byte encodings emit `ASCII` for their left half when
//! they are ASCII-compatible and their own charset for the rest.

pub mod single_byte;
pub mod utf16;
pub mod utf32;
pub mod utf7;
pub mod utf8;

use crate::charset::{CharsetId, Index};
use crate::module::{EncodeStatus, Encoded};

pub use single_byte::SingleByte;
pub use utf7::Utf7;
pub use utf8::Utf8;
pub use utf16::Utf16;
pub use utf32::Utf32;

/// Byte order of a multi-byte code unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    #[inline]
    pub(crate) fn read_u16(self, bytes: &[u8]) -> u16 {
        let pair = [bytes[0], bytes[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(pair),
            ByteOrder::Big => u16::from_be_bytes(pair),
        }
    }

    #[inline]
    pub(crate) fn write_u16(self, unit: u16, out: &mut [u8]) {
        let bytes = match self {
            ByteOrder::Little => unit.to_le_bytes(),
            ByteOrder::Big => unit.to_be_bytes(),
        };
        out[..2].copy_from_slice(&bytes);
    }
}

/// Encodes `UCS` items with `put`, which returns `None` when `dst` is too
/// small for the character.
pub(crate) fn encode_scalars(
    csid: &[CharsetId],
    index: &[Index],
    dst: &mut [u8],
    mut put: impl FnMut(char, &mut [u8]) -> Option<usize>,
) -> Encoded {
    let mut written = 0;
    for (i, (&cs, &idx)) in csid.iter().zip(index).enumerate() {
        let ch = match char::from_u32(idx) {
            Some(ch) if cs == CharsetId::UCS => ch,
            _ => return Encoded::stopped(i, written, EncodeStatus::Unencodable),
        };
        match put(ch, &mut dst[written..]) {
            Some(n) => written += n,
            None => return Encoded::stopped(i, written, EncodeStatus::OutputFull),
        }
    }
    Encoded::complete(csid.len(), written)
}

/// Encodes a single Unicode value with `put`.
pub(crate) fn encode_scalar(ucs: u32, dst: &mut [u8], put: impl FnMut(char, &mut [u8]) -> Option<usize>) -> Encoded {
    encode_scalars(&[CharsetId::UCS], &[ucs], dst, put)
}
