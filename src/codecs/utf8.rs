//! UTF-8.

use crate::charset::{CharsetId, Index};
use crate::codecs::{encode_scalar, encode_scalars};
use crate::module::{DecodeStatus, Decoded, Encoded, EncodingModule, ShiftState};

/// Strict UTF-8: overlong forms, surrogates and values above U+10FFFF are
/// malformed; a valid but truncated sequence at the end is incomplete.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8;

enum Step {
    Char(u32, usize),
    Truncated,
    Malformed,
}

fn decode_char(bytes: &[u8]) -> Step {
    let b0 = bytes[0];
    let (len, init) = match b0 {
        0x00..=0x7F => return Step::Char(b0 as u32, 1),
        0xC2..=0xDF => (2, b0 & 0x1F),
        0xE0..=0xEF => (3, b0 & 0x0F),
        0xF0..=0xF4 => (4, b0 & 0x07),
        _ => return Step::Malformed,
    };
    // The second byte range excludes overlongs, surrogates and values past U+10FFFF.
    let (lo, hi) = match b0 {
        0xE0 => (0xA0, 0xBF),
        0xED => (0x80, 0x9F),
        0xF0 => (0x90, 0xBF),
        0xF4 => (0x80, 0x8F),
        _ => (0x80, 0xBF),
    };
    let mut cp = init as u32;
    for i in 1..len {
        let Some(&b) = bytes.get(i) else {
            return Step::Truncated;
        };
        let valid = if i == 1 { (lo..=hi).contains(&b) } else { b & 0xC0 == 0x80 };
        if !valid {
            return Step::Malformed;
        }
        cp = (cp << 6) | (b & 0x3F) as u32;
    }
    Step::Char(cp, len)
}

fn put_utf8(ch: char, out: &mut [u8]) -> Option<usize> {
    let len = ch.len_utf8();
    if out.len() < len {
        return None;
    }
    ch.encode_utf8(&mut out[..len]);
    Some(len)
}

impl EncodingModule for Utf8 {
    fn name(&self) -> &str {
        "UTF-8"
    }

    fn charsets(&self) -> &[CharsetId] {
        &[CharsetId::UCS]
    }

    fn invalid_char(&self) -> u32 {
        0xFFFD
    }

    fn decode_batch(
        &self,
        _state: &mut ShiftState,
        src: &[u8],
        csid: &mut [CharsetId],
        index: &mut [Index],
        delta: &mut [usize],
    ) -> Decoded {
        let mut pos = 0;
        let mut count = 0;
        while count < csid.len() && pos < src.len() {
            match decode_char(&src[pos..]) {
                Step::Char(cp, len) => {
                    pos += len;
                    csid[count] = CharsetId::UCS;
                    index[count] = cp;
                    delta[count] = pos;
                    count += 1;
                }
                Step::Truncated => return Decoded { count, consumed: pos, status: DecodeStatus::Incomplete },
                Step::Malformed => return Decoded { count, consumed: pos, status: DecodeStatus::Invalid },
            }
        }
        Decoded { count, consumed: pos, status: DecodeStatus::Complete }
    }

    fn encode_batch(&self, _state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded {
        encode_scalars(csid, index, dst, put_utf8)
    }

    fn encode_one_wide(&self, _state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded {
        encode_scalar(ucs, dst, put_utf8)
    }

    fn to_wide(&self, narrow: &[u8]) -> Option<u32> {
        if narrow.is_empty() {
            return None;
        }
        match decode_char(narrow) {
            Step::Char(cp, len) if len == narrow.len() => Some(cp),
            _ => None,
        }
    }

    fn from_wide(&self, wide: u32, narrow: &mut [u8; 4]) -> Option<usize> {
        let ch = char::from_u32(wide)?;
        Some(ch.encode_utf8(narrow).len())
    }
}
