//! The Encoding Module capability: a codec between one byte encoding and
//! `(CharsetId, Index)` pairs.
//!
//! Modules are stateless objects shared by every context that converts
//! through them. All per-stream state lives in a [`ShiftState`] value the
//! caller owns and passes in, so a module never holds mutable state itself.

use std::fmt;

use crate::charset::{CharsetId, Index};
use crate::codecs::utf7::Utf7State;
use crate::codecs::utf16::Utf16State;

/// Per-direction shift state of a stateful encoding.
///
/// Each variant belongs to one module family; a module that receives a
/// variant it does not own treats it as its initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftState {
    /// The encoding carries no state.
    #[default]
    Stateless,
    /// Byte order and BOM bookkeeping for `UTF-16`.
    Utf16(Utf16State),
    /// Base64 shift bookkeeping for `UTF-7`.
    Utf7(Utf7State),
}

/// How a decode call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The item limit was reached or the input was exhausted.
    Complete,
    /// `src[consumed..]` is a valid but truncated sequence.
    Incomplete,
    /// `src[consumed..]` starts a sequence that is not valid in the encoding.
    Invalid,
}

/// Outcome of [`EncodingModule::decode_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Number of characters written to the output arrays.
    pub count: usize,
    /// Bytes consumed, including state-only bytes such as shift sequences.
    pub consumed: usize,
    /// Why decoding stopped.
    pub status: DecodeStatus,
}

/// How an encode call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// Every item was encoded.
    Complete,
    /// The next item did not fit in the destination buffer.
    OutputFull,
    /// The next item has no representation in this encoding.
    Unencodable,
}

/// Outcome of an encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    /// Number of leading items fully encoded.
    pub count: usize,
    /// Bytes written for those items.
    pub written: usize,
    /// Why encoding stopped.
    pub status: EncodeStatus,
}

impl Encoded {
    pub(crate) fn complete(count: usize, written: usize) -> Self {
        Self { count, written, status: EncodeStatus::Complete }
    }

    pub(crate) fn stopped(count: usize, written: usize, status: EncodeStatus) -> Self {
        Self { count, written, status }
    }
}

/// A codec between a byte encoding and charset/index pairs.
///
/// # Contract
///
/// `decode_batch` decodes at most `csid.len()` characters. For every
/// decoded item `i`, `delta[i]` is the number of bytes consumed from the
/// start of `src` through the end of that item. Decoding stops right after
/// the last item when the limit is reached; otherwise it stops when the
/// input runs out or at the first truncated or malformed sequence. The
/// state reflects exactly the `consumed` bytes, and a module only emits
/// charsets it lists in [`charsets`](Self::charsets).
///
/// `encode_batch` encodes items in order and stops at the first one that
/// does not fit or cannot be represented. Items are atomic: a failed item
/// writes nothing and leaves the state as it was after the previous item.
pub trait EncodingModule: Send + Sync + fmt::Debug {
    /// Canonical encoding name.
    fn name(&self) -> &str;

    /// Charsets this module emits when decoding and accepts when encoding.
    fn charsets(&self) -> &[CharsetId];

    /// Size in bytes of the smallest encoding unit, skipped on discard.
    fn min_unit(&self) -> usize {
        1
    }

    /// Whether the encoding carries a shift state between characters.
    fn is_stateful(&self) -> bool {
        false
    }

    /// Unicode value written in place of characters that cannot be converted.
    fn invalid_char(&self) -> u32 {
        '?' as u32
    }

    /// Initial shift state.
    fn init_state(&self) -> ShiftState {
        ShiftState::Stateless
    }

    /// Returns `state` to the initial shift state.
    fn reset_state(&self, state: &mut ShiftState) {
        *state = self.init_state();
    }

    /// Decodes up to `csid.len()` characters from `src`.
    fn decode_batch(
        &self,
        state: &mut ShiftState,
        src: &[u8],
        csid: &mut [CharsetId],
        index: &mut [Index],
        delta: &mut [usize],
    ) -> Decoded;

    /// Encodes the items `(csid[i], index[i])` into `dst`.
    fn encode_batch(&self, state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded;

    /// Encodes one Unicode character; used for replacements.
    fn encode_one_wide(&self, state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded;

    /// Bytes to skip past a malformed sequence reported by `decode_batch`.
    ///
    /// A module whose fault lies in bytes it already consumed clears the
    /// fault from `state` and returns 0, so decoding resumes at the byte it
    /// stopped on.
    fn skip_invalid(&self, _state: &mut ShiftState) -> usize {
        self.min_unit()
    }

    /// Whether `state` holds part of a character whose remaining bytes
    /// have not arrived yet.
    fn has_pending_input(&self, _state: &ShiftState) -> bool {
        false
    }

    /// Writes the sequence returning the encoder to its initial state.
    ///
    /// Returns `None`, leaving `state` untouched, if `dst` is too small.
    fn flush_state(&self, state: &mut ShiftState, _dst: &mut [u8]) -> Option<usize> {
        self.reset_state(state);
        Some(0)
    }

    /// Wide-character value for one character encoded as `narrow`.
    ///
    /// The default packs the bytes big-endian, which is the wide form of
    /// byte-oriented locales.
    fn to_wide(&self, narrow: &[u8]) -> Option<u32> {
        if narrow.is_empty() || narrow.len() > 4 {
            return None;
        }
        Some(narrow.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }

    /// Narrow bytes for one wide character; inverse of [`to_wide`](Self::to_wide).
    fn from_wide(&self, wide: u32, narrow: &mut [u8; 4]) -> Option<usize> {
        let len = (4 - wide.leading_zeros() as usize / 8).max(1);
        narrow[..len].copy_from_slice(&wide.to_be_bytes()[4 - len..]);
        Some(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::single_byte::SingleByte;

    #[test]
    fn test_default_wide_packing() {
        let latin1 = SingleByte::iso_8859_1();
        assert_eq!(latin1.to_wide(&[0xE9]), Some(0xE9));
        assert_eq!(latin1.to_wide(&[0x8E, 0xA1]), Some(0x8EA1));
        assert_eq!(latin1.to_wide(&[]), None);

        let mut narrow = [0u8; 4];
        assert_eq!(latin1.from_wide(0x8EA1, &mut narrow), Some(2));
        assert_eq!(&narrow[..2], &[0x8E, 0xA1]);
        assert_eq!(latin1.from_wide(0, &mut narrow), Some(1));
        assert_eq!(narrow[0], 0);
    }
}
