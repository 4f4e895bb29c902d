//! UTF-32 in explicit byte orders.

use crate::charset::{CharsetId, Index};
use crate::codecs::{ByteOrder, encode_scalar, encode_scalars};
use crate::module::{DecodeStatus, Decoded, Encoded, EncodingModule, ShiftState};

/// UTF-32 codec.
#[derive(Debug, Clone, Copy)]
pub struct Utf32 {
    order: ByteOrder,
}

impl Utf32 {
    /// `UTF-32LE`.
    pub const fn little_endian() -> Self {
        Self { order: ByteOrder::Little }
    }

    /// `UTF-32BE`.
    pub const fn big_endian() -> Self {
        Self { order: ByteOrder::Big }
    }

    fn put(&self, ch: char, out: &mut [u8]) -> Option<usize> {
        if out.len() < 4 {
            return None;
        }
        let bytes = match self.order {
            ByteOrder::Little => (ch as u32).to_le_bytes(),
            ByteOrder::Big => (ch as u32).to_be_bytes(),
        };
        out[..4].copy_from_slice(&bytes);
        Some(4)
    }
}

impl EncodingModule for Utf32 {
    fn name(&self) -> &str {
        match self.order {
            ByteOrder::Little => "UTF-32LE",
            ByteOrder::Big => "UTF-32BE",
        }
    }

    fn charsets(&self) -> &[CharsetId] {
        &[CharsetId::UCS]
    }

    fn min_unit(&self) -> usize {
        4
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
            let rest = &src[pos..];
            let Some(unit) = rest.first_chunk::<4>() else {
                return Decoded { count, consumed: pos, status: DecodeStatus::Incomplete };
            };
            let cp = match self.order {
                ByteOrder::Little => u32::from_le_bytes(*unit),
                ByteOrder::Big => u32::from_be_bytes(*unit),
            };
            if char::from_u32(cp).is_none() {
                return Decoded { count, consumed: pos, status: DecodeStatus::Invalid };
            }
            pos += 4;
            csid[count] = CharsetId::UCS;
            index[count] = cp;
            delta[count] = pos;
            count += 1;
        }
        Decoded { count, consumed: pos, status: DecodeStatus::Complete }
    }

    fn encode_batch(&self, _state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded {
        encode_scalars(csid, index, dst, |ch, out| self.put(ch, out))
    }

    fn encode_one_wide(&self, _state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded {
        encode_scalar(ucs, dst, |ch, out| self.put(ch, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_out_of_range() {
        let codec = Utf32::big_endian();
        let mut csid = [CharsetId::default(); 4];
        let mut index = [0; 4];
        let mut delta = [0; 4];
        let src = [0x00, 0x00, 0x00, 0x41, 0x00, 0x11, 0x00, 0x00];
        let d = codec.decode_batch(&mut ShiftState::Stateless, &src, &mut csid, &mut index, &mut delta);
        assert_eq!(d.count, 1);
        assert_eq!(d.consumed, 4);
        assert_eq!(d.status, DecodeStatus::Invalid);
    }

    #[test]
    fn test_short_tail_is_incomplete() {
        let codec = Utf32::little_endian();
        let mut csid = [CharsetId::default(); 4];
        let mut index = [0; 4];
        let mut delta = [0; 4];
        let src = [0x41, 0x00, 0x00, 0x00, 0x42, 0x00];
        let d = codec.decode_batch(&mut ShiftState::Stateless, &src, &mut csid, &mut index, &mut delta);
        assert_eq!(d.count, 1);
        assert_eq!(d.status, DecodeStatus::Incomplete);
        assert_eq!(delta[0], 4);
    }
}
