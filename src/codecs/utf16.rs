//! UTF-16 in explicit byte orders, and the BOM-driven `UTF-16` form.

use crate::charset::{CharsetId, Index};
use crate::codecs::{ByteOrder, encode_scalar, encode_scalars};
use crate::module::{DecodeStatus, Decoded, Encoded, EncodingModule, ShiftState};

/// Shift state of the `UTF-16` form.
///
/// When decoding, `order` is settled by the first two bytes. When
/// encoding, `started` records that the BOM has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utf16State {
    /// Byte order in effect, once known.
    pub order: Option<ByteOrder>,
    /// Whether the BOM has been read or written.
    pub started: bool,
}

/// UTF-16 codec.
#[derive(Debug, Clone, Copy)]
pub struct Utf16 {
    order: Option<ByteOrder>,
}

impl Utf16 {
    /// `UTF-16LE`.
    pub const fn little_endian() -> Self {
        Self { order: Some(ByteOrder::Little) }
    }

    /// `UTF-16BE`.
    pub const fn big_endian() -> Self {
        Self { order: Some(ByteOrder::Big) }
    }

    /// `UTF-16`: a leading BOM selects the byte order on input (big-endian
    /// without one); output is big-endian with a BOM.
    pub const fn with_bom() -> Self {
        Self { order: None }
    }

    fn bom_state(state: &ShiftState) -> Utf16State {
        match state {
            ShiftState::Utf16(st) => *st,
            _ => Utf16State::default(),
        }
    }
}

fn put_units(order: ByteOrder, ch: char, out: &mut [u8]) -> Option<usize> {
    let mut units = [0u16; 2];
    let units = ch.encode_utf16(&mut units);
    let len = units.len() * 2;
    if out.len() < len {
        return None;
    }
    for (i, &unit) in units.iter().enumerate() {
        order.write_u16(unit, &mut out[i * 2..]);
    }
    Some(len)
}

impl EncodingModule for Utf16 {
    fn name(&self) -> &str {
        match self.order {
            Some(ByteOrder::Little) => "UTF-16LE",
            Some(ByteOrder::Big) => "UTF-16BE",
            None => "UTF-16",
        }
    }

    fn charsets(&self) -> &[CharsetId] {
        &[CharsetId::UCS]
    }

    fn min_unit(&self) -> usize {
        2
    }

    fn is_stateful(&self) -> bool {
        self.order.is_none()
    }

    fn invalid_char(&self) -> u32 {
        0xFFFD
    }

    fn init_state(&self) -> ShiftState {
        match self.order {
            Some(_) => ShiftState::Stateless,
            None => ShiftState::Utf16(Utf16State::default()),
        }
    }

    fn decode_batch(
        &self,
        state: &mut ShiftState,
        src: &[u8],
        csid: &mut [CharsetId],
        index: &mut [Index],
        delta: &mut [usize],
    ) -> Decoded {
        let mut pos = 0;
        let mut count = 0;

        let order = match self.order {
            Some(order) => order,
            None => {
                let mut st = Self::bom_state(state);
                if !st.started {
                    match src {
                        [] => return Decoded { count, consumed: 0, status: DecodeStatus::Complete },
                        [_] => return Decoded { count, consumed: 0, status: DecodeStatus::Incomplete },
                        [0xFF, 0xFE, ..] => {
                            st.order = Some(ByteOrder::Little);
                            pos = 2;
                        }
                        [0xFE, 0xFF, ..] => {
                            st.order = Some(ByteOrder::Big);
                            pos = 2;
                        }
                        _ => st.order = Some(ByteOrder::Big),
                    }
                    st.started = true;
                    *state = ShiftState::Utf16(st);
                }
                st.order.unwrap_or(ByteOrder::Big)
            }
        };

        while count < csid.len() && pos < src.len() {
            let rest = &src[pos..];
            if rest.len() < 2 {
                return Decoded { count, consumed: pos, status: DecodeStatus::Incomplete };
            }
            let unit = order.read_u16(rest);
            let (cp, len) = match unit {
                0xD800..=0xDBFF => {
                    if rest.len() < 4 {
                        return Decoded { count, consumed: pos, status: DecodeStatus::Incomplete };
                    }
                    let low = order.read_u16(&rest[2..]);
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Decoded { count, consumed: pos, status: DecodeStatus::Invalid };
                    }
                    (0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00), 4)
                }
                0xDC00..=0xDFFF => return Decoded { count, consumed: pos, status: DecodeStatus::Invalid },
                _ => (unit as u32, 2),
            };
            pos += len;
            csid[count] = CharsetId::UCS;
            index[count] = cp;
            delta[count] = pos;
            count += 1;
        }
        Decoded { count, consumed: pos, status: DecodeStatus::Complete }
    }

    fn encode_batch(&self, state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded {
        match self.order {
            Some(order) => encode_scalars(csid, index, dst, |ch, out| put_units(order, ch, out)),
            None => {
                let mut st = Self::bom_state(state);
                let enc = encode_scalars(csid, index, dst, |ch, out| put_with_bom(&mut st, ch, out));
                *state = ShiftState::Utf16(st);
                enc
            }
        }
    }

    fn encode_one_wide(&self, state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded {
        match self.order {
            Some(order) => encode_scalar(ucs, dst, |ch, out| put_units(order, ch, out)),
            None => {
                let mut st = Self::bom_state(state);
                let enc = encode_scalar(ucs, dst, |ch, out| put_with_bom(&mut st, ch, out));
                *state = ShiftState::Utf16(st);
                enc
            }
        }
    }
}

fn put_with_bom(st: &mut Utf16State, ch: char, out: &mut [u8]) -> Option<usize> {
    if st.started {
        return put_units(ByteOrder::Big, ch, out);
    }
    if out.len() < 2 {
        return None;
    }
    let len = put_units(ByteOrder::Big, ch, &mut out[2..])?;
    out[..2].copy_from_slice(&[0xFE, 0xFF]);
    st.started = true;
    Some(len + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(codec: &Utf16, state: &mut ShiftState, src: &[u8]) -> (Vec<u32>, Decoded) {
        let mut csid = [CharsetId::default(); 8];
        let mut index = [0; 8];
        let mut delta = [0; 8];
        let d = codec.decode_batch(state, src, &mut csid, &mut index, &mut delta);
        (index[..d.count].to_vec(), d)
    }

    #[test]
    fn test_surrogate_pairs() {
        let codec = Utf16::little_endian();
        let (chars, d) = decode(&codec, &mut ShiftState::Stateless, &[0x3D, 0xD8, 0x00, 0xDE, 0x41, 0x00]);
        assert_eq!(chars, vec![0x1F600, 0x41]);
        assert_eq!(d.consumed, 6);
    }

    #[test]
    fn test_split_surrogate_is_incomplete() {
        let codec = Utf16::big_endian();
        let (chars, d) = decode(&codec, &mut ShiftState::Stateless, &[0x00, 0x41, 0xD8, 0x3D, 0xDE]);
        assert_eq!(chars, vec![0x41]);
        assert_eq!(d.consumed, 2);
        assert_eq!(d.status, DecodeStatus::Incomplete);
    }

    #[test]
    fn test_lone_low_surrogate_is_invalid() {
        let codec = Utf16::big_endian();
        let (_, d) = decode(&codec, &mut ShiftState::Stateless, &[0xDC, 0x00, 0x00, 0x41]);
        assert_eq!(d.status, DecodeStatus::Invalid);
        assert_eq!(d.consumed, 0);
    }

    #[test]
    fn test_bom_selects_order() {
        let codec = Utf16::with_bom();
        let mut state = codec.init_state();
        let (chars, d) = decode(&codec, &mut state, &[0xFF, 0xFE, 0x41, 0x00]);
        assert_eq!(chars, vec![0x41]);
        assert_eq!(d.consumed, 4);
        // The order sticks for later calls.
        let (chars, _) = decode(&codec, &mut state, &[0x42, 0x00]);
        assert_eq!(chars, vec![0x42]);
    }

    #[test]
    fn test_encode_writes_bom_once() {
        let codec = Utf16::with_bom();
        let mut state = codec.init_state();
        let mut out = [0u8; 8];
        let enc = codec.encode_batch(&mut state, &[CharsetId::UCS, CharsetId::UCS], &[0x41, 0x42], &mut out);
        assert_eq!(enc.written, 6);
        assert_eq!(&out[..6], &[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]);

        let enc = codec.encode_batch(&mut state, &[CharsetId::UCS], &[0x43], &mut out);
        assert_eq!(&out[..enc.written], &[0x00, 0x43]);

        codec.reset_state(&mut state);
        let enc = codec.encode_batch(&mut state, &[CharsetId::UCS], &[0x43], &mut out);
        assert_eq!(&out[..enc.written], &[0xFE, 0xFF, 0x00, 0x43]);
    }
}
