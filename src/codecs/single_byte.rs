//! Table-driven single-byte encodings.

use crate::charset::{CharsetId, CharsetTable, Index};
use crate::module::{DecodeStatus, Decoded, EncodeStatus, Encoded, EncodingModule, ShiftState};

/// A one-byte-per-character encoding.
///
/// ASCII-compatible encodings split into the `ASCII` charset for bytes
/// below 0x80 and a right-half charset for the rest; EBCDIC code pages use
/// one charset covering all 256 positions.
#[derive(Debug, Clone)]
pub struct SingleByte {
    name: &'static str,
    ascii: bool,
    high: Option<&'static CharsetTable>,
    charsets: Vec<CharsetId>,
}

impl SingleByte {
    /// Builds an encoding from a name, ASCII compatibility and an optional
    /// table for the remaining positions.
    pub fn new(name: &'static str, ascii: bool, high: Option<&'static CharsetTable>) -> Self {
        let mut charsets = Vec::with_capacity(2);
        if ascii {
            charsets.push(CharsetId::ASCII);
        }
        if let Some(table) = high {
            charsets.push(table.id);
        }
        Self { name, ascii, high, charsets }
    }

    fn with_table(name: &'static str, ascii: bool, id: CharsetId) -> Self {
        Self::new(name, ascii, id.table())
    }

    /// `US-ASCII`.
    pub fn us_ascii() -> Self {
        Self::new("US-ASCII", true, None)
    }

    /// `ISO-8859-1` (Latin-1).
    pub fn iso_8859_1() -> Self {
        Self::with_table("ISO-8859-1", true, CharsetId::ISO_8859_1)
    }

    /// `ISO-8859-2` (Latin-2).
    pub fn iso_8859_2() -> Self {
        Self::with_table("ISO-8859-2", true, CharsetId::ISO_8859_2)
    }

    /// `ISO-8859-15` (Latin-9).
    pub fn iso_8859_15() -> Self {
        Self::with_table("ISO-8859-15", true, CharsetId::ISO_8859_15)
    }

    /// `WINDOWS-1251`.
    pub fn windows_1251() -> Self {
        Self::with_table("WINDOWS-1251", true, CharsetId::WINDOWS_1251)
    }

    /// `WINDOWS-1252`.
    pub fn windows_1252() -> Self {
        Self::with_table("WINDOWS-1252", true, CharsetId::WINDOWS_1252)
    }

    /// `CP437`.
    pub fn cp437() -> Self {
        Self::with_table("CP437", true, CharsetId::CP437)
    }

    /// `KOI8-R`.
    pub fn koi8_r() -> Self {
        Self::with_table("KOI8-R", true, CharsetId::KOI8_R)
    }

    /// `MACINTOSH`.
    pub fn mac_roman() -> Self {
        Self::with_table("MACINTOSH", true, CharsetId::MAC_ROMAN)
    }

    /// `IBM037`.
    pub fn ibm037() -> Self {
        Self::with_table("IBM037", false, CharsetId::IBM037)
    }

    #[inline]
    fn classify(&self, byte: u8) -> Option<CharsetId> {
        if self.ascii && byte < 0x80 {
            return Some(CharsetId::ASCII);
        }
        self.high.filter(|t| t.contains(byte as Index)).map(|t| t.id)
    }

    #[inline]
    fn byte_for(&self, csid: CharsetId, index: Index) -> Option<u8> {
        if self.ascii && csid == CharsetId::ASCII && index < 0x80 {
            return Some(index as u8);
        }
        match self.high {
            Some(t) if t.id == csid && t.contains(index) => Some(index as u8),
            _ => None,
        }
    }

    fn byte_for_ucs(&self, ucs: u32) -> Option<u8> {
        if self.ascii && ucs < 0x80 {
            return Some(ucs as u8);
        }
        self.high?.positions().find(|&(_, cp)| cp == ucs).map(|(index, _)| index as u8)
    }
}

impl EncodingModule for SingleByte {
    fn name(&self) -> &str {
        self.name
    }

    fn charsets(&self) -> &[CharsetId] {
        &self.charsets
    }

    fn decode_batch(
        &self,
        _state: &mut ShiftState,
        src: &[u8],
        csid: &mut [CharsetId],
        index: &mut [Index],
        delta: &mut [usize],
    ) -> Decoded {
        let n = src.len().min(csid.len());
        for (i, &byte) in src[..n].iter().enumerate() {
            let Some(cs) = self.classify(byte) else {
                return Decoded { count: i, consumed: i, status: DecodeStatus::Invalid };
            };
            csid[i] = cs;
            index[i] = byte as Index;
            delta[i] = i + 1;
        }
        Decoded { count: n, consumed: n, status: DecodeStatus::Complete }
    }

    fn encode_batch(&self, _state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded {
        for (i, (&cs, &idx)) in csid.iter().zip(index).enumerate() {
            let Some(byte) = self.byte_for(cs, idx) else {
                return Encoded::stopped(i, i, EncodeStatus::Unencodable);
            };
            let Some(slot) = dst.get_mut(i) else {
                return Encoded::stopped(i, i, EncodeStatus::OutputFull);
            };
            *slot = byte;
        }
        Encoded::complete(csid.len(), csid.len())
    }

    fn encode_one_wide(&self, _state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded {
        let Some(byte) = self.byte_for_ucs(ucs) else {
            return Encoded::stopped(0, 0, EncodeStatus::Unencodable);
        };
        match dst.first_mut() {
            Some(slot) => {
                *slot = byte;
                Encoded::complete(1, 1)
            }
            None => Encoded::stopped(0, 0, EncodeStatus::OutputFull),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(codec: &SingleByte, src: &[u8]) -> (Vec<(CharsetId, Index)>, Decoded) {
        let mut csid = [CharsetId::default(); 16];
        let mut index = [0; 16];
        let mut delta = [0; 16];
        let d = codec.decode_batch(&mut ShiftState::Stateless, src, &mut csid, &mut index, &mut delta);
        (csid[..d.count].iter().copied().zip(index[..d.count].iter().copied()).collect(), d)
    }

    #[test]
    fn test_latin1_splits_halves() {
        let (items, d) = decode(&SingleByte::iso_8859_1(), b"A\xE9");
        assert_eq!(items, vec![(CharsetId::ASCII, 0x41), (CharsetId::ISO_8859_1, 0xE9)]);
        assert_eq!(d.status, DecodeStatus::Complete);
    }

    #[test]
    fn test_unassigned_byte_is_invalid() {
        let (items, d) = decode(&SingleByte::windows_1252(), b"ab\x81");
        assert_eq!(items.len(), 2);
        assert_eq!(d.consumed, 2);
        assert_eq!(d.status, DecodeStatus::Invalid);

        let (_, d) = decode(&SingleByte::us_ascii(), b"\x80");
        assert_eq!(d.status, DecodeStatus::Invalid);
    }

    #[test]
    fn test_decode_respects_item_limit() {
        let codec = SingleByte::koi8_r();
        let mut csid = [CharsetId::default(); 2];
        let mut index = [0; 2];
        let mut delta = [0; 2];
        let d = codec.decode_batch(&mut ShiftState::Stateless, b"abcd", &mut csid, &mut index, &mut delta);
        assert_eq!((d.count, d.consumed), (2, 2));
        assert_eq!(delta, [1, 2]);
    }

    #[test]
    fn test_encode_rejects_foreign_charset() {
        let codec = SingleByte::iso_8859_2();
        let mut out = [0u8; 4];
        let enc = codec.encode_batch(
            &mut ShiftState::Stateless,
            &[CharsetId::ASCII, CharsetId::ISO_8859_1],
            &[0x41, 0xE9],
            &mut out,
        );
        assert_eq!(enc.count, 1);
        assert_eq!(enc.status, EncodeStatus::Unencodable);
    }

    #[test]
    fn test_encode_one_wide_searches_table() {
        let codec = SingleByte::ibm037();
        let mut out = [0u8; 1];
        let enc = codec.encode_one_wide(&mut ShiftState::Stateless, '?' as u32, &mut out);
        assert_eq!(enc.written, 1);
        assert_eq!(out[0], 0x6F);

        let enc = codec.encode_one_wide(&mut ShiftState::Stateless, 0x263A, &mut out);
        assert_eq!(enc.status, EncodeStatus::Unencodable);
    }
}
