//! UTF-7 (RFC 2152).
//!
//! Characters outside the direct set travel as modified base64 of their
//! UTF-16 code units, opened by `+` and closed by `-` or by any character
//! that is not a base64 digit. The open run, its pending bits and a
//! pending high surrogate are the shift state, so a run can straddle
//! calls.
//!
//! An invalid code unit is reported at the byte that completed it. When
//! nothing was decoded before it, the state has already absorbed that
//! byte, so skipping one byte resumes cleanly.
//!
//! A high surrogate left open when a run ends is a fault in bytes already
//! consumed. It is reported at the byte that ends the run without absorbing
//! that byte, and [`skip_invalid`](EncodingModule::skip_invalid) clears it
//! without skipping anything, so the terminator is decoded afterwards.

use crate::charset::{CharsetId, Index};
use crate::codecs::{encode_scalar, encode_scalars};
use crate::module::{DecodeStatus, Decoded, Encoded, EncodingModule, ShiftState};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Shift state of a UTF-7 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utf7State {
    /// Inside a base64 run.
    pub base64: bool,
    /// Bits not yet assembled into a code unit (decode) or written (encode).
    pub bits: u32,
    /// Number of valid low-order bits in `bits`.
    pub nbits: u8,
    /// High surrogate waiting for its low half; 0 when none.
    pub high: u16,
    /// A run ended on a lone high surrogate that has not been skipped yet.
    pub dangling: bool,
}

/// UTF-7 codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf7;

/// Set D plus the whitespace RFC 2152 allows directly.
fn is_direct(b: u8) -> bool {
    matches!(b,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
        b'\'' | b'(' | b')' | b',' | b'-' | b'.' | b'/' | b':' | b'?' |
        b' ' | b'\t' | b'\r' | b'\n'
    )
}

fn base64_value(b: u8) -> Option<u32> {
    let v = match b {
        b'A'..=b'Z' => b - b'A',
        b'a'..=b'z' => b - b'a' + 26,
        b'0'..=b'9' => b - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(v as u32)
}

fn low_mask(nbits: u8) -> u32 {
    (1u32 << nbits) - 1
}

impl Utf7 {
    fn state(state: &ShiftState) -> Utf7State {
        match state {
            ShiftState::Utf7(st) => *st,
            _ => Utf7State::default(),
        }
    }
}

/// Writes the tail of an open run: leftover bits, then `-` if requested.
fn close_run(st: &mut Utf7State, out: &mut [u8], dash: bool) -> usize {
    let mut n = 0;
    if st.nbits > 0 {
        out[n] = BASE64[((st.bits << (6 - st.nbits)) & 0x3F) as usize];
        n += 1;
    }
    if dash {
        out[n] = b'-';
        n += 1;
    }
    *st = Utf7State::default();
    n
}

fn put_utf7(st: &mut Utf7State, ch: char, out: &mut [u8]) -> Option<usize> {
    let mut buf = [0u8; 10];
    let mut n = 0;
    let mut next = *st;
    let c = ch as u32;

    if c < 0x80 && is_direct(c as u8) {
        let b = c as u8;
        if next.base64 {
            n += close_run(&mut next, &mut buf, base64_value(b).is_some() || b == b'-');
        }
        buf[n] = b;
        n += 1;
    } else if ch == '+' && !next.base64 {
        buf[..2].copy_from_slice(b"+-");
        n = 2;
    } else {
        if !next.base64 {
            buf[n] = b'+';
            n += 1;
            next = Utf7State { base64: true, ..Utf7State::default() };
        }
        let mut units = [0u16; 2];
        for &unit in ch.encode_utf16(&mut units).iter() {
            next.bits = (next.bits << 16) | unit as u32;
            next.nbits += 16;
            while next.nbits >= 6 {
                next.nbits -= 6;
                buf[n] = BASE64[((next.bits >> next.nbits) & 0x3F) as usize];
                n += 1;
            }
            next.bits &= low_mask(next.nbits);
        }
    }

    if out.len() < n {
        return None;
    }
    out[..n].copy_from_slice(&buf[..n]);
    *st = next;
    Some(n)
}

impl EncodingModule for Utf7 {
    fn name(&self) -> &str {
        "UTF-7"
    }

    fn charsets(&self) -> &[CharsetId] {
        &[CharsetId::UCS]
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn invalid_char(&self) -> u32 {
        0xFFFD
    }

    fn init_state(&self) -> ShiftState {
        ShiftState::Utf7(Utf7State::default())
    }

    fn decode_batch(
        &self,
        state: &mut ShiftState,
        src: &[u8],
        csid: &mut [CharsetId],
        index: &mut [Index],
        delta: &mut [usize],
    ) -> Decoded {
        let mut st = Self::state(state);
        let mut before = st;
        let mut pos = 0;
        let mut count = 0;

        let status = loop {
            if count == csid.len() || pos >= src.len() {
                break DecodeStatus::Complete;
            }
            before = st;
            if st.dangling {
                break DecodeStatus::Invalid;
            }
            let b = src[pos];
            let mut emitted = None;

            if st.base64 {
                if let Some(v) = base64_value(b) {
                    let bits = (st.bits << 6) | v;
                    let nbits = st.nbits + 6;
                    if nbits < 16 {
                        st.bits = bits;
                        st.nbits = nbits;
                        pos += 1;
                        continue;
                    }
                    let rem = nbits - 16;
                    let unit = (bits >> rem) as u16;
                    let pending = st.high;
                    st.bits = bits & low_mask(rem);
                    st.nbits = rem;
                    st.high = 0;
                    match (pending, unit) {
                        (0, 0xD800..=0xDBFF) => st.high = unit,
                        (0, 0xDC00..=0xDFFF) => break DecodeStatus::Invalid,
                        (0, _) => emitted = Some(unit as u32),
                        (high, 0xDC00..=0xDFFF) => {
                            emitted = Some(0x10000 + (((high as u32) - 0xD800) << 10) + ((unit as u32) - 0xDC00));
                        }
                        _ => break DecodeStatus::Invalid,
                    }
                    pos += 1;
                } else if st.high != 0 {
                    st.high = 0;
                    st.dangling = true;
                    break DecodeStatus::Invalid;
                } else {
                    st = Utf7State::default();
                    if b == b'-' {
                        pos += 1;
                    }
                    continue;
                }
            } else {
                match b {
                    b'+' => match src.get(pos + 1) {
                        None => break DecodeStatus::Incomplete,
                        Some(b'-') => {
                            pos += 2;
                            emitted = Some('+' as u32);
                        }
                        Some(_) => {
                            st.base64 = true;
                            pos += 1;
                        }
                    },
                    0x00..=0x7F => {
                        pos += 1;
                        emitted = Some(b as u32);
                    }
                    _ => break DecodeStatus::Invalid,
                }
            }

            if let Some(cp) = emitted {
                csid[count] = CharsetId::UCS;
                index[count] = cp;
                delta[count] = pos;
                count += 1;
            }
        };

        // The caller resumes at the offending byte; it must find the state
        // that byte arrived in.
        if status == DecodeStatus::Invalid && count > 0 {
            st = before;
        }
        *state = ShiftState::Utf7(st);
        Decoded { count, consumed: pos, status }
    }

    fn encode_batch(&self, state: &mut ShiftState, csid: &[CharsetId], index: &[Index], dst: &mut [u8]) -> Encoded {
        let mut st = Self::state(state);
        let enc = encode_scalars(csid, index, dst, |ch, out| put_utf7(&mut st, ch, out));
        *state = ShiftState::Utf7(st);
        enc
    }

    fn encode_one_wide(&self, state: &mut ShiftState, ucs: u32, dst: &mut [u8]) -> Encoded {
        let mut st = Self::state(state);
        let enc = encode_scalar(ucs, dst, |ch, out| put_utf7(&mut st, ch, out));
        *state = ShiftState::Utf7(st);
        enc
    }

    fn skip_invalid(&self, state: &mut ShiftState) -> usize {
        match state {
            ShiftState::Utf7(st) if st.dangling => {
                st.dangling = false;
                0
            }
            _ => self.min_unit(),
        }
    }

    fn has_pending_input(&self, state: &ShiftState) -> bool {
        let st = Self::state(state);
        st.base64 && (st.high != 0 || st.dangling || st.nbits >= 6 || st.bits & low_mask(st.nbits) != 0)
    }

    fn flush_state(&self, state: &mut ShiftState, dst: &mut [u8]) -> Option<usize> {
        let mut st = Self::state(state);
        if !st.base64 {
            *state = self.init_state();
            return Some(0);
        }
        let mut buf = [0u8; 2];
        let n = close_run(&mut st, &mut buf, true);
        if dst.len() < n {
            return None;
        }
        dst[..n].copy_from_slice(&buf[..n]);
        *state = self.init_state();
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(src: &[u8]) -> (String, Decoded) {
        let mut state = Utf7.init_state();
        let mut csid = [CharsetId::default(); 32];
        let mut index = [0; 32];
        let mut delta = [0; 32];
        let d = Utf7.decode_batch(&mut state, src, &mut csid, &mut index, &mut delta);
        let text = index[..d.count].iter().filter_map(|&cp| char::from_u32(cp)).collect();
        (text, d)
    }

    fn encode_all(text: &str) -> Vec<u8> {
        let mut state = Utf7.init_state();
        let chars: Vec<u32> = text.chars().map(|c| c as u32).collect();
        let csid = vec![CharsetId::UCS; chars.len()];
        let mut out = [0u8; 64];
        let enc = Utf7.encode_batch(&mut state, &csid, &chars, &mut out);
        assert_eq!(enc.count, chars.len());
        let mut bytes = out[..enc.written].to_vec();
        let mut tail = [0u8; 4];
        let n = Utf7.flush_state(&mut state, &mut tail).unwrap();
        bytes.extend_from_slice(&tail[..n]);
        bytes
    }

    #[test]
    fn test_rfc_examples_decode() {
        assert_eq!(decode_all(b"Hi Mom -+Jjo--!").0, "Hi Mom -\u{263A}-!");
        assert_eq!(decode_all(b"A+ImIDkQ.").0, "A\u{2262}\u{391}.");
        assert_eq!(decode_all(b"+ZeVnLIqe-").0, "\u{65E5}\u{672C}\u{8A9E}");
        assert_eq!(decode_all(b"1 +- 1").0, "1 + 1");
    }

    #[test]
    fn test_encode_closes_runs() {
        assert_eq!(encode_all("A\u{2262}\u{391}."), b"A+ImIDkQ.");
        assert_eq!(encode_all("\u{65E5}\u{672C}\u{8A9E}"), b"+ZeVnLIqe-");
        assert_eq!(encode_all("1 + 1"), b"1 +- 1");
        assert_eq!(encode_all("\u{263A}a"), b"+Jjo-a");
    }

    #[test]
    fn test_surrogate_pair_round_trip() {
        let encoded = encode_all("x\u{1F600}y");
        assert_eq!(decode_all(&encoded).0, "x\u{1F600}y");
    }

    #[test]
    fn test_lone_plus_at_end_is_incomplete() {
        let (text, d) = decode_all(b"ab+");
        assert_eq!(text, "ab");
        assert_eq!(d.consumed, 2);
        assert_eq!(d.status, DecodeStatus::Incomplete);
    }

    #[test]
    fn test_run_straddles_calls() {
        let mut state = Utf7.init_state();
        let mut csid = [CharsetId::default(); 8];
        let mut index = [0; 8];
        let mut delta = [0; 8];
        let first = Utf7.decode_batch(&mut state, b"+Jj", &mut csid, &mut index, &mut delta);
        assert_eq!((first.count, first.consumed), (0, 3));
        let second = Utf7.decode_batch(&mut state, b"o-", &mut csid, &mut index, &mut delta);
        assert_eq!(second.count, 1);
        assert_eq!(index[0], 0x263A);
        assert_eq!(second.consumed, 2);
    }

    #[test]
    fn test_dangling_high_surrogate_is_zero_width() {
        let (text, d) = decode_all(b"a+2D0.b");
        assert_eq!(text, "a");
        assert_eq!((d.consumed, d.status), (5, DecodeStatus::Invalid));

        let mut state = Utf7.init_state();
        let mut csid = [CharsetId::default(); 8];
        let mut index = [0; 8];
        let mut delta = [0; 8];
        let d = Utf7.decode_batch(&mut state, b"+2D0", &mut csid, &mut index, &mut delta);
        assert_eq!((d.count, d.consumed), (0, 4));
        assert!(Utf7.has_pending_input(&state));

        let d = Utf7.decode_batch(&mut state, b".b", &mut csid, &mut index, &mut delta);
        assert_eq!((d.count, d.consumed, d.status), (0, 0, DecodeStatus::Invalid));
        assert_eq!(Utf7.skip_invalid(&mut state), 0);

        let d = Utf7.decode_batch(&mut state, b".b", &mut csid, &mut index, &mut delta);
        assert_eq!((d.count, d.consumed), (2, 2));
        assert_eq!(&index[..2], &[u32::from(b'.'), u32::from(b'b')]);
        assert!(!Utf7.has_pending_input(&state));
    }

    #[test]
    fn test_pending_input() {
        let mut csid = [CharsetId::default(); 8];
        let mut index = [0; 8];
        let mut delta = [0; 8];
        for (src, pending) in [(&b"+Jj"[..], true), (b"+Jjo", false), (b"+", false), (b"ab", false)] {
            let mut state = Utf7.init_state();
            Utf7.decode_batch(&mut state, src, &mut csid, &mut index, &mut delta);
            assert_eq!(Utf7.has_pending_input(&state), pending, "{src:?}");
        }

        let mut state = Utf7.init_state();
        Utf7.decode_batch(&mut state, b"a\xE9", &mut csid, &mut index, &mut delta);
        assert_eq!(Utf7.skip_invalid(&mut state), 1);
    }

    #[test]
    fn test_non_ascii_byte_is_invalid() {
        let (text, d) = decode_all(b"a\xE9");
        assert_eq!(text, "a");
        assert_eq!(d.status, DecodeStatus::Invalid);
        assert_eq!(d.consumed, 1);
    }
}
