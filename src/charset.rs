//! Charset identifiers and the table-backed charsets behind them.
//!
//! A decoded character is a `(CharsetId, Index)` pair: which character set
//! it belongs to and its code point within that set. `UCS` indices are
//! Unicode scalar values; every other built-in charset is a byte-indexed
//! table.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tables::{self, UNDEFINED};

/// Position of a character within its charset.
pub type Index = u32;

/// Identifier of a character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CharsetId(pub u32);

impl CharsetId {
    /// Unicode; indices are scalar values.
    pub const UCS: CharsetId = CharsetId(0);
    /// ISO 646 IRV / US-ASCII (0x00..=0x7F).
    pub const ASCII: CharsetId = CharsetId(1);
    /// Right half of ISO-8859-1.
    pub const ISO_8859_1: CharsetId = CharsetId(2);
    /// Right half of ISO-8859-2.
    pub const ISO_8859_2: CharsetId = CharsetId(3);
    /// Right half of ISO-8859-15.
    pub const ISO_8859_15: CharsetId = CharsetId(4);
    /// Right half of Windows-1251.
    pub const WINDOWS_1251: CharsetId = CharsetId(5);
    /// Right half of Windows-1252.
    pub const WINDOWS_1252: CharsetId = CharsetId(6);
    /// Right half of DOS code page 437.
    pub const CP437: CharsetId = CharsetId(7);
    /// Right half of KOI8-R.
    pub const KOI8_R: CharsetId = CharsetId(8);
    /// Right half of Macintosh Roman.
    pub const MAC_ROMAN: CharsetId = CharsetId(9);
    /// IBM EBCDIC code page 037, all 256 positions.
    pub const IBM037: CharsetId = CharsetId(10);

    /// First identifier free for charsets registered outside this crate.
    pub const USER_BASE: u32 = 0x1000;

    /// Table backing this charset, if it is one of the built-in byte charsets.
    pub fn table(self) -> Option<&'static CharsetTable> {
        tables::CHARSETS.iter().find(|t| t.id == self)
    }
}

impl fmt::Display for CharsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == CharsetId::UCS {
            return f.write_str("UCS");
        }
        match self.table() {
            Some(table) => f.write_str(table.name),
            None => write!(f, "csid#{}", self.0),
        }
    }
}

/// A byte-indexed charset backed by a static table.
#[derive(Debug)]
pub struct CharsetTable {
    /// Identifier of the charset.
    pub id: CharsetId,
    /// Display name.
    pub name: &'static str,
    first: u8,
    chars: &'static [u16],
}

impl CharsetTable {
    pub(crate) const fn new(id: CharsetId, name: &'static str, first: u8, chars: &'static [u16]) -> Self {
        Self { id, name, first, chars }
    }

    /// Unicode scalar value at `index`, or `None` if the position is unassigned.
    #[inline]
    pub fn lookup(&self, index: Index) -> Option<u32> {
        let slot = index.checked_sub(self.first as u32)? as usize;
        match self.chars.get(slot) {
            Some(&cp) if cp != UNDEFINED => Some(cp as u32),
            _ => None,
        }
    }

    /// Whether `index` is an assigned position of this charset.
    #[inline]
    pub fn contains(&self, index: Index) -> bool {
        self.lookup(index).is_some()
    }

    /// Assigned positions with their Unicode values, in index order.
    pub fn positions(&self) -> impl Iterator<Item = (Index, u32)> + '_ {
        self.chars
            .iter()
            .enumerate()
            .filter(|&(_, &cp)| cp != UNDEFINED)
            .map(|(slot, &cp)| (self.first as Index + slot as Index, cp as u32))
    }

    /// Unicode value to index map; the first position wins on duplicates.
    pub fn reverse(&self) -> HashMap<u32, Index> {
        let mut map = HashMap::with_capacity(self.chars.len());
        for (index, cp) in self.positions() {
            map.entry(cp).or_insert(index);
        }
        map
    }
}

/// All built-in table charsets.
pub fn tables() -> &'static [CharsetTable] {
    &tables::CHARSETS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identity() {
        let ascii = CharsetId::ASCII.table().unwrap();
        assert_eq!(ascii.lookup(0x41), Some(0x41));
        assert_eq!(ascii.lookup(0x80), None);
        assert_eq!(ascii.positions().count(), 128);
    }

    #[test]
    fn test_right_half_offsets() {
        let latin1 = CharsetId::ISO_8859_1.table().unwrap();
        assert_eq!(latin1.lookup(0xE9), Some(0xE9));
        assert_eq!(latin1.lookup(0x41), None);
        assert!(!latin1.contains(0x100));
    }

    #[test]
    fn test_windows_1252_gaps() {
        let cp1252 = CharsetId::WINDOWS_1252.table().unwrap();
        assert_eq!(cp1252.lookup(0x80), Some(0x20AC));
        assert_eq!(cp1252.lookup(0x81), None);
        assert_eq!(cp1252.reverse().get(&0x2122), Some(&0x99));
    }

    #[test]
    fn test_ebcdic_letters() {
        let ibm037 = CharsetId::IBM037.table().unwrap();
        assert_eq!(ibm037.lookup(0xC1), Some('A' as u32));
        assert_eq!(ibm037.lookup(0x81), Some('a' as u32));
        assert_eq!(ibm037.lookup(0xF0), Some('0' as u32));
        assert_eq!(ibm037.lookup(0x6F), Some('?' as u32));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CharsetId::UCS.to_string(), "UCS");
        assert_eq!(CharsetId::KOI8_R.to_string(), "KOI8-R");
        assert_eq!(CharsetId(0x1234).to_string(), "csid#4660");
    }
}
