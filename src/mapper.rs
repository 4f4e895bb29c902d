//! The Character-Set Mapper capability and the built-in mappers.
//!
//! A mapper turns indices of one charset into indices of another. It is a
//! pure function of its input: the same slice always maps the same way,
//! and no state survives a call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::charset::{CharsetId, CharsetTable, Index};
use crate::translit;

/// How a [`CharsetMapper::convert`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    /// Every source item was converted exactly.
    Success,
    /// The last converted item is an approximation.
    NonIdentical,
    /// The mapper needs more source items to decide the next one.
    NeedMoreSource,
    /// The destination slice is too short.
    NeedMoreDest,
    /// The item at `converted` has no counterpart in the destination charset.
    Invalid,
    /// The mapper hit an internal fault at `converted`.
    Fatal,
}

/// Result of a [`CharsetMapper::convert`] call.
///
/// `dst[..converted]` is written and nothing past it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    /// Number of leading items converted.
    pub converted: usize,
    /// Why conversion stopped.
    pub outcome: MapOutcome,
}

impl Mapped {
    fn stop(converted: usize, outcome: MapOutcome) -> Self {
        Self { converted, outcome }
    }

    fn done(converted: usize) -> Self {
        Self { converted, outcome: MapOutcome::Success }
    }
}

/// Index remapping between two charsets.
pub trait CharsetMapper: Send + Sync + fmt::Debug {
    /// Human-readable name, used in fault reports.
    fn name(&self) -> &str;

    /// Preference order among candidates; lower is more exact.
    fn quality(&self) -> u32;

    /// Bytes of per-character state the mapper carries across items.
    ///
    /// Only zero-state mappers take part in batched conversion.
    fn state_size(&self) -> usize {
        0
    }

    /// Whether every index maps to itself.
    fn is_identity(&self) -> bool {
        false
    }

    /// Converts a prefix of `src` into `dst`.
    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped;
}

/// Maps a charset onto itself.
#[derive(Debug)]
pub struct Identity {
    name: String,
}

impl Identity {
    /// Identity mapper for `csid`.
    pub fn new(csid: CharsetId) -> Self {
        Self { name: format!("{csid}->{csid}") }
    }
}

impl CharsetMapper for Identity {
    fn name(&self) -> &str {
        &self.name
    }

    fn quality(&self) -> u32 {
        0
    }

    fn is_identity(&self) -> bool {
        true
    }

    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped {
        let n = src.len().min(dst.len());
        dst[..n].copy_from_slice(&src[..n]);
        if n < src.len() {
            return Mapped::stop(n, MapOutcome::NeedMoreDest);
        }
        Mapped::done(n)
    }
}

/// Table charset to Unicode.
#[derive(Debug)]
pub struct ToUcs {
    table: &'static CharsetTable,
    name: String,
}

impl ToUcs {
    /// Mapper from `table` to `UCS`.
    pub fn new(table: &'static CharsetTable) -> Self {
        Self { table, name: format!("{}->UCS", table.name) }
    }
}

impl CharsetMapper for ToUcs {
    fn name(&self) -> &str {
        &self.name
    }

    fn quality(&self) -> u32 {
        1
    }

    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped {
        for (i, &index) in src.iter().enumerate() {
            let Some(slot) = dst.get_mut(i) else {
                return Mapped::stop(i, MapOutcome::NeedMoreDest);
            };
            // Every index a decoder emits is assigned; anything else is a fault.
            let Some(cp) = self.table.lookup(index) else {
                return Mapped::stop(i, MapOutcome::Fatal);
            };
            *slot = cp;
        }
        Mapped::done(src.len())
    }
}

/// Unicode to table charset, falling back to transliteration.
#[derive(Debug)]
pub struct FromUcs {
    reverse: HashMap<u32, Index>,
    name: String,
}

impl FromUcs {
    /// Mapper from `UCS` to `table`.
    pub fn new(table: &'static CharsetTable) -> Self {
        Self { reverse: table.reverse(), name: format!("UCS->{}", table.name) }
    }
}

impl CharsetMapper for FromUcs {
    fn name(&self) -> &str {
        &self.name
    }

    fn quality(&self) -> u32 {
        1
    }

    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped {
        for (i, &cp) in src.iter().enumerate() {
            let Some(slot) = dst.get_mut(i) else {
                return Mapped::stop(i, MapOutcome::NeedMoreDest);
            };
            if cp > 0x10FFFF {
                return Mapped::stop(i, MapOutcome::Fatal);
            }
            if let Some(&index) = self.reverse.get(&cp) {
                *slot = index;
                continue;
            }
            return match translit::approximate(cp).and_then(|approx| self.reverse.get(&approx)) {
                Some(&index) => {
                    *slot = index;
                    Mapped::stop(i + 1, MapOutcome::NonIdentical)
                }
                None => Mapped::stop(i, MapOutcome::Invalid),
            };
        }
        Mapped::done(src.len())
    }
}

/// Two mappers run back to back through `UCS`.
#[derive(Debug)]
pub struct Serial {
    first: ToUcs,
    second: FromUcs,
    name: String,
}

impl Serial {
    const CHUNK: usize = 64;

    /// Mapper from table `from` to table `to`.
    pub fn new(from: &'static CharsetTable, to: &'static CharsetTable) -> Self {
        Self { first: ToUcs::new(from), second: FromUcs::new(to), name: format!("{}->{}", from.name, to.name) }
    }
}

impl CharsetMapper for Serial {
    fn name(&self) -> &str {
        &self.name
    }

    fn quality(&self) -> u32 {
        self.first.quality() + self.second.quality()
    }

    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped {
        let mut ucs = [0; Self::CHUNK];
        let mut done = 0;
        for chunk in src.chunks(Self::CHUNK) {
            let Some(out) = dst.get_mut(done..done + chunk.len()) else {
                return Mapped::stop(done, MapOutcome::NeedMoreDest);
            };
            let first = self.first.convert(chunk, &mut ucs[..chunk.len()]);
            let second = self.second.convert(&ucs[..first.converted], out);
            if second.outcome != MapOutcome::Success {
                return Mapped::stop(done + second.converted, second.outcome);
            }
            if first.outcome != MapOutcome::Success {
                return Mapped::stop(done + first.converted, first.outcome);
            }
            done += chunk.len();
        }
        Mapped::done(done)
    }
}

/// The built-in mapper between two charsets, if any.
pub fn builtin(from: CharsetId, to: CharsetId) -> Option<Arc<dyn CharsetMapper>> {
    if from == to {
        return Some(Arc::new(Identity::new(from)));
    }
    let mapper: Arc<dyn CharsetMapper> = match (from == CharsetId::UCS, to == CharsetId::UCS) {
        (true, false) => Arc::new(FromUcs::new(to.table()?)),
        (false, true) => Arc::new(ToUcs::new(from.table()?)),
        (false, false) => Arc::new(Serial::new(from.table()?, to.table()?)),
        (true, true) => return None,
    };
    Some(mapper)
}
