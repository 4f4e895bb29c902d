//! The Conversion Descriptor: a read-only plan connecting the charsets of a
//! source encoding to those of a destination encoding.
//!
//! A descriptor is built once per encoding pair and shared by every
//! [`ConversionContext`](crate::ConversionContext) opened for that pair.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::charset::CharsetId;
use crate::context::ConvertFlags;
use crate::mapper::CharsetMapper;
use crate::module::{EncodingModule, ShiftState};
use crate::{Error, Result};

/// Size in bytes of one wide character.
pub const WIDE_UNIT: usize = 4;

/// One side of a conversion.
#[derive(Debug, Clone)]
pub enum Codec {
    /// A byte encoding handled directly by its module.
    Narrow(Arc<dyn EncodingModule>),
    /// A wide-character form: native-endian 32-bit units whose values are
    /// defined by a stateless narrow locale encoding.
    Wide {
        /// Name of the wide form.
        name: String,
        /// Narrow encoding the wide values are bridged through.
        locale: Arc<dyn EncodingModule>,
    },
}

impl Codec {
    /// Encoding name.
    pub fn name(&self) -> &str {
        match self {
            Codec::Narrow(module) => module.name(),
            Codec::Wide { name, .. } => name,
        }
    }

    /// The module doing the charset work: the codec itself, or the locale
    /// of a wide form.
    pub fn module(&self) -> &dyn EncodingModule {
        match self {
            Codec::Narrow(module) => module.as_ref(),
            Codec::Wide { locale, .. } => locale.as_ref(),
        }
    }

    /// Whether this is a wide-character form.
    pub fn is_wide(&self) -> bool {
        matches!(self, Codec::Wide { .. })
    }

    /// Charsets produced when decoding and accepted when encoding.
    pub fn charsets(&self) -> &[CharsetId] {
        self.module().charsets()
    }

    /// Smallest encoding unit in bytes.
    pub fn min_unit(&self) -> usize {
        match self {
            Codec::Narrow(module) => module.min_unit(),
            Codec::Wide { .. } => WIDE_UNIT,
        }
    }

    /// Bytes to skip past a malformed sequence; see
    /// [`EncodingModule::skip_invalid`].
    pub fn skip_invalid(&self, state: &mut ShiftState) -> usize {
        match self {
            Codec::Narrow(module) => module.skip_invalid(state),
            Codec::Wide { .. } => WIDE_UNIT,
        }
    }

    /// Whether `state` holds part of a character.
    pub fn has_pending_input(&self, state: &ShiftState) -> bool {
        match self {
            Codec::Narrow(module) => module.has_pending_input(state),
            Codec::Wide { .. } => false,
        }
    }

    /// Whether the codec carries shift state. Wide forms never do.
    pub fn is_stateful(&self) -> bool {
        match self {
            Codec::Narrow(module) => module.is_stateful(),
            Codec::Wide { .. } => false,
        }
    }

    /// Replacement character for unconvertible input.
    pub fn invalid_char(&self) -> u32 {
        self.module().invalid_char()
    }
}

/// A way to reach one destination charset from a source charset.
#[derive(Clone)]
pub struct DestinationCandidate {
    /// Mapper doing the conversion.
    pub mapper: Arc<dyn CharsetMapper>,
    /// Charset the mapper produces.
    pub csid: CharsetId,
    /// Preference order; lower is more exact.
    pub quality: u32,
    /// Whether the mapper is the identity.
    pub identity: bool,
}

impl fmt::Debug for DestinationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationCandidate")
            .field("mapper", &self.mapper.name())
            .field("csid", &self.csid)
            .field("quality", &self.quality)
            .field("identity", &self.identity)
            .finish()
    }
}

/// A source charset and its candidates, best first.
#[derive(Debug, Clone)]
pub struct SourceCharsetEntry {
    /// Charset the source encoding emits.
    pub csid: CharsetId,
    /// Destination candidates sorted by quality, ties in discovery order.
    pub candidates: Vec<DestinationCandidate>,
}

/// Opens mappers between charsets during descriptor construction.
pub trait MapperProvider {
    /// A mapper from `from` to `to`, if one exists.
    fn open_mapper(&self, from: CharsetId, to: CharsetId) -> Option<Arc<dyn CharsetMapper>>;
}

impl<F> MapperProvider for F
where
    F: Fn(CharsetId, CharsetId) -> Option<Arc<dyn CharsetMapper>>,
{
    fn open_mapper(&self, from: CharsetId, to: CharsetId) -> Option<Arc<dyn CharsetMapper>> {
        self(from, to)
    }
}

/// Precomputed conversion plan for one encoding pair.
#[derive(Debug)]
pub struct ConversionDescriptor {
    from: Codec,
    to: Codec,
    entries: Vec<SourceCharsetEntry>,
    lone: bool,
    default_flags: ConvertFlags,
}

impl ConversionDescriptor {
    /// Builds the plan from `from` to `to`.
    ///
    /// Source charsets nothing maps from are left out; characters in them
    /// fail at conversion time. Fails only when no source charset reaches
    /// any destination charset.
    pub fn build<P>(from: Codec, to: Codec, provider: &P, default_flags: ConvertFlags) -> Result<Self>
    where
        P: MapperProvider + ?Sized,
    {
        let mut entries = Vec::new();
        for &src in from.charsets() {
            let mut candidates = Vec::new();
            for &dst in to.charsets() {
                let Some(mapper) = provider.open_mapper(src, dst) else {
                    continue;
                };
                if mapper.state_size() != 0 {
                    debug!(mapper = mapper.name(), state_size = mapper.state_size(), "skipping stateful mapper");
                    continue;
                }
                candidates.push(DestinationCandidate {
                    csid: dst,
                    quality: mapper.quality(),
                    identity: mapper.is_identity(),
                    mapper,
                });
            }
            if candidates.is_empty() {
                debug!(csid = %src, "no destination for source charset");
                continue;
            }
            candidates.sort_by_key(|c| c.quality);
            entries.push(SourceCharsetEntry { csid: src, candidates });
        }

        if entries.is_empty() {
            return Err(Error::UnsupportedConversion { from: from.name().to_string(), to: to.name().to_string() });
        }

        let lone = entries.len() == 1 && entries[0].candidates.len() == 1;
        debug!(from = from.name(), to = to.name(), entries = entries.len(), lone, "built conversion descriptor");
        Ok(Self { from, to, entries, lone, default_flags })
    }

    /// Source side.
    pub fn from(&self) -> &Codec {
        &self.from
    }

    /// Destination side.
    pub fn to(&self) -> &Codec {
        &self.to
    }

    /// All source charset entries.
    pub fn entries(&self) -> &[SourceCharsetEntry] {
        &self.entries
    }

    /// Entry for `csid`, if the source charset has any destination.
    pub fn entry(&self, csid: CharsetId) -> Option<&SourceCharsetEntry> {
        self.entries.iter().find(|e| e.csid == csid)
    }

    /// The single source charset and its single candidate, when the whole
    /// plan reduces to one mapping.
    pub fn lone_destination(&self) -> Option<(CharsetId, &DestinationCandidate)> {
        if !self.lone {
            return None;
        }
        let entry = &self.entries[0];
        Some((entry.csid, &entry.candidates[0]))
    }

    /// Flags requested through name suffixes such as `//TRANSLIT`.
    pub fn default_flags(&self) -> ConvertFlags {
        self.default_flags
    }

    /// Whether conversion leaves every byte unchanged: same encoding on
    /// both sides and identity as every entry's first choice.
    pub fn is_trivial(&self) -> bool {
        self.from.name().eq_ignore_ascii_case(self.to.name())
            && self.entries.iter().all(|e| e.candidates.first().is_some_and(|c| c.identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::Index;
    use crate::codecs::{SingleByte, Utf8};
    use crate::mapper::{self, Identity};

    fn narrow(module: impl EncodingModule + 'static) -> Codec {
        Codec::Narrow(Arc::new(module))
    }

    #[test]
    fn test_candidates_sorted_by_quality() {
        let desc = ConversionDescriptor::build(
            narrow(SingleByte::iso_8859_1()),
            narrow(SingleByte::iso_8859_15()),
            &mapper::builtin,
            ConvertFlags::default(),
        )
        .unwrap();
        let ascii = desc.entry(CharsetId::ASCII).unwrap();
        assert_eq!(ascii.candidates[0].csid, CharsetId::ASCII);
        assert!(ascii.candidates[0].identity);
        assert_eq!(ascii.candidates[1].quality, 2);
        assert!(desc.lone_destination().is_none());
        assert!(!desc.is_trivial());
    }

    #[test]
    fn test_lone_destination() {
        let desc = ConversionDescriptor::build(
            narrow(Utf8),
            narrow(SingleByte::us_ascii()),
            &mapper::builtin,
            ConvertFlags::default(),
        )
        .unwrap();
        let (csid, cand) = desc.lone_destination().unwrap();
        assert_eq!(csid, CharsetId::UCS);
        assert_eq!(cand.csid, CharsetId::ASCII);
    }

    #[test]
    fn test_trivial_same_encoding() {
        let desc =
            ConversionDescriptor::build(narrow(Utf8), narrow(Utf8), &mapper::builtin, ConvertFlags::default()).unwrap();
        assert!(desc.is_trivial());
        assert!(desc.lone_destination().unwrap().1.identity);
    }

    #[test]
    fn test_stateful_mappers_rejected() {
        #[derive(Debug)]
        struct Combining;
        impl CharsetMapper for Combining {
            fn name(&self) -> &str {
                "combining"
            }
            fn quality(&self) -> u32 {
                0
            }
            fn state_size(&self) -> usize {
                4
            }
            fn convert(&self, _src: &[Index], _dst: &mut [Index]) -> mapper::Mapped {
                unreachable!()
            }
        }

        let provider = |_: CharsetId, _: CharsetId| -> Option<Arc<dyn CharsetMapper>> {
            Some(Arc::new(Combining) as Arc<dyn CharsetMapper>)
        };
        let err = ConversionDescriptor::build(narrow(Utf8), narrow(Utf8), &provider, ConvertFlags::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));

        let provider = |from: CharsetId, to: CharsetId| -> Option<Arc<dyn CharsetMapper>> {
            (from == to).then(|| Arc::new(Identity::new(from)) as Arc<dyn CharsetMapper>)
        };
        let desc = ConversionDescriptor::build(
            narrow(SingleByte::iso_8859_1()),
            narrow(SingleByte::us_ascii()),
            &provider,
            ConvertFlags::default(),
        )
        .unwrap();
        // The right half has nowhere to go and is left out.
        assert_eq!(desc.entries().len(), 1);
        assert!(desc.entry(CharsetId::ISO_8859_1).is_none());
    }
}
