//! Name resolution and descriptor caching.
//!
//! A [`Registry`] maps encoding names and aliases to Encoding Modules,
//! knows which wide-character forms exist, holds custom mappers, and caches
//! one descriptor per requested pair. Lookups are case-insensitive.
//!
//! Names may carry suffixes after `//`: `TRANSLIT` enables
//! transliteration and `IGNORE` enables discarding. Suffixes on the
//! destination name become the descriptor's default flags.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::charset::CharsetId;
use crate::codecs::{SingleByte, Utf7, Utf8, Utf16, Utf32};
use crate::context::ConvertFlags;
use crate::descriptor::{Codec, ConversionDescriptor, MapperProvider};
use crate::mapper::{self, CharsetMapper};
use crate::module::EncodingModule;
use crate::{Error, Result};

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::with_builtins);

type CacheKey = (String, String, ConvertFlags);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Splits `NAME//SUFFIX,...//...` into the name and the flags the
/// suffixes request. Unknown suffixes are ignored.
pub fn parse_name(spec: &str) -> (&str, ConvertFlags) {
    let mut parts = spec.split("//");
    let name = parts.next().unwrap_or_default().trim();
    let mut flags = ConvertFlags::default();
    for suffix in parts.flat_map(|p| p.split(',')) {
        match suffix.trim().to_ascii_uppercase().as_str() {
            "TRANSLIT" => flags.translit = true,
            "IGNORE" => flags.discard_illegal = true,
            _ => {}
        }
    }
    (name, flags)
}

/// Summary of one registered encoding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EncodingInfo {
    /// Canonical name.
    pub name: String,
    /// Other names resolving to it.
    pub aliases: Vec<String>,
    /// Charsets the encoding decodes to, by display name.
    pub charsets: Vec<String>,
    /// Smallest encoding unit in bytes.
    pub min_unit: usize,
    /// Whether the encoding carries shift state.
    pub stateful: bool,
    /// Whether this is a wide-character form.
    pub wide: bool,
}

/// Encodings, aliases, wide forms and mappers known to the engine.
#[derive(Debug, Default)]
pub struct Registry {
    modules: RwLock<BTreeMap<String, Arc<dyn EncodingModule>>>,
    aliases: RwLock<BTreeMap<String, String>>,
    wide: RwLock<BTreeMap<String, String>>,
    mappers: RwLock<HashMap<(CharsetId, CharsetId), Arc<dyn CharsetMapper>>>,
    cache: RwLock<HashMap<CacheKey, Arc<ConversionDescriptor>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry holding the built-in encodings.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    /// A fresh registry holding the built-in encodings.
    pub fn with_builtins() -> Self {
        let builtins: Vec<(Arc<dyn EncodingModule>, &[&str])> = vec![
            (Arc::new(Utf8), &["UTF8"]),
            (Arc::new(Utf16::with_bom()), &["UTF16"]),
            (Arc::new(Utf16::little_endian()), &["UTF16LE"]),
            (Arc::new(Utf16::big_endian()), &["UTF16BE"]),
            (Arc::new(Utf32::little_endian()), &["UTF32LE"]),
            (Arc::new(Utf32::big_endian()), &["UTF-32", "UTF32", "UTF32BE", "UCS-4", "UCS-4BE"]),
            (Arc::new(Utf7), &["UTF7"]),
            (Arc::new(SingleByte::us_ascii()), &["ASCII", "ANSI_X3.4-1968", "646", "US"]),
            (Arc::new(SingleByte::iso_8859_1()), &["LATIN1", "L1", "ISO8859-1", "ISO_8859-1", "CP819"]),
            (Arc::new(SingleByte::iso_8859_2()), &["LATIN2", "L2", "ISO8859-2", "ISO_8859-2"]),
            (Arc::new(SingleByte::iso_8859_15()), &["LATIN-9", "LATIN9", "ISO8859-15", "ISO_8859-15"]),
            (Arc::new(SingleByte::windows_1251()), &["CP1251", "WIN1251"]),
            (Arc::new(SingleByte::windows_1252()), &["CP1252", "WIN1252"]),
            (Arc::new(SingleByte::cp437()), &["IBM437", "437"]),
            (Arc::new(SingleByte::koi8_r()), &["KOI8R"]),
            (Arc::new(SingleByte::mac_roman()), &["MACROMAN", "MAC-ROMAN", "MAC"]),
            (Arc::new(SingleByte::ibm037()), &["CP037", "EBCDIC-CP-US", "EBCDIC037"]),
        ];

        let registry = Self::new();
        {
            let mut modules = write(&registry.modules);
            let mut aliases = write(&registry.aliases);
            for (module, names) in builtins {
                let key = module.name().to_ascii_uppercase();
                aliases.extend(names.iter().map(|alias| (alias.to_string(), key.clone())));
                modules.insert(key, module);
            }
            aliases.insert("WCHAR".to_string(), "WCHAR_T".to_string());
        }
        write(&registry.wide).insert("WCHAR_T".to_string(), "UTF-8".to_string());
        registry
    }

    /// Adds or replaces an encoding under its canonical name.
    ///
    /// Returns the module previously registered under that name.
    pub fn register_module(&self, module: Arc<dyn EncodingModule>) -> Option<Arc<dyn EncodingModule>> {
        let key = module.name().to_ascii_uppercase();
        let previous = write(&self.modules).insert(key, module);
        write(&self.cache).clear();
        previous
    }

    /// Makes `alias` resolve to the encoding or wide form `name`.
    pub fn register_alias(&self, alias: &str, name: &str) -> Result<()> {
        let target = self.canonical(name)?;
        write(&self.aliases).insert(alias.to_ascii_uppercase(), target);
        Ok(())
    }

    /// Registers a wide-character form bridged through the encoding `locale`.
    ///
    /// The locale must be stateless.
    pub fn register_wide(&self, name: &str, locale: &str) -> Result<()> {
        let module = self.module(locale)?;
        if module.is_stateful() {
            return Err(Error::InvalidInput(format!("wide form {name} needs a stateless locale, {locale} is stateful")));
        }
        write(&self.wide).insert(name.to_ascii_uppercase(), module.name().to_ascii_uppercase());
        write(&self.cache).clear();
        Ok(())
    }

    /// Registers a mapper for `from` to `to`, taking precedence over the
    /// built-in one.
    pub fn register_mapper(&self, from: CharsetId, to: CharsetId, mapper: Arc<dyn CharsetMapper>) {
        write(&self.mappers).insert((from, to), mapper);
        write(&self.cache).clear();
    }

    /// Canonical key for `name`, following at most one alias.
    fn canonical(&self, name: &str) -> Result<String> {
        let upper = name.trim().to_ascii_uppercase();
        if read(&self.modules).contains_key(&upper) || read(&self.wide).contains_key(&upper) {
            return Ok(upper);
        }
        read(&self.aliases).get(&upper).cloned().ok_or_else(|| Error::NotFound { name: name.to_string() })
    }

    fn module(&self, name: &str) -> Result<Arc<dyn EncodingModule>> {
        let key = self.canonical(name)?;
        read(&self.modules).get(&key).cloned().ok_or_else(|| Error::NotFound { name: name.to_string() })
    }

    /// Resolves `name` (without suffixes) to one side of a conversion.
    pub fn resolve(&self, name: &str) -> Result<Codec> {
        let key = self.canonical(name)?;
        if let Some(module) = read(&self.modules).get(&key) {
            return Ok(Codec::Narrow(module.clone()));
        }
        let locale = read(&self.wide).get(&key).cloned().ok_or_else(|| Error::NotFound { name: name.to_string() })?;
        let locale = self.module(&locale)?;
        Ok(Codec::Wide { name: key, locale })
    }

    /// Opens the descriptor converting `from` into `to`.
    ///
    /// Descriptors are cached per pair and suffix flags; later requests
    /// share the same one.
    pub fn open(&self, from: &str, to: &str) -> Result<Arc<ConversionDescriptor>> {
        let (from_name, _) = parse_name(from);
        let (to_name, flags) = parse_name(to);
        let key = (self.canonical(from_name)?, self.canonical(to_name)?, flags);
        if let Some(desc) = read(&self.cache).get(&key) {
            return Ok(desc.clone());
        }

        let (from_codec, to_codec) = (self.resolve(from_name)?, self.resolve(to_name)?);
        let desc = Arc::new(ConversionDescriptor::build(from_codec, to_codec, self, flags)?);
        debug!(from = %key.0, to = %key.1, "caching conversion descriptor");
        Ok(write(&self.cache).entry(key).or_insert(desc).clone())
    }

    /// Canonical names of every registered encoding and wide form.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.modules).values().map(|m| m.name().to_string()).collect();
        names.extend(read(&self.wide).keys().cloned());
        names
    }

    /// Properties of the encoding `name`.
    pub fn info(&self, name: &str) -> Result<EncodingInfo> {
        let codec = self.resolve(name)?;
        let key = codec.name().to_ascii_uppercase();
        let aliases =
            read(&self.aliases).iter().filter(|(_, target)| **target == key).map(|(a, _)| a.clone()).collect();
        Ok(EncodingInfo {
            name: codec.name().to_string(),
            aliases,
            charsets: codec.charsets().iter().map(|c| c.to_string()).collect(),
            min_unit: codec.min_unit(),
            stateful: codec.is_stateful(),
            wide: codec.is_wide(),
        })
    }
}

impl MapperProvider for Registry {
    fn open_mapper(&self, from: CharsetId, to: CharsetId) -> Option<Arc<dyn CharsetMapper>> {
        if let Some(custom) = read(&self.mappers).get(&(from, to)) {
            return Some(custom.clone());
        }
        mapper::builtin(from, to)
    }
}

/// Opens a descriptor from the built-in registry.
pub fn open(from: &str, to: &str) -> Result<Arc<ConversionDescriptor>> {
    Registry::builtin().open(from, to)
}
