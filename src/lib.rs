//! # FastIconv - Resumable Character Encoding Conversion
//!
//! A conversion engine in the iconv mould: bytes in one encoding are decoded
//! into `(charset, index)` pairs, remapped between character sets, and
//! encoded into another encoding, a batch of characters at a time.
//!
//! ## Features
//!
//! - **Resumable** conversion over caller-owned buffers, with exact cursor
//!   bookkeeping on partial input and full output
//! - **Stateful encodings** such as UTF-7 and BOM-driven UTF-16, with
//!   rollback of shift state on partial batches
//! - **Invalid-input policies**: stop, discard, replace or transliterate
//! - **Pluggable** Encoding Modules and Character-Set Mappers
//! - **Shared descriptors**: one read-only plan per encoding pair, any
//!   number of independent contexts
//!
//! ## Quick Start
//!
//! ```rust
//! use fast_iconv::Translator;
//!
//! let translator = Translator::new("UTF-8", "ISO-8859-1").unwrap();
//! let latin1 = translator.convert("café".as_bytes()).unwrap();
//! assert_eq!(latin1, b"caf\xE9");
//! ```
//!
//! Streams use a [`ConversionContext`] directly:
//!
//! ```rust
//! use fast_iconv::ConversionContext;
//!
//! let desc = fast_iconv::open("UTF-8", "US-ASCII//TRANSLIT").unwrap();
//! let mut ctx = ConversionContext::new(desc.clone());
//!
//! let mut input: &[u8] = "naïve".as_bytes();
//! let mut buf = [0u8; 16];
//! let mut output = &mut buf[..];
//! let invalid = ctx.convert(&mut input, &mut output, desc.default_flags()).unwrap();
//! let written = 16 - output.len();
//! assert_eq!(&buf[..written], b"naive");
//! assert_eq!(invalid, 1);
//! ```

#![deny(missing_docs)]

pub mod charset;
pub mod codecs;
pub mod context;
pub mod descriptor;
pub mod mapper;
pub mod module;
pub mod registry;
mod tables;
pub mod translit;

use std::sync::Arc;

pub use charset::{CharsetId, Index};
pub use context::{ConversionContext, ConvertFlags, MAX_BATCH};
pub use descriptor::{Codec, ConversionDescriptor, DestinationCandidate, SourceCharsetEntry};
pub use mapper::{CharsetMapper, MapOutcome, Mapped};
pub use module::{EncodingModule, ShiftState};
pub use registry::{Registry, open};

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during conversion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Input ends inside a character; supply more input
    #[error("incomplete character or shift sequence at end of input")]
    IncompleteSequence,
    /// Input bytes are not valid in the source encoding
    #[error("invalid input sequence")]
    InvalidSequence,
    /// A character has no representation in the destination encoding
    #[error("cannot convert: no corresponding character in target encoding")]
    NoCorrespondingCharacter,
    /// The output buffer is full
    #[error("output buffer is full")]
    OutputTooSmall,
    /// A mapper reported an internal fault
    #[error("mapper {mapper} failed: {reason}")]
    Fatal {
        /// Name of the failing mapper
        mapper: String,
        /// What went wrong
        reason: String,
    },
    /// Unknown encoding name
    #[error("unknown encoding: {name}")]
    NotFound {
        /// The name as requested
        name: String,
    },
    /// No character set of the source reaches the destination
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion {
        /// Source encoding name
        from: String,
        /// Target encoding name
        to: String,
    },
    /// Invalid argument
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Payload-free classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::IncompleteSequence`].
    IncompleteSequence,
    /// See [`Error::InvalidSequence`].
    InvalidSequence,
    /// See [`Error::NoCorrespondingCharacter`].
    NoCorrespondingCharacter,
    /// See [`Error::OutputTooSmall`].
    OutputTooSmall,
    /// See [`Error::Fatal`].
    Fatal,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::UnsupportedConversion`].
    UnsupportedConversion,
    /// See [`Error::InvalidInput`].
    InvalidInput,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IncompleteSequence => ErrorKind::IncompleteSequence,
            Error::InvalidSequence => ErrorKind::InvalidSequence,
            Error::NoCorrespondingCharacter => ErrorKind::NoCorrespondingCharacter,
            Error::OutputTooSmall => ErrorKind::OutputTooSmall,
            Error::Fatal { .. } => ErrorKind::Fatal,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// The errno an iconv implementation reports for this error.
    pub fn errno(&self) -> &'static str {
        match self {
            Error::IncompleteSequence => "EINVAL",
            Error::InvalidSequence | Error::NoCorrespondingCharacter => "EILSEQ",
            Error::OutputTooSmall => "E2BIG",
            Error::Fatal { .. } => "EBADF",
            Error::NotFound { .. } | Error::UnsupportedConversion { .. } | Error::InvalidInput(_) => "EINVAL",
        }
    }
}

/// Whole-buffer converter between two encodings
#[derive(Debug, Clone)]
pub struct Translator {
    desc: Arc<ConversionDescriptor>,
}

impl Translator {
    /// Create a new translator between two encodings, by name
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self { desc: open(from, to)? })
    }

    /// Create a translator over an existing descriptor
    pub fn from_descriptor(desc: Arc<ConversionDescriptor>) -> Self {
        Self { desc }
    }

    /// Get source encoding
    pub fn from_encoding(&self) -> &str {
        self.desc.from().name()
    }

    /// Get target encoding
    pub fn to_encoding(&self) -> &str {
        self.desc.to().name()
    }

    /// The shared descriptor
    pub fn descriptor(&self) -> &Arc<ConversionDescriptor> {
        &self.desc
    }

    /// Convert data from source to target encoding
    ///
    /// Uses the flags requested by the names' suffixes; without any, the
    /// first malformed or unconvertible character is an error.
    pub fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut ctx = ConversionContext::new(self.desc.clone());
        ctx.convert_all(input, self.desc.default_flags()).map(|(output, _)| output)
    }

    /// Convert, replacing anything that cannot be converted with the target's
    /// replacement character
    ///
    /// Returns the output and the number of replaced characters.
    pub fn convert_lossy(&self, input: &[u8]) -> Result<(Vec<u8>, usize)> {
        let flags = ConvertFlags { hide_invalid_in_output: true, ..self.desc.default_flags() };
        ConversionContext::new(self.desc.clone()).convert_all(input, flags)
    }
}

/// Streaming converter for processing large datasets
///
/// Chunks may split characters anywhere; a truncated character at the end
/// of one chunk is completed by the next.
#[derive(Debug)]
pub struct StreamingTranslator {
    ctx: ConversionContext,
    flags: ConvertFlags,
    buffer_size: usize,
    pending: Vec<u8>,
}

impl StreamingTranslator {
    /// Create a new streaming translator with specified output buffer size
    pub fn new(from: &str, to: &str, buffer_size: usize) -> Result<Self> {
        let desc = open(from, to)?;
        let flags = desc.default_flags();
        Ok(Self { ctx: ConversionContext::new(desc), flags, buffer_size: buffer_size.max(16), pending: Vec::new() })
    }

    /// Create with default 64KB buffer
    pub fn with_default_buffer(from: &str, to: &str) -> Result<Self> {
        Self::new(from, to, 64 * 1024)
    }

    /// Replace the conversion flags
    pub fn with_flags(mut self, flags: ConvertFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Characters substituted or dropped so far
    pub fn invalid_count(&self) -> usize {
        self.ctx.invalid_total()
    }

    /// Process a chunk of data
    pub fn process_chunk(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(input);

        let mut rest = &data[..];
        let mut output = Vec::with_capacity(data.len());
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let room = buf.len();
            let mut window = &mut buf[..];
            let res = self.ctx.convert(&mut rest, &mut window, self.flags);
            let written = room - window.len();
            output.extend_from_slice(&buf[..written]);
            match res {
                Ok(_) => break,
                Err(Error::OutputTooSmall) if written == 0 => buf.resize(room * 2, 0),
                Err(Error::OutputTooSmall) => {}
                Err(Error::IncompleteSequence) => {
                    self.pending = rest.to_vec();
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(output)
    }

    /// End the stream, returning the bytes that reset the target's shift state
    ///
    /// Fails if the last chunk ended inside a character, whether its bytes
    /// are still buffered or already absorbed into the source shift state,
    /// unless the flags discard or replace invalid input.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let pending = std::mem::take(&mut self.pending);
        let truncated = !pending.is_empty() || self.ctx.has_pending_input();
        if truncated && !self.flags.recovers() {
            return Err(Error::IncompleteSequence);
        }
        self.ctx.convert_all(&pending, self.flags).map(|(output, _)| output)
    }
}
