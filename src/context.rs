//! The Conversion Context and the batched decode, remap, encode loop.
//!
//! A context owns everything that changes while a stream is converted: the
//! shift state of each direction with its rollback copy, the batch arrays,
//! and the scratch buffer used to bridge wide characters. The descriptor it
//! runs against is shared and never mutated.
//!
//! Input bytes are consumed if and only if the output for them has been
//! written. Every path that stops short of a full batch rewinds the source
//! cursor (and the source shift state) to the end of the last committed
//! character.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::charset::{CharsetId, Index};
use crate::descriptor::{Codec, ConversionDescriptor, SourceCharsetEntry, WIDE_UNIT};
use crate::mapper::MapOutcome;
use crate::module::{DecodeStatus, Decoded, EncodeStatus, Encoded, EncodingModule, ShiftState};
use crate::{Error, Result};

/// Largest number of characters moved through the pipeline at once.
pub const MAX_BATCH: usize = 64;

/// Per-call conversion policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertFlags {
    /// Skip malformed input and unconvertible characters.
    pub discard_illegal: bool,
    /// Write the destination's replacement character for malformed input
    /// and unconvertible characters.
    pub hide_invalid_in_output: bool,
    /// Accept approximate mappings.
    pub translit: bool,
    /// Report unconvertible characters as malformed input.
    pub treat_no_mapping_as_illegal: bool,
}

impl ConvertFlags {
    /// Flags with replacement output enabled.
    pub fn lossy() -> Self {
        Self { hide_invalid_in_output: true, ..Self::default() }
    }

    /// Whether any policy turns failures into skips or substitutions.
    pub fn recovers(&self) -> bool {
        self.discard_illegal || self.hide_invalid_in_output
    }
}

struct Batch {
    csid: [CharsetId; MAX_BATCH],
    index: [Index; MAX_BATCH],
    delta: [usize; MAX_BATCH],
    dst_csid: [CharsetId; MAX_BATCH],
    mapped: [Index; MAX_BATCH],
    lossy: [bool; MAX_BATCH],
}

impl Batch {
    fn new() -> Box<Self> {
        Box::new(Self {
            csid: [CharsetId::UCS; MAX_BATCH],
            index: [0; MAX_BATCH],
            delta: [0; MAX_BATCH],
            dst_csid: [CharsetId::UCS; MAX_BATCH],
            mapped: [0; MAX_BATCH],
            lossy: [false; MAX_BATCH],
        })
    }
}

/// Mutable state of one conversion stream.
///
/// A context is not shareable between threads while converting; open one
/// per stream. Contexts over the same descriptor are independent.
pub struct ConversionContext {
    desc: Arc<ConversionDescriptor>,
    src_state: ShiftState,
    src_rollback: ShiftState,
    dst_state: ShiftState,
    dst_rollback: ShiftState,
    batch: Box<Batch>,
    bridge: [u8; 8],
    width: usize,
    invalid_total: usize,
}

impl fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionContext")
            .field("from", &self.desc.from().name())
            .field("to", &self.desc.to().name())
            .field("src_state", &self.src_state)
            .field("dst_state", &self.dst_state)
            .field("width", &self.width)
            .field("invalid_total", &self.invalid_total)
            .finish()
    }
}

impl ConversionContext {
    /// Opens a context over `desc` in the initial shift state.
    pub fn new(desc: Arc<ConversionDescriptor>) -> Self {
        let src_state = desc.from().module().init_state();
        let dst_state = desc.to().module().init_state();
        Self {
            desc,
            src_state,
            src_rollback: src_state,
            dst_state,
            dst_rollback: dst_state,
            batch: Batch::new(),
            bridge: [0; 8],
            width: MAX_BATCH,
            invalid_total: 0,
        }
    }

    /// Sets the number of characters per batch, clamped to `1..=MAX_BATCH`.
    pub fn with_batch_width(mut self, width: usize) -> Self {
        self.width = width.clamp(1, MAX_BATCH);
        self
    }

    /// Characters per batch.
    pub fn batch_width(&self) -> usize {
        self.width
    }

    /// The descriptor this context runs against.
    pub fn descriptor(&self) -> &Arc<ConversionDescriptor> {
        &self.desc
    }

    /// Characters replaced, discarded or transliterated since the context
    /// was opened or last reset.
    pub fn invalid_total(&self) -> usize {
        self.invalid_total
    }

    /// Converts from `input` into `output`, advancing both past what was
    /// consumed and produced.
    ///
    /// Returns the number of characters that were substituted or dropped in
    /// this call. On error the cursors stop exactly after the last
    /// character whose output was written:
    ///
    /// - [`Error::IncompleteSequence`]: `input` ends inside a character.
    /// - [`Error::InvalidSequence`]: `input` starts with a malformed unit.
    /// - [`Error::NoCorrespondingCharacter`]: `input` starts with a
    ///   character the destination cannot represent.
    /// - [`Error::OutputTooSmall`]: `output` is full.
    /// - [`Error::Fatal`]: a mapper fault; the source state is rolled back.
    pub fn convert(&mut self, input: &mut &[u8], output: &mut &mut [u8], flags: ConvertFlags) -> Result<usize> {
        let mut invalid = 0;
        while !input.is_empty() {
            self.src_rollback = self.src_state;
            let dec = decode_into(self.desc.from(), &mut self.src_state, *input, &mut self.batch, self.width);
            let n = dec.count;

            if n == 0 {
                *input = &input[dec.consumed..];
                match dec.status {
                    DecodeStatus::Complete if dec.consumed > 0 => continue,
                    DecodeStatus::Complete | DecodeStatus::Incomplete => return Err(Error::IncompleteSequence),
                    DecodeStatus::Invalid => {
                        self.malformed(input, output, flags, &mut invalid)?;
                        continue;
                    }
                }
            }

            let ok = match remap(&self.desc, &mut self.batch, n, flags.translit) {
                Ok(ok) => ok,
                Err(err) => {
                    self.src_state = self.src_rollback;
                    return Err(err);
                }
            };

            self.dst_rollback = self.dst_state;
            let batch = &*self.batch;
            let enc = encode_from(
                self.desc.to(),
                &mut self.dst_state,
                &batch.dst_csid[..ok],
                &batch.mapped[..ok],
                output,
                &mut self.bridge,
            );
            if enc.count == 0 && enc.status != EncodeStatus::Complete {
                self.dst_state = self.dst_rollback;
            }
            advance(output, enc.written);
            let committed = enc.count;
            let lossy = batch.lossy[..committed].iter().filter(|&&l| l).count();
            invalid += lossy;
            self.invalid_total += lossy;
            trace!(decoded = n, mapped = ok, committed, "batch");

            if committed < ok && enc.status != EncodeStatus::Unencodable {
                self.commit_source(input, &dec, committed);
                return Err(Error::OutputTooSmall);
            }
            if committed < n {
                self.unmappable(input, output, &dec, committed, flags, &mut invalid)?;
                continue;
            }
            self.commit_source(input, &dec, n);
        }
        Ok(invalid)
    }

    /// Returns both directions to their initial shift state.
    ///
    /// With `output`, the sequence that returns the destination to its
    /// initial state is written there first; if it does not fit, nothing
    /// changes and [`Error::OutputTooSmall`] is returned. Without it the
    /// pending shift is dropped. The invalid counter is zeroed.
    pub fn reset(&mut self, output: Option<&mut &mut [u8]>) -> Result<()> {
        if let Some(out) = output {
            let written = flush(self.desc.to(), &mut self.dst_state, out).ok_or(Error::OutputTooSmall)?;
            advance(out, written);
        }
        self.src_state = self.desc.from().module().init_state();
        self.src_rollback = self.src_state;
        self.dst_state = self.desc.to().module().init_state();
        self.dst_rollback = self.dst_state;
        self.invalid_total = 0;
        Ok(())
    }

    /// Converts a complete buffer, including the final shift reset.
    ///
    /// Output grows as needed. Under a recovering policy a truncated
    /// character at the end is handled like malformed input. Returns the
    /// output and the number of substituted or dropped characters; the
    /// context is reset afterwards.
    pub fn convert_all(&mut self, input: &[u8], flags: ConvertFlags) -> Result<(Vec<u8>, usize)> {
        let start = self.invalid_total;
        let mut out = vec![0u8; input.len() + input.len() / 2 + 16];
        let mut written = 0;
        let mut rest = input;

        match self.fill(&mut out, &mut written, |ctx, window| ctx.convert(&mut rest, window, flags).map(drop)) {
            Err(Error::IncompleteSequence) if flags.recovers() => {
                self.fill(&mut out, &mut written, |ctx, window| ctx.recover_tail(window, flags))?;
            }
            res => res?,
        }
        self.fill(&mut out, &mut written, |ctx, window| ctx.end_input(window, flags))?;

        let invalid = self.invalid_total - start;
        self.fill(&mut out, &mut written, |ctx, window| ctx.reset(Some(window)))?;
        out.truncate(written);
        Ok((out, invalid))
    }

    /// Whether the source shift state holds part of a character.
    pub fn has_pending_input(&self) -> bool {
        self.desc.from().has_pending_input(&self.src_state)
    }

    /// Closes the input side of the stream.
    ///
    /// A character begun in the source shift state but never completed is
    /// an [`Error::IncompleteSequence`] unless `flags` recover, in which
    /// case it is dropped or replaced like a truncated tail. The source
    /// returns to its initial state on success.
    pub fn end_input(&mut self, output: &mut &mut [u8], flags: ConvertFlags) -> Result<()> {
        if !self.has_pending_input() {
            return Ok(());
        }
        if !flags.recovers() {
            return Err(Error::IncompleteSequence);
        }
        self.recover_tail(output, flags)?;
        self.src_state = self.desc.from().module().init_state();
        self.src_rollback = self.src_state;
        Ok(())
    }

    /// Runs `step` on the free part of `out`, doubling `out` until the step
    /// stops reporting a full buffer.
    fn fill(
        &mut self,
        out: &mut Vec<u8>,
        written: &mut usize,
        mut step: impl FnMut(&mut Self, &mut &mut [u8]) -> Result<()>,
    ) -> Result<()> {
        loop {
            let mut window = &mut out[*written..];
            let room = window.len();
            let res = step(self, &mut window);
            *written += room - window.len();
            match res {
                Err(Error::OutputTooSmall) => out.resize(out.len() * 2 + 8, 0),
                res => return res,
            }
        }
    }

    /// Drops or replaces a truncated character at the end of the stream.
    fn recover_tail(&mut self, output: &mut &mut [u8], flags: ConvertFlags) -> Result<()> {
        if flags.discard_illegal {
            debug!("discarding truncated input at end of stream");
            return Ok(());
        }
        if self.write_replacement(output)? {
            self.invalid_total += 1;
            return Ok(());
        }
        Err(Error::IncompleteSequence)
    }

    /// Handles a malformed unit at the start of `input`.
    fn malformed(
        &mut self,
        input: &mut &[u8],
        output: &mut &mut [u8],
        flags: ConvertFlags,
        invalid: &mut usize,
    ) -> Result<()> {
        if flags.discard_illegal {
            let unit = self.desc.from().skip_invalid(&mut self.src_state).min(input.len());
            debug!(skipped = unit, "discarding malformed input");
            *input = &input[unit..];
            return Ok(());
        }
        if flags.hide_invalid_in_output && self.write_replacement(output)? {
            let unit = self.desc.from().skip_invalid(&mut self.src_state).min(input.len());
            debug!(skipped = unit, "replacing malformed input");
            *input = &input[unit..];
            *invalid += 1;
            self.invalid_total += 1;
            return Ok(());
        }
        Err(Error::InvalidSequence)
    }

    /// Handles batch item `failed`, which decoded but could not be
    /// converted or encoded.
    fn unmappable(
        &mut self,
        input: &mut &[u8],
        output: &mut &mut [u8],
        dec: &Decoded,
        failed: usize,
        flags: ConvertFlags,
        invalid: &mut usize,
    ) -> Result<()> {
        let recovered = if flags.discard_illegal {
            debug!(index = self.batch.index[failed], "discarding unconvertible character");
            true
        } else if flags.hide_invalid_in_output {
            match self.write_replacement(output) {
                Ok(written) => written,
                Err(err) => {
                    self.commit_source(input, dec, failed);
                    return Err(err);
                }
            }
        } else {
            false
        };

        if recovered {
            *invalid += 1;
            self.invalid_total += 1;
            self.commit_source(input, dec, failed + 1);
            return Ok(());
        }
        self.commit_source(input, dec, failed);
        if flags.treat_no_mapping_as_illegal {
            Err(Error::InvalidSequence)
        } else {
            Err(Error::NoCorrespondingCharacter)
        }
    }

    /// Writes the destination's replacement character.
    ///
    /// `Ok(false)` means the destination cannot encode it.
    fn write_replacement(&mut self, output: &mut &mut [u8]) -> Result<bool> {
        let ucs = self.desc.to().invalid_char();
        let enc = encode_replacement(self.desc.to(), &mut self.dst_state, ucs, output, &mut self.bridge);
        match enc.status {
            EncodeStatus::Complete => {
                advance(output, enc.written);
                Ok(true)
            }
            EncodeStatus::OutputFull => Err(Error::OutputTooSmall),
            EncodeStatus::Unencodable => Ok(false),
        }
    }

    /// Advances `input` past the first `k` items of the current batch and
    /// leaves the source state as it was right after item `k - 1`.
    fn commit_source(&mut self, input: &mut &[u8], dec: &Decoded, k: usize) {
        if k >= dec.count {
            *input = &input[dec.consumed..];
            return;
        }
        if k == 0 {
            self.src_state = self.src_rollback;
            return;
        }
        let end = self.batch.delta[k - 1];
        if self.desc.from().is_stateful() {
            self.src_state = self.src_rollback;
            let replay = decode_into(self.desc.from(), &mut self.src_state, &input[..end], &mut self.batch, k);
            debug_assert_eq!(replay.count, k);
        }
        *input = &input[end..];
    }
}

fn advance(output: &mut &mut [u8], n: usize) {
    let buf = std::mem::take(output);
    *output = &mut buf[n..];
}

fn fatal(entry: &SourceCharsetEntry, mapper: &str, index: Option<&Index>) -> Error {
    let reason = match index {
        Some(index) => format!("cannot map index {index:#x} of charset {}", entry.csid),
        None => format!("fault past the end of a run of charset {}", entry.csid),
    };
    Error::Fatal { mapper: mapper.to_string(), reason }
}

/// Remaps `batch[..n]` into the destination arrays.
///
/// Returns how many leading items were mapped; the item right after them,
/// if any, has no usable destination.
fn remap(desc: &ConversionDescriptor, batch: &mut Batch, n: usize, translit: bool) -> Result<usize> {
    if let Some((csid, cand)) = desc.lone_destination() {
        if batch.csid[..n].iter().all(|&c| c == csid) {
            if cand.identity {
                batch.mapped[..n].copy_from_slice(&batch.index[..n]);
                batch.dst_csid[..n].fill(cand.csid);
                batch.lossy[..n].fill(false);
                return Ok(n);
            }
            let m = cand.mapper.convert(&batch.index[..n], &mut batch.mapped[..n]);
            if m.outcome == MapOutcome::Success && m.converted == n {
                batch.dst_csid[..n].fill(cand.csid);
                batch.lossy[..n].fill(false);
                return Ok(n);
            }
        }
    }

    let mut pos = 0;
    while pos < n {
        let cs = batch.csid[pos];
        let run_end = pos + batch.csid[pos..n].iter().take_while(|&&c| c == cs).count();
        let Some(entry) = desc.entry(cs) else {
            return Ok(pos);
        };
        pos = remap_run(entry, batch, pos, run_end, translit)?;
        if pos < run_end {
            return Ok(pos);
        }
    }
    Ok(n)
}

/// Maps the run `batch[start..end]`, all of one source charset.
fn remap_run(entry: &SourceCharsetEntry, batch: &mut Batch, start: usize, end: usize, translit: bool) -> Result<usize> {
    let mut pos = start;
    'items: while pos < end {
        let mut tentative = None;
        for cand in &entry.candidates {
            let m = cand.mapper.convert(&batch.index[pos..end], &mut batch.mapped[pos..end]);
            if m.outcome == MapOutcome::Fatal {
                return Err(fatal(entry, cand.mapper.name(), batch.index[..end].get(pos + m.converted)));
            }
            let exact = match m.outcome {
                MapOutcome::NonIdentical => m.converted.saturating_sub(1),
                _ => m.converted,
            };
            if exact > 0 {
                batch.dst_csid[pos..pos + exact].fill(cand.csid);
                batch.lossy[pos..pos + exact].fill(false);
                pos += exact;
                continue 'items;
            }
            if m.outcome == MapOutcome::NonIdentical && m.converted == 1 && tentative.is_none() {
                tentative = Some((cand.csid, batch.mapped[pos]));
            }
        }
        match tentative {
            Some((csid, index)) if translit => {
                batch.mapped[pos] = index;
                batch.dst_csid[pos] = csid;
                batch.lossy[pos] = true;
                pos += 1;
            }
            _ => return Ok(pos),
        }
    }
    Ok(pos)
}

/// Decodes up to `limit` characters of `src` into the batch.
fn decode_into(codec: &Codec, state: &mut ShiftState, src: &[u8], batch: &mut Batch, limit: usize) -> Decoded {
    let limit = limit.min(MAX_BATCH);
    let (csid, index, delta) = (&mut batch.csid[..limit], &mut batch.index[..limit], &mut batch.delta[..limit]);
    match codec {
        Codec::Narrow(module) => module.decode_batch(state, src, csid, index, delta),
        Codec::Wide { locale, .. } => {
            let mut pos = 0;
            let mut count = 0;
            while count < limit && pos < src.len() {
                let Some(unit) = src[pos..].first_chunk::<WIDE_UNIT>() else {
                    return Decoded { count, consumed: pos, status: DecodeStatus::Incomplete };
                };
                let mut narrow = [0u8; 4];
                let mut one_csid = [CharsetId::UCS];
                let mut one_index = [0];
                let mut one_delta = [0];
                let decoded = locale.from_wide(u32::from_ne_bytes(*unit), &mut narrow).map(|len| {
                    let d = locale.decode_batch(
                        &mut locale.init_state(),
                        &narrow[..len],
                        &mut one_csid,
                        &mut one_index,
                        &mut one_delta,
                    );
                    d.count == 1 && d.consumed == len
                });
                if decoded != Some(true) {
                    return Decoded { count, consumed: pos, status: DecodeStatus::Invalid };
                }
                pos += WIDE_UNIT;
                csid[count] = one_csid[0];
                index[count] = one_index[0];
                delta[count] = pos;
                count += 1;
            }
            Decoded { count, consumed: pos, status: DecodeStatus::Complete }
        }
    }
}

/// Narrow bytes for one item through the locale, then its wide value.
fn widen(locale: &dyn EncodingModule, enc: Encoded, bridge: &[u8]) -> Option<u32> {
    if enc.count != 1 {
        return None;
    }
    locale.to_wide(&bridge[..enc.written])
}

/// Encodes items into `dst`; wide forms go through the bridge buffer.
fn encode_from(
    codec: &Codec,
    state: &mut ShiftState,
    csid: &[CharsetId],
    index: &[Index],
    dst: &mut [u8],
    bridge: &mut [u8; 8],
) -> Encoded {
    let Codec::Wide { locale, .. } = codec else {
        return codec.module().encode_batch(state, csid, index, dst);
    };
    let mut written = 0;
    for (i, (&cs, &idx)) in csid.iter().zip(index).enumerate() {
        let enc = locale.encode_batch(&mut locale.init_state(), &[cs], &[idx], bridge);
        let Some(wide) = widen(locale.as_ref(), enc, bridge) else {
            return Encoded { count: i, written, status: EncodeStatus::Unencodable };
        };
        let Some(slot) = dst.get_mut(written..written + WIDE_UNIT) else {
            return Encoded { count: i, written, status: EncodeStatus::OutputFull };
        };
        slot.copy_from_slice(&wide.to_ne_bytes());
        written += WIDE_UNIT;
    }
    Encoded { count: csid.len(), written, status: EncodeStatus::Complete }
}

fn encode_replacement(
    codec: &Codec,
    state: &mut ShiftState,
    ucs: u32,
    dst: &mut [u8],
    bridge: &mut [u8; 8],
) -> Encoded {
    let Codec::Wide { locale, .. } = codec else {
        return codec.module().encode_one_wide(state, ucs, dst);
    };
    let enc = locale.encode_one_wide(&mut locale.init_state(), ucs, bridge);
    let Some(wide) = widen(locale.as_ref(), enc, bridge) else {
        return Encoded { count: 0, written: 0, status: EncodeStatus::Unencodable };
    };
    match dst.get_mut(..WIDE_UNIT) {
        Some(slot) => {
            slot.copy_from_slice(&wide.to_ne_bytes());
            Encoded { count: 1, written: WIDE_UNIT, status: EncodeStatus::Complete }
        }
        None => Encoded { count: 0, written: 0, status: EncodeStatus::OutputFull },
    }
}

fn flush(codec: &Codec, state: &mut ShiftState, dst: &mut [u8]) -> Option<usize> {
    match codec {
        Codec::Narrow(module) => module.flush_state(state, dst),
        Codec::Wide { .. } => Some(0),
    }
}
