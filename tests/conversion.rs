//! End-to-end conversions through the public API.

use std::sync::Arc;

use fast_iconv::{
    CharsetId, CharsetMapper, ConversionContext, ConvertFlags, Error, Index, MapOutcome, Mapped, Registry, Translator,
};

fn convert_into(
    ctx: &mut ConversionContext,
    src: &[u8],
    room: usize,
    flags: ConvertFlags,
) -> (Vec<u8>, usize, Result<usize, Error>) {
    let mut input = src;
    let mut buf = vec![0u8; room];
    let mut output = &mut buf[..];
    let res = ctx.convert(&mut input, &mut output, flags);
    let written = room - output.len();
    buf.truncate(written);
    (buf, src.len() - input.len(), res)
}

#[test]
fn test_utf8_to_latin1_exact() {
    let desc = fast_iconv::open("UTF-8", "ISO-8859-1").unwrap();
    let mut ctx = ConversionContext::new(desc);
    let (out, consumed, res) = convert_into(&mut ctx, b"A\xC3\xA9B", 16, ConvertFlags::default());
    assert_eq!(out, b"A\xE9B");
    assert_eq!(consumed, 4);
    assert_eq!(res, Ok(0));
}

#[test]
fn test_utf8_to_ascii_stops_before_unconvertible() {
    let desc = fast_iconv::open("UTF-8", "ASCII").unwrap();
    let mut ctx = ConversionContext::new(desc);
    let (out, consumed, res) = convert_into(&mut ctx, b"A\xC3\xA9B", 16, ConvertFlags::default());
    assert_eq!(out, b"A");
    assert_eq!(consumed, 1);
    assert_eq!(res.unwrap_err().errno(), "EILSEQ");
}

#[test]
fn test_utf8_to_ascii_translit() {
    let desc = fast_iconv::open("UTF-8", "ASCII//TRANSLIT").unwrap();
    let mut ctx = ConversionContext::new(desc.clone());
    let (out, consumed, res) = convert_into(&mut ctx, b"A\xC3\xA9B", 16, desc.default_flags());
    assert_eq!(out, b"AeB");
    assert_eq!(consumed, 4);
    assert_eq!(res, Ok(1));
}

#[test]
fn test_truncated_input_resumes() {
    let desc = fast_iconv::open("UTF-8", "UTF-32BE").unwrap();
    let mut ctx = ConversionContext::new(desc);
    let (out, consumed, res) = convert_into(&mut ctx, b"x\xF0\x9F\x98", 16, ConvertFlags::default());
    assert_eq!(out, &[0, 0, 0, b'x']);
    assert_eq!(consumed, 1);
    assert_eq!(res.unwrap_err().errno(), "EINVAL");

    let (out, consumed, res) = convert_into(&mut ctx, b"\xF0\x9F\x98\x80", 16, ConvertFlags::default());
    assert_eq!(out, &[0, 0x01, 0xF6, 0x00]);
    assert_eq!(consumed, 4);
    assert_eq!(res, Ok(0));
}

#[test]
fn test_full_output_reports_e2big() {
    let desc = fast_iconv::open("ISO-8859-1", "UTF-16BE").unwrap();
    let mut ctx = ConversionContext::new(desc);
    let (out, consumed, res) = convert_into(&mut ctx, b"abc", 5, ConvertFlags::default());
    assert_eq!(out, &[0, b'a', 0, b'b']);
    assert_eq!(consumed, 2);
    assert_eq!(res, Err(Error::OutputTooSmall));
}

#[test]
fn test_utf16_bom_selects_byte_order() {
    let translator = Translator::new("UTF-16", "UTF-8").unwrap();
    assert_eq!(translator.convert(&[0xFF, 0xFE, 0x41, 0x00, 0xAC, 0x20]).unwrap(), "A€".as_bytes());
    assert_eq!(translator.convert(&[0xFE, 0xFF, 0x00, 0x41]).unwrap(), b"A");
    assert_eq!(translator.convert(&[0x00, 0x41]).unwrap(), b"A");

    let translator = Translator::new("UTF-8", "UTF-16").unwrap();
    assert_eq!(translator.convert(b"AB").unwrap(), &[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]);
}

#[test]
fn test_utf7_flush_closes_run() {
    let translator = Translator::new("UTF-8", "UTF-7").unwrap();
    assert_eq!(translator.convert("Hi Mom -\u{263A}-.".as_bytes()).unwrap(), b"Hi Mom -+Jjo--.");
    assert_eq!(translator.convert("\u{263A}".as_bytes()).unwrap(), b"+Jjo-");

    let back = Translator::new("UTF-7", "UTF-8").unwrap();
    assert_eq!(back.convert(b"Hi Mom -+Jjo--.").unwrap(), "Hi Mom -\u{263A}-.".as_bytes());
}

#[test]
fn test_wide_bridge_round_trip() {
    let text = "héllo €";
    let to_wide = Translator::new("UTF-8", "WCHAR_T").unwrap();
    let wide = to_wide.convert(text.as_bytes()).unwrap();
    let expected: Vec<u8> = text.chars().flat_map(|c| (c as u32).to_ne_bytes()).collect();
    assert_eq!(wide, expected);

    let from_wide = Translator::new("WCHAR_T", "UTF-8").unwrap();
    assert_eq!(from_wide.convert(&wide).unwrap(), text.as_bytes());

    // A partial unit waits for the rest.
    let desc = fast_iconv::open("WCHAR_T", "UTF-8").unwrap();
    let mut ctx = ConversionContext::new(desc);
    let (out, consumed, res) = convert_into(&mut ctx, &wide[..6], 16, ConvertFlags::default());
    assert_eq!(out, b"h");
    assert_eq!(consumed, 4);
    assert_eq!(res, Err(Error::IncompleteSequence));
}

#[test]
fn test_wide_form_over_legacy_locale() {
    let registry = Registry::with_builtins();
    registry.register_wide("WLATIN1", "ISO-8859-1").unwrap();
    let desc = registry.open("UTF-8", "WLATIN1").unwrap();
    let (wide, _) = ConversionContext::new(desc).convert_all("é".as_bytes(), ConvertFlags::default()).unwrap();
    assert_eq!(wide, 0xE9u32.to_ne_bytes());
}

#[derive(Debug)]
struct Faulty;

impl CharsetMapper for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn quality(&self) -> u32 {
        0
    }

    fn convert(&self, src: &[Index], dst: &mut [Index]) -> Mapped {
        for (i, &cp) in src.iter().enumerate() {
            if cp == 'z' as Index {
                return Mapped { converted: i, outcome: MapOutcome::Fatal };
            }
            dst[i] = cp;
        }
        Mapped { converted: src.len(), outcome: MapOutcome::Success }
    }
}

#[test]
fn test_fatal_mapper_fault() {
    let registry = Registry::with_builtins();
    registry.register_mapper(CharsetId::UCS, CharsetId::ASCII, Arc::new(Faulty));
    let desc = registry.open("UTF-8", "US-ASCII").unwrap();
    let mut ctx = ConversionContext::new(desc);

    let (out, consumed, res) = convert_into(&mut ctx, b"abz", 16, ConvertFlags::lossy());
    assert!(out.is_empty());
    assert_eq!(consumed, 0);
    let err = res.unwrap_err();
    assert!(matches!(err, Error::Fatal { ref mapper, .. } if mapper == "faulty"));
    assert_eq!(err.errno(), "EBADF");

    let (out, _, res) = convert_into(&mut ctx, b"ab", 16, ConvertFlags::default());
    assert_eq!(out, b"ab");
    assert_eq!(res, Ok(0));
}

#[test]
fn test_registry_is_isolated() {
    let registry = Registry::new();
    assert!(matches!(registry.open("UTF-8", "ASCII"), Err(Error::NotFound { .. })));
    assert!(Registry::builtin().open("UTF-8", "ASCII").is_ok());
}

#[test]
fn test_contexts_share_descriptor() {
    let desc = fast_iconv::open("UTF-8", "UTF-7").unwrap();
    let mut a = ConversionContext::new(desc.clone());
    let mut b = ConversionContext::new(desc.clone());
    assert!(Arc::ptr_eq(a.descriptor(), b.descriptor()));

    let (out_a, _, _) = convert_into(&mut a, "\u{263A}".as_bytes(), 16, ConvertFlags::default());
    let (out_b, _, _) = convert_into(&mut b, b"x", 16, ConvertFlags::default());
    assert_eq!(out_a, b"+Jj");
    assert_eq!(out_b, b"x");
}

#[test]
fn test_descriptor_cache_and_trivial() {
    let a = fast_iconv::open("latin1", "latin1").unwrap();
    let b = fast_iconv::open("ISO-8859-1", "L1").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.is_trivial());
    assert!(!fast_iconv::open("LATIN1", "UTF-8").unwrap().is_trivial());
}

#[test]
fn test_unsupported_conversion() {
    #[derive(Debug)]
    struct Klingon;

    impl fast_iconv::EncodingModule for Klingon {
        fn name(&self) -> &str {
            "KLINGON"
        }

        fn charsets(&self) -> &[CharsetId] {
            const CHARSETS: &[CharsetId] = &[CharsetId(CharsetId::USER_BASE)];
            CHARSETS
        }

        fn decode_batch(
            &self,
            _state: &mut fast_iconv::ShiftState,
            _src: &[u8],
            _csid: &mut [CharsetId],
            _index: &mut [Index],
            _delta: &mut [usize],
        ) -> fast_iconv::module::Decoded {
            unreachable!()
        }

        fn encode_batch(
            &self,
            _state: &mut fast_iconv::ShiftState,
            _csid: &[CharsetId],
            _index: &[Index],
            _dst: &mut [u8],
        ) -> fast_iconv::module::Encoded {
            unreachable!()
        }

        fn encode_one_wide(
            &self,
            _state: &mut fast_iconv::ShiftState,
            _ucs: u32,
            _dst: &mut [u8],
        ) -> fast_iconv::module::Encoded {
            unreachable!()
        }
    }

    let registry = Registry::with_builtins();
    registry.register_module(Arc::new(Klingon));
    let err = registry.open("UTF-8", "klingon").unwrap_err();
    assert_eq!(err, Error::UnsupportedConversion { from: "UTF-8".into(), to: "KLINGON".into() });
}
