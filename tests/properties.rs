//! Property tests for the conversion loop.

use fast_iconv::{ConversionContext, ConvertFlags, Error, StreamingTranslator, Translator};
use proptest::prelude::*;

const ASCII_SUPERSETS: &[&str] =
    &["UTF-8", "ISO-8859-1", "ISO-8859-2", "ISO-8859-15", "WINDOWS-1252", "KOI8-R", "CP437", "MACINTOSH"];

fn convert_all(
    from: &str,
    to: &str,
    width: usize,
    input: &[u8],
    flags: ConvertFlags,
) -> Result<(Vec<u8>, usize), Error> {
    let desc = fast_iconv::open(from, to).unwrap();
    ConversionContext::new(desc).with_batch_width(width).convert_all(input, flags)
}

fn flags() -> impl Strategy<Value = ConvertFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(discard_illegal, hide_invalid_in_output, translit)| {
        ConvertFlags { discard_illegal, hide_invalid_in_output, translit, treat_no_mapping_as_illegal: false }
    })
}

proptest! {
    #[test]
    fn prop_batch_width_does_not_change_result(
        input in prop::collection::vec(any::<u8>(), 0..256),
        flags in flags(),
    ) {
        let pairs = [("UTF-8", "ISO-8859-1"), ("UTF-8", "UTF-16LE"), ("WINDOWS-1252", "ASCII"), ("UTF-16", "UTF-8")];
        for (from, to) in pairs {
            let narrow = convert_all(from, to, 1, &input, flags);
            let wide = convert_all(from, to, 64, &input, flags);
            prop_assert_eq!(narrow, wide, "{} -> {}", from, to);
        }
    }

    #[test]
    fn prop_stateful_source_width_independent(text in "\\PC{0,64}", width in 1usize..64) {
        let utf7 = Translator::new("UTF-8", "UTF-7").unwrap().convert(text.as_bytes()).unwrap();
        let (back, invalid) = convert_all("UTF-7", "UTF-8", width, &utf7, ConvertFlags::default()).unwrap();
        prop_assert_eq!(back, text.as_bytes());
        prop_assert_eq!(invalid, 0);
    }

    #[test]
    fn prop_malformed_utf7_width_independent(
        input in prop::collection::vec(prop::sample::select(b"+-/AZaz09.! \x80".to_vec()), 0..48),
        flags in flags(),
    ) {
        let narrow = convert_all("UTF-7", "UTF-8", 1, &input, flags);
        let wide = convert_all("UTF-7", "UTF-8", 64, &input, flags);
        prop_assert_eq!(narrow, wide);
    }

    #[test]
    fn prop_chunked_feed_matches_whole(
        text in "\\PC{0,64}",
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let bytes = text.as_bytes();
        let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
        points.sort_unstable();

        for to in ["UTF-7", "UTF-16", "WCHAR_T"] {
            let whole = Translator::new("UTF-8", to).unwrap().convert(bytes).unwrap();

            let mut stream = StreamingTranslator::new("UTF-8", to, 16).unwrap();
            let mut out = Vec::new();
            let mut start = 0;
            for &end in &points {
                out.extend(stream.process_chunk(&bytes[start..end]).unwrap());
                start = end;
            }
            out.extend(stream.process_chunk(&bytes[start..]).unwrap());
            out.extend(stream.finish().unwrap());
            prop_assert_eq!(&out, &whole, "UTF-8 -> {}", to);
        }
    }

    #[test]
    fn prop_consumed_input_matches_output(input in prop::collection::vec(any::<u8>(), 0..128), room in 0usize..32) {
        // Whatever was consumed converts on its own to exactly what was written.
        let desc = fast_iconv::open("UTF-8", "UTF-16BE").unwrap();
        let mut ctx = ConversionContext::new(desc);
        let mut rest = &input[..];
        let mut buf = vec![0u8; room];
        let mut output = &mut buf[..];
        let _ = ctx.convert(&mut rest, &mut output, ConvertFlags::default());
        let written = room - output.len();
        let consumed = &input[..input.len() - rest.len()];

        let (expected, _) = convert_all("UTF-8", "UTF-16BE", 64, consumed, ConvertFlags::default()).unwrap();
        prop_assert_eq!(&buf[..written], &expected[..]);
    }

    #[test]
    fn prop_discard_keeps_exactly_the_valid_characters(input in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assume!(!input.windows(3).any(|w| w == "\u{FFFD}".as_bytes()));
        let flags = ConvertFlags { discard_illegal: true, ..ConvertFlags::default() };
        let (out, invalid) = convert_all("UTF-8", "UTF-8", 64, &input, flags).unwrap();

        let expected: String = String::from_utf8_lossy(&input).chars().filter(|&c| c != '\u{FFFD}').collect();
        prop_assert_eq!(out, expected.into_bytes());
        prop_assert_eq!(invalid, 0);
    }

    #[test]
    fn prop_ascii_is_preserved_between_supersets(
        text in "[\\x00-\\x7F]{0,128}",
        a in 0..ASCII_SUPERSETS.len(),
        b in 0..ASCII_SUPERSETS.len(),
    ) {
        let (from, to) = (ASCII_SUPERSETS[a], ASCII_SUPERSETS[b]);
        let out = Translator::new(from, to).unwrap().convert(text.as_bytes()).unwrap();
        prop_assert_eq!(out, text.as_bytes(), "{} -> {}", from, to);
    }

    #[test]
    fn prop_reset_is_idempotent(text in "\\PC{0,32}") {
        let desc = fast_iconv::open("UTF-8", "UTF-7").unwrap();
        let mut ctx = ConversionContext::new(desc);
        let mut input = text.as_bytes();
        let mut buf = vec![0u8; text.len() * 8 + 8];
        let mut output = &mut buf[..];
        ctx.convert(&mut input, &mut output, ConvertFlags::default()).unwrap();
        ctx.reset(Some(&mut output)).unwrap();

        let room = output.len();
        ctx.reset(Some(&mut output)).unwrap();
        prop_assert_eq!(output.len(), room);
        prop_assert_eq!(ctx.invalid_total(), 0);
    }
}
