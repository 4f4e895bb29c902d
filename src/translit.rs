//! Approximations used when a character has no exact counterpart.
//!
//! Every entry maps to a single ASCII character, so a transliterated item
//! still occupies exactly one slot of the batch.

/// ASCII stand-in for `cp`, if one is known.
pub fn approximate(cp: u32) -> Option<u32> {
    let ch = char::from_u32(cp)?;
    let approx = match ch {
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'Ð' | 'Ď' | 'Đ' => 'D',
        'ð' | 'ď' | 'đ' => 'd',
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ł' => 'L',
        'ĺ' | 'ļ' | 'ľ' | 'ł' => 'l',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'Ŕ' | 'Ŗ' | 'Ř' => 'R',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'Ţ' | 'Ť' | 'Ŧ' => 'T',
        'ţ' | 'ť' | 'ŧ' => 't',
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'Ý' | 'Ÿ' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        'ź' | 'ż' | 'ž' => 'z',
        '×' => 'x',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' | '«' | '»' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        '\u{00A0}' | '\u{2002}'..='\u{200A}' | '\u{202F}' => ' ',
        '\u{2022}' | '\u{2027}' => '*',
        '\u{2039}' => '<',
        '\u{203A}' => '>',
        '\u{2044}' | '\u{2215}' => '/',
        '¡' => '!',
        '¿' => '?',
        '¦' => '|',
        '·' => '.',
        _ => return None,
    };
    Some(approx as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(ch: char) -> Option<char> {
        approximate(ch as u32).and_then(char::from_u32)
    }

    #[test]
    fn test_accented_letters() {
        assert_eq!(approx('é'), Some('e'));
        assert_eq!(approx('Å'), Some('A'));
        assert_eq!(approx('ł'), Some('l'));
        assert_eq!(approx('Ž'), Some('Z'));
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(approx('\u{201C}'), Some('"'));
        assert_eq!(approx('\u{2014}'), Some('-'));
        assert_eq!(approx('\u{00A0}'), Some(' '));
    }

    #[test]
    fn test_unknown_characters() {
        assert_eq!(approx('A'), None);
        assert_eq!(approx('\u{65E5}'), None);
        assert_eq!(approximate(0xD800), None);
    }
}
