//! Named ASCII control characters used by ASTM and HL7 links.

pub const EOT: u8 = 0x04;
pub const ENQ: u8 = 0x05;
pub const ACK: u8 = 0x06;
pub const LF: u8 = 0x0A;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const VT: u8 = 0x0B;
pub const CR: u8 = 0x0D;
pub const NAK: u8 = 0x15;
pub const ETB: u8 = 0x17;
pub const FS: u8 = 0x1C;

const NAMES: &[(&str, u8)] = &[
    ("STX", STX),
    ("ETX", ETX),
    ("EOT", EOT),
    ("ENQ", ENQ),
    ("ACK", ACK),
    ("LF", LF),
    ("VT", VT),
    ("CR", CR),
    ("NAK", NAK),
    ("ETB", ETB),
    ("FS", FS),
];

/// Byte value for a token name such as `STX`, case-insensitive.
pub fn lookup(name: &str) -> Option<u8> {
    let name = name.trim();
    NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, b)| *b)
}

/// Token name for a control byte, if it has one.
pub fn name_of(byte: u8) -> Option<&'static str> {
    NAMES.iter().find(|(_, b)| *b == byte).map(|(n, _)| *n)
}

/// Replace `<NAME>` tokens with their control characters.
///
/// Unknown tokens and unmatched `<` are kept verbatim, so HL7 text such as
/// `<root user>` survives.
pub fn expand_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) => match lookup(&after[..end]) {
                Some(byte) => {
                    out.push(byte as char);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('<');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Show control characters in `text` as `<NAME>` tokens for display.
pub fn render(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match u8::try_from(ch).ok().and_then(name_of) {
            Some(name) => {
                out.push('<');
                out.push_str(name);
                out.push('>');
            }
            None => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_known_tokens() {
        assert_eq!(expand_tokens("<STX>1H|\\^&<CR><ETX>A1"), "\u{2}1H|\\^&\r\u{3}A1");
        assert_eq!(expand_tokens("<ENQ>"), "\u{5}");
    }

    #[test]
    fn test_expand_tolerates_spacing_and_case() {
        assert_eq!(expand_tokens("< EOT >"), "\u{4}");
        assert_eq!(expand_tokens("<stx>x<etx>"), "\u{2}x\u{3}");
    }

    #[test]
    fn test_expand_keeps_unknown_text() {
        assert_eq!(expand_tokens("R|1||<root user>||F"), "R|1||<root user>||F");
        assert_eq!(expand_tokens("a < b"), "a < b");
        assert_eq!(expand_tokens("<<STX>"), "<\u{2}");
    }

    #[test]
    fn test_render_control_bytes() {
        assert_eq!(render("\u{2}ACK\u{3}"), "<STX>ACK<ETX>");
        assert_eq!(render("\u{b}MSH|\u{1c}\r"), "<VT>MSH|<FS><CR>");
        assert_eq!(render("plain é"), "plain é");
    }

    #[test]
    fn test_lookup_and_name() {
        assert_eq!(lookup("fs"), Some(0x1C));
        assert_eq!(lookup("XYZ"), None);
        assert_eq!(name_of(0x06), Some("ACK"));
        assert_eq!(name_of(b'A'), None);
    }
}
