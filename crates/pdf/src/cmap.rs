//! ToUnicode CMap parsing.
//!
//! Chinese-language PDFs almost always use Type0 fonts whose glyph codes are
//! meaningless without the font's ToUnicode stream. Only the parts needed for
//! text extraction are handled: `codespacerange` (code width), `bfchar`, and
//! both `bfrange` forms.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Code → Unicode mapping for one font.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToUnicodeMap {
    /// Width in bytes of a character code, from the codespace range.
    code_bytes: usize,
    map: HashMap<u32, String>,
}

fn hex_token() -> &'static Regex {
    static RE_HEX: OnceLock<Regex> = OnceLock::new();
    RE_HEX.get_or_init(|| Regex::new(r"<([0-9A-Fa-f]*)>").unwrap())
}

/// One `bfrange` entry, either `<lo> <hi> [<dst> ...]` or `<lo> <hi> <dst>`.
///
/// Both forms share one pattern so an array's destinations are never read
/// as a sequential entry of their own.
fn bfrange_entry() -> &'static Regex {
    static RE_RANGE: OnceLock<Regex> = OnceLock::new();
    RE_RANGE.get_or_init(|| {
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:\[([^\]]*)\]|<([0-9A-Fa-f]+)>)")
            .unwrap()
    })
}

/// Ranges wider than a two-byte codespace are skipped.
const MAX_RANGE_CODES: u32 = 0x1_0000;

/// Sections between every `begin`/`end` marker pair.
fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(begin) {
        let after = &rest[start + begin.len()..];
        let Some(stop) = after.find(end) else {
            break;
        };
        found.push(&after[..stop]);
        rest = &after[stop + end.len()..];
    }
    found
}

/// Decode a destination hex string as UTF-16BE.
fn utf16_hex(hex: &str) -> Option<String> {
    if hex.is_empty() || hex.len() % 4 != 0 {
        // Odd-width destinations are single code points.
        let code = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(code).map(String::from);
    }
    let units: Vec<u16> = (0..hex.len())
        .step_by(4)
        .filter_map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
        .collect();
    let decoded = String::from_utf16(&units).ok()?;
    (!decoded.is_empty()).then_some(decoded)
}

/// Add `offset` to the last UTF-16 unit of a sequential bfrange destination.
fn offset_destination(hex: &str, offset: u32) -> Option<String> {
    let base = utf16_hex(hex)?;
    let mut chars: Vec<char> = base.chars().collect();
    let last = chars.pop()?;
    chars.push(char::from_u32((last as u32).checked_add(offset)?)?);
    Some(chars.into_iter().collect())
}

impl ToUnicodeMap {
    /// Parse a (decompressed) ToUnicode stream.
    pub fn parse(data: &[u8]) -> Self {
        let content = String::from_utf8_lossy(data);
        let mut cmap = ToUnicodeMap::default();

        for section in sections(&content, "begincodespacerange", "endcodespacerange") {
            if let Some(cap) = hex_token().captures(section) {
                cmap.code_bytes = cmap.code_bytes.max(cap[1].len().div_ceil(2));
            }
        }

        for section in sections(&content, "beginbfchar", "endbfchar") {
            let tokens: Vec<&str> = hex_token()
                .captures_iter(section)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            for pair in tokens.chunks_exact(2) {
                cmap.note_width(pair[0]);
                let Ok(src) = u32::from_str_radix(pair[0], 16) else {
                    continue;
                };
                if let Some(dst) = utf16_hex(pair[1]) {
                    cmap.map.insert(src, dst);
                }
            }
        }

        for section in sections(&content, "beginbfrange", "endbfrange") {
            for caps in bfrange_entry().captures_iter(section) {
                cmap.parse_bfrange(&caps);
            }
        }

        if cmap.code_bytes == 0 {
            cmap.code_bytes = 1;
        }

        log::trace!(
            "parsed ToUnicode map: {} codes, {} byte(s) per code",
            cmap.map.len(),
            cmap.code_bytes
        );

        cmap
    }

    fn note_width(&mut self, src_hex: &str) {
        if self.code_bytes == 0 {
            self.code_bytes = src_hex.len().div_ceil(2);
        }
    }

    fn parse_bfrange(&mut self, caps: &regex::Captures) {
        self.note_width(&caps[1]);
        let (Ok(lo), Ok(hi)) = (
            u32::from_str_radix(&caps[1], 16),
            u32::from_str_radix(&caps[2], 16),
        ) else {
            return;
        };
        if hi < lo || hi - lo >= MAX_RANGE_CODES {
            log::debug!("skipping bfrange <{:X}> <{:X}>", lo, hi);
            return;
        }

        if let Some(array) = caps.get(3) {
            let dests = hex_token()
                .captures_iter(array.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str()));
            for (code, dst) in (lo..=hi).zip(dests) {
                if let Some(text) = utf16_hex(dst) {
                    self.map.insert(code, text);
                }
            }
        } else if let Some(dst) = caps.get(4) {
            for code in lo..=hi {
                if let Some(text) = offset_destination(dst.as_str(), code - lo) {
                    self.map.insert(code, text);
                }
            }
        }
    }

    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Decode a shown string. Unmapped codes are dropped.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let width = self.code_bytes.max(1);
        bytes
            .chunks(width)
            .filter_map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                self.lookup(code)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CJK_CMAP: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
3 beginbfchar
<0012> <6771>
<0013> <5317>
<0020> <0020>
endbfchar
2 beginbfrange
<0030> <0032> <0031>
<0040> <0041> [<4E2D> <74B0>]
endbfrange
endcmap";

    #[test]
    fn test_codespace_sets_width() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.code_bytes(), 2);
    }

    #[test]
    fn test_bfchar() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.lookup(0x12), Some("東"));
        assert_eq!(cmap.lookup(0x13), Some("北"));
    }

    #[test]
    fn test_bfrange_sequential() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.lookup(0x30), Some("1"));
        assert_eq!(cmap.lookup(0x32), Some("3"));
    }

    #[test]
    fn test_bfrange_array() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.lookup(0x40), Some("中"));
        assert_eq!(cmap.lookup(0x41), Some("環"));
    }

    #[test]
    fn test_decode_two_byte_codes() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.decode(&[0x00, 0x12, 0x00, 0x13]), "東北");
        assert_eq!(cmap.decode(&[0x00, 0x40, 0x00, 0x41]), "中環");
    }

    #[test]
    fn test_decode_drops_unmapped() {
        let cmap = ToUnicodeMap::parse(CJK_CMAP);
        assert_eq!(cmap.decode(&[0x00, 0x12, 0x7F, 0x7F]), "東");
    }

    #[test]
    fn test_single_byte_without_codespace() {
        let cmap = ToUnicodeMap::parse(b"beginbfchar\n<41> <0041>\nendbfchar");
        assert_eq!(cmap.code_bytes(), 1);
        assert_eq!(cmap.decode(b"AA"), "AA");
    }

    #[test]
    fn test_surrogate_pair_destination() {
        let cmap = ToUnicodeMap::parse(b"beginbfchar\n<01> <D840DC0B>\nendbfchar");
        assert_eq!(cmap.lookup(1), Some("\u{2000B}"));
    }

    #[test]
    fn test_bfrange_entries_on_one_line() {
        let cmap = ToUnicodeMap::parse(
            b"2 beginbfrange <0001> <0001> <6771> <0002> <0002> <5317> endbfrange",
        );
        assert_eq!(cmap.lookup(1), Some("東"));
        assert_eq!(cmap.lookup(2), Some("北"));
    }

    #[test]
    fn test_bfrange_carriage_return_separators() {
        let cmap = ToUnicodeMap::parse(
            b"1 begincodespacerange\r<0000> <FFFF>\rendcodespacerange\r\
              3 beginbfrange\r<0001> <0002> [<6771> <5317>]\r<0010> <0012> <0031>\r\
              <0020> <0020> <4E2D>\rendbfrange",
        );
        assert_eq!(cmap.decode(&[0x00, 0x01, 0x00, 0x02]), "東北");
        assert_eq!(cmap.lookup(0x12), Some("3"));
        assert_eq!(cmap.lookup(0x20), Some("中"));
    }

    #[test]
    fn test_bfrange_array_destinations_are_not_ranges() {
        let cmap = ToUnicodeMap::parse(
            b"beginbfrange\n<0001> <0004> [<0041> <0042> <0043> <0044>]\nendbfrange",
        );
        assert_eq!(cmap.decode(&[0x00, 0x01, 0x00, 0x04]), "AD");
        assert_eq!(cmap.lookup(0x41), None);
    }

    #[test]
    fn test_oversized_bfrange_is_skipped() {
        let cmap = ToUnicodeMap::parse(
            b"beginbfrange\n<00000000> <FFFFFFFF> <0041>\n<0041> <0041> <0061>\nendbfrange",
        );
        assert_eq!(cmap.lookup(0), None);
        assert_eq!(cmap.lookup(0x41), Some("a"));
    }

    #[test]
    fn test_full_two_byte_identity_range() {
        let cmap = ToUnicodeMap::parse(b"beginbfrange\n<0000> <FFFF> <0000>\nendbfrange");
        assert_eq!(cmap.lookup(0x6771), Some("東"));
    }

    #[test]
    fn test_sequential_offset_past_char_max() {
        let cmap = ToUnicodeMap::parse(b"beginbfrange\n<0000> <0001> <DBFFDFFF>\nendbfrange");
        assert_eq!(cmap.lookup(0), Some("\u{10FFFF}"));
        assert_eq!(cmap.lookup(1), None);
    }

    #[test]
    fn test_empty_stream() {
        let cmap = ToUnicodeMap::parse(b"");
        assert!(cmap.is_empty());
        assert_eq!(cmap.decode(b"abc"), "");
    }
}
