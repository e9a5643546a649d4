//! Plain-text extraction.

use std::sync::OnceLock;

use regex::bytes::Regex;
use tracing::debug;

use super::{ContentKind, TextExtractor};

/// Share of U+FFFD replacement characters above which decoded bytes are
/// treated as binary.
const MAX_REPLACEMENT_RATIO: f32 = 0.10;

/// Text extractor for UTF-8 payloads and uncompressed PDF content.
///
/// PDFs yield the literal strings shown by `Tj` and `TJ` operators.
/// Compressed content streams are not inflated, so many real-world PDFs
/// produce little or no text. Images always yield an empty string.
#[derive(Debug, Clone, Default)]
pub struct Utf8TextExtractor;

impl Utf8TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for Utf8TextExtractor {
    fn extract(&self, file_bytes: &[u8]) -> String {
        let text = match ContentKind::sniff(file_bytes) {
            ContentKind::Image => String::new(),
            ContentKind::Pdf => pdf_text(file_bytes),
            ContentKind::Other => plain_text(file_bytes),
        };
        debug!(chars = text.len(), "Text extracted");
        text
    }

    fn name(&self) -> &'static str {
        "text_extractor"
    }
}

fn plain_text(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let total = decoded.chars().count();
    if total == 0 {
        return String::new();
    }

    let replaced = decoded.chars().filter(|c| *c == char::REPLACEMENT_CHARACTER).count();
    let nul = decoded.chars().filter(|c| *c == '\0').count();
    if (replaced + nul) as f32 / total as f32 > MAX_REPLACEMENT_RATIO {
        return String::new();
    }
    decoded.trim().to_string()
}

/// Content-stream patterns, compiled once.
static PDF_PATTERNS: OnceLock<PdfPatterns> = OnceLock::new();

struct PdfPatterns {
    /// `(...) Tj`, `(...) '` and `[ (...) 120 (...) ] TJ`
    show_text: Regex,
    literal: Regex,
}

fn patterns() -> &'static PdfPatterns {
    PDF_PATTERNS.get_or_init(|| PdfPatterns {
        show_text: Regex::new(
            r"(?s-u)(\((?:[^()\\]|\\.)*\))\s*(?:Tj|')|\[((?:[^\]\\]|\\.)*)\]\s*TJ",
        )
        .expect("show_text regex must compile"),
        literal: Regex::new(r"(?s-u)\(((?:[^()\\]|\\.)*)\)").expect("literal regex must compile"),
    })
}

fn pdf_text(bytes: &[u8]) -> String {
    let mut lines = Vec::new();

    for caps in patterns().show_text.captures_iter(bytes) {
        if let Some(single) = caps.get(1) {
            lines.push(unescape_literal(strip_parens(single.as_bytes())));
        } else if let Some(array) = caps.get(2) {
            let joined: String = patterns()
                .literal
                .captures_iter(array.as_bytes())
                .filter_map(|c| c.get(1))
                .map(|m| unescape_literal(m.as_bytes()))
                .collect();
            lines.push(joined);
        }
    }

    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_parens(literal: &[u8]) -> &[u8] {
    if literal.len() >= 2 {
        &literal[1..literal.len() - 1]
    } else {
        literal
    }
}

/// Undo PDF literal-string escapes (`\n`, `\(`, `\\`, octal `\ddd`).
fn unescape_literal(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' || i + 1 >= raw.len() {
            out.push(b);
            i += 1;
            continue;
        }

        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xFF) as u8);
            }
            b'\r' | b'\n' => {}
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let extractor = Utf8TextExtractor::new();
        assert_eq!(
            extractor.extract(b"  Invoice #12345, amount 500\n"),
            "Invoice #12345, amount 500"
        );
    }

    #[test]
    fn test_binary_yields_empty() {
        let extractor = Utf8TextExtractor::new();
        assert_eq!(extractor.extract(&[0u8, 159, 146, 150, 0, 0, 0xFE]), "");
        assert_eq!(extractor.extract(&[0xFF, 0xD8, 0xFF, 0xE0, b'a', b'b']), "");
    }

    #[test]
    fn test_pdf_literals() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Length 60 >>\nstream\nBT /F1 12 Tf (Invoice \\(copy\\)) Tj ET\nBT [(Amount) -250 (500)] TJ ET\nendstream\nendobj\n";
        let text = Utf8TextExtractor::new().extract(pdf);
        assert_eq!(text, "Invoice (copy)\nAmount500");
    }

    #[test]
    fn test_octal_escape() {
        assert_eq!(unescape_literal(b"A\\101\\n"), "AA\n");
    }
}
