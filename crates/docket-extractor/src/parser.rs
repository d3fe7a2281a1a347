//! Document bytes to plain text

use crate::resolver::decode_entities;
use docket_domain::traits::DocumentParser;
use docket_domain::FetchedDocument;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)\s*>").unwrap());
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6])\b[^>]*>").unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*").unwrap());

/// Errors produced while reading a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The PDF library rejected the document
    #[error("invalid PDF: {0}")]
    Pdf(String),

    /// The document parsed but held no text
    #[error("no text extracted from {0}")]
    Empty(&'static str),

    /// The content type is neither PDF nor text
    #[error("unsupported content type '{0}'")]
    Unsupported(String),
}

/// Parses PDF minutes, falling back to text and HTML bodies
///
/// PDF pages are extracted one by one and joined with a blank line; pages
/// without text are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextParser;

impl PdfTextParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    fn parse_pdf(&self, bytes: &[u8]) -> Result<String, ParseError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ParseError::Pdf(e.to_string()))?;

        let text = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if text.is_empty() {
            return Err(ParseError::Empty("PDF"));
        }
        Ok(text)
    }
}

impl DocumentParser for PdfTextParser {
    type Error = ParseError;

    fn parse(&self, document: &FetchedDocument) -> Result<String, ParseError> {
        let body = document.body.as_slice();
        let content_type = document
            .content_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        if looks_like_pdf(body) {
            return self.parse_pdf(body);
        }
        if content_type.contains("pdf") {
            return Err(ParseError::Pdf("missing %PDF header".to_string()));
        }

        let raw = String::from_utf8_lossy(body);
        let text = if content_type.contains("html") || looks_like_html(&raw) {
            html_to_text(&raw)
        } else if content_type.is_empty() || content_type.starts_with("text/") {
            raw.trim().to_string()
        } else {
            return Err(ParseError::Unsupported(content_type));
        };

        if text.is_empty() {
            return Err(ParseError::Empty("document"));
        }
        Ok(text)
    }
}

fn looks_like_pdf(body: &[u8]) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    body[start..].starts_with(b"%PDF")
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(16).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Strip markup from an HTML page, keeping block structure as line breaks
pub fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, "");
    let with_breaks = BLOCK_RE.replace_all(&without_scripts, "\n");
    let stripped = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);

    let lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    BLANK_LINES_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(content_type: Option<&str>, body: &[u8]) -> FetchedDocument {
        FetchedDocument {
            url: "https://council.example/doc".to_string(),
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.to_vec(),
        }
    }

    /// Build a one-page PDF per text with lopdf (the library pdf-extract reads with)
    fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_pdf_pages_are_joined() {
        let pdf = make_test_pdf(&["Council convened", "Motion carried"]);
        let text = PdfTextParser::new()
            .parse(&document(Some("application/pdf"), &pdf))
            .unwrap();

        assert!(text.contains("Council"), "got: {text}");
        assert!(text.contains("Motion"), "got: {text}");
        assert!(text.find("Council") < text.find("Motion"));
    }

    #[test]
    fn test_pdf_detected_without_content_type() {
        let pdf = make_test_pdf(&["Regular meeting"]);
        let text = PdfTextParser::new().parse(&document(None, &pdf)).unwrap();
        assert!(text.contains("Regular"), "got: {text}");
    }

    #[test]
    fn test_invalid_pdf_is_parse_error() {
        let result = PdfTextParser::new().parse(&document(Some("application/pdf"), b"%PDF-1.4 garbage"));
        assert!(matches!(result, Err(ParseError::Pdf(_))));

        let result = PdfTextParser::new().parse(&document(Some("application/pdf"), b"<html>login</html>"));
        assert!(matches!(result, Err(ParseError::Pdf(_))));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let text = PdfTextParser::new()
            .parse(&document(Some("text/plain; charset=utf-8"), b"  Minutes of the meeting\n"))
            .unwrap();
        assert_eq!(text, "Minutes of the meeting");
    }

    #[test]
    fn test_html_is_stripped() {
        let html = b"<html><head><style>p { color: red }</style></head>\
            <body><h1>Minutes</h1><p>Motion &amp; vote</p><script>track()</script></body></html>";
        let text = PdfTextParser::new()
            .parse(&document(Some("text/html"), html))
            .unwrap();
        assert_eq!(text, "Minutes\nMotion & vote");
    }

    #[test]
    fn test_empty_body_is_parse_error() {
        let result = PdfTextParser::new().parse(&document(Some("text/plain"), b"   "));
        assert_eq!(result, Err(ParseError::Empty("document")));
        assert_eq!(
            ParseError::Empty("PDF").to_string(),
            "no text extracted from PDF"
        );
    }

    #[test]
    fn test_binary_content_is_rejected() {
        let result = PdfTextParser::new().parse(&document(Some("image/png"), &[0x89, b'P', b'N', b'G']));
        assert_eq!(result, Err(ParseError::Unsupported("image/png".to_string())));
    }
}
