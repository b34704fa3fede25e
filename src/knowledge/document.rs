//! Document formats and plain-text extraction.

use std::fmt;
use std::path::Path;

use pulldown_cmark::{html, Parser};
use tracing::debug;

use crate::error::{Error, Result};

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Markdown,
    Json,
}

impl DocumentFormat {
    /// Detect from a bare extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    /// Detect from a file name or path.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse a caller-supplied format hint, failing on anything unsupported.
    pub fn from_hint(hint: &str) -> Result<Self> {
        Self::from_extension(hint).ok_or_else(|| Error::UnsupportedFormat(hint.to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Json => "json",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A document loaded for ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub format: DocumentFormat,
    pub text: String,
}

impl Document {
    /// Extract text from raw bytes in the given format.
    pub fn from_bytes(name: impl Into<String>, format: DocumentFormat, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let text = extract_text(format, bytes)?;
        debug!(document = %name, %format, chars = text.chars().count(), "extracted text");
        Ok(Self { name, format, text })
    }
}

/// Turn raw document bytes into the text that gets chunked.
pub fn extract_text(format: DocumentFormat, bytes: &[u8]) -> Result<String> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Markdown => render_markdown(utf8(bytes)?),
        DocumentFormat::Json => canonical_json(utf8(bytes)?),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::ParseError(format!("invalid UTF-8: {}", e)))
}

/// Concatenate the text of every page in page order.
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes)?;
    let mut text = String::new();

    // get_pages is a BTreeMap keyed by page number
    for page_number in doc.get_pages().keys() {
        let page_text = doc.extract_text(&[*page_number])?;
        text.push_str(&page_text);
    }

    Ok(text)
}

fn render_markdown(source: &str) -> Result<String> {
    let parser = Parser::new(source);
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    html::push_html(&mut out, parser);
    Ok(out)
}

/// Parse and re-serialise with stable two-space indentation.
fn canonical_json(source: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(source)
        .map_err(|e| Error::ParseError(format!("invalid JSON: {}", e)))?;
    serde_json::to_string_pretty(&value).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_from_paths() {
        assert_eq!(DocumentFormat::from_path("docs/faq.md"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_path("A.PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_path("data.Json"), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_path("notes.markdown"), Some(DocumentFormat::Markdown));
        assert_eq!(DocumentFormat::from_path("logo.png"), None);
        assert_eq!(DocumentFormat::from_path("README"), None);
    }

    #[test]
    fn hint_accepts_leading_dot() {
        assert_eq!(DocumentFormat::from_hint(".json").unwrap(), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_hint("MD").unwrap(), DocumentFormat::Markdown);
        assert!(matches!(
            DocumentFormat::from_hint("docx"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn markdown_is_rendered_to_html() {
        let text = extract_text(DocumentFormat::Markdown, b"# Admissions\n\nApply *early*.").unwrap();
        assert!(text.contains("<h1>Admissions</h1>"));
        assert!(text.contains("<em>early</em>"));
    }

    #[test]
    fn json_is_pretty_printed() {
        let text = extract_text(DocumentFormat::Json, br#"{"campus":{"name":"LPU"}}"#).unwrap();
        assert_eq!(text, "{\n  \"campus\": {\n    \"name\": \"LPU\"\n  }\n}");
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = extract_text(DocumentFormat::Json, b"{\"open\": ").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let err = extract_text(DocumentFormat::Markdown, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    /// Minimal PDF with one line of text per page.
    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
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
                "Resources" => resources_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn pdf_pages_are_concatenated_in_order() {
        let bytes = pdf_with_pages(&["Admissions open", "Hostel fees due"]);
        let text = extract_text(DocumentFormat::Pdf, &bytes).unwrap();

        let first = text.find("Admissions open").unwrap();
        let second = text.find("Hostel fees due").unwrap();
        assert!(first < second);
    }

    #[test]
    fn garbage_pdf_is_parse_error() {
        let err = extract_text(DocumentFormat::Pdf, b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn document_from_bytes_keeps_name_and_format() {
        let doc = Document::from_bytes("faq.md", DocumentFormat::Markdown, b"hello").unwrap();
        assert_eq!(doc.name, "faq.md");
        assert_eq!(doc.format, DocumentFormat::Markdown);
        assert_eq!(doc.text.trim(), "<p>hello</p>");
    }
}
