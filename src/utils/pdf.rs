//! PDF text extraction utilities.
//!
//! Two passes are offered over the same in-memory document:
//!
//! - [`extract_flat_text`]: pdf-extract over the whole file, plus page count and
//!   the `/Title` and `/Author` entries of the info dictionary (via lopdf).
//! - [`extract_structured`]: pdf-extract text per page, in page-tree order. If
//!   that pass fails the flat text is wrapped as a single page instead.
//!
//! Both passes share the pdf-extract backend so the pages joined together read
//! the same as the flat text. lopdf is only used for the page count and the
//! info dictionary.
//!
//! Both are synchronous and CPU-bound; the `*_blocking` variants move them onto
//! tokio's blocking pool.

use bytes::Bytes;
use lopdf::{Document, Object};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::models::{ExtractedText, StructuredContent};

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    Flat(String),

    #[error("Failed to extract structured content from PDF: {0}")]
    Structured(String),

    #[error("PDF extraction task failed: {0}")]
    Join(String),
}

/// Extract the full text of a PDF together with its page count and info metadata
pub fn extract_flat_text(bytes: &[u8]) -> Result<ExtractedText, PdfExtractError> {
    tracing::info!("Extracting text from PDF of {} bytes", bytes.len());

    // both parsers panic on some malformed inputs
    guarded(
        || extract_whole(bytes),
        || PdfExtractError::Flat("text extractor panicked".to_string()),
    )
}

/// Extract text page by page, falling back to a single page of flat text
///
/// When both passes fail, the page-level error is returned.
pub fn extract_structured(bytes: &[u8]) -> Result<StructuredContent, PdfExtractError> {
    tracing::info!("Extracting structured content from PDF of {} bytes", bytes.len());

    with_fallback(
        || {
            guarded(
                || extract_pages(bytes),
                || PdfExtractError::Structured("page extractor panicked".to_string()),
            )
        },
        |err| {
            tracing::warn!("Page-level extraction failed ({}), using flat text", err);
            extract_flat_text(bytes).map(StructuredContent::single_page)
        },
    )
}

/// Run `primary`; on failure run `secondary` with the primary error in hand
///
/// If `secondary` fails as well its error is logged and dropped, and the
/// primary error is returned.
pub fn with_fallback<T, E, E2, P, S>(primary: P, secondary: S) -> Result<T, E>
where
    P: FnOnce() -> Result<T, E>,
    S: FnOnce(&E) -> Result<T, E2>,
    E2: std::fmt::Display,
{
    match primary() {
        Ok(value) => Ok(value),
        Err(primary_err) => match secondary(&primary_err) {
            Ok(value) => Ok(value),
            Err(secondary_err) => {
                tracing::debug!("Fallback failed as well: {}", secondary_err);
                Err(primary_err)
            }
        },
    }
}

/// [`extract_flat_text`] on the blocking pool
pub async fn extract_flat_text_blocking(bytes: Bytes) -> Result<ExtractedText, PdfExtractError> {
    tokio::task::spawn_blocking(move || extract_flat_text(&bytes))
        .await
        .map_err(|e| PdfExtractError::Join(e.to_string()))?
}

/// [`extract_structured`] on the blocking pool
pub async fn extract_structured_blocking(
    bytes: Bytes,
) -> Result<StructuredContent, PdfExtractError> {
    tokio::task::spawn_blocking(move || extract_structured(&bytes))
        .await
        .map_err(|e| PdfExtractError::Join(e.to_string()))?
}

/// Run an extraction pass, turning a panic inside it into `on_panic()`
fn guarded<T, P, E>(pass: P, on_panic: E) -> Result<T, PdfExtractError>
where
    P: FnOnce() -> Result<T, PdfExtractError>,
    E: FnOnce() -> PdfExtractError,
{
    panic::catch_unwind(AssertUnwindSafe(pass)).unwrap_or_else(|_| Err(on_panic()))
}

fn extract_whole(bytes: &[u8]) -> Result<ExtractedText, PdfExtractError> {
    let document = Document::load_mem(bytes).map_err(|e| PdfExtractError::Flat(e.to_string()))?;
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PdfExtractError::Flat(e.to_string()))?;

    Ok(ExtractedText {
        text,
        num_pages: document.get_pages().len(),
        title: info_string(&document, b"Title"),
        author: info_string(&document, b"Author"),
    })
}

fn extract_pages(bytes: &[u8]) -> Result<StructuredContent, PdfExtractError> {
    let document =
        Document::load_mem(bytes).map_err(|e| PdfExtractError::Structured(e.to_string()))?;

    let page_count = document.get_pages().len();
    if page_count == 0 {
        return Err(PdfExtractError::Structured(
            "document has no pages".to_string(),
        ));
    }

    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| PdfExtractError::Structured(e.to_string()))?;
    if texts.len() != page_count {
        return Err(PdfExtractError::Structured(format!(
            "extracted {} pages from a document of {}",
            texts.len(),
            page_count
        )));
    }

    Ok(StructuredContent::from_pages(
        texts.iter().map(|raw| collapse_whitespace(raw)).collect(),
        info_string(&document, b"Title"),
        info_string(&document, b"Author"),
    ))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Read a text string from the trailer's `/Info` dictionary
fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info = resolve(document, document.trailer.get(b"Info").ok()?)?;
    let value = resolve(document, info.as_dict().ok()?.get(key).ok()?)?;

    match value {
        Object::String(raw, _) => decode_text_string(raw),
        _ => None,
    }
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, else PDFDocEncoding)
fn decode_text_string(raw: &[u8]) -> Option<String> {
    if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }

    if let Some(rest) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).ok();
    }

    // PDFDocEncoding agrees with Latin-1 for the printable range
    Some(raw.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build a PDF with one line of Courier text per entry in `pages`
    pub fn pdf_with_pages(pages: &[&str], title: Option<&str>, author: Option<&str>) -> Vec<u8> {
        let pages: Vec<Vec<Operation>> = pages
            .iter()
            .map(|text| {
                vec![
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                ]
            })
            .collect();
        pdf_with_operations(pages, title, author)
    }

    /// Build a PDF whose pages each run the given text operations in Courier 12
    pub fn pdf_with_operations(
        pages: Vec<Vec<Operation>>,
        title: Option<&str>,
        author: Option<&str>,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
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
        for text_ops in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
            ];
            operations.extend(text_ops);
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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

        let mut info = lopdf::Dictionary::new();
        if let Some(title) = title {
            info.set("Title", Object::string_literal(title));
        }
        if let Some(author) = author {
            info.set("Author", Object::string_literal(author));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}
