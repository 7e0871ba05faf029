//! Text extracted from a PDF and the combined paper response.

use serde::{Deserialize, Serialize};

use super::Metadata;

/// Flat text extracted from a PDF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    /// Full document text
    pub text: String,

    /// Number of pages in the document
    pub num_pages: usize,

    /// `/Title` from the document info dictionary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `/Author` from the document info dictionary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Text of a single page, numbered from 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
}

/// Ordered per-page texts
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredPages {
    pub pages: Vec<PageText>,
}

/// Text extraction result that keeps page boundaries
///
/// Invariants: `pages` are numbered `1..=n` without gaps, and `n` equals
/// `num_pages` unless the page-level pass failed, in which case there is
/// exactly one page holding the full flat text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContent {
    #[serde(flatten)]
    pub base: ExtractedText,

    pub structured_content: StructuredPages,

    /// Set when the page-level pass failed and the flat text was wrapped instead
    #[serde(skip)]
    pub degraded: bool,
}

impl StructuredContent {
    /// Build from page texts; the full text is the pages joined by blank lines
    pub fn from_pages(pages: Vec<String>, title: Option<String>, author: Option<String>) -> Self {
        let text = pages.join("\n\n");
        let pages: Vec<PageText> = pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| PageText {
                page_number: index + 1,
                text,
            })
            .collect();

        Self {
            base: ExtractedText {
                text,
                num_pages: pages.len(),
                title,
                author,
            },
            structured_content: StructuredPages { pages },
            degraded: false,
        }
    }

    /// Wrap a flat extraction as a single page covering the whole text
    pub fn single_page(flat: ExtractedText) -> Self {
        let page = PageText {
            page_number: 1,
            text: flat.text.clone(),
        };

        Self {
            base: flat,
            structured_content: StructuredPages { pages: vec![page] },
            degraded: true,
        }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.structured_content.pages
    }
}

/// A field of a combined response that is either present or replaced by an error marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    Available(T),
    Unavailable { error: String },
}

impl<T> Section<T> {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Section::Unavailable {
            error: message.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }
}

/// Metadata and flat text fetched together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePaper {
    pub metadata: Section<Metadata>,
    pub content: Section<ExtractedText>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pages_numbers_and_joins() {
        let content = StructuredContent::from_pages(
            vec!["first".to_string(), "second".to_string()],
            Some("T".to_string()),
            None,
        );

        assert_eq!(content.base.num_pages, 2);
        assert_eq!(content.base.text, "first\n\nsecond");
        assert_eq!(content.pages()[0].page_number, 1);
        assert_eq!(content.pages()[1].page_number, 2);
        assert!(!content.degraded);
    }

    #[test]
    fn test_single_page_keeps_reported_page_count() {
        let flat = ExtractedText {
            text: "all of it".to_string(),
            num_pages: 7,
            title: None,
            author: None,
        };
        let content = StructuredContent::single_page(flat);

        assert!(content.degraded);
        assert_eq!(content.pages().len(), 1);
        assert_eq!(content.pages()[0].text, "all of it");
        assert_eq!(content.base.num_pages, 7);
    }

    #[test]
    fn test_structured_json_shape() {
        let content = StructuredContent::from_pages(vec!["a".to_string()], None, None);
        let json = serde_json::to_value(&content).unwrap();

        assert_eq!(json["numPages"], 1);
        assert_eq!(json["text"], "a");
        assert!(json.get("title").is_none());
        assert!(json.get("degraded").is_none());
        assert_eq!(json["structuredContent"]["pages"][0]["pageNumber"], 1);
    }

    #[test]
    fn test_section_placeholder_json() {
        let section: Section<ExtractedText> = Section::unavailable("Text content not available");
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Text content not available" }));
        assert!(!section.is_available());
    }
}
