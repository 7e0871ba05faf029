//! Data models for DOIs, bibliographic metadata and extracted document content.

mod content;
mod lookup;
mod paper;

pub use content::{
    CompletePaper, ExtractedText, PageText, Section, StructuredContent, StructuredPages,
};
pub use lookup::{Lookup, LookupResult, Miss};
pub use paper::{Doi, Metadata, PLACEHOLDER_AUTHORS, PLACEHOLDER_TITLE};
