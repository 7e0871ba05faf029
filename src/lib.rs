//! # DOI PDF API
//!
//! Resolves a DOI to a PDF hosted on a document mirror, extracts its text and
//! serves the results over HTTP, with response caching and per-client rate
//! limiting.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Doi, Metadata, ExtractedText, Lookup, etc.)
//! - [`sources`]: CrossRef metadata and the mirror document source behind traits
//! - [`service`]: The paper pipeline (document, text, structured, metadata, complete)
//! - [`server`]: axum router, middleware and error responses
//! - [`utils`]: HTTP client, PDF extraction, retry, validation and the response cache
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod server;
pub mod service;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Doi, Lookup, LookupResult, Metadata};
pub use service::PaperService;
pub use sources::{DocumentSource, MetadataSource, SourceError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
