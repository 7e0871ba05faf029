//! Upstream sources: the metadata registry and the document mirror.
//!
//! Two traits sit at the seams of the pipeline:
//!
//! - [`MetadataSource`]: DOI to bibliographic [`Metadata`]. Total; failures
//!   degrade to placeholder metadata instead of surfacing.
//! - [`DocumentSource`]: DOI to PDF bytes. Distinguishes "nothing there"
//!   ([`Lookup::Missing`]) from "something broke" (`Err`).
//!
//! The production implementations are [`CrossRefSource`] and [`MirrorSource`];
//! [`mock`] provides in-memory doubles for tests.
//!
//! [`Lookup::Missing`]: crate::models::Lookup::Missing

mod crossref;
mod mirror;
pub mod mock;
mod strategy;

pub use crossref::CrossRefSource;
pub use mirror::{normalize_reference, MirrorFetcher, MirrorLocator, MirrorSource};
pub use mock::{MockDocumentSource, MockMetadataSource};
pub use strategy::{default_strategies, DownloadButtonStrategy, EmbedStrategy, LinkStrategy};

use async_trait::async_trait;
use bytes::Bytes;

use crate::models::{Doi, LookupResult, Metadata};
use crate::utils::PdfExtractError;

/// Resolves bibliographic metadata for a DOI
#[async_trait]
pub trait MetadataSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "crossref")
    fn id(&self) -> &str;

    /// Look up metadata; never fails, falls back to [`Metadata::basic`]
    async fn resolve_metadata(&self, doi: &Doi) -> Metadata;
}

/// Retrieves the PDF for a DOI
#[async_trait]
pub trait DocumentSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "mirror")
    fn id(&self) -> &str;

    /// Fetch the document bytes
    async fn get_document(&self, doi: &Doi) -> LookupResult<Bytes>;
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection, timeout or body transfer failure
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Parsing error (JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Document larger than the configured ceiling
    #[error("Document exceeds the {limit_bytes} byte limit")]
    TooLarge { limit_bytes: usize },

    /// Text extraction failed
    #[error(transparent)]
    Extraction(#[from] PdfExtractError),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match (err.status(), err.url()) {
            (Some(status), Some(url)) if status.as_u16() == 429 => {
                tracing::debug!("Rate limited by {}", url);
                SourceError::RateLimit
            }
            (Some(status), url) => SourceError::Status {
                status: status.as_u16(),
                url: url.map(|u| u.to_string()).unwrap_or_default(),
            },
            (None, _) if err.is_decode() => SourceError::Parse(err.to_string()),
            _ => SourceError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Map a non-success response status to an error
pub(crate) fn check_status(response: &reqwest::Response) -> Result<(), SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status.as_u16() == 429 {
        return Err(SourceError::RateLimit);
    }
    Err(SourceError::Status {
        status: status.as_u16(),
        url: response.url().to_string(),
    })
}
