//! Utility modules supporting the paper pipeline.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts and a user agent
//! - [`with_retry`]: execute an operation with retry on transient errors
//! - [`validate_doi`], [`sanitize_filename`]: input checks at the HTTP boundary
//! - [`extract_flat_text`], [`extract_structured`]: PDF text extraction
//! - [`ResponseStore`], [`MemoryStore`]: response cache keyed by request signature
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use doi_pdf_api::sources::SourceError;
//! use doi_pdf_api::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let data = with_retry(RetryConfig::default(), || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod http;
mod pdf;
mod retry;
mod validate;

pub use cache::{cache_key, CacheResult, CachedResponse, MemoryStore, ResponseStore};
pub use http::{default_user_agent, HttpClient};
pub use pdf::{
    extract_flat_text, extract_flat_text_blocking, extract_structured,
    extract_structured_blocking, with_fallback, PdfExtractError,
};
pub use retry::{with_retry, RetryConfig, TransientError};
pub use validate::{
    sanitize_filename, validate_base_url, validate_doi, ValidationError, DOI_PATTERN,
};

#[cfg(test)]
pub(crate) use pdf::fixtures;
