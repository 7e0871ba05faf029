//! Mirror source: DOI to page URL, page to embedded PDF, PDF to bytes.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, REFERER};
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::models::{Doi, Lookup, LookupResult, Miss};
use crate::sources::{check_status, default_strategies, DocumentSource, LinkStrategy, SourceError};
use crate::utils::{validate_base_url, with_retry, HttpClient, RetryConfig, ValidationError};

const DEFAULT_MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024;

/// Derives the mirror page URL for a DOI
#[derive(Debug, Clone)]
pub struct MirrorLocator {
    base_url: String,
}

impl MirrorLocator {
    /// Validates the base URL and ensures a trailing `/`
    pub fn new(base_url: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url + doi`, verbatim
    ///
    /// `None` only if the concatenation is not a parseable URL, which a DOI
    /// that passed validation cannot produce.
    pub fn locate(&self, doi: &Doi) -> Option<String> {
        let url = format!("{}{}", self.base_url, doi);
        match Url::parse(&url) {
            Ok(_) => Some(url),
            Err(e) => {
                tracing::error!("Error building mirror URL for DOI {}: {}", doi, e);
                None
            }
        }
    }
}

/// Resolve a scraped reference into the URL actually downloaded
///
/// Everything from the first `#` is dropped. Absolute `http(s)` references
/// pass through, protocol-relative ones get `https:`, anything else is
/// resolved against the page it was found on.
pub fn normalize_reference(reference: &str, page_url: &str) -> String {
    let reference = reference.split('#').next().unwrap_or_default().trim();

    if reference.starts_with("http") {
        return reference.to_string();
    }
    if reference.starts_with("//") {
        return format!("https:{}", reference);
    }

    match Url::parse(page_url).and_then(|base| base.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("https:{}", reference),
    }
}

/// Fetches a mirror page and downloads the PDF it embeds
#[derive(Debug)]
pub struct MirrorFetcher {
    client: Arc<HttpClient>,
    strategies: Vec<Box<dyn LinkStrategy>>,
    retry: RetryConfig,
    max_document_bytes: usize,
}

impl MirrorFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client: Arc::new(client),
            strategies: default_strategies(),
            retry: RetryConfig::default(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    /// Replace the link strategies; they are tried in order
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn LinkStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_document_bytes(mut self, max: usize) -> Self {
        self.max_document_bytes = max;
        self
    }

    /// Fetch the page at `page_url` and download the document it references
    pub async fn fetch(&self, page_url: &str) -> LookupResult<Bytes> {
        tracing::info!("Fetching HTML from {}", page_url);

        let html = self.fetch_page(page_url).await.map_err(|e| {
            tracing::error!("Error fetching mirror page {}: {}", page_url, e);
            e
        })?;

        if html.trim().is_empty() {
            tracing::warn!("Received empty HTML response from {}", page_url);
            return Ok(Lookup::Missing(Miss::EmptyPage));
        }
        tracing::info!("Received HTML response of length: {}", html.len());

        let Some(reference) = self.find_reference(&html) else {
            tracing::warn!("No PDF URL found in the HTML from {}", page_url);
            return Ok(Lookup::Missing(Miss::NoReference));
        };

        let pdf_url = normalize_reference(&reference, page_url);
        self.download(&pdf_url, page_url).await.map_err(|e| {
            tracing::error!("Error downloading PDF from {}: {}", pdf_url, e);
            e
        })
    }

    /// First reference any strategy finds
    pub fn find_reference(&self, html: &str) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.find(html)?;
            tracing::info!("Found PDF reference via {}: {}", strategy.name(), found);
            Some(found)
        })
    }

    async fn fetch_page(&self, page_url: &str) -> Result<String, SourceError> {
        let client = Arc::clone(&self.client);
        with_retry(self.retry, || {
            let client = Arc::clone(&client);
            async move {
                let response = client.get(page_url).send().await?;
                check_status(&response)?;
                Ok(response.text().await?)
            }
        })
        .await
    }

    async fn download(&self, pdf_url: &str, referer: &str) -> LookupResult<Bytes> {
        tracing::info!("Fetching PDF from {}", pdf_url);

        let mut response = self
            .client
            .get(pdf_url)
            .header(REFERER, referer)
            .header(ACCEPT, "application/pdf")
            .send()
            .await?;
        check_status(&response)?;

        let limit = self.max_document_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(SourceError::TooLarge { limit_bytes: limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(SourceError::TooLarge { limit_bytes: limit });
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            tracing::warn!("Received empty PDF from {}", pdf_url);
            return Ok(Lookup::Missing(Miss::EmptyDocument));
        }

        tracing::info!("Successfully retrieved PDF ({} bytes)", body.len());
        Ok(Lookup::Found(Bytes::from(body)))
    }
}

/// [`DocumentSource`] backed by the mirror: locate, then fetch
#[derive(Debug)]
pub struct MirrorSource {
    locator: MirrorLocator,
    fetcher: MirrorFetcher,
}

impl MirrorSource {
    pub fn new(locator: MirrorLocator, fetcher: MirrorFetcher) -> Self {
        Self { locator, fetcher }
    }

    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let base_url = config
            .mirror
            .base_url
            .as_deref()
            .ok_or_else(|| SourceError::Other("mirror.base_url is not configured".to_string()))?;
        let locator =
            MirrorLocator::new(base_url).map_err(|e| SourceError::Other(e.to_string()))?;

        let fetcher = MirrorFetcher::new(HttpClient::from_config(&config.http)?)
            .with_retry(RetryConfig::from(&config.retry))
            .with_max_document_bytes(config.mirror.max_document_mb.saturating_mul(1024 * 1024));

        Ok(Self::new(locator, fetcher))
    }

    pub fn locator(&self) -> &MirrorLocator {
        &self.locator
    }
}

#[async_trait]
impl DocumentSource for MirrorSource {
    fn id(&self) -> &str {
        "mirror"
    }

    async fn get_document(&self, doi: &Doi) -> LookupResult<Bytes> {
        let Some(page_url) = self.locator.locate(doi) else {
            return Ok(Lookup::Missing(Miss::Unresolved));
        };
        tracing::info!("Getting paper from mirror for DOI: {}", doi);
        self.fetcher.fetch(&page_url).await
    }
}
