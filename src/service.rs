//! Paper service: composes the sources and the extractor into the five
//! operations served over HTTP and the CLI.

use bytes::Bytes;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{
    CompletePaper, Doi, ExtractedText, Lookup, LookupResult, Metadata, Miss, Section,
    StructuredContent,
};
use crate::sources::{CrossRefSource, DocumentSource, MetadataSource, MirrorSource, SourceError};
use crate::utils::{extract_flat_text_blocking, extract_structured_blocking, RetryConfig};

/// Placeholder for an absent metadata section in [`CompletePaper`]
pub const METADATA_UNAVAILABLE: &str = "Metadata not available";

/// Placeholder for an absent content section in [`CompletePaper`]
pub const TEXT_UNAVAILABLE: &str = "Text content not available";

/// Orchestrates metadata lookup, document retrieval and text extraction
#[derive(Debug, Clone)]
pub struct PaperService {
    metadata: Arc<dyn MetadataSource>,
    documents: Arc<dyn DocumentSource>,
}

impl PaperService {
    pub fn new(metadata: Arc<dyn MetadataSource>, documents: Arc<dyn DocumentSource>) -> Self {
        Self {
            metadata,
            documents,
        }
    }

    /// Wire up CrossRef and the configured mirror
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let crossref = CrossRefSource::new(&config.crossref, &config.http)?
            .with_retry_config(RetryConfig::from(&config.retry));
        let mirror = MirrorSource::from_config(config)?;

        Ok(Self::new(Arc::new(crossref), Arc::new(mirror)))
    }

    /// Locate and fetch the PDF
    pub async fn get_document(&self, doi: &Doi) -> LookupResult<Bytes> {
        let result = self.documents.get_document(doi).await?;
        if let Lookup::Missing(miss) = &result {
            tracing::warn!("No document for DOI {} from {}: {}", doi, self.documents.id(), miss);
        }
        Ok(result)
    }

    /// Fetch the PDF and extract its full text
    pub async fn get_text(&self, doi: &Doi) -> LookupResult<ExtractedText> {
        match self.get_document(doi).await? {
            Lookup::Found(bytes) => Ok(Lookup::Found(extract_flat_text_blocking(bytes).await?)),
            Lookup::Missing(miss) => Ok(Lookup::Missing(miss)),
        }
    }

    /// Fetch the PDF and extract its text page by page
    pub async fn get_structured_content(&self, doi: &Doi) -> LookupResult<StructuredContent> {
        match self.get_document(doi).await? {
            Lookup::Found(bytes) => {
                let content = extract_structured_blocking(bytes).await?;
                if content.degraded {
                    tracing::warn!("Structured extraction for DOI {} degraded to a single page", doi);
                }
                Ok(Lookup::Found(content))
            }
            Lookup::Missing(miss) => Ok(Lookup::Missing(miss)),
        }
    }

    /// Resolve metadata; always found, possibly as placeholders
    pub async fn get_metadata(&self, doi: &Doi) -> LookupResult<Metadata> {
        tracing::info!("Getting metadata for DOI: {} via {}", doi, self.metadata.id());
        Ok(Lookup::Found(self.metadata.resolve_metadata(doi).await))
    }

    /// Metadata and full text, fetched concurrently
    ///
    /// A failed document lookup only blanks the content section; the result is
    /// missing only when neither section is available.
    pub async fn get_complete(&self, doi: &Doi) -> LookupResult<CompletePaper> {
        let (metadata, text) = tokio::join!(self.get_metadata(doi), self.get_text(doi));
        let metadata = metadata?;

        let (content, miss) = match text {
            Ok(Lookup::Found(text)) => (Some(text), None),
            Ok(Lookup::Missing(miss)) => (None, Some(miss)),
            Err(e) => {
                tracing::warn!("Text unavailable for DOI {}: {}", doi, e);
                (None, None)
            }
        };

        match (metadata.found(), content) {
            (None, None) => Ok(Lookup::Missing(miss.unwrap_or(Miss::Unresolved))),
            (metadata, content) => Ok(Lookup::Found(CompletePaper {
                metadata: metadata
                    .map(Section::Available)
                    .unwrap_or_else(|| Section::unavailable(METADATA_UNAVAILABLE)),
                content: content
                    .map(Section::Available)
                    .unwrap_or_else(|| Section::unavailable(TEXT_UNAVAILABLE)),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{make_metadata, MockDocumentSource, MockMetadataSource};
    use crate::utils::fixtures::pdf_with_pages;

    const DOI: &str = "10.1000/xyz123";

    fn service(documents: MockDocumentSource) -> (PaperService, Arc<MockDocumentSource>) {
        let documents = Arc::new(documents);
        let metadata = Arc::new(MockMetadataSource::new(Some(make_metadata(DOI, "A Paper"))));
        (PaperService::new(metadata, documents.clone()), documents)
    }

    fn doi() -> Doi {
        Doi::parse(DOI).unwrap()
    }

    #[tokio::test]
    async fn test_get_text() {
        let pdf = pdf_with_pages(&["Hello world"], Some("A Title"), None);
        let (service, documents) = service(MockDocumentSource::found(pdf));

        let text = service.get_text(&doi()).await.unwrap().found().unwrap();
        assert_eq!(text.num_pages, 1);
        assert!(text.text.contains("Hello world"));
        assert_eq!(text.title.as_deref(), Some("A Title"));
        assert_eq!(documents.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_structured_content() {
        let pdf = pdf_with_pages(&["First page", "Second page"], None, None);
        let (service, _) = service(MockDocumentSource::found(pdf));

        let content = service
            .get_structured_content(&doi())
            .await
            .unwrap()
            .found()
            .unwrap();

        assert_eq!(content.base.num_pages, 2);
        assert_eq!(content.pages().len(), 2);
        assert_eq!(content.pages()[1].page_number, 2);
        assert!(!content.degraded);
    }

    #[tokio::test]
    async fn test_missing_document_propagates() {
        let (service, _) = service(MockDocumentSource::missing(Miss::NoReference));

        assert_eq!(
            service.get_text(&doi()).await.unwrap(),
            Lookup::Missing(Miss::NoReference)
        );
        assert_eq!(
            service.get_structured_content(&doi()).await.unwrap(),
            Lookup::Missing(Miss::NoReference)
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_is_error() {
        let (service, _) = service(MockDocumentSource::found(&b"not a pdf"[..]));
        assert!(matches!(
            service.get_text(&doi()).await,
            Err(SourceError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_with_failed_fetch_keeps_metadata() {
        let (service, _) = service(MockDocumentSource::failing("connection reset"));

        let paper = service.get_complete(&doi()).await.unwrap().found().unwrap();
        assert_eq!(paper.metadata, Section::Available(make_metadata(DOI, "A Paper")));
        assert_eq!(paper.content, Section::unavailable(TEXT_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_complete_with_both_sections() {
        let pdf = pdf_with_pages(&["Body text"], None, None);
        let (service, _) = service(MockDocumentSource::found(pdf));

        let paper = service.get_complete(&doi()).await.unwrap().found().unwrap();
        assert!(paper.metadata.is_available());
        assert!(paper.content.is_available());
    }
}
