//! Mock sources for testing purposes.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{Doi, Lookup, LookupResult, Metadata, Miss};
use crate::sources::{DocumentSource, MetadataSource, SourceError};

/// What a [`MockDocumentSource`] answers with
#[derive(Debug, Clone)]
pub enum MockDocument {
    Found(Bytes),
    Missing(Miss),
    Fail(String),
}

/// A document source returning a predefined outcome and counting calls.
#[derive(Debug)]
pub struct MockDocumentSource {
    document: Mutex<MockDocument>,
    calls: AtomicUsize,
}

impl MockDocumentSource {
    pub fn new(document: MockDocument) -> Self {
        Self {
            document: Mutex::new(document),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn found(bytes: impl Into<Bytes>) -> Self {
        Self::new(MockDocument::Found(bytes.into()))
    }

    pub fn missing(miss: Miss) -> Self {
        Self::new(MockDocument::Missing(miss))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(MockDocument::Fail(message.to_string()))
    }

    /// Change the outcome for subsequent calls.
    pub fn set_document(&self, document: MockDocument) {
        *self.document.lock() = document;
    }

    /// Number of `get_document` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    fn id(&self) -> &str {
        "mock"
    }

    async fn get_document(&self, _doi: &Doi) -> LookupResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.document.lock().clone() {
            MockDocument::Found(bytes) => Ok(Lookup::Found(bytes)),
            MockDocument::Missing(miss) => Ok(Lookup::Missing(miss)),
            MockDocument::Fail(message) => Err(SourceError::Network(message)),
        }
    }
}

/// A metadata source returning fixed metadata, or the basic placeholder.
#[derive(Debug, Default)]
pub struct MockMetadataSource {
    metadata: Mutex<Option<Metadata>>,
    calls: AtomicUsize,
}

impl MockMetadataSource {
    pub fn new(metadata: Option<Metadata>) -> Self {
        Self {
            metadata: Mutex::new(metadata),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    fn id(&self) -> &str {
        "mock"
    }

    async fn resolve_metadata(&self, doi: &Doi) -> Metadata {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .lock()
            .clone()
            .unwrap_or_else(|| Metadata::basic(doi))
    }
}

/// Helper function to create enriched metadata for testing.
pub fn make_metadata(doi: &str, title: &str) -> Metadata {
    Metadata {
        doi: doi.to_string(),
        title: title.to_string(),
        authors: "Ada Lovelace".to_string(),
        published_date: Some("2017-05-02T14:01:12Z".to_string()),
        journal: Some("Journal of Examples".to_string()),
        r#abstract: None,
    }
}
