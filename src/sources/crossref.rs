//! CrossRef metadata source.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{CrossRefConfig, HttpConfig};
use crate::models::{Doi, Metadata, PLACEHOLDER_AUTHORS, PLACEHOLDER_TITLE};
use crate::sources::{check_status, MetadataSource, SourceError};
use crate::utils::{default_user_agent, with_retry, HttpClient, RetryConfig};

/// CrossRef metadata source
///
/// Uses the CrossRef REST API (`/works/{doi}`) for DOI metadata lookup.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
    mailto: Option<String>,
    retry: RetryConfig,
}

impl CrossRefSource {
    pub fn new(config: &CrossRefConfig, http: &HttpConfig) -> Result<Self, SourceError> {
        let client = HttpClient::from_config(&polite_http_config(config, http))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            retry: RetryConfig::default(),
        })
    }

    /// Point at a different API root (used against mock servers)
    pub fn with_base_url(client: HttpClient, base_url: &str) -> Self {
        Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto: None,
            retry: RetryConfig::none(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn work_url(&self, doi: &Doi) -> String {
        match &self.mailto {
            Some(mailto) => format!(
                "{}/works/{}?mailto={}",
                self.base_url,
                doi,
                urlencoding::encode(mailto)
            ),
            None => format!("{}/works/{}", self.base_url, doi),
        }
    }

    /// Fetch and map the registry record, surfacing every failure
    pub async fn lookup(&self, doi: &Doi) -> Result<Metadata, SourceError> {
        let url = self.work_url(doi);
        tracing::info!("Fetching metadata from CrossRef for DOI: {}", doi);

        let client = Arc::clone(&self.client);
        let body = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                let response = client.get(&url).send().await?;
                check_status(&response)?;
                Ok(response.text().await?)
            }
        })
        .await?;

        let data: CRResponse = serde_json::from_str(&body)?;
        Ok(data.message.into_metadata(doi))
    }
}

#[async_trait]
impl MetadataSource for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    async fn resolve_metadata(&self, doi: &Doi) -> Metadata {
        match self.lookup(doi).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Error getting metadata from CrossRef for DOI {}: {}", doi, e);
                Metadata::basic(doi)
            }
        }
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRWork,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CRWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Vec<String>,
    author: Vec<CRAuthor>,
    created: Option<CRDate>,
    #[serde(rename = "container-title")]
    container_title: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-time")]
    date_time: Option<String>,
}

impl CRAuthor {
    /// "Given Family", or whichever part is present
    fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.given.as_deref(), self.family.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl CRWork {
    fn into_metadata(self, requested: &Doi) -> Metadata {
        let title = first_non_empty(self.title).unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

        let names: Vec<String> = self.author.iter().filter_map(CRAuthor::display_name).collect();
        let authors = if names.is_empty() {
            PLACEHOLDER_AUTHORS.to_string()
        } else {
            names.join(", ")
        };

        Metadata {
            doi: self
                .doi
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| requested.to_string()),
            title,
            authors,
            published_date: self.created.and_then(|c| c.date_time),
            journal: first_non_empty(self.container_title),
            r#abstract: self.abstract_text,
        }
    }
}

fn first_non_empty(values: Vec<String>) -> Option<String> {
    values.into_iter().next().filter(|s| !s.trim().is_empty())
}

/// The `[http]` settings with the contact address appended to the user agent
///
/// Identifying ourselves with a contact address gets us into CrossRef's polite pool.
fn polite_http_config(config: &CrossRefConfig, http: &HttpConfig) -> HttpConfig {
    let Some(mailto) = &config.mailto else {
        return http.clone();
    };

    let agent = http.user_agent.clone().unwrap_or_else(default_user_agent);
    HttpConfig {
        user_agent: Some(format!("{} (mailto:{})", agent, mailto)),
        ..http.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const DOI: &str = "10.1145/3025453.3025501";

    fn source(server: &Server) -> CrossRefSource {
        let client = HttpClient::new().unwrap();
        CrossRefSource::with_base_url(client, &server.url())
    }

    #[test]
    fn test_mailto_keeps_http_settings() {
        let crossref = CrossRefConfig {
            mailto: Some("lab@example.org".to_string()),
            ..CrossRefConfig::default()
        };
        let http = HttpConfig {
            timeout_secs: 7,
            user_agent: Some("papers-bot/2.0".to_string()),
        };

        let merged = polite_http_config(&crossref, &http);
        assert_eq!(merged.timeout_secs, 7);
        assert_eq!(
            merged.user_agent.as_deref(),
            Some("papers-bot/2.0 (mailto:lab@example.org)")
        );

        let default_agent = polite_http_config(&crossref, &HttpConfig::default());
        assert_eq!(default_agent.timeout_secs, 30);
        assert!(default_agent
            .user_agent
            .unwrap()
            .starts_with(&format!("{} (mailto:", default_user_agent())));
    }

    #[test]
    fn test_no_mailto_leaves_http_settings_untouched() {
        let http = HttpConfig {
            timeout_secs: 12,
            user_agent: None,
        };
        let merged = polite_http_config(&CrossRefConfig::default(), &http);
        assert_eq!(merged.timeout_secs, 12);
        assert!(merged.user_agent.is_none());
    }

    #[tokio::test]
    async fn test_lookup_maps_fields() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", format!("/works/{}", DOI).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"ok","message":{
                    "DOI":"10.1145/3025453.3025501",
                    "title":["Deep Learning for Widgets"],
                    "author":[{"given":"Ada","family":"Lovelace"},{"family":"Turing"},{"given":""}],
                    "created":{"date-time":"2017-05-02T14:01:12Z"},
                    "container-title":["Proceedings of CHI"],
                    "abstract":"<jats:p>Widgets.</jats:p>"
                }}"#,
            )
            .create_async()
            .await;

        let doi = Doi::parse(DOI).unwrap();
        let metadata = source(&server).resolve_metadata(&doi).await;

        assert_eq!(metadata.doi, DOI);
        assert_eq!(metadata.title, "Deep Learning for Widgets");
        assert_eq!(metadata.authors, "Ada Lovelace, Turing");
        assert_eq!(metadata.published_date.as_deref(), Some("2017-05-02T14:01:12Z"));
        assert_eq!(metadata.journal.as_deref(), Some("Proceedings of CHI"));
        assert_eq!(metadata.r#abstract.as_deref(), Some("<jats:p>Widgets.</jats:p>"));
    }

    #[tokio::test]
    async fn test_lookup_empty_lists_use_placeholders() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", format!("/works/{}", DOI).as_str())
            .with_status(200)
            .with_body(r#"{"message":{"title":[],"author":[]}}"#)
            .create_async()
            .await;

        let doi = Doi::parse(DOI).unwrap();
        let metadata = source(&server).resolve_metadata(&doi).await;

        assert_eq!(metadata.doi, DOI);
        assert_eq!(metadata.title, PLACEHOLDER_TITLE);
        assert_eq!(metadata.authors, PLACEHOLDER_AUTHORS);
        assert!(metadata.journal.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_falls_back_to_basic() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", format!("/works/{}", DOI).as_str())
            .with_status(500)
            .create_async()
            .await;

        let doi = Doi::parse(DOI).unwrap();
        let source = source(&server);

        assert!(matches!(
            source.lookup(&doi).await,
            Err(SourceError::Status { status: 500, .. })
        ));
        assert_eq!(source.resolve_metadata(&doi).await, Metadata::basic(&doi));
    }

    #[tokio::test]
    async fn test_malformed_payload_falls_back_to_basic() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", format!("/works/{}", DOI).as_str())
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let doi = Doi::parse(DOI).unwrap();
        let source = source(&server);

        assert!(matches!(source.lookup(&doi).await, Err(SourceError::Parse(_))));
        assert_eq!(source.resolve_metadata(&doi).await, Metadata::basic(&doi));
    }
}
