//! DOI query validation.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use super::error::ApiError;
use crate::models::Doi;
use crate::utils::ValidationError;

/// The validated `doi` query parameter
#[derive(Debug, Clone)]
pub struct DoiQuery(pub Doi);

#[async_trait]
impl<S> FromRequestParts<S> for DoiQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|_| ValidationError::MissingDoi)?;

        let raw = params.get("doi").ok_or(ValidationError::MissingDoi)?;
        let doi = Doi::parse(raw).map_err(|e| {
            tracing::warn!("Rejected DOI {:?}: {}", raw, e);
            e
        })?;

        Ok(DoiQuery(doi))
    }
}

/// Reject requests without a valid `doi`, then hand the parsed value on as an extension
pub async fn require_doi(DoiQuery(doi): DoiQuery, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(doi);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn extract(uri: &str) -> Result<DoiQuery, ApiError> {
        let (mut parts, _) = HttpRequest::get(uri).body(()).unwrap().into_parts();
        DoiQuery::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_doi() {
        let DoiQuery(doi) = extract("/api/paper?doi=10.1145/3025453.3025501").await.unwrap();
        assert_eq!(doi.as_str(), "10.1145/3025453.3025501");
    }

    #[tokio::test]
    async fn test_percent_encoded_doi() {
        let DoiQuery(doi) = extract("/api/paper?doi=10.1145%2F3025453.3025501").await.unwrap();
        assert_eq!(doi.as_str(), "10.1145/3025453.3025501");
    }

    #[tokio::test]
    async fn test_missing_and_empty() {
        assert!(matches!(
            extract("/api/paper").await,
            Err(ApiError::Validation(ValidationError::MissingDoi))
        ));
        assert!(matches!(
            extract("/api/paper?doi=").await,
            Err(ApiError::Validation(ValidationError::MissingDoi))
        ));
    }

    #[tokio::test]
    async fn test_malformed() {
        for uri in ["/api/paper?doi=11.1145/x", "/api/paper?doi=10.12/x", "/api/paper?doi=10.1145/a%20b"] {
            assert!(matches!(
                extract(uri).await,
                Err(ApiError::Validation(ValidationError::InvalidDoi(_)))
            ));
        }
    }
}
