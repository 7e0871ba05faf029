//! Response caching middleware.
//!
//! Successful responses are stored in the [`ResponseStore`] under a key derived
//! from method, full path and raw query string, and replayed on later requests
//! with the same signature until they expire.

use axum::{
    body::{to_bytes, Body},
    extract::{OriginalUri, Request, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderName, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use super::state::AppState;
use crate::sources::SourceError;
use crate::utils::{cache_key, CacheResult, CachedResponse};

/// Marks whether a response came from the cache
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

const REPLAYED_HEADERS: [HeaderName; 2] = [CONTENT_TYPE, CONTENT_DISPOSITION];

pub async fn cache_responses(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(store) = state.cache.clone() else {
        return next.run(req).await;
    };

    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let key = cache_key(req.method().as_str(), uri.path(), uri.query());

    match store.get(&key) {
        CacheResult::Hit(cached) => {
            tracing::info!("Cache hit for {}", uri);
            return replay(cached);
        }
        CacheResult::Miss | CacheResult::Expired => {
            tracing::info!("Cache miss for {}", uri);
        }
    }

    let response = next.run(req).await;
    if response.status().as_u16() >= 400 {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::from(SourceError::Other(format!("Failed to buffer response: {}", e)))
                .into_response()
        }
    };

    let headers = REPLAYED_HEADERS
        .iter()
        .filter_map(|name| {
            let value = parts.headers.get(name)?.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();

    store.put(
        &key,
        CachedResponse {
            status: parts.status.as_u16(),
            headers,
            body: body.clone(),
        },
    );
    tracing::info!("Cached response for {}", uri);

    parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(body))
}

fn replay(cached: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);

    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    headers.insert(X_CACHE, HeaderValue::from_static("HIT"));
    response
}
