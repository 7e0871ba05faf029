//! Paper endpoints.

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::models::{Doi, Lookup};

const EXAMPLE_DOI: &str = "10.1145/3025453.3025501";

/// `GET /api/paper`: the PDF itself
pub async fn get_paper(
    State(state): State<AppState>,
    Extension(doi): Extension<Doi>,
) -> Result<Response, ApiError> {
    tracing::info!("Getting paper for DOI: {}", doi);

    match state.service.get_document(&doi).await? {
        Lookup::Found(bytes) => {
            let headers = [
                (CONTENT_TYPE, "application/pdf".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}.pdf\"", doi.file_stem()),
                ),
            ];
            Ok((headers, bytes).into_response())
        }
        Lookup::Missing(_) => Err(ApiError::NotFound("Paper not found")),
    }
}

/// `GET /api/paper/text`: flat text
pub async fn get_text(
    State(state): State<AppState>,
    Extension(doi): Extension<Doi>,
) -> Result<Response, ApiError> {
    tracing::info!("Getting text for DOI: {}", doi);

    match state.service.get_text(&doi).await? {
        Lookup::Found(text) => Ok(Json(text).into_response()),
        Lookup::Missing(_) => Err(ApiError::NotFound("Failed to extract text from paper")),
    }
}

/// `GET /api/paper/content`: text per page
pub async fn get_content(
    State(state): State<AppState>,
    Extension(doi): Extension<Doi>,
) -> Result<Response, ApiError> {
    tracing::info!("Getting structured content for DOI: {}", doi);

    match state.service.get_structured_content(&doi).await? {
        Lookup::Found(content) => Ok(Json(content).into_response()),
        Lookup::Missing(_) => Err(ApiError::NotFound(
            "Failed to extract structured content from paper",
        )),
    }
}

/// `GET /api/paper/metadata`
pub async fn get_metadata(
    State(state): State<AppState>,
    Extension(doi): Extension<Doi>,
) -> Result<Response, ApiError> {
    match state.service.get_metadata(&doi).await? {
        Lookup::Found(metadata) => Ok(Json(metadata).into_response()),
        Lookup::Missing(_) => Err(ApiError::NotFound("Paper metadata not found")),
    }
}

/// `GET /api/paper/complete`: metadata and text together
pub async fn get_complete(
    State(state): State<AppState>,
    Extension(doi): Extension<Doi>,
) -> Result<Response, ApiError> {
    tracing::info!("Getting complete paper for DOI: {}", doi);

    match state.service.get_complete(&doi).await? {
        Lookup::Found(paper) => Ok(Json(paper).into_response()),
        Lookup::Missing(_) => Err(ApiError::NotFound("Paper not found")),
    }
}

/// `GET /api/paper/test`: usage document
pub async fn usage() -> Json<Value> {
    let endpoint = |description: &str, path: &str, content_type: &str| {
        json!({
            "description": description,
            "url": format!("{}?doi={}", path, EXAMPLE_DOI),
            "method": "GET",
            "contentType": content_type,
        })
    };

    Json(json!({
        "message": "DOI-to-PDF API is running successfully",
        "version": crate::VERSION,
        "endpoints": {
            "pdf": endpoint("Get the PDF document for a DOI", "/api/paper", "application/pdf"),
            "text": endpoint("Extract plain text from the PDF", "/api/paper/text", "application/json"),
            "structured": endpoint(
                "Extract structured content with page information",
                "/api/paper/content",
                "application/json"
            ),
            "metadata": endpoint(
                "Get paper metadata (title, authors, etc.)",
                "/api/paper/metadata",
                "application/json"
            ),
            "complete": endpoint(
                "Get both metadata and text content in one request",
                "/api/paper/complete",
                "application/json"
            ),
        },
        "exampleDois": [EXAMPLE_DOI, "10.1038/s41586-019-1724-z", "10.1371/journal.pone.0115069"],
        "testCommand": format!("curl \"http://localhost:3000/api/paper/text?doi={}\"", EXAMPLE_DOI),
    }))
}

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
