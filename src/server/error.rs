//! Error responses for the HTTP surface.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::sources::SourceError;
use crate::utils::ValidationError;

/// Error returned by handlers and extractors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad client input, rejected before the pipeline runs
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The pipeline found nothing
    #[error("{0}")]
    NotFound(&'static str),

    /// An expected failure whose message is safe to show
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    /// Anything else; rendered as a generic 500
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// `{"status":"error","message":...}`
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

/// `{"error":...}`, used for lookups that found nothing
#[derive(Debug, Serialize)]
struct MissingBody {
    error: &'static str,
}

/// Detail attached to 500 responses, rendered by [`expose_error_stack`]
#[derive(Debug, Clone)]
pub struct ErrorStack(pub String);

impl ApiError {
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Operational { status, .. } => *status,
            ApiError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message may be shown to the client
    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Source(_))
    }
}

/// The error and its sources, outermost first
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain.join("\n  caused by: ")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ApiError::NotFound(message) = &self {
            return (status, Json(MissingBody { error: *message })).into_response();
        }

        if self.is_operational() {
            let body = ErrorBody {
                status: "error",
                message: self.to_string(),
                stack: None,
            };
            return (status, Json(body)).into_response();
        }

        tracing::error!("Request failed: {}", self);
        let body = ErrorBody {
            status: "error",
            message: "Internal server error".to_string(),
            stack: None,
        };
        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorStack(error_chain(&self)));
        response
    }
}

/// Add the error chain to 500 bodies; installed outside production only
pub async fn expose_error_stack(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let Some(ErrorStack(stack)) = response.extensions().get::<ErrorStack>().cloned() else {
        return response;
    };

    let body = ErrorBody {
        status: "error",
        message: "Internal server error".to_string(),
        stack: Some(stack),
    };
    (response.status(), Json(body)).into_response()
}
