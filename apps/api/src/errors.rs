use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::render::RenderError;

/// Failures of a single document generation. Any of these aborts the whole
/// request; no partial document is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("topic {index}: unsupported media type '{media}'")]
    UnsupportedMedia { index: usize, media: String },

    #[error("topic {index}: image could not be decoded: {reason}")]
    ImageDecode { index: usize, reason: String },

    #[error("layout needs more than {budget} page(s) even at the smallest font size; tried {attempted:?}")]
    BudgetExceeded { budget: u32, attempted: Vec<f32> },

    #[error("packer placed {placed} rectangles for {expected} topics")]
    PackerConsistency { placed: usize, expected: usize },

    #[error("invalid layout configuration: {0}")]
    InvalidConfig(String),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Layout(err) => match err {
                LayoutError::UnsupportedMedia { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "UNSUPPORTED_MEDIA",
                    err.to_string(),
                ),
                LayoutError::ImageDecode { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "IMAGE_DECODE_ERROR",
                    err.to_string(),
                ),
                LayoutError::BudgetExceeded { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "PAGE_BUDGET_EXCEEDED",
                    err.to_string(),
                ),
                LayoutError::InvalidConfig(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIG", err.to_string())
                }
                LayoutError::PackerConsistency { .. } => {
                    tracing::error!("Layout consistency error: {err}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal layout error occurred".to_string(),
                    )
                }
            },
            AppError::Render(e) => match e {
                RenderError::Image { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "IMAGE_DECODE_ERROR",
                    e.to_string(),
                ),
                _ => {
                    tracing::error!("Render error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RENDER_ERROR",
                        "The document could not be rendered".to_string(),
                    )
                }
            },
            AppError::Timeout(secs) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "TIMEOUT",
                format!("Layout did not finish within {secs}s"),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_exceeded_lists_attempted_sizes() {
        let err = LayoutError::BudgetExceeded {
            budget: 2,
            attempted: vec![10.0, 9.5, 9.0],
        };
        let message = err.to_string();
        assert!(message.contains("2 page(s)"), "{message}");
        assert!(message.contains("9.5"), "{message}");
    }

    #[test]
    fn test_status_codes() {
        let unsupported = AppError::from(LayoutError::UnsupportedMedia {
            index: 0,
            media: "video".to_string(),
        });
        assert_eq!(unsupported.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let consistency = AppError::from(LayoutError::PackerConsistency {
            placed: 1,
            expected: 2,
        });
        assert_eq!(
            consistency.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let validation = AppError::Validation("topics cannot be empty".to_string());
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
