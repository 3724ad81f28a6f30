//! Axum route handlers for the Document API.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::document::generator::{
    generate_document, plan_document, prepare_topics, run_with_deadline, DocumentRequest,
};
use crate::errors::AppError;
use crate::layout::LayoutResult;
use crate::state::AppState;

pub const DOCUMENT_ID_HEADER: HeaderName = HeaderName::from_static("x-document-id");
pub const FONT_SIZE_HEADER: HeaderName = HeaderName::from_static("x-final-font-size");
pub const PAGE_COUNT_HEADER: HeaderName = HeaderName::from_static("x-page-count");

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub document_id: Uuid,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub layout: LayoutResult,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents
///
/// Lays out the topics within the page budget and returns the PDF.
/// The chosen font size and page count are echoed in response headers.
pub async fn handle_generate_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentRequest>,
) -> Result<Response, AppError> {
    let config = request.options.apply(state.layout);
    let topics = prepare_topics(request.topics)?;
    let id = Uuid::new_v4();

    let measurer = Arc::clone(&state.measurer);
    let packer = Arc::clone(&state.packer);
    let document = run_with_deadline(state.config.generation_timeout_secs, move || {
        generate_document(id, topics, &config, measurer.as_ref(), packer.as_ref())
    })
    .instrument(info_span!("generate", document_id = %id))
    .await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"cheatsheet-{}.pdf\"", document.id),
        ),
        (DOCUMENT_ID_HEADER, document.id.to_string()),
        (FONT_SIZE_HEADER, document.layout.font_size.to_string()),
        (PAGE_COUNT_HEADER, document.layout.page_count.to_string()),
    ];
    Ok((StatusCode::OK, headers, document.pdf).into_response())
}

/// POST /api/v1/documents/plan
///
/// Runs the same layout as the document endpoint and returns it as JSON
/// instead of rendering. Useful for checking page fit before downloading.
pub async fn handle_plan_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let config = request.options.apply(state.layout);
    let topics = prepare_topics(request.topics)?;
    let id = Uuid::new_v4();

    let measurer = Arc::clone(&state.measurer);
    let packer = Arc::clone(&state.packer);
    let layout = run_with_deadline(state.config.generation_timeout_secs, move || {
        plan_document(topics, &config, measurer.as_ref(), packer.as_ref())
    })
    .instrument(info_span!("plan", document_id = %id))
    .await?;

    Ok(Json(PlanResponse {
        document_id: id,
        generated_at: Utc::now(),
        layout,
    }))
}
