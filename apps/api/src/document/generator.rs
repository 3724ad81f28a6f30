//! Document generation: validates topics, runs the page-fit loop and renders the PDF.
//!
//! Flow: payloads → topics → generate_layout → render_document → bytes.
//!
//! Everything here is synchronous. Handlers call it through
//! [`run_with_deadline`], which moves it onto the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, Span};
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{generate_layout, LayoutConfig, LayoutResult, RectanglePacker, TextMeasurer};
use crate::models::topic::{topics_from_payloads, Topic, TopicPayload};
use crate::render::{render_document, PdfRenderer};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Request body shared by the document and plan endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRequest {
    pub topics: Vec<TopicPayload>,
    #[serde(default)]
    pub options: LayoutOverrides,
}

/// Per-request replacements for the server's layout knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutOverrides {
    pub max_page_budget: Option<u32>,
    pub default_font_size: Option<f32>,
    pub min_font_size: Option<f32>,
    pub reduce_multiplier: Option<f32>,
}

impl LayoutOverrides {
    pub fn apply(&self, base: LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            max_page_budget: self.max_page_budget.unwrap_or(base.max_page_budget),
            default_font_size: self.default_font_size.unwrap_or(base.default_font_size),
            min_font_size: self.min_font_size.unwrap_or(base.min_font_size),
            reduce_multiplier: self.reduce_multiplier.unwrap_or(base.reduce_multiplier),
            page: base.page,
        }
    }
}

/// A rendered document and the layout it was drawn from.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub id: Uuid,
    pub pdf: Vec<u8>,
    pub layout: LayoutResult,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Converts raw payloads into the immutable topic list every attempt shares.
pub fn prepare_topics(payloads: Vec<TopicPayload>) -> Result<Arc<[Topic]>, AppError> {
    if payloads.is_empty() {
        return Err(AppError::Validation("topics cannot be empty".to_string()));
    }
    Ok(topics_from_payloads(payloads)?.into())
}

/// Lays out `topics` without rendering.
pub fn plan_document(
    topics: Arc<[Topic]>,
    config: &LayoutConfig,
    measurer: &dyn TextMeasurer,
    packer: &dyn RectanglePacker,
) -> Result<LayoutResult, AppError> {
    Ok(generate_layout(topics, config, measurer, packer)?)
}

/// Lays out and renders `topics` into a PDF.
pub fn generate_document(
    id: Uuid,
    topics: Arc<[Topic]>,
    config: &LayoutConfig,
    measurer: &dyn TextMeasurer,
    packer: &dyn RectanglePacker,
) -> Result<GeneratedDocument, AppError> {
    let layout = generate_layout(Arc::clone(&topics), config, measurer, packer)?;
    let pdf = render_document(
        &layout,
        &topics,
        measurer,
        PdfRenderer::new(layout.page, measurer),
    )?;

    info!(
        document_id = %id,
        bytes = pdf.len(),
        pages = layout.page_count,
        font_size = layout.font_size,
        "Document rendered"
    );

    Ok(GeneratedDocument { id, pdf, layout })
}

/// Runs `job` on the blocking pool, giving up after `timeout_secs`.
///
/// The caller's span is carried into the job. A timed-out job keeps running
/// to completion on its thread; only its result is discarded.
pub async fn run_with_deadline<T, F>(timeout_secs: u64, job: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    let handle = tokio::task::spawn_blocking(move || span.in_scope(job));

    match tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await {
        Err(_) => Err(AppError::Timeout(timeout_secs)),
        Ok(Err(e)) => Err(AppError::Internal(anyhow::anyhow!(
            "spawn_blocking failed in document generation: {e}"
        ))),
        Ok(Ok(result)) => result,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LayoutError;
    use crate::layout::{GuillotinePacker, StandardMetrics};

    fn make_payload(title: &str, bullets: &[&str]) -> TopicPayload {
        TopicPayload {
            media: "text".to_string(),
            topic: title.to_string(),
            content: bullets.iter().map(|b| b.to_string()).collect(),
            data: None,
        }
    }

    #[test]
    fn test_empty_topics_rejected() {
        let err = prepare_topics(vec![]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_unknown_media_surfaces_as_layout_error() {
        let mut bad = make_payload("Clip", &[]);
        bad.media = "audio".to_string();
        let err = prepare_topics(vec![bad]).unwrap_err();
        assert!(matches!(
            err,
            AppError::Layout(LayoutError::UnsupportedMedia { index: 0, .. })
        ));
    }

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let base = LayoutConfig::default();
        let overrides = LayoutOverrides {
            max_page_budget: Some(1),
            min_font_size: Some(6.0),
            ..LayoutOverrides::default()
        };
        let merged = overrides.apply(base);
        assert_eq!(merged.max_page_budget, 1);
        assert_eq!(merged.min_font_size, 6.0);
        assert_eq!(merged.default_font_size, base.default_font_size);
        assert_eq!(merged.reduce_multiplier, base.reduce_multiplier);
        assert_eq!(merged.page, base.page);
    }

    #[test]
    fn test_generate_document_produces_pdf() {
        let topics = prepare_topics(vec![
            make_payload("Big-O", &["O(n^{2}) worst case", "H_{2}O is not code"]),
            make_payload("Stacks", &["LIFO order"]),
        ])
        .unwrap();
        let doc = generate_document(
            Uuid::new_v4(),
            topics,
            &LayoutConfig::default(),
            &StandardMetrics,
            &GuillotinePacker,
        )
        .unwrap();
        assert!(doc.pdf.starts_with(b"%PDF"));
        assert_eq!(doc.layout.page_count, 1);
        assert_eq!(doc.layout.placements.len(), 2);
    }

    #[tokio::test]
    async fn test_deadline_returns_job_result() {
        let value = run_with_deadline(5, || Ok(41 + 1)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let err = run_with_deadline(0, || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Timeout(0)));
    }
}
