//! Draws an accepted layout through a [`Renderer`].
//!
//! Coordinates handed to renderers are top-left origin in page points; a
//! text position is the left end of the baseline.

pub mod pdf;

use thiserror::Error;

use crate::layout::font_metrics::{FontFace, TextMeasurer};
use crate::layout::markup::StyledRun;
use crate::layout::page_fit::{LayoutResult, PlacementRect};
use crate::layout::planner::TopicContent;
use crate::layout::wrap::{run_width, WrappedLine, WrappedTopic};
use crate::models::topic::Topic;

pub use pdf::PdfRenderer;

/// Baseline distance above the bottom of a line box, as a fraction of the font size.
const DESCENT: f32 = 0.2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("topic {index}: image could not be decoded: {reason}")]
    Image { index: usize, reason: String },

    #[error("topic {0}: planned content does not match the topic")]
    PlanMismatch(usize),

    #[error("draw call issued before the first page")]
    NoPage,

    #[error("PDF serialization failed: {0}")]
    Pdf(String),
}

/// Drawing backend for finished layouts.
pub trait Renderer {
    fn new_page(&mut self) -> Result<(), RenderError>;

    fn draw_styled_run(
        &mut self,
        run: &StyledRun,
        x: f32,
        y: f32,
        face: FontFace,
        size: f32,
    ) -> Result<(), RenderError>;

    /// `index` names the topic in errors.
    fn draw_image(
        &mut self,
        index: usize,
        data: &[u8],
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), RenderError>;

    fn finish(self) -> Result<Vec<u8>, RenderError>
    where
        Self: Sized;
}

/// Draws every page of `result` and returns the finished document bytes.
///
/// `topics` must be the list the layout was generated from.
pub fn render_document<R: Renderer>(
    result: &LayoutResult,
    topics: &[Topic],
    measurer: &dyn TextMeasurer,
    mut renderer: R,
) -> Result<Vec<u8>, RenderError> {
    for page in 0..result.page_count {
        renderer.new_page()?;
        for placement in result.placements.iter().filter(|p| p.page == page) {
            let id = placement.topic_id;
            match (&topics[id], &result.plans[id].content) {
                (Topic::Image(image), TopicContent::Image { .. }) => renderer.draw_image(
                    id,
                    &image.data,
                    placement.x,
                    placement.y,
                    placement.width,
                    placement.height,
                )?,
                (Topic::Text(_), TopicContent::Text(wrapped)) => {
                    draw_text(&mut renderer, wrapped, placement, measurer)?
                }
                _ => return Err(RenderError::PlanMismatch(id)),
            }
        }
    }
    renderer.finish()
}

fn draw_text<R: Renderer>(
    renderer: &mut R,
    wrapped: &WrappedTopic,
    placement: &PlacementRect,
    measurer: &dyn TextMeasurer,
) -> Result<(), RenderError> {
    let size = wrapped.font_size;
    let title = wrapped.title_lines.iter().map(|l| (l, FontFace::HelveticaBold));
    let bullets = wrapped
        .bullet_lines
        .iter()
        .flatten()
        .map(|l| (l, FontFace::Helvetica));

    for (row, (line, face)) in title.chain(bullets).enumerate() {
        let baseline = placement.y + (row as f32 + 1.0 - DESCENT) * size;
        draw_line(renderer, line, placement.x, baseline, face, size, measurer)?;
    }
    Ok(())
}

fn draw_line<R: Renderer>(
    renderer: &mut R,
    line: &WrappedLine,
    x: f32,
    baseline: f32,
    face: FontFace,
    size: f32,
    measurer: &dyn TextMeasurer,
) -> Result<(), RenderError> {
    let mut cursor = x;
    for fragment in &line.fragments {
        renderer.draw_styled_run(fragment, cursor, baseline, face, size)?;
        cursor += run_width(fragment, face, size, measurer);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
