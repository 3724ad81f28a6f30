//! Page-fit loop: shrinks the global font size until every topic packs into the page budget.
//!
//! # States
//! `Preprocess → Pack → Evaluate → { Accept | ReduceFont → Preprocess | Fail }`
//!
//! - Preprocess: plan every topic (normalize, parse, wrap) at `attempt.font_size`.
//! - Pack: hand the padded rectangles to the [`RectanglePacker`]. Rectangles that
//!   cannot fit on an empty page are held back as unplaceable.
//! - Evaluate: accept when the non-empty page count is within budget and nothing
//!   is unplaceable. Otherwise the font shrinks by `overflow × reduce_multiplier`
//!   (rounded to 0.1pt) and a fresh attempt starts from the input topics.
//!
//! Each attempt is an immutable [`LayoutAttempt`]; nothing derived at one font
//! size is reused at another. A packer that loses rectangles is a bug and ends
//! the loop immediately.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::LayoutError;
use crate::layout::font_metrics::{default_page_config, PageConfig, PaperSize, TextMeasurer};
use crate::layout::packer::{Origin, PackRequest, PackedRect, RectanglePacker};
use crate::layout::planner::{log_markup_warnings, plan_topic, TopicPlan};
use crate::models::topic::Topic;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Largest accepted starting font size, in points.
pub const MAX_FONT_SIZE: f32 = 72.0;

/// Knobs of the page-fit loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Maximum number of output pages.
    pub max_page_budget: u32,
    /// Font size of the first attempt, in points.
    pub default_font_size: f32,
    /// Smallest font size that may be attempted.
    pub min_font_size: f32,
    /// Points removed per overflowing topic between attempts.
    pub reduce_multiplier: f32,
    pub page: PageConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_page_budget: 2,
            default_font_size: 10.0,
            min_font_size: 4.0,
            reduce_multiplier: 0.1,
            page: default_page_config(PaperSize::A4),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let invalid = |msg: String| Err(LayoutError::InvalidConfig(msg));
        if self.max_page_budget == 0 {
            return invalid("max_page_budget must be at least 1".to_string());
        }
        if !(self.min_font_size.is_finite() && self.min_font_size > 0.0) {
            return invalid(format!("min_font_size must be positive, got {}", self.min_font_size));
        }
        if self.default_font_size > MAX_FONT_SIZE {
            return invalid(format!(
                "default_font_size ({}) exceeds the {MAX_FONT_SIZE}pt maximum",
                self.default_font_size
            ));
        }
        if !(self.default_font_size.is_finite() && self.default_font_size >= self.min_font_size) {
            return invalid(format!(
                "default_font_size ({}) must be >= min_font_size ({})",
                self.default_font_size, self.min_font_size
            ));
        }
        if !(self.reduce_multiplier.is_finite() && self.reduce_multiplier > 0.0) {
            return invalid(format!(
                "reduce_multiplier must be positive, got {}",
                self.reduce_multiplier
            ));
        }
        if self.page.printable_width() <= 0.0 || self.page.printable_height() <= 0.0 {
            return invalid("page margins leave no printable area".to_string());
        }
        if self.page.gutter_pt < 0.0 {
            return invalid("gutter_pt cannot be negative".to_string());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attempt and result types
// ────────────────────────────────────────────────────────────────────────────

/// One pass of the loop: a font size over the untouched input topics.
#[derive(Debug, Clone)]
pub struct LayoutAttempt {
    pub font_size: f32,
    pub topics: Arc<[Topic]>,
}

impl LayoutAttempt {
    pub fn new(topics: Arc<[Topic]>, font_size: f32) -> Self {
        Self { font_size, topics }
    }

    /// A new attempt over the same input topics.
    pub fn at_font_size(&self, font_size: f32) -> Self {
        Self {
            font_size,
            topics: Arc::clone(&self.topics),
        }
    }
}

/// Final position of one topic, top-left origin, in page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementRect {
    pub topic_id: usize,
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An accepted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub font_size: f32,
    pub page_count: usize,
    /// One per topic, in input order.
    pub placements: Vec<PlacementRect>,
    /// One per topic, in input order.
    pub plans: Vec<TopicPlan>,
    /// Every font size tried, first to last.
    pub attempted_font_sizes: Vec<f32>,
    pub page: PageConfig,
}

/// Packer output normalized to top-left page coordinates.
struct PackOutcome {
    pages: Vec<Vec<PlacementRect>>,
    unplaceable: Vec<usize>,
}

enum Verdict {
    Accept {
        placements: Vec<PlacementRect>,
        page_count: usize,
    },
    Overflow {
        overflow: usize,
        page_count: usize,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Runs the page-fit loop to completion.
///
/// Returns the first layout within `config.max_page_budget` pages, or
/// [`LayoutError::BudgetExceeded`] once the next font size would drop below
/// `config.min_font_size`.
pub fn generate_layout(
    topics: Arc<[Topic]>,
    config: &LayoutConfig,
    measurer: &dyn TextMeasurer,
    packer: &dyn RectanglePacker,
) -> Result<LayoutResult, LayoutError> {
    config.validate()?;
    log_markup_warnings(&topics);

    let mut attempt = LayoutAttempt::new(topics, config.default_font_size);
    let mut attempted = Vec::new();

    loop {
        attempted.push(attempt.font_size);

        let plans = preprocess(&attempt, measurer);
        let packed = pack(&plans, &config.page, packer)?;

        match evaluate(packed, config.max_page_budget) {
            Verdict::Accept {
                placements,
                page_count,
            } => {
                info!(
                    font_size = attempt.font_size,
                    pages = page_count,
                    attempts = attempted.len(),
                    topics = plans.len(),
                    "Layout accepted"
                );
                return Ok(LayoutResult {
                    font_size: attempt.font_size,
                    page_count,
                    placements,
                    plans,
                    attempted_font_sizes: attempted,
                    page: config.page,
                });
            }
            Verdict::Overflow {
                overflow,
                page_count,
            } => {
                let next = reduce_font_size(attempt.font_size, overflow, config.reduce_multiplier);
                debug!(
                    font_size = attempt.font_size,
                    pages = page_count,
                    overflow,
                    next_font_size = next,
                    "Layout over page budget"
                );
                if next < config.min_font_size {
                    warn!(
                        budget = config.max_page_budget,
                        attempts = attempted.len(),
                        "Page budget not met at minimum font size"
                    );
                    return Err(LayoutError::BudgetExceeded {
                        budget: config.max_page_budget,
                        attempted,
                    });
                }
                attempt = attempt.at_font_size(next);
            }
        }
    }
}

/// `round(font − overflow × multiplier, 1 decimal)`, dropping at least 0.1pt.
///
/// Computed in whole tenths of a point so every step is a strict decrease.
pub fn reduce_font_size(font_size: f32, overflow: usize, multiplier: f32) -> f32 {
    let tenths = f64::from(font_size) * 10.0;
    // Largest whole tenth strictly below the current size.
    let ceiling = (tenths - 1e-3).ceil() as i64 - 1;
    let target = ((f64::from(font_size) - overflow as f64 * f64::from(multiplier)) * 10.0).round() as i64;
    target.min(ceiling) as f32 / 10.0
}

// ────────────────────────────────────────────────────────────────────────────
// States
// ────────────────────────────────────────────────────────────────────────────

fn preprocess(attempt: &LayoutAttempt, measurer: &dyn TextMeasurer) -> Vec<TopicPlan> {
    attempt
        .topics
        .iter()
        .map(|topic| plan_topic(topic, attempt.font_size, measurer))
        .collect()
}

fn pack(
    plans: &[TopicPlan],
    page: &PageConfig,
    packer: &dyn RectanglePacker,
) -> Result<PackOutcome, LayoutError> {
    let gutter = page.gutter_pt;
    // The bin is widened by one gutter so a topic may touch the printable edge.
    let bin_width = page.printable_width() + gutter;
    let bin_height = page.printable_height() + gutter;

    let mut requests = Vec::with_capacity(plans.len());
    let mut unplaceable = Vec::new();
    for (id, plan) in plans.iter().enumerate() {
        let request = PackRequest {
            id,
            width: plan.width + gutter,
            height: plan.height + gutter,
        };
        if request.width > bin_width || request.height > bin_height {
            unplaceable.push(id);
        } else {
            requests.push(request);
        }
    }

    let raw_pages = packer.pack(&requests, bin_width, bin_height);
    check_consistency(&raw_pages, &requests)?;

    let origin = packer.origin();
    let pages = raw_pages
        .into_iter()
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(page_index, rects)| {
            rects
                .iter()
                .map(|r| to_placement(r, page_index, origin, bin_height, page, plans))
                .collect()
        })
        .collect();

    Ok(PackOutcome { pages, unplaceable })
}

/// Every submitted rectangle must come back exactly once.
fn check_consistency(pages: &[Vec<PackedRect>], requests: &[PackRequest]) -> Result<(), LayoutError> {
    let submitted: BTreeSet<usize> = requests.iter().map(|r| r.id).collect();
    let placed: Vec<usize> = pages.iter().flatten().map(|r| r.id).collect();
    let distinct: BTreeSet<usize> = placed.iter().copied().collect();

    if placed.len() != requests.len() || distinct != submitted {
        return Err(LayoutError::PackerConsistency {
            placed: placed.len(),
            expected: requests.len(),
        });
    }
    Ok(())
}

fn to_placement(
    rect: &PackedRect,
    page_index: usize,
    origin: Origin,
    bin_height: f32,
    page: &PageConfig,
    plans: &[TopicPlan],
) -> PlacementRect {
    let top = match origin {
        Origin::TopLeft => rect.y,
        Origin::BottomLeft => bin_height - rect.y - rect.height,
    };
    let plan = &plans[rect.id];
    PlacementRect {
        topic_id: rect.id,
        page: page_index,
        x: page.margin_pt + rect.x,
        y: page.margin_pt + top,
        width: plan.width,
        height: plan.height,
    }
}

fn evaluate(packed: PackOutcome, budget: u32) -> Verdict {
    let budget = budget as usize;
    let page_count = packed.pages.len();

    if page_count <= budget && packed.unplaceable.is_empty() {
        let mut placements: Vec<PlacementRect> = packed.pages.into_iter().flatten().collect();
        placements.sort_by_key(|p| p.topic_id);
        return Verdict::Accept {
            placements,
            page_count,
        };
    }

    let beyond_budget: usize = packed.pages.iter().skip(budget).map(Vec::len).sum();
    Verdict::Overflow {
        overflow: beyond_budget + packed.unplaceable.len(),
        page_count,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font_metrics::StandardMetrics;
    use crate::layout::packer::GuillotinePacker;
    use crate::models::topic::{ImageTopic, TextTopic};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_topic(title: &str, bullets: &[&str]) -> Topic {
        Topic::Text(TextTopic {
            title: title.to_string(),
            bullets: bullets.iter().map(|b| b.to_string()).collect(),
        })
    }

    fn stacks() -> Topic {
        make_topic("Stacks", &["LIFO order", "push/pop O(1)"])
    }

    fn make_config(budget: u32) -> LayoutConfig {
        LayoutConfig {
            max_page_budget: budget,
            ..LayoutConfig::default()
        }
    }

    fn run(topics: Vec<Topic>, config: &LayoutConfig) -> Result<LayoutResult, LayoutError> {
        generate_layout(topics.into(), config, &StandardMetrics, &GuillotinePacker)
    }

    /// Drops the last rectangle it is given.
    struct LossyPacker {
        calls: AtomicUsize,
    }

    impl RectanglePacker for LossyPacker {
        fn pack(&self, rects: &[PackRequest], w: f32, h: f32) -> Vec<Vec<PackedRect>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let keep = &rects[..rects.len().saturating_sub(1)];
            GuillotinePacker.pack(keep, w, h)
        }
    }

    /// Stacks everything at the bottom-left corner, y up.
    struct BottomLeftPacker;

    impl RectanglePacker for BottomLeftPacker {
        fn origin(&self) -> Origin {
            Origin::BottomLeft
        }

        fn pack(&self, rects: &[PackRequest], _w: f32, _h: f32) -> Vec<Vec<PackedRect>> {
            rects
                .iter()
                .map(|r| {
                    vec![PackedRect {
                        id: r.id,
                        x: 0.0,
                        y: 0.0,
                        width: r.width,
                        height: r.height,
                    }]
                })
                .collect()
        }
    }

    #[test]
    fn test_single_topic_fits_on_one_page_at_default_size() {
        let config = make_config(1);
        let result = run(vec![stacks()], &config).unwrap();
        assert_eq!(result.page_count, 1);
        assert_eq!(result.font_size, config.default_font_size);
        assert_eq!(result.placements.len(), 1);
        assert_eq!(result.attempted_font_sizes, vec![config.default_font_size]);
    }

    #[test]
    fn test_many_duplicates_force_font_reduction_or_fail() {
        let config = LayoutConfig {
            max_page_budget: 2,
            default_font_size: 30.0,
            ..LayoutConfig::default()
        };
        let topics: Vec<Topic> = (0..200).map(|_| stacks()).collect();
        match run(topics, &config) {
            Ok(result) => {
                assert!(result.font_size < config.default_font_size);
                assert!(result.attempted_font_sizes.len() > 1);
                assert!(result.page_count <= 2);
                assert_eq!(result.placements.len(), 200);
            }
            Err(LayoutError::BudgetExceeded { attempted, .. }) => {
                assert!(!attempted.is_empty());
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_font_sizes_non_increasing_and_above_minimum() {
        let config = LayoutConfig {
            max_page_budget: 1,
            default_font_size: 24.0,
            min_font_size: 5.0,
            reduce_multiplier: 0.05,
            ..LayoutConfig::default()
        };
        let topics: Vec<Topic> = (0..60)
            .map(|i| make_topic(&format!("Topic {i}"), &["a few words of text", "x^{2} + y_{1}"]))
            .collect();
        let result = run(topics, &config).unwrap();
        for pair in result.attempted_font_sizes.windows(2) {
            assert!(pair[1] < pair[0], "sizes must shrink: {pair:?}");
        }
        assert!(result.font_size >= config.min_font_size);
        assert!(result.page_count <= 1);
        assert_eq!(result.font_size, *result.attempted_font_sizes.last().unwrap());
    }

    #[test]
    fn test_budget_exceeded_reports_attempts() {
        let config = LayoutConfig {
            max_page_budget: 1,
            default_font_size: 12.0,
            min_font_size: 11.0,
            reduce_multiplier: 0.2,
            ..LayoutConfig::default()
        };
        let topics: Vec<Topic> = (0..400).map(|_| stacks()).collect();
        match run(topics, &config) {
            Err(LayoutError::BudgetExceeded { budget, attempted }) => {
                assert_eq!(budget, 1);
                assert_eq!(attempted[0], 12.0);
                assert!(attempted.iter().all(|&s| s >= 11.0));
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_lost_rectangle_is_fatal_and_not_retried() {
        let packer = LossyPacker {
            calls: AtomicUsize::new(0),
        };
        let topics: Arc<[Topic]> = vec![stacks(), stacks()].into();
        let err = generate_layout(topics, &make_config(1), &StandardMetrics, &packer).unwrap_err();
        assert_eq!(
            err,
            LayoutError::PackerConsistency {
                placed: 1,
                expected: 2
            }
        );
        assert_eq!(packer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bottom_left_origin_converted_to_top_left() {
        let config = make_config(1);
        let topics: Arc<[Topic]> = vec![stacks()].into();
        let result = generate_layout(topics, &config, &StandardMetrics, &BottomLeftPacker).unwrap();
        let p = result.placements[0];
        let page = config.page;
        // Sitting on the bottom edge: its bottom plus the gutter meets the printable bottom.
        let bottom = p.y + p.height + page.gutter_pt;
        let printable_bottom = page.margin_pt + page.printable_height() + page.gutter_pt;
        assert!((bottom - printable_bottom).abs() < 1e-3, "{bottom} vs {printable_bottom}");
    }

    #[test]
    fn test_oversized_topic_shrinks_until_it_fits() {
        let config = LayoutConfig {
            max_page_budget: 1,
            default_font_size: 10.0,
            min_font_size: 1.0,
            reduce_multiplier: 1.0,
            page: PageConfig {
                width_pt: 200.0,
                height_pt: 200.0,
                margin_pt: 0.0,
                gutter_pt: 0.0,
            },
        };
        // 30 × 0.944em ≈ 28.3pt per point of font size: fits at 7pt, not at 8pt.
        let long_word = "W".repeat(30);
        let topics = vec![make_topic("", &[long_word.as_str()])];
        let result = run(topics, &config).unwrap();
        assert_eq!(result.font_size, 7.0);
        assert_eq!(result.attempted_font_sizes, vec![10.0, 9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_placements_in_input_order_within_page() {
        let config = make_config(2);
        let topics: Vec<Topic> = vec![
            stacks(),
            Topic::Image(ImageTopic {
                data: Bytes::from_static(b""),
                pixel_width: 4000,
                pixel_height: 2000,
            }),
            make_topic("Queues", &["FIFO order"]),
        ];
        let result = run(topics, &config).unwrap();
        let ids: Vec<usize> = result.placements.iter().map(|p| p.topic_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        for p in &result.placements {
            assert!(p.x >= config.page.margin_pt);
            assert!(p.y >= config.page.margin_pt);
            assert!(p.x + p.width <= config.page.width_pt - config.page.margin_pt + 1e-3);
            assert!(p.y + p.height <= config.page.height_pt - config.page.margin_pt + 1e-3);
        }
        assert!((result.placements[1].width - 144.0).abs() < 1e-3);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let config = LayoutConfig {
            max_page_budget: 1,
            default_font_size: 20.0,
            ..LayoutConfig::default()
        };
        let topics: Arc<[Topic]> = (0..80)
            .map(|i| make_topic(&format!("T{i}"), &["E_{0}^{2} = mc^{2}", "some more words here"]))
            .collect::<Vec<_>>()
            .into();
        let a = generate_layout(Arc::clone(&topics), &config, &StandardMetrics, &GuillotinePacker);
        let b = generate_layout(topics, &config, &StandardMetrics, &GuillotinePacker);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reduce_font_size_rounds_and_always_drops() {
        assert_eq!(reduce_font_size(10.0, 3, 0.1), 9.7);
        assert_eq!(reduce_font_size(10.0, 1, 0.01), 9.9);
        assert_eq!(reduce_font_size(8.0, 10, 0.25), 5.5);
        assert_eq!(reduce_font_size(9.9, 1, 0.1), 9.8);
    }

    #[test]
    fn test_reduce_font_size_strictly_decreases_at_every_valid_size() {
        for size in [MAX_FONT_SIZE, 10.0, 9.9, 4.1] {
            let next = reduce_font_size(size, 1, 0.001);
            assert!(next < size, "{size} did not drop, got {next}");
        }
        let mut size = MAX_FONT_SIZE;
        for _ in 0..700 {
            let next = reduce_font_size(size, 0, 0.1);
            assert!(next < size, "stalled at {size}");
            size = next;
        }
    }

    #[test]
    fn test_oversized_default_font_is_rejected_before_looping() {
        let config = LayoutConfig {
            default_font_size: 3_000_000.0,
            ..LayoutConfig::default()
        };
        let err = run(vec![stacks()], &config).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)), "{err:?}");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = LayoutConfig::default();
        config.min_font_size = 12.0;
        assert!(matches!(config.validate(), Err(LayoutError::InvalidConfig(_))));

        let mut config = LayoutConfig::default();
        config.max_page_budget = 0;
        assert!(config.validate().is_err());

        let mut config = LayoutConfig::default();
        config.reduce_multiplier = 0.0;
        assert!(config.validate().is_err());

        assert!(LayoutConfig::default().validate().is_ok());
    }
}
