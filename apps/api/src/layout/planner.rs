//! Topic planner: turns one topic into the rectangle the packer sees.
//!
//! Text topics are normalized (NFC, trimmed, blank bullets dropped), parsed
//! for markup and wrapped at the current font size. Image topics are scaled
//! so their longer side is [`IMAGE_TARGET_PT`].

use icu_normalizer::ComposingNormalizerBorrowed;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout::font_metrics::TextMeasurer;
use crate::layout::markup::{parse_markup, MarkupParseError, ParsedMarkup, StyledRun};
use crate::layout::wrap::{wrap_paragraph, Paragraph, WrappedTopic};
use crate::models::topic::{ImageTopic, TextTopic, Topic};

/// Longer image side on the page: 2 inches.
pub const IMAGE_TARGET_PT: f32 = 2.0 * 72.0;

/// What the renderer needs to draw one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopicContent {
    Text(WrappedTopic),
    Image {
        pixel_width: u32,
        pixel_height: u32,
    },
}

/// A topic's content and its rectangle size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPlan {
    pub width: f32,
    pub height: f32,
    pub content: TopicContent,
}

/// NFC-normalizes and trims a piece of topic text.
pub fn normalize_text(raw: &str) -> String {
    ComposingNormalizerBorrowed::new_nfc()
        .normalize(raw)
        .trim()
        .to_string()
}

/// Normalizes and parses one piece of topic text.
fn parse_text(raw: &str) -> ParsedMarkup {
    let normalized = normalize_text(raw);
    let parsed = parse_markup(&normalized);
    debug_assert_eq!(
        parsed.runs.iter().map(StyledRun::to_markup).collect::<String>(),
        normalized,
        "markup parse must be lossless"
    );
    parsed
}

fn visible_bullets(topic: &TextTopic) -> impl Iterator<Item = &String> {
    topic.bullets.iter().filter(|b| !b.trim().is_empty())
}

/// Normalizes and parses a text topic's title and bullets.
pub fn build_paragraph(topic: &TextTopic) -> Paragraph {
    Paragraph {
        title: parse_text(&topic.title).runs,
        bullets: visible_bullets(topic).map(|b| parse_text(b).runs).collect(),
    }
}

/// Every markup problem in a text topic, title first.
pub fn markup_warnings(topic: &TextTopic) -> Vec<MarkupParseError> {
    std::iter::once(&topic.title)
        .chain(visible_bullets(topic))
        .flat_map(|raw| parse_text(raw).warnings)
        .collect()
}

/// Logs degraded markup once per request; attempts re-parse silently.
pub fn log_markup_warnings(topics: &[Topic]) {
    for (index, topic) in topics.iter().enumerate() {
        let Topic::Text(text) = topic else { continue };
        for MarkupParseError { offset, issue } in markup_warnings(text) {
            warn!(topic = index, offset, %issue, "Markup treated as literal text");
        }
    }
}

/// Scales an image so its longer side is [`IMAGE_TARGET_PT`], keeping the aspect ratio.
pub fn scale_image(pixel_width: u32, pixel_height: u32) -> (f32, f32) {
    let longest = pixel_width.max(pixel_height).max(1) as f32;
    let scale = IMAGE_TARGET_PT / longest;
    (pixel_width as f32 * scale, pixel_height as f32 * scale)
}

fn plan_image(image: &ImageTopic) -> TopicPlan {
    let (width, height) = scale_image(image.pixel_width, image.pixel_height);
    TopicPlan {
        width,
        height,
        content: TopicContent::Image {
            pixel_width: image.pixel_width,
            pixel_height: image.pixel_height,
        },
    }
}

/// Plans one topic at `font_size`.
///
/// A text rectangle is as wide as the wrap width, or the widest line when an
/// unbreakable word overhangs it.
pub fn plan_topic(
    topic: &Topic,
    font_size: f32,
    measurer: &dyn TextMeasurer,
) -> TopicPlan {
    match topic {
        Topic::Text(text) => {
            let paragraph = build_paragraph(text);
            let wrapped = wrap_paragraph(&paragraph, font_size, measurer);
            TopicPlan {
                width: (wrapped.width as f32).max(wrapped.max_line_width),
                height: wrapped.height,
                content: TopicContent::Text(wrapped),
            }
        }
        Topic::Image(image) => plan_image(image),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
