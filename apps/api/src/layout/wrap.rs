//! Minimal-area line wrapping for a topic's title and bullets.
//!
//! # Algorithm
//! 1. Every source line (the title, then each bullet) is flattened to its
//!    plain characters and split into words at breakable whitespace.
//!    Whitespace inside script text is glued to its neighbours.
//! 2. `W` = ceil of the widest source line when set on a single line.
//! 3. Every integer width `w` in `ceil(W/2)..=W` is tried in ascending order:
//!    words are packed greedily, `area = widest line × line count` across the
//!    whole topic, and the first strict minimum wins.
//! 4. The winning line boundaries are mapped back onto the styled runs by
//!    character count, so each fragment keeps its style.
//!
//! Word and gap widths are measured once per source line, so the width scan
//! itself is pure arithmetic.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::{FontFace, TextMeasurer};
use crate::layout::markup::{StyledRun, SCRIPT_SCALE};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// A topic's parsed text, ready for wrapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub title: Vec<StyledRun>,
    pub bullets: Vec<Vec<StyledRun>>,
}

/// One output line: styled fragments and their measured width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedLine {
    pub fragments: Vec<StyledRun>,
    /// Width excluding trailing whitespace.
    pub width: f32,
}

/// Result of the width search for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedTopic {
    /// Chosen wrap width in points.
    pub width: u32,
    /// Widest source line before wrapping, rounded up (`W`).
    pub unwrapped_width: u32,
    /// Widest wrapped line. Exceeds `width` only for an over-wide single word.
    pub max_line_width: f32,
    pub title_lines: Vec<WrappedLine>,
    /// Wrapped lines grouped per bullet, in input order.
    pub bullet_lines: Vec<Vec<WrappedLine>>,
    pub font_size: f32,
    /// `font_size × total line count`.
    pub height: f32,
}

impl WrappedTopic {
    pub fn line_count(&self) -> usize {
        self.title_lines.len() + self.bullet_lines.iter().map(Vec::len).sum::<usize>()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run measurement and slicing
// ────────────────────────────────────────────────────────────────────────────

/// Advance width of a single styled run.
pub fn run_width(run: &StyledRun, face: FontFace, size: f32, measurer: &dyn TextMeasurer) -> f32 {
    let script = size * SCRIPT_SCALE;
    match run {
        StyledRun::Normal(t) => measurer.width_of(t, face, size),
        StyledRun::Superscript(t) | StyledRun::Subscript(t) => measurer.width_of(t, face, script),
        StyledRun::Combined {
            base,
            subscript,
            superscript,
        } => {
            measurer.width_of(base, face, size)
                + measurer.width_of(subscript, face, script)
                + measurer.width_of(superscript, face, script)
        }
    }
}

fn char_slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end.saturating_sub(start)).collect()
}

/// Cuts the char range `start..end` of the runs' plain text back into runs.
///
/// Each piece keeps its source style. A combined run keeps its combined form
/// only when the range covers both of its scripts; otherwise its parts come
/// out as separate normal / subscript / superscript pieces.
pub fn slice_runs(runs: &[StyledRun], start: usize, end: usize) -> Vec<StyledRun> {
    let mut out = Vec::new();
    let mut offset = 0;

    for run in runs {
        let len = run.char_len();
        let (run_start, run_end) = (offset, offset + len);
        offset = run_end;
        if run_end <= start || run_start >= end || len == 0 {
            continue;
        }
        let a = start.max(run_start) - run_start;
        let b = end.min(run_end) - run_start;

        match run {
            StyledRun::Normal(t) => out.push(StyledRun::Normal(char_slice(t, a, b))),
            StyledRun::Superscript(t) => out.push(StyledRun::Superscript(char_slice(t, a, b))),
            StyledRun::Subscript(t) => out.push(StyledRun::Subscript(char_slice(t, a, b))),
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => {
                let base_len = base.chars().count();
                let sub_len = subscript.chars().count();
                let base_part = char_slice(base, a.min(base_len), b.min(base_len));
                let sub_part = char_slice(
                    subscript,
                    a.saturating_sub(base_len).min(sub_len),
                    b.saturating_sub(base_len).min(sub_len),
                );
                let sup_part = char_slice(
                    superscript,
                    a.saturating_sub(base_len + sub_len),
                    b.saturating_sub(base_len + sub_len),
                );

                if sub_part == *subscript && sup_part == *superscript {
                    out.push(StyledRun::Combined {
                        base: base_part,
                        subscript: sub_part,
                        superscript: sup_part,
                    });
                } else {
                    for piece in [
                        StyledRun::Normal(base_part),
                        StyledRun::Subscript(sub_part),
                        StyledRun::Superscript(sup_part),
                    ] {
                        if !piece.is_empty() {
                            out.push(piece);
                        }
                    }
                }
            }
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Word segmentation
// ────────────────────────────────────────────────────────────────────────────

/// An unbreakable span of characters.
#[derive(Debug, Clone, Copy)]
struct Word {
    start: usize,
    end: usize,
    width: f32,
    /// Width of the whitespace between the previous word and this one
    /// (leading whitespace for the first word).
    gap_before: f32,
}

/// A source line measured at one font size.
struct MeasuredLine<'a> {
    runs: &'a [StyledRun],
    words: Vec<Word>,
    char_count: usize,
}

/// Per-character break opportunities: whitespace in normal text and
/// combined bases; never inside scripts.
fn breakable_chars(runs: &[StyledRun]) -> Vec<bool> {
    let mut flags = Vec::new();
    for run in runs {
        match run {
            StyledRun::Normal(t) => flags.extend(t.chars().map(char::is_whitespace)),
            StyledRun::Superscript(t) | StyledRun::Subscript(t) => {
                flags.extend(t.chars().map(|_| false))
            }
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => {
                flags.extend(base.chars().map(char::is_whitespace));
                flags.extend(subscript.chars().chain(superscript.chars()).map(|_| false));
            }
        }
    }
    flags
}

fn range_width(
    runs: &[StyledRun],
    start: usize,
    end: usize,
    face: FontFace,
    size: f32,
    measurer: &dyn TextMeasurer,
) -> f32 {
    if start >= end {
        return 0.0;
    }
    slice_runs(runs, start, end)
        .iter()
        .map(|r| run_width(r, face, size, measurer))
        .sum()
}

fn measure_line<'a>(
    runs: &'a [StyledRun],
    face: FontFace,
    size: f32,
    measurer: &dyn TextMeasurer,
) -> MeasuredLine<'a> {
    let breakable = breakable_chars(runs);
    let char_count = breakable.len();
    let mut words = Vec::new();
    let mut gap_start = 0;
    let mut i = 0;

    while i < char_count {
        if breakable[i] {
            i += 1;
            continue;
        }
        let start = i;
        while i < char_count && !breakable[i] {
            i += 1;
        }
        words.push(Word {
            start,
            end: i,
            width: range_width(runs, start, i, face, size, measurer),
            gap_before: range_width(runs, gap_start, start, face, size, measurer),
        });
        gap_start = i;
    }

    MeasuredLine {
        runs,
        words,
        char_count,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Greedy packing
// ────────────────────────────────────────────────────────────────────────────

/// Greedy word packing at `max_width`. Returns `(first word index, width)` per line.
///
/// A word never shares a line it would overflow, and a word wider than
/// `max_width` sits alone on its own line.
fn pack_words(words: &[Word], max_width: f32) -> Vec<(usize, f32)> {
    let Some(first) = words.first() else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut current = first.gap_before + first.width;

    for (i, word) in words.iter().enumerate().skip(1) {
        let candidate = current + word.gap_before + word.width;
        if candidate > max_width {
            lines.push((line_start, current));
            line_start = i;
            current = word.width;
        } else {
            current = candidate;
        }
    }
    lines.push((line_start, current));
    lines
}

/// Line count and widest line for one source line at `max_width`.
fn line_stats(line: &MeasuredLine<'_>, max_width: f32) -> (usize, f32) {
    if line.words.is_empty() {
        return if line.char_count > 0 { (1, 0.0) } else { (0, 0.0) };
    }
    let packed = pack_words(&line.words, max_width);
    let widest = packed.iter().map(|&(_, w)| w).fold(0.0_f32, f32::max);
    (packed.len(), widest)
}

/// Materializes the wrapped lines of one source line at `max_width`.
fn build_lines(line: &MeasuredLine<'_>, max_width: f32) -> Vec<WrappedLine> {
    if line.words.is_empty() {
        if line.char_count == 0 {
            return Vec::new();
        }
        return vec![WrappedLine {
            fragments: line.runs.to_vec(),
            width: 0.0,
        }];
    }

    let packed = pack_words(&line.words, max_width);
    packed
        .iter()
        .enumerate()
        .map(|(k, &(first_word, width))| {
            let start = if k == 0 { 0 } else { line.words[first_word].start };
            let end = packed
                .get(k + 1)
                .map(|&(next, _)| line.words[next].start)
                .unwrap_or(line.char_count);
            WrappedLine {
                fragments: slice_runs(line.runs, start, end),
                width,
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Wraps a topic at the width minimizing `widest line × line count`.
///
/// The title is measured in the bold face, bullets in the regular face, and
/// both share the chosen width.
pub fn wrap_paragraph(
    paragraph: &Paragraph,
    font_size: f32,
    measurer: &dyn TextMeasurer,
) -> WrappedTopic {
    let title = measure_line(&paragraph.title, FontFace::HelveticaBold, font_size, measurer);
    let bullets: Vec<MeasuredLine<'_>> = paragraph
        .bullets
        .iter()
        .map(|runs| measure_line(runs, FontFace::Helvetica, font_size, measurer))
        .collect();
    let sources: Vec<&MeasuredLine<'_>> = std::iter::once(&title).chain(bullets.iter()).collect();

    let unwrapped = sources
        .iter()
        .map(|line| line_stats(line, f32::INFINITY).1)
        .fold(0.0_f32, f32::max);
    let unwrapped_width = unwrapped.ceil() as u32;

    let mut best_width = unwrapped_width;
    let mut best_area = f32::INFINITY;
    for candidate in unwrapped_width.div_ceil(2)..=unwrapped_width {
        let (lines, widest) = sources.iter().fold((0usize, 0.0_f32), |(n, w), line| {
            let (count, width) = line_stats(line, candidate as f32);
            (n + count, w.max(width))
        });
        let area = widest * lines as f32;
        if area < best_area {
            best_area = area;
            best_width = candidate;
        }
    }

    let max_width = best_width as f32;
    let title_lines = build_lines(&title, max_width);
    let bullet_lines: Vec<Vec<WrappedLine>> =
        bullets.iter().map(|line| build_lines(line, max_width)).collect();
    let max_line_width = title_lines
        .iter()
        .chain(bullet_lines.iter().flatten())
        .map(|l| l.width)
        .fold(0.0_f32, f32::max);

    let mut wrapped = WrappedTopic {
        width: best_width,
        unwrapped_width,
        max_line_width,
        title_lines,
        bullet_lines,
        font_size,
        height: 0.0,
    };
    wrapped.height = font_size * wrapped.line_count() as f32;
    wrapped
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
