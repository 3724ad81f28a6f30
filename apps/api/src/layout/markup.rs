//! Inline style markup: `^{sup}`, `_{sub}` and the combined `base_{sub}^{sup}` form.
//!
//! The grammar is tried in a fixed order at every scan position:
//! combined, superscript, subscript, plain. Anything that matches none of
//! them (an unterminated `^{`, empty braces, a bare `_`) is kept as literal
//! text and reported as a [`MarkupParseError`] warning. Parsing never fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Script glyphs are set at this fraction of the base size.
pub const SCRIPT_SCALE: f32 = 0.7;
/// Vertical offset of a script baseline, as a fraction of the base size.
pub const SCRIPT_RISE: f32 = 1.0 - SCRIPT_SCALE;

/// A contiguous span of text carrying one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyledRun {
    Normal(String),
    Superscript(String),
    Subscript(String),
    /// A base immediately followed by both a subscript and a superscript.
    Combined {
        base: String,
        subscript: String,
        superscript: String,
    },
}

impl StyledRun {
    /// The characters this run contributes to the paragraph's plain text.
    ///
    /// A combined run contributes `base`, then `subscript`, then `superscript`.
    pub fn plain_text(&self) -> String {
        match self {
            StyledRun::Normal(t) | StyledRun::Superscript(t) | StyledRun::Subscript(t) => {
                t.clone()
            }
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => format!("{base}{subscript}{superscript}"),
        }
    }

    /// Number of chars in [`plain_text`](Self::plain_text).
    pub fn char_len(&self) -> usize {
        match self {
            StyledRun::Normal(t) | StyledRun::Superscript(t) | StyledRun::Subscript(t) => {
                t.chars().count()
            }
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => base.chars().count() + subscript.chars().count() + superscript.chars().count(),
        }
    }

    /// Re-encodes the run as markup. Concatenating this over a parse result
    /// reproduces the parser input.
    pub fn to_markup(&self) -> String {
        match self {
            StyledRun::Normal(t) => t.clone(),
            StyledRun::Superscript(t) => format!("^{{{t}}}"),
            StyledRun::Subscript(t) => format!("_{{{t}}}"),
            StyledRun::Combined {
                base,
                subscript,
                superscript,
            } => format!("{base}_{{{subscript}}}^{{{superscript}}}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.char_len() == 0
    }
}

/// Why a piece of markup was demoted to literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupIssue {
    Unterminated,
    EmptyBraces,
    BareMarker,
}

impl std::fmt::Display for MarkupIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkupIssue::Unterminated => write!(f, "missing closing '}}'"),
            MarkupIssue::EmptyBraces => write!(f, "empty braces"),
            MarkupIssue::BareMarker => write!(f, "marker not followed by '{{'"),
        }
    }
}

/// Non-fatal: the offending characters are kept as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("markup at byte {offset} treated as literal text: {issue}")]
pub struct MarkupParseError {
    pub offset: usize,
    pub issue: MarkupIssue,
}

/// Parser output: runs covering the whole input plus any degraded markup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMarkup {
    pub runs: Vec<StyledRun>,
    pub warnings: Vec<MarkupParseError>,
}

// ────────────────────────────────────────────────────────────────────────────
// Parser
// ────────────────────────────────────────────────────────────────────────────

/// Parses `raw` into styled runs. Adjacent normal runs are merged.
pub fn parse_markup(raw: &str) -> ParsedMarkup {
    let mut out = ParsedMarkup::default();
    let mut pos = 0;

    while pos < raw.len() {
        let rest = &raw[pos..];

        if let Some((run, consumed)) = match_combined(rest)
            .or_else(|| match_braced(rest, '^').map(|(t, n)| (StyledRun::Superscript(t), n)))
            .or_else(|| match_braced(rest, '_').map(|(t, n)| (StyledRun::Subscript(t), n)))
        {
            push_run(&mut out.runs, run);
            pos += consumed;
            continue;
        }

        let plain_len = plain_prefix_len(rest);
        if plain_len > 0 {
            push_run(&mut out.runs, StyledRun::Normal(rest[..plain_len].to_string()));
            pos += plain_len;
            continue;
        }

        // A marker that no production accepted: keep it as a literal char.
        out.warnings.push(MarkupParseError {
            offset: pos,
            issue: classify_failure(rest),
        });
        push_run(&mut out.runs, StyledRun::Normal(rest[..1].to_string()));
        pos += 1;
    }

    out
}

/// Length in bytes of the leading span free of `^` and `_`.
fn plain_prefix_len(s: &str) -> usize {
    s.find(['^', '_']).unwrap_or(s.len())
}

/// `marker{content}` at the start of `s`; content must be non-empty and has
/// no `}`. Returns the content and the bytes consumed.
fn match_braced(s: &str, marker: char) -> Option<(String, usize)> {
    let body = s.strip_prefix(marker)?.strip_prefix('{')?;
    let close = body.find('}')?;
    if close == 0 {
        return None;
    }
    Some((body[..close].to_string(), close + 3))
}

fn match_combined(s: &str) -> Option<(StyledRun, usize)> {
    let base_len = plain_prefix_len(s);
    if base_len == 0 {
        return None;
    }
    let (subscript, sub_len) = match_braced(&s[base_len..], '_')?;
    let (superscript, sup_len) = match_braced(&s[base_len + sub_len..], '^')?;
    let run = StyledRun::Combined {
        base: s[..base_len].to_string(),
        subscript,
        superscript,
    };
    Some((run, base_len + sub_len + sup_len))
}

fn classify_failure(s: &str) -> MarkupIssue {
    match s.get(1..) {
        Some(after) if after.starts_with("{}") => MarkupIssue::EmptyBraces,
        Some(after) if after.starts_with('{') => MarkupIssue::Unterminated,
        _ => MarkupIssue::BareMarker,
    }
}

fn push_run(runs: &mut Vec<StyledRun>, run: StyledRun) {
    if let StyledRun::Normal(text) = &run {
        if let Some(StyledRun::Normal(prev)) = runs.last_mut() {
            prev.push_str(text);
            return;
        }
    }
    runs.push(run);
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
