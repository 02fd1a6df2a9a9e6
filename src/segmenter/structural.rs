//! Structural segmentation: split on blank-line and heading boundaries.

use super::sentence_tokenize;
use crate::unit::Unit;
use regex::Regex;
use std::sync::LazyLock;

/// Two-or-more newlines, or a markup heading prefix.
static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}|#+ ").expect("boundary regex is valid"));

/// Split text on structural boundaries. Each non-empty trimmed section
/// becomes one unit, numbered sequentially.
pub(super) fn segment(text: &str, document: &str) -> Vec<Unit> {
    split_sections(text)
        .into_iter()
        .enumerate()
        .map(|(idx, section)| {
            let num_sentences = sentence_tokenize(&section).len();
            Unit::new(
                document,
                "structural",
                idx,
                section,
                idx,
                idx + 1,
                num_sentences,
            )
        })
        .collect()
}

/// Raw structural sections, trimmed, empties dropped. Shared with the
/// hybrid strategy.
pub(super) fn split_sections(text: &str) -> Vec<String> {
    BOUNDARY
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
