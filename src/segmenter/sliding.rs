//! Sliding-window segmentation: fixed-size character windows with overlap.

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::unit::Unit;

/// Split text into windows of `window_size` characters stepping by
/// `window_size - overlap`. Overlapped text repeats across consecutive
/// windows; that duplication is intentional.
pub(super) fn segment(text: &str, document: &str, config: &ChunkingConfig) -> Result<Vec<Unit>> {
    if config.overlap >= config.window_size {
        return Err(RagError::Config(format!(
            "Sliding window overlap ({}) must be smaller than window size ({})",
            config.overlap, config.window_size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let step = config.window_size - config.overlap;
    let mut units = Vec::new();

    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.window_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        units.push(Unit::new(
            document,
            "sliding",
            units.len(),
            window,
            start,
            end,
            0,
        ));
        start += step;
    }

    Ok(units)
}
