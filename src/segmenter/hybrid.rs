//! Hybrid segmentation: structural sections, semantically split within each.

use super::{semantic, structural};
use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::provider::EmbeddingProvider;
use crate::unit::Unit;

/// Apply the structural split first, then the semantic split independently
/// within each section. Units are tagged "hybrid" and numbered sequentially
/// across the whole document; offsets are sentence indices within the
/// owning section.
pub(super) async fn segment(
    text: &str,
    document: &str,
    config: &ChunkingConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<Unit>> {
    let mut units = Vec::new();

    for section in structural::split_sections(text) {
        let runs = semantic::split_runs(&section, config, embedder).await?;
        for run in runs {
            units.push(Unit::new(
                document,
                "hybrid",
                units.len(),
                run.text,
                run.start_index,
                run.end_index,
                run.num_sentences,
            ));
        }
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::test_support::HashEmbedder;

    #[tokio::test]
    async fn test_hybrid_tags_and_numbering() {
        let embedder = HashEmbedder::new(16);
        let text = "Intro sentence one. Intro sentence two.\n\nBody sentence one. Body two.";
        let units = segment(text, "doc", &ChunkingConfig::default(), &embedder)
            .await
            .unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_id, "doc_hybrid_0");
        assert_eq!(units[1].unit_id, "doc_hybrid_1");
        for unit in &units {
            assert_eq!(unit.sequence_metadata.strategy, "hybrid");
        }
    }

    #[tokio::test]
    async fn test_sections_do_not_bleed() {
        let embedder = HashEmbedder::new(16);
        let text = "First topic here. More first topic.\n\nSecond topic now. More second topic.";
        let units = segment(text, "doc", &ChunkingConfig::default(), &embedder)
            .await
            .unwrap();

        assert!(units[0].text.contains("First"));
        assert!(!units[0].text.contains("Second"));
    }
}
