//! Compression and decompression options

use crate::tokens::TokenCounter;
use std::fmt;

/// Knobs for a compression run.
pub struct CompressOptions {
    /// Role names never compressed.
    pub preserve: Vec<String>,
    /// Count of tail messages exempt from compression.
    pub recency_window: usize,
    /// Version tag mirrored into every emitted provenance record.
    pub source_version: u64,
    /// Target token count; enables the budget search.
    pub token_budget: Option<u64>,
    /// Floor for the budget search's recency window.
    pub min_recency_window: usize,
    /// Exact duplicate detection.
    pub dedup: bool,
    /// Near-duplicate detection (line-level Jaccard).
    pub fuzzy_dedup: bool,
    /// Jaccard acceptance threshold in [0, 1].
    pub fuzzy_threshold: f64,
    /// Inline the summary id into emitted content (`[summary#<id>: …]`).
    pub embed_summary_id: bool,
    /// Hard-truncate tail messages when the budget search cannot fit.
    pub force_converge: bool,
    /// Replaces the default `ceil(chars / 3.5)` heuristic.
    pub token_counter: Option<TokenCounter>,
}

impl CompressOptions {
    pub fn new() -> Self {
        Self {
            preserve: vec!["system".to_string()],
            recency_window: 4,
            source_version: 0,
            token_budget: None,
            min_recency_window: 0,
            dedup: true,
            fuzzy_dedup: false,
            fuzzy_threshold: 0.85,
            embed_summary_id: false,
            force_converge: false,
            token_counter: None,
        }
    }

    pub fn is_preserved_role(&self, role: Option<&str>) -> bool {
        match role {
            Some(r) => self.preserve.iter().any(|p| p == r),
            None => false,
        }
    }

    /// Same options with a different recency window (budget-search probes).
    pub fn with_recency_window(&self, recency_window: usize) -> Self {
        Self {
            preserve: self.preserve.clone(),
            recency_window,
            source_version: self.source_version,
            token_budget: self.token_budget,
            min_recency_window: self.min_recency_window,
            dedup: self.dedup,
            fuzzy_dedup: self.fuzzy_dedup,
            fuzzy_threshold: self.fuzzy_threshold,
            embed_summary_id: self.embed_summary_id,
            force_converge: self.force_converge,
            token_counter: self.token_counter.clone(),
        }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CompressOptions {
    fn clone(&self) -> Self {
        self.with_recency_window(self.recency_window)
    }
}

impl fmt::Debug for CompressOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressOptions")
            .field("preserve", &self.preserve)
            .field("recency_window", &self.recency_window)
            .field("source_version", &self.source_version)
            .field("token_budget", &self.token_budget)
            .field("min_recency_window", &self.min_recency_window)
            .field("dedup", &self.dedup)
            .field("fuzzy_dedup", &self.fuzzy_dedup)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("embed_summary_id", &self.embed_summary_id)
            .field("force_converge", &self.force_converge)
            .field(
                "token_counter",
                &self.token_counter.as_ref().map(|_| "custom"),
            )
            .finish()
    }
}

/// Knobs for decompression.
#[derive(Debug, Clone)]
pub struct UncompressOptions {
    /// Re-expand restored messages that themselves carry provenance.
    pub recursive: bool,
    /// Cap on recursive rounds.
    pub max_depth: usize,
}

impl UncompressOptions {
    pub fn new() -> Self {
        Self {
            recursive: false,
            max_depth: 10,
        }
    }
}

impl Default for UncompressOptions {
    fn default() -> Self {
        Self::new()
    }
}
