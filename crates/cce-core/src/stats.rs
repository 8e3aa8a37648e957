//! Result records reported by the compressor and decompressor

use crate::message::{Message, VerbatimMap};
use serde::{Deserialize, Serialize};

/// Aggregate numbers for one compression run. Counts are input-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// `sum_orig_chars / sum_result_chars`; 1.0 when both sides are empty.
    pub ratio: f64,
    /// Same shape, measured with the token counter.
    pub token_ratio: f64,
    pub messages_compressed: usize,
    pub messages_preserved: usize,
    #[serde(default)]
    pub messages_deduped: usize,
    #[serde(default)]
    pub messages_fuzzy_deduped: usize,
    /// Mirrors the caller-supplied source version.
    pub original_version: u64,
}

/// Reported when the budget search ran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub fits: bool,
    pub token_count: u64,
    /// The recency window the final pass ran with.
    pub recency_window: usize,
}

/// Everything `compress` hands back. `messages` and `verbatim` must be
/// persisted together atomically.
#[derive(Debug, Clone)]
pub struct CompressResult {
    pub messages: Vec<Message>,
    pub verbatim: VerbatimMap,
    pub compression: CompressionStats,
    pub budget: Option<BudgetReport>,
}

/// Everything `uncompress` hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct UncompressResult {
    pub messages: Vec<Message>,
    /// Rewrites expanded back into originals, across all rounds.
    pub messages_expanded: usize,
    /// Messages without provenance passed through on the first round.
    pub messages_passthrough: usize,
    /// Referenced ids absent from the verbatim store, in encounter order.
    pub missing_ids: Vec<String>,
}
