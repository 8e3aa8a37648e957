//! Reversible compression for chat-style message sequences
//!
//! Older prose turns shrink into deterministic summaries while code,
//! structured data, secrets, and recent turns pass through verbatim.
//! Every rewrite is recorded in a verbatim side-store, so [`uncompress`]
//! restores the original sequence byte-for-byte.
//!
//! ```
//! use cce_compress::{compress, uncompress, CompressOptions, Message, UncompressOptions};
//!
//! let messages: Vec<Message> = (0..8)
//!     .map(|i| {
//!         Message::assistant(
//!             format!("m{i}"),
//!             format!(
//!                 "Turn {i} walked through the cache migration plan step by step, \
//!                  noting that every canary check passed before traffic moved over."
//!             ),
//!         )
//!     })
//!     .collect();
//!
//! let compressed = compress(&messages, &CompressOptions::new()).unwrap();
//! let restored = uncompress(
//!     &compressed.messages,
//!     &compressed.verbatim,
//!     &UncompressOptions::new(),
//! )
//! .unwrap();
//! assert_eq!(restored.messages, messages);
//! ```

mod budget;
mod classify;
mod decompress;
mod dedup;
mod detect;
mod hash;
pub mod llm;
mod pipeline;
mod score;
mod split;
mod summarize;

pub use cce_core::{
    default_token_counter, BudgetReport, CompressOptions, CompressResult, CompressionStats,
    Error, Message, ProvenanceRecord, TokenCounter, UncompressOptions, UncompressResult,
    VerbatimMap, VerbatimSource, PROVENANCE_KEY,
};
pub use decompress::uncompress;
pub use llm::{
    make_escalating_summarizer, make_summarizer, EscalatingSummarizer, LlmSummarizer, Summarize,
    SummarizeError, SummarizerOptions,
};
pub use pipeline::{compress, compress_with_summarizer};
