//! Chat message record and the verbatim side-store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Reserved metadata key carrying compression provenance.
pub const PROVENANCE_KEY: &str = "_cce_original";

/// One turn in a chat sequence.
///
/// Known fields are typed; everything else a caller sends rides along in
/// `extra` and is re-emitted untouched. The `id` is the only identifier
/// key and must be unique within a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Position tag supplied by the caller. The pipeline derives positions
    /// from sequence order, never from this field.
    #[serde(default)]
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Opaque tool invocations. A non-empty list forces preservation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    /// Open metadata map. `_cce_original` is the single reserved key.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Unknown sibling fields, preserved on pass-through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            index: 0,
            role: Some(role.into()),
            content: Some(content.into()),
            tool_calls: None,
            metadata: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, "user", content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, "assistant", content)
    }

    /// Content as a str, empty when absent.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Content length in characters (what callers see in emitted markers).
    pub fn content_chars(&self) -> usize {
        self.content_str().chars().count()
    }

    /// Content length in bytes (what the size guard compares).
    pub fn content_len(&self) -> usize {
        self.content_str().len()
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Parse the `_cce_original` provenance record, if present.
    pub fn provenance(&self) -> Option<ProvenanceRecord> {
        self.metadata
            .get(PROVENANCE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Attach (or overwrite) the `_cce_original` provenance record.
    pub fn set_provenance(&mut self, record: &ProvenanceRecord) {
        if let Ok(value) = serde_json::to_value(record) {
            self.metadata.insert(PROVENANCE_KEY.to_string(), value);
        }
    }

    /// Whether this message was rewritten by a previous compression.
    pub fn is_rewritten(&self) -> bool {
        self.metadata.contains_key(PROVENANCE_KEY)
    }
}

/// Provenance attached to every rewritten message under `_cce_original`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Ordered original message ids covered by the rewrite. Length > 1
    /// when consecutive messages were merged.
    pub ids: Vec<String>,
    /// Deterministic id of shape `cce_sum_<base36>`, a pure function of
    /// the sorted `ids`.
    pub summary_id: String,
    /// Summary ids of rewrites found inside the input to this round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ids: Option<Vec<String>>,
    /// Mirrors the caller-supplied source version.
    #[serde(default)]
    pub version: u64,
}

/// Id-keyed store of originals that makes compression reversible.
///
/// Callers must persist this together with the emitted messages; across
/// repeated compressions the stores are merged.
pub type VerbatimMap = HashMap<String, Message>;

/// Lookup seam for the decompressor: a map, or any closure resolving ids.
pub trait VerbatimSource {
    fn lookup(&self, id: &str) -> Option<Message>;
}

impl VerbatimSource for VerbatimMap {
    fn lookup(&self, id: &str) -> Option<Message> {
        self.get(id).cloned()
    }
}

impl<F> VerbatimSource for F
where
    F: Fn(&str) -> Option<Message>,
{
    fn lookup(&self, id: &str) -> Option<Message> {
        self(id)
    }
}
