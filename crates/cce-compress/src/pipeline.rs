//! Pipeline orchestration
//!
//! The run is phase-structured so the sync and async entry points share
//! everything but the summarization step:
//!
//! 1. plan: classify, dedup, and group consecutive same-role messages
//! 2. resolve: produce one summary per group (deterministic, or an
//!    external capability behind a fallback)
//! 3. assemble: apply size guards, stamp provenance, fill the verbatim
//!    store, compute stats

use crate::dedup::{self, DupOutcome};
use crate::llm::{self, Summarize};
use crate::{classify, hash, split, summarize};
use cce_core::{
    tokens, CompressOptions, CompressResult, CompressionStats, Error, Message, ProvenanceRecord,
    VerbatimMap,
};
use tracing::{debug, trace};

pub(crate) enum PlanItem {
    Passthrough {
        position: usize,
    },
    DedupRewrite {
        position: usize,
        replacement: String,
        fuzzy: bool,
    },
    Group(GroupJob),
}

pub(crate) struct GroupJob {
    pub members: Vec<usize>,
    /// Text handed to the summarizer: the concatenated member contents,
    /// or the concatenated prose of a code-split message.
    pub input: String,
    /// Fence blocks re-attached after summarization (code-split only).
    pub fences: Vec<String>,
    pub code_split: bool,
}

pub(crate) struct Plan {
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn group_jobs(&self) -> impl Iterator<Item = &GroupJob> {
        self.items.iter().filter_map(|item| match item {
            PlanItem::Group(job) => Some(job),
            _ => None,
        })
    }
}

/// One summary produced for one group job. Entities are empty when an
/// external capability wrote the text.
pub(crate) struct ResolvedSummary {
    pub text: String,
    pub entities: Vec<String>,
}

// ─── Entry points ────────────────────────────────────────────────────────

/// Compress a message sequence with deterministic summarization.
pub fn compress(
    messages: &[Message],
    options: &CompressOptions,
) -> Result<CompressResult, Error> {
    validate(messages)?;
    if options.token_budget.is_some() {
        return crate::budget::search(messages, options);
    }
    Ok(run_once(messages, options))
}

/// Compress with an external summarizer, awaiting each group in order.
/// Failures and oversized output fall back to deterministic summaries.
pub async fn compress_with_summarizer(
    messages: &[Message],
    options: &CompressOptions,
    summarizer: &dyn Summarize,
) -> Result<CompressResult, Error> {
    validate(messages)?;
    if options.token_budget.is_some() {
        return crate::budget::search_with_summarizer(messages, options, summarizer).await;
    }
    Ok(run_once_with_summarizer(messages, options, summarizer).await)
}

pub(crate) fn validate(messages: &[Message]) -> Result<(), Error> {
    for (i, message) in messages.iter().enumerate() {
        if message.id.is_empty() {
            return Err(Error::type_error(format!(
                "message at index {i} has an empty id"
            )));
        }
    }
    Ok(())
}

pub(crate) fn run_once(messages: &[Message], options: &CompressOptions) -> CompressResult {
    let plan = build_plan(messages, options);
    let resolved: Vec<ResolvedSummary> = plan.group_jobs().map(resolve_deterministic).collect();
    assemble(messages, options, &plan, resolved)
}

pub(crate) async fn run_once_with_summarizer(
    messages: &[Message],
    options: &CompressOptions,
    summarizer: &dyn Summarize,
) -> CompressResult {
    let plan = build_plan(messages, options);
    let mut resolved = Vec::new();
    for job in plan.group_jobs() {
        resolved.push(match llm::with_fallback(summarizer, &job.input).await {
            Some(text) => ResolvedSummary {
                text,
                entities: Vec::new(),
            },
            None => resolve_deterministic(job),
        });
    }
    assemble(messages, options, &plan, resolved)
}

// ─── Plan ────────────────────────────────────────────────────────────────

pub(crate) fn build_plan(messages: &[Message], options: &CompressOptions) -> Plan {
    let verdicts = classify::classify_all(messages, options);
    let dups = if options.dedup || options.fuzzy_dedup {
        dedup::find_duplicates(messages, options)
    } else {
        Default::default()
    };

    let mut items = Vec::new();
    let mut group: Vec<usize> = Vec::new();
    let mut group_rewrites = false;

    for (i, message) in messages.iter().enumerate() {
        if let Some(outcome) = dups.get(&i) {
            close_group(messages, &mut group, group_rewrites, &mut items);
            match outcome {
                DupOutcome::KeepTarget => items.push(PlanItem::Passthrough { position: i }),
                DupOutcome::Replaced {
                    replacement, fuzzy, ..
                } => items.push(PlanItem::DedupRewrite {
                    position: i,
                    replacement: replacement.clone(),
                    fuzzy: *fuzzy,
                }),
            }
            continue;
        }

        let verdict = &verdicts[i];
        if verdict.code_split {
            close_group(messages, &mut group, group_rewrites, &mut items);
            let (prose, fences) = split::split_prose_and_fences(message.content_str());
            items.push(PlanItem::Group(GroupJob {
                members: vec![i],
                input: prose,
                fences,
                code_split: true,
            }));
        } else if verdict.already_compressed || !verdict.preserved() {
            // Fresh prose and earlier-round rewrites accumulate in
            // separate same-role runs.
            let role_changed = group
                .last()
                .is_some_and(|&last| messages[last].role != message.role);
            if !group.is_empty() && (group_rewrites != verdict.already_compressed || role_changed)
            {
                close_group(messages, &mut group, group_rewrites, &mut items);
            }
            group_rewrites = verdict.already_compressed;
            group.push(i);
        } else {
            close_group(messages, &mut group, group_rewrites, &mut items);
            items.push(PlanItem::Passthrough { position: i });
        }
    }
    close_group(messages, &mut group, group_rewrites, &mut items);

    debug!(
        messages = messages.len(),
        items = items.len(),
        "compression plan built"
    );
    Plan { items }
}

fn close_group(
    messages: &[Message],
    group: &mut Vec<usize>,
    rewrite_run: bool,
    items: &mut Vec<PlanItem>,
) {
    if group.is_empty() {
        return;
    }
    let members = std::mem::take(group);
    // A lone rewrite stays as it is; only runs of rewrites merge.
    if rewrite_run && members.len() == 1 {
        items.push(PlanItem::Passthrough {
            position: members[0],
        });
        return;
    }
    let input = members
        .iter()
        .map(|&i| messages[i].content_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    items.push(PlanItem::Group(GroupJob {
        members,
        input,
        fences: Vec::new(),
        code_split: false,
    }));
}

// ─── Resolve ─────────────────────────────────────────────────────────────

pub(crate) fn resolve_deterministic(job: &GroupJob) -> ResolvedSummary {
    if job.code_split {
        ResolvedSummary {
            text: summarize::condense(&job.input, summarize::budget_for(&job.input)),
            entities: Vec::new(),
        }
    } else {
        let summary = summarize::summarize(&job.input);
        ResolvedSummary {
            text: summary.text,
            entities: summary.entities,
        }
    }
}

// ─── Assemble ────────────────────────────────────────────────────────────

fn parent_ids_of(members: &[&Message]) -> Option<Vec<String>> {
    let parents: Vec<String> = members
        .iter()
        .filter_map(|m| m.provenance())
        .map(|record| record.summary_id)
        .collect();
    if parents.is_empty() {
        None
    } else {
        Some(parents)
    }
}

fn format_summary(
    options: &CompressOptions,
    summary_id: &str,
    text: &str,
    member_count: usize,
    entities: &[String],
    fences: &[String],
) -> String {
    let mut out = if options.embed_summary_id {
        format!("[summary#{summary_id}: {text}")
    } else {
        format!("[summary: {text}")
    };
    if member_count > 1 {
        out.push_str(&format!(" ({member_count} messages merged)"));
    }
    if !entities.is_empty() {
        out.push_str(&format!(" | entities: {}", entities.join(", ")));
    }
    out.push(']');
    for fence in fences {
        out.push_str("\n\n");
        out.push_str(fence);
    }
    out
}

fn assemble(
    messages: &[Message],
    options: &CompressOptions,
    plan: &Plan,
    resolved: Vec<ResolvedSummary>,
) -> CompressResult {
    let mut emitted: Vec<Message> = Vec::with_capacity(messages.len());
    let mut verbatim = VerbatimMap::new();
    let mut compressed = 0usize;
    let mut preserved = 0usize;
    let mut deduped = 0usize;
    let mut fuzzy_deduped = 0usize;
    let mut summaries = resolved.into_iter();

    for item in &plan.items {
        match item {
            PlanItem::Passthrough { position } => {
                emitted.push(messages[*position].clone());
                preserved += 1;
            }
            PlanItem::DedupRewrite {
                position,
                replacement,
                fuzzy,
            } => {
                let original = &messages[*position];
                if replacement.len() >= original.content_len() {
                    emitted.push(original.clone());
                    preserved += 1;
                    continue;
                }
                let mut rewritten = original.clone();
                rewritten.content = Some(replacement.clone());
                rewritten.set_provenance(&ProvenanceRecord {
                    ids: vec![original.id.clone()],
                    summary_id: hash::summary_id(std::slice::from_ref(&original.id)),
                    parent_ids: parent_ids_of(&[original]),
                    version: options.source_version,
                });
                verbatim.insert(original.id.clone(), original.clone());
                emitted.push(rewritten);
                if *fuzzy {
                    fuzzy_deduped += 1;
                } else {
                    deduped += 1;
                }
            }
            PlanItem::Group(job) => {
                let summary = summaries.next().expect("one summary per group job");
                let members: Vec<&Message> = job.members.iter().map(|&i| &messages[i]).collect();
                // A rewrite member contributes the original ids it covers,
                // so a chained merge resolves straight to true originals
                // in the caller's accumulated store.
                let ids: Vec<String> = members
                    .iter()
                    .flat_map(|m| match m.provenance() {
                        Some(record) => record.ids,
                        None => vec![m.id.clone()],
                    })
                    .collect();
                let summary_id = hash::summary_id(&ids);
                let formatted = format_summary(
                    options,
                    &summary_id,
                    &summary.text,
                    members.len(),
                    &summary.entities,
                    &job.fences,
                );

                let combined_len: usize = members.iter().map(|m| m.content_len()).sum();
                if formatted.len() >= combined_len {
                    // Rewrite would not shrink: abandon it.
                    trace!(summary_id = %summary_id, "size guard rejected rewrite");
                    for member in &members {
                        emitted.push((*member).clone());
                        preserved += 1;
                    }
                    continue;
                }

                let mut rewritten = members[0].clone();
                rewritten.content = Some(formatted);
                rewritten.set_provenance(&ProvenanceRecord {
                    ids: ids.clone(),
                    summary_id,
                    parent_ids: parent_ids_of(&members),
                    version: options.source_version,
                });
                for member in &members {
                    // Covered ids inherited through a member's provenance
                    // already live in the store of the round that wrote
                    // them; storing the intermediate would shadow them.
                    if member.provenance().is_none() {
                        verbatim.insert(member.id.clone(), (*member).clone());
                    }
                }
                emitted.push(rewritten);
                compressed += members.len();
            }
        }
    }

    let (ratio, token_ratio) = ratios(messages, &emitted, options);
    debug!(
        compressed,
        preserved, deduped, fuzzy_deduped, ratio, "compression pass complete"
    );

    CompressResult {
        messages: emitted,
        verbatim,
        compression: CompressionStats {
            ratio,
            token_ratio,
            messages_compressed: compressed,
            messages_preserved: preserved,
            messages_deduped: deduped,
            messages_fuzzy_deduped: fuzzy_deduped,
            original_version: options.source_version,
        },
        budget: None,
    }
}

/// Character and token ratios of an input/output pair. Both are 1.0 when
/// the output side is empty-sized.
pub(crate) fn ratios(
    input: &[Message],
    emitted: &[Message],
    options: &CompressOptions,
) -> (f64, f64) {
    let orig_chars: usize = input.iter().map(Message::content_chars).sum();
    let result_chars: usize = emitted.iter().map(Message::content_chars).sum();
    let ratio = if result_chars == 0 {
        1.0
    } else {
        orig_chars as f64 / result_chars as f64
    };

    let counter = options.token_counter.as_ref();
    let orig_tokens = tokens::count_sequence(input, counter);
    let result_tokens = tokens::count_sequence(emitted, counter);
    let token_ratio = if result_tokens == 0 {
        1.0
    } else {
        orig_tokens as f64 / result_tokens as f64
    };
    (ratio, token_ratio)
}

/// Untouched result for inputs already inside a token budget.
pub(crate) fn passthrough_result(
    messages: &[Message],
    options: &CompressOptions,
) -> CompressResult {
    CompressResult {
        messages: messages.to_vec(),
        verbatim: VerbatimMap::new(),
        compression: CompressionStats {
            ratio: 1.0,
            token_ratio: 1.0,
            messages_compressed: 0,
            messages_preserved: messages.len(),
            messages_deduped: 0,
            messages_fuzzy_deduped: 0,
            original_version: options.source_version,
        },
        budget: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cce_core::PROVENANCE_KEY;

    fn long_prose(tag: &str) -> String {
        format!(
            "{tag} covered the full rollout sequence for the billing service. \
             The migration ran in 90s and every canary check reported PASS before \
             traffic shifted, so the team closed the change window early."
        )
    }

    fn assistant_run(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message::assistant(format!("m{i}"), long_prose(&format!("Update {i}"))))
            .collect()
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let mut messages = assistant_run(1);
        messages[0].id.clear();
        let err = compress(&messages, &CompressOptions::new()).unwrap_err();
        assert!(err.to_string().starts_with("type:"));
    }

    #[test]
    fn test_trivial_input_passes_through() {
        let messages = vec![Message::user("1", "hi")];
        let result = compress(&messages, &CompressOptions::new()).unwrap();
        assert_eq!(result.messages, messages);
        assert_eq!(result.compression.ratio, 1.0);
        assert!(result.verbatim.is_empty());
        assert_eq!(result.compression.messages_preserved, 1);
    }

    #[test]
    fn test_same_role_run_merges() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let messages = assistant_run(3);
        let result = compress(&messages, &options).unwrap();

        assert_eq!(result.messages.len(), 1);
        let merged = &result.messages[0];
        assert!(merged.content_str().starts_with("[summary: "));
        assert!(merged.content_str().contains(" (3 messages merged)"));
        let record = merged.provenance().unwrap();
        assert_eq!(record.ids, vec!["m0", "m1", "m2"]);
        assert_eq!(result.compression.messages_compressed, 3);
        for id in ["m0", "m1", "m2"] {
            assert!(result.verbatim.contains_key(id));
        }
    }

    #[test]
    fn test_role_change_closes_group() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let mut messages = assistant_run(2);
        messages.push(Message::user("u0", long_prose("Question")));
        messages.push(Message::user("u1", long_prose("Clarification")));

        let result = compress(&messages, &options).unwrap();
        assert_eq!(result.messages.len(), 2);
        assert!(result.messages[0]
            .provenance()
            .unwrap()
            .ids
            .starts_with(&["m0".to_string()]));
        assert_eq!(result.messages[1].provenance().unwrap().ids.len(), 2);
    }

    #[test]
    fn test_recency_window_preserves_tail() {
        let messages = assistant_run(10);
        let result = compress(&messages, &CompressOptions::new()).unwrap();

        // First 6 merge into one rewrite; the last 4 pass through.
        assert_eq!(result.messages.len(), 5);
        assert!(result.compression.messages_preserved >= 4);
        let tail: Vec<&Message> = result.messages.iter().skip(1).collect();
        for (i, message) in tail.iter().enumerate() {
            assert_eq!(**message, messages[6 + i]);
        }
    }

    #[test]
    fn test_covered_ids_match_input_order() {
        let messages = assistant_run(10);
        let result = compress(&messages, &CompressOptions::new()).unwrap();
        let covered: Vec<String> = result
            .messages
            .iter()
            .flat_map(|m| match m.provenance() {
                Some(record) => record.ids,
                None => vec![m.id.clone()],
            })
            .collect();
        let expected: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn test_size_guard_abandons_non_shrinking_rewrite() {
        // A single compressible message short enough that the summary
        // wrapper cannot win.
        let content = format!("{} {}", "alpha beta gamma delta epsilon", "x".repeat(100));
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let messages = vec![Message::user("m0", content)];
        let result = compress(&messages, &options).unwrap();

        assert_eq!(result.messages[0], messages[0]);
        assert_eq!(result.compression.messages_compressed, 0);
        assert!(result.verbatim.is_empty());
    }

    #[test]
    fn test_code_split_keeps_fence_bytes() {
        let fence = "```ts\nlet x=1;\n```";
        let prose_a = long_prose("The context");
        let prose_b = long_prose("The follow-up");
        let content = format!("{prose_a}\n{fence}\n{prose_b}");
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let messages = vec![Message::user("m0", content)];
        let result = compress(&messages, &options).unwrap();

        let out = result.messages[0].content_str();
        assert!(out.starts_with("[summary: "), "got: {out}");
        assert!(out.contains(fence));
        assert!(!out.contains(" | entities:"));
    }

    #[test]
    fn test_embed_summary_id_format() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        options.embed_summary_id = true;
        let messages = assistant_run(2);
        let result = compress(&messages, &options).unwrap();

        let content = result.messages[0].content_str();
        let record = result.messages[0].provenance().unwrap();
        assert!(content.starts_with(&format!("[summary#{}: ", record.summary_id)));
    }

    #[test]
    fn test_summary_id_stable_across_runs() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let messages = assistant_run(3);
        let a = compress(&messages, &options).unwrap();
        let b = compress(&messages, &options).unwrap();
        assert_eq!(
            a.messages[0].provenance().unwrap().summary_id,
            b.messages[0].provenance().unwrap().summary_id
        );
        assert_eq!(a.messages, b.messages);
    }

    #[test]
    fn test_source_version_mirrored() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        options.source_version = 7;
        let messages = assistant_run(2);
        let result = compress(&messages, &options).unwrap();
        assert_eq!(result.compression.original_version, 7);
        assert_eq!(result.messages[0].provenance().unwrap().version, 7);
    }

    #[test]
    fn test_metadata_survives_on_passthrough() {
        let mut messages = assistant_run(1);
        messages[0]
            .metadata
            .insert("trace".to_string(), serde_json::json!("abc"));
        messages[0]
            .extra
            .insert("channel".to_string(), serde_json::json!("ops"));
        let result = compress(&messages, &CompressOptions::new()).unwrap();
        assert_eq!(result.messages[0], messages[0]);
        assert!(result.messages[0].metadata.get(PROVENANCE_KEY).is_none());
    }

    #[test]
    fn test_tool_call_turns_never_rewritten() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let mut messages = assistant_run(3);
        messages[1].tool_calls = Some(vec![serde_json::json!({"name": "grep"})]);
        let result = compress(&messages, &options).unwrap();
        let kept = result
            .messages
            .iter()
            .find(|m| m.id == "m1")
            .expect("tool-call turn must survive by id");
        assert_eq!(kept, &messages[1]);
    }

    #[test]
    fn test_adjacent_rewrites_merge_with_parent_chain() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;

        let head = compress(&assistant_run(3), &options).unwrap();
        let tail_input: Vec<Message> = (3..6)
            .map(|i| Message::assistant(format!("m{i}"), long_prose(&format!("Update {i}"))))
            .collect();
        let tail = compress(&tail_input, &options).unwrap();
        let expected_parents: Vec<String> = [&head.messages[0], &tail.messages[0]]
            .iter()
            .map(|m| m.provenance().unwrap().summary_id)
            .collect();

        let rewrites = vec![head.messages[0].clone(), tail.messages[0].clone()];
        let result = compress(&rewrites, &options).unwrap();

        assert_eq!(result.messages.len(), 1);
        let record = result.messages[0].provenance().unwrap();
        assert_eq!(record.ids, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
        assert_eq!(record.parent_ids, Some(expected_parents));
        assert!(result.messages[0]
            .content_str()
            .contains(" (2 messages merged)"));
        // Covered originals live in the earlier rounds' stores.
        assert!(result.verbatim.is_empty());
    }

    #[test]
    fn test_lone_rewrite_passes_through() {
        let mut options = CompressOptions::new();
        options.recency_window = 0;
        let round1 = compress(&assistant_run(3), &options).unwrap();

        let result = compress(&round1.messages, &options).unwrap();
        assert_eq!(result.messages, round1.messages);
        assert_eq!(result.compression.messages_preserved, 1);
        assert!(result.verbatim.is_empty());
    }
}
