//! Token-budget search
//!
//! Binary-searches the recency window so the compressed sequence fits a
//! token budget: a larger window protects more of the tail, a smaller
//! one compresses deeper. Costs at most `ceil(log2 N)` pipeline runs
//! plus the final pass.

use crate::llm::Summarize;
use crate::{hash, pipeline};
use cce_core::{
    tokens, BudgetReport, CompressOptions, CompressResult, Error, Message, ProvenanceRecord,
};
use tracing::{debug, trace};

/// Head kept when force-converge truncates a message.
const TRUNCATE_KEEP_CHARS: usize = 512;

pub(crate) fn search(
    messages: &[Message],
    options: &CompressOptions,
) -> Result<CompressResult, Error> {
    let budget = options
        .token_budget
        .expect("budget search requires token_budget");
    if let Some(result) = fast_path(messages, options, budget) {
        return Ok(result);
    }

    let (mut lo, mut hi) = bounds(messages, options);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        let probe = pipeline::run_once(messages, &options.with_recency_window(mid));
        let token_count = tokens::count_sequence(&probe.messages, options.token_counter.as_ref());
        trace!(mid, token_count, budget, "budget probe");
        if token_count <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let result = pipeline::run_once(messages, &options.with_recency_window(lo));
    Ok(finish(messages, options, result, lo, budget))
}

pub(crate) async fn search_with_summarizer(
    messages: &[Message],
    options: &CompressOptions,
    summarizer: &dyn Summarize,
) -> Result<CompressResult, Error> {
    let budget = options
        .token_budget
        .expect("budget search requires token_budget");
    if let Some(result) = fast_path(messages, options, budget) {
        return Ok(result);
    }

    let (mut lo, mut hi) = bounds(messages, options);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        let probe = pipeline::run_once_with_summarizer(
            messages,
            &options.with_recency_window(mid),
            summarizer,
        )
        .await;
        let token_count = tokens::count_sequence(&probe.messages, options.token_counter.as_ref());
        trace!(mid, token_count, budget, "budget probe");
        if token_count <= budget {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    let result =
        pipeline::run_once_with_summarizer(messages, &options.with_recency_window(lo), summarizer)
            .await;
    Ok(finish(messages, options, result, lo, budget))
}

/// Uncompressed input already fits: report the whole length as protected.
fn fast_path(
    messages: &[Message],
    options: &CompressOptions,
    budget: u64,
) -> Option<CompressResult> {
    let input_tokens = tokens::count_sequence(messages, options.token_counter.as_ref());
    if input_tokens > budget {
        return None;
    }
    let mut result = pipeline::passthrough_result(messages, options);
    result.budget = Some(BudgetReport {
        fits: true,
        token_count: input_tokens,
        recency_window: messages.len(),
    });
    Some(result)
}

fn bounds(messages: &[Message], options: &CompressOptions) -> (usize, usize) {
    let lo = options.min_recency_window;
    let hi = messages.len().saturating_sub(1).max(lo);
    (lo, hi)
}

fn finish(
    messages: &[Message],
    options: &CompressOptions,
    mut result: CompressResult,
    recency_window: usize,
    budget: u64,
) -> CompressResult {
    let counter = options.token_counter.as_ref();
    let mut token_count = tokens::count_sequence(&result.messages, counter);
    let mut fits = token_count <= budget;

    if !fits && options.force_converge {
        force_converge(&mut result, options, recency_window, budget);
        let (ratio, token_ratio) = pipeline::ratios(messages, &result.messages, options);
        result.compression.ratio = ratio;
        result.compression.token_ratio = token_ratio;
        token_count = tokens::count_sequence(&result.messages, counter);
        fits = token_count <= budget;
    }

    debug!(fits, token_count, recency_window, "budget search settled");
    result.budget = Some(BudgetReport {
        fits,
        token_count,
        recency_window,
    });
    result
}

/// Hard-truncate the longest emitted messages, largest first, until the
/// sequence fits. Runs on the post-guard emitted sequence.
fn force_converge(
    result: &mut CompressResult,
    options: &CompressOptions,
    recency_window: usize,
    budget: u64,
) {
    let counter = options.token_counter.as_ref();
    let total = result.messages.len();

    let mut candidates: Vec<usize> = (0..total)
        .filter(|&i| {
            let message = &result.messages[i];
            i + recency_window < total
                && !options.is_preserved_role(message.role.as_deref())
                && !message.has_tool_calls()
                && message.content_chars() > TRUNCATE_KEEP_CHARS
        })
        .collect();
    candidates.sort_by(|&a, &b| {
        result.messages[b]
            .content_chars()
            .cmp(&result.messages[a].content_chars())
            .then(a.cmp(&b))
    });

    for i in candidates {
        let chars = result.messages[i].content_chars();
        let head: String = result.messages[i]
            .content_str()
            .chars()
            .take(TRUNCATE_KEEP_CHARS)
            .collect();
        let truncated = format!("[truncated — {chars} chars: {head}]");
        if truncated.len() >= result.messages[i].content_len() {
            continue;
        }

        if result.messages[i].is_rewritten() {
            // Provenance and verbatim entries already cover this one.
            result.messages[i].content = Some(truncated);
        } else {
            let original = result.messages[i].clone();
            result.messages[i].content = Some(truncated);
            result.messages[i].set_provenance(&ProvenanceRecord {
                ids: vec![original.id.clone()],
                summary_id: hash::summary_id(std::slice::from_ref(&original.id)),
                parent_ids: None,
                version: options.source_version,
            });
            result.verbatim.insert(original.id.clone(), original);
        }
        trace!(position = i, chars, "force-converge truncated message");

        if tokens::count_sequence(&result.messages, counter) <= budget {
            break;
        }
    }
}
