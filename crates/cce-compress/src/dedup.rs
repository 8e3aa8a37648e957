//! Exact and fuzzy duplicate detection
//!
//! Runs before grouping. Each duplicate group keeps one readable target;
//! other members outside the recency window collapse into short
//! references. The verbatim store makes the references reversible.

use crate::classify::COMPRESSED_PREFIXES;
use crate::hash;
use cce_core::{CompressOptions, Message};
use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, HashSet};

const MIN_DEDUP_CHARS: usize = 200;
const FINGERPRINT_LINES: usize = 5;
const MIN_SHARED_LINES: usize = 3;
const LENGTH_RATIO_FLOOR: f64 = 0.7;
const MIN_NORMALIZED_LINES: usize = 2;

/// How dedup settled one message.
#[derive(Debug, Clone, PartialEq)]
pub enum DupOutcome {
    /// Surviving original other members reference; stays verbatim.
    KeepTarget,
    /// Collapsed into a reference to the keep target.
    Replaced {
        target_id: String,
        replacement: String,
        fuzzy: bool,
    },
}

/// Detect duplicates and decide replacements. Keys are sequence positions.
pub fn find_duplicates(
    messages: &[Message],
    options: &CompressOptions,
) -> HashMap<usize, DupOutcome> {
    let mut outcomes = HashMap::new();
    if options.dedup {
        exact_pass(messages, options, &mut outcomes);
    }
    if options.fuzzy_dedup {
        fuzzy_pass(messages, options, &mut outcomes);
    }
    outcomes
}

fn eligible(message: &Message, options: &CompressOptions) -> bool {
    if options.is_preserved_role(message.role.as_deref()) || message.has_tool_calls() {
        return false;
    }
    let content = message.content_str();
    if COMPRESSED_PREFIXES.iter().any(|p| content.starts_with(p)) || message.is_rewritten() {
        return false;
    }
    message.content_chars() >= MIN_DEDUP_CHARS
}

fn in_window(position: usize, total: usize, options: &CompressOptions) -> bool {
    position + options.recency_window >= total
}

/// First occurrence inside the recency window, else the latest occurrence.
fn keep_target(members: &[usize], total: usize, options: &CompressOptions) -> usize {
    members
        .iter()
        .copied()
        .find(|&i| in_window(i, total, options))
        .unwrap_or_else(|| *members.last().expect("non-empty dedup group"))
}

fn settle_group(
    messages: &[Message],
    options: &CompressOptions,
    members: &[usize],
    similarity: Option<&HashMap<usize, f64>>,
    outcomes: &mut HashMap<usize, DupOutcome>,
) {
    let total = messages.len();
    let keep = keep_target(members, total, options);
    outcomes.insert(keep, DupOutcome::KeepTarget);

    let target_id = messages[keep].id.clone();
    for &i in members {
        if i == keep || in_window(i, total, options) {
            // The preservation law outranks dedup inside the window.
            continue;
        }
        let chars = messages[i].content_chars();
        let replacement = match similarity.and_then(|s| s.get(&i)) {
            Some(sim) => format!(
                "[cce:near-dup of {} — {} chars, ~{}% match]",
                target_id,
                chars,
                (sim * 100.0).round() as u32
            ),
            None => format!("[cce:dup of {} — {} chars]", target_id, chars),
        };
        outcomes.insert(
            i,
            DupOutcome::Replaced {
                target_id: target_id.clone(),
                replacement,
                fuzzy: similarity.is_some(),
            },
        );
    }
}

// ─── Exact ───────────────────────────────────────────────────────────────

fn exact_pass(
    messages: &[Message],
    options: &CompressOptions,
    outcomes: &mut HashMap<usize, DupOutcome>,
) {
    let mut buckets: HashMap<u32, Vec<usize>> = HashMap::new();
    for (i, message) in messages.iter().enumerate() {
        if eligible(message, options) {
            buckets
                .entry(hash::content_hash(message.content_str()))
                .or_default()
                .push(i);
        }
    }

    for bucket in buckets.values() {
        if bucket.len() < 2 {
            continue;
        }
        // The hash only buckets; byte equality decides the group.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for &i in bucket {
            match groups
                .iter_mut()
                .find(|g| messages[g[0]].content_str() == messages[i].content_str())
            {
                Some(group) => group.push(i),
                None => groups.push(vec![i]),
            }
        }
        for group in groups.iter().filter(|g| g.len() >= 2) {
            settle_group(messages, options, group, None, outcomes);
        }
    }
}

// ─── Fuzzy ───────────────────────────────────────────────────────────────

fn normalized_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

fn line_frequencies(lines: &[String]) -> HashMap<&str, usize> {
    let mut freq = HashMap::new();
    for line in lines {
        *freq.entry(line.as_str()).or_insert(0) += 1;
    }
    freq
}

/// Multiset Jaccard over normalized lines.
fn jaccard(a: &HashMap<&str, usize>, b: &HashMap<&str, usize>) -> f64 {
    let mut intersection = 0usize;
    let mut union = 0usize;
    for (line, &count_a) in a {
        let count_b = b.get(line).copied().unwrap_or(0);
        intersection += count_a.min(count_b);
        union += count_a.max(count_b);
    }
    for (line, &count_b) in b {
        if !a.contains_key(line) {
            union += count_b;
        }
    }
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn fuzzy_pass(
    messages: &[Message],
    options: &CompressOptions,
    outcomes: &mut HashMap<usize, DupOutcome>,
) {
    // Exact groups (targets included) are already handled.
    let candidates: Vec<usize> = (0..messages.len())
        .filter(|i| !outcomes.contains_key(i))
        .filter(|&i| eligible(&messages[i], options))
        .collect();

    let mut lines_by_candidate: HashMap<usize, Vec<String>> = HashMap::new();
    let mut inverted: HashMap<String, Vec<usize>> = HashMap::new();
    for &i in &candidates {
        let lines = normalized_lines(messages[i].content_str());
        if lines.len() < MIN_NORMALIZED_LINES {
            continue;
        }
        let fingerprint: HashSet<&str> = lines
            .iter()
            .take(FINGERPRINT_LINES)
            .map(String::as_str)
            .collect();
        for line in fingerprint {
            inverted.entry(line.to_string()).or_default().push(i);
        }
        lines_by_candidate.insert(i, lines);
    }

    // Forward pairs sharing enough fingerprint lines.
    let mut shared: HashMap<(usize, usize), usize> = HashMap::new();
    for bucket in inverted.values() {
        for (a_pos, &a) in bucket.iter().enumerate() {
            for &b in &bucket[a_pos + 1..] {
                let pair = if a < b { (a, b) } else { (b, a) };
                *shared.entry(pair).or_insert(0) += 1;
            }
        }
    }

    let mut uf: UnionFind<usize> = UnionFind::new(messages.len());
    let mut best_similarity: HashMap<usize, f64> = HashMap::new();
    let mut matched: HashSet<usize> = HashSet::new();

    let mut pairs: Vec<(usize, usize)> = shared
        .iter()
        .filter(|(_, &count)| count >= MIN_SHARED_LINES)
        .map(|(&pair, _)| pair)
        .collect();
    pairs.sort_unstable();

    for (a, b) in pairs {
        let len_a = messages[a].content_chars() as f64;
        let len_b = messages[b].content_chars() as f64;
        if len_a.min(len_b) / len_a.max(len_b) < LENGTH_RATIO_FLOOR {
            continue;
        }
        let freq_a = line_frequencies(&lines_by_candidate[&a]);
        let freq_b = line_frequencies(&lines_by_candidate[&b]);
        let similarity = jaccard(&freq_a, &freq_b);
        if similarity < options.fuzzy_threshold {
            continue;
        }
        uf.union(a, b);
        matched.insert(a);
        matched.insert(b);
        for i in [a, b] {
            let best = best_similarity.entry(i).or_insert(0.0);
            if similarity > *best {
                *best = similarity;
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut matched: Vec<usize> = matched.into_iter().collect();
    matched.sort_unstable();
    for i in matched {
        groups.entry(uf.find(i)).or_default().push(i);
    }
    for group in groups.values().filter(|g| g.len() >= 2) {
        settle_group(messages, options, group, Some(&best_similarity), outcomes);
    }
}
