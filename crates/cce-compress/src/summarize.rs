//! Deterministic prose shortening
//!
//! Output is a budget-bounded selection of full sentences in original
//! order, or (for log-shaped input) a selection of structural lines.
//! An entity scan over the original text captures identifiers the
//! selection may have dropped.

use crate::detect;
use crate::score::{self, Sentence};
use once_cell::sync::Lazy;
use regex::Regex;

const SMALL_INPUT_LIMIT: usize = 600;
const SMALL_BUDGET: usize = 200;
const LARGE_BUDGET: usize = 400;
const MAX_ENTITIES: usize = 10;
const JOINER: &str = " ... ";

const STRUCTURED_MIN_LINES: usize = 6;
const STRUCTURED_NEWLINE_DENSITY: f64 = 1.0 / 80.0;
const STRUCTURED_LINE_SHARE: f64 = 0.5;

/// Capitalized words too common at sentence starts to count as names.
static SENTENCE_STARTERS: &[&str] = &[
    "The", "This", "That", "These", "Those", "There", "Then", "It", "Its", "A", "An", "I", "We",
    "You", "He", "She", "They", "If", "In", "On", "At", "For", "But", "And", "Or", "So", "As",
    "Is", "Are", "Was", "Were", "Be", "To", "Of", "When", "Where", "Why", "How", "What", "Which",
    "Who", "Also", "Note", "Here", "Now", "Our", "My", "Your", "Their", "With", "From", "After",
    "Before", "While", "Please", "Let", "Yes", "No", "Not", "Do", "Does", "Did",
];

static PROPER_NOUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("proper noun pattern"));

static STATUS_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:PASS|FAIL|ERROR|WARNING|WARN)\b").expect("status line"));

static PATH_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w./-]+:\d+(?::\d+)?").expect("path line"));

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("bullet"));

static KEY_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[A-Za-z_][\w.-]*\s*=\s*\S").expect("key value"));

/// A shortened text plus the entities scanned from the original.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    pub entities: Vec<String>,
}

/// Character budget: 200 for small inputs, 400 otherwise.
pub fn budget_for(input: &str) -> usize {
    if input.chars().count() < SMALL_INPUT_LIMIT {
        SMALL_BUDGET
    } else {
        LARGE_BUDGET
    }
}

/// Shorten `input` under its budget and extract entities.
pub fn summarize(input: &str) -> Summary {
    Summary {
        text: condense(input, budget_for(input)),
        entities: extract_entities(input),
    }
}

/// Budget-bounded shortening without the entity scan (code-split prose).
pub fn condense(input: &str, budget: usize) -> String {
    if is_structured(input) {
        structured_lines(input, budget)
    } else {
        select_sentences(input, budget)
    }
}

// ─── Prose path ──────────────────────────────────────────────────────────

fn select_sentences(input: &str, budget: usize) -> String {
    let sentences = score::analyze(input);
    if sentences.is_empty() {
        return input.chars().take(budget).collect();
    }

    let mut primaries: Vec<&Sentence> = sentences.iter().filter(|s| s.primary).collect();
    let mut secondaries: Vec<&Sentence> = sentences.iter().filter(|s| !s.primary).collect();
    let by_score = |a: &&Sentence, b: &&Sentence| b.score.cmp(&a.score).then(a.order.cmp(&b.order));
    primaries.sort_by(by_score);
    secondaries.sort_by(by_score);

    let mut selected: Vec<&Sentence> = Vec::new();
    let mut used = 0usize;
    for sentence in primaries.into_iter().chain(secondaries) {
        let cost = sentence.text.chars().count()
            + if selected.is_empty() { 0 } else { JOINER.len() };
        if used + cost <= budget {
            used += cost;
            selected.push(sentence);
        }
    }

    if selected.is_empty() {
        // Nothing fits whole: hard-cut the best sentence.
        let best = sentences
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(b.order.cmp(&a.order)))
            .expect("non-empty sentence list");
        return best.text.chars().take(budget).collect();
    }

    selected.sort_by_key(|s| s.order);
    let mut out = String::new();
    for (i, sentence) in selected.iter().enumerate() {
        if i > 0 {
            if sentence.order == selected[i - 1].order + 1 {
                out.push(' ');
            } else {
                out.push_str(JOINER);
            }
        }
        out.push_str(&sentence.text);
    }
    out
}

// ─── Structured path ─────────────────────────────────────────────────────

/// Log-shaped input: many short lines, most of them structural.
pub fn is_structured(input: &str) -> bool {
    let non_empty: Vec<&str> = input.lines().filter(|l| !l.trim().is_empty()).collect();
    if non_empty.len() < STRUCTURED_MIN_LINES || input.is_empty() {
        return false;
    }
    let newline_density = input.matches('\n').count() as f64 / input.chars().count() as f64;
    if newline_density <= STRUCTURED_NEWLINE_DENSITY {
        return false;
    }
    let structural = non_empty
        .iter()
        .filter(|l| line_rank(l).is_some())
        .count();
    structural as f64 / non_empty.len() as f64 > STRUCTURED_LINE_SHARE
}

/// Rank 0 lines (status, `path:line`) outrank rank 1 (bullets, KEY=value).
fn line_rank(line: &str) -> Option<u8> {
    if STATUS_LINE_RE.is_match(line) || PATH_LINE_RE.is_match(line) {
        Some(0)
    } else if BULLET_RE.is_match(line) || KEY_VALUE_RE.is_match(line) {
        Some(1)
    } else {
        None
    }
}

fn structured_lines(input: &str, budget: usize) -> String {
    let candidates: Vec<(usize, &str, u8)> = input
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, l)| !l.is_empty())
        .filter_map(|(i, l)| line_rank(l).map(|rank| (i, l, rank)))
        .collect();

    let mut selected: Vec<(usize, &str)> = Vec::new();
    let mut used = 0usize;
    for wanted_rank in [0u8, 1u8] {
        for &(i, line, rank) in &candidates {
            if rank != wanted_rank {
                continue;
            }
            let cost = line.chars().count() + if selected.is_empty() { 0 } else { 1 };
            if used + cost <= budget {
                used += cost;
                selected.push((i, line));
            }
        }
    }

    if selected.is_empty() {
        return input.chars().take(budget).collect();
    }
    selected.sort_by_key(|&(i, _)| i);
    selected
        .iter()
        .map(|&(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Entity extraction ───────────────────────────────────────────────────

/// Up to 10 entities from the original text, in preference order:
/// proper nouns, PascalCase, camelCase, snake_case, vowelless
/// abbreviations, numbers with units.
pub fn extract_entities(input: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    let add = |value: &str, out: &mut Vec<String>| {
        if out.len() < MAX_ENTITIES && !out.iter().any(|e| e == value) {
            out.push(value.to_string());
        }
    };

    for m in PROPER_NOUN_RE.find_iter(input) {
        if !SENTENCE_STARTERS.contains(&m.as_str()) {
            add(m.as_str(), &mut out);
        }
    }
    for m in score::PASCAL_CASE_RE.find_iter(input) {
        add(m.as_str(), &mut out);
    }
    for m in score::CAMEL_CASE_RE.find_iter(input) {
        add(m.as_str(), &mut out);
    }
    for m in score::SNAKE_CASE_RE.find_iter(input) {
        add(m.as_str(), &mut out);
    }
    for token in score::vowelless_abbreviations(input) {
        add(&token, &mut out);
    }
    for m in detect::NUMERIC_UNITS_RE.find_iter(input) {
        add(m.as_str(), &mut out);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose(n: usize) -> String {
        let mut paragraphs = Vec::new();
        for i in 0..n {
            paragraphs.push(format!(
                "Paragraph {i} explains the deployment steps in enough detail to matter. \
                 It also records that the rollout finished without incident."
            ));
        }
        paragraphs.join("\n\n")
    }

    #[test]
    fn test_budget_rule() {
        assert_eq!(budget_for(&"x".repeat(599)), 200);
        assert_eq!(budget_for(&"x".repeat(600)), 400);
    }

    #[test]
    fn test_summary_respects_budget() {
        let input = prose(6);
        let summary = summarize(&input);
        assert!(summary.text.chars().count() <= budget_for(&input));
        assert!(!summary.text.is_empty());
    }

    #[test]
    fn test_sentences_kept_in_original_order() {
        let input = "Alpha step ran first and completed in 120ms overall. \
                     Beta step followed with a retry. \
                     Gamma step closed the run and wrote results to disk.";
        let summary = summarize(input);
        let a = summary.text.find("Alpha");
        let g = summary.text.find("Gamma");
        if let (Some(a), Some(g)) = (a, g) {
            assert!(a < g);
        }
    }

    #[test]
    fn test_joiner_marks_gaps() {
        // Three paragraphs; the middle one is filler and scores lowest.
        let input = "The parser now handles nested_arrays correctly after the fix in parse_items. \
                     It took 45ms on the large corpus.\n\n\
                     Sure, that all sounds reasonable to me overall. \
                     Sure, nothing else of note happened in that run.\n\n\
                     Deployment finished and the ServiceMonitor dashboard shows PASS for every region.";
        let summary = summarize(input);
        if !summary.text.contains("Sure") {
            assert!(summary.text.contains(" ... "), "gap joiner expected: {}", summary.text);
        }
    }

    #[test]
    fn test_entities_prefer_names_and_identifiers() {
        let input = "Kubernetes rollout of the PaymentService used retry_backoff and \
                     maxAttempts, finishing in 300ms according to npm logs.";
        let entities = extract_entities(input);
        assert!(entities.iter().any(|e| e == "Kubernetes"));
        assert!(entities.iter().any(|e| e == "PaymentService"));
        assert!(entities.iter().any(|e| e == "maxAttempts"));
        assert!(entities.iter().any(|e| e == "retry_backoff"));
        assert!(entities.iter().any(|e| e == "npm"));
        assert!(entities.len() <= 10);

        // Proper nouns come before identifier classes
        let kube = entities.iter().position(|e| e == "Kubernetes").unwrap();
        let snake = entities.iter().position(|e| e == "retry_backoff").unwrap();
        assert!(kube < snake);
    }

    #[test]
    fn test_entities_capped_at_ten() {
        let input = (0..15)
            .map(|i| format!("token_{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(extract_entities(&input).len(), 10);
    }

    #[test]
    fn test_structured_trigger() {
        let log = "src/a.rs:10: ERROR missing field\n\
                   src/b.rs:22: WARN unused import\n\
                   src/c.rs:31: ERROR type mismatch\n\
                   src/d.rs:44: PASS\n\
                   src/e.rs:50: FAIL expected 3\n\
                   src/f.rs:61: WARN shadowed name\n";
        assert!(is_structured(log));
        assert!(!is_structured(&prose(4)));
    }

    #[test]
    fn test_structured_selection_keeps_line_order() {
        let log = "src/a.rs:10: ERROR one\n\
                   - bullet note\n\
                   src/b.rs:20: ERROR two\n\
                   RETRIES=3\n\
                   src/c.rs:30: FAIL three\n\
                   src/d.rs:40: WARN four\n";
        let out = structured_lines(log, 400);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("a.rs"));
        assert!(lines.last().unwrap().contains("d.rs") || lines.last().unwrap().contains("RETRIES"));
    }

    #[test]
    fn test_structured_budget_prefers_status_lines() {
        let log = "src/a.rs:10: ERROR one\n\
                   - low priority bullet that is quite long and padded out considerably\n\
                   src/b.rs:20: ERROR two\n\
                   - another low priority bullet, also long and padded out considerably\n\
                   src/c.rs:30: FAIL three\n\
                   src/d.rs:40: WARN four\n";
        let out = structured_lines(log, 95);
        assert!(out.contains("ERROR one"));
        assert!(!out.contains("low priority"));
    }

    #[test]
    fn test_condense_empty_input() {
        assert_eq!(condense("", 200), "");
    }
}
