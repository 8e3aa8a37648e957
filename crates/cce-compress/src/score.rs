//! Sentence splitting and deterministic scoring
//!
//! Scores are additive integers; higher means more worth keeping. The
//! weights favor identifiers, status words, and measurements, since that
//! is the material a follow-up turn is most likely to need verbatim.

use crate::detect;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const IDENTIFIER_BONUS: i32 = 3;
const IMPORTANCE_BONUS: i32 = 4;
const UNIT_BONUS: i32 = 2;
const ABBREV_BONUS: i32 = 2;
const STATUS_BONUS: i32 = 3;
const GREP_REF_BONUS: i32 = 2;
const LENGTH_BONUS: i32 = 2;
const FILLER_PENALTY: i32 = -10;
const LENGTH_BONUS_RANGE: (usize, usize) = (40, 120);

/// Trailing tokens that end with a period but not a sentence.
static ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "dr.", "mr.", "mrs.", "ms.", "prof.", "st.", "vs.", "etc.", "cf.", "no.",
    "fig.", "al.", "approx.",
];

static FILLER_OPENERS: &[&str] = &[
    "happy to help",
    "thank you",
    "of course",
    "certainly",
    "absolutely",
    "thanks",
    "great",
    "okay",
    "sure",
    "ok",
];

pub(crate) static CAMEL_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9]*[A-Z][A-Za-z0-9]*\b").expect("camel pattern"));

pub(crate) static PASCAL_CASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][A-Za-z0-9]*)+\b").expect("pascal pattern")
});

pub(crate) static SNAKE_CASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").expect("snake pattern"));

static IMPORTANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:importantly|however|critically|critical|must|should|warning|note that|key|crucial)\b")
        .expect("importance pattern")
});

static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:PASS|FAIL|ERROR|WARNING|WARN)\b").expect("status pattern"));

static GREP_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w./-]+\.\w+:\d+(?::\d+)?|[\w./-]+:\d+:").expect("grep ref pattern")
});

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern"));

/// One scored sentence, tagged with its position in the document.
#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    /// Global sentence order across all paragraphs.
    pub order: usize,
    pub paragraph: usize,
    pub score: i32,
    /// Highest-scored sentence of its paragraph.
    pub primary: bool,
}

/// Split on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Split a paragraph into sentences on `.?!` boundaries, honoring common
/// abbreviations.
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = paragraph.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if matches!(c, '.' | '?' | '!') {
            let at_boundary = chars.get(i + 1).is_none_or(|n| n.is_whitespace());
            if at_boundary && !(c == '.' && ends_with_abbreviation(&current)) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

fn ends_with_abbreviation(text: &str) -> bool {
    let last = match text.rsplit(char::is_whitespace).next() {
        Some(token) if !token.is_empty() => token.to_lowercase(),
        _ => return false,
    };
    // Single-letter initials ("J.") also continue the sentence.
    ABBREVIATIONS.contains(&last.as_str())
        || (last.len() == 2 && last.ends_with('.') && last.chars().next().is_some_and(char::is_alphabetic))
}

/// Additive score for one sentence.
pub fn score_sentence(text: &str) -> i32 {
    let mut score = 0;

    score += distinct_matches(&CAMEL_CASE_RE, text) as i32 * IDENTIFIER_BONUS;
    score += distinct_matches(&PASCAL_CASE_RE, text) as i32 * IDENTIFIER_BONUS;
    score += distinct_matches(&SNAKE_CASE_RE, text) as i32 * IDENTIFIER_BONUS;

    if IMPORTANCE_RE.is_match(text) {
        score += IMPORTANCE_BONUS;
    }

    score += detect::NUMERIC_UNITS_RE.find_iter(text).count() as i32 * UNIT_BONUS;
    score += vowelless_abbreviations(text).len() as i32 * ABBREV_BONUS;
    score += STATUS_RE.find_iter(text).count() as i32 * STATUS_BONUS;
    score += GREP_REF_RE.find_iter(text).count() as i32 * GREP_REF_BONUS;

    let chars = text.chars().count();
    if (LENGTH_BONUS_RANGE.0..=LENGTH_BONUS_RANGE.1).contains(&chars) {
        score += LENGTH_BONUS;
    }

    if starts_with_filler(text) {
        score += FILLER_PENALTY;
    }

    score
}

fn distinct_matches(re: &Regex, text: &str) -> usize {
    re.find_iter(text)
        .map(|m| m.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Alphabetic tokens of 3+ consonants and no vowels (`npm`, `ssh`, …),
/// in order of first appearance.
pub fn vowelless_abbreviations(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphabetic())
        .filter(|token| {
            token.len() >= 3 && !token.chars().any(|c| "aeiouAEIOU".contains(c))
        })
        .filter(|token| seen.insert(token.to_string()))
        .map(str::to_string)
        .collect()
}

fn starts_with_filler(text: &str) -> bool {
    let lower = text.trim_start().to_lowercase();
    FILLER_OPENERS.iter().any(|opener| {
        lower.starts_with(opener)
            && lower[opener.len()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Split, score, and mark the primary sentence of each paragraph.
pub fn analyze(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut order = 0;

    for (paragraph, body) in split_paragraphs(text).into_iter().enumerate() {
        let start = sentences.len();
        for text in split_sentences(body) {
            let score = score_sentence(&text);
            sentences.push(Sentence {
                text,
                order,
                paragraph,
                score,
                primary: false,
            });
            order += 1;
        }
        // Highest score wins; earliest wins ties.
        if let Some(best) = sentences[start..]
            .iter()
            .enumerate()
            .max_by(|(ai, a), (bi, b)| a.score.cmp(&b.score).then(bi.cmp(ai)))
            .map(|(i, _)| start + i)
        {
            sentences[best].primary = true;
        }
    }
    sentences
}
