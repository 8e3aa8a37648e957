//! Message classification
//!
//! Assigns each message a tier and its preservation reasons. Hard reasons
//! force preservation; soft reasons only annotate, since entity
//! extraction captures what they flag later in the pipeline.

use crate::{detect, split};
use cce_core::{CompressOptions, Message};
use serde::{Deserialize, Serialize};

/// Content shorter than this always passes through.
pub const SHORT_CONTENT_LIMIT: usize = 120;
/// Word count below which compressible prose is short-tier.
const SHORT_PROSE_WORDS: usize = 20;
/// Minimum surrounding prose for a fenced message to be split rather
/// than preserved whole.
const CODE_SPLIT_MIN_PROSE: usize = 80;

/// Markers of content a previous round already rewrote.
pub static COMPRESSED_PREFIXES: &[&str] = &["[summary:", "[summary#", "[truncated"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Preserved verbatim.
    #[serde(rename = "T0")]
    Preserve,
    /// Compressible short prose (< 20 words).
    #[serde(rename = "T2")]
    ShortProse,
    /// Compressible long prose.
    #[serde(rename = "T3")]
    LongProse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    // hard
    PreservedRole,
    RecencyWindow,
    ToolCalls,
    ShortContent,
    AlreadyCompressed,
    FencedCode,
    IndentedCode,
    JsonShaped,
    YamlShaped,
    SpecialCharDensity,
    LineLengthVariance,
    ApiKey,
    LatexMath,
    UnicodeMath,
    SqlContent,
    Verse,
    ParsesAsJson,
    // soft
    Url,
    Email,
    Phone,
    Semver,
    HexHash,
    FilePath,
    DottedNumber,
    QuotedKey,
    LegalTerm,
    NumericUnits,
}

/// Per-message classification outcome.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub tier: Tier,
    pub hard_reasons: Vec<Reason>,
    pub soft_reasons: Vec<Reason>,
    /// Fenced code with enough surrounding prose: split, don't preserve.
    pub code_split: bool,
    /// Output of an earlier round. Kept verbatim on its own, but a run of
    /// adjacent same-role rewrites may merge, which is what keeps
    /// provenance chains observable across rounds.
    pub already_compressed: bool,
}

impl Verdict {
    fn preserve(reason: Reason) -> Self {
        Self {
            tier: Tier::Preserve,
            hard_reasons: vec![reason],
            soft_reasons: Vec::new(),
            code_split: false,
            already_compressed: false,
        }
    }

    fn preserve_all(reasons: Vec<Reason>) -> Self {
        Self {
            tier: Tier::Preserve,
            hard_reasons: reasons,
            soft_reasons: Vec::new(),
            code_split: false,
            already_compressed: false,
        }
    }

    pub fn preserved(&self) -> bool {
        self.tier == Tier::Preserve
    }
}

/// Classify one message at `position` in a sequence of `total`.
///
/// First decisive rule wins; structural hard detectors are collected as a
/// set once reached.
pub fn classify(
    message: &Message,
    position: usize,
    total: usize,
    options: &CompressOptions,
) -> Verdict {
    let content = message.content_str();

    if options.is_preserved_role(message.role.as_deref()) {
        return Verdict::preserve(Reason::PreservedRole);
    }
    if position + options.recency_window >= total {
        return Verdict::preserve(Reason::RecencyWindow);
    }
    if message.has_tool_calls() {
        return Verdict::preserve(Reason::ToolCalls);
    }
    if content.chars().count() < SHORT_CONTENT_LIMIT {
        return Verdict::preserve(Reason::ShortContent);
    }
    if COMPRESSED_PREFIXES.iter().any(|p| content.starts_with(p)) {
        let mut verdict = Verdict::preserve(Reason::AlreadyCompressed);
        // A fence-bearing rewrite stays whole; re-merging it would fold
        // the fence text into a new summary.
        verdict.already_compressed = !detect::has_fenced_code(content);
        return verdict;
    }

    let mut code_split = false;
    if detect::has_fenced_code(content) {
        let (prose, _) = split::split_prose_and_fences(content);
        if prose.chars().count() >= CODE_SPLIT_MIN_PROSE {
            code_split = true;
        } else {
            return Verdict::preserve(Reason::FencedCode);
        }
    }

    if !code_split {
        let mut hard = Vec::new();
        if detect::has_indented_code(content) {
            hard.push(Reason::IndentedCode);
        }
        if detect::is_json_shaped(content) {
            hard.push(Reason::JsonShaped);
        }
        if detect::is_yaml_shaped(content) {
            hard.push(Reason::YamlShaped);
        }
        if detect::has_special_char_density(content) {
            hard.push(Reason::SpecialCharDensity);
        }
        if detect::has_line_length_variance(content) {
            hard.push(Reason::LineLengthVariance);
        }
        if detect::has_api_key(content) {
            hard.push(Reason::ApiKey);
        }
        if detect::has_latex_math(content) {
            hard.push(Reason::LatexMath);
        }
        if detect::has_unicode_math(content) {
            hard.push(Reason::UnicodeMath);
        }
        if detect::is_sql_content(content) {
            hard.push(Reason::SqlContent);
        }
        if detect::is_verse(content) {
            hard.push(Reason::Verse);
        }
        if !hard.is_empty() {
            return Verdict::preserve_all(hard);
        }
        if detect::parses_as_json(content) {
            return Verdict::preserve(Reason::ParsesAsJson);
        }
    }

    let words = content.split_whitespace().count();
    let tier = if words < SHORT_PROSE_WORDS {
        Tier::ShortProse
    } else {
        Tier::LongProse
    };

    let mut soft = Vec::new();
    if detect::has_url(content) {
        soft.push(Reason::Url);
    }
    if detect::has_email(content) {
        soft.push(Reason::Email);
    }
    if detect::has_phone(content) {
        soft.push(Reason::Phone);
    }
    if detect::has_semver(content) {
        soft.push(Reason::Semver);
    }
    if detect::has_hex_hash(content) {
        soft.push(Reason::HexHash);
    }
    if detect::has_file_path(content) {
        soft.push(Reason::FilePath);
    }
    if detect::has_dotted_number(content) {
        soft.push(Reason::DottedNumber);
    }
    if detect::has_quoted_key(content) {
        soft.push(Reason::QuotedKey);
    }
    if detect::has_legal_term(content) {
        soft.push(Reason::LegalTerm);
    }
    if detect::has_numeric_units(content) {
        soft.push(Reason::NumericUnits);
    }

    Verdict {
        tier,
        hard_reasons: Vec::new(),
        soft_reasons: soft,
        code_split,
        already_compressed: false,
    }
}

/// Classify every message in sequence order.
pub fn classify_all(messages: &[Message], options: &CompressOptions) -> Vec<Verdict> {
    let total = messages.len();
    messages
        .iter()
        .enumerate()
        .map(|(position, message)| classify(message, position, total, options))
        .collect()
}
