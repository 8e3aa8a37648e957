//! External summarization capability
//!
//! The pipeline only ever talks to an LLM through the [`Summarize`]
//! trait, and only behind a fallback: bad output or a thrown error means
//! the deterministic summarizer runs instead. Nothing here performs I/O;
//! the caller supplies the transport as an async closure.

use crate::summarize;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

pub type SummarizeError = Box<dyn std::error::Error + Send + Sync>;

type CallFuture = Pin<Box<dyn Future<Output = Result<String, SummarizeError>> + Send>>;
type LlmCall = Box<dyn Fn(String) -> CallFuture + Send + Sync>;

/// Terms every prompt instructs the model to keep verbatim.
pub const PRESERVE_TERMS: &str = "code references, file paths, function/variable names, URLs, \
                                  API keys, error messages, numbers, technical decisions";

const DEFAULT_MAX_CHARS: usize = 400;

/// External summarization strategy.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, input: &str) -> Result<String, SummarizeError>;
}

/// Accept external output only when it is non-empty and strictly shorter
/// than the input; anything else signals the deterministic fallback.
pub(crate) async fn with_fallback(summarizer: &dyn Summarize, input: &str) -> Option<String> {
    match summarizer.summarize(input).await {
        Ok(text) if !text.is_empty() && text.len() < input.len() => Some(text),
        Ok(_) | Err(_) => None,
    }
}

/// Options for the prompt-template wrappers.
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    /// Prepended before the instruction block.
    pub system_prompt: Option<String>,
    /// Appended to the built-in preserve-terms list.
    pub preserve_terms: Vec<String>,
    /// Target output size the prompts ask for.
    pub max_chars: usize,
}

impl SummarizerOptions {
    pub fn new() -> Self {
        Self {
            system_prompt: None,
            preserve_terms: Vec::new(),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn build_prompt(options: &SummarizerOptions, input: &str, aggressive: bool) -> String {
    let mut prompt = String::new();
    if let Some(system) = &options.system_prompt {
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }
    if aggressive {
        prompt.push_str(&format!(
            "Rewrite the text below as terse bullet points, at most {} characters total. ",
            options.max_chars / 2
        ));
    } else {
        prompt.push_str(&format!(
            "Summarize the text below in at most {} characters. ",
            options.max_chars
        ));
    }
    prompt.push_str("Preserve exactly: ");
    prompt.push_str(PRESERVE_TERMS);
    for term in &options.preserve_terms {
        prompt.push_str(", ");
        prompt.push_str(term);
    }
    prompt.push_str(".\n\n");
    prompt.push_str(input);
    prompt
}

// ─── Plain wrapper ───────────────────────────────────────────────────────

/// [`Summarize`] built from a prompt template around a raw LLM call.
pub struct LlmSummarizer {
    call: LlmCall,
    options: SummarizerOptions,
}

/// Wrap a string→string async callable with the standard prompt template.
pub fn make_summarizer<F, Fut>(call: F, options: SummarizerOptions) -> LlmSummarizer
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, SummarizeError>> + Send + 'static,
{
    LlmSummarizer {
        call: Box::new(move |prompt| Box::pin(call(prompt))),
        options,
    }
}

#[async_trait]
impl Summarize for LlmSummarizer {
    async fn summarize(&self, input: &str) -> Result<String, SummarizeError> {
        let prompt = build_prompt(&self.options, input, false);
        (self.call)(prompt).await
    }
}

// ─── Escalating wrapper ──────────────────────────────────────────────────

/// Three-level strategy: normal prose, aggressive bullet points at half
/// budget, then the deterministic summarizer.
pub struct EscalatingSummarizer {
    call: LlmCall,
    options: SummarizerOptions,
}

pub fn make_escalating_summarizer<F, Fut>(
    call: F,
    options: SummarizerOptions,
) -> EscalatingSummarizer
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, SummarizeError>> + Send + 'static,
{
    EscalatingSummarizer {
        call: Box::new(move |prompt| Box::pin(call(prompt))),
        options,
    }
}

#[async_trait]
impl Summarize for EscalatingSummarizer {
    async fn summarize(&self, input: &str) -> Result<String, SummarizeError> {
        for aggressive in [false, true] {
            let prompt = build_prompt(&self.options, input, aggressive);
            if let Ok(text) = (self.call)(prompt).await {
                if !text.is_empty() && text.len() < input.len() {
                    return Ok(text);
                }
            }
        }
        Ok(summarize::condense(input, self.options.max_chars))
    }
}
