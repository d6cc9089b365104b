//! Deterministic text canonicalization applied before chunking.
//!
//! Extracted document text arrives with mixed case, diacritics, and the
//! filler artifacts PDF extraction leaves behind (dot leaders, dash rules,
//! repeated footer markers). [`normalize`] folds all of that into a stable
//! lowercase, single-spaced form so that chunking and embedding see the same
//! bytes for the same content every time.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Runs of dots, whitespace, dashes, or underscores of length >= 5 are
/// extraction filler (dot leaders, horizontal rules), not content.
static FILLER_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\.|\s|-|_){5,}").unwrap());

/// Footer markers that survive extraction but carry no text.
static FOOTER_ART: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(nr\)\s*art\.").unwrap());
static FOOTER_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""\(nr\)"#).unwrap());

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalizes extracted text: lowercase, diacritics folded to their base
/// characters, filler runs and footer markers removed, whitespace collapsed
/// to single spaces.
///
/// Empty or whitespace-only input yields an empty string — a soft outcome,
/// never an error. Pure and idempotent.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let folded: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let cleaned = FILLER_RUNS.replace_all(&folded, " ");
    let cleaned = FOOTER_ART.replace_all(&cleaned, " ");
    let cleaned = FOOTER_QUOTE.replace_all(&cleaned, " ");

    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}
