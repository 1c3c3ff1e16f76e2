use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::citation::{citation_counts, scan_citations};

static HORIZONTAL_WS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("Invalid whitespace pattern"));
static EMPTY_BRACKETS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*\]").expect("Invalid empty brackets pattern"));
static BLANK_LINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid blank lines pattern"));

/// Result of validating the citations in one article body.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total_citations: usize,
    pub unique_citations: usize,
    /// Count of valid reference numbers available (local plus external).
    pub valid_citations: usize,
    /// Citation numbers present in text with no matching reference, sorted.
    pub invalid_citations: Vec<u32>,
    pub invalid_count: usize,
    pub citation_counts: BTreeMap<u32, usize>,
    pub validation_passed: bool,
}

/// Validate every citation marker in `article_text` against the union of
/// local and external reference numbers. Never fails; text without markers
/// yields an empty, passing report.
pub fn validate_citations(
    article_text: &str,
    local_citations: &[u32],
    external_citations: &[u32],
) -> ValidationReport {
    let all_valid: BTreeSet<u32> = local_citations
        .iter()
        .chain(external_citations.iter())
        .copied()
        .collect();

    let counts = citation_counts(article_text);
    let total: usize = counts.values().sum();

    let invalid: Vec<u32> = counts
        .keys()
        .filter(|n| !all_valid.contains(n))
        .copied()
        .collect();

    ValidationReport {
        total_citations: total,
        unique_citations: counts.len(),
        valid_citations: all_valid.len(),
        invalid_count: invalid.len(),
        validation_passed: invalid.is_empty(),
        invalid_citations: invalid,
        citation_counts: counts,
    }
}

/// Remove every citation marker whose number has no matching reference.
///
/// Returns the fixed text and the removed numbers (as strings, for the
/// caller's log). Whitespace runs left behind by removals are collapsed
/// and empty bracket pairs dropped; line structure is preserved. Running
/// the fixer on its own output is a no-op.
pub fn fix_invalid_citations(
    article_text: &str,
    local_citations: &[u32],
    external_citations: &[u32],
) -> (String, Vec<String>) {
    let all_valid: BTreeSet<u32> = local_citations
        .iter()
        .chain(external_citations.iter())
        .copied()
        .collect();

    let mut removed = Vec::new();
    let mut fixed = String::with_capacity(article_text.len());
    let mut last_end = 0;

    for token in scan_citations(article_text) {
        if !all_valid.contains(&token.number) {
            fixed.push_str(&article_text[last_end..token.start]);
            last_end = token.end;
            removed.push(token.number.to_string());
        }
    }
    fixed.push_str(&article_text[last_end..]);

    let fixed = EMPTY_BRACKETS_REGEX.replace_all(&fixed, "");
    let fixed = HORIZONTAL_WS_REGEX.replace_all(&fixed, " ");
    let fixed = BLANK_LINES_REGEX.replace_all(&fixed, "\n\n");

    if !removed.is_empty() {
        info!("Removed {} invalid citation(s): {}", removed.len(), removed.join(", "));
    }

    (fixed.into_owned(), removed)
}

/// How the external share of the reference list compares to a target
/// fraction of external/(local+external).
#[derive(Debug, Clone, Serialize)]
pub struct RatioReport {
    pub ratio: f64,
    pub target_ratio: f64,
    pub meets_target: bool,
    pub need_more_external: bool,
}

/// Check whether external references make up at least `target_ratio` of
/// all references.
pub fn check_external_reference_ratio(
    local_count: usize,
    external_count: usize,
    target_ratio: f64,
) -> RatioReport {
    let total = local_count + external_count;
    if total == 0 {
        return RatioReport {
            ratio: 0.0,
            target_ratio,
            meets_target: false,
            need_more_external: true,
        };
    }

    let ratio = external_count as f64 / total as f64;
    RatioReport {
        ratio,
        target_ratio,
        meets_target: ratio >= target_ratio,
        need_more_external: ratio < target_ratio,
    }
}
