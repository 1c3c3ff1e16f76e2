use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::citation::{extract_citations, scan_citations};

/// Maximum number of citation markers an eligible sentence may already
/// carry before fallback insertion skips it.
const SENTENCE_MARKER_CAP: usize = 3;

static HEADING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("Invalid heading pattern"));

/// Result of a fallback integration pass.
#[derive(Debug, Clone)]
pub struct IntegrationOutcome {
    pub text: String,
    /// Fraction of supplied external numbers present in the output text.
    pub achieved_ratio: f64,
    /// Numbers inserted by this pass, in insertion order.
    pub inserted: Vec<u32>,
    /// Supplied numbers still absent (no eligible sentence was found).
    pub unintegrated: Vec<u32>,
}

/// A sentence eligible for marker insertion: where to insert (byte offset,
/// just before the terminal punctuation) and how many markers it already
/// carries.
#[derive(Debug)]
struct SentenceSlot {
    insert_at: usize,
    marker_count: usize,
}

/// Guarantee a minimum integration rate for supplied external reference
/// numbers, compensating for a generative step that under-cites.
///
/// If the supplied numbers already meet `target` the text is returned
/// unchanged. Otherwise each missing number (ascending) is appended as a
/// `[N]` marker to the end of an eligible sentence: fewer than three
/// existing markers, outside the abstract/conclusion/references sections.
/// Sentence boundaries are a best-effort punctuation split. This step
/// never fails; numbers with no eligible sentence are reported, not fatal.
pub fn integrate_missing_references(
    article_text: &str,
    supplied: &[u32],
    target: f64,
) -> IntegrationOutcome {
    let supplied_set: BTreeSet<u32> = supplied.iter().copied().collect();
    if supplied_set.is_empty() {
        return IntegrationOutcome {
            text: article_text.to_string(),
            achieved_ratio: 1.0,
            inserted: Vec::new(),
            unintegrated: Vec::new(),
        };
    }

    let present: BTreeSet<u32> = extract_citations(article_text).into_iter().collect();
    let integrated: BTreeSet<u32> = supplied_set.intersection(&present).copied().collect();
    let ratio = integrated.len() as f64 / supplied_set.len() as f64;

    if ratio >= target {
        info!(
            "External integration rate {:.0}% already meets target {:.0}%",
            ratio * 100.0,
            target * 100.0
        );
        return IntegrationOutcome {
            text: article_text.to_string(),
            achieved_ratio: ratio,
            inserted: Vec::new(),
            unintegrated: supplied_set.difference(&present).copied().collect(),
        };
    }

    let missing: Vec<u32> = supplied_set.difference(&integrated).copied().collect();
    let mut slots = collect_sentence_slots(article_text);

    let mut insertions: Vec<(usize, u32)> = Vec::new();
    let mut inserted = Vec::new();
    let mut unintegrated = Vec::new();
    let mut cursor = 0usize;

    for number in missing {
        match next_eligible_slot(&slots, cursor) {
            Some(idx) => {
                insertions.push((slots[idx].insert_at, number));
                slots[idx].marker_count += 1;
                inserted.push(number);
                cursor = idx + 1;
            }
            None => {
                warn!("No eligible sentence found for external citation [{}]", number);
                unintegrated.push(number);
            }
        }
    }

    let text = apply_insertions(article_text, &mut insertions);
    let achieved_ratio =
        (integrated.len() + inserted.len()) as f64 / supplied_set.len() as f64;

    if achieved_ratio < target {
        warn!(
            "Fallback integration reached {:.0}%, below target {:.0}%",
            achieved_ratio * 100.0,
            target * 100.0
        );
    } else if !inserted.is_empty() {
        info!(
            "Fallback inserted {} external citation(s), integration now {:.0}%",
            inserted.len(),
            achieved_ratio * 100.0
        );
    }

    IntegrationOutcome {
        text,
        achieved_ratio,
        inserted,
        unintegrated,
    }
}

/// Find the next sentence with room for another marker, scanning from
/// `from` and wrapping around once.
fn next_eligible_slot(slots: &[SentenceSlot], from: usize) -> Option<usize> {
    if slots.is_empty() {
        return None;
    }
    let n = slots.len();
    (0..n)
        .map(|i| (from + i) % n)
        .find(|&i| slots[i].marker_count < SENTENCE_MARKER_CAP)
}

/// Split the article into insertion slots: sentences in unprotected
/// sections, located by byte offset.
fn collect_sentence_slots(text: &str) -> Vec<SentenceSlot> {
    let tokens = scan_citations(text);
    let mut slots = Vec::new();

    let mut offset = 0;
    let mut protected = false;
    let mut region_start: Option<usize> = None;

    for line in text.split_inclusive('\n') {
        let is_heading = HEADING_REGEX.is_match(line.trim_end());
        if is_heading {
            if let Some(start) = region_start.take() {
                split_region_sentences(text, start, offset, &tokens, &mut slots);
            }
            let heading_text = line.trim_start_matches('#').trim().to_lowercase();
            protected = heading_text.contains("abstract")
                || heading_text.contains("conclusion")
                || heading_text.contains("references");
        } else if !protected && region_start.is_none() {
            region_start = Some(offset);
        }
        offset += line.len();
    }
    if let Some(start) = region_start {
        split_region_sentences(text, start, text.len(), &tokens, &mut slots);
    }

    slots
}

/// Best-effort sentence split on `[.!?]+` runs within one region. Known
/// to mis-split abbreviations and decimals; the caller treats insertion
/// placement as approximate.
fn split_region_sentences(
    text: &str,
    start: usize,
    end: usize,
    tokens: &[super::CitationToken],
    slots: &mut Vec<SentenceSlot>,
) {
    let region = &text[start..end];
    let bytes = region.as_bytes();
    let mut sent_start = 0usize;
    let mut i = 0usize;

    let mut push_slot = |sent_start: usize, sent_end: usize, insert_at: usize| {
        let content = region[sent_start..sent_end].trim();
        if content.is_empty() {
            return;
        }
        let abs_start = start + sent_start;
        let abs_end = start + sent_end;
        let marker_count = tokens
            .iter()
            .filter(|t| t.start >= abs_start && t.start < abs_end)
            .count();
        slots.push(SentenceSlot {
            insert_at: start + insert_at,
            marker_count,
        });
    };

    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            push_slot(sent_start, i, i);
            while i < bytes.len() && matches!(bytes[i], b'.' | b'!' | b'?') {
                i += 1;
            }
            sent_start = i;
        } else {
            i += 1;
        }
    }
    // Trailing content without terminal punctuation.
    if sent_start < bytes.len() {
        let trimmed_len = region[sent_start..].trim_end().len();
        if trimmed_len > 0 {
            push_slot(sent_start, bytes.len(), sent_start + trimmed_len);
        }
    }
}

/// Rebuild the text with ` [N]` markers inserted at the recorded offsets.
fn apply_insertions(text: &str, insertions: &mut Vec<(usize, u32)>) -> String {
    if insertions.is_empty() {
        return text.to_string();
    }
    insertions.sort_by_key(|(offset, _)| *offset);

    let mut out = String::with_capacity(text.len() + insertions.len() * 6);
    let mut last = 0;
    for (offset, number) in insertions.iter() {
        out.push_str(&text[last..*offset]);
        out.push_str(&format!(" [{}]", number));
        last = *offset;
    }
    out.push_str(&text[last..]);
    out
}
