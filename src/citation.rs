pub mod integrator;
pub mod renumber;
pub mod validator;

use std::collections::BTreeMap;

/// A single `[N]` citation marker found in text, with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationToken {
    pub number: u32,
    pub start: usize,
    pub end: usize,
}

/// Scan text for citation markers with a small finite-state pass.
///
/// A marker is a `[` followed by one or more ASCII digits and a closing
/// `]`. The scanner is markdown-aware: markers inside fenced code blocks,
/// inline code spans, and table rows are not citations and are skipped.
/// Malformed input never fails; it just produces no tokens.
pub fn scan_citations(text: &str) -> Vec<CitationToken> {
    let mut tokens = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence && !trimmed.starts_with('|') {
            scan_line(line, offset, &mut tokens);
        }
        offset += line.len();
    }

    tokens
}

/// Scan one line, tracking inline code spans delimited by backticks.
fn scan_line(line: &str, base: usize, out: &mut Vec<CitationToken>) {
    let bytes = line.as_bytes();
    let mut in_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                in_code = !in_code;
                i += 1;
            }
            b'[' if !in_code => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if j > i + 1 && j < bytes.len() && bytes[j] == b']' {
                    // Absurdly long digit runs overflow u32 and are not
                    // citations.
                    if let Ok(number) = line[i + 1..j].parse::<u32>() {
                        out.push(CitationToken {
                            number,
                            start: base + i,
                            end: base + j + 1,
                        });
                    }
                    i = j + 1;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
}

/// Extract all citation numbers from text in order of appearance,
/// duplicates preserved.
pub fn extract_citations(text: &str) -> Vec<u32> {
    scan_citations(text).into_iter().map(|t| t.number).collect()
}

/// Count occurrences per citation number.
pub fn citation_counts(text: &str) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for number in extract_citations(text) {
        *counts.entry(number).or_insert(0) += 1;
    }
    counts
}
