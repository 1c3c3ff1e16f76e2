use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::citation::extract_citations;

static BLANK_LINES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid blank lines pattern"));
static WS_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

/// Lines shorter than this are ignored by paragraph dedup; short lines
/// (list markers, separators) repeat legitimately.
const MIN_PARAGRAPH_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    Header,
    Paragraph,
}

/// One detected duplicate: the line kept and the line to drop.
#[derive(Debug, Clone, Serialize)]
pub struct Duplicate {
    pub kind: DuplicateKind,
    pub original_line: usize,
    pub duplicate_line: usize,
    pub content: String,
}

/// Find repeated headers and repeated substantial paragraphs. The first
/// occurrence is always the one kept.
pub fn find_duplicates(text: &str) -> Vec<Duplicate> {
    let mut duplicates = Vec::new();
    let mut seen_headers: HashMap<String, usize> = HashMap::new();
    let mut seen_paragraphs: HashMap<String, usize> = HashMap::new();

    for (i, line) in text.lines().enumerate() {
        let stripped = line.trim();
        // Bibliography entries repeat bracket prefixes legitimately.
        if stripped.is_empty() || stripped.starts_with('[') {
            continue;
        }

        if stripped.starts_with('#') {
            match seen_headers.get(stripped) {
                Some(&original) => duplicates.push(Duplicate {
                    kind: DuplicateKind::Header,
                    original_line: original,
                    duplicate_line: i,
                    content: stripped.to_string(),
                }),
                None => {
                    seen_headers.insert(stripped.to_string(), i);
                }
            }
        } else if stripped.len() > MIN_PARAGRAPH_LEN {
            let normalized = WS_RUN_REGEX
                .replace_all(&stripped.to_lowercase(), " ")
                .into_owned();
            match seen_paragraphs.get(&normalized) {
                Some(&original) => duplicates.push(Duplicate {
                    kind: DuplicateKind::Paragraph,
                    original_line: original,
                    duplicate_line: i,
                    content: preview(stripped),
                }),
                None => {
                    seen_paragraphs.insert(normalized, i);
                }
            }
        }
    }

    duplicates
}

fn preview(line: &str) -> String {
    if line.chars().count() > 100 {
        let cut: String = line.chars().take(100).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// Remove duplicate content, keeping first occurrences, and tidy the
/// blank lines left behind.
pub fn remove_duplicates(text: &str) -> (String, Vec<Duplicate>) {
    let duplicates = find_duplicates(text);
    let to_remove: std::collections::HashSet<usize> =
        duplicates.iter().map(|d| d.duplicate_line).collect();

    let kept: Vec<&str> = text
        .lines()
        .enumerate()
        .filter(|(i, _)| !to_remove.contains(i))
        .map(|(_, line)| line)
        .collect();

    let cleaned = kept.join("\n");
    let cleaned = BLANK_LINES_REGEX.replace_all(&cleaned, "\n\n");

    if !duplicates.is_empty() {
        info!("Removed {} duplicate line(s)", duplicates.len());
    }

    (cleaned.trim().to_string(), duplicates)
}

/// Structural overview of an article, used for quality reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StructureReport {
    pub total_lines: usize,
    pub header_count: usize,
    pub paragraph_count: usize,
    pub citation_count: usize,
    pub title_count: usize,
    pub multiple_titles: bool,
}

pub fn analyze_structure(text: &str) -> StructureReport {
    let lines: Vec<&str> = text.lines().collect();
    let headers = lines
        .iter()
        .filter(|l| l.trim().starts_with('#'))
        .count();
    let paragraphs = lines
        .iter()
        .filter(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#') && t.len() > 10
        })
        .count();
    let titles = lines.iter().filter(|l| l.starts_with("# ")).count();

    StructureReport {
        total_lines: lines.len(),
        header_count: headers,
        paragraph_count: paragraphs,
        citation_count: extract_citations(text).len(),
        title_count: titles,
        multiple_titles: titles > 1,
    }
}
