use log::{info, warn};
use std::collections::BTreeMap;

use crate::citation::scan_citations;
use crate::reference::Reference;

/// Result of compacting in-text citation numbers into a dense `[1..K]`
/// sequence.
#[derive(Debug, Clone)]
pub struct RenumberOutcome {
    pub text: String,
    /// Bibliography lines in final order, one per cited number.
    pub bibliography: Vec<String>,
    /// Original number -> new number.
    pub mapping: BTreeMap<u32, u32>,
}

/// Renumber every citation marker in `article_text` so the cited set
/// becomes the contiguous range `[1..K]`, preserving ascending order of
/// the original numbers.
///
/// The rewrite is a single left-to-right pass into a fresh buffer using a
/// prebuilt old-to-new map, so a freshly written low number can never be
/// re-matched as an original number. The bibliography contains exactly
/// the cited set; a cited number with no reference record gets an
/// explicit placeholder line rather than being dropped silently.
pub fn renumber_citations(
    article_text: &str,
    references: &BTreeMap<u32, Reference>,
) -> RenumberOutcome {
    let tokens = scan_citations(article_text);

    // BTreeMap keeps the original numbers sorted; dense new numbers are
    // assigned in that ascending order.
    let mut mapping: BTreeMap<u32, u32> = BTreeMap::new();
    for token in &tokens {
        mapping.entry(token.number).or_insert(0);
    }
    for (new, slot) in mapping.values_mut().enumerate() {
        *slot = new as u32 + 1;
    }

    let mut text = String::with_capacity(article_text.len());
    let mut last = 0;
    for token in &tokens {
        text.push_str(&article_text[last..token.start]);
        // Every scanned number is in the map by construction.
        let new = mapping[&token.number];
        text.push_str(&format!("[{}]", new));
        last = token.end;
    }
    text.push_str(&article_text[last..]);

    let mut bibliography = Vec::with_capacity(mapping.len());
    for (old, new) in &mapping {
        match references.get(old) {
            Some(reference) => {
                let mut entry = reference.clone();
                entry.number = *new;
                bibliography.push(entry.to_ieee_format());
            }
            None => {
                warn!("Citation [{}] has no reference record; emitting placeholder", old);
                bibliography.push(format!(
                    "[{}] MISSING REFERENCE - citation used in text but no source mapping found.",
                    new
                ));
            }
        }
    }

    info!(
        "Renumbered {} unique citation(s) into [1..{}]",
        mapping.len(),
        mapping.len()
    );

    RenumberOutcome {
        text,
        bibliography,
        mapping,
    }
}

/// Render a renumbered bibliography as a markdown References section.
pub fn format_references_section(bibliography: &[String]) -> String {
    let mut out = String::from("\n## References\n\n");
    if bibliography.is_empty() {
        out.push_str("No citations found in article.\n");
        return out;
    }
    for line in bibliography {
        out.push_str(line);
        out.push('\n');
    }
    out
}
