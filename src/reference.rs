use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// Honorific noise that search APIs leave embedded in author names.
static AUTHOR_NOISE_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(Senior\s+)?Member\s*,?\s*IEEE\b",
        r"(?i)\bIEEE\s+(Senior\s+)?Member\b",
        r"(?i)\bFellow\s*,?\s*IEEE\b",
        r"(?i)\bIEEE\s+Fellow\b",
        r"(?i)\bLife\s+(Senior\s+)?Member\b",
        r"(?i)\bStudent\s+Member\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid author noise pattern"))
    .collect()
});

static DOUBLE_COMMA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*,\s*,\s*").expect("Invalid comma cleanup pattern"));
static MULTISPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

/// Where a reference came from.
///
/// Local references are grounded in the retrieved source corpus and are
/// numbered from 1. External references are fetched from a search API and
/// are numbered starting after the highest local number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    External,
}

/// A bibliographic reference usable as a citation target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Assigned citation number; 0 means not yet assigned.
    pub number: u32,
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    pub venue: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub citation_count: u32,
    pub origin: Origin,
}

/// Remove honorific noise ("Member, IEEE" and friends) from an author name.
pub fn clean_author_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for re in AUTHOR_NOISE_REGEXES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = DOUBLE_COMMA_REGEX.replace_all(&cleaned, ", ");
    let cleaned = MULTISPACE_REGEX.replace_all(&cleaned, " ");
    cleaned.trim().trim_matches(',').trim().to_string()
}

/// IEEE author-list join rules: 1 author -> name; 2 -> "A and B";
/// up to 6 -> comma list with "and" before the last; more -> first three
/// plus "et al.".
pub fn format_authors(authors: &[String]) -> String {
    let cleaned: Vec<String> = authors
        .iter()
        .map(|a| clean_author_name(a))
        .filter(|a| !a.is_empty())
        .collect();

    match cleaned.len() {
        0 => "Unknown".to_string(),
        1 => cleaned[0].clone(),
        2 => format!("{} and {}", cleaned[0], cleaned[1]),
        n if n <= 6 => {
            let head = cleaned[..n - 1].join(", ");
            format!("{}, and {}", head, cleaned[n - 1])
        }
        _ => format!("{}, {}, {} et al.", cleaned[0], cleaned[1], cleaned[2]),
    }
}

impl Reference {
    /// Render as an IEEE reference string:
    /// `[N] Author(s), "Title," Venue, Year, doi: D.`
    /// The DOI segment is omitted in favor of a URL segment when absent.
    pub fn to_ieee_format(&self) -> String {
        let authors = format_authors(&self.authors);
        let title = if self.title.is_empty() {
            "Untitled"
        } else {
            self.title.as_str()
        };

        let mut out = format!("[{}] {}, \"{},\"", self.number, authors, title);
        if !self.venue.is_empty() {
            out.push(' ');
            out.push_str(&self.venue);
            out.push(',');
        }
        out.push_str(&format!(" {}", self.year));

        match (&self.doi, &self.url) {
            (Some(doi), _) if !doi.is_empty() => out.push_str(&format!(", doi: {}.", doi)),
            (_, Some(url)) if !url.is_empty() => {
                out.push_str(&format!(". [Online]. Available: {}", url))
            }
            _ => out.push('.'),
        }

        out
    }

    /// Short rendering suitable for injecting into an LLM prompt context.
    pub fn to_context_snippet(&self) -> String {
        let mut author = self
            .authors
            .first()
            .map(|a| clean_author_name(a))
            .unwrap_or_else(|| "Unknown".to_string());
        if self.authors.len() > 1 {
            author.push_str(" et al.");
        }

        let mut snippet = format!("[{}] {} ({}). {}", self.number, author, self.year, self.title);
        if let Some(abstract_text) = &self.abstract_text {
            if !abstract_text.is_empty() {
                let preview: String = if abstract_text.chars().count() > 200 {
                    let cut: String = abstract_text.chars().take(200).collect();
                    format!("{}...", cut)
                } else {
                    abstract_text.clone()
                };
                snippet.push_str(&format!("\n    Abstract: {}", preview));
            }
        }
        snippet
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ieee_format())
    }
}

/// Citation numbers of all references with the given origin.
pub fn numbers_by_origin(references: &[Reference], origin: Origin) -> Vec<u32> {
    references
        .iter()
        .filter(|r| r.origin == origin)
        .map(|r| r.number)
        .collect()
}

/// Assign sequential citation numbers to references, continuing from
/// `start`. External references always start at local count + 1 so the two
/// ranges never collide.
pub fn assign_citation_numbers(references: &mut [Reference], start: u32) {
    for (idx, reference) in references.iter_mut().enumerate() {
        reference.number = start + idx as u32;
    }
}
