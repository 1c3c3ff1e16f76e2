use backoff::{future::retry, ExponentialBackoff};
use chrono::Datelike;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::CiteError;
use crate::reference::{Origin, Reference};

// Single lazily-initialized client for all API calls to enable connection
// pooling.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("Invalid title pattern"));

const SEARCH_FIELDS: &str = "title,authors,year,venue,citationCount,abstract,externalIds,url";

/// Explicit configuration for the paper search client. Passed in rather
/// than read from the environment so tests can point at a mock server and
/// shrink the delays.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Minimum interval between consecutive API calls.
    pub min_interval: Duration,
    /// First backoff delay after a 429; doubles on each retry.
    pub retry_initial: Duration,
    /// Total time budget for 429 retries before giving up.
    pub retry_budget: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
            retry_initial: Duration::from_secs(5),
            retry_budget: Duration::from_secs(40),
        }
    }
}

/// Client for the Semantic Scholar paper search API.
pub struct PaperSearcher {
    config: SearchConfig,
    last_request: Mutex<Option<Instant>>,
}

impl PaperSearcher {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            last_request: Mutex::new(None),
        }
    }

    /// Search for papers matching `query`.
    ///
    /// Results are filtered by `min_citations` and `year_from`, sorted
    /// descending by citation count, and returned with origin=external and
    /// citation number 0 (assignment is a separate step). A 429 response
    /// is retried with exponential backoff; any other failure is logged
    /// and yields an empty list.
    pub async fn search_papers(
        &self,
        query: &str,
        max_results: usize,
        min_citations: u32,
        year_from: i32,
    ) -> Vec<Reference> {
        let url = format!("{}/paper/search", self.config.base_url);
        let limit = (max_results * 2).min(100);
        let year_param = format!("{}-", year_from);

        let backoff = ExponentialBackoff {
            initial_interval: self.config.retry_initial,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_interval: self.config.retry_budget,
            max_elapsed_time: Some(self.config.retry_budget),
            ..Default::default()
        };

        let operation = || async {
            self.wait_for_slot().await;
            info!("Querying paper search API: {}", query);
            let response = HTTP_CLIENT
                .get(&url)
                .timeout(self.config.timeout)
                .query(&[
                    ("query", query),
                    ("limit", &limit.to_string()),
                    ("fields", SEARCH_FIELDS),
                    ("year", &year_param),
                ])
                .send()
                .await
                .map_err(|e| backoff::Error::permanent(CiteError::Network(e)))?;

            let status = response.status();
            if status.as_u16() == 429 {
                warn!("Paper search API rate limited (429), backing off");
                return Err(backoff::Error::transient(CiteError::Api(
                    "rate limited".to_string(),
                )));
            }
            if !status.is_success() {
                // Non-429 errors are not retried.
                return Err(backoff::Error::permanent(CiteError::Api(format!(
                    "paper search API returned status {}",
                    status
                ))));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| backoff::Error::permanent(CiteError::Network(e)))
        };

        match retry(backoff, operation).await {
            Ok(body) => {
                let refs = parse_search_results(&body, max_results, min_citations);
                info!("Paper search returned {} usable reference(s)", refs.len());
                refs
            }
            Err(e) => {
                warn!("Paper search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Enforce the minimum interval between API calls using a monotonic
    /// last-call watermark.
    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.config.min_interval {
                tokio::time::sleep(self.config.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Map the API response body into reference records.
fn parse_search_results(body: &Value, max_results: usize, min_citations: u32) -> Vec<Reference> {
    let papers = match body.get("data").and_then(|d| d.as_array()) {
        Some(papers) => papers,
        None => return Vec::new(),
    };

    let mut refs = Vec::new();
    for paper in papers {
        let citation_count = paper
            .get("citationCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0) as u32;
        if citation_count < min_citations {
            continue;
        }

        let authors: Vec<String> = paper
            .get("authors")
            .and_then(|a| a.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let doi = paper
            .get("externalIds")
            .and_then(|ids| ids.get("DOI"))
            .and_then(|d| d.as_str())
            .map(|s| s.to_string());

        refs.push(Reference {
            number: 0,
            title: paper
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("Untitled")
                .to_string(),
            authors,
            year: paper.get("year").and_then(|y| y.as_i64()).unwrap_or(0) as i32,
            venue: paper
                .get("venue")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            doi,
            url: paper
                .get("url")
                .and_then(|u| u.as_str())
                .map(|s| s.to_string()),
            abstract_text: paper
                .get("abstract")
                .and_then(|a| a.as_str())
                .map(|s| s.to_string()),
            citation_count,
            origin: Origin::External,
        });
    }

    // Most-cited first.
    refs.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
    refs.truncate(max_results);
    refs
}

/// Derive a search query from an article: capitalized multi-character
/// words taken from the markdown title, falling back to the first
/// substantive line.
pub fn derive_query(article_text: &str, max_keywords: usize) -> String {
    if let Some(cap) = TITLE_REGEX.captures(article_text) {
        let title = cap.get(1).map_or("", |m| m.as_str());
        let keywords = capitalized_words(title, max_keywords);
        if !keywords.is_empty() {
            return keywords.join(" ");
        }
    }

    for line in article_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let keywords = capitalized_words(trimmed, max_keywords);
        if !keywords.is_empty() {
            return keywords.join(" ");
        }
        // Plain lowercase prose: fall back to the longer words.
        return trimmed
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.len() > 4)
            .take(max_keywords)
            .collect::<Vec<_>>()
            .join(" ");
    }

    String::new()
}

fn capitalized_words(text: &str, max: usize) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() > 2 && w.chars().next().is_some_and(|c| c.is_uppercase()))
        .take(max)
        .collect()
}

/// Score a fetched paper's relevance to a topic, 0.0 to 1.0: keyword
/// overlap with the topic (50%), recency (30%), normalized citation
/// count (20%).
pub fn score_relevance(reference: &Reference, topic: &str) -> f64 {
    let mut score = 0.0;

    let topic_lower = topic.to_lowercase();
    let topic_words: Vec<&str> = topic_lower
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .collect();

    if !topic_words.is_empty() {
        let text = format!(
            "{} {}",
            reference.title.to_lowercase(),
            reference
                .abstract_text
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
        );
        let text_words: Vec<&str> = text.split_whitespace().collect();
        let overlap = topic_words
            .iter()
            .filter(|w| text_words.contains(w))
            .count() as f64
            / topic_words.len() as f64;
        score += overlap * 0.5;
    }

    let current_year = chrono::Utc::now().year();
    if reference.year >= 2020 && current_year > 2015 {
        let recency =
            ((reference.year - 2015) as f64 / (current_year - 2015) as f64).min(1.0);
        score += recency * 0.3;
    }

    if reference.citation_count > 0 {
        score += (reference.citation_count as f64 / 100.0).min(1.0) * 0.2;
    }

    score.min(1.0)
}

/// Drop fetched papers whose title duplicates a local corpus title
/// (rough substring matching in either direction).
pub fn deduplicate_against_local(
    external: Vec<Reference>,
    local_titles: &[String],
) -> Vec<Reference> {
    let local_lower: Vec<String> = local_titles.iter().map(|t| t.to_lowercase()).collect();
    external
        .into_iter()
        .filter(|reference| {
            let title = reference.title.to_lowercase();
            !local_lower
                .iter()
                .any(|local| title.contains(local.as_str()) || local.contains(&title))
        })
        .collect()
}

/// Turn raw search results into usable external references: drop papers
/// already in the local corpus, then number the survivors starting after
/// the local range.
pub fn prepare_external_references(
    fetched: Vec<Reference>,
    local_titles: &[String],
    start: u32,
) -> Vec<Reference> {
    let before = fetched.len();
    let mut kept = deduplicate_against_local(fetched, local_titles);
    if kept.len() < before {
        info!(
            "Dropped {} fetched reference(s) duplicating the local corpus",
            before - kept.len()
        );
    }
    crate::reference::assign_citation_numbers(&mut kept, start);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_query_from_title() {
        let text = "# Federated Learning for Medical Imaging\n\nbody text";
        assert_eq!(derive_query(text, 5), "Federated Learning Medical Imaging");
    }

    #[test]
    fn test_derive_query_falls_back_to_first_line() {
        let text = "Transformer Architectures dominate modern NLP pipelines.\nMore text.";
        let query = derive_query(text, 5);
        assert!(query.contains("Transformer"));
        assert!(query.contains("NLP"));
    }

    #[test]
    fn test_derive_query_empty_input() {
        assert_eq!(derive_query("", 5), "");
    }

    #[test]
    fn test_score_relevance_keyword_overlap() {
        let reference = Reference {
            number: 0,
            title: "Graph Neural Networks for Molecules".to_string(),
            authors: vec![],
            year: 2024,
            venue: String::new(),
            doi: None,
            url: None,
            abstract_text: None,
            citation_count: 200,
            origin: Origin::External,
        };
        let relevant = score_relevance(&reference, "graph neural networks");
        let irrelevant = score_relevance(&reference, "quantum cryptography protocols");
        assert!(relevant > irrelevant);
        assert!(relevant <= 1.0);
    }

    #[test]
    fn test_deduplicate_against_local() {
        let external = vec![
            Reference {
                number: 0,
                title: "Deep Learning".to_string(),
                authors: vec![],
                year: 2020,
                venue: String::new(),
                doi: None,
                url: None,
                abstract_text: None,
                citation_count: 0,
                origin: Origin::External,
            },
            Reference {
                number: 0,
                title: "A Novel Unrelated Study".to_string(),
                authors: vec![],
                year: 2021,
                venue: String::new(),
                doi: None,
                url: None,
                abstract_text: None,
                citation_count: 0,
                origin: Origin::External,
            },
        ];
        let kept =
            deduplicate_against_local(external, &["deep learning".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "A Novel Unrelated Study");
    }

    #[test]
    fn test_prepare_external_references_dedups_then_numbers() {
        let make = |title: &str| Reference {
            number: 0,
            title: title.to_string(),
            authors: vec![],
            year: 2022,
            venue: String::new(),
            doi: None,
            url: None,
            abstract_text: None,
            citation_count: 0,
            origin: Origin::External,
        };
        let fetched = vec![
            make("Already in the Corpus"),
            make("Fresh Result One"),
            make("Fresh Result Two"),
        ];
        let refs = prepare_external_references(
            fetched,
            &["already in the corpus".to_string()],
            41,
        );
        let numbered: Vec<(u32, &str)> =
            refs.iter().map(|r| (r.number, r.title.as_str())).collect();
        assert_eq!(
            numbered,
            vec![(41, "Fresh Result One"), (42, "Fresh Result Two")]
        );
    }

    #[test]
    fn test_parse_search_results_filters_and_sorts() {
        let body = serde_json::json!({
            "data": [
                {"title": "Low", "citationCount": 2, "year": 2021, "venue": "V", "authors": []},
                {"title": "Mid", "citationCount": 50, "year": 2021, "venue": "V", "authors": []},
                {"title": "High", "citationCount": 500, "year": 2021, "venue": "V", "authors": []}
            ]
        });
        let refs = parse_search_results(&body, 10, 5);
        let titles: Vec<&str> = refs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["High", "Mid"]);
    }
}
