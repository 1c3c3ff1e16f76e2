use thiserror::Error;

/// Errors surfaced by the citecheck library.
#[derive(Debug, Error)]
pub enum CiteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("search API error: {0}")]
    Api(String),
}
