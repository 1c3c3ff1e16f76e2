//! Citation integrity toolkit for generated IEEE-style articles.
//!
//! The generative step upstream is an unreliable producer: it may cite
//! numbers that resolve to nothing, ignore supplied external references,
//! or leave the bibliography out of step with the text. This crate is the
//! validating consumer: it scans `[N]` markers, validates them against
//! known local and external references, removes orphans, inserts
//! under-delivered external citations, and compacts the final numbering
//! into a dense `[1..K]` bibliography.

pub mod citation;
pub mod dedupe;
pub mod error;
pub mod reference;
pub mod search;

pub use error::CiteError;
