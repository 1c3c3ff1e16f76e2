use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use citecheck::citation::integrator::integrate_missing_references;
use citecheck::citation::renumber::{format_references_section, renumber_citations};
use citecheck::citation::validator::{fix_invalid_citations, validate_citations};
use citecheck::dedupe::{analyze_structure, remove_duplicates};
use citecheck::reference::{numbers_by_origin, Origin, Reference};
use citecheck::search::{
    derive_query, prepare_external_references, score_relevance, PaperSearcher, SearchConfig,
};

/// Citation integrity checks and repairs for generated IEEE-style articles
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate citation markers against the references file
    Validate {
        /// Article file (markdown)
        article: PathBuf,
        /// References file (JSON array of reference records)
        #[arg(short, long)]
        refs: PathBuf,
    },
    /// Remove citation markers that resolve to no reference
    Fix {
        article: PathBuf,
        #[arg(short, long)]
        refs: PathBuf,
        /// Output file (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Insert under-delivered external citations into eligible sentences
    Integrate {
        article: PathBuf,
        #[arg(short, long)]
        refs: PathBuf,
        /// Target fraction of external references present in the text
        #[arg(short, long, default_value_t = 0.6)]
        target: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Renumber citations into a dense [1..K] range and emit the bibliography
    Renumber {
        article: PathBuf,
        #[arg(short, long)]
        refs: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove duplicated headers and paragraphs
    Dedupe {
        article: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch external references from the paper search API
    Fetch {
        /// Explicit search query; derived from the article when omitted
        #[arg(short, long)]
        query: Option<String>,
        /// Article file to derive the query from
        #[arg(short, long)]
        article: Option<PathBuf>,
        /// Local references file; fetched papers duplicating its titles
        /// are dropped and numbering continues after the local range
        #[arg(short, long)]
        refs: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        max_results: usize,
        #[arg(long, default_value_t = 5)]
        min_citations: u32,
        #[arg(long, default_value_t = 2015)]
        year_from: i32,
        /// First citation number to assign; defaults to local count + 1
        #[arg(long)]
        start: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Full pipeline: fix, integrate, renumber, append bibliography
    Check {
        article: PathBuf,
        #[arg(short, long)]
        refs: PathBuf,
        #[arg(short, long, default_value_t = 0.6)]
        target: f64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match args.command {
        Command::Validate { article, refs } => {
            let text = read_article(&article)?;
            let references = read_references(&refs)?;
            let report = validate_citations(
                &text,
                &numbers_by_origin(&references, Origin::Local),
                &numbers_by_origin(&references, Origin::External),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.validation_passed {
                anyhow::bail!(
                    "validation failed: {} unresolved citation number(s): {:?}",
                    report.invalid_count,
                    report.invalid_citations
                );
            }
        }
        Command::Fix {
            article,
            refs,
            output,
        } => {
            let text = read_article(&article)?;
            let references = read_references(&refs)?;
            let (fixed, removed) = fix_invalid_citations(
                &text,
                &numbers_by_origin(&references, Origin::Local),
                &numbers_by_origin(&references, Origin::External),
            );
            if removed.is_empty() {
                info!("No invalid citations found");
            }
            write_output(output.as_deref(), &fixed)?;
        }
        Command::Integrate {
            article,
            refs,
            target,
            output,
        } => {
            let text = read_article(&article)?;
            let references = read_references(&refs)?;
            let supplied = numbers_by_origin(&references, Origin::External);
            let outcome = integrate_missing_references(&text, &supplied, target);
            info!(
                "External integration rate: {:.0}% ({} inserted, {} unintegrated)",
                outcome.achieved_ratio * 100.0,
                outcome.inserted.len(),
                outcome.unintegrated.len()
            );
            write_output(output.as_deref(), &outcome.text)?;
        }
        Command::Renumber {
            article,
            refs,
            output,
        } => {
            let text = read_article(&article)?;
            let references = read_references(&refs)?;
            let outcome = renumber_citations(&text, &by_number(&references));
            let result = format!(
                "{}\n{}",
                outcome.text.trim_end(),
                format_references_section(&outcome.bibliography)
            );
            write_output(output.as_deref(), &result)?;
        }
        Command::Dedupe { article, output } => {
            let text = read_article(&article)?;
            let structure = analyze_structure(&text);
            if structure.multiple_titles {
                info!("Article has {} title lines", structure.title_count);
            }
            let (cleaned, duplicates) = remove_duplicates(&text);
            if duplicates.is_empty() {
                info!("No duplicate content found");
            }
            write_output(output.as_deref(), &cleaned)?;
        }
        Command::Fetch {
            query,
            article,
            refs,
            max_results,
            min_citations,
            year_from,
            start,
            output,
        } => {
            let query = match (query, article) {
                (Some(q), _) => q,
                (None, Some(path)) => {
                    let text = read_article(&path)?;
                    derive_query(&text, 5)
                }
                (None, None) => {
                    anyhow::bail!("provide either --query or --article to derive one from")
                }
            };
            if query.is_empty() {
                anyhow::bail!("could not derive a search query from the article");
            }

            let local = match refs {
                Some(path) => read_references(&path)?,
                None => Vec::new(),
            };
            let local_titles: Vec<String> = local
                .iter()
                .filter(|r| r.origin == Origin::Local)
                .map(|r| r.title.clone())
                .collect();
            let start = start.unwrap_or(local_titles.len() as u32 + 1);

            let searcher = PaperSearcher::new(SearchConfig::default());
            let fetched = searcher
                .search_papers(&query, max_results, min_citations, year_from)
                .await;
            let references = prepare_external_references(fetched, &local_titles, start);
            for reference in &references {
                debug!(
                    "[{}] relevance {:.2}: {}",
                    reference.number,
                    score_relevance(reference, &query),
                    reference.title
                );
            }
            info!("Fetched {} external reference(s)", references.len());
            write_output(
                output.as_deref(),
                &serde_json::to_string_pretty(&references)?,
            )?;
        }
        Command::Check {
            article,
            refs,
            target,
            output,
        } => {
            let text = read_article(&article)?;
            let references = read_references(&refs)?;
            let local = numbers_by_origin(&references, Origin::Local);
            let external = numbers_by_origin(&references, Origin::External);

            let report = validate_citations(&text, &local, &external);
            info!(
                "Validation: {} citation(s), {} unresolved",
                report.total_citations, report.invalid_count
            );

            let (fixed, removed) = fix_invalid_citations(&text, &local, &external);
            if !removed.is_empty() {
                info!("Removed unresolved citations: {}", removed.join(", "));
            }

            let outcome = integrate_missing_references(&fixed, &external, target);
            info!(
                "External integration rate: {:.0}%",
                outcome.achieved_ratio * 100.0
            );

            let renumbered = renumber_citations(&outcome.text, &by_number(&references));
            let result = format!(
                "{}\n{}",
                renumbered.text.trim_end(),
                format_references_section(&renumbered.bibliography)
            );
            write_output(output.as_deref(), &result)?;
        }
    }

    Ok(())
}

fn read_article(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read article {:?}", path))
}

fn read_references(path: &Path) -> Result<Vec<Reference>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read references file {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse references file {:?}", path))
}

fn by_number(references: &[Reference]) -> BTreeMap<u32, Reference> {
    references.iter().map(|r| (r.number, r.clone())).collect()
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write output to {:?}", path))?;
            info!("Output written to {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}
