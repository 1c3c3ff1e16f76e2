use std::collections::{BTreeMap, BTreeSet};

use citecheck::citation::extract_citations;
use citecheck::citation::integrator::integrate_missing_references;
use citecheck::citation::renumber::{format_references_section, renumber_citations};
use citecheck::citation::validator::fix_invalid_citations;
use citecheck::reference::{Origin, Reference};

fn make_ref(number: u32, origin: Origin) -> Reference {
    Reference {
        number,
        title: format!("Paper {}", number),
        authors: vec!["A. Author".to_string(), "B. Author".to_string()],
        year: 2022,
        venue: "Proc. Conf.".to_string(),
        doi: Some(format!("10.1000/paper.{}", number)),
        url: None,
        abstract_text: None,
        citation_count: 10,
        origin,
    }
}

/// Article citing all 40 local references across 20 body sentences, plus
/// two of the 20 supplied external references.
fn under_cited_article() -> String {
    let mut text = String::from("# Survey of Distributed Systems\n\n## Introduction\n\n");
    for i in 0..20u32 {
        let a = 2 * i + 1;
        let b = 2 * i + 2;
        text.push_str(&format!(
            "Observation number {} is supported by prior work [{}] [{}]. ",
            i + 1,
            a,
            b
        ));
    }
    text.push_str("Two external results are already cited [41] [42].\n");
    text
}

#[test]
fn test_fallback_integration_reaches_target() {
    let text = under_cited_article();
    let external: Vec<u32> = (41..=60).collect();

    let before: BTreeSet<u32> = extract_citations(&text).into_iter().collect();
    assert_eq!(
        before.iter().filter(|n| **n >= 41).count(),
        2,
        "only 2 of 20 externals cited up front"
    );

    let outcome = integrate_missing_references(&text, &external, 0.6);
    assert!(outcome.achieved_ratio >= 0.6);

    let after: BTreeSet<u32> = extract_citations(&outcome.text).into_iter().collect();
    let integrated = external.iter().filter(|n| after.contains(n)).count();
    assert!(integrated >= 12, "expected >= 12 externals, got {}", integrated);

    // No pre-existing citation is disturbed.
    for n in 1..=40u32 {
        assert!(after.contains(&n), "local citation [{}] lost", n);
    }
}

#[test]
fn test_integration_is_stable_once_target_met() {
    let text = under_cited_article();
    let external: Vec<u32> = (41..=60).collect();
    let once = integrate_missing_references(&text, &external, 0.6);
    let twice = integrate_missing_references(&once.text, &external, 0.6);
    assert_eq!(once.text, twice.text);
    assert!(twice.inserted.is_empty());
}

#[test]
fn test_full_pipeline_fix_integrate_renumber() {
    // Orphan [99] must be removed, externals filled in, numbering made
    // dense, bibliography matching the final text exactly.
    let mut text = under_cited_article();
    text.push_str("A bogus claim [99].\n");

    let local: Vec<u32> = (1..=40).collect();
    let external: Vec<u32> = (41..=60).collect();
    let references: BTreeMap<u32, Reference> = local
        .iter()
        .map(|&n| (n, make_ref(n, Origin::Local)))
        .chain(external.iter().map(|&n| (n, make_ref(n, Origin::External))))
        .collect();

    let (fixed, removed) = fix_invalid_citations(&text, &local, &external);
    assert_eq!(removed, vec!["99".to_string()]);

    let integrated = integrate_missing_references(&fixed, &external, 0.6);
    assert!(integrated.achieved_ratio >= 0.6);

    let renumbered = renumber_citations(&integrated.text, &references);
    let cited: BTreeSet<u32> = extract_citations(&renumbered.text).into_iter().collect();
    let k = renumbered.mapping.len() as u32;
    assert_eq!(cited, (1..=k).collect::<BTreeSet<u32>>());
    assert_eq!(renumbered.bibliography.len(), k as usize);

    // Bibliography entries carry the new numbers in order.
    for (idx, line) in renumbered.bibliography.iter().enumerate() {
        assert!(line.starts_with(&format!("[{}]", idx + 1)));
        assert!(!line.contains("MISSING REFERENCE"));
    }

    let section = format_references_section(&renumbered.bibliography);
    assert!(section.starts_with("\n## References\n"));
}

#[test]
fn test_renumber_bibliography_uses_ieee_format() {
    let references: BTreeMap<u32, Reference> =
        [(17, make_ref(17, Origin::Local))].into_iter().collect();
    let outcome = renumber_citations("One claim [17].", &references);
    assert_eq!(outcome.text, "One claim [1].");
    assert_eq!(
        outcome.bibliography[0],
        "[1] A. Author and B. Author, \"Paper 17,\" Proc. Conf., 2022, doi: 10.1000/paper.17."
    );
}
