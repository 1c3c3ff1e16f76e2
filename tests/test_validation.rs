use citecheck::citation::validator::{fix_invalid_citations, validate_citations};
use citecheck::citation::{citation_counts, extract_citations};

#[test]
fn test_report_shape_serializes_with_all_fields() {
    let report = validate_citations("Intro [1] body [2] and again [1].", &[1, 2], &[]);
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["total_citations"], 3);
    assert_eq!(value["unique_citations"], 2);
    assert_eq!(value["valid_citations"], 2);
    assert_eq!(value["invalid_count"], 0);
    assert_eq!(value["validation_passed"], true);
    assert_eq!(value["citation_counts"]["1"], 2);
    assert!(value["invalid_citations"].as_array().unwrap().is_empty());
}

#[test]
fn test_invalid_set_is_extracted_minus_known() {
    let text = "A [1] b [2] c [7] d [9] e [2].";
    let report = validate_citations(text, &[1, 2], &[7]);
    assert_eq!(report.invalid_citations, vec![9]);
    assert_eq!(report.invalid_count, 1);
    assert!(!report.validation_passed);

    // Every extracted number is either valid or reported invalid.
    let extracted = citation_counts(text);
    let known = extracted.keys().filter(|n| [1, 2, 7].contains(n)).count();
    assert_eq!(known + report.invalid_citations.len(), extracted.len());
}

#[test]
fn test_fix_then_validate_passes() {
    let text = "Claims [1] and [2], but also [99] and [150].";
    let (fixed, removed) = fix_invalid_citations(text, &[1, 2], &[]);
    assert_eq!(removed, vec!["99".to_string(), "150".to_string()]);

    let report = validate_citations(&fixed, &[1, 2], &[]);
    assert!(report.validation_passed);
    assert_eq!(report.total_citations, 2);
}

#[test]
fn test_fix_preserves_markdown_structure() {
    let text = "# Title\n\nParagraph with [5] kept and [99] dropped.\n\n- list item [5]\n";
    let (fixed, _) = fix_invalid_citations(text, &[5], &[]);
    assert!(fixed.contains("# Title\n\nParagraph"));
    assert!(fixed.contains("- list item [5]"));
    assert!(!fixed.contains("[99]"));
}

#[test]
fn test_fix_skips_code_blocks_and_tables() {
    let text = "Prose [99].\n\n```\narray[99] = 1;\n```\n\n| col [99] |\n| --- |\n";
    let (fixed, removed) = fix_invalid_citations(text, &[], &[]);
    assert_eq!(removed.len(), 1);
    assert!(fixed.contains("array[99] = 1;"));
    assert!(fixed.contains("| col [99] |"));
    assert!(!fixed.contains("Prose [99]"));
}

#[test]
fn test_no_markers_yields_passing_empty_report() {
    let report = validate_citations("No markers at all.", &[1, 2, 3], &[]);
    assert_eq!(report.total_citations, 0);
    assert_eq!(report.unique_citations, 0);
    assert!(report.validation_passed);
    assert!(extract_citations("No markers at all.").is_empty());
}
