use anyhow::{Context, Result};

use crate::core::AnalysisResult;

pub const CSV_HEADERS: [&str; 9] = [
    "Geo",
    "Law",
    "Label",
    "Severity",
    "Confidence",
    "Controls",
    "Reasoning",
    "Evidence",
    "Citations",
];

// RFC 4180-style minimal escaping: every cell quoted, embedded quotes
// doubled. Embedded newlines pass through untouched; the export contract
// does not cover them.
fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| csv_cell(c))
        .collect::<Vec<_>>()
        .join(",")
}

// Serializes the full findings list in original order, independent of any
// active view filter.
pub fn build_csv(result: &AnalysisResult) -> String {
    let mut rows = Vec::with_capacity(result.findings.len() + 1);
    rows.push(csv_row(
        &CSV_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    ));

    for finding in &result.findings {
        rows.push(csv_row(&[
            finding.geo.clone(),
            finding.law.clone(),
            finding.label.to_string(),
            finding.severity.to_string(),
            format!("{}%", finding.confidence),
            finding.controls.clone(),
            finding.reasoning.clone(),
            finding.evidence_snippet.clone(),
            finding.citations.join("; "),
        ]));
    }

    rows.join("\n")
}

pub fn build_json(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize analysis result to JSON")
}
