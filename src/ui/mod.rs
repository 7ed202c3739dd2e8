use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{AnalysisResult, ComplianceLabel, Finding, Severity};
use crate::view;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub truncate_chars: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - retry the command, or re-run with `--verbose` for details");
    let _ = writeln!(
        stderr,
        "  - see `geoscreen --help` for commands and options"
    );
}

pub fn print_analysis(result: &AnalysisResult, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();

    let latency = match result.latency_ms {
        Some(ms) => format!("  latency={ms}ms"),
        None => String::new(),
    };
    let _ = writeln!(
        out,
        "summary: {}={} {}={} {}={}{}",
        format_severity(Severity::High, cfg.color),
        result.summary.high,
        format_severity(Severity::Med, cfg.color),
        result.summary.med,
        format_severity(Severity::Ok, cfg.color),
        result.summary.ok,
        latency
    );
    let _ = writeln!(out, "- feature: {}", result.feature_id);
    let _ = writeln!(out, "- detected geos: {}", result.detected_geos.join(", "));
    if !result.summary_matches_findings() {
        let _ = writeln!(
            out,
            "- note: summary counts do not match the findings list (backend inconsistency)"
        );
    }

    let total = result.findings.len();
    let rows = cfg.max_table_rows.min(total);

    let _ = writeln!(out);
    if total > rows {
        let _ = writeln!(out, "findings ({rows} shown of {total}):");
    } else {
        let _ = writeln!(out, "findings ({rows} shown):");
    }
    print_findings_table(&mut out, &result.findings, rows, cfg);

    if cfg.verbose {
        let _ = writeln!(out);
        for finding in result.findings.iter().take(rows) {
            let _ = writeln!(out, "{}:", finding.id);
            let _ = writeln!(out, "  - controls: {}", finding.controls);
            let _ = writeln!(out, "  - evidence: {}", finding.evidence_snippet);
            let _ = writeln!(out, "  - citations: {}", finding.citations.join("; "));
        }
    }
}

fn print_findings_table(out: &mut dyn Write, findings: &[Finding], rows: usize, cfg: &UiConfig) {
    let label_geo = "Geo";
    let label_law = "Law";
    let label_verdict = "Label";
    let label_sev = "Sev";
    let label_conf = "Conf";
    let label_reasoning = "Reasoning";

    let geo_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&f.geo))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_geo));
    let law_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&view::truncate_text(&f.law, 40)))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_law));
    let verdict_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(f.label.as_str()))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_verdict));
    let sev_w = visible_width_ansi(label_sev).max(4);
    let conf_w = visible_width_ansi(label_conf).max(4);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        pad_end_display(label_geo, geo_w),
        pad_end_display(label_law, law_w),
        pad_end_display(label_verdict, verdict_w),
        pad_end_display(label_sev, sev_w),
        pad_start_display(label_conf, conf_w),
        label_reasoning
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        "-".repeat(geo_w),
        "-".repeat(law_w),
        "-".repeat(verdict_w),
        "-".repeat(sev_w),
        "-".repeat(conf_w),
        "-".repeat(9)
    );

    for finding in findings.iter().take(rows) {
        let geo = pad_end_display(&finding.geo, geo_w);
        let law = pad_end_display(&view::truncate_text(&finding.law, 40), law_w);
        let verdict = pad_end_ansi(&format_label(finding.label, cfg.color), verdict_w);
        let sev = pad_end_ansi(&format_severity(finding.severity, cfg.color), sev_w);
        let conf = pad_start_display(&format!("{}%", finding.confidence), conf_w);
        let reasoning = view::truncate_text(&finding.reasoning, cfg.truncate_chars);
        let _ = writeln!(out, "{geo}  {law}  {verdict}  {sev}  {conf}  {reasoning}");
    }
}

pub fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::High => "31",
        Severity::Med => "33",
        Severity::Ok => "32",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

pub fn format_label(label: ComplianceLabel, color: bool) -> String {
    let s = label.as_str();
    if !color {
        return s.to_string();
    }

    let code = match label {
        ComplianceLabel::Compliant => "32",
        ComplianceLabel::Prohibited => "31",
        ComplianceLabel::NeedsControls => "33",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_sequences_do_not_count_toward_width() {
        let plain = format_severity(Severity::High, false);
        let colored = format_severity(Severity::High, true);
        assert_eq!(visible_width_ansi(&plain), 4);
        assert_eq!(visible_width_ansi(&colored), 4);
        assert!(colored.contains("\x1b[31m"));
    }

    #[test]
    fn padding_respects_display_width() {
        assert_eq!(pad_end_display("ab", 4), "ab  ");
        assert_eq!(pad_start_display("ab", 4), "  ab");
        assert_eq!(pad_end_display("abcd", 2), "abcd");
    }
}
