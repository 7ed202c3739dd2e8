use std::collections::HashSet;

use crate::core::{ComplianceLabel, Finding, ReviewStatus, Severity};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_TRUNCATE_CHARS: usize = 100;

// UI-local filter/search/page state for the findings table. Created when a
// result arrives and reset wholesale when it is replaced; an empty selection
// set in any dimension means "no filter", not "no results".
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub search: String,
    pub geos: HashSet<String>,
    pub labels: HashSet<ComplianceLabel>,
    pub severities: HashSet<Severity>,
    pub page: usize,
    pub expanded: HashSet<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn has_active_filters(&self) -> bool {
        !self.search.trim().is_empty()
            || !self.geos.is_empty()
            || !self.labels.is_empty()
            || !self.severities.is_empty()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn toggle_geo(&mut self, geo: &str) {
        if !self.geos.remove(geo) {
            self.geos.insert(geo.to_string());
        }
        self.page = 1;
    }

    pub fn toggle_label(&mut self, label: ComplianceLabel) {
        if !self.labels.remove(&label) {
            self.labels.insert(label);
        }
        self.page = 1;
    }

    pub fn toggle_severity(&mut self, severity: Severity) {
        if !self.severities.remove(&severity) {
            self.severities.insert(severity);
        }
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.geos.clear();
        self.labels.clear();
        self.severities.clear();
        self.page = 1;
    }

    pub fn toggle_expanded(&mut self, finding_id: &str) {
        if !self.expanded.remove(finding_id) {
            self.expanded.insert(finding_id.to_string());
        }
    }

    pub fn is_expanded(&self, finding_id: &str) -> bool {
        self.expanded.contains(finding_id)
    }
}

#[derive(Debug, Clone)]
pub struct VisiblePage<'a> {
    pub findings: Vec<&'a Finding>,
    pub page: usize,
    pub total_pages: usize,
    pub filtered_len: usize,
    pub start_index: usize,
}

impl VisiblePage<'_> {
    // 1-based display range for a "showing A-B of C" line; (0, 0) when empty.
    pub fn display_range(&self) -> (usize, usize) {
        if self.findings.is_empty() {
            return (0, 0);
        }
        (self.start_index + 1, self.start_index + self.findings.len())
    }
}

fn matches(finding: &Finding, filters: &FilterState) -> bool {
    let term = filters.search.trim().to_lowercase();
    let matches_search = term.is_empty()
        || finding.law.to_lowercase().contains(&term)
        || finding.reasoning.to_lowercase().contains(&term);

    let matches_geo = filters.geos.is_empty() || filters.geos.contains(&finding.geo);
    let matches_label = filters.labels.is_empty() || filters.labels.contains(&finding.label);
    let matches_severity =
        filters.severities.is_empty() || filters.severities.contains(&finding.severity);

    matches_search && matches_geo && matches_label && matches_severity
}

pub fn filtered_indices(findings: &[Finding], filters: &FilterState) -> Vec<usize> {
    findings
        .iter()
        .enumerate()
        .filter(|(_, f)| matches(f, filters))
        .map(|(i, _)| i)
        .collect()
}

// Input order is preserved; the page number is clamped into range rather
// than trusted, so a stale page never slices past the end.
pub fn visible_page<'a>(
    findings: &'a [Finding],
    filters: &FilterState,
    page_size: usize,
) -> VisiblePage<'a> {
    let page_size = page_size.max(1);
    let filtered: Vec<&Finding> = findings.iter().filter(|f| matches(f, filters)).collect();

    let filtered_len = filtered.len();
    let total_pages = filtered_len.div_ceil(page_size).max(1);
    let page = filters.page.clamp(1, total_pages);
    let start_index = (page - 1) * page_size;

    let findings = filtered
        .into_iter()
        .skip(start_index)
        .take(page_size)
        .collect();

    VisiblePage {
        findings,
        page,
        total_pages,
        filtered_len,
        start_index,
    }
}

pub fn next_page(filters: &mut FilterState, total_pages: usize) {
    filters.page = (filters.page + 1).min(total_pages.max(1));
}

pub fn prev_page(filters: &mut FilterState) {
    filters.page = filters.page.saturating_sub(1).max(1);
}

// Updates exactly one finding; filter state and every other row are
// untouched. Returns false when the id is unknown.
pub fn set_review(findings: &mut [Finding], finding_id: &str, status: ReviewStatus) -> bool {
    match findings.iter_mut().find(|f| f.id == finding_id) {
        Some(finding) => {
            finding.review = Some(status);
            true
        }
        None => false,
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, geo: &str, law: &str, label: ComplianceLabel, sev: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            geo: geo.to_string(),
            law: law.to_string(),
            label,
            severity: sev,
            confidence: 80,
            controls: "controls".to_string(),
            reasoning: format!("reasoning for {law}"),
            evidence_snippet: "snippet".to_string(),
            citations: vec!["cite-1".to_string()],
            review: None,
        }
    }

    fn sample_findings(n: usize) -> Vec<Finding> {
        (0..n)
            .map(|i| {
                let geo = if i % 2 == 0 { "EU" } else { "US-CA" };
                let sev = match i % 3 {
                    0 => Severity::High,
                    1 => Severity::Med,
                    _ => Severity::Ok,
                };
                let label = match i % 3 {
                    0 => ComplianceLabel::Prohibited,
                    1 => ComplianceLabel::NeedsControls,
                    _ => ComplianceLabel::Compliant,
                };
                finding(&format!("f-{i}"), geo, &format!("Law {i}"), label, sev)
            })
            .collect()
    }

    #[test]
    fn fifteen_findings_paginate_into_ten_and_five() {
        let findings = sample_findings(15);
        let mut filters = FilterState::new();

        let page1 = visible_page(&findings, &filters, 10);
        assert_eq!(page1.total_pages, 2);
        assert_eq!(page1.findings.len(), 10);
        assert_eq!(page1.display_range(), (1, 10));
        assert_eq!(page1.findings[0].id, "f-0");
        assert_eq!(page1.findings[9].id, "f-9");

        next_page(&mut filters, page1.total_pages);
        let page2 = visible_page(&findings, &filters, 10);
        assert_eq!(page2.page, 2);
        assert_eq!(page2.findings.len(), 5);
        assert_eq!(page2.display_range(), (11, 15));
        assert_eq!(page2.findings[0].id, "f-10");
        assert_eq!(page2.findings[4].id, "f-14");
    }

    #[test]
    fn pages_partition_filtered_set_without_overlap_or_gap() {
        let findings = sample_findings(27);
        let mut filters = FilterState::new();
        filters.toggle_geo("EU");
        filters.toggle_severity(Severity::High);
        filters.toggle_severity(Severity::Med);

        let expected: Vec<&str> = findings
            .iter()
            .filter(|f| f.geo == "EU" && f.severity != Severity::Ok)
            .map(|f| f.id.as_str())
            .collect();

        let total_pages = visible_page(&findings, &filters, 4).total_pages;
        let mut seen = Vec::new();
        for page in 1..=total_pages {
            filters.page = page;
            let visible = visible_page(&findings, &filters, 4);
            seen.extend(visible.findings.iter().map(|f| f.id.as_str()));
        }

        assert_eq!(seen, expected);
    }

    #[test]
    fn empty_selection_equals_all_values_selected() {
        let findings = sample_findings(12);

        let none_selected = FilterState::new();
        let mut all_selected = FilterState::new();
        for sev in Severity::ALL {
            all_selected.toggle_severity(sev);
        }
        for label in ComplianceLabel::ALL {
            all_selected.toggle_label(label);
        }
        all_selected.toggle_geo("EU");
        all_selected.toggle_geo("US-CA");

        let a = filtered_indices(&findings, &none_selected);
        let b = filtered_indices(&findings, &all_selected);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn search_matches_law_and_reasoning_only() {
        let mut findings = sample_findings(3);
        findings[0].law = "Digital Services Act".to_string();
        findings[0].reasoning = "nothing of note".to_string();
        findings[1].law = "Other".to_string();
        findings[1].reasoning = "relates to digital services".to_string();
        findings[2].law = "Other".to_string();
        findings[2].reasoning = "nothing".to_string();
        findings[2].controls = "digital controls".to_string();
        findings[2].evidence_snippet = "digital evidence".to_string();

        let mut filters = FilterState::new();
        filters.set_search("DIGITAL");

        let visible = visible_page(&findings, &filters, 10);
        let ids: Vec<&str> = visible.findings.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f-0", "f-1"]);
    }

    #[test]
    fn filter_dimensions_are_anded() {
        let findings = sample_findings(12);
        let mut filters = FilterState::new();
        filters.toggle_geo("EU");
        filters.toggle_severity(Severity::High);

        let visible = visible_page(&findings, &filters, 100);
        assert!(!visible.findings.is_empty());
        for f in &visible.findings {
            assert_eq!(f.geo, "EU");
            assert_eq!(f.severity, Severity::High);
        }
    }

    #[test]
    fn search_and_filter_mutations_reset_page() {
        let mut filters = FilterState::new();
        filters.page = 3;
        filters.set_search("act");
        assert_eq!(filters.page, 1);

        filters.page = 3;
        filters.toggle_geo("EU");
        assert_eq!(filters.page, 1);

        filters.page = 3;
        filters.toggle_label(ComplianceLabel::Prohibited);
        assert_eq!(filters.page, 1);

        filters.page = 3;
        filters.toggle_severity(Severity::Ok);
        assert_eq!(filters.page, 1);

        filters.page = 3;
        filters.clear_filters();
        assert_eq!(filters.page, 1);
    }

    #[test]
    fn zero_match_search_yields_empty_single_page() {
        let findings = sample_findings(15);
        let mut filters = FilterState::new();
        filters.set_search("no such law anywhere");

        let visible = visible_page(&findings, &filters, 10);
        assert!(visible.findings.is_empty());
        assert_eq!(visible.total_pages, 1);
        assert_eq!(visible.page, 1);
        assert_eq!(visible.filtered_len, 0);
        assert_eq!(visible.display_range(), (0, 0));
    }

    #[test]
    fn stale_page_is_clamped_not_overrun() {
        let findings = sample_findings(15);
        let mut filters = FilterState::new();
        filters.page = 9;

        let visible = visible_page(&findings, &filters, 10);
        assert_eq!(visible.page, 2);
        assert_eq!(visible.findings.len(), 5);
    }

    #[test]
    fn page_navigation_clamps_at_both_ends() {
        let mut filters = FilterState::new();
        prev_page(&mut filters);
        assert_eq!(filters.page, 1);

        next_page(&mut filters, 2);
        assert_eq!(filters.page, 2);
        next_page(&mut filters, 2);
        assert_eq!(filters.page, 2);

        prev_page(&mut filters);
        assert_eq!(filters.page, 1);
    }

    #[test]
    fn set_review_touches_exactly_one_finding() {
        let mut findings = sample_findings(5);
        let mut filters = FilterState::new();
        filters.toggle_geo("EU");
        filters.page = 1;
        let before = filters.clone();

        assert!(set_review(&mut findings, "f-2", ReviewStatus::Reject));

        assert_eq!(findings[2].review, Some(ReviewStatus::Reject));
        for (i, f) in findings.iter().enumerate() {
            if i != 2 {
                assert_eq!(f.review, None);
                assert_eq!(f.effective_review(), ReviewStatus::Confirm);
            }
        }
        assert_eq!(filters.page, before.page);
        assert_eq!(filters.geos, before.geos);
    }

    #[test]
    fn set_review_unknown_id_is_a_noop() {
        let mut findings = sample_findings(3);
        assert!(!set_review(&mut findings, "missing", ReviewStatus::Reject));
        assert!(findings.iter().all(|f| f.review.is_none()));
    }

    #[test]
    fn review_cycle_covers_all_three_states() {
        let start = ReviewStatus::Confirm;
        assert_eq!(start.next(), ReviewStatus::Reject);
        assert_eq!(start.next().next(), ReviewStatus::NeedsFollowUp);
        assert_eq!(start.next().next().next(), start);
    }

    #[test]
    fn truncate_keeps_short_text_unchanged() {
        let short = "a".repeat(100);
        assert_eq!(truncate_text(&short, 100), short);
        assert_eq!(truncate_text("", 100), "");
    }

    #[test]
    fn truncate_cuts_long_text_at_char_boundary() {
        let long = "é".repeat(120);
        let truncated = truncate_text(&long, 100);
        assert_eq!(truncated.chars().count(), 103);
        assert!(truncated.ends_with("..."));
        assert!(truncated.starts_with('é'));
    }

    #[test]
    fn expansion_toggle_is_per_finding() {
        let mut filters = FilterState::new();
        filters.toggle_expanded("f-1");
        assert!(filters.is_expanded("f-1"));
        assert!(!filters.is_expanded("f-2"));

        filters.toggle_expanded("f-1");
        assert!(!filters.is_expanded("f-1"));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut filters = FilterState::new();
        filters.set_search("act");
        filters.toggle_geo("EU");
        filters.toggle_expanded("f-0");
        filters.page = 4;

        filters.reset();
        assert!(!filters.has_active_filters());
        assert_eq!(filters.page, 1);
        assert!(filters.expanded.is_empty());
    }
}
