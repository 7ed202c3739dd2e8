use crate::core::{AnalysisResult, ComplianceLabel, Finding, Severity, SeveritySummary};

// Built-in demo result used when the client runs in mock mode. Content is
// illustrative only; the shape is the wire contract.
pub fn sample_result() -> AnalysisResult {
    let findings = vec![
        finding(
            "f-001",
            "EU",
            "Digital Services Act (DSA)",
            ComplianceLabel::NeedsControls,
            Severity::High,
            92,
            "Provide a non-profiling recommender option; publish recommender parameters in terms of service.",
            "The feature personalizes the minor-facing feed using behavioral signals. DSA Article 38 requires at \
             least one recommender option not based on profiling for VLOPs, and Article 27 requires disclosure of \
             the main recommender parameters.",
            "\"personalized For-You feed ranked by engagement history\"",
            &["DSA Art. 27", "DSA Art. 38"],
        ),
        finding(
            "f-002",
            "EU",
            "General Data Protection Regulation (GDPR)",
            ComplianceLabel::NeedsControls,
            Severity::High,
            88,
            "Run a DPIA; gate behavioral profiling of users under 16 behind verified parental consent.",
            "Engagement-history profiling of minors is high-risk processing. GDPR Articles 6 and 8 constrain the \
             lawful basis for processing children's data, and Recital 38 calls out profiling of children.",
            "\"engagement history\" combined with \"age 13-17 cohort\"",
            &["GDPR Art. 6", "GDPR Art. 8", "GDPR Recital 38"],
        ),
        finding(
            "f-003",
            "US-CA",
            "California SB 976 (Protecting Our Kids from Social Media Addiction Act)",
            ComplianceLabel::Prohibited,
            Severity::High,
            84,
            "Default minors to a chronological feed; obtain verifiable parental consent before any addictive feed.",
            "SB 976 prohibits serving an \"addictive feed\" to a known minor absent parental consent. The described \
             default-on personalization for all users conflicts with that default-off requirement.",
            "\"default-on personalization for all signed-in users\"",
            &["Cal. SB 976 \u{00a7}27001"],
        ),
        finding(
            "f-004",
            "US-UT",
            "Utah Social Media Regulation Act",
            ComplianceLabel::NeedsControls,
            Severity::Med,
            71,
            "Disable engagement-driven ranking during curfew hours for Utah minors unless parental consent is on file.",
            "Utah requires parental consent for minor accounts and restricts design features that cause excessive \
             use. Autoplay plus engagement ranking likely qualifies.",
            "\"autoplay next video\"",
            &["Utah Code \u{00a7}13-63-102"],
        ),
        finding(
            "f-005",
            "US-FL",
            "Florida HB 3 (Online Protections for Minors)",
            ComplianceLabel::NeedsControls,
            Severity::Med,
            69,
            "Terminate accounts of users under 14 on request; apply anonymous age verification at sign-up.",
            "HB 3 bars accounts for under-14s on platforms with addictive features and requires age verification. \
             The feature's infinite scroll is an enumerated addictive pattern.",
            "\"infinite scroll\"",
            &["Fla. HB 3 (2024)"],
        ),
        finding(
            "f-006",
            "BR",
            "Lei Geral de Prote\u{00e7}\u{00e3}o de Dados (LGPD)",
            ComplianceLabel::NeedsControls,
            Severity::Med,
            66,
            "Process minors' data in their best interest; collect parental consent for profiling under Article 14.",
            "LGPD Article 14 requires that processing of children's data be performed in their best interest and \
             with specific consent from a parent or guardian.",
            "\"age 13-17 cohort\"",
            &["LGPD Art. 14"],
        ),
        finding(
            "f-007",
            "SG",
            "Personal Data Protection Act (PDPA)",
            ComplianceLabel::Compliant,
            Severity::Ok,
            75,
            "None required beyond existing notice-and-consent flow.",
            "The described notice-and-consent flow satisfies PDPA consent obligations for this processing purpose; \
             no minor-specific prohibition applies.",
            "\"consent screen shown at onboarding\"",
            &["PDPA ss. 13-15"],
        ),
        finding(
            "f-008",
            "CA",
            "Personal Information Protection and Electronic Documents Act (PIPEDA)",
            ComplianceLabel::Compliant,
            Severity::Ok,
            72,
            "Document the purpose limitation assessment; no product change required.",
            "Profiling for feed ranking is a purpose a reasonable person would consider appropriate given the \
             disclosed terms; meaningful-consent guidance is met by the existing flow.",
            "\"disclosed in onboarding terms\"",
            &["PIPEDA Principle 4.3"],
        ),
    ];

    let summary = SeveritySummary::from_findings(&findings);
    let detected_geos = vec![
        "EU".to_string(),
        "US-CA".to_string(),
        "US-UT".to_string(),
        "US-FL".to_string(),
        "BR".to_string(),
        "SG".to_string(),
        "CA".to_string(),
    ];

    AnalysisResult {
        feature_id: "demo-0001".to_string(),
        detected_geos,
        findings,
        summary,
        latency_ms: Some(1280),
    }
}

fn finding(
    id: &str,
    geo: &str,
    law: &str,
    label: ComplianceLabel,
    severity: Severity,
    confidence: u8,
    controls: &str,
    reasoning: &str,
    evidence_snippet: &str,
    citations: &[&str],
) -> Finding {
    Finding {
        id: id.to_string(),
        geo: geo.to_string(),
        law: law.to_string(),
        label,
        severity,
        confidence,
        controls: controls.to_string(),
        reasoning: reasoning.to_string(),
        evidence_snippet: evidence_snippet.to_string(),
        citations: citations.iter().map(|c| c.to_string()).collect(),
        review: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_summary_matches_findings() {
        let result = sample_result();
        assert!(result.summary_matches_findings());
        assert_eq!(
            result.summary.high + result.summary.med + result.summary.ok,
            result.findings.len() as u32
        );
    }

    #[test]
    fn sample_covers_all_severities_and_labels() {
        let result = sample_result();
        for sev in Severity::ALL {
            assert!(result.findings.iter().any(|f| f.severity == sev));
        }
        for label in ComplianceLabel::ALL {
            assert!(result.findings.iter().any(|f| f.label == label));
        }
    }

    #[test]
    fn sample_geos_cover_every_finding_geo() {
        let result = sample_result();
        for f in &result.findings {
            assert!(result.detected_geos.contains(&f.geo), "missing geo {}", f.geo);
        }
    }

    #[test]
    fn sample_findings_start_untriaged() {
        let result = sample_result();
        assert!(result.findings.iter().all(|f| f.review.is_none()));
    }
}
