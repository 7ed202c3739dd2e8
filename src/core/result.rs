use crate::core::{Finding, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    #[serde(rename = "HIGH")]
    pub high: u32,
    #[serde(rename = "MED")]
    pub med: u32,
    #[serde(rename = "OK")]
    pub ok: u32,
}

impl SeveritySummary {
    pub fn count_of(&self, severity: Severity) -> u32 {
        match severity {
            Severity::High => self.high,
            Severity::Med => self.med,
            Severity::Ok => self.ok,
        }
    }

    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::High => summary.high += 1,
                Severity::Med => summary.med += 1,
                Severity::Ok => summary.ok += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub feature_id: String,
    pub detected_geos: Vec<String>,
    pub findings: Vec<Finding>,
    pub summary: SeveritySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl AnalysisResult {
    // The backend is supposed to keep summary counts in step with the
    // findings list; the client renders both without reconciling them.
    pub fn summary_matches_findings(&self) -> bool {
        self.summary == SeveritySummary::from_findings(&self.findings)
    }
}
