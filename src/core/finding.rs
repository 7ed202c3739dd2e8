use crate::core::{ComplianceLabel, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    Confirm,
    Reject,
    #[serde(rename = "Needs follow-up")]
    NeedsFollowUp,
}

impl ReviewStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Confirm => "Confirm",
            ReviewStatus::Reject => "Reject",
            ReviewStatus::NeedsFollowUp => "Needs follow-up",
        }
    }

    pub const fn next(self) -> Self {
        match self {
            ReviewStatus::Confirm => ReviewStatus::Reject,
            ReviewStatus::Reject => ReviewStatus::NeedsFollowUp,
            ReviewStatus::NeedsFollowUp => ReviewStatus::Confirm,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Confirm" => Ok(ReviewStatus::Confirm),
            "Reject" => Ok(ReviewStatus::Reject),
            "Needs follow-up" => Ok(ReviewStatus::NeedsFollowUp),
            _ => Err(format!(
                "invalid review status: {s} (expected Confirm|Reject|Needs follow-up)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub geo: String,
    pub law: String,
    pub label: ComplianceLabel,
    pub severity: Severity,
    pub confidence: u8,
    pub controls: String,
    pub reasoning: String,
    pub evidence_snippet: String,
    pub citations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewStatus>,
}

impl Finding {
    // Absent review means the finding has not been triaged; the UI treats
    // that as Confirm.
    pub fn effective_review(&self) -> ReviewStatus {
        self.review.unwrap_or(ReviewStatus::Confirm)
    }
}
