use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceLabel {
    Compliant,
    Prohibited,
    #[serde(rename = "Needs Controls")]
    NeedsControls,
}

impl ComplianceLabel {
    pub const ALL: [ComplianceLabel; 3] = [
        ComplianceLabel::Compliant,
        ComplianceLabel::Prohibited,
        ComplianceLabel::NeedsControls,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ComplianceLabel::Compliant => "Compliant",
            ComplianceLabel::Prohibited => "Prohibited",
            ComplianceLabel::NeedsControls => "Needs Controls",
        }
    }
}

impl fmt::Display for ComplianceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Compliant" => Ok(ComplianceLabel::Compliant),
            "Prohibited" => Ok(ComplianceLabel::Prohibited),
            "Needs Controls" => Ok(ComplianceLabel::NeedsControls),
            _ => Err(format!(
                "invalid label: {s} (expected Compliant|Prohibited|Needs Controls)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_wire_strings_are_fixed() {
        assert_eq!(
            serde_json::to_string(&ComplianceLabel::NeedsControls).expect("serialize"),
            "\"Needs Controls\""
        );
        assert_eq!(
            serde_json::to_string(&ComplianceLabel::Compliant).expect("serialize"),
            "\"Compliant\""
        );
    }

    #[test]
    fn label_round_trips_through_from_str() {
        for label in ComplianceLabel::ALL {
            assert_eq!(label.as_str().parse::<ComplianceLabel>(), Ok(label));
        }
    }
}
