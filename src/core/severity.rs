use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "MED")]
    Med,
    #[serde(rename = "HIGH")]
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Med, Severity::Ok];

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Med => "MED",
            Severity::Ok => "OK",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Severity::High),
            "MED" => Ok(Severity::Med),
            "OK" => Ok(Severity::Ok),
            _ => Err(format!("invalid severity: {s} (expected HIGH|MED|OK)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_high_over_med_over_ok() {
        assert!(Severity::High > Severity::Med);
        assert!(Severity::Med > Severity::Ok);
    }

    #[test]
    fn severity_wire_strings_are_fixed() {
        assert_eq!(
            serde_json::to_string(&Severity::High).expect("serialize"),
            "\"HIGH\""
        );
        assert_eq!(
            serde_json::to_string(&Severity::Med).expect("serialize"),
            "\"MED\""
        );
        assert_eq!(
            serde_json::to_string(&Severity::Ok).expect("serialize"),
            "\"OK\""
        );
    }

    #[test]
    fn severity_parses_case_insensitive() {
        assert_eq!("high".parse::<Severity>(), Ok(Severity::High));
        assert_eq!(" MED ".parse::<Severity>(), Ok(Severity::Med));
        assert!("R1".parse::<Severity>().is_err());
    }
}
