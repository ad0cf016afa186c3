use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity ladder shared by threats and risk profiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Ordering key: LOW < MEDIUM < HIGH < CRITICAL.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// HIGH and CRITICAL profiles surface in the high-risk listing.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown risk level: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(RiskLevel::Low.rank() < RiskLevel::Medium.rank());
        assert!(RiskLevel::Medium.rank() < RiskLevel::High.rank());
        assert!(RiskLevel::High.rank() < RiskLevel::Critical.rank());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("critical".parse::<RiskLevel>(), Ok(RiskLevel::Critical));
        assert_eq!("High".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let back: RiskLevel = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(back, RiskLevel::Critical);
    }
}
