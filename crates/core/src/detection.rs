use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RiskLevel, ThreatType};

/// Which login abuse signature a SUSPICIOUS_LOGIN detection matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginPattern {
    CredentialCompromise,
    BruteForce,
}

/// Structured per-type detail carried by a detection, one payload shape
/// per threat type. Serialized into the threat's `metadata` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreatMetadata {
    MassDataRead {
        event_count: usize,
        /// Up to five matched descriptions, in batch order.
        sample_descriptions: Vec<String>,
        critical_threshold: usize,
        high_threshold: usize,
        medium_threshold: usize,
        low_threshold: usize,
        analysis_time: DateTime<Utc>,
    },
    OffHoursAccess {
        event_count: usize,
        critical_threshold: usize,
        high_threshold: usize,
        medium_threshold: usize,
        analysis_time: DateTime<Utc>,
    },
    PermissionChange {
        event_count: usize,
        critical_threshold: usize,
        high_threshold: usize,
        medium_threshold: usize,
        analysis_time: DateTime<Utc>,
    },
    SuspiciousLogin {
        failed_attempts: usize,
        success_observed: bool,
        pattern: LoginPattern,
        analysis_time: DateTime<Utc>,
    },
}

impl ThreatMetadata {
    /// JSON form stored on the persisted threat.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Transient detector output; the analysis job turns it into an
/// `InsiderThreat`. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub threat_type: ThreatType,
    pub risk_level: RiskLevel,
    pub description: String,
    pub metadata: ThreatMetadata,
    pub correlated_event_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serializes_with_kind_tag() {
        let meta = ThreatMetadata::SuspiciousLogin {
            failed_attempts: 4,
            success_observed: true,
            pattern: LoginPattern::CredentialCompromise,
            analysis_time: Utc::now(),
        };
        let value = meta.to_value();
        assert_eq!(value["kind"], "suspicious_login");
        assert_eq!(value["failed_attempts"], 4);
        assert_eq!(value["pattern"], "credential_compromise");
    }
}
