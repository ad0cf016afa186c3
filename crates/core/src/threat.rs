use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RiskLevel;

/// Source label stamped on threats created by the background analysis job.
pub const ANALYSIS_JOB_SOURCE: &str = "ThreatAnalysisJob";

/// Pattern category a detection belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatType {
    MassDataRead,
    PermissionChange,
    OffHoursAccess,
    SuspiciousLogin,
    DataExfiltration,
}

impl ThreatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MassDataRead => "MASS_DATA_READ",
            Self::PermissionChange => "PERMISSION_CHANGE",
            Self::OffHoursAccess => "OFF_HOURS_ACCESS",
            Self::SuspiciousLogin => "SUSPICIOUS_LOGIN",
            Self::DataExfiltration => "DATA_EXFILTRATION",
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MASS_DATA_READ" => Ok(Self::MassDataRead),
            "PERMISSION_CHANGE" => Ok(Self::PermissionChange),
            "OFF_HOURS_ACCESS" => Ok(Self::OffHoursAccess),
            "SUSPICIOUS_LOGIN" => Ok(Self::SuspiciousLogin),
            "DATA_EXFILTRATION" => Ok(Self::DataExfiltration),
            other => Err(format!("unknown threat type: {}", other)),
        }
    }
}

/// A persisted detection: one suspicious pattern attributed to one user.
///
/// Created by the analysis job (deterministic id) or through the API
/// (random id); mutated only by `resolve`; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderThreat {
    pub id: String,
    pub user_id: String,
    pub threat_type: ThreatType,
    pub risk_level: RiskLevel,
    pub description: String,

    /// Detector-specific structured detail (see `ThreatMetadata`).
    pub metadata: serde_json::Value,

    /// Source event ids that triggered the detection, in detection order.
    pub correlated_event_ids: Vec<i64>,
    pub ip_address: Option<String>,
    pub source: String,

    /// Set at creation, immutable afterwards.
    pub detected_at: DateTime<Utc>,

    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}

impl InsiderThreat {
    /// Marks the threat resolved. The resolution fields are written once;
    /// a second call is rejected.
    pub fn resolve(
        &mut self,
        resolved_by: &str,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), String> {
        if self.is_resolved {
            return Err(format!("threat {} is already resolved", self.id));
        }
        self.is_resolved = true;
        self.resolved_at = Some(at);
        self.resolved_by = Some(resolved_by.to_string());
        self.resolution_notes = notes;
        Ok(())
    }
}
