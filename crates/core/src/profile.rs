use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InsiderThreat, RiskLevel, ThreatType};

/// Upper bound on the per-user activity log, most recent first.
pub const RECENT_ACTIVITY_CAP: usize = 20;

/// One entry in a profile's bounded activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentActivity {
    pub threat_type: ThreatType,
    pub detected_at: DateTime<Utc>,
    pub risk_level: RiskLevel,
}

/// Running per-user aggregate of threat history and login failures.
///
/// The counters are source-of-truth for scoring; `risk_score` and
/// `current_risk_level` are cached derivations and never set by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRiskProfile {
    pub user_id: String,
    pub risk_score: i64,
    pub current_risk_level: RiskLevel,

    pub total_threats_detected: u32,
    pub critical_threats_count: u32,
    pub high_threats_count: u32,
    pub medium_threats_count: u32,
    pub low_threats_count: u32,

    pub failed_login_attempts: u32,
    pub last_threat_detected_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,

    /// Most-recent-first, truncated to `RECENT_ACTIVITY_CAP`.
    #[serde(default)]
    pub recent_activities: Vec<RecentActivity>,
}

impl UserRiskProfile {
    /// Fresh profile: zeroed counters, level LOW.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            risk_score: 0,
            current_risk_level: RiskLevel::Low,
            total_threats_detected: 0,
            critical_threats_count: 0,
            high_threats_count: 0,
            medium_threats_count: 0,
            low_threats_count: 0,
            failed_login_attempts: 0,
            last_threat_detected_at: None,
            last_login_at: None,
            recent_activities: Vec::new(),
        }
    }

    /// Folds one new threat into the counters and the activity log.
    /// Must be applied exactly once per threat.
    pub fn record_threat(&mut self, threat: &InsiderThreat) {
        self.total_threats_detected += 1;
        match threat.risk_level {
            RiskLevel::Critical => self.critical_threats_count += 1,
            RiskLevel::High => self.high_threats_count += 1,
            RiskLevel::Medium => self.medium_threats_count += 1,
            RiskLevel::Low => self.low_threats_count += 1,
        }
        self.last_threat_detected_at = Some(threat.detected_at);
        self.recent_activities.insert(
            0,
            RecentActivity {
                threat_type: threat.threat_type,
                detected_at: threat.detected_at,
                risk_level: threat.risk_level,
            },
        );
        self.recent_activities.truncate(RECENT_ACTIVITY_CAP);
    }

    /// Success resets the failure streak and bumps `last_login_at`;
    /// failure extends the streak.
    pub fn record_login(&mut self, success: bool, at: DateTime<Utc>) {
        if success {
            self.failed_login_attempts = 0;
            self.last_login_at = Some(at);
        } else {
            self.failed_login_attempts += 1;
        }
    }

    /// Count for one severity bucket.
    pub fn level_count(&self, level: RiskLevel) -> u32 {
        match level {
            RiskLevel::Critical => self.critical_threats_count,
            RiskLevel::High => self.high_threats_count,
            RiskLevel::Medium => self.medium_threats_count,
            RiskLevel::Low => self.low_threats_count,
        }
    }
}
