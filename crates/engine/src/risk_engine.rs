//! Risk profile engine.
//!
//! Owns every write to `UserRiskProfile`. Profile updates are
//! read-modify-write (load, fold, rescore, save), so writes for the same
//! user are serialized through a per-user async lock; concurrent updates
//! for different users do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siem_core::{EngineError, InsiderThreat, RiskLevel, ThreatType, UserRiskProfile};

use crate::scoring::rescore_profile;
use crate::store::{ProfileStore, SiemStore, ThreatStore};

const RECENT_THREATS_IN_ANALYSIS: usize = 10;

/// One-per-user async locks, created on first use.
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(user_id.to_string()).or_default().clone()
    }
}

/// Compact threat view embedded in a risk analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatBrief {
    pub id: String,
    pub threat_type: ThreatType,
    pub risk_level: RiskLevel,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}

impl From<&InsiderThreat> for ThreatBrief {
    fn from(threat: &InsiderThreat) -> Self {
        Self {
            id: threat.id.clone(),
            threat_type: threat.threat_type,
            risk_level: threat.risk_level,
            detected_at: threat.detected_at,
            description: threat.description.clone(),
        }
    }
}

/// Counter summary straight off the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatSummary {
    pub total: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// Per-pattern counts pulled from the threat store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPatterns {
    pub off_hours_access_count: u64,
    pub mass_data_read_count: u64,
    pub permission_change_count: u64,
    pub failed_login_attempts: u32,
}

/// The assembled answer to "how risky is this user right now".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub user_id: String,
    pub risk_score: i64,
    pub risk_level: RiskLevel,
    pub threat_summary: ThreatSummary,
    pub recent_threats: Vec<ThreatBrief>,
    pub behavior_patterns: BehaviorPatterns,
    pub recommendation: String,
}

/// Action guidance keyed off the current risk level.
pub fn recommendation_for(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => {
            "Immediate action required: suspend user access pending a security investigation"
        }
        RiskLevel::High => {
            "Schedule a security review with the user and audit their recent account activity"
        }
        RiskLevel::Medium => "Monitor user activity closely for further escalation",
        RiskLevel::Low => "No action required at this time",
    }
}

pub struct RiskEngine {
    store: Arc<dyn SiemStore>,
    locks: UserLocks,
}

impl RiskEngine {
    pub fn new(store: Arc<dyn SiemStore>) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
        }
    }

    /// Folds one stored threat into its user's profile and rescores.
    ///
    /// Must be called exactly once per threat; the caller owns that
    /// guarantee (the analysis job keys it off threat insertion).
    pub async fn update_user_risk_after_threat(
        &self,
        user_id: &str,
        threat_id: &str,
    ) -> Result<UserRiskProfile, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let threat = self
            .store
            .find_threat(threat_id)?
            .ok_or_else(|| EngineError::not_found(format!("threat {}", threat_id)))?;

        let mut profile = self
            .store
            .find_profile(user_id)?
            .unwrap_or_else(|| UserRiskProfile::new(user_id));
        profile.record_threat(&threat);
        rescore_profile(&mut profile, Utc::now());
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Records a login outcome and rescores. Creates the profile on
    /// first sight of the user.
    pub async fn update_user_login_info(
        &self,
        user_id: &str,
        success: bool,
    ) -> Result<UserRiskProfile, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut profile = self
            .store
            .find_profile(user_id)?
            .unwrap_or_else(|| UserRiskProfile::new(user_id));
        profile.record_login(success, Utc::now());
        rescore_profile(&mut profile, Utc::now());
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Re-runs scoring against the profile's current counters and
    /// persists. Does not re-scan threat history.
    pub async fn recalculate_user_risk(
        &self,
        user_id: &str,
    ) -> Result<UserRiskProfile, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut profile = self
            .store
            .find_profile(user_id)?
            .ok_or_else(|| EngineError::not_found(format!("profile for user {}", user_id)))?;
        rescore_profile(&mut profile, Utc::now());
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<UserRiskProfile>, EngineError> {
        self.store.find_profile(user_id)
    }

    pub fn all_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        self.store.all_profiles()
    }

    /// Profiles at HIGH or CRITICAL, highest score first.
    pub fn high_risk_users(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        self.store.high_risk_profiles()
    }

    /// Assembles the full picture for one user: score, counters, the ten
    /// most recent threats, behavior-pattern counts, and a
    /// recommendation.
    pub fn user_risk_analysis(&self, user_id: &str) -> Result<RiskAnalysis, EngineError> {
        let profile = self
            .store
            .find_profile(user_id)?
            .ok_or_else(|| EngineError::not_found(format!("profile for user {}", user_id)))?;

        let recent_threats: Vec<ThreatBrief> = self
            .store
            .find_threats_by_user(user_id)?
            .iter()
            .take(RECENT_THREATS_IN_ANALYSIS)
            .map(ThreatBrief::from)
            .collect();

        let behavior_patterns = BehaviorPatterns {
            off_hours_access_count: self
                .store
                .count_threats_by_user_and_type(user_id, ThreatType::OffHoursAccess)?,
            mass_data_read_count: self
                .store
                .count_threats_by_user_and_type(user_id, ThreatType::MassDataRead)?,
            permission_change_count: self
                .store
                .count_threats_by_user_and_type(user_id, ThreatType::PermissionChange)?,
            failed_login_attempts: profile.failed_login_attempts,
        };

        Ok(RiskAnalysis {
            user_id: profile.user_id.clone(),
            risk_score: profile.risk_score,
            risk_level: profile.current_risk_level,
            threat_summary: ThreatSummary {
                total: profile.total_threats_detected,
                critical: profile.critical_threats_count,
                high: profile.high_threats_count,
                medium: profile.medium_threats_count,
                low: profile.low_threats_count,
            },
            recent_threats,
            behavior_patterns,
            recommendation: recommendation_for(profile.current_risk_level).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use siem_core::ANALYSIS_JOB_SOURCE;

    fn store_with_threat(id: &str, level: RiskLevel) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create_threat(&threat(id, level, Utc::now())).unwrap();
        store
    }

    fn threat(id: &str, level: RiskLevel, detected_at: DateTime<Utc>) -> InsiderThreat {
        InsiderThreat {
            id: id.to_string(),
            user_id: "admin.blake".to_string(),
            threat_type: ThreatType::OffHoursAccess,
            risk_level: level,
            description: format!("threat {}", id),
            metadata: serde_json::json!({}),
            correlated_event_ids: vec![],
            ip_address: None,
            source: ANALYSIS_JOB_SOURCE.to_string(),
            detected_at,
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }

    #[tokio::test]
    async fn test_threat_update_creates_profile_and_scores() {
        let store = store_with_threat("t-1", RiskLevel::Low);
        let engine = RiskEngine::new(store);

        let profile = engine
            .update_user_risk_after_threat("admin.blake", "t-1")
            .await
            .unwrap();

        assert_eq!(profile.total_threats_detected, 1);
        assert_eq!(profile.low_threats_count, 1);
        // 3 points for one LOW threat, x1.5 recency
        assert_eq!(profile.risk_score, 5);
        assert_eq!(profile.current_risk_level, RiskLevel::Low);
        assert_eq!(profile.recent_activities.len(), 1);
    }

    #[tokio::test]
    async fn test_threat_update_requires_stored_threat() {
        let engine = RiskEngine::new(Arc::new(MemoryStore::new()));
        let result = engine
            .update_user_risk_after_threat("admin.blake", "missing")
            .await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_login_failures_accumulate_into_the_score() {
        let engine = RiskEngine::new(Arc::new(MemoryStore::new()));

        for _ in 0..3 {
            engine
                .update_user_login_info("admin.blake", false)
                .await
                .unwrap();
        }
        let profile = engine.profile("admin.blake").unwrap().unwrap();
        assert_eq!(profile.failed_login_attempts, 3);
        assert_eq!(profile.risk_score, 6);

        let profile = engine
            .update_user_login_info("admin.blake", true)
            .await
            .unwrap();
        assert_eq!(profile.failed_login_attempts, 0);
        assert_eq!(profile.risk_score, 0);
        assert!(profile.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_login_failures_are_not_lost() {
        let engine = Arc::new(RiskEngine::new(Arc::new(MemoryStore::new())));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.update_user_login_info("admin.blake", false).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let profile = engine.profile("admin.blake").unwrap().unwrap();
        assert_eq!(profile.failed_login_attempts, 20);
    }

    #[tokio::test]
    async fn test_recalculate_requires_profile() {
        let engine = RiskEngine::new(Arc::new(MemoryStore::new()));
        let result = engine.recalculate_user_risk("nobody").await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_recalculate_rescores_current_counters() {
        let store = Arc::new(MemoryStore::new());
        let mut profile = UserRiskProfile::new("admin.blake");
        profile.critical_threats_count = 2;
        profile.total_threats_detected = 2;
        store.save_profile(&profile).unwrap();

        let engine = RiskEngine::new(store);
        let rescored = engine.recalculate_user_risk("admin.blake").await.unwrap();
        // 2 x 40, no recency (no last threat timestamp), no diversity
        assert_eq!(rescored.risk_score, 80);
        assert_eq!(rescored.current_risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_analysis_assembles_recent_threats_and_patterns() {
        let store = Arc::new(MemoryStore::new());
        let base = Utc::now() - Duration::days(30);
        for i in 0..12 {
            store
                .create_threat(&threat(
                    &format!("t-{:02}", i),
                    RiskLevel::Medium,
                    base + Duration::hours(i),
                ))
                .unwrap();
        }

        let engine = RiskEngine::new(store);
        for i in 0..12 {
            engine
                .update_user_risk_after_threat("admin.blake", &format!("t-{:02}", i))
                .await
                .unwrap();
        }

        let analysis = engine.user_risk_analysis("admin.blake").unwrap();
        assert_eq!(analysis.threat_summary.total, 12);
        assert_eq!(analysis.threat_summary.medium, 12);
        assert_eq!(analysis.recent_threats.len(), 10);
        // newest first
        assert_eq!(analysis.recent_threats[0].id, "t-11");
        assert_eq!(analysis.behavior_patterns.off_hours_access_count, 12);
        assert_eq!(analysis.behavior_patterns.mass_data_read_count, 0);
        // 12 MEDIUM = 120 base, stale detection date, no multipliers apply
        assert_eq!(analysis.risk_score, 120);
        assert_eq!(analysis.risk_level, RiskLevel::Critical);
        assert!(analysis.recommendation.contains("suspend"));
    }

    #[tokio::test]
    async fn test_analysis_requires_profile() {
        let engine = RiskEngine::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            engine.user_risk_analysis("nobody"),
            Err(EngineError::NotFound(_))
        ));
    }
}
