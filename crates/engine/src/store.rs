//! Storage seams for threats, profiles, and the analysis cursor.
//!
//! The traits are object-safe and synchronous so the SQLite-backed store
//! (a `Mutex<Connection>`) and the in-memory test store implement them the
//! same way. The scheduler and HTTP layer hold an `Arc<dyn SiemStore>`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use siem_core::{
    EngineError, FilteredThreats, InsiderThreat, RiskLevel, SortBy, SortOrder, ThreatQuery,
    ThreatType, UserRiskProfile,
};

/// Persistence for detected threats.
///
/// Listing methods return newest-first by `detected_at`.
pub trait ThreatStore: Send + Sync {
    /// Insert-if-absent keyed by threat id. Returns `true` when the row
    /// was new. Replays of an already-stored detection land here and
    /// return `false` without touching the row.
    fn create_threat(&self, threat: &InsiderThreat) -> Result<bool, EngineError>;

    /// Full-row update of an existing threat.
    fn save_threat(&self, threat: &InsiderThreat) -> Result<(), EngineError>;

    fn find_threat(&self, id: &str) -> Result<Option<InsiderThreat>, EngineError>;

    fn find_all_threats(&self) -> Result<Vec<InsiderThreat>, EngineError>;

    fn find_threats_by_user(&self, user_id: &str) -> Result<Vec<InsiderThreat>, EngineError>;

    fn find_threats_by_type(
        &self,
        threat_type: ThreatType,
    ) -> Result<Vec<InsiderThreat>, EngineError>;

    fn find_threats_by_risk_level(
        &self,
        risk_level: RiskLevel,
    ) -> Result<Vec<InsiderThreat>, EngineError>;

    fn find_unresolved_threats(&self) -> Result<Vec<InsiderThreat>, EngineError>;

    fn count_threats_by_user(&self, user_id: &str) -> Result<u64, EngineError>;

    fn count_threats_by_user_and_type(
        &self,
        user_id: &str,
        threat_type: ThreatType,
    ) -> Result<u64, EngineError>;

    /// Combined filter + sort + offset pagination. `total` counts every
    /// match before the page is cut.
    fn find_threats_with_filters(
        &self,
        query: &ThreatQuery,
    ) -> Result<FilteredThreats, EngineError>;
}

/// Persistence for per-user risk profiles.
pub trait ProfileStore: Send + Sync {
    fn find_profile(&self, user_id: &str) -> Result<Option<UserRiskProfile>, EngineError>;

    /// Upsert keyed by user id.
    fn save_profile(&self, profile: &UserRiskProfile) -> Result<(), EngineError>;

    /// All profiles, highest score first.
    fn all_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError>;

    /// Profiles currently at HIGH or CRITICAL, highest score first.
    fn high_risk_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError>;
}

/// Persistence for the analysis job's event cursor.
pub trait CursorStore: Send + Sync {
    /// Last event id already analyzed; 0 before the first completed run.
    fn load_cursor(&self) -> Result<i64, EngineError>;

    fn store_cursor(&self, last_event_id: i64) -> Result<(), EngineError>;
}

/// Everything the engine needs from a backing store.
pub trait SiemStore: ThreatStore + ProfileStore + CursorStore {}

impl<T: ThreatStore + ProfileStore + CursorStore> SiemStore for T {}

/// Orders threats for listing: the requested key, then newest-first with
/// id as the final tie-break so pages never shuffle between requests.
pub(crate) fn sort_threats(threats: &mut [InsiderThreat], sort_by: SortBy, order: SortOrder) {
    threats.sort_by(|a, b| {
        let key = match sort_by {
            SortBy::DetectedAt => a.detected_at.cmp(&b.detected_at),
            SortBy::RiskLevel => a.risk_level.rank().cmp(&b.risk_level.rank()),
            SortBy::ThreatType => a.threat_type.as_str().cmp(b.threat_type.as_str()),
        };
        let key = match order {
            SortOrder::Asc => key,
            SortOrder::Desc => key.reverse(),
        };
        key.then_with(|| match b.detected_at.cmp(&a.detected_at) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        })
    });
}

pub(crate) fn matches_query(threat: &InsiderThreat, query: &ThreatQuery) -> bool {
    if let Some(user_id) = &query.user_id {
        if &threat.user_id != user_id {
            return false;
        }
    }
    if let Some(threat_type) = query.threat_type {
        if threat.threat_type != threat_type {
            return false;
        }
    }
    if let Some(risk_level) = query.risk_level {
        if threat.risk_level != risk_level {
            return false;
        }
    }
    if let Some(is_resolved) = query.is_resolved {
        if threat.is_resolved != is_resolved {
            return false;
        }
    }
    if let Some(start) = query.start_date {
        if threat.detected_at < start {
            return false;
        }
    }
    if let Some(end) = query.end_date {
        if threat.detected_at > end {
            return false;
        }
    }
    true
}

/// HashMap-backed store. Primary backend for tests; also usable for
/// ephemeral deployments that do not need the database file.
#[derive(Default)]
pub struct MemoryStore {
    threats: Mutex<HashMap<String, InsiderThreat>>,
    profiles: Mutex<HashMap<String, UserRiskProfile>>,
    cursor: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(&self, mut threats: Vec<InsiderThreat>) -> Vec<InsiderThreat> {
        sort_threats(&mut threats, SortBy::DetectedAt, SortOrder::Desc);
        threats
    }
}

impl ThreatStore for MemoryStore {
    fn create_threat(&self, threat: &InsiderThreat) -> Result<bool, EngineError> {
        let mut threats = self.threats.lock().unwrap();
        if threats.contains_key(&threat.id) {
            return Ok(false);
        }
        threats.insert(threat.id.clone(), threat.clone());
        Ok(true)
    }

    fn save_threat(&self, threat: &InsiderThreat) -> Result<(), EngineError> {
        let mut threats = self.threats.lock().unwrap();
        if !threats.contains_key(&threat.id) {
            return Err(EngineError::not_found(format!("threat {}", threat.id)));
        }
        threats.insert(threat.id.clone(), threat.clone());
        Ok(())
    }

    fn find_threat(&self, id: &str) -> Result<Option<InsiderThreat>, EngineError> {
        Ok(self.threats.lock().unwrap().get(id).cloned())
    }

    fn find_all_threats(&self) -> Result<Vec<InsiderThreat>, EngineError> {
        let threats = self.threats.lock().unwrap().values().cloned().collect();
        Ok(self.newest_first(threats))
    }

    fn find_threats_by_user(&self, user_id: &str) -> Result<Vec<InsiderThreat>, EngineError> {
        let threats = self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        Ok(self.newest_first(threats))
    }

    fn find_threats_by_type(
        &self,
        threat_type: ThreatType,
    ) -> Result<Vec<InsiderThreat>, EngineError> {
        let threats = self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.threat_type == threat_type)
            .cloned()
            .collect();
        Ok(self.newest_first(threats))
    }

    fn find_threats_by_risk_level(
        &self,
        risk_level: RiskLevel,
    ) -> Result<Vec<InsiderThreat>, EngineError> {
        let threats = self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.risk_level == risk_level)
            .cloned()
            .collect();
        Ok(self.newest_first(threats))
    }

    fn find_unresolved_threats(&self) -> Result<Vec<InsiderThreat>, EngineError> {
        let threats = self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| !t.is_resolved)
            .cloned()
            .collect();
        Ok(self.newest_first(threats))
    }

    fn count_threats_by_user(&self, user_id: &str) -> Result<u64, EngineError> {
        Ok(self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .count() as u64)
    }

    fn count_threats_by_user_and_type(
        &self,
        user_id: &str,
        threat_type: ThreatType,
    ) -> Result<u64, EngineError> {
        Ok(self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id && t.threat_type == threat_type)
            .count() as u64)
    }

    fn find_threats_with_filters(
        &self,
        query: &ThreatQuery,
    ) -> Result<FilteredThreats, EngineError> {
        let mut matched: Vec<InsiderThreat> = self
            .threats
            .lock()
            .unwrap()
            .values()
            .filter(|t| matches_query(t, query))
            .cloned()
            .collect();
        sort_threats(&mut matched, query.sort_by(), query.sort_order());

        let total = matched.len() as u64;
        let threats = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size() as usize)
            .collect();
        Ok(FilteredThreats { threats, total })
    }
}

impl ProfileStore for MemoryStore {
    fn find_profile(&self, user_id: &str) -> Result<Option<UserRiskProfile>, EngineError> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    fn save_profile(&self, profile: &UserRiskProfile) -> Result<(), EngineError> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn all_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        let mut profiles: Vec<UserRiskProfile> =
            self.profiles.lock().unwrap().values().cloned().collect();
        profiles.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then(a.user_id.cmp(&b.user_id)));
        Ok(profiles)
    }

    fn high_risk_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        let mut profiles = self.all_profiles()?;
        profiles.retain(|p| p.current_risk_level.is_high_risk());
        Ok(profiles)
    }
}

impl CursorStore for MemoryStore {
    fn load_cursor(&self) -> Result<i64, EngineError> {
        Ok(*self.cursor.lock().unwrap())
    }

    fn store_cursor(&self, last_event_id: i64) -> Result<(), EngineError> {
        *self.cursor.lock().unwrap() = last_event_id;
        Ok(())
    }
}
