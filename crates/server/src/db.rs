// Database persistence layer using SQLite

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use siem_core::{
    EngineError, FilteredThreats, InsiderThreat, RiskLevel, SortBy, SortOrder, ThreatQuery,
    ThreatType, UserRiskProfile,
};
use siem_engine::{CursorStore, ProfileStore, ThreatStore};

fn store_err(e: rusqlite::Error) -> EngineError {
    EngineError::Store(e.to_string())
}

fn decode_err(e: serde_json::Error) -> EngineError {
    EngineError::Store(format!("corrupt stored row: {}", e))
}

/// Fixed-width UTC timestamps so lexicographic order matches time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite-backed store for threats, risk profiles, and the analysis
/// cursor. Rows carry the full record as a JSON blob next to the columns
/// the queries filter and sort on.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            -- Detected threats; filter/sort columns mirror the JSON blob
            CREATE TABLE IF NOT EXISTS threats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                threat_type TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                risk_rank INTEGER NOT NULL,
                is_resolved INTEGER NOT NULL DEFAULT 0,
                detected_at TEXT NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_threats_user ON threats(user_id);
            CREATE INDEX IF NOT EXISTS idx_threats_detected_at ON threats(detected_at);

            -- Per-user risk profiles, written whole on every update
            CREATE TABLE IF NOT EXISTS user_risk_profiles (
                user_id TEXT PRIMARY KEY,
                risk_score INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Single-row table holding the analysis job's durable cursor
            CREATE TABLE IF NOT EXISTS analysis_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_event_id INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn threats_where(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<InsiderThreat>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT data FROM threats {} ORDER BY detected_at DESC, id ASC",
            clause
        );
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let mut rows = stmt.query(params).map_err(store_err)?;

        let mut threats = Vec::new();
        while let Some(row) = rows.next().map_err(store_err)? {
            let json: String = row.get(0).map_err(store_err)?;
            threats.push(serde_json::from_str(&json).map_err(decode_err)?);
        }
        Ok(threats)
    }

    fn count_where(
        &self,
        clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<u64, EngineError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT COUNT(*) FROM threats {}", clause);
        let count: i64 = conn
            .query_row(&sql, params, |row| row.get(0))
            .map_err(store_err)?;
        Ok(count as u64)
    }

    fn profiles_where(&self, clause: &str) -> Result<Vec<UserRiskProfile>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT data FROM user_risk_profiles {} ORDER BY risk_score DESC, user_id ASC",
            clause
        );
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let mut rows = stmt.query([]).map_err(store_err)?;

        let mut profiles = Vec::new();
        while let Some(row) = rows.next().map_err(store_err)? {
            let json: String = row.get(0).map_err(store_err)?;
            profiles.push(serde_json::from_str(&json).map_err(decode_err)?);
        }
        Ok(profiles)
    }
}

impl ThreatStore for Database {
    fn create_threat(&self, threat: &InsiderThreat) -> Result<bool, EngineError> {
        let data = serde_json::to_string(threat).map_err(decode_err)?;
        let conn = self.conn.lock().unwrap();
        let count = conn
            .execute(
                r#"INSERT OR IGNORE INTO threats
                   (id, user_id, threat_type, risk_level, risk_rank, is_resolved, detected_at, data)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    threat.id,
                    threat.user_id,
                    threat.threat_type.as_str(),
                    threat.risk_level.as_str(),
                    threat.risk_level.rank(),
                    threat.is_resolved,
                    ts(threat.detected_at),
                    data
                ],
            )
            .map_err(store_err)?;
        Ok(count > 0)
    }

    fn save_threat(&self, threat: &InsiderThreat) -> Result<(), EngineError> {
        let data = serde_json::to_string(threat).map_err(decode_err)?;
        let conn = self.conn.lock().unwrap();
        let count = conn
            .execute(
                r#"UPDATE threats
                   SET user_id = ?2, threat_type = ?3, risk_level = ?4, risk_rank = ?5,
                       is_resolved = ?6, detected_at = ?7, data = ?8
                   WHERE id = ?1"#,
                params![
                    threat.id,
                    threat.user_id,
                    threat.threat_type.as_str(),
                    threat.risk_level.as_str(),
                    threat.risk_level.rank(),
                    threat.is_resolved,
                    ts(threat.detected_at),
                    data
                ],
            )
            .map_err(store_err)?;
        if count == 0 {
            return Err(EngineError::not_found(format!("threat {}", threat.id)));
        }
        Ok(())
    }

    fn find_threat(&self, id: &str) -> Result<Option<InsiderThreat>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT data FROM threats WHERE id = ?1")
            .map_err(store_err)?;
        let mut rows = stmt.query(params![id]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => {
                let json: String = row.get(0).map_err(store_err)?;
                Ok(Some(serde_json::from_str(&json).map_err(decode_err)?))
            }
            None => Ok(None),
        }
    }

    fn find_all_threats(&self) -> Result<Vec<InsiderThreat>, EngineError> {
        self.threats_where("", &[])
    }

    fn find_threats_by_user(&self, user_id: &str) -> Result<Vec<InsiderThreat>, EngineError> {
        self.threats_where("WHERE user_id = ?1", &[&user_id])
    }

    fn find_threats_by_type(
        &self,
        threat_type: ThreatType,
    ) -> Result<Vec<InsiderThreat>, EngineError> {
        self.threats_where("WHERE threat_type = ?1", &[&threat_type.as_str()])
    }

    fn find_threats_by_risk_level(
        &self,
        risk_level: RiskLevel,
    ) -> Result<Vec<InsiderThreat>, EngineError> {
        self.threats_where("WHERE risk_level = ?1", &[&risk_level.as_str()])
    }

    fn find_unresolved_threats(&self) -> Result<Vec<InsiderThreat>, EngineError> {
        self.threats_where("WHERE is_resolved = 0", &[])
    }

    fn count_threats_by_user(&self, user_id: &str) -> Result<u64, EngineError> {
        self.count_where("WHERE user_id = ?1", &[&user_id])
    }

    fn count_threats_by_user_and_type(
        &self,
        user_id: &str,
        threat_type: ThreatType,
    ) -> Result<u64, EngineError> {
        self.count_where(
            "WHERE user_id = ?1 AND threat_type = ?2",
            &[&user_id, &threat_type.as_str()],
        )
    }

    fn find_threats_with_filters(
        &self,
        query: &ThreatQuery,
    ) -> Result<FilteredThreats, EngineError> {
        let mut where_sql = String::from("WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(user_id) = &query.user_id {
            where_sql.push_str(" AND user_id = ?");
            params_vec.push(Box::new(user_id.clone()));
        }
        if let Some(threat_type) = query.threat_type {
            where_sql.push_str(" AND threat_type = ?");
            params_vec.push(Box::new(threat_type.as_str()));
        }
        if let Some(risk_level) = query.risk_level {
            where_sql.push_str(" AND risk_level = ?");
            params_vec.push(Box::new(risk_level.as_str()));
        }
        if let Some(is_resolved) = query.is_resolved {
            where_sql.push_str(" AND is_resolved = ?");
            params_vec.push(Box::new(is_resolved));
        }
        if let Some(start) = query.start_date {
            where_sql.push_str(" AND detected_at >= ?");
            params_vec.push(Box::new(ts(start)));
        }
        if let Some(end) = query.end_date {
            where_sql.push_str(" AND detected_at <= ?");
            params_vec.push(Box::new(ts(end)));
        }

        let conn = self.conn.lock().unwrap();

        // total counts every match before the page is cut
        let count_sql = format!("SELECT COUNT(*) FROM threats {}", where_sql);
        let total: i64 = {
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            conn.query_row(&count_sql, params_refs.as_slice(), |row| row.get(0))
                .map_err(store_err)?
        };

        let sort_column = match query.sort_by() {
            SortBy::DetectedAt => "detected_at",
            SortBy::RiskLevel => "risk_rank",
            SortBy::ThreatType => "threat_type",
        };
        let direction = match query.sort_order() {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        // the tie-break keeps page boundaries stable between requests
        let page_sql = format!(
            "SELECT data FROM threats {} ORDER BY {} {}, detected_at DESC, id ASC LIMIT ? OFFSET ?",
            where_sql, sort_column, direction
        );
        params_vec.push(Box::new(i64::from(query.page_size())));
        params_vec.push(Box::new(query.offset() as i64));
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&page_sql).map_err(store_err)?;
        let mut rows = stmt.query(params_refs.as_slice()).map_err(store_err)?;
        let mut threats = Vec::new();
        while let Some(row) = rows.next().map_err(store_err)? {
            let json: String = row.get(0).map_err(store_err)?;
            threats.push(serde_json::from_str(&json).map_err(decode_err)?);
        }

        Ok(FilteredThreats {
            threats,
            total: total as u64,
        })
    }
}

impl ProfileStore for Database {
    fn find_profile(&self, user_id: &str) -> Result<Option<UserRiskProfile>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT data FROM user_risk_profiles WHERE user_id = ?1")
            .map_err(store_err)?;
        let mut rows = stmt.query(params![user_id]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => {
                let json: String = row.get(0).map_err(store_err)?;
                Ok(Some(serde_json::from_str(&json).map_err(decode_err)?))
            }
            None => Ok(None),
        }
    }

    fn save_profile(&self, profile: &UserRiskProfile) -> Result<(), EngineError> {
        let data = serde_json::to_string(profile).map_err(decode_err)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT OR REPLACE INTO user_risk_profiles
               (user_id, risk_score, risk_level, data, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                profile.user_id,
                profile.risk_score,
                profile.current_risk_level.as_str(),
                data,
                ts(Utc::now())
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn all_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        self.profiles_where("")
    }

    fn high_risk_profiles(&self) -> Result<Vec<UserRiskProfile>, EngineError> {
        self.profiles_where("WHERE risk_level IN ('HIGH', 'CRITICAL')")
    }
}

impl CursorStore for Database {
    fn load_cursor(&self) -> Result<i64, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT last_event_id FROM analysis_cursor WHERE id = 1")
            .map_err(store_err)?;
        let mut rows = stmt.query([]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => row.get(0).map_err(store_err),
            None => Ok(0),
        }
    }

    fn store_cursor(&self, last_event_id: i64) -> Result<(), EngineError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO analysis_cursor (id, last_event_id) VALUES (1, ?1)",
            params![last_event_id],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use siem_core::ANALYSIS_JOB_SOURCE;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn threat(id: &str, detected_at: DateTime<Utc>) -> InsiderThreat {
        InsiderThreat {
            id: id.to_string(),
            user_id: "admin.blake".to_string(),
            threat_type: ThreatType::MassDataRead,
            risk_level: RiskLevel::Medium,
            description: "High volume of data access detected".to_string(),
            metadata: serde_json::json!({"kind": "mass_data_read", "events_counted": 732}),
            correlated_event_ids: vec![10, 11, 12],
            ip_address: Some("192.168.1.20".to_string()),
            source: ANALYSIS_JOB_SOURCE.to_string(),
            detected_at,
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
        }
    }

    #[test]
    fn test_threat_blob_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let original = threat("t-1", base());

        assert!(db.create_threat(&original).unwrap());
        let loaded = db.find_threat("t-1").unwrap().unwrap();

        assert_eq!(loaded.user_id, original.user_id);
        assert_eq!(loaded.threat_type, original.threat_type);
        assert_eq!(loaded.metadata["events_counted"], 732);
        assert_eq!(loaded.correlated_event_ids, vec![10, 11, 12]);
        assert_eq!(loaded.ip_address.as_deref(), Some("192.168.1.20"));
        assert_eq!(loaded.detected_at, original.detected_at);
    }

    #[test]
    fn test_create_is_insert_if_absent() {
        let db = Database::open_in_memory().unwrap();
        let t = threat("t-1", base());

        assert!(db.create_threat(&t).unwrap());
        assert!(!db.create_threat(&t).unwrap());
        assert_eq!(db.find_all_threats().unwrap().len(), 1);
    }

    #[test]
    fn test_save_updates_existing_row_only() {
        let db = Database::open_in_memory().unwrap();
        let mut t = threat("t-1", base());

        assert!(db.save_threat(&t).is_err());

        db.create_threat(&t).unwrap();
        t.resolve("analyst.kim", Some("reviewed".to_string()), base())
            .unwrap();
        db.save_threat(&t).unwrap();

        let loaded = db.find_threat("t-1").unwrap().unwrap();
        assert!(loaded.is_resolved);
        assert_eq!(loaded.resolved_by.as_deref(), Some("analyst.kim"));

        // resolved rows drop out of the unresolved listing
        assert!(db.find_unresolved_threats().unwrap().is_empty());
    }

    #[test]
    fn test_listings_filter_and_order_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let mut a = threat("t-a", base());
        a.threat_type = ThreatType::OffHoursAccess;
        a.risk_level = RiskLevel::High;
        let b = threat("t-b", base() + Duration::minutes(1));
        let mut c = threat("t-c", base() + Duration::minutes(2));
        c.user_id = "sys.ops".to_string();
        for t in [&a, &b, &c] {
            db.create_threat(t).unwrap();
        }

        let by_user = db.find_threats_by_user("admin.blake").unwrap();
        assert_eq!(by_user.len(), 2);
        assert_eq!(by_user[0].id, "t-b");

        let by_type = db.find_threats_by_type(ThreatType::OffHoursAccess).unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].id, "t-a");

        let by_level = db.find_threats_by_risk_level(RiskLevel::High).unwrap();
        assert_eq!(by_level.len(), 1);

        assert_eq!(db.count_threats_by_user("admin.blake").unwrap(), 2);
        assert_eq!(
            db.count_threats_by_user_and_type("admin.blake", ThreatType::MassDataRead)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_search_pages_after_counting() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..25 {
            db.create_threat(&threat(&format!("t-{:02}", i), base() + Duration::minutes(i)))
                .unwrap();
        }

        let query = ThreatQuery {
            page: Some(2),
            limit: Some(10),
            ..Default::default()
        };
        let result = db.find_threats_with_filters(&query).unwrap();

        assert_eq!(result.total, 25);
        assert_eq!(result.threats.len(), 10);
        // newest-first: page 2 starts at the 11th newest, t-14
        assert_eq!(result.threats[0].id, "t-14");
        assert_eq!(result.threats[9].id, "t-05");
    }

    #[test]
    fn test_search_combines_filters() {
        let db = Database::open_in_memory().unwrap();
        let mut a = threat("t-a", base());
        a.risk_level = RiskLevel::High;
        let mut b = threat("t-b", base() + Duration::hours(1));
        b.risk_level = RiskLevel::High;
        b.is_resolved = true;
        let mut c = threat("t-c", base() + Duration::hours(2));
        c.user_id = "sys.ops".to_string();
        c.risk_level = RiskLevel::High;
        for t in [&a, &b, &c] {
            db.create_threat(t).unwrap();
        }

        let query = ThreatQuery {
            user_id: Some("admin.blake".to_string()),
            risk_level: Some(RiskLevel::High),
            is_resolved: Some(false),
            ..Default::default()
        };
        let result = db.find_threats_with_filters(&query).unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.threats[0].id, "t-a");

        // inclusive date bounds
        let query = ThreatQuery {
            start_date: Some(base()),
            end_date: Some(base() + Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(db.find_threats_with_filters(&query).unwrap().total, 2);
    }

    #[test]
    fn test_search_sorts_by_severity_rank() {
        let db = Database::open_in_memory().unwrap();
        let mut low = threat("t-low", base());
        low.risk_level = RiskLevel::Low;
        let mut critical = threat("t-critical", base() + Duration::minutes(1));
        critical.risk_level = RiskLevel::Critical;
        let mut medium = threat("t-medium", base() + Duration::minutes(2));
        medium.risk_level = RiskLevel::Medium;
        for t in [&low, &critical, &medium] {
            db.create_threat(t).unwrap();
        }

        let query = ThreatQuery {
            sort_by: Some(SortBy::RiskLevel),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let ids: Vec<String> = db
            .find_threats_with_filters(&query)
            .unwrap()
            .threats
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["t-critical", "t-medium", "t-low"]);
    }

    #[test]
    fn test_profile_upsert_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_profile("admin.blake").unwrap().is_none());

        let mut quiet = UserRiskProfile::new("quiet.user");
        quiet.risk_score = 10;
        let mut risky = UserRiskProfile::new("risky.user");
        risky.risk_score = 120;
        risky.current_risk_level = RiskLevel::Critical;
        let mut watched = UserRiskProfile::new("watched.user");
        watched.risk_score = 70;
        watched.current_risk_level = RiskLevel::High;
        for p in [&quiet, &risky, &watched] {
            db.save_profile(p).unwrap();
        }

        // second save replaces, not duplicates
        quiet.risk_score = 15;
        db.save_profile(&quiet).unwrap();
        assert_eq!(db.find_profile("quiet.user").unwrap().unwrap().risk_score, 15);

        let all = db.all_profiles().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].user_id, "risky.user");
        assert_eq!(all[2].user_id, "quiet.user");

        let high: Vec<String> = db
            .high_risk_profiles()
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(high, vec!["risky.user", "watched.user"]);
    }

    #[test]
    fn test_cursor_defaults_to_zero_and_round_trips() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_cursor().unwrap(), 0);

        db.store_cursor(412).unwrap();
        db.store_cursor(987).unwrap();
        assert_eq!(db.load_cursor().unwrap(), 987);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("siem.db");

        {
            let db = Database::open(&path).unwrap();
            db.create_threat(&threat("t-1", base())).unwrap();
            db.store_cursor(99).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.find_threat("t-1").unwrap().is_some());
        assert_eq!(db.load_cursor().unwrap(), 99);
    }
}
