//! Privileged-user filter and per-user grouping.
//!
//! Only events attributable to an elevated role reach the detectors;
//! everything else in the batch is dropped here.

use std::collections::HashMap;

use siem_core::SecurityEvent;

/// Roles whose activity is subject to insider-threat analysis.
const PRIVILEGED_ROLES: [&str; 2] = ["ADMIN", "SYSADMIN"];

pub fn is_privileged_role(role: &str) -> bool {
    PRIVILEGED_ROLES
        .iter()
        .any(|r| role.eq_ignore_ascii_case(r))
}

/// Groups a batch by user id, keeping only events whose role is
/// privileged and whose user id is present.
///
/// Within a user's group the batch order is preserved; users appear in
/// first-seen order so a full pass over the result is deterministic.
pub fn group_privileged_events(events: Vec<SecurityEvent>) -> Vec<(String, Vec<SecurityEvent>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<SecurityEvent>)> = Vec::new();

    for event in events {
        let user_id = match (&event.user_id, &event.user_role) {
            (Some(id), Some(role)) if is_privileged_role(role) => id.clone(),
            _ => continue,
        };
        match index.get(&user_id) {
            Some(&slot) => groups[slot].1.push(event),
            None => {
                index.insert(user_id.clone(), groups.len());
                groups.push((user_id, vec![event]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use siem_core::EventType;

    fn event(id: i64, user: Option<&str>, role: Option<&str>) -> SecurityEvent {
        SecurityEvent {
            id,
            source: "auth-service".to_string(),
            event_type: EventType::Info,
            description: format!("event {}", id),
            timestamp: Utc::now(),
            ip_address: "10.0.0.1".to_string(),
            user_id: user.map(str::to_string),
            user_role: role.map(str::to_string),
        }
    }

    #[test]
    fn test_role_match_is_case_insensitive() {
        assert!(is_privileged_role("ADMIN"));
        assert!(is_privileged_role("admin"));
        assert!(is_privileged_role("SysAdmin"));
        assert!(!is_privileged_role("USER"));
        assert!(!is_privileged_role("auditor"));
    }

    #[test]
    fn test_unattributed_and_unprivileged_events_are_dropped() {
        let batch = vec![
            event(1, Some("admin.blake"), Some("ADMIN")),
            event(2, None, Some("ADMIN")),
            event(3, Some("joe"), None),
            event(4, Some("joe"), Some("USER")),
            event(5, Some("root.ops"), Some("sysadmin")),
        ];
        let groups = group_privileged_events(batch);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "admin.blake");
        assert_eq!(groups[1].0, "root.ops");
    }

    #[test]
    fn test_groups_preserve_batch_order() {
        let batch = vec![
            event(10, Some("a"), Some("ADMIN")),
            event(11, Some("b"), Some("ADMIN")),
            event(12, Some("a"), Some("ADMIN")),
            event(13, Some("a"), Some("ADMIN")),
        ];
        let groups = group_privileged_events(batch);
        assert_eq!(groups[0].0, "a");
        let ids: Vec<i64> = groups[0].1.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 12, 13]);
        assert_eq!(groups[1].1.len(), 1);
    }
}
