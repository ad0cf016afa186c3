//! Mass data read heuristic: a privileged user touching an unusual volume
//! of read/download/export/view operations in one analysis window.

use chrono::{DateTime, Utc};
use siem_core::{DetectionResult, RiskLevel, SecurityEvent, ThreatMetadata, ThreatType};

use super::description_matches;

const READ_KEYWORDS: &[&str] = &["read", "download", "export", "view"];

/// Permission and login activity has its own detectors; descriptions
/// mentioning these are not counted as data reads.
const EXCLUDE_KEYWORDS: &[&str] = &["permission", "privilege", "role", "login", "logon", "auth"];

const CRITICAL_THRESHOLD: usize = 1000;
const HIGH_THRESHOLD: usize = 500;
const MEDIUM_THRESHOLD: usize = 200;
const LOW_THRESHOLD: usize = 100;

const SAMPLE_CAP: usize = 5;

fn is_data_read(description: &str) -> bool {
    description_matches(description, READ_KEYWORDS)
        && !description_matches(description, EXCLUDE_KEYWORDS)
}

pub fn detect_mass_data_read(
    user_id: &str,
    events: &[SecurityEvent],
    analysis_time: DateTime<Utc>,
) -> Option<DetectionResult> {
    let matched: Vec<&SecurityEvent> = events
        .iter()
        .filter(|e| is_data_read(&e.description))
        .collect();
    let count = matched.len();

    let risk_level = if count >= CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if count >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if count >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else if count >= LOW_THRESHOLD {
        RiskLevel::Low
    } else {
        return None;
    };

    let sample_descriptions = matched
        .iter()
        .take(SAMPLE_CAP)
        .map(|e| e.description.clone())
        .collect();

    Some(DetectionResult {
        threat_type: ThreatType::MassDataRead,
        risk_level,
        description: format!(
            "User {} performed {} data read operations in a single analysis window",
            user_id, count
        ),
        metadata: ThreatMetadata::MassDataRead {
            event_count: count,
            sample_descriptions,
            critical_threshold: CRITICAL_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            medium_threshold: MEDIUM_THRESHOLD,
            low_threshold: LOW_THRESHOLD,
            analysis_time,
        },
        correlated_event_ids: matched.iter().map(|e| e.id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::event;
    use super::*;
    use siem_core::EventType;

    fn read_events(n: usize) -> Vec<SecurityEvent> {
        (0..n)
            .map(|i| {
                event(
                    i as i64 + 1,
                    EventType::Info,
                    "User viewed customer record export",
                    Utc::now(),
                )
            })
            .collect()
    }

    #[test]
    fn test_below_lowest_threshold_detects_nothing() {
        let events = read_events(99);
        assert!(detect_mass_data_read("admin.blake", &events, Utc::now()).is_none());
    }

    #[test]
    fn test_threshold_tiers_are_closed_on_the_lower_end() {
        let cases = [
            (100, RiskLevel::Low),
            (199, RiskLevel::Low),
            (200, RiskLevel::Medium),
            (499, RiskLevel::Medium),
            (500, RiskLevel::High),
            (999, RiskLevel::High),
            (1000, RiskLevel::Critical),
        ];
        for (count, expected) in cases {
            let result = detect_mass_data_read("admin.blake", &read_events(count), Utc::now())
                .unwrap_or_else(|| panic!("count {} should detect", count));
            assert_eq!(result.risk_level, expected, "count {}", count);
            assert_eq!(result.correlated_event_ids.len(), count);
        }
    }

    #[test]
    fn test_permission_and_login_text_is_excluded() {
        let mut events = read_events(99);
        events.push(event(
            900,
            EventType::Info,
            "User viewed permission settings",
            Utc::now(),
        ));
        events.push(event(
            901,
            EventType::Info,
            "Login view rendered for user",
            Utc::now(),
        ));
        // the two excluded events must not push the count to 100
        assert!(detect_mass_data_read("admin.blake", &events, Utc::now()).is_none());
    }

    #[test]
    fn test_metadata_caps_samples_at_five() {
        let events = read_events(120);
        let result = detect_mass_data_read("admin.blake", &events, Utc::now()).unwrap();
        match result.metadata {
            ThreatMetadata::MassDataRead {
                event_count,
                ref sample_descriptions,
                low_threshold,
                ..
            } => {
                assert_eq!(event_count, 120);
                assert_eq!(sample_descriptions.len(), 5);
                assert_eq!(low_threshold, 100);
            }
            ref other => panic!("wrong metadata variant: {:?}", other),
        }
        assert!(result.description.contains("120"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let events = read_events(250);
        let t = Utc::now();
        let a = detect_mass_data_read("admin.blake", &events, t);
        let b = detect_mass_data_read("admin.blake", &events, t);
        assert_eq!(a, b);
    }
}
