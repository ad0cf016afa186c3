//! Authentication-pattern correlation.
//!
//! Unlike the counting heuristics this one orders the batch
//! chronologically and looks for two signatures: a failure streak broken
//! by a success (credential compromise) and a failure streak with no
//! success at all (brute force). It is the only detector that can return
//! more than one result per batch.

use chrono::{DateTime, Utc};
use siem_core::{
    DetectionResult, EventType, LoginPattern, RiskLevel, SecurityEvent, ThreatMetadata, ThreatType,
};

use super::description_matches;

const FAILURE_KEYWORDS: &[&str] = &[
    "failed login",
    "login failed",
    "login failure",
    "authentication failed",
    "invalid password",
    "invalid credentials",
];

const SUCCESS_KEYWORDS: &[&str] = &[
    "login successful",
    "successful login",
    "logged in successfully",
    "authentication succeeded",
];

const COMPROMISE_MIN_FAILURES: usize = 3;
const BRUTE_FORCE_MIN_FAILURES: usize = 5;
const CRITICAL_FAILURES: usize = 10;
const HIGH_FAILURES: usize = 5;

pub(crate) fn is_failed_login(event: &SecurityEvent) -> bool {
    matches!(event.event_type, EventType::Error | EventType::Warning)
        && description_matches(&event.description, FAILURE_KEYWORDS)
}

pub(crate) fn is_successful_login(event: &SecurityEvent) -> bool {
    event.event_type == EventType::Info
        && description_matches(&event.description, SUCCESS_KEYWORDS)
}

fn failure_tier(failed_count: usize) -> RiskLevel {
    if failed_count >= CRITICAL_FAILURES {
        RiskLevel::Critical
    } else if failed_count >= HIGH_FAILURES {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

pub fn detect_auth_patterns(
    user_id: &str,
    events: &[SecurityEvent],
    analysis_time: DateTime<Utc>,
) -> Vec<DetectionResult> {
    let mut ordered: Vec<&SecurityEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.timestamp, e.id));

    let failures: Vec<&SecurityEvent> = ordered
        .iter()
        .copied()
        .filter(|e| is_failed_login(e))
        .collect();
    let successes: Vec<&SecurityEvent> = ordered
        .iter()
        .copied()
        .filter(|e| is_successful_login(e))
        .collect();

    let mut results = Vec::new();

    // Signature (a): the streak pays off. All failures plus the first
    // success after the last of them.
    if failures.len() >= COMPROMISE_MIN_FAILURES {
        if let Some(success) = failures
            .last()
            .and_then(|last| successes.iter().find(|s| s.timestamp > last.timestamp))
        {
            let mut correlated: Vec<i64> = failures.iter().map(|e| e.id).collect();
            correlated.push(success.id);
            results.push(DetectionResult {
                threat_type: ThreatType::SuspiciousLogin,
                risk_level: failure_tier(failures.len()),
                description: format!(
                    "{} failed login attempts by user {} followed by a successful login - possible credential compromise",
                    failures.len(),
                    user_id
                ),
                metadata: ThreatMetadata::SuspiciousLogin {
                    failed_attempts: failures.len(),
                    success_observed: true,
                    pattern: LoginPattern::CredentialCompromise,
                    analysis_time,
                },
                correlated_event_ids: correlated,
            });
        }
    }

    // Signature (b): hammering with nothing to show for it.
    if failures.len() >= BRUTE_FORCE_MIN_FAILURES && successes.is_empty() {
        results.push(DetectionResult {
            threat_type: ThreatType::SuspiciousLogin,
            risk_level: RiskLevel::Medium,
            description: format!(
                "{} failed login attempts by user {} with no successful login - possible brute force attempt",
                failures.len(),
                user_id
            ),
            metadata: ThreatMetadata::SuspiciousLogin {
                failed_attempts: failures.len(),
                success_observed: false,
                pattern: LoginPattern::BruteForce,
                analysis_time,
            },
            correlated_event_ids: failures.iter().map(|e| e.id).collect(),
        });
    }

    results
}
