//! Detection arbiter: picks a winning methodology when several detectors
//! claim the same project.
//!
//! The winner is the result with the newest artifact timestamp, but only if
//! it leads the runner-up by strictly more than [`coexistence_threshold`].
//! Otherwise the methodologies coexist and there is no clear winner.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::{Confidence, DetectionResult, Method, Stage};

/// Minimum lead (seconds) the newest artifact needs over the runner-up.
/// A difference of exactly one hour is still a tie.
pub const COEXISTENCE_THRESHOLD_SECS: i64 = 3600;

pub fn coexistence_threshold() -> TimeDelta {
    TimeDelta::seconds(COEXISTENCE_THRESHOLD_SECS)
}

/// Select the winner among detector results.
///
/// Returns `(winner, has_clear_winner)`:
/// - empty input: `(None, false)`
/// - a single result: `(Some(it), true)`
/// - no timestamps on either of the two newest: first result, clear
/// - newest leads by more than the threshold: `(Some(newest), true)`
/// - otherwise: `(None, false)`
pub fn select_winner(results: &[DetectionResult]) -> (Option<&DetectionResult>, bool) {
    match results {
        [] => (None, false),
        [only] => (Some(only), true),
        _ => {
            let order = newest_first(results);
            let first = &results[order[0]];
            let second = &results[order[1]];
            match (first.artifact_timestamp, second.artifact_timestamp) {
                (None, None) => (Some(&results[0]), true),
                (Some(_), None) => (Some(first), true),
                (Some(t1), Some(t2)) if t1 - t2 > coexistence_threshold() => (Some(first), true),
                _ => (None, false),
            }
        }
    }
}

/// Indices into `results` sorted by artifact timestamp, newest first.
/// Results without a timestamp sort last; ties keep iteration order.
fn newest_first(results: &[DetectionResult]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(sort_key(results[i].artifact_timestamp)));
    order
}

fn sort_key(ts: Option<DateTime<Utc>>) -> (bool, Option<DateTime<Utc>>) {
    (ts.is_some(), ts)
}

/// Final classification stored on a project after arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub method: Method,
    pub stage: Stage,
    pub confidence: Confidence,
    pub reasoning: String,
    /// Non-empty only when no clear winner could be chosen.
    pub coexisting: Vec<Method>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            method: Method::Unknown,
            stage: Stage::Unknown,
            confidence: Confidence::Uncertain,
            reasoning: "No methodology markers found".to_string(),
            coexisting: Vec::new(),
        }
    }

    fn from_result(result: &DetectionResult) -> Self {
        Self {
            method: result.method,
            stage: result.stage,
            confidence: result.confidence,
            reasoning: result.reasoning.clone(),
            coexisting: Vec::new(),
        }
    }
}

/// Arbitrate and fold the outcome into a [`Classification`].
///
/// On coexistence the newest candidate still supplies method, stage, and
/// confidence so the project stays actionable; every candidate is listed in
/// `coexisting`.
pub fn classify(results: &[DetectionResult]) -> Classification {
    if results.is_empty() {
        return Classification::unknown();
    }

    match select_winner(results) {
        (Some(winner), true) => Classification::from_result(winner),
        _ => {
            let order = newest_first(results);
            let newest = &results[order[0]];
            let methods: Vec<Method> = order.iter().map(|&i| results[i].method).collect();
            let names: Vec<&str> = methods.iter().map(|m| m.as_str()).collect();
            let mut classification = Classification::from_result(newest);
            classification.reasoning = format!(
                "Multiple methodologies detected ({}): {}",
                names.join(", "),
                newest.reasoning
            );
            classification.coexisting = methods;
            classification
        }
    }
}
