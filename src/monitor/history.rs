//! Probe results, bounded per-target history and flap detection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::probe::PingResponse;

/// Outcome of one reachability probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl ProbeResult {
    /// Build from a collaborator response. A failed probe never carries a
    /// response time and a successful one never carries an error, whatever
    /// the endpoint sent.
    pub fn from_response(response: PingResponse, timestamp: DateTime<Utc>) -> Self {
        if response.success {
            Self {
                timestamp,
                success: true,
                response_time_ms: response.response_time,
                error_reason: None,
            }
        } else {
            Self {
                timestamp,
                success: false,
                response_time_ms: None,
                error_reason: response.error.filter(|e| !e.is_empty()),
            }
        }
    }
}

/// The most recent probe results of one target, oldest first.
#[derive(Debug, Clone)]
pub struct ProbeHistory {
    entries: VecDeque<ProbeResult>,
    capacity: usize,
}

impl ProbeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, result: ProbeResult) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ProbeResult> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ProbeResult> {
        self.entries.iter().cloned().collect()
    }
}

impl FromIterator<ProbeResult> for ProbeHistory {
    fn from_iter<I: IntoIterator<Item = ProbeResult>>(iter: I) -> Self {
        let entries: VecDeque<_> = iter.into_iter().collect();
        let capacity = entries.len();
        Self { entries, capacity }
    }
}

/// Summary of a probe window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BurstStats {
    pub probes: usize,
    pub success_rate_pct: f64,
    /// Mean over the probes that reported a response time.
    pub average_response_ms: Option<f64>,
    pub packet_loss_pct: f64,
}

impl BurstStats {
    pub fn from_history(history: &ProbeHistory) -> Self {
        if history.is_empty() {
            return Self {
                probes: 0,
                success_rate_pct: 0.0,
                average_response_ms: None,
                packet_loss_pct: 0.0,
            };
        }

        let probes = history.len();
        let successes = history.iter().filter(|r| r.success).count();
        let failures = probes - successes;

        let timed: Vec<f64> = history.iter().filter_map(|r| r.response_time_ms).collect();
        let average_response_ms = if timed.is_empty() {
            None
        } else {
            Some(timed.iter().sum::<f64>() / timed.len() as f64)
        };

        Self {
            probes,
            success_rate_pct: successes as f64 * 100.0 / probes as f64,
            average_response_ms,
            packet_loss_pct: failures as f64 * 100.0 / probes as f64,
        }
    }
}

/// Number of success/failure flips between consecutive probes.
pub fn transition_count(history: &ProbeHistory) -> usize {
    history
        .entries
        .iter()
        .zip(history.entries.iter().skip(1))
        .filter(|(prev, next)| prev.success != next.success)
        .count()
}

/// Transition count if it reaches `threshold`, `None` otherwise.
pub fn detect_flapping(history: &ProbeHistory, threshold: usize) -> Option<usize> {
    let transitions = transition_count(history);
    (transitions >= threshold).then_some(transitions)
}

/// A flapping detection, kept for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlapEvent {
    pub target_id: i64,
    pub detected_at: DateTime<Utc>,
    pub transition_count: usize,
    pub window_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(rt: f64) -> ProbeResult {
        ProbeResult {
            timestamp: Utc::now(),
            success: true,
            response_time_ms: Some(rt),
            error_reason: None,
        }
    }

    fn fail() -> ProbeResult {
        ProbeResult {
            timestamp: Utc::now(),
            success: false,
            response_time_ms: None,
            error_reason: Some("Connection failed".to_string()),
        }
    }

    fn pattern(bits: &[bool]) -> ProbeHistory {
        bits.iter()
            .map(|&b| if b { ok(1.0) } else { fail() })
            .collect()
    }

    #[test]
    fn test_flapping_alternating() {
        let h = pattern(&[true, false, true, false, true]);
        assert_eq!(transition_count(&h), 4);
        assert_eq!(detect_flapping(&h, 2), Some(4));
    }

    #[test]
    fn test_stable_is_not_flapping() {
        let h = pattern(&[true; 5]);
        assert_eq!(transition_count(&h), 0);
        assert_eq!(detect_flapping(&h, 2), None);
    }

    #[test]
    fn test_single_outage_is_not_flapping() {
        let h = pattern(&[true, true, false, false, false]);
        assert_eq!(transition_count(&h), 1);
        assert_eq!(detect_flapping(&h, 2), None);
    }

    #[test]
    fn test_two_transitions_hit_threshold() {
        let h = pattern(&[true, false, false, false, true]);
        assert_eq!(detect_flapping(&h, 2), Some(2));
    }

    #[test]
    fn test_short_histories() {
        assert_eq!(transition_count(&ProbeHistory::new(5)), 0);
        assert_eq!(transition_count(&pattern(&[false])), 0);
    }

    #[test]
    fn test_burst_stats() {
        let h: ProbeHistory = vec![ok(10.0), fail(), ok(20.0), ok(30.0), fail()]
            .into_iter()
            .collect();
        let stats = BurstStats::from_history(&h);
        assert_eq!(stats.probes, 5);
        assert_eq!(stats.success_rate_pct, 60.0);
        assert_eq!(stats.average_response_ms, Some(20.0));
        assert_eq!(stats.packet_loss_pct, 40.0);
    }

    #[test]
    fn test_stats_without_response_times() {
        let h = pattern(&[false, false]);
        let stats = BurstStats::from_history(&h);
        assert_eq!(stats.success_rate_pct, 0.0);
        assert_eq!(stats.average_response_ms, None);
        assert_eq!(stats.packet_loss_pct, 100.0);

        let empty = BurstStats::from_history(&ProbeHistory::new(5));
        assert_eq!(empty.probes, 0);
        assert_eq!(empty.average_response_ms, None);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut h = ProbeHistory::new(5);
        for i in 0..7 {
            h.push(ok(i as f64));
        }
        assert_eq!(h.len(), 5);
        let times: Vec<_> = h.iter().filter_map(|r| r.response_time_ms).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(h.latest().and_then(|r| r.response_time_ms), Some(6.0));
    }

    #[test]
    fn test_from_response_strips_contradictions() {
        let now = Utc::now();
        let failed = ProbeResult::from_response(
            PingResponse {
                success: false,
                response_time: Some(0.0),
                error: Some("timeout".to_string()),
            },
            now,
        );
        assert_eq!(failed.response_time_ms, None);
        assert_eq!(failed.error_reason.as_deref(), Some("timeout"));

        let good = ProbeResult::from_response(
            PingResponse {
                success: true,
                response_time: Some(7.0),
                error: Some("ignored".to_string()),
            },
            now,
        );
        assert_eq!(good.response_time_ms, Some(7.0));
        assert_eq!(good.error_reason, None);
    }
}
