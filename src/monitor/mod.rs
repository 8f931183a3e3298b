//! Connectivity monitor.
//!
//! Drives reachability probes against registry targets, keeps a bounded
//! history per interactive burst, detects flapping and maintains the capped
//! process-wide network event log.

mod history;
mod log;
mod state;
mod sweep;

pub use history::*;
pub use log::*;
pub use state::*;
pub use sweep::*;

use crate::config::MonitorSettings;
use crate::probe::{ProbeError, Prober};
use crate::registry::RegistryTarget;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("target {0} has no host address")]
    MissingAddress(i64),
    #[error("a burst is already running for target {0}")]
    BurstInProgress(i64),
    #[error("invalid burst transition {event:?} from {phase:?}")]
    InvalidTransition { phase: BurstPhase, event: BurstEvent },
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Last known reachability of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TargetStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// The monitor's own projection of a target, independent of the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetHealth {
    pub status: TargetStatus,
    pub latency_ms: Option<f64>,
    pub last_check: Option<DateTime<Utc>>,
}

/// Live state of a target's most recent interactive burst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstView {
    pub target_id: i64,
    #[serde(flatten)]
    pub phase: BurstPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub history: Vec<ProbeResult>,
    pub latest: Option<ProbeResult>,
    pub stats: BurstStats,
    /// Transition count when the finished burst was flagged as flapping.
    pub flapping: Option<usize>,
}

/// Exclusive claim on a started burst, handed out by
/// [`Monitor::begin_burst`] and consumed by [`Monitor::drive_burst`].
#[derive(Debug)]
#[must_use = "a claimed burst stays in progress until it is driven"]
pub struct BurstTicket {
    target: RegistryTarget,
}

impl BurstTicket {
    pub fn target(&self) -> &RegistryTarget {
        &self.target
    }
}

#[derive(Debug)]
struct BurstRun {
    phase: BurstPhase,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    history: ProbeHistory,
    flapping: Option<usize>,
}

impl BurstRun {
    fn advance(&mut self, event: BurstEvent) -> Result<(), MonitorError> {
        let next = transition(self.phase, event).ok_or(MonitorError::InvalidTransition {
            phase: self.phase,
            event,
        })?;
        self.phase = next;
        Ok(())
    }

    fn view(&self, target_id: i64) -> BurstView {
        BurstView {
            target_id,
            phase: self.phase,
            started_at: self.started_at,
            finished_at: self.finished_at,
            history: self.history.to_vec(),
            latest: self.history.latest().cloned(),
            stats: BurstStats::from_history(&self.history),
            flapping: self.flapping,
        }
    }
}

struct MonitorState {
    log: BoundedLog<NetworkLogEntry>,
    flap_events: BoundedLog<FlapEvent>,
    flap_counts: HashMap<i64, u64>,
    health: HashMap<i64, TargetHealth>,
    bursts: HashMap<i64, BurstRun>,
}

/// Connectivity monitor shared by the sweep scheduler and the HTTP API.
pub struct Monitor {
    prober: Arc<dyn Prober>,
    settings: MonitorSettings,
    state: RwLock<MonitorState>,
    next_log_id: AtomicU64,
}

impl Monitor {
    pub fn new(prober: Arc<dyn Prober>, settings: MonitorSettings) -> Self {
        let state = MonitorState {
            log: BoundedLog::new(settings.log_capacity),
            flap_events: BoundedLog::new(settings.log_capacity),
            flap_counts: HashMap::new(),
            health: HashMap::new(),
            bursts: HashMap::new(),
        };

        Self {
            prober,
            settings,
            state: RwLock::new(state),
            next_log_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    fn new_entry(
        &self,
        prefix: &str,
        target_id: i64,
        event_type: LogEventType,
        message: String,
        latency_ms: Option<f64>,
        timestamp: DateTime<Utc>,
    ) -> NetworkLogEntry {
        let seq = self.next_log_id.fetch_add(1, Ordering::Relaxed);
        NetworkLogEntry {
            id: format!("{}-{}", prefix, seq),
            target_id,
            timestamp,
            event_type,
            message,
            latency_ms,
        }
    }

    /// Insert an entry at the head of the event log, evicting the oldest
    /// entries beyond capacity.
    pub async fn append_log(&self, entry: NetworkLogEntry) {
        self.state.write().await.log.push(entry);
    }

    /// Record an event raised outside the probe path (alerts, notes, status
    /// changes reported by other components).
    pub async fn record_event(
        &self,
        target_id: i64,
        event_type: LogEventType,
        message: impl Into<String>,
    ) -> NetworkLogEntry {
        let entry = self.new_entry("log", target_id, event_type, message.into(), None, Utc::now());
        self.append_log(entry.clone()).await;
        entry
    }

    /// Issue one probe against `target`.
    ///
    /// A host that does not answer is a normal result. An `Err` means the
    /// probe could not be executed at all; nothing is recorded in that case
    /// and the caller decides whether to log and move on.
    pub async fn probe_once(&self, target: &RegistryTarget) -> Result<ProbeResult, MonitorError> {
        let host = target
            .probe_address()
            .ok_or(MonitorError::MissingAddress(target.id))?;

        let response = self.prober.ping(host).await?;
        let result = ProbeResult::from_response(response, Utc::now());

        let message = if result.success {
            match result.response_time_ms {
                Some(rt) => format!("Ping successful - {}ms", rt),
                None => "Ping successful".to_string(),
            }
        } else {
            format!(
                "Ping failed - {}",
                result.error_reason.as_deref().unwrap_or("Connection failed")
            )
        };
        tracing::debug!("Probe {} ({}): {}", target.display_name, host, message);

        let entry = self.new_entry(
            "log",
            target.id,
            LogEventType::Ping,
            message,
            result.response_time_ms,
            result.timestamp,
        );

        let mut state = self.state.write().await;
        state.health.insert(
            target.id,
            TargetHealth {
                status: if result.success {
                    TargetStatus::Online
                } else {
                    TargetStatus::Offline
                },
                latency_ms: result.response_time_ms,
                last_check: Some(result.timestamp),
            },
        );
        state.log.push(entry);

        Ok(result)
    }

    /// Move `target` from idle to probing, starting a fresh burst window.
    ///
    /// The returned ticket is the only way to run the burst's probes.
    pub async fn begin_burst(&self, target: &RegistryTarget) -> Result<BurstTicket, MonitorError> {
        if target.probe_address().is_none() {
            return Err(MonitorError::MissingAddress(target.id));
        }

        let mut state = self.state.write().await;

        if let Some(run) = state.bursts.get(&target.id) {
            if run.phase.is_probing() {
                return Err(MonitorError::BurstInProgress(target.id));
            }
        }

        let mut run = BurstRun {
            phase: BurstPhase::Idle,
            started_at: Utc::now(),
            finished_at: None,
            history: ProbeHistory::new(self.settings.burst_size),
            flapping: None,
        };
        run.advance(BurstEvent::Start)?;
        state.bursts.insert(target.id, run);

        Ok(BurstTicket {
            target: target.clone(),
        })
    }

    /// Run the probes of the burst claimed by `ticket`.
    ///
    /// Probes are strictly sequential with `burst_delay` between them. The
    /// live view is updated after each attempt. Attempts that fail to
    /// execute are logged and leave no history entry.
    pub async fn drive_burst(&self, ticket: BurstTicket) -> Result<BurstView, MonitorError> {
        let target = &ticket.target;
        let size = self.settings.burst_size;

        for attempt in 0..size {
            let outcome = self.probe_once(target).await;

            {
                let mut state = self.state.write().await;
                let run = state
                    .bursts
                    .get_mut(&target.id)
                    .ok_or(MonitorError::InvalidTransition {
                        phase: BurstPhase::Idle,
                        event: BurstEvent::ProbeAttempted,
                    })?;
                match outcome {
                    Ok(result) => run.history.push(result),
                    Err(e) => tracing::warn!(
                        "Burst probe {}/{} for {} failed to execute: {}",
                        attempt + 1,
                        size,
                        target.display_name,
                        e
                    ),
                }
                run.advance(BurstEvent::ProbeAttempted)?;
            }

            if attempt + 1 < size {
                tokio::time::sleep(self.settings.burst_delay).await;
            }
        }

        let now = Utc::now();
        let mut state = self.state.write().await;
        let (view, flap) = {
            let run = state
                .bursts
                .get_mut(&target.id)
                .ok_or(MonitorError::InvalidTransition {
                    phase: BurstPhase::Idle,
                    event: BurstEvent::Finish,
                })?;
            run.advance(BurstEvent::Finish)?;
            run.finished_at = Some(now);
            run.flapping = detect_flapping(&run.history, self.settings.flap_threshold);
            (run.view(target.id), run.flapping.map(|t| (t, run.history.len())))
        };

        if let Some((transitions, window)) = flap {
            tracing::info!(
                "Flapping detected on {}: {} status changes in {} pings",
                target.display_name,
                transitions,
                window
            );
            *state.flap_counts.entry(target.id).or_insert(0) += 1;
            state.flap_events.push(FlapEvent {
                target_id: target.id,
                detected_at: now,
                transition_count: transitions,
                window_size: window,
            });
            let entry = self.new_entry(
                "log-flap",
                target.id,
                LogEventType::Flapping,
                format!(
                    "Network flapping detected - {} status changes in {} pings",
                    transitions, window
                ),
                None,
                now,
            );
            state.log.push(entry);
        }

        Ok(view)
    }

    /// Latest burst of a target, finished or in progress.
    pub async fn burst_view(&self, target_id: i64) -> Option<BurstView> {
        let state = self.state.read().await;
        state.bursts.get(&target_id).map(|run| run.view(target_id))
    }

    /// Event log, newest first, optionally restricted to one target.
    pub async fn logs(&self, target_id: Option<i64>) -> Vec<NetworkLogEntry> {
        let state = self.state.read().await;
        state
            .log
            .iter()
            .filter(|e| target_id.map_or(true, |id| e.target_id == id))
            .cloned()
            .collect()
    }

    pub async fn flap_count(&self, target_id: i64) -> u64 {
        let state = self.state.read().await;
        state.flap_counts.get(&target_id).copied().unwrap_or(0)
    }

    pub async fn flap_counts(&self) -> HashMap<i64, u64> {
        self.state.read().await.flap_counts.clone()
    }

    /// Flap detections, newest first.
    pub async fn flap_events(&self) -> Vec<FlapEvent> {
        let state = self.state.read().await;
        state.flap_events.iter().cloned().collect()
    }

    pub async fn health(&self, target_id: i64) -> TargetHealth {
        let state = self.state.read().await;
        state.health.get(&target_id).cloned().unwrap_or_default()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::probe::PingResponse;
    use std::time::Duration;

    fn monitor(prober: ScriptedProber) -> Arc<Monitor> {
        Arc::new(Monitor::new(Arc::new(prober), MonitorSettings::default()))
    }

    async fn run_burst(m: &Monitor, t: &RegistryTarget) -> Result<BurstView, MonitorError> {
        let ticket = m.begin_burst(t).await?;
        m.drive_burst(ticket).await
    }

    #[tokio::test]
    async fn test_probe_once_success() {
        let m = monitor(ScriptedProber::new(vec![up(12.0)]));
        let t = target(1, Some("10.0.0.1"));

        let result = m.probe_once(&t).await.unwrap();
        assert!(result.success);
        assert_eq!(result.response_time_ms, Some(12.0));

        let health = m.health(1).await;
        assert_eq!(health.status, TargetStatus::Online);
        assert_eq!(health.latency_ms, Some(12.0));
        assert!(health.last_check.is_some());

        let logs = m.logs(Some(1)).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, LogEventType::Ping);
        assert_eq!(logs[0].message, "Ping successful - 12ms");
        assert_eq!(logs[0].latency_ms, Some(12.0));
    }

    #[tokio::test]
    async fn test_probe_once_unreachable_is_a_ping_not_an_alert() {
        let m = monitor(ScriptedProber::new(vec![Ok(PingResponse {
            success: false,
            response_time: None,
            error: None,
        })]));
        let t = target(2, Some("10.0.0.2"));

        let result = m.probe_once(&t).await.unwrap();
        assert!(!result.success);
        assert_eq!(m.health(2).await.status, TargetStatus::Offline);

        let logs = m.logs(None).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, LogEventType::Ping);
        assert_eq!(logs[0].message, "Ping failed - Connection failed");
    }

    #[tokio::test]
    async fn test_probe_execution_error_records_nothing() {
        let m = monitor(ScriptedProber::new(vec![Err(ProbeError::Status(502))]));
        let t = target(3, Some("10.0.0.3"));

        assert!(matches!(m.probe_once(&t).await, Err(MonitorError::Probe(_))));
        assert!(m.logs(None).await.is_empty());
        assert_eq!(m.health(3).await.status, TargetStatus::Unknown);
    }

    #[tokio::test]
    async fn test_probe_without_address() {
        let prober = Arc::new(ScriptedProber::always_up());
        let m = Monitor::new(prober.clone(), MonitorSettings::default());

        let err = m.probe_once(&target(4, None)).await.unwrap_err();
        assert!(matches!(err, MonitorError::MissingAddress(4)));
        assert_eq!(prober.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flapping_burst() {
        let m = monitor(ScriptedProber::new(vec![up(10.0), down(), up(20.0), down(), up(30.0)]));
        let t = target(7, Some("10.0.0.7"));

        let started = tokio::time::Instant::now();
        let view = run_burst(&m, &t).await.unwrap();
        // Four pauses, none after the last probe.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4100), "{:?}", elapsed);

        assert_eq!(view.phase, BurstPhase::Idle);
        assert_eq!(view.history.len(), 5);
        assert_eq!(view.flapping, Some(4));
        assert_eq!(view.stats.success_rate_pct, 60.0);
        assert_eq!(view.stats.average_response_ms, Some(20.0));
        assert_eq!(view.stats.packet_loss_pct, 40.0);
        assert!(view.finished_at.is_some());

        assert_eq!(m.flap_count(7).await, 1);
        let events = m.flap_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition_count, 4);
        assert_eq!(events[0].window_size, 5);

        let logs = m.logs(Some(7)).await;
        assert_eq!(logs.len(), 6);
        assert_eq!(logs[0].event_type, LogEventType::Flapping);
        assert_eq!(
            logs[0].message,
            "Network flapping detected - 4 status changes in 5 pings"
        );
        assert!(logs[0].id.starts_with("log-flap-"));
        assert!(logs[1..].iter().all(|l| l.event_type == LogEventType::Ping));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_burst_does_not_flap() {
        let m = monitor(ScriptedProber::always_up());
        let t = target(8, Some("10.0.0.8"));

        let view = run_burst(&m, &t).await.unwrap();
        assert_eq!(view.flapping, None);
        assert_eq!(view.stats.success_rate_pct, 100.0);
        assert_eq!(m.flap_count(8).await, 0);
        assert_eq!(m.logs(Some(8)).await.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flap_counter_only_grows() {
        let m = monitor(ScriptedProber::new(vec![
            up(1.0),
            down(),
            up(1.0),
            up(1.0),
            up(1.0),
            // second burst: stable
            up(1.0),
            up(1.0),
            up(1.0),
            up(1.0),
            up(1.0),
            // third burst: flapping again
            down(),
            up(1.0),
            down(),
            down(),
            down(),
        ]));
        let t = target(9, Some("10.0.0.9"));

        run_burst(&m, &t).await.unwrap();
        assert_eq!(m.flap_count(9).await, 1);
        run_burst(&m, &t).await.unwrap();
        assert_eq!(m.flap_count(9).await, 1);
        run_burst(&m, &t).await.unwrap();
        assert_eq!(m.flap_count(9).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_survives_execution_errors() {
        let m = monitor(ScriptedProber::new(vec![
            up(3.0),
            Err(ProbeError::Network("connection reset".to_string())),
            up(3.0),
            up(3.0),
            up(3.0),
        ]));
        let t = target(10, Some("10.0.0.10"));

        let view = run_burst(&m, &t).await.unwrap();
        assert_eq!(view.phase, BurstPhase::Idle);
        assert_eq!(view.history.len(), 4);
        assert_eq!(m.logs(Some(10)).await.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_view_and_overlap_rejection() {
        let m = monitor(ScriptedProber::always_up());
        let t = target(11, Some("10.0.0.11"));

        let ticket = m.begin_burst(&t).await.unwrap();
        assert_eq!(ticket.target().id, 11);
        let runner = {
            let m = m.clone();
            tokio::spawn(async move { m.drive_burst(ticket).await })
        };

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let view = m.burst_view(11).await.unwrap();
        assert_eq!(view.phase, BurstPhase::Probing { attempted: 2 });
        assert_eq!(view.history.len(), 2);
        assert!(view.latest.is_some());

        assert!(matches!(
            m.begin_burst(&t).await,
            Err(MonitorError::BurstInProgress(11))
        ));

        let done = runner.await.unwrap().unwrap();
        assert_eq!(done.history.len(), 5);
        assert!(!m.burst_view(11).await.unwrap().phase.is_probing());
    }

    #[tokio::test]
    async fn test_burst_without_address() {
        let m = monitor(ScriptedProber::always_up());
        let err = run_burst(&m, &target(12, None)).await.unwrap_err();
        assert!(matches!(err, MonitorError::MissingAddress(12)));
        assert!(m.burst_view(12).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_claim_rejected_before_probing() {
        let prober = Arc::new(ScriptedProber::always_up());
        let m = Arc::new(Monitor::new(prober.clone(), MonitorSettings::default()));
        let t = target(13, Some("10.0.0.13"));

        let ticket = m.begin_burst(&t).await.unwrap();
        let runner = {
            let m = m.clone();
            tokio::spawn(async move { m.drive_burst(ticket).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        let calls_before = prober.calls();
        for _ in 0..3 {
            assert!(matches!(
                m.begin_burst(&t).await,
                Err(MonitorError::BurstInProgress(13))
            ));
        }
        assert_eq!(prober.calls(), calls_before);

        let view = runner.await.unwrap().unwrap();
        assert_eq!(view.history.len(), 5);
        assert_eq!(prober.calls(), 5);
        assert_eq!(m.logs(Some(13)).await.len(), 5);

        // A finished burst can be claimed again.
        let view = run_burst(&m, &t).await.unwrap();
        assert_eq!(view.history.len(), 5);
        assert_eq!(prober.calls(), 10);
    }

    #[tokio::test]
    async fn test_log_is_capped_globally() {
        let m = monitor(ScriptedProber::always_up());
        for i in 0..100 {
            m.record_event(i % 3, LogEventType::Info, format!("event {}", i)).await;
        }
        let oldest = m.logs(None).await.last().cloned().unwrap();
        assert_eq!(oldest.message, "event 0");

        m.record_event(1, LogEventType::Alert, "event 100").await;
        let logs = m.logs(None).await;
        assert_eq!(logs.len(), 100);
        assert_eq!(logs[0].message, "event 100");
        assert_eq!(logs[99].message, "event 1");

        let filtered = m.logs(Some(1)).await;
        assert!(filtered.iter().all(|e| e.target_id == 1));
    }
}
