//! Background liveness sweep over every registered target.

use super::Monitor;
use crate::registry::TargetRegistry;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// Owns the sweep timers: a one-shot startup sweep and a repeating one.
///
/// `stop()` aborts both timers along with any sweep cycle still in flight,
/// so nothing is written to the monitor afterwards. Dropping the scheduler
/// stops it as well.
pub struct SweepScheduler {
    monitor: Arc<Monitor>,
    registry: Arc<dyn TargetRegistry>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SweepScheduler {
    pub fn new(monitor: Arc<Monitor>, registry: Arc<dyn TargetRegistry>) -> Self {
        Self {
            monitor,
            registry,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Arm the startup and periodic timers. Calling it again while running
    /// is a no-op.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            return;
        }

        let settings = self.monitor.settings();
        let initial_delay = settings.sweep_initial_delay;
        let period = settings.sweep_interval;

        tracing::info!(
            "Sweep scheduler: first sweep in {:?}, then every {:?}",
            initial_delay,
            period
        );

        let monitor = self.monitor.clone();
        let registry = self.registry.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            tracing::info!("Running initial sweep");
            run_sweep(&monitor, registry.as_ref()).await;
        }));

        let monitor = self.monitor.clone();
        let registry = self.registry.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tracing::info!("Running periodic sweep");
                run_sweep(&monitor, registry.as_ref()).await;
            }
        }));
    }

    /// Cancel both timers and any sweep in progress.
    pub fn stop(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.is_empty() {
            return;
        }
        for handle in handles.drain(..) {
            handle.abort();
        }
        tracing::info!("Sweep scheduler stopped");
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Probe every target that has an address once, concurrently.
///
/// Returns how many probes executed. A registry failure skips the whole
/// cycle; a probe that fails to execute skips only its target.
pub async fn run_sweep(monitor: &Arc<Monitor>, registry: &dyn TargetRegistry) -> usize {
    let targets = match registry.list_targets().await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Sweep: failed to list targets: {}", e);
            return 0;
        }
    };

    let mut probes = JoinSet::new();
    for target in targets {
        if target.probe_address().is_none() {
            tracing::debug!("Sweep: skipping {} (no address)", target.display_name);
            continue;
        }

        let monitor = monitor.clone();
        probes.spawn(async move {
            // Add jitter to avoid thundering herd
            let jitter = rand::random::<u64>() % 100;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            match monitor.probe_once(&target).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Sweep: probe failed for {}: {}", target.display_name, e);
                    false
                }
            }
        });
    }

    let mut executed = 0;
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(true) => executed += 1,
            Ok(false) => {}
            Err(e) => tracing::error!("Sweep: probe task failed: {}", e),
        }
    }
    executed
}
