//! Per-target burst lifecycle.

use serde::Serialize;

/// Where a target is in its interactive burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BurstPhase {
    #[default]
    Idle,
    Probing {
        attempted: usize,
    },
}

impl BurstPhase {
    pub fn is_probing(&self) -> bool {
        matches!(self, BurstPhase::Probing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstEvent {
    Start,
    ProbeAttempted,
    Finish,
}

/// Apply `event` to `phase`. Returns `None` for transitions that are not
/// allowed, such as starting a burst that is already running.
pub fn transition(phase: BurstPhase, event: BurstEvent) -> Option<BurstPhase> {
    match (phase, event) {
        (BurstPhase::Idle, BurstEvent::Start) => Some(BurstPhase::Probing { attempted: 0 }),
        (BurstPhase::Probing { attempted }, BurstEvent::ProbeAttempted) => {
            Some(BurstPhase::Probing {
                attempted: attempted + 1,
            })
        }
        (BurstPhase::Probing { .. }, BurstEvent::Finish) => Some(BurstPhase::Idle),
        _ => None,
    }
}
