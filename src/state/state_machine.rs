use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Phases a hosted session moves through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Clocks at rest since creation or the last reset.
    #[default]
    Idle,
    /// Game clock ticking (shot clock too, when it has time left).
    Running,
    /// Operator paused both clocks.
    Paused,
    /// Shot clock expired: game clock keeps running, shot clock waits for a restart.
    ViolationPause,
    /// Game clock reached `00:00`; the operator must reset to continue.
    PeriodEnded,
}

/// Events that drive [`SessionStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Operator started the clocks.
    Start,
    /// Operator paused the clocks.
    Pause,
    /// The shot clock expired while running.
    Violation,
    /// Operator restarted the shot clock by hand.
    ShotClockRestarted,
    /// The game clock ran out.
    PeriodEnded,
    /// Operator reset both clocks.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Validated phase tracking for one hosted session.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    phase: SessionPhase,
}

impl SessionStateMachine {
    /// Create a machine in the idle phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a machine positioned at `phase`, used when a stored game is resumed.
    pub fn resumed_at(phase: SessionPhase) -> Self {
        Self { phase }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase. The phase is left untouched on error.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (self.phase, event) {
            (P::Idle | P::Paused | P::PeriodEnded, E::Start) => P::Running,
            (P::Running | P::ViolationPause, E::Pause) => P::Paused,
            (P::Running, E::Violation) => P::ViolationPause,
            (P::ViolationPause, E::ShotClockRestarted) => P::Running,
            (phase, E::ShotClockRestarted) if phase != P::ViolationPause => phase,
            (P::Running | P::ViolationPause, E::PeriodEnded) => P::PeriodEnded,
            (_, E::Reset) => P::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
