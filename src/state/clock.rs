//! Pure clock transition: one call advances the game and shot clocks by one second.
//!
//! Scheduling lives in [`crate::state::session`]; this module never touches timers so
//! every rule can be exercised directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::game::{GameSettings, GameState, GameTime};

/// Wall-clock spacing between two ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Shot clock readings at or below this value raise [`ClockEvent::ShotClockWarning`].
pub const SHOT_CLOCK_WARNING_THRESHOLD: u32 = 5;

/// Which clocks are currently counting down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Game clock ticking.
    pub game_running: bool,
    /// Shot clock ticking.
    pub shot_clock_running: bool,
}

impl RunState {
    /// True when either clock is ticking.
    pub fn any_running(&self) -> bool {
        self.game_running || self.shot_clock_running
    }

    /// Stop both clocks.
    pub fn halt(&mut self) {
        self.game_running = false;
        self.shot_clock_running = false;
    }
}

/// Derived events produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The game clock hit `00:00`; both clocks were stopped.
    PeriodEnded,
    /// The shot clock is at or below the warning threshold.
    ShotClockWarning {
        /// Seconds left on the shot clock after the decrement.
        remaining: u32,
    },
    /// The shot clock was already at zero while running.
    ShotClockViolation,
}

/// Result of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Whether any clock field or run flag changed.
    pub changed: bool,
    /// Events raised during the tick, in the order they happened.
    pub events: Vec<ClockEvent>,
}

impl TickOutcome {
    /// Whether `event` was raised.
    pub fn contains(&self, event: ClockEvent) -> bool {
        self.events.contains(&event)
    }

    /// Whether the shot clock warning level is active after this tick.
    pub fn warning_active(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, ClockEvent::ShotClockWarning { .. }))
    }
}

/// Advance the clocks by one second.
///
/// Period end wins over the shot clock: when the game clock is exhausted the shot clock
/// is left untouched for that tick. The shot clock never goes below zero; a running shot
/// clock that is already at zero yields [`ClockEvent::ShotClockViolation`] instead.
pub fn tick(state: &mut GameState, settings: &GameSettings, run: &mut RunState) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    if run.game_running {
        if state.game_time.count_down() {
            outcome.changed = true;
        } else {
            run.halt();
            outcome.changed = true;
            outcome.events.push(ClockEvent::PeriodEnded);
            return outcome;
        }
    }

    if run.shot_clock_running && settings.shot_clock_enabled() {
        if state.shot_clock > 0 {
            state.shot_clock -= 1;
            outcome.changed = true;
            if state.shot_clock <= SHOT_CLOCK_WARNING_THRESHOLD {
                outcome.events.push(ClockEvent::ShotClockWarning {
                    remaining: state.shot_clock,
                });
            }
        } else {
            outcome.changed = true;
            outcome.events.push(ClockEvent::ShotClockViolation);
        }
    }

    outcome
}

/// Apply the consequences of a shot clock violation: possession flips, the shot clock
/// goes back to its full duration and stays stopped until the operator restarts it.
pub fn resolve_violation(state: &mut GameState, settings: &GameSettings, run: &mut RunState) {
    state.possession = state.possession.other();
    state.shot_clock = settings.shot_clock_reset_value();
    run.shot_clock_running = false;
}

/// Put both clocks back to their start-of-period values and stop them.
pub fn reset_clocks(state: &mut GameState, settings: &GameSettings, run: &mut RunState) {
    state.game_time = GameTime::full_period(settings.period_duration);
    state.shot_clock = settings.shot_clock_reset_value();
    run.halt();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{TeamSide, tests::settings};

    fn running() -> RunState {
        RunState {
            game_running: true,
            shot_clock_running: true,
        }
    }

    fn state_at(settings: &GameSettings, minutes: u32, seconds: u32, shot: u32) -> GameState {
        let mut state = GameState::initial(settings);
        state.game_time = GameTime::new(minutes, seconds).unwrap();
        state.shot_clock = shot;
        state
    }

    #[test]
    fn seconds_decrement_without_touching_minutes() {
        let settings = settings(12, 24);
        for seconds in 1..=59 {
            let mut state = state_at(&settings, 4, seconds, 24);
            let mut run = running();
            let outcome = tick(&mut state, &settings, &mut run);
            assert!(outcome.changed);
            assert_eq!(state.game_time, GameTime::new(4, seconds - 1).unwrap());
            assert!(run.game_running);
        }
    }

    #[test]
    fn zero_seconds_borrow_a_minute() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 5, 0, 24);
        let mut run = running();
        tick(&mut state, &settings, &mut run);
        assert_eq!(state.game_time, GameTime::new(4, 59).unwrap());
    }

    #[test]
    fn exhausted_game_clock_ends_period_and_freezes_shot_clock() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 0, 0, 1);
        let mut run = running();
        let outcome = tick(&mut state, &settings, &mut run);

        assert_eq!(outcome.events, vec![ClockEvent::PeriodEnded]);
        assert!(outcome.changed);
        assert_eq!(run, RunState::default());
        assert_eq!(state.shot_clock, 1);
    }

    #[test]
    fn period_end_beats_shot_clock_at_zero() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 0, 0, 0);
        let mut run = running();
        let outcome = tick(&mut state, &settings, &mut run);

        assert!(outcome.contains(ClockEvent::PeriodEnded));
        assert!(!outcome.contains(ClockEvent::ShotClockViolation));
        assert_eq!(state.possession, TeamSide::TeamA);
    }

    #[test]
    fn warning_is_reported_on_every_tick_at_or_below_threshold() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 5, 0, 7);
        let mut run = running();

        assert!(!tick(&mut state, &settings, &mut run).warning_active());
        let outcome = tick(&mut state, &settings, &mut run);
        assert_eq!(
            outcome.events,
            vec![ClockEvent::ShotClockWarning { remaining: 5 }]
        );
        assert!(tick(&mut state, &settings, &mut run).warning_active());
        assert_eq!(state.shot_clock, 4);
    }

    #[test]
    fn shot_clock_at_zero_raises_violation_without_decrement() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 5, 0, 0);
        let mut run = running();
        let outcome = tick(&mut state, &settings, &mut run);

        assert!(outcome.contains(ClockEvent::ShotClockViolation));
        assert_eq!(state.shot_clock, 0);
        assert_eq!(state.game_time, GameTime::new(4, 59).unwrap());
    }

    #[test]
    fn violation_resolution_flips_possession_and_stops_shot_clock() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 5, 0, 0);
        let mut run = running();
        resolve_violation(&mut state, &settings, &mut run);

        assert_eq!(state.possession, TeamSide::TeamB);
        assert_eq!(state.shot_clock, 24);
        assert!(!run.shot_clock_running);
        assert!(run.game_running);
    }

    #[test]
    fn disabled_shot_clock_never_changes() {
        let settings = settings(12, 0);
        let mut state = state_at(&settings, 5, 0, 0);
        let mut run = running();
        for _ in 0..30 {
            let outcome = tick(&mut state, &settings, &mut run);
            assert!(outcome.events.is_empty());
            assert_eq!(state.shot_clock, 0);
        }
    }

    #[test]
    fn paused_tick_is_a_no_op() {
        let settings = settings(12, 0);
        let mut state = GameState::initial(&settings);
        let before = state.clone();
        let mut run = RunState::default();
        let outcome = tick(&mut state, &settings, &mut run);

        assert!(!outcome.changed);
        assert_eq!(state, before);
    }

    #[test]
    fn reset_restores_start_of_period_values() {
        let settings = settings(12, 24);
        let mut state = state_at(&settings, 3, 17, 2);
        let mut run = running();
        reset_clocks(&mut state, &settings, &mut run);

        assert_eq!(state.game_time, GameTime::full_period(12));
        assert_eq!(state.shot_clock, 24);
        assert_eq!(run, RunState::default());
    }
}
