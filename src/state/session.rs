//! Host-side session controller.
//!
//! A [`HostSession`] owns one game record, the run flags, and the single clock task
//! driving it. Every operation runs under the session lock and ends with exactly one
//! publish; a clock tick publishes only when it changed something.

use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{
    clock::{self, ClockEvent, RunState, SHOT_CLOCK_WARNING_THRESHOLD, TICK_PERIOD},
    game::{Game, GameTime, TeamSide},
    state_machine::{SessionEvent, SessionPhase, SessionStateMachine},
    sync::{GameSnapshot, SnapshotSink},
};

/// Operator actions rejected by the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The game was created without a shot clock.
    #[error("shot clock is disabled for this game")]
    ShotClockDisabled,
    /// Requested shot clock value exceeds the configured duration.
    #[error("shot clock value {value}s exceeds the configured {duration}s")]
    ShotClockOutOfRange {
        /// Requested value.
        value: u32,
        /// Configured duration.
        duration: u32,
    },
}

/// The clock task currently attached to a session, if any.
///
/// `generation` is bumped on every start and stop; a tick only applies while its
/// generation is still current, so nothing mutates the game once `cancel` returned.
#[derive(Default)]
struct ClockTask {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ClockTask {
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forget the task without aborting it; used from inside the task itself.
    fn release(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.handle.take();
    }

    fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

struct SessionContext {
    game: Game,
    run: RunState,
    machine: SessionStateMachine,
    shot_clock_warning: bool,
    revision: u64,
    clock: ClockTask,
}

impl SessionContext {
    fn snapshot(&self, code: &str) -> GameSnapshot {
        GameSnapshot {
            code: code.to_string(),
            revision: self.revision,
            game: self.game.clone(),
            run: self.run,
            phase: self.machine.phase(),
            shot_clock_warning: self.shot_clock_warning,
        }
    }
}

/// Authoritative session for one hosted game.
pub struct HostSession {
    code: String,
    host_token: String,
    context: Mutex<SessionContext>,
    sink: Arc<dyn SnapshotSink>,
}

impl HostSession {
    /// Open a session for a freshly created game.
    pub fn new(code: String, game: Game, sink: Arc<dyn SnapshotSink>) -> Arc<Self> {
        Self::build(code, game, SessionStateMachine::new(), 0, sink)
    }

    /// Reopen a stored game. Clocks start stopped; the phase is `Paused` unless both clocks
    /// still show their start-of-period values. Revisions continue after `last_revision`.
    pub fn resume(
        code: String,
        game: Game,
        last_revision: u64,
        sink: Arc<dyn SnapshotSink>,
    ) -> Arc<Self> {
        let phase = if game.game_state.clocks_at_start(&game.settings) {
            SessionPhase::Idle
        } else {
            SessionPhase::Paused
        };
        Self::build(
            code,
            game,
            SessionStateMachine::resumed_at(phase),
            last_revision,
            sink,
        )
    }

    fn build(
        code: String,
        game: Game,
        machine: SessionStateMachine,
        revision: u64,
        sink: Arc<dyn SnapshotSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            code,
            host_token: Uuid::new_v4().simple().to_string(),
            context: Mutex::new(SessionContext {
                game,
                run: RunState::default(),
                machine,
                shot_clock_warning: false,
                revision,
                clock: ClockTask::default(),
            }),
            sink,
        })
    }

    /// Game code of the session.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Token the host must present on every control request.
    pub fn host_token(&self) -> &str {
        &self.host_token
    }

    /// Check a token presented by a caller.
    pub fn verify_token(&self, token: &str) -> bool {
        self.host_token == token
    }

    /// Current state without publishing.
    pub async fn snapshot(&self) -> GameSnapshot {
        self.context.lock().await.snapshot(&self.code)
    }

    /// Publish the current state as is, e.g. right after the session was opened.
    pub async fn announce(&self) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        self.publish(&mut guard)
    }

    /// Pause when either clock runs, otherwise start the game clock (and the shot clock
    /// when it is enabled and has time left).
    pub async fn toggle_run(self: &Arc<Self>) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;

        if ctx.run.any_running() {
            ctx.run.halt();
            ctx.clock.cancel();
            self.transition(ctx, SessionEvent::Pause);
            info!(code = %self.code, time = %ctx.game.game_state.game_time, "clocks paused");
        } else {
            let settings = &ctx.game.settings;
            ctx.run.game_running = true;
            ctx.run.shot_clock_running =
                settings.shot_clock_enabled() && ctx.game.game_state.shot_clock > 0;
            self.start_clock(ctx);
            self.transition(ctx, SessionEvent::Start);
            info!(
                code = %self.code,
                time = %ctx.game.game_state.game_time,
                shot_clock = ctx.run.shot_clock_running,
                "clocks started"
            );
        }

        self.publish(ctx)
    }

    /// Put both clocks back to their start-of-period values and stop them.
    pub async fn reset_clocks(&self) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;

        ctx.clock.cancel();
        clock::reset_clocks(&mut ctx.game.game_state, &ctx.game.settings, &mut ctx.run);
        ctx.shot_clock_warning = false;
        self.transition(ctx, SessionEvent::Reset);
        info!(code = %self.code, "clocks reset");

        self.publish(ctx)
    }

    /// Set the shot clock to `seconds` (full duration by default). It resumes ticking only
    /// when the game clock is running.
    pub async fn restart_shot_clock(
        &self,
        seconds: Option<u32>,
    ) -> Result<GameSnapshot, SessionError> {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;

        let duration = ctx.game.settings.shot_clock_duration;
        if duration == 0 {
            return Err(SessionError::ShotClockDisabled);
        }
        let value = seconds.unwrap_or(duration);
        if value > duration {
            return Err(SessionError::ShotClockOutOfRange { value, duration });
        }

        ctx.game.game_state.shot_clock = value;
        ctx.shot_clock_warning = false;
        ctx.run.shot_clock_running = ctx.run.game_running && value > 0;
        if ctx.run.shot_clock_running {
            self.transition(ctx, SessionEvent::ShotClockRestarted);
        }
        debug!(code = %self.code, value, running = ctx.run.shot_clock_running, "shot clock restarted");

        Ok(self.publish(ctx))
    }

    /// Overwrite the game clock reading.
    pub async fn set_game_clock(&self, time: GameTime) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        ctx.game.game_state.game_time = time;
        debug!(code = %self.code, %time, "game clock set");
        self.publish(ctx)
    }

    /// Add `delta` points to `team`, never going below zero.
    pub async fn adjust_score(&self, team: TeamSide, delta: i32) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let score = guard.game.game_state.score.apply_delta(team, delta);
        debug!(code = %self.code, %team, delta, score, "score adjusted");
        self.publish(&mut guard)
    }

    /// Add `delta` team fouls, never going below zero.
    pub async fn adjust_fouls(&self, team: TeamSide, delta: i32) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let fouls = guard.game.game_state.fouls.apply_delta(team, delta);
        debug!(code = %self.code, %team, delta, fouls, "fouls adjusted");
        self.publish(&mut guard)
    }

    /// Add `delta` remaining timeouts, never going below zero.
    pub async fn adjust_timeouts(&self, team: TeamSide, delta: i32) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let timeouts = guard.game.game_state.timeouts.apply_delta(team, delta);
        debug!(code = %self.code, %team, delta, timeouts, "timeouts adjusted");
        self.publish(&mut guard)
    }

    /// Give the ball to `team`.
    pub async fn set_possession(&self, team: TeamSide) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        guard.game.game_state.possession = team;
        debug!(code = %self.code, %team, "possession set");
        self.publish(&mut guard)
    }

    /// Give the ball to the other team.
    pub async fn toggle_possession(&self) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let team = guard.game.game_state.possession.other();
        guard.game.game_state.possession = team;
        debug!(code = %self.code, %team, "possession toggled");
        self.publish(&mut guard)
    }

    /// Stop the clock for good and publish a final, paused snapshot.
    pub async fn close(&self) -> GameSnapshot {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        ctx.clock.cancel();
        if ctx.run.any_running() {
            ctx.run.halt();
            self.transition(ctx, SessionEvent::Pause);
        }
        info!(code = %self.code, "session closed");
        self.publish(ctx)
    }

    /// Replace any running clock task with a fresh one.
    fn start_clock(self: &Arc<Self>, ctx: &mut SessionContext) {
        ctx.clock.cancel();
        let generation = ctx.clock.generation;
        let session = Arc::downgrade(self);
        ctx.clock.handle = Some(tokio::spawn(run_clock(session, generation)));
    }

    /// Apply one tick if `generation` is still the active clock. Returns whether the
    /// clock task should keep going.
    async fn tick(&self, generation: u64) -> bool {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        if ctx.clock.generation != generation {
            return false;
        }

        let outcome = clock::tick(&mut ctx.game.game_state, &ctx.game.settings, &mut ctx.run);
        let mut keep_running = true;

        for event in &outcome.events {
            match event {
                ClockEvent::PeriodEnded => {
                    info!(code = %self.code, period = ctx.game.game_state.period, "period ended");
                    self.transition(ctx, SessionEvent::PeriodEnded);
                    ctx.clock.release();
                    keep_running = false;
                }
                ClockEvent::ShotClockViolation => {
                    clock::resolve_violation(
                        &mut ctx.game.game_state,
                        &ctx.game.settings,
                        &mut ctx.run,
                    );
                    self.transition(ctx, SessionEvent::Violation);
                    info!(
                        code = %self.code,
                        possession = %ctx.game.game_state.possession,
                        "shot clock violation"
                    );
                }
                ClockEvent::ShotClockWarning { .. } => {}
            }
        }
        ctx.shot_clock_warning = if keep_running {
            outcome.warning_active()
        } else {
            // Period end freezes the shot clock; the warning keeps tracking its reading.
            ctx.game.settings.shot_clock_enabled()
                && ctx.game.game_state.shot_clock <= SHOT_CLOCK_WARNING_THRESHOLD
        };

        if outcome.changed {
            self.publish(ctx);
        }
        keep_running
    }

    fn transition(&self, ctx: &mut SessionContext, event: SessionEvent) {
        if let Err(err) = ctx.machine.apply(event) {
            warn!(code = %self.code, error = %err, "ignoring session phase transition");
        }
    }

    fn publish(&self, ctx: &mut SessionContext) -> GameSnapshot {
        ctx.revision += 1;
        let snapshot = ctx.snapshot(&self.code);
        self.sink.publish(snapshot.clone());
        snapshot
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        let ctx = self.context.get_mut();
        if ctx.clock.is_active() {
            ctx.clock.cancel();
        }
    }
}

/// Clock loop: one tick per [`TICK_PERIOD`], first tick one period after start, missed
/// ticks dropped rather than replayed.
async fn run_clock(session: Weak<HostSession>, generation: u64) {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.tick(generation).await {
            break;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{sync::Mutex as StdMutex, time::Duration};

    use tokio::time::sleep;

    use super::*;
    use crate::state::game::{GameSettings, Rosters, tests::settings};

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        published: StdMutex<Vec<GameSnapshot>>,
    }

    impl RecordingSink {
        pub(crate) fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }

        pub(crate) fn last(&self) -> Option<GameSnapshot> {
            self.published.lock().unwrap().last().cloned()
        }
    }

    impl SnapshotSink for RecordingSink {
        fn publish(&self, snapshot: GameSnapshot) {
            self.published.lock().unwrap().push(snapshot);
        }
    }

    fn session_with(settings: GameSettings) -> (Arc<HostSession>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let game = Game::new(Uuid::new_v4(), settings, Rosters::default());
        let session = HostSession::new("123456".into(), game, sink.clone());
        (session, sink)
    }

    /// Sleep until halfway between two ticks so tick and wake-up never race.
    async fn ticks(count: u64) {
        sleep(TICK_PERIOD * count as u32 + TICK_PERIOD / 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_four_ticks_drain_the_shot_clock_without_violation() {
        let (session, _sink) = session_with(settings(12, 24));
        session.toggle_run().await;

        ticks(24).await;
        let snapshot = session.snapshot().await;
        let state = &snapshot.game.game_state;
        assert_eq!(state.game_time, GameTime::new(11, 36).unwrap());
        assert_eq!(state.shot_clock, 0);
        assert_eq!(state.possession, TeamSide::TeamA);
        assert!(snapshot.run.shot_clock_running);
        assert!(snapshot.shot_clock_warning);
        assert_eq!(snapshot.phase, SessionPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn violation_fires_on_the_tick_after_reaching_zero() {
        let (session, _sink) = session_with(settings(12, 24));
        session.toggle_run().await;

        ticks(25).await;
        let snapshot = session.snapshot().await;
        let state = &snapshot.game.game_state;
        assert_eq!(state.possession, TeamSide::TeamB);
        assert_eq!(state.shot_clock, 24);
        assert_eq!(state.game_time, GameTime::new(11, 35).unwrap());
        assert!(!snapshot.run.shot_clock_running);
        assert!(snapshot.run.game_running);
        assert!(!snapshot.shot_clock_warning);
        assert_eq!(snapshot.phase, SessionPhase::ViolationPause);

        sleep(TICK_PERIOD * 3).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.game.game_state.shot_clock, 24);
        assert_eq!(
            snapshot.game.game_state.game_time,
            GameTime::new(11, 32).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shot_clock_restart_leaves_violation_pause() {
        let (session, _sink) = session_with(settings(12, 24));
        session.toggle_run().await;
        ticks(25).await;

        let snapshot = session.restart_shot_clock(Some(14)).await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Running);
        assert!(snapshot.run.shot_clock_running);

        sleep(TICK_PERIOD * 2).await;
        assert_eq!(session.snapshot().await.game.game_state.shot_clock, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_stop_yields_no_ticks() {
        let (session, sink) = session_with(settings(12, 24));
        session.toggle_run().await;
        session.toggle_run().await;

        ticks(5).await;
        let snapshot = session.snapshot().await;
        assert_eq!(
            snapshot.game.game_state.game_time,
            GameTime::full_period(12)
        );
        assert_eq!(snapshot.phase, SessionPhase::Paused);
        assert_eq!(sink.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_keeps_a_single_clock_loop() {
        let (session, _sink) = session_with(settings(12, 24));
        {
            let mut guard = session.context.lock().await;
            guard.run.game_running = true;
            session.start_clock(&mut guard);
            session.start_clock(&mut guard);
        }

        ticks(10).await;
        assert_eq!(
            session.snapshot().await.game.game_state.game_time,
            GameTime::new(11, 50).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_tick_that_changes_state_publishes_once() {
        let (session, sink) = session_with(settings(12, 24));
        session.toggle_run().await;
        ticks(3).await;
        assert_eq!(sink.count(), 4);

        session.toggle_run().await;
        ticks(3).await;
        assert_eq!(sink.count(), 5);
        assert_eq!(sink.last().unwrap().revision, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn period_end_stops_both_clocks() {
        let (session, _sink) = session_with(settings(12, 24));
        session.set_game_clock(GameTime::new(0, 2).unwrap()).await;
        session.toggle_run().await;

        ticks(4).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::PeriodEnded);
        assert_eq!(snapshot.run, RunState::default());
        assert!(snapshot.game.game_state.game_time.is_exhausted());
        assert_eq!(snapshot.game.game_state.shot_clock, 22);
        assert!(!session.context.lock().await.clock.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn period_end_keeps_the_warning_of_a_low_shot_clock() {
        let (session, _sink) = session_with(settings(12, 24));
        session.set_game_clock(GameTime::new(0, 2).unwrap()).await;
        session.restart_shot_clock(Some(4)).await.unwrap();
        session.toggle_run().await;

        ticks(4).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::PeriodEnded);
        assert_eq!(snapshot.game.game_state.shot_clock, 2);
        assert!(snapshot.shot_clock_warning);

        let snapshot = session.reset_clocks().await;
        assert!(!snapshot.shot_clock_warning);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_clocks_and_stops_ticking() {
        let (session, _sink) = session_with(settings(12, 24));
        session.toggle_run().await;
        ticks(7).await;

        let snapshot = session.reset_clocks().await;
        assert_eq!(snapshot.game.game_state.game_time, GameTime::full_period(12));
        assert_eq!(snapshot.game.game_state.shot_clock, 24);
        assert_eq!(snapshot.run, RunState::default());
        assert_eq!(snapshot.phase, SessionPhase::Idle);

        ticks(3).await;
        assert_eq!(
            session.snapshot().await.game.game_state.game_time,
            GameTime::full_period(12)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_shot_clock_never_runs() {
        let (session, _sink) = session_with(settings(12, 0));
        let snapshot = session.toggle_run().await;
        assert!(snapshot.run.game_running);
        assert!(!snapshot.run.shot_clock_running);

        ticks(30).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.game.game_state.shot_clock, 0);
        assert!(!snapshot.shot_clock_warning);
        assert_eq!(snapshot.phase, SessionPhase::Running);
        assert_eq!(
            session.restart_shot_clock(None).await,
            Err(SessionError::ShotClockDisabled)
        );
    }

    #[tokio::test]
    async fn score_changes_clamp_and_publish_once_each() {
        let (session, sink) = session_with(settings(12, 24));
        let snapshot = session.adjust_score(TeamSide::TeamA, -1).await;
        assert_eq!(snapshot.game.game_state.score.team_a, 0);

        session.adjust_score(TeamSide::TeamB, 3).await;
        session.adjust_score(TeamSide::TeamB, 2).await;
        let snapshot = session.set_possession(TeamSide::TeamB).await;
        assert_eq!(snapshot.game.game_state.score.team_b, 5);
        assert_eq!(snapshot.game.game_state.possession, TeamSide::TeamB);
        assert_eq!(sink.count(), 4);
    }

    #[tokio::test]
    async fn fouls_and_timeouts_never_go_negative() {
        let (session, _sink) = session_with(settings(12, 24));
        session.adjust_fouls(TeamSide::TeamA, 2).await;
        let snapshot = session.adjust_fouls(TeamSide::TeamA, -5).await;
        assert_eq!(snapshot.game.game_state.fouls.team_a, 0);

        let snapshot = session.adjust_timeouts(TeamSide::TeamB, -1).await;
        assert_eq!(snapshot.game.game_state.timeouts.team_b, 4);
    }

    #[tokio::test]
    async fn shot_clock_restart_rejects_values_above_duration() {
        let (session, _sink) = session_with(settings(12, 24));
        assert_eq!(
            session.restart_shot_clock(Some(30)).await,
            Err(SessionError::ShotClockOutOfRange {
                value: 30,
                duration: 24
            })
        );
        let snapshot = session.restart_shot_clock(Some(14)).await.unwrap();
        assert_eq!(snapshot.game.game_state.shot_clock, 14);
        assert!(!snapshot.run.shot_clock_running);
        assert_eq!(snapshot.phase, SessionPhase::Idle);
    }

    #[test]
    fn host_token_is_fresh_per_session() {
        let (first, _) = session_with(settings(12, 24));
        let (second, _) = session_with(settings(12, 24));
        assert_eq!(first.host_token().len(), 32);
        assert!(first.verify_token(first.host_token()));
        assert!(!first.verify_token(second.host_token()));
        assert!(!first.verify_token(""));
    }

    #[tokio::test]
    async fn resumed_session_continues_revisions() {
        let sink = Arc::new(RecordingSink::default());
        let mut game = Game::new(Uuid::new_v4(), settings(12, 24), Rosters::default());
        game.game_state.game_time = GameTime::new(4, 10).unwrap();
        let session = HostSession::resume("654321".into(), game, 41, sink.clone());

        let snapshot = session.announce().await;
        assert_eq!(snapshot.revision, 42);
        assert_eq!(snapshot.phase, SessionPhase::Paused);
        assert_eq!(snapshot.run, RunState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_the_clock() {
        let (session, _sink) = session_with(settings(12, 24));
        session.toggle_run().await;
        ticks(2).await;

        let snapshot = session.close().await;
        assert_eq!(snapshot.phase, SessionPhase::Paused);
        ticks(3).await;
        assert_eq!(
            session.snapshot().await.game.game_state.game_time,
            GameTime::new(11, 58).unwrap()
        );
    }
}
