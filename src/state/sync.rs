//! Live replication of hosted games to spectators.
//!
//! Snapshots are replicated wholesale: a spectator replaces its copy with every frame it
//! receives and never merges fields.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use utoipa::ToSchema;

use crate::state::{clock::RunState, game::Game, state_machine::SessionPhase};

/// Broadcast-ready view of a hosted game at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Six digit game code.
    pub code: String,
    /// Increases by one with every publish of the game.
    pub revision: u64,
    /// Full game record.
    pub game: Game,
    /// Clocks currently ticking.
    pub run: RunState,
    /// Session phase.
    pub phase: SessionPhase,
    /// Shot clock reading at or below the warning threshold.
    pub shot_clock_warning: bool,
}

/// Receiver of every snapshot a host session publishes.
///
/// Implementations must not block: the host keeps its lock while publishing.
pub trait SnapshotSink: Send + Sync {
    /// Hand over a snapshot for persistence and fan-out.
    fn publish(&self, snapshot: GameSnapshot);
}

/// Handle on the latest snapshot of one game.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<GameSnapshot>>>;

/// Key-value live store: the latest snapshot per game code plus change notifications.
#[derive(Default)]
pub struct SnapshotHub {
    channels: DashMap<String, watch::Sender<Option<Arc<GameSnapshot>>>>,
}

impl SnapshotHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot for the game and wake every subscriber.
    pub fn publish(&self, snapshot: GameSnapshot) {
        let sender = self
            .channels
            .entry(snapshot.code.clone())
            .or_insert_with(|| watch::channel(None).0);
        sender.send_replace(Some(Arc::new(snapshot)));
    }

    /// Store `snapshot` only when nothing was published for that code yet.
    pub fn seed(&self, snapshot: GameSnapshot) {
        let sender = self
            .channels
            .entry(snapshot.code.clone())
            .or_insert_with(|| watch::channel(None).0);
        sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::new(snapshot));
            true
        });
    }

    /// Latest snapshot published for `code`.
    pub fn latest(&self, code: &str) -> Option<Arc<GameSnapshot>> {
        self.channels
            .get(code)
            .and_then(|sender| sender.borrow().clone())
    }

    /// Subscribe to the snapshots of `code`. The receiver starts marked as changed so the
    /// current value is delivered first.
    pub fn subscribe(&self, code: &str) -> SnapshotReceiver {
        let sender = self
            .channels
            .entry(code.to_string())
            .or_insert_with(|| watch::channel(None).0);
        let mut receiver = sender.subscribe();
        receiver.mark_changed();
        receiver
    }
}

/// Live subscription owned by a spectator; dropping it stops the forwarder.
pub struct Subscription {
    code: String,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    /// Wrap the task forwarding snapshots of `code` to the spectator.
    pub fn new(code: String, forwarder: JoinHandle<()>) -> Self {
        Self { code, forwarder }
    }

    /// Game code this subscription follows.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Per-connection spectator bookkeeping: at most one live subscription at a time.
#[derive(Default)]
pub struct SpectatorSession {
    current: Option<Subscription>,
}

impl SpectatorSession {
    /// Create a spectator that is not watching anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detach the previous subscription, if any, then attach `subscription`.
    pub fn attach(&mut self, subscription: Subscription) {
        self.detach();
        self.current = Some(subscription);
    }

    /// Stop the current subscription, returning the code it followed.
    pub fn detach(&mut self) -> Option<String> {
        self.current.take().map(|subscription| subscription.code.clone())
    }

    /// Code currently watched.
    pub fn watching(&self) -> Option<&str> {
        self.current.as_ref().map(Subscription::code)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::state::game::{Rosters, tests::settings};

    fn snapshot(code: &str, revision: u64) -> GameSnapshot {
        GameSnapshot {
            code: code.into(),
            revision,
            game: Game::new(Uuid::nil(), settings(12, 24), Rosters::default()),
            run: RunState::default(),
            phase: SessionPhase::Idle,
            shot_clock_warning: false,
        }
    }

    #[tokio::test]
    async fn subscriber_sees_current_then_updates() {
        let hub = SnapshotHub::new();
        hub.publish(snapshot("123456", 1));

        let mut receiver = hub.subscribe("123456");
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().as_ref().unwrap().revision, 1);

        hub.publish(snapshot("123456", 2));
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().as_ref().unwrap().revision, 2);
    }

    #[test]
    fn unknown_code_has_no_snapshot() {
        let hub = SnapshotHub::new();
        assert!(hub.latest("999999").is_none());
        let _receiver = hub.subscribe("999999");
        assert!(hub.latest("999999").is_none());
    }

    #[test]
    fn seed_never_overrides_a_live_snapshot() {
        let hub = SnapshotHub::new();
        hub.seed(snapshot("111111", 3));
        hub.seed(snapshot("111111", 1));
        assert_eq!(hub.latest("111111").unwrap().revision, 3);

        hub.publish(snapshot("111111", 4));
        assert_eq!(hub.latest("111111").unwrap().revision, 4);
    }

    #[tokio::test]
    async fn attaching_detaches_the_previous_subscription() {
        let mut spectator = SpectatorSession::new();
        let first = tokio::spawn(std::future::pending::<()>());
        let first_abort = first.abort_handle();
        spectator.attach(Subscription::new("111111".into(), first));

        let second = tokio::spawn(std::future::pending::<()>());
        spectator.attach(Subscription::new("222222".into(), second));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(first_abort.is_finished());
        assert_eq!(spectator.watching(), Some("222222"));

        assert_eq!(spectator.detach().as_deref(), Some("222222"));
        assert!(spectator.watching().is_none());
    }
}
