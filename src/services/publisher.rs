//! Fan-out of published snapshots: live sync, same-device mirror and persistence.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::state::{
    SseHub, StoreSlot,
    sync::{GameSnapshot, SnapshotHub, SnapshotSink},
};

/// SSE event name used for snapshot frames.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// [`SnapshotSink`] shared by every host session.
///
/// Live sync and the mirror are updated inline since both are plain channel sends.
/// Persistence goes through a queue drained by a single worker, which keeps writes in
/// publish order and collapses bursts to the latest snapshot of each game.
pub struct Publisher {
    snapshots: Arc<SnapshotHub>,
    mirror: Arc<SseHub>,
    persist: mpsc::UnboundedSender<GameSnapshot>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Publisher {
    /// Build the publisher and spawn its persistence worker.
    pub fn spawn(snapshots: Arc<SnapshotHub>, mirror: Arc<SseHub>, store: StoreSlot) -> Arc<Self> {
        let (persist, queue) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(persistence_worker(queue, store, stop_rx));
        Arc::new(Self {
            snapshots,
            mirror,
            persist,
            stop,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Save everything queued so far, then stop the persistence worker.
    ///
    /// Snapshots published afterwards still reach live sync and the mirror but are no
    /// longer persisted.
    pub async fn shutdown(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        self.stop.send_replace(true);
        if let Err(err) = worker.await {
            warn!(error = %err, "persistence worker ended abnormally");
        }
        info!("persistence worker flushed and stopped");
    }
}

impl SnapshotSink for Publisher {
    fn publish(&self, snapshot: GameSnapshot) {
        self.mirror.broadcast_json(SNAPSHOT_EVENT, &snapshot);

        if self.persist.send(snapshot.clone()).is_err() {
            warn!(code = %snapshot.code, "persistence worker stopped; snapshot not saved");
        }

        self.snapshots.publish(snapshot);
    }
}

async fn persistence_worker(
    mut queue: mpsc::UnboundedReceiver<GameSnapshot>,
    store: StoreSlot,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let first = tokio::select! {
            biased;
            received = queue.recv() => match received {
                Some(snapshot) => snapshot,
                None => break,
            },
            _ = stop.changed() => {
                let mut pending = IndexMap::new();
                while let Ok(next) = queue.try_recv() {
                    pending.insert(next.code.clone(), next);
                }
                if !pending.is_empty() {
                    persist_batch(&store, pending).await;
                }
                break;
            }
        };

        let mut pending = IndexMap::new();
        pending.insert(first.code.clone(), first);
        while let Ok(next) = queue.try_recv() {
            pending.insert(next.code.clone(), next);
        }
        persist_batch(&store, pending).await;
    }
    debug!("persistence worker stopped");
}

async fn persist_batch(store: &StoreSlot, pending: IndexMap<String, GameSnapshot>) {
    let backend = store.read().await.clone();
    let Some(backend) = backend else {
        warn!(
            games = pending.len(),
            "storage unavailable (degraded mode); skipping persistence"
        );
        return;
    };

    for (code, snapshot) in pending {
        let revision = snapshot.revision;
        match backend.save_game(code.clone(), snapshot.game).await {
            Ok(()) => debug!(%code, revision, "game persisted"),
            Err(err) => warn!(%code, revision, error = %err, "failed to persist game"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::RwLock, time::sleep};
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::game_store::{GameStore, memory::MemoryGameStore},
        state::{
            clock::RunState,
            game::{Game, Rosters, TeamSide, tests::settings},
            state_machine::SessionPhase,
        },
    };

    fn snapshot(code: &str, revision: u64, score: i32) -> GameSnapshot {
        let mut game = Game::new(Uuid::nil(), settings(12, 24), Rosters::default());
        game.game_state.score.apply_delta(TeamSide::TeamA, score);
        GameSnapshot {
            code: code.into(),
            revision,
            game,
            run: RunState::default(),
            phase: SessionPhase::Idle,
            shot_clock_warning: false,
        }
    }

    async fn stored_score(store: &MemoryGameStore, code: &str) -> Option<u32> {
        for _ in 0..100 {
            if let Some(game) = store.find_game(code.into()).await.unwrap() {
                return Some(game.game_state.score.team_a);
            }
            sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn publish_reaches_hub_mirror_and_store() {
        let memory = MemoryGameStore::new();
        let backend: Arc<dyn GameStore> = Arc::new(memory.clone());
        let slot: StoreSlot = Arc::new(RwLock::new(Some(backend)));
        let hub = Arc::new(SnapshotHub::new());
        let mirror = Arc::new(SseHub::new(8));
        let mut mirror_rx = mirror.subscribe();

        let publisher = Publisher::spawn(hub.clone(), mirror, slot);
        publisher.publish(snapshot("424242", 1, 2));

        assert_eq!(hub.latest("424242").unwrap().revision, 1);
        let frame = mirror_rx.recv().await.unwrap();
        assert_eq!(frame.event.as_deref(), Some(SNAPSHOT_EVENT));
        assert!(frame.data.contains("\"revision\":1"));
        assert_eq!(stored_score(&memory, "424242").await, Some(2));
    }

    #[tokio::test]
    async fn last_snapshot_of_a_burst_wins() {
        let memory = MemoryGameStore::new();
        let backend: Arc<dyn GameStore> = Arc::new(memory.clone());
        let slot: StoreSlot = Arc::new(RwLock::new(Some(backend)));
        let publisher = Publisher::spawn(
            Arc::new(SnapshotHub::new()),
            Arc::new(SseHub::new(8)),
            slot,
        );

        for revision in 1..=20 {
            publisher.publish(snapshot("777777", revision, revision as i32));
        }

        for _ in 0..100 {
            if stored_score(&memory, "777777").await == Some(20) {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("latest snapshot was never persisted");
    }

    #[tokio::test]
    async fn degraded_mode_keeps_live_sync() {
        let slot: StoreSlot = Arc::new(RwLock::new(None));
        let hub = Arc::new(SnapshotHub::new());
        let publisher = Publisher::spawn(hub.clone(), Arc::new(SseHub::new(8)), slot);

        publisher.publish(snapshot("313131", 9, 0));
        assert_eq!(hub.latest("313131").unwrap().revision, 9);
    }

    #[tokio::test]
    async fn shutdown_saves_queued_snapshots() {
        let memory = MemoryGameStore::new();
        let backend: Arc<dyn GameStore> = Arc::new(memory.clone());
        let slot: StoreSlot = Arc::new(RwLock::new(Some(backend)));
        let publisher = Publisher::spawn(
            Arc::new(SnapshotHub::new()),
            Arc::new(SseHub::new(8)),
            slot,
        );

        for revision in 1..=5 {
            publisher.publish(snapshot("565656", revision, revision as i32));
        }
        publisher.shutdown().await;

        let saved = memory.find_game("565656".into()).await.unwrap().unwrap();
        assert_eq!(saved.game_state.score.team_a, 5);

        publisher.publish(snapshot("565656", 6, 6));
        publisher.shutdown().await;
        let saved = memory.find_game("565656".into()).await.unwrap().unwrap();
        assert_eq!(saved.game_state.score.team_a, 5);
    }
}
