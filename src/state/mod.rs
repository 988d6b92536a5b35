pub mod clock;
pub mod game;
pub mod session;
mod sse;
pub mod state_machine;
pub mod sync;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use tracing::info;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    dto::sse::SystemStatus,
    error::ServiceError,
    services::publisher::Publisher,
};

pub use self::session::HostSession;
pub use self::sse::SseHub;
use self::sync::{SnapshotHub, SnapshotSink};

/// Shared handle on the application state.
pub type SharedState = Arc<AppState>;
/// Slot holding the storage backend; empty while degraded.
pub type StoreSlot = Arc<RwLock<Option<Arc<dyn GameStore>>>>;

const MIRROR_CAPACITY: usize = 64;

/// Central application state: live host sessions, the storage backend and the fan-out hubs.
pub struct AppState {
    config: AppConfig,
    game_store: StoreSlot,
    degraded: watch::Sender<bool>,
    sessions: DashMap<String, Arc<HostSession>>,
    snapshots: Arc<SnapshotHub>,
    mirror: Arc<SseHub>,
    publisher: Arc<Publisher>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed. Must be
    /// called from within a Tokio runtime: the persistence worker is spawned here.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let game_store: StoreSlot = Arc::new(RwLock::new(None));
        let snapshots = Arc::new(SnapshotHub::new());
        let mirror = Arc::new(SseHub::new(MIRROR_CAPACITY));
        let publisher = Publisher::spawn(snapshots.clone(), mirror.clone(), game_store.clone());

        Arc::new(Self {
            config,
            game_store,
            degraded: degraded_tx,
            sessions: DashMap::new(),
            snapshots,
            mirror,
            publisher,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag and announce it on the mirror stream when it changes.
    pub async fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if !changed {
            return;
        }

        self.mirror
            .broadcast_json("system_status", &SystemStatus { degraded: value });
    }

    /// Registry of live host sessions keyed by game code.
    pub fn sessions(&self) -> &DashMap<String, Arc<HostSession>> {
        &self.sessions
    }

    /// Live session for `code`, if one is hosted.
    pub fn session(&self, code: &str) -> Option<Arc<HostSession>> {
        self.sessions.get(code).map(|entry| entry.value().clone())
    }

    /// Latest snapshot per game code, used by remote spectators.
    pub fn snapshots(&self) -> &SnapshotHub {
        &self.snapshots
    }

    /// Hub behind the same-device mirror stream.
    pub fn mirror(&self) -> &SseHub {
        &self.mirror
    }

    /// Sink handed to every host session.
    pub fn snapshot_sink(&self) -> Arc<dyn SnapshotSink> {
        self.publisher.clone()
    }

    /// Close every hosted session and flush pending persistence before the process exits.
    pub async fn shutdown(&self) {
        let live: Vec<Arc<HostSession>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();
        for session in &live {
            session.close().await;
        }
        info!(closed = live.len(), "hosted sessions closed");
        self.publisher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::game_store::memory::MemoryGameStore, dto::game::CreateGameRequest,
        services::session_service::create_game, state::game::TeamSide,
    };

    #[tokio::test]
    async fn shutdown_persists_the_final_state_of_live_games() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.set_game_store(Arc::new(store.clone())).await;
        let code = create_game(&state, CreateGameRequest::default())
            .await
            .unwrap()
            .code;
        state
            .session(&code)
            .unwrap()
            .adjust_score(TeamSide::TeamB, 4)
            .await;

        state.shutdown().await;

        assert!(state.sessions().is_empty());
        let saved = store.find_game(code).await.unwrap().unwrap();
        assert_eq!(saved.game_state.score.team_b, 4);
    }
}
