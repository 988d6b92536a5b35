//! In-process backend, used when no durable storage is wanted and in tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::{
    dao::{
        game_store::GameStore,
        models::GameRecord,
        storage::{StorageError, StorageResult, ensure_valid_key},
    },
    state::game::Game,
};

#[derive(Debug, thiserror::Error)]
#[error("memory store switched offline")]
struct Offline;

/// Game records held in a concurrent map. Can be switched offline to simulate outages.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    records: Arc<DashMap<String, GameRecord>>,
    offline: Arc<AtomicBool>,
}

impl MemoryGameStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored games.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("memory store offline".into(), Offline))
        } else {
            Ok(())
        }
    }
}

impl GameStore for MemoryGameStore {
    fn save_game(&self, code: String, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            ensure_valid_key(&code)?;
            store
                .records
                .insert(code.clone(), GameRecord::new(code, game));
            Ok(())
        })
    }

    fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.records.get(&code).map(|record| record.game.clone()))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}
