use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect the storage backend and keep it supervised for the lifetime of the process.
///
/// The store is removed from the shared state (degraded mode) as soon as a health check
/// fails, and reinstalled once a reconnect succeeds. After [`MAX_RECONNECT_ATTEMPTS`]
/// failed reconnects the backend is rebuilt from scratch through `connect`.
pub async fn run<F, Fut>(state: SharedState, backend: &'static str, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!(backend, "storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, backend, store).await;
                warn!(backend, "exhausted storage reconnect attempts; rebuilding backend");
            }
            Err(err) => {
                warn!(backend, error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store until reconnecting fails for good.
async fn supervise(state: &SharedState, backend: &'static str, store: Arc<dyn GameStore>) {
    loop {
        sleep(HEALTH_POLL_INTERVAL).await;
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!(backend, "storage healthy again; leaving degraded mode");
                    state.set_game_store(store.clone()).await;
                }
            }
            Err(err) => {
                warn!(backend, error = %err, "storage health check failed; entering degraded mode");
                state.clear_game_store().await;
                if reconnect(backend, store.as_ref()).await {
                    state.set_game_store(store.clone()).await;
                } else {
                    return;
                }
            }
        }
    }
}

async fn reconnect(backend: &'static str, store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(backend, attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                warn!(backend, attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
