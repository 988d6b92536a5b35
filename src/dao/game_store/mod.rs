#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod file;
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;
use crate::state::game::Game;

/// Durable store of game records keyed by game code.
pub trait GameStore: Send + Sync {
    /// Write the full record of `code`, replacing any previous version.
    fn save_game(&self, code: String, game: Game) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the record of `code`, `None` when nothing was ever stored.
    fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Game>>>;
    /// Cheap health check used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
