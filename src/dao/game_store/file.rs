//! Filesystem backend: one JSON document per game code.

use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use tokio::fs;

use crate::{
    dao::{
        game_store::GameStore,
        models::GameRecord,
        storage::{StorageError, StorageResult, ensure_valid_key},
    },
    state::game::Game,
};

/// Stores each game as `<dir>/<code>.json`, written atomically through a temp file.
#[derive(Clone)]
pub struct FileGameStore {
    dir: Arc<PathBuf>,
}

impl FileGameStore {
    /// Open the store, creating `dir` when missing.
    pub async fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let store = Self {
            dir: Arc::new(dir.into()),
        };
        store.ensure_dir().await?;
        Ok(store)
    }

    fn path_for(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.json"))
    }

    async fn ensure_dir(&self) -> StorageResult<()> {
        fs::create_dir_all(self.dir.as_ref()).await.map_err(|err| {
            StorageError::unavailable(
                format!("cannot create store directory `{}`", self.dir.display()),
                err,
            )
        })
    }
}

impl GameStore for FileGameStore {
    fn save_game(&self, code: String, game: Game) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            ensure_valid_key(&code)?;
            let path = store.path_for(&code);
            let tmp = path.with_extension("json.tmp");
            let record = GameRecord::new(code.clone(), game);
            let payload = serde_json::to_vec_pretty(&record)
                .map_err(|source| StorageError::Corrupted { key: code, source })?;

            fs::write(&tmp, payload).await.map_err(|err| {
                StorageError::unavailable(format!("cannot write `{}`", tmp.display()), err)
            })?;
            fs::rename(&tmp, &path).await.map_err(|err| {
                StorageError::unavailable(format!("cannot replace `{}`", path.display()), err)
            })
        })
    }

    fn find_game(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Game>>> {
        let store = self.clone();
        Box::pin(async move {
            ensure_valid_key(&code)?;
            let path = store.path_for(&code);
            let contents = match fs::read(&path).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    return Err(StorageError::unavailable(
                        format!("cannot read `{}`", path.display()),
                        err,
                    ));
                }
            };

            let record: GameRecord = serde_json::from_slice(&contents)
                .map_err(|source| StorageError::Corrupted { key: code, source })?;
            Ok(Some(record.game))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let metadata = fs::metadata(store.dir.as_ref()).await.map_err(|err| {
                StorageError::unavailable(
                    format!("store directory `{}` unreachable", store.dir.display()),
                    err,
                )
            })?;
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(StorageError::unavailable(
                    format!("`{}` is not a directory", store.dir.display()),
                    std::io::Error::from(ErrorKind::NotADirectory),
                ))
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_dir().await })
    }
}
