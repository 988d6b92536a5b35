/// Game snapshot storage backends.
pub mod game_store;
/// Stored document definitions.
pub mod models;
/// Storage abstraction layer shared by all backends.
pub mod storage;
