use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::state::game::Game;

/// Stored form of a game: the full record keyed by its code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Six digit game code.
    pub code: String,
    /// RFC 3339 timestamp of the write.
    pub saved_at: String,
    /// Full game record, exactly as replicated to spectators.
    pub game: Game,
}

impl GameRecord {
    /// Stamp `game` with the current time.
    pub fn new(code: String, game: Game) -> Self {
        Self {
            code,
            saved_at: now_rfc3339(),
            game,
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
