use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::sync::GameSnapshot;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from spectator WebSocket clients.
#[serde(tag = "type")]
pub enum SpectatorInboundMessage {
    /// Follow `code`, replacing whatever game was watched before.
    #[serde(rename = "watch")]
    Watch {
        /// Game code to follow.
        code: String,
    },
    /// Stop following the current game.
    #[serde(rename = "unwatch")]
    Unwatch,
    /// Any other message type; ignored.
    #[serde(other)]
    Unknown,
}

impl SpectatorInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Frames pushed to spectator WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpectatorOutboundMessage {
    /// Subscription switched to `code`.
    Watching {
        /// Game now followed.
        code: String,
    },
    /// Latest state of the followed game; replaces the previous copy.
    Snapshot {
        /// Full snapshot.
        snapshot: GameSnapshot,
    },
    /// Request could not be honoured; the current subscription is unchanged.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// Subscription dropped on request.
    Unwatched,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_message_parses() {
        let message = SpectatorInboundMessage::from_json_str(r#"{"type":"watch","code":"482913"}"#)
            .unwrap();
        assert!(matches!(message, SpectatorInboundMessage::Watch { code } if code == "482913"));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let message = SpectatorInboundMessage::from_json_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(message, SpectatorInboundMessage::Unknown));
    }

    #[test]
    fn error_frame_is_tagged() {
        let value = serde_json::to_value(SpectatorOutboundMessage::Error {
            message: "game not found".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "game not found");
    }
}
