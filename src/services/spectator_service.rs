//! Read side for spectators: latest snapshot lookup, per-game SSE stream and the
//! WebSocket spectator protocol.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::ws::{Message, WebSocket},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{SinkExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        validation::validate_game_code,
        ws::{SpectatorInboundMessage, SpectatorOutboundMessage},
    },
    error::ServiceError,
    services::publisher::SNAPSHOT_EVENT,
    state::{
        SharedState,
        state_machine::SessionPhase,
        sync::{GameSnapshot, SnapshotReceiver, SpectatorSession, Subscription},
    },
};

/// Latest snapshot of `code`.
///
/// Falls back to the stored game when nothing was published in this process yet; the
/// stored game is then seeded into the live hub so later lookups stay in memory.
pub async fn find_snapshot(
    state: &SharedState,
    code: &str,
) -> Result<Arc<GameSnapshot>, ServiceError> {
    validate_game_code(code).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    if let Some(snapshot) = state.snapshots().latest(code) {
        return Ok(snapshot);
    }

    let store = state.require_game_store().await?;
    let game = store
        .find_game(code.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {code} not found")))?;

    let phase = if game.game_state.clocks_at_start(&game.settings) {
        SessionPhase::Idle
    } else {
        SessionPhase::Paused
    };
    state.snapshots().seed(GameSnapshot {
        code: code.to_string(),
        revision: 0,
        game,
        run: Default::default(),
        phase,
        shot_clock_warning: false,
    });
    debug!(%code, "seeded live hub from storage");

    state
        .snapshots()
        .latest(code)
        .ok_or_else(|| ServiceError::NotFound(format!("game {code} not found")))
}

/// Subscribe to the snapshots of `code`, failing when the game is unknown.
pub async fn subscribe_game(
    state: &SharedState,
    code: &str,
) -> Result<SnapshotReceiver, ServiceError> {
    find_snapshot(state, code).await?;
    Ok(state.snapshots().subscribe(code))
}

/// Convert a snapshot subscription into an SSE response, starting with the current snapshot.
pub fn to_sse_stream(
    mut receiver: SnapshotReceiver,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while receiver.changed().await.is_ok() {
            let latest = receiver.borrow_and_update().clone();
            let Some(snapshot) = latest else {
                continue;
            };
            match Event::default().event(SNAPSHOT_EVENT).json_data(snapshot.as_ref()) {
                Ok(event) => yield Ok(event),
                Err(err) => warn!(code = %snapshot.code, error = %err, "failed to encode snapshot event"),
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Handle the full lifecycle of a spectator WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<SpectatorOutboundMessage>();

    // Dedicated writer task keeps snapshots flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&frame) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "failed to serialize spectator frame");
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut spectator = SpectatorSession::new();
    info!("spectator connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match SpectatorInboundMessage::from_json_str(&text) {
                Ok(command) => handle_command(&state, &mut spectator, command, &outbound_tx).await,
                Err(err) => {
                    warn!(error = %err, "failed to parse spectator message");
                    let _ = outbound_tx.send(SpectatorOutboundMessage::Error {
                        message: format!("malformed message: {err}"),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_)) => {}
            Err(err) => {
                warn!(error = %err, "spectator websocket error");
                break;
            }
        }
    }

    let watched = spectator.detach();
    info!(code = ?watched, "spectator disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Apply one spectator command.
///
/// A failed `watch` reports an error frame and leaves the current subscription running.
pub async fn handle_command(
    state: &SharedState,
    spectator: &mut SpectatorSession,
    command: SpectatorInboundMessage,
    outbound: &mpsc::UnboundedSender<SpectatorOutboundMessage>,
) {
    match command {
        SpectatorInboundMessage::Watch { code } => {
            if let Err(err) = find_snapshot(state, &code).await {
                debug!(%code, error = %err, "spectator watch rejected");
                let _ = outbound.send(SpectatorOutboundMessage::Error {
                    message: err.to_string(),
                });
                return;
            }

            // Stop the previous forwarder before announcing the new game.
            if let Some(previous) = spectator.detach() {
                debug!(%previous, next = %code, "spectator switching games");
            }
            let _ = outbound.send(SpectatorOutboundMessage::Watching { code: code.clone() });
            let forwarder = spawn_forwarder(state.snapshots().subscribe(&code), outbound.clone());
            spectator.attach(Subscription::new(code, forwarder));
        }
        SpectatorInboundMessage::Unwatch => {
            if spectator.detach().is_some() {
                let _ = outbound.send(SpectatorOutboundMessage::Unwatched);
            }
        }
        SpectatorInboundMessage::Unknown => {
            debug!("ignoring unknown spectator message");
        }
    }
}

fn spawn_forwarder(
    mut receiver: SnapshotReceiver,
    outbound: mpsc::UnboundedSender<SpectatorOutboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let latest = receiver.borrow_and_update().clone();
            let Some(snapshot) = latest else {
                continue;
            };
            let frame = SpectatorOutboundMessage::Snapshot {
                snapshot: snapshot.as_ref().clone(),
            };
            if outbound.send(frame).is_err() {
                break;
            }
        }
    })
}

async fn finalize(
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<SpectatorOutboundMessage>,
) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::timeout;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        dto::game::CreateGameRequest,
        services::{
            scoreboard_service,
            session_service::{ControlTarget, create_game},
        },
        state::{
            AppState,
            game::{Game, GameTime, Rosters, TeamSide, tests::settings},
        },
    };

    async fn next_frame(
        rx: &mut mpsc::UnboundedReceiver<SpectatorOutboundMessage>,
    ) -> SpectatorOutboundMessage {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame expected")
            .expect("channel open")
    }

    async fn hosted_game(state: &SharedState) -> String {
        create_game(state, CreateGameRequest::default())
            .await
            .unwrap()
            .code
    }

    #[tokio::test]
    async fn stored_game_is_served_and_seeded() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        let mut game = Game::new(Uuid::new_v4(), settings(12, 24), Rosters::default());
        game.game_state.game_time = GameTime::new(3, 12).unwrap();
        store.save_game("246810".into(), game).await.unwrap();
        state.set_game_store(Arc::new(store)).await;

        let snapshot = find_snapshot(&state, "246810").await.unwrap();
        assert_eq!(snapshot.revision, 0);
        assert_eq!(snapshot.phase, SessionPhase::Paused);
        assert!(state.snapshots().latest("246810").is_some());

        let missing = find_snapshot(&state, "135791").await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_code_is_rejected() {
        let state = AppState::new(AppConfig::default());
        let result = find_snapshot(&state, "12ab").await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn watch_delivers_current_snapshot_then_updates() {
        let state = AppState::new(AppConfig::default());
        let code = hosted_game(&state).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spectator = SpectatorSession::new();

        handle_command(
            &state,
            &mut spectator,
            SpectatorInboundMessage::Watch { code: code.clone() },
            &tx,
        )
        .await;
        assert!(matches!(next_frame(&mut rx).await, SpectatorOutboundMessage::Watching { .. }));
        assert!(matches!(
            next_frame(&mut rx).await,
            SpectatorOutboundMessage::Snapshot { snapshot } if snapshot.revision == 1
        ));

        scoreboard_service::adjust_score(
            &ControlTarget::lookup(&state, &code),
            TeamSide::TeamA,
            3,
        )
        .await
        .unwrap();
        match next_frame(&mut rx).await {
            SpectatorOutboundMessage::Snapshot { snapshot } => {
                assert_eq!(snapshot.revision, 2);
                assert_eq!(snapshot.game.game_state.score.team_a, 3);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn switching_games_keeps_a_single_subscription() {
        let state = AppState::new(AppConfig::default());
        let first = hosted_game(&state).await;
        let second = hosted_game(&state).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spectator = SpectatorSession::new();

        for code in [&first, &second] {
            handle_command(
                &state,
                &mut spectator,
                SpectatorInboundMessage::Watch { code: code.clone() },
                &tx,
            )
            .await;
            next_frame(&mut rx).await;
            next_frame(&mut rx).await;
        }
        assert_eq!(spectator.watching(), Some(second.as_str()));

        scoreboard_service::adjust_score(
            &ControlTarget::lookup(&state, &first),
            TeamSide::TeamA,
            1,
        )
        .await
        .unwrap();
        scoreboard_service::adjust_score(
            &ControlTarget::lookup(&state, &second),
            TeamSide::TeamB,
            2,
        )
        .await
        .unwrap();
        match next_frame(&mut rx).await {
            SpectatorOutboundMessage::Snapshot { snapshot } => assert_eq!(snapshot.code, second),
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_game_leaves_current_subscription_untouched() {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        let code = hosted_game(&state).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spectator = SpectatorSession::new();

        handle_command(
            &state,
            &mut spectator,
            SpectatorInboundMessage::Watch { code: code.clone() },
            &tx,
        )
        .await;
        next_frame(&mut rx).await;
        next_frame(&mut rx).await;

        handle_command(
            &state,
            &mut spectator,
            SpectatorInboundMessage::Watch {
                code: "100001".into(),
            },
            &tx,
        )
        .await;
        assert!(matches!(next_frame(&mut rx).await, SpectatorOutboundMessage::Error { .. }));
        assert_eq!(spectator.watching(), Some(code.as_str()));

        scoreboard_service::toggle_possession(&ControlTarget::lookup(&state, &code))
            .await
            .unwrap();
        assert!(matches!(
            next_frame(&mut rx).await,
            SpectatorOutboundMessage::Snapshot { snapshot } if snapshot.code == code
        ));
    }

    #[tokio::test]
    async fn unwatch_stops_delivery() {
        let state = AppState::new(AppConfig::default());
        let code = hosted_game(&state).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spectator = SpectatorSession::new();

        handle_command(
            &state,
            &mut spectator,
            SpectatorInboundMessage::Watch { code: code.clone() },
            &tx,
        )
        .await;
        next_frame(&mut rx).await;
        next_frame(&mut rx).await;

        handle_command(&state, &mut spectator, SpectatorInboundMessage::Unwatch, &tx).await;
        assert!(matches!(next_frame(&mut rx).await, SpectatorOutboundMessage::Unwatched));
        tokio::task::yield_now().await;

        scoreboard_service::adjust_score(
            &ControlTarget::lookup(&state, &code),
            TeamSide::TeamA,
            1,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
