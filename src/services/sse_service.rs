use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

/// Subscribe to the same-device mirror stream and build its handshake event.
pub async fn subscribe_mirror(state: &SharedState) -> (broadcast::Receiver<ServerEvent>, ServerEvent) {
    let receiver = state.mirror().subscribe();
    let handshake = Handshake {
        stream: "mirror".into(),
        message: "mirror stream connected".into(),
        degraded: state.is_degraded().await,
    };
    let event = ServerEvent::json(Some("handshake".to_string()), &handshake).unwrap_or_else(|err| {
        warn!(error = %err, "failed to encode mirror handshake");
        ServerEvent::new(Some("handshake".to_string()), "{}".into())
    });
    (receiver, event)
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects. `first` is sent before any broadcast.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(first))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Snapshots are full states: the next one supersedes what was missed.
                            debug!(skipped, "mirror subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!("Mirror SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
