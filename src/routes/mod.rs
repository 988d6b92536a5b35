use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod host;
pub mod spectate;
pub mod sse;
pub mod websocket;

/// Compose the host, spectator, health, and documentation routes over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(spectate::router())
        .merge(host::router(state.clone()))
        .merge(docs::router())
        .with_state(state)
}
