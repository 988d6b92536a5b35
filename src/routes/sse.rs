use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/mirror",
    tag = "sse",
    responses((status = 200, description = "Mirror of every published snapshot", content_type = "text/event-stream", body = String))
)]
/// Stream every snapshot published by any hosted game, for same-device displays.
pub async fn mirror_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, handshake) = sse_service::subscribe_mirror(&state).await;
    info!("New mirror SSE connection");
    sse_service::to_sse_stream(receiver, handshake)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/mirror", get(mirror_stream))
}
