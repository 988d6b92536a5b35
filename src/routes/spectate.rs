use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{
    error::AppError,
    services::spectator_service,
    state::{SharedState, sync::GameSnapshot},
};

/// Read-only endpoints for spectators.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/games/{code}", get(get_snapshot))
        .route("/games/{code}/stream", get(snapshot_stream))
}

/// Latest snapshot of a game, live or stored.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "spectator",
    params(("code" = String, Path, description = "Six digit game code")),
    responses(
        (status = 200, description = "Latest snapshot", body = GameSnapshot),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_snapshot(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = spectator_service::find_snapshot(&state, &code).await?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// Stream every snapshot of a game, starting with the current one.
#[utoipa::path(
    get,
    path = "/games/{code}/stream",
    tag = "spectator",
    params(("code" = String, Path, description = "Six digit game code")),
    responses(
        (status = 200, description = "Snapshot SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn snapshot_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let receiver = spectator_service::subscribe_game(&state, &code).await?;
    Ok(spectator_service::to_sse_stream(receiver))
}
