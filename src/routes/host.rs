use axum::{
    Json, Router,
    body::Body,
    extract::{Extension, Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, post, put},
};
use axum_valid::Valid;
use tracing::warn;

use crate::{
    dto::game::{
        ControlResponse, CreateGameRequest, HostSessionResponse, PossessionRequest,
        ResumeGameRequest, SetClockRequest, ShotClockRequest, TeamDeltaRequest,
    },
    error::AppError,
    services::{
        scoreboard_service,
        session_service::{self, ControlTarget},
    },
    state::{SharedState, sync::GameSnapshot},
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

type ControlResult = Result<(StatusCode, Json<ControlResponse>), AppError>;

/// Host endpoints: opening games and driving a live session.
pub fn router(state: SharedState) -> Router<SharedState> {
    let control = Router::new()
        .route("/games/{code}/clock/toggle", post(toggle_clock))
        .route("/games/{code}/clock/reset", post(reset_clocks))
        .route("/games/{code}/clock/shot", post(restart_shot_clock))
        .route("/games/{code}/clock", put(set_game_clock))
        .route("/games/{code}/score", post(adjust_score))
        .route("/games/{code}/fouls", post(adjust_fouls))
        .route("/games/{code}/timeouts", post(adjust_timeouts))
        .route("/games/{code}/possession", post(set_possession))
        .route("/games/{code}/possession/toggle", post(toggle_possession))
        .route("/games/{code}/session", delete(close_session))
        .route_layer(middleware::from_fn_with_state(state, require_host_token));

    Router::new()
        .route("/games", post(create_game))
        .route("/games/{code}/resume", post(resume_game))
        .merge(control)
}

/// Open a new hosted game.
#[utoipa::path(
    post,
    path = "/games",
    tag = "host",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = HostSessionResponse),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<HostSessionResponse>, AppError> {
    Ok(Json(session_service::create_game(&state, payload).await?))
}

/// Reopen a stored game as its original host.
#[utoipa::path(
    post,
    path = "/games/{code}/resume",
    tag = "host",
    params(("code" = String, Path, description = "Six digit game code")),
    request_body = ResumeGameRequest,
    responses(
        (status = 200, description = "Game resumed", body = HostSessionResponse),
        (status = 401, description = "Host identity does not match"),
        (status = 404, description = "No stored game for this code"),
        (status = 409, description = "Game is already hosted")
    )
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<ResumeGameRequest>>,
) -> Result<Json<HostSessionResponse>, AppError> {
    Ok(Json(
        session_service::resume_game(&state, code, payload).await?,
    ))
}

/// Start the clocks, or pause them when either one runs.
#[utoipa::path(
    post,
    path = "/games/{code}/clock/toggle",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    responses(
        (status = 200, description = "Clocks toggled", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn toggle_clock(Extension(target): Extension<ControlTarget>) -> ControlResult {
    Ok(control(session_service::toggle_clock(&target).await))
}

/// Reset both clocks to their start-of-period values.
#[utoipa::path(
    post,
    path = "/games/{code}/clock/reset",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    responses(
        (status = 200, description = "Clocks reset", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn reset_clocks(Extension(target): Extension<ControlTarget>) -> ControlResult {
    Ok(control(session_service::reset_clocks(&target).await))
}

/// Restart the shot clock.
#[utoipa::path(
    post,
    path = "/games/{code}/clock/shot",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = ShotClockRequest,
    responses(
        (status = 200, description = "Shot clock restarted", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse),
        (status = 400, description = "Value above the configured duration"),
        (status = 409, description = "Shot clock disabled for this game")
    )
)]
pub async fn restart_shot_clock(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<ShotClockRequest>>,
) -> ControlResult {
    let result = session_service::restart_shot_clock(&target, payload.seconds).await?;
    Ok(control(result))
}

/// Correct the game clock.
#[utoipa::path(
    put,
    path = "/games/{code}/clock",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = SetClockRequest,
    responses(
        (status = 200, description = "Game clock set", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse),
        (status = 400, description = "Seconds out of range")
    )
)]
pub async fn set_game_clock(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<SetClockRequest>>,
) -> ControlResult {
    let time = payload
        .game_time()
        .ok_or_else(|| AppError::BadRequest("seconds must be within 0..=59".into()))?;
    Ok(control(
        session_service::set_game_clock(&target, time).await,
    ))
}

/// Adjust a team's score.
#[utoipa::path(
    post,
    path = "/games/{code}/score",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = TeamDeltaRequest,
    responses(
        (status = 200, description = "Score adjusted", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn adjust_score(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<TeamDeltaRequest>>,
) -> ControlResult {
    Ok(control(
        scoreboard_service::adjust_score(&target, payload.team, payload.delta).await,
    ))
}

/// Adjust a team's fouls.
#[utoipa::path(
    post,
    path = "/games/{code}/fouls",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = TeamDeltaRequest,
    responses(
        (status = 200, description = "Fouls adjusted", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn adjust_fouls(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<TeamDeltaRequest>>,
) -> ControlResult {
    Ok(control(
        scoreboard_service::adjust_fouls(&target, payload.team, payload.delta).await,
    ))
}

/// Adjust a team's remaining timeouts.
#[utoipa::path(
    post,
    path = "/games/{code}/timeouts",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = TeamDeltaRequest,
    responses(
        (status = 200, description = "Timeouts adjusted", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn adjust_timeouts(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<TeamDeltaRequest>>,
) -> ControlResult {
    Ok(control(
        scoreboard_service::adjust_timeouts(&target, payload.team, payload.delta).await,
    ))
}

/// Give the ball to a team.
#[utoipa::path(
    post,
    path = "/games/{code}/possession",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    request_body = PossessionRequest,
    responses(
        (status = 200, description = "Possession set", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn set_possession(
    Extension(target): Extension<ControlTarget>,
    Valid(Json(payload)): Valid<Json<PossessionRequest>>,
) -> ControlResult {
    Ok(control(
        scoreboard_service::set_possession(&target, payload.team).await,
    ))
}

/// Give the ball to the other team.
#[utoipa::path(
    post,
    path = "/games/{code}/possession/toggle",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    responses(
        (status = 200, description = "Possession toggled", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn toggle_possession(Extension(target): Extension<ControlTarget>) -> ControlResult {
    Ok(control(scoreboard_service::toggle_possession(&target).await))
}

/// Stop hosting the game. The stored game stays available for resuming.
#[utoipa::path(
    delete,
    path = "/games/{code}/session",
    tag = "host",
    params(
        ("code" = String, Path, description = "Six digit game code"),
        ("X-Host-Token" = String, Header, description = "Token returned when the game was opened")
    ),
    responses(
        (status = 200, description = "Session closed", body = ControlResponse),
        (status = 202, description = "No live session; ignored", body = ControlResponse)
    )
)]
pub async fn close_session(
    State(state): State<SharedState>,
    Extension(target): Extension<ControlTarget>,
) -> ControlResult {
    Ok(control(
        session_service::close_session(&state, &target).await,
    ))
}

fn control(result: Option<GameSnapshot>) -> (StatusCode, Json<ControlResponse>) {
    match result {
        Some(snapshot) => (StatusCode::OK, Json(ControlResponse::applied(snapshot))),
        None => (StatusCode::ACCEPTED, Json(ControlResponse::ignored())),
    }
}

/// Resolve the live session of the code in the path and check `X-Host-Token` against it.
///
/// The resolved [`ControlTarget`] is handed to the handler, which acts on that session
/// only. Codes without a live session pass through; their handlers are no-ops.
async fn require_host_token(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let target = ControlTarget::lookup(&state, &code);

    if let Some(session) = target.session() {
        let provided = req
            .headers()
            .get(HOST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized("missing host token header `X-Host-Token`".into())
            })?;
        if !session.verify_token(provided) {
            warn!(%code, "rejected control request with an invalid host token");
            return Err(AppError::Unauthorized("invalid host token".into()));
        }
    }

    req.extensions_mut().insert(target);
    Ok(next.run(req).await)
}
