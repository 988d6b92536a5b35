use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Courtside Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::mirror_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::spectate::get_snapshot,
        crate::routes::spectate::snapshot_stream,
        crate::routes::host::create_game,
        crate::routes::host::resume_game,
        crate::routes::host::toggle_clock,
        crate::routes::host::reset_clocks,
        crate::routes::host::restart_shot_clock,
        crate::routes::host::set_game_clock,
        crate::routes::host::adjust_score,
        crate::routes::host::adjust_fouls,
        crate::routes::host::adjust_timeouts,
        crate::routes::host::set_possession,
        crate::routes::host::toggle_possession,
        crate::routes::host::close_session,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::ws::SpectatorInboundMessage,
            crate::dto::ws::SpectatorOutboundMessage,
            crate::state::sync::GameSnapshot,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "host", description = "Opening games and driving a live session"),
        (name = "spectator", description = "Read-only access to live games"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
