/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Snapshot fan-out: live sync, mirror and queued persistence.
pub mod publisher;
/// Score, foul, timeout and possession changes.
pub mod scoreboard_service;
/// Opening, resuming and driving hosted sessions.
pub mod session_service;
/// Spectator lookups, game streams and the spectator WebSocket.
pub mod spectator_service;
/// Same-device mirror SSE stream.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
