//! Score, foul, timeout and possession changes for hosted games.
//!
//! Every operation is a no-op returning `None` when the target has no live session.

use crate::{
    services::session_service::ControlTarget,
    state::{game::TeamSide, sync::GameSnapshot},
};

/// Add `delta` points to `team`, clamping at zero.
pub async fn adjust_score(
    target: &ControlTarget,
    team: TeamSide,
    delta: i32,
) -> Option<GameSnapshot> {
    let session = target.live("adjust score")?;
    Some(session.adjust_score(team, delta).await)
}

/// Add `delta` team fouls to `team`, clamping at zero.
pub async fn adjust_fouls(
    target: &ControlTarget,
    team: TeamSide,
    delta: i32,
) -> Option<GameSnapshot> {
    let session = target.live("adjust fouls")?;
    Some(session.adjust_fouls(team, delta).await)
}

/// Add `delta` remaining timeouts to `team`, clamping at zero.
pub async fn adjust_timeouts(
    target: &ControlTarget,
    team: TeamSide,
    delta: i32,
) -> Option<GameSnapshot> {
    let session = target.live("adjust timeouts")?;
    Some(session.adjust_timeouts(team, delta).await)
}

/// Give the ball to `team`.
pub async fn set_possession(target: &ControlTarget, team: TeamSide) -> Option<GameSnapshot> {
    let session = target.live("set possession")?;
    Some(session.set_possession(team).await)
}

/// Give the ball to the other team.
pub async fn toggle_possession(target: &ControlTarget) -> Option<GameSnapshot> {
    let session = target.live("toggle possession")?;
    Some(session.toggle_possession().await)
}
