//! Opening, resuming and driving hosted game sessions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::{CreateGameRequest, HostSessionResponse, ResumeGameRequest},
        validation::validate_game_code,
    },
    error::ServiceError,
    state::{
        HostSession, SharedState,
        game::{Game, GameTime},
        sync::GameSnapshot,
    },
};

const MAX_CODE_ATTEMPTS: usize = 64;

/// Draw a random six digit game code.
pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}

/// Game code paired with the session that was live for it when the request was checked.
///
/// Control operations act on this session only, never on one opened after the lookup.
#[derive(Clone)]
pub struct ControlTarget {
    code: String,
    session: Option<Arc<HostSession>>,
}

impl ControlTarget {
    /// Resolve the live session of `code`, if any.
    pub fn lookup(state: &SharedState, code: &str) -> Self {
        Self {
            code: code.to_string(),
            session: state.session(code),
        }
    }

    /// Game code of the request.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Session resolved for the code.
    pub fn session(&self) -> Option<&Arc<HostSession>> {
        self.session.as_ref()
    }

    /// Session to apply `operation` to; operations on codes without one are ignored.
    pub(crate) fn live(&self, operation: &'static str) -> Option<&Arc<HostSession>> {
        if self.session.is_none() {
            debug!(code = %self.code, operation, "no live session; ignoring");
        }
        self.session.as_ref()
    }
}

/// Open a new hosted game with settings merged over the configured defaults.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<HostSessionResponse, ServiceError> {
    create_game_with_codes(state, request, generate_code).await
}

async fn create_game_with_codes(
    state: &SharedState,
    request: CreateGameRequest,
    mut next_code: impl FnMut() -> String,
) -> Result<HostSessionResponse, ServiceError> {
    let defaults = state.config().game_defaults();
    let settings = match request.settings {
        Some(overrides) => overrides.apply(defaults),
        None => defaults.clone(),
    };
    let host_uid = request.host_uid.unwrap_or_else(Uuid::new_v4);
    let game = Game::new(host_uid, settings, request.rosters.unwrap_or_default());
    let store = state.game_store().await;

    let mut session = None;
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = next_code();
        // Codes of closed or stored games stay reserved for resuming.
        if state.snapshots().latest(&code).is_some() {
            continue;
        }
        if let Some(store) = &store {
            match store.find_game(code.clone()).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(err) => {
                    warn!(%code, error = %err, "cannot check stored game codes; trying another");
                    continue;
                }
            }
        }
        if let Entry::Vacant(slot) = state.sessions().entry(code.clone()) {
            let created = HostSession::new(code, game, state.snapshot_sink());
            slot.insert(created.clone());
            session = Some(created);
            break;
        }
    }
    let Some(session) = session else {
        warn!(
            attempts = MAX_CODE_ATTEMPTS,
            "could not find a free game code"
        );
        return Err(ServiceError::InvalidState("no free game code available".into()));
    };

    let snapshot = session.announce().await;
    info!(code = %session.code(), %host_uid, "game created");
    Ok(host_response(&session, host_uid, snapshot))
}

/// Reopen a game for its original host.
///
/// The live hub wins over storage: it holds the last published state of the game, while
/// the store may still be catching up. Revisions continue after the hub's latest one.
pub async fn resume_game(
    state: &SharedState,
    code: String,
    request: ResumeGameRequest,
) -> Result<HostSessionResponse, ServiceError> {
    validate_game_code(&code).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    if state.sessions().contains_key(&code) {
        return Err(ServiceError::InvalidState(format!(
            "game {code} is already hosted"
        )));
    }

    let (game, last_revision) = match state.snapshots().latest(&code) {
        Some(snapshot) => (snapshot.game.clone(), snapshot.revision),
        None => {
            let store = state.require_game_store().await?;
            let game = store
                .find_game(code.clone())
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("game {code} not found")))?;
            (game, 0)
        }
    };
    if game.host_uid != request.host_uid {
        warn!(%code, "resume attempt with a foreign host identity");
        return Err(ServiceError::Unauthorized(
            "host identity does not match this game".into(),
        ));
    }

    let host_uid = game.host_uid;
    let session = match state.sessions().entry(code.clone()) {
        Entry::Vacant(slot) => {
            let resumed =
                HostSession::resume(code.clone(), game, last_revision, state.snapshot_sink());
            slot.insert(resumed.clone());
            resumed
        }
        Entry::Occupied(_) => {
            return Err(ServiceError::InvalidState(format!(
                "game {code} is already hosted"
            )));
        }
    };

    let snapshot = session.announce().await;
    info!(%code, revision = snapshot.revision, phase = ?snapshot.phase, "game resumed");
    Ok(host_response(&session, host_uid, snapshot))
}

/// Start or pause the clocks.
pub async fn toggle_clock(target: &ControlTarget) -> Option<GameSnapshot> {
    let session = target.live("toggle clock")?;
    Some(session.toggle_run().await)
}

/// Put both clocks back to their start-of-period values.
pub async fn reset_clocks(target: &ControlTarget) -> Option<GameSnapshot> {
    let session = target.live("reset clocks")?;
    Some(session.reset_clocks().await)
}

/// Restart the shot clock at `seconds` (full duration by default).
pub async fn restart_shot_clock(
    target: &ControlTarget,
    seconds: Option<u32>,
) -> Result<Option<GameSnapshot>, ServiceError> {
    let Some(session) = target.live("restart shot clock") else {
        return Ok(None);
    };
    Ok(Some(session.restart_shot_clock(seconds).await?))
}

/// Overwrite the game clock.
pub async fn set_game_clock(target: &ControlTarget, time: GameTime) -> Option<GameSnapshot> {
    let session = target.live("set game clock")?;
    Some(session.set_game_clock(time).await)
}

/// Stop the session for good. The game stays available for resuming.
///
/// Ignored when the targeted session is no longer the one registered for the code.
pub async fn close_session(state: &SharedState, target: &ControlTarget) -> Option<GameSnapshot> {
    let session = target.live("close session")?;
    let Some((_, session)) = state
        .sessions()
        .remove_if(target.code(), |_, live| Arc::ptr_eq(live, session))
    else {
        debug!(code = %target.code(), "session already closed; ignoring");
        return None;
    };
    Some(session.close().await)
}

fn host_response(
    session: &HostSession,
    host_uid: Uuid,
    snapshot: GameSnapshot,
) -> HostSessionResponse {
    HostSessionResponse {
        code: session.code().to_string(),
        host_token: session.host_token().to_string(),
        host_uid,
        snapshot,
    }
}
