use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_team_color,
    state::{
        game::{GameSettings, GameTime, GameType, Rosters, TeamDescriptor, TeamSide},
        sync::GameSnapshot,
    },
};

/// Payload used to open a brand-new hosted game. Every field is optional; missing
/// settings fall back to the configured defaults.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Identity of the host, generated when omitted. Needed later to resume the game.
    #[serde(default)]
    pub host_uid: Option<Uuid>,
    /// Overrides for the configured game settings.
    #[serde(default)]
    #[validate(nested)]
    pub settings: Option<SettingsInput>,
    /// Team rosters.
    #[serde(default)]
    pub rosters: Option<Rosters>,
}

/// Optional overrides of the game settings.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInput {
    /// Period length in minutes.
    #[validate(range(min = 1, max = 60))]
    pub period_duration: Option<u32>,
    /// Shot clock length in seconds; `0` disables it.
    #[validate(range(max = 99))]
    pub shot_clock_duration: Option<u32>,
    /// Home team descriptor.
    #[validate(nested)]
    pub team_a: Option<TeamInput>,
    /// Away team descriptor.
    #[validate(nested)]
    pub team_b: Option<TeamInput>,
    /// Game flavour.
    pub game_type: Option<GameType>,
    /// Timeouts granted to each team.
    #[validate(range(max = 20))]
    pub timeouts_per_team: Option<u32>,
}

impl SettingsInput {
    /// Merge the overrides into `defaults`.
    pub fn apply(self, defaults: &GameSettings) -> GameSettings {
        GameSettings {
            period_duration: self.period_duration.unwrap_or(defaults.period_duration),
            shot_clock_duration: self
                .shot_clock_duration
                .unwrap_or(defaults.shot_clock_duration),
            team_a: self
                .team_a
                .map(TeamDescriptor::from)
                .unwrap_or_else(|| defaults.team_a.clone()),
            team_b: self
                .team_b
                .map(TeamDescriptor::from)
                .unwrap_or_else(|| defaults.team_b.clone()),
            game_type: self.game_type.unwrap_or(defaults.game_type),
            timeouts_per_team: self
                .timeouts_per_team
                .unwrap_or(defaults.timeouts_per_team),
        }
    }
}

/// Incoming team descriptor.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamInput {
    /// Name shown on the scoreboard.
    #[validate(length(min = 1, max = 40))]
    pub name: String,
    /// `#rrggbb` color.
    #[validate(custom(function = "validate_team_color"))]
    pub color: String,
}

impl From<TeamInput> for TeamDescriptor {
    fn from(value: TeamInput) -> Self {
        Self {
            name: value.name,
            color: value.color.to_ascii_lowercase(),
        }
    }
}

/// Resume a stored game as its original host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResumeGameRequest {
    /// Host identity recorded when the game was created.
    pub host_uid: Uuid,
}

/// Returned when a host opens or resumes a game.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSessionResponse {
    /// Six digit game code to share with spectators.
    pub code: String,
    /// Token to send as `X-Host-Token` on every control request.
    pub host_token: String,
    /// Identity to present when resuming the game later.
    pub host_uid: Uuid,
    /// State right after opening.
    pub snapshot: GameSnapshot,
}

/// Manual shot clock restart.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ShotClockRequest {
    /// New value in seconds; the configured duration when omitted.
    #[serde(default)]
    #[validate(range(max = 99))]
    pub seconds: Option<u32>,
}

/// Manual game clock correction.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetClockRequest {
    /// Minutes remaining.
    #[validate(range(max = 99))]
    pub minutes: u32,
    /// Seconds remaining within the minute.
    #[validate(range(max = 59))]
    pub seconds: u32,
}

impl SetClockRequest {
    /// Clock reading described by the request.
    pub fn game_time(&self) -> Option<GameTime> {
        GameTime::new(self.minutes, self.seconds)
    }
}

/// Signed adjustment of a per-team counter (score, fouls or timeouts).
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamDeltaRequest {
    /// Team to adjust.
    pub team: TeamSide,
    /// Amount to add; negative values subtract, clamping at zero.
    #[validate(range(min = -100, max = 100))]
    pub delta: i32,
}

/// Explicit possession change.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PossessionRequest {
    /// Team receiving the ball.
    pub team: TeamSide,
}

/// Outcome of a host control operation.
///
/// Operations on a code without a live session are ignored: `applied` is `false` and no
/// snapshot is returned.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ControlResponse {
    /// Whether a live session handled the operation.
    pub applied: bool,
    /// State after the operation.
    pub snapshot: Option<GameSnapshot>,
}

impl ControlResponse {
    /// Operation handled by a live session.
    pub fn applied(snapshot: GameSnapshot) -> Self {
        Self {
            applied: true,
            snapshot: Some(snapshot),
        }
    }

    /// Operation ignored.
    pub fn ignored() -> Self {
        Self {
            applied: false,
            snapshot: None,
        }
    }
}
