use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// One of the two teams on the court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum TeamSide {
    /// Home side, listed first on the scoreboard.
    TeamA,
    /// Away side.
    TeamB,
}

impl TeamSide {
    /// The opposing side.
    pub fn other(self) -> Self {
        match self {
            TeamSide::TeamA => TeamSide::TeamB,
            TeamSide::TeamB => TeamSide::TeamA,
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSide::TeamA => f.write_str("teamA"),
            TeamSide::TeamB => f.write_str("teamB"),
        }
    }
}

/// Controls whether detailed player stats are tracked for the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    /// Casual game: score and clocks only.
    #[default]
    Friendly,
    /// Full game with per-player statistics.
    Full,
}

/// Display attributes of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TeamDescriptor {
    /// Name shown on the scoreboard.
    pub name: String,
    /// CSS-style color (`#rrggbb`).
    pub color: String,
}

/// Settings chosen when the game is created; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    /// Length of a period, in minutes.
    pub period_duration: u32,
    /// Shot clock length in seconds; `0` disables the shot clock entirely.
    pub shot_clock_duration: u32,
    /// Home team descriptor.
    pub team_a: TeamDescriptor,
    /// Away team descriptor.
    pub team_b: TeamDescriptor,
    /// Game flavour.
    pub game_type: GameType,
    /// Timeouts granted to each team at the start of the game.
    pub timeouts_per_team: u32,
}

impl GameSettings {
    /// Whether the shot clock takes part in the game at all.
    pub fn shot_clock_enabled(&self) -> bool {
        self.shot_clock_duration > 0
    }

    /// Value the shot clock is reset to (0 when disabled).
    pub fn shot_clock_reset_value(&self) -> u32 {
        self.shot_clock_duration
    }
}

/// Game clock reading. Seconds always stay within `0..=59`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameTime {
    /// Whole minutes remaining.
    pub minutes: u32,
    /// Seconds remaining within the current minute.
    pub seconds: u32,
}

impl GameTime {
    /// Build a clock reading, returning `None` when `seconds` is out of range.
    pub fn new(minutes: u32, seconds: u32) -> Option<Self> {
        (seconds <= 59).then_some(Self { minutes, seconds })
    }

    /// Full-period reading (`minutes:00`).
    pub fn full_period(minutes: u32) -> Self {
        Self {
            minutes,
            seconds: 0,
        }
    }

    /// True once the clock reads `00:00`.
    pub fn is_exhausted(&self) -> bool {
        self.minutes == 0 && self.seconds == 0
    }

    /// Remove one second, borrowing a minute when needed.
    ///
    /// Returns `false` without touching the reading when the clock is already exhausted.
    pub fn count_down(&mut self) -> bool {
        if self.seconds > 0 {
            self.seconds -= 1;
            true
        } else if self.minutes > 0 {
            self.minutes -= 1;
            self.seconds = 59;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// Non-negative counter tracked for both teams (score, fouls, timeouts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamCounts {
    /// Value for the home team.
    pub team_a: u32,
    /// Value for the away team.
    pub team_b: u32,
}

impl TeamCounts {
    /// Same starting value for both teams.
    pub fn splat(value: u32) -> Self {
        Self {
            team_a: value,
            team_b: value,
        }
    }

    /// Apply a signed delta to one side, clamping at zero. Returns the new value.
    pub fn apply_delta(&mut self, side: TeamSide, delta: i32) -> u32 {
        let slot = match side {
            TeamSide::TeamA => &mut self.team_a,
            TeamSide::TeamB => &mut self.team_b,
        };
        *slot = if delta.is_negative() {
            slot.saturating_sub(delta.unsigned_abs())
        } else {
            slot.saturating_add(delta.unsigned_abs())
        };
        *slot
    }
}

/// Player listed on a team roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RosterEntry {
    /// Jersey number as printed (may carry leading zeros).
    pub number: String,
    /// Player name.
    pub name: String,
}

/// Rosters for both teams. Display-only for the scoreboard core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rosters {
    /// Home roster.
    #[serde(default)]
    pub team_a: Vec<RosterEntry>,
    /// Away roster.
    #[serde(default)]
    pub team_b: Vec<RosterEntry>,
}

/// Live, host-owned game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current period, starting at 1.
    pub period: u32,
    /// Game clock reading.
    pub game_time: GameTime,
    /// Shot clock seconds remaining (meaningless when the shot clock is disabled).
    pub shot_clock: u32,
    /// Team holding the ball.
    pub possession: TeamSide,
    /// Points per team.
    pub score: TeamCounts,
    /// Team fouls.
    pub fouls: TeamCounts,
    /// Timeouts remaining per team.
    pub timeouts: TeamCounts,
    /// Per-player statistics, opaque to the scoreboard core.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub player_stats: IndexMap<String, Value>,
}

impl GameState {
    /// Fresh state for the first period of a game using `settings`.
    pub fn initial(settings: &GameSettings) -> Self {
        Self {
            period: 1,
            game_time: GameTime::full_period(settings.period_duration),
            shot_clock: settings.shot_clock_reset_value(),
            possession: TeamSide::TeamA,
            score: TeamCounts::default(),
            fouls: TeamCounts::default(),
            timeouts: TeamCounts::splat(settings.timeouts_per_team),
            player_stats: IndexMap::new(),
        }
    }

    /// True when both clocks still show their start-of-period values.
    pub fn clocks_at_start(&self, settings: &GameSettings) -> bool {
        self.game_time == GameTime::full_period(settings.period_duration)
            && self.shot_clock == settings.shot_clock_reset_value()
    }
}

/// Complete game record: the unit that is persisted and replicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Identity of the host allowed to resume this game.
    pub host_uid: Uuid,
    /// Creation-time settings.
    pub settings: GameSettings,
    /// Team rosters.
    #[serde(default)]
    pub rosters: Rosters,
    /// Live state.
    pub game_state: GameState,
}

impl Game {
    /// Build a new game with its state initialised from `settings`.
    pub fn new(host_uid: Uuid, settings: GameSettings, rosters: Rosters) -> Self {
        let game_state = GameState::initial(&settings);
        Self {
            host_uid,
            settings,
            rosters,
            game_state,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn settings(period_duration: u32, shot_clock_duration: u32) -> GameSettings {
        GameSettings {
            period_duration,
            shot_clock_duration,
            team_a: TeamDescriptor {
                name: "Home".into(),
                color: "#21808d".into(),
            },
            team_b: TeamDescriptor {
                name: "Away".into(),
                color: "#c0152f".into(),
            },
            game_type: GameType::Friendly,
            timeouts_per_team: 5,
        }
    }

    #[test]
    fn count_down_borrows_a_minute() {
        let mut time = GameTime::new(3, 0).unwrap();
        assert!(time.count_down());
        assert_eq!(time, GameTime::new(2, 59).unwrap());
    }

    #[test]
    fn count_down_stops_at_zero() {
        let mut time = GameTime::default();
        assert!(!time.count_down());
        assert!(time.is_exhausted());
    }

    #[test]
    fn seconds_out_of_range_are_rejected() {
        assert!(GameTime::new(1, 60).is_none());
        assert!(GameTime::new(1, 59).is_some());
    }

    #[test]
    fn display_pads_both_fields() {
        assert_eq!(GameTime::new(7, 5).unwrap().to_string(), "07:05");
    }

    #[test]
    fn negative_delta_clamps_at_zero() {
        let mut score = TeamCounts::default();
        assert_eq!(score.apply_delta(TeamSide::TeamA, -1), 0);
        assert_eq!(score.apply_delta(TeamSide::TeamB, 3), 3);
        assert_eq!(score.apply_delta(TeamSide::TeamB, -2), 1);
        assert_eq!(score.team_a, 0);
    }

    #[test]
    fn initial_state_follows_settings() {
        let game = Game::new(Uuid::new_v4(), settings(12, 24), Rosters::default());
        let state = &game.game_state;
        assert_eq!(state.period, 1);
        assert_eq!(state.game_time, GameTime::full_period(12));
        assert_eq!(state.shot_clock, 24);
        assert_eq!(state.timeouts, TeamCounts::splat(5));
        assert!(state.clocks_at_start(&game.settings));
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let game = Game::new(Uuid::nil(), settings(10, 0), Rosters::default());
        let value = serde_json::to_value(&game).unwrap();
        assert!(value.get("hostUid").is_some());
        assert_eq!(value["gameState"]["possession"], "teamA");
        assert_eq!(value["settings"]["shotClockDuration"], 0);
        assert_eq!(value["settings"]["gameType"], "friendly");
        assert_eq!(value["gameState"]["gameTime"]["minutes"], 10);
    }
}
