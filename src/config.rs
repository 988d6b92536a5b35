//! Application-level configuration loading: game defaults and the file store location.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::game::{GameSettings, GameType, TeamDescriptor};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_BACK_CONFIG_PATH";
/// Directory used by the file store when the config does not name one.
const DEFAULT_STORE_DIR: &str = "data/games";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    game_defaults: GameSettings,
    store_dir: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        period = app_config.game_defaults.period_duration,
                        shot_clock = app_config.game_defaults.shot_clock_duration,
                        "loaded game defaults from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Settings applied to a new game when the host does not provide its own.
    pub fn game_defaults(&self) -> &GameSettings {
        &self.game_defaults
    }

    /// Directory holding the JSON documents of the file store.
    pub fn store_dir(&self) -> &PathBuf {
        &self.store_dir
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_defaults: default_game_settings(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
/// Every field is optional; missing ones keep their built-in value.
struct RawConfig {
    period_duration: Option<u32>,
    shot_clock_duration: Option<u32>,
    timeouts_per_team: Option<u32>,
    game_type: Option<GameType>,
    team_a: Option<TeamDescriptor>,
    team_b: Option<TeamDescriptor>,
    store_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = default_game_settings();
        Self {
            game_defaults: GameSettings {
                period_duration: value.period_duration.unwrap_or(defaults.period_duration),
                shot_clock_duration: value
                    .shot_clock_duration
                    .unwrap_or(defaults.shot_clock_duration),
                team_a: value.team_a.unwrap_or(defaults.team_a),
                team_b: value.team_b.unwrap_or(defaults.team_b),
                game_type: value.game_type.unwrap_or(defaults.game_type),
                timeouts_per_team: value
                    .timeouts_per_team
                    .unwrap_or(defaults.timeouts_per_team),
            },
            store_dir: value
                .store_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in game defaults shipped with the binary.
fn default_game_settings() -> GameSettings {
    GameSettings {
        period_duration: 12,
        shot_clock_duration: 24,
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
