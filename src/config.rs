//! Application-level configuration loading: game defaults, timings and the question bank.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::models::{Difficulty, GameType},
    services::questions::science::default_question_bank,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ARENA_CONFIG_PATH";

const DEFAULT_START_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_REWARD_CACHE_TTL: Duration = Duration::from_secs(60);
const DEFAULT_SPEED_ANSWER_THRESHOLD: Duration = Duration::from_millis(3_000);

/// Settings applied when a room leaves a value unset (or sets it to zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameDefaults {
    /// Game type played when the room does not choose one.
    pub game_type: GameType,
    /// Difficulty used when the room does not choose one.
    pub difficulty: Difficulty,
    /// Pause between a reveal and the next question.
    pub delay_seconds: u64,
    /// Time allowed to answer one question.
    pub round_seconds: u64,
    /// Number of questions in a game.
    pub questions_count: u32,
}

impl Default for GameDefaults {
    fn default() -> Self {
        Self {
            game_type: GameType::Math,
            difficulty: Difficulty::Medium,
            delay_seconds: 2,
            round_seconds: 10,
            questions_count: 10,
        }
    }
}

/// One question of the static bank used by non-generated game types.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBankEntry {
    /// Game type this question belongs to.
    pub game_type: GameType,
    /// Difficulty this question is served at.
    pub difficulty: Difficulty,
    /// English prompt.
    pub question: String,
    /// Chinese prompt; may be empty.
    #[serde(default)]
    pub question_zh: String,
    /// English option labels; blank labels are dropped when the question is served.
    pub options: Vec<String>,
    /// Chinese labels aligned with `options`.
    #[serde(default)]
    pub options_zh: Vec<String>,
    /// Index of the right answer in `options`.
    pub correct_index: usize,
    /// Disabled entries are never served.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Grace period between the host pressing start and the first question.
    pub start_delay: Duration,
    /// Fallbacks for unset room settings.
    pub game_defaults: GameDefaults,
    /// How long the reward configuration document is cached.
    pub reward_cache_ttl: Duration,
    /// Correct answers faster than this count towards the speed quest.
    pub speed_answer_threshold: Duration,
    /// Static questions for bank-backed game types.
    pub question_bank: Vec<QuestionBankEntry>,
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
                        questions = app_config.question_bank.len(),
                        start_delay_ms = app_config.start_delay.as_millis() as u64,
                        "loaded configuration"
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
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            game_defaults: GameDefaults::default(),
            reward_cache_ttl: DEFAULT_REWARD_CACHE_TTL,
            speed_answer_threshold: DEFAULT_SPEED_ANSWER_THRESHOLD,
            question_bank: default_question_bank(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    start_delay_ms: Option<u64>,
    #[serde(default)]
    defaults: RawGameDefaults,
    reward_cache_ttl_seconds: Option<u64>,
    speed_answer_threshold_ms: Option<u64>,
    question_bank: Option<Vec<QuestionBankEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGameDefaults {
    game_type: Option<GameType>,
    difficulty: Option<Difficulty>,
    delay_seconds: Option<u64>,
    round_seconds: Option<u64>,
    questions_count: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let fallback = Self::default();
        let defaults = GameDefaults {
            game_type: value
                .defaults
                .game_type
                .unwrap_or(fallback.game_defaults.game_type),
            difficulty: value
                .defaults
                .difficulty
                .unwrap_or(fallback.game_defaults.difficulty),
            delay_seconds: positive_or(
                value.defaults.delay_seconds,
                fallback.game_defaults.delay_seconds,
            ),
            round_seconds: positive_or(
                value.defaults.round_seconds,
                fallback.game_defaults.round_seconds,
            ),
            questions_count: positive_or(
                value.defaults.questions_count,
                fallback.game_defaults.questions_count,
            ),
        };

        Self {
            start_delay: value
                .start_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.start_delay),
            game_defaults: defaults,
            reward_cache_ttl: value
                .reward_cache_ttl_seconds
                .map(Duration::from_secs)
                .unwrap_or(fallback.reward_cache_ttl),
            speed_answer_threshold: value
                .speed_answer_threshold_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.speed_answer_threshold),
            question_bank: value.question_bank.unwrap_or(fallback.question_bank),
        }
    }
}

fn positive_or<T: Default + PartialEq>(value: Option<T>, fallback: T) -> T {
    value.filter(|value| *value != T::default()).unwrap_or(fallback)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = serde_json::from_str::<RawConfig>("{}").unwrap().into();
        assert_eq!(config.start_delay, Duration::from_secs(3));
        assert_eq!(config.game_defaults, GameDefaults::default());
        assert_eq!(config.reward_cache_ttl, Duration::from_secs(60));
        assert!(!config.question_bank.is_empty());
    }

    #[test]
    fn zero_defaults_are_ignored_but_other_values_apply() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "startDelayMs": 500,
                "defaults": { "roundSeconds": 0, "questionsCount": 5, "difficulty": "hard" },
                "questionBank": []
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.start_delay, Duration::from_millis(500));
        assert_eq!(config.game_defaults.round_seconds, 10);
        assert_eq!(config.game_defaults.questions_count, 5);
        assert_eq!(config.game_defaults.difficulty, Difficulty::Hard);
        assert!(config.question_bank.is_empty());
    }
}
