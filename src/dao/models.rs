use std::{collections::HashMap, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Live-state tree (rooms/{roomId}); camelCase because clients read it directly.
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Lobby: players join and toggle ready.
    #[default]
    Waiting,
    /// Grace period between the host pressing start and the first question.
    Starting,
    /// Rounds are being played.
    Playing,
    /// Game finished normally and was settled.
    Ended,
    /// Game stopped early; no tokens were awarded.
    Aborted,
}

impl RoomStatus {
    /// Whether the room sits in a terminal state that only a reset can leave.
    pub fn is_finished(self) -> bool {
        matches!(self, RoomStatus::Ended | RoomStatus::Aborted)
    }

    /// Lowercase identifier as stored in the tree.
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Starting => "starting",
            RoomStatus::Playing => "playing",
            RoomStatus::Ended => "ended",
            RoomStatus::Aborted => "aborted",
        }
    }
}

/// Question difficulty. Unknown or missing values normalise to [`Difficulty::Medium`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Difficulty {
    /// One-step questions.
    Easy,
    /// Default difficulty.
    #[default]
    Medium,
    /// Multi-step questions.
    Hard,
}

impl Difficulty {
    /// Lowercase identifier used in stats paths and reward config keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl From<String> for Difficulty {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

/// Family of questions a room plays with. Unknown values normalise to [`GameType::Math`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum GameType {
    /// Generated arithmetic.
    #[default]
    Math,
    /// Questions drawn from the configured bank.
    Science,
}

impl GameType {
    /// Lowercase identifier used in stats paths.
    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Math => "math",
            GameType::Science => "science",
        }
    }
}

impl From<String> for GameType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "science" => GameType::Science,
            _ => GameType::Math,
        }
    }
}

/// Room settings as stored in the tree. Lobby-provided values may be partial; the snapshot
/// written at game start has every field populated.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsEntity {
    /// Pause between a reveal and the next question.
    pub delay_seconds: Option<u64>,
    /// Time allowed per question.
    pub round_seconds: Option<u64>,
    /// Number of questions in a game.
    pub questions_count: Option<u32>,
    /// Difficulty of every question.
    pub question_difficulty: Option<Difficulty>,
    /// Question family.
    pub game_type: Option<GameType>,
    /// Tokens credited for each correct answer.
    pub token_per_correct_answer: Option<u32>,
    /// Bonus paid to the sole winner.
    pub token_per_win: Option<u32>,
    /// Lobby fields this service does not interpret (privacy, password...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-room player slot.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerEntity {
    /// Account name.
    pub username: Option<String>,
    /// Optional display name preferred over the username.
    pub display_name: Option<String>,
    /// Toggled in the lobby; every player must be ready to start a multiplayer game.
    #[serde(default)]
    pub ready: bool,
    /// Correct answers in the current game.
    #[serde(default)]
    pub score: u32,
    /// Tokens earned in the current game, credited at settlement.
    #[serde(default)]
    pub tokens_earned: u32,
    /// Fields owned by the lobby.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoomPlayerEntity {
    /// Name shown to other players: display name first, then username.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .filter(|label| !label.is_empty())
    }
}

/// Question prompt, either plain text or an English/Chinese pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionText {
    /// Single-language prompt.
    Plain(String),
    /// English prompt with its Chinese translation.
    Bilingual { en: String, zh: String },
}

/// One answer candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Numeric answer.
    Number(i64),
    /// Textual answer.
    Text(QuestionText),
}

/// The question currently on screen in a room.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQuestionEntity {
    /// Prompt.
    pub question: QuestionText,
    /// Answer candidates, in display order.
    pub options: Vec<OptionValue>,
    /// Index of the correct option.
    pub correct_index: usize,
    /// Epoch milliseconds when the question was posed.
    pub started_at: u64,
    /// Player who resolved the question.
    pub answered_by: Option<String>,
    /// Label of [`Self::answered_by`].
    pub answered_by_username: Option<String>,
    /// Player who answered correctly; set at most once.
    pub correctly_answered_by: Option<String>,
    /// Set once the question was answered correctly.
    pub answered_correctly: Option<bool>,
    /// The question no longer accepts answers.
    #[serde(default)]
    pub answer_revealed: bool,
    /// Players who answered incorrectly; each gets one attempt.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub incorrect_answers: HashMap<String, bool>,
    /// Revealed because the round timer expired.
    #[serde(default)]
    pub time_up: bool,
    /// Revealed because every active player answered incorrectly.
    #[serde(default)]
    pub eliminated: bool,
    /// Time allowed for this question.
    pub round_seconds: u64,
}

impl CurrentQuestionEntity {
    /// Whether `player_id` already burned their attempt on this question.
    pub fn answered_incorrectly(&self, player_id: &str) -> bool {
        self.incorrect_answers.get(player_id).copied().unwrap_or(false)
    }
}

/// Full live state of a room.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntity {
    /// Name shown in the lobby.
    pub name: Option<String>,
    /// Player allowed to start and reset the game.
    #[serde(default)]
    pub host_id: String,
    /// Single-player room.
    #[serde(default)]
    pub is_solo: bool,
    /// Lifecycle status.
    #[serde(default)]
    pub status: RoomStatus,
    /// Game settings.
    #[serde(default)]
    pub settings: RoomSettingsEntity,
    /// Players in join order.
    #[serde(default)]
    pub players: IndexMap<String, RoomPlayerEntity>,
    /// Heartbeat flags; only a literal `true` counts as present.
    #[serde(default)]
    pub presence: HashMap<String, Value>,
    /// One-based number of the current question, 0 before the first.
    #[serde(default)]
    pub question_number: u32,
    /// Questions planned for the running game.
    pub total_questions: Option<u32>,
    /// Question on screen; absent between games.
    pub current_question: Option<CurrentQuestionEntity>,
    /// Sole winner of the last game.
    pub winner: Option<String>,
    /// Label of [`Self::winner`].
    pub winner_username: Option<String>,
    /// The last game ended with a shared top score.
    #[serde(default)]
    pub is_draw: bool,
    /// Last player to leave an aborted room.
    pub aborted_by: Option<String>,
    /// Marker of the game instance currently owning the room's timers.
    pub current_game_id: Option<String>,
    /// Epoch milliseconds of the last reset.
    pub last_reset_at: Option<u64>,
    /// Epoch milliseconds of the room creation.
    pub created_at: Option<u64>,
    /// Fields owned by the lobby.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoomEntity {
    /// Whether the player is currently marked present by the heartbeat mechanism.
    pub fn is_present(&self, player_id: &str) -> bool {
        matches!(self.presence.get(player_id), Some(Value::Bool(true)))
    }

    /// Whether `generation` still identifies the game instance running in this room.
    pub fn is_generation(&self, generation: &str) -> bool {
        self.current_game_id.as_deref() == Some(generation)
    }
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// Player profile holding the token balance and lifetime answer counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfileEntity {
    /// Player id, shared with the live tree.
    pub id: String,
    /// Account name.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Current balance.
    pub tokens: i64,
    /// Lifetime answers.
    pub total_answered: u64,
    /// Lifetime correct answers.
    pub total_correct: u64,
}

/// Kind of a ledger movement. Games only ever credit tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Tokens credited to the player.
    Earn,
}

/// Immutable ledger record appended for every balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntity {
    /// Record id.
    pub id: Uuid,
    /// Credited player.
    pub player_id: String,
    /// Movement kind.
    pub kind: TransactionKind,
    /// Tokens moved.
    pub amount: u32,
    /// Human readable reason.
    pub reason: String,
    /// Room the tokens were earned in.
    pub room_id: Option<String>,
    /// Creation time.
    pub created_at: SystemTime,
}

/// Leaderboard mirror update issued after a balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardSyncEntity {
    /// Player to mirror.
    pub player_id: String,
    /// Account name.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Absolute balance after the change.
    pub tokens: i64,
    /// Amount added to the lifetime earned counter.
    pub tokens_earned: u32,
}

/// Answered/correct counters for one game type and difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCountersEntity {
    /// Answers submitted.
    pub total_answered: u64,
    /// Correct answers.
    pub total_correct: u64,
}

/// Public leaderboard mirror of a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntryEntity {
    /// Player id.
    pub player_id: String,
    /// Account name.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Current balance.
    pub tokens: i64,
    /// Tokens earned over the player's lifetime.
    pub total_tokens_earned: u64,
    /// Lifetime answers.
    pub total_answered: u64,
    /// Lifetime correct answers.
    pub total_correct: u64,
}

/// Increment applied to a player's per game-type/difficulty answer statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsDeltaEntity {
    /// Question family of the game.
    pub game_type: GameType,
    /// Difficulty of the game.
    pub difficulty: Difficulty,
    /// Answers submitted in the game.
    pub answered: u32,
    /// Correct answers in the game.
    pub correct: u32,
    /// Also add the counters to the leaderboard mirror.
    pub sync_leaderboard: bool,
}

/// Raw reward configuration document (`config/tokenRewards`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRewardsEntity {
    /// Overrides for easy games.
    #[serde(default)]
    pub easy: Option<DifficultyRewardEntity>,
    /// Overrides for medium games.
    #[serde(default)]
    pub medium: Option<DifficultyRewardEntity>,
    /// Overrides for hard games.
    #[serde(default)]
    pub hard: Option<DifficultyRewardEntity>,
}

impl TokenRewardsEntity {
    /// Reward overrides configured for `difficulty`, if any.
    pub fn for_difficulty(&self, difficulty: Difficulty) -> Option<&DifficultyRewardEntity> {
        match difficulty {
            Difficulty::Easy => self.easy.as_ref(),
            Difficulty::Medium => self.medium.as_ref(),
            Difficulty::Hard => self.hard.as_ref(),
        }
    }
}

/// Per-difficulty reward override. Values are untrusted and validated on use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyRewardEntity {
    /// Tokens per correct answer.
    pub token_per_correct: Option<f64>,
    /// Winner bonus.
    pub token_per_win: Option<f64>,
}

/// Progress of one quest for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgressEntity {
    /// Progress towards the quest target.
    pub progress: u32,
    /// Target reached in the current window.
    pub completed: bool,
    /// Reward already claimed by the player.
    pub claimed: bool,
    /// Difficulties won at, for the mastery quest.
    #[serde(default)]
    pub difficulties: Vec<Difficulty>,
    /// Last change, used to detect a new reset window.
    pub last_updated: Option<SystemTime>,
}

/// Per-player line of a game session summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlayerEntity {
    /// Player id.
    pub player_id: String,
    /// Account name.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Final score.
    pub score: u32,
    /// Tokens earned from answers.
    pub tokens_earned: u32,
    /// Bonus paid for winning.
    pub winner_bonus: u32,
    /// Tokens credited at settlement.
    pub total_tokens_earned: u32,
    /// Sole winner of the game.
    pub is_winner: bool,
}

/// Immutable summary persisted once per finished or aborted game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSessionEntity {
    /// Session id.
    pub session_id: Uuid,
    /// Room the game was played in.
    pub room_id: String,
    /// Room name at the end of the game.
    pub room_name: Option<String>,
    /// Host at the end of the game.
    pub host_id: Option<String>,
    /// `ended` or `aborted`.
    pub status: RoomStatus,
    /// The game ended in a draw.
    pub is_draw: bool,
    /// Sole winner.
    pub winner_id: Option<String>,
    /// Label of the winner.
    pub winner_name: Option<String>,
    /// Players at the end of the game.
    pub player_count: usize,
    /// Settings the game was played with.
    pub settings_snapshot: RoomSettingsEntity,
    /// Tokens were credited, i.e. the game was not aborted.
    pub tokens_awarded: bool,
    /// Per-player results.
    pub players: Vec<SessionPlayerEntity>,
    /// End time.
    pub ended_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn room_deserializes_from_sparse_tree() {
        let room: RoomEntity = serde_json::from_value(json!({
            "hostId": "p1",
            "status": "waiting",
            "settings": { "questionDifficulty": "HARD", "gameType": "chess" },
            "players": { "p1": { "username": "ada" } }
        }))
        .unwrap();

        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.settings.question_difficulty, Some(Difficulty::Hard));
        assert_eq!(room.settings.game_type, Some(GameType::Math));
        assert_eq!(room.players["p1"].score, 0);
        assert!(room.current_question.is_none());
        assert!(!room.is_present("p1"));
    }

    #[test]
    fn absent_fields_are_not_written_back() {
        let room = RoomEntity {
            host_id: "p1".into(),
            ..RoomEntity::default()
        };
        let value = serde_json::to_value(&room).unwrap();
        assert!(value.get("currentQuestion").is_none());
        assert!(value.get("winner").is_none());
        assert_eq!(value["status"], "waiting");
    }

    #[test]
    fn unknown_lobby_fields_survive_a_rewrite() {
        let raw = json!({
            "hostId": "p1",
            "status": "waiting",
            "isPrivate": true,
            "settings": { "roundSeconds": 15, "password": "hunter2" },
            "players": { "p1": { "username": "ada", "avatar": "cat" } },
            "presence": { "p1": true, "p2": { "online": true } }
        });
        let room: RoomEntity = serde_json::from_value(raw).unwrap();
        assert!(room.is_present("p1"));
        assert!(!room.is_present("p2"));

        let written = serde_json::to_value(&room).unwrap();
        assert_eq!(written["isPrivate"], true);
        assert_eq!(written["settings"]["password"], "hunter2");
        assert_eq!(written["players"]["p1"]["avatar"], "cat");
    }

    #[test]
    fn bilingual_options_round_trip_through_untagged_enums() {
        let question: CurrentQuestionEntity = serde_json::from_value(json!({
            "question": { "en": "Water?", "zh": "水?" },
            "options": [12, "plain", { "en": "H2O", "zh": "水" }],
            "correctIndex": 2,
            "startedAt": 10,
            "roundSeconds": 10
        }))
        .unwrap();

        assert_eq!(question.options[0], OptionValue::Number(12));
        assert_eq!(
            question.options[2],
            OptionValue::Text(QuestionText::Bilingual {
                en: "H2O".into(),
                zh: "水".into()
            })
        );
        assert!(!question.answer_revealed);
    }
}
