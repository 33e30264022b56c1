use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    Difficulty, GameSessionEntity, PlayerProfileEntity, QuestProgressEntity, RoomSettingsEntity,
    RoomStatus, SessionPlayerEntity, TransactionEntity, TransactionKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    tokens: i64,
    #[serde(default)]
    total_answered: i64,
    #[serde(default)]
    total_correct: i64,
}

impl From<MongoPlayerDocument> for PlayerProfileEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id,
            username: value.username,
            display_name: value.display_name,
            tokens: value.tokens,
            total_answered: u64::try_from(value.total_answered).unwrap_or_default(),
            total_correct: u64::try_from(value.total_correct).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoTransactionDocument {
    #[serde(rename = "_id")]
    id: String,
    player_id: String,
    #[serde(rename = "type")]
    kind: TransactionKind,
    amount: i64,
    reason: String,
    room_id: Option<String>,
    created_at: DateTime,
}

impl From<TransactionEntity> for MongoTransactionDocument {
    fn from(value: TransactionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            player_id: value.player_id,
            kind: value.kind,
            amount: i64::from(value.amount),
            reason: value.reason,
            room_id: value.room_id,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

/// Per-player quest document (`questProgress/{playerId}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MongoQuestProgressDocument {
    #[serde(default)]
    pub quests: std::collections::HashMap<String, MongoQuestProgress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoQuestProgress {
    #[serde(default)]
    progress: i64,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    claimed: bool,
    #[serde(default)]
    difficulties: Vec<Difficulty>,
    #[serde(default)]
    last_updated: Option<DateTime>,
}

impl From<MongoQuestProgress> for QuestProgressEntity {
    fn from(value: MongoQuestProgress) -> Self {
        Self {
            progress: u32::try_from(value.progress.max(0)).unwrap_or(u32::MAX),
            completed: value.completed,
            claimed: value.claimed,
            difficulties: value.difficulties,
            last_updated: value.last_updated.map(DateTime::to_system_time),
        }
    }
}

/// Sub-document written under `quests.{questId}`.
pub fn quest_progress_document(progress: &QuestProgressEntity) -> Document {
    let difficulties: Vec<&str> = progress
        .difficulties
        .iter()
        .map(|difficulty| difficulty.as_str())
        .collect();
    doc! {
        "progress": i64::from(progress.progress),
        "completed": progress.completed,
        "claimed": progress.claimed,
        "difficulties": difficulties,
        "lastUpdated": progress.last_updated.map(DateTime::from_system_time),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoGameSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    room_name: Option<String>,
    host_id: Option<String>,
    status: RoomStatus,
    is_draw: bool,
    winner_id: Option<String>,
    winner_name: Option<String>,
    player_count: i64,
    settings_snapshot: RoomSettingsEntity,
    tokens_awarded: bool,
    players: Vec<SessionPlayerEntity>,
    ended_at: DateTime,
}

impl From<GameSessionEntity> for MongoGameSessionDocument {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.session_id.to_string(),
            room_id: value.room_id,
            room_name: value.room_name,
            host_id: value.host_id,
            status: value.status,
            is_draw: value.is_draw,
            winner_id: value.winner_id,
            winner_name: value.winner_name,
            player_count: i64::try_from(value.player_count).unwrap_or(i64::MAX),
            settings_snapshot: value.settings_snapshot,
            tokens_awarded: value.tokens_awarded,
            players: value.players,
            ended_at: DateTime::from_system_time(value.ended_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn quest_progress_document_uses_camel_case_and_lowercase_difficulties() {
        let progress = QuestProgressEntity {
            progress: 2,
            completed: false,
            claimed: false,
            difficulties: vec![Difficulty::Easy, Difficulty::Hard],
            last_updated: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(60)),
        };
        let document = quest_progress_document(&progress);
        assert_eq!(document.get_i64("progress").unwrap(), 2);
        assert_eq!(
            document.get_array("difficulties").unwrap().len(),
            2
        );
        assert!(document.get_datetime("lastUpdated").is_ok());
    }

    #[test]
    fn negative_counters_clamp_to_zero() {
        let progress: QuestProgressEntity = MongoQuestProgress {
            progress: -4,
            ..MongoQuestProgress::default()
        }
        .into();
        assert_eq!(progress.progress, 0);
    }
}
