//! Immutable end-of-game summaries.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        document_store::DocumentStore,
        models::{GameSessionEntity, RoomEntity, RoomStatus, SessionPlayerEntity},
        storage::StorageResult,
    },
    services::game_service::GameOutcome,
};

/// Summarise a finished or aborted game from the room as it was before settlement.
pub fn build_summary(
    room_id: &str,
    room: &RoomEntity,
    outcome: &GameOutcome,
    ended_at: SystemTime,
) -> GameSessionEntity {
    let players = room
        .players
        .iter()
        .map(|(player_id, player)| {
            let is_winner = outcome.is_winner(player_id);
            let winner_bonus = if is_winner { outcome.winner_bonus } else { 0 };
            SessionPlayerEntity {
                player_id: player_id.clone(),
                username: player.username.clone(),
                display_name: player.display_name.clone(),
                score: player.score,
                tokens_earned: player.tokens_earned,
                winner_bonus,
                total_tokens_earned: if outcome.aborted {
                    0
                } else {
                    player.tokens_earned.saturating_add(winner_bonus)
                },
                is_winner,
            }
        })
        .collect();

    GameSessionEntity {
        session_id: Uuid::new_v4(),
        room_id: room_id.to_string(),
        room_name: room.name.clone(),
        host_id: Some(room.host_id.clone()).filter(|host| !host.is_empty()),
        status: if outcome.aborted {
            RoomStatus::Aborted
        } else {
            RoomStatus::Ended
        },
        is_draw: outcome.is_draw,
        winner_id: outcome.winner.as_ref().map(|winner| winner.player_id.clone()),
        winner_name: outcome.winner.as_ref().and_then(|winner| winner.label.clone()),
        player_count: room.players.len(),
        settings_snapshot: room.settings.clone(),
        tokens_awarded: !outcome.aborted,
        players,
        ended_at,
    }
}

/// Store the session record; failures are returned to the caller.
pub async fn persist(store: &dyn DocumentStore, session: GameSessionEntity) -> StorageResult<()> {
    let session_id = session.session_id;
    let room_id = session.room_id.clone();
    store.save_game_session(session).await?;
    info!(%session_id, room_id = %room_id, "game session saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::game_service::Winner;

    fn finished_room() -> RoomEntity {
        serde_json::from_value(json!({
            "name": "Friday quiz",
            "hostId": "a",
            "status": "playing",
            "settings": { "questionsCount": 3, "tokenPerWin": 20 },
            "players": {
                "a": { "username": "ada", "score": 2, "tokensEarned": 4 },
                "b": { "username": "bob", "displayName": "Bobby", "score": 1, "tokensEarned": 2 }
            }
        }))
        .unwrap()
    }

    #[test]
    fn winner_line_carries_the_bonus() {
        let outcome = GameOutcome {
            aborted: false,
            winner: Some(Winner {
                player_id: "a".into(),
                label: Some("ada".into()),
            }),
            is_draw: false,
            winner_bonus: 20,
        };
        let summary = build_summary("r1", &finished_room(), &outcome, SystemTime::now());

        assert_eq!(summary.status, RoomStatus::Ended);
        assert_eq!(summary.winner_id.as_deref(), Some("a"));
        assert_eq!(summary.player_count, 2);
        assert!(summary.tokens_awarded);
        assert_eq!(summary.players[0].total_tokens_earned, 24);
        assert!(summary.players[0].is_winner);
        assert_eq!(summary.players[1].winner_bonus, 0);
        assert_eq!(summary.players[1].total_tokens_earned, 2);
    }

    #[test]
    fn aborted_games_award_nothing() {
        let outcome = GameOutcome {
            aborted: true,
            winner: None,
            is_draw: false,
            winner_bonus: 20,
        };
        let summary = build_summary("r1", &finished_room(), &outcome, SystemTime::now());

        assert_eq!(summary.status, RoomStatus::Aborted);
        assert!(!summary.tokens_awarded);
        assert!(summary.players.iter().all(|player| {
            player.total_tokens_earned == 0 && !player.is_winner && player.tokens_earned > 0
        }));
    }
}
