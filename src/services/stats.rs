//! Lifetime answer statistics per game type and difficulty.

use tracing::debug;

use crate::dao::{
    document_store::DocumentStore,
    models::{Difficulty, GameType, StatsDeltaEntity},
    storage::StorageResult,
};

/// Add one game's answer counts to the player's statistics.
///
/// Nothing is written when the player did not answer anything.
pub async fn update_stats(
    store: &dyn DocumentStore,
    player_id: &str,
    game_type: GameType,
    difficulty: Difficulty,
    answered: u32,
    correct: u32,
    sync_leaderboard: bool,
) -> StorageResult<()> {
    if answered == 0 {
        return Ok(());
    }

    store
        .increment_stats(
            player_id,
            StatsDeltaEntity {
                game_type,
                difficulty,
                answered,
                correct,
                sync_leaderboard,
            },
        )
        .await?;

    debug!(
        player_id,
        game_type = game_type.as_str(),
        difficulty = difficulty.as_str(),
        answered,
        correct,
        "stats updated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        document_store::memory::MemoryDocumentStore, models::PlayerProfileEntity,
    };

    #[tokio::test]
    async fn idle_players_leave_no_trace() {
        let store = MemoryDocumentStore::new();
        store
            .insert_player(PlayerProfileEntity {
                id: "a".into(),
                username: None,
                display_name: None,
                tokens: 0,
                total_answered: 0,
                total_correct: 0,
            })
            .await;

        update_stats(&store, "a", GameType::Science, Difficulty::Easy, 0, 0, true)
            .await
            .unwrap();
        assert!(
            store
                .answer_counters("a", GameType::Science, Difficulty::Easy)
                .await
                .is_none()
        );

        update_stats(&store, "a", GameType::Science, Difficulty::Easy, 4, 3, true)
            .await
            .unwrap();
        let counters = store
            .answer_counters("a", GameType::Science, Difficulty::Easy)
            .await
            .unwrap();
        assert_eq!((counters.total_answered, counters.total_correct), (4, 3));
        assert_eq!(store.leaderboard_entry("a").await.unwrap().total_correct, 3);
    }
}
