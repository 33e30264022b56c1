//! Token crediting: balance increment, leaderboard mirror and transaction log.

use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dao::{
    document_store::DocumentStore,
    models::{LeaderboardSyncEntity, PlayerProfileEntity, TransactionEntity, TransactionKind},
    storage::StorageResult,
};

/// Tokens owed to one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAward {
    /// Player credited.
    pub player_id: String,
    /// Name shown in the room; preferred over the profile's display name on the leaderboard.
    pub label: Option<String>,
    /// Tokens to add.
    pub amount: u32,
    /// Free-form reason recorded on the transaction.
    pub reason: String,
    /// Room the tokens were earned in.
    pub room_id: Option<String>,
    /// Mirror the new balance on the public leaderboard (multiplayer games only).
    pub sync_leaderboard: bool,
}

/// Reason written to the transaction log for an end-of-game payout.
pub fn game_complete_reason(winner_bonus: Option<u32>) -> String {
    match winner_bonus {
        Some(bonus) if bonus > 0 => format!("Game Complete (+{bonus} Winner Bonus)"),
        _ => "Game Complete".to_string(),
    }
}

/// Credit `award` to the player's balance, then mirror it and log an `earn` transaction.
///
/// The credit is an atomic increment. Mirror and log failures are reported but do not undo
/// the credit. Returns `None` when nothing was credited (zero amount or unknown player).
pub async fn award(
    store: &dyn DocumentStore,
    award: TokenAward,
) -> StorageResult<Option<PlayerProfileEntity>> {
    if award.amount == 0 {
        return Ok(None);
    }

    let Some(profile) = store.credit_tokens(&award.player_id, award.amount).await? else {
        warn!(
            player_id = %award.player_id,
            amount = award.amount,
            "player profile not found; tokens not credited"
        );
        return Ok(None);
    };

    if award.sync_leaderboard {
        let entry = LeaderboardSyncEntity {
            player_id: award.player_id.clone(),
            username: profile.username.clone(),
            display_name: award.label.clone().or_else(|| profile.display_name.clone()),
            tokens: profile.tokens,
            tokens_earned: award.amount,
        };
        if let Err(err) = store.sync_leaderboard(entry).await {
            warn!(player_id = %award.player_id, error = %err, "failed to sync leaderboard");
        }
    }

    let transaction = TransactionEntity {
        id: Uuid::new_v4(),
        player_id: award.player_id.clone(),
        kind: TransactionKind::Earn,
        amount: award.amount,
        reason: award.reason,
        room_id: award.room_id,
        created_at: SystemTime::now(),
    };
    if let Err(err) = store.record_transaction(transaction).await {
        warn!(player_id = %award.player_id, error = %err, "failed to log transaction");
    } else {
        debug!(player_id = %award.player_id, "transaction logged");
    }

    info!(
        player_id = %award.player_id,
        amount = award.amount,
        balance = profile.tokens,
        "tokens awarded"
    );
    Ok(Some(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::document_store::memory::MemoryDocumentStore;

    fn payout(player_id: &str, amount: u32, sync_leaderboard: bool) -> TokenAward {
        TokenAward {
            player_id: player_id.into(),
            label: Some("Ada L.".into()),
            amount,
            reason: game_complete_reason(Some(20)),
            room_id: Some("r1".into()),
            sync_leaderboard,
        }
    }

    async fn store_with(player_id: &str) -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store
            .insert_player(PlayerProfileEntity {
                id: player_id.into(),
                username: Some("ada".into()),
                display_name: None,
                tokens: 10,
                total_answered: 0,
                total_correct: 0,
            })
            .await;
        store
    }

    #[test]
    fn reasons_mention_the_bonus_only_when_paid() {
        assert_eq!(game_complete_reason(None), "Game Complete");
        assert_eq!(game_complete_reason(Some(0)), "Game Complete");
        assert_eq!(
            game_complete_reason(Some(30)),
            "Game Complete (+30 Winner Bonus)"
        );
    }

    #[tokio::test]
    async fn award_credits_mirrors_and_logs() {
        let store = store_with("a").await;

        let profile = award(&store, payout("a", 25, true)).await.unwrap().unwrap();
        assert_eq!(profile.tokens, 35);

        let mirror = store.leaderboard_entry("a").await.unwrap();
        assert_eq!(mirror.tokens, 35);
        assert_eq!(mirror.total_tokens_earned, 25);
        assert_eq!(mirror.display_name.as_deref(), Some("Ada L."));

        let transactions = store.transactions().await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Earn);
        assert_eq!(transactions[0].reason, "Game Complete (+20 Winner Bonus)");
        assert_eq!(transactions[0].room_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn solo_awards_skip_the_leaderboard() {
        let store = store_with("a").await;
        award(&store, payout("a", 3, false)).await.unwrap();
        assert!(store.leaderboard_entry("a").await.is_none());
        assert_eq!(store.transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn zero_amounts_and_unknown_players_are_skipped() {
        let store = store_with("a").await;
        assert!(award(&store, payout("a", 0, true)).await.unwrap().is_none());
        assert!(award(&store, payout("ghost", 5, true)).await.unwrap().is_none());
        assert!(store.transactions().await.is_empty());
        assert_eq!(store.player("a").await.unwrap().tokens, 10);
    }
}
