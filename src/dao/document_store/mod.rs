/// In-process store used by default and in tests.
pub mod memory;
/// MongoDB collections.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::dao::{
    models::{
        GameSessionEntity, LeaderboardSyncEntity, PlayerProfileEntity, QuestProgressEntity,
        StatsDeltaEntity, TokenRewardsEntity, TransactionEntity,
    },
    storage::StorageResult,
};

/// Abstraction over the document database holding players, ledger, quests and sessions.
pub trait DocumentStore: Send + Sync {
    /// Reward overrides stored under `config/tokenRewards`.
    fn find_token_rewards(&self) -> BoxFuture<'static, StorageResult<Option<TokenRewardsEntity>>>;
    /// Profile of a player, `None` when unknown.
    fn find_player(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>>;
    /// Atomically add `amount` to the player's balance and return the updated profile.
    /// `None` when the player does not exist.
    fn credit_tokens(
        &self,
        player_id: &str,
        amount: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>>;
    /// Append an immutable ledger record.
    fn record_transaction(
        &self,
        transaction: TransactionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Upsert the public leaderboard mirror of a player.
    fn sync_leaderboard(&self, entry: LeaderboardSyncEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Add a game's answer counters to the player's statistics.
    fn increment_stats(
        &self,
        player_id: &str,
        delta: StatsDeltaEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Every quest progress record of a player, keyed by quest id.
    fn find_quest_progress(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, QuestProgressEntity>>>;
    /// Merge the given quest records into the player's progress document.
    fn save_quest_progress(
        &self,
        player_id: &str,
        quests: HashMap<String, QuestProgressEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert a game session summary.
    fn save_game_session(&self, session: GameSessionEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
