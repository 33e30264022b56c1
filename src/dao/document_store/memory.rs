use std::{
    collections::{HashMap, HashSet},
    io,
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::dao::{
    models::{
        AnswerCountersEntity, Difficulty, GameSessionEntity, GameType, LeaderboardEntryEntity,
        LeaderboardSyncEntity, PlayerProfileEntity, QuestProgressEntity, StatsDeltaEntity,
        TokenRewardsEntity, TransactionEntity,
    },
    storage::{StorageError, StorageResult},
};

/// In-process document store used for development and tests.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<MemoryDocuments>>,
}

#[derive(Default)]
struct MemoryDocuments {
    token_rewards: Option<TokenRewardsEntity>,
    players: HashMap<String, PlayerProfileEntity>,
    stats: HashMap<(String, GameType, Difficulty), AnswerCountersEntity>,
    transactions: Vec<TransactionEntity>,
    leaderboard: HashMap<String, LeaderboardEntryEntity>,
    quests: HashMap<String, HashMap<String, QuestProgressEntity>>,
    sessions: Vec<GameSessionEntity>,
    failing_players: HashSet<String>,
    offline: bool,
}

impl MemoryDocuments {
    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline {
            return Err(StorageError::unavailable(
                "memory document store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ));
        }
        Ok(())
    }

    fn ensure_player_writable(&self, player_id: &str) -> StorageResult<()> {
        self.ensure_online()?;
        if self.failing_players.contains(player_id) {
            return Err(StorageError::unavailable(
                format!("writes for player `{player_id}` are failing"),
                io::Error::other("injected failure"),
            ));
        }
        Ok(())
    }

    fn leaderboard_entry(&mut self, player_id: &str) -> &mut LeaderboardEntryEntity {
        self.leaderboard
            .entry(player_id.to_string())
            .or_insert_with(|| LeaderboardEntryEntity {
                player_id: player_id.to_string(),
                ..LeaderboardEntryEntity::default()
            })
    }
}

impl MemoryDocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a player profile.
    pub async fn insert_player(&self, profile: PlayerProfileEntity) {
        let mut docs = self.inner.write().await;
        docs.players.insert(profile.id.clone(), profile);
    }

    /// Install the reward configuration document.
    pub async fn set_token_rewards(&self, rewards: TokenRewardsEntity) {
        self.inner.write().await.token_rewards = Some(rewards);
    }

    /// Make every write concerning `player_id` fail until cleared.
    pub async fn fail_writes_for(&self, player_id: &str) {
        self.inner
            .write()
            .await
            .failing_players
            .insert(player_id.to_string());
    }

    /// Simulate a lost connection; cleared by [`DocumentStore::try_reconnect`].
    pub async fn set_offline(&self, offline: bool) {
        self.inner.write().await.offline = offline;
    }

    /// Stored profile of `player_id`.
    pub async fn player(&self, player_id: &str) -> Option<PlayerProfileEntity> {
        self.inner.read().await.players.get(player_id).cloned()
    }

    /// Every ledger entry, in insertion order.
    pub async fn transactions(&self) -> Vec<TransactionEntity> {
        self.inner.read().await.transactions.clone()
    }

    /// Public leaderboard row of `player_id`.
    pub async fn leaderboard_entry(&self, player_id: &str) -> Option<LeaderboardEntryEntity> {
        self.inner.read().await.leaderboard.get(player_id).cloned()
    }

    /// Answer statistics of one player for a game type and difficulty.
    pub async fn answer_counters(
        &self,
        player_id: &str,
        game_type: GameType,
        difficulty: Difficulty,
    ) -> Option<AnswerCountersEntity> {
        self.inner
            .read()
            .await
            .stats
            .get(&(player_id.to_string(), game_type, difficulty))
            .copied()
    }

    /// Persisted game sessions.
    pub async fn sessions(&self) -> Vec<GameSessionEntity> {
        self.inner.read().await.sessions.clone()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn find_token_rewards(&self) -> BoxFuture<'static, StorageResult<Option<TokenRewardsEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let docs = inner.read().await;
            docs.ensure_online()?;
            Ok(docs.token_rewards.clone())
        })
    }

    fn find_player(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>> {
        let inner = self.inner.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            let docs = inner.read().await;
            docs.ensure_online()?;
            Ok(docs.players.get(&player_id).cloned())
        })
    }

    fn credit_tokens(
        &self,
        player_id: &str,
        amount: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>> {
        let inner = self.inner.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_player_writable(&player_id)?;
            Ok(docs.players.get_mut(&player_id).map(|profile| {
                profile.tokens += i64::from(amount);
                profile.clone()
            }))
        })
    }

    fn record_transaction(
        &self,
        transaction: TransactionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_player_writable(&transaction.player_id)?;
            docs.transactions.push(transaction);
            Ok(())
        })
    }

    fn sync_leaderboard(
        &self,
        entry: LeaderboardSyncEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_player_writable(&entry.player_id)?;
            let mirror = docs.leaderboard_entry(&entry.player_id);
            mirror.tokens = entry.tokens;
            mirror.total_tokens_earned += u64::from(entry.tokens_earned);
            if entry.username.is_some() {
                mirror.username = entry.username;
            }
            if entry.display_name.is_some() {
                mirror.display_name = entry.display_name;
            }
            Ok(())
        })
    }

    fn increment_stats(
        &self,
        player_id: &str,
        delta: StatsDeltaEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_player_writable(&player_id)?;
            let (answered, correct) = (u64::from(delta.answered), u64::from(delta.correct));

            let Some(profile) = docs.players.get_mut(&player_id) else {
                return Ok(());
            };
            profile.total_answered += answered;
            profile.total_correct += correct;

            let counters = docs
                .stats
                .entry((player_id.clone(), delta.game_type, delta.difficulty))
                .or_default();
            counters.total_answered += answered;
            counters.total_correct += correct;

            if delta.sync_leaderboard {
                let mirror = docs.leaderboard_entry(&player_id);
                mirror.total_answered += answered;
                mirror.total_correct += correct;
            }
            Ok(())
        })
    }

    fn find_quest_progress(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, QuestProgressEntity>>> {
        let inner = self.inner.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            let docs = inner.read().await;
            docs.ensure_online()?;
            Ok(docs.quests.get(&player_id).cloned().unwrap_or_default())
        })
    }

    fn save_quest_progress(
        &self,
        player_id: &str,
        quests: HashMap<String, QuestProgressEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_player_writable(&player_id)?;
            docs.quests.entry(player_id).or_default().extend(quests);
            Ok(())
        })
    }

    fn save_game_session(
        &self,
        session: GameSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut docs = inner.write().await;
            docs.ensure_online()?;
            docs.sessions.push(session);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.read().await.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.offline = false;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, tokens: i64) -> PlayerProfileEntity {
        PlayerProfileEntity {
            id: id.into(),
            username: Some(format!("{id}-name")),
            display_name: None,
            tokens,
            total_answered: 0,
            total_correct: 0,
        }
    }

    #[tokio::test]
    async fn credit_tokens_increments_existing_players_only() {
        let store = MemoryDocumentStore::new();
        store.insert_player(profile("a", 5)).await;

        let updated = store.credit_tokens("a", 7).await.unwrap().unwrap();
        assert_eq!(updated.tokens, 12);
        assert!(store.credit_tokens("ghost", 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_feed_profile_breakdown_and_optional_leaderboard() {
        let store = MemoryDocumentStore::new();
        store.insert_player(profile("a", 0)).await;

        for sync_leaderboard in [true, false] {
            store
                .increment_stats(
                    "a",
                    StatsDeltaEntity {
                        game_type: GameType::Math,
                        difficulty: Difficulty::Hard,
                        answered: 3,
                        correct: 2,
                        sync_leaderboard,
                    },
                )
                .await
                .unwrap();
        }

        let player = store.player("a").await.unwrap();
        assert_eq!((player.total_answered, player.total_correct), (6, 4));
        let counters = store
            .answer_counters("a", GameType::Math, Difficulty::Hard)
            .await
            .unwrap();
        assert_eq!(counters.total_answered, 6);
        let mirror = store.leaderboard_entry("a").await.unwrap();
        assert_eq!((mirror.total_answered, mirror.total_correct), (3, 2));
    }

    #[tokio::test]
    async fn injected_failures_only_hit_the_selected_player() {
        let store = MemoryDocumentStore::new();
        store.insert_player(profile("a", 0)).await;
        store.insert_player(profile("b", 0)).await;
        store.fail_writes_for("a").await;

        assert!(store.credit_tokens("a", 1).await.is_err());
        assert!(store.credit_tokens("b", 1).await.is_ok());
    }

    #[tokio::test]
    async fn reconnect_clears_offline_mode() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true).await;
        assert!(store.health_check().await.is_err());
        store.try_reconnect().await.unwrap();
        assert!(store.health_check().await.is_ok());
    }
}
