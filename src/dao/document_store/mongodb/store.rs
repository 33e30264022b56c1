use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGameSessionDocument, MongoPlayerDocument, MongoQuestProgressDocument,
        MongoTransactionDocument, quest_progress_document,
    },
};
use crate::dao::{
    document_store::DocumentStore,
    models::{
        GameSessionEntity, LeaderboardSyncEntity, PlayerProfileEntity, QuestProgressEntity,
        StatsDeltaEntity, TokenRewardsEntity, TransactionEntity,
    },
    storage::StorageResult,
};

const PLAYER_COLLECTION_NAME: &str = "players";
const TRANSACTION_COLLECTION_NAME: &str = "transactions";
const LEADERBOARD_COLLECTION_NAME: &str = "leaderboard";
const QUEST_PROGRESS_COLLECTION_NAME: &str = "questProgress";
const GAME_SESSION_COLLECTION_NAME: &str = "gameSessions";
const CONFIG_COLLECTION_NAME: &str = "config";
const TOKEN_REWARDS_DOCUMENT_ID: &str = "tokenRewards";

/// [`DocumentStore`] backed by MongoDB collections.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.state.write().await = database;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let transactions = database.collection::<Document>(TRANSACTION_COLLECTION_NAME);
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "playerId": 1, "createdAt": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("transaction_player_idx".to_owned()))
                    .build(),
            )
            .build();
        transactions
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: TRANSACTION_COLLECTION_NAME,
                index: "playerId,createdAt",
                source,
            })?;

        let sessions = database.collection::<Document>(GAME_SESSION_COLLECTION_NAME);
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "roomId": 1, "endedAt": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("session_room_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_SESSION_COLLECTION_NAME,
                index: "roomId,endedAt",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn find_token_rewards(&self) -> MongoResult<Option<TokenRewardsEntity>> {
        self.collection::<TokenRewardsEntity>(CONFIG_COLLECTION_NAME)
            .await
            .find_one(doc! { "_id": TOKEN_REWARDS_DOCUMENT_ID })
            .await
            .map_err(|source| MongoDaoError::LoadTokenRewards { source })
    }

    async fn find_player(&self, player_id: String) -> MongoResult<Option<PlayerProfileEntity>> {
        let document = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await
            .find_one(doc! { "_id": player_id.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { player_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn credit_tokens(
        &self,
        player_id: String,
        amount: u32,
    ) -> MongoResult<Option<PlayerProfileEntity>> {
        let document = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
            .await
            .find_one_and_update(
                doc! { "_id": player_id.as_str() },
                doc! {
                    "$inc": { "tokens": i64::from(amount) },
                    "$set": { "updatedAt": DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::CreditTokens { player_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_transaction(&self, transaction: TransactionEntity) -> MongoResult<()> {
        let id = transaction.id;
        let document: MongoTransactionDocument = transaction.into();
        self.collection::<MongoTransactionDocument>(TRANSACTION_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::RecordTransaction { id, source })?;
        Ok(())
    }

    async fn sync_leaderboard(&self, entry: LeaderboardSyncEntity) -> MongoResult<()> {
        let mut set = doc! {
            "tokens": entry.tokens,
            "updatedAt": DateTime::now(),
        };
        if let Some(username) = entry.username {
            set.insert("username", username);
        }
        if let Some(display_name) = entry.display_name {
            set.insert("displayName", display_name);
        }

        self.collection::<Document>(LEADERBOARD_COLLECTION_NAME)
            .await
            .update_one(
                doc! { "_id": entry.player_id.as_str() },
                doc! {
                    "$set": set,
                    "$inc": { "totalTokensEarned": i64::from(entry.tokens_earned) },
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SyncLeaderboard {
                player_id: entry.player_id,
                source,
            })?;
        Ok(())
    }

    async fn increment_stats(&self, player_id: String, delta: StatsDeltaEntity) -> MongoResult<()> {
        let prefix = format!(
            "stats.{}.{}",
            delta.game_type.as_str(),
            delta.difficulty.as_str()
        );
        let answered = i64::from(delta.answered);
        let correct = i64::from(delta.correct);
        let mut increments = doc! {
            "totalAnswered": answered,
            "totalCorrect": correct,
        };
        increments.insert(format!("{prefix}.totalAnswered"), answered);
        increments.insert(format!("{prefix}.totalCorrect"), correct);

        self.collection::<Document>(PLAYER_COLLECTION_NAME)
            .await
            .update_one(
                doc! { "_id": player_id.as_str() },
                doc! { "$inc": increments.clone(), "$set": { "updatedAt": DateTime::now() } },
            )
            .await
            .map_err(|source| MongoDaoError::IncrementStats {
                player_id: player_id.clone(),
                source,
            })?;

        if delta.sync_leaderboard {
            self.collection::<Document>(LEADERBOARD_COLLECTION_NAME)
                .await
                .update_one(
                    doc! { "_id": player_id.as_str() },
                    doc! { "$inc": increments, "$set": { "updatedAt": DateTime::now() } },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::IncrementStats { player_id, source })?;
        }
        Ok(())
    }

    async fn find_quest_progress(
        &self,
        player_id: String,
    ) -> MongoResult<HashMap<String, QuestProgressEntity>> {
        let document = self
            .collection::<MongoQuestProgressDocument>(QUEST_PROGRESS_COLLECTION_NAME)
            .await
            .find_one(doc! { "_id": player_id.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadQuestProgress { player_id, source })?;

        Ok(document
            .unwrap_or_default()
            .quests
            .into_iter()
            .map(|(quest_id, progress)| (quest_id, progress.into()))
            .collect())
    }

    async fn save_quest_progress(
        &self,
        player_id: String,
        quests: HashMap<String, QuestProgressEntity>,
    ) -> MongoResult<()> {
        if quests.is_empty() {
            return Ok(());
        }

        let mut set = doc! {
            "playerId": player_id.as_str(),
            "updatedAt": DateTime::now(),
        };
        for (quest_id, progress) in &quests {
            set.insert(format!("quests.{quest_id}"), quest_progress_document(progress));
        }

        self.collection::<Document>(QUEST_PROGRESS_COLLECTION_NAME)
            .await
            .update_one(doc! { "_id": player_id.as_str() }, doc! { "$set": set })
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveQuestProgress { player_id, source })?;
        Ok(())
    }

    async fn save_game_session(&self, session: GameSessionEntity) -> MongoResult<()> {
        let id = session.session_id;
        let document: MongoGameSessionDocument = session.into();
        self.collection::<MongoGameSessionDocument>(GAME_SESSION_COLLECTION_NAME)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveGameSession { id, source })?;
        Ok(())
    }
}

impl DocumentStore for MongoDocumentStore {
    fn find_token_rewards(&self) -> BoxFuture<'static, StorageResult<Option<TokenRewardsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_token_rewards().await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>> {
        let store = self.clone();
        let player_id = player_id.to_string();
        Box::pin(async move { store.find_player(player_id).await.map_err(Into::into) })
    }

    fn credit_tokens(
        &self,
        player_id: &str,
        amount: u32,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerProfileEntity>>> {
        let store = self.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            store
                .credit_tokens(player_id, amount)
                .await
                .map_err(Into::into)
        })
    }

    fn record_transaction(
        &self,
        transaction: TransactionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_transaction(transaction)
                .await
                .map_err(Into::into)
        })
    }

    fn sync_leaderboard(
        &self,
        entry: LeaderboardSyncEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.sync_leaderboard(entry).await.map_err(Into::into) })
    }

    fn increment_stats(
        &self,
        player_id: &str,
        delta: StatsDeltaEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            store
                .increment_stats(player_id, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn find_quest_progress(
        &self,
        player_id: &str,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, QuestProgressEntity>>> {
        let store = self.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            store
                .find_quest_progress(player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_quest_progress(
        &self,
        player_id: &str,
        quests: HashMap<String, QuestProgressEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let player_id = player_id.to_string();
        Box::pin(async move {
            store
                .save_quest_progress(player_id, quests)
                .await
                .map_err(Into::into)
        })
    }

    fn save_game_session(
        &self,
        session: GameSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game_session(session).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
