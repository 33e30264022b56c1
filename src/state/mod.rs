/// Per-room timers and presence listeners.
pub mod registry;
/// Phase machine of one round.
pub mod round;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{document_store::DocumentStore, live_store::LiveStore, room::RoomRepository},
    error::ServiceError,
    services::{questions::QuestionProviders, rewards::RewardResolver},
};

pub use self::registry::RoomRegistry;

/// Handle shared by every request handler and background task.
pub type SharedState = Arc<AppState>;

/// Central application state: store handles, the room registry and shared configuration.
pub struct AppState {
    config: Arc<AppConfig>,
    rooms: RoomRepository,
    document_store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    registry: Arc<RoomRegistry>,
    rewards: RewardResolver,
    questions: QuestionProviders,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a document store is installed.
    pub fn new(
        config: AppConfig,
        live_store: Arc<dyn LiveStore>,
        questions: QuestionProviders,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            rewards: RewardResolver::new(config.reward_cache_ttl),
            config: Arc::new(config),
            rooms: RoomRepository::new(live_store),
            document_store: RwLock::new(None),
            degraded: degraded_tx,
            registry: Arc::new(RoomRegistry::new()),
            questions,
        })
    }

    /// Application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Typed access to rooms in the live-state store.
    pub fn rooms(&self) -> &RoomRepository {
        &self.rooms
    }

    /// Timers, presence listeners and round state of the rooms owned by this process.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Cached reward configuration lookups.
    pub fn rewards(&self) -> &RewardResolver {
        &self.rewards
    }

    /// Question providers by game type.
    pub fn questions(&self) -> &QuestionProviders {
        &self.questions
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn document_store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.document_store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`AppState::document_store`], failing in degraded mode.
    pub async fn require_document_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.document_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new document store implementation and leave degraded mode.
    pub async fn set_document_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.document_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current document store and enter degraded mode.
    pub async fn clear_document_store(&self) {
        {
            let mut guard = self.document_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        document_store::memory::MemoryDocumentStore, live_store::memory::MemoryLiveStore,
    };

    fn state() -> SharedState {
        let config = AppConfig::default();
        let questions = QuestionProviders::new(&config);
        AppState::new(config, Arc::new(MemoryLiveStore::new()), questions)
    }

    #[tokio::test]
    async fn starts_degraded_until_a_document_store_is_installed() {
        let state = state();
        let mut watcher = state.degraded.subscribe();
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_document_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_document_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_document_store().await.is_ok());

        state.clear_document_store().await;
        assert!(state.is_degraded().await);
        assert!(state.document_store().await.is_none());
    }

    #[tokio::test]
    async fn degraded_flag_is_only_broadcast_on_change() {
        let state = state();
        let mut watcher = state.degraded.subscribe();
        state.update_degraded(true).await;
        assert!(!watcher.has_changed().unwrap());
        state.update_degraded(false).await;
        assert!(watcher.has_changed().unwrap());
        watcher.borrow_and_update();
        state.update_degraded(false).await;
        assert!(!watcher.has_changed().unwrap());
    }
}
