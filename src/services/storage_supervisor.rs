use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{document_store::DocumentStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a document store installed in the shared state, toggling degraded mode while it is
/// unreachable. Runs forever.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_document_store(store.clone()).await;
                info!("document store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;

                state.clear_document_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "document store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until it fails and cannot be reconnected in place.
async fn supervise(state: &SharedState, store: &dyn DocumentStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("document store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "document store health check failed");
                if reconnect(state, store).await {
                    state.update_degraded(false).await;
                    sleep(HEALTH_POLL_INTERVAL).await;
                } else {
                    warn!("exhausted document store reconnect attempts; staying in degraded mode");
                    return;
                }
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn DocumentStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "document store reconnected after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "first reconnect attempt failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{document_store::memory::MemoryDocumentStore, live_store::memory::MemoryLiveStore},
        services::questions::QuestionProviders,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn leaves_degraded_mode_once_connected_and_retries_failures() {
        let config = AppConfig::default();
        let questions = QuestionProviders::new(&config);
        let state = AppState::new(config, Arc::new(MemoryLiveStore::new()), questions);

        let mut attempts = 0u32;
        let supervisor = tokio::spawn(run(state.clone(), move || {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt == 1 {
                    Err(StorageError::unavailable(
                        "refused".into(),
                        std::io::Error::other("refused"),
                    ))
                } else {
                    Ok(Arc::new(MemoryDocumentStore::new()) as Arc<dyn DocumentStore>)
                }
            }
        }));

        assert!(state.is_degraded().await);
        sleep(INITIAL_DELAY * 2).await;
        assert!(!state.is_degraded().await);
        assert!(state.document_store().await.is_some());
        supervisor.abort();
    }
}
