use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe both stores and report degraded mode while logging connectivity issues.
///
/// Gameplay only needs the live store; a missing document store degrades settlement, not play.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live_ok = match state.rooms().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "live store health check failed");
            false
        }
    };

    match state.require_document_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "document store health check failed");
            }
        }
        Err(_) => warn!("document store unavailable (degraded mode)"),
    }

    if live_ok && !state.is_degraded().await {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{document_store::memory::MemoryDocumentStore, live_store::memory::MemoryLiveStore},
        services::questions::QuestionProviders,
        state::AppState,
    };

    #[tokio::test]
    async fn degraded_until_the_document_store_is_installed() {
        let config = AppConfig::default();
        let questions = QuestionProviders::new(&config);
        let state = AppState::new(config, Arc::new(MemoryLiveStore::new()), questions);
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .set_document_store(Arc::new(MemoryDocumentStore::new()))
            .await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
