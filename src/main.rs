//! Quiz Arena Back binary entrypoint wiring REST routes, the live-state store and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_arena_back::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        live_store::{LiveStore, memory::MemoryLiveStore},
    },
    routes,
    services::questions::QuestionProviders,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let questions = QuestionProviders::new(&config);
    let live_store = connect_live_store().await?;
    let app_state = AppState::new(config, live_store, questions);

    start_document_store(app_state.clone()).await?;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Select the live-state backend from `LIVE_STORE` (`memory` by default).
async fn connect_live_store() -> anyhow::Result<Arc<dyn LiveStore>> {
    let backend = env::var("LIVE_STORE").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        "memory" => {
            warn!("using the in-memory live store; rooms are not shared with clients");
            Ok(Arc::new(MemoryLiveStore::new()))
        }
        #[cfg(feature = "rtdb-store")]
        "rtdb" => {
            use quiz_arena_back::dao::live_store::rtdb::{RtdbConfig, RtdbLiveStore};

            let config = RtdbConfig::from_env().context("reading RTDB configuration")?;
            let store = RtdbLiveStore::connect(config)
                .await
                .context("connecting to the realtime database")?;
            info!("connected to the realtime database");
            Ok(Arc::new(store))
        }
        other => bail!("unsupported LIVE_STORE backend `{other}`"),
    }
}

/// Install the document backend selected by `DOCUMENT_STORE` (`memory` by default).
///
/// The MongoDB backend is connected by the storage supervisor in the background; the server
/// runs in degraded mode until it succeeds.
async fn start_document_store(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("DOCUMENT_STORE").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        "memory" => {
            warn!("using the in-memory document store; balances are lost on restart");
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
            state.set_document_store(store).await;
            Ok(())
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use quiz_arena_back::{
                dao::{
                    document_store::mongodb::{MongoConfig, MongoDocumentStore},
                    storage::StorageError,
                },
                services::storage_supervisor,
            };

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = MongoDocumentStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok::<Arc<dyn DocumentStore>, StorageError>(Arc::new(store))
                }
            }));
            Ok(())
        }
        other => bail!("unsupported DOCUMENT_STORE backend `{other}`"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
