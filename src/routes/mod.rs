use axum::Router;

use crate::state::SharedState;

/// OpenAPI and Swagger UI.
pub mod docs;
/// Game lifecycle endpoints.
pub mod game;
/// Liveness endpoint.
pub mod health;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router().merge(game::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
