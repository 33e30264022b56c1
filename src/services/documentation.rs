use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::start_game,
        crate::routes::game::submit_answer,
        crate::routes::game::quit_game,
        crate::routes::game::reset_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::PlayerRequest,
            crate::dto::game::AnswerRequest,
            crate::dto::game::SuccessResponse,
            crate::dto::game::AnswerResponse,
            crate::dto::game::QuitResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle of a room"),
    )
)]
/// OpenAPI description of the service.
pub struct ApiDoc;
