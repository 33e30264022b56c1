use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::game::{AnswerRequest, AnswerResponse, PlayerRequest, QuitResponse, SuccessResponse},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes driving the game of a room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/{room_id}/start", post(start_game))
        .route("/game/{room_id}/answer", post(submit_answer))
        .route("/game/{room_id}/quit", post(quit_game))
        .route("/game/{room_id}/reset", post(reset_game))
}

/// Start the game; only the host may call this.
#[utoipa::path(
    post,
    path = "/game/{room_id}/start",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Game starting", body = SuccessResponse),
        (status = 403, description = "Requester is not the host"),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room cannot start in its current state")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerRequest>>,
) -> Result<Json<SuccessResponse>, AppError> {
    game_service::start_game(&state, &room_id, &payload.player_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Answer the question currently on screen.
#[utoipa::path(
    post,
    path = "/game/{room_id}/answer",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer judged", body = AnswerResponse),
        (status = 400, description = "Answer index out of range"),
        (status = 404, description = "Room or player not found"),
        (status = 409, description = "Question not accepting this answer")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<AnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    let outcome =
        game_service::submit_answer(&state, &room_id, &payload.player_id, payload.answer_index)
            .await?;
    Ok(Json(outcome.into()))
}

/// Leave the room. The last player leaving closes it.
#[utoipa::path(
    post,
    path = "/game/{room_id}/quit",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Player removed", body = QuitResponse),
        (status = 404, description = "Room or player not found")
    )
)]
pub async fn quit_game(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerRequest>>,
) -> Result<Json<QuitResponse>, AppError> {
    let outcome = game_service::quit_game(&state, &room_id, &payload.player_id).await?;
    Ok(Json(outcome.into()))
}

/// Bring a finished room back to the lobby; only the host may call this.
#[utoipa::path(
    post,
    path = "/game/{room_id}/reset",
    tag = "game",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = PlayerRequest,
    responses(
        (status = 200, description = "Room back in the lobby", body = SuccessResponse),
        (status = 403, description = "Requester is not the host"),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Game is still running")
    )
)]
pub async fn reset_game(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerRequest>>,
) -> Result<Json<SuccessResponse>, AppError> {
    game_service::reset_game(&state, &room_id, &payload.player_id).await?;
    Ok(Json(SuccessResponse::ok()))
}
