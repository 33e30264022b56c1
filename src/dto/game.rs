use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_player_id,
    services::{game_service::QuitOutcome, round_driver::AnswerOutcome},
};

/// Request naming the player performing a room action (start, quit, reset).
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRequest {
    /// Live-store key of the acting player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Answer to the question currently on screen.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// Live-store key of the answering player.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// Zero-based index into the question's options.
    pub answer_index: usize,
}

/// Acknowledgement returned by start and reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
}

impl SuccessResponse {
    /// Successful acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Result of an answer submission.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// The answer was right.
    pub correct: bool,
    /// Index of the right option.
    pub correct_index: usize,
    /// Tokens credited to the room score for this answer (0 when incorrect).
    pub token_reward: u32,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        Self {
            correct: outcome.correct,
            correct_index: outcome.correct_index,
            token_reward: outcome.token_reward,
        }
    }
}

/// Result of a player leaving the room.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuitResponse {
    /// Always `true`.
    pub success: bool,
    /// The player was in the room and has been removed.
    pub player_removed: bool,
    /// The room was deleted because its last player left.
    pub room_closed: bool,
}

impl From<QuitOutcome> for QuitResponse {
    fn from(outcome: QuitOutcome) -> Self {
        Self {
            success: true,
            player_removed: outcome.player_removed,
            room_closed: outcome.room_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn answer_request_reads_camel_case_and_validates() {
        let request: AnswerRequest =
            serde_json::from_value(json!({ "playerId": "p1", "answerIndex": 2 })).unwrap();
        assert_eq!(request.answer_index, 2);
        assert!(request.validate().is_ok());

        let blank: AnswerRequest =
            serde_json::from_value(json!({ "playerId": " ", "answerIndex": 0 })).unwrap();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn negative_answer_index_is_rejected_at_decoding() {
        let decoded =
            serde_json::from_value::<AnswerRequest>(json!({ "playerId": "p1", "answerIndex": -1 }));
        assert!(decoded.is_err());
    }

    #[test]
    fn quit_response_is_camel_case() {
        let response = QuitResponse::from(QuitOutcome {
            player_removed: true,
            room_closed: false,
        });
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({ "success": true, "playerRemoved": true, "roomClosed": false })
        );
    }
}
