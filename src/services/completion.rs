//! Round-over and abort decisions shared by answers, presence loss and quits.

use crate::dao::models::{RoomEntity, RoomStatus};

/// What the caller should do after a completion check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verdict {
    /// Every active player has used their attempt on the current question.
    pub round_over: bool,
    /// No active player remains in the room.
    pub game_should_abort: bool,
}

/// Decide whether the current round is over or the game should stop.
///
/// Active players are room members flagged present, minus `excluded` (a player whose
/// disconnect may not be reflected in the snapshot yet). Nothing is decided unless the room
/// is playing an unrevealed question.
pub fn evaluate(room: &RoomEntity, excluded: Option<&str>) -> Verdict {
    if room.status != RoomStatus::Playing {
        return Verdict::default();
    }
    let Some(question) = room
        .current_question
        .as_ref()
        .filter(|question| !question.answer_revealed)
    else {
        return Verdict::default();
    };

    let mut active = 0usize;
    let mut exhausted = 0usize;
    for player_id in room.players.keys() {
        if Some(player_id.as_str()) == excluded || !room.is_present(player_id) {
            continue;
        }
        active += 1;
        if question.answered_incorrectly(player_id)
            || question.correctly_answered_by.as_deref() == Some(player_id.as_str())
        {
            exhausted += 1;
        }
    }

    Verdict {
        round_over: active > 0 && exhausted >= active,
        game_should_abort: active == 0,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn room(presence: Value, incorrect: Value, revealed: bool) -> RoomEntity {
        serde_json::from_value(json!({
            "hostId": "a",
            "status": "playing",
            "players": { "a": {}, "b": {}, "c": {} },
            "presence": presence,
            "currentQuestion": {
                "question": "1 + 1 = ?",
                "options": [1, 2, 3, 4],
                "correctIndex": 1,
                "startedAt": 0,
                "answerRevealed": revealed,
                "incorrectAnswers": incorrect,
                "roundSeconds": 10
            }
        }))
        .unwrap()
    }

    #[test]
    fn round_continues_while_an_active_player_can_answer() {
        let room = room(json!({ "a": true, "b": true }), json!({ "a": true }), false);
        assert_eq!(evaluate(&room, None), Verdict::default());
    }

    #[test]
    fn last_incorrect_answer_eliminates_the_round() {
        let room = room(
            json!({ "a": true, "b": true }),
            json!({ "a": true, "b": true }),
            false,
        );
        assert_eq!(
            evaluate(&room, None),
            Verdict {
                round_over: true,
                game_should_abort: false
            }
        );
    }

    #[test]
    fn absent_and_excluded_players_do_not_block_the_round() {
        let room = room(
            json!({ "a": true, "b": true, "c": false }),
            json!({ "a": true }),
            false,
        );
        assert!(evaluate(&room, Some("b")).round_over);
        assert!(!evaluate(&room, None).round_over);
    }

    #[test]
    fn empty_room_aborts_the_game() {
        let room = room(json!({ "a": true }), json!({}), false);
        assert_eq!(
            evaluate(&room, Some("a")),
            Verdict {
                round_over: false,
                game_should_abort: true
            }
        );
    }

    #[test]
    fn revealed_or_missing_question_decides_nothing() {
        let revealed = room(json!({}), json!({ "a": true }), true);
        assert_eq!(evaluate(&revealed, None), Verdict::default());

        let mut between_games = room(json!({}), json!({}), false);
        between_games.current_question = None;
        assert_eq!(evaluate(&between_games, None), Verdict::default());

        let mut ended = room(json!({}), json!({}), false);
        ended.status = RoomStatus::Ended;
        assert_eq!(evaluate(&ended, None), Verdict::default());
    }
}
