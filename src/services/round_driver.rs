//! Question loop of a room: posing questions, round timers, reveals and answers.
//!
//! Every reveal is a compare-and-set on the room node that only commits while the current
//! question is unrevealed, so whichever of the correct answer, the round timer or the last
//! incorrect answer gets there first is authoritative and the others become no-ops.

use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    dao::models::{CurrentQuestionEntity, RoomEntity, RoomStatus},
    error::ServiceError,
    services::{completion, game_service, rewards::TokenRewards},
    state::{
        SharedState,
        registry::RoundTransitionError,
        round::{RoundEvent, RoundOutcome},
    },
};

/// Milliseconds since the Unix epoch, as stored in the live tree.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Result of an answer submission as reported to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// The answer was right.
    pub correct: bool,
    /// Index of the right option, revealed to the player.
    pub correct_index: usize,
    /// Score added for this answer.
    pub token_reward: u32,
}

/// Why an answer was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerRejection {
    /// The player is not in the room.
    #[error("player not found in this room")]
    NotInRoom,
    /// The room is not playing.
    #[error("game not in progress")]
    NotPlaying,
    /// No question is open.
    #[error("no question is being asked")]
    NoQuestion,
    /// Someone already answered correctly.
    #[error("question already answered")]
    AlreadyAnswered,
    /// The player was eliminated from this question.
    #[error("you already answered this question incorrectly")]
    AlreadyFailed,
    /// The index does not name an option.
    #[error("answer index {index} is out of range for {options} options")]
    OutOfRange {
        /// Index submitted.
        index: usize,
        /// Number of options offered.
        options: usize,
    },
}

impl From<AnswerRejection> for ServiceError {
    fn from(rejection: AnswerRejection) -> Self {
        match rejection {
            AnswerRejection::NotInRoom => ServiceError::NotFound(rejection.to_string()),
            AnswerRejection::OutOfRange { .. } => ServiceError::InvalidInput(rejection.to_string()),
            AnswerRejection::NotPlaying
            | AnswerRejection::NoQuestion
            | AnswerRejection::AlreadyAnswered
            | AnswerRejection::AlreadyFailed => ServiceError::InvalidState(rejection.to_string()),
        }
    }
}

#[derive(Debug)]
enum PoseRejection {
    StaleGame,
    NotPlaying,
    QuestionOpen,
    AlreadyAdvanced,
}

#[derive(Debug)]
enum RevealSkipped {
    StaleGame,
    AlreadyResolved,
}

#[derive(Debug)]
enum NoElimination {
    StaleGame,
    RoundOpen,
    NoActivePlayers(Option<String>),
}

/// State written by an accepted answer, used once the transaction committed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Judgement {
    outcome: AnswerOutcome,
    fast: bool,
    multiplayer: bool,
    revealed: Option<RoundOutcome>,
    abort: bool,
    generation: Option<String>,
    delay_seconds: Option<u64>,
}

/// Feed `event` to the room's round machine. `false` when the machine refused it, in which
/// case the caller must not act on the event.
fn step(state: &SharedState, room_id: &str, event: RoundEvent) -> bool {
    match state.registry().transition(room_id, event) {
        Ok(phase) => {
            debug!(room_id, ?phase, "round state advanced");
            true
        }
        Err(RoundTransitionError::Untracked) => {
            debug!(room_id, ?event, "room not tracked by this process");
            false
        }
        Err(RoundTransitionError::Invalid(err)) => {
            debug!(room_id, error = %err, "round event refused");
            false
        }
    }
}

fn delay_of(state: &SharedState, delay_seconds: Option<u64>) -> Duration {
    Duration::from_secs(delay_seconds.unwrap_or(state.config().game_defaults.delay_seconds))
}

/// Pose the next question, or settle the game once the question budget is spent.
///
/// Does nothing when `generation` no longer owns the room, the current question is still
/// open or the room's round machine is not idle.
pub async fn start_round(
    state: &SharedState,
    room_id: &str,
    generation: &str,
) -> Result<(), ServiceError> {
    let Some(room) = state.rooms().find(room_id).await? else {
        debug!(room_id, "room disappeared; round not started");
        return Ok(());
    };
    if !room.is_generation(generation) || room.status != RoomStatus::Playing {
        debug!(room_id, status = ?room.status, "game no longer running; round not started");
        return Ok(());
    }
    if room
        .current_question
        .as_ref()
        .is_some_and(|question| !question.answer_revealed)
    {
        debug!(
            room_id,
            question = room.question_number,
            "current question still open; round not started"
        );
        return Ok(());
    }

    let defaults = state.config().game_defaults;
    let total = room
        .settings
        .questions_count
        .unwrap_or(defaults.questions_count);
    let number = room.question_number + 1;
    if number > total {
        return game_service::end_game(state, room_id, Some(generation), false).await;
    }

    let game_type = room.settings.game_type.unwrap_or(defaults.game_type);
    let difficulty = room
        .settings
        .question_difficulty
        .unwrap_or(defaults.difficulty);
    let round_seconds = room.settings.round_seconds.unwrap_or(defaults.round_seconds);

    let generated = match state
        .questions()
        .for_game_type(game_type)
        .generate_question(difficulty)
        .await
    {
        Ok(generated) => generated,
        Err(err) => {
            error!(room_id, error = %err, "question provider failed; aborting game");
            return game_service::end_game(state, room_id, Some(generation), true).await;
        }
    };
    if !step(state, room_id, RoundEvent::Ask { question: number }) {
        return Ok(());
    }

    let question = CurrentQuestionEntity {
        question: generated.question,
        options: generated.options,
        correct_index: generated.correct_index,
        started_at: now_ms(),
        answered_by: None,
        answered_by_username: None,
        correctly_answered_by: None,
        answered_correctly: None,
        answer_revealed: false,
        incorrect_answers: HashMap::new(),
        time_up: false,
        eliminated: false,
        round_seconds,
    };

    let expected = room.question_number;
    let marker = generation.to_string();
    let posed = state
        .rooms()
        .mutate(room_id, move |room| {
            if !room.is_generation(&marker) {
                return Err(PoseRejection::StaleGame);
            }
            if room.status != RoomStatus::Playing {
                return Err(PoseRejection::NotPlaying);
            }
            if room
                .current_question
                .as_ref()
                .is_some_and(|question| !question.answer_revealed)
            {
                return Err(PoseRejection::QuestionOpen);
            }
            if room.question_number != expected {
                return Err(PoseRejection::AlreadyAdvanced);
            }
            room.question_number = number;
            room.current_question = Some(question.clone());
            Ok(())
        })
        .await?;

    match posed {
        None => debug!(room_id, "room disappeared before the question was posed"),
        Some(Err(rejection)) => debug!(room_id, ?rejection, "question not posed"),
        Some(Ok(())) => {
            info!(room_id, question = number, total, "question posed");
            arm_round_timer(
                state,
                room_id,
                generation,
                number,
                Duration::from_secs(round_seconds),
            );
        }
    }
    Ok(())
}

fn arm_round_timer(
    state: &SharedState,
    room_id: &str,
    generation: &str,
    question: u32,
    round: Duration,
) {
    let task_state = state.clone();
    let room = room_id.to_string();
    let marker = generation.to_string();
    let armed = state.registry().arm(room_id, round, move || async move {
        if let Err(err) = expire_round(&task_state, &room, &marker, question).await {
            error!(room_id = %room, error = %err, "round timeout handling failed");
        }
    });
    if !armed {
        warn!(room_id, "room not tracked by this process; round timer not armed");
    }
}

/// Arm the inter-round delay, after which the next question is posed.
fn schedule_advance(state: &SharedState, room_id: &str, generation: &str, delay: Duration) {
    let task_state = state.clone();
    let room = room_id.to_string();
    let marker = generation.to_string();
    let armed = state.registry().arm(room_id, delay, move || async move {
        if let Err(err) = advance(&task_state, &room, &marker).await {
            error!(room_id = %room, error = %err, "failed to advance to the next round");
        }
    });
    if !armed {
        warn!(room_id, "room not tracked by this process; game will not advance");
    }
}

/// Leave the revealed question behind and pose the next one.
pub async fn advance(
    state: &SharedState,
    room_id: &str,
    generation: &str,
) -> Result<(), ServiceError> {
    if state.registry().generation(room_id).as_deref() != Some(generation) {
        debug!(room_id, "advance fired for a released game");
        return Ok(());
    }
    if !step(state, room_id, RoundEvent::Advance) {
        return Ok(());
    }
    start_round(state, room_id, generation).await
}

/// Round timer body: reveal the question as timed out unless something resolved it first.
pub async fn expire_round(
    state: &SharedState,
    room_id: &str,
    generation: &str,
    question: u32,
) -> Result<(), ServiceError> {
    let marker = generation.to_string();
    let revealed = state
        .rooms()
        .mutate(room_id, move |room| {
            if !room.is_generation(&marker)
                || room.status != RoomStatus::Playing
                || room.question_number != question
            {
                return Err(RevealSkipped::StaleGame);
            }
            let Some(current) = room.current_question.as_mut() else {
                return Err(RevealSkipped::StaleGame);
            };
            if current.answer_revealed || current.correctly_answered_by.is_some() {
                return Err(RevealSkipped::AlreadyResolved);
            }
            current.answer_revealed = true;
            current.time_up = true;
            Ok(room.settings.delay_seconds)
        })
        .await?;

    match revealed {
        Some(Ok(delay_seconds)) => {
            info!(room_id, question, "time is up");
            after_reveal(
                state,
                room_id,
                Some(generation),
                RoundOutcome::TimedOut,
                delay_seconds,
            );
        }
        Some(Err(skipped)) => debug!(room_id, question, ?skipped, "round timer is a no-op"),
        None => debug!(room_id, "room disappeared before the round timer fired"),
    }
    Ok(())
}

fn after_reveal(
    state: &SharedState,
    room_id: &str,
    generation: Option<&str>,
    outcome: RoundOutcome,
    delay_seconds: Option<u64>,
) {
    if !step(state, room_id, RoundEvent::Resolve(outcome)) {
        warn!(room_id, ?outcome, "round machine refused the reveal; game will not advance");
        return;
    }
    state.registry().cancel(room_id);
    match generation {
        Some(generation) => {
            schedule_advance(state, room_id, generation, delay_of(state, delay_seconds))
        }
        None => warn!(room_id, "room has no game marker; game will not advance"),
    }
}

/// Validate and apply one answer to the room. Pure over the room snapshot.
fn judge_answer(
    room: &mut RoomEntity,
    player_id: &str,
    index: usize,
    now: u64,
    fast_threshold_ms: u64,
) -> Result<Judgement, AnswerRejection> {
    if !room.players.contains_key(player_id) {
        return Err(AnswerRejection::NotInRoom);
    }
    if room.status != RoomStatus::Playing {
        return Err(AnswerRejection::NotPlaying);
    }
    let rewards = TokenRewards::from_settings(&room.settings, room.is_solo);
    let label = room.players[player_id].label().map(str::to_string);

    let question = room
        .current_question
        .as_mut()
        .ok_or(AnswerRejection::NoQuestion)?;
    if question.answer_revealed || question.correctly_answered_by.is_some() {
        return Err(AnswerRejection::AlreadyAnswered);
    }
    if question.answered_incorrectly(player_id) {
        return Err(AnswerRejection::AlreadyFailed);
    }
    if index >= question.options.len() {
        return Err(AnswerRejection::OutOfRange {
            index,
            options: question.options.len(),
        });
    }

    let correct_index = question.correct_index;
    let mut judgement = Judgement {
        outcome: AnswerOutcome {
            correct: index == correct_index,
            correct_index,
            token_reward: 0,
        },
        fast: false,
        multiplayer: !room.is_solo,
        revealed: None,
        abort: false,
        generation: room.current_game_id.clone(),
        delay_seconds: room.settings.delay_seconds,
    };

    if judgement.outcome.correct {
        question.correctly_answered_by = Some(player_id.to_string());
        question.answered_by = Some(player_id.to_string());
        question.answered_by_username = label;
        question.answered_correctly = Some(true);
        question.answer_revealed = true;
        judgement.fast = now.saturating_sub(question.started_at) < fast_threshold_ms;
        judgement.revealed = Some(RoundOutcome::Answered);

        if let Some(player) = room.players.get_mut(player_id) {
            player.score += 1;
            player.tokens_earned = player.tokens_earned.saturating_add(rewards.per_correct);
        }
        judgement.outcome.token_reward = rewards.per_correct;
        return Ok(judgement);
    }

    question.incorrect_answers.insert(player_id.to_string(), true);
    let verdict = completion::evaluate(room, None);
    if verdict.round_over {
        if let Some(question) = room.current_question.as_mut() {
            question.answer_revealed = true;
            question.eliminated = true;
        }
        judgement.revealed = Some(RoundOutcome::Eliminated);
    }
    judgement.abort = verdict.game_should_abort;
    Ok(judgement)
}

/// Judge an answer of `player_id`, then reveal and advance when it resolved the question.
pub async fn submit_answer(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    answer_index: usize,
) -> Result<AnswerOutcome, ServiceError> {
    let now = now_ms();
    let threshold = state.config().speed_answer_threshold.as_millis() as u64;
    let player = player_id.to_string();

    let judgement = state
        .rooms()
        .mutate(room_id, move |room| {
            judge_answer(room, &player, answer_index, now, threshold)
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))??;

    state.registry().record_answer(
        room_id,
        player_id,
        judgement.outcome.correct,
        judgement.fast,
        judgement.multiplayer,
    );
    debug!(room_id, player_id, correct = judgement.outcome.correct, "answer recorded");

    if let Some(outcome) = judgement.revealed {
        info!(room_id, player_id, ?outcome, "question resolved");
        after_reveal(
            state,
            room_id,
            judgement.generation.as_deref(),
            outcome,
            judgement.delay_seconds,
        );
    }
    if judgement.abort {
        info!(room_id, "no active players remaining; aborting game");
        if let Err(err) =
            game_service::end_game(state, room_id, judgement.generation.as_deref(), true).await
        {
            error!(room_id, error = %err, "failed to abort game");
        }
    }

    Ok(judgement.outcome)
}

/// Re-evaluate the round after a player left or disconnected.
///
/// Reveals the question as eliminated when every remaining active player already failed it
/// and aborts the game when nobody is left. `generation`, when given, must still own the room.
pub async fn check_completion(
    state: &SharedState,
    room_id: &str,
    generation: Option<&str>,
    excluded: Option<&str>,
) -> Result<(), ServiceError> {
    let marker = generation.map(str::to_string);
    let excluded = excluded.map(str::to_string);
    let checked = state
        .rooms()
        .mutate(room_id, move |room| {
            if marker
                .as_deref()
                .is_some_and(|marker| !room.is_generation(marker))
            {
                return Err(NoElimination::StaleGame);
            }
            let verdict = completion::evaluate(room, excluded.as_deref());
            if verdict.game_should_abort {
                return Err(NoElimination::NoActivePlayers(room.current_game_id.clone()));
            }
            if !verdict.round_over {
                return Err(NoElimination::RoundOpen);
            }
            if let Some(question) = room.current_question.as_mut() {
                question.answer_revealed = true;
                question.eliminated = true;
            }
            Ok((room.current_game_id.clone(), room.settings.delay_seconds))
        })
        .await?;

    match checked {
        Some(Ok((generation, delay_seconds))) => {
            info!(room_id, "every active player answered incorrectly");
            after_reveal(
                state,
                room_id,
                generation.as_deref(),
                RoundOutcome::Eliminated,
                delay_seconds,
            );
        }
        Some(Err(NoElimination::NoActivePlayers(generation))) => {
            info!(room_id, "no active players remaining; aborting game");
            game_service::end_game(state, room_id, generation.as_deref(), true).await?;
        }
        Some(Err(other)) => debug!(room_id, reason = ?other, "completion check changed nothing"),
        None => debug!(room_id, "room disappeared before the completion check"),
    }
    Ok(())
}
