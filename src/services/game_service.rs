//! Game lifecycle of a room: start, quit, settlement and reset.

use std::time::SystemTime;

use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::GameDefaults,
    dao::{
        document_store::DocumentStore,
        models::{RoomEntity, RoomSettingsEntity, RoomStatus},
    },
    error::ServiceError,
    services::{
        ledger::{self, TokenAward},
        quests::{self, GameContext},
        rewards::TokenRewards,
        round_driver::{self, AnswerOutcome, now_ms},
        sessions, stats,
    },
    state::{SharedState, round::RoundEvent},
};

/// Sole winner of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    /// Live-store key of the winner.
    pub player_id: String,
    /// Name shown in the room.
    pub label: Option<String>,
}

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    /// The game stopped before its last question.
    pub aborted: bool,
    /// Set when exactly one player holds the top positive score.
    pub winner: Option<Winner>,
    /// Several players share the top positive score.
    pub is_draw: bool,
    /// Tokens added to the winner's payout.
    pub winner_bonus: u32,
}

impl GameOutcome {
    /// Decide the winner from the final scores.
    ///
    /// The highest strictly positive score wins when held by exactly one player; a shared top
    /// score is a draw. Aborted games have neither.
    pub fn decide(room: &RoomEntity, aborted: bool) -> Self {
        let mut best = 0u32;
        let mut leaders = Vec::new();
        for (player_id, player) in &room.players {
            if player.score > best {
                best = player.score;
                leaders.clear();
                leaders.push((player_id, player));
            } else if player.score == best && best > 0 {
                leaders.push((player_id, player));
            }
        }

        let decided = !aborted && best > 0;
        let winner = match leaders.as_slice() {
            [(player_id, player)] if decided => Some(Winner {
                player_id: (*player_id).clone(),
                label: player.label().map(str::to_string),
            }),
            _ => None,
        };

        Self {
            aborted,
            winner,
            is_draw: decided && leaders.len() > 1,
            winner_bonus: TokenRewards::from_settings(&room.settings, room.is_solo).per_win,
        }
    }

    /// Whether `player_id` won.
    pub fn is_winner(&self, player_id: &str) -> bool {
        self.winner
            .as_ref()
            .is_some_and(|winner| winner.player_id == player_id)
    }
}

/// Result of a player leaving a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuitOutcome {
    /// The player was found and removed.
    pub player_removed: bool,
    /// The last player left and the room was deleted.
    pub room_closed: bool,
}

#[derive(Debug)]
enum EndSkipped {
    StaleGame,
    AlreadyOver(RoomStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Left,
    LeftMidRound,
    Closed,
}

fn room_not_found(room_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("room `{room_id}` not found"))
}

fn check_can_start(room: &RoomEntity, requester: &str) -> Result<(), ServiceError> {
    if room.host_id != requester {
        return Err(ServiceError::Forbidden(
            "only the host can start the game".into(),
        ));
    }
    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "game cannot start while the room is {}",
            room.status.as_str()
        )));
    }
    let players = room.players.len();
    if room.is_solo && players != 1 {
        return Err(ServiceError::InvalidState(
            "solo games need exactly one player".into(),
        ));
    }
    if !room.is_solo && players < 2 {
        return Err(ServiceError::InvalidState(
            "need at least 2 players to start".into(),
        ));
    }
    if !room.is_solo && !room.players.values().all(|player| player.ready) {
        return Err(ServiceError::InvalidState(
            "all players must be ready".into(),
        ));
    }
    Ok(())
}

/// Settings snapshot written when the game goes live: every field populated, unset or zero
/// values replaced by defaults and rewards taken from `rewards`.
fn resolve_settings(
    settings: &RoomSettingsEntity,
    defaults: &GameDefaults,
    rewards: TokenRewards,
) -> RoomSettingsEntity {
    let positive_u64 = |value: Option<u64>, fallback: u64| value.filter(|v| *v > 0).unwrap_or(fallback);
    RoomSettingsEntity {
        delay_seconds: Some(positive_u64(settings.delay_seconds, defaults.delay_seconds)),
        round_seconds: Some(positive_u64(settings.round_seconds, defaults.round_seconds)),
        questions_count: Some(
            settings
                .questions_count
                .filter(|count| *count > 0)
                .unwrap_or(defaults.questions_count),
        ),
        question_difficulty: Some(settings.question_difficulty.unwrap_or(defaults.difficulty)),
        game_type: Some(settings.game_type.unwrap_or(defaults.game_type)),
        token_per_correct_answer: Some(rewards.per_correct),
        token_per_win: Some(rewards.per_win),
        extra: settings.extra.clone(),
    }
}

/// Start the game of `room_id` on behalf of its host.
///
/// The room goes to `starting` under a fresh game marker; the first question follows after the
/// configured start delay.
pub async fn start_game(
    state: &SharedState,
    room_id: &str,
    requester: &str,
) -> Result<(), ServiceError> {
    let defaults = state.config().game_defaults;
    let generation = Uuid::new_v4().to_string();
    let marker = generation.clone();
    let host = requester.to_string();

    state
        .rooms()
        .mutate(room_id, move |room| {
            check_can_start(room, &host)?;
            room.status = RoomStatus::Starting;
            room.question_number = 0;
            room.total_questions = Some(
                room.settings
                    .questions_count
                    .filter(|count| *count > 0)
                    .unwrap_or(defaults.questions_count),
            );
            room.current_game_id = Some(marker.clone());
            Ok::<_, ServiceError>(())
        })
        .await?
        .ok_or_else(|| room_not_found(room_id))??;

    let registry = state.registry();
    registry.begin(room_id, &generation);
    info!(room_id, requester, "game starting");

    let task_state = state.clone();
    let room = room_id.to_string();
    registry.arm(room_id, state.config().start_delay, move || async move {
        setup_game(&task_state, &room, &generation).await;
    });
    Ok(())
}

async fn setup_game(state: &SharedState, room_id: &str, generation: &str) {
    if let Err(err) = try_setup_game(state, room_id, generation).await {
        error!(room_id, error = %err, "game setup failed; aborting");
        if let Err(err) = end_game(state, room_id, Some(generation), true).await {
            error!(room_id, error = %err, "failed to abort game after setup failure");
        }
    }
}

async fn try_setup_game(
    state: &SharedState,
    room_id: &str,
    generation: &str,
) -> Result<(), ServiceError> {
    let Some(room) = state.rooms().find(room_id).await? else {
        debug!(room_id, "room disappeared before setup");
        state.registry().release_all(room_id);
        return Ok(());
    };
    if !room.is_generation(generation) || room.status != RoomStatus::Starting {
        debug!(room_id, status = ?room.status, "game changed before setup");
        return Ok(());
    }

    let defaults = state.config().game_defaults;
    let difficulty = room
        .settings
        .question_difficulty
        .unwrap_or(defaults.difficulty);
    let rewards = state
        .rewards()
        .resolve(state.document_store().await, difficulty, room.is_solo)
        .await;
    let settings = resolve_settings(&room.settings, &defaults, rewards);

    let marker = generation.to_string();
    let committed = state
        .rooms()
        .mutate(room_id, move |room| {
            if !room.is_generation(&marker) || room.status != RoomStatus::Starting {
                return Err(room.status);
            }
            room.status = RoomStatus::Playing;
            room.settings = settings.clone();
            room.current_question = None;
            room.winner = None;
            room.winner_username = None;
            room.is_draw = false;
            for player in room.players.values_mut() {
                player.score = 0;
                player.tokens_earned = 0;
            }
            Ok(())
        })
        .await?;
    if !matches!(committed, Some(Ok(()))) {
        debug!(room_id, "game changed during setup");
        return Ok(());
    }

    watch_presence(state, room_id, generation).await?;
    info!(room_id, ?difficulty, per_correct = rewards.per_correct, per_win = rewards.per_win, "game live");
    round_driver::start_round(state, room_id, generation).await
}

/// Re-check the round each time a player's presence flag disappears.
async fn watch_presence(
    state: &SharedState,
    room_id: &str,
    generation: &str,
) -> Result<(), ServiceError> {
    let mut removals = state.rooms().presence_removals(room_id).await?;
    let task_state = state.clone();
    let room = room_id.to_string();
    let marker = generation.to_string();

    let handle = tokio::spawn(async move {
        while let Some(player_id) = removals.next().await {
            info!(room_id = %room, %player_id, "player disconnected");
            let state = task_state.clone();
            let room = room.clone();
            let marker = marker.clone();
            tokio::spawn(async move {
                if let Err(err) =
                    round_driver::check_completion(&state, &room, Some(&marker), Some(&player_id))
                        .await
                {
                    warn!(room_id = %room, %player_id, error = %err, "completion check after disconnect failed");
                }
            });
        }
    });
    state.registry().attach_presence(room_id, handle);
    Ok(())
}

/// Submit an answer for the current question.
pub async fn submit_answer(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
    answer_index: usize,
) -> Result<AnswerOutcome, ServiceError> {
    round_driver::submit_answer(state, room_id, player_id, answer_index).await
}

/// Finish the game of `room_id`, settle tokens and record the session.
///
/// Idempotent: a room already `ended` or `aborted` is left untouched, and so is a room whose
/// game marker no longer matches `generation` when one is given. Settlement failures of one
/// player are logged and do not prevent the others from being paid.
pub async fn end_game(
    state: &SharedState,
    room_id: &str,
    generation: Option<&str>,
    aborted: bool,
) -> Result<(), ServiceError> {
    let marker = generation.map(str::to_string);
    let finished = state
        .rooms()
        .mutate(room_id, move |room| {
            if marker
                .as_deref()
                .is_some_and(|marker| !room.is_generation(marker))
            {
                return Err(EndSkipped::StaleGame);
            }
            if room.status.is_finished() {
                return Err(EndSkipped::AlreadyOver(room.status));
            }
            let snapshot = room.clone();
            let outcome = GameOutcome::decide(&snapshot, aborted);
            room.status = if aborted {
                RoomStatus::Aborted
            } else {
                RoomStatus::Ended
            };
            room.winner = outcome.winner.as_ref().map(|winner| winner.player_id.clone());
            room.winner_username = outcome.winner.as_ref().and_then(|winner| winner.label.clone());
            room.is_draw = outcome.is_draw;
            room.current_question = None;
            Ok((snapshot, outcome))
        })
        .await?;

    let (room, outcome) = match finished {
        None => {
            debug!(room_id, "room no longer exists; nothing to end");
            state.registry().release_all(room_id);
            return Ok(());
        }
        Some(Err(EndSkipped::AlreadyOver(status))) => {
            debug!(room_id, status = status.as_str(), "game already over; end ignored");
            return Ok(());
        }
        Some(Err(EndSkipped::StaleGame)) => {
            debug!(room_id, "end requested for a previous game; ignored");
            return Ok(());
        }
        Some(Ok(finished)) => finished,
    };

    let event = if aborted {
        RoundEvent::Abort
    } else {
        RoundEvent::Finish
    };
    if let Err(err) = state.registry().transition(room_id, event) {
        debug!(room_id, ?err, "round state not updated at game end");
    }
    state.registry().cancel(room_id);
    info!(
        room_id,
        aborted,
        winner = outcome.winner.as_ref().map(|winner| winner.player_id.as_str()),
        is_draw = outcome.is_draw,
        "game over"
    );

    match state.document_store().await {
        Some(store) => {
            if !aborted {
                settle_players(state, &*store, room_id, &room, &outcome).await;
            }
            let summary = sessions::build_summary(room_id, &room, &outcome, SystemTime::now());
            if let Err(err) = sessions::persist(&*store, summary).await {
                warn!(room_id, error = %err, "failed to save game session");
            }
        }
        None => warn!(room_id, "document store unavailable; settlement skipped"),
    }

    state.registry().release_all(room_id);
    Ok(())
}

async fn settle_players(
    state: &SharedState,
    store: &dyn DocumentStore,
    room_id: &str,
    room: &RoomEntity,
    outcome: &GameOutcome,
) {
    let defaults = state.config().game_defaults;
    let game_type = room.settings.game_type.unwrap_or(defaults.game_type);
    let difficulty = room
        .settings
        .question_difficulty
        .unwrap_or(defaults.difficulty);
    let questions_count = room
        .settings
        .questions_count
        .unwrap_or(defaults.questions_count);
    let multiplayer = !room.is_solo;
    let counters = state.registry().counters(room_id);
    let now = SystemTime::now();

    for (player_id, player) in &room.players {
        let is_winner = outcome.is_winner(player_id);
        let bonus = if is_winner { outcome.winner_bonus } else { 0 };
        let award = TokenAward {
            player_id: player_id.clone(),
            label: player.label().map(str::to_string),
            amount: player.tokens_earned.saturating_add(bonus),
            reason: ledger::game_complete_reason(is_winner.then_some(bonus)),
            room_id: Some(room_id.to_string()),
            sync_leaderboard: multiplayer,
        };
        if let Err(err) = ledger::award(store, award).await {
            error!(room_id, %player_id, error = %err, "failed to award tokens");
        }

        if !multiplayer {
            continue;
        }
        let player_counters = counters.get(player_id).copied().unwrap_or_default();
        if let Err(err) = stats::update_stats(
            store,
            player_id,
            game_type,
            difficulty,
            player_counters.total_answered,
            player_counters.total_correct,
            true,
        )
        .await
        {
            warn!(room_id, %player_id, error = %err, "failed to update player stats");
        }

        let game = GameContext {
            won: is_winner,
            difficulty,
            player_count: room.players.len(),
            score: player.score,
            questions_count,
            fast_correct: false,
        };
        let updates = quests::game_updates(player_counters, game);
        if let Err(err) = quests::update_progress(store, player_id, &updates, now).await {
            warn!(room_id, %player_id, error = %err, "failed to update quest progress");
        }
    }
}

/// Remove `player_id` from the room.
///
/// The host role passes to the first remaining player. When the last player leaves the game is
/// aborted and the room deleted; when a player leaves mid-question the round is re-evaluated
/// without them.
pub async fn quit_game(
    state: &SharedState,
    room_id: &str,
    player_id: &str,
) -> Result<QuitOutcome, ServiceError> {
    let leaver = player_id.to_string();
    let departure = state
        .rooms()
        .mutate(room_id, move |room| {
            if room.players.shift_remove(&leaver).is_none() {
                return Err(ServiceError::NotFound(
                    "player not found in this room".into(),
                ));
            }
            if room.players.is_empty() {
                room.status = RoomStatus::Aborted;
                room.aborted_by = Some(leaver.clone());
                room.current_question = None;
                return Ok(Departure::Closed);
            }
            if room.host_id == leaver {
                if let Some(next_host) = room.players.keys().next() {
                    room.host_id = next_host.clone();
                }
            }
            let mid_round = room.status == RoomStatus::Playing
                && room
                    .current_question
                    .as_ref()
                    .is_some_and(|question| !question.answer_revealed);
            Ok(if mid_round {
                Departure::LeftMidRound
            } else {
                Departure::Left
            })
        })
        .await?
        .ok_or_else(|| room_not_found(room_id))??;

    info!(room_id, player_id, ?departure, "player left");
    match departure {
        Departure::Closed => {
            state.registry().release_all(room_id);
            state.rooms().delete(room_id).await?;
            info!(room_id, "room closed after the last player left");
        }
        Departure::LeftMidRound => {
            if let Err(err) =
                round_driver::check_completion(state, room_id, None, Some(player_id)).await
            {
                warn!(room_id, player_id, error = %err, "completion check after quit failed");
            }
        }
        Departure::Left => {}
    }

    Ok(QuitOutcome {
        player_removed: true,
        room_closed: departure == Departure::Closed,
    })
}

/// Return a finished room to the lobby for another game.
///
/// Issues a new game marker so timers of the previous game that are still in flight can no
/// longer touch the room.
pub async fn reset_game(
    state: &SharedState,
    room_id: &str,
    requester: &str,
) -> Result<(), ServiceError> {
    let host = requester.to_string();
    let generation = Uuid::new_v4().to_string();
    let now = now_ms();

    state
        .rooms()
        .mutate(room_id, move |room| {
            if room.host_id != host {
                return Err(ServiceError::Forbidden(
                    "only the host can reset the game".into(),
                ));
            }
            if !room.status.is_finished() {
                return Err(ServiceError::InvalidState(
                    "game must be over before it can be reset".into(),
                ));
            }
            room.status = RoomStatus::Waiting;
            room.question_number = 0;
            room.total_questions = None;
            room.current_question = None;
            room.winner = None;
            room.winner_username = None;
            room.is_draw = false;
            room.aborted_by = None;
            room.current_game_id = Some(generation.clone());
            room.last_reset_at = Some(now);
            let solo = room.is_solo;
            for (player_id, player) in room.players.iter_mut() {
                player.ready = solo && *player_id == room.host_id;
                player.score = 0;
                player.tokens_earned = 0;
            }
            Ok(())
        })
        .await?
        .ok_or_else(|| room_not_found(room_id))??;

    state.registry().release_all(room_id);
    info!(room_id, requester, "game reset");
    Ok(())
}
