//! Process-local ownership of per-room timers, presence listeners and round state.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::debug;

use crate::state::round::{InvalidRoundTransition, RoundEvent, RoundPhase, RoundStateMachine};

/// Per-player counters accumulated during a game and consumed by quest progress at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestCounters {
    /// Correct answers (multiplayer only).
    pub daily_correct: u32,
    /// Correct answers given faster than the speed threshold (multiplayer only).
    pub speed_correct: u32,
    /// Answers submitted, correct or not.
    pub total_answered: u32,
    /// Correct answers.
    pub total_correct: u32,
}

/// Result of [`RoomRegistry::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTransitionError {
    /// The room is not tracked by this process (never started, or already released).
    Untracked,
    /// The round machine rejected the event.
    Invalid(InvalidRoundTransition),
}

struct ArmedTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

struct RoomSlot {
    generation: String,
    timer: Option<ArmedTimer>,
    presence: Option<JoinHandle<()>>,
    round: RoundStateMachine,
    counters: HashMap<String, QuestCounters>,
}

impl RoomSlot {
    fn release(self) {
        if let Some(timer) = self.timer {
            timer.handle.abort();
        }
        if let Some(presence) = self.presence {
            presence.abort();
        }
    }
}

/// Registry keyed by room id. A room has a slot only while a game is starting or playing.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomSlot>,
    next_ticket: AtomicU64,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new game instance, releasing whatever the room held before.
    pub fn begin(&self, room_id: &str, generation: &str) {
        let slot = RoomSlot {
            generation: generation.to_string(),
            timer: None,
            presence: None,
            round: RoundStateMachine::new(),
            counters: HashMap::new(),
        };
        if let Some(previous) = self.rooms.insert(room_id.to_string(), slot) {
            previous.release();
        }
    }

    /// Game instance currently tracked for the room.
    pub fn generation(&self, room_id: &str) -> Option<String> {
        self.rooms.get(room_id).map(|slot| slot.generation.clone())
    }

    /// Schedule `task` `delay` from now, replacing (and cancelling) any timer already armed for
    /// the room. Returns `false` when the room is not tracked, in which case nothing runs.
    ///
    /// The task detaches its own handle once the delay elapsed, so arming or cancelling from
    /// inside `task` never aborts the task itself.
    pub fn arm<F, Fut>(self: &Arc<Self>, room_id: &str, delay: Duration, task: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(mut slot) = self.rooms.get_mut(room_id) else {
            debug!(room_id, "room not tracked; timer not armed");
            return false;
        };

        let deadline = Instant::now() + delay;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(self);
        let room = room_id.to_string();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            if !registry.detach_timer(&room, ticket) {
                return;
            }
            task().await;
        });

        if let Some(previous) = slot.timer.replace(ArmedTimer { ticket, handle }) {
            previous.handle.abort();
        }
        true
    }

    fn detach_timer(&self, room_id: &str, ticket: u64) -> bool {
        let Some(mut slot) = self.rooms.get_mut(room_id) else {
            return false;
        };
        match slot.timer {
            Some(ref timer) if timer.ticket == ticket => {
                slot.timer = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the room's pending timer, if any.
    pub fn cancel(&self, room_id: &str) {
        if let Some(timer) = self
            .rooms
            .get_mut(room_id)
            .and_then(|mut slot| slot.timer.take())
        {
            timer.handle.abort();
        }
    }

    /// Whether a timer is pending for the room.
    pub fn has_armed_timer(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|slot| slot.timer.is_some())
    }

    /// Keep the presence listener task of the room; aborted on release.
    pub fn attach_presence(&self, room_id: &str, handle: JoinHandle<()>) {
        match self.rooms.get_mut(room_id) {
            Some(mut slot) => {
                if let Some(previous) = slot.presence.replace(handle) {
                    previous.abort();
                }
            }
            None => handle.abort(),
        }
    }

    /// Drop everything the room owns: timer, presence listener, round state and counters.
    pub fn release_all(&self, room_id: &str) {
        if let Some((_, slot)) = self.rooms.remove(room_id) {
            slot.release();
            debug!(room_id, "released room resources");
        }
    }

    /// Apply a round event to the room's state machine, returning the new phase.
    pub fn transition(
        &self,
        room_id: &str,
        event: RoundEvent,
    ) -> Result<RoundPhase, RoundTransitionError> {
        let mut slot = self
            .rooms
            .get_mut(room_id)
            .ok_or(RoundTransitionError::Untracked)?;
        slot.round.apply(event).map_err(RoundTransitionError::Invalid)
    }

    /// Count one answer of `player_id` towards quest counters.
    pub fn record_answer(
        &self,
        room_id: &str,
        player_id: &str,
        correct: bool,
        fast: bool,
        multiplayer: bool,
    ) {
        let Some(mut slot) = self.rooms.get_mut(room_id) else {
            return;
        };
        let counters = slot.counters.entry(player_id.to_string()).or_default();
        counters.total_answered += 1;
        if correct {
            counters.total_correct += 1;
            if multiplayer {
                counters.daily_correct += 1;
                if fast {
                    counters.speed_correct += 1;
                }
            }
        }
    }

    /// Snapshot of the quest counters of every player of the room.
    pub fn counters(&self, room_id: &str) -> HashMap<String, QuestCounters> {
        self.rooms
            .get(room_id)
            .map(|slot| slot.counters.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::time::advance;

    use super::*;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(hits: &Arc<AtomicUsize>) -> impl FnOnce() -> futures::future::Ready<()> + Send + 'static {
        let hits = hits.clone();
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_timer() {
        let registry = Arc::new(RoomRegistry::new());
        registry.begin("r1", "g1");
        let first = counter();
        let second = counter();

        assert!(registry.arm("r1", Duration::from_secs(5), bump(&first)));
        assert!(registry.arm("r1", Duration::from_secs(5), bump(&second)));

        advance(Duration::from_secs(6)).await;
        settle().await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(!registry.has_armed_timer("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn the_delay_counts_from_arming_not_from_the_first_poll() {
        let registry = Arc::new(RoomRegistry::new());
        registry.begin("r1", "g1");
        let hits = counter();

        registry.arm("r1", Duration::from_secs(5), bump(&hits));
        advance(Duration::from_secs(5)).await;
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_safe_with_or_without_a_timer() {
        let registry = Arc::new(RoomRegistry::new());
        registry.cancel("unknown");
        registry.begin("r1", "g1");
        registry.cancel("r1");

        let hits = counter();
        registry.arm("r1", Duration::from_secs(1), bump(&hits));
        assert!(registry.has_armed_timer("r1"));
        registry.cancel("r1");

        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_firing_timer_can_rearm_without_cancelling_itself() {
        let registry = Arc::new(RoomRegistry::new());
        registry.begin("r1", "g1");
        let hits = counter();

        let inner_registry = registry.clone();
        let inner_hits = hits.clone();
        registry.arm("r1", Duration::from_secs(1), move || async move {
            inner_registry.arm("r1", Duration::from_secs(1), bump(&inner_hits));
            tokio::task::yield_now().await;
            inner_hits.fetch_add(10, Ordering::SeqCst);
        });

        advance(Duration::from_millis(1_100)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert!(registry.has_armed_timer("r1"));

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn release_all_aborts_everything_and_untracks_the_room() {
        let registry = Arc::new(RoomRegistry::new());
        registry.begin("r1", "g1");
        let hits = counter();
        registry.arm("r1", Duration::from_secs(1), bump(&hits));
        let listener = tokio::spawn(futures::future::pending::<()>());
        let listener_abort = listener.abort_handle();
        registry.attach_presence("r1", listener);
        registry.record_answer("r1", "a", true, true, true);

        registry.release_all("r1");
        registry.release_all("r1");
        settle().await;

        assert!(registry.generation("r1").is_none());
        assert!(listener_abort.is_finished());
        assert!(registry.counters("r1").is_empty());
        assert!(!registry.arm("r1", Duration::from_secs(1), bump(&hits)));

        advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn counters_only_track_daily_and_speed_in_multiplayer() {
        let registry = RoomRegistry::new();
        registry.begin("r1", "g1");
        registry.record_answer("r1", "a", true, true, true);
        registry.record_answer("r1", "a", false, false, true);
        registry.record_answer("r1", "solo", true, true, false);

        let counters = registry.counters("r1");
        assert_eq!(
            counters["a"],
            QuestCounters {
                daily_correct: 1,
                speed_correct: 1,
                total_answered: 2,
                total_correct: 1
            }
        );
        assert_eq!(counters["solo"].daily_correct, 0);
        assert_eq!(counters["solo"].total_correct, 1);
    }

    #[test]
    fn transitions_require_a_tracked_room() {
        let registry = RoomRegistry::new();
        assert_eq!(
            registry.transition("r1", RoundEvent::Ask { question: 1 }),
            Err(RoundTransitionError::Untracked)
        );
        registry.begin("r1", "g1");
        assert_eq!(
            registry.transition("r1", RoundEvent::Ask { question: 1 }),
            Ok(RoundPhase::Asking { question: 1 })
        );
        assert!(matches!(
            registry.transition("r1", RoundEvent::Advance),
            Err(RoundTransitionError::Invalid(_))
        ));
        assert_eq!(registry.generation("r1").as_deref(), Some("g1"));
    }
}
