use thiserror::Error;

/// Why a question stopped accepting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A player answered correctly.
    Answered,
    /// The round timer expired.
    TimedOut,
    /// Every active player answered incorrectly.
    Eliminated,
}

/// Phase of the question loop of one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Between questions, or before the first one.
    Idle,
    /// A question is on screen and accepting answers.
    Asking {
        /// One-based question number.
        question: u32,
    },
    /// The answer of the current question has been revealed.
    Revealed {
        /// One-based question number.
        question: u32,
        /// How the question was resolved.
        outcome: RoundOutcome,
    },
    /// The last question was played and the game was settled.
    Finished,
    /// The game stopped early.
    Aborted,
}

impl RoundPhase {
    /// Whether no further event is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundPhase::Finished | RoundPhase::Aborted)
    }
}

/// Events driving [`RoundStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// A new question was posed.
    Ask {
        /// One-based question number.
        question: u32,
    },
    /// The current question was resolved.
    Resolve(RoundOutcome),
    /// The inter-round delay elapsed.
    Advance,
    /// The question budget is exhausted.
    Finish,
    /// The game was stopped early.
    Abort,
}

/// Error returned when an event does not apply to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid round transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidRoundTransition {
    /// Phase the machine was in.
    pub from: RoundPhase,
    /// Rejected event.
    pub event: RoundEvent,
}

/// Explicit transition table for the question loop of a room.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    phase: RoundPhase,
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
        }
    }
}

impl RoundStateMachine {
    /// Create a machine waiting for its first question.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase. A rejected event leaves the phase unchanged.
    pub fn apply(&mut self, event: RoundEvent) -> Result<RoundPhase, InvalidRoundTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: RoundEvent) -> Result<RoundPhase, InvalidRoundTransition> {
        let next = match (self.phase, event) {
            (RoundPhase::Idle, RoundEvent::Ask { question }) => RoundPhase::Asking { question },
            (RoundPhase::Asking { question }, RoundEvent::Resolve(outcome)) => {
                RoundPhase::Revealed { question, outcome }
            }
            (RoundPhase::Revealed { .. }, RoundEvent::Advance) => RoundPhase::Idle,
            (RoundPhase::Idle | RoundPhase::Revealed { .. }, RoundEvent::Finish) => {
                RoundPhase::Finished
            }
            (from, RoundEvent::Abort) if !from.is_terminal() => RoundPhase::Aborted,
            (from, event) => return Err(InvalidRoundTransition { from, event }),
        };

        Ok(next)
    }
}
