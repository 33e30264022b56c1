//! Quest definitions and the progress rules applied at the end of a multiplayer game.

use std::{collections::HashMap, time::SystemTime};

use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    dao::{
        document_store::DocumentStore,
        models::{Difficulty, QuestProgressEntity},
        storage::StorageResult,
    },
    state::registry::QuestCounters,
};

/// When a quest's progress starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetWindow {
    /// At midnight UTC.
    Daily,
    /// On Sunday at midnight UTC.
    Weekly,
}

/// How a game advances a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestRule {
    /// Adds the increment unconditionally.
    Accumulate,
    /// Consecutive wins; a loss resets to zero.
    WinStreak,
    /// Adds fast correct answers.
    Speed,
    /// Adds games played with at least four players.
    Social,
    /// Counts distinct difficulties played.
    Collector,
    /// Adds hard games won.
    Mastery,
    /// Adds games won.
    Wins,
    /// Completes on a perfect game of ten questions or more.
    Perfect,
}

/// Static description of one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestDefinition {
    /// Stable identifier stored on player quest documents.
    pub id: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Progress needed to complete the quest.
    pub target: u32,
    /// Tokens granted on completion.
    pub reward: u32,
    /// How a finished game advances the quest.
    pub rule: QuestRule,
    /// When progress starts over.
    pub reset: ResetWindow,
}

/// Answer questions correctly during the day.
pub const DAILY_WARRIOR: &str = "daily_math_warrior";
/// Win games.
pub const STREAK_MASTER: &str = "streak_master";
/// Answer correctly under the speed threshold.
pub const SPEED_DEMON: &str = "speed_demon";
/// Play games with other people.
pub const SOCIAL_BUTTERFLY: &str = "social_butterfly";
/// Play across difficulties.
pub const COLLECTOR_EXPLORER: &str = "collector_explorer";
/// Win on hard difficulty.
pub const MASTERY_SEEKER: &str = "mastery_seeker";
/// Win games during the week.
pub const WEEKLY_CHAMPION: &str = "weekly_champion";
/// Finish a long game without a miss.
pub const PERFECTIONIST: &str = "perfectionist";

/// Every quest a player can progress.
pub const QUEST_DEFINITIONS: [QuestDefinition; 8] = [
    QuestDefinition {
        id: DAILY_WARRIOR,
        title: "Daily Warrior",
        target: 25,
        reward: 50,
        rule: QuestRule::Accumulate,
        reset: ResetWindow::Daily,
    },
    QuestDefinition {
        id: STREAK_MASTER,
        title: "Streak Master",
        target: 3,
        reward: 100,
        rule: QuestRule::WinStreak,
        reset: ResetWindow::Daily,
    },
    QuestDefinition {
        id: SPEED_DEMON,
        title: "Speed Demon",
        target: 25,
        reward: 100,
        rule: QuestRule::Speed,
        reset: ResetWindow::Daily,
    },
    QuestDefinition {
        id: SOCIAL_BUTTERFLY,
        title: "Social Butterfly",
        target: 4,
        reward: 100,
        rule: QuestRule::Social,
        reset: ResetWindow::Daily,
    },
    QuestDefinition {
        id: COLLECTOR_EXPLORER,
        title: "Collector Explorer",
        target: 3,
        reward: 150,
        rule: QuestRule::Collector,
        reset: ResetWindow::Daily,
    },
    QuestDefinition {
        id: MASTERY_SEEKER,
        title: "Mastery Seeker",
        target: 10,
        reward: 250,
        rule: QuestRule::Mastery,
        reset: ResetWindow::Weekly,
    },
    QuestDefinition {
        id: WEEKLY_CHAMPION,
        title: "Weekly Champion",
        target: 10,
        reward: 250,
        rule: QuestRule::Wins,
        reset: ResetWindow::Weekly,
    },
    QuestDefinition {
        id: PERFECTIONIST,
        title: "Perfectionist",
        target: 1,
        reward: 500,
        rule: QuestRule::Perfect,
        reset: ResetWindow::Weekly,
    },
];

/// Look up a quest by id.
pub fn definition(quest_id: &str) -> Option<&'static QuestDefinition> {
    QUEST_DEFINITIONS.iter().find(|quest| quest.id == quest_id)
}

/// What happened to one player in a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameContext {
    /// The player won the game.
    pub won: bool,
    /// Difficulty the game was played at.
    pub difficulty: Difficulty,
    /// Players in the room when the game ended.
    pub player_count: usize,
    /// Correct answers by this player.
    pub score: u32,
    /// Questions the game was configured for.
    pub questions_count: u32,
    /// The increment counts answers faster than the speed threshold.
    pub fast_correct: bool,
}

impl GameContext {
    fn is_perfect(&self) -> bool {
        self.questions_count >= 10 && self.score >= self.questions_count
    }
}

/// Progress to apply to one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestUpdate {
    /// Quest being advanced.
    pub quest_id: &'static str,
    /// Progress to add.
    pub increment: u32,
    /// The game that earned the progress.
    pub game: GameContext,
}

/// Quest updates earned by one player in a finished multiplayer game.
pub fn game_updates(counters: QuestCounters, game: GameContext) -> Vec<QuestUpdate> {
    let mut updates = Vec::with_capacity(QUEST_DEFINITIONS.len());
    let plain = GameContext {
        fast_correct: false,
        ..game
    };

    if counters.daily_correct > 0 {
        updates.push(QuestUpdate {
            quest_id: DAILY_WARRIOR,
            increment: counters.daily_correct,
            game: plain,
        });
    }
    if counters.speed_correct > 0 {
        updates.push(QuestUpdate {
            quest_id: SPEED_DEMON,
            increment: counters.speed_correct,
            game: GameContext {
                fast_correct: true,
                ..game
            },
        });
    }
    for (quest_id, increment) in [
        (STREAK_MASTER, 1),
        (SOCIAL_BUTTERFLY, 1),
        (MASTERY_SEEKER, counters.daily_correct),
        (COLLECTOR_EXPLORER, 1),
        (WEEKLY_CHAMPION, 1),
        (PERFECTIONIST, 1),
    ] {
        updates.push(QuestUpdate {
            quest_id,
            increment,
            game: plain,
        });
    }
    updates
}

/// Start of the reset window containing `now`.
pub fn window_start(reset: ResetWindow, now: SystemTime) -> SystemTime {
    let now = OffsetDateTime::from(now);
    let today = now.date().midnight().assume_utc();
    let start = match reset {
        ResetWindow::Daily => today,
        ResetWindow::Weekly => {
            today - TimeDuration::days(i64::from(now.weekday().number_days_from_sunday()))
        }
    };
    SystemTime::from(start)
}

/// Zero the record when it was last touched before the current window.
pub fn reset_if_stale(
    progress: QuestProgressEntity,
    reset: ResetWindow,
    now: SystemTime,
) -> QuestProgressEntity {
    let start = window_start(reset, now);
    let stale = progress
        .last_updated
        .is_none_or(|last_updated| last_updated < start);
    if stale {
        QuestProgressEntity {
            last_updated: progress.last_updated,
            ..QuestProgressEntity::default()
        }
    } else {
        progress
    }
}

fn apply_update(
    quest: &QuestDefinition,
    mut progress: QuestProgressEntity,
    update: &QuestUpdate,
) -> QuestProgressEntity {
    if progress.completed {
        return progress;
    }

    let game = &update.game;
    let current = progress.progress;
    let next = match quest.rule {
        QuestRule::Accumulate => current.saturating_add(update.increment),
        QuestRule::WinStreak if game.won => current.saturating_add(1).min(quest.target),
        QuestRule::WinStreak => 0,
        QuestRule::Speed if game.fast_correct => current.saturating_add(update.increment),
        QuestRule::Social if game.player_count >= 4 => current.saturating_add(update.increment),
        QuestRule::Mastery if game.won && game.difficulty == Difficulty::Hard => {
            current.saturating_add(update.increment)
        }
        QuestRule::Wins if game.won => current.saturating_add(update.increment),
        QuestRule::Collector => {
            if !progress.difficulties.contains(&game.difficulty) {
                progress.difficulties.push(game.difficulty);
            }
            progress.difficulties.len() as u32
        }
        QuestRule::Perfect if game.is_perfect() => quest.target,
        QuestRule::Speed
        | QuestRule::Social
        | QuestRule::Mastery
        | QuestRule::Wins
        | QuestRule::Perfect => current,
    };

    progress.progress = next.min(quest.target);
    progress.completed = progress.progress >= quest.target;
    progress
}

/// Apply `updates` to the stored progress of `player_id` and merge the result back.
///
/// Unknown quest ids are ignored. Returns the records that were written.
pub async fn update_progress(
    store: &dyn DocumentStore,
    player_id: &str,
    updates: &[QuestUpdate],
    now: SystemTime,
) -> StorageResult<HashMap<String, QuestProgressEntity>> {
    if updates.is_empty() {
        return Ok(HashMap::new());
    }

    let stored = store.find_quest_progress(player_id).await?;
    let mut changed: HashMap<String, QuestProgressEntity> = HashMap::new();

    for update in updates {
        let Some(quest) = definition(update.quest_id) else {
            debug!(quest_id = update.quest_id, "unknown quest; skipped");
            continue;
        };
        let current = changed
            .remove(quest.id)
            .or_else(|| stored.get(quest.id).cloned())
            .unwrap_or_default();
        let mut next = apply_update(quest, reset_if_stale(current, quest.reset, now), update);
        next.last_updated = Some(now);
        changed.insert(quest.id.to_string(), next);
    }

    if changed.is_empty() {
        return Ok(changed);
    }
    store.save_quest_progress(player_id, changed.clone()).await?;
    debug!(player_id, quests = changed.len(), "quest progress saved");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::document_store::memory::MemoryDocumentStore;

    fn at(moment: OffsetDateTime) -> SystemTime {
        SystemTime::from(moment)
    }

    fn game(won: bool) -> GameContext {
        GameContext {
            won,
            difficulty: Difficulty::Hard,
            player_count: 2,
            score: 3,
            questions_count: 10,
            fast_correct: false,
        }
    }

    fn progress(value: u32, last_updated: SystemTime) -> QuestProgressEntity {
        QuestProgressEntity {
            progress: value,
            last_updated: Some(last_updated),
            ..Default::default()
        }
    }

    fn run(quest_id: &str, start: QuestProgressEntity, update: QuestUpdate) -> QuestProgressEntity {
        apply_update(definition(quest_id).unwrap(), start, &update)
    }

    #[test]
    fn windows_start_at_utc_midnight_and_on_sunday() {
        // 2026-10-14 is a Wednesday.
        let now = at(datetime!(2026-10-14 15:30 UTC));
        assert_eq!(
            window_start(ResetWindow::Daily, now),
            at(datetime!(2026-10-14 0:00 UTC))
        );
        assert_eq!(
            window_start(ResetWindow::Weekly, now),
            at(datetime!(2026-10-11 0:00 UTC))
        );

        let sunday = at(datetime!(2026-10-11 8:00 UTC));
        assert_eq!(
            window_start(ResetWindow::Weekly, sunday),
            at(datetime!(2026-10-11 0:00 UTC))
        );
    }

    #[test]
    fn stale_records_start_over_and_fresh_ones_are_kept() {
        let now = at(datetime!(2026-10-14 15:30 UTC));
        let mut yesterday = progress(20, at(datetime!(2026-10-13 23:59 UTC)));
        yesterday.completed = true;
        yesterday.claimed = true;
        yesterday.difficulties = vec![Difficulty::Easy];

        let reset = reset_if_stale(yesterday.clone(), ResetWindow::Daily, now);
        assert_eq!(reset.progress, 0);
        assert!(!reset.completed && !reset.claimed);
        assert!(reset.difficulties.is_empty());

        let kept = reset_if_stale(yesterday.clone(), ResetWindow::Weekly, now);
        assert_eq!(kept, yesterday);
    }

    #[test]
    fn streak_grows_on_wins_and_breaks_on_a_loss() {
        let now = SystemTime::now();
        let update = |won| QuestUpdate {
            quest_id: STREAK_MASTER,
            increment: 1,
            game: game(won),
        };
        let two = run(STREAK_MASTER, progress(1, now), update(true));
        assert_eq!(two.progress, 2);
        let done = run(STREAK_MASTER, two, update(true));
        assert!(done.completed);
        assert_eq!(done.progress, 3);
        assert_eq!(run(STREAK_MASTER, progress(2, now), update(false)).progress, 0);
    }

    #[test]
    fn conditional_quests_only_move_when_their_condition_holds() {
        let now = SystemTime::now();
        let lost = QuestUpdate {
            quest_id: MASTERY_SEEKER,
            increment: 4,
            game: game(false),
        };
        assert_eq!(run(MASTERY_SEEKER, progress(1, now), lost).progress, 1);
        let won = QuestUpdate {
            game: game(true),
            ..lost
        };
        assert_eq!(run(MASTERY_SEEKER, progress(1, now), won).progress, 5);

        let social = QuestUpdate {
            quest_id: SOCIAL_BUTTERFLY,
            increment: 1,
            game: GameContext {
                player_count: 4,
                ..game(false)
            },
        };
        assert_eq!(run(SOCIAL_BUTTERFLY, progress(0, now), social).progress, 1);

        let perfect = QuestUpdate {
            quest_id: PERFECTIONIST,
            increment: 1,
            game: GameContext {
                score: 10,
                ..game(true)
            },
        };
        assert!(run(PERFECTIONIST, progress(0, now), perfect).completed);
        let short_game = QuestUpdate {
            game: GameContext {
                score: 5,
                questions_count: 5,
                ..game(true)
            },
            ..perfect
        };
        assert!(!run(PERFECTIONIST, progress(0, now), short_game).completed);
    }

    #[test]
    fn collector_counts_distinct_difficulties_and_progress_caps_at_target() {
        let now = SystemTime::now();
        let mut start = progress(0, now);
        start.difficulties = vec![Difficulty::Easy, Difficulty::Hard];
        let update = QuestUpdate {
            quest_id: COLLECTOR_EXPLORER,
            increment: 1,
            game: game(false),
        };
        let same = run(COLLECTOR_EXPLORER, start.clone(), update);
        assert_eq!(same.progress, 2);

        let medium = QuestUpdate {
            game: GameContext {
                difficulty: Difficulty::Medium,
                ..game(false)
            },
            ..update
        };
        assert!(run(COLLECTOR_EXPLORER, start, medium).completed);

        let flood = QuestUpdate {
            quest_id: DAILY_WARRIOR,
            increment: 40,
            game: game(false),
        };
        let capped = run(DAILY_WARRIOR, progress(0, now), flood);
        assert_eq!(capped.progress, 25);
        assert!(capped.completed);
        assert_eq!(run(DAILY_WARRIOR, capped.clone(), flood), capped);
    }

    #[test]
    fn game_updates_follow_the_counters() {
        let counters = QuestCounters {
            daily_correct: 3,
            speed_correct: 0,
            total_answered: 4,
            total_correct: 3,
        };
        let updates = game_updates(counters, game(true));
        let ids: Vec<_> = updates.iter().map(|update| update.quest_id).collect();
        assert_eq!(ids[0], DAILY_WARRIOR);
        assert!(!ids.contains(&SPEED_DEMON));
        assert_eq!(ids.len(), 7);
        let mastery = updates
            .iter()
            .find(|update| update.quest_id == MASTERY_SEEKER)
            .unwrap();
        assert_eq!(mastery.increment, 3);
    }

    #[tokio::test]
    async fn update_progress_merges_into_the_store() {
        let store = MemoryDocumentStore::new();
        let now = SystemTime::now();
        let counters = QuestCounters {
            daily_correct: 2,
            speed_correct: 1,
            total_answered: 2,
            total_correct: 2,
        };
        let updates = game_updates(counters, game(true));

        update_progress(&store, "a", &updates, now).await.unwrap();
        let saved = update_progress(&store, "a", &updates, now).await.unwrap();

        assert_eq!(saved[DAILY_WARRIOR].progress, 4);
        assert_eq!(saved[SPEED_DEMON].progress, 2);
        assert_eq!(saved[STREAK_MASTER].progress, 2);
        assert_eq!(saved[WEEKLY_CHAMPION].progress, 2);
        assert_eq!(saved[COLLECTOR_EXPLORER].progress, 1);
        assert!(saved.values().all(|quest| quest.last_updated == Some(now)));
        assert_eq!(store.find_quest_progress("a").await.unwrap(), saved);
    }
}
