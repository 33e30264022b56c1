//! Token reward resolution for a game, backed by the cached `config/tokenRewards` document.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dao::{
    document_store::DocumentStore,
    models::{Difficulty, RoomSettingsEntity, TokenRewardsEntity},
};

/// Fallback for a configured per-correct value that is not a finite non-negative number.
pub const DEFAULT_TOKEN_PER_CORRECT: u32 = 1;
/// Fallback for a configured win bonus that is not a finite non-negative number.
pub const DEFAULT_TOKEN_PER_WIN: u32 = 1;
/// Solo games pay a flat reward per correct answer and no win bonus.
pub const SOLO_REWARDS: TokenRewards = TokenRewards {
    per_correct: 1,
    per_win: 0,
};

/// Rewards applied to one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRewards {
    /// Tokens per correct answer.
    pub per_correct: u32,
    /// Bonus tokens for the winner.
    pub per_win: u32,
}

impl TokenRewards {
    /// Built-in rewards of a difficulty when the configuration has no entry for it.
    pub fn defaults_for(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                per_correct: 1,
                per_win: 10,
            },
            Difficulty::Medium => Self {
                per_correct: 2,
                per_win: 20,
            },
            Difficulty::Hard => Self {
                per_correct: 3,
                per_win: 30,
            },
        }
    }

    /// Rewards snapshotted in the room settings at game start.
    pub fn from_settings(settings: &RoomSettingsEntity, is_solo: bool) -> Self {
        if is_solo {
            return SOLO_REWARDS;
        }
        Self {
            per_correct: settings
                .token_per_correct_answer
                .unwrap_or(DEFAULT_TOKEN_PER_CORRECT),
            per_win: settings.token_per_win.unwrap_or(DEFAULT_TOKEN_PER_WIN),
        }
    }
}

/// Round a configured value; anything but a finite non-negative number yields `fallback`.
fn token_value(value: f64, fallback: u32) -> u32 {
    if value.is_finite() && value >= 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        fallback
    }
}

/// Merge the configuration entry of `difficulty` over its built-in defaults.
pub fn rewards_for(config: Option<&TokenRewardsEntity>, difficulty: Difficulty) -> TokenRewards {
    let defaults = TokenRewards::defaults_for(difficulty);
    let Some(entry) = config.and_then(|config| config.for_difficulty(difficulty)) else {
        return defaults;
    };
    TokenRewards {
        per_correct: entry
            .token_per_correct
            .map_or(defaults.per_correct, |value| {
                token_value(value, DEFAULT_TOKEN_PER_CORRECT)
            }),
        per_win: entry
            .token_per_win
            .map_or(defaults.per_win, |value| token_value(value, DEFAULT_TOKEN_PER_WIN)),
    }
}

struct CachedRewards {
    config: TokenRewardsEntity,
    fetched_at: Instant,
}

/// Resolves the rewards of a game, caching the configuration document for a fixed TTL.
///
/// Only a document that was actually found is cached; a missing document or a failed lookup
/// is retried at the next game start.
pub struct RewardResolver {
    ttl: Duration,
    cache: Mutex<Option<CachedRewards>>,
}

impl RewardResolver {
    /// Resolver caching a found document for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Rewards for a game of `difficulty`. Solo games always get [`SOLO_REWARDS`].
    pub async fn resolve(
        &self,
        store: Option<Arc<dyn DocumentStore>>,
        difficulty: Difficulty,
        is_solo: bool,
    ) -> TokenRewards {
        if is_solo {
            return SOLO_REWARDS;
        }
        let config = self.config(store).await;
        rewards_for(config.as_ref(), difficulty)
    }

    async fn config(&self, store: Option<Arc<dyn DocumentStore>>) -> Option<TokenRewardsEntity> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
        {
            return Some(cached.config.clone());
        }

        let config = match store {
            Some(store) => match store.find_token_rewards().await {
                Ok(config) => config,
                Err(err) => {
                    warn!(error = %err, "failed to load token rewards; using defaults");
                    None
                }
            },
            None => {
                debug!("no document store installed; using default token rewards");
                None
            }
        };

        *cache = config.clone().map(|config| CachedRewards {
            config,
            fetched_at: Instant::now(),
        });
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        document_store::memory::MemoryDocumentStore, models::DifficultyRewardEntity,
    };

    fn entry(per_correct: Option<f64>, per_win: Option<f64>) -> Option<DifficultyRewardEntity> {
        Some(DifficultyRewardEntity {
            token_per_correct: per_correct,
            token_per_win: per_win,
        })
    }

    #[test]
    fn missing_config_uses_difficulty_defaults() {
        let expected = [
            (Difficulty::Easy, 1, 10),
            (Difficulty::Medium, 2, 20),
            (Difficulty::Hard, 3, 30),
        ];
        for (difficulty, per_correct, per_win) in expected {
            assert_eq!(
                rewards_for(None, difficulty),
                TokenRewards {
                    per_correct,
                    per_win
                }
            );
        }
    }

    #[test]
    fn configured_values_are_rounded_and_invalid_ones_fall_back() {
        let config = TokenRewardsEntity {
            easy: entry(Some(4.6), None),
            medium: entry(Some(-2.0), Some(f64::NAN)),
            hard: entry(None, Some(0.0)),
        };

        assert_eq!(
            rewards_for(Some(&config), Difficulty::Easy),
            TokenRewards {
                per_correct: 5,
                per_win: 10
            }
        );
        assert_eq!(
            rewards_for(Some(&config), Difficulty::Medium),
            TokenRewards {
                per_correct: DEFAULT_TOKEN_PER_CORRECT,
                per_win: DEFAULT_TOKEN_PER_WIN
            }
        );
        assert_eq!(
            rewards_for(Some(&config), Difficulty::Hard),
            TokenRewards {
                per_correct: 3,
                per_win: 0
            }
        );
    }

    #[test]
    fn settings_snapshot_fills_gaps_with_global_defaults() {
        let settings = RoomSettingsEntity {
            token_per_correct_answer: Some(7),
            ..Default::default()
        };
        assert_eq!(
            TokenRewards::from_settings(&settings, false),
            TokenRewards {
                per_correct: 7,
                per_win: DEFAULT_TOKEN_PER_WIN
            }
        );
        assert_eq!(TokenRewards::from_settings(&settings, true), SOLO_REWARDS);
    }

    #[tokio::test]
    async fn solo_games_ignore_configuration() {
        let resolver = RewardResolver::new(Duration::from_secs(60));
        let store = MemoryDocumentStore::new();
        store
            .set_token_rewards(TokenRewardsEntity {
                hard: entry(Some(9.0), Some(9.0)),
                ..Default::default()
            })
            .await;

        let rewards = resolver
            .resolve(Some(Arc::new(store)), Difficulty::Hard, true)
            .await;
        assert_eq!(rewards, SOLO_REWARDS);
    }

    #[tokio::test]
    async fn configuration_is_cached_until_the_ttl_expires() {
        let resolver = RewardResolver::new(Duration::from_secs(60));
        let store = MemoryDocumentStore::new();
        store
            .set_token_rewards(TokenRewardsEntity {
                hard: entry(Some(9.0), Some(90.0)),
                ..Default::default()
            })
            .await;
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());

        let first = resolver
            .resolve(Some(shared.clone()), Difficulty::Hard, false)
            .await;
        assert_eq!(first.per_correct, 9);

        store.set_token_rewards(TokenRewardsEntity::default()).await;
        let cached = resolver.resolve(Some(shared), Difficulty::Hard, false).await;
        assert_eq!(cached, first);

        let expired = RewardResolver::new(Duration::ZERO);
        let fresh = expired
            .resolve(Some(Arc::new(store)), Difficulty::Hard, false)
            .await;
        assert_eq!(fresh, TokenRewards::defaults_for(Difficulty::Hard));
    }

    #[tokio::test]
    async fn failed_lookups_are_not_cached() {
        let resolver = RewardResolver::new(Duration::from_secs(60));
        let store = MemoryDocumentStore::new();
        store.set_offline(true).await;
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        assert_eq!(
            resolver
                .resolve(Some(shared.clone()), Difficulty::Easy, false)
                .await,
            TokenRewards::defaults_for(Difficulty::Easy)
        );

        store.set_offline(false).await;
        store
            .set_token_rewards(TokenRewardsEntity {
                easy: entry(Some(6.0), None),
                ..Default::default()
            })
            .await;
        let recovered = resolver.resolve(Some(shared), Difficulty::Easy, false).await;
        assert_eq!(recovered.per_correct, 6);
    }

    #[tokio::test]
    async fn unreachable_store_falls_back_to_defaults() {
        let resolver = RewardResolver::new(Duration::from_secs(60));
        let store = MemoryDocumentStore::new();
        store.set_offline(true).await;

        let rewards = resolver
            .resolve(Some(Arc::new(store)), Difficulty::Easy, false)
            .await;
        assert_eq!(rewards, TokenRewards::defaults_for(Difficulty::Easy));
        assert_eq!(
            resolver.resolve(None, Difficulty::Medium, false).await,
            TokenRewards::defaults_for(Difficulty::Medium)
        );
    }
}
