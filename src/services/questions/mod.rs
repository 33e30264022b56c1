//! Question providers, one per game type.

/// Arithmetic questions generated on the fly.
pub mod math;
/// Questions drawn from the configured bank.
pub mod science;

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::models::{Difficulty, GameType, OptionValue, QuestionText},
};

/// A question ready to be posed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
    /// Prompt, possibly bilingual.
    pub question: QuestionText,
    /// Answer options in display order.
    pub options: Vec<OptionValue>,
    /// Index of the right option.
    pub correct_index: usize,
}

/// Why a provider could not produce a question.
#[derive(Debug, Error)]
pub enum QuestionError {
    /// The provider has nothing to serve.
    #[error("no questions available for game type `{game_type}`")]
    Exhausted {
        /// Game type that was asked for.
        game_type: &'static str,
    },
}

/// Source of questions for one game type.
pub trait QuestionProvider: Send + Sync {
    fn generate_question(
        &self,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<GeneratedQuestion, QuestionError>>;
}

/// Provider lookup by game type. Unknown types fall back to math.
#[derive(Clone)]
pub struct QuestionProviders {
    providers: HashMap<GameType, Arc<dyn QuestionProvider>>,
    fallback: Arc<dyn QuestionProvider>,
}

impl QuestionProviders {
    /// Math generator plus the configured question bank for science.
    pub fn new(config: &AppConfig) -> Self {
        let math: Arc<dyn QuestionProvider> = Arc::new(math::MathProvider);
        let science: Arc<dyn QuestionProvider> = Arc::new(science::BankProvider::new(
            GameType::Science,
            config.question_bank.clone(),
        ));

        Self {
            providers: HashMap::from([(GameType::Math, math.clone()), (GameType::Science, science)]),
            fallback: math,
        }
    }

    /// Replace the provider serving `game_type`.
    pub fn with_provider(mut self, game_type: GameType, provider: Arc<dyn QuestionProvider>) -> Self {
        if game_type == GameType::Math {
            self.fallback = provider.clone();
        }
        self.providers.insert(game_type, provider);
        self
    }

    /// Provider for `game_type`, or the math fallback.
    pub fn for_game_type(&self, game_type: GameType) -> Arc<dyn QuestionProvider> {
        match self.providers.get(&game_type) {
            Some(provider) => provider.clone(),
            None => {
                warn!(
                    game_type = game_type.as_str(),
                    "unknown game type; falling back to math"
                );
                self.fallback.clone()
            }
        }
    }
}
