use std::collections::BTreeSet;

use futures::future::BoxFuture;
use rand::{Rng, seq::SliceRandom};

use super::{GeneratedQuestion, QuestionError, QuestionProvider};
use crate::dao::models::{Difficulty, OptionValue, QuestionText};

const WRONG_ANSWER_COUNT: usize = 3;
const PERCENT_CHOICES: [(i64, i64); 5] = [(10, 10), (20, 5), (25, 4), (50, 2), (75, 4)];

/// Random arithmetic generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathProvider;

impl QuestionProvider for MathProvider {
    fn generate_question(
        &self,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<GeneratedQuestion, QuestionError>> {
        let question = generate_question(&mut rand::rng(), difficulty);
        Box::pin(async move { Ok(question) })
    }
}

/// Prompt and expected answer before options are built.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Problem {
    prompt: String,
    answer: i64,
}

impl Problem {
    fn new(prompt: String, answer: i64) -> Self {
        Self { prompt, answer }
    }
}

/// Build one arithmetic question with the answer shuffled among distractors.
pub fn generate_question<R: Rng + ?Sized>(rng: &mut R, difficulty: Difficulty) -> GeneratedQuestion {
    let problem = match difficulty {
        Difficulty::Easy => easy_problem(rng),
        Difficulty::Medium => medium_problem(rng),
        Difficulty::Hard => hard_problem(rng),
    };

    let mut options: Vec<i64> = wrong_answers(rng, problem.answer);
    options.push(problem.answer);
    options.shuffle(rng);
    let correct_index = options
        .iter()
        .position(|option| *option == problem.answer)
        .unwrap_or_default();

    GeneratedQuestion {
        question: QuestionText::Plain(problem.prompt),
        options: options.into_iter().map(OptionValue::Number).collect(),
        correct_index,
    }
}

/// Three distinct distractors within `max(10, |answer| / 2)` of the answer.
fn wrong_answers<R: Rng + ?Sized>(rng: &mut R, answer: i64) -> Vec<i64> {
    let range = (answer.abs() as f64 * 0.5).max(10.0).ceil() as i64;
    let mut wrong = BTreeSet::new();
    while wrong.len() < WRONG_ANSWER_COUNT {
        let variation = rng.random_range(1..=range);
        let candidate = if rng.random_bool(0.5) {
            answer + variation
        } else {
            answer - variation
        };
        wrong.insert(candidate);
    }
    wrong.into_iter().collect()
}

fn easy_problem<R: Rng + ?Sized>(rng: &mut R) -> Problem {
    match rng.random_range(1..=4) {
        1 => {
            let (a, b) = (rng.random_range(1..=100), rng.random_range(1..=100));
            Problem::new(format!("{a} + {b} = ?"), a + b)
        }
        2 => {
            let (a, b) = (rng.random_range(1..=100), rng.random_range(1..=100));
            let (larger, smaller) = (a.max(b), a.min(b));
            Problem::new(format!("{larger} - {smaller} = ?"), larger - smaller)
        }
        3 => {
            let (a, b) = (rng.random_range(2..=12), rng.random_range(2..=12));
            Problem::new(format!("{a} × {b} = ?"), a * b)
        }
        _ => {
            let (b, answer) = (rng.random_range(2..=12), rng.random_range(2..=12));
            Problem::new(format!("{} ÷ {b} = ?", b * answer), answer)
        }
    }
}

fn medium_problem<R: Rng + ?Sized>(rng: &mut R) -> Problem {
    match rng.random_range(1..=5) {
        1 => {
            let (a, b) = (rng.random_range(2..=15), rng.random_range(2..=12));
            Problem::new(format!("{a} × {b} = ?"), a * b)
        }
        2 => {
            let (b, answer) = (rng.random_range(2..=15), rng.random_range(2..=12));
            Problem::new(format!("{} ÷ {b} = ?", b * answer), answer)
        }
        3 => {
            let (a, b, c) = (
                rng.random_range(2..=10),
                rng.random_range(2..=10),
                rng.random_range(1..=20),
            );
            Problem::new(format!("{a} × {b} + {c} = ?"), a * b + c)
        }
        4 => {
            let (a, b) = (rng.random_range(2..=10), rng.random_range(2..=10));
            let c = rng.random_range(1..a * b);
            Problem::new(format!("{a} × {b} - {c} = ?"), a * b - c)
        }
        _ => {
            let (a, b, c) = (
                rng.random_range(2..=10),
                rng.random_range(2..=10),
                rng.random_range(2..=5),
            );
            Problem::new(format!("({a} + {b}) × {c} = ?"), (a + b) * c)
        }
    }
}

fn hard_problem<R: Rng + ?Sized>(rng: &mut R) -> Problem {
    match rng.random_range(1..=4) {
        1 => {
            let a = rng.random_range(2..=26);
            Problem::new(format!("{a}² = ?"), a * a)
        }
        2 => {
            let a = rng.random_range(2..=21);
            Problem::new(format!("√{} = ?", a * a), a)
        }
        3 => {
            let (percent, multiplier) = PERCENT_CHOICES[rng.random_range(0..PERCENT_CHOICES.len())];
            let base = rng.random_range(1..=20) * multiplier;
            Problem::new(format!("{percent}% of {base} = ?"), percent * base / 100)
        }
        _ => algebra_problem(rng),
    }
}

fn algebra_problem<R: Rng + ?Sized>(rng: &mut R) -> Problem {
    match rng.random_range(0..4) {
        0 => {
            let (x, a) = (rng.random_range(1..=50), rng.random_range(1..=50));
            Problem::new(format!("Find x: x + {a} = {}", x + a), x)
        }
        1 => {
            let (x, a) = (rng.random_range(2..=16), rng.random_range(2..=11));
            Problem::new(format!("Find x: {a}x = {}", a * x), x)
        }
        2 => {
            let (a, b) = (rng.random_range(2..=11), rng.random_range(2..=16));
            Problem::new(format!("Find x: x / {a} = {b}"), a * b)
        }
        _ => {
            let (x, a, b) = (
                rng.random_range(1..=12),
                rng.random_range(2..=6),
                rng.random_range(1..=20),
            );
            Problem::new(format!("Find x: {a}x + {b} = {}", a * x + b), x)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn every_difficulty_yields_four_distinct_options_with_the_answer_marked() {
        let mut rng = StdRng::seed_from_u64(7);
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            for _ in 0..200 {
                let question = generate_question(&mut rng, difficulty);
                assert_eq!(question.options.len(), 4);
                let values: BTreeSet<_> = question
                    .options
                    .iter()
                    .map(|option| match option {
                        OptionValue::Number(value) => *value,
                        other => panic!("unexpected option {other:?}"),
                    })
                    .collect();
                assert_eq!(values.len(), 4);
                assert!(question.correct_index < 4);
            }
        }
    }

    #[test]
    fn marked_option_solves_simple_prompts() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let question = generate_question(&mut rng, Difficulty::Easy);
            let QuestionText::Plain(prompt) = &question.question else {
                panic!("math prompts are plain text");
            };
            let OptionValue::Number(answer) = question.options[question.correct_index] else {
                panic!("math options are numbers");
            };
            let parts: Vec<&str> = prompt.split_whitespace().collect();
            let (a, op, b): (i64, &str, i64) =
                (parts[0].parse().unwrap(), parts[1], parts[2].parse().unwrap());
            let expected = match op {
                "+" => a + b,
                "-" => a - b,
                "×" => a * b,
                "÷" => a / b,
                other => panic!("unexpected operator {other}"),
            };
            assert_eq!(answer, expected, "prompt {prompt}");
        }
    }

    #[test]
    fn distractors_stay_within_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for answer in [0, 5, 400] {
            let range = (answer as f64 * 0.5).max(10.0).ceil() as i64;
            for wrong in wrong_answers(&mut rng, answer) {
                assert_ne!(wrong, answer);
                assert!((wrong - answer).abs() <= range);
            }
        }
    }

    #[tokio::test]
    async fn provider_serves_generated_questions() {
        let question = MathProvider
            .generate_question(Difficulty::Hard)
            .await
            .unwrap();
        assert_eq!(question.options.len(), 4);
    }
}
