use std::sync::Arc;

use futures::future::BoxFuture;
use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};

use super::{GeneratedQuestion, QuestionError, QuestionProvider};
use crate::{
    config::QuestionBankEntry,
    dao::models::{Difficulty, GameType, OptionValue, QuestionText},
};

/// Serves bilingual questions from a static bank, shuffling options with their translations.
#[derive(Debug, Clone)]
pub struct BankProvider {
    game_type: GameType,
    entries: Arc<Vec<QuestionBankEntry>>,
}

impl BankProvider {
    /// Keep the enabled, answerable entries of `game_type`.
    pub fn new(game_type: GameType, entries: Vec<QuestionBankEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|entry| entry.game_type == game_type && entry.enabled && is_answerable(entry))
            .collect();
        Self {
            game_type,
            entries: Arc::new(entries),
        }
    }

    /// Pick a question of `difficulty`, or of any difficulty when none matches.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        difficulty: Difficulty,
    ) -> Result<GeneratedQuestion, QuestionError> {
        let matching: Vec<&QuestionBankEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.difficulty == difficulty)
            .collect();
        let pool: Vec<&QuestionBankEntry> = if matching.is_empty() {
            self.entries.iter().collect()
        } else {
            matching
        };

        let entry = pool.choose(rng).ok_or(QuestionError::Exhausted {
            game_type: self.game_type.as_str(),
        })?;
        Ok(format_entry(rng, entry))
    }
}

impl QuestionProvider for BankProvider {
    fn generate_question(
        &self,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<GeneratedQuestion, QuestionError>> {
        let result = self.pick(&mut rand::rng(), difficulty);
        Box::pin(async move { result })
    }
}

fn is_answerable(entry: &QuestionBankEntry) -> bool {
    entry
        .options
        .get(entry.correct_index)
        .is_some_and(|label| !label.trim().is_empty())
}

fn format_entry<R: Rng + ?Sized>(rng: &mut R, entry: &QuestionBankEntry) -> GeneratedQuestion {
    let mut pairs: Vec<(usize, String, String)> = entry
        .options
        .iter()
        .enumerate()
        .filter(|(_, en)| !en.trim().is_empty())
        .map(|(index, en)| {
            let zh = entry.options_zh.get(index).cloned().unwrap_or_default();
            (index, en.clone(), zh)
        })
        .collect();
    pairs.shuffle(rng);

    let correct_index = pairs
        .iter()
        .position(|(index, _, _)| *index == entry.correct_index)
        .unwrap_or_default();

    GeneratedQuestion {
        question: QuestionText::Bilingual {
            en: entry.question.clone(),
            zh: entry.question_zh.clone(),
        },
        options: pairs
            .into_iter()
            .map(|(_, en, zh)| OptionValue::Text(QuestionText::Bilingual { en, zh }))
            .collect(),
        correct_index,
    }
}

fn entry(
    difficulty: Difficulty,
    question: (&str, &str),
    options: [(&str, &str); 4],
    correct_index: usize,
) -> QuestionBankEntry {
    QuestionBankEntry {
        game_type: GameType::Science,
        difficulty,
        question: question.0.to_string(),
        question_zh: question.1.to_string(),
        options: options.iter().map(|(en, _)| en.to_string()).collect(),
        options_zh: options.iter().map(|(_, zh)| zh.to_string()).collect(),
        correct_index,
        enabled: true,
    }
}

/// Built-in science questions used when the configuration does not provide a bank.
pub fn default_question_bank() -> Vec<QuestionBankEntry> {
    vec![
        entry(
            Difficulty::Easy,
            ("What gas do plants absorb from the air?", "植物从空气中吸收什么气体？"),
            [
                ("Oxygen", "氧气"),
                ("Carbon dioxide", "二氧化碳"),
                ("Nitrogen", "氮气"),
                ("Helium", "氦气"),
            ],
            1,
        ),
        entry(
            Difficulty::Easy,
            ("Which planet is closest to the Sun?", "哪颗行星离太阳最近？"),
            [
                ("Venus", "金星"),
                ("Earth", "地球"),
                ("Mercury", "水星"),
                ("Mars", "火星"),
            ],
            2,
        ),
        entry(
            Difficulty::Medium,
            ("What is the chemical symbol for sodium?", "钠的化学符号是什么？"),
            [("So", "So"), ("Sd", "Sd"), ("Na", "Na"), ("S", "S")],
            2,
        ),
        entry(
            Difficulty::Medium,
            ("Which organelle produces most of a cell's energy?", "哪种细胞器产生细胞的大部分能量？"),
            [
                ("Nucleus", "细胞核"),
                ("Mitochondrion", "线粒体"),
                ("Ribosome", "核糖体"),
                ("Golgi apparatus", "高尔基体"),
            ],
            1,
        ),
        entry(
            Difficulty::Hard,
            ("What is the SI unit of electrical resistance?", "电阻的国际单位是什么？"),
            [
                ("Volt", "伏特"),
                ("Ampere", "安培"),
                ("Watt", "瓦特"),
                ("Ohm", "欧姆"),
            ],
            3,
        ),
        entry(
            Difficulty::Hard,
            ("Which particle has no electric charge?", "哪种粒子不带电荷？"),
            [
                ("Neutron", "中子"),
                ("Proton", "质子"),
                ("Electron", "电子"),
                ("Positron", "正电子"),
            ],
            0,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn label(option: &OptionValue) -> (String, String) {
        match option {
            OptionValue::Text(QuestionText::Bilingual { en, zh }) => (en.clone(), zh.clone()),
            other => panic!("unexpected option {other:?}"),
        }
    }

    #[test]
    fn shuffled_options_keep_translations_and_answer_aligned() {
        let provider = BankProvider::new(GameType::Science, default_question_bank());
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let question = provider.pick(&mut rng, Difficulty::Hard).unwrap();
            let (en, zh) = label(&question.options[question.correct_index]);
            assert!(
                (en == "Ohm" && zh == "欧姆") || (en == "Neutron" && zh == "中子"),
                "unexpected answer {en}/{zh}"
            );
        }
    }

    #[test]
    fn falls_back_to_any_difficulty_and_drops_blank_options() {
        let mut lonely = entry(
            Difficulty::Easy,
            ("Q", "问"),
            [("A", "甲"), ("", ""), ("C", "丙"), ("D", "丁")],
            2,
        );
        lonely.options_zh.truncate(1);
        let provider = BankProvider::new(GameType::Science, vec![lonely]);

        let question = provider
            .pick(&mut StdRng::seed_from_u64(1), Difficulty::Hard)
            .unwrap();
        assert_eq!(question.options.len(), 3);
        assert_eq!(label(&question.options[question.correct_index]).0, "C");
    }

    #[test]
    fn empty_or_foreign_bank_is_exhausted() {
        let provider = BankProvider::new(GameType::Science, Vec::new());
        assert!(matches!(
            provider.pick(&mut StdRng::seed_from_u64(1), Difficulty::Easy),
            Err(QuestionError::Exhausted { game_type: "science" })
        ));

        let mut math_entry = default_question_bank().remove(0);
        math_entry.game_type = GameType::Math;
        let provider = BankProvider::new(GameType::Science, vec![math_entry]);
        assert!(provider.pick(&mut StdRng::seed_from_u64(1), Difficulty::Easy).is_err());
    }
}
