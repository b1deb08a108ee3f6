use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::content::Question;
use crate::practice::utils::parse_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    /// Whether a 1-based position has this parity.
    pub fn matches(self, position: usize) -> bool {
        match self {
            Parity::Odd => position % 2 == 1,
            Parity::Even => position % 2 == 0,
        }
    }
}

/// How the displayed list is derived from the loaded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "value")]
pub enum SelectionMode {
    All,
    Parity(Parity),
    RandomSubset(usize),
}

impl SelectionMode {
    /// Builds a random-subset mode from a raw count such as a form field.
    pub fn random_from_input(input: Option<&str>, default_count: usize) -> Self {
        SelectionMode::RandomSubset(parse_count(input, default_count))
    }
}

/// Derives the displayed questions from the full set. The full set is never
/// modified; every mode works on its own copy.
pub fn select<R: Rng + ?Sized>(
    full: &[Question],
    mode: SelectionMode,
    rng: &mut R,
) -> Vec<Question> {
    match mode {
        SelectionMode::All => full.to_vec(),
        SelectionMode::Parity(parity) => full
            .iter()
            .enumerate()
            .filter(|(index, _)| parity.matches(index + 1))
            .map(|(_, question)| question.clone())
            .collect(),
        SelectionMode::RandomSubset(count) => {
            let mut shuffled = full.to_vec();
            shuffled.shuffle(rng);
            shuffled.truncate(count);
            shuffled
        }
    }
}
