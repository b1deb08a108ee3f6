use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::content::Question;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShuffledOption {
    pub text: String,
    pub original_index: usize,
}

/// A question's options in the order they are shown for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledPresentation {
    pub options: Vec<ShuffledOption>,
    /// First shown position whose text equals the original correct text.
    pub new_answer_index: usize,
}

impl ShuffledPresentation {
    pub fn is_correct(&self, position: usize) -> bool {
        position == self.new_answer_index
    }
}

/// Shuffles a question's options uniformly and locates the correct answer in
/// the new order.
///
/// The answer is found by comparing option text with the text originally at
/// `answer_index`, not by following the index through the permutation. When
/// two options share the correct text, whichever lands first is treated as
/// correct.
pub fn shuffle_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> ShuffledPresentation {
    let mut options: Vec<ShuffledOption> = question
        .options
        .iter()
        .enumerate()
        .map(|(original_index, text)| ShuffledOption {
            text: text.clone(),
            original_index,
        })
        .collect();
    options.shuffle(rng);

    // Parsed questions always have an in-range answer; position 0 only covers
    // questions built by hand with an empty option list.
    let new_answer_index = question
        .correct_text()
        .and_then(|correct| options.iter().position(|o| o.text == correct))
        .unwrap_or(0);

    ShuffledPresentation {
        options,
        new_answer_index,
    }
}
