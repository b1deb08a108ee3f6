use crate::practice::feedback::{FeedbackDriver, PendingFeedback};
use crate::practice::shuffle::ShuffledPresentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardPhase {
    Unanswered,
    AnsweredCorrect,
}

/// What a selection did to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Correct,
    /// The card stays open for another attempt.
    Incorrect,
    /// The card was already answered correctly.
    Ignored,
}

/// Answer state of a single card, independent of every other card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardState {
    phase: CardPhase,
}

impl Default for CardState {
    fn default() -> Self {
        Self {
            phase: CardPhase::Unanswered,
        }
    }
}

impl CardState {
    pub fn answered(&self) -> bool {
        self.phase == CardPhase::AnsweredCorrect
    }

    pub fn apply(&mut self, chosen: usize, correct: usize) -> Transition {
        match self.phase {
            CardPhase::AnsweredCorrect => Transition::Ignored,
            CardPhase::Unanswered if chosen == correct => {
                self.phase = CardPhase::AnsweredCorrect;
                Transition::Correct
            }
            CardPhase::Unanswered => Transition::Incorrect,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Option {option} does not exist on card {card} ({available} options)")]
pub struct OptionOutOfRange {
    pub card: usize,
    pub option: usize,
    pub available: usize,
}

/// A rendered question: its shuffled options, its answer state and any
/// feedback still waiting to play.
#[derive(Debug)]
pub struct Card {
    index: usize,
    presentation: ShuffledPresentation,
    state: CardState,
    pending_feedback: Option<PendingFeedback>,
}

impl Card {
    pub fn new(index: usize, presentation: ShuffledPresentation) -> Self {
        Self {
            index,
            presentation,
            state: CardState::default(),
            pending_feedback: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn presentation(&self) -> &ShuffledPresentation {
        &self.presentation
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn pending_feedback(&self) -> Option<&PendingFeedback> {
        self.pending_feedback.as_ref()
    }

    /// Handles a click on the option shown at `option`.
    ///
    /// A correct pick plays its feedback before returning. A wrong pick
    /// schedules its feedback and returns at once.
    #[tracing::instrument(skip(self, driver), fields(card.index = self.index))]
    pub async fn select(
        &mut self,
        option: usize,
        generation: u64,
        driver: &FeedbackDriver,
    ) -> Result<Transition, OptionOutOfRange> {
        let available = self.presentation.options.len();
        if option >= available {
            return Err(OptionOutOfRange {
                card: self.index,
                option,
                available,
            });
        }

        let transition = self
            .state
            .apply(option, self.presentation.new_answer_index);

        match transition {
            Transition::Correct => {
                tracing::debug!(option, "Correct answer");
                driver.correct(generation, self.index, option).await;
            }
            Transition::Incorrect => {
                tracing::debug!(option, "Wrong answer");
                self.pending_feedback = Some(driver.incorrect(generation, self.index, option));
            }
            Transition::Ignored => {
                tracing::trace!(option, "Card already answered");
            }
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Question;
    use crate::practice::feedback::testing::{RecordingSink, driver_with};
    use crate::practice::feedback::{FeedbackEvent, FeedbackSettings, OptionMark};
    use crate::practice::shuffle::shuffle_options;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_wrong_answers_never_lock_the_card() {
        let mut state = CardState::default();
        assert_eq!(state.apply(1, 0), Transition::Incorrect);
        assert_eq!(state.apply(2, 0), Transition::Incorrect);
        assert!(!state.answered());

        assert_eq!(state.apply(0, 0), Transition::Correct);
        assert!(state.answered());
    }

    #[test]
    fn test_answered_card_ignores_further_picks() {
        let mut state = CardState::default();
        state.apply(3, 3);
        assert_eq!(state.apply(1, 3), Transition::Ignored);
        assert_eq!(state.apply(3, 3), Transition::Ignored);
        assert!(state.answered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_picking_go_is_correct_wherever_it_lands() {
        let question = Question::new(
            "I ___ to school",
            vec![
                "go".to_string(),
                "goes".to_string(),
                "going".to_string(),
                "went".to_string(),
            ],
            0,
        );

        for seed in 0..20 {
            let sink = Arc::new(RecordingSink::default());
            let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());
            let mut rng = StdRng::seed_from_u64(seed);
            let mut card = Card::new(0, shuffle_options(&question, &mut rng));

            let go_position = card
                .presentation()
                .options
                .iter()
                .position(|o| o.text == "go")
                .unwrap();

            let transition = card.select(go_position, 0, &driver).await.unwrap();
            assert_eq!(transition, Transition::Correct);
            assert!(card.state().answered());
            assert_eq!(sink.events()[0], FeedbackEvent::SuccessCue);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_then_right_ends_answered() {
        let question = Question::new("Q", vec!["a".to_string(), "b".to_string()], 1);
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());
        let mut rng = StdRng::seed_from_u64(9);
        let mut card = Card::new(4, shuffle_options(&question, &mut rng));
        let correct = card.presentation().new_answer_index;
        let wrong = 1 - correct;

        assert_eq!(card.select(wrong, 0, &driver).await, Ok(Transition::Incorrect));
        assert!(!card.state().answered());
        assert!(sink.events().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(card.pending_feedback().is_some_and(PendingFeedback::is_finished));
        assert_eq!(
            sink.events().last(),
            Some(&FeedbackEvent::OptionMarked {
                generation: 0,
                card: 4,
                option: wrong,
                mark: OptionMark::Incorrect
            })
        );

        assert_eq!(card.select(correct, 0, &driver).await, Ok(Transition::Correct));
        assert!(card.state().answered());
    }

    #[tokio::test]
    async fn test_out_of_range_option_is_rejected() {
        let question = Question::new("Q", vec!["a".to_string(), "b".to_string()], 0);
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());
        let mut rng = StdRng::seed_from_u64(1);
        let mut card = Card::new(0, shuffle_options(&question, &mut rng));

        assert_eq!(
            card.select(5, 0, &driver).await,
            Err(OptionOutOfRange {
                card: 0,
                option: 5,
                available: 2
            })
        );
        assert!(sink.events().is_empty());
    }
}
