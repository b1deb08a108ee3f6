use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use crate::content::Question;
use crate::practice::card::Card;
use crate::practice::feedback::RenderGeneration;
use crate::practice::shuffle::shuffle_options;
use crate::practice::utils::{normalize_blanks, option_letter};

pub const NO_QUESTIONS_MESSAGE: &str = "No questions found.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedOption {
    pub letter: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedCard {
    /// Position in the displayed list, used to address selections.
    pub index: usize,
    /// 1-based number shown to the user.
    pub number: usize,
    pub prompt: String,
    pub options: Vec<RenderedOption>,
    pub answered: bool,
    /// When the card's entrance animation starts.
    pub reveal_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum ViewBody {
    Cards { cards: Vec<RenderedCard> },
    NoQuestions { message: String },
    LoadFailed { resource: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedView {
    pub generation: u64,
    pub body: ViewBody,
}

impl RenderedView {
    pub fn card_count(&self) -> usize {
        match &self.body {
            ViewBody::Cards { cards } => cards.len(),
            _ => 0,
        }
    }

    /// Keeps the stored view in step with a card answered after rendering,
    /// so late joiners see it.
    pub fn mark_answered(&mut self, index: usize) {
        if let ViewBody::Cards { cards } = &mut self.body {
            if let Some(card) = cards.get_mut(index) {
                card.answered = true;
            }
        }
    }
}

/// Why the set could not be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub resource: String,
    pub message: String,
}

/// Rebuilds the whole view whenever the displayed questions change. Every
/// render gets a fresh generation and fresh option shuffles.
#[derive(Debug, Clone)]
pub struct RenderOrchestrator {
    generation: RenderGeneration,
    stagger: Duration,
}

impl RenderOrchestrator {
    pub fn new(generation: RenderGeneration, stagger: Duration) -> Self {
        Self {
            generation,
            stagger,
        }
    }

    pub fn generation(&self) -> &RenderGeneration {
        &self.generation
    }

    pub fn render<R: Rng + ?Sized>(
        &self,
        displayed: &[Question],
        rng: &mut R,
    ) -> (RenderedView, Vec<Card>) {
        let generation = self.generation.advance();

        if displayed.is_empty() {
            tracing::debug!(render.generation = generation, "Rendering empty placeholder");
            let view = RenderedView {
                generation,
                body: ViewBody::NoQuestions {
                    message: NO_QUESTIONS_MESSAGE.to_string(),
                },
            };
            return (view, Vec::new());
        }

        let stagger_ms = self.stagger.as_millis() as u64;
        let mut cards = Vec::with_capacity(displayed.len());
        let mut rendered = Vec::with_capacity(displayed.len());

        for (index, question) in displayed.iter().enumerate() {
            let presentation = shuffle_options(question, rng);
            rendered.push(RenderedCard {
                index,
                number: index + 1,
                prompt: normalize_blanks(&question.prompt),
                options: presentation
                    .options
                    .iter()
                    .enumerate()
                    .map(|(position, option)| RenderedOption {
                        letter: option_letter(position),
                        text: option.text.clone(),
                    })
                    .collect(),
                answered: false,
                reveal_delay_ms: index as u64 * stagger_ms,
            });
            cards.push(Card::new(index, presentation));
        }

        tracing::debug!(
            render.generation = generation,
            cards.count = cards.len(),
            "Rendered question cards"
        );

        let view = RenderedView {
            generation,
            body: ViewBody::Cards { cards: rendered },
        };
        (view, cards)
    }

    pub fn render_failure(&self, failure: &LoadFailure) -> RenderedView {
        let generation = self.generation.advance();
        tracing::debug!(
            render.generation = generation,
            set.resource = %failure.resource,
            "Rendering load failure"
        );
        RenderedView {
            generation,
            body: ViewBody::LoadFailed {
                resource: failure.resource.clone(),
                message: format!("Failed to load: {}\n{}", failure.resource, failure.message),
            },
        }
    }
}
