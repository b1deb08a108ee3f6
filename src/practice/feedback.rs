use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionMark {
    Correct,
    /// Shown with an attention-drawing animation.
    Incorrect,
}

/// Effects the page plays in response to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum FeedbackEvent {
    SuccessCue,
    FailureCue,
    Celebrate,
    OptionMarked {
        generation: u64,
        card: usize,
        option: usize,
        mark: OptionMark,
    },
}

/// Per-session switches for the sound and celebration effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSettings {
    pub sound: bool,
    pub confetti: bool,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            sound: true,
            confetti: true,
        }
    }
}

/// Receives feedback effects. The session forwards them to its clients.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn emit(&self, event: FeedbackEvent);
}

/// Counter identifying the current render. Work scheduled against an older
/// render checks it before touching the page.
#[derive(Debug, Clone, Default)]
pub struct RenderGeneration(Arc<AtomicU64>);

impl RenderGeneration {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// A delayed feedback task. It can be cancelled, though nothing needs to:
/// once the card's render is gone the task finds its generation stale and
/// does nothing.
#[derive(Debug)]
pub struct PendingFeedback {
    handle: JoinHandle<()>,
}

impl PendingFeedback {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Turns card transitions into feedback events, honouring the session's
/// settings and the render generation.
#[derive(Clone)]
pub struct FeedbackDriver {
    sink: Arc<dyn FeedbackSink>,
    settings: Arc<RwLock<FeedbackSettings>>,
    generation: RenderGeneration,
    wrong_delay: Duration,
}

impl FeedbackDriver {
    pub fn new(
        sink: Arc<dyn FeedbackSink>,
        settings: Arc<RwLock<FeedbackSettings>>,
        generation: RenderGeneration,
        wrong_delay: Duration,
    ) -> Self {
        Self {
            sink,
            settings,
            generation,
            wrong_delay,
        }
    }

    pub fn generation(&self) -> &RenderGeneration {
        &self.generation
    }

    /// Plays the correct-answer effects right away.
    pub async fn correct(&self, generation: u64, card: usize, option: usize) {
        let settings = *self.settings.read().await;
        if settings.sound {
            self.sink.emit(FeedbackEvent::SuccessCue).await;
        }
        if settings.confetti {
            self.sink.emit(FeedbackEvent::Celebrate).await;
        }
        self.sink
            .emit(FeedbackEvent::OptionMarked {
                generation,
                card,
                option,
                mark: OptionMark::Correct,
            })
            .await;
    }

    /// Schedules the wrong-answer effects after the configured delay.
    pub fn incorrect(&self, generation: u64, card: usize, option: usize) -> PendingFeedback {
        let driver = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(driver.wrong_delay).await;

            if !driver.generation.is_current(generation) {
                tracing::trace!(
                    render.generation = generation,
                    card.index = card,
                    "Dropping wrong-answer feedback for a replaced render"
                );
                return;
            }

            let settings = *driver.settings.read().await;
            if settings.sound {
                driver.sink.emit(FeedbackEvent::FailureCue).await;
            }
            driver
                .sink
                .emit(FeedbackEvent::OptionMarked {
                    generation,
                    card,
                    option,
                    mark: OptionMark::Incorrect,
                })
                .await;
        });
        PendingFeedback { handle }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, driver_with};
    use super::*;

    #[tokio::test]
    async fn test_correct_feedback_is_immediate() {
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());

        driver.correct(0, 2, 1).await;
        assert_eq!(
            sink.events(),
            vec![
                FeedbackEvent::SuccessCue,
                FeedbackEvent::Celebrate,
                FeedbackEvent::OptionMarked {
                    generation: 0,
                    card: 2,
                    option: 1,
                    mark: OptionMark::Correct
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_effects_are_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(
            sink.clone(),
            FeedbackSettings {
                sound: false,
                confetti: false,
            },
        );

        driver.correct(0, 0, 0).await;
        assert_eq!(sink.events().len(), 1);
        assert!(matches!(
            sink.events()[0],
            FeedbackEvent::OptionMarked {
                mark: OptionMark::Correct,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incorrect_feedback_waits_for_delay() {
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());

        let pending = driver.incorrect(0, 1, 3);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.events().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(pending.is_finished());
        assert_eq!(
            sink.events(),
            vec![
                FeedbackEvent::FailureCue,
                FeedbackEvent::OptionMarked {
                    generation: 0,
                    card: 1,
                    option: 3,
                    mark: OptionMark::Incorrect
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_incorrect_feedback_is_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());

        let _pending = driver.incorrect(0, 0, 1);
        driver.generation().advance();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_feedback_never_fires() {
        let sink = Arc::new(RecordingSink::default());
        let (driver, _) = driver_with(sink.clone(), FeedbackSettings::default());

        let pending = driver.incorrect(0, 0, 1);
        pending.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_generation_advances() {
        let generation = RenderGeneration::default();
        assert_eq!(generation.current(), 0);
        assert_eq!(generation.advance(), 1);
        assert!(generation.is_current(1));
        assert!(!generation.is_current(0));
    }
}
