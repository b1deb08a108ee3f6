use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::{PracticeConfig, PrefetchMode};
use crate::content::{Question, QuestionSetParser, QuestionStore, SetAddress};
use crate::error::ContentError;

const PREFETCH_CACHE_CAPACITY: usize = 16;

/// How a prefetch is scheduled relative to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchSchedule {
    /// Yield to already queued work first, then fetch.
    Idle,
    /// Wait a fixed time before fetching.
    Deferred(Duration),
}

impl PrefetchSchedule {
    pub fn from_config(config: &PracticeConfig) -> Self {
        match config.prefetch {
            PrefetchMode::Idle => PrefetchSchedule::Idle,
            PrefetchMode::Deferred => PrefetchSchedule::Deferred(config.prefetch_delay()),
        }
    }
}

#[derive(Debug, Default)]
struct PrefetchCache {
    entries: HashMap<SetAddress, Arc<Vec<Question>>>,
    order: VecDeque<SetAddress>,
}

impl PrefetchCache {
    fn insert(&mut self, address: SetAddress, questions: Arc<Vec<Question>>) {
        if self.entries.insert(address.clone(), questions).is_none() {
            self.order.push_back(address);
        }
        while self.order.len() > PREFETCH_CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn take(&mut self, address: &SetAddress) -> Option<Arc<Vec<Question>>> {
        let questions = self.entries.remove(address)?;
        self.order.retain(|a| a != address);
        Some(questions)
    }
}

/// Loads question sets from a store. Sets fetched ahead of time by
/// [`QuestionLoader::prefetch_next`] are served from memory once.
#[derive(Debug, Clone)]
pub struct QuestionLoader {
    store: Arc<dyn QuestionStore>,
    prefetched: Arc<RwLock<PrefetchCache>>,
    schedule: PrefetchSchedule,
}

impl QuestionLoader {
    pub fn new(store: Arc<dyn QuestionStore>, schedule: PrefetchSchedule) -> Self {
        Self {
            store,
            prefetched: Arc::new(RwLock::new(PrefetchCache::default())),
            schedule,
        }
    }

    pub fn store(&self) -> &Arc<dyn QuestionStore> {
        &self.store
    }

    #[tracing::instrument(skip(self), fields(set.resource = %address))]
    pub async fn load(&self, address: &SetAddress) -> Result<Arc<Vec<Question>>, ContentError> {
        if let Some(questions) = self.prefetched.write().await.take(address) {
            tracing::debug!(questions.count = questions.len(), "Serving prefetched set");
            return Ok(questions);
        }

        let raw = self.store.fetch(address).await?;
        let questions = QuestionSetParser::parse(&address.resource_path(), &raw)?;
        tracing::info!(questions.count = questions.len(), "Loaded question set");
        Ok(Arc::new(questions))
    }

    /// Starts fetching the set after `current` in the background. Never
    /// blocks the caller and never reports failure; the handle is only
    /// useful to tests.
    pub fn prefetch_next(&self, current: &SetAddress) -> Option<JoinHandle<()>> {
        let next = current.next()?;
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.prefetched);
        let schedule = self.schedule;

        Some(tokio::spawn(async move {
            match schedule {
                PrefetchSchedule::Idle => tokio::task::yield_now().await,
                PrefetchSchedule::Deferred(delay) => tokio::time::sleep(delay).await,
            }

            let result = match store.fetch(&next).await {
                Ok(raw) => QuestionSetParser::parse(&next.resource_path(), &raw),
                Err(e) => Err(e),
            };

            match result {
                Ok(questions) => {
                    tracing::debug!(
                        set.resource = %next,
                        questions.count = questions.len(),
                        "Prefetched next set"
                    );
                    cache.write().await.insert(next, Arc::new(questions));
                }
                Err(e) => {
                    tracing::trace!(set.resource = %next, error = %e, "Prefetch skipped");
                }
            }
        }))
    }
}
