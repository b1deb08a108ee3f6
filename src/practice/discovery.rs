use serde::Serialize;

use crate::content::{ProbeStatus, QuestionStore, SetAddress};

/// Set numbers known to exist for a topic and level. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AvailableSets(Vec<u32>);

impl AvailableSets {
    /// Wraps discovered set numbers, falling back to set 1 when none were found.
    pub fn from_found(found: Vec<u32>) -> Self {
        if found.is_empty() {
            Self(vec![1])
        } else {
            Self(found)
        }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

/// Finds which numbered sets exist by probing 1, 2, 3, ... one at a time.
///
/// Probing stops at the first set that is missing, at the first probe that
/// errors or answers with an unexpected status, or after `limit` sets. A probe
/// answered with "method not allowed" is settled with a full fetch. Nothing
/// found still yields `[1]` so there is always a set to navigate to.
#[tracing::instrument(skip(store), fields(set.topic = %topic, set.level = %level))]
pub async fn discover_sets(
    store: &dyn QuestionStore,
    topic: &str,
    level: &str,
    limit: u32,
) -> AvailableSets {
    let mut found = Vec::new();
    let mut reached_limit = true;

    for set in 1..=limit {
        let address = SetAddress::new(topic, level, set);
        let exists = match store.probe(&address).await {
            Ok(ProbeStatus::Found) => true,
            Ok(ProbeStatus::NotFound) => false,
            Ok(ProbeStatus::MethodNotAllowed) => match store.fetch(&address).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(set.id = set, error = %e, "Fallback fetch did not find set");
                    false
                }
            },
            Ok(ProbeStatus::Failed(status)) => {
                tracing::debug!(set.id = set, probe.status = status, "Probe answered with failure");
                false
            }
            Err(e) => {
                tracing::debug!(set.id = set, error = %e, "Probe failed, ending discovery");
                false
            }
        };

        if !exists {
            reached_limit = false;
            break;
        }
        found.push(set);
    }

    if reached_limit && limit > 0 {
        tracing::warn!(
            discovery.limit = limit,
            "Discovery reached its limit; later sets were not checked"
        );
    }

    let sets = AvailableSets::from_found(found);
    tracing::info!(sets.count = sets.as_slice().len(), "Set discovery finished");
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::testing::MemoryStore;

    #[tokio::test]
    async fn test_discovery_stops_at_first_gap() {
        let store = MemoryStore::with_sets(
            "tenses",
            "high",
            &[(1, "[]"), (2, "[]"), (3, "[]"), (5, "[]")],
        );
        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_no_sets_falls_back_to_one() {
        let store = MemoryStore::default();
        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_method_not_allowed_falls_back_to_fetch() {
        let mut store = MemoryStore::with_sets("tenses", "high", &[(1, "[]"), (2, "[]")]);
        store.method_not_allowed = true;

        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1, 2]);
        assert_eq!(
            store.fetched(),
            vec![
                "tenses/high/set1.json",
                "tenses/high/set2.json",
                "tenses/high/set3.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_probe_error_ends_discovery() {
        let mut store = MemoryStore::with_sets("tenses", "high", &[(1, "[]"), (2, "[]"), (3, "[]")]);
        store.failing_probe_at = Some(2);

        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1]);

        store.failing_probe_at = Some(1);
        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_failure_status_ends_discovery() {
        let mut store = MemoryStore::with_sets("tenses", "high", &[(1, "[]"), (2, "[]"), (3, "[]")]);
        store.failed_status_at = Some(2);

        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1]);
        assert!(store.fetched().is_empty());

        store.failed_status_at = Some(1);
        let sets = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(sets.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_discovery_never_checks_past_the_limit() {
        let store = MemoryStore::with_sets("tenses", "high", &[(1, "[]"), (2, "[]")]);
        let sets = discover_sets(&store, "tenses", "high", 3).await;
        assert_eq!(sets.as_slice(), &[1, 2]);
        assert_eq!(store.checked(), vec![1, 2, 3]);

        let store = MemoryStore::with_sets("tenses", "high", &[(1, "[]"), (2, "[]"), (3, "[]")]);
        let sets = discover_sets(&store, "tenses", "high", 3).await;
        assert_eq!(sets.as_slice(), &[1, 2, 3]);
        assert_eq!(store.checked(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_safety_limit_bounds_discovery() {
        let sets: Vec<(u32, &str)> = (1..=60).map(|i| (i, "[]")).collect();
        let store = MemoryStore::with_sets("tenses", "high", &sets);

        let found = discover_sets(&store, "tenses", "high", 50).await;
        assert_eq!(found.as_slice().len(), 50);
        assert_eq!(found.as_slice().last(), Some(&50));
    }
}
