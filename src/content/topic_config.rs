use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::QuestionStore;

/// Optional per-topic/level overrides for the page header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConfig {
    pub header_title: Option<String>,
    pub header_subtitle_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    pub title: String,
    pub subtitle: String,
}

impl TopicConfig {
    pub fn header(&self, topic: &str, level: &str, set: u32, default_prefix: &str) -> HeaderInfo {
        // Blank overrides count as absent.
        let title = self
            .header_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map_or_else(|| topic.replace('-', " "), str::to_string);
        let prefix = self
            .header_subtitle_prefix
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(default_prefix);
        HeaderInfo {
            title,
            subtitle: format!("{} • {} • SET {}", prefix, level.to_uppercase(), set),
        }
    }
}

/// Supplies the configuration for a topic and level. Never fails: anything
/// missing or unreadable resolves to the defaults.
#[async_trait]
pub trait TopicConfigResolver: Send + Sync {
    async fn resolve(&self, topic: &str, level: &str) -> TopicConfig;
}

/// Reads `<topic>/<level>/config.json` from the question store.
#[derive(Debug, Clone)]
pub struct StoreConfigResolver {
    store: Arc<dyn QuestionStore>,
}

impl StoreConfigResolver {
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TopicConfigResolver for StoreConfigResolver {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, topic: &str, level: &str) -> TopicConfig {
        match self.store.fetch_topic_config(topic, level).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Topic config is malformed, using defaults");
                TopicConfig::default()
            }),
            Ok(None) => {
                tracing::debug!("Config not found, using defaults");
                TopicConfig::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Topic config unavailable, using defaults");
                TopicConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::testing::MemoryStore;

    #[test]
    fn test_default_header_uses_topic_and_level() {
        let header = TopicConfig::default().header("present-perfect", "high", 2, "MCQ Practice");
        assert_eq!(header.title, "present perfect");
        assert_eq!(header.subtitle, "MCQ Practice • HIGH • SET 2");
    }

    #[test]
    fn test_blank_overrides_fall_back_to_defaults() {
        let config = TopicConfig {
            header_title: Some(String::new()),
            header_subtitle_prefix: Some("   ".to_string()),
        };
        let header = config.header("present-perfect", "high", 3, "MCQ Practice");
        assert_eq!(header.title, "present perfect");
        assert_eq!(header.subtitle, "MCQ Practice • HIGH • SET 3");
    }

    #[tokio::test]
    async fn test_resolver_applies_overrides() {
        let mut store = MemoryStore::default();
        store.configs.insert(
            "tenses/high/config.json".to_string(),
            r#"{"headerTitle":"Tense Drill","headerSubtitlePrefix":"Grade 10"}"#.to_string(),
        );
        let resolver = StoreConfigResolver::new(Arc::new(store));

        let config = resolver.resolve("tenses", "high").await;
        let header = config.header("tenses", "high", 1, "unused");
        assert_eq!(header.title, "Tense Drill");
        assert_eq!(header.subtitle, "Grade 10 • HIGH • SET 1");
    }

    #[tokio::test]
    async fn test_resolver_falls_back_on_missing_or_malformed_config() {
        let mut store = MemoryStore::default();
        store
            .configs
            .insert("broken/high/config.json".to_string(), "{ nope".to_string());
        let resolver = StoreConfigResolver::new(Arc::new(store));

        assert_eq!(resolver.resolve("tenses", "high").await, TopicConfig::default());
        assert_eq!(resolver.resolve("broken", "high").await, TopicConfig::default());
    }
}
