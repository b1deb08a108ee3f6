use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{ContentConfig, ContentSourceType};
use crate::error::{ConfigError, ContentError};

pub mod file_store;
pub mod http_store;
pub mod topic_config;

pub use file_store::FileStore;
pub use http_store::HttpStore;
pub use topic_config::{HeaderInfo, StoreConfigResolver, TopicConfig, TopicConfigResolver};

/// One multiple-choice question as stored in a set file.
///
/// On disk the fields are `q`, `options` and `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "q")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "answer")]
    pub answer_index: usize,
}

impl Question {
    pub fn new(prompt: impl Into<String>, options: Vec<String>, answer_index: usize) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            answer_index,
        }
    }

    pub fn correct_text(&self) -> Option<&str> {
        self.options.get(self.answer_index).map(String::as_str)
    }
}

/// Identifies one numbered set for a topic and level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SetAddress {
    pub topic: String,
    pub level: String,
    pub set: u32,
}

impl SetAddress {
    pub fn new(topic: impl Into<String>, level: impl Into<String>, set: u32) -> Self {
        Self {
            topic: topic.into(),
            level: level.into(),
            set,
        }
    }

    /// File name of the set inside its topic/level directory.
    pub fn file_name(&self) -> String {
        format!("set{}.json", self.set)
    }

    /// Path of the set below the store root, e.g. `tenses/high/set3.json`.
    pub fn resource_path(&self) -> String {
        format!("{}/{}/{}", self.topic, self.level, self.file_name())
    }

    /// The following set, if the number does not overflow.
    pub fn next(&self) -> Option<Self> {
        self.set.checked_add(1).map(|set| Self {
            topic: self.topic.clone(),
            level: self.level.clone(),
            set,
        })
    }
}

impl fmt::Display for SetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_path())
    }
}

pub const TOPIC_CONFIG_FILE: &str = "config.json";

/// Path of the optional per-topic/level configuration resource.
pub fn topic_config_path(topic: &str, level: &str) -> String {
    format!("{topic}/{level}/{TOPIC_CONFIG_FILE}")
}

/// Result of a lightweight existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Found,
    NotFound,
    /// The store cannot answer existence checks; a full fetch is needed.
    MethodNotAllowed,
    Failed(u16),
}

#[async_trait]
pub trait QuestionStore: Send + Sync + fmt::Debug {
    async fn probe(&self, address: &SetAddress) -> Result<ProbeStatus, ContentError>;

    /// Raw JSON of a set. Missing sets and non-success responses are errors.
    async fn fetch(&self, address: &SetAddress) -> Result<String, ContentError>;

    /// Raw JSON of the topic/level configuration, `None` when there is none.
    async fn fetch_topic_config(
        &self,
        topic: &str,
        level: &str,
    ) -> Result<Option<String>, ContentError>;
}

pub fn store_from_config(config: &ContentConfig) -> Result<Arc<dyn QuestionStore>, ConfigError> {
    match config.source_type {
        ContentSourceType::File => {
            let root = config.file_root.as_ref().ok_or_else(|| {
                ConfigError::Missing("File root required for file source".to_string())
            })?;
            tracing::info!(content.root = %root, "Using file question store");
            Ok(Arc::new(FileStore::new(root)))
        }
        ContentSourceType::Http => {
            let base = config.http_base_url.as_ref().ok_or_else(|| {
                ConfigError::Missing("HTTP base URL required for http source".to_string())
            })?;
            tracing::info!(content.base_url = %base, "Using HTTP question store");
            let store = HttpStore::new(base)
                .map_err(|e| ConfigError::InvalidValue(format!("content.http_base_url: {e}")))?;
            Ok(Arc::new(store))
        }
    }
}

pub struct QuestionSetParser;

impl QuestionSetParser {
    /// Parse a set file and check every answer index against its options.
    #[tracing::instrument(skip(content), fields(content.length = content.len()))]
    pub fn parse(resource: &str, content: &str) -> Result<Vec<Question>, ContentError> {
        let questions: Vec<Question> =
            serde_json::from_str(content).map_err(|e| ContentError::Parse {
                resource: resource.to_string(),
                message: e.to_string(),
            })?;

        for (index, question) in questions.iter().enumerate() {
            if question.answer_index >= question.options.len() {
                return Err(ContentError::InvalidQuestion {
                    resource: resource.to_string(),
                    position: index + 1,
                    reason: format!(
                        "answer index {} is out of range for {} options",
                        question.answer_index,
                        question.options.len()
                    ),
                });
            }
        }

        tracing::debug!(questions.count = questions.len(), "Parsed question set");
        Ok(questions)
    }
}

/// A topic or level must be a single plain path segment made of ASCII
/// letters, digits, `-`, `_` and `.`.
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_set() {
        let content = r#"[
  { "q": "I ___ to school every day.", "options": ["go", "goes", "going", "went"], "answer": 0 },
  { "q": "She ____ a book now.", "options": ["reads", "is reading", "read", "has read"], "answer": 1 }
]"#;

        let questions = QuestionSetParser::parse("tenses/high/set1.json", content).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].prompt, "I ___ to school every day.");
        assert_eq!(questions[0].correct_text(), Some("go"));
        assert_eq!(questions[1].correct_text(), Some("is reading"));
    }

    #[test]
    fn test_parse_rejects_out_of_range_answer() {
        let content = r#"[
  { "q": "ok", "options": ["a", "b"], "answer": 1 },
  { "q": "broken", "options": ["a", "b"], "answer": 2 }
]"#;

        let err = QuestionSetParser::parse("t/l/set1.json", content).unwrap_err();
        match err {
            ContentError::InvalidQuestion { position, .. } => assert_eq!(position, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reports_resource_on_malformed_json() {
        let err = QuestionSetParser::parse("t/l/set9.json", "{ not json").unwrap_err();
        assert!(err.to_string().contains("t/l/set9.json"));
    }

    #[test]
    fn test_set_address_paths() {
        let address = SetAddress::new("present-tense", "high", 3);
        assert_eq!(address.resource_path(), "present-tense/high/set3.json");
        assert_eq!(address.next().map(|a| a.set), Some(4));
        assert!(SetAddress::new("t", "l", u32::MAX).next().is_none());
    }

    #[test]
    fn test_safe_segment() {
        assert!(is_safe_segment("tenses"));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment(""));
    }

    #[test]
    fn test_url_syntax_is_not_a_safe_segment() {
        assert!(is_safe_segment("present-perfect"));
        assert!(is_safe_segment("b1_2.v2"));
        for segment in ["https:", "%2e%2e", "a#", "a?b", "a b", "a\\b", "café"] {
            assert!(!is_safe_segment(segment), "{segment} should be rejected");
        }
    }
}
