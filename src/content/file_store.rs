use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{
    ProbeStatus, QuestionStore, SetAddress, TOPIC_CONFIG_FILE, is_safe_segment, topic_config_path,
};
use crate::error::ContentError;

/// Question bank laid out on the local file system.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, topic: &str, level: &str, file: &str) -> Result<PathBuf, ContentError> {
        if !is_safe_segment(topic) || !is_safe_segment(level) {
            return Err(ContentError::InvalidAddress(format!("{topic}/{level}")));
        }
        Ok(self.root.join(topic).join(level).join(file))
    }

    async fn read(path: &Path, resource: String) -> Result<String, ContentError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ContentError::NotFound(resource)),
            Err(e) => Err(ContentError::FileRead {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

#[async_trait]
impl QuestionStore for FileStore {
    #[tracing::instrument(skip(self), fields(content.root = %self.root.display()))]
    async fn probe(&self, address: &SetAddress) -> Result<ProbeStatus, ContentError> {
        let path = match self.resolve(&address.topic, &address.level, &address.file_name()) {
            Ok(path) => path,
            Err(_) => return Ok(ProbeStatus::NotFound),
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ProbeStatus::Found),
            Ok(_) => Ok(ProbeStatus::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProbeStatus::NotFound),
            Err(e) => Err(ContentError::FileRead {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    #[tracing::instrument(skip(self), fields(content.root = %self.root.display()))]
    async fn fetch(&self, address: &SetAddress) -> Result<String, ContentError> {
        let resource = address.resource_path();
        let path = self
            .resolve(&address.topic, &address.level, &address.file_name())
            .map_err(|_| ContentError::NotFound(resource.clone()))?;
        tracing::debug!(file.path = %path.display(), "Loading question set from file");
        Self::read(&path, resource).await
    }

    async fn fetch_topic_config(
        &self,
        topic: &str,
        level: &str,
    ) -> Result<Option<String>, ContentError> {
        let resource = topic_config_path(topic, level);
        let path = self.resolve(topic, level, TOPIC_CONFIG_FILE)?;
        match Self::read(&path, resource).await {
            Ok(content) => Ok(Some(content)),
            Err(ContentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_set(root: &Path, topic: &str, level: &str, set: u32, content: &str) {
        let dir = root.join(topic).join(level);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("set{set}.json")), content).unwrap();
    }

    #[tokio::test]
    async fn test_probe_and_fetch_existing_set() {
        let dir = tempfile::tempdir().unwrap();
        write_set(dir.path(), "tenses", "high", 1, "[]");
        let store = FileStore::new(dir.path());

        let address = SetAddress::new("tenses", "high", 1);
        assert_eq!(store.probe(&address).await.unwrap(), ProbeStatus::Found);
        assert_eq!(store.fetch(&address).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_missing_set_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let address = SetAddress::new("tenses", "high", 7);

        assert_eq!(store.probe(&address).await.unwrap(), ProbeStatus::NotFound);
        match store.fetch(&address).await {
            Err(ContentError::NotFound(resource)) => assert_eq!(resource, "tenses/high/set7.json"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_traversal_segments_never_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let address = SetAddress::new("..", "high", 1);

        assert_eq!(store.probe(&address).await.unwrap(), ProbeStatus::NotFound);
        assert!(matches!(
            store.fetch(&address).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_topic_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.fetch_topic_config("tenses", "high").await.unwrap().is_none());

        let config_dir = dir.path().join("tenses").join("high");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.json"), r#"{"headerTitle":"Tenses"}"#).unwrap();
        assert_eq!(
            store.fetch_topic_config("tenses", "high").await.unwrap().as_deref(),
            Some(r#"{"headerTitle":"Tenses"}"#)
        );
    }
}
