use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use super::{
    ProbeStatus, QuestionStore, SetAddress, TOPIC_CONFIG_FILE, is_safe_segment, topic_config_path,
};
use crate::error::ContentError;

/// Question bank served over HTTP below a base URL.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Appends `topic/level/file` to the base path one encoded segment at a
    /// time, so the result always stays below the base URL.
    fn url_for(&self, topic: &str, level: &str, file: &str) -> Result<Url, ContentError> {
        if !is_safe_segment(topic) || !is_safe_segment(level) {
            return Err(ContentError::InvalidAddress(format!("{topic}/{level}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ContentError::InvalidAddress(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([topic, level, file]);
        Ok(url)
    }

    async fn get_text(&self, url: Url, resource: String) -> Result<String, ContentError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ContentError::Http {
                resource: resource.clone(),
                source: e,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentError::NotFound(resource));
        }
        if !status.is_success() {
            return Err(ContentError::HttpStatus {
                resource,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| ContentError::Http { resource, source: e })
    }
}

#[async_trait]
impl QuestionStore for HttpStore {
    #[tracing::instrument(skip(self), fields(content.base_url = %self.base_url))]
    async fn probe(&self, address: &SetAddress) -> Result<ProbeStatus, ContentError> {
        let resource = address.resource_path();
        let url = match self.url_for(&address.topic, &address.level, &address.file_name()) {
            Ok(url) => url,
            Err(_) => return Ok(ProbeStatus::NotFound),
        };

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ContentError::Http {
                resource,
                source: e,
            })?;

        let status = response.status();
        tracing::trace!(probe.status = status.as_u16(), "Existence probe answered");
        Ok(match status {
            StatusCode::NOT_FOUND => ProbeStatus::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => ProbeStatus::MethodNotAllowed,
            s if s.is_success() => ProbeStatus::Found,
            s => ProbeStatus::Failed(s.as_u16()),
        })
    }

    #[tracing::instrument(skip(self), fields(content.base_url = %self.base_url))]
    async fn fetch(&self, address: &SetAddress) -> Result<String, ContentError> {
        let resource = address.resource_path();
        let url = self
            .url_for(&address.topic, &address.level, &address.file_name())
            .map_err(|_| ContentError::NotFound(resource.clone()))?;
        tracing::debug!(http.url = %url, "Fetching question set");
        self.get_text(url, resource).await
    }

    async fn fetch_topic_config(
        &self,
        topic: &str,
        level: &str,
    ) -> Result<Option<String>, ContentError> {
        let resource = topic_config_path(topic, level);
        let url = self.url_for(topic, level, TOPIC_CONFIG_FILE)?;
        match self.get_text(url, resource).await {
            Ok(content) => Ok(Some(content)),
            Err(ContentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::{Method, StatusCode as AxumStatus};
    use axum::routing::any;
    use std::net::SocketAddr;

    /// Serves sets 1 and 2 for `tenses/high`; HEAD is refused with 405 when
    /// `refuse_head` is set.
    async fn spawn_bank(refuse_head: bool) -> SocketAddr {
        let app = Router::new().route(
            "/{topic}/{level}/{file}",
            any(
                move |method: Method, Path((topic, level, file)): Path<(String, String, String)>| async move {
                    if refuse_head && method == Method::HEAD {
                        return (AxumStatus::METHOD_NOT_ALLOWED, String::new());
                    }
                    let known = topic == "tenses"
                        && level == "high"
                        && (file == "set1.json" || file == "set2.json");
                    if known {
                        (AxumStatus::OK, r#"[{"q":"x","options":["a","b"],"answer":1}]"#.to_string())
                    } else {
                        (AxumStatus::NOT_FOUND, String::new())
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_head_probe_maps_statuses() {
        let addr = spawn_bank(false).await;
        let store = HttpStore::new(&format!("http://{addr}")).unwrap();

        assert_eq!(
            store.probe(&SetAddress::new("tenses", "high", 2)).await.unwrap(),
            ProbeStatus::Found
        );
        assert_eq!(
            store.probe(&SetAddress::new("tenses", "high", 3)).await.unwrap(),
            ProbeStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_refused_head_reports_method_not_allowed() {
        let addr = spawn_bank(true).await;
        let store = HttpStore::new(&format!("http://{addr}/")).unwrap();
        let address = SetAddress::new("tenses", "high", 1);

        assert_eq!(
            store.probe(&address).await.unwrap(),
            ProbeStatus::MethodNotAllowed
        );
        assert!(store.fetch(&address).await.unwrap().contains("options"));
    }

    #[tokio::test]
    async fn test_fetch_missing_set_is_not_found() {
        let addr = spawn_bank(false).await;
        let store = HttpStore::new(&format!("http://{addr}")).unwrap();

        match store.fetch(&SetAddress::new("tenses", "high", 9)).await {
            Err(ContentError::NotFound(resource)) => {
                assert_eq!(resource, "tenses/high/set9.json")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(store.fetch_topic_config("tenses", "high").await.unwrap().is_none());
    }

    #[test]
    fn test_urls_stay_below_base() {
        let store = HttpStore::new("https://bank.example/data").unwrap();
        let url = store.url_for("present-perfect", "high", "set1.json").unwrap();
        assert_eq!(url.as_str(), "https://bank.example/data/present-perfect/high/set1.json");

        let store = HttpStore::new("https://bank.example/data/").unwrap();
        let url = store.url_for("tenses", "b1", "config.json").unwrap();
        assert_eq!(url.as_str(), "https://bank.example/data/tenses/b1/config.json");

        for topic in ["https:", "%2e%2e", "a#", "//evil.example", ".."] {
            assert!(
                matches!(
                    store.url_for(topic, "evil.example", "set1.json"),
                    Err(ContentError::InvalidAddress(_))
                ),
                "{topic} should be refused"
            );
        }
    }

    #[tokio::test]
    async fn test_url_syntax_in_topic_never_leaves_the_bank() {
        let store = HttpStore::new("http://bank.invalid/data/").unwrap();
        let address = SetAddress::new("https:", "evil.example", 1);

        assert_eq!(store.probe(&address).await.unwrap(), ProbeStatus::NotFound);
        assert!(matches!(
            store.fetch(&address).await,
            Err(ContentError::NotFound(_))
        ));
        assert!(matches!(
            store.fetch_topic_config("a#", "high").await,
            Err(ContentError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_probe_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = HttpStore::new(&format!("http://{addr}")).unwrap();
        assert!(store.probe(&SetAddress::new("tenses", "high", 1)).await.is_err());
    }
}
