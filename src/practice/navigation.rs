use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::content::SetAddress;

pub const DEFAULT_SUBJECT: &str = "tenses";
pub const DEFAULT_LEVEL: &str = "high";
pub const DEFAULT_SET: u32 = 1;

/// The `subject`, `level` and `set` query parameters of a practice page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PageParams {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
}

impl PageParams {
    pub fn new(subject: &str, level: &str, set: u32) -> Self {
        Self {
            subject: Some(subject.to_string()),
            level: Some(level.to_string()),
            set: Some(set.to_string()),
        }
    }

    pub fn topic(&self) -> &str {
        non_empty(self.subject.as_deref()).unwrap_or(DEFAULT_SUBJECT)
    }

    pub fn level(&self) -> &str {
        non_empty(self.level.as_deref()).unwrap_or(DEFAULT_LEVEL)
    }

    /// The requested set number. Anything that is not a positive integer
    /// selects the first set.
    pub fn selected_set(&self) -> u32 {
        match non_empty(self.set.as_deref()).map(|s| s.trim().parse::<u32>()) {
            Some(Ok(set)) if set > 0 => set,
            Some(_) => {
                tracing::warn!(set.requested = ?self.set, "Invalid set parameter, using set 1");
                DEFAULT_SET
            }
            None => DEFAULT_SET,
        }
    }

    pub fn address(&self) -> SetAddress {
        SetAddress::new(self.topic(), self.level(), self.selected_set())
    }

    /// Query string of the page showing `set` for the same topic and level.
    pub fn navigation_query(&self, set: u32) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("subject", self.topic())
            .append_pair("level", self.level())
            .append_pair("set", &set.to_string())
            .finish();
        format!("?{query}")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
