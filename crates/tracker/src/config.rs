//! Connection settings for the tracking system.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Instance URL, e.g. `https://yourcompany.atlassian.net`
    pub base_url: String,

    /// Account email used for basic auth
    pub email: String,

    /// API token used for basic auth
    #[serde(default)]
    pub api_token: String,

    /// Board used when a request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_board_id: Option<u64>,

    /// Project that approved drafts are published into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project_key: Option<String>,
}

impl TrackerConfig {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            api_token: api_token.into(),
            default_board_id: None,
            default_project_key: None,
        }
    }

    pub fn with_default_board(mut self, board_id: u64) -> Self {
        self.default_board_id = Some(board_id);
        self
    }

    pub fn with_default_project(mut self, project_key: impl Into<String>) -> Self {
        self.default_project_key = Some(project_key.into());
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080", "", "")
    }
}

// Keep the token out of logs.
impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &if self.api_token.is_empty() { "" } else { "***" })
            .field("default_board_id", &self.default_board_id)
            .field("default_project_key", &self.default_project_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let config = TrackerConfig::new("https://x.atlassian.net", "a@b.c", "very-secret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("***"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = TrackerConfig::new("https://x", "e", "t")
            .with_default_board(7)
            .with_default_project("PROJ");
        assert_eq!(config.default_board_id, Some(7));
        assert_eq!(config.default_project_key.as_deref(), Some("PROJ"));
    }
}
