//! Configuration for SprintMind.
//!
//! Values come from an optional TOML file, then from environment variables
//! (the binary loads `.env` through `dotenvy` first). Environment values win.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing tokens
//! - Warns about tokens stored in config files

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sprintmind_knowledge::KnowledgeConfig;
use sprintmind_llm::LlmConfig;
use sprintmind_tracker::TrackerConfig;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SprintMindConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Chat platform and bridge settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Bot token for `chat.postMessage` and `auth.test`
    #[serde(default)]
    pub bot_token: String,

    #[serde(default = "default_chat_api")]
    pub api_base_url: String,

    /// Remote orchestration runtime. Unset means the in-process runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_url: Option<String>,

    /// Bearer key the remote runtime expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_api_key: Option<String>,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// How long a user's bridge session is reused after their last message
    #[serde(default = "default_bridge_ttl")]
    pub session_ttl_secs: u64,
}

fn default_chat_api() -> String {
    "https://slack.com/api".into()
}

fn default_app_name() -> String {
    "sprintmind".into()
}

fn default_bridge_ttl() -> u64 {
    1800
}

impl ChatConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: default_chat_api(),
            runtime_url: None,
            runtime_api_key: None,
            app_name: default_app_name(),
            session_ttl_secs: default_bridge_ttl(),
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_base_url", &self.api_base_url)
            .field("runtime_url", &self.runtime_url)
            .field("runtime_api_key", &self.runtime_api_key.as_deref().map(redact))
            .field("app_name", &self.app_name)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}

/// Orchestrator session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session expires
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_session_ttl() -> u64 {
    3600
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Bearer key for the runtime and approval routes. Unset disables auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            api_key: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("api_key", &self.api_key.as_deref().map(redact))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

impl SprintMindConfig {
    /// Load from an optional file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Configuration from environment variables only.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(None)
    }

    /// Load configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file, must not be world-writable,
    /// and must not be world-readable when it holds a token.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if !config.tracker.api_token.is_empty()
            || config.llm.api_key.is_some()
            || !config.chat.bot_token.is_empty()
        {
            warn!(
                "Credentials found in config file '{}'. Prefer environment variables \
                 (JIRA_API_TOKEN, OPENAI_API_KEY, SLACK_BOT_TOKEN).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Overlay variables from `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("JIRA_URL") {
            self.tracker.base_url = v;
        }
        if let Some(v) = var("JIRA_USER") {
            self.tracker.email = v;
        }
        if let Some(v) = var("JIRA_API_TOKEN") {
            self.tracker.api_token = v;
        }
        if let Some(v) = var("JIRA_BOARD_ID") {
            let id = v
                .trim()
                .parse()
                .with_context(|| format!("JIRA_BOARD_ID must be a number, got '{}'", v))?;
            self.tracker.default_board_id = Some(id);
        }
        if let Some(v) = var("JIRA_PROJECT_KEY") {
            self.tracker.default_project_key = Some(v);
        }

        if let Some(v) = var("LLM_MODEL") {
            self.llm.model = v;
            // A model without a provider means the OpenAI-compatible client.
            if !self.llm.is_enabled() {
                self.llm.provider = "openai".into();
            }
        }
        if let Some(v) = var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = var("LLM_API_URL") {
            self.llm.api_url = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }

        if let Some(v) = var("SLACK_BOT_TOKEN") {
            self.chat.bot_token = v;
        }
        if let Some(v) = var("SLACK_API_URL") {
            self.chat.api_base_url = v;
        }
        if let Some(v) = var("SPRINTMIND_RUNTIME_URL") {
            self.chat.runtime_url = Some(v);
        }
        if let Some(v) = var("SPRINTMIND_RUNTIME_API_KEY") {
            self.chat.runtime_api_key = Some(v);
        }
        if let Some(v) = var("SPRINTMIND_APP_NAME") {
            self.chat.app_name = v;
        }

        if let Some(v) = var("SPRINTMIND_API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(v) = var("SPRINTMIND_BIND_ADDR") {
            self.server.bind_addr = v;
        }

        Ok(())
    }

    /// Whether the tracker has the credentials it needs to talk to a real instance.
    pub fn tracker_configured(&self) -> bool {
        !self.tracker.email.is_empty() && !self.tracker.api_token.is_empty()
    }
}

/// Validate config file permissions on Unix systems.
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path).unwrap_or_default();
    let has_secret = ["api_token", "api_key", "bot_token"]
        .iter()
        .any(|k| content.contains(k));

    if has_secret && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains a token but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_secret && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains a token and is group-readable (mode {:04o}). \
             Consider: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SprintMindConfig::default();
        assert_eq!(config.chat.api_base_url, "https://slack.com/api");
        assert_eq!(config.chat.app_name, "sprintmind");
        assert_eq!(config.session.ttl(), Duration::from_secs(3600));
        assert!(!config.llm.is_enabled());
        assert!(!config.tracker_configured());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SprintMindConfig::default();
        config
            .apply_env(env(&[
                ("JIRA_URL", "https://acme.atlassian.net"),
                ("JIRA_USER", "bot@acme.io"),
                ("JIRA_API_TOKEN", "t0k"),
                ("JIRA_BOARD_ID", "7"),
                ("LLM_MODEL", "gpt-4o-mini"),
                ("SLACK_BOT_TOKEN", "xoxb-1"),
                ("SPRINTMIND_RUNTIME_API_KEY", "rt-key"),
                ("SPRINTMIND_API_KEY", ""),
            ]))
            .unwrap();

        assert_eq!(config.tracker.base_url, "https://acme.atlassian.net");
        assert_eq!(config.tracker.default_board_id, Some(7));
        assert!(config.tracker_configured());
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.chat.bot_token, "xoxb-1");
        assert_eq!(config.chat.runtime_api_key.as_deref(), Some("rt-key"));
        assert!(config.server.api_key.is_none());
    }

    #[test]
    fn test_bad_board_id_is_error() {
        let mut config = SprintMindConfig::default();
        let err = config
            .apply_env(env(&[("JIRA_BOARD_ID", "seven")]))
            .unwrap_err();
        assert!(err.to_string().contains("JIRA_BOARD_ID"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = SprintMindConfig::default();
        config.chat.bot_token = "xoxb-secret".into();
        config.server.api_key = Some("k-secret".into());
        config.chat.runtime_api_key = Some("rt-secret".into());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("rt-secret"));
        assert!(!debug.contains("xoxb-secret"));
        assert!(!debug.contains("k-secret"));
    }

    #[test]
    fn test_from_file_unchecked() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tracker]
base_url = "https://acme.atlassian.net"
email = "bot@acme.io"
default_board_id = 3

[knowledge]
max_results = 3

[session]
ttl_secs = 60
"#
        )
        .unwrap();

        let config = SprintMindConfig::from_file_unchecked(file.path()).unwrap();
        assert_eq!(config.tracker.default_board_id, Some(3));
        assert_eq!(config.knowledge.max_results, 3);
        assert_eq!(config.knowledge.embedding_model, "hashing");
        assert_eq!(config.session.ttl_secs, 60);
        assert_eq!(config.chat.app_name, "sprintmind");
    }

    #[cfg(unix)]
    #[test]
    fn test_world_readable_token_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[tracker]\nbase_url = \"https://x\"\nemail = \"e\"\napi_token = \"secret\""
        )
        .unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = SprintMindConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("world-readable"));

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        assert!(SprintMindConfig::from_file(file.path()).is_ok());
    }
}
