//! Application state for the API server.

use crate::auth::ApiKeyConfig;
use crate::bridge::{ChatBridge, SlackClient};
use crate::runtime::{AgentRuntime, HttpRuntime, LocalRuntime};
use sprintmind_coordinator::{Orchestrator, SessionStore, SprintMindConfig};
use sprintmind_tracker::{IssuePublisher, JiraClient, TrackerRead, TrackerWrite};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state for the API server.
pub struct AppState {
    /// Classifies turns and runs the agents
    pub orchestrator: Arc<Orchestrator>,

    /// Application name the runtime endpoints answer to
    pub app_name: String,

    /// Publishes approved drafts; `None` when the tracker is not configured
    pub publisher: Option<IssuePublisher>,

    /// Project used when an approval request names none
    pub default_project_key: Option<String>,

    /// Chat bridge; `None` without a bot token
    pub bridge: Option<ChatBridge>,

    pub api_key: Option<ApiKeyConfig>,

    pub llm_configured: bool,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, app_name: impl Into<String>) -> Self {
        Self {
            orchestrator,
            app_name: app_name.into(),
            publisher: None,
            default_project_key: None,
            bridge: None,
            api_key: None,
            llm_configured: false,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_publisher(
        mut self,
        writer: Arc<dyn TrackerWrite>,
        default_project_key: Option<String>,
    ) -> Self {
        self.publisher = Some(IssuePublisher::new(writer));
        self.default_project_key = default_project_key;
        self
    }

    pub fn with_bridge(mut self, bridge: ChatBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKeyConfig) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_llm_configured(mut self, configured: bool) -> Self {
        self.llm_configured = configured;
        self
    }

    /// Wire everything from configuration.
    ///
    /// Calls `auth.test` once when a bot token is set; a failure leaves the
    /// bot identity unset.
    pub async fn from_config(config: &SprintMindConfig) -> anyhow::Result<Self> {
        let jira = Arc::new(JiraClient::new(&config.tracker));
        if !config.tracker_configured() {
            warn!(
                base_url = %config.tracker.base_url,
                "Tracker credentials not set (JIRA_USER, JIRA_API_TOKEN); tracker calls will fail"
            );
        }

        let sessions = Arc::new(SessionStore::new(config.session.ttl()));
        let tracker: Arc<dyn TrackerRead> = jira.clone();
        let orchestrator = Arc::new(Orchestrator::from_config(config, tracker, sessions)?);
        let app_name = config.chat.app_name.clone();

        let mut state = Self::new(orchestrator.clone(), app_name.clone())
            .with_llm_configured(config.llm.is_enabled());

        if config.tracker_configured() {
            state = state.with_publisher(jira, config.tracker.default_project_key.clone());
        }

        if config.chat.bot_token.is_empty() {
            info!("SLACK_BOT_TOKEN not set; chat bridge disabled");
        } else {
            let slack = Arc::new(SlackClient::new(
                config.chat.api_base_url.as_str(),
                config.chat.bot_token.as_str(),
            ));
            let bot_user_id = match slack.auth_test().await {
                Ok(id) => {
                    info!(bot_user_id = %id, "Resolved chat bot identity");
                    Some(id)
                }
                Err(e) => {
                    warn!(error = %e, "auth.test failed; bot identity unknown");
                    None
                }
            };

            let runtime: Arc<dyn AgentRuntime> = match &config.chat.runtime_url {
                Some(url) => {
                    info!(runtime_url = %url, "Chat bridge uses a remote runtime");
                    Arc::new(
                        HttpRuntime::new(url.as_str(), app_name.as_str())
                            .with_api_key(config.chat.runtime_api_key.clone()),
                    )
                }
                None => Arc::new(LocalRuntime::new(orchestrator, app_name.as_str())),
            };

            state = state.with_bridge(
                ChatBridge::new(runtime, slack)
                    .with_bot_user_id(bot_user_id)
                    .with_session_ttl(config.chat.session_ttl()),
            );
        }

        if let Some(key) = &config.server.api_key {
            state = state.with_api_key(ApiKeyConfig::new(key.as_str()));
        }

        Ok(state)
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
