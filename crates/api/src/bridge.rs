//! Slack-style chat bridge.
//!
//! Relays user messages from the events webhook to an [`AgentRuntime`] and
//! posts the first text fragment of the answer back to the channel.

use crate::runtime::{first_text, AgentRuntime, RuntimeError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SESSION_ERROR_REPLY: &str = "Error creating session";
pub const EMPTY_REPLY: &str = "No response from agent runtime";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat API transport error: {0}")]
    Transport(String),

    #[error("chat API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat API error: {0}")]
    Api(String),
}

/// Outbound side of the chat integration.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ChatError>;
}

/// Web API client for the chat workspace.
pub struct SlackClient {
    http_client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

impl SlackClient {
    pub fn new(api_base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base_url, method)
    }

    async fn parse(response: reqwest::Response) -> Result<SlackResponse, ChatError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: SlackResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        if !parsed.ok {
            return Err(ChatError::Api(
                parsed.error.unwrap_or_else(|| "unknown_error".into()),
            ));
        }
        Ok(parsed)
    }

    /// The bot's own user id, from `auth.test`.
    pub async fn auth_test(&self) -> Result<String, ChatError> {
        let response = self
            .http_client
            .get(self.url("auth.test"))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Self::parse(response)
            .await?
            .user_id
            .ok_or_else(|| ChatError::Api("auth.test returned no user_id".into()))
    }
}

#[async_trait]
impl ChatPoster for SlackClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        let response = self
            .http_client
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&serde_json::json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Self::parse(response).await?;
        Ok(())
    }
}

/// Incoming webhook payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UrlVerification {
        #[serde(default)]
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event: MessageEvent,
    },
    #[serde(other)]
    Other,
}

impl EventPayload {
    /// Parse a webhook body. Anything unrecognized is [`EventPayload::Other`].
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or(EventPayload::Other)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

/// What the bridge did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Ignored,
    Replied { channel: String, text: String },
}

struct UserSession {
    session_id: String,
    last_used: Instant,
}

pub struct ChatBridge {
    runtime: Arc<dyn AgentRuntime>,
    poster: Arc<dyn ChatPoster>,
    bot_user_id: Option<String>,
    sessions: RwLock<HashMap<String, UserSession>>,
    session_ttl: Duration,
}

impl ChatBridge {
    pub fn new(runtime: Arc<dyn AgentRuntime>, poster: Arc<dyn ChatPoster>) -> Self {
        Self {
            runtime,
            poster,
            bot_user_id: None,
            sessions: RwLock::new(HashMap::new()),
            session_ttl: Duration::from_secs(1800),
        }
    }

    pub fn with_bot_user_id(mut self, bot_user_id: Option<String>) -> Self {
        self.bot_user_id = bot_user_id;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn bot_user_id(&self) -> Option<&str> {
        self.bot_user_id.as_deref()
    }

    /// Events from bots, from nobody, or from ourselves are dropped.
    fn should_ignore(&self, event: &MessageEvent) -> bool {
        match event.user.as_deref() {
            None => true,
            Some(_) if event.subtype.as_deref() == Some("bot_message") => true,
            Some(user) => self.bot_user_id.as_deref() == Some(user),
        }
    }

    /// Handle one message event, posting the reply when there is one.
    pub async fn handle_event(&self, event: &MessageEvent) -> BridgeOutcome {
        if self.should_ignore(event) {
            debug!(user = ?event.user, subtype = ?event.subtype, "Ignoring event");
            return BridgeOutcome::Ignored;
        }
        let (Some(user), Some(channel)) = (event.user.as_deref(), event.channel.as_deref()) else {
            return BridgeOutcome::Ignored;
        };
        let text = event.text.as_deref().unwrap_or_default();
        info!(user, channel, "Message from chat user");

        let reply = self.reply_for(user, text).await;
        if let Err(e) = self.poster.post_message(channel, &reply).await {
            warn!(channel, error = %e, "Failed to post reply");
        }
        BridgeOutcome::Replied {
            channel: channel.to_string(),
            text: reply,
        }
    }

    /// The text to send back for a user's message.
    pub async fn reply_for(&self, user: &str, text: &str) -> String {
        let (session_id, reused) = match self.session_for(user).await {
            Ok(found) => found,
            Err(e) => {
                warn!(user, error = %e, "Could not create runtime session");
                return SESSION_ERROR_REPLY.to_string();
            }
        };

        let mut result = self.runtime.run(user, &session_id, text).await;

        // The runtime may have expired a session we still remember.
        if reused && matches!(&result, Err(e) if e.is_not_found()) {
            debug!(user, session_id = %session_id, "Runtime lost the session, starting over");
            self.forget(user).await;
            result = match self.session_for(user).await {
                Ok((session_id, _)) => self.runtime.run(user, &session_id, text).await,
                Err(_) => return SESSION_ERROR_REPLY.to_string(),
            };
        }

        match result {
            Ok(events) => first_text(&events).unwrap_or_else(|| EMPTY_REPLY.to_string()),
            Err(e) => runtime_error_reply(&e),
        }
    }

    /// The user's live session id and whether it was reused.
    async fn session_for(&self, user: &str) -> Result<(String, bool), RuntimeError> {
        {
            let mut sessions = self.sessions.write().await;
            let now = Instant::now();
            sessions.retain(|_, s| now.duration_since(s.last_used) <= self.session_ttl);
            if let Some(existing) = sessions.get_mut(user) {
                existing.last_used = now;
                return Ok((existing.session_id.clone(), true));
            }
        }

        let session_id = Uuid::new_v4().to_string();
        self.runtime.create_session(user, &session_id).await?;
        info!(user, session_id = %session_id, "Created session for chat user");

        self.sessions.write().await.insert(
            user.to_string(),
            UserSession {
                session_id: session_id.clone(),
                last_used: Instant::now(),
            },
        );
        Ok((session_id, false))
    }

    async fn forget(&self, user: &str) {
        self.sessions.write().await.remove(user);
    }
}

fn runtime_error_reply(error: &RuntimeError) -> String {
    match error {
        RuntimeError::Status { status, body } => {
            format!("Error from agent runtime: {} {}", status, body)
        }
        other => format!("Error from agent runtime: {}", other),
    }
}
