//! Slack channel — Web API dispatcher and Events API payload types.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::archive::model::InboundEvent;
use crate::channels::dispatcher::{Dispatcher, ReactionOutcome};
use crate::error::DispatchError;

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Slack error code returned when the bot already reacted with an emoji.
const ALREADY_REACTED: &str = "already_reacted";

/// Slack Web API client for posting messages and reactions.
pub struct SlackDispatcher {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl SlackDispatcher {
    pub fn new(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Call a Web API method and return the decoded body if `ok` is true.
    async fn call(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| DispatchError::Request {
                method: method.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DispatchError::Request {
                method: method.into(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let api_response: serde_json::Value =
            resp.json().await.map_err(|e| DispatchError::Request {
                method: method.into(),
                reason: format!("invalid response body: {e}"),
            })?;

        if api_response.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let error = api_response
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown_error");
            return Err(DispatchError::Api {
                method: method.into(),
                error: error.to_string(),
            });
        }

        Ok(api_response)
    }
}

#[async_trait]
impl Dispatcher for SlackDispatcher {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut body = serde_json::json!({
            "channel": channel_id,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = serde_json::Value::String(ts.to_string());
        }

        self.call("chat.postMessage", &body).await?;
        debug!(channel_id, threaded = thread_ts.is_some(), "Slack message posted");
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        ts: &str,
        name: &str,
    ) -> Result<ReactionOutcome, DispatchError> {
        let body = serde_json::json!({
            "channel": channel_id,
            "timestamp": ts,
            "name": name,
        });

        match self.call("reactions.add", &body).await {
            Ok(_) => Ok(ReactionOutcome::Added),
            Err(DispatchError::Api { error, .. }) if error == ALREADY_REACTED => {
                Ok(ReactionOutcome::AlreadyReacted)
            }
            Err(e) => Err(e),
        }
    }
}

// ── Events API payloads ─────────────────────────────────────────────

/// Outer Events API request body.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

/// A file attached to a message.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub url_private: Option<String>,
}

/// The `message` event and the nested message of a `message_changed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessageEvent {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    /// Present on `message_changed`: the message after the edit.
    #[serde(default)]
    pub message: Option<Box<SlackMessageEvent>>,
}

impl SlackMessageEvent {
    /// Normalize into a platform-independent event.
    ///
    /// Edits take text, ts, author and files from the nested message.
    /// Bot messages, deletions and messages with no author or text are skipped.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        let channel_id = self.channel.clone()?;
        let is_edit = self.subtype.as_deref() == Some("message_changed");

        let body = if is_edit { *self.message? } else { self };

        if body.bot_id.is_some() {
            debug!(channel_id = %channel_id, "Skipping bot message");
            return None;
        }
        if matches!(body.subtype.as_deref(), Some("message_deleted" | "bot_message")) {
            return None;
        }

        let (Some(user_id), Some(text), Some(ts)) = (body.user, body.text, body.ts) else {
            debug!(channel_id = %channel_id, "Skipping message without author, text or ts");
            return None;
        };

        let file_urls = body.files.into_iter().filter_map(|f| f.url_private).collect();

        Some(InboundEvent {
            channel_id,
            ts,
            text,
            user_id,
            file_urls,
            is_edit,
        })
    }
}

/// Decode a raw `event` object. Returns `None` for non-message events.
pub fn parse_message_event(event: serde_json::Value) -> Option<InboundEvent> {
    if event.get("type").and_then(|t| t.as_str()) != Some("message") {
        return None;
    }
    match serde_json::from_value::<SlackMessageEvent>(event) {
        Ok(message) => message.into_inbound(),
        Err(e) => {
            warn!(error = %e, "Malformed Slack message event");
            None
        }
    }
}
