//! A transport that delivers notifications as Slack direct messages.

use crate::error::permanent;
use crate::identifier::{NamespacedKey, KIND_ID};
use crate::notification::Notification;
use crate::transport::{Transport, Validator};
use crate::types::TransportKey;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Namespace of Slack identities.
pub const SLACK_NAMESPACE: &str = "slack.com";

/// Slack API error codes that no amount of retrying will fix.
const PERMANENT_API_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "channel_not_found",
    "user_not_found",
    "missing_scope",
];

/// The identity key Slack user IDs are stored under: `slack.com/id`.
pub fn slack_id() -> NamespacedKey {
    NamespacedKey::from_static(SLACK_NAMESPACE, KIND_ID)
}

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("recipient does not have a Slack ID")]
    MissingSlackId,
    #[error("Slack API {method} failed: {code}")]
    Api { method: &'static str, code: String },
    #[error("Slack API {method} returned status {status}")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("Slack API {method} request failed")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Slack API {method} call cancelled")]
    Cancelled { method: &'static str },
}

impl SlackError {
    /// Whether retrying the same call could ever succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            SlackError::MissingSlackId => true,
            SlackError::Api { code, .. } => PERMANENT_API_ERRORS.contains(&code.as_str()),
            SlackError::Status { status, .. } => {
                *status == reqwest::StatusCode::UNAUTHORIZED
                    || *status == reqwest::StatusCode::FORBIDDEN
            }
            SlackError::Http { .. } | SlackError::Cancelled { .. } => false,
        }
    }

    fn classify(self) -> anyhow::Error {
        if self.is_permanent() {
            permanent(self)
        } else {
            self.into()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    user: Option<String>,
}

/// Sends notifications through the Slack Web API using a bot token.
pub struct SlackTransport {
    key: TransportKey,
    token: String,
    api_url: String,
    client: reqwest::Client,
}

impl SlackTransport {
    /// Creates a new `SlackTransport` talking to the public Slack API.
    pub fn new(key: impl Into<TransportKey>, token: impl Into<String>) -> Self {
        Self::with_api_url(key, token, DEFAULT_API_URL)
    }

    /// Creates a transport against a custom API base URL (used for testing).
    pub fn with_api_url(
        key: impl Into<TransportKey>,
        token: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, reqwest::Error> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Builds the `chat.postMessage` body, merging any rich payload for this transport.
    fn message_body(&self, notification: &dyn Notification, channel: &str) -> Value {
        let mut body = Map::new();
        body.insert("channel".to_string(), json!(channel));

        let text = notification.render(&self.key);
        if !text.is_empty() {
            body.insert("text".to_string(), json!(text));
        }

        if let Some(Value::Object(extra)) = notification
            .as_rich()
            .and_then(|rich| rich.payload(&self.key))
        {
            for (field, value) in extra {
                body.insert(field.clone(), value.clone());
            }
        }

        Value::Object(body)
    }

    async fn call(
        &self,
        method: &'static str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<SlackResponse, SlackError> {
        let request = async {
            let response = self
                .client
                .post(format!("{}/{}", self.api_url, method))
                .bearer_auth(&self.token)
                .json(body)
                .send()
                .await
                .map_err(|source| SlackError::Http { method, source })?;

            let status = response.status();
            if !status.is_success() {
                return Err(SlackError::Status { method, status });
            }

            let parsed: SlackResponse = response
                .json()
                .await
                .map_err(|source| SlackError::Http { method, source })?;

            if parsed.ok {
                Ok(parsed)
            } else {
                Err(SlackError::Api {
                    method,
                    code: parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
                })
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SlackError::Cancelled { method }),
            result = request => result,
        }
    }
}

#[async_trait]
impl Transport for SlackTransport {
    fn key(&self) -> &TransportKey {
        &self.key
    }

    #[instrument(skip_all, fields(transport = %self.key, event = %notification.event_type()))]
    async fn push(&self, cancel: &CancellationToken, notification: &dyn Notification) -> Result<()> {
        let channel = notification
            .recipient()
            .get(&slack_id())
            .ok_or_else(|| SlackError::MissingSlackId.classify())?;

        let body = self.message_body(notification, channel);
        match self.call("chat.postMessage", &body, cancel).await {
            Ok(_) => {
                info!("Successfully sent Slack message.");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to send Slack message");
                Err(e.classify())
            }
        }
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }
}

#[async_trait]
impl Validator for SlackTransport {
    async fn validate(&self, cancel: &CancellationToken) -> Result<()> {
        let response = self
            .call("auth.test", &json!({}), cancel)
            .await
            .map_err(|e| permanent(anyhow::Error::new(e).context("authentication failed")))?;

        info!(
            transport = %self.key,
            slack_team = response.team.as_deref().unwrap_or_default(),
            slack_user = response.user.as_deref().unwrap_or_default(),
            "Slack transport connected"
        );
        Ok(())
    }
}
