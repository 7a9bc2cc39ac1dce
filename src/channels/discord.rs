use super::traits::{ChannelTransport, IncomingMessage, MessageId, MessageKind};
use crate::config::{DiscordAuthScheme, DiscordConfig};
use crate::outcome::{retry_after_from_headers, retry_after_from_secs, CallFailure, CallOutcome};
use crate::util::{fit_within_chars, sanitize_api_error};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Discord's maximum message length for regular messages
const DISCORD_MAX_MESSAGE_LENGTH: usize = 2000;

/// Message types that carry user-written content: DEFAULT and REPLY.
/// Everything else (joins, pins, boosts, thread notices) is a system event.
const ORDINARY_MESSAGE_TYPES: [u8; 2] = [0, 19];

/// Discord channel transport over the REST API (no gateway connection).
pub struct DiscordTransport {
    token: String,
    auth_scheme: DiscordAuthScheme,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: Option<WireUser>,
    #[serde(rename = "type", default)]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct WireRateLimit {
    retry_after: Option<f64>,
}

impl DiscordTransport {
    pub fn new(config: &DiscordConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autoreply/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            token: config.token.clone(),
            auth_scheme: config.auth_scheme,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn authorization(&self) -> String {
        match self.auth_scheme {
            DiscordAuthScheme::Bot => format!("Bot {}", self.token),
            DiscordAuthScheme::Raw => self.token.clone(),
        }
    }

    fn messages_url(&self, channel: &str) -> String {
        format!("{}/channels/{channel}/messages", self.api_base)
    }

    /// Turn an HTTP round-trip into a typed outcome carrying the raw body.
    async fn classify(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> CallOutcome<String> {
        let response = match response {
            Ok(r) => r,
            Err(e) => return CallOutcome::Failed(CallFailure::from_reqwest(&e)),
        };

        let status = response.status();
        let header_hint = retry_after_from_headers(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return CallOutcome::Failed(CallFailure::from_reqwest(&e)),
        };

        if status.as_u16() == 429 {
            // The JSON body carries a fractional hint; the header is whole seconds.
            let body_hint = serde_json::from_str::<WireRateLimit>(&body)
                .ok()
                .and_then(|r| r.retry_after)
                .and_then(retry_after_from_secs);
            return CallOutcome::RateLimited {
                retry_after: body_hint.or(header_hint),
            };
        }

        if !status.is_success() {
            return CallOutcome::Failed(CallFailure::Status {
                status: status.as_u16(),
                detail: sanitize_api_error(&body),
            });
        }

        CallOutcome::Success(body)
    }

    fn parse_messages(body: &str) -> Result<Vec<IncomingMessage>, CallFailure> {
        let wire: Vec<WireMessage> = serde_json::from_str(body)
            .map_err(|e| CallFailure::Malformed(format!("message list: {e}")))?;

        Ok(wire
            .into_iter()
            .filter_map(|m| {
                let Ok(id) = m.id.parse::<MessageId>() else {
                    tracing::warn!(raw_id = %m.id, "Discord: skipping message with non-numeric id");
                    return None;
                };
                let Some(author) = m.author else {
                    tracing::warn!(message_id = %id, "Discord: skipping message without author");
                    return None;
                };
                let kind = if ORDINARY_MESSAGE_TYPES.contains(&m.kind) {
                    MessageKind::Ordinary
                } else {
                    MessageKind::SystemEvent
                };
                Some(IncomingMessage {
                    id,
                    author_text: m.content,
                    author_id: author.id,
                    kind,
                })
            })
            .collect())
    }

    fn post_body(text: &str, reply_to: Option<MessageId>) -> serde_json::Value {
        let content = fit_within_chars(text, DISCORD_MAX_MESSAGE_LENGTH);
        match reply_to {
            Some(id) => json!({
                "content": content,
                "message_reference": { "message_id": id.to_string() }
            }),
            None => json!({ "content": content }),
        }
    }
}

#[async_trait]
impl ChannelTransport for DiscordTransport {
    fn name(&self) -> &str {
        "discord"
    }

    async fn resolve_self_identity(&self) -> CallOutcome<String> {
        let response = self
            .client
            .get(format!("{}/users/@me", self.api_base))
            .header("Authorization", self.authorization())
            .send()
            .await;

        match Self::classify(response).await {
            CallOutcome::Success(body) => match serde_json::from_str::<WireUser>(&body) {
                Ok(user) => CallOutcome::Success(user.id),
                Err(e) => CallOutcome::Failed(CallFailure::Malformed(format!("users/@me: {e}"))),
            },
            other => other,
        }
    }

    async fn fetch_recent_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> CallOutcome<Vec<IncomingMessage>> {
        let response = self
            .client
            .get(self.messages_url(channel))
            .query(&[("limit", limit.to_string())])
            .header("Authorization", self.authorization())
            .send()
            .await;

        match Self::classify(response).await {
            CallOutcome::Success(body) => match Self::parse_messages(&body) {
                Ok(messages) => CallOutcome::Success(messages),
                Err(failure) => CallOutcome::Failed(failure),
            },
            CallOutcome::RateLimited { retry_after } => CallOutcome::RateLimited { retry_after },
            CallOutcome::Failed(failure) => CallOutcome::Failed(failure),
        }
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> CallOutcome<()> {
        let response = self
            .client
            .post(self.messages_url(channel))
            .header("Authorization", self.authorization())
            .json(&Self::post_body(text, reply_to))
            .send()
            .await;

        Self::classify(response).await.map(|_| ())
    }
}
