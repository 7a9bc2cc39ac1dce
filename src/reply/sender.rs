use crate::channels::{ChannelTransport, MessageId};
use crate::config::SenderConfig;
use crate::outcome::CallOutcome;
use crate::util::{sanitize_api_error, truncate_with_ellipsis};
use std::sync::Arc;
use std::time::Duration;

/// Retry bounds for one `send` call.
#[derive(Debug, Clone)]
pub struct SenderPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Wait after a rate limit without a hint.
    pub rate_limit_delay: Duration,
    /// Fixed wait after any other failure.
    pub retry_delay: Duration,
}

impl From<&SenderConfig> for SenderPolicy {
    fn from(config: &SenderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_delay: config.rate_limit_delay(),
            retry_delay: config.retry_delay(),
        }
    }
}

impl Default for SenderPolicy {
    fn default() -> Self {
        Self::from(&SenderConfig::default())
    }
}

/// Posts messages through a [`ChannelTransport`] with bounded retries.
pub struct MessageSender {
    transport: Arc<dyn ChannelTransport>,
    policy: SenderPolicy,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn ChannelTransport>, policy: SenderPolicy) -> Self {
        Self { transport, policy }
    }

    /// Post `text` to `channel`. The reply reference is attached only when
    /// `reply_mode` is set and `reply_to` is present.
    ///
    /// Returns `false` once every attempt failed; callers treat that as a
    /// dropped message, never as fatal.
    pub async fn send(
        &self,
        channel: &str,
        text: &str,
        reply_to: Option<MessageId>,
        reply_mode: bool,
    ) -> bool {
        let reference = if reply_mode { reply_to } else { None };
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let has_next = attempt < max_attempts;

            match self.transport.post_message(channel, text, reference).await {
                CallOutcome::Success(()) => {
                    tracing::info!(
                        channel,
                        attempt,
                        reply_to = reference.map(|id| id.0),
                        "📤 Sent: {}",
                        truncate_with_ellipsis(text, 80)
                    );
                    return true;
                }
                CallOutcome::RateLimited { retry_after } => {
                    let wait = retry_after.unwrap_or(self.policy.rate_limit_delay);
                    tracing::warn!(
                        channel,
                        attempt,
                        max_attempts,
                        retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "⏳ Rate limited while sending"
                    );
                    if has_next {
                        tokio::time::sleep(wait).await;
                    }
                }
                CallOutcome::Failed(failure) => {
                    tracing::warn!(
                        channel,
                        attempt,
                        max_attempts,
                        error = %sanitize_api_error(&failure.to_string()),
                        "⚠️ Failed to send message"
                    );
                    if has_next {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!(channel, max_attempts, "❌ Giving up on message after {max_attempts} attempts");
        false
    }
}
