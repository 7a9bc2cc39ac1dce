//! Reply-mode loop: poll a channel, reply to each new message in order.
//!
//! The poller owns every piece of mutable loop state (cursor, self identity,
//! failure streak, dropped set) and runs one iteration at a time, so no
//! two replies are ever in flight together.

use super::pacing::{jittered, sleep_or_cancel, FailureStreak, LoopPacing};
use super::pipeline::ReplyPipeline;
use crate::channels::{ChannelTransport, IncomingMessage, MessageId, MessageKind};
use crate::outcome::CallOutcome;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempts at resolving our own identity before giving up on startup.
const IDENTITY_ATTEMPTS: u32 = 3;

/// The only error that stops the process.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to resolve self identity on {transport}: {reason}")]
    SelfIdentity { transport: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub channel: String,
    /// Size of the recent-message window fetched per poll.
    pub fetch_limit: usize,
    /// Base wait between polls; jittered upward.
    pub read_delay: Duration,
    /// Wait after a rate-limited fetch without a hint.
    pub rate_limit_delay: Duration,
    pub pacing: LoopPacing,
}

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Cursor taken from the window because startup seeding had failed.
    Seeded { cursor: Option<MessageId> },
    /// Nothing new to reply to.
    Idle,
    Dispatched { replied: usize, dropped: usize },
    RateLimited { wait: Duration },
    FetchFailed { streak: u32 },
}

pub struct ChannelPoller {
    transport: Arc<dyn ChannelTransport>,
    pipeline: ReplyPipeline,
    settings: PollSettings,
    self_id: String,
    cursor: Option<MessageId>,
    seeded: bool,
    /// Messages whose reply could not be sent. Never re-dispatched; pruned
    /// once the cursor moves past them or they leave the fetch window.
    dropped: BTreeSet<MessageId>,
    streak: FailureStreak,
}

impl ChannelPoller {
    /// Resolve our identity and seed the cursor from the newest message.
    ///
    /// Failing to learn our identity is fatal. Failing to seed is not: the
    /// first successful poll seeds instead.
    pub async fn initialize(
        transport: Arc<dyn ChannelTransport>,
        pipeline: ReplyPipeline,
        settings: PollSettings,
    ) -> Result<Self, StartupError> {
        let self_id = resolve_identity(transport.as_ref(), settings.rate_limit_delay).await?;
        tracing::info!(transport = transport.name(), self_id = %self_id, "🔑 Resolved self identity");

        let streak = FailureStreak::new(settings.pacing.failure_threshold);
        let mut poller = Self {
            transport,
            pipeline,
            settings,
            self_id,
            cursor: None,
            seeded: false,
            dropped: BTreeSet::new(),
            streak,
        };
        poller.seed().await;
        Ok(poller)
    }

    async fn seed(&mut self) {
        match self
            .transport
            .fetch_recent_messages(&self.settings.channel, 1)
            .await
        {
            CallOutcome::Success(messages) => {
                self.cursor = messages.iter().map(|m| m.id).max();
                self.seeded = true;
                match self.cursor {
                    Some(id) => tracing::info!(channel = %self.settings.channel, cursor = %id, "📍 Seeded cursor"),
                    None => tracing::info!(channel = %self.settings.channel, "📍 Channel is empty, every new message qualifies"),
                }
            }
            CallOutcome::RateLimited { .. } => {
                tracing::warn!(channel = %self.settings.channel, "⏳ Rate limited while seeding cursor, will seed on first poll");
            }
            CallOutcome::Failed(failure) => {
                tracing::warn!(
                    channel = %self.settings.channel,
                    error = %failure,
                    "⚠️ Failed to seed cursor, will seed on first poll"
                );
            }
        }
    }

    pub fn cursor(&self) -> Option<MessageId> {
        self.cursor
    }

    pub fn self_identity(&self) -> &str {
        &self.self_id
    }

    pub fn failure_streak(&self) -> u32 {
        self.streak.count()
    }

    /// New messages worth replying to, oldest first.
    pub fn qualifying(&self, messages: Vec<IncomingMessage>) -> Vec<IncomingMessage> {
        let mut batch: Vec<IncomingMessage> = messages
            .into_iter()
            .filter(|m| self.cursor.is_none_or(|cursor| m.id > cursor))
            .filter(|m| m.author_id != self.self_id)
            .filter(|m| m.kind == MessageKind::Ordinary)
            .filter(|m| !self.dropped.contains(&m.id))
            .collect();
        batch.sort_by_key(|m| m.id);
        batch.dedup_by_key(|m| m.id);
        batch
    }

    fn advance_cursor(&mut self, id: MessageId) {
        if self.cursor.is_some_and(|cursor| id <= cursor) {
            return;
        }
        self.cursor = Some(id);
        self.dropped.retain(|dropped| *dropped > id);
        tracing::debug!(channel = %self.settings.channel, cursor = %id, "📍 Cursor advanced");
    }

    /// Forget dropped ids older than the window; they can never be fetched again.
    fn prune_dropped(&mut self, window: &[IncomingMessage]) {
        if let Some(oldest) = window.iter().map(|m| m.id).min() {
            self.dropped.retain(|dropped| *dropped >= oldest);
        }
    }

    /// Fetch the window once and reply to everything new in it.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let messages = match self
            .transport
            .fetch_recent_messages(&self.settings.channel, self.settings.fetch_limit)
            .await
        {
            CallOutcome::Success(messages) => messages,
            CallOutcome::RateLimited { retry_after } => {
                let wait = retry_after.unwrap_or(self.settings.rate_limit_delay);
                tracing::warn!(
                    channel = %self.settings.channel,
                    retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "⏳ Rate limited while reading messages"
                );
                return PollOutcome::RateLimited { wait };
            }
            CallOutcome::Failed(failure) => {
                let streak = self.streak.record_failure();
                tracing::warn!(
                    channel = %self.settings.channel,
                    streak,
                    error = %failure,
                    "⚠️ Failed to read messages"
                );
                return PollOutcome::FetchFailed { streak };
            }
        };
        self.streak.reset();
        self.prune_dropped(&messages);

        if !self.seeded {
            self.cursor = messages.iter().map(|m| m.id).max();
            self.seeded = true;
            tracing::info!(channel = %self.settings.channel, cursor = ?self.cursor.map(|id| id.0), "📍 Seeded cursor from first poll");
            return PollOutcome::Seeded {
                cursor: self.cursor,
            };
        }

        let batch = self.qualifying(messages);
        if batch.is_empty() {
            return PollOutcome::Idle;
        }

        let (mut replied, mut dropped) = (0, 0);
        for message in &batch {
            tracing::info!(
                channel = %self.settings.channel,
                message_id = %message.id,
                author = %message.author_id,
                "📨 Replying to message"
            );
            if self.pipeline.dispatch(message).await {
                self.advance_cursor(message.id);
                replied += 1;
            } else {
                tracing::warn!(message_id = %message.id, "🗑️ Reply dropped, message will not be retried");
                self.dropped.insert(message.id);
                dropped += 1;
            }
        }
        PollOutcome::Dispatched { replied, dropped }
    }

    /// Idle after a poll. Returns `false` if cancelled while waiting.
    pub async fn pause_after(&mut self, outcome: &PollOutcome, cancel: &CancellationToken) -> bool {
        match outcome {
            PollOutcome::RateLimited { wait } => sleep_or_cancel(*wait, cancel).await,
            PollOutcome::FetchFailed { streak } if self.streak.needs_cooldown() => {
                let cooldown = self.settings.pacing.cooldown;
                tracing::warn!(
                    channel = %self.settings.channel,
                    streak,
                    cooldown_secs = cooldown.as_secs(),
                    "🧊 Too many consecutive failures, cooling down"
                );
                let completed = sleep_or_cancel(cooldown, cancel).await;
                self.streak.reset();
                completed
            }
            _ => {
                let delay = jittered(self.settings.read_delay, self.settings.pacing.jitter_ratio);
                sleep_or_cancel(delay, cancel).await
            }
        }
    }

    /// One poll followed by its pause.
    pub async fn iterate(&mut self, cancel: &CancellationToken) -> PollOutcome {
        let outcome = self.poll_once().await;
        self.pause_after(&outcome, cancel).await;
        outcome
    }

    /// Poll until `cancel` fires. Cancellation is observed between polls and
    /// while idling, never in the middle of a reply.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(channel = %self.settings.channel, "👂 Listening for new messages");
        while !cancel.is_cancelled() {
            let outcome = self.poll_once().await;
            if !self.pause_after(&outcome, &cancel).await {
                break;
            }
        }
        tracing::info!(channel = %self.settings.channel, "🛑 Reply loop stopped");
    }
}

async fn resolve_identity(
    transport: &dyn ChannelTransport,
    default_wait: Duration,
) -> Result<String, StartupError> {
    let fail = |reason: String| StartupError::SelfIdentity {
        transport: transport.name().to_string(),
        reason,
    };

    for attempt in 1..=IDENTITY_ATTEMPTS {
        match transport.resolve_self_identity().await {
            CallOutcome::Success(id) => return Ok(id),
            CallOutcome::RateLimited { retry_after } => {
                if attempt == IDENTITY_ATTEMPTS {
                    break;
                }
                let wait = retry_after.unwrap_or(default_wait);
                tracing::warn!(attempt, "⏳ Rate limited while resolving self identity");
                tokio::time::sleep(wait).await;
            }
            CallOutcome::Failed(failure) => return Err(fail(failure.to_string())),
        }
    }
    Err(fail(format!(
        "still rate limited after {IDENTITY_ATTEMPTS} attempts"
    )))
}
