use super::canned::CannedMessageProvider;
use super::pacing::{jittered, sleep_or_cancel, FailureStreak, LoopPacing};
use super::sender::MessageSender;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub channel: String,
    /// Base wait between posts; jittered upward.
    pub interval: Duration,
    pub pacing: LoopPacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Sent,
    Failed { streak: u32 },
}

/// Posts a random canned line to a channel on a fixed cadence.
pub struct RandomBroadcastLoop {
    canned: CannedMessageProvider,
    sender: MessageSender,
    settings: BroadcastSettings,
    streak: FailureStreak,
}

impl RandomBroadcastLoop {
    pub fn new(
        canned: CannedMessageProvider,
        sender: MessageSender,
        settings: BroadcastSettings,
    ) -> Self {
        let streak = FailureStreak::new(settings.pacing.failure_threshold);
        Self {
            canned,
            sender,
            settings,
            streak,
        }
    }

    pub fn failure_streak(&self) -> u32 {
        self.streak.count()
    }

    /// Post one line.
    pub async fn tick(&mut self) -> BroadcastOutcome {
        let text = self.canned.next().await;
        if self
            .sender
            .send(&self.settings.channel, &text, None, false)
            .await
        {
            self.streak.reset();
            BroadcastOutcome::Sent
        } else {
            let streak = self.streak.record_failure();
            tracing::warn!(channel = %self.settings.channel, streak, "⚠️ Broadcast failed");
            BroadcastOutcome::Failed { streak }
        }
    }

    /// Wait the interval, or the cooldown once failures pile up.
    /// Returns `false` if cancelled while waiting.
    pub async fn pause_after(&mut self, cancel: &CancellationToken) -> bool {
        if self.streak.needs_cooldown() {
            let cooldown = self.settings.pacing.cooldown;
            tracing::warn!(
                channel = %self.settings.channel,
                streak = self.streak.count(),
                cooldown_secs = cooldown.as_secs(),
                "🧊 Too many consecutive failures, cooling down"
            );
            let completed = sleep_or_cancel(cooldown, cancel).await;
            self.streak.reset();
            return completed;
        }
        let wait = jittered(self.settings.interval, self.settings.pacing.jitter_ratio);
        tracing::debug!(wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX), "💤 Waiting for next broadcast");
        sleep_or_cancel(wait, cancel).await
    }

    pub async fn iterate(&mut self, cancel: &CancellationToken) -> BroadcastOutcome {
        let outcome = self.tick().await;
        self.pause_after(cancel).await;
        outcome
    }

    /// Broadcast until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(channel = %self.settings.channel, "📢 Broadcasting canned messages");
        while !cancel.is_cancelled() {
            self.tick().await;
            if !self.pause_after(&cancel).await {
                break;
            }
        }
        tracing::info!(channel = %self.settings.channel, "🛑 Broadcast loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelTransport;
    use crate::outcome::{CallFailure, CallOutcome};
    use crate::reply::sender::SenderPolicy;
    use crate::reply::testing::{ScriptedTransport, StaticLines};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn broadcast(transport: &Arc<ScriptedTransport>, lines: &[&str]) -> RandomBroadcastLoop {
        RandomBroadcastLoop::new(
            CannedMessageProvider::new(Box::new(StaticLines::ok(lines))),
            MessageSender::new(
                Arc::clone(transport) as Arc<dyn ChannelTransport>,
                SenderPolicy {
                    max_attempts: 1,
                    rate_limit_delay: Duration::from_secs(1),
                    retry_delay: Duration::from_secs(1),
                },
            ),
            BroadcastSettings {
                channel: "42".into(),
                interval: Duration::from_secs(60),
                pacing: LoopPacing {
                    jitter_ratio: 0.0,
                    failure_threshold: 5,
                    cooldown: Duration::from_secs(300),
                },
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn posts_canned_lines_without_reply_reference() {
        let transport = Arc::new(ScriptedTransport::new("me"));
        let mut broadcast = broadcast(&transport, &["pagi", "siang"]);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert_eq!(broadcast.iterate(&cancel).await, BroadcastOutcome::Sent);
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, None);
        assert!(["pagi", "siang"].contains(&sent[0].text.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_cool_down_at_threshold_then_reset() {
        let transport = Arc::new(ScriptedTransport::new("me").with_default_post(
            CallOutcome::Failed(CallFailure::Network("down".into())),
        ));
        let mut broadcast = broadcast(&transport, &["x"]);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for expected in 1..=4 {
            assert_eq!(
                broadcast.iterate(&cancel).await,
                BroadcastOutcome::Failed { streak: expected }
            );
        }
        assert_eq!(start.elapsed(), Duration::from_secs(240));

        assert_eq!(
            broadcast.iterate(&cancel).await,
            BroadcastOutcome::Failed { streak: 5 }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(540));
        assert_eq!(broadcast.failure_streak(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_streak() {
        let failure = || CallOutcome::Failed(CallFailure::Network("down".into()));
        let transport = Arc::new(
            ScriptedTransport::new("me").with_posts(vec![failure(), failure(), CallOutcome::Success(())]),
        );
        let mut broadcast = broadcast(&transport, &["x"]);

        broadcast.tick().await;
        broadcast.tick().await;
        assert_eq!(broadcast.failure_streak(), 2);
        assert_eq!(broadcast.tick().await, BroadcastOutcome::Sent);
        assert_eq!(broadcast.failure_streak(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_still_broadcasts_sentinel() {
        let transport = Arc::new(ScriptedTransport::new("me"));
        let mut broadcast = broadcast(&transport, &[]);

        assert_eq!(broadcast.tick().await, BroadcastOutcome::Sent);
        assert_eq!(transport.sent()[0].text, "No messages available");
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_cancelled() {
        let transport = Arc::new(ScriptedTransport::new("me"));
        let broadcast = broadcast(&transport, &["x"]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(broadcast.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(transport.post_calls(), 3);
    }
}
