use super::canned::{CannedMessageProvider, CannedPick};
use super::generator::{Language, ReplyGenerator};
use super::pacing::jittered;
use super::sender::MessageSender;
use crate::channels::IncomingMessage;
use std::time::Duration;

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftSource {
    Generated,
    Canned,
    /// The canned pool was missing, empty or unreadable; the text is its sentinel.
    CannedErrorText,
}

impl DraftSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Canned => "canned",
            Self::CannedErrorText => "canned-error-text",
        }
    }
}

/// Reply text for one incoming message, consumed right away by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub text: String,
    pub source: DraftSource,
}

#[derive(Debug, Clone)]
pub struct ReplySettings {
    pub channel: String,
    /// Thread replies onto the triggering message.
    pub reply_to_sender: bool,
    pub language: Language,
    /// Base wait between drafting and sending; jittered upward.
    pub reply_delay: Duration,
    pub jitter_ratio: f64,
}

/// Drafts and sends the reply to one qualifying message.
pub struct ReplyPipeline {
    /// `None` when generation is disabled.
    generator: Option<ReplyGenerator>,
    canned: CannedMessageProvider,
    sender: MessageSender,
    settings: ReplySettings,
}

impl ReplyPipeline {
    pub fn new(
        generator: Option<ReplyGenerator>,
        canned: CannedMessageProvider,
        sender: MessageSender,
        settings: ReplySettings,
    ) -> Self {
        Self {
            generator,
            canned,
            sender,
            settings,
        }
    }

    pub fn settings(&self) -> &ReplySettings {
        &self.settings
    }

    /// Generated text when possible, canned text otherwise. Never fails.
    pub async fn draft(&mut self, message: &IncomingMessage) -> ReplyDraft {
        if let Some(generator) = self.generator.as_mut() {
            if message.author_text.trim().is_empty() {
                tracing::info!(message_id = %message.id, "📎 Message has no text, using canned reply");
            } else {
                match generator
                    .generate(&message.author_text, self.settings.language)
                    .await
                {
                    Ok(text) => {
                        return ReplyDraft {
                            text,
                            source: DraftSource::Generated,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            message_id = %message.id,
                            error = %e,
                            "⚠️ Generation failed, falling back to canned reply"
                        );
                    }
                }
            }
        }

        match self.canned.pick().await {
            CannedPick::Line(text) => ReplyDraft {
                text,
                source: DraftSource::Canned,
            },
            CannedPick::Unavailable(text) => ReplyDraft {
                text,
                source: DraftSource::CannedErrorText,
            },
        }
    }

    /// Draft, wait the reply delay, send. Returns whether the send landed.
    pub async fn dispatch(&mut self, message: &IncomingMessage) -> bool {
        let draft = self.draft(message).await;
        tracing::debug!(
            message_id = %message.id,
            source = draft.source.as_str(),
            "📝 Reply drafted"
        );

        tokio::time::sleep(jittered(
            self.settings.reply_delay,
            self.settings.jitter_ratio,
        ))
        .await;

        self.sender
            .send(
                &self.settings.channel,
                &draft.text,
                Some(message.id),
                self.settings.reply_to_sender,
            )
            .await
    }
}
