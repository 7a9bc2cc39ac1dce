//! Scripted collaborators for reply-loop tests.

use crate::channels::{ChannelTransport, IncomingMessage, MessageId, MessageKind};
use crate::outcome::{CallFailure, CallOutcome};
use crate::providers::TextProvider;
use crate::reply::canned::{FallbackError, FallbackSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub fn message(id: u64, author: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: MessageId(id),
        author_text: text.to_string(),
        author_id: author.to_string(),
        kind: MessageKind::Ordinary,
    }
}

pub fn system_message(id: u64, author: &str) -> IncomingMessage {
    IncomingMessage {
        kind: MessageKind::SystemEvent,
        ..message(id, author, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub text: String,
    pub reply_to: Option<MessageId>,
}

struct TransportState {
    self_id: String,
    identity: VecDeque<CallOutcome<String>>,
    fetches: VecDeque<CallOutcome<Vec<IncomingMessage>>>,
    default_fetch: CallOutcome<Vec<IncomingMessage>>,
    posts: VecDeque<CallOutcome<()>>,
    default_post: CallOutcome<()>,
    sent: Vec<SentMessage>,
    fetch_limits: Vec<usize>,
    identity_calls: usize,
    post_calls: usize,
}

/// Transport that replays queued outcomes, then falls back to defaults.
pub struct ScriptedTransport {
    state: Mutex<TransportState>,
}

impl ScriptedTransport {
    pub fn new(self_id: &str) -> Self {
        Self {
            state: Mutex::new(TransportState {
                self_id: self_id.to_string(),
                identity: VecDeque::new(),
                fetches: VecDeque::new(),
                default_fetch: CallOutcome::Success(Vec::new()),
                posts: VecDeque::new(),
                default_post: CallOutcome::Success(()),
                sent: Vec::new(),
                fetch_limits: Vec::new(),
                identity_calls: 0,
                post_calls: 0,
            }),
        }
    }

    pub fn with_identity(self, outcomes: Vec<CallOutcome<String>>) -> Self {
        self.state.lock().identity.extend(outcomes);
        self
    }

    pub fn with_fetches(self, outcomes: Vec<CallOutcome<Vec<IncomingMessage>>>) -> Self {
        self.state.lock().fetches.extend(outcomes);
        self
    }

    pub fn with_default_fetch(self, outcome: CallOutcome<Vec<IncomingMessage>>) -> Self {
        self.state.lock().default_fetch = outcome;
        self
    }

    pub fn with_posts(self, outcomes: Vec<CallOutcome<()>>) -> Self {
        self.state.lock().posts.extend(outcomes);
        self
    }

    pub fn with_default_post(self, outcome: CallOutcome<()>) -> Self {
        self.state.lock().default_post = outcome;
        self
    }

    pub fn push_fetch(&self, outcome: CallOutcome<Vec<IncomingMessage>>) {
        self.state.lock().fetches.push_back(outcome);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    pub fn fetch_limits(&self) -> Vec<usize> {
        self.state.lock().fetch_limits.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().fetch_limits.len()
    }

    pub fn identity_calls(&self) -> usize {
        self.state.lock().identity_calls
    }

    pub fn post_calls(&self) -> usize {
        self.state.lock().post_calls
    }
}

#[async_trait]
impl ChannelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn resolve_self_identity(&self) -> CallOutcome<String> {
        let mut state = self.state.lock();
        state.identity_calls += 1;
        let fallback = CallOutcome::Success(state.self_id.clone());
        state.identity.pop_front().unwrap_or(fallback)
    }

    async fn fetch_recent_messages(
        &self,
        _channel: &str,
        limit: usize,
    ) -> CallOutcome<Vec<IncomingMessage>> {
        let mut state = self.state.lock();
        state.fetch_limits.push(limit);
        let fallback = state.default_fetch.clone();
        state.fetches.pop_front().unwrap_or(fallback)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> CallOutcome<()> {
        let mut state = self.state.lock();
        state.post_calls += 1;
        let fallback = state.default_post.clone();
        let outcome = state.posts.pop_front().unwrap_or(fallback);
        if outcome.is_success() {
            state.sent.push(SentMessage {
                channel: channel.to_string(),
                text: text.to_string(),
                reply_to,
            });
        }
        outcome
    }
}

struct ProviderState {
    queued: VecDeque<CallOutcome<String>>,
    fallback: CallOutcome<String>,
    prompts: Vec<String>,
}

/// Text provider that replays queued outcomes, then repeats a fallback.
pub struct ScriptedProvider {
    state: Mutex<ProviderState>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<CallOutcome<String>>) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                queued: outcomes.into(),
                fallback: CallOutcome::Failed(CallFailure::Network("script exhausted".into())),
                prompts: Vec::new(),
            }),
        }
    }

    pub fn repeating(outcome: CallOutcome<String>) -> Self {
        let provider = Self::new(Vec::new());
        provider.state.lock().fallback = outcome;
        provider
    }

    pub fn calls(&self) -> usize {
        self.state.lock().prompts.len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().prompts.clone()
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> CallOutcome<String> {
        let mut state = self.state.lock();
        state.prompts.push(prompt.to_string());
        let fallback = state.fallback.clone();
        state.queued.pop_front().unwrap_or(fallback)
    }
}

/// In-memory fallback pool.
pub struct StaticLines(Result<Vec<String>, FallbackError>);

impl StaticLines {
    pub fn ok(lines: &[&str]) -> Self {
        Self(Ok(lines.iter().map(ToString::to_string).collect()))
    }

    pub fn err(error: FallbackError) -> Self {
        Self(Err(error))
    }
}

#[async_trait]
impl FallbackSource for StaticLines {
    async fn list_lines(&self) -> Result<Vec<String>, FallbackError> {
        self.0.clone()
    }
}
