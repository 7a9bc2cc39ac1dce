use crate::outcome::CallOutcome;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-ordered message identifier.
///
/// Identifiers grow monotonically with message age, so numeric ordering is
/// chronological ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MessageId)
    }
}

/// Whether a message was written by someone or emitted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Ordinary,
    /// Joins, pins, boosts, thread notices and the like.
    SystemEvent,
}

/// A message fetched from a channel. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub author_text: String,
    pub author_id: String,
    pub kind: MessageKind,
}

/// Channel transport: the three operations the reply loop needs from a chat
/// platform. Implement for any messaging platform with a REST-style history.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Identifier of the identity this process posts as.
    async fn resolve_self_identity(&self) -> CallOutcome<String>;

    /// Fetch up to `limit` of the most recent messages, in any order.
    async fn fetch_recent_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> CallOutcome<Vec<IncomingMessage>>;

    /// Post `text` to `channel`, optionally as a reply to `reply_to`.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> CallOutcome<()>;
}
