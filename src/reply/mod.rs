//! The auto-reply core.
//!
//! Two loops live here, and a process runs exactly one of them:
//!
//! - [`ChannelPoller`] (reply mode) polls a channel, filters out our own and
//!   system messages, and hands each new message to the [`ReplyPipeline`],
//!   which drafts a reply with the [`ReplyGenerator`] or the
//!   [`CannedMessageProvider`] and posts it through the [`MessageSender`].
//! - [`RandomBroadcastLoop`] (broadcast mode) posts a random canned line on a
//!   fixed cadence.
//!
//! Every remote call goes through a collaborator trait
//! ([`ChannelTransport`](crate::channels::ChannelTransport),
//! [`TextProvider`](crate::providers::TextProvider), [`FallbackSource`]) and
//! comes back as a [`CallOutcome`](crate::outcome::CallOutcome).

pub mod broadcast;
pub mod canned;
pub mod generator;
pub mod pacing;
pub mod pipeline;
pub mod poller;
pub mod sender;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::{BroadcastOutcome, BroadcastSettings, RandomBroadcastLoop};
pub use canned::{CannedMessageProvider, FallbackSource, FileFallbackSource};
pub use generator::{GenerationError, GeneratorPolicy, Language, ReplyGenerator};
pub use pacing::LoopPacing;
pub use pipeline::{DraftSource, ReplyDraft, ReplyPipeline, ReplySettings};
pub use poller::{ChannelPoller, PollOutcome, PollSettings, StartupError};
pub use sender::{MessageSender, SenderPolicy};
