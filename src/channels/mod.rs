//! Channel transports.
//!
//! The reply loop talks to a chat platform only through the
//! [`ChannelTransport`] trait defined in [`traits`]: resolve our own identity,
//! fetch a small window of recent messages, post a message (optionally as a
//! reply). [`DiscordTransport`] is the REST implementation shipped with the
//! binary.
//!
//! # Extension
//!
//! To add a platform, implement [`ChannelTransport`] in a new submodule and
//! construct it in `main.rs`. Report HTTP 429 as
//! [`CallOutcome::RateLimited`](crate::outcome::CallOutcome::RateLimited) with
//! the platform's retry hint so the sender and poller can honour it.

pub mod discord;
pub mod traits;

pub use discord::DiscordTransport;
pub use traits::{ChannelTransport, IncomingMessage, MessageId, MessageKind};
