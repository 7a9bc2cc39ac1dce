#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::items_after_statements,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::cast_precision_loss
)]

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod channels;
pub mod config;
pub mod daemon;
pub mod onboard;
pub mod outcome;
pub mod providers;
pub mod reply;
pub(crate) mod util;

pub use config::Config;
pub use reply::Language;

/// Run modes. A process runs exactly one.
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModeCommands {
    /// Reply to new messages in a channel
    #[command(long_about = "\
Reply to new messages in a channel.

Polls the channel, skips our own and system messages, and answers every \
new message oldest first, either with a Gemini-generated sentence or a \
random line from the fallback file.

Examples:
  autoreply reply --channel 123456789012345678 --generate --language en
  autoreply reply --channel 123456789012345678 --read-delay 10 --reply-delay 5")]
    Reply {
        /// Channel ID to watch
        #[arg(long)]
        channel: Option<String>,
        /// Generate replies with Gemini instead of canned lines only
        #[arg(long)]
        generate: bool,
        /// Post as a threaded reply to the triggering message
        #[arg(long)]
        reply_to_sender: bool,
        /// Reply language
        #[arg(long, value_enum)]
        language: Option<Language>,
        /// Seconds between polls
        #[arg(long)]
        read_delay: Option<u64>,
        /// Seconds between drafting and sending a reply
        #[arg(long)]
        reply_delay: Option<u64>,
    },
    /// Post a random canned line to a channel on an interval
    Broadcast {
        /// Channel ID to post to
        #[arg(long)]
        channel: Option<String>,
        /// Seconds between posts
        #[arg(long)]
        interval: Option<u64>,
    },
}

impl ModeCommands {
    /// Fold CLI flags into `config`. Flags win over file and env values.
    pub fn apply_to(&self, config: &mut Config) {
        match self {
            Self::Reply {
                channel,
                generate,
                reply_to_sender,
                language,
                read_delay,
                reply_delay,
            } => {
                let reply = &mut config.reply;
                if let Some(channel) = channel {
                    reply.channel_id = Some(channel.clone());
                }
                reply.generate |= *generate;
                reply.reply_to_sender |= *reply_to_sender;
                if let Some(language) = language {
                    reply.language = *language;
                }
                if let Some(secs) = read_delay {
                    reply.read_delay_secs = *secs;
                }
                if let Some(secs) = reply_delay {
                    reply.reply_delay_secs = *secs;
                }
            }
            Self::Broadcast { channel, interval } => {
                let broadcast = &mut config.broadcast;
                if let Some(channel) = channel {
                    broadcast.channel_id = Some(channel.clone());
                }
                if let Some(secs) = interval {
                    broadcast.interval_secs = *secs;
                }
            }
        }
    }

    /// Channel for this mode after config merging, if any.
    pub fn resolved_channel<'a>(&self, config: &'a Config) -> Option<&'a str> {
        let channel = match self {
            Self::Reply { .. } => config.reply.channel_id.as_deref(),
            Self::Broadcast { .. } => config.broadcast.channel_id.as_deref(),
        };
        channel.map(str::trim).filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_flags() -> ModeCommands {
        ModeCommands::Reply {
            channel: Some("123".into()),
            generate: true,
            reply_to_sender: false,
            language: Some(Language::English),
            read_delay: Some(7),
            reply_delay: None,
        }
    }

    #[test]
    fn reply_flags_override_config() {
        let mut config = Config::default();
        config.reply.reply_delay_secs = 4;
        config.reply.reply_to_sender = true;

        reply_flags().apply_to(&mut config);

        assert_eq!(config.reply.channel_id.as_deref(), Some("123"));
        assert!(config.reply.generate);
        // absent bool flag keeps the configured value
        assert!(config.reply.reply_to_sender);
        assert_eq!(config.reply.language, Language::English);
        assert_eq!(config.reply.read_delay_secs, 7);
        assert_eq!(config.reply.reply_delay_secs, 4);
    }

    #[test]
    fn broadcast_flags_override_config() {
        let mut config = Config::default();
        ModeCommands::Broadcast {
            channel: Some("77".into()),
            interval: Some(15),
        }
        .apply_to(&mut config);

        assert_eq!(config.broadcast.channel_id.as_deref(), Some("77"));
        assert_eq!(config.broadcast.interval_secs, 15);
        assert!(config.reply.channel_id.is_none());
    }

    #[test]
    fn resolved_channel_ignores_blank_values() {
        let mut config = Config::default();
        let mode = ModeCommands::Broadcast {
            channel: None,
            interval: None,
        };
        assert_eq!(mode.resolved_channel(&config), None);

        config.broadcast.channel_id = Some("  ".into());
        assert_eq!(mode.resolved_channel(&config), None);

        config.broadcast.channel_id = Some("55".into());
        assert_eq!(mode.resolved_channel(&config), Some("55"));
    }
}
