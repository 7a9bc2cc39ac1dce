use crate::config::{BroadcastModeConfig, Config, ReplyModeConfig};
use crate::reply::Language;
use crate::ModeCommands;
use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Select};

const MODE_ITEMS: [&str; 2] = [
    "Auto reply: answer new messages in a channel",
    "Broadcast: post random canned lines on an interval",
];

/// Discord snowflakes are unsigned 64-bit integers.
pub fn validate_channel_id(input: &str) -> Result<(), String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("channel id cannot be empty".into());
    }
    trimmed
        .parse::<u64>()
        .map(|_| ())
        .map_err(|_| format!("'{trimmed}' is not a numeric channel id"))
}

fn language_index(language: Language) -> usize {
    Language::ALL
        .iter()
        .position(|l| *l == language)
        .unwrap_or_default()
}

fn print_header(title: &str) {
    println!();
    println!("  {} {}", style("⚙").cyan().bold(), style(title).white().bold());
    println!();
}

fn prompt_channel(current: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new()
        .with_prompt("  Channel ID")
        .validate_with(|value: &String| validate_channel_id(value));
    if let Some(current) = current.filter(|c| !c.trim().is_empty()) {
        input = input.default(current.to_string());
    }
    Ok(input.interact_text()?.trim().to_string())
}

fn prompt_secs(prompt: &str, default: u64) -> Result<u64> {
    Ok(Input::<u64>::new()
        .with_prompt(prompt)
        .default(default)
        .interact_text()?)
}

/// Ask which mode to run, then collect its settings.
pub fn run_mode_wizard(config: &mut Config) -> Result<ModeCommands> {
    print_header("autoreply setup");
    let index = Select::new()
        .with_prompt("  Select mode")
        .items(&MODE_ITEMS)
        .default(0)
        .interact()?;

    if index == 0 {
        prompt_reply_settings(&mut config.reply)?;
        Ok(ModeCommands::Reply {
            channel: None,
            generate: false,
            reply_to_sender: false,
            language: None,
            read_delay: None,
            reply_delay: None,
        })
    } else {
        prompt_broadcast_settings(&mut config.broadcast)?;
        Ok(ModeCommands::Broadcast {
            channel: None,
            interval: None,
        })
    }
}

/// Collect reply-mode settings, offering the current values as defaults.
pub fn prompt_reply_settings(reply: &mut ReplyModeConfig) -> Result<()> {
    reply.channel_id = Some(prompt_channel(reply.channel_id.as_deref())?);
    reply.generate = Confirm::new()
        .with_prompt("  Generate replies with Google Gemini?")
        .default(reply.generate)
        .interact()?;
    reply.reply_to_sender = Confirm::new()
        .with_prompt("  Post as a threaded reply to the sender?")
        .default(reply.reply_to_sender)
        .interact()?;

    if reply.generate {
        let labels: Vec<&str> = Language::ALL.iter().map(|l| l.label()).collect();
        let index = Select::new()
            .with_prompt("  Reply language")
            .items(&labels)
            .default(language_index(reply.language))
            .interact()?;
        reply.language = Language::ALL[index];
    }

    reply.read_delay_secs = prompt_secs("  Delay between reads (seconds)", reply.read_delay_secs)?;
    reply.reply_delay_secs = prompt_secs("  Delay before replying (seconds)", reply.reply_delay_secs)?;
    Ok(())
}

/// Collect broadcast-mode settings, offering the current values as defaults.
pub fn prompt_broadcast_settings(broadcast: &mut BroadcastModeConfig) -> Result<()> {
    broadcast.channel_id = Some(prompt_channel(broadcast.channel_id.as_deref())?);
    broadcast.interval_secs =
        prompt_secs("  Interval between messages (seconds)", broadcast.interval_secs)?;
    Ok(())
}

/// Prompt for whatever the chosen mode still lacks after config and flags.
pub fn complete_missing(mode: &ModeCommands, config: &mut Config) -> Result<()> {
    if mode.resolved_channel(config).is_some() {
        return Ok(());
    }
    match mode {
        ModeCommands::Reply { .. } => {
            print_header("Reply mode setup");
            prompt_reply_settings(&mut config.reply)
        }
        ModeCommands::Broadcast { .. } => {
            print_header("Broadcast mode setup");
            prompt_broadcast_settings(&mut config.broadcast)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_must_be_numeric() {
        assert!(validate_channel_id("123456789012345678").is_ok());
        assert!(validate_channel_id("  42 ").is_ok());
        assert!(validate_channel_id("").is_err());
        assert!(validate_channel_id("general").is_err());
        assert!(validate_channel_id("-5").is_err());
    }

    #[test]
    fn language_index_matches_select_order() {
        assert_eq!(language_index(Language::Indonesian), 0);
        assert_eq!(language_index(Language::English), 1);
        assert_eq!(Language::ALL[language_index(Language::English)], Language::English);
    }

    #[test]
    fn complete_missing_is_noop_when_channel_known() {
        let mut config = Config::default();
        config.reply.channel_id = Some("42".into());
        let mode = ModeCommands::Reply {
            channel: None,
            generate: false,
            reply_to_sender: false,
            language: None,
            read_delay: None,
            reply_delay: None,
        };
        complete_missing(&mode, &mut config).unwrap();
        assert_eq!(config.reply.channel_id.as_deref(), Some("42"));
    }
}
