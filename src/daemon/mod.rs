//! Wires config into the collaborators and runs the selected loop until a
//! termination signal arrives.

use crate::channels::{ChannelTransport, DiscordTransport};
use crate::config::Config;
use crate::providers::{GeminiProvider, TextProvider};
use crate::reply::{
    BroadcastSettings, CannedMessageProvider, ChannelPoller, FileFallbackSource, GeneratorPolicy,
    LoopPacing, MessageSender, PollSettings, RandomBroadcastLoop, ReplyGenerator, ReplyPipeline,
    ReplySettings, SenderPolicy,
};
use crate::ModeCommands;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Run the loop for `mode` against Discord and Gemini.
pub async fn run(config: Config, mode: &ModeCommands, cancel: CancellationToken) -> Result<()> {
    let transport: Arc<dyn ChannelTransport> = Arc::new(DiscordTransport::new(&config.discord));
    match mode {
        ModeCommands::Reply { .. } => {
            let provider: Option<Box<dyn TextProvider>> = if config.reply.generate {
                config.require_gemini_key()?;
                Some(Box::new(GeminiProvider::new(&config.gemini)))
            } else {
                None
            };
            run_reply(&config, transport, provider, cancel).await
        }
        ModeCommands::Broadcast { .. } => run_broadcast(&config, transport, cancel).await,
    }
}

fn canned_messages(config: &Config) -> CannedMessageProvider {
    CannedMessageProvider::new(Box::new(FileFallbackSource::new(&config.fallback.path)))
}

/// Reply mode. Fails only when our own identity cannot be resolved.
pub async fn run_reply(
    config: &Config,
    transport: Arc<dyn ChannelTransport>,
    provider: Option<Box<dyn TextProvider>>,
    cancel: CancellationToken,
) -> Result<()> {
    let reply = &config.reply;
    let channel = reply
        .channel_id
        .clone()
        .context("reply mode needs a channel id")?;
    let pacing = LoopPacing::from(&config.pacing);

    println!("🤖 autoreply reply mode");
    println!("   Channel:      {channel}");
    println!(
        "   Replies:      {}",
        if provider.is_some() {
            format!("generated ({}, {})", config.gemini.model, reply.language.label())
        } else {
            format!("canned ({})", config.fallback.path.display())
        }
    );
    println!("   Reply mode:   {}", if reply.reply_to_sender { "threaded" } else { "plain" });
    println!("   Read delay:   {}s", reply.read_delay_secs);
    println!("   Reply delay:  {}s", reply.reply_delay_secs);
    println!("   Ctrl+C to stop");
    tracing::info!(
        channel = %channel,
        generate = provider.is_some(),
        language = reply.language.tag(),
        reply_to_sender = reply.reply_to_sender,
        read_delay_secs = reply.read_delay_secs,
        reply_delay_secs = reply.reply_delay_secs,
        "Starting reply loop"
    );

    let generator =
        provider.map(|provider| ReplyGenerator::new(provider, GeneratorPolicy::from(&config.gemini)));
    let sender = MessageSender::new(Arc::clone(&transport), SenderPolicy::from(&config.sender));
    let pipeline = ReplyPipeline::new(
        generator,
        canned_messages(config),
        sender,
        ReplySettings {
            channel: channel.clone(),
            reply_to_sender: reply.reply_to_sender,
            language: reply.language,
            reply_delay: Duration::from_secs(reply.reply_delay_secs),
            jitter_ratio: pacing.jitter_ratio,
        },
    );

    let poller = ChannelPoller::initialize(
        transport,
        pipeline,
        PollSettings {
            channel,
            fetch_limit: config.discord.fetch_limit,
            read_delay: Duration::from_secs(reply.read_delay_secs),
            rate_limit_delay: config.pacing.poll_rate_limit_delay(),
            pacing,
        },
    )
    .await?;

    poller.run(cancel).await;
    Ok(())
}

/// Broadcast mode. Never fails once started.
pub async fn run_broadcast(
    config: &Config,
    transport: Arc<dyn ChannelTransport>,
    cancel: CancellationToken,
) -> Result<()> {
    let broadcast = &config.broadcast;
    let channel = broadcast
        .channel_id
        .clone()
        .context("broadcast mode needs a channel id")?;

    println!("📢 autoreply broadcast mode");
    println!("   Channel:   {channel}");
    println!("   Interval:  {}s", broadcast.interval_secs);
    println!("   Messages:  {}", config.fallback.path.display());
    println!("   Ctrl+C to stop");
    tracing::info!(
        channel = %channel,
        interval_secs = broadcast.interval_secs,
        "Starting broadcast loop"
    );

    let broadcast_loop = RandomBroadcastLoop::new(
        canned_messages(config),
        MessageSender::new(transport, SenderPolicy::from(&config.sender)),
        BroadcastSettings {
            channel,
            interval: Duration::from_secs(broadcast.interval_secs),
            pacing: LoopPacing::from(&config.pacing),
        },
    );
    broadcast_loop.run(cancel).await;
    Ok(())
}

/// Cancel `cancel` on Ctrl-C, or SIGTERM on unix.
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown requested, stopping after the current iteration");
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
