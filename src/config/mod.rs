pub mod schema;

pub use schema::{
    default_config_path, BroadcastModeConfig, Config, DiscordAuthScheme, DiscordConfig,
    FallbackConfig, GeminiConfig, PacingConfig, ReplyModeConfig, SenderConfig, CONFIG_PATH_ENV,
};
