use crate::reply::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "AUTOREPLY_CONFIG";

// ── Top-level config ─────────────────────────────────────────────

/// Root configuration, loaded from `config.toml` and the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where this config was read from (computed, not serialized).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Defaults for `reply` mode; CLI flags override.
    #[serde(default)]
    pub reply: ReplyModeConfig,
    /// Defaults for `broadcast` mode; CLI flags override.
    #[serde(default)]
    pub broadcast: BroadcastModeConfig,
}

// ── Discord ──────────────────────────────────────────────────────

/// How the token is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscordAuthScheme {
    /// `Authorization: Bot <token>` (application bot accounts).
    #[default]
    Bot,
    /// `Authorization: <token>` as given.
    Raw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord token. Usually supplied through `DISCORD_TOKEN`.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub auth_scheme: DiscordAuthScheme,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
    /// How many recent messages each poll fetches.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v9".into()
}

fn default_fetch_limit() -> usize {
    5
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            auth_scheme: DiscordAuthScheme::default(),
            api_base: default_discord_api_base(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

// ── Gemini ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. Usually supplied through `GEMINI_API_KEY` or `GOOGLE_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
    /// Total attempts per reply, first try included.
    #[serde(default = "default_gemini_max_attempts")]
    pub max_attempts: u32,
    /// Wait after a 429 that carries no retry hint.
    #[serde(default = "default_gemini_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
    /// First backoff after a network failure; doubles each attempt.
    #[serde(default = "default_gemini_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_gemini_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash-latest".into()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_gemini_max_attempts() -> u32 {
    3
}

fn default_gemini_rate_limit_delay_secs() -> u64 {
    60
}

fn default_gemini_backoff_base_secs() -> u64 {
    5
}

fn default_gemini_backoff_max_secs() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            max_attempts: default_gemini_max_attempts(),
            rate_limit_delay_secs: default_gemini_rate_limit_delay_secs(),
            backoff_base_secs: default_gemini_backoff_base_secs(),
            backoff_max_secs: default_gemini_backoff_max_secs(),
        }
    }
}

// ── Sender ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Total attempts per send, first try included.
    #[serde(default = "default_sender_max_attempts")]
    pub max_attempts: u32,
    /// Wait after a 429 that carries no retry hint.
    #[serde(default = "default_sender_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
    /// Fixed wait after any other failure.
    #[serde(default = "default_sender_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_sender_max_attempts() -> u32 {
    3
}

fn default_sender_rate_limit_delay_secs() -> u64 {
    5
}

fn default_sender_retry_delay_secs() -> u64 {
    2
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_sender_max_attempts(),
            rate_limit_delay_secs: default_sender_rate_limit_delay_secs(),
            retry_delay_secs: default_sender_retry_delay_secs(),
        }
    }
}

// ── Pacing ───────────────────────────────────────────────────────

/// Loop-level timing shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Randomized delays land in `[base, base * (1 + jitter_ratio)]`.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// Consecutive loop failures before the long cooldown.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Wait after a rate-limited fetch that carries no retry hint.
    #[serde(default = "default_poll_rate_limit_delay_secs")]
    pub poll_rate_limit_delay_secs: u64,
}

fn default_jitter_ratio() -> f64 {
    0.25
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_poll_rate_limit_delay_secs() -> u64 {
    5
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            jitter_ratio: default_jitter_ratio(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            poll_rate_limit_delay_secs: default_poll_rate_limit_delay_secs(),
        }
    }
}

// ── Fallback pool ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// One canned message per line; blank lines are ignored.
    #[serde(default = "default_fallback_path")]
    pub path: PathBuf,
}

fn default_fallback_path() -> PathBuf {
    PathBuf::from("pesan.txt")
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: default_fallback_path(),
        }
    }
}

// ── Mode defaults ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyModeConfig {
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Ask Gemini for replies instead of using canned lines only.
    #[serde(default)]
    pub generate: bool,
    /// Post replies as threaded replies to the triggering message.
    #[serde(default)]
    pub reply_to_sender: bool,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub read_delay_secs: u64,
    #[serde(default)]
    pub reply_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastModeConfig {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_broadcast_interval_secs")]
    pub interval_secs: u64,
}

fn default_broadcast_interval_secs() -> u64 {
    60
}

impl Default for BroadcastModeConfig {
    fn default() -> Self {
        Self {
            channel_id: None,
            interval_secs: default_broadcast_interval_secs(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// `<config dir>/autoreply/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "autoreply")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load config with precedence: explicit path, `$AUTOREPLY_CONFIG`, the
    /// default location. An explicit or env-named file must exist; a missing
    /// default file yields built-in defaults. Environment overrides are
    /// applied last.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = non_empty(std::env::var(CONFIG_PATH_ENV).ok()).map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load_from_path(&path).await?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_path(&path).await?,
                None => {
                    tracing::debug!("No config file found; using built-in defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file.
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = non_empty(lookup("DISCORD_TOKEN")) {
            self.discord.token = token;
        }

        // GEMINI_API_KEY wins over the legacy GOOGLE_API_KEY.
        if let Some(key) =
            non_empty(lookup("GEMINI_API_KEY")).or_else(|| non_empty(lookup("GOOGLE_API_KEY")))
        {
            self.gemini.api_key = Some(key);
        }

        if let Some(model) = non_empty(lookup("GEMINI_MODEL")) {
            self.gemini.model = model;
        }

        if let Some(path) = non_empty(lookup("AUTOREPLY_FALLBACK_FILE")) {
            self.fallback.path = PathBuf::from(path);
        }
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after env and CLI overrides so the effective values are checked.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            anyhow::bail!("discord token is missing; set DISCORD_TOKEN or discord.token");
        }
        if self.discord.api_base.trim().is_empty() {
            anyhow::bail!("discord.api_base must not be empty");
        }
        if self.discord.fetch_limit == 0 || self.discord.fetch_limit > 100 {
            anyhow::bail!("discord.fetch_limit must be between 1 and 100");
        }
        if self.gemini.api_base.trim().is_empty() {
            anyhow::bail!("gemini.api_base must not be empty");
        }
        if self.gemini.max_attempts == 0 {
            anyhow::bail!("gemini.max_attempts must be greater than 0");
        }
        if self.sender.max_attempts == 0 {
            anyhow::bail!("sender.max_attempts must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.pacing.jitter_ratio) {
            anyhow::bail!("pacing.jitter_ratio must be between 0.0 and 1.0");
        }
        if self.pacing.failure_threshold == 0 {
            anyhow::bail!("pacing.failure_threshold must be greater than 0");
        }
        Ok(())
    }

    /// The Gemini key, required when generation is enabled.
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("generation is enabled but no Gemini key is set; set GEMINI_API_KEY")
    }
}

impl GeminiConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs.max(self.backoff_base_secs))
    }
}

impl SenderConfig {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl PacingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn poll_rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.poll_rate_limit_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.discord.token = "token".into();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.discord.api_base, "https://discord.com/api/v9");
        assert_eq!(config.discord.fetch_limit, 5);
        assert_eq!(config.gemini.max_attempts, 3);
        assert_eq!(config.gemini.rate_limit_delay_secs, 60);
        assert_eq!(config.sender.max_attempts, 3);
        assert_eq!(config.sender.rate_limit_delay_secs, 5);
        assert_eq!(config.pacing.failure_threshold, 5);
        assert_eq!(config.pacing.cooldown(), Duration::from_secs(300));
        assert_eq!(config.fallback.path, PathBuf::from("pesan.txt"));
        assert_eq!(config.reply.language, Language::Indonesian);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.discord.fetch_limit, 5);
        assert_eq!(config.broadcast.interval_secs, 60);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [discord]
            auth_scheme = "raw"
            fetch_limit = 10

            [reply]
            generate = true
            language = "en"
            read_delay_secs = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.discord.auth_scheme, DiscordAuthScheme::Raw);
        assert_eq!(config.discord.fetch_limit, 10);
        assert_eq!(config.discord.api_base, "https://discord.com/api/v9");
        assert!(config.reply.generate);
        assert_eq!(config.reply.language, Language::English);
        assert_eq!(config.reply.read_delay_secs, 7);
        assert_eq!(config.sender.max_attempts, 3);
    }

    #[test]
    fn unknown_language_is_rejected_at_parse_time() {
        let parsed: Result<Config, _> = toml::from_str("[reply]\nlanguage = \"fr\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn env_overrides_apply_non_empty_values() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[
            ("DISCORD_TOKEN", " abc "),
            ("GOOGLE_API_KEY", "google"),
            ("GEMINI_MODEL", ""),
            ("AUTOREPLY_FALLBACK_FILE", "lines.txt"),
        ]));
        assert_eq!(config.discord.token, "abc");
        assert_eq!(config.gemini.api_key.as_deref(), Some("google"));
        assert_eq!(config.gemini.model, "gemini-1.5-flash-latest");
        assert_eq!(config.fallback.path, PathBuf::from("lines.txt"));
    }

    #[test]
    fn gemini_key_env_wins_over_google_key() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup(&[
            ("GEMINI_API_KEY", "gemini"),
            ("GOOGLE_API_KEY", "google"),
        ]));
        assert_eq!(config.gemini.api_key.as_deref(), Some("gemini"));
    }

    #[test]
    fn validate_accepts_defaults_with_token() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_token() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn validate_rejects_zero_bounds() {
        let mut config = valid();
        config.sender.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.gemini.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.discord.fetch_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_jitter() {
        let mut config = valid();
        config.pacing.jitter_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn require_gemini_key_rejects_blank() {
        let mut config = valid();
        assert!(config.require_gemini_key().is_err());
        config.gemini.api_key = Some("  ".into());
        assert!(config.require_gemini_key().is_err());
        config.gemini.api_key = Some("k".into());
        assert_eq!(config.require_gemini_key().unwrap(), "k");
    }

    #[test]
    fn backoff_max_never_below_base() {
        let gemini = GeminiConfig {
            backoff_base_secs: 10,
            backoff_max_secs: 2,
            ..GeminiConfig::default()
        };
        assert_eq!(gemini.backoff_max(), Duration::from_secs(10));
    }
}
