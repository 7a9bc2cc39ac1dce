use crate::config::GeminiConfig;
use crate::outcome::{CallFailure, CallOutcome};
use crate::providers::TextProvider;
use crate::util::truncate_with_ellipsis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reply language. Each one maps to a fixed style directive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Language {
    /// Casual Jakarta slang.
    #[default]
    #[serde(rename = "id")]
    #[value(name = "id")]
    Indonesian,
    /// Casual urban English.
    #[serde(rename = "en")]
    #[value(name = "en")]
    English,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Indonesian, Language::English];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Indonesian => "id",
            Self::English => "en",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Indonesian => "Indonesian",
            Self::English => "English",
        }
    }

    pub fn style_directive(self) -> &'static str {
        match self {
            Self::Indonesian => {
                "Berikan 1 kalimat saja dalam bahasa gaul daerah Jakarta seperti obrolan \
                 dan jangan gunakan simbol apapun."
            }
            Self::English => {
                "Respond with only one sentence in casual urban English, like a natural \
                 conversation, and do not use symbols."
            }
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Indonesian),
            "en" => Ok(Self::English),
            other => Err(format!("unsupported language tag '{other}' (expected id or en)")),
        }
    }
}

/// Append the language's style directive to the incoming text.
pub fn compose_prompt(prompt: &str, language: Language) -> String {
    format!("{prompt}\n\n{}", language.style_directive())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("provider kept rate limiting for {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
    #[error("provider unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        attempts: u32,
        last_error: CallFailure,
    },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Retry bounds and delays for one `generate` call.
#[derive(Debug, Clone)]
pub struct GeneratorPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Wait after a rate limit without a hint.
    pub rate_limit_delay: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl From<&GeminiConfig> for GeneratorPolicy {
    fn from(config: &GeminiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_delay: config.rate_limit_delay(),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
        }
    }
}

impl GeneratorPolicy {
    /// Exponential backoff after the `attempt`-th failure: `base * 2^(attempt-1)`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max.max(self.backoff_base))
    }
}

enum LastFailure {
    RateLimited,
    Call(CallFailure),
}

/// Wraps a [`TextProvider`] with prompt styling, retry/backoff and
/// duplicate suppression against the previous accepted reply.
pub struct ReplyGenerator {
    provider: Box<dyn TextProvider>,
    policy: GeneratorPolicy,
    /// Last accepted generation; the duplicate baseline.
    last_reply: Option<String>,
}

impl ReplyGenerator {
    pub fn new(provider: Box<dyn TextProvider>, policy: GeneratorPolicy) -> Self {
        Self {
            provider,
            policy,
            last_reply: None,
        }
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// Generate a reply to `prompt` in `language`.
    ///
    /// Every retryable class (rate limit, network/HTTP failure, duplicate
    /// text) draws from the same attempt budget. A duplicate that survives
    /// every retry is returned anyway.
    pub async fn generate(
        &mut self,
        prompt: &str,
        language: Language,
    ) -> Result<String, GenerationError> {
        let composed = compose_prompt(prompt, language);
        let max_attempts = self.policy.max_attempts.max(1);
        let provider = self.provider.name().to_string();
        let mut last_failure: Option<LastFailure> = None;
        let mut duplicate: Option<String> = None;

        for attempt in 1..=max_attempts {
            let has_next = attempt < max_attempts;

            match self.provider.complete(&composed).await {
                CallOutcome::Success(text) => {
                    if self.last_reply.as_deref() == Some(text.as_str()) {
                        tracing::warn!(
                            provider = %provider,
                            attempt,
                            max_attempts,
                            "🔁 Generated reply repeats the previous one"
                        );
                        if has_next {
                            duplicate = Some(text);
                            continue;
                        }
                        return Ok(text);
                    }

                    tracing::info!(
                        provider = %provider,
                        attempt,
                        "✅ Generated reply: {}",
                        truncate_with_ellipsis(&text, 120)
                    );
                    self.last_reply = Some(text.clone());
                    return Ok(text);
                }
                CallOutcome::RateLimited { retry_after } => {
                    let wait = retry_after.unwrap_or(self.policy.rate_limit_delay);
                    last_failure = Some(LastFailure::RateLimited);
                    if has_next {
                        tracing::warn!(
                            provider = %provider,
                            attempt,
                            max_attempts,
                            retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                            hinted = retry_after.is_some(),
                            "⏳ Rate limited by provider, waiting before retry"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
                CallOutcome::Failed(CallFailure::Malformed(detail)) => {
                    tracing::warn!(provider = %provider, attempt, error = %detail, "⚠️ Provider response had no usable text");
                    return Err(GenerationError::MalformedResponse(detail));
                }
                CallOutcome::Failed(failure) => {
                    if has_next {
                        let wait = self.policy.backoff_for(attempt);
                        tracing::warn!(
                            provider = %provider,
                            attempt,
                            max_attempts,
                            backoff_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                            error = %failure,
                            "⚠️ Provider call failed, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_failure = Some(LastFailure::Call(failure));
                }
            }
        }

        if let Some(text) = duplicate {
            tracing::warn!(provider = %provider, "🔁 Retries exhausted, keeping duplicate reply");
            return Ok(text);
        }

        let err = match last_failure {
            Some(LastFailure::RateLimited) => GenerationError::RateLimitExhausted {
                attempts: max_attempts,
            },
            Some(LastFailure::Call(failure)) => GenerationError::Unavailable {
                attempts: max_attempts,
                last_error: failure,
            },
            None => GenerationError::Unavailable {
                attempts: max_attempts,
                last_error: CallFailure::Network("no attempt completed".into()),
            },
        };
        tracing::error!(provider = %provider, error = %err, "❌ Max retries reached for provider");
        Err(err)
    }
}
