//! Google Gemini text provider.
//!
//! Uses the public `generateContent` endpoint with an API key sent as the
//! `?key=` query parameter (`GEMINI_API_KEY` / `GOOGLE_API_KEY` env var or
//! config).

use crate::config::GeminiConfig;
use crate::outcome::{retry_after_from_headers, CallFailure, CallOutcome};
use crate::providers::traits::TextProvider;
use crate::util::sanitize_api_error;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct GeminiProvider {
    api_key: String,
    model: String,
    api_base: String,
    client: Client,
}

// ══════════════════════════════════════════════════════════════════════════════
// API REQUEST/RESPONSE TYPES
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

/// `google.rpc.RetryInfo` and friends; only `retryDelay` matters here.
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "retryDelay")]
    retry_delay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

/// Parse a protobuf `Duration` JSON string such as `"42s"` or `"7.5s"`.
fn parse_proto_duration(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    crate::outcome::retry_after_from_secs(secs)
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .filter(|t| !t.trim().is_empty())
    }
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn format_model_name(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.api_base,
            Self::format_model_name(&self.model)
        )
    }

    fn rate_limit_hint(headers: &reqwest::header::HeaderMap, body: &str) -> Option<Duration> {
        retry_after_from_headers(headers).or_else(|| {
            serde_json::from_str::<ErrorEnvelope>(body)
                .ok()?
                .error
                .details
                .iter()
                .find_map(|d| d.retry_delay.as_deref().and_then(parse_proto_duration))
        })
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> CallOutcome<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = match self
            .client
            .post(self.generate_content_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            // reqwest errors embed the URL, which carries the key
            Err(e) => {
                return CallOutcome::Failed(CallFailure::Network(sanitize_api_error(
                    &e.without_url().to_string(),
                )))
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return CallOutcome::Failed(CallFailure::Network(sanitize_api_error(
                    &e.without_url().to_string(),
                )))
            }
        };

        if status.as_u16() == 429 {
            return CallOutcome::RateLimited {
                retry_after: Self::rate_limit_hint(&headers, &body),
            };
        }

        if !status.is_success() {
            return CallOutcome::Failed(CallFailure::Status {
                status: status.as_u16(),
                detail: sanitize_api_error(&body),
            });
        }

        let parsed: GenerateContentResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => return CallOutcome::Failed(CallFailure::Malformed(e.to_string())),
        };

        if let Some(err) = &parsed.error {
            return CallOutcome::Failed(CallFailure::Malformed(sanitize_api_error(&err.message)));
        }

        match parsed.first_text() {
            Some(text) => CallOutcome::Success(text.trim().to_string()),
            None => CallOutcome::Failed(CallFailure::Malformed(
                "no candidate text in Gemini response".into(),
            )),
        }
    }
}
