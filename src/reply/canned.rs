//! Canned fallback messages.
//!
//! The pool is re-read on every pick, so edits to the lines file take effect
//! without a restart. Problems with the pool never fail the caller: they are
//! turned into a fixed sentinel text and logged.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Text used when the pool exists but holds no usable line.
pub const EMPTY_POOL_TEXT: &str = "No messages available";
/// Text used when the pool exists but cannot be read.
pub const UNREADABLE_POOL_TEXT: &str = "Error reading messages";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("failed to read {name}: {reason}")]
    Unreadable { name: String, reason: String },
}

/// Source of fallback lines.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// Non-empty, trimmed lines. May be empty.
    async fn list_lines(&self) -> Result<Vec<String>, FallbackError>;
}

/// Lines file on disk, one message per line.
pub struct FileFallbackSource {
    path: PathBuf,
}

impl FileFallbackSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn display_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Split file contents into usable lines.
fn usable_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[async_trait]
impl FallbackSource for FileFallbackSource {
    async fn list_lines(&self) -> Result<Vec<String>, FallbackError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(usable_lines(&contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FallbackError::NotFound(self.display_name()))
            }
            Err(e) => Err(FallbackError::Unreadable {
                name: self.display_name(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Result of drawing from the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CannedPick {
    Line(String),
    /// The pool could not supply a line; carries the sentinel text to send.
    Unavailable(String),
}

impl CannedPick {
    pub fn into_text(self) -> String {
        match self {
            Self::Line(text) | Self::Unavailable(text) => text,
        }
    }
}

pub struct CannedMessageProvider {
    source: Box<dyn FallbackSource>,
}

impl CannedMessageProvider {
    pub fn new(source: Box<dyn FallbackSource>) -> Self {
        Self { source }
    }

    /// Uniformly random line, with replacement, or a sentinel.
    pub async fn pick(&self) -> CannedPick {
        match self.source.list_lines().await {
            Ok(lines) if lines.is_empty() => {
                tracing::warn!("⚠️ Canned message pool is empty");
                CannedPick::Unavailable(EMPTY_POOL_TEXT.to_string())
            }
            Ok(mut lines) => {
                #[allow(clippy::cast_possible_truncation)]
                let index = (rand::random::<u64>() % lines.len() as u64) as usize;
                CannedPick::Line(lines.swap_remove(index))
            }
            Err(FallbackError::NotFound(name)) => {
                tracing::warn!(file = %name, "⚠️ Canned message file not found");
                CannedPick::Unavailable(format!("{name} not found"))
            }
            Err(err) => {
                tracing::warn!(error = %err, "⚠️ Error reading canned messages");
                CannedPick::Unavailable(UNREADABLE_POOL_TEXT.to_string())
            }
        }
    }

    /// Text to send; never fails.
    pub async fn next(&self) -> String {
        self.pick().await.into_text()
    }
}
