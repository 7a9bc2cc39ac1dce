use crate::outcome::CallOutcome;
use async_trait::async_trait;

/// A generative-text backend: prompt in, text out.
///
/// One call is one HTTP round-trip. Retries, backoff and deduplication live
/// in [`ReplyGenerator`](crate::reply::ReplyGenerator), not here.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Complete `prompt`.
    ///
    /// A 2xx response without usable text is
    /// [`CallFailure::Malformed`](crate::outcome::CallFailure::Malformed).
    async fn complete(&self, prompt: &str) -> CallOutcome<String>;
}

#[async_trait]
impl<T: TextProvider + ?Sized> TextProvider for std::sync::Arc<T> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn complete(&self, prompt: &str) -> CallOutcome<String> {
        self.as_ref().complete(prompt).await
    }
}
