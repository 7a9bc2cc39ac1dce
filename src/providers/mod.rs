//! Generative-text providers.
//!
//! [`TextProvider`] is the single seam the reply generator depends on;
//! [`GeminiProvider`] is the only implementation today.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiProvider;
pub use traits::TextProvider;
