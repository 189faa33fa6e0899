//! Inference engines: anything capable of producing a location guess.

pub mod gemini;
pub mod guess;
pub mod local;
pub mod openai;
pub mod prompt;

mod error;

use async_trait::async_trait;

pub use self::{error::EngineError, guess::LocationGuess};

/// A location inference backend, remote or on-device.
///
/// Engines never surface their own identity in the guess: the pipeline
/// stamps [`LocationGuess::source`] from [`Engine::name`] on acceptance.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce a guess for the image, taking the reverse-image-search
    /// narrative and the caller's preference into account.
    async fn infer(
        &self,
        image: &[u8],
        hints: &str,
        preference: Option<&str>,
    ) -> Result<LocationGuess, EngineError>;
}
