use async_trait::async_trait;

use crate::{
    engine::{Engine, EngineError, gemini::client::GeminiClient, guess::LocationGuess, prompt},
    prelude::*,
};

pub mod client;

/// Gemini multimodal backend, first in the default priority order.
#[must_use]
#[derive(Clone)]
pub struct Gemini(pub GeminiClient);

#[async_trait]
impl Engine for Gemini {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    #[instrument(skip_all)]
    async fn infer(
        &self,
        image: &[u8],
        hints: &str,
        preference: Option<&str>,
    ) -> Result<LocationGuess, EngineError> {
        let instruction = prompt::instruction(hints, preference);
        self.0.generate(image, &instruction).await?.into_guess(self.name())
    }
}
