use async_trait::async_trait;

use crate::{
    engine::{Engine, EngineError, guess::LocationGuess, openai::client::OpenAiClient, prompt},
    prelude::*,
};

pub mod client;

/// OpenAI multimodal backend, second in the default priority order.
#[must_use]
#[derive(Clone)]
pub struct OpenAi(pub OpenAiClient);

#[async_trait]
impl Engine for OpenAi {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    #[instrument(skip_all)]
    async fn infer(
        &self,
        image: &[u8],
        hints: &str,
        preference: Option<&str>,
    ) -> Result<LocationGuess, EngineError> {
        let instruction = prompt::instruction(hints, preference);
        self.0.complete(image, &instruction).await?.into_guess(self.name())
    }
}
