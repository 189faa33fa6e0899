use base64::{Engine as _, engine::general_purpose::STANDARD};
use bon::Builder;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::{
    engine::{EngineError, guess::RawGuess, prompt},
    prelude::*,
};

#[must_use]
#[derive(Clone, Builder)]
pub struct OpenAiClient {
    client: ClientWithMiddleware,
    api_key: SecretString,

    #[builder(into)]
    model: String,

    #[builder(default = Url::parse("https://api.openai.com").unwrap())]
    root_url: Url,
}

impl OpenAiClient {
    /// Request a schema-constrained guess for the image.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn complete(&self, image: &[u8], instruction: &str) -> Result<RawGuess, EngineError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: instruction },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", STANDARD.encode(image)),
                        },
                    },
                ],
            }],
            response_format: response_format(),
        };
        let url = self
            .root_url
            .join("v1/chat/completions")
            .context("failed to build the endpoint URL")?;
        let response: ChatResponse = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the completion response")?;
        response.into_raw_guess()
    }
}

fn response_format() -> Value {
    // Strict mode additionally requires `additionalProperties: false`.
    let mut schema = prompt::response_schema();
    schema["additionalProperties"] = Value::Bool(false);
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "location_guess",
            "strict": true,
            "schema": schema,
        },
    })
}

#[must_use]
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: Value,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatResponse {
    fn into_raw_guess(self) -> Result<RawGuess, EngineError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(EngineError::InvalidResponse("no choices"))?;
        serde_json::from_str(&content)
            .map_err(|_| EngineError::InvalidResponse("unparseable guess payload"))
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
