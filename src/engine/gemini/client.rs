use base64::{Engine as _, engine::general_purpose::STANDARD};
use bon::Builder;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{
    engine::{EngineError, guess::RawGuess, prompt},
    prelude::*,
};

#[must_use]
#[derive(Clone, Builder)]
pub struct GeminiClient {
    client: ClientWithMiddleware,
    api_key: SecretString,

    #[builder(into)]
    model: String,

    #[builder(default = Url::parse("https://generativelanguage.googleapis.com").unwrap())]
    root_url: Url,
}

impl GeminiClient {
    /// Request a schema-constrained guess for the image.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn generate(&self, image: &[u8], instruction: &str) -> Result<RawGuess, EngineError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: STANDARD.encode(image),
                        },
                    },
                    Part::Text { text: instruction },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
            },
        };
        let mut url = self
            .root_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .context("failed to build the endpoint URL")?;
        url.query_pairs_mut().append_pair("key", self.api_key.expose_secret());
        let response: GenerateContentResponse = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to deserialize the generation response")?;
        response.into_raw_guess()
    }
}

#[must_use]
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,

    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'a str,

    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn into_raw_guess(self) -> Result<RawGuess, EngineError> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(EngineError::InvalidResponse("no candidate content"))?;
        serde_json::from_str(&text)
            .map_err(|_| EngineError::InvalidResponse("unparseable guess payload"))
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_generation_response_ok() -> Result {
        // language=json
        let response: GenerateContentResponse = serde_json::from_str(
            r#"
            {
              "candidates": [
                {
                  "content": {
                    "parts": [
                      {
                        "text": "{\"latitude\": 21.0278, \"longitude\": 105.8342, \"city\": \"Hanoi\", \"country\": \"Vietnam\", \"confidence\": 0.85, \"reasoning\": \"Hoan Kiem Lake and the red Huc Bridge are visible.\", \"visual_analysis_summary\": \"lake, red bridge, scooters\"}"
                      }
                    ],
                    "role": "model"
                  },
                  "finishReason": "STOP",
                  "index": 0
                }
              ],
              "modelVersion": "gemini-2.0-flash"
            }"#,
        )?;
        let raw = response.into_raw_guess()?;
        assert_eq!(raw.latitude, Some(21.0278));
        assert_eq!(raw.city.as_deref(), Some("Hanoi"));
        Ok(())
    }

    #[test]
    fn empty_candidates_fail_ok() -> Result {
        // language=json
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#)?;
        assert!(matches!(
            response.into_raw_guess(),
            Err(EngineError::InvalidResponse("no candidate content")),
        ));
        Ok(())
    }

    #[test]
    fn non_json_payload_fails_ok() -> Result {
        // language=json
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "somewhere in Asia"}]}}]}"#,
        )?;
        assert!(matches!(
            response.into_raw_guess(),
            Err(EngineError::InvalidResponse("unparseable guess payload")),
        ));
        Ok(())
    }
}
