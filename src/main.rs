#![doc = include_str!("../README.md")]

mod cli;
mod client;
mod dataset;
mod engine;
mod hints;
mod pipeline;
mod prelude;
mod tracing;

use std::sync::Arc;

use clap::Parser;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use secrecy::SecretString;

use crate::{
    cli::{Cli, Command},
    dataset::RemoteDataset,
    engine::{
        Engine,
        gemini::{Gemini, client::GeminiClient},
        local::{LocalEngine, scene::SceneClassifier, text::TesseractReader},
        openai::{OpenAi, client::OpenAiClient},
    },
    hints::HintSource,
    pipeline::{AnalysisRequest, Pipeline},
    prelude::*,
};

#[tokio::main]
async fn main() -> Result {
    let cli = Cli::parse();
    let (_sentry_guard, _tracing_guard) = tracing::init(cli.sentry_dsn.as_deref())?;
    let client = ClientBuilder::new(client::build_client()?).build();

    match &cli.command {
        Command::Analyze { image, preference, no_hints } => {
            let image_bytes = read_image(image).await?;
            let pipeline = build_pipeline(&cli, &client, *no_hints);
            let request = AnalysisRequest::builder()
                .image(image_bytes)
                .maybe_preference(preference.clone())
                .build();
            let analysis = pipeline.run(request).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Hints { image, preference } => {
            let image_bytes = read_image(image).await?;
            let hint_source =
                hint_source(&cli, &client).context("`--hint-relay-url` is not set")?;
            println!("{}", hint_source.fetch(&image_bytes, preference.as_deref()).await);
        }
    }
    Ok(())
}

async fn read_image(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read `{}`", path.display()))
}

/// Assemble the engine sequence from the configuration: configured
/// remotes in priority order, the on-device fallback always last.
fn build_pipeline(cli: &Cli, client: &ClientWithMiddleware, no_hints: bool) -> Pipeline {
    let mut engines: Vec<Box<dyn Engine>> = Vec::new();
    if let Some(api_key) = &cli.gemini_api_key {
        engines.push(Box::new(Gemini(
            GeminiClient::builder()
                .client(client.clone())
                .api_key(SecretString::from(api_key.clone()))
                .model(cli.gemini_model.clone())
                .build(),
        )));
    }
    if let Some(api_key) = &cli.openai_api_key {
        engines.push(Box::new(OpenAi(
            OpenAiClient::builder()
                .client(client.clone())
                .api_key(SecretString::from(api_key.clone()))
                .model(cli.openai_model.clone())
                .build(),
        )));
    }
    if engines.is_empty() {
        warn!("⚠️ No remote engine is configured, relying on the on-device fallback only");
    }
    engines.push(Box::new(
        LocalEngine::builder()
            .classifier(Arc::new(SceneClassifier))
            .reader(Arc::new(TesseractReader::new(cli.ocr_languages.clone())))
            .dataset(Arc::new(
                RemoteDataset::builder()
                    .client(client.clone())
                    .maybe_url(cli.dataset_url.clone())
                    .build(),
            ))
            .build(),
    ));
    Pipeline::builder()
        .maybe_hint_source(if no_hints { None } else { hint_source(cli, client) })
        .engines(engines)
        .low_confidence_threshold(cli.low_confidence_threshold)
        .build()
}

fn hint_source(cli: &Cli, client: &ClientWithMiddleware) -> Option<HintSource> {
    cli.hint_relay_url.clone().map(|relay_url| {
        HintSource::builder()
            .client(client.clone())
            .host_url(cli.image_host_url.clone())
            .relay_url(relay_url)
            .build()
    })
}
