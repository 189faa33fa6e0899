use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use bon::Builder;
use futures::future;

use crate::{
    dataset::{DatasetSource, Entry},
    engine::{Engine, EngineError, guess::LocationGuess},
    prelude::*,
};

pub mod scene;
pub mod text;

pub const TEXT_MATCH_CONFIDENCE: f64 = 0.7;
pub const LABEL_MATCH_CONFIDENCE: f64 = 0.4;
pub const NO_MATCH_CONFIDENCE: f64 = 0.2;

/// Produces coarse object and scene labels for an image.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Vec<String>>;
}

/// Extracts free text from an image, tolerant of multiple scripts.
#[async_trait]
pub trait TextReader: Send + Sync {
    async fn read(&self, image: &[u8]) -> Result<String>;
}

/// On-device terminal engine: recognized terms are resolved against the
/// keyed location dataset.
///
/// Always produces a structurally valid guess: when nothing matches, or
/// the dataset cannot be loaded, it falls back to a fixed low-confidence
/// default. The only failure path is a recognizer that cannot load or
/// run at all.
#[must_use]
#[derive(Builder)]
pub struct LocalEngine {
    classifier: Arc<dyn Classifier>,
    reader: Arc<dyn TextReader>,
    dataset: Arc<dyn DatasetSource>,
}

#[async_trait]
impl Engine for LocalEngine {
    fn name(&self) -> &'static str {
        "Local fallback"
    }

    #[instrument(skip_all)]
    async fn infer(
        &self,
        image: &[u8],
        _hints: &str,
        _preference: Option<&str>,
    ) -> Result<LocationGuess, EngineError> {
        // The recognizers share no state and both gate the matching step.
        let (text, labels) =
            future::try_join(self.reader.read(image), self.classifier.classify(image)).await?;
        let dataset = match self.dataset.fetch().await {
            Ok(dataset) => dataset,
            Err(error) => {
                warn!("⚠️ Location dataset unavailable: {error:#}");
                return Ok(default_guess());
            }
        };
        for (term, origin) in candidates(&text, &labels) {
            if let Some(entry) = dataset.lookup(&term) {
                info!(%term, "🔎 Matched the on-device location index");
                return Ok(matched_guess(&term, origin, entry, &labels));
            }
        }
        Ok(default_guess())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermOrigin {
    Text,
    Label,
}

/// Normalize both recognizer outputs into one ordered, deduplicated
/// candidate list. Text tokens come first, so a text-derived match beats
/// a label-derived one for the same dataset.
fn candidates(text: &str, labels: &[String]) -> Vec<(String, TermOrigin)> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for token in text.split(|character: char| !character.is_alphanumeric()) {
        if token.chars().count() > 3 && token.chars().all(char::is_alphabetic) {
            let term = token.to_lowercase();
            if seen.insert(term.clone()) {
                candidates.push((term, TermOrigin::Text));
            }
        }
    }
    for label in labels {
        let term = label.trim().to_lowercase();
        if !term.is_empty() && seen.insert(term.clone()) {
            candidates.push((term, TermOrigin::Label));
        }
    }
    candidates
}

fn matched_guess(
    term: &str,
    origin: TermOrigin,
    entry: &Entry,
    labels: &[String],
) -> LocationGuess {
    let (confidence, evidence) = match origin {
        TermOrigin::Text => (TEXT_MATCH_CONFIDENCE, "text recognized in the image"),
        TermOrigin::Label => (LABEL_MATCH_CONFIDENCE, "a visual label"),
    };
    LocationGuess::builder()
        .latitude(entry.lat)
        .longitude(entry.lng)
        .city(entry.city.clone())
        .country(entry.country.clone())
        .confidence(confidence)
        .reasoning(format!(
            "Matched `{term}` ({evidence}) against the location index: {}",
            entry.reasoning,
        ))
        .visual_analysis_summary(labels.join(", "))
        .build()
}

/// The fixed terminal guess: a valid low-confidence answer, not a failure.
fn default_guess() -> LocationGuess {
    LocationGuess::builder()
        .latitude(0.0)
        .longitude(0.0)
        .city("Unknown")
        .country("Unknown")
        .confidence(NO_MATCH_CONFIDENCE)
        .reasoning("No recognized object or text matched the on-device location index.")
        .build()
}
