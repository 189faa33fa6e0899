//! The fallback orchestrator: hints, then each engine in priority order,
//! until one produces a structurally valid guess.

use bon::Builder;
use serde::Serialize;
use thiserror::Error;

use crate::{
    engine::{Engine, LocationGuess},
    hints::HintSource,
    prelude::*,
};

/// Display radius around an accepted marker when no preference narrows it.
pub const WIDE_RADIUS_METERS: f64 = 1000.0;

/// Display radius when the caller supplied a preference.
pub const NARROW_RADIUS_METERS: f64 = 500.0;

pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Even the terminal on-device engine failed to produce a guess.
    #[error("all inference engines are exhausted")]
    AllEnginesExhausted,
}

/// One image submission: the bytes plus the caller's context.
#[must_use]
#[derive(Builder)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,

    #[builder(into)]
    pub preference: Option<String>,
}

impl AnalysisRequest {
    /// Blank preferences mean "no preference".
    fn effective_preference(&self) -> Option<&str> {
        self.preference.as_deref().map(str::trim).filter(|preference| !preference.is_empty())
    }
}

/// The accepted guess together with the request context and the display
/// policy derived from it.
#[must_use]
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub guess: LocationGuess,
    pub placement: Placement,

    /// The caller's preference, threaded through unchanged.
    pub preference: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Consumer-facing display policy.
///
/// A low-confidence guess renders unobscured but carries no marker; the
/// uncertainty radius is driven by preference presence, not confidence.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Placement {
    pub marker: Option<GeoPoint>,
    pub radius_meters: f64,
}

#[must_use]
#[derive(Builder)]
pub struct Pipeline {
    hint_source: Option<HintSource>,

    /// Engines in descending priority order; the terminal on-device
    /// engine goes last.
    engines: Vec<Box<dyn Engine>>,

    #[builder(default = DEFAULT_LOW_CONFIDENCE_THRESHOLD)]
    low_confidence_threshold: f64,
}

impl Pipeline {
    /// Run the submission through the fallback sequence.
    ///
    /// The first structurally valid guess wins. Every engine failure and
    /// every structurally invalid guess is logged and skipped; the only
    /// surfaced error is [`PipelineError::AllEnginesExhausted`].
    #[instrument(skip_all)]
    pub async fn run(&self, request: AnalysisRequest) -> Result<Analysis, PipelineError> {
        let preference = request.effective_preference();
        let hints = match &self.hint_source {
            Some(hint_source) => hint_source.fetch(&request.image, preference).await,
            None => String::new(),
        };
        for engine in &self.engines {
            match engine.infer(&request.image, &hints, preference).await {
                Ok(mut guess) if guess.is_structurally_valid() => {
                    guess.source = engine.name().to_string();
                    info!(source = engine.name(), guess.confidence, "📍 Accepted");
                    let placement = self.placement(&guess, preference);
                    return Ok(Analysis { guess, placement, preference: request.preference });
                }
                Ok(_) => {
                    warn!(engine = engine.name(), "⚠️ Discarding a structurally invalid guess");
                }
                Err(error) => {
                    warn!(engine = engine.name(), "⚠️ Engine failed, falling back: {error:#}");
                }
            }
        }
        error!("‼️ All inference engines are exhausted");
        Err(PipelineError::AllEnginesExhausted)
    }

    fn placement(&self, guess: &LocationGuess, preference: Option<&str>) -> Placement {
        let marker = (guess.confidence >= self.low_confidence_threshold)
            .then(|| GeoPoint { latitude: guess.latitude, longitude: guess.longitude });
        let radius_meters =
            if preference.is_some() { NARROW_RADIUS_METERS } else { WIDE_RADIUS_METERS };
        Placement { marker, radius_meters }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::engine::EngineError;

    struct StubEngine {
        name: &'static str,
        guess: Option<LocationGuess>,
        calls: Arc<AtomicUsize>,
    }

    impl StubEngine {
        fn new(
            name: &'static str,
            guess: Option<LocationGuess>,
        ) -> (Box<dyn Engine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Box::new(Self { name, guess, calls: Arc::clone(&calls) }), calls)
        }
    }

    #[async_trait]
    impl Engine for StubEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn infer(
            &self,
            _image: &[u8],
            _hints: &str,
            _preference: Option<&str>,
        ) -> Result<LocationGuess, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.guess.clone().ok_or(EngineError::InvalidResponse("stubbed failure"))
        }
    }

    fn guess(confidence: f64) -> LocationGuess {
        LocationGuess::builder()
            .latitude(21.0278)
            .longitude(105.8342)
            .city("Hanoi")
            .country("Vietnam")
            .confidence(confidence)
            .reasoning("stub")
            .build()
    }

    fn invalid_guess() -> LocationGuess {
        LocationGuess::builder()
            .latitude(200.0)
            .longitude(105.8342)
            .city("")
            .country("")
            .confidence(0.9)
            .reasoning("stub")
            .build()
    }

    fn request(preference: Option<&str>) -> AnalysisRequest {
        AnalysisRequest::builder()
            .image(b"image bytes".to_vec())
            .maybe_preference(preference.map(str::to_owned))
            .build()
    }

    fn pipeline(engines: Vec<Box<dyn Engine>>) -> Pipeline {
        Pipeline::builder().engines(engines).build()
    }

    #[tokio::test]
    async fn first_valid_engine_wins_ok() -> Result {
        let (first, _) = StubEngine::new("first", Some(guess(0.8)));
        let (second, second_calls) = StubEngine::new("second", Some(guess(0.9)));
        let (third, third_calls) = StubEngine::new("third", Some(guess(0.9)));
        let analysis = pipeline(vec![first, second, third]).run(request(None)).await?;
        assert_eq!(analysis.guess.source, "first");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failing_engine_advances_ok() -> Result {
        let (first, first_calls) = StubEngine::new("first", None);
        let (second, _) = StubEngine::new("second", Some(guess(0.8)));
        let analysis = pipeline(vec![first, second]).run(request(None)).await?;
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.guess.source, "second");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_structure_advances_ok() -> Result {
        let (first, _) = StubEngine::new("first", Some(invalid_guess()));
        let (second, _) = StubEngine::new("second", Some(guess(0.8)));
        let analysis = pipeline(vec![first, second]).run(request(None)).await?;
        assert_eq!(analysis.guess.source, "second");
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_engines_fail_ok() {
        let (first, _) = StubEngine::new("first", None);
        let (second, _) = StubEngine::new("second", Some(invalid_guess()));
        let result = pipeline(vec![first, second]).run(request(None)).await;
        assert!(matches!(result, Err(PipelineError::AllEnginesExhausted)));
    }

    #[tokio::test]
    async fn repeated_runs_select_the_same_engine_ok() -> Result {
        let (first, _) = StubEngine::new("first", None);
        let (second, _) = StubEngine::new("second", Some(guess(0.8)));
        let pipeline = pipeline(vec![first, second]);
        let first_run = pipeline.run(request(Some("coastal"))).await?;
        let second_run = pipeline.run(request(Some("coastal"))).await?;
        assert_eq!(first_run.guess.source, second_run.guess.source);
        assert_eq!(first_run.guess.source, "second");
        Ok(())
    }

    #[tokio::test]
    async fn low_confidence_guess_has_no_marker_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.2)));
        let analysis = pipeline(vec![engine]).run(request(None)).await?;
        assert!(analysis.placement.marker.is_none());
        // Accepted nevertheless: low confidence is not a rejection.
        assert_eq!(analysis.guess.source, "only");
        Ok(())
    }

    #[tokio::test]
    async fn confident_guess_has_marker_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.8)));
        let analysis = pipeline(vec![engine]).run(request(None)).await?;
        let marker = analysis.placement.marker.unwrap();
        assert!((marker.latitude - 21.0278).abs() < f64::EPSILON);
        assert!((marker.longitude - 105.8342).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn threshold_is_configurable_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.2)));
        let pipeline = Pipeline::builder().engines(vec![engine]).low_confidence_threshold(0.1).build();
        let analysis = pipeline.run(request(None)).await?;
        assert!(analysis.placement.marker.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn preference_narrows_the_radius_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.8)));
        let analysis = pipeline(vec![engine]).run(request(Some("coastal"))).await?;
        assert!((analysis.placement.radius_meters - NARROW_RADIUS_METERS).abs() < f64::EPSILON);
        assert_eq!(analysis.preference.as_deref(), Some("coastal"));
        Ok(())
    }

    #[tokio::test]
    async fn absent_preference_widens_the_radius_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.8)));
        let analysis = pipeline(vec![engine]).run(request(None)).await?;
        assert!((analysis.placement.radius_meters - WIDE_RADIUS_METERS).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn blank_preference_counts_as_absent_ok() -> Result {
        let (engine, _) = StubEngine::new("only", Some(guess(0.8)));
        let analysis = pipeline(vec![engine]).run(request(Some(""))).await?;
        assert!((analysis.placement.radius_meters - WIDE_RADIUS_METERS).abs() < f64::EPSILON);
        // The raw value is still echoed back unchanged.
        assert_eq!(analysis.preference.as_deref(), Some(""));
        Ok(())
    }
}
