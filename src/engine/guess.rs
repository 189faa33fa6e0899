use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// The pipeline's unit of output.
///
/// Created by exactly one engine attempt and never mutated afterwards,
/// except for the pipeline stamping [`LocationGuess::source`].
#[must_use]
#[derive(Debug, Clone, Serialize, Builder)]
pub struct LocationGuess {
    pub latitude: f64,
    pub longitude: f64,

    /// Free text, non-authoritative.
    #[builder(into)]
    pub city: String,

    /// Free text, non-authoritative.
    #[builder(into)]
    pub country: String,

    /// Self-reported certainty in `[0, 1]`.
    pub confidence: f64,

    #[builder(into)]
    pub reasoning: String,

    #[builder(into, default)]
    pub visual_analysis_summary: String,

    /// Originating engine, stamped by the pipeline on acceptance.
    #[builder(into, default)]
    pub source: String,
}

impl LocationGuess {
    /// A structurally invalid guess is treated identically to an engine
    /// failure: never surfaced, never selected.
    pub fn is_structurally_valid(&self) -> bool {
        self.latitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && self.longitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && self.confidence.is_finite()
    }
}

/// Guess structure as the remote models actually return it: every field
/// may be absent, and the casing varies per backend.
#[derive(Debug, Deserialize)]
pub struct RawGuess {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    pub confidence: Option<f64>,

    #[serde(default)]
    pub reasoning: Option<String>,

    #[serde(default, alias = "visualAnalysisSummary")]
    pub visual_analysis_summary: Option<String>,
}

impl RawGuess {
    /// Validate the raw structure into a [`LocationGuess`].
    ///
    /// Missing coordinates or confidence fail with
    /// [`EngineError::InvalidResponse`]. Confidence is clamped into
    /// `[0, 1]`: the calibration instruction sent to the model is a soft
    /// contract, not a guarantee.
    pub fn into_guess(self, engine: &str) -> Result<LocationGuess, EngineError> {
        let latitude = self.latitude.ok_or(EngineError::InvalidResponse("missing latitude"))?;
        let longitude = self.longitude.ok_or(EngineError::InvalidResponse("missing longitude"))?;
        let confidence =
            self.confidence.ok_or(EngineError::InvalidResponse("missing confidence"))?;
        let reasoning = self
            .reasoning
            .filter(|reasoning| !reasoning.trim().is_empty())
            .unwrap_or_else(|| format!("{engine} reported a location without reasoning"));
        Ok(LocationGuess::builder()
            .latitude(latitude)
            .longitude(longitude)
            .city(self.city.unwrap_or_default())
            .country(self.country.unwrap_or_default())
            .confidence(confidence.clamp(0.0, 1.0))
            .reasoning(reasoning)
            .visual_analysis_summary(self.visual_analysis_summary.unwrap_or_default())
            .build())
    }
}
