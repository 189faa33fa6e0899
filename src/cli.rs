use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use crate::pipeline::DEFAULT_LOW_CONFIDENCE_THRESHOLD;

#[derive(Parser)]
#[command(author, version, about, long_about, propagate_version = true)]
pub struct Cli {
    #[clap(long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Gemini API key. The Gemini engine is skipped when not set.
    #[clap(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    #[clap(long, env = "GEMINI_MODEL", default_value = "gemini-2.0-flash")]
    pub gemini_model: String,

    /// OpenAI API key. The OpenAI engine is skipped when not set.
    #[clap(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[clap(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    /// Root URL of the reverse-image-search relay. Hints are skipped when not set.
    #[clap(long, env = "HINT_RELAY_URL")]
    pub hint_relay_url: Option<Url>,

    /// Image hosting endpoint used to obtain a public URL for the photograph.
    #[clap(long, env = "IMAGE_HOST_URL", default_value = "https://tmpfiles.org/api/v1/upload")]
    pub image_host_url: Url,

    /// Keyed location dataset for the on-device fallback engine.
    #[clap(long, env = "DATASET_URL")]
    pub dataset_url: Option<Url>,

    /// Guesses below this confidence are reported without a map marker.
    #[clap(
        long,
        env = "LOW_CONFIDENCE_THRESHOLD",
        default_value_t = DEFAULT_LOW_CONFIDENCE_THRESHOLD,
    )]
    pub low_confidence_threshold: f64,

    /// Languages passed to the on-device text recognizer, e.g. `eng+vie`.
    #[clap(long, env = "OCR_LANGUAGES", default_value = "eng")]
    pub ocr_languages: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Infer where the photograph was taken.
    #[clap(alias = "locate")]
    Analyze {
        /// Path to the photograph.
        image: PathBuf,

        /// Optional location bias forwarded to every engine, e.g. `coastal`.
        #[clap(long)]
        preference: Option<String>,

        /// Skip the reverse-image-search hint phase.
        #[clap(long)]
        no_hints: bool,
    },

    /// Fetch reverse-image-search hints without running any engine.
    Hints {
        /// Path to the photograph.
        image: PathBuf,

        #[clap(long)]
        preference: Option<String>,
    },
}
