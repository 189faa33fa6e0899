use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The response arrived but does not form a usable guess.
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),

    #[error("request error: {0:#}")]
    #[expect(clippy::enum_variant_names)]
    RequestError(#[from] reqwest::Error),

    #[error("request error: {0:#}")]
    #[expect(clippy::enum_variant_names)]
    RequestMiddlewareError(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
