pub use anyhow::{Context, Error, anyhow, bail};
pub use tracing::{Level, debug, error, info, instrument, warn};

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
