use async_trait::async_trait;
use tokio::process::Command;

use crate::{engine::local::TextReader, prelude::*};

/// Reads text from the image by driving the `tesseract` CLI.
///
/// Multiple scripts are handled through the language setting (`eng+vie`,
/// `jpn`, …). A missing binary is a model-load failure and surfaces as
/// an engine error, never as an empty result.
#[must_use]
pub struct TesseractReader {
    languages: String,
}

impl TesseractReader {
    pub fn new(languages: impl Into<String>) -> Self {
        Self { languages: languages.into() }
    }
}

#[async_trait]
impl TextReader for TesseractReader {
    #[instrument(skip_all)]
    async fn read(&self, image: &[u8]) -> Result<String> {
        let directory = tempfile::tempdir().context("failed to create a temporary directory")?;
        let path = directory.path().join("photo.jpg");
        tokio::fs::write(&path, image)
            .await
            .with_context(|| format!("failed to write the image to `{}`", path.display()))?;
        let output = Command::new("tesseract")
            .arg(&path)
            .arg("stdout")
            .args(["-l", &self.languages])
            .output()
            .await
            .context("failed to run `tesseract`, is it installed?")?;
        if !output.status.success() {
            bail!(
                "`tesseract` failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
