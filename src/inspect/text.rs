//! Plain-text extraction via `pdftotext`.
//!
//! The extracted text is consumed only by the OCR heuristic, so layout
//! fidelity does not matter — `-layout` is deliberately *not* passed. What
//! matters is page order and raw character content; the tool writes to
//! stdout (`-` output argument) so no scratch file is needed.

use crate::capabilities::Capabilities;
use crate::error::StageError;
use crate::exec::run_tool;
use std::path::Path;
use std::time::Duration;

/// Extracts the page-ordered plain-text rendering of a document.
#[derive(Debug)]
pub struct TextExtractor<'a> {
    caps: &'a Capabilities,
    timeout: Duration,
}

impl<'a> TextExtractor<'a> {
    pub fn new(caps: &'a Capabilities, timeout: Duration) -> Self {
        Self { caps, timeout }
    }

    pub async fn extract(&self, path: &Path) -> Result<String, StageError> {
        let pdftotext = self
            .caps
            .pdftotext
            .as_ref()
            .ok_or_else(|| StageError::ToolUnavailable {
                tool: "pdftotext".into(),
                detail: "not found on PATH".into(),
            })?;

        let output = run_tool(
            "pdftotext",
            pdftotext,
            &[
                "-q".to_string(),
                path.display().to_string(),
                "-".to_string(),
            ],
            self.timeout,
        )
        .await?;

        Ok(output.stdout_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tool_degrades_not_panics() {
        let caps = Capabilities::default();
        let extractor = TextExtractor::new(&caps, Duration::from_secs(5));
        let err = extractor.extract(Path::new("/tmp/x.pdf")).await.unwrap_err();
        assert!(err.is_tool_unavailable());
    }
}
