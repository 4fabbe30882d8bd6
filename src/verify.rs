//! Post-conversion compliance verification.
//!
//! After every conversion stage the engine re-checks the artifact against
//! the same thresholds validation used, producing a [`ComplianceSnapshot`].
//! Verification runs on the artifact bytes, never on cached analysis from a
//! previous stage: each conversion can change the image inventory
//! arbitrarily.
//!
//! When the image-listing tool is unavailable the snapshot assumes best
//! case (grayscale and DPI pass). The size check needs no tool and is
//! always authoritative.

use crate::capabilities::Capabilities;
use crate::config::PipelineConfig;
use crate::exec::{remove_quietly, Workspace};
use crate::inspect::images::ImageComplianceAnalyzer;
use crate::report::ComplianceSnapshot;
use std::time::Duration;
use tracing::{debug, warn};

/// Re-checks converted artifacts against the compliance thresholds.
#[derive(Debug)]
pub struct ComplianceVerifier<'a> {
    caps: &'a Capabilities,
    config: &'a PipelineConfig,
}

impl<'a> ComplianceVerifier<'a> {
    pub fn new(caps: &'a Capabilities, config: &'a PipelineConfig) -> Self {
        Self { caps, config }
    }

    /// Verify artifact bytes against the thresholds.
    ///
    /// Infallible by contract: inspection problems degrade to best-case
    /// image verdicts rather than failing the stage that produced the
    /// artifact.
    pub async fn verify(&self, bytes: &[u8]) -> ComplianceSnapshot {
        let mut snapshot = ComplianceSnapshot {
            grayscale: true,
            dpi300: true,
            size_within_limit: bytes.len() as u64 <= self.config.thresholds.max_size_bytes,
            errors: Vec::new(),
        };
        if !snapshot.size_within_limit {
            snapshot.errors.push(format!(
                "artifact is {} bytes, limit {}",
                bytes.len(),
                self.config.thresholds.max_size_bytes
            ));
        }

        // Image checks need the artifact on disk for the listing tool.
        let workspace = match Workspace::new() {
            Ok(ws) => ws,
            Err(e) => {
                warn!("verification without scratch space, assuming image compliance: {e}");
                return snapshot;
            }
        };
        let artifact = match workspace.write_artifact("verify", "pdf", bytes).await {
            Ok(p) => p,
            Err(e) => {
                warn!("verification could not materialise artifact, assuming image compliance: {e}");
                return snapshot;
            }
        };

        let analyzer = ImageComplianceAnalyzer::new(
            self.caps,
            self.config.thresholds,
            Duration::from_secs(self.config.local_tool_timeout_secs),
        );
        match analyzer.analyze(&artifact).await {
            Ok(analysis) => {
                snapshot.grayscale = analysis.color_issues.is_empty();
                snapshot.dpi300 = analysis.resolution_issues.is_empty();
                snapshot.errors.extend(analysis.color_issues);
                snapshot.errors.extend(analysis.resolution_issues);
            }
            Err(e) => {
                // Best case: an uninspectable artifact is not a reason to
                // keep converting.
                debug!("image verification unavailable ({e}), assuming compliance");
            }
        }

        remove_quietly(&artifact).await;
        snapshot
    }
}
