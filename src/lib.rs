//! # pdf-comply
//!
//! Validation and remediation pipeline for uploaded PDF documents.
//!
//! Uploads must meet a fixed technical profile: a single PDF file, all
//! raster content in 8-bit grayscale at 300 DPI or better, at most 3 MiB,
//! with no encryption, interactive forms, scripts, or embedded files, and
//! no OCR-scanned pages. This crate classifies a document against that
//! profile and, when the defects are fixable, drives a cascading conversion
//! engine (Ghostscript, optional cloud services, qpdf) until the document
//! complies or every avenue is exhausted.
//!
//! ```text
//!  bytes ──▶ validate ──▶ accepted ────────────────────────▶ done
//!                │
//!                ├──▶ rejected, terminal (encrypted, forms,
//!                │    scripts, attachments, OCR content) ──▶ done
//!                │
//!                └──▶ rejected, fixable (oversize, image
//!                     profile) ──▶ remediation cascade ────▶ done
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pdf_comply::{process_file, Capabilities, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let caps = Capabilities::detect();
//!     let config = PipelineConfig::default();
//!
//!     let (report, processed) =
//!         process_file("upload.pdf".as_ref(), &caps, &config).await?;
//!     println!("{}", report.summary);
//!     if let Some(result) = processed {
//!         std::fs::write("upload.compliant.pdf", &result.buffer)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! External tools are probed once via [`Capabilities::detect`]; a missing
//! tool degrades the dependent checks to "unknown" instead of failing the
//! document. See [`validate::ValidationOrchestrator`] and
//! [`remediate::RemediationEngine`] for the two pipeline halves.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod exec;
pub mod inspect;
pub mod remediate;
pub mod report;
pub mod validate;
pub mod verify;

pub use capabilities::Capabilities;
pub use config::{
    CancelToken, CloudServiceConfig, ComplianceThresholds, DefectKind, DefectSeverity,
    PipelineConfig, PipelineConfigBuilder, PolicyTable,
};
pub use error::{ComplyError, StageError};
pub use remediate::RemediationEngine;
pub use report::{
    CheckResult, CheckSet, CheckStatus, ComplianceSnapshot, ProcessingResult,
    RemediationAttempt, ValidationReport,
};
pub use validate::ValidationOrchestrator;
pub use verify::ComplianceVerifier;

use std::path::Path;

/// Read a file with pipeline-grade error mapping.
async fn read_input(path: &Path) -> Result<Vec<u8>, ComplyError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ComplyError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ComplyError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(ComplyError::Internal(format!(
            "read {}: {e}",
            path.display()
        ))),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Validate a document on disk against the compliance profile.
///
/// Errors only on input I/O; every classification outcome, including "not a
/// PDF at all", is expressed in the returned report.
pub async fn validate_file(
    path: &Path,
    caps: &Capabilities,
    config: &PipelineConfig,
) -> Result<ValidationReport, ComplyError> {
    let bytes = read_input(path).await?;
    let orchestrator = ValidationOrchestrator::new(caps, config);
    Ok(orchestrator.validate(&bytes, &display_name(path)).await)
}

/// Validate a document and remediate it when the defects are fixable.
///
/// The second element is:
/// * `None` when the document is already compliant, or when it was rejected
///   with terminal defects (the report says which);
/// * `Some(result)` when remediation ran — check
///   [`ProcessingResult::verification`] for the outcome.
///
/// Errors on input I/O, cancellation, and total remediation exhaustion.
pub async fn process_file(
    path: &Path,
    caps: &Capabilities,
    config: &PipelineConfig,
) -> Result<(ValidationReport, Option<ProcessingResult>), ComplyError> {
    let bytes = read_input(path).await?;
    let name = display_name(path);

    let orchestrator = ValidationOrchestrator::new(caps, config);
    let report = orchestrator.validate(&bytes, &name).await;

    if !report.needs_remediation() {
        return Ok((report, None));
    }

    let engine = RemediationEngine::new(caps, config);
    let result = engine.remediate(&bytes, &name).await?;
    Ok((report, Some(result)))
}
