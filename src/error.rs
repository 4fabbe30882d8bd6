//! Error types for the pdf-comply library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ComplyError`] — **Fatal**: the pipeline cannot produce any result at
//!   all (invalid configuration, cancelled run, total remediation
//!   exhaustion). Returned as `Err(ComplyError)` from the top-level entry
//!   points.
//!
//! * [`StageError`] — **Non-fatal**: a single check or conversion stage
//!   failed (tool missing, subprocess crashed, cloud call refused). Recorded
//!   in the [`crate::report::ValidationReport`] or the remediation attempt
//!   log so callers can inspect what was tried rather than losing the
//!   document to one bad tool.
//!
//! The separation enforces the propagation policy: every per-check and
//! per-stage failure is recovered locally and encoded in the report/result;
//! only total exhaustion — no non-empty artifact ever produced — escapes as
//! a hard failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-comply library.
///
/// Check-level and stage-level failures use [`StageError`] and are folded
/// into reports rather than propagated here.
#[derive(Debug, Error)]
pub enum ComplyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Remediation errors ────────────────────────────────────────────────
    /// Every remediation avenue failed to produce a non-empty artifact.
    ///
    /// This is the only condition under which the remediation engine errors
    /// out instead of returning a best-effort result; the full cascade and
    /// the size gate have already been attempted when this is raised.
    #[error(
        "Remediation exhausted: {attempts} strategies attempted, none produced a usable artifact.\n\
         Last failure: {last_error}"
    )]
    RemediationExhausted { attempts: usize, last_error: String },

    /// The caller cancelled the run between stages.
    ///
    /// The last-acquired scratch artifact has already been cleaned up when
    /// this is returned.
    #[error("Pipeline cancelled after stage '{after_stage}'")]
    Cancelled { after_stage: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the processed artifact to its destination.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error from a single check or conversion stage.
///
/// Stored alongside check results and remediation attempts. The pipeline
/// continues past any of these; they exist so the report can say *why* a
/// category degraded to unknown or a strategy was skipped.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The external tool is not installed or not executable.
    #[error("Tool '{tool}' is not available: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    /// The tool ran but exited non-zero or produced unusable output.
    #[error("Tool '{tool}' failed (exit {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool exceeded its time budget and was killed.
    #[error("Tool '{tool}' timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    /// A conversion stage ran to completion but produced an empty file.
    #[error("Stage '{stage}' produced a zero-byte artifact")]
    EmptyArtifact { stage: String },

    /// A cloud service could not be reached at the transport level
    /// (TLS trust failure, connection refused, DNS failure, timeout).
    ///
    /// Distinguished from [`StageError::CloudRejected`] because a
    /// connectivity-class failure disqualifies the *whole* cloud fallback
    /// group, not just the one service.
    #[error("Cloud service '{service}' unreachable: {detail}")]
    CloudUnreachable { service: String, detail: String },

    /// A cloud service responded, but with an error status.
    ///
    /// The next service in the group may still be tried.
    #[error("Cloud service '{service}' rejected the request (HTTP {status}): {detail}")]
    CloudRejected {
        service: String,
        status: u16,
        detail: String,
    },

    /// Tool output could not be parsed against its column/key contract.
    #[error("Unparseable output from '{tool}': {detail}")]
    UnparseableOutput { tool: String, detail: String },

    /// Local filesystem failure inside a stage (scratch file churn).
    #[error("Stage '{stage}' I/O failure: {detail}")]
    Io { stage: String, detail: String },
}

impl StageError {
    /// Whether this failure means the cloud fallback group as a whole is
    /// unavailable (connectivity-class) rather than just this service.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StageError::CloudUnreachable { .. })
    }

    /// Whether the failure is a missing tool, as opposed to a tool that ran
    /// and failed. Missing tools degrade checks to "unknown".
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, StageError::ToolUnavailable { .. })
    }
}
