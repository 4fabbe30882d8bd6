//! Configuration types for the validation-and-remediation pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across concurrent document runs, serialise the
//! serialisable parts for logging, and diff two runs to understand why their
//! outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ComplyError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide compliance thresholds, immutable for the process lifetime.
///
/// These encode the fixed technical profile uploaded documents must meet:
/// single-file PDF, 8-bit grayscale raster content at 300 DPI or better,
/// at most 3 MiB total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceThresholds {
    /// Maximum accepted file size in bytes. Default: 3 MiB.
    pub max_size_bytes: u64,
    /// Minimum DPI on both axes of every embedded raster image. Default: 300.
    pub required_dpi: u32,
    /// Required bits per colour component. Default: 8.
    pub required_bits_per_component: u8,
    /// Required colour space as reported by the image-listing tool. Default: "gray".
    pub required_color_space: &'static str,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            max_size_bytes: 3 * 1024 * 1024,
            required_dpi: 300,
            required_bits_per_component: 8,
            required_color_space: "gray",
        }
    }
}

// ── Policy table ─────────────────────────────────────────────────────────

/// A category of non-compliance found during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefectKind {
    /// Document is encrypted / password protected.
    Encryption,
    /// Document carries an interactive form (AcroForm/XFA).
    InteractiveForm,
    /// Document has embedded file attachments.
    EmbeddedFiles,
    /// Document contains script objects (/JavaScript, /JS actions).
    Scripts,
    /// Heuristic flagged likely OCR-scanned content.
    OcrContent,
    /// File exceeds the size threshold.
    Oversize,
    /// One or more embedded images violate colour/bit-depth/DPI rules.
    ImageNonCompliance,
}

/// Whether a defect terminates processing or is eligible for remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectSeverity {
    /// Never remediable; the document is rejected with a specific reason.
    Terminal,
    /// The remediation engine may attempt to fix it.
    Fixable,
}

/// Maps each defect category to its severity.
///
/// The mapping below mirrors the product behaviour as currently understood:
/// structural/consent defects (encryption, forms, attachments, scripts) and
/// scanned content are terminal because no conversion can remove them while
/// preserving document integrity; size and image-profile defects are fixable
/// by re-rasterisation. It is a table rather than hard-coded logic precisely
/// so the mapping can be revised without touching the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    entries: Vec<(DefectKind, DefectSeverity)>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        use DefectKind::*;
        use DefectSeverity::*;
        Self {
            entries: vec![
                (Encryption, Terminal),
                (InteractiveForm, Terminal),
                (EmbeddedFiles, Terminal),
                (Scripts, Terminal),
                (OcrContent, Terminal),
                (Oversize, Fixable),
                (ImageNonCompliance, Fixable),
            ],
        }
    }
}

impl PolicyTable {
    /// Severity for a defect kind. Unlisted kinds default to `Terminal`:
    /// failing closed on an unknown defect is safer than silently
    /// attempting remediation.
    pub fn severity(&self, kind: DefectKind) -> DefectSeverity {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| *s)
            .unwrap_or(DefectSeverity::Terminal)
    }

    pub fn is_terminal(&self, kind: DefectKind) -> bool {
        self.severity(kind) == DefectSeverity::Terminal
    }

    /// Override the severity of one defect kind.
    pub fn set(&mut self, kind: DefectKind, severity: DefectSeverity) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = severity;
        } else {
            self.entries.push((kind, severity));
        }
    }
}

// ── Cloud services ───────────────────────────────────────────────────────

/// One network conversion service in the cloud fallback group.
///
/// Services are tried in the order they appear in
/// [`PipelineConfig::cloud_services`]. A connectivity-class failure on any
/// of them skips the remainder of the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudServiceConfig {
    /// Human-readable service name, used in logs and attempt records.
    pub name: String,
    /// HTTPS endpoint accepting a multipart PDF upload.
    pub endpoint: String,
    /// Bearer credential supplied by the caller.
    #[serde(skip_serializing)]
    pub api_key: String,
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cooperative cancellation signal, checked between pipeline stages.
///
/// Cancellation is never observed mid-subprocess: a running tool finishes
/// (or times out) and its scratch artifact is cleaned up before the engine
/// notices the flag and stops advancing.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ── Pipeline config ──────────────────────────────────────────────────────

/// Configuration for a validation-and-remediation pipeline.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_comply::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .local_tool_timeout_secs(90)
///     .cloud_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Compliance thresholds. Default: 3 MiB / 300 DPI / 8-bit / gray.
    pub thresholds: ComplianceThresholds,

    /// Terminal-vs-fixable classification of defects.
    pub policy: PolicyTable,

    /// Ordered cloud fallback group (at most two services are consulted).
    pub cloud_services: Vec<CloudServiceConfig>,

    /// Per-call timeout for cloud conversion services, in seconds. Default: 60.
    ///
    /// Past this bound a call is treated as failed, not hung; a timeout is a
    /// connectivity-class failure and disqualifies the rest of the group.
    pub cloud_timeout_secs: u64,

    /// Time budget for each local tool invocation, in seconds. Default: 120.
    ///
    /// Ghostscript can legitimately take a minute on a large scanned
    /// document; anything beyond two is a wedged subprocess that would
    /// otherwise block a worker indefinitely.
    pub local_tool_timeout_secs: u64,

    /// OCR-artifact ratio (percent of sample) above which a document is
    /// classified as scanned. Default: 2.0.
    ///
    /// This is a tunable statistical threshold, not a certified classifier;
    /// see [`crate::inspect::ocr`] for the pattern set it governs.
    pub ocr_error_ratio_threshold: f64,

    /// Leading text sample size for the OCR heuristic, in characters. Default: 2000.
    pub ocr_sample_chars: usize,

    /// Page count above which a warning (not an error) is recorded. Default: 50.
    pub page_warning_threshold: usize,

    /// Cooperative cancellation signal checked between stages.
    pub cancel: CancelToken,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: ComplianceThresholds::default(),
            policy: PolicyTable::default(),
            cloud_services: Vec::new(),
            cloud_timeout_secs: 60,
            local_tool_timeout_secs: 120,
            ocr_error_ratio_threshold: 2.0,
            ocr_sample_chars: 2000,
            page_warning_threshold: 50,
            cancel: CancelToken::new(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn thresholds(mut self, t: ComplianceThresholds) -> Self {
        self.config.thresholds = t;
        self
    }

    pub fn policy(mut self, p: PolicyTable) -> Self {
        self.config.policy = p;
        self
    }

    pub fn cloud_service(mut self, svc: CloudServiceConfig) -> Self {
        self.config.cloud_services.push(svc);
        self
    }

    pub fn cloud_timeout_secs(mut self, secs: u64) -> Self {
        self.config.cloud_timeout_secs = secs.max(1);
        self
    }

    pub fn local_tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.local_tool_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_error_ratio_threshold(mut self, t: f64) -> Self {
        self.config.ocr_error_ratio_threshold = t.max(0.0);
        self
    }

    pub fn ocr_sample_chars(mut self, n: usize) -> Self {
        self.config.ocr_sample_chars = n.max(100);
        self
    }

    pub fn page_warning_threshold(mut self, n: usize) -> Self {
        self.config.page_warning_threshold = n.max(1);
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.config.cancel = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ComplyError> {
        let c = &self.config;
        if c.thresholds.max_size_bytes == 0 {
            return Err(ComplyError::InvalidConfig(
                "max_size_bytes must be > 0".into(),
            ));
        }
        if c.thresholds.required_dpi == 0 {
            return Err(ComplyError::InvalidConfig("required_dpi must be > 0".into()));
        }
        if c.cloud_services.len() > 2 {
            return Err(ComplyError::InvalidConfig(format!(
                "cloud fallback group holds at most 2 services, got {}",
                c.cloud_services.len()
            )));
        }
        for svc in &c.cloud_services {
            if !svc.endpoint.starts_with("https://") {
                return Err(ComplyError::InvalidConfig(format!(
                    "cloud service '{}' endpoint must be https://, got '{}'",
                    svc.name, svc.endpoint
                )));
            }
        }
        Ok(self.config)
    }
}
