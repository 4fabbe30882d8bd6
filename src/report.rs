//! Report types: everything the pipeline hands back to its caller.
//!
//! The upstream system persists documents and surfaces results to end users;
//! all it receives from this crate are the types below, serialisable to a
//! flat JSON structure with string/bool/int fields and nested check maps.
//! Field names follow the wire shape consumers already expect
//! (`isProcessable`, `hasOCR`, …), hence the serde renames.
//!
//! A [`ValidationReport`] or [`ProcessingResult`] is built once and owned
//! entirely by the caller after return — the pipeline retains no reference
//! and nothing here is mutated retroactively.

use serde::{Deserialize, Serialize};

// ── Check results ────────────────────────────────────────────────────────

/// Tri-state outcome of one check category.
///
/// `Unknown` means "could not verify, tool unavailable" — the orchestrator
/// assumes best-case compliance for unverifiable categories rather than
/// blocking the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Unknown,
}

/// Result of a single check category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    /// Structured per-category detail (counts, issue lists, parsed fields).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

impl CheckResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Pass,
            message: message.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Fail,
            message: message.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Unknown,
            message: message.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// One [`CheckResult`] per check category.
///
/// Categories that never ran (e.g. everything after a failed file-type
/// check) are absent rather than fabricated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<CheckResult>,
}

// ── Validation report ────────────────────────────────────────────────────

/// Immutable outcome of validating one document.
///
/// The three user-visible verdicts are encoded as:
///
/// | `valid` | `is_processable` | Meaning |
/// |---------|------------------|---------|
/// | true    | true             | accepted |
/// | false   | true             | rejected now, fixable — attempt remediation |
/// | false   | false            | rejected forever — no retry possible |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub is_processable: bool,
    #[serde(rename = "hasOCR")]
    pub has_ocr: bool,
    /// Ordered, human-readable error strings (one per violated rule).
    pub errors: Vec<String>,
    /// Ordered, human-readable warnings (informational, never blocking).
    pub warnings: Vec<String>,
    pub checks: CheckSet,
    /// One-line verdict for display.
    pub summary: String,
}

impl ValidationReport {
    /// Whether remediation should be attempted: the document has defects,
    /// but none of them are terminal.
    pub fn needs_remediation(&self) -> bool {
        !self.valid && self.is_processable
    }
}

// ── Remediation records ──────────────────────────────────────────────────

/// One entry in the ordered remediation attempt log. Never mutated after
/// being appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationAttempt {
    /// Strategy name, e.g. `"primary-raster-convert"`.
    pub strategy: String,
    pub succeeded: bool,
    /// Size of the artifact this attempt produced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Compliance snapshot of an artifact, taken mid-cascade and as the final
/// acceptance gate. Pure re-application of the image analysis plus the size
/// threshold; see [`crate::verify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    /// All embedded images are 8-bit gray (best-case `true` when the
    /// listing tool was unavailable).
    pub grayscale: bool,
    /// All embedded images are at or above 300 DPI on both axes.
    pub dpi300: bool,
    /// Artifact is within the size threshold.
    #[serde(rename = "size3MB")]
    pub size_within_limit: bool,
    pub errors: Vec<String>,
}

impl ComplianceSnapshot {
    pub fn is_compliant(&self) -> bool {
        self.grayscale && self.dpi300 && self.size_within_limit
    }
}

// ── Processing result ────────────────────────────────────────────────────

/// Outcome of a remediation run: the processed artifact plus its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// The processed PDF bytes. Not serialised; the upstream system stores
    /// the buffer through its own channel and surfaces only the metadata.
    #[serde(skip)]
    pub buffer: Vec<u8>,
    pub original_size: u64,
    pub processed_size: u64,
    /// `1 - processed/original`. May be ≤ 0 when remediation grew the file;
    /// that is reported, not treated as an error.
    pub compression_ratio: f64,
    /// One human-readable entry per stage describing what was attempted,
    /// whether it succeeded, and why.
    pub optimizations: Vec<String>,
    /// Structured per-strategy log mirroring `optimizations`.
    pub attempts: Vec<RemediationAttempt>,
    /// Compliance snapshot of the final artifact.
    pub verification: ComplianceSnapshot,
}

impl ProcessingResult {
    /// Compute the reported compression ratio. Defined even for a larger
    /// output (negative value) and for a zero-byte original (0.0).
    pub fn ratio(original: u64, processed: u64) -> f64 {
        if original == 0 {
            return 0.0;
        }
        1.0 - processed as f64 / original as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serialises_with_wire_names() {
        let report = ValidationReport {
            valid: false,
            is_processable: true,
            has_ocr: false,
            errors: vec!["image 1 on page 2: color space cmyk".into()],
            warnings: vec![],
            checks: CheckSet {
                file_type: Some(CheckResult::pass("application/pdf")),
                ..Default::default()
            },
            summary: "processable with 1 fixable error".into(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["isProcessable"], true);
        assert_eq!(json["hasOCR"], false);
        assert_eq!(json["checks"]["fileType"]["status"], "pass");
        // Categories that never ran are absent, not null.
        assert!(json["checks"].get("images").is_none());
    }

    #[test]
    fn snapshot_wire_name_for_size() {
        let snap = ComplianceSnapshot {
            grayscale: true,
            dpi300: true,
            size_within_limit: false,
            errors: vec![],
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["size3MB"], false);
        assert!(!snap.is_compliant());
    }

    #[test]
    fn compression_ratio_can_go_negative() {
        assert_eq!(ProcessingResult::ratio(100, 50), 0.5);
        assert!(ProcessingResult::ratio(100, 150) < 0.0);
        assert_eq!(ProcessingResult::ratio(0, 10), 0.0);
    }

    #[test]
    fn buffer_is_not_serialised() {
        let result = ProcessingResult {
            buffer: vec![1, 2, 3],
            original_size: 3,
            processed_size: 3,
            compression_ratio: 0.0,
            optimizations: vec![],
            attempts: vec![],
            verification: ComplianceSnapshot {
                grayscale: true,
                dpi300: true,
                size_within_limit: true,
                errors: vec![],
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("buffer").is_none());
    }
}
