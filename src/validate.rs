//! Validation orchestration: classify one document against the compliance
//! profile.
//!
//! `validate` never fails on malformed input — whatever goes wrong is
//! encoded in the returned [`ValidationReport`]. Checks run in a fixed
//! order with two short-circuit rules:
//!
//! 1. A non-PDF upload stops everything; no tool ever sees the bytes.
//! 2. Terminal defects (per the policy table) mark the document
//!    unprocessable but do **not** stop later checks — the report should
//!    tell the user everything that is wrong, not just the first thing.
//!
//! A tool that is absent or unusable degrades its check to
//! [`CheckStatus::Unknown`] plus a warning. The orchestrator assumes
//! best-case compliance for unverifiable categories; blocking every upload
//! because poppler is missing would turn a deployment defect into a user
//! problem.

use crate::capabilities::Capabilities;
use crate::config::{DefectKind, PipelineConfig};
use crate::exec::Workspace;
use crate::inspect::images::ImageComplianceAnalyzer;
use crate::inspect::ocr::OcrHeuristic;
use crate::inspect::structure::{StructuralInspector, StructuralReport};
use crate::inspect::text::TextExtractor;
use crate::inspect::filetype;
use crate::report::{CheckResult, CheckSet, ValidationReport};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces one immutable [`ValidationReport`] per document.
#[derive(Debug)]
pub struct ValidationOrchestrator<'a> {
    caps: &'a Capabilities,
    config: &'a PipelineConfig,
}

impl<'a> ValidationOrchestrator<'a> {
    pub fn new(caps: &'a Capabilities, config: &'a PipelineConfig) -> Self {
        Self { caps, config }
    }

    /// Validate a document from its raw bytes and original filename.
    pub async fn validate(&self, bytes: &[u8], original_name: &str) -> ValidationReport {
        info!("validating '{}' ({} bytes)", original_name, bytes.len());

        let mut checks = CheckSet::default();
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut processable = true;
        let mut has_ocr = false;

        // ── 1. File type ─────────────────────────────────────────────────
        let mime = filetype::sniff_mime(bytes);
        if mime != "application/pdf" {
            checks.file_type = Some(
                CheckResult::fail(format!("expected application/pdf, found {mime}"))
                    .with_detail(json!({ "detected": mime })),
            );
            errors.push(format!("'{original_name}' is not a valid PDF ({mime})"));
            return ValidationReport {
                valid: false,
                is_processable: false,
                has_ocr: false,
                errors,
                warnings,
                checks,
                summary: "not a valid PDF".into(),
            };
        }
        checks.file_type = Some(CheckResult::pass("application/pdf"));

        // ── 2. File size ─────────────────────────────────────────────────
        let max = self.config.thresholds.max_size_bytes;
        let size = bytes.len() as u64;
        if size > max {
            errors.push(format!(
                "file is {:.2} MiB, limit is {:.0} MiB",
                size as f64 / 1048576.0,
                max as f64 / 1048576.0
            ));
            checks.file_size = Some(
                CheckResult::fail(format!("{size} bytes exceeds limit of {max}"))
                    .with_detail(json!({ "sizeBytes": size, "maxSizeBytes": max })),
            );
            if self.config.policy.is_terminal(DefectKind::Oversize) {
                processable = false;
            }
        } else {
            checks.file_size = Some(CheckResult::pass(format!("{size} bytes")));
        }

        // ── 3. Working copy for tool-based checks ────────────────────────
        // Owned by this function: removed on every return path below.
        let workspace = match Workspace::new() {
            Ok(ws) => ws,
            Err(e) => {
                warn!("no scratch space, degrading tool checks: {e}");
                warnings.push(format!("inspection skipped, no scratch space: {e}"));
                let unknown = || CheckResult::unknown("could not verify, no scratch space");
                checks.ocr = Some(unknown());
                checks.structure = Some(unknown());
                checks.pages = Some(unknown());
                checks.images = Some(unknown());
                let valid = errors.is_empty();
                let summary = derive_summary(valid, processable, false, errors.len());
                return ValidationReport {
                    valid,
                    is_processable: processable,
                    has_ocr: false,
                    errors,
                    warnings,
                    checks,
                    summary,
                };
            }
        };
        let artifact = match workspace.write_artifact("validate", "pdf", bytes).await {
            Ok(p) => p,
            Err(e) => {
                warn!("could not materialise working copy: {e}");
                warnings.push(format!("inspection skipped: {e}"));
                let unknown = || CheckResult::unknown("could not verify, no working copy");
                checks.ocr = Some(unknown());
                checks.structure = Some(unknown());
                checks.pages = Some(unknown());
                checks.images = Some(unknown());
                let valid = errors.is_empty();
                let summary = derive_summary(valid, processable, false, errors.len());
                return ValidationReport {
                    valid,
                    is_processable: processable,
                    has_ocr: false,
                    errors,
                    warnings,
                    checks,
                    summary,
                };
            }
        };

        let timeout = Duration::from_secs(self.config.local_tool_timeout_secs);

        // Structure runs before the OCR heuristic because the heuristic
        // consumes the Producer/Creator strings it yields.
        let structure = StructuralInspector::new(self.caps, timeout)
            .inspect(&artifact, bytes)
            .await;

        // ── 4. OCR heuristic ─────────────────────────────────────────────
        let text = TextExtractor::new(self.caps, timeout).extract(&artifact).await;
        match text {
            Ok(text) => {
                let heuristic = OcrHeuristic {
                    ratio_threshold: self.config.ocr_error_ratio_threshold,
                    sample_chars: self.config.ocr_sample_chars,
                };
                let (producer, creator) = match &structure {
                    Ok(s) => (s.producer.as_deref(), s.creator.as_deref()),
                    Err(_) => (None, None),
                };
                let assessment = heuristic.assess(&text, producer, creator);
                debug!(
                    "OCR heuristic: has_ocr={} confidence={} ratio={:.2}",
                    assessment.has_ocr, assessment.confidence, assessment.error_ratio
                );
                let detail = json!({
                    "confidence": assessment.confidence,
                    "errorRatio": assessment.error_ratio,
                });
                if assessment.has_ocr {
                    has_ocr = true;
                    errors.push(format!(
                        "document appears to be OCR-scanned ({})",
                        assessment.details
                    ));
                    checks.ocr = Some(CheckResult::fail(assessment.details).with_detail(detail));
                    if self.config.policy.is_terminal(DefectKind::OcrContent) {
                        processable = false;
                    }
                } else {
                    checks.ocr = Some(CheckResult::pass(assessment.details).with_detail(detail));
                }
            }
            Err(e) => {
                warnings.push(format!("OCR check skipped: {e}"));
                checks.ocr = Some(CheckResult::unknown(e.to_string()));
            }
        }

        // ── 5. Structure / content policy ────────────────────────────────
        match &structure {
            Ok(s) => {
                let found = structural_defects(s);
                if found.is_empty() {
                    checks.structure = Some(CheckResult::pass("no encryption, forms, scripts or attachments"));
                } else {
                    let mut messages = Vec::new();
                    for (kind, message) in &found {
                        errors.push(message.clone());
                        messages.push(message.clone());
                        if self.config.policy.is_terminal(*kind) {
                            processable = false;
                        }
                    }
                    checks.structure = Some(
                        CheckResult::fail(messages.join("; "))
                            .with_detail(json!({ "findings": messages })),
                    );
                }
            }
            Err(e) => {
                warnings.push(format!("structure check skipped: {e}"));
                checks.structure = Some(CheckResult::unknown(e.to_string()));
            }
        }

        // ── 6. Page structure ────────────────────────────────────────────
        match &structure {
            Ok(s) => {
                if s.page_count == 0 {
                    errors.push("document has no extractable pages".into());
                    checks.pages = Some(CheckResult::fail("0 pages"));
                } else {
                    if s.page_count > self.config.page_warning_threshold {
                        warnings.push(format!(
                            "document has {} pages (over {} may be slow to process)",
                            s.page_count, self.config.page_warning_threshold
                        ));
                    }
                    checks.pages = Some(
                        CheckResult::pass(format!("{} pages", s.page_count))
                            .with_detail(json!({ "pageCount": s.page_count })),
                    );
                }
            }
            Err(e) => {
                checks.pages = Some(CheckResult::unknown(e.to_string()));
            }
        }

        // ── 7. Image compliance ──────────────────────────────────────────
        let analyzer =
            ImageComplianceAnalyzer::new(self.caps, self.config.thresholds, timeout);
        match analyzer.analyze(&artifact).await {
            Ok(analysis) => {
                let detail = json!({
                    "totalImages": analysis.total_images,
                    "validImages": analysis.valid_images,
                    "resolutionIssues": analysis.resolution_issues,
                    "colorIssues": analysis.color_issues,
                });
                if analysis.total_images == 0 {
                    warnings.push("document contains no raster images".into());
                    checks.images = Some(CheckResult::pass("no embedded images").with_detail(detail));
                } else if analysis.is_compliant() {
                    checks.images = Some(
                        CheckResult::pass(format!(
                            "{} images, all compliant",
                            analysis.total_images
                        ))
                        .with_detail(detail),
                    );
                } else {
                    for issue in analysis
                        .color_issues
                        .iter()
                        .chain(analysis.resolution_issues.iter())
                    {
                        errors.push(issue.clone());
                    }
                    checks.images = Some(
                        CheckResult::fail(format!(
                            "{}/{} images non-compliant",
                            analysis.total_images - analysis.valid_images,
                            analysis.total_images
                        ))
                        .with_detail(detail),
                    );
                    if self.config.policy.is_terminal(DefectKind::ImageNonCompliance) {
                        processable = false;
                    }
                }
            }
            Err(e) => {
                warnings.push(format!("image check skipped: {e}"));
                checks.images = Some(CheckResult::unknown(e.to_string()));
            }
        }

        crate::exec::remove_quietly(&artifact).await;
        drop(workspace);

        let valid = errors.is_empty();
        let summary = derive_summary(valid, processable, has_ocr, errors.len());
        info!(
            "'{}': valid={} processable={} ({} errors, {} warnings)",
            original_name,
            valid,
            processable,
            errors.len(),
            warnings.len()
        );

        ValidationReport {
            valid,
            is_processable: processable,
            has_ocr,
            errors,
            warnings,
            checks,
            summary,
        }
    }
}

/// Map structural findings to their defect kinds and user-facing messages.
fn structural_defects(s: &StructuralReport) -> Vec<(DefectKind, String)> {
    let mut found = Vec::new();
    if s.encrypted {
        found.push((
            DefectKind::Encryption,
            "document is password protected or encrypted".to_string(),
        ));
    }
    if s.has_form {
        found.push((
            DefectKind::InteractiveForm,
            "document contains an interactive form".to_string(),
        ));
    }
    if s.has_embedded_files {
        found.push((
            DefectKind::EmbeddedFiles,
            "document contains embedded file attachments".to_string(),
        ));
    }
    if s.has_scripts {
        found.push((
            DefectKind::Scripts,
            "document contains script content".to_string(),
        ));
    }
    found
}

/// One-line verdict, distinguishing OCR-caused rejection from generic
/// policy rejection.
fn derive_summary(valid: bool, processable: bool, has_ocr: bool, error_count: usize) -> String {
    if !processable {
        if has_ocr {
            "rejected: scanned/OCR content cannot be made compliant".into()
        } else {
            "rejected: document violates policy and cannot be remediated".into()
        }
    } else if !valid {
        let plural = if error_count == 1 { "error" } else { "errors" };
        format!("processable with {error_count} fixable {plural}")
    } else {
        "document meets the compliance profile".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CheckStatus;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn arbitrary_bytes_never_panic_and_are_unprocessable() {
        let caps = Capabilities::default();
        let cfg = config();
        let orchestrator = ValidationOrchestrator::new(&caps, &cfg);

        for input in [
            &b""[..],
            &b"\x00\x01\x02\x03"[..],
            &b"hello world"[..],
            &[0xFF, 0xD8, 0xFF, 0xE0][..],
        ] {
            let report = orchestrator.validate(input, "junk.pdf").await;
            assert!(!report.valid);
            assert!(!report.is_processable);
            assert_eq!(report.summary, "not a valid PDF");
            assert_eq!(
                report.checks.file_type.as_ref().unwrap().status,
                CheckStatus::Fail
            );
            // Short-circuit: nothing after the type check ran.
            assert!(report.checks.images.is_none());
        }
    }

    #[tokio::test]
    async fn pdf_bytes_without_tools_degrade_to_unknown() {
        // No tools on an empty Capabilities record: every tool-based check
        // must degrade, and the absence of hard errors must keep the
        // document processable.
        let caps = Capabilities::default();
        let cfg = config();
        let orchestrator = ValidationOrchestrator::new(&caps, &cfg);

        let report = orchestrator.validate(b"%PDF-1.4\n%%EOF\n", "doc.pdf").await;
        assert!(report.is_processable);
        assert!(report.valid, "unverifiable categories assume best case");
        assert_eq!(
            report.checks.ocr.as_ref().unwrap().status,
            CheckStatus::Unknown
        );
        assert_eq!(
            report.checks.images.as_ref().unwrap().status,
            CheckStatus::Unknown
        );
        assert!(!report.warnings.is_empty());
    }

    #[tokio::test]
    async fn oversize_is_fixable_not_terminal() {
        let caps = Capabilities::default();
        let cfg = config();
        let orchestrator = ValidationOrchestrator::new(&caps, &cfg);

        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(4 * 1024 * 1024, b' ');
        let report = orchestrator.validate(&bytes, "big.pdf").await;

        assert!(!report.valid);
        assert!(report.is_processable, "oversize must stay remediable");
        assert!(report.needs_remediation());
        assert_eq!(
            report.checks.file_size.as_ref().unwrap().status,
            CheckStatus::Fail
        );
        assert!(report.summary.contains("fixable"));
    }

    #[test]
    fn summary_wording() {
        assert!(derive_summary(false, false, true, 1).contains("OCR"));
        assert!(!derive_summary(false, false, false, 2).contains("OCR"));
        assert_eq!(
            derive_summary(false, true, false, 2),
            "processable with 2 fixable errors"
        );
        assert_eq!(
            derive_summary(false, true, false, 1),
            "processable with 1 fixable error"
        );
        assert_eq!(
            derive_summary(true, true, false, 0),
            "document meets the compliance profile"
        );
    }

    #[test]
    fn structural_defect_mapping_is_exhaustive_for_findings() {
        let s = StructuralReport {
            encrypted: true,
            has_form: true,
            has_embedded_files: true,
            has_scripts: true,
            page_count: 1,
            producer: None,
            creator: None,
        };
        let kinds: Vec<DefectKind> = structural_defects(&s).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                DefectKind::Encryption,
                DefectKind::InteractiveForm,
                DefectKind::EmbeddedFiles,
                DefectKind::Scripts,
            ]
        );
    }
}
