//! End-to-end pipeline tests against fake external tools.
//!
//! Real poppler/ghostscript are not assumed on the test host. Instead each
//! scenario installs small shell scripts with the same output contracts and
//! points a `Capabilities` record at them, exercising the full
//! validate-then-remediate flow including subprocess supervision.

#![cfg(unix)]

use pdf_comply::{
    process_file, Capabilities, CheckStatus, PipelineConfig, ValidationOrchestrator,
};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch directory of fake tool scripts.
struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn install(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    fn pdfinfo_clean(&self) -> PathBuf {
        self.install(
            "pdfinfo",
            "cat <<'EOF'\n\
             Title:          Invoice\n\
             Creator:        LibreOffice 7.4\n\
             Producer:       LibreOffice 7.4\n\
             Form:           none\n\
             Pages:          3\n\
             Encrypted:      no\n\
             EOF\n",
        )
    }

    fn pdfinfo_encrypted(&self) -> PathBuf {
        self.install(
            "pdfinfo",
            "cat <<'EOF'\n\
             Producer:       Acrobat\n\
             Form:           none\n\
             Pages:          3\n\
             Encrypted:      yes (print:no copy:no change:no addNotes:no algorithm:AES-256)\n\
             EOF\n",
        )
    }

    fn pdfimages_compliant(&self) -> PathBuf {
        self.install(
            "pdfimages",
            "cat <<'EOF'\n\
             page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio\n\
             --------------------------------------------------------------------------------------------\n\
             \x20  1     0 image    2550  3300  gray    1   8  image  no        11  0   300   300  198K 2.4%\n\
             EOF\n",
        )
    }

    fn pdfimages_cmyk_low_dpi(&self) -> PathBuf {
        self.install(
            "pdfimages",
            "cat <<'EOF'\n\
             page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio\n\
             --------------------------------------------------------------------------------------------\n\
             \x20  1     0 image    1275  1650  cmyk    4   8  jpeg   no        12  0   150   150  421K 5.1%\n\
             EOF\n",
        )
    }

    fn pdftotext_clean(&self) -> PathBuf {
        self.install(
            "pdftotext",
            "printf 'The quarterly report shows steady growth across all regions. \
             Revenue increased by twelve percent compared to the previous year.\\n'\n",
        )
    }

    fn pdftotext_empty(&self) -> PathBuf {
        self.install("pdftotext", "exit 0\n")
    }

    /// Fake Ghostscript: copies input to output unchanged.
    fn gs_copy(&self) -> PathBuf {
        self.install("gs", GS_SHIM_COPY)
    }

    /// Fake Ghostscript: writes the first 2 MB of the input, simulating a
    /// conversion that halves a 4 MB document.
    fn gs_shrink(&self) -> PathBuf {
        self.install("gs", GS_SHIM_SHRINK)
    }
}

const GS_SHIM_COPY: &str = "\
out=\"\"\nin=\"\"\n\
for a in \"$@\"; do\n\
  case \"$a\" in\n\
    -sOutputFile=*) out=\"${a#-sOutputFile=}\" ;;\n\
    -*) ;;\n\
    *) in=\"$a\" ;;\n\
  esac\n\
done\n\
cat \"$in\" > \"$out\"\n";

const GS_SHIM_SHRINK: &str = "\
out=\"\"\nin=\"\"\n\
for a in \"$@\"; do\n\
  case \"$a\" in\n\
    -sOutputFile=*) out=\"${a#-sOutputFile=}\" ;;\n\
    -*) ;;\n\
    *) in=\"$a\" ;;\n\
  esac\n\
done\n\
head -c 2000000 \"$in\" > \"$out\"\n";

fn small_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n".to_vec()
}

fn oversize_pdf() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(4 * 1024 * 1024, b' ');
    bytes
}

async fn write_input(dir: &TempDir, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("input.pdf");
    tokio::fs::write(&path, bytes).await.expect("write input");
    path
}

#[tokio::test]
async fn non_pdf_short_circuits_every_other_check() {
    let caps = Capabilities::default();
    let config = PipelineConfig::default();
    let orchestrator = ValidationOrchestrator::new(&caps, &config);

    let report = orchestrator.validate(b"PK\x03\x04not a pdf", "archive.pdf").await;
    assert!(!report.valid);
    assert!(!report.is_processable);
    assert_eq!(report.checks.file_type.as_ref().unwrap().status, CheckStatus::Fail);
    assert!(report.checks.file_size.is_none());
    assert!(report.checks.images.is_none());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["isProcessable"], false);
    assert_eq!(json["hasOCR"], false);
}

#[tokio::test]
async fn cmyk_low_dpi_document_is_fixable() {
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_clean()),
        pdfimages: Some(tools.pdfimages_cmyk_low_dpi()),
        pdftotext: Some(tools.pdftotext_clean()),
        ..Default::default()
    };
    let config = PipelineConfig::default();
    let orchestrator = ValidationOrchestrator::new(&caps, &config);

    let report = orchestrator.validate(&small_pdf(), "brochure.pdf").await;

    assert!(!report.valid);
    assert!(report.is_processable, "image defects must stay fixable");
    assert!(report.needs_remediation());
    assert!(!report.has_ocr);
    // One colour issue and one resolution issue for the single cmyk@150 image.
    assert_eq!(report.errors.len(), 2, "errors: {:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("cmyk")));
    assert!(report.errors.iter().any(|e| e.contains("150x150")));
    assert_eq!(report.checks.images.as_ref().unwrap().status, CheckStatus::Fail);
    assert_eq!(report.checks.structure.as_ref().unwrap().status, CheckStatus::Pass);
    assert!(report.summary.contains("fixable"));
}

#[tokio::test]
async fn empty_text_layer_is_terminal_ocr_rejection() {
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_clean()),
        pdfimages: Some(tools.pdfimages_compliant()),
        pdftotext: Some(tools.pdftotext_empty()),
        ..Default::default()
    };
    let config = PipelineConfig::default();
    let orchestrator = ValidationOrchestrator::new(&caps, &config);

    let report = orchestrator.validate(&small_pdf(), "scan.pdf").await;

    assert!(report.has_ocr);
    assert!(!report.is_processable);
    assert!(report.summary.contains("OCR"));
    let ocr = report.checks.ocr.as_ref().unwrap();
    assert_eq!(ocr.status, CheckStatus::Fail);
    assert_eq!(ocr.detail["confidence"], 90);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["hasOCR"], true);
}

#[tokio::test]
async fn encrypted_document_is_terminal() {
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_encrypted()),
        pdfimages: Some(tools.pdfimages_compliant()),
        pdftotext: Some(tools.pdftotext_clean()),
        ..Default::default()
    };
    let config = PipelineConfig::default();
    let orchestrator = ValidationOrchestrator::new(&caps, &config);

    let report = orchestrator.validate(&small_pdf(), "locked.pdf").await;

    assert!(!report.is_processable);
    assert!(report.errors.iter().any(|e| e.contains("encrypted")));
    assert_eq!(report.checks.structure.as_ref().unwrap().status, CheckStatus::Fail);
}

#[tokio::test]
async fn compliant_document_skips_remediation() {
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_clean()),
        pdfimages: Some(tools.pdfimages_compliant()),
        pdftotext: Some(tools.pdftotext_clean()),
        ..Default::default()
    };
    let config = PipelineConfig::default();

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, &small_pdf()).await;

    let (report, processed) = process_file(&input, &caps, &config).await.unwrap();
    assert!(report.valid);
    assert!(report.is_processable);
    assert!(processed.is_none());
}

#[tokio::test]
async fn oversize_document_is_remediated_by_primary_convert() {
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_clean()),
        pdfimages: Some(tools.pdfimages_compliant()),
        pdftotext: Some(tools.pdftotext_clean()),
        gs: Some(tools.gs_shrink()),
        ..Default::default()
    };
    let config = PipelineConfig::default();

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, &oversize_pdf()).await;

    let (report, processed) = process_file(&input, &caps, &config).await.unwrap();
    assert!(report.needs_remediation());

    let result = processed.expect("remediation ran");
    assert!(result.verification.is_compliant());
    assert_eq!(result.attempts.len(), 1, "attempts: {:?}", result.attempts);
    assert_eq!(result.attempts[0].strategy, "gs-primary");
    assert!(result.attempts[0].succeeded);
    assert_eq!(result.processed_size, 2_000_000);
    assert!(result.compression_ratio > 0.4 && result.compression_ratio < 0.6);
    assert!(result
        .optimizations
        .iter()
        .any(|o| o.contains("verification: compliant")));
}

#[tokio::test]
async fn incompressible_oversize_document_goes_through_size_gate() {
    // A converter that cannot shrink the file: the image profile is met
    // after the first pass, so the engine skips straight to the size gate
    // and reports the still-oversize artifact honestly.
    let tools = FakeTools::new();
    let caps = Capabilities {
        pdfinfo: Some(tools.pdfinfo_clean()),
        pdfimages: Some(tools.pdfimages_compliant()),
        pdftotext: Some(tools.pdftotext_clean()),
        gs: Some(tools.gs_copy()),
        ..Default::default()
    };
    let config = PipelineConfig::default();

    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, &oversize_pdf()).await;

    let (report, processed) = process_file(&input, &caps, &config).await.unwrap();
    assert!(report.needs_remediation());

    let result = processed.expect("remediation ran");
    assert!(!result.verification.is_compliant());
    assert!(!result.verification.size_within_limit);
    assert!(result.verification.grayscale);

    let strategies: Vec<&str> = result.attempts.iter().map(|a| a.strategy.as_str()).collect();
    assert_eq!(strategies, vec!["gs-primary", "gs-size-gate"]);
    // Growth or no change is reported, never treated as an error.
    assert!(result.compression_ratio <= 0.0 + f64::EPSILON);
    assert_eq!(result.processed_size, result.original_size);
}
