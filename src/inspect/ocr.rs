//! OCR-scan heuristic: does this document look like recognised scan output?
//!
//! ## Why a heuristic?
//!
//! Scanned-then-OCRed pages cannot be fixed by colour/DPI conversion — the
//! defects live in the recognised text layer, so such documents are rejected
//! outright. There is no certified way to detect them; what works in
//! practice is counting the characteristic damage OCR engines leave behind
//! in extracted text: long runs of easily-confused glyphs (`I l 1 |`),
//! `0`/`O` runs, isolated single-letter "words", punctuation clusters, and
//! single-character token trains.
//!
//! The ratio threshold lives in [`crate::config::PipelineConfig`] — this is
//! a **tunable statistical classifier**, not a guaranteed-correct detector,
//! and both false positives and negatives are expected at the margins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// OCR-artifact pattern set. Each entry is one family of damage; counts are
/// summed over the sample.
static OCR_ARTIFACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Runs of glyphs OCR engines confuse with each other.
        Regex::new(r"[Il1|]{4,}").unwrap(),
        // Runs of zero/oh confusions.
        Regex::new(r"[0O]{5,}").unwrap(),
        // Isolated single letters that are not English words ("a", "I").
        Regex::new(r"\s[b-hj-zB-HJ-Z]\s").unwrap(),
        // Non-standard punctuation clusters.
        Regex::new(r#"[!@#$%^&*_+={}\[\]:;"'<>,.?/\\|~-]{4,}"#).unwrap(),
        // Three consecutive single-character tokens.
        Regex::new(r"(?:\b[A-Za-z0-9]\b[ \t]+){2}\b[A-Za-z0-9]\b").unwrap(),
    ]
});

/// Keywords in Producer/Creator metadata that indicate scanning hardware or
/// capture software.
const SCAN_KEYWORDS: &[&str] = &[
    "scan", "scanner", "scanned", "capture", "imagecapture", "paperstream", "iris", "readiris",
];

/// Verdict of the OCR heuristic for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrAssessment {
    #[serde(rename = "hasOCR")]
    pub has_ocr: bool,
    /// 0–100.
    pub confidence: u8,
    /// Artifact matches per 100 sample characters.
    pub error_ratio: f64,
    pub details: String,
}

/// The classifier. Thresholds are injected so the orchestrator config is
/// the single tuning point.
#[derive(Debug, Clone, Copy)]
pub struct OcrHeuristic {
    /// `error_ratio` above this flags the document. Default 2.0.
    pub ratio_threshold: f64,
    /// Leading sample size in characters. Default 2000.
    pub sample_chars: usize,
}

impl Default for OcrHeuristic {
    fn default() -> Self {
        Self {
            ratio_threshold: 2.0,
            sample_chars: 2000,
        }
    }
}

impl OcrHeuristic {
    /// Classify a document from its extracted text and metadata strings.
    pub fn assess(
        &self,
        text: &str,
        producer: Option<&str>,
        creator: Option<&str>,
    ) -> OcrAssessment {
        // Empty extraction on a rendered page strongly implies an
        // unrecognised scan: there is content, but no text layer at all.
        if text.trim().is_empty() {
            return OcrAssessment {
                has_ocr: true,
                confidence: 90,
                error_ratio: 0.0,
                details: "no extractable text; document is likely a raw scan".into(),
            };
        }

        let sample = leading_chars(text, self.sample_chars);
        let matches: usize = OCR_ARTIFACT_PATTERNS
            .iter()
            .map(|re| re.find_iter(sample).count())
            .sum();
        let error_ratio = matches as f64 / sample.chars().count() as f64 * 100.0;

        let mut has_ocr = error_ratio > self.ratio_threshold;
        let mut confidence = if has_ocr {
            (error_ratio * 20.0).min(90.0).round() as u8
        } else {
            0
        };

        // Scan-indicating metadata overrides a clean text sample.
        if let Some(keyword) = scan_keyword(producer).or_else(|| scan_keyword(creator)) {
            has_ocr = true;
            confidence = confidence.max(80);
            return OcrAssessment {
                has_ocr,
                confidence,
                error_ratio,
                details: format!(
                    "metadata indicates scanning software ('{keyword}'); artifact ratio {error_ratio:.2}%"
                ),
            };
        }

        OcrAssessment {
            has_ocr,
            confidence,
            error_ratio,
            details: format!(
                "{matches} OCR artifacts in {}-char sample ({error_ratio:.2}%, threshold {:.2}%)",
                sample.chars().count(),
                self.ratio_threshold
            ),
        }
    }
}

/// First `n` characters of `s`, respecting char boundaries.
fn leading_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn scan_keyword(field: Option<&str>) -> Option<&'static str> {
    let lower = field?.to_lowercase();
    SCAN_KEYWORDS.iter().find(|k| lower.contains(**k)).copied()
}
