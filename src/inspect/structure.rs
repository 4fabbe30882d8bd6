//! Structural inspection: trailer/object-graph facts that decide policy
//! rejections.
//!
//! Two complementary sources feed one report:
//!
//! * `pdfinfo` supplies reliable scalars — encryption flag, page count, form
//!   kind, Producer/Creator strings (the latter feed the OCR heuristic's
//!   metadata check).
//! * A token scan over the raw bytes finds object-dictionary names
//!   (`/JavaScript`, `/JS`, `/EmbeddedFiles`, `/AcroForm`) that `pdfinfo`
//!   does not report. Scanning names in a possibly compressed file can miss
//!   occurrences inside object streams, but the combination with `pdfinfo`'s
//!   `Form:` line has proven sufficient in practice, and a false negative
//!   here fails towards a later conversion failure, not towards silently
//!   accepting a policy-violating document.

use crate::capabilities::Capabilities;
use crate::error::StageError;
use crate::exec::run_tool;
use std::path::Path;
use std::time::Duration;

/// Structural facts about one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralReport {
    pub encrypted: bool,
    pub page_count: usize,
    pub has_form: bool,
    pub has_embedded_files: bool,
    pub has_scripts: bool,
    pub producer: Option<String>,
    pub creator: Option<String>,
}

/// Inspects a document's structure via `pdfinfo` plus a raw-byte name scan.
#[derive(Debug)]
pub struct StructuralInspector<'a> {
    caps: &'a Capabilities,
    timeout: Duration,
}

impl<'a> StructuralInspector<'a> {
    pub fn new(caps: &'a Capabilities, timeout: Duration) -> Self {
        Self { caps, timeout }
    }

    /// Inspect the artifact at `path`; `raw` is the same document's bytes
    /// (already in memory at the caller) used for the name scan.
    pub async fn inspect(&self, path: &Path, raw: &[u8]) -> Result<StructuralReport, StageError> {
        let pdfinfo = self
            .caps
            .pdfinfo
            .as_ref()
            .ok_or_else(|| StageError::ToolUnavailable {
                tool: "pdfinfo".into(),
                detail: "not found on PATH".into(),
            })?;

        let output = run_tool(
            "pdfinfo",
            pdfinfo,
            &[path.display().to_string()],
            self.timeout,
        )
        .await?;

        let mut report = parse_pdfinfo(&output.stdout_text());

        // pdfinfo's Form: line catches declared AcroForm/XFA; the name scan
        // catches the rest.
        report.has_form = report.has_form || contains_name(raw, b"/AcroForm");
        report.has_embedded_files = contains_name(raw, b"/EmbeddedFiles");
        report.has_scripts = contains_name(raw, b"/JavaScript") || contains_name(raw, b"/JS");

        Ok(report)
    }
}

/// Parse `pdfinfo`'s `Key: value` output into the scalar half of the report.
pub fn parse_pdfinfo(text: &str) -> StructuralReport {
    let mut report = StructuralReport::default();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Encrypted" => report.encrypted = value.starts_with("yes"),
            "Pages" => report.page_count = value.parse().unwrap_or(0),
            "Form" => report.has_form = !value.eq_ignore_ascii_case("none"),
            "Producer" => {
                if !value.is_empty() {
                    report.producer = Some(value.to_string());
                }
            }
            "Creator" => {
                if !value.is_empty() {
                    report.creator = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    report
}

/// Whether `name` occurs in `raw` as a complete PDF name token, i.e. not as
/// a prefix of a longer name (`/JS` must not match `/JSFoo`).
pub fn contains_name(raw: &[u8], name: &[u8]) -> bool {
    raw.windows(name.len())
        .enumerate()
        .any(|(i, w)| w == name && !is_name_char(raw.get(i + name.len()).copied()))
}

/// PDF name tokens continue through "regular" characters; anything else
/// (delimiter, whitespace, EOF) terminates the name.
fn is_name_char(b: Option<u8>) -> bool {
    match b {
        None => false,
        Some(b) => !matches!(
            b,
            b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' '
                | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PDFINFO: &str = "\
Title:          Quarterly report
Creator:        LibreOffice 7.4
Producer:       LibreOffice 7.4
CreationDate:   Tue Mar  4 10:00:00 2025 UTC
Custom Metadata: no
Metadata Stream: no
Tagged:         no
UserProperties: no
Suspects:       no
Form:           none
JavaScript:     no
Pages:          12
Encrypted:      no
Page size:      595.28 x 841.89 pts (A4)
File size:      204800 bytes
Optimized:      no
PDF version:    1.6
";

    #[test]
    fn parses_clean_document() {
        let r = parse_pdfinfo(SAMPLE_PDFINFO);
        assert!(!r.encrypted);
        assert_eq!(r.page_count, 12);
        assert!(!r.has_form);
        assert_eq!(r.producer.as_deref(), Some("LibreOffice 7.4"));
        assert_eq!(r.creator.as_deref(), Some("LibreOffice 7.4"));
    }

    #[test]
    fn parses_encrypted_with_detail() {
        let r = parse_pdfinfo("Pages: 3\nEncrypted: yes (print:no copy:no change:no addNotes:no algorithm:AES-256)\n");
        assert!(r.encrypted);
        assert_eq!(r.page_count, 3);
    }

    #[test]
    fn form_kinds_other_than_none_flag() {
        assert!(parse_pdfinfo("Form: AcroForm\n").has_form);
        assert!(parse_pdfinfo("Form: XFA\n").has_form);
        assert!(!parse_pdfinfo("Form: none\n").has_form);
    }

    #[test]
    fn name_scan_respects_token_boundaries() {
        assert!(contains_name(b"<< /JS (app.alert) >>", b"/JS"));
        assert!(contains_name(b"<</JS(x)>>", b"/JS"));
        assert!(!contains_name(b"<< /JSFoo 1 >>", b"/JS"));
        assert!(contains_name(b"/Names </EmbeddedFiles", b"/EmbeddedFiles"));
        assert!(!contains_name(b"plain text mentioning JS", b"/JS"));
        // Name at end of buffer still counts.
        assert!(contains_name(b"trailer /JavaScript", b"/JavaScript"));
    }
}
