//! One-time detection of the external tools the pipeline can call.
//!
//! ## Why probe once?
//!
//! Every check and conversion stage shells out to poppler, Ghostscript or
//! qpdf. Re-probing `PATH` per document would spawn redundant processes and
//! make "tool disappeared mid-run" a reachable state. Instead the host
//! process probes once at startup and passes the resulting immutable record
//! into every pipeline run; a missing tool degrades the corresponding check
//! to "unknown" instead of failing the document.

use std::path::PathBuf;

/// Immutable record of which external tools are available, and where.
///
/// Fields are public so embedders (and tests) can construct a record that
/// points at alternative binaries with compatible output contracts.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// poppler `pdfinfo`: scalar document metadata (encryption, page count, form kind).
    pub pdfinfo: Option<PathBuf>,
    /// poppler `pdfimages`: positional table of embedded raster images.
    pub pdfimages: Option<PathBuf>,
    /// poppler `pdftotext`: page-ordered plain-text rendering.
    pub pdftotext: Option<PathBuf>,
    /// Ghostscript `gs`: raster re-compression / colour conversion.
    pub gs: Option<PathBuf>,
    /// `qpdf`: object-graph rewrite (structural-clean strategy).
    pub qpdf: Option<PathBuf>,
}

impl Capabilities {
    /// Probe `PATH` for every tool the pipeline knows how to use.
    ///
    /// Never fails: absence is recorded as `None` and handled downstream.
    pub fn detect() -> Self {
        let find = |tool: &str| -> Option<PathBuf> {
            match which::which(tool) {
                Ok(path) => {
                    tracing::debug!("found {} at {}", tool, path.display());
                    Some(path)
                }
                Err(_) => {
                    tracing::warn!("{} not found on PATH; dependent checks degrade to unknown", tool);
                    None
                }
            }
        };

        Self {
            pdfinfo: find("pdfinfo"),
            pdfimages: find("pdfimages"),
            pdftotext: find("pdftotext"),
            gs: find("gs"),
            qpdf: find("qpdf"),
        }
    }

    /// Whether any conversion strategy at all can run locally.
    pub fn can_convert(&self) -> bool {
        self.gs.is_some() || self.qpdf.is_some()
    }

    /// `(tool name, resolved path)` pairs for diagnostics (`pdfcomply doctor`).
    pub fn summary(&self) -> Vec<(&'static str, Option<&PathBuf>)> {
        vec![
            ("pdfinfo", self.pdfinfo.as_ref()),
            ("pdfimages", self.pdfimages.as_ref()),
            ("pdftotext", self.pdftotext.as_ref()),
            ("gs", self.gs.as_ref()),
            ("qpdf", self.qpdf.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_capabilities_cannot_convert() {
        let caps = Capabilities::default();
        assert!(!caps.can_convert());
        assert!(caps.summary().iter().all(|(_, p)| p.is_none()));
    }

    #[test]
    fn gs_alone_is_enough_to_convert() {
        let caps = Capabilities {
            gs: Some(PathBuf::from("/usr/bin/gs")),
            ..Default::default()
        };
        assert!(caps.can_convert());
    }
}
