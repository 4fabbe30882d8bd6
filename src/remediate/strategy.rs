//! Local conversion strategies: the Ghostscript/qpdf passes the engine can
//! chain.
//!
//! Every strategy is one shape of "rewrite the document towards 8-bit gray
//! at 300 DPI". They differ in aggressiveness:
//!
//! * [`LocalStrategy::Primary`] — the standard full conversion. Downsamples
//!   every image class to 300 DPI, converts colour to gray, re-encodes
//!   JPEGs instead of passing them through, subsets fonts.
//! * [`LocalStrategy::Extreme`] — primary plus forced image filters
//!   (`DCTEncode` for contone, `CCITTFaxEncode` for mono) at a fixed JPEG
//!   quality, for documents whose images resist the standard pass.
//! * The fallback cascade ([`LocalStrategy::FALLBACK_CASCADE`]) — five
//!   progressively cruder passes for documents the two main conversions
//!   choke on: page-by-page rebuild, colour-only conversion, a structural
//!   rewrite through `qpdf`, a conservative `/ebook` preset, and a
//!   bare-minimum gray pass with no other options.
//! * [`LocalStrategy::SizeGate`] — a single final pass when the artifact is
//!   compliant but still over the size limit: contone images drop to 150
//!   DPI, mono stays at 300.
//!
//! A strategy writes `output` from `input` and says nothing about
//! compliance; the engine verifies separately. A run that exits zero but
//! leaves a missing or empty output is an [`StageError::EmptyArtifact`] —
//! Ghostscript is capable of exactly that on malformed input.

use crate::capabilities::Capabilities;
use crate::error::StageError;
use crate::exec::{file_size, remove_quietly, run_tool};
use crate::inspect::structure::parse_pdfinfo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One local conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalStrategy {
    Primary,
    Extreme,
    PageRebuild,
    MinimalGray,
    StructuralClean,
    Conservative,
    BareMinimumGray,
    SizeGate,
}

impl LocalStrategy {
    /// The fallback cascade, in the order the engine tries it.
    pub const FALLBACK_CASCADE: [LocalStrategy; 5] = [
        LocalStrategy::PageRebuild,
        LocalStrategy::MinimalGray,
        LocalStrategy::StructuralClean,
        LocalStrategy::Conservative,
        LocalStrategy::BareMinimumGray,
    ];

    /// Stable name used in attempt records and logs.
    pub fn name(&self) -> &'static str {
        match self {
            LocalStrategy::Primary => "gs-primary",
            LocalStrategy::Extreme => "gs-extreme",
            LocalStrategy::PageRebuild => "gs-page-rebuild",
            LocalStrategy::MinimalGray => "gs-minimal-gray",
            LocalStrategy::StructuralClean => "qpdf-structural-clean",
            LocalStrategy::Conservative => "gs-conservative",
            LocalStrategy::BareMinimumGray => "gs-bare-minimum",
            LocalStrategy::SizeGate => "gs-size-gate",
        }
    }

    /// Run this pass, writing `output` from `input`.
    pub async fn attempt(
        &self,
        caps: &Capabilities,
        timeout: Duration,
        input: &Path,
        output: &Path,
    ) -> Result<(), StageError> {
        debug!("strategy {}: {} -> {}", self.name(), input.display(), output.display());
        match self {
            LocalStrategy::Primary => {
                run_gs(caps, timeout, primary_args(input, output)).await?
            }
            LocalStrategy::Extreme => {
                run_gs(caps, timeout, extreme_args(input, output)).await?
            }
            LocalStrategy::PageRebuild => {
                page_rebuild(caps, timeout, input, output).await?
            }
            LocalStrategy::MinimalGray => {
                run_gs(caps, timeout, minimal_gray_args(input, output)).await?
            }
            LocalStrategy::StructuralClean => {
                structural_clean(caps, timeout, input, output).await?
            }
            LocalStrategy::Conservative => {
                run_gs(caps, timeout, conservative_args(input, output)).await?
            }
            LocalStrategy::BareMinimumGray => {
                run_gs(caps, timeout, bare_minimum_args(input, output)).await?
            }
            LocalStrategy::SizeGate => {
                run_gs(caps, timeout, size_gate_args(input, output)).await?
            }
        }
        require_nonempty(self.name(), output).await
    }
}

/// Empty or missing output from a zero-exit tool still fails the stage.
async fn require_nonempty(stage: &str, output: &Path) -> Result<(), StageError> {
    match file_size(output).await {
        Some(n) if n > 0 => Ok(()),
        _ => Err(StageError::EmptyArtifact {
            stage: stage.to_string(),
        }),
    }
}

async fn run_gs(
    caps: &Capabilities,
    timeout: Duration,
    args: Vec<String>,
) -> Result<(), StageError> {
    let gs = caps.gs.as_ref().ok_or_else(|| StageError::ToolUnavailable {
        tool: "gs".into(),
        detail: "not found on PATH".into(),
    })?;
    run_tool("gs", gs, &args, timeout).await?;
    Ok(())
}

// ── Ghostscript argument builders ────────────────────────────────────────

/// Flags shared by every pdfwrite invocation.
fn gs_base() -> Vec<String> {
    [
        "-q",
        "-dBATCH",
        "-dNOPAUSE",
        "-dSAFER",
        "-sDEVICE=pdfwrite",
        "-dCompatibilityLevel=1.4",
        "-dAutoRotatePages=/None",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn gray_conversion() -> Vec<String> {
    [
        "-sColorConversionStrategy=Gray",
        "-dProcessColorModel=/DeviceGray",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn downsample_to(contone_dpi: u32, mono_dpi: u32) -> Vec<String> {
    vec![
        "-dDownsampleColorImages=true".into(),
        format!("-dColorImageResolution={contone_dpi}"),
        "-dColorImageDownsampleType=/Bicubic".into(),
        "-dDownsampleGrayImages=true".into(),
        format!("-dGrayImageResolution={contone_dpi}"),
        "-dGrayImageDownsampleType=/Bicubic".into(),
        "-dDownsampleMonoImages=true".into(),
        format!("-dMonoImageResolution={mono_dpi}"),
        "-dMonoImageDownsampleType=/Subsample".into(),
    ]
}

fn font_subsetting() -> Vec<String> {
    ["-dSubsetFonts=true", "-dEmbedAllFonts=true"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn io_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        format!("-sOutputFile={}", output.display()),
        input.display().to_string(),
    ]
}

/// The standard full conversion: gray, 300 DPI everywhere, JPEGs re-encoded
/// rather than passed through so colour JPEGs actually become gray.
fn primary_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = gs_base();
    args.extend(gray_conversion());
    args.extend(downsample_to(300, 300));
    args.push("-dPassThroughJPEGImages=false".into());
    args.extend(font_subsetting());
    args.extend(io_args(input, output));
    args
}

/// Primary plus forced filters and a fixed JPEG quality.
fn extreme_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = gs_base();
    args.extend(gray_conversion());
    args.extend(downsample_to(300, 300));
    args.extend(
        [
            "-dPassThroughJPEGImages=false",
            "-dAutoFilterColorImages=false",
            "-dAutoFilterGrayImages=false",
            "-dColorImageFilter=/DCTEncode",
            "-dGrayImageFilter=/DCTEncode",
            "-dMonoImageFilter=/CCITTFaxEncode",
            "-dJPEGQ=60",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.extend(font_subsetting());
    args.extend(io_args(input, output));
    args
}

/// Colour conversion only; no downsampling, no filter forcing. Succeeds on
/// some documents whose image streams make the full passes abort.
fn minimal_gray_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = gs_base();
    args.extend(gray_conversion());
    args.extend(io_args(input, output));
    args
}

/// Conservative preset: let `/ebook` pick the parameters, add gray on top.
fn conservative_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = gs_base();
    args.push("-dPDFSETTINGS=/ebook".into());
    args.extend(gray_conversion());
    args.extend(io_args(input, output));
    args
}

/// Last resort: device and gray strategy, nothing else.
fn bare_minimum_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-q",
        "-dBATCH",
        "-dNOPAUSE",
        "-sDEVICE=pdfwrite",
        "-sColorConversionStrategy=Gray",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(io_args(input, output));
    args
}

/// One size-reduction pass: contone drops to 150 DPI, mono keeps 300.
fn size_gate_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = gs_base();
    args.extend(gray_conversion());
    args.extend(downsample_to(150, 300));
    args.push("-dPassThroughJPEGImages=false".into());
    args.extend(font_subsetting());
    args.extend(io_args(input, output));
    args
}

// ── Composite strategies ─────────────────────────────────────────────────

/// Rebuild the document one page at a time, then recombine.
///
/// Splitting isolates damage: a single broken page that aborts a whole-file
/// conversion converts fine (or fails alone) when extracted. Page parts are
/// removed as soon as the merge finishes.
async fn page_rebuild(
    caps: &Capabilities,
    timeout: Duration,
    input: &Path,
    output: &Path,
) -> Result<(), StageError> {
    let pages = page_count(caps, timeout, input).await?;
    if pages == 0 {
        return Err(StageError::EmptyArtifact {
            stage: "gs-page-rebuild".into(),
        });
    }

    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let mut parts: Vec<PathBuf> = Vec::with_capacity(pages);
    let mut failed = None;

    for page in 1..=pages {
        let part = parent.join(format!(
            "page-{page}-{}.pdf",
            output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "part".into())
        ));
        let mut args = gs_base();
        args.extend(gray_conversion());
        args.extend(downsample_to(300, 300));
        args.push(format!("-dFirstPage={page}"));
        args.push(format!("-dLastPage={page}"));
        args.extend(io_args(input, &part));

        match run_gs(caps, timeout, args).await {
            Ok(()) if file_size(&part).await.unwrap_or(0) > 0 => parts.push(part),
            Ok(()) => {
                debug!("page {page} produced an empty part, dropping it");
                remove_quietly(&part).await;
            }
            Err(e) => {
                failed = Some(e);
                break;
            }
        }
    }

    let result = match failed {
        Some(e) => Err(e),
        None if parts.is_empty() => Err(StageError::EmptyArtifact {
            stage: "gs-page-rebuild".into(),
        }),
        None => {
            let mut args = gs_base();
            args.push(format!("-sOutputFile={}", output.display()));
            args.extend(parts.iter().map(|p| p.display().to_string()));
            run_gs(caps, timeout, args).await
        }
    };

    for part in &parts {
        remove_quietly(part).await;
    }
    result
}

/// Page count via `pdfinfo`, needed to drive the per-page split.
async fn page_count(
    caps: &Capabilities,
    timeout: Duration,
    input: &Path,
) -> Result<usize, StageError> {
    let pdfinfo = caps
        .pdfinfo
        .as_ref()
        .ok_or_else(|| StageError::ToolUnavailable {
            tool: "pdfinfo".into(),
            detail: "not found on PATH".into(),
        })?;
    let out = run_tool("pdfinfo", pdfinfo, &[input.display().to_string()], timeout).await?;
    Ok(parse_pdfinfo(&out.stdout_text()).page_count)
}

/// Object-graph rewrite through `qpdf`: drops unreferenced objects, rebuilds
/// cross-reference tables, recompresses streams. Fixes structural damage
/// Ghostscript trips over; touches no pixels.
async fn structural_clean(
    caps: &Capabilities,
    timeout: Duration,
    input: &Path,
    output: &Path,
) -> Result<(), StageError> {
    let qpdf = caps
        .qpdf
        .as_ref()
        .ok_or_else(|| StageError::ToolUnavailable {
            tool: "qpdf".into(),
            detail: "not found on PATH".into(),
        })?;
    let args = vec![
        "--object-streams=generate".to_string(),
        "--recompress-flate".to_string(),
        "--compression-level=9".to_string(),
        "--linearize".to_string(),
        input.display().to_string(),
        output.display().to_string(),
    ];
    run_tool("qpdf", qpdf, &args, timeout).await?;
    Ok(())
}
