//! Embedded-image enumeration and per-image compliance.
//!
//! `pdfimages -list` prints one row per embedded image instance as a
//! positional table. The column contract (by index, not by header name) is
//! pinned here and in the tests below, so a poppler version that drifts the
//! format surfaces as a localised test failure instead of silent
//! misclassification:
//!
//! ```text
//! idx:  0    1   2     3     4      5     6    7   8   9      10     11 12    13    14   15
//!       page num type  width height color comp bpc enc interp object ID x-ppi y-ppi size ratio
//! ```
//!
//! The first two lines (header and dashes) are not data.

use crate::capabilities::Capabilities;
use crate::config::ComplianceThresholds;
use crate::error::StageError;
use crate::exec::run_tool;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One embedded raster image instance, as reported by the listing tool.
///
/// Never persisted; recomputed on each verification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub page: u32,
    pub index: u32,
    /// Row kind: `image`, `smask`, `stencil`, …
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
    pub bits_per_component: u8,
    /// Horizontal resolution; 0 when the tool printed `inf` or a dash.
    pub x_dpi: u32,
    pub y_dpi: u32,
}

impl ImageDescriptor {
    /// Compliant iff colour space is gray, depth is 8 bit, and both axes
    /// meet the DPI floor.
    pub fn is_compliant(&self, t: &ComplianceThresholds) -> bool {
        self.color_space == t.required_color_space
            && self.bits_per_component == t.required_bits_per_component
            && self.x_dpi >= t.required_dpi
            && self.y_dpi >= t.required_dpi
    }
}

/// Aggregated compliance view over all embedded images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub total_images: usize,
    pub valid_images: usize,
    /// One entry per image below the DPI floor.
    pub resolution_issues: Vec<String>,
    /// One entry per image with wrong colour space or bit depth.
    pub color_issues: Vec<String>,
}

impl ImageAnalysis {
    pub fn is_compliant(&self) -> bool {
        self.resolution_issues.is_empty() && self.color_issues.is_empty()
    }
}

/// Enumerates embedded images and scores them against the thresholds.
#[derive(Debug)]
pub struct ImageComplianceAnalyzer<'a> {
    caps: &'a Capabilities,
    thresholds: ComplianceThresholds,
    timeout: Duration,
}

impl<'a> ImageComplianceAnalyzer<'a> {
    pub fn new(caps: &'a Capabilities, thresholds: ComplianceThresholds, timeout: Duration) -> Self {
        Self {
            caps,
            thresholds,
            timeout,
        }
    }

    /// List and score every embedded image in the artifact at `path`.
    ///
    /// Zero images is trivially compliant (the caller records an
    /// informational warning, not an error). A missing tool surfaces as
    /// [`StageError::ToolUnavailable`] so the caller can degrade the whole
    /// check to unknown rather than failing closed.
    pub async fn analyze(&self, path: &Path) -> Result<ImageAnalysis, StageError> {
        let pdfimages = self
            .caps
            .pdfimages
            .as_ref()
            .ok_or_else(|| StageError::ToolUnavailable {
                tool: "pdfimages".into(),
                detail: "not found on PATH".into(),
            })?;

        let output = run_tool(
            "pdfimages",
            pdfimages,
            &["-list".to_string(), path.display().to_string()],
            self.timeout,
        )
        .await?;

        let descriptors = parse_image_table(&output.stdout_text())?;
        Ok(self.score(&descriptors))
    }

    /// Pure scoring half, separated so it can be tested without a tool.
    pub fn score(&self, descriptors: &[ImageDescriptor]) -> ImageAnalysis {
        let t = &self.thresholds;
        let mut analysis = ImageAnalysis {
            total_images: descriptors.len(),
            ..Default::default()
        };

        for img in descriptors {
            let mut ok = true;

            if img.color_space != t.required_color_space
                || img.bits_per_component != t.required_bits_per_component
            {
                ok = false;
                analysis.color_issues.push(format!(
                    "image {} on page {}: {} {}-bit (need {} {}-bit)",
                    img.index,
                    img.page,
                    img.color_space,
                    img.bits_per_component,
                    t.required_color_space,
                    t.required_bits_per_component,
                ));
            }

            if img.x_dpi < t.required_dpi || img.y_dpi < t.required_dpi {
                ok = false;
                analysis.resolution_issues.push(format!(
                    "image {} on page {}: {}x{} DPI (need >={})",
                    img.index, img.page, img.x_dpi, img.y_dpi, t.required_dpi,
                ));
            }

            if ok {
                analysis.valid_images += 1;
            }
        }

        analysis
    }
}

/// Parse the `pdfimages -list` table by fixed column index.
pub fn parse_image_table(text: &str) -> Result<Vec<ImageDescriptor>, StageError> {
    let mut descriptors = Vec::new();

    // First two lines are the header and its dashed underline.
    for (line_no, line) in text.lines().enumerate().skip(2) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            continue;
        }
        if cols.len() < 14 {
            return Err(StageError::UnparseableOutput {
                tool: "pdfimages".into(),
                detail: format!(
                    "line {}: expected >=14 columns, got {}: '{}'",
                    line_no + 1,
                    cols.len(),
                    line.trim()
                ),
            });
        }

        descriptors.push(ImageDescriptor {
            page: parse_u32(cols[0]),
            index: parse_u32(cols[1]),
            kind: cols[2].to_string(),
            width: parse_u32(cols[3]),
            height: parse_u32(cols[4]),
            color_space: cols[5].to_string(),
            bits_per_component: parse_u32(cols[7]).min(u8::MAX as u32) as u8,
            x_dpi: parse_dpi(cols[12]),
            y_dpi: parse_dpi(cols[13]),
        });
    }

    Ok(descriptors)
}

fn parse_u32(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

/// DPI columns can print `inf` (vector-placed images) or a dash. Both parse
/// to 0 and count as a resolution failure, which matches treating images
/// without a meaningful placement resolution as non-compliant.
fn parse_dpi(s: &str) -> u32 {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verbatim shape of poppler's `pdfimages -list` output.
    const SAMPLE_TABLE: &str = "\
page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio
--------------------------------------------------------------------------------------------
   1     0 image    2550  3300  gray    1   8  jpeg   no        11  0   300   300  198K 2.4%
   2     1 image    1275  1650  cmyk    4   8  jpeg   no        12  0   150   150  421K 5.1%
   2     2 image     100   100  rgb     3   8  image  no        14  0    72    72 29.3K 100%
";

    #[test]
    fn parses_fixed_columns() {
        let imgs = parse_image_table(SAMPLE_TABLE).unwrap();
        assert_eq!(imgs.len(), 3);

        assert_eq!(imgs[0].page, 1);
        assert_eq!(imgs[0].color_space, "gray");
        assert_eq!(imgs[0].bits_per_component, 8);
        assert_eq!(imgs[0].x_dpi, 300);
        assert_eq!(imgs[0].y_dpi, 300);

        assert_eq!(imgs[1].color_space, "cmyk");
        assert_eq!(imgs[1].x_dpi, 150);

        assert_eq!(imgs[2].color_space, "rgb");
        assert_eq!(imgs[2].width, 100);
    }

    #[test]
    fn empty_table_is_zero_images() {
        let header_only = "\
page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio
--------------------------------------------------------------------------------------------
";
        assert!(parse_image_table(header_only).unwrap().is_empty());
        assert!(parse_image_table("").unwrap().is_empty());
    }

    #[test]
    fn truncated_row_is_a_parse_error() {
        let bad = "\
page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio
--------------------------------------------------------------------------------------------
   1     0 image    2550  3300  gray
";
        let err = parse_image_table(bad).unwrap_err();
        assert!(matches!(err, StageError::UnparseableOutput { .. }));
    }

    #[test]
    fn inf_dpi_counts_as_noncompliant() {
        let table = "\
h1
h2
   1     0 image     800   600  gray    1   8  image  no         9  0   inf   inf  10K  50%
";
        let imgs = parse_image_table(table).unwrap();
        assert_eq!(imgs[0].x_dpi, 0);
        assert!(!imgs[0].is_compliant(&ComplianceThresholds::default()));
    }

    #[test]
    fn scoring_splits_issue_categories() {
        let caps = Capabilities::default();
        let analyzer = ImageComplianceAnalyzer::new(
            &caps,
            ComplianceThresholds::default(),
            Duration::from_secs(5),
        );
        let imgs = parse_image_table(SAMPLE_TABLE).unwrap();
        let analysis = analyzer.score(&imgs);

        assert_eq!(analysis.total_images, 3);
        assert_eq!(analysis.valid_images, 1);
        // cmyk@150 fails both; rgb@72 fails both.
        assert_eq!(analysis.color_issues.len(), 2);
        assert_eq!(analysis.resolution_issues.len(), 2);
        assert!(!analysis.is_compliant());
        assert!(analysis.color_issues[0].contains("cmyk"));
        assert!(analysis.resolution_issues[0].contains("150x150"));
    }

    #[test]
    fn single_cmyk_150_yields_one_issue_per_category() {
        let caps = Capabilities::default();
        let analyzer = ImageComplianceAnalyzer::new(
            &caps,
            ComplianceThresholds::default(),
            Duration::from_secs(5),
        );
        let imgs = vec![ImageDescriptor {
            page: 1,
            index: 0,
            kind: "image".into(),
            width: 1000,
            height: 1000,
            color_space: "cmyk".into(),
            bits_per_component: 8,
            x_dpi: 150,
            y_dpi: 150,
        }];
        let analysis = analyzer.score(&imgs);
        assert_eq!(analysis.color_issues.len(), 1);
        assert_eq!(analysis.resolution_issues.len(), 1);
        assert_eq!(analysis.valid_images, 0);
    }

    #[test]
    fn compliant_gray_image_passes() {
        let img = ImageDescriptor {
            page: 1,
            index: 0,
            kind: "image".into(),
            width: 2550,
            height: 3300,
            color_space: "gray".into(),
            bits_per_component: 8,
            x_dpi: 300,
            y_dpi: 600,
        };
        assert!(img.is_compliant(&ComplianceThresholds::default()));
    }
}
