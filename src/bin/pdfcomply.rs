//! CLI binary for pdf-comply.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`,
//! runs validation or the full pipeline, and prints reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_comply::{
    process_file, validate_file, Capabilities, CloudServiceConfig, PipelineConfig,
    ProcessingResult, ValidationReport,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check a document against the compliance profile
  pdfcomply validate upload.pdf

  # Machine-readable report
  pdfcomply validate upload.pdf --json > report.json

  # Validate and remediate; writes upload.compliant.pdf
  pdfcomply process upload.pdf

  # Explicit output path, quiet
  pdfcomply process upload.pdf -o clean.pdf --quiet

  # With a cloud conversion fallback
  PDFCOMPLY_CLOUD_API_KEY=... \
  pdfcomply process upload.pdf --cloud-endpoint https://convert.example.com/v1/pdf

  # Which external tools were found?
  pdfcomply doctor

COMPLIANCE PROFILE:
  - single PDF file, at most 3 MiB
  - every embedded raster image: 8-bit grayscale, >= 300 DPI
  - no encryption, interactive forms, scripts, or embedded files
  - no OCR-scanned content (terminal: such documents are rejected)

EXTERNAL TOOLS:
  pdfinfo, pdfimages, pdftotext   poppler-utils  (inspection)
  gs                              ghostscript    (conversion)
  qpdf                            qpdf           (structural rewrite)

  Missing inspection tools degrade the affected checks to "unknown";
  without gs no local conversion can run.

EXIT STATUS:
  0  document is compliant (or was remediated to compliance)
  1  document rejected, or remediation left it non-compliant
  2  pipeline error (bad input path, exhaustion, cancellation)
"#;

/// Validate uploaded PDFs against a fixed technical profile and remediate
/// fixable documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdfcomply",
    version,
    about = "Validate PDFs against a gray/300-DPI/3-MiB profile and remediate fixable documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCOMPLY_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and requested reports.
    #[arg(short, long, env = "PDFCOMPLY_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a document against the compliance profile (no conversion).
    Validate {
        /// PDF file to check.
        input: PathBuf,

        /// Print the full report as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Validate, then remediate fixable defects through the conversion cascade.
    Process {
        /// PDF file to process.
        input: PathBuf,

        /// Output path. Default: `<input stem>.compliant.pdf`.
        #[arg(short, long, env = "PDFCOMPLY_OUTPUT")]
        output: Option<PathBuf>,

        /// Print the report and attempt log as JSON.
        #[arg(long)]
        json: bool,

        /// Per-tool time budget in seconds.
        #[arg(long, env = "PDFCOMPLY_TOOL_TIMEOUT", default_value_t = 120)]
        tool_timeout: u64,

        /// Cloud conversion endpoint (https). Repeat for a second fallback.
        #[arg(long, env = "PDFCOMPLY_CLOUD_ENDPOINT")]
        cloud_endpoint: Vec<String>,

        /// Bearer credential for the cloud endpoint(s).
        #[arg(long, env = "PDFCOMPLY_CLOUD_API_KEY", hide_env_values = true)]
        cloud_api_key: Option<String>,
    },

    /// Report which external tools were found on PATH.
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let caps = Capabilities::detect();

    let exit = match cli.command {
        Command::Validate { input, json } => cmd_validate(&caps, &input, json).await?,
        Command::Process {
            input,
            output,
            json,
            tool_timeout,
            cloud_endpoint,
            cloud_api_key,
        } => {
            cmd_process(
                &caps,
                &input,
                output,
                json,
                tool_timeout,
                cloud_endpoint,
                cloud_api_key,
                cli.quiet,
            )
            .await?
        }
        Command::Doctor => cmd_doctor(&caps),
    };

    std::process::exit(exit);
}

async fn cmd_validate(caps: &Capabilities, input: &Path, json: bool) -> Result<i32> {
    let config = PipelineConfig::default();
    let report = validate_file(input, caps, &config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialise report")?
        );
    } else {
        print_report(&report, input);
    }
    Ok(if report.valid { 0 } else { 1 })
}

#[allow(clippy::too_many_arguments)]
async fn cmd_process(
    caps: &Capabilities,
    input: &Path,
    output: Option<PathBuf>,
    json: bool,
    tool_timeout: u64,
    cloud_endpoints: Vec<String>,
    cloud_api_key: Option<String>,
    quiet: bool,
) -> Result<i32> {
    let mut builder = PipelineConfig::builder().local_tool_timeout_secs(tool_timeout);
    for (i, endpoint) in cloud_endpoints.iter().enumerate() {
        builder = builder.cloud_service(CloudServiceConfig {
            name: format!("cloud-{}", i + 1),
            endpoint: endpoint.clone(),
            api_key: cloud_api_key.clone().unwrap_or_default(),
        });
    }
    let config = builder.build().context("invalid configuration")?;

    let spinner = if quiet || json {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("processing {}", input.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let outcome = process_file(input, caps, &config).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let (report, processed) = match outcome {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{} {e}", red("✘"));
            return Ok(2);
        }
    };

    if json {
        let view = serde_json::json!({
            "report": &report,
            "processing": &processed,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("failed to serialise result")?
        );
    } else {
        print_report(&report, input);
    }

    match processed {
        None if report.valid => {
            if !json && !quiet {
                eprintln!("{} already compliant, nothing to do", green("✔"));
            }
            Ok(0)
        }
        None => {
            // Terminal rejection; the report printed the reasons.
            Ok(1)
        }
        Some(result) => {
            let dest = output.unwrap_or_else(|| default_output(input));
            tokio::fs::write(&dest, &result.buffer)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
            if !json {
                print_processing(&result, &dest, quiet);
            }
            Ok(if result.verification.is_compliant() { 0 } else { 1 })
        }
    }
}

fn cmd_doctor(caps: &Capabilities) -> i32 {
    println!("{}", bold("external tools"));
    let mut missing = 0;
    for (tool, path) in caps.summary() {
        match path {
            Some(p) => println!("  {} {:<10} {}", green("✔"), tool, dim(&p.display().to_string())),
            None => {
                missing += 1;
                println!("  {} {:<10} {}", red("✘"), tool, dim("not found on PATH"));
            }
        }
    }
    if !caps.can_convert() {
        println!(
            "\n{} no conversion tool available; remediation cannot run",
            red("✘")
        );
        return 1;
    }
    if missing > 0 {
        println!(
            "\n{} {missing} tool(s) missing; affected checks degrade to \"unknown\"",
            yellow("⚠")
        );
    }
    0
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    input.with_file_name(format!("{stem}.compliant.pdf"))
}

fn print_report(report: &ValidationReport, input: &Path) {
    let verdict = if report.valid {
        green("✔ compliant")
    } else if report.is_processable {
        yellow("⚠ fixable")
    } else {
        red("✘ rejected")
    };
    println!("{}  {}", bold(&input.display().to_string()), verdict);
    println!("  {}", report.summary);
    for error in &report.errors {
        println!("  {} {error}", red("✗"));
    }
    for warning in &report.warnings {
        println!("  {} {}", yellow("⚠"), dim(warning));
    }
}

fn print_processing(result: &ProcessingResult, dest: &Path, quiet: bool) {
    let tick = if result.verification.is_compliant() {
        green("✔")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{tick} {} -> {} bytes ({:.1}% saved)  →  {}",
        result.original_size,
        result.processed_size,
        result.compression_ratio * 100.0,
        bold(&dest.display().to_string()),
    );
    if !quiet {
        for line in &result.optimizations {
            eprintln!("   {}", dim(line));
        }
        if !result.verification.is_compliant() {
            for error in &result.verification.errors {
                eprintln!("   {} {error}", yellow("⚠"));
            }
        }
    }
    let _ = io::stderr().flush();
}
