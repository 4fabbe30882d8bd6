//! The remediation engine: a cascade of conversion stages that turns a
//! fixable document into a compliant one.
//!
//! Stage order is fixed:
//!
//! ```text
//! primary convert ──▶ verify ──▶ extreme convert ──▶ verify
//!        │                              │
//!        └──────── image profile met ◀──┘
//!                        │ no
//!                        ▼
//!        cloud fallback group (≤2 services, in order;
//!        a connectivity failure skips the rest of the group)
//!                        │ still not met
//!                        ▼
//!        local fallback cascade (page rebuild → minimal gray →
//!        structural clean → conservative → bare minimum)
//!                        │
//!                        ▼
//!        size gate (one pass, only when the current artifact is
//!        over the size limit)
//! ```
//!
//! Stages chain: each consumes the artifact produced by the last
//! successful stage (initially the original document), and a failed stage
//! leaves the chain where it was. Every stage is recorded in the attempt
//! log whether it succeeded or not, and the engine stops converting as
//! soon as a verification pass shows the image profile (gray + DPI) is
//! met; only the size gate runs after that point. A stage failure is never
//! fatal on its own — the run errors out only when **no** stage produced a
//! non-empty artifact ([`ComplyError::RemediationExhausted`]).
//!
//! Cancellation is cooperative and checked between stages; a cancelled run
//! returns [`ComplyError::Cancelled`] naming the last completed stage.

pub mod cloud;
pub mod strategy;

use crate::capabilities::Capabilities;
use crate::config::PipelineConfig;
use crate::error::{ComplyError, StageError};
use crate::exec::{remove_quietly, Workspace};
use crate::report::{ComplianceSnapshot, ProcessingResult, RemediationAttempt};
use crate::verify::ComplianceVerifier;
use cloud::CloudConverter;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use strategy::LocalStrategy;
use tracing::{debug, info, warn};

/// Drives the conversion cascade for one document.
#[derive(Debug)]
pub struct RemediationEngine<'a> {
    caps: &'a Capabilities,
    config: &'a PipelineConfig,
}

/// Mutable run state threaded through the stages.
struct RunState {
    attempts: Vec<RemediationAttempt>,
    optimizations: Vec<String>,
    /// Bytes and verification snapshot of the last successful stage.
    best: Option<(Vec<u8>, ComplianceSnapshot)>,
    /// On-disk location of the chain's current artifact (the original
    /// input until a stage succeeds).
    current_path: PathBuf,
    /// The staged original input; never deleted by promotion.
    input_path: PathBuf,
    last_error: String,
    last_stage: String,
}

impl RunState {
    fn new(input_path: PathBuf) -> Self {
        Self {
            attempts: Vec::new(),
            optimizations: Vec::new(),
            best: None,
            current_path: input_path.clone(),
            input_path,
            last_error: "no conversion stage could run".into(),
            last_stage: "start".into(),
        }
    }

    /// Whether the image profile (gray + DPI) has been achieved; size is
    /// the size gate's business.
    fn profile_met(&self) -> bool {
        matches!(&self.best, Some((_, snap)) if snap.grayscale && snap.dpi300)
    }

    /// Whether the chain's current artifact exceeds the size limit. When no
    /// stage has succeeded yet the current artifact is the original input.
    fn oversize(&self, original_len: u64, limit: u64) -> bool {
        match &self.best {
            Some((_, snap)) => !snap.size_within_limit,
            None => original_len > limit,
        }
    }

    /// Current chain payload for stages that consume bytes (cloud upload).
    fn payload<'b>(&'b self, original: &'b [u8]) -> &'b [u8] {
        self.best.as_ref().map(|(b, _)| b.as_slice()).unwrap_or(original)
    }

    fn record_success(&mut self, name: &str, size: u64, elapsed: Duration) {
        self.attempts.push(RemediationAttempt {
            strategy: name.to_string(),
            succeeded: true,
            resulting_size_bytes: Some(size),
            error: None,
            duration_ms: elapsed.as_millis() as u64,
        });
        self.optimizations
            .push(format!("{name}: produced {size} byte artifact"));
        self.last_stage = name.to_string();
    }

    fn record_failure(&mut self, name: &str, error: &StageError, elapsed: Duration) {
        let message = error.to_string();
        self.attempts.push(RemediationAttempt {
            strategy: name.to_string(),
            succeeded: false,
            resulting_size_bytes: None,
            error: Some(message.clone()),
            duration_ms: elapsed.as_millis() as u64,
        });
        self.optimizations.push(format!("{name} failed: {message}"));
        self.last_error = message;
        self.last_stage = name.to_string();
    }

    fn record_verification(&mut self, snap: &ComplianceSnapshot) {
        if snap.is_compliant() {
            self.optimizations.push("verification: compliant".into());
        } else {
            self.optimizations
                .push(format!("verification: non-compliant ({})", snap.errors.join("; ")));
        }
    }
}

impl<'a> RemediationEngine<'a> {
    pub fn new(caps: &'a Capabilities, config: &'a PipelineConfig) -> Self {
        Self { caps, config }
    }

    /// Run the conversion cascade on `input` and return the final artifact
    /// with its audit trail.
    pub async fn remediate(
        &self,
        input: &[u8],
        filename: &str,
    ) -> Result<ProcessingResult, ComplyError> {
        info!("remediating '{}' ({} bytes)", filename, input.len());

        let workspace = Workspace::new()
            .map_err(|e| ComplyError::Internal(format!("no scratch space: {e}")))?;
        let input_path = workspace
            .write_artifact("input", "pdf", input)
            .await
            .map_err(|e| ComplyError::Internal(format!("could not stage input: {e}")))?;

        let verifier = ComplianceVerifier::new(self.caps, self.config);
        let timeout = Duration::from_secs(self.config.local_tool_timeout_secs);
        let mut state = RunState::new(input_path.clone());

        // ── Main conversions ─────────────────────────────────────────────
        for stage in [LocalStrategy::Primary, LocalStrategy::Extreme] {
            self.check_cancel(&state)?;
            self.run_local_stage(&workspace, stage, timeout, &verifier, &mut state)
                .await;
            if state.profile_met() {
                break;
            }
        }

        // ── Cloud fallback group ─────────────────────────────────────────
        if !state.profile_met() {
            for service in &self.config.cloud_services {
                self.check_cancel(&state)?;
                let converter = CloudConverter::new(
                    service,
                    Duration::from_secs(self.config.cloud_timeout_secs),
                );
                let name = format!("cloud-{}", converter.name());
                let payload = state.payload(input).to_vec();
                let start = Instant::now();
                match converter
                    .convert(&payload, filename, &self.config.thresholds)
                    .await
                {
                    Ok(bytes) => {
                        state.record_success(&name, bytes.len() as u64, start.elapsed());
                        let snap = verifier.verify(&bytes).await;
                        state.record_verification(&snap);
                        self.promote(&workspace, bytes, snap, &mut state).await;
                        if state.profile_met() {
                            break;
                        }
                    }
                    Err(e) => {
                        let connectivity = e.is_connectivity();
                        state.record_failure(&name, &e, start.elapsed());
                        if connectivity {
                            warn!("connectivity failure on '{name}', skipping remaining cloud services");
                            state
                                .optimizations
                                .push("cloud group skipped: no connectivity".into());
                            break;
                        }
                    }
                }
            }
        }

        // ── Local fallback cascade ───────────────────────────────────────
        if !state.profile_met() {
            let mut any_fallback_succeeded = false;
            for stage in LocalStrategy::FALLBACK_CASCADE {
                self.check_cancel(&state)?;
                if self
                    .run_local_stage(&workspace, stage, timeout, &verifier, &mut state)
                    .await
                {
                    any_fallback_succeeded = true;
                    if state.profile_met() {
                        break;
                    }
                }
            }
            if !any_fallback_succeeded {
                state
                    .optimizations
                    .push("local fallback cascade: all strategies failed".into());
            }
        }

        // ── Size gate ────────────────────────────────────────────────────
        // One pass only: a second downsample would degrade below the DPI
        // floor, so an artifact that is still oversize afterwards is
        // reported as-is.
        if state.oversize(input.len() as u64, self.config.thresholds.max_size_bytes) {
            self.check_cancel(&state)?;
            self.run_local_stage(
                &workspace,
                LocalStrategy::SizeGate,
                timeout,
                &verifier,
                &mut state,
            )
            .await;
        }

        if state.current_path != input_path {
            remove_quietly(&state.current_path).await;
        }
        remove_quietly(&input_path).await;

        // ── Assemble ─────────────────────────────────────────────────────
        let (buffer, verification) = state.best.take().ok_or_else(|| {
            ComplyError::RemediationExhausted {
                attempts: state.attempts.len(),
                last_error: state.last_error.clone(),
            }
        })?;

        let original_size = input.len() as u64;
        let processed_size = buffer.len() as u64;
        let compression_ratio = ProcessingResult::ratio(original_size, processed_size);
        info!(
            "remediation of '{}' done: {} -> {} bytes ({:.1}% saved), compliant={}",
            filename,
            original_size,
            processed_size,
            compression_ratio * 100.0,
            verification.is_compliant()
        );

        Ok(ProcessingResult {
            buffer,
            original_size,
            processed_size,
            compression_ratio,
            optimizations: state.optimizations,
            attempts: state.attempts,
            verification,
        })
    }

    fn check_cancel(&self, state: &RunState) -> Result<(), ComplyError> {
        if self.config.cancel.is_cancelled() {
            Err(ComplyError::Cancelled {
                after_stage: state.last_stage.clone(),
            })
        } else {
            Ok(())
        }
    }

    /// Run one local strategy against the chain's current artifact and, on
    /// success, verify and promote its output. Returns whether the stage
    /// succeeded; the attempt is recorded either way.
    async fn run_local_stage(
        &self,
        workspace: &Workspace,
        stage: LocalStrategy,
        timeout: Duration,
        verifier: &ComplianceVerifier<'_>,
        state: &mut RunState,
    ) -> bool {
        let source = state.current_path.clone();
        let output = workspace.artifact(stage.name(), "pdf");
        let start = Instant::now();
        let result = stage.attempt(self.caps, timeout, &source, &output).await;
        let elapsed = start.elapsed();

        let bytes = match result {
            Ok(()) => match tokio::fs::read(&output).await {
                Ok(bytes) => {
                    state.record_success(stage.name(), bytes.len() as u64, elapsed);
                    Some(bytes)
                }
                Err(e) => {
                    let err = StageError::Io {
                        stage: stage.name().into(),
                        detail: format!("read artifact: {e}"),
                    };
                    state.record_failure(stage.name(), &err, elapsed);
                    None
                }
            },
            Err(e) => {
                state.record_failure(stage.name(), &e, elapsed);
                None
            }
        };
        remove_quietly(&output).await;

        match bytes {
            Some(bytes) => {
                let snap = verifier.verify(&bytes).await;
                state.record_verification(&snap);
                self.promote(workspace, bytes, snap, state).await;
                true
            }
            None => false,
        }
    }

    /// Make `bytes` the chain's current artifact: stage it on disk for the
    /// next tool invocation and retire the previous stage output.
    async fn promote(
        &self,
        workspace: &Workspace,
        bytes: Vec<u8>,
        snap: ComplianceSnapshot,
        state: &mut RunState,
    ) {
        match workspace.write_artifact("current", "pdf", &bytes).await {
            Ok(new_path) => {
                if state.current_path != state.input_path {
                    remove_quietly(&state.current_path).await;
                }
                state.current_path = new_path;
            }
            Err(e) => {
                // Chain stays where it was on disk; the in-memory best
                // still advances so the result reflects this stage.
                debug!("could not stage promoted artifact: {e}");
            }
        }
        state.best = Some((bytes, snap));
    }
}
