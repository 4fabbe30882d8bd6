//! Bounded subprocess execution and scoped scratch artifacts.
//!
//! ## Why bound every tool call?
//!
//! Every external tool is a blocking call from the perspective of the stage
//! that issued it. An unkillable Ghostscript wedged on a pathological file
//! would otherwise pin a worker forever. Each invocation runs under
//! `tokio::time::timeout` with `kill_on_drop`, so an expired budget reaps
//! the child rather than abandoning it.
//!
//! ## Why a per-run workspace?
//!
//! Different documents' pipelines run concurrently and share only the
//! temporary-file namespace. Each run gets its own `TempDir` (removed on
//! drop, panic included) and artifact names carry a timestamp plus a random
//! component, so concurrent runs never collide and need no locking.

use crate::error::StageError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured output of a completed tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout as lossily-decoded UTF-8 (tool reports are ASCII in practice).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run an external tool with a hard time budget.
///
/// * Spawn failure → [`StageError::ToolUnavailable`]
/// * Non-zero exit → [`StageError::ToolFailed`] (stderr trimmed for display)
/// * Budget expired → [`StageError::ToolTimeout`]; the child is killed when
///   the dropped future reaps it (`kill_on_drop`).
pub async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<ToolOutput, StageError> {
    debug!("exec {} {:?} (budget {:?})", program.display(), args, timeout);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StageError::ToolUnavailable {
            tool: tool.to_string(),
            detail: e.to_string(),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(StageError::ToolFailed {
                tool: tool.to_string(),
                code: None,
                stderr: e.to_string(),
            })
        }
        Err(_) => {
            warn!("{} exceeded {:?}, killing", tool, timeout);
            return Err(StageError::ToolTimeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };

    let stderr = truncate_for_display(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(StageError::ToolFailed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr,
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr,
    })
}

/// Keep failure messages readable in reports and logs.
fn truncate_for_display(s: &str) -> String {
    const MAX: usize = 400;
    let s = s.trim();
    if s.len() <= MAX {
        return s.to_string();
    }
    let cut = s
        .char_indices()
        .take_while(|(i, _)| *i < MAX)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(MAX);
    format!("{}\u{2026}", &s[..cut])
}

// ── Workspace ────────────────────────────────────────────────────────────

/// Per-run scratch directory. Everything inside is removed when the
/// workspace drops, even if a stage panicked; individual stages still delete
/// their own artifacts eagerly so a long cascade never accumulates copies.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self, StageError> {
        let dir = TempDir::with_prefix("pdfcomply-").map_err(|e| StageError::Io {
            stage: "workspace".into(),
            detail: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh, collision-resistant artifact path: `<label>-<millis>-<rand>.<ext>`.
    ///
    /// The file is not created; the caller (or the tool it invokes) does
    /// that, and the same caller removes it on every exit path.
    pub fn artifact(&self, label: &str, ext: &str) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let nonce: u32 = rand::random();
        self.dir
            .path()
            .join(format!("{label}-{millis}-{nonce:08x}.{ext}"))
    }

    /// Materialise `bytes` as a new uniquely-named artifact.
    pub async fn write_artifact(
        &self,
        label: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StageError> {
        let path = self.artifact(label, ext);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StageError::Io {
                stage: label.to_string(),
                detail: format!("write {}: {}", path.display(), e),
            })?;
        Ok(path)
    }
}

/// Best-effort eager removal of a stage-owned artifact. Failure is logged,
/// not surfaced: the workspace's drop handler is the backstop.
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("could not remove {}: {}", path.display(), e);
        }
    }
}

/// Size of a file in bytes, `None` if it does not exist or is unreadable.
pub async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn artifact_names_do_not_collide() {
        let ws = Workspace::new().unwrap();
        let a = ws.artifact("stage", "pdf");
        let b = ws.artifact("stage", "pdf");
        assert_ne!(a, b);
        assert!(a.starts_with(ws.path()));
    }

    #[tokio::test]
    async fn write_artifact_round_trip() {
        let ws = Workspace::new().unwrap();
        let path = ws.write_artifact("in", "pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");
        remove_quietly(&path).await;
        assert!(file_size(&path).await.is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let err = run_tool(
            "nonexistent",
            Path::new("/definitely/not/a/binary"),
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.is_tool_unavailable(), "got: {err:?}");
    }

    #[tokio::test]
    async fn nonzero_exit_is_tool_failed() {
        let err = run_tool(
            "false",
            Path::new("/bin/false"),
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StageError::ToolFailed { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn sleep_past_budget_times_out() {
        let err = run_tool(
            "sleep",
            Path::new("/bin/sleep"),
            &["5".to_string()],
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StageError::ToolTimeout { .. }), "got: {err:?}");
    }

    #[test]
    fn truncation_preserves_short_strings() {
        assert_eq!(truncate_for_display("  short  "), "short");
        let long = "x".repeat(1000);
        let t = truncate_for_display(&long);
        assert!(t.len() < 1000);
        assert!(t.ends_with('\u{2026}'));
    }
}
