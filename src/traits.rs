use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Malformed manifest {manifest}: {reason}")]
    ManifestSyntax { manifest: PathBuf, reason: String },
    #[error("Unsupported manifest: {0}")]
    UnsupportedManifest(PathBuf),
    #[error("Go executable not found")]
    ToolchainNotFound,
    #[error("Go version does not support modules: {detail}")]
    ToolchainTooOld { detail: String },
    #[error("Unexpected exit code from go process: {code:?}")]
    ToolchainFailure { code: Option<i32>, stderr: String },
    #[error("Go process timed out after {limit:?}")]
    Timeout { limit: Duration },
    #[error("Go process was interrupted")]
    Cancelled,
    #[error("Initialization failed: {0}")]
    Initialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    /// Errors that mean the toolchain cannot be used for the rest of the run.
    pub fn disables_toolchain(&self) -> bool {
        matches!(
            self,
            ResolveError::ToolchainNotFound | ResolveError::ToolchainTooOld { .. }
        )
    }

    /// Whether a manifest failing with this error should fail the whole scan.
    /// A missing or outdated toolchain is reported but does not.
    pub fn fails_scan(&self) -> bool {
        !self.disables_toolchain()
    }
}

/// Captured result of a finished toolchain process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Non-blank stderr lines; invalid UTF-8 is replaced, never dropped.
    pub fn stderr_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.stderr)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A running external process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Waits for exit while draining stdout and stderr.
    async fn wait(&mut self) -> std::io::Result<ProcessOutput>;

    /// Kills the process and reaps it.
    async fn kill(&mut self) -> std::io::Result<()>;
}

/// Capability to start the external toolchain.
pub trait ToolchainLauncher: Send + Sync {
    fn spawn(
        &self,
        program: &Path,
        args: &[&str],
        cwd: &Path,
    ) -> std::io::Result<Box<dyn ProcessHandle>>;
}
