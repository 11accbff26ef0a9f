//! Manifest sources.
//!
//! A manifest is either read directly (`Gopkg.lock`) or described by running
//! `go mod edit -json` next to it (`go.mod`). This module owns the external
//! process: launching it, bounding the wait, reacting to interruption, and
//! classifying its exit status.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::traits::{ProcessHandle, ProcessOutput, ResolveError, ToolchainLauncher};

pub const GOPKG_LOCK: &str = "Gopkg.lock";
pub const GO_MOD: &str = "go.mod";

const MOD_EDIT_ARGS: [&str; 3] = ["mod", "edit", "-json"];

pub const EXIT_OK: i32 = 0;
/// `go mod edit` outside of a module.
pub const EXIT_NO_MODULE: i32 = 1;
pub const EXIT_POSSIBLY_TOO_OLD: i32 = 2;
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

const UNSUPPORTED_SUBCOMMAND: &str = "unknown subcommand \"mod\"";

// ============================================================================
// Manifest kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// `Gopkg.lock`, parsed directly
    LockTable,
    /// `go.mod`, described by the toolchain
    Toolchain,
}

impl ManifestKind {
    pub fn detect(path: &Path) -> Option<Self> {
        match path.file_name()?.to_str()? {
            GOPKG_LOCK => Some(ManifestKind::LockTable),
            GO_MOD => Some(ManifestKind::Toolchain),
            _ => None,
        }
    }

    /// Name recorded as the source of every evidence item.
    pub fn source_name(&self) -> &'static str {
        match self {
            ManifestKind::LockTable => GOPKG_LOCK,
            ManifestKind::Toolchain => GO_MOD,
        }
    }
}

/// Raw manifest content, tagged by grammar.
#[derive(Debug, Clone)]
pub enum ManifestDocument {
    LockTable(String),
    ToolchainJson(Vec<u8>),
}

// ============================================================================
// Interruption
// ============================================================================

/// Cooperative cancellation signal shared between the caller and the source.
///
/// Once raised it stays raised, so the caller can still observe it after a
/// [`ResolveError::Cancelled`] has been returned.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once the signal is raised.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|raised| *raised).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Tokio launcher
// ============================================================================

/// Launches real processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLauncher;

impl ToolchainLauncher for TokioLauncher {
    fn spawn(
        &self,
        program: &Path,
        args: &[&str],
        cwd: &Path,
    ) -> std::io::Result<Box<dyn ProcessHandle>> {
        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Box::new(TokioProcess { child }))
    }
}

struct TokioProcess {
    child: Child,
}

async fn drain<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl ProcessHandle for TokioProcess {
    async fn wait(&mut self) -> std::io::Result<ProcessOutput> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let (status, stdout, stderr) =
            tokio::try_join!(self.child.wait(), drain(stdout), drain(stderr))?;
        Ok(ProcessOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}

// ============================================================================
// Exit classification
// ============================================================================

/// Maps a finished `go mod edit -json` run onto the resolver's error model.
///
/// Exit codes 0 and 1 mean stdout can be parsed; everything else is an error.
pub fn classify_exit(output: &ProcessOutput) -> Result<(), ResolveError> {
    match output.code {
        Some(EXIT_OK) | Some(EXIT_NO_MODULE) => Ok(()),
        Some(EXIT_COMMAND_NOT_FOUND) => Err(ResolveError::ToolchainNotFound),
        Some(EXIT_POSSIBLY_TOO_OLD) => {
            match output
                .stderr_lines()
                .into_iter()
                .find(|line| line.contains(UNSUPPORTED_SUBCOMMAND))
            {
                Some(detail) => Err(ResolveError::ToolchainTooOld { detail }),
                None => Err(failure(output)),
            }
        }
        _ => Err(failure(output)),
    }
}

fn failure(output: &ProcessOutput) -> ResolveError {
    ResolveError::ToolchainFailure {
        code: output.code,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

// ============================================================================
// Manifest source
// ============================================================================

/// Produces [`ManifestDocument`]s, launching the toolchain where needed.
pub struct ManifestSource<L: ToolchainLauncher> {
    launcher: L,
    go: PathBuf,
    timeout: Duration,
    interrupt: Interrupt,
}

impl<L: ToolchainLauncher> ManifestSource<L> {
    pub fn new(launcher: L, go: PathBuf, timeout: Duration, interrupt: Interrupt) -> Self {
        Self {
            launcher,
            go,
            timeout,
            interrupt,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub async fn read(
        &self,
        kind: ManifestKind,
        manifest: &Path,
    ) -> Result<ManifestDocument, ResolveError> {
        match kind {
            ManifestKind::LockTable => {
                let text = tokio::fs::read_to_string(manifest).await?;
                Ok(ManifestDocument::LockTable(text))
            }
            ManifestKind::Toolchain => {
                let folder = manifest.parent().unwrap_or_else(|| Path::new("."));
                let folder = if folder.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    folder
                };
                let output = self.mod_edit(folder).await.map_err(|e| match e {
                    ResolveError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                        ResolveError::ToolchainNotFound
                    }
                    other => other,
                })?;
                classify_exit(&output)?;
                for line in output.stderr_lines() {
                    warn!(manifest = %manifest.display(), "{}", line);
                }
                Ok(ManifestDocument::ToolchainJson(output.stdout))
            }
        }
    }

    /// Runs the same invocation in a scratch directory to decide whether the
    /// toolchain is usable at all.
    ///
    /// Anything that prevents a verdict (spawn failure, timeout, interruption)
    /// is reported as [`ResolveError::Initialization`].
    pub async fn probe(&self, scratch: &Path) -> Result<(), ResolveError> {
        let output = self.mod_edit(scratch).await.map_err(|e| match e {
            ResolveError::Io(io) => ResolveError::Initialization(format!(
                "unable to launch `{}`: {}",
                self.go.display(),
                io
            )),
            ResolveError::Cancelled => {
                ResolveError::Initialization("go mod process was interrupted".to_string())
            }
            ResolveError::Timeout { limit } => ResolveError::Initialization(format!(
                "go mod process timed out after {:?}",
                limit
            )),
            other => other,
        })?;
        classify_exit(&output)
    }

    async fn mod_edit(&self, folder: &Path) -> Result<ProcessOutput, ResolveError> {
        if !folder.is_dir() {
            return Err(ResolveError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} should have been a directory", folder.display()),
            )));
        }
        if self.interrupt.is_raised() {
            return Err(ResolveError::Cancelled);
        }

        info!(
            go = %self.go.display(),
            folder = %folder.display(),
            "Launching go mod edit -json"
        );
        let mut handle = self.launcher.spawn(&self.go, &MOD_EDIT_ARGS, folder)?;
        await_exit(handle.as_mut(), self.timeout, &self.interrupt).await
    }
}

/// Waits for `handle` with an upper bound, racing the interrupt signal.
///
/// On timeout or interruption the process is killed and reaped before the
/// error is returned.
pub(crate) async fn await_exit(
    handle: &mut dyn ProcessHandle,
    limit: Duration,
    interrupt: &Interrupt,
) -> Result<ProcessOutput, ResolveError> {
    let outcome = tokio::select! {
        biased;
        _ = interrupt.raised() => Err(ResolveError::Cancelled),
        waited = timeout(limit, handle.wait()) => match waited {
            Ok(Ok(output)) => return Ok(output),
            Ok(Err(e)) => Err(ResolveError::Io(e)),
            Err(_) => Err(ResolveError::Timeout { limit }),
        },
    };

    if let Err(e) = handle.kill().await {
        warn!(error = %e, "Failed to kill go process");
    }
    outcome
}
