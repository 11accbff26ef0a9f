//! Resolver configuration.
//!
//! [`ResolverConfig`] deserializes with defaults so a host engine can embed it
//! in its own settings file, and offers builder methods for programmatic use.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Bare command name used when no usable executable path is configured.
pub const DEFAULT_GO_COMMAND: &str = "go";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Path to the `go` executable
    pub go_path: Option<PathBuf>,

    /// Upper bound on a single toolchain invocation (seconds)
    pub process_timeout_secs: u64,

    /// Directory the capability probe runs in (default: OS temp dir)
    pub scratch_dir: Option<PathBuf>,

    /// Maximum number of manifests resolved at once
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            go_path: None,
            process_timeout_secs: 120,
            scratch_dir: None,
            concurrency: 4,
        }
    }
}

impl ResolverConfig {
    pub fn with_go_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.go_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Resolves the executable to launch.
    ///
    /// A configured path is used only when it names an existing file;
    /// otherwise the bare `go` command is looked up on `PATH`.
    pub fn go_command(&self) -> PathBuf {
        match &self.go_path {
            None => {
                warn!("Path to `go` executable not set, trying default location");
                PathBuf::from(DEFAULT_GO_COMMAND)
            }
            Some(path) if path.is_file() => {
                path.canonicalize().unwrap_or_else(|_| path.clone())
            }
            Some(path) => {
                warn!(
                    path = %path.display(),
                    "Path to `go` executable does not exist, trying default location"
                );
                PathBuf::from(DEFAULT_GO_COMMAND)
            }
        }
    }
}
