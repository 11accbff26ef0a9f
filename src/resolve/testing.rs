//! Scripted stand-in for the toolchain, used by unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{ProcessHandle, ProcessOutput, ToolchainLauncher};

/// What the next spawned process does.
#[derive(Debug, Clone)]
pub enum Script {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Never exits until killed.
    Hang,
    /// Spawning fails as if the executable did not exist.
    SpawnNotFound,
}

impl Script {
    pub fn exit(code: i32, stdout: &str, stderr: &str) -> Self {
        Script::Exit {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

pub struct FakeLauncher {
    scripts: Mutex<VecDeque<Script>>,
    calls: Arc<Mutex<Vec<Call>>>,
    killed: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
            killed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    /// Number of processes killed so far.
    pub fn killed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.killed)
    }
}

impl ToolchainLauncher for FakeLauncher {
    fn spawn(
        &self,
        program: &Path,
        args: &[&str],
        cwd: &Path,
    ) -> std::io::Result<Box<dyn ProcessHandle>> {
        self.calls.lock().unwrap().push(Call {
            program: program.to_path_buf(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.to_path_buf(),
        });

        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "no scripted process left")
        })?;
        match script {
            Script::SpawnNotFound => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            )),
            script => Ok(Box::new(FakeProcess {
                script,
                killed: Arc::clone(&self.killed),
            })),
        }
    }
}

struct FakeProcess {
    script: Script,
    killed: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    async fn wait(&mut self) -> std::io::Result<ProcessOutput> {
        match &self.script {
            Script::Exit {
                code,
                stdout,
                stderr,
            } => Ok(ProcessOutput {
                code: Some(*code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            }),
            _ => std::future::pending().await,
        }
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.killed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
