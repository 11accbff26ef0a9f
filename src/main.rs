use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use go_dep_resolver::resolve::ManifestKind;
use go_dep_resolver::{GoModuleResolver, ResolverConfig, ScanExecutor};

/// Resolve Go module dependencies from Gopkg.lock and go.mod manifests.
///
/// Each resolved dependency is printed to stdout as one JSON line.
#[derive(Parser, Debug)]
#[command(name = "go-dep-resolve", version)]
struct Cli {
    /// Manifest files (`Gopkg.lock` or `go.mod`)
    #[arg(required = true)]
    manifests: Vec<PathBuf>,

    /// Path to the `go` executable
    #[arg(long)]
    go: Option<PathBuf>,

    /// Upper bound for a single `go mod edit` run, in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Directory used for the toolchain capability probe
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Manifests resolved at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

impl Cli {
    fn config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_concurrency(self.concurrency);
        if let Some(go) = &self.go {
            config = config.with_go_path(go);
        }
        if let Some(dir) = &self.scratch_dir {
            config = config.with_scratch_dir(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let resolver = Arc::new(GoModuleResolver::from_config(&config));
    let interrupt = resolver.interrupt().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.raise();
        }
    });

    let needs_toolchain = cli
        .manifests
        .iter()
        .any(|m| ManifestKind::detect(m) == Some(ManifestKind::Toolchain));
    if needs_toolchain {
        if let Err(e) = resolver.prepare().await {
            warn!(error = %e, "go.mod manifests will be skipped");
        }
    }

    let outcomes = ScanExecutor::new(config.concurrency)
        .execute(resolver, cli.manifests.clone())
        .await;

    let mut failed = false;
    for outcome in outcomes {
        match outcome.result {
            Ok(records) => {
                for record in records {
                    match serde_json::to_string(&record) {
                        Ok(line) => println!("{}", line),
                        Err(e) => error!(
                            module = %record.module_path,
                            error = %e,
                            "Failed to serialize record"
                        ),
                    }
                }
            }
            Err(e) if e.fails_scan() => {
                error!(
                    manifest = %outcome.manifest.display(),
                    error = %e,
                    "Failed to resolve manifest"
                );
                failed = true;
            }
            Err(e) => warn!(
                manifest = %outcome.manifest.display(),
                error = %e,
                "go.mod manifests will be skipped"
            ),
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
