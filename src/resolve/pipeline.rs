//! Manifest resolution pipeline.
//!
//! [`GoModuleResolver`] drives one manifest through
//! Source → Parser → Identity → Coordinate and returns its dependency records.
//! It also owns the one-time toolchain capability probe: toolchain manifests
//! are only processed once the probe has enabled the resolver, and a missing
//! or outdated toolchain disables it for the rest of the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::model::DependencyRecord;
use crate::resolve::source::{Interrupt, ManifestKind, ManifestSource, TokioLauncher};
use crate::resolve::{coordinate, formats, identity};
use crate::traits::{ResolveError, ToolchainLauncher};

const RESOLVER_NAME: &str = "Golang Mod Resolver";

/// Why the toolchain path was switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableReason {
    NotFound,
    TooOld(String),
    Failure(Option<i32>),
    Initialization(String),
}

impl From<&DisableReason> for ResolveError {
    fn from(reason: &DisableReason) -> Self {
        match reason {
            DisableReason::NotFound => ResolveError::ToolchainNotFound,
            DisableReason::TooOld(detail) => ResolveError::ToolchainTooOld {
                detail: detail.clone(),
            },
            DisableReason::Failure(code) => ResolveError::ToolchainFailure {
                code: *code,
                stderr: String::new(),
            },
            DisableReason::Initialization(msg) => ResolveError::Initialization(msg.clone()),
        }
    }
}

impl From<ResolveError> for DisableReason {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::ToolchainNotFound => DisableReason::NotFound,
            ResolveError::ToolchainTooOld { detail } => DisableReason::TooOld(detail),
            ResolveError::ToolchainFailure { code, .. } => DisableReason::Failure(code),
            other => DisableReason::Initialization(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Enabled,
    Disabled(DisableReason),
}

pub struct GoModuleResolver<L: ToolchainLauncher = TokioLauncher> {
    source: ManifestSource<L>,
    scratch_dir: PathBuf,
    probe: OnceCell<ProbeOutcome>,
    disabled: AtomicBool,
}

impl GoModuleResolver<TokioLauncher> {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::with_launcher(TokioLauncher, config)
    }
}

impl<L: ToolchainLauncher> GoModuleResolver<L> {
    pub fn with_launcher(launcher: L, config: &ResolverConfig) -> Self {
        Self {
            source: ManifestSource::new(
                launcher,
                config.go_command(),
                config.process_timeout(),
                Interrupt::new(),
            ),
            scratch_dir: config.scratch_dir(),
            probe: OnceCell::new(),
            disabled: AtomicBool::new(false),
        }
    }

    /// Overrides the per-process wait bound.
    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.source.set_timeout(timeout);
        self
    }

    /// Signal that cancels any in-flight toolchain run.
    pub fn interrupt(&self) -> &Interrupt {
        self.source.interrupt()
    }

    /// Runs the capability probe once.
    ///
    /// Later calls return the first verdict without spawning again.
    #[instrument(skip(self))]
    pub async fn prepare(&self) -> Result<(), ResolveError> {
        let outcome = self
            .probe
            .get_or_init(|| async {
                match self.source.probe(&self.scratch_dir).await {
                    Ok(()) => {
                        info!("{} is enabled", RESOLVER_NAME);
                        ProbeOutcome::Enabled
                    }
                    Err(e) => {
                        warn!(error = %e, "Disabling {}", RESOLVER_NAME);
                        ProbeOutcome::Disabled(e.into())
                    }
                }
            })
            .await;

        match outcome {
            ProbeOutcome::Enabled => Ok(()),
            ProbeOutcome::Disabled(reason) => Err(reason.into()),
        }
    }

    /// Whether toolchain manifests are currently processed.
    pub fn toolchain_enabled(&self) -> bool {
        matches!(self.probe.get(), Some(ProbeOutcome::Enabled))
            && !self.disabled.load(Ordering::SeqCst)
    }

    /// Resolves every module declared by `manifest`.
    ///
    /// Toolchain manifests yield no records while the toolchain is disabled;
    /// the reason was already reported when it was disabled.
    #[instrument(skip_all, fields(manifest = %manifest.display()))]
    pub async fn analyze(&self, manifest: &Path) -> Result<Vec<DependencyRecord>, ResolveError> {
        let kind = ManifestKind::detect(manifest)
            .ok_or_else(|| ResolveError::UnsupportedManifest(manifest.to_path_buf()))?;

        if kind == ManifestKind::Toolchain {
            if self.probe.get().is_none() && self.prepare().await.is_err() {
                return Ok(Vec::new());
            }
            if !self.toolchain_enabled() {
                debug!("Toolchain disabled, skipping manifest");
                return Ok(Vec::new());
            }
        }

        let document = match self.source.read(kind, manifest).await {
            Ok(document) => document,
            Err(e) => {
                if e.disables_toolchain() {
                    warn!(error = %e, "Disabling {} for the rest of the run", RESOLVER_NAME);
                    self.disabled.store(true, Ordering::SeqCst);
                }
                return Err(e);
            }
        };

        let source_name = kind.source_name();
        let mut records = Vec::new();
        for raw in formats::parse(&document, manifest)? {
            match identity::resolve(&raw, source_name) {
                Ok((coordinate, evidence)) => {
                    records.push(coordinate::finalize(manifest, &raw.path, coordinate, evidence));
                }
                Err(e) => warn!(module = %raw.path, error = %e, "Skipping module"),
            }
        }

        info!(dependencies = records.len(), "Manifest resolved");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, EvidenceType, PackageIdentifier};
    use crate::resolve::testing::{FakeLauncher, Script};

    const GO_MOD_JSON: &str = r#"{
        "Module": {"Path": "example.com/app"},
        "Require": [
            {"Path": "github.com/go-gitea/gitea", "Version": "v1.5.0"},
            {"Path": "rsc.io/quote", "Version": "v1.5.2"},
            {"Path": "golang.org/x/text", "Version": "v0.0.0-20170915032832-14c0d48ead0c"}
        ]
    }"#;

    const NO_MODULE: &str = "go: cannot find main module; see 'go help modules'";

    fn resolver(scripts: Vec<Script>) -> GoModuleResolver<FakeLauncher> {
        let scratch = std::env::temp_dir();
        let config = ResolverConfig::default().with_scratch_dir(scratch);
        GoModuleResolver::with_launcher(FakeLauncher::new(scripts), &config)
    }

    fn go_mod(dir: &Path) -> PathBuf {
        let path = dir.join("go.mod");
        std::fs::write(&path, "module example.com/app\n").unwrap();
        path
    }

    #[tokio::test]
    async fn test_go_mod_records() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let resolver = resolver(vec![
            Script::exit(1, "", NO_MODULE),
            Script::exit(0, GO_MOD_JSON, ""),
        ]);

        resolver.prepare().await.unwrap();
        let records = resolver.analyze(&manifest).await.unwrap();
        assert_eq!(records.len(), 3);

        let gitea = records.iter().find(|r| r.coordinate.name == "gitea").unwrap();
        assert_eq!(gitea.display_name, "github.com/go-gitea/gitea:v1.5.0");
        assert_eq!(gitea.ecosystem, "golang");
        assert!(gitea
            .evidence_of(EvidenceType::Vendor)
            .any(|e| e.value == "go-gitea"));
        assert!(gitea.evidence.iter().all(|e| e.source == "go.mod"));

        let quote = &records[1];
        assert_eq!(quote.coordinate.namespace.as_deref(), Some("rsc.io"));
        assert_eq!(quote.coordinate.revision, None);

        let text = &records[2];
        assert_eq!(text.coordinate.revision.as_deref(), Some("14c0d48ead0c"));
    }

    #[tokio::test]
    async fn test_gopkg_lock_records() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("Gopkg.lock");
        std::fs::write(
            &manifest,
            r#"
[[projects]]
  name = "github.com/go-gitea/gitea"
  packages = [".", "modules/log"]
  version = "1.5.0"
"#,
        )
        .unwrap();

        // lock tables never launch the toolchain
        let resolver = resolver(vec![]);
        let records = resolver.analyze(&manifest).await.unwrap();
        assert_eq!(records.len(), 1);

        let gitea = &records[0];
        assert_eq!(gitea.coordinate.namespace.as_deref(), Some("github.com"));
        assert_eq!(gitea.coordinate.name, "gitea");
        assert_eq!(
            gitea.identifier,
            PackageIdentifier::Canonical(
                coordinate::PackageUrl::new(
                    "golang",
                    Some("github.com/go-gitea"),
                    "gitea",
                    Some("1.5.0"),
                    None
                )
                .unwrap()
            )
        );
        let inner = gitea
            .evidence_of(EvidenceType::Product)
            .find(|e| e.value == "go-gitea")
            .unwrap();
        assert_eq!(inner.confidence, Confidence::High);
        let version = gitea.evidence_of(EvidenceType::Version).next().unwrap();
        assert_eq!(version.value, "1.5.0");
        assert_eq!(version.confidence, Confidence::Highest);
        assert_eq!(
            gitea
                .evidence_of(EvidenceType::Vendor)
                .filter(|e| e.field_name == "package")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_probe_not_found_disables_run() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let launcher = FakeLauncher::new(vec![Script::exit(127, "", "")]);
        let calls = launcher.calls();
        let config = ResolverConfig::default().with_scratch_dir(std::env::temp_dir());
        let resolver = GoModuleResolver::with_launcher(launcher, &config);

        assert!(matches!(
            resolver.prepare().await,
            Err(ResolveError::ToolchainNotFound)
        ));
        assert!(!resolver.toolchain_enabled());

        for _ in 0..3 {
            assert!(resolver.analyze(&manifest).await.unwrap().is_empty());
        }
        // only the probe ever ran
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_during_analysis_disables_run() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let resolver = resolver(vec![
            Script::exit(1, "", NO_MODULE),
            Script::exit(127, "", "sh: go: not found"),
        ]);

        resolver.prepare().await.unwrap();
        assert!(matches!(
            resolver.analyze(&manifest).await,
            Err(ResolveError::ToolchainNotFound)
        ));
        assert!(!resolver.toolchain_enabled());
        assert!(resolver.analyze(&manifest).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_too_old() {
        let resolver = resolver(vec![Script::exit(
            2,
            "",
            "go: unknown subcommand \"mod\"\nRun 'go help' for usage.",
        )]);
        assert!(matches!(
            resolver.prepare().await,
            Err(ResolveError::ToolchainTooOld { .. })
        ));
        // the verdict is cached
        assert!(matches!(
            resolver.prepare().await,
            Err(ResolveError::ToolchainTooOld { .. })
        ));
    }

    #[tokio::test]
    async fn test_analyze_probes_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let resolver = resolver(vec![
            Script::exit(1, "", NO_MODULE),
            Script::exit(0, r#"{"Require":[{"Path":"rsc.io/quote","Version":"v1.5.2"}]}"#, ""),
        ]);

        let records = resolver.analyze(&manifest).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier.to_string(), "pkg:golang/rsc.io/quote@v1.5.2");
    }

    #[tokio::test]
    async fn test_failure_is_local_to_manifest() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let resolver = resolver(vec![
            Script::exit(1, "", NO_MODULE),
            Script::exit(3, "", "unexpected"),
            Script::exit(1, "{}", "go: warning"),
        ]);
        resolver.prepare().await.unwrap();

        assert!(matches!(
            resolver.analyze(&go_mod(first.path())).await,
            Err(ResolveError::ToolchainFailure { code: Some(3), .. })
        ));
        assert!(resolver.toolchain_enabled());
        assert!(resolver.analyze(&go_mod(second.path())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_is_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let resolver = resolver(vec![
            Script::exit(1, "", NO_MODULE),
            Script::exit(1, "", "go: errors parsing go.mod"),
        ]);
        resolver.prepare().await.unwrap();

        match resolver.analyze(&manifest).await {
            Err(ResolveError::ManifestSyntax { manifest: path, .. }) => assert_eq!(path, manifest),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_module_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("Gopkg.lock");
        std::fs::write(
            &manifest,
            "[[projects]]\nname = \"example.com/bad name\"\nversion = \"v1.0.0\"\n\n[[projects]]\nname = \"rsc.io/quote\"\n",
        )
        .unwrap();

        let records = resolver(vec![]).analyze(&manifest).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].identifier,
            PackageIdentifier::Fallback {
                value: "example.com/bad name@v1.0.0".to_string(),
                confidence: Confidence::High,
            }
        );
        assert!(matches!(records[1].identifier, PackageIdentifier::Canonical(_)));
    }

    #[tokio::test]
    async fn test_unsupported_manifest() {
        let resolver = resolver(vec![]);
        assert!(matches!(
            resolver.analyze(Path::new("/tmp/go.sum")).await,
            Err(ResolveError::UnsupportedManifest(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_during_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = go_mod(dir.path());
        let launcher = FakeLauncher::new(vec![Script::exit(1, "", NO_MODULE), Script::Hang]);
        let killed = launcher.killed();
        let config = ResolverConfig::default().with_scratch_dir(std::env::temp_dir());
        let resolver = GoModuleResolver::with_launcher(launcher, &config);
        resolver.prepare().await.unwrap();

        let interrupt = resolver.interrupt().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupt.raise();
        });

        assert!(matches!(
            resolver.analyze(&manifest).await,
            Err(ResolveError::Cancelled)
        ));
        assert_eq!(killed.load(Ordering::SeqCst), 1);
        assert!(resolver.toolchain_enabled());
    }

    #[tokio::test]
    async fn test_interrupt_during_prepare_reaps_child() {
        let launcher = FakeLauncher::new(vec![Script::Hang]);
        let killed = launcher.killed();
        let config = ResolverConfig::default().with_scratch_dir(std::env::temp_dir());
        let resolver = GoModuleResolver::with_launcher(launcher, &config);

        let interrupt = resolver.interrupt().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupt.raise();
        });

        assert!(matches!(
            resolver.prepare().await,
            Err(ResolveError::Initialization(_))
        ));
        assert_eq!(killed.load(Ordering::SeqCst), 1);
        assert!(!resolver.toolchain_enabled());
    }
}
