use crate::model::DependencyRecord;
use crate::resolve::GoModuleResolver;
use crate::traits::{ResolveError, ToolchainLauncher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

/// Result of resolving one manifest.
#[derive(Debug)]
pub struct ManifestOutcome {
    pub manifest: PathBuf,
    pub result: Result<Vec<DependencyRecord>, ResolveError>,
}

/// Resolves many manifests with bounded concurrency.
pub struct ScanExecutor {
    semaphore: Arc<Semaphore>,
}

impl ScanExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Outcomes are returned in the order of `manifests`; a failing manifest
    /// never affects the others.
    #[instrument(skip_all, fields(manifests = manifests.len()))]
    pub async fn execute<L>(
        &self,
        resolver: Arc<GoModuleResolver<L>>,
        manifests: Vec<PathBuf>,
    ) -> Vec<ManifestOutcome>
    where
        L: ToolchainLauncher + 'static,
    {
        let tasks: Vec<_> = manifests
            .into_iter()
            .map(|manifest| {
                let semaphore = Arc::clone(&self.semaphore);
                let resolver = Arc::clone(&resolver);
                let target = manifest.clone();
                let task = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        ResolveError::Internal(format!("Semaphore error: {}", e))
                    })?;
                    resolver.analyze(&target).await
                });
                (manifest, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (manifest, task) in tasks {
            let result = task.await.unwrap_or_else(|e| {
                Err(ResolveError::Internal(format!("Task join error: {}", e)))
            });
            match &result {
                Ok(records) => info!(
                    manifest = %manifest.display(),
                    dependencies = records.len(),
                    "Finished manifest"
                ),
                Err(e) => warn!(manifest = %manifest.display(), error = %e, "Manifest skipped"),
            }
            outcomes.push(ManifestOutcome { manifest, result });
        }
        outcomes
    }
}
