//! `Gopkg.lock` lock tables.

use serde::Deserialize;

use crate::model::RawModuleRecord;

#[derive(Debug, Deserialize)]
struct GopkgLock {
    #[serde(default)]
    projects: Vec<LockedProject>,
}

#[derive(Debug, Deserialize)]
struct LockedProject {
    name: String,
    version: Option<String>,
    revision: Option<String>,
    #[serde(default)]
    packages: Vec<String>,
}

pub fn parse(text: &str) -> Result<Vec<RawModuleRecord>, String> {
    let lock: GopkgLock = toml::from_str(text).map_err(|e| e.to_string())?;

    lock.projects
        .into_iter()
        .enumerate()
        .map(|(index, project)| {
            if project.name.trim().is_empty() {
                return Err(format!("projects[{}]: empty `name`", index));
            }
            Ok(RawModuleRecord {
                path: project.name,
                version: project.version,
                revision: project.revision,
                packages: project.packages,
            })
        })
        .collect()
}
