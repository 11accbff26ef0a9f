//! JSON printed by `go mod edit -json`.

use serde::Deserialize;

use crate::model::RawModuleRecord;

#[derive(Debug, Deserialize)]
struct GoModEdit {
    #[serde(rename = "Require", default)]
    require: Option<Vec<Require>>,
}

#[derive(Debug, Deserialize)]
struct Require {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Version")]
    version: String,
}

pub fn parse(bytes: &[u8]) -> Result<Vec<RawModuleRecord>, String> {
    let doc: GoModEdit = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

    doc.require
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, req)| {
            if req.path.trim().is_empty() {
                return Err(format!("Require[{}]: empty `Path`", index));
            }
            Ok(RawModuleRecord {
                path: req.path,
                version: Some(req.version),
                revision: None,
                packages: Vec::new(),
            })
        })
        .collect()
}
