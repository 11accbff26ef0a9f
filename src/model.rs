use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::resolve::coordinate::PackageUrl;

/// Ecosystem tag attached to every record.
pub const ECOSYSTEM: &str = "golang";

/// One module entry as it appears in a manifest, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawModuleRecord {
    pub path: String,
    pub version: Option<String>,
    pub revision: Option<String>, // explicit lock-table revision only
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCoordinate {
    pub namespace: Option<String>,
    pub inner: Option<String>,
    pub name: String,
    pub subpath: Option<String>,
    pub version: Option<String>,
    pub revision: Option<String>,
}

impl ModuleCoordinate {
    /// Namespace used for the package URL: `namespace/inner` when the module
    /// path has more than one separator.
    pub fn canonical_namespace(&self) -> Option<String> {
        match (&self.namespace, &self.inner) {
            (Some(outer), Some(inner)) => Some(format!("{}/{}", outer, inner)),
            (Some(outer), None) => Some(outer.clone()),
            (None, _) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceType {
    Vendor,
    Product,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
    Highest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: EvidenceType,
    pub source: String,     // manifest file name, e.g. "go.mod"
    pub field_name: String, // "namespace", "path", "name", "version", "package"
    pub value: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageIdentifier {
    Canonical(PackageUrl),
    Fallback { value: String, confidence: Confidence },
}

impl PackageIdentifier {
    pub fn confidence(&self) -> Confidence {
        match self {
            PackageIdentifier::Canonical(_) => Confidence::Highest,
            PackageIdentifier::Fallback { confidence, .. } => *confidence,
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageIdentifier::Canonical(purl) => write!(f, "{}", purl),
            PackageIdentifier::Fallback { value, .. } => f.write_str(value),
        }
    }
}

/// A resolved dependency, ready to be handed to the scan engine.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyRecord {
    pub display_name: String,
    pub ecosystem: String,
    pub module_path: String,
    pub manifest: PathBuf,
    pub package_path: String,
    pub file_path: String,
    pub sha256: String,
    pub coordinate: ModuleCoordinate,
    pub evidence: Vec<EvidenceItem>,
    pub identifier: PackageIdentifier,
}

impl DependencyRecord {
    /// Evidence of one kind, in insertion order.
    pub fn evidence_of(&self, kind: EvidenceType) -> impl Iterator<Item = &EvidenceItem> {
        self.evidence.iter().filter(move |e| e.kind == kind)
    }
}
