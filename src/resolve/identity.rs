//! Module path and version disambiguation.
//!
//! Splits a module path such as `github.com/go-gitea/gitea` into
//! namespace / inner / name components and grades the evidence for each:
//! a bare host is weak, the trailing component is the authoritative product
//! name, and anything in between sits in the middle.

use thiserror::Error;

use crate::model::{Confidence, EvidenceItem, EvidenceType, ModuleCoordinate, RawModuleRecord};

pub const SEPARATOR: char = '/';

/// Marks the module root in a lock table's `packages` list.
const ROOT_PACKAGE: &str = ".";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("module path is empty")]
    EmptyPath,
}

/// Append-only evidence list scoped to one manifest source.
#[derive(Debug)]
pub struct EvidenceList {
    source: String,
    items: Vec<EvidenceItem>,
}

impl EvidenceList {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            items: Vec::new(),
        }
    }

    /// Records one observation; empty values carry nothing and are dropped.
    pub fn add(&mut self, kind: EvidenceType, field: &str, value: &str, confidence: Confidence) {
        if value.is_empty() {
            return;
        }
        self.items.push(EvidenceItem {
            kind,
            source: self.source.clone(),
            field_name: field.to_string(),
            value: value.to_string(),
            confidence,
        });
    }

    fn product_and_vendor(&mut self, field: &str, value: &str, confidence: Confidence) {
        self.add(EvidenceType::Product, field, value, confidence);
        self.add(EvidenceType::Vendor, field, value, confidence);
    }

    pub fn into_items(self) -> Vec<EvidenceItem> {
        self.items
    }
}

/// `(namespace, inner, name)` of a trimmed, non-empty path.
fn split_path(path: &str) -> (Option<&str>, Option<&str>, &str) {
    match path.split_once(SEPARATOR) {
        None => (None, None, path),
        Some((outer, rest)) => match rest.rsplit_once(SEPARATOR) {
            None => (Some(outer), None, rest),
            Some((inner, name)) => {
                let inner = inner.trim_matches(SEPARATOR);
                (Some(outer), Some(inner).filter(|s| !s.is_empty()), name)
            }
        },
    }
}

/// Commit suffix of a pseudo-version: everything after the last hyphen,
/// provided that hyphen is not the first character.
fn pseudo_revision(version: &str) -> Option<&str> {
    match version.rfind('-') {
        Some(at) if at > 0 => Some(&version[at + 1..]).filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Maps one raw record to its coordinate and evidence.
///
/// `source` is the manifest file name recorded on every evidence item.
pub fn resolve(
    record: &RawModuleRecord,
    source: &str,
) -> Result<(ModuleCoordinate, Vec<EvidenceItem>), IdentityError> {
    let path = record.path.trim().trim_matches(SEPARATOR);
    if path.is_empty() {
        return Err(IdentityError::EmptyPath);
    }

    let mut evidence = EvidenceList::new(source);
    let (namespace, inner, name) = split_path(path);

    if let Some(namespace) = namespace {
        evidence.product_and_vendor("namespace", namespace, Confidence::Low);
    }
    if let Some(inner) = inner {
        evidence.product_and_vendor("path", inner, Confidence::High);
    }
    evidence.product_and_vendor("name", name, Confidence::Highest);

    let version = non_empty(record.version.as_deref());
    let revision = version
        .and_then(pseudo_revision)
        .or_else(|| non_empty(record.revision.as_deref()));

    if let Some(version) = version {
        evidence.add(EvidenceType::Version, "version", version, Confidence::Highest);
    }

    for package in &record.packages {
        let package = package.trim();
        if package.is_empty() || package == ROOT_PACKAGE {
            continue;
        }
        evidence.add(EvidenceType::Product, "package", package, Confidence::High);
        evidence.add(EvidenceType::Vendor, "package", package, Confidence::Medium);
    }

    let coordinate = ModuleCoordinate {
        namespace: namespace.map(str::to_string),
        inner: inner.map(str::to_string),
        name: name.to_string(),
        subpath: None,
        version: version.or(revision).map(str::to_string),
        revision: revision.map(str::to_string),
    };
    Ok((coordinate, evidence.into_items()))
}
