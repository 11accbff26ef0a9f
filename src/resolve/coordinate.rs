//! Canonical package identifiers.
//!
//! Builds a `pkg:golang/...` package URL from a [`ModuleCoordinate`]. When the
//! coordinate cannot be represented, a plain `path[/subpath][@version]`
//! identifier is used instead so the record is never lost.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::model::{
    Confidence, DependencyRecord, EvidenceItem, ModuleCoordinate, PackageIdentifier, ECOSYSTEM,
};

pub const PURL_SCHEME: &str = "golang";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("invalid package type `{0}`")]
    InvalidScheme(String),
    #[error("package name is empty")]
    EmptyName,
    #[error("invalid {component} `{value}`")]
    InvalidComponent {
        component: &'static str,
        value: String,
    },
}

/// A validated package URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageUrl {
    pub scheme: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    pub subpath: Option<String>,
}

fn has_forbidden_chars(value: &str) -> bool {
    value.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn check(component: &'static str, value: &str) -> Result<(), IdentifierError> {
    if has_forbidden_chars(value) {
        return Err(IdentifierError::InvalidComponent {
            component,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl PackageUrl {
    pub fn new(
        scheme: &str,
        namespace: Option<&str>,
        name: &str,
        version: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<Self, IdentifierError> {
        let mut chars = scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && chars.all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '+' | '-')
            });
        if !valid_scheme {
            return Err(IdentifierError::InvalidScheme(scheme.to_string()));
        }

        if name.is_empty() {
            return Err(IdentifierError::EmptyName);
        }
        check("name", name)?;

        let namespace = namespace.filter(|ns| !ns.is_empty());
        if let Some(ns) = namespace {
            check("namespace", ns)?;
            if ns.split('/').any(str::is_empty) {
                return Err(IdentifierError::InvalidComponent {
                    component: "namespace",
                    value: ns.to_string(),
                });
            }
        }

        let version = version.filter(|v| !v.is_empty());
        if let Some(v) = version {
            check("version", v)?;
        }

        let subpath = subpath.filter(|s| !s.is_empty());
        if let Some(sp) = subpath {
            check("subpath", sp)?;
            if sp
                .split('/')
                .any(|seg| seg.is_empty() || seg == "." || seg == "..")
            {
                return Err(IdentifierError::InvalidComponent {
                    component: "subpath",
                    value: sp.to_string(),
                });
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            version: version.map(str::to_string),
            subpath: subpath.map(str::to_string),
        })
    }
}

/// Percent-encodes everything outside the unreserved set.
fn encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn encode_path(path: &str) -> String {
    path.split('/').map(encode).collect::<Vec<_>>().join("/")
}

impl fmt::Display for PackageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkg:{}/", self.scheme)?;
        if let Some(ns) = &self.namespace {
            write!(f, "{}/", encode_path(ns))?;
        }
        f.write_str(&encode(&self.name))?;
        if let Some(version) = &self.version {
            write!(f, "@{}", encode(version))?;
        }
        if let Some(subpath) = &self.subpath {
            write!(f, "#{}", encode_path(subpath))?;
        }
        Ok(())
    }
}

/// `module_path[/subpath][@version]`
fn fallback_value(module_path: &str, coordinate: &ModuleCoordinate) -> String {
    let mut value = module_path.to_string();
    if let Some(subpath) = coordinate.subpath.as_deref().filter(|s| !s.trim().is_empty()) {
        value.push('/');
        value.push_str(subpath);
    }
    if let Some(version) = coordinate.version.as_deref().filter(|v| !v.trim().is_empty()) {
        value.push('@');
        value.push_str(version);
    }
    value
}

/// Canonical package URL for `coordinate`, or the fallback identifier when
/// the URL cannot be constructed.
pub fn build_identifier(coordinate: &ModuleCoordinate, module_path: &str) -> PackageIdentifier {
    let namespace = coordinate.canonical_namespace();
    match PackageUrl::new(
        PURL_SCHEME,
        namespace.as_deref(),
        &coordinate.name,
        coordinate.version.as_deref(),
        coordinate.subpath.as_deref(),
    ) {
        Ok(purl) => PackageIdentifier::Canonical(purl),
        Err(e) => {
            warn!(
                module = module_path,
                reason = %e,
                "Unable to create package-url identifier, using generic identifier"
            );
            let name = if module_path.is_empty() {
                coordinate.name.as_str()
            } else {
                module_path
            };
            PackageIdentifier::Fallback {
                value: fallback_value(name, coordinate),
                confidence: Confidence::High,
            }
        }
    }
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Assembles the final record for one module.
pub fn finalize(
    manifest: &Path,
    module_path: &str,
    coordinate: ModuleCoordinate,
    evidence: Vec<EvidenceItem>,
) -> DependencyRecord {
    let identifier = build_identifier(&coordinate, module_path);
    let version = coordinate.version.clone().unwrap_or_default();

    let display_name = if version.is_empty() {
        module_path.to_string()
    } else {
        format!("{}:{}", module_path, version)
    };
    let file_path = format!(
        "{}:{}/{}/{}",
        manifest.display(),
        coordinate.canonical_namespace().unwrap_or_default(),
        coordinate.name,
        version
    );

    DependencyRecord {
        display_name,
        ecosystem: ECOSYSTEM.to_string(),
        module_path: module_path.to_string(),
        manifest: manifest.to_path_buf(),
        package_path: format!("{}:{}", module_path, version),
        sha256: sha256_hex(&file_path),
        file_path,
        coordinate,
        evidence,
        identifier,
    }
}
