//! Manifest grammars.
//!
//! Both grammars produce the same [`RawModuleRecord`] stream:
//! - `gopkg` - the `Gopkg.lock` TOML lock table
//! - `modjson` - the JSON printed by `go mod edit -json`

pub mod gopkg;
pub mod modjson;

use std::path::Path;

use crate::model::RawModuleRecord;
use crate::resolve::source::ManifestDocument;
use crate::traits::ResolveError;

/// Records of one manifest, in document order.
#[derive(Debug)]
pub struct ModuleStream {
    inner: std::vec::IntoIter<RawModuleRecord>,
}

impl ModuleStream {
    pub(crate) fn new(records: Vec<RawModuleRecord>) -> Self {
        Self {
            inner: records.into_iter(),
        }
    }
}

impl Iterator for ModuleStream {
    type Item = RawModuleRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ModuleStream {}

/// Parses `document`, attributing failures to `manifest`.
pub fn parse(document: &ManifestDocument, manifest: &Path) -> Result<ModuleStream, ResolveError> {
    let records = match document {
        ManifestDocument::LockTable(text) => gopkg::parse(text),
        ManifestDocument::ToolchainJson(bytes) => modjson::parse(bytes),
    }
    .map_err(|reason| ResolveError::ManifestSyntax {
        manifest: manifest.to_path_buf(),
        reason,
    })?;
    Ok(ModuleStream::new(records))
}
