//! Resolve module - Go manifest to dependency record pipeline.
//!
//! This module provides the four resolution stages:
//! - **Source**: reads `Gopkg.lock` or runs `go mod edit -json` via [`source::ManifestSource`]
//! - **Formats**: parses either grammar into raw module records
//! - **Identity**: splits module paths and grades evidence
//! - **Coordinate**: builds package URLs with a fallback identifier
//! - **Pipeline**: ties the stages together via [`pipeline::GoModuleResolver`]

pub mod coordinate;
pub mod formats;
pub mod identity;
pub mod pipeline;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use coordinate::{IdentifierError, PackageUrl};
pub use identity::IdentityError;
pub use pipeline::{DisableReason, GoModuleResolver, ProbeOutcome};
pub use source::{
    classify_exit, Interrupt, ManifestDocument, ManifestKind, ManifestSource, TokioLauncher,
};
