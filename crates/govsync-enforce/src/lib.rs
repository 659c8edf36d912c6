//! govsync Enforce - Catalog, override documents and resolution
//!
//! Provides:
//! - The compiled-in enforcement catalog
//! - Canonical override document parsing, rendering and in-place rewriting
//! - Legacy override probes and migration intents
//! - The pure enforcement resolver

pub mod catalog;
pub mod error;
pub mod migrate;
pub mod override_file;
pub mod resolver;

pub use catalog::builtin;
pub use error::OverrideError;
pub use migrate::{probes, MigrationIntent, OverrideProbe, ParsedOverride};
pub use resolver::resolve;
