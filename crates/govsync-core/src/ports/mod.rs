//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IHostingPlatform`] - Repository listing and file read/write/delete
//! - [`ICatalogContentSource`] - Canonical content of governed files

pub mod content_source;
pub mod hosting;

pub use content_source::ICatalogContentSource;
pub use hosting::{IHostingPlatform, RepositoryInfo};
