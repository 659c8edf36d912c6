//! Domain entities and business rules
//!
//! This module contains the core domain types for govsync:
//! - Newtypes for repository identifiers and validated repository paths
//! - The enforcement level ladder and catalog entries
//! - The repository-local override document
//! - Resolver decisions and notices
//! - Sync sessions and the aggregated run report
//! - Domain-specific error types

pub mod catalog;
pub mod decision;
pub mod errors;
pub mod level;
pub mod newtypes;
pub mod override_doc;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry};
pub use decision::{Decision, EnforcementNotice, NoticeCode, NoticeSeverity, Outcome, Resolution};
pub use errors::{DomainError, ErrorKind};
pub use level::EnforcementLevel;
pub use newtypes::{RepoPath, RepositoryId, SessionId};
pub use override_doc::{CleanupMode, OverrideDocument, SchemaVersion};
pub use report::{RepositoryReport, RunReport};
pub use session::{FileAction, OpenSession, SessionEntry, SessionFailure, SessionStatus, SyncSession};
