//! govsync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal core of the governance sync engine:
//! - **Domain entities** - `CatalogEntry`, `OverrideDocument`, `Decision`, `SyncSession`, `RunReport`
//! - **Port definitions** - Traits for adapters: `IHostingPlatform`, `ICatalogContentSource`
//! - **Configuration** - The YAML configuration file and its validation
//!
//! # Architecture
//!
//! The domain module holds pure data and invariants with no I/O.
//! Ports define the trait interfaces that adapter crates implement
//! (`govsync-hosting` for the hosting platform, `govsync-sync` for content
//! sources). Resolution rules live in `govsync-enforce`, orchestration in
//! `govsync-sync`.

pub mod config;
pub mod domain;
pub mod ports;
