// crates/ontos-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Token Store
// Description: Durable TokenStore backend using SQLite WAL.
// Purpose: Persist API tokens for the Ontos MCP gateway.
// Dependencies: ontos-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`TokenStore`] and [`TokenAdmin`]
//! implementation. Secrets are stored only as SHA-256 digests, the schema is
//! versioned, and rows that fail to decode are reported as corruption rather
//! than skipped.
//!
//! [`TokenStore`]: ontos_core::TokenStore
//! [`TokenAdmin`]: ontos_core::TokenAdmin

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTokenStore;
