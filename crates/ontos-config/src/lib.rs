// crates/ontos-config/src/lib.rs
// ============================================================================
// Module: Ontos Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for ontos.toml semantics.
// Dependencies: ontos-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `ontos-config` defines the configuration model for the Ontos MCP gateway
//! and validates it strictly. Any field that fails validation stops startup.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
