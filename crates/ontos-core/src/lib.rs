// crates/ontos-core/src/lib.rs
// ============================================================================
// Module: Ontos Core Library
// Description: Public API surface for the Ontos MCP gateway core.
// Purpose: Expose scope, token, and store types plus the token validator.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Ontos core holds the transport-agnostic pieces of the MCP gateway: scope
//! matching, API-token records, the token store interfaces, and the validator
//! that turns a presented credential into caller identity. Nothing here knows
//! about HTTP or JSON-RPC.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::StoreError;
pub use interfaces::StoreSession;
pub use interfaces::TokenAdmin;
pub use interfaces::TokenStore;
pub use runtime::DEFAULT_MAX_SECRET_BYTES;
pub use runtime::InMemoryTokenStore;
pub use runtime::TokenValidator;
