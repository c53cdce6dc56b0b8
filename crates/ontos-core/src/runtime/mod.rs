// crates/ontos-core/src/runtime/mod.rs
// ============================================================================
// Module: Ontos Runtime
// Description: Token validation and the in-memory token store.
// Purpose: Turn presented credentials into caller identity.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement behavior on top of the core types: the token
//! validator used by every transport and an in-memory store for tests and
//! ephemeral deployments.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod store;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::InMemoryTokenStore;
pub use validator::DEFAULT_MAX_SECRET_BYTES;
pub use validator::TokenValidator;
