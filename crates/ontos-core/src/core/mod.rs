// crates/ontos-core/src/core/mod.rs
// ============================================================================
// Module: Ontos Core Types
// Description: Scope, token, hashing, and time types for the MCP gateway.
// Purpose: Provide stable, serializable types shared by stores and transports.
// Dependencies: serde, sha2, rand, time
// ============================================================================

//! ## Overview
//! Core types describe who a caller is (token records and caller info), what
//! they may do (scope sets and required scopes), and when (timestamps). They
//! are the single source of truth for every store backend and transport.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod hashing;
pub mod scope;
pub mod time;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::hash_secret;
pub use scope::GLOBAL_SCOPE;
pub use scope::RequiredScope;
pub use scope::ScopeSet;
pub use scope::satisfies;
pub use time::TimeError;
pub use time::Timestamp;
pub use token::IssuedToken;
pub use token::NewToken;
pub use token::TOKEN_SECRET_PREFIX;
pub use token::TokenId;
pub use token::TokenInfo;
pub use token::TokenRecord;
pub use token::TokenRequestError;
pub use token::TokenSummary;
pub use token::generate_secret;
pub use token::issue_token;
