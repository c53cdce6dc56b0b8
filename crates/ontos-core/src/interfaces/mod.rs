// crates/ontos-core/src/interfaces/mod.rs
// ============================================================================
// Module: Ontos Interfaces
// Description: Collaborator traits for token persistence and administration.
// Purpose: Decouple the gateway from any particular token store backend.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The gateway never touches persistence directly. Each request opens a
//! [`StoreSession`] through a [`TokenStore`], reads through it, buffers side
//! effects on it, and finally commits or rolls it back. Sessions are owned by
//! exactly one request. [`TokenAdmin`] is the separate, optional management
//! surface used by the CLI and admin tools.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::IssuedToken;
use crate::core::NewToken;
use crate::core::Timestamp;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::core::TokenRequestError;
use crate::core::TokenSummary;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("token store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("token store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("token store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request or stored data is invalid.
    #[error("token store invalid data: {0}")]
    Invalid(String),
    /// A buffered change targets a token that no longer exists.
    #[error("token not found: {0}")]
    NotFound(String),
    /// Store reported an error.
    #[error("token store error: {0}")]
    Store(String),
}

impl From<TokenRequestError> for StoreError {
    fn from(err: TokenRequestError) -> Self {
        Self::Invalid(err.to_string())
    }
}

// ============================================================================
// SECTION: Token Store
// ============================================================================

/// Factory for per-request store sessions.
pub trait TokenStore: Send + Sync {
    /// Opens a new session owned by a single request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend is unavailable.
    fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

/// Unit of work scoped to one request.
///
/// Reads observe committed state. Writes are buffered until [`commit`]
/// and discarded by [`rollback`].
///
/// [`commit`]: StoreSession::commit
/// [`rollback`]: StoreSession::rollback
pub trait StoreSession: Send {
    /// Looks up a token by the digest of its secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails or the row is corrupt.
    fn find_by_secret_hash(&self, secret_hash: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Buffers a last-used update for the token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update cannot be buffered.
    fn touch_last_used(&mut self, token_id: &TokenId, at: Timestamp) -> Result<(), StoreError>;

    /// Applies every buffered change atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any change cannot be applied; no change is
    /// applied in that case.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards every buffered change.
    fn rollback(self: Box<Self>);
}

// ============================================================================
// SECTION: Token Administration
// ============================================================================

/// Token management surface.
pub trait TokenAdmin: Send + Sync {
    /// Issues a new token and returns its plaintext secret once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for malformed requests and other
    /// [`StoreError`] variants when persistence fails.
    fn create_token(&self, request: &NewToken) -> Result<IssuedToken, StoreError>;

    /// Lists tokens, optionally including revoked ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_tokens(&self, include_inactive: bool) -> Result<Vec<TokenSummary>, StoreError>;

    /// Loads a single token summary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get_token(&self, token_id: &TokenId) -> Result<Option<TokenSummary>, StoreError>;

    /// Deactivates a token. Returns false when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn revoke_token(&self, token_id: &TokenId) -> Result<bool, StoreError>;

    /// Permanently deletes a token. Returns false when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_token(&self, token_id: &TokenId) -> Result<bool, StoreError>;
}
