// crates/ontos-core/src/runtime/validator.rs
// ============================================================================
// Module: Ontos Token Validator
// Description: Resolves a presented API key to caller identity.
// Purpose: Single place where credentials are checked against the store.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The validator hashes the presented credential, looks the digest up through
//! the request's store session, and admits the token only when it is active
//! and unexpired. Unknown, revoked, and expired tokens all yield `None` so the
//! caller cannot tell them apart. A successful validation buffers a last-used
//! update on the session; it lands only if the session commits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Timestamp;
use crate::core::TokenInfo;
use crate::core::hash_secret;
use crate::interfaces::StoreError;
use crate::interfaces::StoreSession;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum accepted credential length in bytes.
pub const DEFAULT_MAX_SECRET_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Credential validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidator {
    /// Credentials longer than this are rejected without a lookup.
    max_secret_bytes: usize,
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SECRET_BYTES)
    }
}

impl TokenValidator {
    /// Creates a validator with the given credential length limit.
    #[must_use]
    pub const fn new(max_secret_bytes: usize) -> Self {
        Self {
            max_secret_bytes,
        }
    }

    /// Returns the credential length limit.
    #[must_use]
    pub const fn max_secret_bytes(&self) -> usize {
        self.max_secret_bytes
    }

    /// Validates a presented credential at `now`.
    ///
    /// Returns `Ok(None)` for any rejected credential.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lookup fails. Store failures are
    /// never reported as rejections.
    pub fn validate(
        &self,
        session: &mut dyn StoreSession,
        presented: &str,
        now: Timestamp,
    ) -> Result<Option<TokenInfo>, StoreError> {
        if presented.is_empty() || presented.len() > self.max_secret_bytes {
            return Ok(None);
        }
        let digest = hash_secret(presented);
        let Some(record) = session.find_by_secret_hash(&digest)? else {
            return Ok(None);
        };
        if !record.is_usable(now) {
            return Ok(None);
        }
        session.touch_last_used(&record.id, now)?;
        Ok(Some(record.info(now)))
    }
}
