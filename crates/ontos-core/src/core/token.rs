// crates/ontos-core/src/core/token.rs
// ============================================================================
// Module: Ontos Token Model
// Description: API-token records, caller info, and issuance helpers.
// Purpose: Define the token data contract shared by every store backend.
// Dependencies: rand, serde, crate::core::{hashing, scope, time}
// ============================================================================

//! ## Overview
//! An API token is an opaque secret handed to a client once at issuance.
//! Stores only ever keep its SHA-256 digest alongside display metadata and
//! granted scopes. A token is usable when it is active and its expiry, if any,
//! lies strictly after the evaluation time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::hash_secret;
use crate::core::hashing::hex_encode;
use crate::core::scope::ScopeSet;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix carried by every generated token secret.
pub const TOKEN_SECRET_PREFIX: &str = "ontos_";

/// Random bytes behind a generated secret.
const TOKEN_SECRET_BYTES: usize = 32;

/// Random bytes behind a generated token id.
const TOKEN_ID_BYTES: usize = 16;

/// Maximum token display name length in characters.
const MAX_TOKEN_NAME_CHARS: usize = 128;

/// Maximum length of a single scope string in bytes.
const MAX_SCOPE_BYTES: usize = 128;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Opaque token identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Creates a token identifier from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random token identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex_encode(&bytes))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Persisted token record.
///
/// # Invariants
/// - `secret_hash` is the lowercase hex SHA-256 digest of the plaintext secret.
/// - The plaintext secret is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Token identifier.
    pub id: TokenId,
    /// Human-readable display name.
    pub name: String,
    /// Digest of the plaintext secret.
    pub secret_hash: String,
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// Issuer label, when recorded.
    pub created_by: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last successful authentication, when any.
    pub last_used_at: Option<Timestamp>,
    /// Expiry time; `None` never expires.
    pub expires_at: Option<Timestamp>,
    /// False once revoked.
    pub is_active: bool,
}

impl TokenRecord {
    /// Returns true when the token has an expiry at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Returns true when the token may authenticate at `now`.
    #[must_use]
    pub fn is_usable(&self, now: Timestamp) -> bool {
        self.is_active && !self.is_expired(now)
    }

    /// Builds the caller identity view of this record.
    #[must_use]
    pub fn info(&self, now: Timestamp) -> TokenInfo {
        TokenInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            scopes: self.scopes.clone(),
            expires_at: self.expires_at,
            is_active: self.is_active,
            is_expired: self.is_expired(now),
        }
    }

    /// Builds the administrative listing view of this record.
    #[must_use]
    pub fn summary(&self, now: Timestamp) -> TokenSummary {
        TokenSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            scopes: self.scopes.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
            is_expired: self.is_expired(now),
        }
    }
}

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token identifier.
    pub id: TokenId,
    /// Display name, safe to log.
    pub name: String,
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// Expiry time, when set.
    pub expires_at: Option<Timestamp>,
    /// Active flag at validation time.
    pub is_active: bool,
    /// Expired flag at validation time.
    pub is_expired: bool,
}

/// Administrative token listing entry. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    /// Token identifier.
    pub id: TokenId,
    /// Display name.
    pub name: String,
    /// Granted scopes.
    pub scopes: ScopeSet,
    /// Issuer label.
    pub created_by: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last successful authentication.
    pub last_used_at: Option<Timestamp>,
    /// Expiry time.
    pub expires_at: Option<Timestamp>,
    /// Active flag.
    pub is_active: bool,
    /// Expired flag at listing time.
    pub is_expired: bool,
}

// ============================================================================
// SECTION: Issuance
// ============================================================================

/// Request to issue a new token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    /// Display name.
    pub name: String,
    /// Scopes to grant.
    pub scopes: ScopeSet,
    /// Issuer label.
    pub created_by: Option<String>,
    /// Lifetime in days; `None` never expires.
    pub expires_in_days: Option<u32>,
}

/// Freshly issued token. The plaintext secret is only available here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    /// Listing view of the new token.
    #[serde(flatten)]
    pub summary: TokenSummary,
    /// Plaintext secret shown to the caller exactly once.
    pub secret: String,
}

/// Errors raised when a token request is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenRequestError {
    /// Display name missing or too long.
    #[error("invalid token name: {0}")]
    Name(String),
    /// Scope list empty or containing an invalid scope.
    #[error("invalid token scopes: {0}")]
    Scopes(String),
    /// Expiry cannot be represented.
    #[error("invalid token expiry: {0}")]
    Expiry(String),
}

impl NewToken {
    /// Checks the request for a usable name, scopes, and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRequestError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), TokenRequestError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TokenRequestError::Name("name must be non-empty".to_string()));
        }
        if name.chars().count() > MAX_TOKEN_NAME_CHARS {
            return Err(TokenRequestError::Name(format!(
                "name exceeds {MAX_TOKEN_NAME_CHARS} characters"
            )));
        }
        if self.scopes.is_empty() {
            return Err(TokenRequestError::Scopes("at least one scope is required".to_string()));
        }
        for scope in self.scopes.iter() {
            validate_scope(scope).map_err(TokenRequestError::Scopes)?;
        }
        if self.expires_in_days == Some(0) {
            return Err(TokenRequestError::Expiry("expires_in_days must be positive".to_string()));
        }
        Ok(())
    }
}

/// Validates and materializes a token request at `now`.
///
/// Returns the record to persist and the plaintext secret.
///
/// # Errors
///
/// Returns [`TokenRequestError`] when the request is invalid.
pub fn issue_token(
    request: &NewToken,
    now: Timestamp,
) -> Result<(TokenRecord, String), TokenRequestError> {
    request.validate()?;
    let expires_at = match request.expires_in_days {
        Some(days) => Some(now.checked_add_days(days).ok_or_else(|| {
            TokenRequestError::Expiry(format!("{days} days overflows the timestamp range"))
        })?),
        None => None,
    };
    let secret = generate_secret();
    let record = TokenRecord {
        id: TokenId::generate(),
        name: request.name.trim().to_string(),
        secret_hash: hash_secret(&secret),
        scopes: request.scopes.clone(),
        created_by: request.created_by.clone(),
        created_at: now,
        last_used_at: None,
        expires_at,
        is_active: true,
    };
    Ok((record, secret))
}

/// Generates a fresh plaintext token secret from the OS RNG.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; TOKEN_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{TOKEN_SECRET_PREFIX}{}", hex_encode(&bytes))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty, oversized, or whitespace-bearing scope strings.
fn validate_scope(scope: &str) -> Result<(), String> {
    if scope.is_empty() {
        return Err("scope must be non-empty".to_string());
    }
    if scope.len() > MAX_SCOPE_BYTES {
        return Err(format!("scope exceeds {MAX_SCOPE_BYTES} bytes"));
    }
    if scope.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(format!("scope contains whitespace or control characters: '{scope}'"));
    }
    Ok(())
}
