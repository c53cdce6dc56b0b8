// crates/ontos-core/src/core/hashing.rs
// ============================================================================
// Module: Ontos Secret Hashing
// Description: SHA-256 digests for API-token secrets.
// Purpose: Keep plaintext secrets out of every store backend.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Token secrets are only ever persisted as lowercase hex SHA-256 digests.
//! Lookups hash the presented credential and compare digests, so a store dump
//! never reveals a usable key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes a plaintext token secret into its lowercase hex SHA-256 digest.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex_encode(&hasher.finalize())
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
