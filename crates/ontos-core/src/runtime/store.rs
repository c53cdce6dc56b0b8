// crates/ontos-core/src/runtime/store.rs
// ============================================================================
// Module: Ontos In-Memory Token Store
// Description: Process-local token store for tests and ephemeral servers.
// Purpose: Provide a seedable store that honors session commit semantics.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Tokens live in a mutex-guarded map shared by every clone of the store.
//! Sessions read committed state directly and buffer last-used updates until
//! commit. A commit that references a token deleted in the meantime fails
//! without applying any of its updates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::IssuedToken;
use crate::core::NewToken;
use crate::core::ScopeSet;
use crate::core::Timestamp;
use crate::core::TokenId;
use crate::core::TokenRecord;
use crate::core::TokenSummary;
use crate::core::hash_secret;
use crate::core::issue_token;
use crate::interfaces::StoreError;
use crate::interfaces::StoreSession;
use crate::interfaces::TokenAdmin;
use crate::interfaces::TokenStore;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Shared token map keyed by token id.
type TokenMap = Arc<Mutex<BTreeMap<TokenId, TokenRecord>>>;

/// In-memory token store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStore {
    /// Token records keyed by id.
    tokens: TokenMap,
}

impl InMemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully formed record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the id or secret digest is already
    /// registered.
    pub fn insert(&self, record: TokenRecord) -> Result<(), StoreError> {
        let mut tokens = lock_tokens(&self.tokens)?;
        if tokens.contains_key(&record.id) {
            return Err(StoreError::Invalid(format!("token id already registered: {}", record.id)));
        }
        if tokens.values().any(|existing| existing.secret_hash == record.secret_hash) {
            return Err(StoreError::Invalid("token secret already registered".to_string()));
        }
        tokens.insert(record.id.clone(), record);
        drop(tokens);
        Ok(())
    }

    /// Registers a token with a caller-chosen plaintext secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the name, scopes, or secret are
    /// unusable or the secret is already registered.
    pub fn seed(
        &self,
        name: &str,
        secret: &str,
        scopes: ScopeSet,
        expires_at: Option<Timestamp>,
    ) -> Result<TokenId, StoreError> {
        if secret.is_empty() {
            return Err(StoreError::Invalid("token secret must be non-empty".to_string()));
        }
        let request = NewToken {
            name: name.to_string(),
            scopes,
            created_by: None,
            expires_in_days: None,
        };
        request.validate()?;
        let record = TokenRecord {
            id: TokenId::generate(),
            name: request.name.trim().to_string(),
            secret_hash: hash_secret(secret),
            scopes: request.scopes,
            created_by: None,
            created_at: Timestamp::now(),
            last_used_at: None,
            expires_at,
            is_active: true,
        };
        let id = record.id.clone();
        self.insert(record)?;
        Ok(id)
    }

    /// Returns a copy of the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the store lock is poisoned.
    pub fn record(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(lock_tokens(&self.tokens)?.get(token_id).cloned())
    }
}

impl TokenStore for InMemoryTokenStore {
    fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(InMemorySession {
            tokens: Arc::clone(&self.tokens),
            pending_touches: Vec::new(),
        }))
    }
}

impl TokenAdmin for InMemoryTokenStore {
    fn create_token(&self, request: &NewToken) -> Result<IssuedToken, StoreError> {
        let now = Timestamp::now();
        let (record, secret) = issue_token(request, now)?;
        let summary = record.summary(now);
        self.insert(record)?;
        Ok(IssuedToken {
            summary,
            secret,
        })
    }

    fn list_tokens(&self, include_inactive: bool) -> Result<Vec<TokenSummary>, StoreError> {
        let now = Timestamp::now();
        let tokens = lock_tokens(&self.tokens)?;
        let mut summaries: Vec<TokenSummary> = tokens
            .values()
            .filter(|record| include_inactive || record.is_active)
            .map(|record| record.summary(now))
            .collect();
        drop(tokens);
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    fn get_token(&self, token_id: &TokenId) -> Result<Option<TokenSummary>, StoreError> {
        let now = Timestamp::now();
        Ok(lock_tokens(&self.tokens)?.get(token_id).map(|record| record.summary(now)))
    }

    fn revoke_token(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let mut tokens = lock_tokens(&self.tokens)?;
        let Some(record) = tokens.get_mut(token_id) else {
            return Ok(false);
        };
        record.is_active = false;
        drop(tokens);
        Ok(true)
    }

    fn delete_token(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(lock_tokens(&self.tokens)?.remove(token_id).is_some())
    }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Session over the shared token map.
struct InMemorySession {
    /// Shared token map.
    tokens: TokenMap,
    /// Buffered last-used updates in arrival order.
    pending_touches: Vec<(TokenId, Timestamp)>,
}

impl StoreSession for InMemorySession {
    fn find_by_secret_hash(&self, secret_hash: &str) -> Result<Option<TokenRecord>, StoreError> {
        let tokens = lock_tokens(&self.tokens)?;
        Ok(tokens.values().find(|record| record.secret_hash == secret_hash).cloned())
    }

    fn touch_last_used(&mut self, token_id: &TokenId, at: Timestamp) -> Result<(), StoreError> {
        self.pending_touches.push((token_id.clone(), at));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tokens = lock_tokens(&self.tokens)?;
        if let Some((missing, _)) =
            self.pending_touches.iter().find(|(token_id, _)| !tokens.contains_key(token_id))
        {
            return Err(StoreError::NotFound(missing.to_string()));
        }
        for (token_id, at) in &self.pending_touches {
            if let Some(record) = tokens.get_mut(token_id) {
                record.last_used_at = Some(*at);
            }
        }
        drop(tokens);
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks the token map, mapping poisoning to a store error.
fn lock_tokens(
    tokens: &TokenMap,
) -> Result<MutexGuard<'_, BTreeMap<TokenId, TokenRecord>>, StoreError> {
    tokens.lock().map_err(|_| StoreError::Store("token store lock poisoned".to_string()))
}
