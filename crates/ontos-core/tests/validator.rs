// crates/ontos-core/tests/validator.rs
// ============================================================================
// Module: Token Validator Tests
// Description: Credential validation against the in-memory store.
// Purpose: Ensure rejections are uniform and last-use updates are buffered.
// ============================================================================

//! Token validator behavior.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use ontos_core::InMemoryTokenStore;
use ontos_core::ScopeSet;
use ontos_core::Timestamp;
use ontos_core::TokenAdmin;
use ontos_core::TokenStore;
use ontos_core::TokenValidator;

const SECRET: &str = "ontos_test_secret";

fn store_with_token(expires_at: Option<Timestamp>) -> (InMemoryTokenStore, ontos_core::TokenId) {
    let store = InMemoryTokenStore::new();
    let scopes: ScopeSet = ["data:read"].into_iter().collect();
    let id = store.seed("reader", SECRET, scopes, expires_at).expect("seed");
    (store, id)
}

#[test]
fn valid_token_returns_info_and_buffers_touch() {
    let (store, id) = store_with_token(None);
    let now = Timestamp::from_unix_millis(1_000);
    let mut session = store.begin().expect("begin");
    let info = TokenValidator::default()
        .validate(session.as_mut(), SECRET, now)
        .expect("validate")
        .expect("token info");
    assert_eq!(info.name, "reader");
    assert!(info.scopes.contains("data:read"));
    assert!(info.is_active);
    assert!(!info.is_expired);

    assert_eq!(store.record(&id).expect("record").expect("present").last_used_at, None);
    session.commit().expect("commit");
    assert_eq!(store.record(&id).expect("record").expect("present").last_used_at, Some(now));
}

#[test]
fn rollback_discards_touch() {
    let (store, id) = store_with_token(None);
    let mut session = store.begin().expect("begin");
    let info = TokenValidator::default()
        .validate(session.as_mut(), SECRET, Timestamp::from_unix_millis(5))
        .expect("validate");
    assert!(info.is_some());
    session.rollback();
    assert_eq!(store.record(&id).expect("record").expect("present").last_used_at, None);
}

#[test]
fn unknown_token_is_rejected() {
    let (store, _) = store_with_token(None);
    let mut session = store.begin().expect("begin");
    let info = TokenValidator::default()
        .validate(session.as_mut(), "ontos_wrong", Timestamp::now())
        .expect("validate");
    assert!(info.is_none());
}

#[test]
fn expired_token_is_rejected_at_boundary() {
    let expires_at = Timestamp::from_unix_millis(10_000);
    let (store, _) = store_with_token(Some(expires_at));
    let validator = TokenValidator::default();

    let mut session = store.begin().expect("begin");
    let before = validator
        .validate(session.as_mut(), SECRET, Timestamp::from_unix_millis(9_999))
        .expect("validate");
    assert!(before.is_some());

    let at = validator.validate(session.as_mut(), SECRET, expires_at).expect("validate");
    assert!(at.is_none());
}

#[test]
fn revoked_token_is_rejected_and_not_touched() {
    let (store, id) = store_with_token(None);
    assert!(store.revoke_token(&id).expect("revoke"));
    let mut session = store.begin().expect("begin");
    let info = TokenValidator::default()
        .validate(session.as_mut(), SECRET, Timestamp::now())
        .expect("validate");
    assert!(info.is_none());
    session.commit().expect("commit");
    assert_eq!(store.record(&id).expect("record").expect("present").last_used_at, None);
}

#[test]
fn oversized_and_empty_credentials_are_rejected() {
    let (store, _) = store_with_token(None);
    let validator = TokenValidator::new(8);
    let mut session = store.begin().expect("begin");
    assert!(validator.validate(session.as_mut(), SECRET, Timestamp::now()).expect("validate").is_none());
    assert!(validator.validate(session.as_mut(), "", Timestamp::now()).expect("validate").is_none());
}

#[test]
fn commit_fails_when_token_deleted_mid_request() {
    let (store, id) = store_with_token(None);
    let mut session = store.begin().expect("begin");
    let info = TokenValidator::default()
        .validate(session.as_mut(), SECRET, Timestamp::now())
        .expect("validate");
    assert!(info.is_some());
    assert!(store.delete_token(&id).expect("delete"));
    let err = session.commit().unwrap_err();
    assert!(matches!(err, ontos_core::StoreError::NotFound(_)));
}
