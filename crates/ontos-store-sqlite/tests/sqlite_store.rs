// crates/ontos-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Token Store Tests
// Description: Validate SQLite TokenStore and TokenAdmin behavior.
// Purpose: Ensure durable persistence, session semantics, and integrity checks.
// Dependencies: ontos-store-sqlite, ontos-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed token store. Covers issuance,
//! listing, revocation, session commit and rollback, and fail-closed decoding
//! of tampered rows.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use ontos_core::NewToken;
use ontos_core::StoreError;
use ontos_core::Timestamp;
use ontos_core::TokenAdmin;
use ontos_core::TokenId;
use ontos_core::TokenStore;
use ontos_core::TokenValidator;
use ontos_store_sqlite::SqliteStoreConfig;
use ontos_store_sqlite::SqliteStoreError;
use ontos_store_sqlite::SqliteTokenStore;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(path: &std::path::Path) -> SqliteTokenStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: ontos_store_sqlite::SqliteStoreMode::Wal,
        sync_mode: ontos_store_sqlite::SqliteSyncMode::Full,
    };
    SqliteTokenStore::new(&config).expect("store init")
}

fn request(name: &str, scopes: &[&str]) -> NewToken {
    NewToken {
        name: name.to_string(),
        scopes: scopes.iter().copied().collect(),
        created_by: Some("tester".to_string()),
        expires_in_days: None,
    }
}

fn last_used(path: &std::path::Path, id: &TokenId) -> Option<i64> {
    let connection = rusqlite::Connection::open(path).unwrap();
    connection
        .query_row(
            "SELECT last_used_at FROM mcp_tokens WHERE token_id = ?1",
            rusqlite::params![id.as_str()],
            |row| row.get(0),
        )
        .unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sqlite_store_issues_and_validates_tokens() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["data:read", "data:write"])).unwrap();

    let mut session = store.begin().unwrap();
    let now = Timestamp::from_unix_millis(issued.summary.created_at.as_unix_millis() + 1);
    let info = TokenValidator::default()
        .validate(session.as_mut(), &issued.secret, now)
        .unwrap()
        .expect("token info");
    assert_eq!(info.id, issued.summary.id);
    assert!(info.scopes.contains("data:write"));
    session.commit().unwrap();

    assert_eq!(last_used(&path, &issued.summary.id), Some(now.as_unix_millis()));
}

#[test]
fn sqlite_store_never_stores_plaintext() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["*"])).unwrap();

    let connection = rusqlite::Connection::open(&path).unwrap();
    let matches: i64 = connection
        .query_row(
            "SELECT COUNT(*) FROM mcp_tokens WHERE secret_hash = ?1 OR name = ?1",
            rusqlite::params![issued.secret],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(matches, 0);
}

#[test]
fn sqlite_store_rollback_discards_touch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["*"])).unwrap();

    let mut session = store.begin().unwrap();
    let info = TokenValidator::default()
        .validate(session.as_mut(), &issued.secret, Timestamp::now())
        .unwrap();
    assert!(info.is_some());
    session.rollback();

    assert_eq!(last_used(&path, &issued.summary.id), None);
}

#[test]
fn sqlite_store_commit_fails_for_deleted_token() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["*"])).unwrap();

    let mut session = store.begin().unwrap();
    let info = TokenValidator::default()
        .validate(session.as_mut(), &issued.secret, Timestamp::now())
        .unwrap();
    assert!(info.is_some());
    assert!(store.delete_token(&issued.summary.id).unwrap());
    let err = session.commit().unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn sqlite_store_lists_and_revokes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let first = store.create_token(&request("first", &["a:read"])).unwrap();
    let second = store.create_token(&request("second", &["b:read"])).unwrap();

    assert!(store.revoke_token(&first.summary.id).unwrap());
    assert!(!store.revoke_token(&TokenId::new("missing")).unwrap());

    let active = store.list_tokens(false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.summary.id);

    let all = store.list_tokens(true).unwrap();
    assert_eq!(all.len(), 2);

    let revoked = store.get_token(&first.summary.id).unwrap().expect("summary");
    assert!(!revoked.is_active);
    assert_eq!(revoked.created_by.as_deref(), Some("tester"));

    let mut session = store.begin().unwrap();
    let info = TokenValidator::default()
        .validate(session.as_mut(), &first.secret, Timestamp::now())
        .unwrap();
    assert!(info.is_none());
}

#[test]
fn sqlite_store_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let issued = {
        let store = store_for(&path);
        store.create_token(&request("durable", &["x:*"])).unwrap()
    };
    let store = store_for(&path);
    let summary = store.get_token(&issued.summary.id).unwrap().expect("summary");
    assert_eq!(summary.name, "durable");
    assert!(summary.scopes.contains("x:*"));
}

#[test]
fn sqlite_store_deletes_permanently() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("gone", &["*"])).unwrap();
    assert!(store.delete_token(&issued.summary.id).unwrap());
    assert!(!store.delete_token(&issued.summary.id).unwrap());
    assert!(store.get_token(&issued.summary.id).unwrap().is_none());
}

#[test]
fn sqlite_store_rejects_invalid_requests() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let err = store.create_token(&request("", &["*"])).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn sqlite_store_detects_corrupt_scopes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["*"])).unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE mcp_tokens SET scopes_json = 'not-json' WHERE token_id = ?1",
                rusqlite::params![issued.summary.id.as_str()],
            )
            .unwrap();
    }
    let mut session = store.begin().unwrap();
    let result = TokenValidator::default().validate(session.as_mut(), &issued.secret, Timestamp::now());
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_detects_corrupt_active_flag() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let store = store_for(&path);
    let issued = store.create_token(&request("ci", &["*"])).unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE mcp_tokens SET is_active = 7 WHERE token_id = ?1",
                rusqlite::params![issued.summary.id.as_str()],
            )
            .unwrap();
    }
    let result = store.get_token(&issued.summary.id);
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_rejects_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tokens.sqlite");
    let _store = store_for(&path);

    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 999", rusqlite::params![]).unwrap();

    let result = SqliteTokenStore::new(&SqliteStoreConfig::for_path(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteTokenStore::new(&SqliteStoreConfig::for_path(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}
