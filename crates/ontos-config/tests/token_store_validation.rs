//! Token store configuration validation tests for ontos-config.
// crates/ontos-config/tests/token_store_validation.rs
// =============================================================================
// Module: Token Store Validation Tests
// Description: Validate memory and sqlite token store settings.
// Purpose: Ensure backend-specific fields are enforced fail-closed.
// =============================================================================

use ontos_config::SeedTokenConfig;
use ontos_config::TokenStoreType;

mod common;

use common::TestResult;
use common::assert_invalid;

fn seed(name: &str, secret: &str, scopes: &[&str]) -> SeedTokenConfig {
    SeedTokenConfig {
        name: name.to_string(),
        secret: secret.to_string(),
        scopes: scopes.iter().map(ToString::to_string).collect(),
        expires_at_ms: None,
    }
}

#[test]
fn memory_store_with_seeds_validates() -> TestResult {
    let config = common::config_from_toml(
        r#"
[[token_store.tokens]]
name = "admin"
secret = "ontos_admin"
scopes = ["*"]

[[token_store.tokens]]
name = "reader"
secret = "ontos_reader"
scopes = ["data:read"]
expires_at_ms = 1700000000000
"#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.token_store.tokens.len() != 2 {
        return Err("expected two seeded tokens".to_string());
    }
    if config.token_store.sqlite_config().is_some() {
        return Err("memory store should not produce sqlite config".to_string());
    }
    Ok(())
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.token_store.path = Some("tokens.sqlite".into());
    assert_invalid(config.validate(), "memory token_store must not set path")
}

#[test]
fn duplicate_seed_secrets_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.token_store.tokens = vec![seed("a", "same", &["*"]), seed("b", "same", &["*"])];
    assert_invalid(config.validate(), "not unique")
}

#[test]
fn seed_requires_scopes_and_secret() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.token_store.tokens = vec![seed("a", "secret", &[])];
    assert_invalid(config.validate(), "scopes")?;
    config.token_store.tokens = vec![seed("a", "", &["*"])];
    assert_invalid(config.validate(), "secret")?;
    config.token_store.tokens = vec![seed("a", "secret", &["has space"])];
    assert_invalid(config.validate(), "whitespace")
}

#[test]
fn seed_secret_must_fit_header_limit() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth.max_api_key_bytes = 4;
    config.token_store.tokens = vec![seed("a", "longer-than-four", &["*"])];
    assert_invalid(config.validate(), "max_api_key_bytes")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.token_store.store_type = TokenStoreType::Sqlite;
    assert_invalid(config.validate(), "sqlite token_store requires path")
}

#[test]
fn sqlite_store_rejects_seeds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.token_store.store_type = TokenStoreType::Sqlite;
    config.token_store.path = Some("tokens.sqlite".into());
    config.token_store.tokens = vec![seed("a", "secret", &["*"])];
    assert_invalid(config.validate(), "only supported by the memory backend")
}

#[test]
fn sqlite_config_carries_pragmas() -> TestResult {
    let config = common::config_from_toml(
        r#"
[token_store]
type = "sqlite"
path = "data/tokens.sqlite"
busy_timeout_ms = 250
journal_mode = "delete"
sync_mode = "normal"
"#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let sqlite = config.token_store.sqlite_config().ok_or("missing sqlite config")?;
    if sqlite.busy_timeout_ms != 250 {
        return Err("busy timeout not carried".to_string());
    }
    if sqlite.journal_mode.pragma_value() != "delete" || sqlite.sync_mode.pragma_value() != "normal" {
        return Err("pragmas not carried".to_string());
    }
    Ok(())
}
