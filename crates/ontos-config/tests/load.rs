//! Config file loading tests for ontos-config.
// crates/ontos-config/tests/load.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Validate file-based loading limits and error mapping.
// Purpose: Ensure malformed or oversized files fail closed.
// =============================================================================

use std::fs;

use ontos_config::ConfigError;
use ontos_config::OntosConfig;
use tempfile::TempDir;

mod common;

use common::TestResult;

#[test]
fn load_reads_explicit_path() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("ontos.toml");
    fs::write(&path, "[server]\nendpoint = \"/mcp\"\n").map_err(|err| err.to_string())?;
    let config = OntosConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.server.endpoint != "/mcp" {
        return Err("endpoint not loaded".to_string());
    }
    Ok(())
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("missing.toml");
    match OntosConfig::load(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {}", describe(other))),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    common::assert_invalid(OntosConfig::load(Some(&path)).map(|_| ()), "size limit")
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("binary.toml");
    fs::write(&path, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    common::assert_invalid(OntosConfig::load(Some(&path)).map(|_| ()), "utf-8")
}

#[test]
fn load_maps_toml_errors_to_parse() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("broken.toml");
    fs::write(&path, "[server\n").map_err(|err| err.to_string())?;
    match OntosConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {}", describe(other))),
    }
}

#[test]
fn load_runs_validation() -> TestResult {
    let temp = TempDir::new().map_err(|err| err.to_string())?;
    let path = temp.path().join("invalid.toml");
    fs::write(&path, "[server]\nmax_body_bytes = 0\n").map_err(|err| err.to_string())?;
    common::assert_invalid(OntosConfig::load(Some(&path)).map(|_| ()), "max_body_bytes")
}

fn describe(result: Result<OntosConfig, ConfigError>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}
