// crates/ontos-mcp/tests/registry.rs
// ============================================================================
// Module: Tool Registry Tests
// Description: Registration rules and scope-filtered listings.
// Purpose: Validate registry immutability, ordering, and name checks.
// Dependencies: ontos-core, ontos-mcp
// ============================================================================

//! ## Overview
//! Exercises [`ToolRegistry`] construction directly and through the server
//! builder.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::Behavior;
use common::FixtureTool;
use common::fixture_tools;
use common::scopes;
use ontos_core::RequiredScope;
use ontos_mcp::McpServer;
use ontos_mcp::McpServerError;
use ontos_mcp::OntosConfig;
use ontos_mcp::RegistryError;
use ontos_mcp::ToolRegistry;
use ontos_mcp::builtin::register_builtin_tools;

#[test]
fn registration_order_is_listing_order() {
    let mut builder = ToolRegistry::builder();
    for tool in fixture_tools() {
        builder.register(tool).unwrap();
    }
    let registry = builder.build();
    let names: Vec<&str> =
        registry.list_definitions().iter().map(|def| def.name.as_str()).collect();
    assert_eq!(names[..3], ["data_read", "data_write", "data_anything"]);
    assert_eq!(registry.len(), fixture_tools().len());
    assert!(registry.get("data_write").is_some());
    assert!(registry.get("nope").is_none());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut builder = ToolRegistry::builder();
    builder.register(FixtureTool::shared("echo", None, Behavior::Echo)).unwrap();
    let err = builder
        .register(FixtureTool::shared("echo", Some(RequiredScope::Open), Behavior::Echo))
        .err()
        .unwrap();
    assert_eq!(err, RegistryError::Duplicate("echo".to_string()));
}

#[test]
fn unusable_names_are_rejected() {
    for name in ["", "has space", "tab\tname"] {
        let mut builder = ToolRegistry::builder();
        let err = builder.register(FixtureTool::shared(name, None, Behavior::Echo)).err().unwrap();
        assert_eq!(err, RegistryError::InvalidName(name.to_string()));
    }
}

#[test]
fn undeclared_scope_defaults_to_wildcard() {
    let mut builder = ToolRegistry::builder();
    builder.register(FixtureTool::shared("plain", None, Behavior::Echo)).unwrap();
    let registry = builder.build();
    assert_eq!(registry.get("plain").unwrap().required_scope(), &RequiredScope::Wildcard);
    assert!(registry.visible_definitions(&scopes(&["data:*"])).is_empty());
    assert_eq!(registry.visible_definitions(&scopes(&["*"])).len(), 1);
}

#[test]
fn builtin_scopes_filter_listings() {
    let mut builder = ToolRegistry::builder();
    register_builtin_tools(&mut builder).unwrap();
    let registry = builder.build();
    let visible = |granted: &[&str]| -> Vec<String> {
        registry
            .visible_definitions(&scopes(granted))
            .iter()
            .map(|def| def.name.clone())
            .collect()
    };
    assert_eq!(visible(&["other"]), vec!["server_info"]);
    assert_eq!(visible(&["tokens:read"]), vec!["server_info", "token_introspect"]);
    assert_eq!(visible(&["tokens:*"]), vec!["server_info", "token_introspect", "tokens_list"]);
}

#[test]
fn server_rejects_tool_shadowing_builtin() {
    let result = McpServer::builder(OntosConfig::default())
        .tool(FixtureTool::shared("server_info", None, Behavior::Echo))
        .build();
    assert!(matches!(result, Err(McpServerError::Init(_))));
}
