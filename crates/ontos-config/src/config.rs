// crates/ontos-config/src/config.rs
// ============================================================================
// Module: Ontos Configuration
// Description: Configuration loading and validation for the MCP gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: ontos-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults so an empty file yields a loopback server backed
//! by an empty in-memory token store. Validation failures name the offending
//! field and stop startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use ontos_store_sqlite::SqliteStoreConfig;
use ontos_store_sqlite::SqliteStoreMode;
use ontos_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ontos.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ONTOS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `server.max_body_bytes`.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for `server.auth.max_api_key_bytes`.
pub(crate) const MAX_API_KEY_BYTES_LIMIT: usize = 64 * 1024;
/// Maximum length of the API key header name.
pub(crate) const MAX_HEADER_NAME_LENGTH: usize = 64;
/// Maximum length of the RPC endpoint path.
pub(crate) const MAX_ENDPOINT_LENGTH: usize = 256;
/// Maximum length of identity strings.
pub(crate) const MAX_IDENTITY_LENGTH: usize = 128;
/// Maximum number of seeded tokens.
pub(crate) const MAX_SEED_TOKENS: usize = 256;
/// Path suffix reserved for the health endpoint.
pub const HEALTH_PATH_SUFFIX: &str = "/health";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Ontos MCP gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OntosConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Tool exposure configuration.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Token store configuration.
    #[serde(default)]
    pub token_store: TokenStoreConfig,
}

impl OntosConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.token_store.validate()?;
        let max_key = self.server.auth.max_api_key_bytes;
        if self.token_store.tokens.iter().any(|token| token.secret.len() > max_key) {
            return Err(ConfigError::Invalid(
                "token_store.tokens secret exceeds server.auth.max_api_key_bytes".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// JSON-RPC endpoint path. Health is served at `<endpoint>/health`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Credential extraction settings.
    #[serde(default)]
    pub auth: ServerAuthConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
    /// Identity reported by `initialize` and health.
    #[serde(default)]
    pub identity: ServerIdentityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            endpoint: default_endpoint(),
            max_body_bytes: default_max_body_bytes(),
            auth: ServerAuthConfig::default(),
            audit: ServerAuditConfig::default(),
            identity: ServerIdentityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Returns the health endpoint path.
    #[must_use]
    pub fn health_path(&self) -> String {
        format!("{}{HEALTH_PATH_SUFFIX}", self.endpoint)
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        validate_endpoint(&self.endpoint)?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes exceeds {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        self.auth.validate()?;
        self.audit.validate()?;
        self.identity.validate()?;
        Ok(())
    }
}

/// Credential extraction configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuthConfig {
    /// Header carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Longest accepted API key in bytes.
    #[serde(default = "default_max_api_key_bytes")]
    pub max_api_key_bytes: usize,
}

impl Default for ServerAuthConfig {
    fn default() -> Self {
        Self {
            api_key_header: default_api_key_header(),
            max_api_key_bytes: default_max_api_key_bytes(),
        }
    }
}

impl ServerAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let header = self.api_key_header.as_str();
        if header.is_empty() || header.len() > MAX_HEADER_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "server.auth.api_key_header must be 1-{MAX_HEADER_NAME_LENGTH} characters"
            )));
        }
        if !header.chars().all(is_tchar) {
            return Err(ConfigError::Invalid(
                "server.auth.api_key_header must be a valid http header name".to_string(),
            ));
        }
        if self.max_api_key_bytes == 0 || self.max_api_key_bytes > MAX_API_KEY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.auth.max_api_key_bytes must be between 1 and {MAX_API_KEY_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Audit logging configuration for MCP requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Defaults to stderr.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

/// Server identity reported to clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerIdentityConfig {
    /// Server name.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Server version.
    #[serde(default = "default_server_version")]
    pub version: String,
    /// MCP protocol version returned by `initialize`.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for ServerIdentityConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl ServerIdentityConfig {
    /// Validates identity strings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_label("server.identity.name", &self.name)?;
        validate_label("server.identity.version", &self.version)?;
        validate_label("server.identity.protocol_version", &self.protocol_version)?;
        Ok(())
    }
}

/// Tool exposure configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Hand the token administration collaborator to tools.
    #[serde(default)]
    pub expose_token_admin: bool,
}

/// Token store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: TokenStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Tokens seeded into the memory backend at startup.
    #[serde(default)]
    pub tokens: Vec<SeedTokenConfig>,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            store_type: TokenStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            tokens: Vec::new(),
        }
    }
}

impl TokenStoreConfig {
    /// Returns the sqlite configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (TokenStoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates token store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            TokenStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory token_store must not set path".to_string(),
                    ));
                }
                if self.tokens.len() > MAX_SEED_TOKENS {
                    return Err(ConfigError::Invalid(format!(
                        "token_store.tokens exceeds {MAX_SEED_TOKENS} entries"
                    )));
                }
                let mut secrets = BTreeSet::new();
                for token in &self.tokens {
                    token.validate()?;
                    if !secrets.insert(token.secret.as_str()) {
                        return Err(ConfigError::Invalid(format!(
                            "token_store.tokens secret for {} is not unique",
                            token.name
                        )));
                    }
                }
                Ok(())
            }
            TokenStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite token_store requires path".to_string())
                })?;
                validate_path_string("token_store.path", &path.to_string_lossy())?;
                if !self.tokens.is_empty() {
                    return Err(ConfigError::Invalid(
                        "token_store.tokens is only supported by the memory backend".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Token store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use `SQLite`-backed durable store.
    Sqlite,
}

/// Token seeded into the memory store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedTokenConfig {
    /// Display name.
    pub name: String,
    /// Plaintext secret presented in the API key header.
    pub secret: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Optional expiry as unix epoch milliseconds.
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
}

impl SeedTokenConfig {
    /// Validates a seeded token entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("token_store.tokens name must be non-empty".to_string()));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "token_store.tokens secret for {} must be non-empty",
                self.name
            )));
        }
        if self.scopes.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "token_store.tokens scopes for {} must be non-empty",
                self.name
            )));
        }
        if self.scopes.iter().any(|scope| scope.is_empty() || scope.chars().any(char::is_whitespace)) {
            return Err(ConfigError::Invalid(format!(
                "token_store.tokens scopes for {} must be non-empty without whitespace",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the JSON-RPC endpoint path.
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if !endpoint.starts_with('/') || endpoint.len() < 2 {
        return Err(ConfigError::Invalid(
            "server.endpoint must be an absolute path other than /".to_string(),
        ));
    }
    if endpoint.len() > MAX_ENDPOINT_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "server.endpoint exceeds {MAX_ENDPOINT_LENGTH} characters"
        )));
    }
    if endpoint.ends_with('/') || endpoint.contains("//") {
        return Err(ConfigError::Invalid(
            "server.endpoint must not contain empty segments".to_string(),
        ));
    }
    if endpoint.ends_with(HEALTH_PATH_SUFFIX) {
        return Err(ConfigError::Invalid(
            "server.endpoint must not end with the health suffix".to_string(),
        ));
    }
    let allowed = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '-' | '_' | '.' | '~');
    if !endpoint.chars().all(allowed) {
        return Err(ConfigError::Invalid(
            "server.endpoint contains unsupported characters".to_string(),
        ));
    }
    Ok(())
}

/// Validates a short identity label.
fn validate_label(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.chars().count() > MAX_IDENTITY_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} exceeds {MAX_IDENTITY_LENGTH} characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} contains control characters")));
    }
    Ok(())
}

/// Returns true when the character is a valid HTTP token character.
const fn is_tchar(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default JSON-RPC endpoint.
fn default_endpoint() -> String {
    "/api/mcp".to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default API key header.
fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

/// Default maximum API key length in bytes.
pub(crate) const fn default_max_api_key_bytes() -> usize {
    8 * 1024
}

/// Audit logging is on unless disabled.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default server name.
fn default_server_name() -> String {
    "ontos-mcp-server".to_string()
}

/// Default server version.
fn default_server_version() -> String {
    "1.0.0".to_string()
}

/// Default MCP protocol version.
fn default_protocol_version() -> String {
    "2024-11-05".to_string()
}

/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}
