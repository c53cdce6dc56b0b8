// crates/ontos-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Token Store
// Description: Durable TokenStore and TokenAdmin backed by SQLite WAL.
// Purpose: Persist token records and apply per-request sessions atomically.
// Dependencies: ontos-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Tokens live in a single `mcp_tokens` table keyed by token id with a unique
//! index on the secret digest. Request sessions read committed rows and buffer
//! last-used updates; commit applies them in one transaction and fails without
//! side effects when any target row has disappeared. Database contents are
//! untrusted: malformed scope lists or flags surface as corruption errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use ontos_core::IssuedToken;
use ontos_core::NewToken;
use ontos_core::ScopeSet;
use ontos_core::StoreError;
use ontos_core::StoreSession;
use ontos_core::Timestamp;
use ontos_core::TokenAdmin;
use ontos_core::TokenId;
use ontos_core::TokenRecord;
use ontos_core::TokenStore;
use ontos_core::TokenSummary;
use ontos_core::issue_token;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Column list shared by every token query.
const TOKEN_COLUMNS: &str = "token_id, name, secret_hash, scopes_json, created_by, created_at, \
                             last_used_at, expires_at, is_active";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` token store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a configuration with default pragmas for the given path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row fails to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid request or store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Buffered change targets a missing token.
    #[error("sqlite store token not found: {0}")]
    NotFound(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Shared `SQLite` connection.
type SharedConnection = Arc<Mutex<Connection>>;

/// `SQLite`-backed token store with WAL support.
#[derive(Clone)]
pub struct SqliteTokenStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: SharedConnection,
}

impl SqliteTokenStore {
    /// Opens an `SQLite`-backed token store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Inserts a fully formed record.
    fn insert_record(&self, record: &TokenRecord) -> Result<(), SqliteStoreError> {
        let scopes_json = serde_json::to_string(&record.scopes)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let guard = lock_connection(&self.connection)?;
        guard
            .execute(
                "INSERT INTO mcp_tokens (token_id, name, secret_hash, scopes_json, created_by, \
                 created_at, last_used_at, expires_at, is_active) VALUES (?1, ?2, ?3, ?4, ?5, \
                 ?6, ?7, ?8, ?9)",
                params![
                    record.id.as_str(),
                    record.name,
                    record.secret_hash,
                    scopes_json,
                    record.created_by,
                    record.created_at.as_unix_millis(),
                    record.last_used_at.map(Timestamp::as_unix_millis),
                    record.expires_at.map(Timestamp::as_unix_millis),
                    i64::from(record.is_active),
                ],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }

    /// Loads every token row, optionally skipping inactive ones.
    fn load_records(&self, include_inactive: bool) -> Result<Vec<TokenRecord>, SqliteStoreError> {
        let guard = lock_connection(&self.connection)?;
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM mcp_tokens WHERE (?1 OR is_active = 1) ORDER BY \
             created_at DESC, token_id ASC"
        );
        let mut statement =
            guard.prepare(&sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![include_inactive], read_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            records.push(row.decode()?);
        }
        Ok(records)
    }

    /// Loads a single token by id.
    fn load_record(&self, token_id: &TokenId) -> Result<Option<TokenRecord>, SqliteStoreError> {
        let guard = lock_connection(&self.connection)?;
        let row = guard
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM mcp_tokens WHERE token_id = ?1"),
                params![token_id.as_str()],
                read_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        row.map(TokenRow::decode).transpose()
    }

    /// Executes a single-row mutation and reports whether a row changed.
    fn mutate_one(&self, sql: &str, token_id: &TokenId) -> Result<bool, SqliteStoreError> {
        let guard = lock_connection(&self.connection)?;
        let changed = guard
            .execute(sql, params![token_id.as_str()])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(changed > 0)
    }
}

impl TokenStore for SqliteTokenStore {
    fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(SqliteSession {
            connection: Arc::clone(&self.connection),
            pending_touches: Vec::new(),
        }))
    }
}

impl TokenAdmin for SqliteTokenStore {
    fn create_token(&self, request: &NewToken) -> Result<IssuedToken, StoreError> {
        let now = Timestamp::now();
        let (record, secret) = issue_token(request, now)?;
        self.insert_record(&record)?;
        Ok(IssuedToken {
            summary: record.summary(now),
            secret,
        })
    }

    fn list_tokens(&self, include_inactive: bool) -> Result<Vec<TokenSummary>, StoreError> {
        let now = Timestamp::now();
        let records = self.load_records(include_inactive)?;
        Ok(records.iter().map(|record| record.summary(now)).collect())
    }

    fn get_token(&self, token_id: &TokenId) -> Result<Option<TokenSummary>, StoreError> {
        let now = Timestamp::now();
        Ok(self.load_record(token_id)?.map(|record| record.summary(now)))
    }

    fn revoke_token(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.mutate_one("UPDATE mcp_tokens SET is_active = 0 WHERE token_id = ?1", token_id)?)
    }

    fn delete_token(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.mutate_one("DELETE FROM mcp_tokens WHERE token_id = ?1", token_id)?)
    }
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Request-scoped session over the shared connection.
struct SqliteSession {
    /// Shared `SQLite` connection.
    connection: SharedConnection,
    /// Buffered last-used updates in arrival order.
    pending_touches: Vec<(TokenId, Timestamp)>,
}

impl SqliteSession {
    /// Applies buffered updates in one transaction.
    fn apply(&self) -> Result<(), SqliteStoreError> {
        if self.pending_touches.is_empty() {
            return Ok(());
        }
        let mut guard = lock_connection(&self.connection)?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for (token_id, at) in &self.pending_touches {
            let changed = tx
                .execute(
                    "UPDATE mcp_tokens SET last_used_at = ?1 WHERE token_id = ?2",
                    params![at.as_unix_millis(), token_id.as_str()],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(token_id.to_string()));
            }
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

impl StoreSession for SqliteSession {
    fn find_by_secret_hash(&self, secret_hash: &str) -> Result<Option<TokenRecord>, StoreError> {
        let guard = lock_connection(&self.connection)?;
        let row = guard
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM mcp_tokens WHERE secret_hash = ?1"),
                params![secret_hash],
                read_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(row.map(TokenRow::decode).transpose()?)
    }

    fn touch_last_used(&mut self, token_id: &TokenId, at: Timestamp) -> Result<(), StoreError> {
        self.pending_touches.push((token_id.clone(), at));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(self.apply()?)
    }

    fn rollback(self: Box<Self>) {}
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Raw token row as stored.
struct TokenRow {
    /// Token identifier.
    token_id: String,
    /// Display name.
    name: String,
    /// Secret digest.
    secret_hash: String,
    /// JSON array of scope strings.
    scopes_json: String,
    /// Issuer label.
    created_by: Option<String>,
    /// Creation time (ms).
    created_at: i64,
    /// Last-use time (ms).
    last_used_at: Option<i64>,
    /// Expiry time (ms).
    expires_at: Option<i64>,
    /// Active flag stored as 0 or 1.
    is_active: i64,
}

impl TokenRow {
    /// Decodes the row, failing closed on malformed values.
    fn decode(self) -> Result<TokenRecord, SqliteStoreError> {
        let scopes: ScopeSet = serde_json::from_str(&self.scopes_json).map_err(|err| {
            SqliteStoreError::Corrupt(format!("invalid scopes for token {}: {err}", self.token_id))
        })?;
        let is_active = match self.is_active {
            0 => false,
            1 => true,
            other => {
                return Err(SqliteStoreError::Corrupt(format!(
                    "invalid is_active flag {other} for token {}",
                    self.token_id
                )));
            }
        };
        Ok(TokenRecord {
            id: TokenId::new(self.token_id),
            name: self.name,
            secret_hash: self.secret_hash,
            scopes,
            created_by: self.created_by,
            created_at: Timestamp::from_unix_millis(self.created_at),
            last_used_at: self.last_used_at.map(Timestamp::from_unix_millis),
            expires_at: self.expires_at.map(Timestamp::from_unix_millis),
            is_active,
        })
    }
}

/// Reads a token row in [`TOKEN_COLUMNS`] order.
fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        token_id: row.get(0)?,
        name: row.get(1)?,
        secret_hash: row.get(2)?,
        scopes_json: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        last_used_at: row.get(6)?,
        expires_at: row.get(7)?,
        is_active: row.get(8)?,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks the shared connection.
fn lock_connection(
    connection: &SharedConnection,
) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
    connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS mcp_tokens (
                    token_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    secret_hash TEXT NOT NULL UNIQUE,
                    scopes_json TEXT NOT NULL,
                    created_by TEXT,
                    created_at INTEGER NOT NULL,
                    last_used_at INTEGER,
                    expires_at INTEGER,
                    is_active INTEGER NOT NULL DEFAULT 1
                );
                CREATE INDEX IF NOT EXISTS idx_mcp_tokens_created_at
                    ON mcp_tokens (created_at);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
