// crates/ontos-cli/src/main.rs
// ============================================================================
// Module: Ontos CLI Entry Point
// Description: Command dispatcher for the Ontos MCP gateway.
// Purpose: Serve the gateway and administer API tokens offline.
// Dependencies: clap, ontos-config, ontos-core, ontos-mcp, ontos-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! `ontos serve` runs the MCP gateway from an `ontos.toml` configuration.
//! `ontos token ...` manages API tokens directly in the configured `SQLite`
//! store, and `ontos config validate` checks a configuration without serving.
//! Token secrets are printed exactly once, at creation.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use ontos_config::OntosConfig;
use ontos_config::TokenStoreType;
use ontos_core::NewToken;
use ontos_core::ScopeSet;
use ontos_core::TokenAdmin;
use ontos_core::TokenId;
use ontos_mcp::McpServer;
use ontos_store_sqlite::SqliteTokenStore;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ontos", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP gateway.
    Serve(ConfigArg),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// API token administration.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
struct ConfigArg {
    /// Config file path (defaults to ontos.toml or `ONTOS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Validate(ConfigArg),
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Issue a new token and print its secret once.
    Create(TokenCreateCommand),
    /// List tokens.
    List(TokenListCommand),
    /// Show a single token.
    Show(TokenIdCommand),
    /// Deactivate a token.
    Revoke(TokenIdCommand),
    /// Permanently delete a token.
    Delete(TokenIdCommand),
}

/// Arguments for `token create`.
#[derive(Args, Debug)]
struct TokenCreateCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArg,
    /// Display name.
    #[arg(long)]
    name: String,
    /// Granted scope; repeat for several.
    #[arg(long = "scope", value_name = "SCOPE", required = true)]
    scopes: Vec<String>,
    /// Expire the token after this many days.
    #[arg(long, value_name = "DAYS")]
    expires_days: Option<u32>,
    /// Operator recorded as the creator.
    #[arg(long, value_name = "USER")]
    created_by: Option<String>,
}

/// Arguments for `token list`.
#[derive(Args, Debug)]
struct TokenListCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArg,
    /// Include revoked tokens.
    #[arg(long, action = ArgAction::SetTrue)]
    include_inactive: bool,
}

/// Arguments for commands addressing one token.
#[derive(Args, Debug)]
struct TokenIdCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArg,
    /// Token identifier.
    #[arg(value_name = "ID")]
    id: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("ontos {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        return Err(CliError::new("no command given; run `ontos --help`".to_string()));
    };
    match command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Token {
            command,
        } => command_token(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(args: ConfigArg) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let bind = config.server.bind.clone();
    let endpoint = config.server.endpoint.clone();
    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("ontos: serving MCP on http://{bind}{endpoint}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config` subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => {
            let config = load_config(args.config.as_deref())?;
            let store = match config.token_store.store_type {
                TokenStoreType::Memory => "memory",
                TokenStoreType::Sqlite => "sqlite",
            };
            write_stdout_line(&format!(
                "config ok: endpoint {} on {}, token store {store}",
                config.server.endpoint, config.server.bind
            ))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Executes `token` subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Create(args) => {
            let store = open_token_store(args.config.config.as_deref())?;
            let request = NewToken {
                name: args.name,
                scopes: args.scopes.into_iter().collect::<ScopeSet>(),
                created_by: args.created_by,
                expires_in_days: args.expires_days,
            };
            let issued = store
                .create_token(&request)
                .map_err(|err| CliError::new(format!("token create failed: {err}")))?;
            write_json(&issued)?;
            write_stderr_line("ontos: store this secret now; it cannot be shown again")
                .map_err(|err| CliError::new(output_error("stderr", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        TokenCommand::List(args) => {
            let store = open_token_store(args.config.config.as_deref())?;
            let tokens = store
                .list_tokens(args.include_inactive)
                .map_err(|err| CliError::new(format!("token list failed: {err}")))?;
            write_json(&tokens)?;
            Ok(ExitCode::SUCCESS)
        }
        TokenCommand::Show(args) => {
            let store = open_token_store(args.config.config.as_deref())?;
            let id = TokenId::new(args.id);
            let token = store
                .get_token(&id)
                .map_err(|err| CliError::new(format!("token show failed: {err}")))?
                .ok_or_else(|| CliError::new(format!("token not found: {id}")))?;
            write_json(&token)?;
            Ok(ExitCode::SUCCESS)
        }
        TokenCommand::Revoke(args) => {
            let store = open_token_store(args.config.config.as_deref())?;
            let id = TokenId::new(args.id);
            let revoked = store
                .revoke_token(&id)
                .map_err(|err| CliError::new(format!("token revoke failed: {err}")))?;
            finish_token_change(revoked, "revoked", &id)
        }
        TokenCommand::Delete(args) => {
            let store = open_token_store(args.config.config.as_deref())?;
            let id = TokenId::new(args.id);
            let deleted = store
                .delete_token(&id)
                .map_err(|err| CliError::new(format!("token delete failed: {err}")))?;
            finish_token_change(deleted, "deleted", &id)
        }
    }
}

/// Reports the outcome of a revoke or delete.
fn finish_token_change(changed: bool, verb: &str, id: &TokenId) -> CliResult<ExitCode> {
    if !changed {
        return Err(CliError::new(format!("token not found: {id}")));
    }
    write_stdout_line(&format!("{verb} {id}"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Opens the configured durable token store.
fn open_token_store(path: Option<&Path>) -> CliResult<SqliteTokenStore> {
    let config = load_config(path)?;
    let sqlite = config.token_store.sqlite_config().ok_or_else(|| {
        CliError::new(
            "token commands require token_store.type = \"sqlite\" with a path".to_string(),
        )
    })?;
    SqliteTokenStore::new(&sqlite)
        .map_err(|err| CliError::new(format!("token store open failed: {err}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<OntosConfig> {
    OntosConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("json encode failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
