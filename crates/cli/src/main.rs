//! # gridkv-cli
//!
//! Command-line access to gridkv tables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use gridkv_core::{Db, MemoryBackend, TableValue, TabularBackend};
use gridkv_http::sheets::DEFAULT_BASE_URL;
use gridkv_http::{AuthorizedUserFile, CredentialProvider, SheetsBackend, SheetsConfig, StaticToken};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// gridkv - a key-value store kept in a spreadsheet
#[derive(Parser)]
#[command(name = "gridkv")]
#[command(author, version, about = "Key-value tables stored in a spreadsheet", long_about = None)]
struct Cli {
    /// Spreadsheet document id
    #[arg(long, env = "GRIDKV_SPREADSHEET_ID")]
    spreadsheet_id: Option<String>,

    /// OAuth access token
    #[arg(long, env = "GRIDKV_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Authorized-user token file, refreshed in place when expired
    #[arg(long, env = "GRIDKV_CREDENTIALS_FILE", value_name = "FILE")]
    credentials_file: Option<PathBuf>,

    /// Use a throwaway in-process backend instead of the Sheets API
    #[arg(long)]
    memory: bool,

    /// Sheets API endpoint
    #[arg(long, env = "GRIDKV_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Table (sheet) name
    #[arg(short, long, env = "GRIDKV_TABLE", default_value = "kv")]
    table: String,

    /// Create the table if it does not exist
    #[arg(long)]
    create: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Print the value stored under KEY
    Get {
        key: String,
        /// Print nothing instead of failing when KEY is absent
        #[arg(long)]
        missing_ok: bool,
    },
    /// Store VALUE under KEY
    Set { key: String, value: String },
    /// Store a JSON document under KEY
    SetJson { key: String, json: String },
    /// Print the value under KEY as pretty JSON
    GetJson { key: String },
    /// Remove KEY
    Delete {
        key: String,
        /// Succeed even when KEY is absent
        #[arg(long)]
        missing_ok: bool,
    },
    /// Print whether KEY is present
    Has { key: String },
    /// List all keys in row order
    Keys,
    /// Print whether the table exists
    HasTable,
    /// Create the table
    CreateTable {
        /// Succeed if the table already exists
        #[arg(long)]
        exist_ok: bool,
    },
    /// Delete the table and everything in it
    DeleteTable,
}

/// What a command produced.
#[derive(Debug, PartialEq, Eq)]
enum Output {
    /// Lines for stdout.
    Lines(Vec<String>),
    /// A status message for stderr.
    Status(String),
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let result = open_backend(&cli).and_then(|backend| {
        run(
            &cli.command,
            &Db::new(backend),
            &cli.table,
            cli.create,
        )
    });

    match result {
        Ok(Output::Lines(lines)) => {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(Output::Status(message)) => eprintln!("{} {message}", "ok:".green().bold()),
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            std::process::exit(1);
        }
    }
}

/// Build the backend selected by the command-line flags.
fn open_backend(cli: &Cli) -> Result<Arc<dyn TabularBackend>> {
    if cli.memory {
        debug!("using in-memory backend");
        return Ok(Arc::new(MemoryBackend::new()));
    }

    let spreadsheet_id = cli
        .spreadsheet_id
        .as_deref()
        .context("--spreadsheet-id (or GRIDKV_SPREADSHEET_ID) is required")?;

    let credentials: Arc<dyn CredentialProvider> = if let Some(path) = &cli.credentials_file {
        let file = AuthorizedUserFile::load(path)
            .with_context(|| format!("Failed to load credentials: {}", path.display()))?;
        Arc::new(file)
    } else if let Some(token) = &cli.token {
        Arc::new(StaticToken::new(token.as_str()))
    } else {
        bail!("No credentials: pass --token, --credentials-file or --memory");
    };

    debug!(spreadsheet_id, base_url = %cli.base_url, "using sheets backend");
    let config = SheetsConfig::default().with_base_url(cli.base_url.as_str());
    Ok(Arc::new(SheetsBackend::new(spreadsheet_id, credentials, config)?))
}

/// Execute one command against `db`.
fn run(command: &Command, db: &Db, table_name: &str, create: bool) -> Result<Output> {
    let open = || {
        db.get_table(table_name, create)
            .with_context(|| format!("Failed to open table '{table_name}'"))
    };

    let output = match command {
        Command::Get { key, missing_ok } => {
            let mut table = open()?;
            if *missing_ok {
                Output::Lines(table.try_get(key)?.into_iter().collect())
            } else {
                Output::Lines(vec![table.get(key)?])
            }
        }
        Command::Set { key, value } => {
            open()?.set(key, value)?;
            Output::Status(format!("set {key}"))
        }
        Command::SetJson { key, json } => {
            let value: serde_json::Value =
                serde_json::from_str(json).context("Value is not valid JSON")?;
            open()?.put(key, &TableValue::Encoded(value))?;
            Output::Status(format!("set {key}"))
        }
        Command::GetJson { key } => match open()?.fetch_encoded(key)? {
            TableValue::Encoded(value) => {
                Output::Lines(vec![serde_json::to_string_pretty(&value)?])
            }
            TableValue::Raw(text) => Output::Lines(vec![text]),
        },
        Command::Delete { key, missing_ok } => {
            let mut table = open()?;
            if *missing_ok {
                if table.try_delete(key)? {
                    Output::Status(format!("deleted {key}"))
                } else {
                    Output::Status(format!("{key} was not present"))
                }
            } else {
                table.delete(key)?;
                Output::Status(format!("deleted {key}"))
            }
        }
        Command::Has { key } => Output::Lines(vec![open()?.has(key)?.to_string()]),
        Command::Keys => Output::Lines(open()?.list_keys()?),
        Command::HasTable => Output::Lines(vec![db.has_table(table_name)?.to_string()]),
        Command::CreateTable { exist_ok } => {
            db.create_table(table_name, *exist_ok)?;
            Output::Status(format!("table {table_name} ready"))
        }
        Command::DeleteTable => {
            db.delete_table(table_name)?;
            Output::Status(format!("deleted table {table_name}"))
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkv_core::KvError;

    fn lines(output: Output) -> Vec<String> {
        match output {
            Output::Lines(lines) => lines,
            Output::Status(status) => panic!("expected lines, got status {status}"),
        }
    }

    fn memory_db() -> Db {
        Db::new(Arc::new(MemoryBackend::new()))
    }

    fn get(key: &str) -> Command {
        Command::Get {
            key: key.to_string(),
            missing_ok: false,
        }
    }

    fn set(key: &str, value: &str) -> Command {
        Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    // ========================================================================
    // CLI argument parsing tests
    // ========================================================================

    #[test]
    fn test_cli_parse_get() {
        let cli = Cli::parse_from(["gridkv", "--memory", "get", "theme"]);
        assert!(cli.memory);
        assert_eq!(cli.table, "kv");
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.command, get("theme"));
    }

    #[test]
    fn test_cli_parse_connection_flags() {
        let cli = Cli::parse_from([
            "gridkv",
            "--spreadsheet-id",
            "abc",
            "--token",
            "t0k",
            "--table",
            "settings",
            "--create",
            "-v",
            "keys",
        ]);
        assert_eq!(cli.spreadsheet_id.as_deref(), Some("abc"));
        assert_eq!(cli.token.as_deref(), Some("t0k"));
        assert_eq!(cli.table, "settings");
        assert!(cli.create);
        assert!(cli.verbose);
        assert_eq!(cli.command, Command::Keys);
    }

    #[test]
    fn test_cli_parse_subcommand_flags() {
        let cli = Cli::parse_from(["gridkv", "delete", "k", "--missing-ok"]);
        assert_eq!(
            cli.command,
            Command::Delete {
                key: "k".to_string(),
                missing_ok: true
            }
        );

        let cli = Cli::parse_from(["gridkv", "create-table", "--exist-ok"]);
        assert_eq!(cli.command, Command::CreateTable { exist_ok: true });

        let cli = Cli::parse_from(["gridkv", "set-json", "cfg", "{\"a\":1}"]);
        assert!(matches!(cli.command, Command::SetJson { .. }));
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["gridkv", "--memory"]).is_err());
    }

    #[test]
    fn test_missing_spreadsheet_id() {
        let cli = Cli::parse_from(["gridkv", "--token", "t", "keys"]);
        if cli.spreadsheet_id.is_none() {
            let err = open_backend(&cli).err().map(|e| e.to_string());
            assert!(err.unwrap().contains("--spreadsheet-id"));
        }
    }

    // ========================================================================
    // Command execution tests
    // ========================================================================

    #[test]
    fn test_run_set_get_delete() {
        let db = memory_db();
        assert!(matches!(
            run(&set("theme", "dark"), &db, "kv", true).unwrap(),
            Output::Status(_)
        ));
        assert_eq!(lines(run(&get("theme"), &db, "kv", false).unwrap()), ["dark"]);

        let delete = Command::Delete {
            key: "theme".to_string(),
            missing_ok: false,
        };
        run(&delete, &db, "kv", false).unwrap();
        let err = run(&get("theme"), &db, "kv", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KvError>(),
            Some(KvError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_run_missing_ok() {
        let db = memory_db();
        db.create_table("kv", false).unwrap();

        let output = run(
            &Command::Get {
                key: "nope".to_string(),
                missing_ok: true,
            },
            &db,
            "kv",
            false,
        )
        .unwrap();
        assert!(lines(output).is_empty());

        let output = run(
            &Command::Delete {
                key: "nope".to_string(),
                missing_ok: true,
            },
            &db,
            "kv",
            false,
        )
        .unwrap();
        assert_eq!(output, Output::Status("nope was not present".to_string()));
    }

    #[test]
    fn test_run_json_values() {
        let db = memory_db();
        let set_json = Command::SetJson {
            key: "cfg".to_string(),
            json: r#"{"retries": 3}"#.to_string(),
        };
        run(&set_json, &db, "kv", true).unwrap();

        let output = run(&Command::GetJson { key: "cfg".to_string() }, &db, "kv", false).unwrap();
        assert_eq!(lines(output), ["{\n  \"retries\": 3\n}"]);

        let bad = Command::SetJson {
            key: "cfg".to_string(),
            json: "{oops".to_string(),
        };
        assert!(run(&bad, &db, "kv", false).is_err());
    }

    #[test]
    fn test_run_keys_and_has() {
        let db = memory_db();
        run(&set("a", "1"), &db, "kv", true).unwrap();
        run(&set("b", "2"), &db, "kv", false).unwrap();

        assert_eq!(lines(run(&Command::Keys, &db, "kv", false).unwrap()), ["a", "b"]);
        let has = Command::Has { key: "b".to_string() };
        assert_eq!(lines(run(&has, &db, "kv", false).unwrap()), ["true"]);
    }

    #[test]
    fn test_run_table_lifecycle() {
        let db = memory_db();
        assert_eq!(lines(run(&Command::HasTable, &db, "t", false).unwrap()), ["false"]);
        run(&Command::CreateTable { exist_ok: false }, &db, "t", false).unwrap();
        assert!(run(&Command::CreateTable { exist_ok: false }, &db, "t", false).is_err());
        run(&Command::CreateTable { exist_ok: true }, &db, "t", false).unwrap();
        assert_eq!(lines(run(&Command::HasTable, &db, "t", false).unwrap()), ["true"]);
        run(&Command::DeleteTable, &db, "t", false).unwrap();
        assert_eq!(lines(run(&Command::HasTable, &db, "t", false).unwrap()), ["false"]);
    }

    #[test]
    fn test_run_without_create_fails_on_missing_table() {
        let db = memory_db();
        let err = run(&get("k"), &db, "absent", false).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
