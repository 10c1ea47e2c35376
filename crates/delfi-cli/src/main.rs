use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use delfi_core::ReturnType;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "delfi", version, about = "Natural language query gateway for Postgres")]
struct Cli {
    /// Path to the gateway configuration file.
    #[arg(long, global = true, default_value = "delfi.yaml", env = "DELFI_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a natural language question and print the response as JSON.
    Ask {
        /// The question to answer, e.g. "how many orders shipped last week?"
        question: String,

        /// Target database name. Without it the gateway routes the
        /// question itself (default database or LLM selection).
        #[arg(long)]
        database: Option<String>,

        /// What to return: the generated SQL, or executed results.
        #[arg(long = "return", value_enum, default_value_t = ReturnKind::Result)]
        return_kind: ReturnKind,
    },

    /// Check the configuration file for problems.
    Check {
        /// Also connect to each configured database.
        #[arg(long, default_value_t = false)]
        connect: bool,
    },

    /// Introspect a configured database and print its schema.
    Schema {
        /// Logical database name from the configuration.
        database: String,
    },

    /// Run the SQL security validator on a statement without executing it.
    Validate {
        /// SQL statement to validate.
        sql: String,
    },
}

/// CLI-facing mirror of [`ReturnType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReturnKind {
    /// Return only the generated SQL.
    Sql,
    /// Execute the query and return results.
    Result,
}

impl From<ReturnKind> for ReturnType {
    fn from(kind: ReturnKind) -> Self {
        match kind {
            ReturnKind::Sql => ReturnType::Sql,
            ReturnKind::Result => ReturnType::Result,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `ask` output stays valid JSON on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Ask {
            question,
            database,
            return_kind,
        } => commands::ask::run(&cli.config, &question, database, return_kind.into()).await,

        Command::Check { connect } => commands::check::run(&cli.config, connect).await,

        Command::Schema { database } => commands::schema::run(&cli.config, &database).await,

        Command::Validate { sql } => commands::validate::run(&cli.config, &sql),
    }
}
