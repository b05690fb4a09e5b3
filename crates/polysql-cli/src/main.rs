//! polysql CLI
//!
//! Generates dialect-specific SQL from JSON statement descriptors.

mod descriptor;
mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use polysql_core::{Dialect, DialectKind, GeneratorOptions, SqlValue};

use crate::descriptor::{parse_data_type, Descriptor};
use crate::error::CliError;

/// Dialect-aware SQL generation.
#[derive(Parser)]
#[command(name = "polysql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target engine: postgres, mysql, mariadb, sqlite, mssql, db2 or ibmi.
    #[arg(short, long, env = "POLYSQL_DIALECT", default_value = "postgres")]
    dialect: DialectKind,

    /// JSON file holding generator options.
    #[arg(short, long, env = "POLYSQL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a statement from a JSON descriptor file.
    Generate {
        /// Descriptor file.
        file: PathBuf,
    },

    /// Print the capability matrix of the dialect.
    Capabilities,

    /// Print the SQL literal for a JSON value.
    Escape {
        /// The value, as JSON.
        value: String,

        /// Data type to escape as, such as `integer` or `{"type": "STRING"}`.
        #[arg(short = 't', long = "type")]
        data_type: Option<String>,
    },
}

fn load_options(path: Option<&Path>) -> Result<GeneratorOptions, CliError> {
    let Some(path) = path else {
        return Ok(GeneratorOptions::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::json(path.display().to_string(), e))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = load_options(cli.config.as_deref())?;
    let dialect = Dialect::with_options(cli.dialect, options)?;
    debug!(dialect = dialect.name(), "dialect ready");

    match cli.command {
        Commands::Generate { file } => {
            let descriptor = Descriptor::load(&file)?;
            let query = descriptor.generate(&dialect)?;
            if query.is_empty() {
                info!("Nothing to execute for {}", file.display());
            }
            println!("{}", serde_json::to_string_pretty(&query)?);
        }

        Commands::Capabilities => {
            println!("{}", serde_json::to_string_pretty(dialect.supports())?);
        }

        Commands::Escape { value, data_type } => {
            let json: serde_json::Value =
                serde_json::from_str(&value).map_err(|e| CliError::json("value argument", e))?;
            let data_type = data_type.as_deref().map(parse_data_type).transpose()?;
            let literal = dialect
                .query_generator()
                .escape(&SqlValue::from_json(&json), data_type.as_ref())?;
            println!("{literal}");
        }
    }

    Ok(())
}
