//! Error types for the command-line front end.

use std::path::PathBuf;

/// Errors raised while loading inputs or generating statements.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A descriptor or configuration file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A file or argument is not the JSON shape it should be.
    #[error("Invalid JSON in {origin}: {source}")]
    Json {
        /// Where the JSON came from.
        origin: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The descriptor parsed but does not describe a statement.
    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    /// The generator rejected the statement.
    #[error(transparent)]
    Generate(#[from] polysql_core::Error),
}

impl CliError {
    pub(crate) fn json(origin: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            origin: origin.into(),
            source,
        }
    }
}

/// Result alias for the CLI.
pub type Result<T> = std::result::Result<T, CliError>;
