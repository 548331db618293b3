use thiserror::Error;

/// Convenience result type used across the crate.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by parsing, loading, watching and configuration code.
///
/// Field-level coercion problems are never reported here: they are replaced by the field's
/// default value while parsing.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level CSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input has no header line.
    #[error("csv input is empty: {input}")]
    EmptyInput { input: String },

    /// A chunk could not be committed to the destination table.
    #[error("insert into '{table}' failed at chunk {chunk} after {attempts} attempt(s): {message}")]
    InsertFailure {
        table: String,
        chunk: usize,
        attempts: usize,
        message: String,
    },

    #[cfg(feature = "sqlite")]
    /// SQLite store error (feature-gated behind `sqlite`).
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Filesystem notification error.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid file-name filter.
    #[error("invalid file filter: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Configuration could not be read or failed validation.
    #[error("config error: {message}")]
    Config { message: String },

    /// A caller-supplied argument violates an invariant (e.g. a zero batch size).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Raised by external category handlers.
    #[error("handler for '{category}' failed: {message}")]
    Handler { category: String, message: String },
}

impl From<toml::de::Error> for IngestionError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config {
            message: e.to_string(),
        }
    }
}
