// Library error type. Parse artifacts (bad tuples, truncated lines) are not errors;
// they are counted and logged by the router instead.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Reading the dump or writing a sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Schema or plan JSON could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table `{0}` has no schema")]
    UnknownTable(String),

    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("invalid filter `{0}` (expected TABLE.COLUMN=VALUE)")]
    InvalidFilter(String),

    #[error("table `{0}` has an empty column list")]
    EmptySchema(String),

    /// Two outputs of one plan resolve to the same file.
    #[error("output file `{0}` is used more than once")]
    DuplicateOutput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
