//! Chat export cleaning: parsing, noise removal and redaction.

pub mod cleaner;
pub mod export;
pub mod output;
pub mod patterns;
pub mod skip_log;

use std::path::PathBuf;

use thiserror::Error;

pub use cleaner::{clean_text, redact, CleanedChat, Cleaner, UNKNOWN_PEER};
pub use export::{parse_export, ParsedExport, RawBlock};
pub use output::{read_cleaned, read_export, safe_file_name, write_cleaned};
pub use patterns::REDACTED;
pub use skip_log::{write_skip_log, SkipReason, SkippedBlock};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
