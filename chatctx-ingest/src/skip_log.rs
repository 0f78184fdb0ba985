use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoHeader,
    BadTimestamp,
    SystemNotice,
    MediaPlaceholder,
    EmptyAfterCleaning,
    TooShort,
    Filler,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::NoHeader => "No match",
            SkipReason::BadTimestamp => "Bad timestamp",
            SkipReason::SystemNotice => "System notice",
            SkipReason::MediaPlaceholder => "Media placeholder",
            SkipReason::EmptyAfterCleaning => "Empty after cleaning",
            SkipReason::TooShort => "Too short",
            SkipReason::Filler => "Irrelevant content",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBlock {
    pub reason: SkipReason,
    pub lines: Vec<String>,
}

impl SkippedBlock {
    pub fn new(reason: SkipReason, first_line: &str) -> Self {
        Self {
            reason,
            lines: vec![first_line.to_string()],
        }
    }

    pub fn from_lines(reason: SkipReason, lines: Vec<String>) -> Self {
        Self { reason, lines }
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Write `<logs_dir>/<stem>_skipped.log`, replacing any previous log for the
/// same export.
pub fn write_skip_log(
    logs_dir: &Path,
    stem: &str,
    skipped: &[SkippedBlock],
) -> Result<PathBuf, IngestError> {
    fs::create_dir_all(logs_dir).map_err(|source| IngestError::Io {
        path: logs_dir.to_path_buf(),
        source,
    })?;

    let path = logs_dir.join(format!("{}_skipped.log", stem));
    let mut out = String::new();
    for block in skipped {
        out.push_str(&format!("[{}] {}\n\n", block.reason, block.lines.join("\n").trim()));
    }

    fs::write(&path, out).map_err(|source| IngestError::Io {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}
