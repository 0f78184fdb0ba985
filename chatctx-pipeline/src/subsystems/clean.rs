//! Clean subsystem — raw exports → cleaned conversation JSON
//!
//! Walks `paths.raw_dir`, cleans each matching export and writes
//! `<cleaned_dir>/<peer>.json` plus `<logs_dir>/<stem>_skipped.log`.
//! An unreadable export is reported and skipped; the remaining files still run.

use std::fs;
use std::path::{Path, PathBuf};

use chatctx_core::{ChatCtxConfig, ChatCtxError};
use chatctx_ingest::{read_export, write_cleaned, write_skip_log, Cleaner, IngestError};

#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub files_seen: usize,
    pub files_cleaned: usize,
    pub files_failed: usize,
    pub messages_kept: usize,
    pub messages_skipped: usize,
    pub outputs: Vec<PathBuf>,
}

impl CleanReport {
    /// Every input failed, so nothing was produced.
    pub fn is_total_failure(&self) -> bool {
        self.files_seen > 0 && self.files_cleaned == 0
    }
}

#[derive(Debug, Clone)]
pub struct CleanedFile {
    pub output: PathBuf,
    pub skip_log: PathBuf,
    pub kept: usize,
    pub skipped: usize,
    pub peer: String,
}

/// `.txt` files in `dir` whose name contains `name_filter`, sorted by name.
pub fn list_exports(dir: &Path, name_filter: &str) -> Result<Vec<PathBuf>, ChatCtxError> {
    if !dir.is_dir() {
        return Err(ChatCtxError::NoInput(dir.display().to_string()));
    }

    let needle = name_filter.to_lowercase();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ChatCtxError::NoInput(dir.display().to_string()));
    }
    Ok(files)
}

pub fn clean_file(
    path: &Path,
    cleaner: &Cleaner,
    cleaned_dir: &Path,
    logs_dir: &Path,
) -> Result<CleanedFile, IngestError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let text = read_export(path)?;
    let chat = cleaner.clean_export(&text);

    let skip_log = write_skip_log(logs_dir, &stem, &chat.skipped)?;
    let output = write_cleaned(cleaned_dir, &chat, &stem)?;

    Ok(CleanedFile {
        output,
        skip_log,
        kept: chat.message_count(),
        skipped: chat.skipped.len(),
        peer: chat.peer_name().to_string(),
    })
}

pub fn run_clean(config: &ChatCtxConfig) -> Result<CleanReport, ChatCtxError> {
    let raw_dir = config.paths.raw_dir();
    let cleaned_dir = config.paths.cleaned_dir();
    let logs_dir = config.paths.logs_dir();

    let exports = list_exports(&raw_dir, &config.cleaner.input_name_filter)?;
    let cleaner = Cleaner::new(config.cleaner.clone());
    let mut report = CleanReport {
        files_seen: exports.len(),
        ..Default::default()
    };

    for path in &exports {
        match clean_file(path, &cleaner, &cleaned_dir, &logs_dir) {
            Ok(cleaned) => {
                tracing::info!(
                    input = %path.display(),
                    output = %cleaned.output.display(),
                    skip_log = %cleaned.skip_log.display(),
                    peer = %cleaned.peer,
                    kept = cleaned.kept,
                    skipped = cleaned.skipped,
                    "Cleaned chat export"
                );
                report.files_cleaned += 1;
                report.messages_kept += cleaned.kept;
                report.messages_skipped += cleaned.skipped;
                report.outputs.push(cleaned.output);
            }
            Err(e) => {
                tracing::error!(input = %path.display(), error = %e, "Failed to clean chat export");
                report.files_failed += 1;
            }
        }
    }

    Ok(report)
}
