//! Orchestration: clean, then extract, one file at a time.

use chatctx_core::llm::CompletionBackend;
use chatctx_core::ChatCtxConfig;

use crate::subsystems::clean::{self, CleanReport};
use crate::subsystems::extract::{self, ExtractReport};

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub clean: CleanReport,
    pub extract: ExtractReport,
}

impl RunReport {
    /// A run fails as a whole only when a stage produced nothing at all.
    pub fn is_failure(&self) -> bool {
        self.clean.is_total_failure() || self.extract.is_total_failure()
    }
}

/// Run the cleaner to completion, then extract a profile per cleaned file.
pub async fn run_pipeline(
    config: &ChatCtxConfig,
    backend: &dyn CompletionBackend,
) -> anyhow::Result<RunReport> {
    let clean = clean::run_clean(config)?;
    tracing::info!(
        files = clean.files_seen,
        cleaned = clean.files_cleaned,
        failed = clean.files_failed,
        messages = clean.messages_kept,
        skipped = clean.messages_skipped,
        "Cleaning finished"
    );

    if clean.is_total_failure() {
        anyhow::bail!("no chat export could be cleaned");
    }

    let extract = extract::run_extract(config, backend).await?;
    tracing::info!(
        files = extract.files_seen,
        written = extract.profiles_written,
        failed = extract.files_failed,
        "Extraction finished"
    );

    Ok(RunReport { clean, extract })
}
