use std::fs;
use std::path::{Path, PathBuf};

use chatctx_core::models::Conversation;

use crate::cleaner::{redact, CleanedChat, UNKNOWN_PEER};
use crate::IngestError;

/// Read an export as UTF-8. Invalid encoding counts as unreadable.
pub fn read_export(path: &Path) -> Result<String, IngestError> {
    fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Keep word characters, spaces and dashes; spaces become underscores.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// Write `<dir>/<peer>.json`; `fallback_stem` names the file when the peer is
/// unknown or sanitises to nothing.
pub fn write_cleaned(
    dir: &Path,
    chat: &CleanedChat,
    fallback_stem: &str,
) -> Result<PathBuf, IngestError> {
    fs::create_dir_all(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut name = match chat.peer.as_deref() {
        Some(peer) if peer != UNKNOWN_PEER => safe_file_name(peer),
        _ => String::new(),
    };
    if name.is_empty() {
        name = safe_file_name(&redact(fallback_stem));
    }
    if name.is_empty() {
        name = UNKNOWN_PEER.to_string();
    }

    let path = dir.join(format!("{}.json", name));
    let json = serde_json::to_string_pretty(&chat.conversations)?;
    fs::write(&path, json).map_err(|source| IngestError::Io {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

pub fn read_cleaned(path: &Path) -> Result<Vec<Conversation>, IngestError> {
    let raw = fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
