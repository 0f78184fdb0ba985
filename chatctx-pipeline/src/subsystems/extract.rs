//! Extract subsystem — cleaned conversations → ContextProfile
//!
//! For each `*.json` in `paths.cleaned_dir`:
//! - builds a system + user prompt from the dialogue
//! - makes one chat-completion call through the configured backend
//! - validates the model output as a `ContextProfile`
//! - writes `<out_dir>/<stem>_extracted.json`
//!
//! A failure on one file (unreadable input, API error, malformed output) is
//! reported and the next file is processed.

use std::fs;
use std::path::{Path, PathBuf};

use chatctx_core::llm::{ChatCompletionClient, CompletionBackend, LlmError};
use chatctx_core::models::{ContextProfile, Conversation};
use chatctx_core::{ChatCtxConfig, ChatCtxError};
use chatctx_ingest::{read_cleaned, IngestError, REDACTED, UNKNOWN_PEER};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read cleaned chat: {0}")]
    Read(#[from] IngestError),

    #[error("no messages to send")]
    NoMessages,

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("failed to write profile to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub files_seen: usize,
    pub profiles_written: usize,
    pub files_failed: usize,
    pub outputs: Vec<PathBuf>,
}

impl ExtractReport {
    pub fn is_total_failure(&self) -> bool {
        self.files_seen > 0 && self.profiles_written == 0
    }
}

/// Create the completion backend from the application config.
///
/// The API key comes from the environment variable named by `llm.api_key_env`.
pub fn create_backend_from_config(
    config: &ChatCtxConfig,
) -> Result<Box<dyn CompletionBackend>, LlmError> {
    let client = ChatCompletionClient::from_config(&config.llm, None)?;
    tracing::debug!(model = client.model(), base_url = %config.llm.base_url, "Completion backend ready");
    Ok(Box::new(client))
}

pub fn build_system_prompt(user: &str, person: &str) -> String {
    format!(
        r#"You extract context from personal chat logs for a communication aid used by a person living with ALS.
In the conversation, "User" is {user} (the person with ALS) and "Assistant" is {person}, the person {user} is talking to.
Prefer quality over quantity: keep only precise, useful information such as specific events, stories, happenings, traits of {person}, and the way {user} speaks with them (tone, recurring phrases).

Return structured JSON with exactly these keys:
- "about_person": a summary of {person}'s traits, preferences and background.
- "speaking_style": how {user} communicates with {person} (for example humor or formality).
- "events": a list of specific events or stories mentioned (for example "{person}'s trip to Paris in 2024").

Be concise and accurate. Output ONLY valid JSON."#
    )
}

/// `Conversation:\n<Role>: <text>...\n\nExtract context as JSON.`, or `None`
/// when there is nothing to send.
pub fn build_user_prompt(conversations: &[Conversation]) -> Option<String> {
    let lines: Vec<String> = conversations
        .iter()
        .flat_map(|c| c.dialogue.iter())
        .map(|m| format!("{}: {}", m.role.label(), m.text))
        .collect();

    if lines.is_empty() {
        return None;
    }

    Some(format!(
        "Conversation:\n{}\n\nExtract context as JSON.",
        lines.join("\n")
    ))
}

/// The peer recorded by the cleaner, else the file stem up to the first `_`.
pub fn person_name(path: &Path, conversations: &[Conversation]) -> String {
    if let Some(peer) = conversations
        .iter()
        .map(|c| c.meta.peer.as_str())
        .find(|p| !p.is_empty() && *p != UNKNOWN_PEER && *p != REDACTED)
    {
        return peer.to_string();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split('_').next() {
        Some(first) if !first.is_empty() => first.to_string(),
        _ => stem,
    }
}

/// Parse the model output, tolerating a surrounding Markdown code fence.
pub fn parse_profile(content: &str) -> Result<ContextProfile, LlmError> {
    let trimmed = content.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        }
        None => trimmed,
    };

    serde_json::from_str(body.trim()).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

pub async fn extract_file(
    path: &Path,
    backend: &dyn CompletionBackend,
    config: &ChatCtxConfig,
) -> Result<PathBuf, ExtractError> {
    let conversations = read_cleaned(path)?;
    let user_prompt = build_user_prompt(&conversations).ok_or(ExtractError::NoMessages)?;
    let person = person_name(path, &conversations);
    let system_prompt = build_system_prompt(&config.cleaner.user_name, &person);

    tracing::debug!(file = %path.display(), person = %person, backend = backend.name(), "Requesting profile");
    let content = backend.complete(&system_prompt, &user_prompt).await?;
    let profile = parse_profile(&content)?;

    let out_dir = config.paths.out_dir();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out_path = out_dir.join(format!("{}_extracted.json", stem));

    let json = serde_json::to_string_pretty(&profile)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    fs::create_dir_all(&out_dir)
        .and_then(|_| fs::write(&out_path, json))
        .map_err(|source| ExtractError::Write {
            path: out_path.clone(),
            source,
        })?;

    Ok(out_path)
}

/// `*.json` files in the cleaned directory, sorted by name.
pub fn list_cleaned(dir: &Path) -> Result<Vec<PathBuf>, ChatCtxError> {
    if !dir.is_dir() {
        return Err(ChatCtxError::NoInput(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ChatCtxError::NoInput(dir.display().to_string()));
    }
    Ok(files)
}

pub async fn run_extract(
    config: &ChatCtxConfig,
    backend: &dyn CompletionBackend,
) -> Result<ExtractReport, ChatCtxError> {
    let files = list_cleaned(&config.paths.cleaned_dir())?;
    let mut report = ExtractReport {
        files_seen: files.len(),
        ..Default::default()
    };

    for path in &files {
        tracing::info!(file = %path.display(), "Extracting context");
        match extract_file(path, backend, config).await {
            Ok(out) => {
                tracing::info!(file = %path.display(), output = %out.display(), "Saved extracted context");
                report.profiles_written += 1;
                report.outputs.push(out);
            }
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "Failed to extract context");
                report.files_failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatctx_core::models::{CleanedMessage, ConversationMeta, EventDescriptor, Role};
    use chrono::NaiveDate;

    fn conversation(peer: &str, messages: &[(Role, &str)]) -> Conversation {
        Conversation {
            dialogue: messages
                .iter()
                .map(|(role, text)| CleanedMessage {
                    role: *role,
                    sender: match role {
                        Role::User => "Iomar".to_string(),
                        Role::Assistant => peer.to_string(),
                    },
                    text: text.to_string(),
                    timestamp: None,
                })
                .collect(),
            meta: ConversationMeta {
                source: "whatsapp".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 3, 12).unwrap(),
                peer: peer.to_string(),
            },
        }
    }

    #[test]
    fn test_user_prompt_format() {
        let convs = vec![conversation(
            "Maya",
            &[(Role::Assistant, "dinner tonight?"), (Role::User, "sounds good")],
        )];
        assert_eq!(
            build_user_prompt(&convs).unwrap(),
            "Conversation:\nAssistant: dinner tonight?\nUser: sounds good\n\nExtract context as JSON."
        );
    }

    #[test]
    fn test_empty_dialogue_has_no_prompt() {
        assert!(build_user_prompt(&[]).is_none());
        assert!(build_user_prompt(&[conversation("Maya", &[])]).is_none());
    }

    #[test]
    fn test_system_prompt_names_both_sides() {
        let prompt = build_system_prompt("Iomar", "Maya");
        assert!(prompt.contains("\"User\" is Iomar"));
        assert!(prompt.contains("\"Assistant\" is Maya"));
        assert!(prompt.contains("\"about_person\""));
        assert!(prompt.contains("\"speaking_style\""));
        assert!(prompt.contains("\"events\""));
    }

    #[test]
    fn test_person_name_prefers_peer() {
        let convs = vec![conversation("Maya Lopez", &[])];
        assert_eq!(person_name(Path::new("x/Maya_Lopez.json"), &convs), "Maya Lopez");
    }

    #[test]
    fn test_person_name_falls_back_to_stem() {
        let convs = vec![conversation(UNKNOWN_PEER, &[])];
        assert_eq!(person_name(Path::new("x/Alice_chat.json"), &convs), "Alice");
        assert_eq!(person_name(Path::new("x/_chat.json"), &[]), "_chat");

        let convs = vec![conversation(REDACTED, &[])];
        assert_eq!(person_name(Path::new("x/unsaved_chat.json"), &convs), "unsaved");
    }

    #[test]
    fn test_parse_profile_plain_and_fenced() {
        let raw = r#"{"about_person": "Loves jazz", "speaking_style": "Playful", "events": ["Concert in May"]}"#;
        let plain = parse_profile(raw).unwrap();
        assert_eq!(plain.about_person, "Loves jazz");
        assert_eq!(
            plain.events,
            vec![EventDescriptor::Summary("Concert in May".to_string())]
        );

        let fenced = format!("```json\n{}\n```", raw);
        assert_eq!(parse_profile(&fenced).unwrap(), plain);
    }

    #[test]
    fn test_parse_profile_missing_events() {
        let err = parse_profile(r#"{"about_person": "a", "speaking_style": "b"}"#).unwrap_err();
        match err {
            LlmError::MalformedResponse(msg) => assert!(msg.contains("events"), "{}", msg),
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_profile_not_json() {
        assert!(matches!(
            parse_profile("Sure! Here is the profile you asked for."),
            Err(LlmError::MalformedResponse(_))
        ));
    }
}
