//! Cleaning rules: noise removal, redaction and relevance filtering.
//!
//! Every text-level step is idempotent, so `clean_text(clean_text(x)) ==
//! clean_text(x)` and a kept message stays kept when cleaned again.

use std::collections::BTreeMap;

use chatctx_core::config::CleanerConfig;
use chatctx_core::models::{CleanedMessage, Conversation, ConversationMeta, Role};
use chrono::NaiveDate;

use crate::export::{parse_export, RawBlock};
use crate::patterns::{
    EDITED_MARKER, EMOJI, HORIZONTAL_SPACE, LINK, MEDIA_NOTICES, MEMBERSHIP_NOTICES, REDACTED,
    REDACTION_RULES, SYSTEM_NOTICES,
};
use crate::skip_log::{SkipReason, SkippedBlock};

pub const UNKNOWN_PEER: &str = "Unknown";

fn is_invisible(c: char) -> bool {
    (c.is_control() && c != '\t')
        || matches!(
            c,
            '\u{00AD}'
                | '\u{200B}'..='\u{200C}'
                | '\u{200E}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{FEFF}'
        )
}

/// Drop control and formatting characters, normalise no-break spaces and trim.
pub fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !is_invisible(*c))
        .map(|c| match c {
            '\t' | '\u{00A0}' | '\u{202F}' | '\u{2007}' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn remove_emojis(text: &str) -> String {
    EMOJI.replace_all(text, "").into_owned()
}

fn redact_once(text: &str) -> String {
    REDACTION_RULES.iter().fold(text.to_string(), |acc, rule| {
        acc.split(REDACTED)
            .map(|segment| rule.apply(segment))
            .collect::<Vec<_>>()
            .join(REDACTED)
    })
}

/// Apply `step` until the text stops changing. Every step only removes
/// characters or turns them into markers, so this terminates.
fn until_stable(text: &str, step: fn(&str) -> String) -> String {
    let mut current = step(text);
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Replace every sensitive substring with `[REDACTED]`. Existing markers are
/// never matched, so redacting twice changes nothing.
pub fn redact(text: &str) -> String {
    until_stable(text, redact_once)
}

/// Whether any redaction rule would still fire on `text`.
fn contains_sensitive(text: &str) -> bool {
    text.split(REDACTED)
        .any(|segment| REDACTION_RULES.iter().any(|rule| rule.is_match(segment)))
}

/// Sender labels of unsaved contacts are phone numbers.
fn redact_sender(sender: &str) -> String {
    if contains_sensitive(sender) {
        REDACTED.to_string()
    } else {
        sender.to_string()
    }
}

fn clean_line_once(line: &str) -> String {
    let text = strip_invisible(line);
    let text = remove_emojis(&text);
    let text = EDITED_MARKER.replace_all(&text, "");
    let text = LINK.replace_all(&text, "");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    redact(text.trim()).trim().to_string()
}

fn clean_line(line: &str) -> String {
    // Removing one piece can join its neighbours into a new match.
    until_stable(line, clean_line_once)
}

/// Clean a (possibly multi-line) message body. Lines that end up empty are
/// dropped.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result of cleaning one export.
#[derive(Debug, Default)]
pub struct CleanedChat {
    /// First sender other than the user.
    pub peer: Option<String>,
    pub conversations: Vec<Conversation>,
    pub skipped: Vec<SkippedBlock>,
}

impl CleanedChat {
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.dialogue.len()).sum()
    }

    pub fn peer_name(&self) -> &str {
        self.peer.as_deref().unwrap_or(UNKNOWN_PEER)
    }
}

pub struct Cleaner {
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    fn is_filler(&self, text: &str) -> bool {
        let normalized = text
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        self.config
            .filler_words
            .iter()
            .any(|w| w.to_lowercase() == normalized)
    }

    /// Clean a message body, or say why it should be dropped.
    pub fn clean_body(&self, body: &str, system_marked: bool) -> Result<String, SkipReason> {
        let cleaned = clean_text(body);
        if cleaned.is_empty() {
            return Err(SkipReason::EmptyAfterCleaning);
        }

        // Matched on cleaned text, keeping the decision stable across passes.
        let flat = cleaned.replace('\n', " ");
        if SYSTEM_NOTICES.is_match(&flat) || (system_marked && MEMBERSHIP_NOTICES.is_match(&flat)) {
            return Err(SkipReason::SystemNotice);
        }
        if MEDIA_NOTICES.is_match(&flat) {
            return Err(SkipReason::MediaPlaceholder);
        }

        // Markers carry no content of their own.
        let content_chars = cleaned
            .replace(REDACTED, "")
            .chars()
            .filter(|c| c.is_alphanumeric())
            .count();
        if self.is_filler(&cleaned) {
            return Err(SkipReason::Filler);
        }
        if content_chars < self.config.min_content_chars.max(1) {
            return Err(SkipReason::TooShort);
        }

        Ok(cleaned)
    }

    pub fn role_of(&self, sender: &str) -> Role {
        if sender.trim() == self.config.user_name {
            Role::User
        } else {
            Role::Assistant
        }
    }

    pub fn clean_block(&self, block: &RawBlock) -> Result<CleanedMessage, SkipReason> {
        let text = self.clean_body(&block.body(), block.system_marked)?;
        Ok(CleanedMessage {
            role: self.role_of(&block.header.sender),
            sender: redact_sender(&block.header.sender),
            text,
            timestamp: block.header.timestamp(),
        })
    }

    /// Parse and clean a whole export, grouping kept messages by day.
    pub fn clean_export(&self, text: &str) -> CleanedChat {
        let parsed = parse_export(text);
        let mut skipped = parsed.skipped;

        let mut days: BTreeMap<NaiveDate, Vec<CleanedMessage>> = BTreeMap::new();
        let mut day_peers: BTreeMap<NaiveDate, String> = BTreeMap::new();
        let mut peer: Option<String> = None;

        for block in &parsed.blocks {
            let message = match self.clean_block(block) {
                Ok(m) => m,
                Err(reason) => {
                    tracing::trace!(%reason, sender = %redact_sender(&block.header.sender), "Dropped message");
                    skipped.push(SkippedBlock::from_lines(reason, block.raw.clone()));
                    continue;
                }
            };

            let date = block.header.date;
            // A redacted sender cannot name the peer or the output file.
            if message.role == Role::Assistant && message.sender != REDACTED {
                if peer.is_none() {
                    peer = Some(message.sender.clone());
                }
                day_peers
                    .entry(date)
                    .or_insert_with(|| message.sender.clone());
            }
            days.entry(date).or_default().push(message);
        }

        let fallback_peer = peer.clone().unwrap_or_else(|| UNKNOWN_PEER.to_string());
        let conversations = days
            .into_iter()
            .map(|(date, dialogue)| Conversation {
                dialogue,
                meta: ConversationMeta {
                    source: self.config.source.clone(),
                    date,
                    peer: day_peers
                        .get(&date)
                        .cloned()
                        .unwrap_or_else(|| fallback_peer.clone()),
                },
            })
            .collect();

        CleanedChat {
            peer,
            conversations,
            skipped,
        }
    }
}
