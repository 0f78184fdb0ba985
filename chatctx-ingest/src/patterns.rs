//! Compiled regex tables for export parsing, noise filtering and redaction.

use regex::{Captures, Regex, RegexSet};
use std::sync::LazyLock;

/// Replacement for every redacted substring.
pub const REDACTED: &str = "[REDACTED]";

/// `[<stamp>] <sender>: <body>`
pub static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<stamp>[^\]]+)\]\s+(?P<sender>[^:]+?):\s?(?P<body>.*)$").expect("valid regex")
});

pub static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:https?://|\bwww\.)\S+").expect("valid regex"));

pub static EDITED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<This message was edited>").expect("valid regex"));

pub static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

pub static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        "[",
        r"\x{1F600}-\x{1F64F}", // emoticons
        r"\x{1F300}-\x{1F5FF}", // symbols & pictographs, skin tones
        r"\x{1F680}-\x{1F6FF}", // transport & map
        r"\x{1F000}-\x{1F2FF}", // tiles, cards, enclosed supplements, flags
        r"\x{1F900}-\x{1F9FF}", // supplemental symbols & pictographs
        r"\x{1FA00}-\x{1FAFF}", // chess, symbols & pictographs extended-A
        r"\x{2600}-\x{26FF}",   // misc symbols
        r"\x{2700}-\x{27BF}",   // dingbats
        r"\x{2B00}-\x{2BFF}",   // arrows, stars
        r"\x{231A}\x{231B}\x{23E9}-\x{23FA}",
        r"\x{FE0E}\x{FE0F}\x{20E3}\x{200D}",
        "]+"
    ))
    .expect("valid regex")
});

/// Attachments and call notices the export writes in place of content.
pub static MEDIA_NOTICES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^(?:image|video|gif|sticker|audio|document|media|file) omitted$",
        r"(?i)^contact card omitted$",
        r"(?i)^location omitted$",
        r"(?i)^live location (?:ended|shared)$",
        r"(?i)^you deleted this message\.?$",
        r"(?i)^this message was deleted\.?$",
        r"(?i)^<media omitted>$",
        r"(?i)^(?:missed )?(?:group )?(?:voice|video) call(?:, .*)?$",
        r"(?i)^.+ \d+ pages? document omitted$",
    ])
    .expect("valid regex set")
});

/// Notices written by the chat application itself.
pub static SYSTEM_NOTICES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^messages and calls are end-to-end encrypted.*$",
        r"(?i)^.+ joined using this group's invite link$",
        r"(?i)^.+ created (?:group|this group).*$",
        r"(?i)^.+ changed (?:the subject|this group's icon|the group description|the group name).*$",
        r"(?i)^.+ deleted this group's icon$",
        r"(?i)^your security code with .+ changed.*$",
        r"(?i)^.+ changed their phone number.*$",
        r"(?i)^disappearing messages .*$",
        r"(?i)^you (?:joined|left|were added|were removed).*$",
    ])
    .expect("valid regex set")
});

/// Membership notices. Ambiguous as plain prose, so they only count when the
/// export marked the line as a system line.
pub static MEMBERSHIP_NOTICES: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^.+ left$",
        r"(?i)^.+ added .+$",
        r"(?i)^.+ removed .+$",
        r"(?i)^.+ joined$",
    ])
    .expect("valid regex set")
});

/// A single sensitive-data rule.
pub struct RedactionRule {
    pub name: &'static str,
    regex: Regex,
    accept: fn(&str) -> bool,
}

impl RedactionRule {
    fn new(name: &'static str, pattern: &str, accept: fn(&str) -> bool) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("valid regex"),
            accept,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.regex
            .replace_all(text, |caps: &Captures| {
                let found = &caps[0];
                if (self.accept)(found) {
                    REDACTED.to_string()
                } else {
                    found.to_string()
                }
            })
            .into_owned()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.find_iter(text).any(|m| (self.accept)(m.as_str()))
    }
}

fn always(_: &str) -> bool {
    true
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Applied in order. E-mail runs first so digits inside an address do not
/// split it into a phone match and a stray domain.
pub static REDACTION_RULES: LazyLock<Vec<RedactionRule>> = LazyLock::new(|| {
    vec![
        RedactionRule::new("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}", always),
        RedactionRule::new("iban", r"\b[A-Z]{2}[0-9]{2}(?:[ ]?[A-Z0-9]){11,30}\b", always),
        RedactionRule::new("rib", r"\b[0-9A-Z]{10,34}\b", |m| digit_count(m) >= 6),
        RedactionRule::new("card", r"\b(?:\d[ -]?){13,19}\d\b", always),
        RedactionRule::new("phone_intl", r"\+\d{1,4}(?:[ .-]?\d{1,4}){3,6}\b", always),
        // 06 12 34 56 78, 06.12.34.56.78
        RedactionRule::new("phone_pairs", r"\b0\d(?:[ .-]?\d{2}){4}\b", always),
        RedactionRule::new(
            "phone",
            r"(?:\+|\b)(?:\d{1,3}[\s.-]?)?(?:\(?\d{2,4}\)?[\s.-]?)?\d{3,4}[\s.-]?\d{3,4}\b",
            always,
        ),
        RedactionRule::new(
            "bic",
            r"\b[A-Z]{4} ?[A-Z]{2} ?[A-Z0-9]{2}(?: ?[A-Z0-9]{3})?\b",
            always,
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> &'static RedactionRule {
        REDACTION_RULES
            .iter()
            .find(|r| r.name == name)
            .expect("rule exists")
    }

    #[test]
    fn test_header_captures_parts() {
        let caps = HEADER
            .captures("[12/03/2023, 18:04:11] Maya Lopez: see you at 8: ok?")
            .unwrap();
        assert_eq!(&caps["stamp"], "12/03/2023, 18:04:11");
        assert_eq!(&caps["sender"], "Maya Lopez");
        assert_eq!(&caps["body"], "see you at 8: ok?");
    }

    #[test]
    fn test_header_allows_empty_body() {
        let caps = HEADER.captures("[2023-01-01] John:").unwrap();
        assert_eq!(&caps["body"], "");
    }

    #[test]
    fn test_plain_line_is_not_a_header() {
        assert!(HEADER.captures("Note: bring the cake").is_none());
    }

    #[test]
    fn test_rib_needs_digits() {
        assert!(!rule("rib").is_match("HAHAHAHAHAHA"));
        assert!(rule("rib").is_match("account 30004000031234567890"));
    }

    #[test]
    fn test_phone_variants() {
        let phone = rule("phone");
        assert!(phone.is_match("555-123-4567"));
        assert!(phone.is_match("(555) 123 4567"));
        assert!(phone.is_match("0612345678"));
        assert!(phone.is_match("555.123.4567"));
        assert!(!phone.is_match("at 10:30 tomorrow"));
        assert!(!phone.is_match("on 12.03.2023"));
        assert!(rule("phone_intl").is_match("+33 6 12 34 56 78"));
        assert!(rule("phone_pairs").is_match("06.12.34.56.78"));
        assert!(rule("phone_pairs").is_match("06 12 34 56 78"));
        assert!(!rule("phone_pairs").is_match("room 0612"));
    }

    #[test]
    fn test_link_needs_word_start() {
        assert!(LINK.is_match("go to www.example.org"));
        assert!(LINK.is_match("HTTPS://EXAMPLE.ORG"));
        assert!(!LINK.is_match("Awww... that's so sweet"));
    }

    #[test]
    fn test_card_and_iban() {
        assert!(rule("card").is_match("4111 1111 1111 1111"));
        assert!(rule("iban").is_match("FR76 3000 6000 0112 3456 7890 189"));
    }

    #[test]
    fn test_emoji_ranges() {
        assert_eq!(EMOJI.replace_all("hi 😀👍🏽❤️🇫🇷", ""), "hi ");
    }
}
