//! Splits a raw chat export into message blocks.
//!
//! A block starts at a header line `[<stamp>] <sender>: <body>` and runs until
//! the next header. Lines that appear before any header, and blocks whose
//! stamp cannot be parsed, are returned as skipped rather than failing.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::cleaner::strip_invisible;
use crate::patterns::HEADER;
use crate::skip_log::{SkipReason, SkippedBlock};

const SYSTEM_MARK: char = '\u{200E}';

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y, %H:%M:%S",
    "%d/%m/%Y, %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d, %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub sender: String,
}

impl MessageHeader {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.time.map(|t| self.date.and_time(t))
    }
}

/// One message as it appeared in the export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub header: MessageHeader,
    /// Body of the header line followed by continuation lines, invisible
    /// characters already removed.
    pub lines: Vec<String>,
    /// The export flagged the header line as an application notice.
    pub system_marked: bool,
    pub raw: Vec<String>,
}

impl RawBlock {
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Default)]
pub struct ParsedExport {
    pub blocks: Vec<RawBlock>,
    pub skipped: Vec<SkippedBlock>,
}

/// Parse the stamp inside the header brackets.
pub fn parse_stamp(stamp: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let stamp = stamp.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stamp, fmt) {
            return Some((dt.date(), Some(dt.time())));
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(stamp, fmt).ok())
        .map(|d| (d, None))
}

enum Open {
    None,
    Block(RawBlock),
    Malformed(SkippedBlock),
}

impl Open {
    fn close(self, parsed: &mut ParsedExport) {
        match self {
            Open::None => {}
            Open::Block(block) => parsed.blocks.push(block),
            Open::Malformed(skipped) => parsed.skipped.push(skipped),
        }
    }
}

pub fn parse_export(text: &str) -> ParsedExport {
    let mut parsed = ParsedExport::default();
    let mut open = Open::None;

    for raw_line in text.lines() {
        let line = strip_invisible(raw_line);

        if let Some(caps) = HEADER.captures(&line) {
            std::mem::replace(&mut open, Open::None).close(&mut parsed);

            open = match parse_stamp(&caps["stamp"]) {
                Some((date, time)) => Open::Block(RawBlock {
                    header: MessageHeader {
                        date,
                        time,
                        sender: caps["sender"].trim().to_string(),
                    },
                    lines: vec![caps["body"].trim().to_string()],
                    system_marked: raw_line.contains(SYSTEM_MARK),
                    raw: vec![raw_line.to_string()],
                }),
                None => {
                    tracing::debug!(stamp = &caps["stamp"], "Unparseable message stamp");
                    Open::Malformed(SkippedBlock::new(SkipReason::BadTimestamp, raw_line))
                }
            };
            continue;
        }

        if let Open::None = open {
            if !line.is_empty() {
                open = Open::Malformed(SkippedBlock::new(SkipReason::NoHeader, raw_line));
            }
            continue;
        }

        match &mut open {
            Open::Block(block) => {
                block.lines.push(line);
                block.raw.push(raw_line.to_string());
            }
            Open::Malformed(skipped) => skipped.push_line(raw_line),
            Open::None => {}
        }
    }

    open.close(&mut parsed);
    parsed
}
