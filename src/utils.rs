use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::time::{Duration, SystemTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum TimestampFormat {
    UTC,
    Local,
    None,
    /// Constant placeholder instead of the time, for tests.
    Redacted,
}

pub const REDACTED_TIMESTAMP: &str = "<redacted>";

/// Timestamp as it goes into a log file entry.
pub(crate) fn file_timestamp(at: SystemTime, format: TimestampFormat) -> Option<String> {
    match format {
        TimestampFormat::None => None,
        TimestampFormat::Redacted => Some(REDACTED_TIMESTAMP.to_string()),
        TimestampFormat::Local => {
            let datetime: DateTime<Local> = at.into();
            Some(datetime.to_rfc3339_opts(SecondsFormat::Millis, false))
        }
        TimestampFormat::UTC => {
            let datetime: DateTime<Utc> = at.into();
            Some(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
    }
}

/// Whether durations are written along with timestamps. They would make
/// redacted output nondeterministic, so only real clocks get them.
pub(crate) fn has_clock(format: TimestampFormat) -> bool {
    matches!(format, TimestampFormat::UTC | TimestampFormat::Local)
}

/// `1.2s` style, the way durations show up in section headers.
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    let millis = (d.as_millis() % 1000) / 100;
    format!("{}.{}s", secs, millis)
}

/// Escape a label that was given as plain text so it can sit next to
/// HTML-formatted labels and headers.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
