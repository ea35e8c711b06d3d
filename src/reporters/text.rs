use crate::level::Level;
use crate::record::Record;
use crate::utils::TimestampFormat;
use anyhow::Result;
use chrono::prelude::*;
use chrono::{DateTime, Local, Utc};
use colored::*;
use std::io::Write;
use std::sync::{Arc, Mutex, RwLock};

use super::Reporter;

/// Prints records as single colored lines, like a console handler.
pub struct StdioReporter {
    pub timestamp_format: Option<TimestampFormat>,
    /// By default this reporter writes to STDERR,
    /// this flag will make it write to STDOUT instead
    pub use_stdout: bool,
}

// Same line format as StdioReporter, but kept in a string that can later
// be inspected/dumped.
#[derive(Clone)]
pub struct StringReporter {
    pub output: Arc<Mutex<String>>,
    timestamp_format: Arc<RwLock<TimestampFormat>>,
    strip_ansi: bool,
}

impl StdioReporter {
    pub fn new() -> Self {
        Self {
            timestamp_format: None,
            use_stdout: false,
        }
    }
}

impl Reporter for StdioReporter {
    fn report(&self, record: &Record) -> Result<()> {
        let timestamp_format = self.timestamp_format.unwrap_or(TimestampFormat::Local);
        let result = make_string(record, timestamp_format);

        if self.use_stdout {
            writeln!(std::io::stdout().lock(), "{}", result)?;
        } else {
            writeln!(std::io::stderr().lock(), "{}", result)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if self.use_stdout {
            std::io::stdout().flush()?;
        } else {
            std::io::stderr().flush()?;
        }
        Ok(())
    }
}

pub fn strip_ansi(s: &str) -> String {
    let stripped = strip_ansi_escapes::strip(s).unwrap_or_else(|_| s.as_bytes().to_vec());
    String::from_utf8_lossy(&stripped).into_owned()
}

impl StringReporter {
    pub fn new() -> Self {
        Self {
            output: Arc::new(Mutex::new(String::new())),
            timestamp_format: Arc::new(RwLock::new(TimestampFormat::Redacted)),
            strip_ansi: true,
        }
    }

    pub fn set_timestamp_format(&self, format: TimestampFormat) {
        *self.timestamp_format.write().expect("poisoned lock") = format;
    }
}

impl Reporter for StringReporter {
    fn report(&self, record: &Record) -> Result<()> {
        let timestamp_format = *self.timestamp_format.read().expect("poisoned lock");
        let mut result = make_string(record, timestamp_format);
        if self.strip_ansi {
            result = strip_ansi(&result);
        }
        let mut output = self.output.lock().expect("poisoned lock");
        output.push_str(&result);
        output.push('\n');
        Ok(())
    }
}

impl std::fmt::Display for StringReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.output.lock().expect("poisoned lock");
        write!(f, "{}", &s)
    }
}

/// `[ts] LEVEL logger: message [Common, Other]`
pub fn make_string(record: &Record, timestamp_format: TimestampFormat) -> String {
    let timestamp = match timestamp_format {
        TimestampFormat::None => String::new(),
        TimestampFormat::Redacted => "[ ] ".to_string(), // for testing
        TimestampFormat::Local => {
            let datetime: DateTime<Local> = record.created_at.into();
            let rounded = datetime.round_subsecs(0);
            let formatted = rounded.format("%I:%M:%S%p");
            format!("[{}] ", formatted).dimmed().to_string()
        }
        TimestampFormat::UTC => {
            let datetime: DateTime<Utc> = record.created_at.into();
            let rounded = datetime.round_subsecs(0);
            format!("[{:?}] ", rounded).dimmed().to_string()
        }
    };

    let level = match record.level {
        Level::Debug => record.level.as_str().dimmed(),
        Level::Info => record.level.as_str().green(),
        Level::Warning => record.level.as_str().yellow(),
        Level::Error | Level::Critical => record.level.as_str().red(),
    };

    let mut result = format!(
        "{}{} {}: {}",
        timestamp,
        level,
        record.logger.dimmed(),
        record.message
    );

    if !record.refs.is_empty() {
        let refs = record
            .refs
            .iter()
            .map(|r| r.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        result.push_str(&format!(" [{}]", refs).cyan().to_string());
    }

    result
}
