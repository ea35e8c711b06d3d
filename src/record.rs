use crate::level::Level;
use crate::uniq_id::{LoggerID, SectionID};
use std::path::PathBuf;
use std::time::SystemTime;

/// Name records get when they are logged straight into a `Logger`
/// instead of going through a `Registry`.
pub const ROOT_LOGGER_NAME: &str = "root";

/// Points at a section of some logger. Records carry these as opaque tags,
/// the section they reference doesn't need to be open or even belong to
/// the logger that writes the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRef {
    pub owner: LoggerID,
    pub path: PathBuf,
    pub id: SectionID,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    /// Name of the registry the record was logged through.
    pub logger: String,
    pub message: String,
    pub refs: Vec<SectionRef>,
    pub created_at: SystemTime,
}

impl Record {
    pub fn new<L: Into<String>, M: Into<String>>(
        level: Level,
        logger: L,
        message: M,
        refs: Vec<SectionRef>,
    ) -> Self {
        Self {
            level,
            logger: logger.into(),
            message: message.into(),
            refs,
            created_at: SystemTime::now(),
        }
    }
}
