use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

lazy_static::lazy_static! {
    static ref INCREMENTAL_LOGGER_ID: AtomicU64 = AtomicU64::new(0);
}

/// Process-unique identity of a logger's output file. Section ids are only
/// unique within one file, so references carry this to tell files apart.
#[derive(Clone, Copy, Hash, PartialOrd, PartialEq, Ord, Eq, Debug)]
pub struct LoggerID(u64);

impl LoggerID {
    pub fn new() -> Self {
        LoggerID(INCREMENTAL_LOGGER_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoggerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of a section inside one log file. Starts at 1.
pub type SectionID = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = LoggerID::new();
        let b = LoggerID::new();
        assert!(a < b);
        assert_ne!(a.as_u64(), b.as_u64());
    }
}
