use anyhow::Result;
use sqlog::{Level, Record, Reporter};
use std::sync::{Arc, Mutex};

/// Remembers what it was handed, optionally failing on records at or above
/// `fail_at`.
#[derive(Clone)]
pub struct TestReporter {
    pub records: Arc<Mutex<Vec<Record>>>,
    pub fail_at: Option<Level>,
}

impl TestReporter {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(vec![])),
            fail_at: None,
        }
    }

    pub fn failing_at(level: Level) -> Self {
        Self {
            fail_at: Some(level),
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("poisoned lock")
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }
}

impl Reporter for TestReporter {
    fn report(&self, record: &Record) -> Result<()> {
        if let Some(level) = self.fail_at {
            anyhow::ensure!(record.level < level, "disk is full");
        }
        self.records.lock().expect("poisoned lock").push(record.clone());
        Ok(())
    }
}
