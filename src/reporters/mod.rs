pub mod text;

use crate::record::Record;
use anyhow::Result;

pub use text::StdioReporter;
pub use text::StringReporter;

/// Output sink a `Registry` hands records to. `Logger` is one, writing
/// into its log file; the text reporters print or capture a flat line.
pub trait Reporter: Send + Sync {
    fn report(&self, record: &Record) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
