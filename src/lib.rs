/*!
# sqlog - hierarchical file logging

**sqlog** writes log records into a file and groups them into nested
`Sections`. A section writes an `open` marker when it is created and a
`close` marker, carrying its final header, when it ends. Headers can be
changed while the section is open, e.g. to add how long the work inside
it took.

Sections on one `Logger` form a strict stack. Concurrent tasks get their
own stack with `Logger::fork` or `Logger::spawn` and still write into the
same file.

Records usually come in through a `Registry`, which filters them by
level and hands them to `Reporters`; a `Logger` is one of them.

Example

```no_run
use sqlog::{Level, Logger, Registry};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let logger = Logger::open("log/log.sqlog")?;
    let common = logger.section("Common")?;

    let registry = Registry::new("test");
    registry.add_reporter(Arc::new(logger.clone()), Level::Debug);

    for i in 0..3 {
        logger.with_section(format!("<b>Task({})</b>", i), |section| {
            registry.info(format!("{} ** 2 = {}", i, i * i), &[&common])?;
            section.add_header_str("<delim>done")
        })?;
    }
    Ok(())
}
```

 */
#![allow(clippy::new_without_default)]

pub mod entry;
pub mod error;
pub mod level;
pub mod logger;
pub mod reader;
pub mod record;
pub mod registry;
pub mod reporters;
pub mod section;
pub mod uniq_id;
pub mod utils;


pub use entry::Entry;
pub use error::StateError;
pub use level::Level;
pub use logger::Logger;
pub use reader::SectionTree;
pub use record::{Record, SectionRef};
pub use registry::Registry;
pub use reporters::{Reporter, StdioReporter, StringReporter};
pub use section::{Section, SectionOptions};
pub use utils::TimestampFormat;
