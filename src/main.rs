use anyhow::Result;
use chrono::Local;
use sqlog::utils::format_elapsed;
use sqlog::{Level, Logger, Registry, SectionOptions, StdioReporter};
use std::sync::Arc;

fn main() -> Result<()> {
    let level = match std::env::var("SQLOG_LEVEL") {
        Ok(level) => level.parse()?,
        Err(_) => Level::Info,
    };

    let logger = Logger::open("log/log.sqlog")?;
    let common = logger.section("Common")?;

    let other = Logger::open("log/other.sqlog")?;
    let other_section = other.section("Other")?;

    let root = Registry::new("root");
    root.set_level(level);
    root.add_reporter(Arc::new(StdioReporter::new()), Level::Debug);

    let registry = root.child("test");
    registry.set_level(Level::Debug);
    registry.add_reporter(Arc::new(logger.clone()), Level::Debug);
    registry.set_propagate(false);

    let start_dt = Local::now().format("%Y-%m-%d %H:%M:%S");
    let start = logger.section_with(
        format!(r#"<b color="red">Start</b> {}"#, start_dt),
        SectionOptions { html: false },
    )?;

    for i in 0..10 {
        let section = logger.section(format!(r#"<b color="green">Task({})</b>"#, i))?;

        let num = i * i;
        registry.info(format!("{} ** 2 = {}", i, num), &[&common, &other_section])?;

        section.add_header_str(format!(
            r#"<delim color="black" bg="yellow"> work time: {}"#,
            format_elapsed(section.elapsed())
        ))?;
        section.close()?;
    }

    start.close()?;
    root.info(format!("wrote {}", logger.path().display()), &[])?;
    Ok(())
}
