use anyhow::Result;
use chrono::Local;
use rand::Rng;
use sqlog::utils::format_elapsed;
use sqlog::{Level, Logger, Registry, Section, StdioReporter};
use std::sync::Arc;
use std::time::Duration;

async fn random_sleep() {
    let secs = rand::thread_rng().gen_range(0..=3);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

async fn task(i: u64, logger: Logger, registry: Registry, common: Section) -> Result<()> {
    random_sleep().await;
    logger
        .spawn(format!("<b>Task({})</b>", i), move |section| async move {
            random_sleep().await;
            let num = i * i;
            // lands under Start (the registered stack), the ref ties it to this task
            registry.info(format!("{} ** 2 = {}", i, num), &[&common, &section])?;

            random_sleep().await;
            section.add_header_str(format!(
                "<delim>work time: {}",
                format_elapsed(section.elapsed())
            ))
        })
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let logger = Logger::open("alog/log.sqlog")?;
    let common = logger.section("Common")?;

    let root = Registry::new("root");
    root.set_level(Level::Info);
    root.add_reporter(Arc::new(StdioReporter::new()), Level::Debug);

    let registry = root.child("async-test");
    registry.set_level(Level::Debug);
    registry.add_reporter(Arc::new(logger.clone()), Level::Debug);
    registry.set_propagate(false);

    let start_dt = Local::now().format("%Y-%m-%d %H:%M:%S");
    let start = logger.section(format!("<b>Start</b> {}", start_dt))?;

    let handles = (0..10)
        .map(|i| tokio::spawn(task(i, logger.clone(), registry.clone(), common.clone())))
        .collect::<Vec<_>>();
    for handle in handles {
        handle.await??;
    }

    start.close()?;
    root.info(format!("wrote {}", logger.path().display()), &[])?;
    Ok(())
}
