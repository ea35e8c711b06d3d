use crate::utils::test_reporter::TestReporter;
use anyhow::Result;
use k9::*;
use sqlog::entry::Entry;
use sqlog::reader::{self, Item};
use sqlog::{Level, Logger, Registry, SectionTree, StringReporter, TimestampFormat};
use std::sync::Arc;
use tempfile::TempDir;

fn setup(dir: &TempDir) -> (Logger, Registry, StringReporter) {
    let logger = Logger::open(dir.path().join("log").join("log.sqlog")).unwrap();
    logger.set_timestamp_format(TimestampFormat::None);

    let root = Registry::new("root");
    let console = StringReporter::new();
    root.add_reporter(Arc::new(console.clone()), Level::Info);
    root.set_level(Level::Info);

    let registry = root.child("test");
    registry.add_reporter(Arc::new(logger.clone()), Level::Debug);
    registry.set_level(Level::Debug);
    registry.set_propagate(false);
    (logger, registry, console)
}

#[test]
fn common_section_test() -> Result<()> {
    let dir = TempDir::new()?;
    let (logger, registry, console) = setup(&dir);
    let common = logger.section("Common")?;

    let i = 2;
    registry.info(format!("i**2={}", i * i), &[&common])?;

    let entries = reader::read_entries(logger.path())?;
    assert_equal!(entries.len(), 2);
    assert!(matches!(&entries[0], Entry::Open(open) if open.label == "Common"));
    match &entries[1] {
        Entry::Record(record) => {
            assert_equal!(record.message, "i**2=4".to_string());
            assert_equal!(record.logger, "root.test".to_string());
            assert_equal!(record.section, Some(common.id()));
            assert_equal!(record.refs.len(), 1);
            assert_equal!(record.refs[0].label, "Common".to_string());
        }
        other => anyhow::bail!("expected a record, got {:?}", other),
    }

    // propagation is off, the console never saw it
    assert_equal!(console.to_string(), String::new());
    Ok(())
}

#[test]
fn propagated_records_test() -> Result<()> {
    let dir = TempDir::new()?;
    let (logger, registry, console) = setup(&dir);
    registry.set_propagate(true);

    logger.with_section("<b>Start</b>", |_| {
        registry.debug("debug only goes to the file", &[])?;
        registry.warning("warning goes everywhere", &[])
    })?;

    assert_equal!(
        console.to_string(),
        "[ ] WARNING root.test: warning goes everywhere\n".to_string()
    );
    let tree = SectionTree::build(&reader::read_entries(logger.path())?)?;
    snapshot!(
        tree.render(),
        "
<b>Start</b>
├ DEBUG root.test: debug only goes to the file
╰ WARNING root.test: warning goes everywhere
"
    );
    Ok(())
}

#[test]
fn reporter_errors_test() -> Result<()> {
    let dir = TempDir::new()?;
    let (logger, registry, _) = setup(&dir);
    let failing = TestReporter::failing_at(Level::Error);
    let after = TestReporter::new();
    registry.add_reporter(Arc::new(failing.clone()), Level::Debug);
    registry.add_reporter(Arc::new(after.clone()), Level::Debug);

    registry.info("fine", &[])?;
    let err = registry.error("boom", &[]).unwrap_err();
    assert_equal!(err.to_string(), "disk is full".to_string());

    // the logger is registered first so the file has both records
    assert_equal!(reader::read_entries(logger.path())?.len(), 2);
    assert_equal!(failing.messages(), vec!["fine".to_string()]);
    assert_equal!(after.messages(), vec!["fine".to_string()]);
    Ok(())
}

#[test]
fn isolated_loggers_test() -> Result<()> {
    let dir = TempDir::new()?;
    let a = Logger::open(dir.path().join("a.sqlog"))?;
    let b = Logger::open(dir.path().join("b.sqlog"))?;

    for i in 0..5 {
        let sa = a.section(format!("a{}", i))?;
        let sb = b.section(format!("b{}", i))?;
        a.log(Level::Info, "in a", &[&sb])?;
        sa.close()?;
        b.log(Level::Info, "in b", &[&sa])?;
        sb.close()?;
    }

    for (logger, prefix) in [(&a, "a"), (&b, "b")] {
        let tree = SectionTree::build(&reader::read_entries(logger.path())?)?;
        assert_equal!(tree.items.len(), 5);
        for node in tree.sections.values() {
            assert!(node.label.starts_with(prefix));
            assert!(node.closed);
            assert!(matches!(node.items.as_slice(), [Item::Record(_)]));
        }
    }
    Ok(())
}

#[test]
fn unterminated_sections_test() -> Result<()> {
    let dir = TempDir::new()?;
    let (logger, registry, _) = setup(&dir);
    let start = logger.section("Start")?;
    let task = logger.section("Task(0)")?;
    registry.info("working", &[])?;

    // nothing closed yet, like a process that died here
    let tree = SectionTree::build(&reader::read_entries(logger.path())?)?;
    assert_equal!(tree.unterminated(), vec![start.id(), task.id()]);
    Ok(())
}
