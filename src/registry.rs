use crate::level::Level;
use crate::record::Record;
use crate::reporters::Reporter;
use crate::section::Section;
use anyhow::Result;
use std::sync::{Arc, RwLock};

/// Named, severity-leveled front door for records. A registry hands every
/// record that passes its level to its reporters, each filtered by its own
/// level, and (when `propagate` is on) to the reporters of its ancestors.
///
/// There is no global registry; create one and pass it to whoever logs.
#[derive(Clone)]
pub struct Registry(Arc<RwLock<RegistryInternal>>);

struct RegistryInternal {
    name: String,
    level: Option<Level>,
    reporters: Vec<RegisteredReporter>,
    propagate: bool,
    parent: Option<Registry>,
}

struct RegisteredReporter {
    reporter: Arc<dyn Reporter>,
    level: Level,
}

impl Registry {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_parent(name.into(), None)
    }

    /// Child registry called `<parent name>.<name>`. Propagates to this one
    /// unless told otherwise.
    pub fn child<S: AsRef<str>>(&self, name: S) -> Self {
        let full_name = format!("{}.{}", self.name(), name.as_ref());
        Self::with_parent(full_name, Some(self.clone()))
    }

    fn with_parent(name: String, parent: Option<Registry>) -> Self {
        Self(Arc::new(RwLock::new(RegistryInternal {
            name,
            level: None,
            reporters: vec![],
            propagate: true,
            parent,
        })))
    }

    pub fn name(&self) -> String {
        self.0.read().expect("poisoned lock").name.clone()
    }

    pub fn set_level(&self, level: Level) {
        self.0.write().expect("poisoned lock").level = Some(level);
    }

    /// Own level, or the closest ancestor's, or `Debug` if nobody set one.
    pub fn effective_level(&self) -> Level {
        let internal = self.0.read().expect("poisoned lock");
        match (internal.level, &internal.parent) {
            (Some(level), _) => level,
            (None, Some(parent)) => parent.effective_level(),
            (None, None) => Level::default(),
        }
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.0.write().expect("poisoned lock").propagate = propagate;
    }

    pub fn propagate(&self) -> bool {
        self.0.read().expect("poisoned lock").propagate
    }

    pub fn add_reporter(&self, reporter: Arc<dyn Reporter>, level: Level) {
        self.0
            .write()
            .expect("poisoned lock")
            .reporters
            .push(RegisteredReporter { reporter, level });
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.effective_level()
    }

    pub fn log<M: Into<String>>(&self, level: Level, message: M, refs: &[&Section]) -> Result<()> {
        if !self.is_enabled_for(level) {
            return Ok(());
        }
        let refs = refs.iter().map(|s| s.reference()).collect();
        let record = Record::new(level, self.name(), message, refs);
        self.dispatch(&record)
    }

    /// Hand an already built record to the reporters, bypassing this
    /// registry's own level.
    pub fn dispatch(&self, record: &Record) -> Result<()> {
        let mut current = Some(self.clone());
        while let Some(registry) = current {
            let (reporters, next) = {
                let internal = registry.0.read().expect("poisoned lock");
                let reporters = internal
                    .reporters
                    .iter()
                    .filter(|r| record.level >= r.level)
                    .map(|r| r.reporter.clone())
                    .collect::<Vec<_>>();
                let next = if internal.propagate {
                    internal.parent.clone()
                } else {
                    None
                };
                (reporters, next)
            };

            for reporter in reporters {
                reporter.report(record)?;
            }
            current = next;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let internal = self.0.read().expect("poisoned lock");
        for r in &internal.reporters {
            r.reporter.flush()?;
        }
        Ok(())
    }

    pub fn debug<M: Into<String>>(&self, message: M, refs: &[&Section]) -> Result<()> {
        self.log(Level::Debug, message, refs)
    }

    pub fn info<M: Into<String>>(&self, message: M, refs: &[&Section]) -> Result<()> {
        self.log(Level::Info, message, refs)
    }

    pub fn warning<M: Into<String>>(&self, message: M, refs: &[&Section]) -> Result<()> {
        self.log(Level::Warning, message, refs)
    }

    pub fn error<M: Into<String>>(&self, message: M, refs: &[&Section]) -> Result<()> {
        self.log(Level::Error, message, refs)
    }

    pub fn critical<M: Into<String>>(&self, message: M, refs: &[&Section]) -> Result<()> {
        self.log(Level::Critical, message, refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::StringReporter;
    use k9::*;

    fn setup() -> (Registry, Registry, StringReporter, StringReporter) {
        let root = Registry::new("root");
        let root_out = StringReporter::new();
        root.add_reporter(Arc::new(root_out.clone()), Level::Info);

        let test = root.child("test");
        let test_out = StringReporter::new();
        test.add_reporter(Arc::new(test_out.clone()), Level::Debug);
        (root, test, root_out, test_out)
    }

    #[test]
    fn propagation() -> Result<()> {
        let (root, test, root_out, test_out) = setup();
        root.set_level(Level::Info);
        test.set_level(Level::Debug);
        assert_equal!(test.name(), "root.test".to_string());

        test.debug("only mine", &[])?;
        test.info("both", &[])?;
        test.set_propagate(false);
        test.warning("mine again", &[])?;

        snapshot!(
            test_out.to_string(),
            "
[ ] DEBUG root.test: only mine
[ ] INFO root.test: both
[ ] WARNING root.test: mine again

"
        );
        assert_equal!(root_out.to_string(), "[ ] INFO root.test: both\n".to_string());
        Ok(())
    }

    #[test]
    fn levels() {
        let (root, test, _, test_out) = setup();
        assert_equal!(test.effective_level(), Level::Debug);
        root.set_level(Level::Error);
        assert_equal!(test.effective_level(), Level::Error);
        assert!(!test.is_enabled_for(Level::Warning));

        test.warning("dropped", &[]).unwrap();
        test.critical("kept", &[]).unwrap();
        assert_equal!(test_out.to_string(), "[ ] CRITICAL root.test: kept\n".to_string());
    }
}
