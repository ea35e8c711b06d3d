use crate::entry::{CloseEntry, Entry, OpenEntry, RecordEntry, RefEntry};
use crate::error::StateError;
use crate::level::Level;
use crate::record::{Record, SectionRef, ROOT_LOGGER_NAME};
use crate::reporters::Reporter;
use crate::section::{Section, SectionOptions};
use crate::uniq_id::{LoggerID, SectionID};
use crate::utils::{self, TimestampFormat};
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::SystemTime;

/// Writes records into a file, grouped by nested sections.
///
/// A `Logger` is a cheap handle: clones share the output file *and* the
/// nesting stack. Sections must close in the reverse order they were
/// opened on a stack, so tasks that run concurrently should each get their
/// own stack with [`Logger::fork`] (or [`Logger::spawn`]), otherwise their
/// section boundaries interleave and closing fails with [`StateError`].
/// A section can't close while anything opened inside it is open, no matter
/// which stack that was opened on.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<LoggerShared>,
    stack: Arc<StackHandle>,
}

struct LoggerShared {
    id: LoggerID,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    next_section_id: AtomicU64,
    next_stack_id: AtomicU64,
    timestamp_format: RwLock<TimestampFormat>,
    nesting: Mutex<Nesting>,
}

type StackID = u64;

/// Open sections of one file across all of its stacks.
#[derive(Default)]
struct Nesting {
    stacks: HashMap<StackID, Stack>,
    sections: HashMap<SectionID, OpenSection>,
}

#[derive(Default)]
struct Stack {
    /// Section the stack was forked from. Not closable through this stack.
    base: Option<SectionID>,
    open: Vec<SectionID>,
    /// Every handle is gone, remove once the last pending close is written.
    orphaned: bool,
}

struct OpenSection {
    stack: StackID,
    parent: Option<SectionID>,
    /// Open sections nested directly in this one, from any stack.
    children: BTreeSet<SectionID>,
    /// Set when the last handle was dropped while children were still open.
    pending: Option<PendingClose>,
}

struct PendingClose {
    header: String,
    opened_at: SystemTime,
}

/// Removes the stack from [`Nesting`] when the last `Logger` clone using it
/// goes away.
struct StackHandle {
    id: StackID,
    shared: Arc<LoggerShared>,
}

/// What to do when closing a section that still has open sections inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CloseMode {
    /// Fail with [`StateError::OutOfOrder`].
    Now,
    /// Write the close marker after the last of them closes.
    AfterChildren,
}

impl Nesting {
    /// Section that new sections and records on `stack` go into.
    fn current(&self, stack: StackID) -> Result<Option<SectionID>> {
        let stack = self.stacks.get(&stack).context("logger stack was removed")?;
        if let Some(top) = stack.open.last() {
            return Ok(Some(*top));
        }
        match stack.base {
            Some(base) if !self.sections.contains_key(&base) => {
                Err(StateError::ForkBaseClosed { base }.into())
            }
            base => Ok(base),
        }
    }

    fn push(&mut self, stack: StackID, id: SectionID, parent: Option<SectionID>) {
        if let Some(open) = self.stacks.get_mut(&stack) {
            open.open.push(id);
        }
        if let Some(parent) = parent.and_then(|parent| self.sections.get_mut(&parent)) {
            parent.children.insert(id);
        }
        self.sections.insert(
            id,
            OpenSection {
                stack,
                parent,
                children: BTreeSet::new(),
                pending: None,
            },
        );
    }

    /// Forget a closed section. Returns its parent.
    fn remove(&mut self, id: SectionID) -> Option<SectionID> {
        let section = self.sections.remove(&id)?;
        let drop_stack = match self.stacks.get_mut(&section.stack) {
            Some(stack) => {
                stack.open.retain(|open| *open != id);
                stack.orphaned && stack.open.is_empty()
            }
            None => false,
        };
        if drop_stack {
            self.stacks.remove(&section.stack);
        }
        if let Some(parent) = section.parent.and_then(|parent| self.sections.get_mut(&parent)) {
            parent.children.remove(&id);
        }
        section.parent
    }

    /// Pending close of `id`, if it was waiting only for its last child.
    fn take_ready(&mut self, id: SectionID) -> Option<PendingClose> {
        let section = self.sections.get_mut(&id)?;
        if section.children.is_empty() {
            section.pending.take()
        } else {
            None
        }
    }
}

impl Logger {
    /// Create (or truncate) the log file at `path`, creating missing parent
    /// directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        let mut nesting = Nesting::default();
        nesting.stacks.insert(0, Stack::default());
        let shared = Arc::new(LoggerShared {
            id: LoggerID::new(),
            path,
            writer: Mutex::new(BufWriter::new(file)),
            next_section_id: AtomicU64::new(1),
            next_stack_id: AtomicU64::new(1),
            timestamp_format: RwLock::new(TimestampFormat::Local),
            nesting: Mutex::new(nesting),
        });
        Ok(Self {
            stack: Arc::new(StackHandle {
                id: 0,
                shared: shared.clone(),
            }),
            shared,
        })
    }

    pub fn id(&self) -> LoggerID {
        self.shared.id
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Applies to every stack writing into this file.
    pub fn set_timestamp_format(&self, format: TimestampFormat) {
        *self.shared.timestamp_format.write().expect("poisoned lock") = format;
    }

    pub fn timestamp_format(&self) -> TimestampFormat {
        *self.shared.timestamp_format.read().expect("poisoned lock")
    }

    /// New handle writing into the same file with its own, empty nesting
    /// stack. Sections opened through it become children of this handle's
    /// current section, which then can't close before they do. Once that
    /// section is closed the fork can't open sections or write records.
    pub fn fork(&self) -> Self {
        let mut nesting = self.shared.lock_nesting();
        let base = nesting
            .stacks
            .get(&self.stack.id)
            .and_then(|stack| stack.open.last().copied().or(stack.base));
        let id = self.shared.next_stack_id.fetch_add(1, Ordering::SeqCst);
        nesting.stacks.insert(
            id,
            Stack {
                base,
                ..Stack::default()
            },
        );
        drop(nesting);

        Self {
            shared: self.shared.clone(),
            stack: Arc::new(StackHandle {
                id,
                shared: self.shared.clone(),
            }),
        }
    }

    /// Innermost open section of this stack (or the section it was forked
    /// from, while that one is open).
    pub fn current_section(&self) -> Option<SectionID> {
        self.shared
            .lock_nesting()
            .current(self.stack.id)
            .ok()
            .flatten()
    }

    /// Number of sections open on this stack.
    pub fn depth(&self) -> usize {
        self.shared
            .lock_nesting()
            .stacks
            .get(&self.stack.id)
            .map_or(0, |stack| stack.open.len())
    }

    pub fn section<S: Into<String>>(&self, label: S) -> Result<Section> {
        self.section_with(label, SectionOptions::default())
    }

    /// Open a section nested in the current one. It stays open until
    /// [`Section::close`] is called or the last clone of the handle is
    /// dropped.
    pub fn section_with<S: Into<String>>(&self, label: S, options: SectionOptions) -> Result<Section> {
        let label = label.into();
        let label = if options.html {
            label
        } else {
            utils::escape_html(&label)
        };

        let mut nesting = self.shared.lock_nesting();
        let parent = nesting.current(self.stack.id)?;
        let id = self.shared.next_section_id.fetch_add(1, Ordering::SeqCst);
        let opened_at = SystemTime::now();
        self.shared.write(&Entry::Open(OpenEntry {
            ts: self.shared.timestamp(opened_at),
            id,
            parent,
            label: label.clone(),
        }))?;
        nesting.push(self.stack.id, id, parent);
        drop(nesting);

        Ok(Section::new(id, label, opened_at, self.clone()))
    }
    /// Run `f` inside a new section and close it afterwards. Errors coming
    /// out of `f` get the section label attached as context.
    pub fn with_section<S, F, T>(&self, label: S, f: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce(&Section) -> Result<T>,
    {
        let section = self.section(label)?;
        let result = f(&section).with_context(|| format!("[Section] {}", section.label()));
        let closed = section.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Run `f` on a separate tokio task inside a new section that lives on
    /// its own forked stack, so any number of these can run at the same
    /// time against one file.
    pub async fn spawn<S, F, FT, T>(&self, label: S, f: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce(Section) -> FT,
        FT: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let section = self.fork().section(label)?;
        let result = tokio::spawn(f(section.clone()))
            .await
            .context("section task did not finish")
            .and_then(|r| r)
            .with_context(|| format!("[Section] {}", section.label()));
        let closed = section.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Write a record into the current section of this stack.
    pub fn log<M: Into<String>>(&self, level: Level, message: M, refs: &[&Section]) -> Result<()> {
        let refs = refs.iter().map(|s| s.reference()).collect();
        self.write_record(&Record::new(level, ROOT_LOGGER_NAME, message, refs))
    }

    pub fn write_record(&self, record: &Record) -> Result<()> {
        let nesting = self.shared.lock_nesting();
        let section = nesting.current(self.stack.id)?;
        self.shared.write(&Entry::Record(RecordEntry {
            ts: self.shared.timestamp(record.created_at),
            section,
            level: record.level,
            logger: record.logger.clone(),
            message: record.message.clone(),
            refs: record.refs.iter().map(|r| self.ref_entry(r)).collect(),
        }))
    }

    pub fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Close `id` if nothing opened inside it is still open. With
    /// [`CloseMode::AfterChildren`] an open child doesn't fail the close, the
    /// marker is written as soon as the last child closes.
    pub(crate) fn close_section(
        &self,
        id: SectionID,
        label: &str,
        header: &str,
        opened_at: SystemTime,
        mode: CloseMode,
    ) -> Result<()> {
        let mut nesting = self.shared.lock_nesting();
        let section = match nesting.sections.get_mut(&id) {
            Some(section) if section.pending.is_none() => section,
            _ => {
                return Err(StateError::AlreadyClosed {
                    id,
                    label: label.to_string(),
                }
                .into());
            }
        };
        if let Some(open_child) = section.children.iter().next().copied() {
            return match mode {
                CloseMode::Now => Err(StateError::OutOfOrder {
                    id,
                    label: label.to_string(),
                    open_child,
                }
                .into()),
                CloseMode::AfterChildren => {
                    section.pending = Some(PendingClose {
                        header: header.to_string(),
                        opened_at,
                    });
                    Ok(())
                }
            };
        }

        // A section without open children is on top of its stack.
        let mut next = Some((id, header.to_string(), opened_at));
        while let Some((id, header, opened_at)) = next.take() {
            self.shared.write_close(id, header, opened_at)?;
            next = match nesting.remove(id) {
                Some(parent) => nesting
                    .take_ready(parent)
                    .map(|pending| (parent, pending.header, pending.opened_at)),
                None => None,
            };
        }
        Ok(())
    }

    fn ref_entry(&self, section_ref: &SectionRef) -> RefEntry {
        let file = if section_ref.owner == self.shared.id {
            None
        } else {
            Some(section_ref.path.display().to_string())
        };
        RefEntry {
            id: section_ref.id,
            label: section_ref.label.clone(),
            file,
        }
    }
}

impl LoggerShared {
    fn timestamp(&self, at: SystemTime) -> Option<String> {
        let format = *self.timestamp_format.read().expect("poisoned lock");
        utils::file_timestamp(at, format)
    }

    /// One entry per line, flushed right away so the file is readable while
    /// the process is still running.
    fn write(&self, entry: &Entry) -> Result<()> {
        let line = entry.to_json_line()?;
        let mut writer = self.writer.lock().expect("poisoned lock");
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to write to log file {}", self.path.display()))
    }

    fn write_close(&self, id: SectionID, header: String, opened_at: SystemTime) -> Result<()> {
        let closed_at = SystemTime::now();
        let format = *self.timestamp_format.read().expect("poisoned lock");
        let elapsed_ms = if utils::has_clock(format) {
            closed_at
                .duration_since(opened_at)
                .ok()
                .map(|d| d.as_millis() as u64)
        } else {
            None
        };
        self.write(&Entry::Close(CloseEntry {
            ts: utils::file_timestamp(closed_at, format),
            id,
            header,
            elapsed_ms,
        }))
    }

    fn lock_nesting(&self) -> MutexGuard<'_, Nesting> {
        self.nesting.lock().expect("poisoned lock")
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().expect("poisoned lock");
        writer
            .flush()
            .with_context(|| format!("failed to flush log file {}", self.path.display()))
    }
}

impl Drop for LoggerShared {
    fn drop(&mut self) {
        self.flush().ok();
    }
}

impl Drop for StackHandle {
    fn drop(&mut self) {
        let Ok(mut nesting) = self.shared.nesting.lock() else {
            return;
        };
        let remove = match nesting.stacks.get_mut(&self.id) {
            Some(stack) => {
                stack.orphaned = true;
                stack.open.is_empty()
            }
            None => false,
        };
        if remove {
            nesting.stacks.remove(&self.id);
        }
    }
}

/// Records reported through a [`crate::Registry`] go into the current section
/// of the stack this handle was registered with, not the caller's. From a
/// forked stack, pass the section as a ref or log with [`Section::log`].
impl Reporter for Logger {
    fn report(&self, record: &Record) -> Result<()> {
        self.write_record(record)
    }

    fn flush(&self) -> Result<()> {
        Logger::flush(self)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("id", &self.shared.id)
            .field("path", &self.shared.path)
            .finish()
    }
}
