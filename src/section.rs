use crate::error::StateError;
use crate::level::Level;
use crate::logger::{CloseMode, Logger};
use crate::record::SectionRef;
use crate::uniq_id::SectionID;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Clone, Copy, Debug)]
pub struct SectionOptions {
    /// Keep the label as HTML. When false it's escaped and shows up as
    /// plain text.
    pub html: bool,
}

impl Default for SectionOptions {
    fn default() -> Self {
        Self { html: true }
    }
}

/// Handle to an open section. Clones point at the same section; the
/// section closes when [`Section::close`] is called or the last clone goes
/// out of scope. A section dropped while sections opened inside it are still
/// open gets its closing marker once the last of them closes. Closing on drop
/// can't report errors, call `close()` to see them.
#[derive(Clone)]
pub struct Section(Arc<SectionData>);

struct SectionData {
    id: SectionID,
    label: String,
    opened_at: SystemTime,
    logger: Logger,
    state: Mutex<SectionState>,
}

struct SectionState {
    header: String,
    closed: bool,
}

impl Section {
    pub(crate) fn new(id: SectionID, label: String, opened_at: SystemTime, logger: Logger) -> Self {
        Self(Arc::new(SectionData {
            id,
            state: Mutex::new(SectionState {
                header: label.clone(),
                closed: false,
            }),
            label,
            opened_at,
            logger,
        }))
    }

    pub fn id(&self) -> SectionID {
        self.0.id
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// The stack this section was opened on. Sections opened through it
    /// nest inside this one while it's open.
    pub fn logger(&self) -> &Logger {
        &self.0.logger
    }

    pub fn header(&self) -> String {
        self.0.state.lock().expect("poisoned lock").header.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.0.state.lock().expect("poisoned lock").closed
    }

    pub fn elapsed(&self) -> Duration {
        self.0.opened_at.elapsed().unwrap_or_default()
    }

    /// Replace the header that gets written when the section closes.
    pub fn set_header<S: Into<String>>(&self, header: S) -> Result<()> {
        self.with_open_state(|state| state.header = header.into())
    }

    /// Append to the header, e.g. `<delim>work time: 1.2s`.
    pub fn add_header_str<S: AsRef<str>>(&self, text: S) -> Result<()> {
        self.with_open_state(|state| state.header.push_str(text.as_ref()))
    }

    /// Write the closing marker with the final header. Fails if a section
    /// opened inside this one (on this or a forked stack) is still open, or
    /// if this one was closed already; nothing is written in either case.
    pub fn close(&self) -> Result<()> {
        let mut state = self.0.state.lock().expect("poisoned lock");
        if state.closed {
            return Err(StateError::AlreadyClosed {
                id: self.0.id,
                label: self.0.label.clone(),
            }
            .into());
        }
        self.0
            .logger
            .close_section(
                self.0.id,
                &self.0.label,
                &state.header,
                self.0.opened_at,
                CloseMode::Now,
            )?;
        state.closed = true;
        Ok(())
    }

    /// Log into this section's stack (nested in this section while it's open).
    pub fn log<M: Into<String>>(&self, level: Level, message: M, refs: &[&Section]) -> Result<()> {
        self.0.logger.log(level, message, refs)
    }

    pub fn reference(&self) -> SectionRef {
        SectionRef {
            owner: self.0.logger.id(),
            path: self.0.logger.path().to_path_buf(),
            id: self.0.id,
            label: self.0.label.clone(),
        }
    }

    fn with_open_state<F: FnOnce(&mut SectionState)>(&self, f: F) -> Result<()> {
        let mut state = self.0.state.lock().expect("poisoned lock");
        if state.closed {
            return Err(StateError::HeaderAfterClose {
                id: self.0.id,
                label: self.0.label.clone(),
            }
            .into());
        }
        f(&mut state);
        Ok(())
    }
}

impl From<&Section> for SectionRef {
    fn from(section: &Section) -> Self {
        section.reference()
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("id", &self.0.id)
            .field("label", &self.0.label)
            .finish()
    }
}

impl Drop for SectionData {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else {
            return;
        };
        if !state.closed {
            self.logger
                .close_section(
                    self.id,
                    &self.label,
                    &state.header,
                    self.opened_at,
                    CloseMode::AfterChildren,
                )
                .ok();
        }
    }
}
