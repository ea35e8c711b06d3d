use crate::uniq_id::SectionID;
use thiserror::Error;

/// Violations of the section nesting rules. Returned inside `anyhow::Error`,
/// callers that need to tell them apart use `err.downcast_ref::<StateError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A section opened inside this one, on any stack, is still open.
    #[error("can't close section {id} ({label}): section {open_child} opened inside it is still open")]
    OutOfOrder {
        id: SectionID,
        label: String,
        open_child: SectionID,
    },

    #[error("section {id} ({label}) is already closed")]
    AlreadyClosed { id: SectionID, label: String },

    #[error("can't change header of section {id} ({label}) after it was closed")]
    HeaderAfterClose { id: SectionID, label: String },

    /// The stack was forked from a section that has closed since, so there
    /// is nowhere to nest new sections or records.
    #[error("section {base} this stack was forked from is already closed")]
    ForkBaseClosed { base: SectionID },
}
