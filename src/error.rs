//! Fatal-error taxonomy (spec §7): precondition violations abort the current
//! tool. Hand-written `Display`/`Error` impls per enum, no `thiserror`,
//! matching the teacher's `src/error.rs` texture of source-level error enums
//! plus operation-level wrappers that combine only what they can produce.
//!
//! The one typed error that crosses module boundaries as an *expected*
//! outcome rather than a failure is [`crate::reorder::ReorderStatus`] — it
//! deliberately does not live here and does not implement `Error`.

use std::fmt;
use std::io;

/// Errors raised while loading, building, or serialising a BDD.
#[derive(Debug)]
pub enum BddError {
    Io(io::Error),
    Parse(crate::bdd::io::IoError),
    InvariantViolated(crate::bdd::assert::InvariantViolation),
    /// `bdd-generator` was given neither `--in` nor any call-path positional
    /// arguments.
    NoInput,
}

impl fmt::Display for BddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BddError::Io(e) => write!(f, "I/O error: {e}"),
            BddError::Parse(e) => write!(f, "malformed BDD file: {e}"),
            BddError::InvariantViolated(e) => write!(f, "BDD failed its invariant pass: {e}"),
            BddError::NoInput => write!(f, "no input given: pass --in <path> or at least one call-path file"),
        }
    }
}

impl std::error::Error for BddError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BddError::Io(e) => Some(e),
            BddError::Parse(e) => Some(e),
            BddError::InvariantViolated(e) => Some(e),
            BddError::NoInput => None,
        }
    }
}

impl From<io::Error> for BddError {
    fn from(e: io::Error) -> Self {
        BddError::Io(e)
    }
}

impl From<crate::bdd::io::IoError> for BddError {
    fn from(e: crate::bdd::io::IoError) -> Self {
        BddError::Parse(e)
    }
}

impl From<crate::bdd::assert::InvariantViolation> for BddError {
    fn from(e: crate::bdd::assert::InvariantViolation) -> Self {
        BddError::InvariantViolated(e)
    }
}

/// Errors raised by `bdd-reorderer` applying a user-supplied
/// `(anchor_id, direction, candidate_id)` op list.
#[derive(Debug)]
pub enum ReorderOpError {
    Bdd(BddError),
    UnknownNodeId(crate::bdd::NodeId),
    /// The op's legality check did not return `Valid`; carries the status so
    /// the CLI can report *why* without treating it as a crash.
    NotValid(crate::reorder::ReorderStatus),
}

impl fmt::Display for ReorderOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReorderOpError::Bdd(e) => write!(f, "{e}"),
            ReorderOpError::UnknownNodeId(id) => write!(f, "node id {id} does not exist in this BDD"),
            ReorderOpError::NotValid(status) => write!(f, "reorder op is not legal: {status:?}"),
        }
    }
}

impl std::error::Error for ReorderOpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReorderOpError::Bdd(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BddError> for ReorderOpError {
    fn from(e: BddError) -> Self {
        ReorderOpError::Bdd(e)
    }
}

/// Errors raised by the execution-plan search / `synthesizer` CLI.
#[derive(Debug)]
pub enum SearchError {
    Bdd(BddError),
    /// `synthesizer` was asked to target a platform for which no
    /// [`crate::targets::TargetDef`] was configured.
    NoTargetsConfigured,
    /// The driver loop exhausted its open set without ever completing a
    /// plan: no configured target's generators could claim the BDD's root.
    NoPlanFound,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Bdd(e) => write!(f, "{e}"),
            SearchError::NoTargetsConfigured => write!(f, "no targets configured: pass at least one --target flag"),
            SearchError::NoPlanFound => write!(f, "no configured target could place this BDD's root node"),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::Bdd(e) => Some(e),
            SearchError::NoTargetsConfigured | SearchError::NoPlanFound => None,
        }
    }
}

impl From<BddError> for SearchError {
    fn from(e: BddError) -> Self {
        SearchError::Bdd(e)
    }
}
