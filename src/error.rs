// Error taxonomy for the records core. One enum per concern; the store and
// domain raise, the gate translates, the menu layer decides what is fatal.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Role;

/// Errors raised by the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The document file exists but is not valid JSON. Fatal: surfaced to the
    /// operator, never auto-repaired.
    #[error("records document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("records I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the action gate before the wrapped operation runs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GateError {
    #[error("no authenticated session")]
    AuthRequired,

    #[error("role {actual} may not perform {operation}")]
    RoleForbidden { operation: String, actual: Role },
}

/// What a gated operation can fail with: a pre-check denial, a storage
/// failure, or bad input. Audit-write failures never appear here.
#[derive(Error, Debug)]
pub enum OpError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Recoverable input problems. The menu layer re-prompts on these.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid score: {0}")]
    BadScore(String),

    #[error("score {0} out of range (expected 0-100)")]
    ScoreOutOfRange(String),

    #[error("username already taken: {0}")]
    DuplicateUser(String),

    #[error("subject code already taken: {0}")]
    DuplicateSubject(String),

    #[error("no such user: {0}")]
    UnknownUser(String),

    #[error("no such subject: {0}")]
    UnknownSubject(String),

    #[error("{0} is not a student")]
    NotAStudent(String),

    #[error("{0} is not a teacher")]
    NotATeacher(String),

    #[error("teacher {teacher} is not assigned to {subject}")]
    NotAssigned { teacher: String, subject: String },

    #[error("{0:?} is not a valid role")]
    BadRole(String),
}
