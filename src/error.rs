//! Error types for the join pipeline.

use std::collections::TryReserveError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal: the first one aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("allocation failed while growing {what}: {source}")]
    Alloc {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("malformed input at line {line}: {reason}")]
    Malformed { line: usize, reason: MalformedReason },

    #[error("buffer of {len} bytes exceeds the 4 GiB span limit")]
    BufferTooLarge { len: usize },

    #[error("invalid join plan at stage {stage}: {reason}")]
    InvalidPlan { stage: usize, reason: String },

    #[error("failed writing output: {0}")]
    Output(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn alloc(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| Error::Alloc { what, source }
    }

    pub(crate) fn plan(stage: usize, reason: impl Into<String>) -> Self {
        Error::InvalidPlan {
            stage,
            reason: reason.into(),
        }
    }
}

/// Why a row was rejected by the tokenizer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MalformedReason {
    /// The last row is not terminated by `\n`.
    MissingTerminator,
    /// A row does not consist of exactly two fields.
    FieldCount,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingTerminator => f.write_str("row is not newline-terminated"),
            MalformedReason::FieldCount => f.write_str("row does not have exactly two fields"),
        }
    }
}
