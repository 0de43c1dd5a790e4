//! The error taxonomy for this crate.
//!
//! Most of what can go wrong here is a programming error (reusing a
//! destroyed context, setting a future twice) and is reported via `panic!`
//! or `debug_assert!`, exactly as the simulation model treats it: these are
//! not conditions a caller can recover from. The variants below are for the
//! smaller set of failures a caller legitimately needs to handle, namely
//! malformed wire data and a budget-bounded test helper running dry.

use thiserror::Error;

/// Errors surfaced across process boundaries (wire decoding) and by the
/// test-side `await` helper.
#[derive(Error, Debug)]
pub enum PaxosError {
    #[error("unknown message class {0:?} in wire envelope")]
    UnknownMessageClass(String),

    #[error("(de)serialization failure: {0}")]
    Codec(#[from] bincode::Error),

    #[error("await budget of {budget} steps exhausted with no future resolved")]
    AwaitTimeout { budget: usize },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PaxosError>;
