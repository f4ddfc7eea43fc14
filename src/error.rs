//! The Rust-API-boundary error type. MOO-level failures stay as
//! [`crate::value::ErrorCode`] values flowing through the VM; this enum is
//! for the layer above a running task — loading a database, compiling a
//! verb from the command line, binding a listener — where a `Result` that
//! bubbles up to `main` is the idiomatic shape rather than an in-language
//! `ERR` value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoorError {
    #[error("database codec: {0}")]
    Textdump(#[from] crate::textdump::ReadError),
    #[error("database write: {0}")]
    Dump(#[from] crate::textdump::DumpError),
    #[error("compile error: {0}")]
    Compile(#[from] crate::compiler::ParseError),
    #[error("object store: {0}")]
    Store(#[from] crate::objstore::StoreError),
    #[error("config: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type MoorResult<T> = Result<T, MoorError>;
