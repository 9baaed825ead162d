use std::io;

use thiserror::Error;

/// Error returned by this crate's public entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// A [`crate::config::ParserOptions`] field was out of its allowed range.
    #[error("option out of range: {field} = {value}")]
    OptionOutOfRange { field: &'static str, value: i64 },

    /// The requested input buffer size is too small to be useful.
    #[error("buffer too small: requested={requested}, minimum={minimum}")]
    BufferTooSmall { requested: usize, minimum: usize },

    /// An externally-constructed [`crate::matrix::CellMatrix`] violated one of
    /// its structural invariants.
    #[error("inconsistent matrix: {reason}")]
    Inconsistent { reason: String },

    /// The wire format's version byte did not match any version this crate
    /// understands.
    #[error("unknown wire format version: {found}")]
    UnknownVersion { found: u8 },

    /// The underlying byte source failed.
    #[error(transparent)]
    SourceFailure(#[from] io::Error),
}
