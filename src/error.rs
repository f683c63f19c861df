//! Error taxonomy for packing, validation, and concatenation failures.
//!
//! Most library functions return `anyhow::Result` and attach path/field
//! context as they propagate (see the crate-level docs). The variants below
//! carry the failures callers are expected to distinguish programmatically:
//! configuration problems abort before any work starts, validation and
//! encoding errors abort a run, and compatibility errors abort a virtual
//! build before its output file is written. Use
//! `err.downcast_ref::<PackError>()` to match on them.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the packing pipeline.
#[derive(Debug, Error)]
pub enum PackError {
    /// Bad partition count, missing spec keys, malformed attrs, and other
    /// problems with user-provided configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No encoder is registered for the given column type / parser pair.
    #[error("unknown parser '{parser}' for {column_type} column '{column}'")]
    UnknownParser {
        parser: String,
        column_type: &'static str,
        column: String,
    },

    /// An audio file has more than one channel.
    #[error("only mono audio is supported but '{}' has {channels} channel(s)", path.display())]
    ChannelCount { path: PathBuf, channels: u16 },

    /// An audio file's sample rate disagrees with the rate established by
    /// the first file seen for the same field.
    #[error(
        "all files of a field must share one sample rate: expected {expected} Hz \
         but '{}' has {found} Hz", path.display()
    )]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// A field failed its validation phase. Validation runs before any
    /// output file is created; the first violation wins.
    #[error("validation of field '{field}' failed: {reason}")]
    Validation { field: String, reason: String },

    /// A source value could not be encoded while writing a partition.
    #[error("encoding field '{field}' in partition #{partition} failed: {reason}")]
    Encoding {
        field: String,
        partition: usize,
        reason: String,
    },

    /// Same-named fields across partitions disagree on dtype or trailing
    /// dimensions, so they cannot be concatenated along axis 0.
    #[error("field '{field}' is incompatible across partitions: {reason}")]
    IncompatibleField { field: String, reason: String },

    /// A file handed to the virtual builder is missing or not a container.
    #[error("invalid partition file '{}'", path.display())]
    InvalidPartition { path: PathBuf },

    /// An output file already exists and overwriting was not requested.
    #[error("file '{}' already exists (pass overwrite to replace it)", path.display())]
    FileExists { path: PathBuf },
}

impl PackError {
    /// Shorthand for a [`PackError::Config`] with a formatted message.
    pub fn config(msg: impl Into<String>) -> Self {
        PackError::Config(msg.into())
    }
}
