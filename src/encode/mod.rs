//! Field encoders: one strategy per `(column type, parser name)` pair.
//!
//! An encoder consumes one partition's row slice of one source column and
//! produces finished container datasets (the data itself, plus companions
//! such as the per-row filename dataset for audio fields). The mapping from
//! parser names to encoders is a compile-time `match` in [`lookup`]; there is
//! no runtime registration.

pub mod audio;
pub mod list;
pub mod scalar;

use crate::error::PackError;
use crate::progress::ProgressSink;
use crate::store::Dataset;
use crate::table::ColumnType;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// One field-encode call: a row slice of one column, bound for one partition.
pub struct EncodeRequest<'a> {
    /// Partition ordinal, for progress reporting and error context.
    pub partition: usize,
    /// Output field name.
    pub field: &'a str,
    /// The column cells within this partition's row range.
    pub values: &'a [String],
    /// Directory against which relative file paths in cells resolve.
    pub root_dir: &'a Path,
    /// Optional `parser_args` from the field spec.
    pub args: &'a BTreeMap<String, String>,
    /// Per-row progress reporting.
    pub progress: &'a ProgressSink,
}

impl EncodeRequest<'_> {
    /// Wrap a cell-level failure as an encoding error naming this call.
    pub(crate) fn encoding_error(&self, reason: impl Into<String>) -> anyhow::Error {
        PackError::Encoding {
            field: self.field.to_string(),
            partition: self.partition,
            reason: reason.into(),
        }
        .into()
    }
}

/// A typed encoder for one parser name.
pub trait FieldEncoder: Send + Sync + std::fmt::Debug {
    /// Parser name as written in field specs and stored in the `parser`
    /// dataset attribute.
    fn name(&self) -> &'static str;

    /// Encode the request's row slice into one or more finished datasets.
    fn encode(&self, req: &EncodeRequest<'_>) -> Result<Vec<Dataset>>;
}

/// Resolve the encoder for a source column type and parser name.
///
/// # Errors
/// Returns [`PackError::UnknownParser`] when no encoder matches the pair;
/// a numeric parser on a string column (or vice versa) is unknown, not a
/// cast.
pub fn lookup(
    column_type: ColumnType,
    column: &str,
    parser: &str,
) -> Result<&'static dyn FieldEncoder> {
    use ColumnType::*;

    let encoder: Option<&'static dyn FieldEncoder> = match (column_type, parser) {
        // Audio fields reference files by path, so the column reads as text.
        (Str, "audio_i16") => Some(&audio::AUDIO_I16),
        (Str, "audio_f32") => Some(&audio::AUDIO_F32),
        (Str, "audio_f64") => Some(&audio::AUDIO_F64),

        (Int, "i16") => Some(&scalar::SCALAR_I16),
        (Int | Float, "f32") => Some(&scalar::SCALAR_F32),
        (Int | Float, "f64") => Some(&scalar::SCALAR_F64),
        (Str, "utf8") => Some(&scalar::UTF8),

        (Str, "list_i16") => Some(&list::LIST_I16),
        (Str, "list_f32") => Some(&list::LIST_F32),
        (Str, "list_f64") => Some(&list::LIST_F64),

        _ => None,
    };

    encoder.ok_or_else(|| {
        PackError::UnknownParser {
            parser: parser.to_string(),
            column_type: column_type.name(),
            column: column.to_string(),
        }
        .into()
    })
}
