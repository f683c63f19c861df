//! Container store: typed, attributed datasets in partition files.
//!
//! A container file holds named datasets (dense, ragged, string, or virtual)
//! plus string attributes at the root and dataset level. [`format`] defines
//! the on-disk encoding; [`vstack`] builds no-copy virtual views across
//! partition files.

pub mod format;
pub mod vstack;

pub use format::{Container, ContainerWriter, DatasetMeta, Layout};
pub use vstack::{PathMode, build_virtual};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// String attributes attached to a file root or a dataset.
pub type Attrs = BTreeMap<String, String>;

/// Root attribute naming the producing tool and version.
pub const ATTR_PRODUCER: &str = "producer";
/// Root attribute holding the creation timestamp.
pub const ATTR_CREATION_DATE: &str = "creation_date";
/// Root attribute marking a derived virtual view.
pub const ATTR_VIRTUAL: &str = "virtual";
/// Root attribute listing the basenames a virtual view was built from.
pub const ATTR_SOURCE: &str = "source";
/// Dataset attribute naming the encoder that produced it.
pub const ATTR_PARSER: &str = "parser";
/// Dataset attribute holding the sample rate of an audio field.
pub const ATTR_SAMPLE_RATE: &str = "sample_rate";

/// Element type of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    I16,
    F32,
    F64,
    Str,
}

impl Dtype {
    /// Bytes per element; `None` for variable-width strings.
    pub fn width(&self) -> Option<usize> {
        match self {
            Dtype::I16 => Some(2),
            Dtype::F32 => Some(4),
            Dtype::F64 => Some(8),
            Dtype::Str => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dtype::I16 => "i16",
            Dtype::F32 => "f32",
            Dtype::F64 => "f64",
            Dtype::Str => "str",
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed, contiguous run of elements.
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    I16(Vec<i16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Array {
    pub fn dtype(&self) -> Dtype {
        match self {
            Array::I16(_) => Dtype::I16,
            Array::F32(_) => Dtype::F32,
            Array::F64(_) => Dtype::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Array::I16(v) => v.len(),
            Array::F32(v) => v.len(),
            Array::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the little-endian encoding of every element to `out`.
    pub(crate) fn write_le(&self, out: &mut Vec<u8>) {
        match self {
            Array::I16(v) => v.iter().for_each(|s| out.extend_from_slice(&s.to_le_bytes())),
            Array::F32(v) => v.iter().for_each(|s| out.extend_from_slice(&s.to_le_bytes())),
            Array::F64(v) => v.iter().for_each(|s| out.extend_from_slice(&s.to_le_bytes())),
        }
    }

    /// Decode `bytes` as little-endian elements of `dtype`.
    pub(crate) fn from_le(dtype: Dtype, bytes: &[u8]) -> Option<Array> {
        match dtype {
            Dtype::I16 => Some(Array::I16(
                bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            )),
            Dtype::F32 => Some(Array::F32(
                bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )),
            Dtype::F64 => Some(Array::F64(
                bytes
                    .chunks_exact(8)
                    .map(|b| {
                        f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
                    })
                    .collect(),
            )),
            Dtype::Str => None,
        }
    }

    /// Extract the element sub-range `[start, end)` as a new array.
    pub fn slice(&self, start: usize, end: usize) -> Array {
        match self {
            Array::I16(v) => Array::I16(v[start..end].to_vec()),
            Array::F32(v) => Array::F32(v[start..end].to_vec()),
            Array::F64(v) => Array::F64(v[start..end].to_vec()),
        }
    }

    /// Concatenate same-typed arrays. `None` when types are mixed or the
    /// input is empty.
    pub fn concat(parts: &[Array]) -> Option<Array> {
        let first = parts.first()?;
        let dtype = first.dtype();
        if parts.iter().any(|p| p.dtype() != dtype) {
            return None;
        }
        Some(match dtype {
            Dtype::I16 => Array::I16(
                parts
                    .iter()
                    .flat_map(|p| match p {
                        Array::I16(v) => v.iter().copied(),
                        _ => unreachable!(),
                    })
                    .collect(),
            ),
            Dtype::F32 => Array::F32(
                parts
                    .iter()
                    .flat_map(|p| match p {
                        Array::F32(v) => v.iter().copied(),
                        _ => unreachable!(),
                    })
                    .collect(),
            ),
            Dtype::F64 => Array::F64(
                parts
                    .iter()
                    .flat_map(|p| match p {
                        Array::F64(v) => v.iter().copied(),
                        _ => unreachable!(),
                    })
                    .collect(),
            ),
            Dtype::Str => unreachable!(),
        })
    }
}

/// Reference from a virtual dataset into one source partition: logical rows
/// `[start, end)` of the view map to the whole same-named dataset in `path`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub path: PathBuf,
    pub start: u64,
    pub end: u64,
}

/// Dataset contents.
///
/// Within one partition a field is either uniformly dense or uniformly
/// ragged, never mixed.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Fixed-width elements; element count equals the product of the shape.
    Dense(Array),
    /// One array per row; rows may differ in length. Shape is `(rows,)`.
    Ragged(Vec<Array>),
    /// One UTF-8 string per row. Shape is `(rows,)`.
    Strings(Vec<String>),
    /// No local bytes; rows resolve through ordered segments.
    Virtual(Vec<Segment>),
}

impl Payload {
    /// Storage kind label, for compatibility checks and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Dense(_) => "dense",
            Payload::Ragged(_) => "ragged",
            Payload::Strings(_) => "strings",
            Payload::Virtual(_) => "virtual",
        }
    }
}

/// A named, typed, attributed dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub attrs: Attrs,
    pub payload: Payload,
}

impl Dataset {
    /// Leading-dimension size (row count along axis 0).
    pub fn rows(&self) -> u64 {
        self.shape.first().copied().unwrap_or(0)
    }

    /// A dense 2-D dataset of uniform-length rows.
    pub fn dense_2d(name: impl Into<String>, values: Array, rows: usize, row_len: usize) -> Self {
        debug_assert_eq!(values.len(), rows * row_len);
        Dataset {
            name: name.into(),
            dtype: values.dtype(),
            shape: vec![rows as u64, row_len as u64],
            attrs: Attrs::new(),
            payload: Payload::Dense(values),
        }
    }

    /// A dense 1-D dataset of scalars.
    pub fn dense_1d(name: impl Into<String>, values: Array) -> Self {
        let rows = values.len() as u64;
        Dataset {
            name: name.into(),
            dtype: values.dtype(),
            shape: vec![rows],
            attrs: Attrs::new(),
            payload: Payload::Dense(values),
        }
    }

    /// A ragged dataset of per-row arrays sharing one dtype.
    pub fn ragged(name: impl Into<String>, rows: Vec<Array>, dtype: Dtype) -> Self {
        debug_assert!(rows.iter().all(|r| r.dtype() == dtype));
        Dataset {
            name: name.into(),
            dtype,
            shape: vec![rows.len() as u64],
            attrs: Attrs::new(),
            payload: Payload::Ragged(rows),
        }
    }

    /// A per-row string dataset.
    pub fn strings(name: impl Into<String>, values: Vec<String>) -> Self {
        let rows = values.len() as u64;
        Dataset {
            name: name.into(),
            dtype: Dtype::Str,
            shape: vec![rows],
            attrs: Attrs::new(),
            payload: Payload::Strings(values),
        }
    }

    /// Numeric row `idx` as an owned array. `None` for string or virtual
    /// payloads, or when `idx` is out of range.
    pub fn row(&self, idx: usize) -> Option<Array> {
        match &self.payload {
            Payload::Dense(values) => {
                let rows = self.rows() as usize;
                if idx >= rows {
                    return None;
                }
                let row_len = if self.shape.len() >= 2 {
                    self.shape[1] as usize
                } else {
                    1
                };
                Some(values.slice(idx * row_len, (idx + 1) * row_len))
            }
            Payload::Ragged(rows) => rows.get(idx).cloned(),
            Payload::Strings(_) | Payload::Virtual(_) => None,
        }
    }

    /// String row `idx` for string payloads.
    pub fn string_row(&self, idx: usize) -> Option<&str> {
        match &self.payload {
            Payload::Strings(values) => values.get(idx).map(String::as_str),
            _ => None,
        }
    }
}

/// Render a shape tuple for messages, e.g. `(10, 160)`.
pub fn shape_repr(shape: &[u64]) -> String {
    let dims: Vec<String> = shape.iter().map(u64::to_string).collect();
    format!("({})", dims.join(", "))
}
