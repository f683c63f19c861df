//! List-family encoders: cells are bracketed numeric literals like
//! `[1, 2, 3]`. A batch-wide length scan picks dense 2-D layout when every
//! row has the same element count, ragged otherwise.

use super::{EncodeRequest, FieldEncoder};
use crate::store::{ATTR_PARSER, Array, Dataset, Dtype};
use anyhow::Result;
use std::str::FromStr;

#[derive(Debug)]
pub struct ListEncoder {
    name: &'static str,
    dtype: Dtype,
}

pub static LIST_I16: ListEncoder = ListEncoder {
    name: "list_i16",
    dtype: Dtype::I16,
};
pub static LIST_F32: ListEncoder = ListEncoder {
    name: "list_f32",
    dtype: Dtype::F32,
};
pub static LIST_F64: ListEncoder = ListEncoder {
    name: "list_f64",
    dtype: Dtype::F64,
};

/// Parse one bracketed literal into elements. Brackets are optional; an
/// empty literal is an empty row.
fn parse_cell<T: FromStr>(cell: &str) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    let inner = cell
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|tok| {
            tok.trim()
                .parse::<T>()
                .map_err(|e| format!("cannot parse element '{}': {e}", tok.trim()))
        })
        .collect()
}

fn parse_rows<T: FromStr>(req: &EncodeRequest<'_>) -> Result<Vec<Vec<T>>>
where
    T::Err: std::fmt::Display,
{
    let mut rows = Vec::with_capacity(req.values.len());
    for (i, cell) in req.values.iter().enumerate() {
        let row =
            parse_cell::<T>(cell).map_err(|e| req.encoding_error(format!("row {i}: {e}")))?;
        rows.push(row);
        req.progress.advance(req.partition, req.field, 1);
    }
    Ok(rows)
}

impl FieldEncoder for ListEncoder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, req: &EncodeRequest<'_>) -> Result<Vec<Dataset>> {
        let rows: Vec<Array> = match self.dtype {
            Dtype::I16 => parse_rows::<i16>(req)?.into_iter().map(Array::I16).collect(),
            Dtype::F32 => parse_rows::<f32>(req)?.into_iter().map(Array::F32).collect(),
            Dtype::F64 => parse_rows::<f64>(req)?.into_iter().map(Array::F64).collect(),
            Dtype::Str => unreachable!("list encoders never target str"),
        };

        let uniform_len = rows
            .first()
            .map(Array::len)
            .filter(|&l| rows.iter().all(|r| r.len() == l));

        let mut data = match uniform_len {
            Some(row_len) => {
                let n = rows.len();
                let values = Array::concat(&rows)
                    .ok_or_else(|| req.encoding_error("empty row range"))?;
                Dataset::dense_2d(req.field, values, n, row_len)
            }
            None => Dataset::ragged(req.field, rows, self.dtype),
        };
        data.attrs
            .insert(ATTR_PARSER.to_string(), self.name.to_string());
        Ok(vec![data])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bracketed_and_bare_literals() {
        assert_eq!(parse_cell::<i16>("[1, 2, 3]").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_cell::<i16>("4,5").unwrap(), vec![4, 5]);
        assert_eq!(parse_cell::<f32>("[]").unwrap(), Vec::<f32>::new());
        assert!(parse_cell::<i16>("[1, x]").is_err());
    }
}
