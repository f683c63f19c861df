//! Scalar-family encoders: one fixed-width value (or one string) per row,
//! written directly at its row index. No length scanning is involved.

use super::{EncodeRequest, FieldEncoder};
use crate::store::{ATTR_PARSER, Array, Dataset, Dtype};
use anyhow::Result;
use std::str::FromStr;

#[derive(Debug)]
pub struct ScalarEncoder {
    name: &'static str,
    dtype: Dtype,
}

pub static SCALAR_I16: ScalarEncoder = ScalarEncoder {
    name: "i16",
    dtype: Dtype::I16,
};
pub static SCALAR_F32: ScalarEncoder = ScalarEncoder {
    name: "f32",
    dtype: Dtype::F32,
};
pub static SCALAR_F64: ScalarEncoder = ScalarEncoder {
    name: "f64",
    dtype: Dtype::F64,
};

fn parse_all<T: FromStr>(req: &EncodeRequest<'_>) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    let mut out = Vec::with_capacity(req.values.len());
    for (i, cell) in req.values.iter().enumerate() {
        let v = cell.trim().parse::<T>().map_err(|e| {
            req.encoding_error(format!("row {i}: cannot parse '{cell}': {e}"))
        })?;
        out.push(v);
        req.progress.advance(req.partition, req.field, 1);
    }
    Ok(out)
}

impl FieldEncoder for ScalarEncoder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, req: &EncodeRequest<'_>) -> Result<Vec<Dataset>> {
        let values = match self.dtype {
            Dtype::I16 => Array::I16(parse_all::<i16>(req)?),
            Dtype::F32 => Array::F32(parse_all::<f32>(req)?),
            Dtype::F64 => Array::F64(parse_all::<f64>(req)?),
            Dtype::Str => unreachable!("scalar numeric encoders never target str"),
        };
        let mut data = Dataset::dense_1d(req.field, values);
        data.attrs
            .insert(ATTR_PARSER.to_string(), self.name.to_string());
        Ok(vec![data])
    }
}

/// UTF-8 string encoder: cells pass through unchanged.
#[derive(Debug)]
pub struct Utf8Encoder;

pub static UTF8: Utf8Encoder = Utf8Encoder;

impl FieldEncoder for Utf8Encoder {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn encode(&self, req: &EncodeRequest<'_>) -> Result<Vec<Dataset>> {
        let mut data = Dataset::strings(req.field, req.values.to_vec());
        data.attrs
            .insert(ATTR_PARSER.to_string(), "utf8".to_string());
        req.progress
            .advance(req.partition, req.field, req.values.len() as u64);
        Ok(vec![data])
    }
}
