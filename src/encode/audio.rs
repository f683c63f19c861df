//! Audio-family encoders: cells are WAV file paths, output is the decoded
//! sample data plus a companion dataset of source basenames.
//!
//! Every file in one encode call must be mono and share one sample rate.
//! A metadata-only pass over the row range decides dense versus ragged
//! layout before any samples are read.

use super::{EncodeRequest, FieldEncoder};
use crate::codec::{self, Samples};
use crate::error::PackError;
use crate::store::{ATTR_PARSER, ATTR_SAMPLE_RATE, Array, Dataset, Dtype};
use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

/// Dataset name suffix for the per-row source basename companion.
pub const FILENAMES_SUFFIX: &str = "_filenames";

#[derive(Debug)]
pub struct AudioEncoder {
    name: &'static str,
    dtype: Dtype,
}

pub static AUDIO_I16: AudioEncoder = AudioEncoder {
    name: "audio_i16",
    dtype: Dtype::I16,
};
pub static AUDIO_F32: AudioEncoder = AudioEncoder {
    name: "audio_f32",
    dtype: Dtype::F32,
};
pub static AUDIO_F64: AudioEncoder = AudioEncoder {
    name: "audio_f64",
    dtype: Dtype::F64,
};

/// Resolve a cell path against the run's root directory.
pub fn resolve_path(root_dir: &Path, cell: &str) -> PathBuf {
    let p = Path::new(cell);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root_dir.join(p)
    }
}

fn convert(samples: &Samples, dtype: Dtype) -> Array {
    match dtype {
        Dtype::I16 => Array::I16(samples.to_i16()),
        Dtype::F32 => Array::F32(samples.to_f32()),
        Dtype::F64 => Array::F64(samples.to_f64()),
        Dtype::Str => unreachable!("audio encoders never target str"),
    }
}

impl FieldEncoder for AudioEncoder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn encode(&self, req: &EncodeRequest<'_>) -> Result<Vec<Dataset>> {
        let paths: Vec<PathBuf> = req
            .values
            .iter()
            .map(|cell| resolve_path(req.root_dir, cell))
            .collect();

        // Metadata pass: classify dense vs ragged, establish the sample
        // rate, and reject multi-channel files before reading any samples.
        let mut sample_rate: Option<u32> = None;
        let mut lens = Vec::with_capacity(paths.len());
        for path in &paths {
            let info = codec::read_wav_info(path).map_err(|e| {
                req.encoding_error(format!("unreadable '{}': {e:#}", path.display()))
            })?;
            if info.channels != 1 {
                return Err(PackError::ChannelCount {
                    path: path.clone(),
                    channels: info.channels,
                }
                .into());
            }
            match sample_rate {
                None => sample_rate = Some(info.sample_rate),
                Some(expected) if info.sample_rate != expected => {
                    return Err(PackError::SampleRateMismatch {
                        path: path.clone(),
                        expected,
                        found: info.sample_rate,
                    }
                    .into());
                }
                Some(_) => {}
            }
            lens.push(info.frames);
        }
        let sample_rate =
            sample_rate.ok_or_else(|| req.encoding_error("empty row range"))?;
        let uniform_len = lens.first().copied().filter(|&l| lens.iter().all(|&n| n == l));
        debug!(
            "field '{}' partition #{}: {} file(s), {} layout",
            req.field,
            req.partition,
            paths.len(),
            if uniform_len.is_some() { "dense" } else { "ragged" }
        );

        let mut rows: Vec<Array> = Vec::with_capacity(paths.len());
        for path in &paths {
            let (_, samples) = codec::read_wav(path).map_err(|e| {
                req.encoding_error(format!("unreadable '{}': {e:#}", path.display()))
            })?;
            rows.push(convert(&samples, self.dtype));
            req.progress.advance(req.partition, req.field, 1);
        }

        let mut data = match uniform_len {
            Some(row_len) => {
                let n = rows.len();
                let values = Array::concat(&rows)
                    .ok_or_else(|| req.encoding_error("mixed sample types in row range"))?;
                Dataset::dense_2d(req.field, values, n, row_len as usize)
            }
            None => Dataset::ragged(req.field, rows, self.dtype),
        };
        data.attrs
            .insert(ATTR_PARSER.to_string(), self.name.to_string());
        data.attrs
            .insert(ATTR_SAMPLE_RATE.to_string(), sample_rate.to_string());

        // Companion dataset: originating basenames, one per row, in order.
        let basenames: Vec<String> = paths
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect();
        let mut filenames = Dataset::strings(format!("{}{FILENAMES_SUFFIX}", req.field), basenames);
        filenames
            .attrs
            .insert(ATTR_PARSER.to_string(), "filenames".to_string());

        Ok(vec![data, filenames])
    }
}
