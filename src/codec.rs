//! WAV audio access.
//!
//! Decoding and encoding go through [`hound`], which handles the RIFF chunk
//! walking and validates the `fmt ` block (channel count, bit depth and block
//! alignment) before any samples are touched. This module narrows hound's
//! surface to the two sample formats the encoders store, integer PCM16 and
//! IEEE float32, and provides the conversions between them. Writes are
//! mono-only because extraction emits one file per clip.

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Metadata block of a WAV file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavInfo {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Number of sample frames per channel.
    pub frames: u64,
}

/// Decoded PCM samples in their native storage format.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Samples::I16(v) => v.len(),
            Samples::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples as `i16`, converting float samples to full-scale integers.
    pub fn to_i16(&self) -> Vec<i16> {
        match self {
            Samples::I16(v) => v.clone(),
            Samples::F32(v) => v
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
                .collect(),
        }
    }

    /// Samples as `f32`, scaling integer samples into `[-1, 1]`.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            Samples::I16(v) => v.iter().map(|&s| s as f32 / -(i16::MIN as f32)).collect(),
            Samples::F32(v) => v.clone(),
        }
    }

    /// Samples as `f64`, scaling integer samples into `[-1, 1]`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::I16(v) => v.iter().map(|&s| s as f64 / -(i16::MIN as f64)).collect(),
            Samples::F32(v) => v.iter().map(|&s| s as f64).collect(),
        }
    }
}

fn check_spec(spec: &WavSpec, path: &Path) -> Result<()> {
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) | (SampleFormat::Float, 32) => Ok(()),
        (format, bits) => bail!(
            "unsupported WAV sample format in '{}': {format:?} at {bits} bits \
             (only PCM16 and float32 are supported)",
            path.display()
        ),
    }
}

fn info_of(spec: &WavSpec, frames: u32) -> WavInfo {
    WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        frames: frames as u64,
    }
}

/// Read only the metadata block of a WAV file.
pub fn read_wav_info(path: impl AsRef<Path>) -> Result<WavInfo> {
    let path = path.as_ref();
    let reader =
        WavReader::open(path).with_context(|| format!("parse WAV header of {}", path.display()))?;
    let spec = reader.spec();
    check_spec(&spec, path)?;
    Ok(info_of(&spec, reader.duration()))
}

/// Read a WAV file's samples (interleaved when multi-channel) and metadata.
pub fn read_wav(path: impl AsRef<Path>) -> Result<(WavInfo, Samples)> {
    let path = path.as_ref();
    let mut reader =
        WavReader::open(path).with_context(|| format!("parse WAV header of {}", path.display()))?;
    let spec = reader.spec();
    check_spec(&spec, path)?;
    let info = info_of(&spec, reader.duration());

    let samples = match spec.sample_format {
        SampleFormat::Int => Samples::I16(
            reader
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("decode samples of {}", path.display()))?,
        ),
        SampleFormat::Float => Samples::F32(
            reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("decode samples of {}", path.display()))?,
        ),
    };
    Ok((info, samples))
}

/// Write mono samples to a WAV file, keeping the samples' native format
/// (PCM16 for `Samples::I16`, float32 for `Samples::F32`).
pub fn write_wav(path: impl AsRef<Path>, sample_rate: u32, samples: &Samples) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("mkdir -p {}", parent.display()))?;
    }

    let (sample_format, bits_per_sample) = match samples {
        Samples::I16(_) => (SampleFormat::Int, 16),
        Samples::F32(_) => (SampleFormat::Float, 32),
    };
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample,
        sample_format,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("create {}", path.display()))?;
    match samples {
        Samples::I16(v) => {
            for &s in v {
                writer.write_sample(s)?;
            }
        }
        Samples::F32(v) => {
            for &s in v {
                writer.write_sample(s)?;
            }
        }
    }
    writer
        .finalize()
        .with_context(|| format!("finalize {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_roundtrip() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("tone.wav");
        let samples = Samples::I16(vec![0, 1000, -1000, i16::MAX, i16::MIN]);
        write_wav(&path, 16_000, &samples)?;

        let info = read_wav_info(&path)?;
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.channels, 1);
        assert_eq!(info.frames, 5);

        let (info2, decoded) = read_wav(&path)?;
        assert_eq!(info, info2);
        assert_eq!(decoded, samples);
        assert_eq!(decoded.len() as u64, info.frames);
        Ok(())
    }

    #[test]
    fn float32_roundtrip() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("tone_f32.wav");
        let samples = Samples::F32(vec![0.0, 0.25, -0.25, 1.0, -1.0]);
        write_wav(&path, 44_100, &samples)?;
        let (info, decoded) = read_wav(&path)?;
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.frames, 5);
        assert_eq!(decoded, samples);
        Ok(())
    }

    #[test]
    fn rejects_non_wav_bytes() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("junk.wav");
        std::fs::write(&path, b"definitely not a riff file")?;
        assert!(read_wav_info(&path).is_err());
        Ok(())
    }

    #[test]
    fn rejects_unsupported_bit_depth() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("deep.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec)?;
        writer.write_sample(0i32)?;
        writer.finalize()?;

        let err = read_wav_info(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported WAV sample format"));
        Ok(())
    }

    #[test]
    fn integer_float_conversion_is_symmetric_at_zero() {
        let s = Samples::I16(vec![0, i16::MIN]);
        let f = s.to_f32();
        assert_eq!(f[0], 0.0);
        assert_eq!(f[1], -1.0);
    }
}
