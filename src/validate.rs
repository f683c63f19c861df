//! Pre-pack validation of declared fields.
//!
//! Validators are selected by parser name and run in sequence against the
//! resolved source column with fail-fast semantics: the first violation
//! aborts the whole validation phase, before any output file is created.
//! Relative file paths in cells resolve against the run root.

use crate::codec;
use crate::config::{DatasetSpec, RunContext};
use crate::encode::audio::resolve_path;
use crate::error::PackError;
use crate::table::{Column, Table};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// File extensions accepted for audio fields.
pub const ALLOWED_AUDIO_EXTENSIONS: &[&str] = &["wav"];

/// A named check over one source column.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, column: &Column, ctx: &RunContext) -> Result<()>;
}

/// Validators registered for a parser name. Most parsers have none; audio
/// parsers check their referenced files up front.
pub fn validators_for(parser: &str) -> &'static [&'static dyn Validator] {
    match parser {
        "audio_i16" | "audio_f32" | "audio_f64" => AUDIO_VALIDATORS,
        _ => &[],
    }
}

static AUDIO_VALIDATORS: &[&dyn Validator] = &[&AudioFileValidator];

/// Checks every referenced audio file: existence, allowed extension, exactly
/// one channel, and a sample rate consistent with the first file seen for the
/// field (the first file establishes the expected rate).
struct AudioFileValidator;

impl Validator for AudioFileValidator {
    fn name(&self) -> &'static str {
        "audio_file"
    }

    fn validate(&self, column: &Column, ctx: &RunContext) -> Result<()> {
        let mut expected_rate: Option<u32> = None;
        for cell in column.values() {
            let path = resolve_path(&ctx.root_dir, cell);
            check_extension(&path)?;
            if !path.is_file() {
                return Err(PackError::Validation {
                    field: column.name.clone(),
                    reason: format!("file not found: '{}'", path.display()),
                }
                .into());
            }
            let info = codec::read_wav_info(&path)?;
            if info.channels != 1 {
                return Err(PackError::ChannelCount {
                    path,
                    channels: info.channels,
                }
                .into());
            }
            match expected_rate {
                None => expected_rate = Some(info.sample_rate),
                Some(expected) if info.sample_rate != expected => {
                    return Err(PackError::SampleRateMismatch {
                        path,
                        expected,
                        found: info.sample_rate,
                    }
                    .into());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            ALLOWED_AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        anyhow::bail!(
            "'{}' does not have an allowed audio extension ({})",
            path.display(),
            ALLOWED_AUDIO_EXTENSIONS.join(", ")
        )
    }
}

/// Run every registered validator for every declared field, in declaration
/// order, failing on the first violation.
///
/// Also checks each field's source column exists in the table, so a typo in
/// a field spec surfaces here rather than mid-write.
pub fn validate_fields(table: &Table, spec: &DatasetSpec, ctx: &RunContext) -> Result<()> {
    for field in &spec.fields {
        let column = table.column(&field.column).ok_or_else(|| PackError::Validation {
            field: field.name.clone(),
            reason: format!("column '{}' not found in source table", field.column),
        })?;

        for validator in validators_for(&field.parser) {
            info!(
                "running validator '{}' on field '{}'",
                validator.name(),
                field.name
            );
            validator
                .validate(column, ctx)
                .with_context(|| format!("validation of field '{}' failed", field.name))?;
        }
    }
    Ok(())
}
