//! Unpacking: rebuild packable sources from a container.
//!
//! Extraction inverts a pack run as far as the container allows: audio
//! fields become WAV files under `data/<field>/` with their original
//! basenames, every field becomes a column of a regenerated `dataset.csv`,
//! and a `rowpack.yaml` config is emitted so the extracted tree can be
//! packed again as-is. Float64 audio is written back as float32, the widest
//! format the WAV writer carries.

use crate::codec::{self, Samples};
use crate::encode::audio::FILENAMES_SUFFIX;
use crate::error::PackError;
use crate::store::format::Container;
use crate::store::{
    Array, Attrs, Dataset, ATTR_CREATION_DATE, ATTR_PARSER, ATTR_PRODUCER, ATTR_SAMPLE_RATE,
    ATTR_SOURCE, ATTR_VIRTUAL,
};
use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File names emitted into the output directory.
pub const TABLE_FILE: &str = "dataset.csv";
pub const CONFIG_FILE: &str = "rowpack.yaml";
pub const DATA_DIR: &str = "data";

/// What one unpack run wrote.
#[derive(Debug)]
pub struct UnpackReport {
    pub table: PathBuf,
    pub config: PathBuf,
    /// WAV files written, across all audio fields.
    pub audio_files: usize,
}

// Serialization targets for the regenerated config. These mirror the shape
// `config::load_config` accepts.
#[derive(Serialize)]
struct YamlConfig {
    datasets: IndexMap<String, YamlDataset>,
}

#[derive(Serialize)]
struct YamlDataset {
    #[serde(skip_serializing_if = "Attrs::is_empty")]
    attrs: Attrs,
    data: YamlData,
}

#[derive(Serialize)]
struct YamlData {
    file: String,
    fields: IndexMap<String, YamlField>,
}

#[derive(Serialize)]
struct YamlField {
    column: String,
    parser: String,
}

fn is_provenance_attr(key: &str) -> bool {
    matches!(
        key,
        ATTR_PRODUCER | ATTR_CREATION_DATE | ATTR_VIRTUAL | ATTR_SOURCE
    )
}

fn require_rowpack_producer(container: &Container) -> Result<()> {
    match container.attrs().get(ATTR_PRODUCER) {
        Some(producer) if producer.starts_with("rowpack") => Ok(()),
        Some(producer) => bail!(
            "'{}' was produced by '{producer}', not by rowpack; refusing to unpack",
            container.path().display()
        ),
        None => bail!(
            "'{}' carries no producer attribute; refusing to unpack",
            container.path().display()
        ),
    }
}

fn parser_of(ds: &Dataset) -> Result<&str> {
    ds.attrs
        .get(ATTR_PARSER)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("dataset '{}' carries no parser attribute", ds.name))
}

fn sample_rate_of(ds: &Dataset) -> Result<u32> {
    let raw = ds
        .attrs
        .get(ATTR_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("audio dataset '{}' carries no sample rate", ds.name))?;
    raw.parse()
        .with_context(|| format!("sample rate '{raw}' of dataset '{}'", ds.name))
}

fn scalar_cell(ds: &Dataset, row: usize) -> Result<String> {
    let arr = ds
        .row(row)
        .ok_or_else(|| anyhow!("dataset '{}' has no row {row}", ds.name))?;
    Ok(match arr {
        Array::I16(v) => v[0].to_string(),
        Array::F32(v) => v[0].to_string(),
        Array::F64(v) => v[0].to_string(),
    })
}

fn list_cell(ds: &Dataset, row: usize) -> Result<String> {
    let arr = ds
        .row(row)
        .ok_or_else(|| anyhow!("dataset '{}' has no row {row}", ds.name))?;
    let parts: Vec<String> = match arr {
        Array::I16(v) => v.iter().map(i16::to_string).collect(),
        Array::F32(v) => v.iter().map(f32::to_string).collect(),
        Array::F64(v) => v.iter().map(f64::to_string).collect(),
    };
    Ok(parts.join(","))
}

/// Write one audio field's rows back to WAV files, returning the per-row
/// relative paths for the table column.
fn extract_audio(
    ds: &Dataset,
    names: &Dataset,
    out_dir: &Path,
    field_dir: &str,
) -> Result<Vec<String>> {
    let sample_rate = sample_rate_of(ds)?;
    let rows = ds.rows() as usize;
    if names.rows() as usize != rows {
        bail!(
            "filename dataset '{}' has {} row(s) but '{}' has {rows}",
            names.name,
            names.rows(),
            ds.name
        );
    }

    let mut cells = Vec::with_capacity(rows);
    for row in 0..rows {
        let basename = names
            .string_row(row)
            .ok_or_else(|| anyhow!("filename dataset '{}' has no row {row}", names.name))?;
        let arr = ds
            .row(row)
            .ok_or_else(|| anyhow!("dataset '{}' has no row {row}", ds.name))?;
        let samples = match arr {
            Array::I16(v) => Samples::I16(v),
            Array::F32(v) => Samples::F32(v),
            Array::F64(v) => Samples::F32(v.iter().map(|&s| s as f32).collect()),
        };
        let rel = PathBuf::from(DATA_DIR).join(field_dir).join(basename);
        codec::write_wav(out_dir.join(&rel), sample_rate, &samples)
            .with_context(|| format!("write row {row} of audio field '{}'", ds.name))?;
        cells.push(rel.to_string_lossy().into_owned());
    }
    Ok(cells)
}

fn dataset_name_for(container_path: &Path) -> String {
    container_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Unpack `container_path` into `out_dir`.
///
/// Virtual containers work like any other: their segments resolve during
/// dataset reads. Refuses foreign containers and, unless `overwrite`, a
/// pre-existing output directory.
pub fn unpack(container_path: &Path, out_dir: &Path, overwrite: bool) -> Result<UnpackReport> {
    let container = Container::open(container_path)?;
    require_rowpack_producer(&container)?;

    if out_dir.exists() && !overwrite {
        return Err(PackError::FileExists {
            path: out_dir.to_path_buf(),
        }
        .into());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("mkdir -p {}", out_dir.display()))?;

    // Field datasets in stored order; filename companions are looked up, not
    // emitted as columns.
    let field_names: Vec<String> = container
        .datasets()
        .iter()
        .map(|m| m.name.clone())
        .filter(|n| !n.ends_with(FILENAMES_SUFFIX))
        .collect();

    let mut columns: Vec<(String, String, Vec<String>)> = Vec::new();
    let mut audio_files = 0usize;
    let mut rows: Option<usize> = None;

    for name in &field_names {
        let ds = container.read_dataset(name)?;
        let parser = parser_of(&ds)?.to_string();
        let n = ds.rows() as usize;
        match rows {
            Some(r) if r != n => bail!(
                "dataset '{name}' has {n} row(s) where earlier fields have {r}"
            ),
            _ => rows = Some(n),
        }

        let cells = match parser.as_str() {
            "audio_i16" | "audio_f32" | "audio_f64" => {
                let companion = format!("{name}{FILENAMES_SUFFIX}");
                let names_ds = container.read_dataset(&companion).with_context(|| {
                    format!("audio field '{name}' is missing its filename dataset")
                })?;
                let cells = extract_audio(&ds, &names_ds, out_dir, name)?;
                audio_files += cells.len();
                cells
            }
            "utf8" => match &ds.payload {
                crate::store::Payload::Strings(values) => values.clone(),
                _ => bail!("utf8 dataset '{name}' does not hold strings"),
            },
            "list_i16" | "list_f32" | "list_f64" => (0..n)
                .map(|row| list_cell(&ds, row))
                .collect::<Result<_>>()?,
            "i16" | "f32" | "f64" => (0..n)
                .map(|row| scalar_cell(&ds, row))
                .collect::<Result<_>>()?,
            other => bail!("dataset '{name}' uses unknown parser '{other}'"),
        };
        columns.push((name.clone(), parser, cells));
    }

    let row_count = rows.unwrap_or(0);
    let table_path = out_dir.join(TABLE_FILE);
    let mut w = csv::Writer::from_path(&table_path)
        .with_context(|| format!("create {}", table_path.display()))?;
    w.write_record(columns.iter().map(|(name, _, _)| name.as_str()))?;
    for row in 0..row_count {
        w.write_record(columns.iter().map(|(_, _, cells)| cells[row].as_str()))?;
    }
    w.flush()?;

    let user_attrs: Attrs = container
        .attrs()
        .iter()
        .filter(|(k, _)| !is_provenance_attr(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let fields: IndexMap<String, YamlField> = columns
        .iter()
        .map(|(name, parser, _)| {
            (
                name.clone(),
                YamlField {
                    column: name.clone(),
                    parser: parser.clone(),
                },
            )
        })
        .collect();
    let config = YamlConfig {
        datasets: IndexMap::from([(
            dataset_name_for(container_path),
            YamlDataset {
                attrs: user_attrs,
                data: YamlData {
                    file: TABLE_FILE.to_string(),
                    fields,
                },
            },
        )]),
    };
    let config_path = out_dir.join(CONFIG_FILE);
    let yaml = serde_yaml::to_string(&config)?;
    std::fs::write(&config_path, yaml)
        .with_context(|| format!("write {}", config_path.display()))?;

    log::info!(
        "unpacked {row_count} row(s) and {audio_files} audio file(s) into {}",
        out_dir.display()
    );
    Ok(UnpackReport {
        table: table_path,
        config: config_path,
        audio_files,
    })
}
