//! Dataset specification files.
//!
//! A config file is YAML with one or more named datasets, each pointing at a
//! delimited source file and an ordered set of fields. Specs are validated
//! structurally at load time and turned into explicit [`DatasetSpec`] /
//! [`FieldSpec`] records; nothing downstream re-interprets raw YAML.
//!
//! ```yaml
//! datasets:
//!   train:
//!     attrs:
//!       license: "CC-BY-4.0"
//!     data:
//!       file: dataset.csv
//!       fields:
//!         audio:
//!           column: filepath
//!           parser: audio_i16
//!         label:
//!           column: label
//!           parser: utf8
//! ```

use crate::error::PackError;
use crate::planner::RowRange;
use crate::store::Attrs;
use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Context shared by validation and encoding: the directory against which
/// relative paths in the config and the source table resolve (the config
/// file's own directory).
#[derive(Clone, Debug)]
pub struct RunContext {
    pub root_dir: PathBuf,
}

impl RunContext {
    /// Context rooted at the directory containing `config_path`.
    pub fn for_config(config_path: &Path) -> RunContext {
        let root_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        RunContext { root_dir }
    }
}

/// One output field: a source column fed through a named encoder.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub column: String,
    pub parser: String,
    pub parser_args: BTreeMap<String, String>,
    /// Row range per partition, populated once by the slice planner.
    pub slices: Vec<RowRange>,
}

/// One named dataset: user attributes plus source file and fields.
#[derive(Clone, Debug)]
pub struct DatasetSpec {
    pub name: String,
    pub attrs: Attrs,
    /// Source table, relative to the run root unless absolute.
    pub source_file: PathBuf,
    /// Fields in declared order.
    pub fields: Vec<FieldSpec>,
}

impl DatasetSpec {
    /// Source file resolved against the run root.
    pub fn resolved_source(&self, ctx: &RunContext) -> PathBuf {
        if self.source_file.is_absolute() {
            self.source_file.clone()
        } else {
            ctx.root_dir.join(&self.source_file)
        }
    }
}

/// A validated config file: named datasets in declaration order.
#[derive(Clone, Debug)]
pub struct Config {
    pub datasets: Vec<DatasetSpec>,
}

impl Config {
    /// Look up a dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Declared dataset names, for error messages.
    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }
}

// Raw deserialization targets; values stay loose so validation can name the
// exact offending key instead of surfacing a serde type error.
#[derive(Deserialize)]
struct RawConfig {
    datasets: Option<IndexMap<String, RawDataset>>,
}

#[derive(Deserialize)]
struct RawDataset {
    attrs: Option<IndexMap<String, serde_yaml::Value>>,
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    file: Option<String>,
    fields: Option<IndexMap<String, RawField>>,
}

#[derive(Deserialize)]
struct RawField {
    column: Option<String>,
    parser: Option<String>,
    parser_args: Option<BTreeMap<String, String>>,
}

/// Load and structurally validate a YAML config file.
///
/// # Errors
/// Returns [`PackError::Config`] naming the missing or malformed key: absent
/// `datasets`, non-string attribute values, missing `data`/`file`/`fields`,
/// empty field sets, or fields without `column`/`parser`.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let raw: RawConfig = serde_yaml::from_reader(f)
        .map_err(|e| PackError::config(format!("cannot parse '{}': {e}", path.display())))?;

    let raw_datasets = raw
        .datasets
        .filter(|d| !d.is_empty())
        .ok_or_else(|| PackError::config(format!("missing 'datasets' key in '{}'", path.display())))?;

    let mut datasets = Vec::with_capacity(raw_datasets.len());
    for (name, raw_ds) in raw_datasets {
        datasets.push(validate_dataset(&name, raw_ds)?);
    }
    Ok(Config { datasets })
}

fn validate_dataset(name: &str, raw: RawDataset) -> Result<DatasetSpec> {
    let mut attrs = Attrs::new();
    for (key, value) in raw.attrs.unwrap_or_default() {
        match value {
            serde_yaml::Value::String(s) => {
                attrs.insert(key, s);
            }
            other => {
                return Err(PackError::config(format!(
                    "attributes must be strings: key '{key}' of dataset '{name}' is {}",
                    yaml_type_name(&other)
                ))
                .into());
            }
        }
    }

    let data = raw
        .data
        .ok_or_else(|| PackError::config(format!("missing 'data' key in dataset '{name}'")))?;
    let file = data
        .file
        .ok_or_else(|| PackError::config(format!("missing 'file' key in dataset '{name}'")))?;
    let raw_fields = data
        .fields
        .filter(|f| !f.is_empty())
        .ok_or_else(|| PackError::config(format!("0 fields found in dataset '{name}'")))?;

    let mut fields = Vec::with_capacity(raw_fields.len());
    for (field_name, raw_field) in raw_fields {
        let column = raw_field.column.ok_or_else(|| {
            PackError::config(format!(
                "missing 'column' key for field '{field_name}' in dataset '{name}'"
            ))
        })?;
        let parser = raw_field.parser.ok_or_else(|| {
            PackError::config(format!(
                "missing 'parser' key for field '{field_name}' in dataset '{name}'"
            ))
        })?;
        fields.push(FieldSpec {
            name: field_name,
            column,
            parser,
            parser_args: raw_field.parser_args.unwrap_or_default(),
            slices: Vec::new(),
        });
    }

    Ok(DatasetSpec {
        name: name.to_string(),
        attrs,
        source_file: PathBuf::from(file),
        fields,
    })
}

fn yaml_type_name(v: &serde_yaml::Value) -> &'static str {
    match v {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a bool",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> Result<tempfile::NamedTempFile> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(content.as_bytes())?;
        Ok(f)
    }

    #[test]
    fn loads_valid_config_preserving_field_order() -> Result<()> {
        let f = write_config(
            "datasets:\n\
             \x20 train:\n\
             \x20   attrs:\n\
             \x20     license: CC\n\
             \x20   data:\n\
             \x20     file: data.csv\n\
             \x20     fields:\n\
             \x20       zeta: {column: z, parser: f32}\n\
             \x20       alpha: {column: a, parser: utf8}\n",
        )?;
        let config = load_config(f.path())?;
        let ds = config.dataset("train").unwrap();
        assert_eq!(ds.attrs.get("license").map(String::as_str), Some("CC"));
        let names: Vec<_> = ds.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        Ok(())
    }

    #[test]
    fn rejects_non_string_attrs() -> Result<()> {
        let f = write_config(
            "datasets:\n\
             \x20 d:\n\
             \x20   attrs: {year: 2024}\n\
             \x20   data:\n\
             \x20     file: data.csv\n\
             \x20     fields:\n\
             \x20       x: {column: x, parser: f32}\n",
        )?;
        let err = load_config(f.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackError>(),
            Some(PackError::Config(_))
        ));
        assert!(err.to_string().contains("year"));
        Ok(())
    }

    #[test]
    fn rejects_missing_parser() -> Result<()> {
        let f = write_config(
            "datasets:\n\
             \x20 d:\n\
             \x20   data:\n\
             \x20     file: data.csv\n\
             \x20     fields:\n\
             \x20       x: {column: x}\n",
        )?;
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("parser"));
        Ok(())
    }

    #[test]
    fn rejects_empty_fields() -> Result<()> {
        let f = write_config(
            "datasets:\n\
             \x20 d:\n\
             \x20   data:\n\
             \x20     file: data.csv\n\
             \x20     fields: {}\n",
        )?;
        assert!(load_config(f.path()).is_err());
        Ok(())
    }

    #[test]
    fn context_root_is_config_parent() {
        let ctx = RunContext::for_config(Path::new("/tmp/specs/pack.yaml"));
        assert_eq!(ctx.root_dir, PathBuf::from("/tmp/specs"));
    }
}
