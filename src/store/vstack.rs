//! Virtual concatenation: one logical view over many partition files.
//!
//! The builder scans every partition in the given order, accumulates per-field
//! running offsets along axis 0, validates dtype, storage-kind and
//! trailing-shape compatibility, and writes a container whose datasets are
//! pure segment references; no data bytes are duplicated. The referenced partitions must
//! remain readable at their recorded locations.

use super::format::{Container, ContainerWriter, Layout};
use super::{
    ATTR_CREATION_DATE, ATTR_PRODUCER, ATTR_SOURCE, ATTR_VIRTUAL, Attrs, Dataset, Dtype, Payload,
    Segment, shape_repr,
};
use crate::error::PackError;
use crate::timestamp;
use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// How segment paths are recorded inside a virtual view.
///
/// Relative views can move together with their partitions; absolute views
/// survive being moved alone but break when the partitions move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathMode {
    /// Store paths relative to the virtual file's directory.
    #[default]
    Relative,
    /// Store canonicalized absolute paths.
    Absolute,
}

struct FieldAccum {
    dtype: Dtype,
    kind: &'static str,
    trailing: Vec<u64>,
    attrs: Attrs,
    next_row: u64,
    segments: Vec<Segment>,
}

/// Build a virtual view over `partitions` at `output`.
///
/// Root attributes are copied from the first partition, overridden/extended
/// by `extra_attrs`, then stamped with a creation date, the contributing
/// basenames, and the virtual marker.
///
/// # Errors
/// - [`PackError::InvalidPartition`] on the first input that is missing or
///   not a container file (fail-fast).
/// - [`PackError::IncompatibleField`] when a field's dtype, storage kind or
///   trailing dimensions disagree across partitions, or an input is itself a
///   virtual view; nothing is written in that case.
pub fn build_virtual(
    output: impl AsRef<Path>,
    partitions: &[PathBuf],
    extra_attrs: Option<&Attrs>,
    path_mode: PathMode,
) -> Result<()> {
    let output = output.as_ref();
    if partitions.is_empty() {
        return Err(PackError::config("cannot build a virtual view from 0 partitions").into());
    }

    // Field order follows first appearance across partitions.
    let mut order: Vec<String> = Vec::new();
    let mut fields: std::collections::BTreeMap<String, FieldAccum> =
        std::collections::BTreeMap::new();
    let mut root_attrs: Option<Attrs> = None;

    let out_dir = output.parent().unwrap_or_else(|| Path::new("."));

    for partition in partitions {
        let container = Container::open(partition)?;
        if root_attrs.is_none() {
            root_attrs = Some(container.attrs().clone());
        }

        let recorded = match path_mode {
            PathMode::Absolute => std::fs::canonicalize(partition)
                .with_context(|| format!("canonicalize {}", partition.display()))?,
            PathMode::Relative => relative_to(partition, out_dir),
        };

        for meta in container.datasets() {
            let rows = meta.rows();
            let kind = meta.layout.kind_name();
            if matches!(meta.layout, Layout::Virtual { .. }) {
                return Err(PackError::IncompatibleField {
                    field: meta.name.clone(),
                    reason: format!(
                        "'{}' is itself a virtual view; stack its source partitions instead",
                        partition.display()
                    ),
                }
                .into());
            }
            let entry = fields.entry(meta.name.clone()).or_insert_with(|| {
                order.push(meta.name.clone());
                FieldAccum {
                    dtype: meta.dtype,
                    kind,
                    trailing: meta.trailing_dims().to_vec(),
                    attrs: meta.attrs.clone(),
                    next_row: 0,
                    segments: Vec::new(),
                }
            });

            if meta.dtype != entry.dtype {
                return Err(PackError::IncompatibleField {
                    field: meta.name.clone(),
                    reason: format!(
                        "dtype {} in '{}' does not match previously seen {}",
                        meta.dtype,
                        partition.display(),
                        entry.dtype
                    ),
                }
                .into());
            }
            // Scalar and ragged columns both have empty trailing dims, so the
            // storage kind has to match too or the view would lose rows.
            if kind != entry.kind {
                return Err(PackError::IncompatibleField {
                    field: meta.name.clone(),
                    reason: format!(
                        "{kind} layout in '{}' does not match previously seen {} layout",
                        partition.display(),
                        entry.kind
                    ),
                }
                .into());
            }
            if meta.trailing_dims() != entry.trailing {
                return Err(PackError::IncompatibleField {
                    field: meta.name.clone(),
                    reason: format!(
                        "trailing dimensions of shape {} in '{}' do not match {}",
                        shape_repr(meta.trailing_dims()),
                        partition.display(),
                        shape_repr(&entry.trailing)
                    ),
                }
                .into());
            }

            let start = entry.next_row;
            entry.segments.push(Segment {
                path: recorded.clone(),
                start,
                end: start + rows,
            });
            entry.next_row = start + rows;
            debug!(
                "field '{}': rows [{start}, {}) from '{}'",
                meta.name,
                start + rows,
                partition.display()
            );
        }
    }

    let mut writer = ContainerWriter::create(output)?;
    let mut attrs = root_attrs.unwrap_or_default();
    if let Some(extra) = extra_attrs {
        for (k, v) in extra {
            attrs.insert(k.clone(), v.clone());
        }
    }
    attrs.insert(ATTR_CREATION_DATE.to_string(), timestamp::now());
    attrs.insert(
        ATTR_SOURCE.to_string(),
        partitions
            .iter()
            .map(|p| basename(p))
            .collect::<Vec<_>>()
            .join(", "),
    );
    attrs.insert(
        ATTR_PRODUCER.to_string(),
        format!("rowpack {}", env!("CARGO_PKG_VERSION")),
    );
    attrs.insert(ATTR_VIRTUAL.to_string(), "true".to_string());
    writer.set_attrs(&attrs);

    for name in order {
        let Some(field) = fields.remove(&name) else {
            continue;
        };
        let total: u64 = field.next_row;
        let mut shape = vec![total];
        shape.extend_from_slice(&field.trailing);
        writer.add_dataset(Dataset {
            name,
            dtype: field.dtype,
            shape,
            attrs: field.attrs,
            payload: Payload::Virtual(field.segments),
        })?;
    }

    writer.finish()?;
    Ok(())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Express `path` relative to `dir` when it shares that prefix; otherwise
/// keep it as given. Plain basenames stay plain.
fn relative_to(path: &Path, dir: &Path) -> PathBuf {
    if dir.as_os_str().is_empty() {
        return path.to_path_buf();
    }
    path.strip_prefix(dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
