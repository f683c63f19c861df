//! On-disk container format.
//!
//! Layout: 4-byte magic `RPK1`, a little-endian u64 giving the byte length of
//! the JSON index, the index itself, then the raw data section. The index
//! records root attributes and per-dataset metadata (name, dtype, shape,
//! attrs, layout); dense and ragged layouts point into the data section with
//! byte offsets relative to its start, virtual layouts carry segment
//! references instead of bytes.

use super::{Array, Attrs, Dataset, Dtype, Payload, Segment};
use crate::error::PackError;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"RPK1";

/// Canonical extension for container files.
pub const CONTAINER_EXT: &str = "rpk";

/// Physical placement of a dataset's values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Contiguous fixed-width elements at `[offset, offset + len)` of the
    /// data section.
    Dense { offset: u64, len: u64 },
    /// Concatenated fixed-width elements with per-row element counts.
    Ragged {
        offset: u64,
        len: u64,
        row_lens: Vec<u64>,
    },
    /// Concatenated UTF-8 bytes with per-row byte counts.
    Strings {
        offset: u64,
        len: u64,
        row_lens: Vec<u64>,
    },
    /// References into other container files; no local bytes.
    Virtual { segments: Vec<Segment> },
}

impl Layout {
    /// Storage kind label, for compatibility checks and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Layout::Dense { .. } => "dense",
            Layout::Ragged { .. } => "ragged",
            Layout::Strings { .. } => "strings",
            Layout::Virtual { .. } => "virtual",
        }
    }
}

/// Index entry describing one dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub name: String,
    pub dtype: Dtype,
    pub shape: Vec<u64>,
    pub attrs: Attrs,
    pub layout: Layout,
}

impl DatasetMeta {
    /// Leading-dimension size (row count along axis 0).
    pub fn rows(&self) -> u64 {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Dimensions after axis 0; these must match across partitions for a
    /// field to be concatenable.
    pub fn trailing_dims(&self) -> &[u64] {
        &self.shape[1.min(self.shape.len())..]
    }
}

#[derive(Serialize, Deserialize)]
struct Index {
    attrs: Attrs,
    datasets: Vec<DatasetMeta>,
}

/// Write-side handle for a new container file.
///
/// Datasets are finished values; nothing hits disk until [`finish`], so an
/// encoder failure leaves no partially-written container behind for this
/// handle. The writer exclusively owns the output path for its lifetime.
///
/// [`finish`]: ContainerWriter::finish
pub struct ContainerWriter {
    path: PathBuf,
    attrs: Attrs,
    datasets: Vec<Dataset>,
}

impl ContainerWriter {
    /// Start a container at `path`. Parent directories are created; existing
    /// files are truncated at [`finish`] time, so overwrite policy is the
    /// caller's to enforce beforehand.
    ///
    /// [`finish`]: ContainerWriter::finish
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        Ok(ContainerWriter {
            path,
            attrs: Attrs::new(),
            datasets: Vec::new(),
        })
    }

    /// Set one root attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Merge root attributes, later keys overriding earlier ones.
    pub fn set_attrs(&mut self, attrs: &Attrs) {
        for (k, v) in attrs {
            self.attrs.insert(k.clone(), v.clone());
        }
    }

    /// Add a finished dataset.
    ///
    /// # Errors
    /// Fails when a dataset with the same name was already added.
    pub fn add_dataset(&mut self, dataset: Dataset) -> Result<()> {
        if self.datasets.iter().any(|d| d.name == dataset.name) {
            bail!(
                "duplicate dataset '{}' in container '{}'",
                dataset.name,
                self.path.display()
            );
        }
        self.datasets.push(dataset);
        Ok(())
    }

    /// Serialize the index and data section and write the file.
    pub fn finish(self) -> Result<PathBuf> {
        let mut data = Vec::<u8>::new();
        let mut metas = Vec::with_capacity(self.datasets.len());

        for ds in &self.datasets {
            let offset = data.len() as u64;
            let layout = match &ds.payload {
                Payload::Dense(values) => {
                    values.write_le(&mut data);
                    Layout::Dense {
                        offset,
                        len: data.len() as u64 - offset,
                    }
                }
                Payload::Ragged(rows) => {
                    let mut row_lens = Vec::with_capacity(rows.len());
                    for row in rows {
                        row_lens.push(row.len() as u64);
                        row.write_le(&mut data);
                    }
                    Layout::Ragged {
                        offset,
                        len: data.len() as u64 - offset,
                        row_lens,
                    }
                }
                Payload::Strings(rows) => {
                    let mut row_lens = Vec::with_capacity(rows.len());
                    for row in rows {
                        row_lens.push(row.len() as u64);
                        data.extend_from_slice(row.as_bytes());
                    }
                    Layout::Strings {
                        offset,
                        len: data.len() as u64 - offset,
                        row_lens,
                    }
                }
                Payload::Virtual(segments) => Layout::Virtual {
                    segments: segments.clone(),
                },
            };
            metas.push(DatasetMeta {
                name: ds.name.clone(),
                dtype: ds.dtype,
                shape: ds.shape.clone(),
                attrs: ds.attrs.clone(),
                layout,
            });
        }

        let index = serde_json::to_vec(&Index {
            attrs: self.attrs,
            datasets: metas,
        })
        .context("serialize container index")?;

        let f = File::create(&self.path)
            .with_context(|| format!("create {}", self.path.display()))?;
        let mut w = BufWriter::new(f);
        w.write_all(MAGIC)?;
        w.write_all(&(index.len() as u64).to_le_bytes())?;
        w.write_all(&index)?;
        w.write_all(&data)?;
        w.flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(self.path)
    }
}

/// Read-only handle on a container file. Never mutates the file.
#[derive(Debug)]
pub struct Container {
    path: PathBuf,
    attrs: Attrs,
    datasets: Vec<DatasetMeta>,
    data_offset: u64,
}

impl Container {
    /// Open and index a container file.
    ///
    /// # Errors
    /// Returns [`PackError::InvalidPartition`] when the file is missing, too
    /// short, or does not start with the container magic.
    pub fn open(path: impl AsRef<Path>) -> Result<Container> {
        let path = path.as_ref().to_path_buf();
        let invalid = || PackError::InvalidPartition { path: path.clone() };

        let f = File::open(&path).map_err(|_| invalid())?;
        let mut r = BufReader::new(f);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(|_| invalid())?;
        if &magic != MAGIC {
            return Err(invalid().into());
        }
        let mut len = [0u8; 8];
        r.read_exact(&mut len).map_err(|_| invalid())?;
        let index_len = u64::from_le_bytes(len);

        let mut index_bytes = vec![0u8; index_len as usize];
        r.read_exact(&mut index_bytes).map_err(|_| invalid())?;
        let index: Index = serde_json::from_slice(&index_bytes).map_err(|_| invalid())?;

        Ok(Container {
            path,
            attrs: index.attrs,
            datasets: index.datasets,
            data_offset: 4 + 8 + index_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root attributes.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// True when the file carries the virtual-view marker.
    pub fn is_virtual(&self) -> bool {
        self.attrs.get(super::ATTR_VIRTUAL).map(String::as_str) == Some("true")
    }

    /// Dataset metadata in file order.
    pub fn datasets(&self) -> &[DatasetMeta] {
        &self.datasets
    }

    /// Metadata of one dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&DatasetMeta> {
        self.datasets.iter().find(|d| d.name == name)
    }

    fn read_section(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let mut f = File::open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        f.seek(SeekFrom::Start(self.data_offset + offset))?;
        let mut buf = vec![0u8; len as usize];
        f.read_exact(&mut buf)
            .with_context(|| format!("read data section of {}", self.path.display()))?;
        Ok(buf)
    }

    /// Materialize a dataset, resolving virtual segments through their source
    /// partitions. Relative segment paths resolve against this container's
    /// directory.
    pub fn read_dataset(&self, name: &str) -> Result<Dataset> {
        let meta = self
            .dataset(name)
            .ok_or_else(|| anyhow::anyhow!("no dataset '{name}' in {}", self.path.display()))?
            .clone();

        let payload = match &meta.layout {
            Layout::Dense { offset, len } => {
                let bytes = self.read_section(*offset, *len)?;
                let values = Array::from_le(meta.dtype, &bytes).ok_or_else(|| {
                    anyhow::anyhow!("dense dataset '{name}' cannot have dtype str")
                })?;
                Payload::Dense(values)
            }
            Layout::Ragged {
                offset,
                len,
                row_lens,
            } => {
                let bytes = self.read_section(*offset, *len)?;
                let width = meta.dtype.width().ok_or_else(|| {
                    anyhow::anyhow!("ragged dataset '{name}' cannot have dtype str")
                })? as u64;
                let mut rows = Vec::with_capacity(row_lens.len());
                let mut cursor = 0usize;
                for &n in row_lens {
                    let nbytes = (n * width) as usize;
                    let row = Array::from_le(meta.dtype, &bytes[cursor..cursor + nbytes])
                        .ok_or_else(|| {
                            anyhow::anyhow!("ragged dataset '{name}' cannot have dtype str")
                        })?;
                    rows.push(row);
                    cursor += nbytes;
                }
                Payload::Ragged(rows)
            }
            Layout::Strings {
                offset,
                len,
                row_lens,
            } => {
                let bytes = self.read_section(*offset, *len)?;
                let mut rows = Vec::with_capacity(row_lens.len());
                let mut cursor = 0usize;
                for &n in row_lens {
                    let s = std::str::from_utf8(&bytes[cursor..cursor + n as usize])
                        .with_context(|| format!("decode string row of dataset '{name}'"))?;
                    rows.push(s.to_string());
                    cursor += n as usize;
                }
                Payload::Strings(rows)
            }
            Layout::Virtual { segments } => {
                return self.read_virtual(&meta, segments);
            }
        };

        Ok(Dataset {
            name: meta.name,
            dtype: meta.dtype,
            shape: meta.shape,
            attrs: meta.attrs,
            payload,
        })
    }

    /// Resolve a virtual dataset by concatenating its source partitions'
    /// same-named datasets in segment order.
    fn read_virtual(&self, meta: &DatasetMeta, segments: &[Segment]) -> Result<Dataset> {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut kind: Option<&'static str> = None;
        let mut dense_parts: Vec<Array> = Vec::new();
        let mut ragged_rows: Vec<Array> = Vec::new();
        let mut string_rows: Vec<String> = Vec::new();

        for seg in segments {
            let src_path = if seg.path.is_absolute() {
                seg.path.clone()
            } else {
                base.join(&seg.path)
            };
            let src = Container::open(&src_path).with_context(|| {
                format!(
                    "resolve virtual segment [{}, {}) of '{}'",
                    seg.start, seg.end, meta.name
                )
            })?;
            let ds = src.read_dataset(&meta.name)?;
            if ds.rows() != seg.end - seg.start {
                bail!(
                    "virtual segment of '{}' expects {} row(s) but '{}' has {}",
                    meta.name,
                    seg.end - seg.start,
                    src_path.display(),
                    ds.rows()
                );
            }
            // Every segment must store the field the same way; a mismatch
            // would otherwise drop rows from one of the accumulators below.
            let seg_kind = ds.payload.kind_name();
            match kind {
                None => kind = Some(seg_kind),
                Some(k) if k != seg_kind => bail!(
                    "virtual dataset '{}' mixes {k} and {seg_kind} segments \
                     ('{}' disagrees with earlier segments)",
                    meta.name,
                    src_path.display()
                ),
                Some(_) => {}
            }
            match ds.payload {
                Payload::Dense(values) => dense_parts.push(values),
                Payload::Ragged(mut rows) => ragged_rows.append(&mut rows),
                Payload::Strings(mut rows) => string_rows.append(&mut rows),
                Payload::Virtual(_) => {
                    bail!(
                        "virtual dataset '{}' references another virtual file '{}'",
                        meta.name,
                        src_path.display()
                    )
                }
            }
        }

        let payload = match kind {
            Some("strings") => Payload::Strings(string_rows),
            Some("ragged") => Payload::Ragged(ragged_rows),
            Some(_) => {
                let values = Array::concat(&dense_parts).ok_or_else(|| {
                    anyhow::anyhow!("virtual dataset '{}' has mixed segment dtypes", meta.name)
                })?;
                Payload::Dense(values)
            }
            None => bail!("virtual dataset '{}' has no segments", meta.name),
        };

        Ok(Dataset {
            name: meta.name.clone(),
            dtype: meta.dtype,
            shape: meta.shape.clone(),
            attrs: meta.attrs.clone(),
            payload,
        })
    }
}
