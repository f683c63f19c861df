//! Packing orchestration: from a validated dataset spec to finished
//! partition containers, an optional virtual concatenation, and a checksum
//! ledger.
//!
//! Partitions are independent, so they run on a small thread pool: workers
//! pull partition indices from a shared queue and report back over one
//! `mpsc` channel, which a supervisor drains on a short timeout to drive the
//! live progress display. The first worker failure stops the run; partitions
//! already in flight finish, queued ones are abandoned, and partial output
//! files are left on disk for inspection.

use crate::checksum::{self, LEDGER_EXT};
use crate::config::{DatasetSpec, RunContext};
use crate::encode::{self, EncodeRequest};
use crate::error::PackError;
use crate::planner::{self, RowRange};
use crate::progress::{ProgressDisplay, ProgressSink, WorkerMessage};
use crate::store::format::{ContainerWriter, CONTAINER_EXT};
use crate::store::vstack::{self, PathMode};
use crate::store::{ATTR_CREATION_DATE, ATTR_PRODUCER};
use crate::table::Table;
use crate::timestamp;
use crate::validate;
use anyhow::{Context, Result, anyhow};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::Duration;

/// How source rows are divided into partitions.
#[derive(Clone, Copy, Debug)]
pub enum Partitioning {
    /// A fixed number of partitions of near-equal size.
    Count(usize),
    /// As many partitions as needed at a fixed row count each.
    RowsPer(usize),
}

impl Default for Partitioning {
    fn default() -> Self {
        Partitioning::Count(1)
    }
}

/// Options controlling one pack run.
#[derive(Clone, Debug)]
pub struct PackOptions {
    pub partitioning: Partitioning,
    /// Worker threads; `0` means one per logical CPU.
    pub workers: usize,
    /// Replace existing output files instead of refusing.
    pub overwrite: bool,
    /// Run field validators before writing anything.
    pub validate: bool,
    /// Write a virtual container over the partitions (multi-partition runs
    /// only; a single partition already is the whole dataset).
    pub build_virtual: bool,
    /// How the virtual container references its partitions.
    pub path_mode: PathMode,
    /// Write a checksum ledger covering every produced file.
    pub write_checksums: bool,
    /// Show live progress bars on stderr.
    pub show_progress: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        PackOptions {
            partitioning: Partitioning::default(),
            workers: 0,
            overwrite: false,
            validate: true,
            build_virtual: true,
            path_mode: PathMode::default(),
            write_checksums: true,
            show_progress: false,
        }
    }
}

/// Everything one pack run produced, in creation order.
#[derive(Debug)]
pub struct PackReport {
    /// Partition files, ascending by partition index.
    pub partitions: Vec<PathBuf>,
    pub virtual_file: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
}

impl PackReport {
    /// All produced files, partitions first.
    pub fn files(&self) -> Vec<&Path> {
        let mut out: Vec<&Path> = self.partitions.iter().map(PathBuf::as_path).collect();
        if let Some(v) = &self.virtual_file {
            out.push(v);
        }
        if let Some(l) = &self.ledger {
            out.push(l);
        }
        out
    }
}

/// Append the container extension unless the path already carries it.
pub fn with_container_ext(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == CONTAINER_EXT => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(format!(".{CONTAINER_EXT}"));
            PathBuf::from(name)
        }
    }
}

/// Per-partition output paths for `output`.
///
/// A single partition keeps the plain name; with more, each gets a `.ptNN`
/// tag before the extension, zero-padded to the decimal width of the
/// partition count, and the plain name is reserved for the virtual file.
pub fn partition_paths(output: &Path, num_partitions: usize) -> Vec<PathBuf> {
    let base = with_container_ext(output);
    if num_partitions <= 1 {
        return vec![base];
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let width = num_partitions.to_string().len();
    (0..num_partitions)
        .map(|idx| base.with_file_name(format!("{stem}.pt{idx:0width$}.{CONTAINER_EXT}")))
        .collect()
}

fn ledger_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{LEDGER_EXT}"));
    PathBuf::from(name)
}

fn refuse_existing(paths: &[&Path], overwrite: bool) -> Result<()> {
    if overwrite {
        return Ok(());
    }
    for path in paths {
        if path.exists() {
            return Err(PackError::FileExists {
                path: path.to_path_buf(),
            }
            .into());
        }
    }
    Ok(())
}

/// Write one partition container: user attributes plus provenance, then every
/// field's datasets in declared order.
pub fn write_partition(
    spec: &DatasetSpec,
    table: &Table,
    ctx: &RunContext,
    partition: usize,
    path: &Path,
    progress: &ProgressSink,
) -> Result<PathBuf> {
    let mut writer = ContainerWriter::create(path)?;
    writer.set_attrs(&spec.attrs);
    writer.set_attr(
        ATTR_PRODUCER,
        format!("rowpack {}", env!("CARGO_PKG_VERSION")),
    );
    writer.set_attr(ATTR_CREATION_DATE, timestamp::now());

    for field in &spec.fields {
        let column = table.column(&field.column).ok_or_else(|| {
            anyhow!(
                "column '{}' for field '{}' missing from source table",
                field.column,
                field.name
            )
        })?;
        let range = field.slices.get(partition).copied().ok_or_else(|| {
            anyhow!(
                "field '{}' has no slice for partition {partition}",
                field.name
            )
        })?;
        let encoder = encode::lookup(column.ty, &field.column, &field.parser)?;
        let req = EncodeRequest {
            partition,
            field: &field.name,
            values: column.slice(range.start, range.end),
            root_dir: &ctx.root_dir,
            args: &field.parser_args,
            progress,
        };
        for dataset in encoder.encode(&req)? {
            writer.add_dataset(dataset)?;
        }
    }
    writer.finish()
}

/// Pack one dataset spec into `output` per `opts`.
///
/// Reads and validates the source table, plans the row slices, writes every
/// partition (in parallel when `opts.workers` allows), then builds the
/// virtual container and checksum ledger.
pub fn pack_dataset(
    spec: &DatasetSpec,
    ctx: &RunContext,
    output: &Path,
    opts: &PackOptions,
) -> Result<PackReport> {
    let source = spec.resolved_source(ctx);
    let table = Table::read_csv(&source)
        .with_context(|| format!("reading source table for dataset '{}'", spec.name))?;
    if opts.validate {
        validate::validate_fields(&table, spec, ctx)?;
    } else {
        log::warn!("validation skipped for dataset '{}'", spec.name);
    }

    let slices = match opts.partitioning {
        Partitioning::Count(n) => planner::plan(table.rows(), n)?,
        Partitioning::RowsPer(n) => planner::plan_by_rows(table.rows(), n)?,
    };
    let num_partitions = slices.len();
    let mut spec = spec.clone();
    for field in &mut spec.fields {
        field.slices = slices.clone();
    }

    let paths = partition_paths(output, num_partitions);
    let virtual_path = (opts.build_virtual && num_partitions > 1)
        .then(|| with_container_ext(output));
    let ledger = opts
        .write_checksums
        .then(|| ledger_path(virtual_path.as_deref().unwrap_or(&paths[0])));

    let mut targets: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    if let Some(v) = &virtual_path {
        targets.push(v);
    }
    if let Some(l) = &ledger {
        targets.push(l);
    }
    refuse_existing(&targets, opts.overwrite)?;

    run_partitions(&spec, &table, ctx, &slices, &paths, opts)?;

    if let Some(virtual_path) = &virtual_path {
        vstack::build_virtual(virtual_path, &paths, None, opts.path_mode)?;
        log::info!(
            "wrote virtual container {} over {num_partitions} partitions",
            virtual_path.display()
        );
    }

    if let Some(ledger) = &ledger {
        let mut files = paths.clone();
        if let Some(v) = &virtual_path {
            files.push(v.clone());
        }
        checksum::write_ledger(&files, ledger)?;
        log::info!("wrote checksum ledger {}", ledger.display());
    }

    Ok(PackReport {
        partitions: paths,
        virtual_file: virtual_path,
        ledger,
    })
}

/// Write every partition on a bounded worker pool, driving progress from the
/// supervisor thread.
fn run_partitions(
    spec: &DatasetSpec,
    table: &Table,
    ctx: &RunContext,
    slices: &[RowRange],
    paths: &[PathBuf],
    opts: &PackOptions,
) -> Result<()> {
    let workers = match opts.workers {
        0 => num_cpus::get(),
        n => n,
    }
    .min(slices.len())
    .max(1);

    let (tx, rx) = mpsc::channel::<WorkerMessage>();
    let queue: Mutex<VecDeque<usize>> = Mutex::new((0..slices.len()).collect());

    let mut display = ProgressDisplay::new(opts.show_progress);
    for (idx, range) in slices.iter().enumerate() {
        for field in &spec.fields {
            display.add_task(idx, &field.name, range.len() as u64);
        }
    }

    log::info!(
        "packing dataset '{}': {} rows, {} partitions, {workers} workers",
        spec.name,
        table.rows(),
        slices.len()
    );

    let mut first_error: Option<anyhow::Error> = None;
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || {
                let sink = ProgressSink::Channel(tx.clone());
                loop {
                    let next = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some(partition) = next else { break };
                    let result =
                        write_partition(spec, table, ctx, partition, &paths[partition], &sink);
                    let _ = tx.send(WorkerMessage::Done { partition, result });
                }
            });
        }
        drop(tx);

        let mut pending = slices.len();
        while pending > 0 {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(WorkerMessage::Progress {
                    partition,
                    field,
                    rows,
                }) => display.advance(partition, &field, rows),
                Ok(WorkerMessage::Done { partition, result }) => {
                    pending -= 1;
                    display.finish_partition(partition);
                    match result {
                        Ok(path) => log::info!(
                            "partition {partition} written to {}",
                            path.display()
                        ),
                        Err(err) => {
                            // Abandon queued partitions; in-flight ones finish.
                            if let Ok(mut q) = queue.lock() {
                                pending -= q.len();
                                q.clear();
                            }
                            if first_error.is_none() {
                                first_error = Some(
                                    err.context(format!("partition {partition} failed")),
                                );
                            }
                        }
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        display.clear();
    });

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_ext_is_appended_once() {
        assert_eq!(
            with_container_ext(Path::new("out/data")),
            PathBuf::from("out/data.rpk")
        );
        assert_eq!(
            with_container_ext(Path::new("out/data.rpk")),
            PathBuf::from("out/data.rpk")
        );
        assert_eq!(
            with_container_ext(Path::new("out/data.v2")),
            PathBuf::from("out/data.v2.rpk")
        );
    }

    #[test]
    fn partition_names_are_tagged_and_padded() {
        let single = partition_paths(Path::new("data"), 1);
        assert_eq!(single, vec![PathBuf::from("data.rpk")]);

        let many = partition_paths(Path::new("data"), 12);
        assert_eq!(many.len(), 12);
        assert_eq!(many[0], PathBuf::from("data.pt00.rpk"));
        assert_eq!(many[11], PathBuf::from("data.pt11.rpk"));
    }

    #[test]
    fn ledger_sits_next_to_the_container() {
        assert_eq!(
            ledger_path(Path::new("out/data.rpk")),
            PathBuf::from("out/data.rpk.sha256")
        );
    }
}
