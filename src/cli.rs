//! Command-line surface.
//!
//! Thin argument handling over the library: each subcommand parses into a
//! plain struct, expands its inputs, asks for confirmation when it is about
//! to write files interactively, and calls one library entry point. All real
//! work and all error taxonomy live in the library modules.

use crate::checksum::{self, LEDGER_EXT};
use crate::config::{self, RunContext};
use crate::display::{self, Styles};
use crate::error::PackError;
use crate::extract;
use crate::store::format::{Container, CONTAINER_EXT, Layout};
use crate::store::vstack::{self, PathMode};
use crate::store::{shape_repr, Attrs, ATTR_VIRTUAL};
use crate::writer::{self, PackOptions, Partitioning};
use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "rowpack",
    version,
    about = "Pack tabular datasets with file-backed fields into partitioned containers"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack a configured dataset into one or more container files.
    Pack(PackArgs),
    /// Rebuild a packable source tree from a container.
    Unpack(UnpackArgs),
    /// Build a virtual view over existing partition files.
    Virtual(VirtualArgs),
    /// Print a container's attributes and datasets.
    Info(InfoArgs),
    /// Generate or verify checksum ledgers.
    Checksum(ChecksumArgs),
}

#[derive(Args)]
struct PackArgs {
    /// Dataset config file (YAML).
    #[arg(short, long)]
    config: PathBuf,
    /// Output path; the container extension is appended when missing.
    #[arg(short, long)]
    output: PathBuf,
    /// Name of the dataset within the config to pack.
    #[arg(short, long)]
    dataset: String,
    /// Number of partitions.
    #[arg(short, long, conflicts_with = "rows_per_partition")]
    partitions: Option<usize>,
    /// Partition by row count instead of partition count.
    #[arg(long)]
    rows_per_partition: Option<usize>,
    /// Worker threads; 0 means one per logical CPU.
    #[arg(short, long, default_value_t = 0)]
    workers: usize,
    /// Skip pre-write field validation.
    #[arg(long)]
    skip_validation: bool,
    /// Do not build the virtual view over the partitions.
    #[arg(long)]
    skip_virtual: bool,
    /// Do not write a checksum ledger.
    #[arg(long)]
    skip_checksum: bool,
    /// Record absolute partition paths in the virtual view.
    #[arg(long)]
    absolute_paths: bool,
    /// Replace existing output files.
    #[arg(long)]
    overwrite: bool,
    /// Never prompt for confirmation.
    #[arg(long)]
    unattended: bool,
}

#[derive(Args)]
struct UnpackArgs {
    /// Container file to unpack (partition or virtual view).
    input: PathBuf,
    /// Output directory.
    #[arg(short, long)]
    output: PathBuf,
    /// Write into an existing output directory.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct VirtualArgs {
    /// Partition files, directories, or glob patterns.
    #[arg(short, long, num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,
    /// Output path for the virtual view.
    #[arg(short, long)]
    output: PathBuf,
    /// Recurse into directories.
    #[arg(short, long)]
    recursive: bool,
    /// Keep only file names matching this glob.
    #[arg(long, conflicts_with = "exclude")]
    select: Option<String>,
    /// Drop file names matching this glob.
    #[arg(long)]
    exclude: Option<String>,
    /// Extra root attributes, as repeated KEY VALUE pairs.
    #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"], action = clap::ArgAction::Append)]
    attrs: Vec<String>,
    /// Record absolute partition paths instead of relative ones.
    #[arg(long)]
    absolute_paths: bool,
    /// Replace an existing output file.
    #[arg(long)]
    overwrite: bool,
    /// Never prompt for confirmation.
    #[arg(long)]
    unattended: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Container file to inspect.
    input: PathBuf,
    /// Skip the source reachability report for virtual views.
    #[arg(long)]
    skip_sources: bool,
}

#[derive(Args)]
struct ChecksumArgs {
    /// Ledger files to verify, or files/directories/globs to hash.
    #[arg(num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,
    /// Write generated checksums to this ledger file.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Recurse into directories.
    #[arg(short, long)]
    recursive: bool,
}

/// Parse argv and run the selected subcommand. The returned flag is the
/// process exit status: `false` means a non-error failure such as a
/// checksum mismatch or a declined confirmation.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    let styles = Styles::auto();
    match cli.command {
        Command::Pack(args) => run_pack(args, &styles),
        Command::Unpack(args) => run_unpack(args),
        Command::Virtual(args) => run_virtual(args, &styles),
        Command::Info(args) => run_info(args, &styles),
        Command::Checksum(args) => run_checksum(args, &styles),
    }
}

fn run_pack(args: PackArgs, styles: &Styles) -> Result<bool> {
    let config = config::load_config(&args.config)?;
    let ctx = RunContext::for_config(&args.config);
    let spec = config.dataset(&args.dataset).ok_or_else(|| {
        PackError::config(format!(
            "no dataset '{}' in '{}' (available: {})",
            args.dataset,
            args.config.display(),
            config.dataset_names().join(", ")
        ))
    })?;

    let partitioning = match (args.partitions, args.rows_per_partition) {
        (_, Some(rows)) => Partitioning::RowsPer(rows),
        (Some(n), None) => Partitioning::Count(n),
        (None, None) => Partitioning::default(),
    };
    let opts = PackOptions {
        partitioning,
        workers: args.workers,
        overwrite: args.overwrite,
        validate: !args.skip_validation,
        build_virtual: !args.skip_virtual,
        path_mode: path_mode(args.absolute_paths),
        write_checksums: !args.skip_checksum,
        show_progress: std::io::stderr().is_terminal(),
    };

    if !args.unattended {
        let prompt = format!(
            "pack dataset '{}' into '{}'",
            spec.name,
            args.output.display()
        );
        if !confirm(&prompt)? {
            display::print_warning(styles, "aborted");
            return Ok(false);
        }
    }

    let report = writer::pack_dataset(spec, &ctx, &args.output, &opts)?;
    for file in report.files() {
        println!("{}", file.display());
    }
    Ok(true)
}

fn run_unpack(args: UnpackArgs) -> Result<bool> {
    let report = extract::unpack(&args.input, &args.output, args.overwrite)?;
    println!("{}", report.table.display());
    println!("{}", report.config.display());
    Ok(true)
}

fn run_virtual(args: VirtualArgs, styles: &Styles) -> Result<bool> {
    let partitions = expand_inputs(
        &args.inputs,
        args.recursive,
        args.select.as_deref(),
        args.exclude.as_deref(),
        CONTAINER_EXT,
    )?;
    if partitions.is_empty() {
        bail!("no partition files matched the given inputs");
    }

    let output = writer::with_container_ext(&args.output);
    if output.exists() && !args.overwrite {
        return Err(PackError::FileExists { path: output }.into());
    }

    let extra_attrs = parse_attr_pairs(&args.attrs)?;
    if !args.unattended {
        println!("building virtual view over {} partition(s):", partitions.len());
        for p in &partitions {
            println!("  {}", p.display());
        }
        if !confirm(&format!("write '{}'", output.display()))? {
            display::print_warning(styles, "aborted");
            return Ok(false);
        }
    }

    vstack::build_virtual(
        &output,
        &partitions,
        extra_attrs.as_ref(),
        path_mode(args.absolute_paths),
    )?;
    println!("{}", output.display());
    Ok(true)
}

fn run_info(args: InfoArgs, styles: &Styles) -> Result<bool> {
    let container = Container::open(&args.input)?;
    println!("{}", container.path().display());
    for (key, value) in container.attrs() {
        println!("  {key}: {value}");
    }

    println!("datasets:");
    for meta in container.datasets() {
        println!("  {} {} {}", meta.name, meta.dtype, shape_repr(&meta.shape));
        for (key, value) in &meta.attrs {
            println!("    {key}: {value}");
        }
    }

    let mut all_reachable = true;
    if container.is_virtual() && !args.skip_sources {
        let base = args
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut sources = BTreeSet::new();
        for meta in container.datasets() {
            if let Layout::Virtual { segments } = &meta.layout {
                for seg in segments {
                    sources.insert(seg.path.clone());
                }
            }
        }
        println!("sources:");
        for source in sources {
            let resolved = if source.is_absolute() {
                source.clone()
            } else {
                base.join(&source)
            };
            let tag = if resolved.is_file() {
                styles.ok("ok")
            } else {
                all_reachable = false;
                styles.bad("missing")
            };
            println!("  {} [{tag}]", source.display());
        }
    }
    Ok(all_reachable)
}

fn run_checksum(args: ChecksumArgs, styles: &Styles) -> Result<bool> {
    // A ledger input means verification; anything else gets hashed.
    let is_ledger = |p: &Path| p.extension().is_some_and(|e| e == LEDGER_EXT);
    if args.inputs.iter().any(|p| is_ledger(p)) {
        if !args.inputs.iter().all(|p| is_ledger(p)) {
            bail!("cannot mix ledger files and plain files in one invocation");
        }
        let mut all_ok = true;
        for ledger in &args.inputs {
            for check in checksum::verify_ledger(ledger)? {
                let tag = if check.matches() {
                    styles.ok("ok")
                } else {
                    all_ok = false;
                    styles.bad("mismatch")
                };
                println!("{} [{tag}]", check.name);
            }
        }
        return Ok(all_ok);
    }

    let files = expand_inputs(&args.inputs, args.recursive, None, None, CONTAINER_EXT)?;
    if files.is_empty() {
        bail!("no files matched the given inputs");
    }
    for (file, hex) in checksum::checksum_files(&files)? {
        println!("{}\t{hex}", file.display());
    }
    if let Some(save) = &args.save {
        checksum::write_ledger(&files, save)?;
        println!("{}", save.display());
    }
    Ok(true)
}

fn path_mode(absolute: bool) -> PathMode {
    if absolute {
        PathMode::Absolute
    } else {
        PathMode::Relative
    }
}

fn parse_attr_pairs(pairs: &[String]) -> Result<Option<Attrs>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    if pairs.len() % 2 != 0 {
        bail!("--attrs takes KEY VALUE pairs; got an odd number of values");
    }
    let mut attrs = Attrs::new();
    for kv in pairs.chunks_exact(2) {
        if kv[0] == ATTR_VIRTUAL {
            bail!("attribute '{}' is reserved", ATTR_VIRTUAL);
        }
        attrs.insert(kv[0].clone(), kv[1].clone());
    }
    Ok(Some(attrs))
}

/// Expand files, directories, and glob patterns into a sorted, deduplicated
/// file list, then apply the select/exclude name filters.
fn expand_inputs(
    inputs: &[PathBuf],
    recursive: bool,
    select: Option<&str>,
    exclude: Option<&str>,
    dir_ext: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            let pattern = if recursive {
                input.join(format!("**/*.{dir_ext}"))
            } else {
                input.join(format!("*.{dir_ext}"))
            };
            collect_glob(&pattern.to_string_lossy(), &mut files)?;
        } else if input.to_string_lossy().contains(['*', '?', '[']) {
            collect_glob(&input.to_string_lossy(), &mut files)?;
        } else if input.is_file() {
            files.insert(input.clone());
        } else {
            bail!("input '{}' does not exist", input.display());
        }
    }

    let select = select.map(glob::Pattern::new).transpose()?;
    let exclude = exclude.map(glob::Pattern::new).transpose()?;
    let name_of = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    Ok(files
        .into_iter()
        .filter(|p| select.as_ref().is_none_or(|s| s.matches(&name_of(p))))
        .filter(|p| !exclude.as_ref().is_some_and(|e| e.matches(&name_of(p))))
        .collect())
}

fn collect_glob(pattern: &str, out: &mut BTreeSet<PathBuf>) -> Result<()> {
    for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern '{pattern}'"))? {
        let path = entry?;
        if path.is_file() {
            out.insert(path);
        }
    }
    Ok(())
}

fn confirm(action: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        // Non-interactive stdin cannot answer; require --unattended intent.
        bail!("refusing to {action} without a terminal; pass --unattended");
    }
    print!("{action}? [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_pairs_parse_in_order() -> Result<()> {
        let attrs = parse_attr_pairs(&[
            "author".to_string(),
            "me".to_string(),
            "rev".to_string(),
            "2".to_string(),
        ])?
        .unwrap();
        assert_eq!(attrs.get("author").map(String::as_str), Some("me"));
        assert_eq!(attrs.get("rev").map(String::as_str), Some("2"));
        Ok(())
    }

    #[test]
    fn reserved_attr_is_rejected() {
        let res = parse_attr_pairs(&["virtual".to_string(), "true".to_string()]);
        assert!(res.is_err());
    }

    #[test]
    fn directory_expansion_filters_by_name() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        for name in ["a.pt0.rpk", "a.pt1.rpk", "b.rpk", "notes.txt"] {
            std::fs::write(tmp.path().join(name), b"")?;
        }
        let all = expand_inputs(&[tmp.path().to_path_buf()], false, None, None, "rpk")?;
        assert_eq!(all.len(), 3);

        let selected = expand_inputs(
            &[tmp.path().to_path_buf()],
            false,
            Some("a.*"),
            None,
            "rpk",
        )?;
        assert_eq!(selected.len(), 2);

        let excluded = expand_inputs(
            &[tmp.path().to_path_buf()],
            false,
            None,
            Some("a.*"),
            "rpk",
        )?;
        assert_eq!(excluded.len(), 1);
        Ok(())
    }
}
