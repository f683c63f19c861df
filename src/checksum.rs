//! Content checksums and the checksum ledger.
//!
//! The ledger is a tab-separated text file, one `basename<TAB>hex` line per
//! artifact. Generation appends one line per file; verification recomputes
//! each referenced file's checksum relative to the ledger's directory and
//! reports every line's outcome. This is the one path in the crate with
//! report-all semantics instead of fail-fast.

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Extension used for ledger files.
pub const LEDGER_EXT: &str = "sha256";

/// Streaming SHA-256 of a file, as lowercase hex.
pub fn file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checksum many files in parallel, preserving input order.
pub fn checksum_files(files: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    files
        .par_iter()
        .map(|f| Ok((f.clone(), file_checksum(f)?)))
        .collect()
}

/// Write a ledger covering `files`, one line per file in order.
pub fn write_ledger(files: &[PathBuf], ledger_path: impl AsRef<Path>) -> Result<()> {
    let ledger_path = ledger_path.as_ref();
    let checksums = checksum_files(files)?;
    let mut out = File::create(ledger_path)
        .with_context(|| format!("create {}", ledger_path.display()))?;
    for (file, checksum) in checksums {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        writeln!(out, "{name}\t{checksum}")?;
    }
    Ok(())
}

/// Outcome of re-checking one ledger line.
#[derive(Clone, Debug)]
pub struct LedgerCheck {
    pub name: String,
    pub expected: String,
    pub actual: String,
}

impl LedgerCheck {
    pub fn matches(&self) -> bool {
        self.expected == self.actual
    }
}

/// Verify every line of a ledger, resolving names against the ledger's
/// directory. Mismatches are reported, not raised; a malformed line or a
/// missing referenced file is an error.
pub fn verify_ledger(ledger_path: impl AsRef<Path>) -> Result<Vec<LedgerCheck>> {
    let ledger_path = ledger_path.as_ref();
    let content = std::fs::read_to_string(ledger_path)
        .with_context(|| format!("open {}", ledger_path.display()))?;
    let root = ledger_path.parent().unwrap_or_else(|| Path::new("."));

    let mut checks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((name, expected)) = line.split_once('\t') else {
            bail!(
                "malformed ledger line {} in '{}': expected 'name<TAB>checksum'",
                idx + 1,
                ledger_path.display()
            );
        };
        let file = root.join(name);
        let actual = file_checksum(&file).with_context(|| {
            format!(
                "file referenced by ledger line {} is unreadable",
                idx + 1
            )
        })?;
        checks.push(LedgerCheck {
            name: name.to_string(),
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_idempotent() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let f = tmp.path().join("a.bin");
        std::fs::write(&f, b"stable bytes")?;
        assert_eq!(file_checksum(&f)?, file_checksum(&f)?);
        Ok(())
    }

    #[test]
    fn ledger_roundtrip_reports_all() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        std::fs::write(&a, b"aaa")?;
        std::fs::write(&b, b"bbb")?;
        let ledger = tmp.path().join("files.sha256");
        write_ledger(&[a.clone(), b.clone()], &ledger)?;

        // Corrupt one file; verification must still report both lines.
        std::fs::write(&b, b"tampered")?;
        let checks = verify_ledger(&ledger)?;
        assert_eq!(checks.len(), 2);
        assert!(checks[0].matches());
        assert!(!checks[1].matches());
        Ok(())
    }

    #[test]
    fn malformed_line_is_an_error() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ledger = tmp.path().join("bad.sha256");
        std::fs::write(&ledger, "no-tab-here\n")?;
        assert!(verify_ledger(&ledger).is_err());
        Ok(())
    }
}
