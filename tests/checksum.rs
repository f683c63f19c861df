use anyhow::Result;
use rowpack::checksum::{checksum_files, file_checksum, verify_ledger, write_ledger};
use rowpack::codec::{self, Samples};
use rowpack::config::{RunContext, load_config};
use rowpack::writer::{PackOptions, Partitioning, pack_dataset};
use std::fs;

#[test]
fn known_digest_matches() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let f = tmp.path().join("abc.txt");
    fs::write(&f, b"abc")?;
    // SHA-256("abc"), a fixed point of the algorithm choice.
    assert_eq!(
        file_checksum(&f)?,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    Ok(())
}

#[test]
fn bulk_hashing_preserves_input_order() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut files = Vec::new();
    for i in 0..8 {
        let f = tmp.path().join(format!("f{i}.bin"));
        fs::write(&f, vec![i as u8; 100])?;
        files.push(f);
    }
    let sums = checksum_files(&files)?;
    assert_eq!(sums.len(), 8);
    for (i, (path, hex)) in sums.iter().enumerate() {
        assert_eq!(path, &files[i]);
        assert_eq!(hex, &file_checksum(path)?);
    }
    Ok(())
}

#[test]
fn pack_ledger_verifies_and_reports_corruption() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    codec::write_wav(tmp.path().join("a.wav"), 16_000, &Samples::I16(vec![1; 4]))?;
    codec::write_wav(tmp.path().join("b.wav"), 16_000, &Samples::I16(vec![2; 4]))?;
    fs::write(tmp.path().join("dataset.csv"), "path\na.wav\nb.wav\n")?;
    let config_path = tmp.path().join("rowpack.yaml");
    fs::write(
        &config_path,
        r#"
datasets:
  clips:
    data:
      file: dataset.csv
      fields:
        audio: { column: path, parser: audio_i16 }
"#,
    )?;

    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let opts = PackOptions {
        partitioning: Partitioning::Count(2),
        show_progress: false,
        ..PackOptions::default()
    };
    let report = pack_dataset(
        config.dataset("clips").unwrap(),
        &ctx,
        &tmp.path().join("out/clips"),
        &opts,
    )?;
    let ledger = report.ledger.as_ref().unwrap();

    // Fresh output verifies clean: two partitions plus the virtual view.
    let checks = verify_ledger(ledger)?;
    assert_eq!(checks.len(), 3);
    assert!(checks.iter().all(|c| c.matches()));

    // Corrupting one partition flips exactly that line.
    let victim = &report.partitions[1];
    let mut bytes = fs::read(victim)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(victim, bytes)?;

    let checks = verify_ledger(ledger)?;
    let bad: Vec<_> = checks.iter().filter(|c| !c.matches()).collect();
    assert_eq!(bad.len(), 1);
    assert_eq!(
        bad[0].name,
        victim.file_name().unwrap().to_string_lossy()
    );
    Ok(())
}

#[test]
fn ledger_with_a_missing_file_is_an_error() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let f = tmp.path().join("gone.bin");
    fs::write(&f, b"bytes")?;
    let ledger = tmp.path().join("gone.sha256");
    write_ledger(&[f.clone()], &ledger)?;
    fs::remove_file(&f)?;
    assert!(verify_ledger(&ledger).is_err());
    Ok(())
}
