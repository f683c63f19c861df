use anyhow::Result;
use rowpack::codec::{self, Samples};
use rowpack::config::{RunContext, load_config};
use rowpack::error::PackError;
use rowpack::store::format::Container;
use rowpack::store::{ATTR_PRODUCER, ATTR_VIRTUAL, Array, Payload};
use rowpack::writer::{PackOptions, Partitioning, pack_dataset};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG: &str = r#"
datasets:
  speech:
    attrs:
      author: fixtures
    data:
      file: dataset.csv
      fields:
        audio:
          column: path
          parser: audio_i16
        label:
          column: text
          parser: utf8
        score:
          column: score
          parser: f32
"#;

/// Ten rows: clip `i` has `i + 1` samples, so per-row lengths are unique and
/// the audio field encodes as ragged.
fn build_source_tree(root: &Path) -> Result<PathBuf> {
    let clips = root.join("clips");
    let mut csv = String::from("path,text,score\n");
    for i in 0..10 {
        let samples = Samples::I16((0..=i as i16).collect());
        codec::write_wav(clips.join(format!("clip{i}.wav")), 16_000, &samples)?;
        csv.push_str(&format!("clips/clip{i}.wav,word{i},{}.5\n", i));
    }
    fs::write(root.join("dataset.csv"), csv)?;
    let config_path = root.join("rowpack.yaml");
    fs::write(&config_path, CONFIG)?;
    Ok(config_path)
}

fn quiet_opts() -> PackOptions {
    PackOptions {
        show_progress: false,
        ..PackOptions::default()
    }
}

#[test]
fn parallel_pack_produces_partitions_virtual_and_ledger() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    let opts = PackOptions {
        partitioning: Partitioning::Count(3),
        workers: 2,
        ..quiet_opts()
    };
    let report = pack_dataset(spec, &ctx, &tmp.path().join("out/speech"), &opts)?;

    assert_eq!(report.partitions.len(), 3);
    assert_eq!(
        report.partitions[0].file_name().unwrap().to_string_lossy(),
        "speech.pt0.rpk"
    );
    let virtual_file = report.virtual_file.as_ref().unwrap();
    assert_eq!(virtual_file.file_name().unwrap().to_string_lossy(), "speech.rpk");
    assert!(report.ledger.as_ref().unwrap().is_file());

    // The virtual view stitches all 10 rows back together in order.
    let view = Container::open(virtual_file)?;
    assert!(view.is_virtual());
    assert!(view.attrs()[ATTR_PRODUCER].starts_with("rowpack"));
    assert_eq!(view.attrs()["author"], "fixtures");

    let audio = view.read_dataset("audio")?;
    assert_eq!(audio.rows(), 10);
    for i in 0..10 {
        assert_eq!(audio.row(i).unwrap().len(), i + 1);
    }
    let labels = view.read_dataset("label")?;
    assert_eq!(labels.string_row(3), Some("word3"));
    let names = view.read_dataset("audio_filenames")?;
    assert_eq!(names.string_row(9), Some("clip9.wav"));
    Ok(())
}

#[test]
fn logical_row_five_lands_in_partition_one() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    // 10 rows over 3 partitions slice as [0,4), [4,7), [7,10).
    let opts = PackOptions {
        partitioning: Partitioning::Count(3),
        workers: 1,
        build_virtual: false,
        write_checksums: false,
        ..quiet_opts()
    };
    let report = pack_dataset(spec, &ctx, &tmp.path().join("out/speech"), &opts)?;

    let middle = Container::open(&report.partitions[1])?;
    let score = middle.read_dataset("score")?;
    assert_eq!(score.rows(), 3);
    match score.row(1).unwrap() {
        Array::F32(v) => assert_eq!(v, vec![5.5]),
        other => panic!("unexpected array type: {other:?}"),
    }
    Ok(())
}

#[test]
fn existing_output_is_refused_without_overwrite() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    let output = tmp.path().join("out/speech");
    pack_dataset(spec, &ctx, &output, &quiet_opts())?;

    let err = pack_dataset(spec, &ctx, &output, &quiet_opts()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PackError>(),
        Some(PackError::FileExists { .. })
    ));

    let overwriting = PackOptions {
        overwrite: true,
        ..quiet_opts()
    };
    pack_dataset(spec, &ctx, &output, &overwriting)?;
    Ok(())
}

#[test]
fn pack_unpack_roundtrip_preserves_rows_and_basenames() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    let opts = PackOptions {
        partitioning: Partitioning::Count(2),
        ..quiet_opts()
    };
    let report = pack_dataset(spec, &ctx, &tmp.path().join("out/speech"), &opts)?;
    let virtual_file = report.virtual_file.as_ref().unwrap();

    let extracted = tmp.path().join("extracted");
    let unpack = rowpack::extract::unpack(virtual_file, &extracted, false)?;
    assert_eq!(unpack.audio_files, 10);

    // Per-row sample counts and basename order survive the round trip.
    for i in 0..10 {
        let wav = extracted.join("data/audio").join(format!("clip{i}.wav"));
        let info = codec::read_wav_info(&wav)?;
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.frames, i as u64 + 1);
    }

    // The regenerated config is itself packable.
    let round = load_config(&unpack.config)?;
    let round_ctx = RunContext::for_config(&unpack.config);
    let round_spec = &round.datasets[0];
    assert_eq!(round_spec.attrs["author"], "fixtures");
    let repacked = pack_dataset(
        round_spec,
        &round_ctx,
        &tmp.path().join("out/again"),
        &quiet_opts(),
    )?;
    let again = Container::open(&repacked.partitions[0])?;
    assert_eq!(again.read_dataset("audio")?.rows(), 10);
    assert!(!again.attrs().contains_key(ATTR_VIRTUAL));
    Ok(())
}

#[test]
fn encoder_failure_aborts_the_run() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    // Truncate one clip to junk after validation would have passed on it.
    fs::write(tmp.path().join("clips/clip7.wav"), b"not a riff file")?;

    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    let opts = PackOptions {
        partitioning: Partitioning::Count(2),
        workers: 2,
        validate: false,
        ..quiet_opts()
    };
    let err = pack_dataset(spec, &ctx, &tmp.path().join("out/speech"), &opts).unwrap_err();
    assert!(format!("{err:#}").contains("clip7.wav"), "error was: {err:#}");
    Ok(())
}

#[test]
fn rows_per_partition_mode_derives_a_balanced_count() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let config_path = build_source_tree(tmp.path())?;
    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let spec = config.dataset("speech").unwrap();

    let opts = PackOptions {
        partitioning: Partitioning::RowsPer(4),
        build_virtual: false,
        write_checksums: false,
        ..quiet_opts()
    };
    let report = pack_dataset(spec, &ctx, &tmp.path().join("out/speech"), &opts)?;
    assert_eq!(report.partitions.len(), 3);

    // ceil(10 / 4) = 3 partitions, rebalanced to sizes within one of each other.
    let rows: Vec<u64> = report
        .partitions
        .iter()
        .map(|p| -> Result<u64> {
            let c = Container::open(p)?;
            Ok(c.dataset("score").unwrap().rows())
        })
        .collect::<Result<_>>()?;
    assert_eq!(rows, vec![4, 3, 3]);
    Ok(())
}

#[test]
fn uniform_audio_lengths_encode_dense() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let clips = tmp.path().join("clips");
    let mut csv = String::from("path\n");
    for i in 0..4 {
        let samples = Samples::I16(vec![i as i16; 8]);
        codec::write_wav(clips.join(format!("tone{i}.wav")), 8_000, &samples)?;
        csv.push_str(&format!("clips/tone{i}.wav\n"));
    }
    fs::write(tmp.path().join("dataset.csv"), csv)?;
    let config_path = tmp.path().join("rowpack.yaml");
    fs::write(
        &config_path,
        r#"
datasets:
  tones:
    data:
      file: dataset.csv
      fields:
        audio: { column: path, parser: audio_f32 }
"#,
    )?;

    let config = load_config(&config_path)?;
    let ctx = RunContext::for_config(&config_path);
    let report = pack_dataset(
        config.dataset("tones").unwrap(),
        &ctx,
        &tmp.path().join("tones"),
        &quiet_opts(),
    )?;

    let container = Container::open(&report.partitions[0])?;
    let audio = container.read_dataset("audio")?;
    assert_eq!(audio.shape, vec![4, 8]);
    assert!(matches!(audio.payload, Payload::Dense(_)));
    Ok(())
}
