use anyhow::Result;
use rowpack::error::PackError;
use rowpack::store::format::{Container, ContainerWriter};
use rowpack::store::{Array, Dataset, Dtype, Payload};

#[test]
fn container_roundtrips_attrs_and_payload_kinds() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("mixed.rpk");

    let mut w = ContainerWriter::create(&path)?;
    w.set_attr("author", "store fixtures");
    w.add_dataset(Dataset::dense_2d(
        "grid",
        Array::I16(vec![1, 2, 3, 4, 5, 6]),
        2,
        3,
    ))?;
    w.add_dataset(Dataset::ragged(
        "jagged",
        vec![Array::F64(vec![0.5]), Array::F64(vec![1.5, 2.5])],
        Dtype::F64,
    ))?;
    w.add_dataset(Dataset::strings(
        "labels",
        vec!["yes".to_string(), "no".to_string()],
    ))?;
    w.finish()?;

    let c = Container::open(&path)?;
    assert_eq!(c.attrs()["author"], "store fixtures");
    assert!(!c.is_virtual());
    assert_eq!(c.datasets().len(), 3);

    let grid = c.read_dataset("grid")?;
    assert_eq!(grid.shape, vec![2, 3]);
    assert_eq!(grid.row(1), Some(Array::I16(vec![4, 5, 6])));

    let jagged = c.read_dataset("jagged")?;
    assert_eq!(jagged.dtype, Dtype::F64);
    assert_eq!(jagged.row(0), Some(Array::F64(vec![0.5])));
    assert_eq!(jagged.row(1), Some(Array::F64(vec![1.5, 2.5])));

    let labels = c.read_dataset("labels")?;
    assert!(matches!(labels.payload, Payload::Strings(_)));
    assert_eq!(labels.string_row(1), Some("no"));
    Ok(())
}

#[test]
fn duplicate_dataset_names_are_rejected() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut w = ContainerWriter::create(&tmp.path().join("dup.rpk"))?;
    w.add_dataset(Dataset::dense_1d("x", Array::F32(vec![1.0])))?;
    assert!(
        w.add_dataset(Dataset::dense_1d("x", Array::F32(vec![2.0])))
            .is_err()
    );
    Ok(())
}

#[test]
fn foreign_bytes_are_an_invalid_partition() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("foreign.rpk");
    std::fs::write(&path, b"HDF5 or whatever this is, it is not ours")?;
    let err = Container::open(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PackError>(),
        Some(PackError::InvalidPartition { .. })
    ));
    Ok(())
}

#[test]
fn missing_dataset_lookup_fails_by_name() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("one.rpk");
    let mut w = ContainerWriter::create(&path)?;
    w.add_dataset(Dataset::dense_1d("present", Array::F32(vec![1.0])))?;
    w.finish()?;

    let c = Container::open(&path)?;
    assert!(c.dataset("absent").is_none());
    let err = c.read_dataset("absent").unwrap_err();
    assert!(err.to_string().contains("absent"));
    Ok(())
}
