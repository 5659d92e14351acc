//! Round trips through real netCDF files

use ndarray::{ArrayD, IxDyn};
use ru_ne_grid::concat::{concat_variable_along_dimension, ConcatSources};
use ru_ne_grid::copy::copy_variable;
use ru_ne_grid::dataset::{
    ArrayData, AttrValue, DataType, DatasetReader, DatasetWriter, Flavor, NcDataset, Scalar,
    VariableOptions,
};
use ru_ne_grid::errors::{Result, RuNeGridError};
use ru_ne_grid::history::append_history;
use ru_ne_grid::subset::extract_subset;
use std::path::Path;
use tempfile::tempdir;

fn write_source(path: &Path, offset: f32) -> Result<()> {
    let mut ds = NcDataset::create(path, Flavor::Extended)?;
    ds.add_dimension("time", None)?;
    ds.add_dimension("x", Some(3))?;
    ds.add_variable("time", DataType::Float64, &["time".to_string()], &VariableOptions::default())?;
    ds.add_variable(
        "temp",
        DataType::Float32,
        &["time".to_string(), "x".to_string()],
        &VariableOptions::default().with_fill_value(Scalar::Float32(-999.0)),
    )?;
    ds.set_variable_attribute("temp", "units", AttrValue::from("K"))?;
    ds.set_global_attribute("title", AttrValue::from("test data"))?;

    let time = ArrayData::Float64(ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.0, 1.0]).unwrap());
    ds.write("time", &[0], &time)?;
    let temp = ArrayData::Float32(
        ArrayD::from_shape_vec(IxDyn(&[2, 3]), (0..6).map(|v| v as f32 + offset).collect()).unwrap(),
    );
    ds.write("temp", &[0, 0], &temp)?;
    Ok(())
}

#[test]
fn test_netcdf_copy_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let source_path = temp_dir.path().join("source.nc");
    let output_path = temp_dir.path().join("output.nc");
    write_source(&source_path, 0.0)?;

    {
        let source = NcDataset::open(&source_path)?;
        assert_eq!(source.flavor(), Flavor::Extended);
        assert!(source.dimension("time").unwrap().is_unlimited);
        assert_eq!(source.dimension("time").unwrap().length, 2);

        let mut target = NcDataset::create(&output_path, Flavor::Extended)?;
        copy_variable(&source, &mut target, "temp", false, &VariableOptions::default())?;
        append_history(&mut target, "copied temp")?;
    }

    let source = NcDataset::open(&source_path)?;
    let output = NcDataset::open(&output_path)?;
    assert_eq!(output.read_all("temp")?, source.read_all("temp")?);
    assert_eq!(output.read_all("time")?, source.read_all("time")?);
    let temp = output.variable("temp").unwrap();
    assert_eq!(temp.attribute("units"), Some(&AttrValue::from("K")));
    assert_eq!(temp.fill_value, Some(Scalar::Float32(-999.0)));
    let history = output.global_attribute("history").unwrap();
    assert!(history.as_str().unwrap().ends_with(": copied temp"));
    Ok(())
}

#[test]
fn test_netcdf_rejects_overwrite() -> Result<()> {
    let temp_dir = tempdir()?;
    let source_path = temp_dir.path().join("source.nc");
    let output_path = temp_dir.path().join("output.nc");
    write_source(&source_path, 0.0)?;

    let source = NcDataset::open(&source_path)?;
    let mut target = NcDataset::create(&output_path, Flavor::Extended)?;
    copy_variable(&source, &mut target, "temp", false, &VariableOptions::default())?;
    let result = copy_variable(&source, &mut target, "temp", true, &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::Unsupported { .. })));
    assert_eq!(target.read_all("temp")?, source.read_all("temp")?);
    Ok(())
}

#[test]
fn test_netcdf_blocked_subset() -> Result<()> {
    let temp_dir = tempdir()?;
    let source_path = temp_dir.path().join("source.nc");
    let output_path = temp_dir.path().join("subset.nc");
    write_source(&source_path, 10.0)?;

    let source = NcDataset::open(&source_path)?;
    let mut target = NcDataset::create(&output_path, Flavor::Extended)?;
    let info = extract_subset(
        &source,
        &mut target,
        "temp",
        &[None, Some(1..3)],
        Some("temp_east"),
        4,
        &VariableOptions::default(),
    )?;
    assert_eq!(info.shape, vec![2, 2]);
    let data = target.read_all("temp_east")?;
    assert_eq!(data.get(&[0, 0]), Some(Scalar::Float32(11.0)));
    assert_eq!(data.get(&[1, 1]), Some(Scalar::Float32(15.0)));
    Ok(())
}

#[test]
fn test_netcdf_labeled_concat() -> Result<()> {
    let temp_dir = tempdir()?;
    let paths: Vec<_> = (0..3)
        .map(|i| temp_dir.path().join(format!("member_{i}.nc")))
        .collect();
    for (i, path) in paths.iter().enumerate() {
        write_source(path, 100.0 * i as f32)?;
    }
    let datasets = paths
        .iter()
        .map(NcDataset::open)
        .collect::<Result<Vec<_>>>()?;
    let sources = ConcatSources::Labeled(
        ["a", "b", "c"]
            .iter()
            .map(|l| l.to_string())
            .zip(datasets.iter())
            .collect(),
    );

    let output_path = temp_dir.path().join("ensemble.nc");
    let mut target = NcDataset::create(&output_path, Flavor::Extended)?;
    let info = concat_variable_along_dimension(&sources, &mut target, "temp", "member", &VariableOptions::default())?;
    assert_eq!(info.shape, vec![3, 2, 3]);
    assert_eq!(target.read_all("member")?, ArrayData::from_strings(&["a", "b", "c"])?);
    let stacked = target.read_all("temp")?;
    assert_eq!(stacked.get(&[2, 0, 1]), Some(Scalar::Float32(201.0)));
    Ok(())
}

#[test]
fn test_classic_file_rejects_string_labels() -> Result<()> {
    let temp_dir = tempdir()?;
    let first = temp_dir.path().join("first.nc");
    let second = temp_dir.path().join("second.nc");
    write_source(&first, 0.0)?;
    write_source(&second, 1.0)?;
    let a = NcDataset::open(&first)?;
    let b = NcDataset::open(&second)?;

    let mut target = NcDataset::create(temp_dir.path().join("classic.nc"), Flavor::Classic)?;
    let sources = ConcatSources::Labeled(vec![("a".to_string(), &a), ("b".to_string(), &b)]);
    let result = concat_variable_along_dimension(&sources, &mut target, "temp", "member", &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::Unsupported { .. })));
    assert!(target.variable_names().is_empty());
    Ok(())
}
