//! Behavioral tests of the copy, subset, concatenation and warp operations
//! against the in-memory backend.

use ndarray::{ArrayD, IxDyn};
use ru_ne_grid::concat::{concat_variable_along_dimension, ConcatSources};
use ru_ne_grid::copy::{copy_attributes, copy_dimension, copy_variable, create_variable_like};
use ru_ne_grid::dataset::{
    attributes_to_json, set_attributes_from_json, ArrayData, AttrValue, DataType, DatasetReader,
    DatasetWriter, MemoryDataset, Scalar, VariableInfo, VariableOptions,
};
use ru_ne_grid::errors::{EntityKind, Result, RuNeGridError};
use ru_ne_grid::fill::resolve_fill_value;
use ru_ne_grid::metadata::summarize_dataset;
use ru_ne_grid::spatial::{get_crs, set_crs, Projection};
use ru_ne_grid::statistics::collect_statistics;
use ru_ne_grid::subset::extract_subset;
use ru_ne_grid::warp::{warp_like, Resampling};
use serde_json::json;

fn f64_array(shape: &[usize], values: Vec<f64>) -> ArrayData {
    ArrayData::Float64(ArrayD::from_shape_vec(IxDyn(shape), values).unwrap())
}

fn f32_array(shape: &[usize], values: Vec<f32>) -> ArrayData {
    ArrayData::Float32(ArrayD::from_shape_vec(IxDyn(shape), values).unwrap())
}

/// time(3) and x(4) with a "time" coordinate and a float "temp" carrying a fill value
fn climate_source() -> Result<MemoryDataset> {
    let mut ds = MemoryDataset::new();
    ds.add_dimension("time", Some(3))?;
    ds.add_dimension("x", Some(4))?;
    ds.add_variable_with_data(
        "time",
        &["time"],
        f64_array(&[3], vec![0.0, 1.0, 2.0]),
        &VariableOptions::default(),
    )?;
    ds.set_variable_attribute("time", "units", AttrValue::from("days since 2000-01-01"))?;

    let mut values: Vec<f32> = (0..12).map(|v| v as f32).collect();
    values[5] = -999.0;
    ds.add_variable_with_data(
        "temp",
        &["time", "x"],
        f32_array(&[3, 4], values),
        &VariableOptions::default().with_fill_value(Scalar::Float32(-999.0)),
    )?;
    ds.set_variable_attribute("temp", "units", AttrValue::from("K"))?;
    ds.set_variable_attribute("temp", "valid_range", AttrValue::Floats(vec![0.0, 400.0]))?;
    Ok(ds)
}

fn sorted(mut attributes: Vec<(String, AttrValue)>) -> Vec<(String, AttrValue)> {
    attributes.sort_by(|a, b| a.0.cmp(&b.0));
    attributes
}

#[test]
fn test_copy_fidelity() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    copy_variable(&source, &mut target, "temp", false, &VariableOptions::default())?;

    assert_eq!(target.read_all("temp")?, source.read_all("temp")?);
    let copied = target.variable("temp").unwrap();
    let original = source.variable("temp").unwrap();
    assert_eq!(copied.dtype, original.dtype);
    assert_eq!(copied.dimensions, original.dimensions);
    assert_eq!(sorted(copied.attributes), sorted(original.attributes));
    Ok(())
}

#[test]
fn test_dependency_closure() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    copy_variable(&source, &mut target, "temp", false, &VariableOptions::default())?;

    assert!(target.has_variable("time"));
    assert_eq!(target.read_all("time")?, source.read_all("time")?);
    assert_eq!(
        target.variable("time").unwrap().attribute("units"),
        Some(&AttrValue::from("days since 2000-01-01"))
    );
    assert_eq!(target.dimension("x").unwrap().length, 4);
    assert_eq!(target.variable_names(), vec!["time", "temp"]);
    Ok(())
}

#[test]
fn test_fill_precedence() {
    let info = VariableInfo {
        name: "v".to_string(),
        dtype: DataType::Int16,
        dimensions: vec![],
        shape: vec![],
        fill_value: None,
        attributes: vec![
            ("missing_value".to_string(), AttrValue::Short(-2)),
            ("_FillValue".to_string(), AttrValue::Short(-1)),
        ],
    };
    assert_eq!(resolve_fill_value(&info).unwrap(), Scalar::Int16(-1));

    let bare = VariableInfo {
        attributes: vec![],
        ..info
    };
    assert_eq!(resolve_fill_value(&bare).unwrap(), Scalar::Int16(-32767));
}

#[test]
fn test_conflict_detection_leaves_target_unmodified() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    target.add_dimension("x", Some(5))?;

    let result = copy_dimension(&source, &mut target, "x", false, false);
    assert!(matches!(
        result,
        Err(RuNeGridError::AlreadyExists {
            kind: EntityKind::Dimension,
            ..
        })
    ));
    assert_eq!(target.dimension_names(), vec!["x"]);
    assert_eq!(target.dimension("x").unwrap().length, 5);

    // "temp" needs x(4): the conflict is found before "time" is created
    let result = copy_variable(&source, &mut target, "temp", false, &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::DimensionConflict { .. })));
    assert_eq!(target.dimension_names(), vec!["x"]);
    assert!(target.variable_names().is_empty());
    Ok(())
}

#[test]
fn test_overwriting_dimension_in_use_fails() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    copy_variable(&source, &mut target, "temp", false, &VariableOptions::default())?;
    let result = copy_dimension(&source, &mut target, "x", true, false);
    assert!(matches!(result, Err(RuNeGridError::DimensionInUse { .. })));
    assert!(target.has_variable("temp"));
    Ok(())
}

#[test]
fn test_unlimited_dimension_copy() -> Result<()> {
    let mut source = MemoryDataset::new();
    source.add_dimension("record", None)?;
    source.add_variable_with_data(
        "count",
        &["record"],
        ArrayData::Int32(ArrayD::from_shape_vec(IxDyn(&[2]), vec![1, 2]).unwrap()),
        &VariableOptions::default(),
    )?;

    let mut target = MemoryDataset::new();
    let dim = copy_dimension(&source, &mut target, "record", false, true)?;
    assert!(dim.is_unlimited);

    let mut fixed = MemoryDataset::new();
    let dim = copy_dimension(&source, &mut fixed, "record", false, false)?;
    assert!(!dim.is_unlimited);
    assert_eq!(dim.length, 2);
    Ok(())
}

#[test]
fn test_create_variable_like() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    let info = create_variable_like(
        &mut target,
        "anomaly",
        &source,
        "temp",
        false,
        &VariableOptions::default(),
    )?;
    assert_eq!(info.shape, vec![3, 4]);
    assert_eq!(info.dtype, DataType::Float32);
    assert_eq!(info.fill_value, Some(Scalar::Float32(-999.0)));
    assert!(target.has_variable("time"));
    assert!(!target.has_variable("temp"));
    // Only the fill value, no copied attributes
    assert!(info.attribute("units").is_none());
    Ok(())
}

#[test]
fn test_copy_attributes_validates_first() -> Result<()> {
    let source = climate_source()?;
    let mut target = MemoryDataset::new();
    copy_variable(&source, &mut target, "time", false, &VariableOptions::default())?;

    let result = copy_attributes(&source, Some("temp"), &mut target, Some("time"), &["valid_range", "missing"], false);
    assert!(matches!(result, Err(RuNeGridError::MissingAttribute { .. })));
    assert!(target.variable("time").unwrap().attribute("valid_range").is_none());

    let result = copy_attributes(&source, Some("temp"), &mut target, Some("time"), &["units"], false);
    assert!(matches!(result, Err(RuNeGridError::AlreadyExists { .. })));

    copy_attributes(&source, Some("temp"), &mut target, Some("time"), &["units"], true)?;
    assert_eq!(
        target.variable("time").unwrap().attribute("units"),
        Some(&AttrValue::from("K"))
    );
    Ok(())
}

fn grid_source() -> Result<MemoryDataset> {
    let mut ds = MemoryDataset::new();
    ds.add_dimension("row", Some(10))?;
    ds.add_dimension("col", Some(3))?;
    ds.add_variable_with_data(
        "row",
        &["row"],
        f64_array(&[10], (0..10).map(|v| v as f64 * 0.5).collect()),
        &VariableOptions::default(),
    )?;
    ds.add_variable_with_data(
        "value",
        &["row", "col"],
        ArrayData::Int32(ArrayD::from_shape_vec(IxDyn(&[10, 3]), (0..30).collect()).unwrap()),
        &VariableOptions::default(),
    )?;
    Ok(ds)
}

#[test]
fn test_blocksize_invariance() -> Result<()> {
    let source = grid_source()?;
    let slices = [Some(2..9), Some(1..3)];

    let mut bulk = MemoryDataset::new();
    extract_subset(&source, &mut bulk, "value", &slices, None, 1_000, &VariableOptions::default())?;
    let mut blocked = MemoryDataset::new();
    extract_subset(&source, &mut blocked, "value", &slices, None, 3, &VariableOptions::default())?;

    let expected = bulk.read_all("value")?;
    assert_eq!(expected.shape(), &[7, 2]);
    assert_eq!(expected.get(&[0, 0]), Some(Scalar::Int32(7)));
    assert_eq!(expected.get(&[6, 1]), Some(Scalar::Int32(26)));
    assert_eq!(blocked.read_all("value")?, expected);

    // The coordinate variable is subset alongside
    assert_eq!(blocked.read_all("row")?, f64_array(&[7], vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0]));
    assert_eq!(blocked.read_all("row")?, bulk.read_all("row")?);
    Ok(())
}

#[test]
fn test_subset_output_name_and_bounds() -> Result<()> {
    let source = grid_source()?;
    let mut target = MemoryDataset::new();
    let info = extract_subset(
        &source,
        &mut target,
        "value",
        &[Some(0..2), None],
        Some("head"),
        DEFAULT_TEST_BLOCKSIZE,
        &VariableOptions::default(),
    )?;
    assert_eq!(info.name, "head");
    assert_eq!(info.shape, vec![2, 3]);

    let result = extract_subset(
        &source,
        &mut target,
        "value",
        &[Some(0..2), None],
        Some("head"),
        DEFAULT_TEST_BLOCKSIZE,
        &VariableOptions::default(),
    );
    assert!(matches!(result, Err(RuNeGridError::AlreadyExists { .. })));

    let mut fresh = MemoryDataset::new();
    let result = extract_subset(&source, &mut fresh, "value", &[Some(5..11), None], None, DEFAULT_TEST_BLOCKSIZE, &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::InvalidSlice { .. })));
    let result = extract_subset(&source, &mut fresh, "value", &[None], None, DEFAULT_TEST_BLOCKSIZE, &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::InvalidSliceCount { expected: 2, found: 1, .. })));
    assert!(fresh.dimension_names().is_empty());
    Ok(())
}

#[test]
fn test_empty_subset_spans() -> Result<()> {
    let source = grid_source()?;
    let mut target = MemoryDataset::new();
    let result = extract_subset(&source, &mut target, "value", &[Some(2..2), None], None, DEFAULT_TEST_BLOCKSIZE, &VariableOptions::default());
    assert!(matches!(result, Err(RuNeGridError::InvalidSlice { .. })));
    assert!(target.dimension_names().is_empty());

    let mut records = MemoryDataset::new();
    records.add_dimension("record", None)?;
    records.add_dimension("x", Some(2))?;
    records.add_variable_with_data("count", &["record", "x"], f64_array(&[3, 2], vec![1.0; 6]), &VariableOptions::default())?;
    let info = extract_subset(&records, &mut target, "count", &[Some(3..3), None], None, DEFAULT_TEST_BLOCKSIZE, &VariableOptions::default())?;
    assert_eq!(info.shape, vec![0, 2]);
    let record = target.dimension("record").unwrap();
    assert!(record.is_unlimited);
    assert_eq!(record.length, 0);
    Ok(())
}

const DEFAULT_TEST_BLOCKSIZE: usize = 1_000_000;

#[test]
fn test_blocksize_too_small_boundary() -> Result<()> {
    let mut source = MemoryDataset::new();
    source.add_dimension("a", Some(4))?;
    source.add_dimension("b", Some(5))?;
    source.add_dimension("c", Some(6))?;
    source.add_variable("cube", DataType::Float64, &["a".to_string(), "b".to_string(), "c".to_string()], &VariableOptions::default())?;

    let mut target = MemoryDataset::new();
    let result = extract_subset(&source, &mut target, "cube", &[None, None, None], None, 30, &VariableOptions::default());
    assert!(matches!(
        result,
        Err(RuNeGridError::BlocksizeTooSmall {
            blocksize: 30,
            secondary: 30
        })
    ));
    assert!(target.dimension_names().is_empty());

    extract_subset(&source, &mut target, "cube", &[None, None, None], None, 31, &VariableOptions::default())?;
    assert_eq!(target.variable("cube").unwrap().shape, vec![4, 5, 6]);
    Ok(())
}

fn yearly(value: f64) -> Result<MemoryDataset> {
    let mut ds = MemoryDataset::new();
    ds.add_dimension("y", Some(2))?;
    ds.add_dimension("x", Some(2))?;
    ds.add_variable_with_data(
        "y",
        &["y"],
        f64_array(&[2], vec![10.0, 20.0]),
        &VariableOptions::default(),
    )?;
    ds.add_variable_with_data(
        "precip",
        &["y", "x"],
        f64_array(&[2, 2], vec![value, value + 1.0, value + 2.0, value + 3.0]),
        &VariableOptions::default(),
    )?;
    ds.set_variable_attribute("precip", "units", AttrValue::from("mm"))?;
    Ok(ds)
}

#[test]
fn test_concatenation_order_and_labels() -> Result<()> {
    let (a, b, c) = (yearly(0.0)?, yearly(100.0)?, yearly(200.0)?);
    let sources = ConcatSources::Labeled(vec![
        ("2000".to_string(), &a),
        ("2001".to_string(), &b),
        ("2002".to_string(), &c),
    ]);
    let mut target = MemoryDataset::new();
    let info = concat_variable_along_dimension(&sources, &mut target, "precip", "year", &VariableOptions::default())?;

    assert_eq!(info.dimensions, vec!["year", "y", "x"]);
    assert_eq!(info.shape, vec![3, 2, 2]);
    assert_eq!(info.attribute("units"), Some(&AttrValue::from("mm")));
    let first = target.read("precip", &[0..1, 0..2, 0..2])?;
    assert_eq!(first, a.read_all("precip")?.insert_leading_axis());
    let last = target.read("precip", &[2..3, 0..2, 0..2])?;
    assert_eq!(last, c.read_all("precip")?.insert_leading_axis());
    assert_eq!(target.read_all("year")?, ArrayData::from_strings(&["2000", "2001", "2002"])?);
    assert!(target.has_variable("y"));
    Ok(())
}

#[test]
fn test_concatenation_validates_before_writing() -> Result<()> {
    let a = yearly(0.0)?;
    let mut odd = MemoryDataset::new();
    odd.add_dimension("y", Some(3))?;
    odd.add_dimension("x", Some(2))?;
    odd.add_variable("precip", DataType::Float64, &["y".to_string(), "x".to_string()], &VariableOptions::default())?;

    let mut target = MemoryDataset::new();
    let single = ConcatSources::Unlabeled(vec![&a]);
    assert!(matches!(
        concat_variable_along_dimension(&single, &mut target, "precip", "year", &VariableOptions::default()),
        Err(RuNeGridError::NotEnoughSources { found: 1 })
    ));

    let mismatched = ConcatSources::Unlabeled(vec![&a, &odd]);
    assert!(matches!(
        concat_variable_along_dimension(&mismatched, &mut target, "precip", "year", &VariableOptions::default()),
        Err(RuNeGridError::ShapeMismatch { .. })
    ));
    assert!(target.dimension_names().is_empty());
    assert!(target.variable_names().is_empty());
    Ok(())
}

/// 3x3 grid of one-degree cells, y descending
fn lonlat_grid(name: &str, values: Vec<f32>, fill: f32) -> Result<MemoryDataset> {
    let mut ds = MemoryDataset::new();
    ds.add_dimension("lat", Some(3))?;
    ds.add_dimension("lon", Some(3))?;
    ds.add_variable_with_data("lat", &["lat"], f64_array(&[3], vec![2.5, 1.5, 0.5]), &VariableOptions::default())?;
    ds.add_variable_with_data("lon", &["lon"], f64_array(&[3], vec![0.5, 1.5, 2.5]), &VariableOptions::default())?;
    ds.add_variable_with_data(
        name,
        &["lat", "lon"],
        f32_array(&[3, 3], values),
        &VariableOptions::default().with_fill_value(Scalar::Float32(fill)),
    )?;
    Ok(ds)
}

#[test]
fn test_warp_mask_dominance() -> Result<()> {
    let source = lonlat_grid("temp", (1..=9).map(|v| v as f32).collect(), -1.0)?;
    let mut mask_values = vec![0.0; 9];
    mask_values[4] = -9999.0;
    let mut template = lonlat_grid("land", mask_values, -9999.0)?;
    set_crs(&mut template, "land", &Projection::wgs84())?;

    let mut target = MemoryDataset::new();
    let outputs = warp_like(
        &source,
        &Projection::wgs84(),
        &["temp"],
        &mut target,
        &template,
        "land",
        Resampling::Nearest,
    )?;
    assert_eq!(outputs.len(), 1);

    let warped = target.read_all("temp")?;
    // Same grid: every unmasked cell keeps its value, the masked center is fill
    assert_eq!(warped.get(&[0, 0]), Some(Scalar::Float32(1.0)));
    assert_eq!(warped.get(&[2, 2]), Some(Scalar::Float32(9.0)));
    assert_eq!(warped.get(&[1, 1]), Some(Scalar::Float32(-1.0)));
    assert!(target.has_variable("lat") && target.has_variable("lon"));
    assert_eq!(get_crs(&target, "temp")?.map(|p| p.is_geographic()), Some(true));
    Ok(())
}

#[test]
fn test_warp_without_template_crs_fails() -> Result<()> {
    let source = lonlat_grid("temp", vec![1.0; 9], -1.0)?;
    let template = lonlat_grid("land", vec![0.0; 9], -9999.0)?;
    let mut target = MemoryDataset::new();
    let result = warp_like(&source, &Projection::wgs84(), &["temp"], &mut target, &template, "land", Resampling::Bilinear);
    assert!(matches!(result, Err(RuNeGridError::ReprojectionFailed(_))));
    Ok(())
}

/// Adds 1-D `y` and `x` coordinate variables over dimensions of the same names
fn add_axes(ds: &mut MemoryDataset, y: (&str, Vec<f64>), x: (&str, Vec<f64>)) -> Result<()> {
    for (name, values) in [y, x] {
        let len = values.len();
        ds.add_dimension(name, Some(len))?;
        ds.add_variable_with_data(name, &[name], f64_array(&[len], values), &VariableOptions::default())?;
    }
    Ok(())
}

fn assert_close(actual: Option<Scalar>, expected: f64) {
    let actual = actual.and_then(|v| v.as_f64()).unwrap();
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

#[test]
fn test_warp_bilinear_skips_missing_value_cells() -> Result<()> {
    // Only a missing_value attribute marks the -999 cell as empty
    let mut source = MemoryDataset::new();
    add_axes(&mut source, ("lat", vec![2.5, 1.5, 0.5]), ("lon", vec![0.5, 1.5, 2.5]))?;
    source.add_variable_with_data(
        "rain",
        &["lat", "lon"],
        f64_array(&[3, 3], vec![10.0, -999.0, 30.0, 10.0, 10.0, 30.0, 50.0, 50.0, 50.0]),
        &VariableOptions::default(),
    )?;
    source.set_variable_attribute("rain", "missing_value", AttrValue::Double(-999.0))?;

    // Template cells are centered between four source cell centers
    let mut template = MemoryDataset::new();
    add_axes(&mut template, ("lat", vec![2.0, 1.0]), ("lon", vec![1.0, 2.0]))?;
    template.add_variable_with_data(
        "land",
        &["lat", "lon"],
        f32_array(&[2, 2], vec![0.0; 4]),
        &VariableOptions::default().with_fill_value(Scalar::Float32(-9999.0)),
    )?;
    set_crs(&mut template, "land", &Projection::wgs84())?;

    let mut target = MemoryDataset::new();
    warp_like(&source, &Projection::wgs84(), &["rain"], &mut target, &template, "land", Resampling::Bilinear)?;

    let warped = target.read_all("rain")?;
    assert_close(warped.get(&[0, 0]), 10.0);
    assert_close(warped.get(&[0, 1]), 70.0 / 3.0);
    assert_close(warped.get(&[1, 0]), 30.0);
    assert_close(warped.get(&[1, 1]), 35.0);
    assert_eq!(target.variable("rain").unwrap().fill_value, Some(Scalar::Float64(-999.0)));
    Ok(())
}

#[test]
fn test_warp_every_leading_slice() -> Result<()> {
    let mut source = MemoryDataset::new();
    source.add_dimension("time", Some(2))?;
    source.add_variable_with_data("time", &["time"], f64_array(&[2], vec![0.0, 1.0]), &VariableOptions::default())?;
    source.set_variable_attribute("time", "units", AttrValue::from("days since 2000-01-01"))?;
    add_axes(&mut source, ("lat", vec![2.5, 1.5, 0.5]), ("lon", vec![0.5, 1.5, 2.5]))?;
    let mut values: Vec<f32> = (0..2)
        .flat_map(|t| (1..=9).map(move |v| (10 * t + v) as f32))
        .collect();
    // Empty source cell in the second slice
    values[9 + 2] = -1.0;
    source.add_variable_with_data(
        "temp",
        &["time", "lat", "lon"],
        f32_array(&[2, 3, 3], values),
        &VariableOptions::default().with_fill_value(Scalar::Float32(-1.0)),
    )?;

    // The template has its own leading "level" axis; its first slice is the mask
    let mut template = MemoryDataset::new();
    template.add_dimension("level", Some(2))?;
    add_axes(&mut template, ("lat", vec![2.5, 1.5, 0.5]), ("lon", vec![0.5, 1.5, 2.5]))?;
    let mut mask_values = vec![0.0; 18];
    mask_values[4] = -9999.0;
    mask_values[9] = -9999.0;
    template.add_variable_with_data(
        "land",
        &["level", "lat", "lon"],
        f32_array(&[2, 3, 3], mask_values),
        &VariableOptions::default().with_fill_value(Scalar::Float32(-9999.0)),
    )?;
    set_crs(&mut template, "land", &Projection::wgs84())?;

    let mut target = MemoryDataset::new();
    let outputs = warp_like(&source, &Projection::wgs84(), &["temp"], &mut target, &template, "land", Resampling::Nearest)?;
    assert_eq!(outputs[0].dimensions, vec!["time", "lat", "lon"]);
    assert_eq!(outputs[0].shape, vec![2, 3, 3]);
    assert!(target.has_dimension("level"));
    assert!(target.has_dimension("time"));
    assert_eq!(target.read_all("time")?, source.read_all("time")?);
    assert_eq!(
        target.variable("time").unwrap().attribute("units"),
        Some(&AttrValue::from("days since 2000-01-01"))
    );

    let warped = target.read_all("temp")?;
    for t in 0..2 {
        for row in 0..3 {
            for col in 0..3 {
                let expected = match (t, row, col) {
                    // Masked by the template's first level only
                    (_, 1, 1) => -1.0,
                    (1, 0, 2) => -1.0,
                    _ => (10 * t + 3 * row + col + 1) as f32,
                };
                assert_eq!(warped.get(&[t, row, col]), Some(Scalar::Float32(expected)), "slice {t} at ({row}, {col})");
            }
        }
    }
    Ok(())
}

#[test]
fn test_warp_geographic_onto_web_mercator() -> Result<()> {
    let source = lonlat_grid("temp", (1..=9).map(|v| v as f32).collect(), -1.0)?;

    // Spherical mercator x is linear in longitude; y is spaced as the
    // equator-scale equivalent of 2.5 and 0.5 degrees, which map back into
    // the first and last source rows.
    let metres_per_degree = 6_378_137.0_f64.to_radians();
    let mut template = MemoryDataset::new();
    add_axes(
        &mut template,
        ("y", vec![2.5 * metres_per_degree, 0.5 * metres_per_degree]),
        ("x", vec![1.5 * metres_per_degree, 2.5 * metres_per_degree, 3.5 * metres_per_degree]),
    )?;
    template.add_variable_with_data(
        "land",
        &["y", "x"],
        f32_array(&[2, 3], vec![0.0, 0.0, 0.0, -9999.0, 0.0, 0.0]),
        &VariableOptions::default().with_fill_value(Scalar::Float32(-9999.0)),
    )?;
    let mercator = Projection::parse("EPSG:3857")?;
    set_crs(&mut template, "land", &mercator)?;

    let mut target = MemoryDataset::new();
    let outputs = warp_like(&source, &Projection::wgs84(), &["temp"], &mut target, &template, "land", Resampling::Nearest)?;
    assert_eq!(outputs[0].dimensions, vec!["y", "x"]);

    let warped = target.read_all("temp")?;
    // Column 2 lies east of the source grid, cell (1, 0) is masked
    let expected = [[2.0, 3.0, -1.0], [-1.0, 9.0, -1.0]];
    for (row, values) in expected.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            assert_eq!(warped.get(&[row, col]), Some(Scalar::Float32(value)), "cell ({row}, {col})");
        }
    }
    assert_eq!(get_crs(&target, "temp")?.map(|p| p.is_geographic()), Some(false));
    Ok(())
}

#[test]
fn test_statistics_across_datasets() -> Result<()> {
    let mut first = MemoryDataset::new();
    first.add_dimension("n", Some(4))?;
    first.add_variable_with_data(
        "t",
        &["n"],
        f64_array(&[4], vec![1.0, 2.0, -999.0, 3.0]),
        &VariableOptions::default().with_fill_value(Scalar::Float64(-999.0)),
    )?;
    let mut second = MemoryDataset::new();
    second.add_dimension("n", Some(3))?;
    second.add_variable_with_data("t", &["n"], f64_array(&[3], vec![10.0, f64::NAN, 20.0]), &VariableOptions::default())?;

    let stats = collect_statistics(&[&first, &second], &["t"])?;
    let t = stats["t"];
    assert_eq!(t.min, 1.0);
    assert_eq!(t.max, 20.0);
    assert!((t.mean - 8.5).abs() < 1e-12);
    assert_eq!(t.datasets, 2);

    assert!(matches!(
        collect_statistics(&[&first, &second], &["missing"]),
        Err(RuNeGridError::MissingVariable { .. })
    ));
    Ok(())
}

#[test]
fn test_attribute_dictionaries() -> Result<()> {
    let source = climate_source()?;
    let attributes = attributes_to_json(&source, Some("temp"))?;
    assert_eq!(attributes["units"], json!("K"));
    assert_eq!(attributes["valid_range"], json!([0.0, 400.0]));

    let mut target = MemoryDataset::new();
    copy_variable(&source, &mut target, "time", false, &VariableOptions::default())?;
    let mut extra = serde_json::Map::new();
    extra.insert("axis".to_string(), json!("T"));
    extra.insert("flags".to_string(), json!([1, 2]));
    set_attributes_from_json(&mut target, Some("time"), &extra)?;
    set_attributes_from_json(&mut target, None, &extra)?;

    let time = target.variable("time").unwrap();
    assert_eq!(time.attribute("axis"), Some(&AttrValue::from("T")));
    assert_eq!(time.attribute("flags"), Some(&AttrValue::Ints(vec![1, 2])));
    assert_eq!(target.global_attribute("axis"), Some(AttrValue::from("T")));
    Ok(())
}

#[test]
fn test_dataset_summary() -> Result<()> {
    let source = climate_source()?;
    let summary = summarize_dataset(&source);
    assert_eq!(summary.dimensions.len(), 2);
    let temp = summary.variable("temp").unwrap();
    assert_eq!(temp.data_type, "float32");
    assert_eq!(temp.total_elements, 12);
    assert_eq!(temp.estimated_size_bytes, 48);
    assert_eq!(summary.estimated_size_bytes(), 48 + 24);

    let rendered = summary.to_json();
    assert_eq!(rendered["variables"][1]["shape"], json!([3, 4]));
    assert_eq!(rendered["dimensions"][0]["name"], json!("time"));
    Ok(())
}
