//! Reading and writing a variable's coordinate reference system
//!
//! The CRS lives on a scalar grid-mapping variable referenced through the
//! data variable's `grid_mapping` attribute, following the CF conventions.
//! The PROJ.4 definition is stored in its `proj4` attribute.

use super::projection::Projection;
use crate::dataset::{AttrValue, DataType, DatasetReader, DatasetWriter, VariableOptions};
use crate::errors::{Result, RuNeGridError};
use log::debug;

/// Name of the grid-mapping variable written by [`set_crs`]
pub const CRS_VARIABLE: &str = "crs";

const PROJ4_ATTRIBUTES: [&str; 2] = ["proj4", "proj4text"];

/// Resolve the CRS of `variable`.
///
/// Looks at the grid-mapping variable named by `grid_mapping`, then at a
/// `proj4` attribute on the variable itself, then at a global `proj4`
/// attribute. A grid mapping of `latitude_longitude` without a definition
/// resolves to WGS84. Returns `None` when nothing describes the CRS.
pub fn get_crs<D: DatasetReader + ?Sized>(dataset: &D, variable: &str) -> Result<Option<Projection>> {
    let info = dataset
        .variable(variable)
        .ok_or_else(|| RuNeGridError::missing_variable(variable))?;

    if let Some(mapping_name) = info.attribute("grid_mapping").and_then(AttrValue::as_str) {
        if let Some(mapping) = dataset.variable(mapping_name) {
            for attr in PROJ4_ATTRIBUTES {
                if let Some(definition) = mapping.attribute(attr).and_then(AttrValue::as_str) {
                    return Projection::parse(definition).map(Some);
                }
            }
            if mapping
                .attribute("grid_mapping_name")
                .and_then(AttrValue::as_str)
                == Some("latitude_longitude")
            {
                return Ok(Some(Projection::wgs84()));
            }
        } else {
            debug!("Grid mapping '{mapping_name}' of '{variable}' is not in the dataset");
        }
    }

    for attr in PROJ4_ATTRIBUTES {
        if let Some(definition) = info.attribute(attr).and_then(AttrValue::as_str) {
            return Projection::parse(definition).map(Some);
        }
    }
    match dataset.global_attribute("proj4") {
        Some(value) => match value.as_str() {
            Some(definition) => Projection::parse(definition).map(Some),
            None => Ok(None),
        },
        None => Ok(None),
    }
}

/// Attach `projection` to `variable` through the [`CRS_VARIABLE`] grid mapping
pub fn set_crs<D: DatasetWriter + ?Sized>(
    dataset: &mut D,
    variable: &str,
    projection: &Projection,
) -> Result<()> {
    if !dataset.has_variable(variable) {
        return Err(RuNeGridError::missing_variable(variable));
    }
    if !dataset.has_variable(CRS_VARIABLE) {
        dataset.add_variable(CRS_VARIABLE, DataType::Int32, &[], &VariableOptions::default())?;
    }
    dataset.set_variable_attribute(CRS_VARIABLE, "proj4", AttrValue::from(projection.definition()))?;
    if let Some(name) = projection.grid_mapping_name() {
        dataset.set_variable_attribute(CRS_VARIABLE, "grid_mapping_name", AttrValue::from(name))?;
    }
    if let Some(code) = projection.epsg() {
        dataset.set_variable_attribute(CRS_VARIABLE, "epsg_code", AttrValue::from(format!("EPSG:{code}")))?;
    }
    dataset.set_variable_attribute(variable, "grid_mapping", AttrValue::from(CRS_VARIABLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ArrayData, MemoryDataset, Scalar};

    #[test]
    fn test_set_then_get() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("x", Some(2)).unwrap();
        ds.add_variable_with_data(
            "band",
            &["x"],
            ArrayData::filled(DataType::Float32, &[2], &Scalar::Float32(1.0)).unwrap(),
            &VariableOptions::default(),
        )
        .unwrap();
        assert_eq!(get_crs(&ds, "band").unwrap(), None);

        let utm = Projection::parse("EPSG:32610").unwrap();
        set_crs(&mut ds, "band", &utm).unwrap();
        let resolved = get_crs(&ds, "band").unwrap().unwrap();
        assert_eq!(resolved.definition(), utm.definition());
        assert_eq!(
            ds.variable(CRS_VARIABLE).unwrap().attribute("grid_mapping_name"),
            Some(&AttrValue::from("transverse_mercator"))
        );
    }
}
