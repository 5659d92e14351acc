//! Spatial coordinate model
//!
//! A [`SpatialGrid`] ties a regular grid (width x height cells) to a bounding
//! box, an affine pixel to world transform and a [`Projection`]. It is built
//! either from a bounding box or from the 1-D x/y coordinate variables of a
//! dataset, and can write its coordinate variables into another dataset.

pub mod affine;
pub mod bbox;
pub mod crs;
pub mod projection;

pub use affine::Affine;
pub use bbox::BBox;
pub use crs::{get_crs, set_crs, CRS_VARIABLE};
pub use projection::{Projection, Transformer};

use crate::dataset::{
    ArrayData, AttrValue, DataType, DatasetReader, DatasetWriter, VariableOptions,
};
use crate::errors::{EntityKind, Result, RuNeGridError};
use ndarray::{ArrayD, IxDyn};

/// Relative tolerance when checking coordinate spacing
const SPACING_TOLERANCE: f64 = 1e-6;

/// Regular grid in a projection
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid {
    bbox: BBox,
    projection: Projection,
    width: usize,
    height: usize,
    affine: Affine,
    dtype: DataType,
}

impl SpatialGrid {
    /// Grid of `width` x `height` cells covering `bbox`, north up.
    ///
    /// `dtype` is the type of the coordinate variables written by
    /// [`SpatialGrid::add_to_dataset`].
    pub fn from_bbox(
        bbox: BBox,
        projection: Projection,
        width: usize,
        height: usize,
        dtype: DataType,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RuNeGridError::Generic(format!(
                "grid must have at least one cell, got {width} x {height}"
            )));
        }
        if !dtype.is_float() {
            return Err(RuNeGridError::unsupported(format!("{dtype} coordinates")));
        }
        let affine = Affine::from_origin(
            bbox.xmin,
            bbox.ymax,
            bbox.width() / width as f64,
            -bbox.height() / height as f64,
        );
        Ok(Self {
            bbox,
            projection,
            width,
            height,
            affine,
            dtype,
        })
    }

    /// Grid described by the 1-D coordinate variables `x_name` and `y_name`.
    ///
    /// Both need at least two evenly spaced values. The affine transform keeps
    /// the orientation of the stored values, so descending y gives a north-up
    /// grid and ascending y a south-up one.
    pub fn from_dataset<D: DatasetReader + ?Sized>(
        dataset: &D,
        x_name: &str,
        y_name: &str,
        projection: Projection,
    ) -> Result<Self> {
        let (x, dtype) = read_axis(dataset, x_name)?;
        let (y, _) = read_axis(dataset, y_name)?;
        let dx = uniform_step(x_name, &x)?;
        let dy = uniform_step(y_name, &y)?;

        let affine = Affine::from_origin(x[0] - dx / 2.0, y[0] - dy / 2.0, dx, dy);
        let (x0, y0) = affine.apply(0.0, 0.0);
        let (x1, y1) = affine.apply(x.len() as f64, y.len() as f64);
        Ok(Self {
            bbox: BBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)),
            projection,
            width: x.len(),
            height: y.len(),
            affine,
            dtype: if dtype.is_float() { dtype } else { DataType::Float64 },
        })
    }

    /// `(height, width)`, the trailing axes of gridded variables
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[must_use]
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    #[must_use]
    pub fn affine(&self) -> Affine {
        self.affine
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Cell-center x coordinates, one per column
    #[must_use]
    pub fn x(&self) -> Vec<f64> {
        (0..self.width).map(|col| self.affine.cell_center(col, 0).0).collect()
    }

    /// Cell-center y coordinates, one per row
    #[must_use]
    pub fn y(&self) -> Vec<f64> {
        (0..self.height).map(|row| self.affine.cell_center(0, row).1).collect()
    }

    /// Bounding box in geographic WGS84 coordinates
    pub fn geographic_bounds(&self, edge_points: usize) -> Result<BBox> {
        self.bbox
            .project(&self.projection, &Projection::wgs84(), edge_points)
    }

    /// Create the x/y dimensions and coordinate variables in `target`
    pub fn add_to_dataset<T: DatasetWriter + ?Sized>(
        &self,
        target: &mut T,
        x_name: &str,
        y_name: &str,
        options: &VariableOptions,
    ) -> Result<()> {
        for name in [x_name, y_name] {
            if target.has_dimension(name) {
                return Err(RuNeGridError::already_exists(EntityKind::Dimension, name));
            }
            if target.has_variable(name) {
                return Err(RuNeGridError::already_exists(EntityKind::Variable, name));
            }
        }
        let geographic = self.projection.is_geographic();
        let axes = [
            (x_name, self.x(), if geographic { ("longitude", "degrees_east") } else { ("projection_x_coordinate", "m") }),
            (y_name, self.y(), if geographic { ("latitude", "degrees_north") } else { ("projection_y_coordinate", "m") }),
        ];
        for (name, values, (standard_name, units)) in axes {
            target.add_dimension(name, Some(values.len()))?;
            let data = ArrayData::from_f64(self.dtype, ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)?)?;
            target.add_variable(name, self.dtype, &[name.to_string()], options)?;
            target.write(name, &[0], &data)?;
            target.set_variable_attribute(name, "standard_name", AttrValue::from(standard_name))?;
            target.set_variable_attribute(name, "units", AttrValue::from(units))?;
        }
        Ok(())
    }
}

fn read_axis<D: DatasetReader + ?Sized>(dataset: &D, name: &str) -> Result<(Vec<f64>, DataType)> {
    let info = dataset
        .variable(name)
        .ok_or_else(|| RuNeGridError::missing_variable(name))?;
    if info.rank() != 1 {
        return Err(RuNeGridError::NonUniformSpacing {
            axis: name.to_string(),
            detail: format!("expected a 1-D coordinate variable, found {} dimensions", info.rank()),
        });
    }
    let values = dataset
        .read_all(name)?
        .to_f64()
        .ok_or_else(|| RuNeGridError::TypeMismatch {
            var: name.to_string(),
            expected: DataType::Float64,
            found: info.dtype,
        })?;
    Ok((values.into_raw_vec(), info.dtype))
}

/// Common step of evenly spaced values
fn uniform_step(axis: &str, values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(RuNeGridError::NonUniformSpacing {
            axis: axis.to_string(),
            detail: format!("{} value(s) are not enough to infer a cell size", values.len()),
        });
    }
    let step = (values[values.len() - 1] - values[0]) / (values.len() - 1) as f64;
    if step == 0.0 || !step.is_finite() {
        return Err(RuNeGridError::NonUniformSpacing {
            axis: axis.to_string(),
            detail: "values do not change".to_string(),
        });
    }
    for (i, pair) in values.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        if (delta - step).abs() > SPACING_TOLERANCE * step.abs() {
            return Err(RuNeGridError::NonUniformSpacing {
                axis: axis.to_string(),
                detail: format!("step {delta} at index {i} differs from {step}"),
            });
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;

    fn axis(ds: &mut MemoryDataset, name: &str, values: Vec<f64>) {
        ds.add_dimension(name, Some(values.len())).unwrap();
        let data = ArrayData::Float64(ArrayD::from_shape_vec(IxDyn(&[values.len()]), values).unwrap());
        ds.add_variable_with_data(name, &[name], data, &VariableOptions::default())
            .unwrap();
    }

    #[test]
    fn test_from_bbox_cell_centers() {
        let grid = SpatialGrid::from_bbox(
            BBox::new(0.0, 0.0, 4.0, 2.0),
            Projection::wgs84(),
            4,
            2,
            DataType::Float64,
        )
        .unwrap();
        assert_eq!(grid.shape(), (2, 4));
        assert_eq!(grid.x(), vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(grid.y(), vec![1.5, 0.5]);
        assert_eq!(grid.affine(), Affine::from_origin(0.0, 2.0, 1.0, -1.0));
    }

    #[test]
    fn test_from_dataset_round_trip() {
        let mut ds = MemoryDataset::new();
        axis(&mut ds, "x", vec![10.5, 11.5, 12.5]);
        axis(&mut ds, "y", vec![4.5, 3.5]);
        let grid = SpatialGrid::from_dataset(&ds, "x", "y", Projection::wgs84()).unwrap();
        assert_eq!(grid.bbox(), BBox::new(10.0, 3.0, 13.0, 5.0));
        assert_eq!(grid.affine(), Affine::from_origin(10.0, 5.0, 1.0, -1.0));

        let mut target = MemoryDataset::new();
        grid.add_to_dataset(&mut target, "lon", "lat", &VariableOptions::default())
            .unwrap();
        let lon = target.read_all("lon").unwrap().to_f64().unwrap();
        assert_eq!(lon.into_raw_vec(), vec![10.5, 11.5, 12.5]);
        assert_eq!(
            target.variable("lat").unwrap().attribute("units"),
            Some(&AttrValue::from("degrees_north"))
        );
    }

    #[test]
    fn test_irregular_spacing_is_rejected() {
        let mut ds = MemoryDataset::new();
        axis(&mut ds, "x", vec![0.0, 1.0, 3.0]);
        axis(&mut ds, "y", vec![0.0, 1.0]);
        assert!(matches!(
            SpatialGrid::from_dataset(&ds, "x", "y", Projection::wgs84()),
            Err(RuNeGridError::NonUniformSpacing { .. })
        ));

        let mut single = MemoryDataset::new();
        axis(&mut single, "x", vec![0.0]);
        axis(&mut single, "y", vec![0.0, 1.0]);
        assert!(SpatialGrid::from_dataset(&single, "x", "y", Projection::wgs84()).is_err());
    }
}
