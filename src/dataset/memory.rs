//! In-memory dataset backend
//!
//! Honors the same invariants as a file-backed dataset: every variable's data
//! rank equals its dimension count, fixed dimensions never change length, and
//! writing past the end of an unlimited dimension grows every variable that
//! uses it (new cells hold the variable's fill value).

use super::types::check_ranges;
use super::{
    ArrayData, AttrValue, Capabilities, DataType, DatasetId, DatasetReader, DatasetWriter,
    DimensionInfo, Flavor, Scalar, VariableInfo, VariableOptions,
};
use crate::errors::{EntityKind, Result, RuNeGridError};
use crate::fill::FillPolicy;
use log::debug;
use std::ops::Range;

#[derive(Debug, Clone)]
struct MemDimension {
    name: String,
    length: usize,
    unlimited: bool,
}

#[derive(Debug, Clone)]
struct MemVariable {
    name: String,
    dimensions: Vec<String>,
    fill_value: Option<Scalar>,
    attributes: Vec<(String, AttrValue)>,
    data: ArrayData,
}

/// Dataset held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    id: DatasetId,
    flavor: Flavor,
    dimensions: Vec<MemDimension>,
    variables: Vec<MemVariable>,
    attributes: Vec<(String, AttrValue)>,
}

impl Default for MemoryDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDataset {
    /// Create an empty dataset with extended capabilities
    pub fn new() -> Self {
        Self::with_flavor(Flavor::Extended)
    }

    /// Create an empty dataset restricted to the capabilities of `flavor`
    pub fn with_flavor(flavor: Flavor) -> Self {
        Self {
            id: DatasetId::next(),
            flavor,
            dimensions: Vec::new(),
            variables: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Declare a variable and fill it with `data` in one step
    pub fn add_variable_with_data(
        &mut self,
        name: &str,
        dimensions: &[&str],
        data: ArrayData,
        options: &VariableOptions,
    ) -> Result<VariableInfo> {
        let dimensions: Vec<String> = dimensions.iter().map(|d| d.to_string()).collect();
        self.add_variable(name, data.dtype(), &dimensions, options)?;
        let offset = vec![0; data.ndim()];
        self.write(name, &offset, &data)?;
        self.variable(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))
    }

    fn dim(&self, name: &str) -> Option<&MemDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    fn var_index(&self, name: &str) -> Result<usize> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))
    }

    fn info(&self, var: &MemVariable) -> VariableInfo {
        VariableInfo {
            name: var.name.clone(),
            dtype: var.data.dtype(),
            dimensions: var.dimensions.clone(),
            shape: var.data.shape().to_vec(),
            fill_value: var.fill_value.clone(),
            attributes: var.attributes.clone(),
        }
    }

    /// Grow the unlimited dimension `name` to `length`, padding every variable using it
    fn grow_dimension(&mut self, name: &str, length: usize) -> Result<()> {
        debug!("Growing unlimited dimension '{name}' to {length}");
        for var in &mut self.variables {
            let Some(axis) = var.dimensions.iter().position(|d| d == name) else {
                continue;
            };
            let mut shape = var.data.shape().to_vec();
            if shape[axis] >= length {
                continue;
            }
            shape[axis] = length;
            let fill = padding_value(var.fill_value.as_ref(), var.data.dtype());
            let mut grown = ArrayData::filled(var.data.dtype(), &shape, &fill)?;
            grown.assign(&vec![0; shape.len()], &var.data)?;
            var.data = grown;
        }
        if let Some(dim) = self.dimensions.iter_mut().find(|d| d.name == name) {
            dim.length = length;
        }
        Ok(())
    }
}

/// Value used for cells that were never written
fn padding_value(fill: Option<&Scalar>, dtype: DataType) -> Scalar {
    fill.cloned()
        .or_else(|| FillPolicy::default().get(dtype).cloned())
        .unwrap_or(Scalar::String(String::new()))
}

fn set_attribute(attributes: &mut Vec<(String, AttrValue)>, name: &str, value: AttrValue) {
    match attributes.iter_mut().find(|(key, _)| key == name) {
        Some((_, existing)) => *existing = value,
        None => attributes.push((name.to_string(), value)),
    }
}

impl DatasetReader for MemoryDataset {
    fn id(&self) -> DatasetId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::for_flavor(self.flavor, true)
    }

    fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    fn dimension(&self, name: &str) -> Option<DimensionInfo> {
        self.dim(name).map(|d| DimensionInfo {
            name: d.name.clone(),
            length: d.length,
            is_unlimited: d.unlimited,
        })
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| self.info(v))
    }

    fn read(&self, name: &str, ranges: &[Range<usize>]) -> Result<ArrayData> {
        let var = &self.variables[self.var_index(name)?];
        var.data.slice(ranges)
    }

    fn global_attributes(&self) -> Vec<(String, AttrValue)> {
        self.attributes.clone()
    }
}

impl DatasetWriter for MemoryDataset {
    fn add_dimension(&mut self, name: &str, length: Option<usize>) -> Result<DimensionInfo> {
        if self.dim(name).is_some() {
            return Err(RuNeGridError::already_exists(EntityKind::Dimension, name));
        }
        if length.is_none() && !self.capabilities().unlimited_dimensions {
            return Err(RuNeGridError::unsupported("unlimited dimensions"));
        }
        if length.is_none() && self.flavor == Flavor::Classic && self.dimensions.iter().any(|d| d.unlimited) {
            return Err(RuNeGridError::unsupported(
                "more than one unlimited dimension in a classic dataset",
            ));
        }
        self.dimensions.push(MemDimension {
            name: name.to_string(),
            length: length.unwrap_or(0),
            unlimited: length.is_none(),
        });
        self.dimension(name)
            .ok_or_else(|| RuNeGridError::missing_dimension(name))
    }

    fn remove_dimension(&mut self, name: &str) -> Result<()> {
        if let Some(var) = self
            .variables
            .iter()
            .find(|v| v.dimensions.iter().any(|d| d == name))
        {
            return Err(RuNeGridError::DimensionInUse {
                dim: name.to_string(),
                var: var.name.clone(),
            });
        }
        let before = self.dimensions.len();
        self.dimensions.retain(|d| d.name != name);
        if self.dimensions.len() == before {
            return Err(RuNeGridError::missing_dimension(name));
        }
        Ok(())
    }

    fn add_variable(
        &mut self,
        name: &str,
        dtype: DataType,
        dimensions: &[String],
        options: &VariableOptions,
    ) -> Result<VariableInfo> {
        if self.variables.iter().any(|v| v.name == name) {
            return Err(RuNeGridError::already_exists(EntityKind::Variable, name));
        }
        if !self.capabilities().supports_dtype(dtype) {
            return Err(RuNeGridError::unsupported(format!("{dtype} variables")));
        }
        let shape = dimensions
            .iter()
            .map(|d| {
                self.dim(d)
                    .map(|dim| dim.length)
                    .ok_or_else(|| RuNeGridError::missing_dimension(d))
            })
            .collect::<Result<Vec<usize>>>()?;

        let fill_value = match &options.fill_value {
            Some(fill) => Some(fill.cast(dtype).ok_or_else(|| RuNeGridError::TypeMismatch {
                var: name.to_string(),
                expected: dtype,
                found: fill.dtype(),
            })?),
            None => None,
        };
        let data = ArrayData::filled(dtype, &shape, &padding_value(fill_value.as_ref(), dtype))?;

        let mut attributes = Vec::new();
        if let Some(fill) = &fill_value {
            attributes.push(("_FillValue".to_string(), AttrValue::from(fill.clone())));
        }
        self.variables.push(MemVariable {
            name: name.to_string(),
            dimensions: dimensions.to_vec(),
            fill_value,
            attributes,
            data,
        });
        self.variable(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))
    }

    fn remove_variable(&mut self, name: &str) -> Result<()> {
        let index = self.var_index(name)?;
        self.variables.remove(index);
        Ok(())
    }

    fn write(&mut self, name: &str, offset: &[usize], data: &ArrayData) -> Result<()> {
        let index = self.var_index(name)?;
        let var = &self.variables[index];
        if data.dtype() != var.data.dtype() {
            return Err(RuNeGridError::TypeMismatch {
                var: name.to_string(),
                expected: var.data.dtype(),
                found: data.dtype(),
            });
        }
        if offset.len() != var.dimensions.len() || data.ndim() != var.dimensions.len() {
            return Err(RuNeGridError::ShapeMismatch {
                var: name.to_string(),
                expected: var.data.shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }

        // Grow unlimited dimensions first, reject overruns of fixed ones
        let mut growth = Vec::new();
        for (axis, dim_name) in var.dimensions.iter().enumerate() {
            let end = offset[axis] + data.shape()[axis];
            let dim = self
                .dim(dim_name)
                .ok_or_else(|| RuNeGridError::missing_dimension(dim_name))?;
            if end > var.data.shape()[axis] {
                if dim.unlimited {
                    growth.push((dim_name.clone(), end.max(dim.length)));
                } else {
                    return Err(RuNeGridError::ShapeMismatch {
                        var: name.to_string(),
                        expected: var.data.shape().to_vec(),
                        found: data.shape().to_vec(),
                    });
                }
            }
        }
        for (dim_name, length) in growth {
            self.grow_dimension(&dim_name, length)?;
        }

        let var = &mut self.variables[index];
        let ranges: Vec<Range<usize>> = offset
            .iter()
            .zip(data.shape())
            .map(|(&start, &len)| start..start + len)
            .collect();
        check_ranges(var.data.shape(), &ranges)?;
        var.data.assign(offset, data)
    }

    fn set_variable_attribute(
        &mut self,
        variable: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        let index = self.var_index(variable)?;
        set_attribute(&mut self.variables[index].attributes, name, value);
        Ok(())
    }

    fn set_global_attribute(&mut self, name: &str, value: AttrValue) -> Result<()> {
        set_attribute(&mut self.attributes, name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_unlimited_dimension_grows_on_write() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("time", None).unwrap();
        ds.add_dimension("x", Some(2)).unwrap();
        let dims = vec!["time".to_string(), "x".to_string()];
        ds.add_variable("a", DataType::Int16, &dims, &VariableOptions::default().with_fill_value(Scalar::Int16(-1)))
            .unwrap();
        ds.add_variable("b", DataType::Int16, &dims, &VariableOptions::default())
            .unwrap();

        let row = ArrayData::Int16(ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![5, 6]).unwrap());
        ds.write("a", &[2, 0], &row).unwrap();

        assert_eq!(ds.dimension("time").unwrap().length, 3);
        assert_eq!(ds.variable("a").unwrap().shape, vec![3, 2]);
        assert_eq!(ds.variable("b").unwrap().shape, vec![3, 2]);
        let a = ds.read_all("a").unwrap();
        assert_eq!(a.get(&[0, 0]), Some(Scalar::Int16(-1)));
        assert_eq!(a.get(&[2, 1]), Some(Scalar::Int16(6)));
    }

    #[test]
    fn test_fixed_dimension_overrun_is_rejected() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("x", Some(2)).unwrap();
        ds.add_variable("a", DataType::Float32, &["x".to_string()], &VariableOptions::default())
            .unwrap();
        let data = ArrayData::filled(DataType::Float32, &[3], &Scalar::Float32(1.0)).unwrap();
        assert!(ds.write("a", &[0], &data).is_err());
    }

    #[test]
    fn test_remove_dimension_in_use() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("x", Some(2)).unwrap();
        ds.add_variable("a", DataType::Int8, &["x".to_string()], &VariableOptions::default())
            .unwrap();
        assert!(matches!(
            ds.remove_dimension("x"),
            Err(RuNeGridError::DimensionInUse { .. })
        ));
        ds.remove_variable("a").unwrap();
        ds.remove_dimension("x").unwrap();
        assert!(!ds.has_dimension("x"));
    }

    #[test]
    fn test_classic_flavor_rejects_strings() {
        let mut ds = MemoryDataset::with_flavor(Flavor::Classic);
        ds.add_dimension("n", Some(1)).unwrap();
        assert!(matches!(
            ds.add_variable("labels", DataType::String, &["n".to_string()], &VariableOptions::default()),
            Err(RuNeGridError::Unsupported { .. })
        ));
    }
}
