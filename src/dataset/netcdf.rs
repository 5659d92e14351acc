//! netCDF file backend
//!
//! Wraps a `netcdf` file handle behind the dataset traits. Files opened with
//! [`NcDataset::open`] are read-only; [`NcDataset::append`] and
//! [`NcDataset::create`] give write access. netCDF cannot delete dimensions or
//! variables, so overwrite requests against this backend are rejected before
//! anything is touched.

use super::{
    ArrayData, AttrValue, Capabilities, DataType, DatasetId, DatasetReader, DatasetWriter,
    DimensionInfo, Flavor, Scalar, VariableInfo, VariableOptions,
};
use crate::dataset::types::check_ranges;
use crate::errors::{EntityKind, Result, RuNeGridError};
use ::netcdf::types::{FloatType, IntType, NcVariableType};
use ::netcdf::{AttributeValue, Options};
use log::{debug, warn};
use ndarray::{ArrayD, Dimension, IxDyn};
use std::fs;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};

enum Handle {
    Read(::netcdf::File),
    Write(::netcdf::FileMut),
}

impl Handle {
    fn file(&self) -> &::netcdf::File {
        match self {
            Self::Read(file) => file,
            Self::Write(file) => file,
        }
    }
}

/// Dataset stored in a netCDF file
pub struct NcDataset {
    id: DatasetId,
    path: PathBuf,
    flavor: Flavor,
    handle: Handle,
}

impl std::fmt::Debug for NcDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NcDataset")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("flavor", &self.flavor)
            .field("writable", &matches!(self.handle, Handle::Write(_)))
            .finish()
    }
}

impl NcDataset {
    /// Open an existing file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let flavor = detect_flavor(path)?;
        let file = ::netcdf::open(path)?;
        debug!("Opened {} for reading ({flavor:?})", path.display());
        Ok(Self {
            id: DatasetId::next(),
            path: path.to_path_buf(),
            flavor,
            handle: Handle::Read(file),
        })
    }

    /// Open an existing file for reading and writing
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let flavor = detect_flavor(path)?;
        let file = ::netcdf::append(path)?;
        debug!("Opened {} for appending ({flavor:?})", path.display());
        Ok(Self {
            id: DatasetId::next(),
            path: path.to_path_buf(),
            flavor,
            handle: Handle::Write(file),
        })
    }

    /// Create a new file, replacing any existing one
    pub fn create<P: AsRef<Path>>(path: P, flavor: Flavor) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_file(path)?;
        }
        let options = match flavor {
            Flavor::Classic => Options::default(),
            Flavor::Extended => Options::NETCDF4,
        };
        let file = ::netcdf::create_with(path, options)?;
        debug!("Created {} ({flavor:?})", path.display());
        Ok(Self {
            id: DatasetId::next(),
            path: path.to_path_buf(),
            flavor,
            handle: Handle::Write(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn file_mut(&mut self) -> Result<&mut ::netcdf::FileMut> {
        match &mut self.handle {
            Handle::Write(file) => Ok(file),
            Handle::Read(_) => Err(RuNeGridError::unsupported(format!(
                "writing to {}, which was opened read-only",
                self.path.display()
            ))),
        }
    }

    fn nc_variable(&self, name: &str) -> Result<::netcdf::Variable<'_>> {
        self.handle
            .file()
            .variable(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))
    }
}

/// Tell classic files from HDF5-based ones by their magic bytes
fn detect_flavor(path: &Path) -> Result<Flavor> {
    let mut magic = [0u8; 4];
    let mut file = fs::File::open(path)?;
    file.read_exact(&mut magic)?;
    if magic[..3] == *b"CDF" {
        Ok(Flavor::Classic)
    } else {
        Ok(Flavor::Extended)
    }
}

fn data_type(var: &::netcdf::Variable<'_>) -> Result<DataType> {
    let dtype = match var.vartype() {
        NcVariableType::Int(IntType::I8) => DataType::Int8,
        NcVariableType::Int(IntType::I16) => DataType::Int16,
        NcVariableType::Int(IntType::I32) => DataType::Int32,
        NcVariableType::Int(IntType::U8) => DataType::UInt8,
        NcVariableType::Int(IntType::U16) => DataType::UInt16,
        NcVariableType::Int(IntType::U32) => DataType::UInt32,
        NcVariableType::Float(FloatType::F32) => DataType::Float32,
        NcVariableType::Float(FloatType::F64) => DataType::Float64,
        NcVariableType::String => DataType::String,
        other => {
            return Err(RuNeGridError::UnknownDtype {
                dtype: format!("{other:?}"),
            })
        }
    };
    Ok(dtype)
}

fn attr_from_nc(name: &str, value: AttributeValue) -> Option<AttrValue> {
    let value = match value {
        AttributeValue::Schar(v) => AttrValue::Schar(v),
        AttributeValue::Schars(v) => AttrValue::Schars(v),
        AttributeValue::Uchar(v) => AttrValue::Uchar(v),
        AttributeValue::Uchars(v) => AttrValue::Uchars(v),
        AttributeValue::Short(v) => AttrValue::Short(v),
        AttributeValue::Shorts(v) => AttrValue::Shorts(v),
        AttributeValue::Ushort(v) => AttrValue::Ushort(v),
        AttributeValue::Ushorts(v) => AttrValue::Ushorts(v),
        AttributeValue::Int(v) => AttrValue::Int(v),
        AttributeValue::Ints(v) => AttrValue::Ints(v),
        AttributeValue::Uint(v) => AttrValue::Uint(v),
        AttributeValue::Uints(v) => AttrValue::Uints(v),
        AttributeValue::Float(v) => AttrValue::Float(v),
        AttributeValue::Floats(v) => AttrValue::Floats(v),
        AttributeValue::Double(v) => AttrValue::Double(v),
        AttributeValue::Doubles(v) => AttrValue::Doubles(v),
        AttributeValue::Str(v) => AttrValue::Str(v),
        AttributeValue::Strs(v) => AttrValue::Strs(v),
        AttributeValue::Longlong(v) => {
            warn!("Attribute '{name}' widened from int64 to double");
            AttrValue::Double(v as f64)
        }
        AttributeValue::Longlongs(v) => {
            warn!("Attribute '{name}' widened from int64 to double");
            AttrValue::Doubles(v.into_iter().map(|x| x as f64).collect())
        }
        AttributeValue::Ulonglong(v) => {
            warn!("Attribute '{name}' widened from uint64 to double");
            AttrValue::Double(v as f64)
        }
        AttributeValue::Ulonglongs(v) => {
            warn!("Attribute '{name}' widened from uint64 to double");
            AttrValue::Doubles(v.into_iter().map(|x| x as f64).collect())
        }
        #[allow(unreachable_patterns)]
        _ => {
            warn!("Skipped unsupported attribute type for '{name}'");
            return None;
        }
    };
    Some(value)
}

fn attr_to_nc(value: AttrValue) -> AttributeValue {
    match value {
        AttrValue::Schar(v) => AttributeValue::Schar(v),
        AttrValue::Schars(v) => AttributeValue::Schars(v),
        AttrValue::Uchar(v) => AttributeValue::Uchar(v),
        AttrValue::Uchars(v) => AttributeValue::Uchars(v),
        AttrValue::Short(v) => AttributeValue::Short(v),
        AttrValue::Shorts(v) => AttributeValue::Shorts(v),
        AttrValue::Ushort(v) => AttributeValue::Ushort(v),
        AttrValue::Ushorts(v) => AttributeValue::Ushorts(v),
        AttrValue::Int(v) => AttributeValue::Int(v),
        AttrValue::Ints(v) => AttributeValue::Ints(v),
        AttrValue::Uint(v) => AttributeValue::Uint(v),
        AttrValue::Uints(v) => AttributeValue::Uints(v),
        AttrValue::Float(v) => AttributeValue::Float(v),
        AttrValue::Floats(v) => AttributeValue::Floats(v),
        AttrValue::Double(v) => AttributeValue::Double(v),
        AttrValue::Doubles(v) => AttributeValue::Doubles(v),
        AttrValue::Str(v) => AttributeValue::Str(v),
        AttrValue::Strs(v) => AttributeValue::Strs(v),
    }
}

fn collect_attributes<'a>(
    attributes: impl Iterator<Item = ::netcdf::Attribute<'a>>,
) -> Vec<(String, AttrValue)> {
    attributes
        .filter_map(|attr| {
            let name = attr.name().to_string();
            match attr.value() {
                Ok(value) => attr_from_nc(&name, value).map(|value| (name, value)),
                Err(e) => {
                    warn!("Could not read attribute '{name}': {e}");
                    None
                }
            }
        })
        .collect()
}

/// Split one range per axis into netCDF start/count vectors
fn start_count(ranges: &[Range<usize>]) -> (Vec<usize>, Vec<usize>) {
    ranges.iter().map(|r| (r.start, r.end - r.start)).unzip()
}

/// Every multi-index of `shape` in row-major order
fn indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> {
    let shape = shape.to_vec();
    ndarray::indices(IxDyn(&shape))
        .into_iter()
        .map(|ix| ix.slice().to_vec())
}

impl DatasetReader for NcDataset {
    fn id(&self) -> DatasetId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::for_flavor(self.flavor, false)
    }

    fn dimension_names(&self) -> Vec<String> {
        self.handle
            .file()
            .dimensions()
            .map(|d| d.name().to_string())
            .collect()
    }

    fn dimension(&self, name: &str) -> Option<DimensionInfo> {
        self.handle.file().dimension(name).map(|d| DimensionInfo {
            name: d.name().to_string(),
            length: d.len(),
            is_unlimited: d.is_unlimited(),
        })
    }

    fn variable_names(&self) -> Vec<String> {
        self.handle
            .file()
            .variables()
            .map(|v| v.name().to_string())
            .collect()
    }

    fn variable(&self, name: &str) -> Option<VariableInfo> {
        let var = self.handle.file().variable(name)?;
        let dtype = match data_type(&var) {
            Ok(dtype) => dtype,
            Err(e) => {
                warn!("Ignoring variable '{name}': {e}");
                return None;
            }
        };
        let attributes = collect_attributes(var.attributes());
        let fill_value = attributes
            .iter()
            .find(|(key, _)| key == "_FillValue")
            .and_then(|(_, value)| value.scalar_as(dtype));
        Some(VariableInfo {
            name: name.to_string(),
            dtype,
            dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
            fill_value,
            attributes,
        })
    }

    fn read(&self, name: &str, ranges: &[Range<usize>]) -> Result<ArrayData> {
        let var = self.nc_variable(name)?;
        let dtype = data_type(&var)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        check_ranges(&shape, ranges)?;
        let (start, count) = start_count(ranges);

        if count.iter().any(|&c| c == 0) {
            let fill = match dtype {
                DataType::String => Scalar::String(String::new()),
                other => Scalar::from_f64(other, 0.0).unwrap_or(Scalar::Float64(0.0)),
            };
            return ArrayData::filled(dtype, &count, &fill);
        }

        macro_rules! read_as {
            ($t:ty, $variant:ident) => {{
                let values = if start.is_empty() {
                    var.get_values::<$t, _>(..)?
                } else {
                    var.get_values::<$t, _>((start.as_slice(), count.as_slice()))?
                };
                ArrayData::$variant(ArrayD::from_shape_vec(IxDyn(&count), values)?)
            }};
        }

        let data = match dtype {
            DataType::Int8 => read_as!(i8, Int8),
            DataType::Int16 => read_as!(i16, Int16),
            DataType::Int32 => read_as!(i32, Int32),
            DataType::UInt8 => read_as!(u8, UInt8),
            DataType::UInt16 => read_as!(u16, UInt16),
            DataType::UInt32 => read_as!(u32, UInt32),
            DataType::Float32 => read_as!(f32, Float32),
            DataType::Float64 => read_as!(f64, Float64),
            DataType::String => {
                let mut values = Vec::with_capacity(count.iter().product());
                for local in indices(&count) {
                    let index: Vec<usize> = local.iter().zip(&start).map(|(i, s)| i + s).collect();
                    values.push(var.get_string(index.as_slice())?);
                }
                ArrayData::String(ArrayD::from_shape_vec(IxDyn(&count), values)?)
            }
        };
        Ok(data)
    }

    fn global_attributes(&self) -> Vec<(String, AttrValue)> {
        collect_attributes(self.handle.file().attributes())
    }
}

impl DatasetWriter for NcDataset {
    fn add_dimension(&mut self, name: &str, length: Option<usize>) -> Result<DimensionInfo> {
        if self.has_dimension(name) {
            return Err(RuNeGridError::already_exists(EntityKind::Dimension, name));
        }
        let file = self.file_mut()?;
        match length {
            Some(len) => file.add_dimension(name, len)?,
            None => file.add_unlimited_dimension(name)?,
        };
        self.dimension(name)
            .ok_or_else(|| RuNeGridError::missing_dimension(name))
    }

    fn remove_dimension(&mut self, _name: &str) -> Result<()> {
        Err(RuNeGridError::unsupported("removing dimensions from a netCDF file"))
    }

    fn add_variable(
        &mut self,
        name: &str,
        dtype: DataType,
        dimensions: &[String],
        options: &VariableOptions,
    ) -> Result<VariableInfo> {
        if self.has_variable(name) {
            return Err(RuNeGridError::already_exists(EntityKind::Variable, name));
        }
        let caps = self.capabilities();
        if !caps.supports_dtype(dtype) {
            return Err(RuNeGridError::unsupported(format!(
                "{dtype} variables in a {:?} file",
                self.flavor
            )));
        }
        if let Some(missing) = dimensions.iter().find(|d| !self.has_dimension(d)) {
            return Err(RuNeGridError::missing_dimension(missing));
        }
        let fill_value = match &options.fill_value {
            Some(fill) => Some(fill.cast(dtype).ok_or_else(|| RuNeGridError::TypeMismatch {
                var: name.to_string(),
                expected: dtype,
                found: fill.dtype(),
            })?),
            None => None,
        };

        let dims: Vec<&str> = dimensions.iter().map(String::as_str).collect();
        let file = self.file_mut()?;
        let mut var = match dtype {
            DataType::Int8 => file.add_variable::<i8>(name, &dims)?,
            DataType::Int16 => file.add_variable::<i16>(name, &dims)?,
            DataType::Int32 => file.add_variable::<i32>(name, &dims)?,
            DataType::UInt8 => file.add_variable::<u8>(name, &dims)?,
            DataType::UInt16 => file.add_variable::<u16>(name, &dims)?,
            DataType::UInt32 => file.add_variable::<u32>(name, &dims)?,
            DataType::Float32 => file.add_variable::<f32>(name, &dims)?,
            DataType::Float64 => file.add_variable::<f64>(name, &dims)?,
            DataType::String => file.add_string_variable(name, &dims)?,
        };

        if caps.compression && !dims.is_empty() {
            if let Some(chunks) = &options.chunk_sizes {
                var.set_chunking(chunks)?;
            }
            if let Some(level) = options.compression {
                var.set_compression(i32::from(level), true)?;
            }
        } else if options.compression.is_some() || options.chunk_sizes.is_some() {
            debug!("Compression options ignored for '{name}'");
        }

        if let Some(fill) = fill_value {
            if dtype != DataType::String {
                var.put_attribute("_FillValue", attr_to_nc(AttrValue::from(fill)))?;
            }
        }
        self.variable(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))
    }

    fn remove_variable(&mut self, _name: &str) -> Result<()> {
        Err(RuNeGridError::unsupported("removing variables from a netCDF file"))
    }

    fn write(&mut self, name: &str, offset: &[usize], data: &ArrayData) -> Result<()> {
        let info = self
            .variable(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))?;
        if data.dtype() != info.dtype {
            return Err(RuNeGridError::TypeMismatch {
                var: name.to_string(),
                expected: info.dtype,
                found: data.dtype(),
            });
        }
        if offset.len() != info.rank() || data.ndim() != info.rank() {
            return Err(RuNeGridError::ShapeMismatch {
                var: name.to_string(),
                expected: info.shape.clone(),
                found: data.shape().to_vec(),
            });
        }
        for (axis, dim_name) in info.dimensions.iter().enumerate() {
            let unlimited = self.dimension(dim_name).map_or(false, |d| d.is_unlimited);
            if !unlimited && offset[axis] + data.shape()[axis] > info.shape[axis] {
                return Err(RuNeGridError::ShapeMismatch {
                    var: name.to_string(),
                    expected: info.shape.clone(),
                    found: data.shape().to_vec(),
                });
            }
        }
        if data.is_empty() && data.ndim() > 0 {
            return Ok(());
        }

        let start = offset.to_vec();
        let count = data.shape().to_vec();
        let file = self.file_mut()?;
        let mut var = file
            .variable_mut(name)
            .ok_or_else(|| RuNeGridError::missing_variable(name))?;

        macro_rules! write_values {
            ($arr:expr) => {{
                let values: Vec<_> = $arr.iter().copied().collect();
                if start.is_empty() {
                    var.put_values(&values, ..)?;
                } else {
                    var.put_values(&values, (start.as_slice(), count.as_slice()))?;
                }
            }};
        }

        match data {
            ArrayData::Int8(a) => write_values!(a),
            ArrayData::Int16(a) => write_values!(a),
            ArrayData::Int32(a) => write_values!(a),
            ArrayData::UInt8(a) => write_values!(a),
            ArrayData::UInt16(a) => write_values!(a),
            ArrayData::UInt32(a) => write_values!(a),
            ArrayData::Float32(a) => write_values!(a),
            ArrayData::Float64(a) => write_values!(a),
            ArrayData::String(a) => {
                for (local, value) in indices(&count).zip(a.iter()) {
                    let index: Vec<usize> = local.iter().zip(&start).map(|(i, s)| i + s).collect();
                    var.put_string(value, index.as_slice())?;
                }
            }
        }
        Ok(())
    }

    fn set_variable_attribute(
        &mut self,
        variable: &str,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        let file = self.file_mut()?;
        let mut var = file
            .variable_mut(variable)
            .ok_or_else(|| RuNeGridError::missing_variable(variable))?;
        var.put_attribute(name, attr_to_nc(value))?;
        Ok(())
    }

    fn set_global_attribute(&mut self, name: &str, value: AttrValue) -> Result<()> {
        let file = self.file_mut()?;
        file.add_attribute(name, attr_to_nc(value))?;
        Ok(())
    }
}
