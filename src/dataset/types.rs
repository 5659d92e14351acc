//! Typed scalars and N-dimensional arrays shared by every dataset backend

use crate::errors::{Result, RuNeGridError};
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Element type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// All supported data types, numeric first
    pub const ALL: [DataType; 9] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::Float32,
        Self::Float64,
        Self::String,
    ];

    /// Get the string representation of the data type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::String)
    }

    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32)
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Size of one element in bytes (strings are counted as one pointer)
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Float64 | Self::String => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = RuNeGridError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|dtype| dtype.as_str() == s)
            .ok_or_else(|| RuNeGridError::UnknownDtype {
                dtype: s.to_string(),
            })
    }
}

/// A single typed value, used for fill values and attribute payloads
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::String,
        }
    }

    /// Numeric value widened to f64; `None` for strings
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int8(v) => Some(f64::from(v)),
            Self::Int16(v) => Some(f64::from(v)),
            Self::Int32(v) => Some(f64::from(v)),
            Self::UInt8(v) => Some(f64::from(v)),
            Self::UInt16(v) => Some(f64::from(v)),
            Self::UInt32(v) => Some(f64::from(v)),
            Self::Float32(v) => Some(f64::from(v)),
            Self::Float64(v) => Some(v),
            Self::String(_) => None,
        }
    }

    /// Build a scalar of `dtype` from an f64, rounding for integer types.
    ///
    /// Values outside the integer range saturate.
    #[must_use]
    pub fn from_f64(dtype: DataType, value: f64) -> Option<Self> {
        let rounded = value.round();
        let scalar = match dtype {
            DataType::Int8 => Self::Int8(rounded as i8),
            DataType::Int16 => Self::Int16(rounded as i16),
            DataType::Int32 => Self::Int32(rounded as i32),
            DataType::UInt8 => Self::UInt8(rounded as u8),
            DataType::UInt16 => Self::UInt16(rounded as u16),
            DataType::UInt32 => Self::UInt32(rounded as u32),
            DataType::Float32 => Self::Float32(value as f32),
            DataType::Float64 => Self::Float64(value),
            DataType::String => return None,
        };
        Some(scalar)
    }

    /// Convert to another data type; strings only convert to strings
    #[must_use]
    pub fn cast(&self, dtype: DataType) -> Option<Self> {
        if self.dtype() == dtype {
            return Some(self.clone());
        }
        match self {
            Self::String(_) => None,
            _ => Self::from_f64(dtype, self.as_f64()?),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Owned N-dimensional array of one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    String(ArrayD<String>),
}

/// Run `$body` with `$arr` bound to the inner array, whatever its element type
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Int8($arr) => $body,
            ArrayData::Int16($arr) => $body,
            ArrayData::Int32($arr) => $body,
            ArrayData::UInt8($arr) => $body,
            ArrayData::UInt16($arr) => $body,
            ArrayData::UInt32($arr) => $body,
            ArrayData::Float32($arr) => $body,
            ArrayData::Float64($arr) => $body,
            ArrayData::String($arr) => $body,
        }
    };
}

/// Like `with_array!` but wraps the result back into the same variant
macro_rules! map_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            ArrayData::Int8($arr) => ArrayData::Int8($body),
            ArrayData::Int16($arr) => ArrayData::Int16($body),
            ArrayData::Int32($arr) => ArrayData::Int32($body),
            ArrayData::UInt8($arr) => ArrayData::UInt8($body),
            ArrayData::UInt16($arr) => ArrayData::UInt16($body),
            ArrayData::UInt32($arr) => ArrayData::UInt32($body),
            ArrayData::Float32($arr) => ArrayData::Float32($body),
            ArrayData::Float64($arr) => ArrayData::Float64($body),
            ArrayData::String($arr) => ArrayData::String($body),
        }
    };
}

pub(crate) use with_array;

impl ArrayData {
    #[must_use]
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::String,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array of `shape` where every element is `fill`, cast to `dtype`
    pub fn filled(dtype: DataType, shape: &[usize], fill: &Scalar) -> Result<Self> {
        let fill = fill.cast(dtype).ok_or_else(|| RuNeGridError::TypeMismatch {
            var: "fill value".to_string(),
            expected: dtype,
            found: fill.dtype(),
        })?;
        let dim = IxDyn(shape);
        let data = match fill {
            Scalar::Int8(v) => Self::Int8(ArrayD::from_elem(dim, v)),
            Scalar::Int16(v) => Self::Int16(ArrayD::from_elem(dim, v)),
            Scalar::Int32(v) => Self::Int32(ArrayD::from_elem(dim, v)),
            Scalar::UInt8(v) => Self::UInt8(ArrayD::from_elem(dim, v)),
            Scalar::UInt16(v) => Self::UInt16(ArrayD::from_elem(dim, v)),
            Scalar::UInt32(v) => Self::UInt32(ArrayD::from_elem(dim, v)),
            Scalar::Float32(v) => Self::Float32(ArrayD::from_elem(dim, v)),
            Scalar::Float64(v) => Self::Float64(ArrayD::from_elem(dim, v)),
            Scalar::String(v) => Self::String(ArrayD::from_elem(dim, v)),
        };
        Ok(data)
    }

    /// 1-D string array, e.g. for label coordinates
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let values: Vec<String> = values.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(Self::String(ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)?))
    }

    /// Copy out the hyperslab described by one range per axis
    pub fn slice(&self, ranges: &[Range<usize>]) -> Result<Self> {
        check_ranges(self.shape(), ranges)?;
        Ok(map_array!(self, a => a
            .slice_each_axis(|ax| Slice::from(ranges[ax.axis.index()].clone()))
            .to_owned()))
    }

    /// Overwrite the region starting at `offset` with `source`
    pub fn assign(&mut self, offset: &[usize], source: &ArrayData) -> Result<()> {
        if self.dtype() != source.dtype() {
            return Err(RuNeGridError::TypeMismatch {
                var: "array".to_string(),
                expected: self.dtype(),
                found: source.dtype(),
            });
        }
        if offset.len() != self.ndim() || source.ndim() != self.ndim() {
            return Err(RuNeGridError::ShapeMismatch {
                var: "array".to_string(),
                expected: self.shape().to_vec(),
                found: source.shape().to_vec(),
            });
        }
        let ranges: Vec<Range<usize>> = offset
            .iter()
            .zip(source.shape())
            .map(|(&start, &len)| start..start + len)
            .collect();
        check_ranges(self.shape(), &ranges)?;

        macro_rules! assign_same {
            ($($variant:ident),*) => {
                match (self, source) {
                    $((ArrayData::$variant(dst), ArrayData::$variant(src)) => {
                        dst.slice_each_axis_mut(|ax| Slice::from(ranges[ax.axis.index()].clone()))
                            .assign(src);
                    })*
                    _ => unreachable!("data types were checked above"),
                }
            };
        }
        assign_same!(Int8, Int16, Int32, UInt8, UInt16, UInt32, Float32, Float64, String);
        Ok(())
    }

    /// Add a new axis of length one in front of all others
    #[must_use]
    pub fn insert_leading_axis(self) -> Self {
        map_array!(self, a => a.insert_axis(Axis(0)))
    }

    /// Reshape without changing the element order
    pub fn reshape(self, shape: &[usize]) -> Result<Self> {
        Ok(map_array!(self, a => a.into_shape(IxDyn(shape))?))
    }

    /// Numeric content widened to f64; `None` for string arrays
    #[must_use]
    pub fn to_f64(&self) -> Option<ArrayD<f64>> {
        let widened = match self {
            Self::Int8(a) => a.mapv(f64::from),
            Self::Int16(a) => a.mapv(f64::from),
            Self::Int32(a) => a.mapv(f64::from),
            Self::UInt8(a) => a.mapv(f64::from),
            Self::UInt16(a) => a.mapv(f64::from),
            Self::UInt32(a) => a.mapv(f64::from),
            Self::Float32(a) => a.mapv(f64::from),
            Self::Float64(a) => a.clone(),
            Self::String(_) => return None,
        };
        Some(widened)
    }

    /// Narrow an f64 array to `dtype`, rounding (and saturating) for integer types
    pub fn from_f64(dtype: DataType, data: ArrayD<f64>) -> Result<Self> {
        let narrowed = match dtype {
            DataType::Int8 => Self::Int8(data.mapv(|v| v.round() as i8)),
            DataType::Int16 => Self::Int16(data.mapv(|v| v.round() as i16)),
            DataType::Int32 => Self::Int32(data.mapv(|v| v.round() as i32)),
            DataType::UInt8 => Self::UInt8(data.mapv(|v| v.round() as u8)),
            DataType::UInt16 => Self::UInt16(data.mapv(|v| v.round() as u16)),
            DataType::UInt32 => Self::UInt32(data.mapv(|v| v.round() as u32)),
            DataType::Float32 => Self::Float32(data.mapv(|v| v as f32)),
            DataType::Float64 => Self::Float64(data),
            DataType::String => {
                return Err(RuNeGridError::unsupported(
                    "numeric conversion into a string array",
                ))
            }
        };
        Ok(narrowed)
    }

    /// Element at a multi-index as a scalar
    #[must_use]
    pub fn get(&self, index: &[usize]) -> Option<Scalar> {
        let index = IxDyn(index);
        match self {
            Self::Int8(a) => a.get(index).copied().map(Scalar::Int8),
            Self::Int16(a) => a.get(index).copied().map(Scalar::Int16),
            Self::Int32(a) => a.get(index).copied().map(Scalar::Int32),
            Self::UInt8(a) => a.get(index).copied().map(Scalar::UInt8),
            Self::UInt16(a) => a.get(index).copied().map(Scalar::UInt16),
            Self::UInt32(a) => a.get(index).copied().map(Scalar::UInt32),
            Self::Float32(a) => a.get(index).copied().map(Scalar::Float32),
            Self::Float64(a) => a.get(index).copied().map(Scalar::Float64),
            Self::String(a) => a.get(index).cloned().map(Scalar::String),
        }
    }
}

/// Ensure every range lies within its axis
pub(crate) fn check_ranges(shape: &[usize], ranges: &[Range<usize>]) -> Result<()> {
    if shape.len() != ranges.len() {
        return Err(RuNeGridError::InvalidSlice {
            message: format!(
                "{} ranges given for an array with {} dimensions",
                ranges.len(),
                shape.len()
            ),
        });
    }
    for (axis, (range, &len)) in ranges.iter().zip(shape).enumerate() {
        if range.start > range.end || range.end > len {
            return Err(RuNeGridError::InvalidSlice {
                message: format!(
                    "range {}..{} is out of bounds for axis {axis} (length: {len})",
                    range.start, range.end
                ),
            });
        }
    }
    Ok(())
}
