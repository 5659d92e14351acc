//! Attribute values and their conversion to and from JSON dictionaries

use super::{DataType, DatasetReader, DatasetWriter, Scalar};
use crate::errors::{Result, RuNeGridError};
use serde_json::{Map, Number, Value as JsonValue};

/// Value of a variable or global attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Schar(i8),
    Schars(Vec<i8>),
    Uchar(u8),
    Uchars(Vec<u8>),
    Short(i16),
    Shorts(Vec<i16>),
    Ushort(u16),
    Ushorts(Vec<u16>),
    Int(i32),
    Ints(Vec<i32>),
    Uint(u32),
    Uints(Vec<u32>),
    Float(f32),
    Floats(Vec<f32>),
    Double(f64),
    Doubles(Vec<f64>),
    Str(String),
    Strs(Vec<String>),
}

impl AttrValue {
    /// First element as a scalar; vector attributes yield their first value
    #[must_use]
    pub fn first(&self) -> Option<Scalar> {
        let scalar = match self {
            Self::Schar(v) => Scalar::Int8(*v),
            Self::Schars(v) => Scalar::Int8(*v.first()?),
            Self::Uchar(v) => Scalar::UInt8(*v),
            Self::Uchars(v) => Scalar::UInt8(*v.first()?),
            Self::Short(v) => Scalar::Int16(*v),
            Self::Shorts(v) => Scalar::Int16(*v.first()?),
            Self::Ushort(v) => Scalar::UInt16(*v),
            Self::Ushorts(v) => Scalar::UInt16(*v.first()?),
            Self::Int(v) => Scalar::Int32(*v),
            Self::Ints(v) => Scalar::Int32(*v.first()?),
            Self::Uint(v) => Scalar::UInt32(*v),
            Self::Uints(v) => Scalar::UInt32(*v.first()?),
            Self::Float(v) => Scalar::Float32(*v),
            Self::Floats(v) => Scalar::Float32(*v.first()?),
            Self::Double(v) => Scalar::Float64(*v),
            Self::Doubles(v) => Scalar::Float64(*v.first()?),
            Self::Str(v) => Scalar::String(v.clone()),
            Self::Strs(v) => Scalar::String(v.first()?.clone()),
        };
        Some(scalar)
    }

    /// First element converted to the variable's data type
    #[must_use]
    pub fn scalar_as(&self, dtype: DataType) -> Option<Scalar> {
        self.first()?.cast(dtype)
    }

    /// Text content for string attributes
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Strs(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Render as JSON; numeric vectors become arrays
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        fn float(v: f64) -> JsonValue {
            Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
        }
        match self {
            Self::Schar(v) => JsonValue::from(*v),
            Self::Schars(v) => JsonValue::from(v.clone()),
            Self::Uchar(v) => JsonValue::from(*v),
            Self::Uchars(v) => JsonValue::from(v.clone()),
            Self::Short(v) => JsonValue::from(*v),
            Self::Shorts(v) => JsonValue::from(v.clone()),
            Self::Ushort(v) => JsonValue::from(*v),
            Self::Ushorts(v) => JsonValue::from(v.clone()),
            Self::Int(v) => JsonValue::from(*v),
            Self::Ints(v) => JsonValue::from(v.clone()),
            Self::Uint(v) => JsonValue::from(*v),
            Self::Uints(v) => JsonValue::from(v.clone()),
            Self::Float(v) => float(f64::from(*v)),
            Self::Floats(v) => JsonValue::Array(v.iter().map(|&x| float(f64::from(x))).collect()),
            Self::Double(v) => float(*v),
            Self::Doubles(v) => JsonValue::Array(v.iter().map(|&x| float(x)).collect()),
            Self::Str(v) => JsonValue::from(v.clone()),
            Self::Strs(v) => JsonValue::from(v.clone()),
        }
    }

    /// Inverse of [`AttrValue::to_json`]. Integers map to `Int` (or `Double`
    /// when out of range), other numbers to `Double`.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(s) => Ok(Self::Str(s.clone())),
            JsonValue::Bool(b) => Ok(Self::Schar(i8::from(*b))),
            JsonValue::Number(n) => Ok(number_to_attr(n)),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => Ok(Self::Strs(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_number) => {
                let ints: Option<Vec<i32>> = items
                    .iter()
                    .map(|v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
                    .collect();
                match ints {
                    Some(ints) => Ok(Self::Ints(ints)),
                    None => Ok(Self::Doubles(
                        items.iter().filter_map(JsonValue::as_f64).collect(),
                    )),
                }
            }
            other => Err(RuNeGridError::Generic(format!(
                "cannot store JSON value {other} as an attribute"
            ))),
        }
    }
}

fn number_to_attr(n: &Number) -> AttrValue {
    match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
        Some(i) => AttrValue::Int(i),
        None => AttrValue::Double(n.as_f64().unwrap_or(f64::NAN)),
    }
}

impl From<Scalar> for AttrValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Int8(v) => Self::Schar(v),
            Scalar::Int16(v) => Self::Short(v),
            Scalar::Int32(v) => Self::Int(v),
            Scalar::UInt8(v) => Self::Uchar(v),
            Scalar::UInt16(v) => Self::Ushort(v),
            Scalar::UInt32(v) => Self::Uint(v),
            Scalar::Float32(v) => Self::Float(v),
            Scalar::Float64(v) => Self::Double(v),
            Scalar::String(v) => Self::Str(v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i16> for AttrValue {
    fn from(value: i16) -> Self {
        Self::Short(value)
    }
}

/// Returns the attributes of `variable` (or the global attributes when `None`)
/// as a JSON object.
pub fn attributes_to_json<D: DatasetReader + ?Sized>(
    dataset: &D,
    variable: Option<&str>,
) -> Result<Map<String, JsonValue>> {
    let attributes = match variable {
        Some(name) => {
            dataset
                .variable(name)
                .ok_or_else(|| RuNeGridError::missing_variable(name))?
                .attributes
        }
        None => dataset.global_attributes(),
    };
    Ok(attributes
        .into_iter()
        .map(|(name, value)| (name, value.to_json()))
        .collect())
}

/// Sets every entry of `attributes` on `variable` (or globally when `None`)
pub fn set_attributes_from_json<D: DatasetWriter + ?Sized>(
    dataset: &mut D,
    variable: Option<&str>,
    attributes: &Map<String, JsonValue>,
) -> Result<()> {
    for (name, value) in attributes {
        let value = AttrValue::from_json(value)?;
        match variable {
            Some(var) => dataset.set_variable_attribute(var, name, value)?,
            None => dataset.set_global_attribute(name, value)?,
        }
    }
    Ok(())
}
