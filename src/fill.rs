//! Fill-value resolution
//!
//! A variable's missing-data sentinel is taken from, in order:
//!
//! 1. the fill value declared when the variable was created,
//! 2. its `_FillValue` attribute,
//! 3. its `missing_value` attribute (converted to the variable's type),
//! 4. the [`FillPolicy`] table entry for its data type.

use crate::dataset::{DataType, Scalar, VariableInfo};
use crate::errors::{Result, RuNeGridError};
use std::collections::BTreeMap;

/// Immutable mapping from data type to default fill value
#[derive(Debug, Clone, PartialEq)]
pub struct FillPolicy {
    defaults: BTreeMap<DataType, Scalar>,
}

impl Default for FillPolicy {
    /// The netCDF default fill values
    fn default() -> Self {
        Self::new([
            Scalar::Int8(-127),
            Scalar::Int16(-32767),
            Scalar::Int32(-2_147_483_647),
            Scalar::UInt8(255),
            Scalar::UInt16(65535),
            Scalar::UInt32(4_294_967_295),
            Scalar::Float32(9.969_209_968_386_869e36),
            Scalar::Float64(9.969_209_968_386_869e36),
        ])
    }
}

impl FillPolicy {
    /// Build a table from one default per data type; later entries win
    pub fn new(defaults: impl IntoIterator<Item = Scalar>) -> Self {
        Self {
            defaults: defaults.into_iter().map(|v| (v.dtype(), v)).collect(),
        }
    }

    /// An empty table; only explicit fill metadata resolves
    #[must_use]
    pub fn empty() -> Self {
        Self {
            defaults: BTreeMap::new(),
        }
    }

    /// Copy of this table with `value` as the default for its data type
    #[must_use]
    pub fn with_default(&self, value: Scalar) -> Self {
        let mut defaults = self.defaults.clone();
        defaults.insert(value.dtype(), value);
        Self { defaults }
    }

    #[must_use]
    pub fn get(&self, dtype: DataType) -> Option<&Scalar> {
        self.defaults.get(&dtype)
    }

    /// Resolve the fill value of a variable from its declared metadata
    pub fn resolve(&self, variable: &VariableInfo) -> Result<Scalar> {
        if let Some(fill) = &variable.fill_value {
            return Ok(fill.clone());
        }
        for attr in ["_FillValue", "missing_value"] {
            if let Some(fill) = variable
                .attribute(attr)
                .and_then(|value| value.scalar_as(variable.dtype))
            {
                return Ok(fill);
            }
        }
        self.get(variable.dtype)
            .cloned()
            .ok_or_else(|| RuNeGridError::UnknownDtype {
                dtype: variable.dtype.to_string(),
            })
    }
}

/// Resolve a variable's fill value against the default table
pub fn resolve_fill_value(variable: &VariableInfo) -> Result<Scalar> {
    FillPolicy::default().resolve(variable)
}
