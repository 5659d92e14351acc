//! Dataset model: dimensions, variables and attributes behind a storage boundary
//!
//! The copy, subset, concatenation and warp operations never talk to a file
//! format directly. They read through [`DatasetReader`] and mutate through
//! [`DatasetWriter`], so the same algorithms run against the in-memory
//! [`MemoryDataset`] and the netCDF-backed [`NcDataset`].
//!
//! # Organization
//!
//! - [`types`]: data types, typed scalars and N-dimensional arrays
//! - [`attributes`]: attribute values and JSON dictionaries
//! - [`memory`]: in-memory backend
//! - [`netcdf`]: netCDF file backend

pub mod attributes;
pub mod memory;
pub mod netcdf;
pub mod types;

pub use attributes::{attributes_to_json, set_attributes_from_json, AttrValue};
pub use memory::MemoryDataset;
pub use self::netcdf::NcDataset;
pub use types::{ArrayData, DataType, Scalar};

use crate::errors::Result;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an opened or created dataset handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(u64);

impl DatasetId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Container flavor a dataset was opened or created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    /// Fixed-structure classic format: numeric signed types only, no strings, no compression
    Classic,
    /// Extended format with unsigned and string types, compression and chunking
    #[default]
    Extended,
}

/// What a dataset handle can do, consulted by the copy primitives instead of
/// relying on format-specific behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub unlimited_dimensions: bool,
    pub string_variables: bool,
    pub unsigned_types: bool,
    pub compression: bool,
    pub deletion: bool,
}

impl Capabilities {
    /// Capabilities implied by a container flavor; deletion is backend specific
    #[must_use]
    pub const fn for_flavor(flavor: Flavor, deletion: bool) -> Self {
        match flavor {
            Flavor::Classic => Self {
                unlimited_dimensions: true,
                string_variables: false,
                unsigned_types: false,
                compression: false,
                deletion,
            },
            Flavor::Extended => Self {
                unlimited_dimensions: true,
                string_variables: true,
                unsigned_types: true,
                compression: true,
                deletion,
            },
        }
    }

    /// Whether variables of `dtype` can be declared
    #[must_use]
    pub const fn supports_dtype(&self, dtype: DataType) -> bool {
        match dtype {
            DataType::String => self.string_variables,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => self.unsigned_types,
            _ => true,
        }
    }
}

/// Information about a dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub name: String,
    /// Current length; for unlimited dimensions the extent written so far
    pub length: usize,
    pub is_unlimited: bool,
}

impl DimensionInfo {
    /// Whether this (target) dimension can host data laid out along `source`
    #[must_use]
    pub fn accepts(&self, source: &DimensionInfo) -> bool {
        self.is_unlimited || self.length == source.length
    }

    /// Human readable description used in conflict messages
    #[must_use]
    pub fn describe(&self) -> String {
        if self.is_unlimited {
            format!("unlimited length (currently {})", self.length)
        } else {
            format!("length {}", self.length)
        }
    }
}

/// Declared metadata of a variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dtype: DataType,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// Fill value declared when the variable was created, if any
    pub fill_value: Option<Scalar>,
    /// Attributes in declaration order
    pub attributes: Vec<(String, AttrValue)>,
}

impl VariableInfo {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Ranges covering the whole variable
    #[must_use]
    pub fn full_ranges(&self) -> Vec<Range<usize>> {
        self.shape.iter().map(|&len| 0..len).collect()
    }
}

/// Creation options for a new variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableOptions {
    /// Explicit fill value; when `None` the copy primitives resolve one
    pub fill_value: Option<Scalar>,
    /// Deflate level (0-9), honored where the container supports compression
    pub compression: Option<u8>,
    /// Storage chunk shape, honored where the container supports compression
    pub chunk_sizes: Option<Vec<usize>>,
}

impl VariableOptions {
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: Scalar) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    #[must_use]
    pub fn with_compression(mut self, level: u8) -> Self {
        self.compression = Some(level.min(9));
        self
    }
}

/// Read access to a dataset
pub trait DatasetReader {
    /// Identity of this handle
    fn id(&self) -> DatasetId;

    fn capabilities(&self) -> Capabilities;

    /// Dimension names in declaration order
    fn dimension_names(&self) -> Vec<String>;

    fn dimension(&self, name: &str) -> Option<DimensionInfo>;

    /// Variable names in declaration order
    fn variable_names(&self) -> Vec<String>;

    fn variable(&self, name: &str) -> Option<VariableInfo>;

    /// Read the hyperslab described by one range per dimension
    fn read(&self, name: &str, ranges: &[Range<usize>]) -> Result<ArrayData>;

    fn global_attributes(&self) -> Vec<(String, AttrValue)>;

    fn has_dimension(&self, name: &str) -> bool {
        self.dimension(name).is_some()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    /// Read a whole variable
    fn read_all(&self, name: &str) -> Result<ArrayData> {
        let info = self
            .variable(name)
            .ok_or_else(|| crate::errors::RuNeGridError::missing_variable(name))?;
        self.read(name, &info.full_ranges())
    }

    fn global_attribute(&self, name: &str) -> Option<AttrValue> {
        self.global_attributes()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Write access to a dataset. Implementations assume a single writer.
pub trait DatasetWriter: DatasetReader {
    /// Declare a dimension; `None` declares an unlimited dimension
    fn add_dimension(&mut self, name: &str, length: Option<usize>) -> Result<DimensionInfo>;

    /// Remove a dimension no variable refers to
    fn remove_dimension(&mut self, name: &str) -> Result<()>;

    /// Declare a variable over existing dimensions. `options.fill_value`, when
    /// set, is recorded as the variable's `_FillValue`.
    fn add_variable(
        &mut self,
        name: &str,
        dtype: DataType,
        dimensions: &[String],
        options: &VariableOptions,
    ) -> Result<VariableInfo>;

    fn remove_variable(&mut self, name: &str) -> Result<()>;

    /// Write `data` into the variable starting at `offset`. Writing past the
    /// end of an unlimited dimension grows it.
    fn write(&mut self, name: &str, offset: &[usize], data: &ArrayData) -> Result<()>;

    fn set_variable_attribute(&mut self, variable: &str, name: &str, value: AttrValue)
        -> Result<()>;

    fn set_global_attribute(&mut self, name: &str, value: AttrValue) -> Result<()>;
}
