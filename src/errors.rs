//! Centralized error handling for RuNeGrid
//!
//! Every operation in the crate fails fast with one of these variants. Nothing is
//! retried internally and partially written targets are left as they are.

use crate::dataset::DataType;
use thiserror::Error;

/// Kind of entity involved in a name collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Dimension,
    Variable,
    Attribute,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Dimension => "Dimension",
            Self::Variable => "Variable",
            Self::Attribute => "Attribute",
        };
        f.write_str(name)
    }
}

/// Main error type for RuNeGrid operations
#[derive(Error, Debug)]
pub enum RuNeGridError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// JSON conversion error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Target already holds an entity with this name and overwrite is disabled
    #[error("{kind} '{name}' already exists in target, and overwrite is false")]
    AlreadyExists { kind: EntityKind, name: String },

    /// Existing target dimension disagrees with what the source requires
    #[error("Dimension '{dim}' already exists in target with {found}, but {expected} is required")]
    DimensionConflict {
        dim: String,
        expected: String,
        found: String,
    },

    /// Dimension cannot be removed while a variable still refers to it
    #[error("Dimension '{dim}' is still used by variable '{var}'")]
    DimensionInUse { dim: String, var: String },

    /// Variable not found in dataset
    #[error("Variable '{var}' not found in dataset")]
    MissingVariable { var: String },

    /// Dimension not found in dataset
    #[error("Dimension '{dim}' not found in dataset")]
    MissingDimension { dim: String },

    /// Attribute not found on variable or dataset
    #[error("Attribute '{name}' not found")]
    MissingAttribute { name: String },

    /// Number of slices does not match the variable rank
    #[error("Variable '{var}' has {expected} dimensions, but {found} slices were given")]
    InvalidSliceCount {
        var: String,
        expected: usize,
        found: usize,
    },

    /// Invalid slice specification
    #[error("Invalid slice specification: {message}")]
    InvalidSlice { message: String },

    /// Subset cannot be split along the leading axis within the memory budget
    #[error("blocksize {blocksize} must be greater than the product of all secondary dimensions ({secondary})")]
    BlocksizeTooSmall { blocksize: usize, secondary: usize },

    /// Coordinate values are not evenly spaced
    #[error("Coordinate '{axis}' is not evenly spaced: {detail}")]
    NonUniformSpacing { axis: String, detail: String },

    /// No fill value policy entry for the data type
    #[error("No default fill value for data type '{dtype}'")]
    UnknownDtype { dtype: String },

    /// Resampling engine rejected the transform
    #[error("Reprojection failed: {0}")]
    ReprojectionFailed(String),

    /// Projection descriptor could not be understood
    #[error("Invalid projection '{definition}': {reason}")]
    InvalidProjection { definition: String, reason: String },

    /// Array shape does not match the destination
    #[error("Shape mismatch for '{var}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        var: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Array data type does not match the destination
    #[error("Type mismatch for '{var}': expected {expected}, found {found}")]
    TypeMismatch {
        var: String,
        expected: DataType,
        found: DataType,
    },

    /// Concatenation needs more than one source
    #[error("At least two sources are required, found {found}")]
    NotEnoughSources { found: usize },

    /// The container flavor does not provide a capability
    #[error("Operation not supported by this dataset: {capability}")]
    Unsupported { capability: String },

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Generic error for messages without a dedicated variant
    #[error("{0}")]
    Generic(String),
}

impl RuNeGridError {
    pub(crate) fn already_exists(kind: EntityKind, name: &str) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn missing_variable(var: &str) -> Self {
        Self::MissingVariable {
            var: var.to_string(),
        }
    }

    pub(crate) fn missing_dimension(dim: &str) -> Self {
        Self::MissingDimension {
            dim: dim.to_string(),
        }
    }

    pub(crate) fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }
}

impl From<String> for RuNeGridError {
    fn from(error: String) -> Self {
        RuNeGridError::Generic(error)
    }
}

impl From<&str> for RuNeGridError {
    fn from(error: &str) -> Self {
        RuNeGridError::Generic(error.to_string())
    }
}

/// Result type alias for RuNeGrid operations
pub type Result<T> = std::result::Result<T, RuNeGridError>;
