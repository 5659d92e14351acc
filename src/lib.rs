//! RuNeGrid: dependency-aware manipulation of gridded NetCDF datasets
//!
//! A Rust library for moving variables between NetCDF-style datasets without
//! losing what they depend on. Copying a variable brings its dimensions and
//! coordinate variables along, subsets are streamed in bounded memory, slices
//! from many files can be stacked along a new dimension, and gridded variables
//! can be reprojected onto the grid of a template variable.
//!
//! ## Key Features
//!
//! - **Graph Copy**: Dimensions, coordinate variables and attributes follow the variables that use them
//! - **Chunked Subsets**: Hyperslab extraction that never holds more than `blocksize` elements
//! - **Concatenation**: Stack a variable from several datasets along a new labeled dimension
//! - **Reprojection**: Warp variables onto a template grid with nearest or bilinear resampling
//! - **Fill Values**: One explicit policy for missing-data sentinels across all operations
//! - **Two Backends**: NetCDF files and an in-memory dataset share the same traits
//!
//! ## Module Organization
//!
//! - [`dataset`]: Reader/writer traits, typed values and the NetCDF and in-memory backends
//! - [`fill`]: Fill-value resolution
//! - [`copy`]: Dimension, variable and attribute copying
//! - [`subset`]: Blocked hyperslab extraction
//! - [`concat`]: Concatenation along a new dimension
//! - [`spatial`]: Affine transforms, bounding boxes, projections and grids
//! - [`warp`]: Reprojection onto a template grid
//! - [`statistics`]: Parallel min/mean/max across datasets
//! - [`metadata`]: Dataset summaries
//! - [`history`]: Provenance stamps
//! - [`parallel`], [`config`]: Thread pools and operation settings
//! - [`errors`]: Centralized error handling
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use ru_ne_grid::prelude::*;
//!
//! let source = NcDataset::open("input.nc").unwrap();
//! let mut target = NcDataset::create("output.nc", Flavor::Extended).unwrap();
//!
//! // Copies "temperature" plus its dimensions and coordinate variables
//! copy_variable(&source, &mut target, "temperature", false, &VariableOptions::default()).unwrap();
//!
//! // First ten time steps of "salinity", streamed in small blocks
//! extract_subset(
//!     &source,
//!     &mut target,
//!     "salinity",
//!     &[Some(0..10), None, None],
//!     None,
//!     1_000_000,
//!     &VariableOptions::default(),
//! )
//! .unwrap();
//! ```

pub mod concat;
pub mod config;
pub mod copy;
pub mod dataset;
pub mod errors;
pub mod fill;
pub mod history;
pub mod metadata;
pub mod parallel;
pub mod spatial;
pub mod statistics;
pub mod subset;
pub mod warp;

pub use errors::{Result, RuNeGridError};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::concat::{concat_variable_along_dimension, ConcatSources};
    pub use crate::config::{TransferConfig, WarpConfig};
    pub use crate::copy::{
        copy_attributes, copy_dimension, copy_variable, copy_variable_dimensions,
        create_variable_like, GraphCopier,
    };
    pub use crate::dataset::{
        ArrayData, AttrValue, DataType, DatasetReader, DatasetWriter, Flavor, MemoryDataset,
        NcDataset, Scalar, VariableInfo, VariableOptions,
    };
    pub use crate::errors::{Result, RuNeGridError};
    pub use crate::fill::{resolve_fill_value, FillPolicy};
    pub use crate::history::append_history;
    pub use crate::metadata::{summarize_dataset, DatasetSummary};
    pub use crate::parallel::ParallelConfig;
    pub use crate::spatial::{get_crs, set_crs, BBox, Projection, SpatialGrid};
    pub use crate::statistics::{collect_statistics, VariableStatistics};
    pub use crate::subset::extract_subset;
    pub use crate::warp::{warp_like, Resampling, Warper};
}
