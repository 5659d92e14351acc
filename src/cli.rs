//! Defines command-line interface options using `clap` for the RuNeGrid application.

use clap::{Args as ClapArgs, Parser, Subcommand};
use ru_ne_grid::config::{TransferConfig, WarpConfig};
use ru_ne_grid::parallel::ParallelConfig;
use ru_ne_grid::warp::Resampling;
use std::path::PathBuf;

/// A CLI tool for copying, subsetting, stacking and reprojecting NetCDF variables
#[derive(Parser, Debug)]
#[command(
    author = "Sam Green",
    version = "1.1.0",
    name = "RuNeGrid",
    about = "App for moving gridded variables between NetCDF files"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List dimensions, variables and attributes of a file
    Info {
        file: PathBuf,

        /// Describe a single variable instead of the whole file
        #[arg(long)]
        variable: Option<String>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy variables together with their dimensions and coordinate variables
    Copy {
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Variables to copy
        #[arg(long, value_delimiter = ',', required = true)]
        variables: Vec<String>,

        /// Replace variables already present in the output
        #[arg(long)]
        overwrite: bool,
    },

    /// Extract a hyperslab of one variable
    Subset {
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        #[arg(long)]
        variable: String,

        /// Range along a dimension, formatted as <dim>:<start>:<end>; repeatable
        #[arg(long = "slice", value_parser = parse_slice_arg)]
        slices: Vec<DimSlice>,

        /// Name of the variable in the output, defaults to the input name
        #[arg(long)]
        output_name: Option<String>,

        /// Maximum number of elements held in memory at once
        #[arg(long, default_value_t = TransferConfig::default().blocksize)]
        blocksize: usize,
    },

    /// Stack one variable from several files along a new dimension
    Concat {
        /// Input files, in output order
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[arg(long)]
        variable: String,

        /// Name of the new leading dimension
        #[arg(long)]
        dimension: String,

        /// One label per input, stored as a string coordinate variable
        #[arg(long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
    },

    /// Reproject variables onto the grid of a template variable
    Warp {
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Variables to warp
        #[arg(long, value_delimiter = ',', required = true)]
        variables: Vec<String>,

        /// CRS of the input grid, e.g. EPSG:4326 or a PROJ.4 string. Read from the file when omitted.
        #[arg(long)]
        source_crs: Option<String>,

        /// File holding the template variable
        #[arg(long)]
        template: PathBuf,

        #[arg(long)]
        template_variable: String,

        /// Resampling algorithm: nearest or bilinear
        #[arg(long, default_value_t = WarpConfig::default().resampling, value_parser = parse_resampling)]
        resampling: Resampling,
    },

    /// Min, mean and max of variables across files
    Stats {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, value_delimiter = ',', required = true)]
        variables: Vec<String>,
    },
}

/// Where results are written
#[derive(ClapArgs, Debug)]
pub struct OutputArgs {
    /// Output NetCDF file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Add to an existing output file instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Create the output in the netCDF-3 classic format
    #[arg(long)]
    pub classic: bool,

    /// Deflate level (0-9) for new variables
    #[arg(long)]
    pub compression: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimSlice {
    pub dimension: String,
    pub start: usize,
    pub end: usize,
}

impl Args {
    pub fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig::new(self.threads)
    }

    pub fn warp_config(&self, resampling: Resampling) -> WarpConfig {
        let defaults = WarpConfig::default();
        WarpConfig {
            resampling,
            threads: self.threads.unwrap_or(defaults.threads),
            ..defaults
        }
    }
}

fn parse_resampling(s: &str) -> Result<Resampling, String> {
    s.parse().map_err(|e: ru_ne_grid::RuNeGridError| e.to_string())
}

fn parse_slice_arg(s: &str) -> Result<DimSlice, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [dimension, start, end] = parts.as_slice() else {
        return Err("Invalid format: Expected '<dimension>:<start>:<end>'.".to_string());
    };
    let start = start
        .parse::<usize>()
        .map_err(|_| format!("Invalid start index for dimension '{dimension}'"))?;
    let end = end
        .parse::<usize>()
        .map_err(|_| format!("Invalid end index for dimension '{dimension}'"))?;
    if start > end {
        return Err(format!("Start {start} is after end {end} for dimension '{dimension}'"));
    }
    Ok(DimSlice {
        dimension: dimension.to_string(),
        start,
        end,
    })
}
