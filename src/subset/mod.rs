//! Memory-bounded subset extraction
//!
//! [`extract_subset`] copies a hyperslab of one variable into a target
//! dataset, together with the matching slices of its coordinate variables.
//! Transfers larger than the blocksize are split along the leading axis (see
//! [`TransferLayout`]); the output is identical whichever blocksize is used.

pub mod blocks;

pub use blocks::{LeadingAxisBlocks, LeadingBlock, TransferLayout};

use crate::copy::{source_variable, GraphCopier, Plan, Step};
use crate::dataset::{DatasetReader, DatasetWriter, VariableInfo, VariableOptions};
use crate::errors::{EntityKind, Result, RuNeGridError};
use log::{debug, info};
use std::ops::Range;

/// Default number of elements held in memory at once
pub const DEFAULT_BLOCKSIZE: usize = 100_000_000;

impl GraphCopier {
    /// Copy the hyperslab `slices` of variable `name` into `target`.
    ///
    /// `slices` holds one entry per dimension; `None` selects the whole
    /// dimension. The output is named `target_name` (default `name`) and lives
    /// on dimensions of the same names, sized to the slice spans. Coordinate
    /// variables of those dimensions are subset alongside.
    #[allow(clippy::too_many_arguments)]
    pub fn extract_subset<S, T>(
        &self,
        source: &S,
        target: &mut T,
        name: &str,
        slices: &[Option<Range<usize>>],
        target_name: Option<&str>,
        blocksize: usize,
        options: &VariableOptions,
    ) -> Result<VariableInfo>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        let output = target_name.unwrap_or(name);
        info!("Extracting subset of '{name}' into '{output}'");
        let mut plan = Plan::new();
        self.plan_extract(source, &*target, &mut plan, name, slices, target_name, blocksize, options)?;
        plan.execute(source, target)?;
        source_variable(target, output)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn plan_extract<S, T>(
        &self,
        source: &S,
        target: &T,
        plan: &mut Plan,
        name: &str,
        slices: &[Option<Range<usize>>],
        target_name: Option<&str>,
        blocksize: usize,
        options: &VariableOptions,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetReader + ?Sized,
    {
        let info = source_variable(source, name)?;
        if slices.len() != info.rank() {
            return Err(RuNeGridError::InvalidSliceCount {
                var: name.to_string(),
                expected: info.rank(),
                found: slices.len(),
            });
        }
        plan.visit(source.id(), name);

        let output = target_name.unwrap_or(name);
        if plan.has_variable(target, output) {
            return Err(RuNeGridError::already_exists(EntityKind::Variable, output));
        }

        let mut ranges = Vec::with_capacity(slices.len());
        for (axis, dim_name) in info.dimensions.iter().enumerate() {
            let len = info.shape[axis];
            let range = slices[axis].clone().unwrap_or(0..len);
            if range.start > range.end || range.end > len {
                return Err(RuNeGridError::InvalidSlice {
                    message: format!(
                        "range {}..{} is out of bounds for dimension '{dim_name}' (length: {len})",
                        range.start, range.end
                    ),
                });
            }
            let span = range.end - range.start;
            // A zero length fixed dimension cannot be stored
            let source_unlimited = source
                .dimension(dim_name)
                .map_or(false, |dim| dim.is_unlimited);
            if span == 0 && !source_unlimited {
                return Err(RuNeGridError::InvalidSlice {
                    message: format!(
                        "range {}..{} of fixed dimension '{dim_name}' is empty",
                        range.start, range.end
                    ),
                });
            }

            match plan.dimension(target, dim_name) {
                Some(existing) if !existing.is_unlimited && existing.length != span => {
                    return Err(RuNeGridError::DimensionConflict {
                        dim: dim_name.clone(),
                        expected: format!("length {span}"),
                        found: existing.describe(),
                    });
                }
                Some(_) => {}
                None if span == 0 => plan.create_dimension(dim_name, None),
                None => plan.create_dimension(dim_name, Some(span)),
            }

            if source.has_variable(dim_name)
                && !plan.has_variable(target, dim_name)
                && plan.visit(source.id(), dim_name)
            {
                let coordinate = source_variable(source, dim_name)?;
                if coordinate.dimensions == [dim_name.as_str()] {
                    self.plan_extract(
                        source,
                        target,
                        plan,
                        dim_name,
                        &[Some(range.clone())],
                        None,
                        blocksize,
                        &VariableOptions::default(),
                    )?;
                } else {
                    debug!("Not subsetting '{dim_name}': it is not a 1-D coordinate variable");
                }
            }
            ranges.push(range);
        }

        let shape: Vec<usize> = ranges.iter().map(|r| r.end - r.start).collect();
        TransferLayout::for_shape(&shape, blocksize)?;

        let options = VariableOptions {
            fill_value: self.fill_for(&info, options)?,
            ..options.clone()
        };
        plan.push(Step::ExtractVariable {
            name: name.to_string(),
            target_name: output.to_string(),
            ranges,
            options,
            blocksize,
        });
        Ok(())
    }
}

/// Move the hyperslab `ranges` of source `name` into target `target_name`
/// starting at the origin, one leading-axis block at a time when needed.
pub(crate) fn transfer<S, T>(
    source: &S,
    target: &mut T,
    name: &str,
    target_name: &str,
    ranges: &[Range<usize>],
    blocksize: usize,
) -> Result<()>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    let shape: Vec<usize> = ranges.iter().map(|r| r.end - r.start).collect();
    if shape.contains(&0) {
        debug!("Nothing to transfer for '{name}': empty hyperslab {shape:?}");
        return Ok(());
    }
    match TransferLayout::for_shape(&shape, blocksize)? {
        TransferLayout::Bulk => {
            let data = source.read(name, ranges)?;
            target.write(target_name, &vec![0; ranges.len()], &data)
        }
        TransferLayout::Leading { increment } => {
            let blocks = LeadingAxisBlocks::new(ranges[0].clone(), increment);
            let total = blocks.count_blocks();
            for (index, block) in blocks.enumerate() {
                debug!(
                    "Block {}/{total} of '{name}': rows {}..{}",
                    index + 1,
                    block.source.start,
                    block.source.end
                );
                let mut block_ranges = ranges.to_vec();
                block_ranges[0] = block.source;
                let data = source.read(name, &block_ranges)?;
                let mut offset = vec![0; ranges.len()];
                offset[0] = block.target_offset;
                target.write(target_name, &offset, &data)?;
            }
            Ok(())
        }
    }
}

/// [`GraphCopier::extract_subset`] with the default fill policy
#[allow(clippy::too_many_arguments)]
pub fn extract_subset<S, T>(
    source: &S,
    target: &mut T,
    name: &str,
    slices: &[Option<Range<usize>>],
    target_name: Option<&str>,
    blocksize: usize,
    options: &VariableOptions,
) -> Result<VariableInfo>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().extract_subset(source, target, name, slices, target_name, blocksize, options)
}
