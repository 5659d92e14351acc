//! Splitting a hyperslab transfer into memory-bounded blocks

use crate::errors::{Result, RuNeGridError};
use log::debug;
use std::ops::Range;

/// How a hyperslab of a given shape is moved under a blocksize budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferLayout {
    /// The whole hyperslab fits in one read and one write
    Bulk,
    /// Blocks of `increment` indices along the leading axis
    Leading { increment: usize },
}

impl TransferLayout {
    /// Choose a layout for a target of `shape` holding at most `blocksize`
    /// elements in memory at once.
    ///
    /// Only the leading axis is ever split, so the product of all other axes
    /// must stay below `blocksize`.
    pub fn for_shape(shape: &[usize], blocksize: usize) -> Result<Self> {
        let total: u128 = shape.iter().map(|&len| len as u128).product();
        if shape.is_empty() || total < blocksize as u128 {
            return Ok(Self::Bulk);
        }
        let secondary: u128 = shape[1..].iter().map(|&len| len as u128).product();
        if secondary >= blocksize as u128 {
            return Err(RuNeGridError::BlocksizeTooSmall {
                blocksize,
                secondary: usize::try_from(secondary).unwrap_or(usize::MAX),
            });
        }
        let increment = shape[0] as u128 * blocksize as u128 / total;
        let increment = usize::try_from(increment).unwrap_or(usize::MAX).max(1);
        debug!("Transferring {shape:?} in leading-axis blocks of {increment}");
        Ok(Self::Leading { increment })
    }
}

/// One block along the leading axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingBlock {
    /// Indices read from the source
    pub source: Range<usize>,
    /// Position of the block's first index in the target
    pub target_offset: usize,
}

/// Iterator over consecutive leading-axis blocks of a source range; the last
/// block is truncated at the range's end.
#[derive(Debug, Clone)]
pub struct LeadingAxisBlocks {
    span: Range<usize>,
    increment: usize,
    position: usize,
}

impl LeadingAxisBlocks {
    pub fn new(span: Range<usize>, increment: usize) -> Self {
        Self {
            position: span.start,
            span,
            increment: increment.max(1),
        }
    }

    /// Number of blocks the iterator yields in total
    #[must_use]
    pub fn count_blocks(&self) -> usize {
        let len = self.span.end.saturating_sub(self.span.start);
        (len + self.increment - 1) / self.increment
    }
}

impl Iterator for LeadingAxisBlocks {
    type Item = LeadingBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.span.end {
            return None;
        }
        let start = self.position;
        let end = start.saturating_add(self.increment).min(self.span.end);
        self.position = end;
        Some(LeadingBlock {
            source: start..end,
            target_offset: start - self.span.start,
        })
    }
}
