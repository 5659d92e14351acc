//! Operation settings

use crate::fill::FillPolicy;
use crate::subset::DEFAULT_BLOCKSIZE;
use crate::warp::Resampling;

/// Settings for copy, subset and concatenation
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Maximum number of elements held in memory during a subset transfer
    pub blocksize: usize,
    pub fill_policy: FillPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            blocksize: DEFAULT_BLOCKSIZE,
            fill_policy: FillPolicy::default(),
        }
    }
}

impl TransferConfig {
    #[must_use]
    pub fn with_blocksize(mut self, blocksize: usize) -> Self {
        self.blocksize = blocksize;
        self
    }
}

/// Settings for reprojection
#[derive(Debug, Clone, PartialEq)]
pub struct WarpConfig {
    pub resampling: Resampling,
    /// Worker threads of the pool one warp runs its slices on
    pub threads: usize,
    pub fill_policy: FillPolicy,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            resampling: Resampling::Nearest,
            threads: 4,
            fill_policy: FillPolicy::default(),
        }
    }
}
