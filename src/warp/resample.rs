//! Resampling engine boundary and the built-in grid resampler

use crate::errors::{Result, RuNeGridError};
use crate::parallel::ParallelConfig;
use crate::spatial::{Affine, Projection, Transformer};
use log::debug;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Resampling algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    #[default]
    Nearest,
    Bilinear,
}

impl Resampling {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resampling {
    type Err = RuNeGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(RuNeGridError::Generic(format!(
                "unknown resampling '{other}', expected nearest or bilinear"
            ))),
        }
    }
}

/// Everything a resampler needs besides the arrays
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectParams {
    pub src_affine: Affine,
    pub src_crs: Projection,
    pub dst_affine: Affine,
    pub dst_crs: Projection,
    pub resampling: Resampling,
    /// Source cells holding this value (or NaN) carry no data
    pub src_nodata: Option<f64>,
    /// Value for destination cells that receive no data
    pub dst_nodata: f64,
    /// Worker threads for one call
    pub threads: usize,
}

/// Fills a destination grid from a source grid under a change of CRS and
/// transform. Implementations block until the destination is complete.
pub trait Resampler: Sync {
    fn reproject(
        &self,
        source: ArrayView2<'_, f64>,
        destination: ArrayViewMut2<'_, f64>,
        params: &ReprojectParams,
    ) -> Result<()>;
}

/// Resampler that maps every destination cell center back into the source
/// grid with `proj4rs`.
///
/// Rows are processed in parallel. Called from inside a rayon pool, the rows
/// run on that pool; otherwise a pool of `params.threads` workers is built
/// for the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridResampler;

impl GridResampler {
    fn sample(
        source: &ArrayView2<'_, f64>,
        col: f64,
        row: f64,
        params: &ReprojectParams,
    ) -> f64 {
        let (height, width) = source.dim();
        if !(col >= 0.0 && row >= 0.0 && col < width as f64 && row < height as f64) {
            return params.dst_nodata;
        }
        let is_valid = |v: f64| !v.is_nan() && params.src_nodata.map_or(true, |nd| v != nd);

        match params.resampling {
            Resampling::Nearest => {
                let value = source[[row as usize, col as usize]];
                if is_valid(value) {
                    value
                } else {
                    params.dst_nodata
                }
            }
            Resampling::Bilinear => {
                // Pixel space relative to cell centers
                let fx = col - 0.5;
                let fy = row - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let mut sum = 0.0;
                let mut weight = 0.0;
                for (dy, wy) in [(0.0, 1.0 - ty), (1.0, ty)] {
                    for (dx, wx) in [(0.0, 1.0 - tx), (1.0, tx)] {
                        let (c, r) = (x0 + dx, y0 + dy);
                        if c < 0.0 || r < 0.0 || c >= width as f64 || r >= height as f64 {
                            continue;
                        }
                        let value = source[[r as usize, c as usize]];
                        let w = wx * wy;
                        if w > 0.0 && is_valid(value) {
                            sum += value * w;
                            weight += w;
                        }
                    }
                }
                if weight > 0.0 {
                    sum / weight
                } else {
                    params.dst_nodata
                }
            }
        }
    }
}

impl Resampler for GridResampler {
    fn reproject(
        &self,
        source: ArrayView2<'_, f64>,
        mut destination: ArrayViewMut2<'_, f64>,
        params: &ReprojectParams,
    ) -> Result<()> {
        let src_inverse = params.src_affine.inverse().ok_or_else(|| {
            RuNeGridError::ReprojectionFailed(format!(
                "source transform {:?} is not invertible",
                params.src_affine
            ))
        })?;
        if params.dst_affine.is_degenerate() {
            return Err(RuNeGridError::ReprojectionFailed(format!(
                "destination transform {:?} is degenerate",
                params.dst_affine
            )));
        }
        let (height, width) = destination.dim();
        debug!(
            "Resampling {:?} onto {height}x{width} ({}, {} threads)",
            source.dim(),
            params.resampling,
            params.threads
        );

        // Destination cells are mapped back into the source CRS
        let source = &source;
        let resample_rows = || -> Result<Vec<Vec<f64>>> {
            (0..height)
                .into_par_iter()
                .map_init(
                    || Transformer::new(&params.dst_crs, &params.src_crs),
                    |transformer, row| {
                        let transformer = transformer
                            .as_ref()
                            .map_err(|e| RuNeGridError::ReprojectionFailed(e.to_string()))?;
                        Ok((0..width)
                            .map(|col| {
                                let (x, y) = params.dst_affine.cell_center(col, row);
                                match transformer.transform(x, y) {
                                    Ok((sx, sy)) => {
                                        let (scol, srow) = src_inverse.apply(sx, sy);
                                        Self::sample(source, scol, srow, params)
                                    }
                                    Err(_) => params.dst_nodata,
                                }
                            })
                            .collect())
                    },
                )
                .collect()
        };
        // Inside a pool (as set up by the warper) the caller's workers are used
        let rows = if rayon::current_thread_index().is_some() {
            resample_rows()?
        } else {
            ParallelConfig::with_threads(params.threads.max(1))
                .build_pool()?
                .install(resample_rows)?
        };

        for (row, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                destination[[row, col]] = value;
            }
        }
        Ok(())
    }
}

/// Force every masked cell of `buffer` to `fill`
pub fn apply_mask(buffer: &mut Array2<f64>, mask: &Array2<bool>, fill: f64) {
    ndarray::Zip::from(buffer).and(mask).for_each(|value, &masked| {
        if masked {
            *value = fill;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(resampling: Resampling) -> ReprojectParams {
        let affine = Affine::from_origin(0.0, 3.0, 1.0, -1.0);
        ReprojectParams {
            src_affine: affine,
            src_crs: Projection::wgs84(),
            dst_affine: affine,
            dst_crs: Projection::wgs84(),
            resampling,
            src_nodata: Some(-9999.0),
            dst_nodata: -9999.0,
            threads: 2,
        }
    }

    #[test]
    fn test_identity_nearest() {
        let source = array![[1.0, 2.0, 3.0], [4.0, -9999.0, 6.0], [7.0, 8.0, 9.0]];
        let mut destination = Array2::zeros((3, 3));
        GridResampler
            .reproject(source.view(), destination.view_mut(), &params(Resampling::Nearest))
            .unwrap();
        assert_eq!(destination, source);
    }

    #[test]
    fn test_shifted_destination_gets_nodata_outside() {
        let source = array![[1.0, 2.0], [3.0, 4.0]];
        let mut p = params(Resampling::Nearest);
        p.src_affine = Affine::from_origin(0.0, 2.0, 1.0, -1.0);
        p.dst_affine = Affine::from_origin(1.0, 2.0, 1.0, -1.0);
        let mut destination = Array2::zeros((2, 2));
        GridResampler
            .reproject(source.view(), destination.view_mut(), &p)
            .unwrap();
        assert_eq!(destination, array![[2.0, -9999.0], [4.0, -9999.0]]);
    }

    #[test]
    fn test_bilinear_skips_nodata_neighbours() {
        let source = array![[1.0, 3.0], [-9999.0, 3.0]];
        let mut p = params(Resampling::Bilinear);
        p.src_affine = Affine::from_origin(0.0, 2.0, 1.0, -1.0);
        // One destination cell centered between all four source centers
        p.dst_affine = Affine::from_origin(0.5, 1.5, 1.0, -1.0);
        let mut destination = Array2::zeros((1, 1));
        GridResampler
            .reproject(source.view(), destination.view_mut(), &p)
            .unwrap();
        assert!((destination[[0, 0]] - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_transform_fails() {
        let mut p = params(Resampling::Nearest);
        p.src_affine = Affine::from_origin(0.0, 0.0, 0.0, 0.0);
        let source = Array2::zeros((1, 1));
        let mut destination = Array2::zeros((1, 1));
        assert!(matches!(
            GridResampler.reproject(source.view(), destination.view_mut(), &p),
            Err(RuNeGridError::ReprojectionFailed(_))
        ));
    }

    #[test]
    fn test_mask_wins() {
        let mut buffer = array![[1.0, 2.0], [3.0, 4.0]];
        let mask = array![[false, true], [true, false]];
        apply_mask(&mut buffer, &mask, 0.0);
        assert_eq!(buffer, array![[1.0, 0.0], [0.0, 4.0]]);
    }
}
