//! Reprojection of gridded variables onto a template grid
//!
//! [`Warper::warp_like`] resamples variables laid out on a source grid onto
//! the grid and CRS of a template variable. Variables are processed one 2-D
//! slice at a time. Cells the template marks as missing always end up as the
//! fill value, whatever the resampler produced there.

pub mod resample;

pub use resample::{apply_mask, GridResampler, ReprojectParams, Resampler, Resampling};

use crate::config::WarpConfig;
use crate::copy::{source_variable, GraphCopier, Plan};
use crate::dataset::{
    ArrayData, DataType, DatasetReader, DatasetWriter, Scalar, VariableInfo,
    VariableOptions,
};
use crate::errors::{EntityKind, Result, RuNeGridError};
use crate::parallel::ParallelConfig;
use crate::spatial::{get_crs, set_crs, Projection, SpatialGrid};
use log::{debug, info};
use ndarray::{Array2, Dimension, IxDyn};
use rayon::ThreadPool;
use std::ops::Range;

/// Attributes describing the source grid's CRS, not carried to the output
const SPATIAL_ATTRIBUTES: [&str; 3] = ["grid_mapping", "proj4", "proj4text"];

/// Reprojection driver
#[derive(Debug, Clone)]
pub struct Warper<R = GridResampler> {
    config: WarpConfig,
    resampler: R,
}

impl Default for Warper<GridResampler> {
    fn default() -> Self {
        Self::new(WarpConfig::default())
    }
}

impl Warper<GridResampler> {
    pub fn new(config: WarpConfig) -> Self {
        Self {
            config,
            resampler: GridResampler,
        }
    }
}

impl<R: Resampler> Warper<R> {
    /// Use a different resampling engine
    pub fn with_resampler(config: WarpConfig, resampler: R) -> Self {
        Self { config, resampler }
    }

    #[must_use]
    pub fn config(&self) -> &WarpConfig {
        &self.config
    }

    /// Warp `variable_names` of `source` (in `source_projection`) onto the
    /// grid of `template_variable` in `template`, writing into `target`.
    ///
    /// The template's dimensions and coordinate variables are brought over
    /// first. Each output keeps the source variable's leading dimensions
    /// followed by the template's (y, x) dimensions, and carries the
    /// template's CRS.
    pub fn warp_like<S, T, M>(
        &self,
        source: &S,
        source_projection: &Projection,
        variable_names: &[&str],
        target: &mut T,
        template: &M,
        template_variable: &str,
    ) -> Result<Vec<VariableInfo>>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
        M: DatasetReader + ?Sized,
    {
        let copier = GraphCopier::new(self.config.fill_policy.clone());
        let template_info = source_variable(template, template_variable)?;
        let template_dims = trailing_dims(&template_info)?;
        let template_crs = get_crs(template, template_variable)?.ok_or_else(|| {
            RuNeGridError::ReprojectionFailed(format!(
                "template variable '{template_variable}' has no CRS"
            ))
        })?;
        let template_grid = SpatialGrid::from_dataset(
            template,
            &template_dims.1,
            &template_dims.0,
            template_crs.clone(),
        )?;
        let template_fill = copier.fill_for(&template_info, &VariableOptions::default())?;
        let mask = template_mask(template, &template_info, template_fill)?;
        if mask.dim() != template_grid.shape() {
            return Err(RuNeGridError::ShapeMismatch {
                var: template_variable.to_string(),
                expected: vec![template_grid.shape().0, template_grid.shape().1],
                found: mask.shape().to_vec(),
            });
        }

        let Some(first) = variable_names.first() else {
            return Ok(Vec::new());
        };
        let first_info = source_variable(source, first)?;
        let source_dims = trailing_dims(&first_info)?;
        let mut infos = Vec::with_capacity(variable_names.len());
        for &name in variable_names {
            let info = source_variable(source, name)?;
            if trailing_dims(&info)? != source_dims {
                return Err(RuNeGridError::DimensionConflict {
                    dim: format!("{}, {}", source_dims.0, source_dims.1),
                    expected: format!("'{name}' to end with ({}, {})", source_dims.0, source_dims.1),
                    found: format!("{:?}", info.dimensions),
                });
            }
            if !info.dtype.is_numeric() {
                return Err(RuNeGridError::unsupported(format!(
                    "warping {} variable '{name}'",
                    info.dtype
                )));
            }
            if target.has_variable(name) {
                return Err(RuNeGridError::already_exists(EntityKind::Variable, name));
            }
            infos.push(info);
        }
        let source_grid = SpatialGrid::from_dataset(
            source,
            &source_dims.1,
            &source_dims.0,
            source_projection.clone(),
        )?;
        info!(
            "Warping {} variable(s) from {} onto {} ({}x{})",
            infos.len(),
            source_projection,
            template_crs,
            template_grid.shape().0,
            template_grid.shape().1
        );

        let mut plan = Plan::new();
        for dim_name in &template_info.dimensions {
            copier.plan_required_dimension(template, &*target, &mut plan, dim_name)?;
        }
        plan.execute(template, target)?;

        let pool = ParallelConfig::with_threads(self.config.threads.max(1)).build_pool()?;
        let mut outputs = Vec::with_capacity(infos.len());
        for info in infos {
            let fill = self.config.fill_policy.resolve(&info)?;
            let leading = &info.dimensions[..info.rank() - 2];

            let mut plan = Plan::new();
            for dim_name in leading {
                copier.plan_required_dimension(source, &*target, &mut plan, dim_name)?;
            }
            plan.execute(source, target)?;

            let mut dimensions: Vec<String> = leading.to_vec();
            dimensions.push(template_dims.0.clone());
            dimensions.push(template_dims.1.clone());
            let options = VariableOptions::default().with_fill_value(fill.clone());
            target.add_variable(&info.name, info.dtype, &dimensions, &options)?;
            for (name, value) in &info.attributes {
                if SPATIAL_ATTRIBUTES.contains(&name.as_str()) {
                    continue;
                }
                let present = source_variable(&*target, &info.name)?.has_attribute(name);
                if !present {
                    target.set_variable_attribute(&info.name, name, value.clone())?;
                }
            }

            let params = ReprojectParams {
                src_affine: source_grid.affine(),
                src_crs: source_projection.clone(),
                dst_affine: template_grid.affine(),
                dst_crs: template_crs.clone(),
                resampling: self.config.resampling,
                src_nodata: fill.as_f64(),
                dst_nodata: fill.as_f64().unwrap_or(f64::NAN),
                threads: self.config.threads,
            };
            self.warp_slices(source, target, &info, &mask, &params, &pool)?;
            set_crs(target, &info.name, &template_crs)?;
            outputs.push(source_variable(&*target, &info.name)?);
        }
        Ok(outputs)
    }

    fn warp_slices<S, T>(
        &self,
        source: &S,
        target: &mut T,
        info: &VariableInfo,
        mask: &Array2<bool>,
        params: &ReprojectParams,
        pool: &ThreadPool,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        let rank = info.rank();
        let leading_shape = &info.shape[..rank - 2];
        let (height, width) = (info.shape[rank - 2], info.shape[rank - 1]);
        let (out_height, out_width) = mask.dim();

        for index in ndarray::indices(IxDyn(leading_shape)) {
            let index = index.slice().to_vec();
            debug!("Warping '{}' slice {index:?}", info.name);
            let mut ranges: Vec<Range<usize>> = index.iter().map(|&i| i..i + 1).collect();
            ranges.push(0..height);
            ranges.push(0..width);

            let data = source
                .read(&info.name, &ranges)?
                .to_f64()
                .ok_or_else(|| RuNeGridError::unsupported("warping non-numeric data"))?
                .into_shape((height, width))?;

            let mut buffer = Array2::from_elem((out_height, out_width), params.dst_nodata);
            let view = buffer.view_mut();
            pool.install(|| self.resampler.reproject(data.view(), view, params))?;
            apply_mask(&mut buffer, mask, params.dst_nodata);

            let mut out_shape = vec![1; index.len()];
            out_shape.extend([out_height, out_width]);
            let slice = ArrayData::from_f64(info.dtype, buffer.into_dyn())?.reshape(&out_shape)?;
            let mut offset = index;
            offset.extend([0, 0]);
            target.write(&info.name, &offset, &slice)?;
        }
        Ok(())
    }
}

/// Names of the last two dimensions, `(y, x)`
fn trailing_dims(info: &VariableInfo) -> Result<(String, String)> {
    match info.dimensions.as_slice() {
        [.., y, x] => Ok((y.clone(), x.clone())),
        _ => Err(RuNeGridError::ShapeMismatch {
            var: info.name.clone(),
            expected: vec![0, 0],
            found: info.shape.clone(),
        }),
    }
}

/// Missing-cell mask of the template's first 2-D slice
fn template_mask<M: DatasetReader + ?Sized>(
    template: &M,
    info: &VariableInfo,
    fill: Option<Scalar>,
) -> Result<Array2<bool>> {
    let rank = info.rank();
    let mut ranges: Vec<Range<usize>> = info.shape[..rank - 2].iter().map(|_| 0..1).collect();
    ranges.push(0..info.shape[rank - 2]);
    ranges.push(0..info.shape[rank - 1]);
    let values = template
        .read(&info.name, &ranges)?
        .to_f64()
        .ok_or_else(|| RuNeGridError::TypeMismatch {
            var: info.name.clone(),
            expected: DataType::Float64,
            found: info.dtype,
        })?
        .into_shape((info.shape[rank - 2], info.shape[rank - 1]))?;
    let fill = fill.and_then(|f| f.as_f64());
    Ok(values.mapv(|v| v.is_nan() || fill.map_or(false, |f| v == f)))
}

/// [`Warper::warp_like`] with default settings and the given resampling
pub fn warp_like<S, T, M>(
    source: &S,
    source_projection: &Projection,
    variable_names: &[&str],
    target: &mut T,
    template: &M,
    template_variable: &str,
    resampling: Resampling,
) -> Result<Vec<VariableInfo>>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
    M: DatasetReader + ?Sized,
{
    let config = WarpConfig {
        resampling,
        ..WarpConfig::default()
    };
    Warper::new(config).warp_like(
        source,
        source_projection,
        variable_names,
        target,
        template,
        template_variable,
    )
}
