//! Dependency-aware copy primitives
//!
//! Copying a variable pulls in its whole dependency closure: every dimension
//! it is laid out on and every coordinate variable sharing a dimension's name.
//! Each closure is copied exactly once, tracked by a visited set keyed on
//! `(DatasetId, variable name)`.
//!
//! All operations run in two phases. A [`Plan`] is built first against a
//! virtual view of the target, raising every conflict (`AlreadyExists`,
//! `DimensionConflict`, `DimensionInUse`, `UnknownDtype`, missing deletion
//! support) before anything is touched. Only a fully validated plan is
//! executed.

use crate::dataset::{
    AttrValue, DatasetId, DatasetReader, DatasetWriter, DimensionInfo, Scalar, VariableInfo,
    VariableOptions,
};
use crate::errors::{EntityKind, Result, RuNeGridError};
use crate::fill::FillPolicy;
use crate::subset;
use log::{debug, info};
use std::collections::HashSet;
use std::ops::Range;

/// One mutation of the target dataset
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    RemoveVariable(String),
    RemoveDimension(String),
    CreateDimension {
        name: String,
        length: Option<usize>,
    },
    /// Declare `name` like its source counterpart and copy all of its data
    CopyVariable {
        name: String,
        options: VariableOptions,
    },
    /// Declare `target_name` like source `name` and copy the hyperslab `ranges`
    ExtractVariable {
        name: String,
        target_name: String,
        ranges: Vec<Range<usize>>,
        options: VariableOptions,
        blocksize: usize,
    },
}

/// Validated sequence of mutations plus the virtual target state it produces
#[derive(Debug, Default)]
pub(crate) struct Plan {
    steps: Vec<Step>,
    visited: HashSet<(DatasetId, String)>,
    created_dimensions: Vec<DimensionInfo>,
    removed_dimensions: HashSet<String>,
    created_variables: HashSet<String>,
    removed_variables: HashSet<String>,
}

impl Plan {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Dimension as the target will see it once the plan has run
    pub(crate) fn dimension<T: DatasetReader + ?Sized>(
        &self,
        target: &T,
        name: &str,
    ) -> Option<DimensionInfo> {
        if let Some(dim) = self.created_dimensions.iter().find(|d| d.name == name) {
            return Some(dim.clone());
        }
        if self.removed_dimensions.contains(name) {
            return None;
        }
        target.dimension(name)
    }

    pub(crate) fn has_variable<T: DatasetReader + ?Sized>(&self, target: &T, name: &str) -> bool {
        self.created_variables.contains(name)
            || (!self.removed_variables.contains(name) && target.has_variable(name))
    }

    /// Mark `(dataset, name)` as visited; false if it already was
    pub(crate) fn visit(&mut self, dataset: DatasetId, name: &str) -> bool {
        self.visited.insert((dataset, name.to_string()))
    }

    pub(crate) fn create_dimension(&mut self, name: &str, length: Option<usize>) {
        self.removed_dimensions.remove(name);
        self.created_dimensions.push(DimensionInfo {
            name: name.to_string(),
            length: length.unwrap_or(0),
            is_unlimited: length.is_none(),
        });
        self.steps.push(Step::CreateDimension {
            name: name.to_string(),
            length,
        });
    }

    pub(crate) fn declare_variable(&mut self, name: &str) {
        self.created_variables.insert(name.to_string());
    }

    fn remove_variable(&mut self, name: &str) {
        self.removed_variables.insert(name.to_string());
        self.steps.push(Step::RemoveVariable(name.to_string()));
    }

    fn remove_dimension(&mut self, name: &str) {
        self.removed_dimensions.insert(name.to_string());
        self.created_dimensions.retain(|d| d.name != name);
        self.steps.push(Step::RemoveDimension(name.to_string()));
    }

    pub(crate) fn push(&mut self, step: Step) {
        match &step {
            Step::CopyVariable { name, .. } => self.declare_variable(name),
            Step::ExtractVariable { target_name, .. } => self.declare_variable(target_name),
            _ => {}
        }
        self.steps.push(step);
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Apply every step to `target`, reading data from `source`
    pub(crate) fn execute<S, T>(self, source: &S, target: &mut T) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        for step in self.steps {
            debug!("Executing {step:?}");
            match step {
                Step::RemoveVariable(name) => target.remove_variable(&name)?,
                Step::RemoveDimension(name) => target.remove_dimension(&name)?,
                Step::CreateDimension { name, length } => {
                    target.add_dimension(&name, length)?;
                }
                Step::CopyVariable { name, options } => {
                    let info = source_variable(source, &name)?;
                    target.add_variable(&name, info.dtype, &info.dimensions, &options)?;
                    let data = source.read_all(&name)?;
                    target.write(&name, &vec![0; data.ndim()], &data)?;
                    copy_missing_attributes(&info, target, &name)?;
                }
                Step::ExtractVariable {
                    name,
                    target_name,
                    ranges,
                    options,
                    blocksize,
                } => {
                    let info = source_variable(source, &name)?;
                    target.add_variable(&target_name, info.dtype, &info.dimensions, &options)?;
                    subset::transfer(source, target, &name, &target_name, &ranges, blocksize)?;
                    copy_missing_attributes(&info, target, &target_name)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn source_variable<S: DatasetReader + ?Sized>(source: &S, name: &str) -> Result<VariableInfo> {
    source
        .variable(name)
        .ok_or_else(|| RuNeGridError::missing_variable(name))
}

/// Copy every attribute of `source` that `target_name` does not carry yet
pub(crate) fn copy_missing_attributes<T: DatasetWriter + ?Sized>(
    source: &VariableInfo,
    target: &mut T,
    target_name: &str,
) -> Result<()> {
    let existing = source_variable(target, target_name)?;
    for (name, value) in &source.attributes {
        if !existing.has_attribute(name) {
            target.set_variable_attribute(target_name, name, value.clone())?;
        }
    }
    Ok(())
}

/// Copies dimensions and variables between datasets under a fill-value policy
#[derive(Debug, Clone, Default)]
pub struct GraphCopier {
    policy: FillPolicy,
}

impl GraphCopier {
    /// Create a copier resolving fill values with `policy`
    pub fn new(policy: FillPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &FillPolicy {
        &self.policy
    }

    /// Fill value for a new variable like `info`: explicit option first, then
    /// the policy. String variables carry none.
    pub(crate) fn fill_for(
        &self,
        info: &VariableInfo,
        options: &VariableOptions,
    ) -> Result<Option<Scalar>> {
        if let Some(fill) = &options.fill_value {
            return Ok(Some(fill.clone()));
        }
        if !info.dtype.is_numeric() {
            return Ok(None);
        }
        self.policy.resolve(info).map(Some)
    }

    /// Copy dimension `name` from `source` into `target`.
    ///
    /// An existing target dimension is replaced only when `overwrite` is set,
    /// the target supports deletion and no target variable still uses it.
    /// With `allow_unlimited` an unlimited source dimension stays unlimited;
    /// otherwise it becomes fixed at its current length.
    pub fn copy_dimension<S, T>(
        &self,
        source: &S,
        target: &mut T,
        name: &str,
        overwrite: bool,
        allow_unlimited: bool,
    ) -> Result<DimensionInfo>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        let mut plan = Plan::new();
        self.plan_dimension(source, &*target, &mut plan, name, overwrite, allow_unlimited)?;
        plan.execute(source, target)?;
        target
            .dimension(name)
            .ok_or_else(|| RuNeGridError::missing_dimension(name))
    }

    /// Copy variable `name` with its data, attributes and dependency closure
    pub fn copy_variable<S, T>(
        &self,
        source: &S,
        target: &mut T,
        name: &str,
        overwrite: bool,
        options: &VariableOptions,
    ) -> Result<VariableInfo>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        info!("Copying variable '{name}'");
        let mut plan = Plan::new();
        self.plan_variable(source, &*target, &mut plan, name, overwrite, options)?;
        plan.execute(source, target)?;
        source_variable(target, name)
    }

    /// Copy each dimension of variable `name`, as its coordinate variable when
    /// the source has one, otherwise as a bare dimension
    pub fn copy_variable_dimensions<S, T>(
        &self,
        source: &S,
        target: &mut T,
        name: &str,
        overwrite: bool,
        options: &VariableOptions,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        let mut plan = Plan::new();
        self.plan_variable_dimensions(source, &*target, &mut plan, name, overwrite, options)?;
        plan.execute(source, target)
    }

    /// Declare an empty variable `target_name` shaped like `like_name` in
    /// `like`, copying the template's dimension closure first. Neither data
    /// nor attributes are copied.
    pub fn create_variable_like<S, T>(
        &self,
        target: &mut T,
        target_name: &str,
        like: &S,
        like_name: &str,
        overwrite: bool,
        options: &VariableOptions,
    ) -> Result<VariableInfo>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        let template = source_variable(like, like_name)?;
        let mut plan = Plan::new();
        if target.has_variable(target_name) {
            if !overwrite {
                return Err(RuNeGridError::already_exists(EntityKind::Variable, target_name));
            }
            require_deletion(&*target)?;
            plan.remove_variable(target_name);
        }
        self.plan_variable_dimensions(like, &*target, &mut plan, like_name, overwrite, options)?;
        if plan.has_variable(&*target, target_name) {
            return Err(RuNeGridError::already_exists(EntityKind::Variable, target_name));
        }
        let options = VariableOptions {
            fill_value: self.fill_for(&template, options)?,
            ..options.clone()
        };
        plan.execute(like, target)?;
        target.add_variable(target_name, template.dtype, &template.dimensions, &options)
    }

    pub(crate) fn plan_dimension<S, T>(
        &self,
        source: &S,
        target: &T,
        plan: &mut Plan,
        name: &str,
        overwrite: bool,
        allow_unlimited: bool,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetReader + ?Sized,
    {
        let source_dim = source
            .dimension(name)
            .ok_or_else(|| RuNeGridError::missing_dimension(name))?;
        if plan.dimension(target, name).is_some() {
            if !overwrite {
                return Err(RuNeGridError::already_exists(EntityKind::Dimension, name));
            }
            require_deletion(target)?;
            if let Some(var) = target.variable_names().into_iter().find(|v| {
                plan.has_variable(target, v)
                    && target
                        .variable(v)
                        .map_or(false, |info| info.dimensions.iter().any(|d| d == name))
            }) {
                return Err(RuNeGridError::DimensionInUse {
                    dim: name.to_string(),
                    var,
                });
            }
            plan.remove_dimension(name);
        }
        let length = if allow_unlimited && source_dim.is_unlimited {
            None
        } else {
            Some(source_dim.length)
        };
        plan.create_dimension(name, length);
        Ok(())
    }

    pub(crate) fn plan_variable<S, T>(
        &self,
        source: &S,
        target: &T,
        plan: &mut Plan,
        name: &str,
        overwrite: bool,
        options: &VariableOptions,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetReader + ?Sized,
    {
        let info = source_variable(source, name)?;
        plan.visit(source.id(), name);

        if plan.has_variable(target, name) {
            if !overwrite {
                return Err(RuNeGridError::already_exists(EntityKind::Variable, name));
            }
            require_deletion(target)?;
            plan.remove_variable(name);
        }

        for dim_name in &info.dimensions {
            let source_dim = source
                .dimension(dim_name)
                .ok_or_else(|| RuNeGridError::missing_dimension(dim_name))?;
            match plan.dimension(target, dim_name) {
                Some(existing) if !existing.accepts(&source_dim) => {
                    return Err(RuNeGridError::DimensionConflict {
                        dim: dim_name.clone(),
                        expected: source_dim.describe(),
                        found: existing.describe(),
                    });
                }
                Some(_) => {}
                None => plan.create_dimension(dim_name, Some(source_dim.length)),
            }
            if source.has_variable(dim_name)
                && !plan.has_variable(target, dim_name)
                && plan.visit(source.id(), dim_name)
            {
                self.plan_variable(
                    source,
                    target,
                    plan,
                    dim_name,
                    false,
                    &VariableOptions::default(),
                )?;
            }
        }

        let options = VariableOptions {
            fill_value: self.fill_for(&info, options)?,
            ..options.clone()
        };
        plan.push(Step::CopyVariable {
            name: name.to_string(),
            options,
        });
        Ok(())
    }

    pub(crate) fn plan_variable_dimensions<S, T>(
        &self,
        source: &S,
        target: &T,
        plan: &mut Plan,
        name: &str,
        overwrite: bool,
        options: &VariableOptions,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetReader + ?Sized,
    {
        let info = source_variable(source, name)?;
        for dim_name in &info.dimensions {
            if source.has_variable(dim_name) {
                let coordinate_options = VariableOptions {
                    fill_value: None,
                    ..options.clone()
                };
                self.plan_variable(source, target, plan, dim_name, overwrite, &coordinate_options)?;
            } else {
                self.plan_dimension(source, target, plan, dim_name, overwrite, false)?;
            }
        }
        Ok(())
    }

    /// Make sure `dim_name` exists in the target: reuse a compatible one,
    /// otherwise bring it over together with its coordinate variable.
    pub(crate) fn plan_required_dimension<S, T>(
        &self,
        source: &S,
        target: &T,
        plan: &mut Plan,
        dim_name: &str,
    ) -> Result<()>
    where
        S: DatasetReader + ?Sized,
        T: DatasetReader + ?Sized,
    {
        let source_dim = source
            .dimension(dim_name)
            .ok_or_else(|| RuNeGridError::missing_dimension(dim_name))?;
        if let Some(existing) = plan.dimension(target, dim_name) {
            if !existing.accepts(&source_dim) {
                return Err(RuNeGridError::DimensionConflict {
                    dim: dim_name.to_string(),
                    expected: source_dim.describe(),
                    found: existing.describe(),
                });
            }
            return Ok(());
        }
        if source.has_variable(dim_name) && !plan.has_variable(target, dim_name) {
            self.plan_variable(source, target, plan, dim_name, false, &VariableOptions::default())
        } else {
            plan.create_dimension(dim_name, Some(source_dim.length));
            Ok(())
        }
    }
}

fn require_deletion<T: DatasetReader + ?Sized>(target: &T) -> Result<()> {
    if target.capabilities().deletion {
        Ok(())
    } else {
        Err(RuNeGridError::unsupported(
            "overwriting entities in a dataset that cannot delete them",
        ))
    }
}

fn attributes_of<D: DatasetReader + ?Sized>(
    dataset: &D,
    variable: Option<&str>,
) -> Result<Vec<(String, AttrValue)>> {
    match variable {
        Some(name) => Ok(source_variable(dataset, name)?.attributes),
        None => Ok(dataset.global_attributes()),
    }
}

/// Copy the named attributes between two variables (or the global attribute
/// sets when a variable is `None`). Fails before writing anything if an
/// attribute is missing in the source, or present in the target while
/// `overwrite` is false.
pub fn copy_attributes<S, T>(
    source: &S,
    source_variable: Option<&str>,
    target: &mut T,
    target_variable: Option<&str>,
    names: &[&str],
    overwrite: bool,
) -> Result<()>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    let available = attributes_of(source, source_variable)?;
    let existing = attributes_of(&*target, target_variable)?;

    let mut selected = Vec::with_capacity(names.len());
    for &name in names {
        let value = available
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| RuNeGridError::MissingAttribute {
                name: name.to_string(),
            })?;
        if !overwrite && existing.iter().any(|(key, _)| key == name) {
            return Err(RuNeGridError::already_exists(EntityKind::Attribute, name));
        }
        selected.push((name, value));
    }

    for (name, value) in selected {
        match target_variable {
            Some(var) => target.set_variable_attribute(var, name, value)?,
            None => target.set_global_attribute(name, value)?,
        }
    }
    Ok(())
}

/// [`GraphCopier::copy_dimension`] with the default fill policy
pub fn copy_dimension<S, T>(
    source: &S,
    target: &mut T,
    name: &str,
    overwrite: bool,
    allow_unlimited: bool,
) -> Result<DimensionInfo>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().copy_dimension(source, target, name, overwrite, allow_unlimited)
}

/// [`GraphCopier::copy_variable`] with the default fill policy
pub fn copy_variable<S, T>(
    source: &S,
    target: &mut T,
    name: &str,
    overwrite: bool,
    options: &VariableOptions,
) -> Result<VariableInfo>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().copy_variable(source, target, name, overwrite, options)
}

/// [`GraphCopier::copy_variable_dimensions`] with the default fill policy
pub fn copy_variable_dimensions<S, T>(
    source: &S,
    target: &mut T,
    name: &str,
    overwrite: bool,
    options: &VariableOptions,
) -> Result<()>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().copy_variable_dimensions(source, target, name, overwrite, options)
}

/// [`GraphCopier::create_variable_like`] with the default fill policy
pub fn create_variable_like<S, T>(
    target: &mut T,
    target_name: &str,
    like: &S,
    like_name: &str,
    overwrite: bool,
    options: &VariableOptions,
) -> Result<VariableInfo>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().create_variable_like(target, target_name, like, like_name, overwrite, options)
}
