//! Concatenation of same-shaped variables along a new leading dimension

use crate::copy::{copy_missing_attributes, source_variable, GraphCopier, Plan};
use crate::dataset::{ArrayData, DataType, DatasetReader, DatasetWriter, VariableInfo, VariableOptions};
use crate::errors::{EntityKind, Result, RuNeGridError};
use log::{debug, info};

/// Ordered sources of a concatenation, optionally labeled
#[derive(Debug)]
pub enum ConcatSources<'a, S: ?Sized> {
    /// Labels become a string coordinate variable along the new dimension
    Labeled(Vec<(String, &'a S)>),
    Unlabeled(Vec<&'a S>),
}

impl<'a, S: ?Sized> ConcatSources<'a, S> {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Labeled(sources) => sources.len(),
            Self::Unlabeled(sources) => sources.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Datasets in caller order
    pub fn datasets(&self) -> Vec<&'a S> {
        match self {
            Self::Labeled(sources) => sources.iter().map(|(_, ds)| *ds).collect(),
            Self::Unlabeled(sources) => sources.clone(),
        }
    }

    #[must_use]
    pub fn labels(&self) -> Option<Vec<&str>> {
        match self {
            Self::Labeled(sources) => Some(sources.iter().map(|(label, _)| label.as_str()).collect()),
            Self::Unlabeled(_) => None,
        }
    }
}

impl GraphCopier {
    /// Stack `variable_name` from every source into one target variable with
    /// the new leading dimension `dimension_name`.
    ///
    /// The first source is the template for dimensions, coordinate variables,
    /// data type and attributes. Every other source must match its shape and
    /// data type. Order is kept exactly as given.
    pub fn concat_variable_along_dimension<S, T>(
        &self,
        sources: &ConcatSources<'_, S>,
        target: &mut T,
        variable_name: &str,
        dimension_name: &str,
        options: &VariableOptions,
    ) -> Result<VariableInfo>
    where
        S: DatasetReader + ?Sized,
        T: DatasetWriter + ?Sized,
    {
        if sources.len() < 2 {
            return Err(RuNeGridError::NotEnoughSources {
                found: sources.len(),
            });
        }
        let datasets = sources.datasets();
        let template_ds = datasets[0];
        let template = source_variable(template_ds, variable_name)?;
        info!(
            "Concatenating '{variable_name}' from {} sources along '{dimension_name}'",
            datasets.len()
        );

        for (index, ds) in datasets.iter().enumerate().skip(1) {
            let info = source_variable(*ds, variable_name)?;
            if info.dtype != template.dtype {
                return Err(RuNeGridError::TypeMismatch {
                    var: format!("{variable_name} (source {index})"),
                    expected: template.dtype,
                    found: info.dtype,
                });
            }
            if info.shape != template.shape {
                return Err(RuNeGridError::ShapeMismatch {
                    var: format!("{variable_name} (source {index})"),
                    expected: template.shape.clone(),
                    found: info.shape,
                });
            }
        }

        let mut plan = Plan::new();
        for dim_name in &template.dimensions {
            self.plan_required_dimension(template_ds, &*target, &mut plan, dim_name)?;
        }
        if plan.dimension(&*target, dimension_name).is_some() {
            return Err(RuNeGridError::already_exists(EntityKind::Dimension, dimension_name));
        }
        let labels = sources.labels();
        if labels.is_some() {
            if !target.capabilities().string_variables {
                return Err(RuNeGridError::unsupported("string label variables"));
            }
            if plan.has_variable(&*target, dimension_name) {
                return Err(RuNeGridError::already_exists(EntityKind::Variable, dimension_name));
            }
        }
        if plan.has_variable(&*target, variable_name) {
            return Err(RuNeGridError::already_exists(EntityKind::Variable, variable_name));
        }
        let options = VariableOptions {
            fill_value: self.fill_for(&template, options)?,
            ..options.clone()
        };

        plan.execute(template_ds, target)?;
        target.add_dimension(dimension_name, Some(datasets.len()))?;

        if let Some(labels) = labels {
            debug!("Writing labels {labels:?}");
            target.add_variable(
                dimension_name,
                DataType::String,
                &[dimension_name.to_string()],
                &VariableOptions::default(),
            )?;
            target.write(dimension_name, &[0], &ArrayData::from_strings(&labels)?)?;
        }

        let mut dimensions = Vec::with_capacity(template.rank() + 1);
        dimensions.push(dimension_name.to_string());
        dimensions.extend(template.dimensions.iter().cloned());
        target.add_variable(variable_name, template.dtype, &dimensions, &options)?;
        copy_missing_attributes(&template, target, variable_name)?;

        for (index, ds) in datasets.iter().enumerate() {
            debug!("Writing source {index} of '{variable_name}'");
            let data = ds.read_all(variable_name)?.insert_leading_axis();
            let mut offset = vec![0; dimensions.len()];
            offset[0] = index;
            target.write(variable_name, &offset, &data)?;
        }
        source_variable(target, variable_name)
    }
}

/// [`GraphCopier::concat_variable_along_dimension`] with the default fill policy
pub fn concat_variable_along_dimension<S, T>(
    sources: &ConcatSources<'_, S>,
    target: &mut T,
    variable_name: &str,
    dimension_name: &str,
    options: &VariableOptions,
) -> Result<VariableInfo>
where
    S: DatasetReader + ?Sized,
    T: DatasetWriter + ?Sized,
{
    GraphCopier::default().concat_variable_along_dimension(
        sources,
        target,
        variable_name,
        dimension_name,
        options,
    )
}
