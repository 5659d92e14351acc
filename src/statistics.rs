//! Parallel summary statistics across datasets
//!
//! Each dataset's valid values (finite and not equal to the variable's fill
//! value) are reduced in parallel. Per-dataset results are then combined as the
//! minimum of minimums, the mean of means and the maximum of maximums.

use crate::dataset::DatasetReader;
use crate::errors::{Result, RuNeGridError};
use crate::fill::FillPolicy;
use log::{debug, info};
use ndarray::parallel::prelude::*;
use std::collections::BTreeMap;

/// Summary of one variable over a set of datasets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableStatistics {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Datasets that held at least one valid value
    pub datasets: usize,
}

impl VariableStatistics {
    fn empty() -> Self {
        Self {
            min: f64::NAN,
            mean: f64::NAN,
            max: f64::NAN,
            datasets: 0,
        }
    }

    pub fn print(&self, name: &str) {
        println!("\n Statistics for Variable: {name}");
        println!("================================");
        println!("   Min: {}", self.min);
        println!("   Max: {}", self.max);
        println!("   Mean: {:.4}", self.mean);
        println!("   Datasets: {}", self.datasets);
    }
}

/// Running reduction of one array
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Accumulator {
    const IDENTITY: Self = Self {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        count: 0,
    };

    fn push(mut self, value: f64) -> Self {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }
}

/// Min, mean and max of every variable in `variables` over all `datasets`.
///
/// Fill values are resolved with the default [`FillPolicy`]. A variable with
/// no valid values anywhere reports NaN for all three statistics.
pub fn collect_statistics<D: DatasetReader + ?Sized>(
    datasets: &[&D],
    variables: &[&str],
) -> Result<BTreeMap<String, VariableStatistics>> {
    collect_statistics_with(&FillPolicy::default(), datasets, variables)
}

/// [`collect_statistics`] with an explicit fill policy
pub fn collect_statistics_with<D: DatasetReader + ?Sized>(
    policy: &FillPolicy,
    datasets: &[&D],
    variables: &[&str],
) -> Result<BTreeMap<String, VariableStatistics>> {
    info!(
        "Collecting statistics for {} variable(s) over {} dataset(s) on {} threads",
        variables.len(),
        datasets.len(),
        rayon::current_num_threads()
    );
    let mut results = BTreeMap::new();
    for &name in variables {
        let mut stats = VariableStatistics::empty();
        let mut mean_sum = 0.0;
        for dataset in datasets {
            let info = dataset
                .variable(name)
                .ok_or_else(|| RuNeGridError::missing_variable(name))?;
            let fill = policy.resolve(&info)?.as_f64();
            let data = dataset.read_all(name)?.to_f64().ok_or_else(|| {
                RuNeGridError::unsupported(format!("statistics of {} variable '{name}'", info.dtype))
            })?;

            let acc = data
                .par_iter()
                .copied()
                .filter(|v| v.is_finite() && fill.map_or(true, |f| *v != f))
                .fold(|| Accumulator::IDENTITY, Accumulator::push)
                .reduce(|| Accumulator::IDENTITY, Accumulator::merge);
            debug!("'{name}' in {:?}: {} valid value(s)", dataset.id(), acc.count);
            if acc.count == 0 {
                continue;
            }

            stats.min = if stats.datasets == 0 { acc.min } else { stats.min.min(acc.min) };
            stats.max = if stats.datasets == 0 { acc.max } else { stats.max.max(acc.max) };
            mean_sum += acc.sum / acc.count as f64;
            stats.datasets += 1;
        }
        if stats.datasets > 0 {
            stats.mean = mean_sum / stats.datasets as f64;
        }
        results.insert(name.to_string(), stats);
    }
    Ok(results)
}
