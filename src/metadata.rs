//! Dataset inspection and variable description
//!
//! Builds structured summaries of any [`DatasetReader`] and prints them in a
//! compact listing or as JSON.

use crate::dataset::{AttrValue, DatasetReader, DimensionInfo, VariableInfo};
use crate::errors::{Result, RuNeGridError};
use serde_json::{json, Map, Value as JsonValue};

/// Structured metadata for a variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<DimensionInfo>,
    pub attributes: Vec<(String, AttrValue)>,
    pub total_elements: usize,
    pub estimated_size_bytes: usize,
}

impl VariableSummary {
    fn from_info<D: DatasetReader + ?Sized>(dataset: &D, info: VariableInfo) -> Self {
        let dimensions = info
            .dimensions
            .iter()
            .zip(&info.shape)
            .map(|(name, &length)| {
                dataset.dimension(name).unwrap_or(DimensionInfo {
                    name: name.clone(),
                    length,
                    is_unlimited: false,
                })
            })
            .collect();
        let total_elements = info.size();
        Self {
            name: info.name,
            data_type: info.dtype.to_string(),
            dimensions,
            attributes: info.attributes,
            total_elements,
            estimated_size_bytes: total_elements * info.dtype.element_size(),
        }
    }

    /// Shape, e.g. `(12 × 180 × 360)`, or `scalar`
    #[must_use]
    pub fn shape_label(&self) -> String {
        if self.dimensions.is_empty() {
            return "scalar".to_string();
        }
        let shape: Vec<String> = self.dimensions.iter().map(|d| d.length.to_string()).collect();
        format!("({})", shape.join(" × "))
    }

    fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_str())
    }

    pub fn to_json(&self) -> JsonValue {
        let attributes: Map<String, JsonValue> = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        json!({
            "name": self.name,
            "data_type": self.data_type,
            "dimensions": self.dimensions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "shape": self.dimensions.iter().map(|d| d.length).collect::<Vec<_>>(),
            "attributes": attributes,
            "total_elements": self.total_elements,
            "estimated_size_bytes": self.estimated_size_bytes,
        })
    }
}

/// Everything [`summarize_dataset`] learns about a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub dimensions: Vec<DimensionInfo>,
    pub variables: Vec<VariableSummary>,
    pub global_attributes: Vec<(String, AttrValue)>,
}

/// Collect dimensions, variables and global attributes of `dataset`
pub fn summarize_dataset<D: DatasetReader + ?Sized>(dataset: &D) -> DatasetSummary {
    let dimensions = dataset
        .dimension_names()
        .iter()
        .filter_map(|name| dataset.dimension(name))
        .collect();
    let variables = dataset
        .variable_names()
        .iter()
        .filter_map(|name| dataset.variable(name))
        .map(|info| VariableSummary::from_info(dataset, info))
        .collect();
    DatasetSummary {
        dimensions,
        variables,
        global_attributes: dataset.global_attributes(),
    }
}

impl DatasetSummary {
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableSummary> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Sum of the estimated in-memory sizes of all variables
    #[must_use]
    pub fn estimated_size_bytes(&self) -> usize {
        self.variables.iter().map(|v| v.estimated_size_bytes).sum()
    }

    pub fn to_json(&self) -> JsonValue {
        let dimensions: Vec<JsonValue> = self
            .dimensions
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "length": d.length,
                    "unlimited": d.is_unlimited,
                })
            })
            .collect();
        let global: Map<String, JsonValue> = self
            .global_attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        json!({
            "dimensions": dimensions,
            "variables": self.variables.iter().map(VariableSummary::to_json).collect::<Vec<_>>(),
            "global_attributes": global,
            "estimated_size_bytes": self.estimated_size_bytes(),
        })
    }

    /// Lists dimensions and variables in a clean, sorted format
    pub fn print(&self) {
        println!("\n Dimensions");
        println!("==============");
        let mut dimensions: Vec<&DimensionInfo> = self.dimensions.iter().collect();
        dimensions.sort_by(|a, b| a.name.cmp(&b.name));
        if dimensions.is_empty() {
            println!("   (No dimensions found)");
        }
        for dim in dimensions {
            let length_info = if dim.is_unlimited {
                format!("{} (unlimited)", dim.length)
            } else {
                dim.length.to_string()
            };
            println!("    {} = {}", dim.name, length_info);
        }

        println!("\n Variables");
        println!("=============");
        let mut variables: Vec<&VariableSummary> = self.variables.iter().collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));
        if variables.is_empty() {
            println!("   (No variables found)");
        }
        for var in variables {
            if var.dimensions.is_empty() {
                println!("    {} ({}): scalar", var.name, var.data_type);
            } else {
                let dims: Vec<&str> = var.dimensions.iter().map(|d| d.name.as_str()).collect();
                println!(
                    "    {} ({}): [{}] = {}",
                    var.name,
                    var.data_type,
                    dims.join(", "),
                    var.shape_label()
                );
            }

            let mut key_attrs = Vec::new();
            for key in ["units", "long_name"] {
                if let Some(value) = var.attribute_str(key) {
                    key_attrs.push(format!("{key}: {value}"));
                }
            }
            if let Some((_, fill)) = var.attributes.iter().find(|(key, _)| key == "_FillValue") {
                if let Some(fill) = fill.first().and_then(|s| s.as_f64()) {
                    key_attrs.push(format!("_FillValue: {fill}"));
                }
            }
            if !key_attrs.is_empty() {
                println!("      └─ {}", key_attrs.join(", "));
            }
        }

        println!("\n Estimated size: {}", format_size(self.estimated_size_bytes()));
    }
}

/// Describes one variable: data type, shape, dimensions and attributes
pub fn describe_variable<D: DatasetReader + ?Sized>(dataset: &D, var_name: &str) -> Result<()> {
    let info = dataset
        .variable(var_name)
        .ok_or_else(|| RuNeGridError::missing_variable(var_name))?;
    let summary = VariableSummary::from_info(dataset, info);

    println!("\n Variable Description: {var_name}");
    println!("={}", "=".repeat(var_name.len() + 25));
    println!(" Data type: {}", summary.data_type);
    println!(" Shape: {}", summary.shape_label());

    if !summary.dimensions.is_empty() {
        println!("\n Dimension Details:");
        for dim in &summary.dimensions {
            println!("    {} = {}", dim.name, dim.describe());
        }
    }

    if summary.attributes.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (name, value) in &summary.attributes {
            println!("   • {name}: {}", value.to_json());
        }
    }

    println!("\n Storage Information:");
    println!("    Total elements: {}", summary.total_elements);
    println!("    Total size: {}", format_size(summary.estimated_size_bytes));
    Ok(())
}

/// Human readable byte count
#[must_use]
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} bytes")
    } else if value < KB * KB {
        format!("{:.2} KB", value / KB)
    } else if value < KB * KB * KB {
        format!("{:.2} MB", value / (KB * KB))
    } else {
        format!("{:.2} GB", value / (KB * KB * KB))
    }
}
