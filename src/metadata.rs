//! NetCDF metadata inspection
//!
//! Lists the dimensions and variables of an input file so the variable and
//! dimension names for a pipeline can be picked without other tools.

use crate::errors::{ClimGridError, Result};
use crate::netcdf_io::DimNames;
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};

/// Information about a dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Structured metadata for a NetCDF variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMetadata {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub units: Option<String>,
    pub long_name: Option<String>,
    /// Every attribute, rendered as text
    pub attributes: Vec<(String, String)>,
}

impl VariableMetadata {
    #[must_use]
    pub fn total_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the variable is laid out on the `(time, lat, lon)` dimensions
    #[must_use]
    pub fn is_gridded(&self, dims: &DimNames) -> bool {
        self.dimensions.len() == 3
            && [&dims.time, &dims.lat, &dims.lon]
                .iter()
                .all(|d| self.dimensions.contains(d))
    }
}

/// Dimensions, variables and global attributes of one file
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub dimensions: Vec<DimensionInfo>,
    pub variables: Vec<VariableMetadata>,
    pub global_attributes: Vec<(String, String)>,
}

impl DatasetSummary {
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableMetadata> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Variables a pipeline could load with `dims`
    pub fn gridded_variables<'a>(&'a self, dims: &'a DimNames) -> impl Iterator<Item = &'a VariableMetadata> {
        self.variables.iter().filter(move |v| v.is_gridded(dims))
    }

    /// Print the summary in a clean, organized format.
    pub fn print(&self) {
        println!("\n Dataset: {}", self.path.display());

        println!("\n Dimensions");
        println!("==============");
        if self.dimensions.is_empty() {
            println!("   (No dimensions found)");
        }
        for dim in &self.dimensions {
            let unlimited = if dim.is_unlimited { " (unlimited)" } else { "" };
            println!("    {} = {}{unlimited}", dim.name, dim.length);
        }

        println!("\n Variables");
        println!("=============");
        if self.variables.is_empty() {
            println!("   (No variables found)");
        }
        for var in &self.variables {
            if var.dimensions.is_empty() {
                println!("    {} ({}): scalar", var.name, var.data_type);
            } else {
                let shape: Vec<String> = var.shape.iter().map(ToString::to_string).collect();
                println!(
                    "    {} ({}): [{}] = ({})",
                    var.name,
                    var.data_type,
                    var.dimensions.join(", "),
                    shape.join(" x ")
                );
            }
            let key_attrs: Vec<String> = [("units", &var.units), ("long_name", &var.long_name)]
                .iter()
                .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}: {v}")))
                .collect();
            if !key_attrs.is_empty() {
                println!("      - {}", key_attrs.join(", "));
            }
        }

        if !self.global_attributes.is_empty() {
            println!("\n Global Attributes");
            println!("=====================");
            for (name, value) in &self.global_attributes {
                println!("    {name}: {value}");
            }
        }
    }
}

/// Read the structure of a NetCDF file, variables sorted by name.
///
/// # Errors
///
/// Returns the NetCDF error if the file cannot be opened.
pub fn describe_dataset(path: &Path) -> Result<DatasetSummary> {
    let file = netcdf::open(path)?;

    let mut dimensions: Vec<DimensionInfo> = file
        .dimensions()
        .map(|d| DimensionInfo {
            name: d.name().to_string(),
            length: d.len(),
            is_unlimited: d.is_unlimited(),
        })
        .collect();
    dimensions.sort_by(|a, b| a.name.cmp(&b.name));

    let mut variables: Vec<VariableMetadata> = file.variables().map(|v| variable_metadata(&v)).collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    let global_attributes = file
        .attributes()
        .filter_map(|a| a.value().ok().map(|v| (a.name().to_string(), attribute_text(&v))))
        .collect();

    Ok(DatasetSummary {
        path: path.to_path_buf(),
        dimensions,
        variables,
        global_attributes,
    })
}

/// Metadata for one variable.
///
/// # Errors
///
/// Returns [`ClimGridError::Load`] if the variable does not exist.
pub fn describe_variable(path: &Path, var_name: &str) -> Result<VariableMetadata> {
    let file = netcdf::open(path)?;
    let var = file.variable(var_name).ok_or_else(|| {
        ClimGridError::load(format!("variable '{var_name}' not found in '{}'", path.display()))
    })?;
    Ok(variable_metadata(&var))
}

fn variable_metadata(var: &netcdf::Variable) -> VariableMetadata {
    let attributes: Vec<(String, String)> = var
        .attributes()
        .filter_map(|a| a.value().ok().map(|v| (a.name().to_string(), attribute_text(&v))))
        .collect();
    let lookup = |key: &str| {
        attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    };

    VariableMetadata {
        name: var.name(),
        data_type: format!("{:?}", var.vartype()).to_lowercase(),
        dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
        shape: var.dimensions().iter().map(netcdf::Dimension::len).collect(),
        units: lookup("units"),
        long_name: lookup("long_name"),
        attributes,
    }
}

fn attribute_text(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Str(s) => s.clone(),
        AttributeValue::Strs(ss) => ss.join(", "),
        AttributeValue::Float(f) => f.to_string(),
        AttributeValue::Double(d) => d.to_string(),
        AttributeValue::Int(i) => i.to_string(),
        AttributeValue::Short(s) => s.to_string(),
        AttributeValue::Floats(fs) => format!("{fs:?}"),
        AttributeValue::Doubles(ds) => format!("{ds:?}"),
        AttributeValue::Ints(is) => format!("{is:?}"),
        other => format!("{other:?}"),
    }
}
