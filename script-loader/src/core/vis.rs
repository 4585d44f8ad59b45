//! Visualization spec parsing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed visualization spec.
///
/// Widgets and global functions are kept opaque; the loader only needs the
/// declared variables to resolve arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vis {
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub widgets: Vec<Value>,
    #[serde(default)]
    pub global_funcs: Vec<Value>,
}

/// A script argument declared by the vis spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<String>,
}

impl Variable {
    /// True if `value` is acceptable for this variable.
    pub fn accepts(&self, value: &str) -> bool {
        self.valid_values.is_empty() || self.valid_values.iter().any(|v| v == value)
    }
}

/// Parse a vis spec from its JSON source.
///
/// Blank source yields an empty spec. Duplicate variable names and defaults
/// outside `validValues` are rejected.
pub fn parse_vis(source: &str) -> Result<Vis, String> {
    if source.trim().is_empty() {
        return Ok(Vis::default());
    }

    let vis: Vis =
        serde_json::from_str(source).map_err(|err| format!("error parsing vis spec: {err}"))?;

    let mut seen = HashSet::new();
    for variable in &vis.variables {
        if !seen.insert(variable.name.as_str()) {
            return Err(format!("duplicate variable '{}' in vis spec", variable.name));
        }
        match &variable.default_value {
            Some(default) if !variable.accepts(default) => {
                return Err(format!(
                    "default value '{}' of variable '{}' is not one of its valid values",
                    default, variable.name
                ));
            }
            _ => {}
        }
    }

    Ok(vis)
}
