//! Argument resolution against a vis spec.

use crate::core::types::Args;
use crate::core::vis::Vis;

/// Resolve the arguments a script runs with.
///
/// Every variable declared by `vis` takes the supplied value, else its
/// default. A variable with neither, or a value outside `validValues`, is an
/// error. Arguments the vis does not declare are dropped.
pub fn args_for_vis(vis: &Vis, args: &Args, script_id: &str) -> Result<Args, String> {
    let mut resolved = Args::new();
    let mut errors = Vec::new();

    for variable in &vis.variables {
        let value = args
            .get(&variable.name)
            .or(variable.default_value.as_ref());
        match value {
            None => errors.push(format!(
                "missing value for required argument '{}'",
                variable.name
            )),
            Some(value) if !variable.accepts(value) => errors.push(format!(
                "value '{}' for argument '{}' must be one of [{}]",
                value,
                variable.name,
                variable.valid_values.join(", ")
            )),
            Some(value) => {
                resolved.insert(variable.name.clone(), value.clone());
            }
        }
    }

    if !errors.is_empty() {
        return Err(format!("{}: {}", script_id, errors.join("; ")));
    }
    Ok(resolved)
}
