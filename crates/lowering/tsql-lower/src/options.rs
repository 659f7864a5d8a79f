//! Engine options

use rustc_hash::FxHashSet;
use serde::Deserialize;

/// Pseudo-variables that are never registered as procedure variables
pub const BUILTIN_IGNORED_VARIABLES: [&str; 4] =
    ["@TRANCOUNT", "@ERRORMSG", "@ERRORSEVERITY", "@ERRORSTATE"];

/// Options of one lowering session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerOptions {
    /// Extra pseudo-variables to skip, matched case-insensitively
    pub ignored_variables: Vec<String>,
    /// Type of a parameter whose data type cannot be read
    pub default_parameter_type: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            ignored_variables: Vec::new(),
            default_parameter_type: "SQL_VARIANT".to_string(),
        }
    }
}

impl LowerOptions {
    /// Uppercased set of every name to skip
    pub(crate) fn ignored_set(&self) -> FxHashSet<String> {
        BUILTIN_IGNORED_VARIABLES
            .iter()
            .map(|name| (*name).to_string())
            .chain(self.ignored_variables.iter().map(|name| name.to_ascii_uppercase()))
            .collect()
    }
}
