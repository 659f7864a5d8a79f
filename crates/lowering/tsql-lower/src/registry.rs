//! Per-procedure variable registry
//!
//! Types only move forward: an UNKNOWN entry may learn its type, a concrete
//! one is kept. [`VariableRegistry::update_type`] additionally lets a schema
//! lookup replace the generic `INT` guess.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tsql_ast::{SqlType, Variable};

/// Outcome of [`VariableRegistry::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New variable
    Inserted,
    /// UNKNOWN became concrete
    Upgraded,
    /// Already known; nothing changed
    Unchanged,
    /// Not a variable the procedure owns
    Ignored,
}

/// Variables of one procedure in first-seen order
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: IndexMap<String, Variable>,
    ignored: FxHashSet<String>,
}

impl VariableRegistry {
    /// Registry skipping the given uppercased pseudo-variable names
    #[must_use]
    pub fn new(ignored: FxHashSet<String>) -> Self {
        Self {
            variables: IndexMap::new(),
            ignored,
        }
    }

    /// Whether `name` is never registered
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        let upper = name.to_ascii_uppercase();
        !upper.starts_with('@')
            || upper.starts_with("@@")
            || upper.contains("ISNULL")
            || self.ignored.contains(&upper)
    }

    /// Make sure `name` exists, learning `inferred` if its type is still UNKNOWN
    pub fn ensure(&mut self, name: &str, inferred: Option<SqlType>) -> Registration {
        if self.is_excluded(name) {
            return Registration::Ignored;
        }
        let inferred = inferred.filter(|ty| !ty.is_unknown());

        if let Some(existing) = self.variables.get_mut(name) {
            return match inferred {
                Some(ty) if existing.ty.is_unknown() => {
                    existing.ty = ty;
                    Registration::Upgraded
                }
                _ => Registration::Unchanged,
            };
        }

        self.variables.insert(
            name.to_string(),
            Variable::new(name, inferred.unwrap_or_default()),
        );
        Registration::Inserted
    }

    /// Replace the type of `name` (any case) when it is UNKNOWN or the `INT` guess
    pub fn update_type(&mut self, name: &str, ty: SqlType) -> bool {
        if ty.is_unknown() {
            return false;
        }
        let Some(variable) = self
            .variables
            .values_mut()
            .find(|variable| variable.name.eq_ignore_ascii_case(name))
        else {
            return false;
        };
        if variable.ty.is_unknown() || variable.ty.is_generic_guess() {
            variable.ty = ty;
            true
        } else {
            false
        }
    }

    /// Attach a normalized default to an existing variable
    pub fn set_default(&mut self, name: &str, default: String) {
        if let Some(variable) = self.variables.get_mut(name) {
            variable.default = Some(default);
        }
    }

    /// Variable by exact name
    #[cfg(test)]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Number of registered variables
    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether nothing was registered
    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in first-seen order
    #[must_use]
    pub fn into_variables(self) -> Vec<Variable> {
        self.variables.into_values().collect()
    }
}
