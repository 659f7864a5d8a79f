//! Procedure AST produced by the lowering engine
//!
//! The serialized form keeps the field names downstream consumers expect:
//! `proc_name`, `params`, `then`/`else`, and the `table` vs `table_name`
//! asymmetry between temp and permanent tables.

pub mod constraint;
pub mod sql_type;
pub mod statement;

pub use constraint::{Constraint, TableReference};
pub use sql_type::SqlType;
pub use statement::{RaiseLevel, Statement};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Return type recorded for every procedure
pub const VOID: &str = "VOID";

/// A node of the top-level output list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TopLevel {
    /// CREATE or ALTER PROCEDURE
    #[serde(rename = "PROCEDURE")]
    Procedure(ProcedureAst),
    /// CREATE SCHEMA
    #[serde(rename = "CREATE_SCHEMA")]
    CreateSchema {
        /// Schema name as written
        schema_name: String,
    },
}

impl TopLevel {
    /// The procedure, if this node is one
    #[must_use]
    pub fn as_procedure(&self) -> Option<&ProcedureAst> {
        match self {
            Self::Procedure(procedure) => Some(procedure),
            Self::CreateSchema { .. } => None,
        }
    }
}

/// One CREATE or ALTER PROCEDURE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureAst {
    /// Procedure name, schema qualifier included
    #[serde(rename = "proc_name")]
    pub name: String,
    /// Parameters in declaration order
    #[serde(rename = "params")]
    pub parameters: Vec<Parameter>,
    /// Locals in first-seen order
    pub variables: Vec<Variable>,
    /// Always [`VOID`]
    pub return_type: String,
    /// Top-level body
    pub statements: Vec<Statement>,
}

impl ProcedureAst {
    /// Empty procedure named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            variables: Vec::new(),
            return_type: VOID.to_string(),
            statements: Vec::new(),
        }
    }

    /// Variable by exact name
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// Every statement of the procedure, depth-first
    pub fn all_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().flat_map(Statement::descendants)
    }
}

/// Direction of a procedure parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    /// Input only
    #[default]
    #[display("IN")]
    In,
    /// `OUT` or `OUTPUT`
    #[display("OUT")]
    Out,
}

/// A procedure parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name including `@`
    pub name: String,
    /// Declared type, or the configured default
    #[serde(rename = "type")]
    pub ty: String,
    /// IN or OUT
    pub mode: ParameterMode,
}

/// A local variable of a procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Name including `@`
    pub name: String,
    /// Declared or inferred type
    #[serde(rename = "type")]
    pub ty: SqlType,
    /// Normalized default expression from DECLARE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Variable {
    /// Variable without a default
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}
