//! Column and table constraints of CREATE TABLE

use serde::{Deserialize, Serialize};

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReference {
    /// Referenced table
    pub table: String,
    /// Referenced columns
    pub columns: Vec<String>,
}

/// One constraint found on a column definition or as a table-level clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    /// `IDENTITY[(seed, step)]`
    Identity {
        /// Identity column
        column: String,
    },
    /// `NOT NULL`
    NotNull {
        /// Constrained column
        column: String,
    },
    /// `DEFAULT value`
    Default {
        /// Constrained column
        column: String,
        /// Normalized default
        value: String,
    },
    /// `CHECK (expr)`
    Check {
        /// Normalized check expression
        expression: String,
        /// `CONSTRAINT name`, when given
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// `AS (expr) [PERSISTED]`
    Computed {
        /// Normalized computing expression
        expression: String,
        /// Whether the value is stored
        #[serde(default, skip_serializing_if = "is_false")]
        persisted: bool,
    },
    /// `PRIMARY KEY`
    PrimaryKey {
        /// Key columns
        columns: Vec<String>,
        /// `CONSTRAINT name`, when given
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// `FOREIGN KEY ... REFERENCES`
    ForeignKey {
        /// Referencing columns
        columns: Vec<String>,
        /// Referenced table and columns
        references: TableReference,
        /// `CONSTRAINT name`, when given
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// `UNIQUE`
    Unique {
        /// Unique columns
        columns: Vec<String>,
        /// `CONSTRAINT name`, when given
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip predicate signature")]
fn is_false(value: &bool) -> bool {
    !*value
}
