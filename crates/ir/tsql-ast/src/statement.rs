//! Lowered statements

use crate::Constraint;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Severity of a RAISE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaiseLevel {
    /// PRINT
    #[display("INFO")]
    Info,
    /// THROW and RAISERROR
    #[display("ERROR")]
    Error,
}

/// One lowered statement
///
/// Nested sequences are owned; a statement never appears under two parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Statement {
    /// Statement kept as normalized source text
    RawSql {
        /// Normalized source text
        query: String,
    },
    /// SET, or a SELECT that assigns one variable
    Set {
        /// Assigned variable
        name: String,
        /// Assigned value, compound operators expanded
        value: String,
    },
    /// SELECT ... INTO variables
    SelectInto {
        /// Normalized query
        query: String,
        /// Receiving variables in order
        into_vars: Vec<String>,
    },
    /// INSERT [INTO] table
    Insert {
        /// Normalized statement
        query: String,
        /// Target table
        table: String,
        /// Explicit column list, empty when omitted
        columns: Vec<String>,
    },
    /// UPDATE of one table
    Update {
        /// Normalized statement
        query: String,
        /// Target table
        table: String,
    },
    /// DELETE from one table
    Delete {
        /// Normalized statement
        query: String,
        /// Target table
        table: String,
    },
    /// MERGE into one table
    Merge {
        /// Normalized statement
        query: String,
        /// Target table
        table: String,
    },
    /// DROP PROCEDURE
    DropProcedure {
        /// Dropped procedure name
        procedure: String,
    },
    /// CREATE TABLE of a permanent table
    CreateTable {
        /// Table name as written
        table_name: String,
        /// `name TYPE` per column
        columns: Vec<String>,
        /// Column and table constraints
        constraints: Vec<Constraint>,
    },
    /// CREATE TABLE of a `#temp` table
    DeclareTempTable {
        /// Table name including `#`
        table: String,
        /// `name TYPE` per column
        columns: Vec<String>,
        /// Column and table constraints
        constraints: Vec<Constraint>,
    },
    /// IF with optional ELSE
    If {
        /// Normalized condition
        condition: String,
        /// Statements run when the condition holds
        #[serde(rename = "then")]
        then_branch: Vec<Statement>,
        /// ELSE statements, empty without ELSE
        #[serde(rename = "else")]
        else_branch: Vec<Statement>,
    },
    /// WHILE loop
    While {
        /// Normalized condition
        condition: String,
        /// Loop body
        body: Vec<Statement>,
    },
    /// OPEN/FETCH/WHILE @@FETCH_STATUS = 0 fused into one loop
    CursorLoop {
        /// Iterated cursor
        cursor_name: String,
        /// Loop condition
        condition: String,
        /// Variables filled by each FETCH
        fetch_into: Vec<String>,
        /// Loop body
        body: Vec<Statement>,
    },
    /// BEGIN ... END
    Block {
        /// Block contents
        statements: Vec<Statement>,
    },
    /// BEGIN TRY ... END TRY
    BeginTry {
        /// TRY contents
        body: Vec<Statement>,
    },
    /// BEGIN CATCH ... END CATCH
    BeginCatch {
        /// CATCH contents
        body: Vec<Statement>,
    },
    /// Implicit transaction start at the top of every TRY body
    BeginTransaction,
    /// PRINT, THROW or RAISERROR
    Raise {
        /// Severity
        level: RaiseLevel,
        /// Message text or the whole error call
        message: String,
    },
    /// COMMIT
    Commit,
    /// ROLLBACK
    Rollback,
    /// RETURN with optional expression
    Return {
        /// Returned expression
        #[serde(default)]
        expression: Option<String>,
    },
    /// DECLARE name CURSOR FOR query
    DeclareCursor {
        /// Cursor name
        name: String,
        /// Cursor query
        query: String,
    },
    /// OPEN cursor
    OpenCursor {
        /// Cursor name
        cursor_name: String,
    },
    /// CLOSE cursor
    CloseCursor {
        /// Cursor name
        cursor_name: String,
    },
    /// FETCH ... INTO
    Fetch {
        /// Cursor name
        cursor_name: String,
        /// Receiving variables
        fetch_into: Vec<String>,
    },
}

impl Statement {
    /// Nested statement sequences, in serialization order
    #[must_use]
    pub fn bodies(&self) -> Vec<&[Self]> {
        match self {
            Self::If {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch.as_slice(), else_branch.as_slice()],
            Self::While { body, .. }
            | Self::CursorLoop { body, .. }
            | Self::BeginTry { body }
            | Self::BeginCatch { body } => vec![body.as_slice()],
            Self::Block { statements } => vec![statements.as_slice()],
            _ => Vec::new(),
        }
    }

    /// This statement followed by every nested statement, depth-first
    #[must_use]
    pub fn descendants(&self) -> Vec<&Self> {
        let mut out = vec![self];
        for body in self.bodies() {
            for statement in body {
                out.extend(statement.descendants());
            }
        }
        out
    }

    /// The `type` tag this statement serializes with
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RawSql { .. } => "RAW_SQL",
            Self::Set { .. } => "SET",
            Self::SelectInto { .. } => "SELECT_INTO",
            Self::Insert { .. } => "INSERT",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
            Self::Merge { .. } => "MERGE",
            Self::DropProcedure { .. } => "DROP_PROCEDURE",
            Self::CreateTable { .. } => "CREATE_TABLE",
            Self::DeclareTempTable { .. } => "DECLARE_TEMP_TABLE",
            Self::If { .. } => "IF",
            Self::While { .. } => "WHILE",
            Self::CursorLoop { .. } => "CURSOR_LOOP",
            Self::Block { .. } => "BLOCK",
            Self::BeginTry { .. } => "BEGIN_TRY",
            Self::BeginCatch { .. } => "BEGIN_CATCH",
            Self::BeginTransaction => "BEGIN_TRANSACTION",
            Self::Raise { .. } => "RAISE",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Return { .. } => "RETURN",
            Self::DeclareCursor { .. } => "DECLARE_CURSOR",
            Self::OpenCursor { .. } => "OPEN_CURSOR",
            Self::CloseCursor { .. } => "CLOSE_CURSOR",
            Self::Fetch { .. } => "FETCH",
        }
    }

    /// RawSql text that mirrors this statement when it drops a table or procedure
    #[must_use]
    pub fn drop_echo(&self) -> Option<Self> {
        match self {
            Self::DropProcedure { procedure } => Some(Self::RawSql {
                query: format!("DROP PROCEDURE {procedure}"),
            }),
            Self::RawSql { query } if query.starts_with("DROP TABLE ") => Some(self.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_if_branches_serialize_as_then_and_else() {
        let statement = Statement::If {
            condition: "@x > 0".to_string(),
            then_branch: vec![Statement::Commit],
            else_branch: vec![],
        };
        assert_eq!(
            serde_json::to_value(&statement).unwrap(),
            json!({
                "type": "IF",
                "condition": "@x > 0",
                "then": [{ "type": "COMMIT" }],
                "else": []
            })
        );
    }

    #[test]
    fn test_tag_matches_serialized_type() {
        let statements = [
            Statement::BeginTransaction,
            Statement::RawSql {
                query: "DROP TABLE t".to_string(),
            },
            Statement::Raise {
                level: RaiseLevel::Info,
                message: "hi".to_string(),
            },
            Statement::Return { expression: None },
        ];
        for statement in statements {
            let value = serde_json::to_value(&statement).unwrap();
            assert_eq!(value["type"], statement.tag());
        }
    }

    #[test]
    fn test_drop_echo() {
        let drop = Statement::DropProcedure {
            procedure: "dbo.Old".to_string(),
        };
        assert_eq!(
            drop.drop_echo(),
            Some(Statement::RawSql {
                query: "DROP PROCEDURE dbo.Old".to_string()
            })
        );
        let raw = Statement::RawSql {
            query: "SET NOCOUNT ON".to_string(),
        };
        assert_eq!(raw.drop_echo(), None);
    }

    #[test]
    fn test_descendants_are_depth_first() {
        let tree = Statement::BeginTry {
            body: vec![
                Statement::BeginTransaction,
                Statement::Block {
                    statements: vec![Statement::Rollback],
                },
                Statement::Commit,
            ],
        };
        let tags: Vec<_> = tree.descendants().iter().map(|s| s.tag()).collect();
        assert_eq!(
            tags,
            ["BEGIN_TRY", "BEGIN_TRANSACTION", "BLOCK", "ROLLBACK", "COMMIT"]
        );
        assert_eq!(RaiseLevel::Error.to_string(), "ERROR");
    }
}
