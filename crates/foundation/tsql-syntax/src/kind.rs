//! Node kinds understood by the lowering engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grammar rule kinds
///
/// Statement kinds produce AST statements; accessor kinds are the structured
/// sub-parts a grammar variant may or may not expose under a statement node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyntaxKind {
    /// Root of the syntax tree (file or batch)
    Root,
    /// CREATE or ALTER PROCEDURE
    CreateProcedure,
    /// One procedure parameter
    ProcedureParam,
    /// CREATE SCHEMA
    CreateSchema,
    /// DECLARE of local variables
    DeclareStatement,
    /// SET assignment
    SetStatement,
    /// SELECT (standalone, assignment or INTO)
    SelectStatement,
    /// INSERT
    InsertStatement,
    /// UPDATE
    UpdateStatement,
    /// DELETE
    DeleteStatement,
    /// MERGE
    MergeStatement,
    /// IF ... [ELSE ...]
    IfStatement,
    /// ELSE marker or wrapper of the else branch
    ElseBranch,
    /// WHILE loop
    WhileStatement,
    /// BEGIN ... END
    BeginEndBlock,
    /// BEGIN TRY ... END TRY BEGIN CATCH ... END CATCH
    TryCatch,
    /// The CATCH part of a try/catch statement
    CatchBlock,
    /// PRINT
    PrintStatement,
    /// THROW
    ThrowStatement,
    /// RAISERROR
    RaiserrorStatement,
    /// RETURN
    ReturnStatement,
    /// COMMIT [TRANSACTION]
    CommitTransaction,
    /// ROLLBACK [TRANSACTION]
    RollbackTransaction,
    /// DECLARE name CURSOR FOR ...
    DeclareCursor,
    /// OPEN cursor
    OpenCursor,
    /// FETCH ... FROM cursor INTO ...
    FetchCursor,
    /// CLOSE cursor
    CloseCursor,
    /// DEALLOCATE cursor
    DeallocateCursor,
    /// CREATE TABLE (permanent or `#temp`)
    CreateTable,
    /// DROP TABLE
    DropTable,
    /// DROP PROCEDURE
    DropProcedure,
    /// Procedure name accessor
    ProcedureName,
    /// Table name accessor
    TableName,
    /// Fully qualified table name accessor
    FullTableName,
    /// Schema-qualified object name accessor
    SchemaObjectName,
    /// Generic identifier accessor
    Identifier,
    /// Cursor name accessor
    CursorName,
    /// `@local` identifier accessor
    LocalId,
    /// Data type accessor
    DataType,
    /// Boolean search condition accessor
    SearchCondition,
    /// Expression accessor
    Expression,
    /// Constant accessor
    Constant,
    /// OUTPUT / OUT marker on a parameter
    OutputClause,
    /// One `@name type [= value]` inside DECLARE
    DeclareLocal,
    /// One column definition inside CREATE TABLE
    ColumnDefinition,
    /// One table-level constraint inside CREATE TABLE
    TableConstraint,
    /// Any rule the engine does not know
    Unknown(String),
}

impl SyntaxKind {
    /// Map a grammar rule name to a kind
    ///
    /// Several grammar variants spell the same rule differently; all of the
    /// spellings below land on one kind so they share a handler.
    #[must_use]
    pub fn from_rule_name(rule: &str) -> Self {
        match rule.to_ascii_lowercase().as_str() {
            "tsql_file" | "batch" | "sql_clauses" | "root" => Self::Root,
            "create_or_alter_procedure" | "create_procedure" => Self::CreateProcedure,
            "procedure_param" => Self::ProcedureParam,
            "create_schema" => Self::CreateSchema,
            "declare_statement" => Self::DeclareStatement,
            "set_statement" => Self::SetStatement,
            "select_statement" | "select_statement_standalone" => Self::SelectStatement,
            "insert_statement" => Self::InsertStatement,
            "update_statement" => Self::UpdateStatement,
            "delete_statement" => Self::DeleteStatement,
            "merge_statement" => Self::MergeStatement,
            "if_statement" => Self::IfStatement,
            "else_statement" | "else_branch" | "else" => Self::ElseBranch,
            "while_statement" => Self::WhileStatement,
            "begin_end_block" | "block_statement" => Self::BeginEndBlock,
            "try_catch_statement" => Self::TryCatch,
            "catch_block" => Self::CatchBlock,
            "print_statement" => Self::PrintStatement,
            "throw_statement" => Self::ThrowStatement,
            "raiseerror_statement" | "raiserror_statement" => Self::RaiserrorStatement,
            "return_statement" => Self::ReturnStatement,
            "commit_transaction" => Self::CommitTransaction,
            "rollback_transaction" => Self::RollbackTransaction,
            "declare_cursor" => Self::DeclareCursor,
            "open_cursor" => Self::OpenCursor,
            "fetch_cursor" | "fetch_cursor_statement" | "fetch_statement" | "fetch" => {
                Self::FetchCursor
            }
            "close_cursor" => Self::CloseCursor,
            "deallocate_cursor_statement" | "deallocate_cursor" => Self::DeallocateCursor,
            "create_table" => Self::CreateTable,
            "drop_table" => Self::DropTable,
            "drop_procedure" => Self::DropProcedure,
            "func_proc_name_schema"
            | "func_proc_name_server_database_schema"
            | "procedure_name" => Self::ProcedureName,
            "table_name" => Self::TableName,
            "full_table_name" => Self::FullTableName,
            "schema_object_name" => Self::SchemaObjectName,
            "id_" | "id" | "identifier" => Self::Identifier,
            "cursor_name" => Self::CursorName,
            "local_id" => Self::LocalId,
            "data_type" => Self::DataType,
            "search_condition" => Self::SearchCondition,
            "expression" => Self::Expression,
            "constant" => Self::Constant,
            "output_clause" | "output" => Self::OutputClause,
            "declare_local" => Self::DeclareLocal,
            "column_definition" => Self::ColumnDefinition,
            "table_constraint" => Self::TableConstraint,
            _ => Self::Unknown(rule.to_string()),
        }
    }

    /// Statement kinds that never contain further statements of their own
    #[must_use]
    pub fn is_leaf_statement(&self) -> bool {
        matches!(
            self,
            Self::ProcedureParam
                | Self::CreateSchema
                | Self::DeclareStatement
                | Self::SetStatement
                | Self::SelectStatement
                | Self::InsertStatement
                | Self::UpdateStatement
                | Self::DeleteStatement
                | Self::MergeStatement
                | Self::PrintStatement
                | Self::ThrowStatement
                | Self::RaiserrorStatement
                | Self::ReturnStatement
                | Self::CommitTransaction
                | Self::RollbackTransaction
                | Self::DeclareCursor
                | Self::OpenCursor
                | Self::FetchCursor
                | Self::CloseCursor
                | Self::DeallocateCursor
                | Self::CreateTable
                | Self::DropTable
                | Self::DropProcedure
        )
    }

    /// Structured sub-parts that are read through their parent
    #[must_use]
    pub fn is_accessor(&self) -> bool {
        matches!(
            self,
            Self::ProcedureName
                | Self::TableName
                | Self::FullTableName
                | Self::SchemaObjectName
                | Self::Identifier
                | Self::CursorName
                | Self::LocalId
                | Self::DataType
                | Self::SearchCondition
                | Self::Expression
                | Self::Constant
                | Self::OutputClause
                | Self::DeclareLocal
                | Self::ColumnDefinition
                | Self::TableConstraint
        )
    }

    /// Canonical rule name
    #[must_use]
    pub fn rule_name(&self) -> &str {
        match self {
            Self::Root => "tsql_file",
            Self::CreateProcedure => "create_or_alter_procedure",
            Self::ProcedureParam => "procedure_param",
            Self::CreateSchema => "create_schema",
            Self::DeclareStatement => "declare_statement",
            Self::SetStatement => "set_statement",
            Self::SelectStatement => "select_statement",
            Self::InsertStatement => "insert_statement",
            Self::UpdateStatement => "update_statement",
            Self::DeleteStatement => "delete_statement",
            Self::MergeStatement => "merge_statement",
            Self::IfStatement => "if_statement",
            Self::ElseBranch => "else_statement",
            Self::WhileStatement => "while_statement",
            Self::BeginEndBlock => "begin_end_block",
            Self::TryCatch => "try_catch_statement",
            Self::CatchBlock => "catch_block",
            Self::PrintStatement => "print_statement",
            Self::ThrowStatement => "throw_statement",
            Self::RaiserrorStatement => "raiseerror_statement",
            Self::ReturnStatement => "return_statement",
            Self::CommitTransaction => "commit_transaction",
            Self::RollbackTransaction => "rollback_transaction",
            Self::DeclareCursor => "declare_cursor",
            Self::OpenCursor => "open_cursor",
            Self::FetchCursor => "fetch_cursor",
            Self::CloseCursor => "close_cursor",
            Self::DeallocateCursor => "deallocate_cursor_statement",
            Self::CreateTable => "create_table",
            Self::DropTable => "drop_table",
            Self::DropProcedure => "drop_procedure",
            Self::ProcedureName => "func_proc_name_schema",
            Self::TableName => "table_name",
            Self::FullTableName => "full_table_name",
            Self::SchemaObjectName => "schema_object_name",
            Self::Identifier => "id_",
            Self::CursorName => "cursor_name",
            Self::LocalId => "local_id",
            Self::DataType => "data_type",
            Self::SearchCondition => "search_condition",
            Self::Expression => "expression",
            Self::Constant => "constant",
            Self::OutputClause => "output_clause",
            Self::DeclareLocal => "declare_local",
            Self::ColumnDefinition => "column_definition",
            Self::TableConstraint => "table_constraint",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for SyntaxKind {
    fn from(rule: String) -> Self {
        Self::from_rule_name(&rule)
    }
}

impl From<SyntaxKind> for String {
    fn from(kind: SyntaxKind) -> Self {
        kind.rule_name().to_string()
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(formatter, "unknown({name})"),
            other => formatter.write_str(other.rule_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_spellings_share_a_kind() {
        for rule in ["fetch_cursor", "fetch_cursor_statement", "fetch_statement", "fetch"] {
            assert_eq!(SyntaxKind::from_rule_name(rule), SyntaxKind::FetchCursor, "{rule}");
        }
    }

    #[test]
    fn test_rule_names_are_case_insensitive() {
        assert_eq!(SyntaxKind::from_rule_name("LOCAL_ID"), SyntaxKind::LocalId);
        assert_eq!(
            SyntaxKind::from_rule_name("Create_Procedure"),
            SyntaxKind::CreateProcedure
        );
    }

    #[test]
    fn test_unknown_rule_keeps_its_name() {
        let kind = SyntaxKind::from_rule_name("waitfor_statement");
        assert_eq!(kind, SyntaxKind::Unknown("waitfor_statement".to_string()));
        assert_eq!(kind.to_string(), "unknown(waitfor_statement)");
        assert_eq!(String::from(kind), "waitfor_statement");
    }

    #[test]
    fn test_leaf_and_accessor_kinds_are_disjoint() {
        assert!(SyntaxKind::FetchCursor.is_leaf_statement());
        assert!(!SyntaxKind::FetchCursor.is_accessor());
        assert!(SyntaxKind::SearchCondition.is_accessor());
        assert!(!SyntaxKind::IfStatement.is_leaf_statement());
        assert!(!SyntaxKind::IfStatement.is_accessor());
        assert!(!SyntaxKind::Unknown("batch_level".into()).is_accessor());
    }

    #[test]
    fn test_canonical_name_maps_back() {
        let kinds = [
            SyntaxKind::CreateProcedure,
            SyntaxKind::FetchCursor,
            SyntaxKind::RaiserrorStatement,
            SyntaxKind::TableConstraint,
            SyntaxKind::ElseBranch,
        ];
        for kind in kinds {
            assert_eq!(SyntaxKind::from_rule_name(kind.rule_name()), kind);
        }
    }
}
