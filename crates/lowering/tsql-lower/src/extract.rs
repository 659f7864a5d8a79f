//! Fact extraction from statement nodes
//!
//! Every function prefers the structured accessor and falls back to a
//! keyword-anchored pattern over the node text. `None` means neither worked;
//! the caller decides on a placeholder.

use crate::normalize::{compact_type, normalize};
use crate::table::split_top_level;
use regex::Regex;
use tsql_ast::SqlType;
use tsql_syntax::{SyntaxKind, SyntaxNode};

/// First capture group of `pattern` in `text`
fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().trim().to_string())
        .filter(|found| !found.is_empty())
}

/// Text of the first accessor present among `kinds`
fn first_accessor(node: &SyntaxNode, kinds: &[SyntaxKind]) -> Option<String> {
    kinds
        .iter()
        .find_map(|kind| node.accessor_text(kind))
        .map(str::to_string)
}

fn comma_list(text: &str) -> Vec<String> {
    text.trim()
        .trim_end_matches(';')
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn procedure_name(node: &SyntaxNode) -> Option<String> {
    first_accessor(node, &[SyntaxKind::ProcedureName]).or_else(|| {
        capture(
            regex!(r"(?i)\b(?:CREATE|ALTER)(?:\s+OR\s+ALTER)?\s+PROC(?:EDURE)?\s+([^\s(]+)"),
            &node.text,
        )
    })
}

/// What a parameter node says about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParameterFacts {
    pub name: Option<String>,
    pub ty: Option<String>,
    pub output: bool,
}

pub(crate) fn parameter(node: &SyntaxNode) -> ParameterFacts {
    let name = first_accessor(node, &[SyntaxKind::LocalId])
        .or_else(|| regex!(r"@\w+").find(&node.text).map(|found| found.as_str().to_string()));
    let remainder = match &name {
        Some(name) => node.text.replacen(name.as_str(), "", 1),
        None => node.text.clone(),
    };
    let ty = node
        .accessor_text(&SyntaxKind::DataType)
        .map(str::to_string)
        .or_else(|| {
            capture(
                regex!(r"(?i)^\s*(?:AS\s+)?([A-Za-z_][\w.]*(?:\s*\([^)]*\))?)"),
                &remainder,
            )
        })
        .filter(|ty| !regex!(r"(?i)^(?:OUT|OUTPUT|READONLY)$").is_match(ty))
        .map(|ty| compact_type(&ty).to_ascii_uppercase());
    let output = node.has_accessor(&SyntaxKind::OutputClause)
        || regex!(r"(?i)\bOUT(?:PUT)?\b").is_match(&remainder);

    ParameterFacts { name, ty, output }
}

pub(crate) fn schema_name(node: &SyntaxNode) -> Option<String> {
    first_accessor(node, &[SyntaxKind::Identifier])
        .or_else(|| capture(regex!(r"(?i)\bCREATE\s+SCHEMA\s+([^\s;]+)"), &node.text))
}

/// One `@name type [= default]` of a DECLARE
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredLocal {
    pub name: String,
    pub ty: SqlType,
    pub default: Option<String>,
}

pub(crate) fn declared_locals(node: &SyntaxNode) -> Vec<DeclaredLocal> {
    let structured: Vec<_> = node
        .accessors(&SyntaxKind::DeclareLocal)
        .filter_map(local_from_node)
        .collect();
    if !structured.is_empty() {
        return structured;
    }

    let body = regex!(r"(?is)^\s*DECLARE\s+(.*)$")
        .captures(&node.text)
        .and_then(|caps| caps.get(1))
        .map_or(node.text.as_str(), |found| found.as_str())
        .trim()
        .trim_end_matches(';');

    if let Some(caps) = regex!(r"(?i)^(@\w+)\s+(?:AS\s+)?TABLE\b").captures(body) {
        return vec![DeclaredLocal {
            name: caps[1].to_string(),
            ty: SqlType::named("TABLE"),
            default: None,
        }];
    }
    split_top_level(body)
        .into_iter()
        .filter_map(local_from_text)
        .collect()
}

fn local_from_node(local: &SyntaxNode) -> Option<DeclaredLocal> {
    let from_text = local_from_text(&local.text);
    let name = first_accessor(local, &[SyntaxKind::LocalId])
        .or_else(|| from_text.as_ref().map(|parsed| parsed.name.clone()))?;

    let ty = if let Some(data_type) = local.accessor_text(&SyntaxKind::DataType) {
        SqlType::named(compact_type(data_type))
    } else if regex!(r"(?i)\bTABLE\b").is_match(&local.text) {
        SqlType::named("TABLE")
    } else {
        from_text
            .as_ref()
            .map(|parsed| parsed.ty.clone())
            .unwrap_or_default()
    };

    let default = first_accessor(local, &[SyntaxKind::Expression, SyntaxKind::Constant])
        .map(|value| normalize(&value))
        .or_else(|| from_text.and_then(|parsed| parsed.default));

    Some(DeclaredLocal { name, ty, default })
}

fn local_from_text(text: &str) -> Option<DeclaredLocal> {
    let caps = regex!(r"(?is)^\s*(@\w+)\s*(?:AS\s+)?(.*?)\s*(?:=\s*(.*?))?\s*;?\s*$")
        .captures(text)?;
    let ty_text = caps.get(2).map_or("", |found| found.as_str());
    let ty = if regex!(r"(?i)^TABLE\b").is_match(ty_text) {
        SqlType::named("TABLE")
    } else {
        SqlType::named(compact_type(ty_text))
    };
    let default = caps
        .get(3)
        .map(|found| normalize(found.as_str()))
        .filter(|value| !value.is_empty());

    Some(DeclaredLocal {
        name: caps[1].to_string(),
        ty,
        default,
    })
}

/// `SET name [op]= value` with the operator split off the name
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assignment {
    pub name: String,
    pub operator: Option<char>,
    pub operand: String,
}

impl Assignment {
    /// Assigned value, `@i += 1` expanding to `@i + 1`
    pub fn value(&self) -> String {
        match self.operator {
            None => self.operand.clone(),
            Some(op) if !self.operand.contains(char::is_whitespace) => {
                format!("{} {op} {}", self.name, self.operand)
            }
            Some(op) => format!("{} {op} ({})", self.name, self.operand),
        }
    }
}

pub(crate) fn assignment(text: &str) -> Option<Assignment> {
    const COMPOUND: [char; 8] = ['+', '-', '*', '/', '%', '&', '|', '^'];

    let (left, right) = text.split_once('=')?;
    let left = regex!(r"(?i)^\s*SET\s+").replace(left, "");
    let left = left.trim();
    let (name, operator) = match left.char_indices().last() {
        Some((at, op)) if COMPOUND.contains(&op) => (left[..at].trim(), Some(op)),
        _ => (left, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Assignment {
        name: name.to_string(),
        operator,
        operand: normalize(right),
    })
}

/// Type suggested by the shape of an assigned value
pub(crate) fn value_type(value: &str) -> Option<SqlType> {
    let value = value.trim();
    if regex!(r"^\d+$").is_match(value) {
        Some(SqlType::int())
    } else if regex!(r"^\d+\.\d+$").is_match(value) {
        Some(SqlType::decimal())
    } else if value.to_ascii_uppercase().starts_with("GETDATE()") {
        Some(SqlType::named("DATE"))
    } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        Some(SqlType::named("NVARCHAR"))
    } else if value.contains(['*', '/', '+', '-']) {
        Some(SqlType::decimal())
    } else {
        None
    }
}

/// `SELECT @var = expr`: the variable and the first expression token
pub(crate) fn select_assignment(query: &str) -> Option<(String, String)> {
    let caps = regex!(r"(?i)^SELECT\s+(@\w+)\s*=\s*([^\s,]+)").captures(query)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

pub(crate) fn from_table(query: &str) -> Option<String> {
    capture(regex!(r"(?i)\bFROM\s+([^\s,()]+)"), query)
}

/// Column named by an expression like `e.[Salary]`
pub(crate) fn column_of(expression: &str) -> Option<String> {
    let found = regex!(r"^[\w.\[\]]+").find(expression)?;
    let last = found.as_str().rsplit('.').next()?;
    let column = last.trim_start_matches('[').trim_end_matches(']');
    (!column.is_empty()).then(|| column.to_string())
}

pub(crate) fn has_into(query: &str) -> bool {
    regex!(r"(?i)\bINTO\b").is_match(query)
}

pub(crate) fn into_variables(query: &str) -> Vec<String> {
    regex!(r"(?is)\bINTO\s+(.+?)\s+FROM\b")
        .captures(query)
        .map(|caps| comma_list(&caps[1]))
        .unwrap_or_default()
}

pub(crate) fn insert_target(query: &str) -> (Option<String>, Vec<String>) {
    let table = capture(
        regex!(r"(?i)\bINSERT\s+(?:TOP\s*\([^)]*\)\s*(?:PERCENT\s+)?)?(?:INTO\s+)?([^\s(]+)"),
        query,
    );
    let columns = regex!(
        r"(?i)\bINSERT\s+(?:TOP\s*\([^)]*\)\s*(?:PERCENT\s+)?)?(?:INTO\s+)?[^\s(]+\s*\(([^)]+)\)"
    )
    .captures(query)
    .map(|caps| comma_list(&caps[1]))
    .unwrap_or_default();
    (table, columns)
}

/// Target table of UPDATE, DELETE or MERGE
pub(crate) fn dml_table(kind: &SyntaxKind, query: &str) -> Option<String> {
    let pattern = match kind {
        SyntaxKind::UpdateStatement => {
            regex!(r"(?i)\bUPDATE\s+(?:TOP\s*\([^)]*\)\s*(?:PERCENT\s+)?)?([^\s(]+)")
        }
        SyntaxKind::DeleteStatement => regex!(
            r"(?i)\bDELETE\s+(?:TOP\s*\([^)]*\)\s*(?:PERCENT\s+)?)?(?:FROM\s+)?([^\s(]+)"
        ),
        SyntaxKind::MergeStatement => regex!(
            r"(?i)\bMERGE\s+(?:TOP\s*\([^)]*\)\s*(?:PERCENT\s+)?)?(?:INTO\s+)?([^\s(]+)"
        ),
        _ => return None,
    };
    capture(pattern, query)
}

/// Cursor named by a DECLARE CURSOR, OPEN, FETCH, CLOSE or DEALLOCATE node
pub(crate) fn cursor_name(node: &SyntaxNode) -> Option<String> {
    if let Some(name) = first_accessor(node, &[SyntaxKind::CursorName]) {
        return Some(name);
    }
    match node.kind {
        SyntaxKind::DeclareCursor => capture(
            regex!(
                r"(?i)\bDECLARE\s+(\S+)\s+(?:(?:INSENSITIVE|SCROLL|LOCAL|GLOBAL|FORWARD_ONLY|STATIC|KEYSET|DYNAMIC|FAST_FORWARD|READ_ONLY)\s+)*CURSOR\b"
            ),
            &node.text,
        ),
        SyntaxKind::FetchCursor => {
            capture(regex!(r"(?i)\bFROM\s+(?:GLOBAL\s+)?([A-Za-z0-9_#@\[\].]+)"), &node.text)
                .or_else(|| {
                    capture(
                        regex!(r"(?i)\bFETCH\s+(?:(?:NEXT|PRIOR|FIRST|LAST)\s+)?(\S+)\s+INTO\b"),
                        &node.text,
                    )
                })
        }
        _ => capture(
            regex!(r"(?i)^\s*(?:OPEN|CLOSE|DEALLOCATE)\s+(?:GLOBAL\s+)?([^\s;]+)"),
            &node.text,
        ),
    }
}

/// The SELECT behind a cursor declaration
pub(crate) fn cursor_query(node: &SyntaxNode) -> Option<String> {
    first_accessor(node, &[SyntaxKind::SelectStatement])
        .or_else(|| capture(regex!(r"(?is)\bFOR\s+(SELECT\b.+)$"), &node.text))
}

pub(crate) fn fetch_targets(node: &SyntaxNode) -> Vec<String> {
    let structured: Vec<_> = node
        .accessors(&SyntaxKind::LocalId)
        .map(|local| local.text.trim().to_string())
        .filter(|local| !local.is_empty())
        .collect();
    if !structured.is_empty() {
        return structured;
    }
    regex!(r"(?is)\bINTO\s+(.+)$")
        .captures(&node.text)
        .map(|caps| comma_list(&caps[1]))
        .unwrap_or_default()
}

pub(crate) fn print_message(text: &str) -> String {
    capture(regex!(r"(?i)\bPRINT\s*N?'([^']+)'"), text).unwrap_or_else(|| normalize(text))
}

pub(crate) fn return_expression(text: &str) -> Option<String> {
    regex!(r"(?is)^\s*RETURN\b(.*)$")
        .captures(text)
        .map(|caps| normalize(&caps[1]))
        .filter(|expression| !expression.is_empty())
}

pub(crate) fn drop_table_name(node: &SyntaxNode) -> Option<String> {
    first_accessor(
        node,
        &[
            SyntaxKind::TableName,
            SyntaxKind::FullTableName,
            SyntaxKind::SchemaObjectName,
        ],
    )
    .or_else(|| {
        capture(
            regex!(r"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?([^\s;,]+)"),
            &node.text,
        )
    })
}

pub(crate) fn drop_procedure_name(node: &SyntaxNode) -> Option<String> {
    first_accessor(node, &[SyntaxKind::ProcedureName, SyntaxKind::SchemaObjectName]).or_else(
        || {
            capture(
                regex!(r"(?i)\bDROP\s+PROC(?:EDURE)?\s+(?:IF\s+EXISTS\s+)?([^\s;,]+)"),
                &node.text,
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsql_syntax::NodeBuilder;

    fn leaf(kind: SyntaxKind, text: &str) -> SyntaxNode {
        SyntaxNode::leaf(kind, text)
    }

    #[test]
    fn test_procedure_name_fallback() {
        let node = leaf(
            SyntaxKind::CreateProcedure,
            "CREATE OR ALTER PROCEDURE dbo.usp_Pay(@a INT) AS BEGIN END",
        );
        assert_eq!(procedure_name(&node).as_deref(), Some("dbo.usp_Pay"));

        let node = NodeBuilder::new(SyntaxKind::CreateProcedure)
            .token("CREATE PROC")
            .child(leaf(SyntaxKind::ProcedureName, "usp_Named"))
            .finish();
        assert_eq!(procedure_name(&node).as_deref(), Some("usp_Named"));
    }

    #[test]
    fn test_parameter_modes() {
        let node = leaf(SyntaxKind::ProcedureParam, "@Total DECIMAL(18, 2) OUTPUT");
        let facts = parameter(&node);
        assert_eq!(facts.name.as_deref(), Some("@Total"));
        assert!(facts.output);
        assert_eq!(facts.ty.as_deref(), Some("DECIMAL(18,2)"));

        let node = leaf(SyntaxKind::ProcedureParam, "@Flag OUT");
        assert_eq!(parameter(&node).ty, None);

        let node = NodeBuilder::new(SyntaxKind::ProcedureParam)
            .child(leaf(SyntaxKind::LocalId, "@Output"))
            .child(leaf(SyntaxKind::DataType, "nvarchar ( 50 )"))
            .finish();
        let facts = parameter(&node);
        assert_eq!(facts.name.as_deref(), Some("@Output"));
        assert_eq!(facts.ty.as_deref(), Some("NVARCHAR(50)"));
        assert!(!facts.output);
    }

    #[test]
    fn test_declared_locals_from_text() {
        let node = leaf(
            SyntaxKind::DeclareStatement,
            "DECLARE @a INT = 5, @b NVARCHAR(10) = 'x', @c DECIMAL(18, 2);",
        );
        let locals = declared_locals(&node);
        assert_eq!(locals.len(), 3);
        assert_eq!(locals[0].name, "@a");
        assert_eq!(locals[0].ty, SqlType::int());
        assert_eq!(locals[0].default.as_deref(), Some("5"));
        assert_eq!(locals[1].ty, SqlType::named("NVARCHAR(10)"));
        assert_eq!(locals[1].default.as_deref(), Some("'x'"));
        assert_eq!(locals[2].ty, SqlType::named("DECIMAL(18,2)"));
        assert_eq!(locals[2].default, None);
    }

    #[test]
    fn test_table_variable() {
        let node = leaf(
            SyntaxKind::DeclareStatement,
            "DECLARE @Rows TABLE (Id INT, Name NVARCHAR(20))",
        );
        let locals = declared_locals(&node);
        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].name, "@Rows");
        assert_eq!(locals[0].ty, SqlType::named("TABLE"));
    }

    #[test]
    fn test_declared_local_accessors() {
        let local = NodeBuilder::new(SyntaxKind::DeclareLocal)
            .child(leaf(SyntaxKind::LocalId, "@Rate"))
            .child(leaf(SyntaxKind::DataType, "DECIMAL (10, 4)"))
            .token("=")
            .child(leaf(SyntaxKind::Constant, "1.5"))
            .finish();
        let node = NodeBuilder::new(SyntaxKind::DeclareStatement)
            .token("DECLARE")
            .child(local)
            .finish();
        assert_eq!(
            declared_locals(&node),
            [DeclaredLocal {
                name: "@Rate".to_string(),
                ty: SqlType::named("DECIMAL(10,4)"),
                default: Some("1.5".to_string()),
            }]
        );
    }

    #[test]
    fn test_assignment() {
        let plain = assignment("SET @Total = @Amount").unwrap();
        assert_eq!(plain.name, "@Total");
        assert_eq!(plain.operator, None);
        assert_eq!(plain.value(), "@Amount");

        let scaled = assignment("SET @Total += @Amount * 2").unwrap();
        assert_eq!(scaled.name, "@Total");
        assert_eq!(scaled.operator, Some('+'));
        assert_eq!(scaled.operand, "@Amount * 2");
        assert_eq!(scaled.value(), "@Total + (@Amount * 2)");

        assert_eq!(assignment("SET @i -= 1").unwrap().value(), "@i - 1");
        assert_eq!(assignment("SET @Flags |= @Mask").unwrap().value(), "@Flags | @Mask");
        assert_eq!(assignment("SET NOCOUNT ON"), None);
    }

    #[test]
    fn test_value_type() {
        assert_eq!(value_type("42"), Some(SqlType::int()));
        assert_eq!(value_type("4.20"), Some(SqlType::decimal()));
        assert_eq!(value_type("GETDATE()"), Some(SqlType::named("DATE")));
        assert_eq!(value_type("'hello'"), Some(SqlType::named("NVARCHAR")));
        assert_eq!(value_type("@a + 1"), Some(SqlType::decimal()));
        assert_eq!(value_type("@other"), None);
    }

    #[test]
    fn test_select_facts() {
        let query = "SELECT @s = e.Salary FROM dbo.Employees e WHERE e.Id = 1";
        assert_eq!(
            select_assignment(query),
            Some(("@s".to_string(), "e.Salary".to_string()))
        );
        assert_eq!(from_table(query).as_deref(), Some("dbo.Employees"));
        assert_eq!(column_of("e.[Salary]").as_deref(), Some("Salary"));

        let query = "SELECT a, b INTO @x, @y FROM t";
        assert!(has_into(query));
        assert_eq!(into_variables(query), ["@x", "@y"]);
    }

    #[test]
    fn test_dml_targets() {
        assert_eq!(
            insert_target("INSERT INTO dbo.Audit (Id, Note) VALUES (1, 'x')"),
            (
                Some("dbo.Audit".to_string()),
                vec!["Id".to_string(), "Note".to_string()]
            )
        );
        assert_eq!(insert_target("INSERT Audit VALUES (1)"), (Some("Audit".to_string()), vec![]));
        assert_eq!(
            dml_table(&SyntaxKind::DeleteStatement, "DELETE TOP (10) FROM Log WHERE a = 1").as_deref(),
            Some("Log")
        );
        assert_eq!(
            dml_table(&SyntaxKind::UpdateStatement, "UPDATE e SET a = 1").as_deref(),
            Some("e")
        );
        assert_eq!(
            dml_table(&SyntaxKind::MergeStatement, "MERGE INTO Target AS t USING s ON 1 = 1")
                .as_deref(),
            Some("Target")
        );
    }

    #[test]
    fn test_cursor_names() {
        let declare = leaf(
            SyntaxKind::DeclareCursor,
            "DECLARE emp_cursor CURSOR LOCAL FAST_FORWARD FOR SELECT Id FROM Employees",
        );
        assert_eq!(cursor_name(&declare).as_deref(), Some("emp_cursor"));
        assert_eq!(
            cursor_query(&declare).as_deref(),
            Some("SELECT Id FROM Employees")
        );

        let fetch = leaf(SyntaxKind::FetchCursor, "FETCH NEXT FROM emp_cursor INTO @Id, @Name");
        assert_eq!(cursor_name(&fetch).as_deref(), Some("emp_cursor"));
        assert_eq!(fetch_targets(&fetch), ["@Id", "@Name"]);

        let bare = leaf(SyntaxKind::FetchCursor, "FETCH c INTO @x");
        assert_eq!(cursor_name(&bare).as_deref(), Some("c"));

        let close = leaf(SyntaxKind::CloseCursor, "CLOSE emp_cursor;");
        assert_eq!(cursor_name(&close).as_deref(), Some("emp_cursor"));
    }

    #[test]
    fn test_misc_statements() {
        assert_eq!(print_message("PRINT 'Done'"), "Done");
        assert_eq!(print_message("PRINT @msg"), "PRINT @msg");
        assert_eq!(return_expression("RETURN @a+1;").as_deref(), Some("@a + 1"));
        assert_eq!(return_expression("RETURN"), None);

        let drop = leaf(SyntaxKind::DropTable, "DROP TABLE IF EXISTS #Work;");
        assert_eq!(drop_table_name(&drop).as_deref(), Some("#Work"));
        let drop = leaf(SyntaxKind::DropProcedure, "DROP PROC dbo.usp_Old");
        assert_eq!(drop_procedure_name(&drop).as_deref(), Some("dbo.usp_Old"));
    }
}
