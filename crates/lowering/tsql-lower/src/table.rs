//! Column and constraint extraction for CREATE TABLE
//!
//! Structured accessors are used when the grammar exposes them. Otherwise
//! the parenthesized table body is split at top-level commas and each piece
//! is read as a column definition or a table constraint.

use crate::normalize::{compact_type, normalize};
use regex::Regex;
use tsql_ast::{Constraint, SqlType, TableReference};
use tsql_syntax::{SyntaxKind, SyntaxNode};

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name as written
    pub name: String,
    /// Compacted type text
    pub ty: SqlType,
}

impl ColumnSpec {
    /// `"<name> <type>"` as listed in the statement
    #[must_use]
    pub fn entry(&self) -> String {
        format!("{} {}", self.name, self.ty)
    }
}

/// Everything CREATE TABLE declares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name, when readable
    pub name: Option<String>,
    /// Columns in declaration order
    pub columns: Vec<ColumnSpec>,
    /// Column constraints, then table constraints
    pub constraints: Vec<Constraint>,
}

const NAME_ACCESSORS: [SyntaxKind; 4] = [
    SyntaxKind::TableName,
    SyntaxKind::FullTableName,
    SyntaxKind::SchemaObjectName,
    SyntaxKind::Identifier,
];

/// Read a CREATE TABLE node
#[must_use]
pub fn table_definition(node: &SyntaxNode) -> TableDefinition {
    let name = table_name(node);
    let mut definition = TableDefinition {
        name,
        ..TableDefinition::default()
    };

    let column_nodes: Vec<_> = node.accessors(&SyntaxKind::ColumnDefinition).collect();
    let constraint_nodes: Vec<_> = node.accessors(&SyntaxKind::TableConstraint).collect();

    if column_nodes.is_empty() && constraint_nodes.is_empty() {
        for item in table_body(&node.text).map(split_top_level).unwrap_or_default() {
            if is_table_constraint(item) {
                definition.constraints.extend(table_constraint(item));
            } else if let Some(column) = column_from_text(item, None, None) {
                definition.columns.push(column.spec);
                definition.constraints.extend(column.constraints);
            }
        }
        return definition;
    }

    for child in &node.children {
        match child.kind {
            SyntaxKind::ColumnDefinition => {
                let name = child.accessor_text(&SyntaxKind::Identifier);
                let ty = child.accessor_text(&SyntaxKind::DataType);
                if let Some(column) = column_from_text(&child.text, name, ty) {
                    definition.columns.push(column.spec);
                    definition.constraints.extend(column.constraints);
                }
            }
            SyntaxKind::TableConstraint => {
                definition.constraints.extend(table_constraint(&child.text));
            }
            _ => {}
        }
    }
    definition
}

fn table_name(node: &SyntaxNode) -> Option<String> {
    NAME_ACCESSORS
        .iter()
        .find_map(|kind| node.accessor_text(kind))
        .map(str::to_string)
        .or_else(|| {
            regex!(r"(?i)\bCREATE\s+TABLE\s+([^\s(]+)")
                .captures(&node.text)
                .map(|caps| caps[1].to_string())
        })
}

/// Inner text of the first parenthesized group after the table name
fn table_body(text: &str) -> Option<&str> {
    let start = regex!(r"(?i)\bCREATE\s+TABLE\s+[^\s(]+").find(text)?.end();
    paren_group(text, start).map(|(open, close)| &text[open + 1..close])
}

struct ParsedColumn {
    spec: ColumnSpec,
    constraints: Vec<Constraint>,
}

fn column_from_text(text: &str, name: Option<&str>, ty: Option<&str>) -> Option<ParsedColumn> {
    let text = text.trim();
    let name = match name {
        Some(name) => name.to_string(),
        None => regex!(r"^(\[[^\]]+\]|\S+)")
            .captures(text)
            .map(|caps| caps[1].to_string())?,
    };
    let rest = text
        .get(text.find(name.as_str()).map_or(0, |at| at + name.len())..)
        .unwrap_or_default();
    let masked = mask_nested(rest);

    let ty = match ty {
        Some(ty) => SqlType::named(compact_type(ty)),
        None => declared_type(rest),
    };

    let mut constraints = Vec::new();
    let constraint_name = keyword_name(&masked, rest);

    if regex!(r"(?i)\bIDENTITY\b").is_match(&masked) {
        constraints.push(Constraint::Identity {
            column: name.clone(),
        });
    }
    if regex!(r"(?i)\bNOT\s+NULL\b").is_match(&masked) {
        constraints.push(Constraint::NotNull {
            column: name.clone(),
        });
    }
    if let Some(found) = regex!(r"(?i)\bDEFAULT\b\s*").find(&masked) {
        if let Some(value) = default_value(&rest[found.end()..]) {
            constraints.push(Constraint::Default {
                column: name.clone(),
                value: normalize(value),
            });
        }
    }
    if let Some(expression) = group_after(regex!(r"(?i)\bCHECK\s*\("), &masked, rest) {
        constraints.push(Constraint::Check {
            expression: normalize(expression),
            name: constraint_name.clone(),
        });
    }
    if let Some(found) = regex!(r"(?i)\bAS\s*\(").find(&masked) {
        if let Some((open, close)) = paren_group(rest, found.end() - 1) {
            let persisted = regex!(r"(?i)^\s*PERSISTED\b").is_match(&masked[close + 1..]);
            constraints.push(Constraint::Computed {
                expression: normalize(&rest[open + 1..close]),
                persisted,
            });
        }
    }
    if regex!(r"(?i)\bPRIMARY\s+KEY\b").is_match(&masked) {
        constraints.push(Constraint::PrimaryKey {
            columns: vec![name.clone()],
            name: constraint_name.clone(),
        });
    }
    if regex!(r"(?i)\bUNIQUE\b").is_match(&masked) {
        constraints.push(Constraint::Unique {
            columns: vec![name.clone()],
            name: constraint_name.clone(),
        });
    }
    if let Some(references) = references(&masked, rest) {
        constraints.push(Constraint::ForeignKey {
            columns: vec![name.clone()],
            references,
            name: constraint_name,
        });
    }

    Some(ParsedColumn {
        spec: ColumnSpec { name, ty },
        constraints,
    })
}

/// Type right after the column name; computed columns have none
fn declared_type(rest: &str) -> SqlType {
    let Some(caps) = regex!(r"^\s*([A-Za-z_]\w*)(\s*\([^)]*\))?").captures(rest) else {
        return SqlType::Unknown;
    };
    if caps[1].eq_ignore_ascii_case("AS") {
        return SqlType::Unknown;
    }
    let text = caps.get(0).map_or("", |found| found.as_str());
    SqlType::named(compact_type(text))
}

fn default_value(rest: &str) -> Option<&str> {
    let rest = rest.trim_start();
    if rest.starts_with('(') {
        return paren_group(rest, 0).map(|(open, close)| &rest[open + 1..close]);
    }
    let quoted = regex!(r"^N?'(?:[^']|'')*'");
    if let Some(found) = quoted.find(rest) {
        return Some(found.as_str());
    }
    regex!(r"^[^\s,]+").find(rest).map(|found| found.as_str())
}

fn is_table_constraint(item: &str) -> bool {
    regex!(r"(?i)^\s*(CONSTRAINT|PRIMARY\s+KEY|FOREIGN\s+KEY|UNIQUE|CHECK)\b").is_match(item)
}

fn table_constraint(text: &str) -> Option<Constraint> {
    let masked = mask_nested(text);
    let name = keyword_name(&masked, text);

    if let Some(found) = regex!(r"(?i)\bPRIMARY\s+KEY\b").find(&masked) {
        let columns = paren_group(text, found.end()).map(|(open, close)| column_list(&text[open + 1..close]))?;
        return Some(Constraint::PrimaryKey { columns, name });
    }
    if let Some(found) = regex!(r"(?i)\bFOREIGN\s+KEY\b").find(&masked) {
        let columns = paren_group(text, found.end()).map(|(open, close)| column_list(&text[open + 1..close]))?;
        let references = references(&masked, text)?;
        return Some(Constraint::ForeignKey {
            columns,
            references,
            name,
        });
    }
    if let Some(expression) = group_after(regex!(r"(?i)\bCHECK\s*\("), &masked, text) {
        return Some(Constraint::Check {
            expression: normalize(expression),
            name,
        });
    }
    if let Some(found) = regex!(r"(?i)\bUNIQUE\b").find(&masked) {
        let columns = paren_group(text, found.end()).map(|(open, close)| column_list(&text[open + 1..close]))?;
        return Some(Constraint::Unique { columns, name });
    }
    None
}

fn keyword_name(masked: &str, text: &str) -> Option<String> {
    regex!(r"(?i)\bCONSTRAINT\s+(\S+)")
        .captures(masked)
        .and_then(|caps| caps.get(1))
        .map(|found| text[found.range()].to_string())
}

fn references(masked: &str, text: &str) -> Option<TableReference> {
    let caps = regex!(r"(?i)\bREFERENCES\s+([^\s(]+)").captures(masked)?;
    let table = caps.get(1)?;
    let columns = paren_group(text, table.end())
        .map(|(open, close)| column_list(&text[open + 1..close]))
        .unwrap_or_default();
    Some(TableReference {
        table: text[table.range()].to_string(),
        columns,
    })
}

/// Inner text of the group opened by the `(` that ends a `pattern` match
fn group_after<'text>(pattern: &Regex, masked: &str, text: &'text str) -> Option<&'text str> {
    let found = pattern.find(masked)?;
    let (open, close) = paren_group(text, found.end() - 1)?;
    Some(&text[open + 1..close])
}

fn column_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect()
}

/// Byte offsets of the first `(` at or after `from` and its matching `)`
pub(crate) fn paren_group(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    let mut in_quote = false;
    for (index, ch) in text.get(from..)?.char_indices() {
        let index = index + from;
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => {
                if depth == 0 {
                    open = Some(index);
                }
                depth += 1;
            }
            ')' if !in_quote && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|open| (open, index));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at `,` outside parentheses and quotes; pieces are trimmed
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            ',' if !in_quote && depth == 0 => {
                pieces.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    pieces.push(text[start..].trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

/// Blank out everything inside parentheses and quotes, keeping byte offsets
///
/// Keyword searches run on the masked copy so `CHECK (x IS NOT NULL)` never
/// reads as a NOT NULL column.
pub(crate) fn mask_nested(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut in_quote = false;
    for ch in text.chars() {
        let hidden = match ch {
            '\'' => {
                in_quote = !in_quote;
                false
            }
            '(' if !in_quote => {
                depth += 1;
                depth > 1
            }
            ')' if !in_quote && depth > 0 => {
                depth -= 1;
                depth > 0
            }
            _ => in_quote || depth > 0,
        };
        if hidden {
            masked.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        } else {
            masked.push(ch);
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsql_syntax::NodeBuilder;

    fn text_only(sql: &str) -> TableDefinition {
        table_definition(&SyntaxNode::leaf(SyntaxKind::CreateTable, sql))
    }

    #[test]
    fn test_text_fallback_columns() {
        let definition = text_only(
            "CREATE TABLE Employees (Id INT IDENTITY(1,1) NOT NULL, Salary DECIMAL (18, 6), Name NVARCHAR(50) DEFAULT 'none')",
        );
        assert_eq!(definition.name.as_deref(), Some("Employees"));
        let entries: Vec<_> = definition.columns.iter().map(ColumnSpec::entry).collect();
        assert_eq!(
            entries,
            ["Id INT", "Salary DECIMAL(18,6)", "Name NVARCHAR(50)"]
        );
        assert_eq!(
            definition.constraints,
            [
                Constraint::Identity { column: "Id".into() },
                Constraint::NotNull { column: "Id".into() },
                Constraint::Default {
                    column: "Name".into(),
                    value: "'none'".into()
                },
            ]
        );
    }

    #[test]
    fn test_check_contents_do_not_leak_keywords() {
        let definition =
            text_only("CREATE TABLE t (Status INT CHECK (Status IS NOT NULL AND Status > 0))");
        assert_eq!(
            definition.constraints,
            [Constraint::Check {
                expression: "Status IS NOT NULL AND Status > 0".into(),
                name: None
            }]
        );
    }

    #[test]
    fn test_computed_and_default_groups() {
        let definition = text_only(
            "CREATE TABLE #Lines (Qty INT, Price DECIMAL(10,2) DEFAULT (0), Total AS (Qty*Price) PERSISTED)",
        );
        assert_eq!(definition.name.as_deref(), Some("#Lines"));
        assert_eq!(definition.columns[2].ty, SqlType::Unknown);
        assert!(definition.constraints.contains(&Constraint::Default {
            column: "Price".into(),
            value: "0".into()
        }));
        assert!(definition.constraints.contains(&Constraint::Computed {
            expression: "Qty * Price".into(),
            persisted: true
        }));
    }

    #[test]
    fn test_table_level_constraints() {
        let definition = text_only(
            "CREATE TABLE Orders (Id INT, DeptId INT, \
             CONSTRAINT PK_Orders PRIMARY KEY (Id), \
             CONSTRAINT FK_Dept FOREIGN KEY (DeptId) REFERENCES Departments(Id), \
             CHECK (Id > 0), UNIQUE (DeptId, Id))",
        );
        assert_eq!(definition.columns.len(), 2);
        assert_eq!(
            definition.constraints,
            [
                Constraint::PrimaryKey {
                    columns: vec!["Id".into()],
                    name: Some("PK_Orders".into())
                },
                Constraint::ForeignKey {
                    columns: vec!["DeptId".into()],
                    references: TableReference {
                        table: "Departments".into(),
                        columns: vec!["Id".into()]
                    },
                    name: Some("FK_Dept".into())
                },
                Constraint::Check {
                    expression: "Id > 0".into(),
                    name: None
                },
                Constraint::Unique {
                    columns: vec!["DeptId".into(), "Id".into()],
                    name: None
                },
            ]
        );
    }

    #[test]
    fn test_inline_primary_key() {
        let definition = text_only("CREATE TABLE t (Code CHAR(3) PRIMARY KEY)");
        assert_eq!(
            definition.constraints,
            [Constraint::PrimaryKey {
                columns: vec!["Code".into()],
                name: None
            }]
        );
    }

    #[test]
    fn test_accessors_take_precedence() {
        let column = NodeBuilder::new(SyntaxKind::ColumnDefinition)
            .child(SyntaxNode::leaf(SyntaxKind::Identifier, "Salary"))
            .child(SyntaxNode::leaf(SyntaxKind::DataType, "decimal(18,6)"))
            .token("NOT NULL")
            .finish();
        let node = NodeBuilder::new(SyntaxKind::CreateTable)
            .token("CREATE TABLE")
            .child(SyntaxNode::leaf(SyntaxKind::TableName, "dbo.Employees"))
            .token("(")
            .child(column)
            .token(")")
            .finish();

        let definition = table_definition(&node);
        assert_eq!(definition.name.as_deref(), Some("dbo.Employees"));
        assert_eq!(definition.columns[0].entry(), "Salary decimal(18,6)");
        assert_eq!(
            definition.constraints,
            [Constraint::NotNull {
                column: "Salary".into()
            }]
        );
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a INT, b DECIMAL(18,2), c CHAR(1) DEFAULT ','"),
            ["a INT", "b DECIMAL(18,2)", "c CHAR(1) DEFAULT ','"]
        );
    }
}
