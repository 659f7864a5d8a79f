//! Table schemas seen during one lowering session

use indexmap::IndexMap;
use serde::Serialize;
use tsql_ast::SqlType;

/// Column types keyed by uppercased column name
pub type ColumnTypes = IndexMap<String, SqlType>;

/// Uppercased table name → declared column types
///
/// Lives for the whole session so later procedures see tables created by
/// earlier ones. Never cleared mid-run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    tables: IndexMap<String, ColumnTypes>,
}

impl SchemaRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `table`, replacing whatever an earlier CREATE TABLE declared
    pub fn register_table(
        &mut self,
        table: &str,
        columns: impl IntoIterator<Item = (String, SqlType)>,
    ) {
        let columns = columns
            .into_iter()
            .map(|(name, ty)| (column_key(&name), ty))
            .collect();
        self.tables.insert(table.to_ascii_uppercase(), columns);
    }

    /// Columns of `table`, by exact name or by its unqualified last segment
    #[must_use]
    pub fn table(&self, table: &str) -> Option<&ColumnTypes> {
        let key = table.to_ascii_uppercase();
        if let Some(columns) = self.tables.get(&key) {
            return Some(columns);
        }
        let wanted = unqualified(&key);
        self.tables
            .iter()
            .find(|(name, _)| unqualified(name) == wanted)
            .map(|(_, columns)| columns)
    }

    /// Declared type of `column` in `table`, if both are known
    #[must_use]
    pub fn column_type(&self, table: &str, column: &str) -> Option<&SqlType> {
        self.table(table)?
            .get(&column_key(column))
            .filter(|ty| !ty.is_unknown())
    }

    /// Number of registered tables
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table was registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered table names in registration order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn column_key(column: &str) -> String {
    strip_quoting(column.trim()).to_ascii_uppercase()
}

/// Last dotted segment without `[]` or `""` quoting
fn unqualified(name: &str) -> &str {
    let last = name.rsplit('.').next().unwrap_or(name);
    strip_quoting(last)
}

fn strip_quoting(name: &str) -> &str {
    name.trim_start_matches(['[', '"'])
        .trim_end_matches([']', '"'])
}
