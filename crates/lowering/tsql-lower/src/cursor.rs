//! Cursor contexts and the state cursor-loop fusion needs
//!
//! A cursor goes declared → opened → fetched once → fused into a loop →
//! closed or deallocated. Contexts live for one procedure.

use crate::scope::StmtId;
use crate::schema::SchemaRegistry;
use crate::table::{mask_nested, split_top_level};
use indexmap::IndexMap;
use tsql_ast::{SqlType, Statement};

/// Placeholder for a loop whose fetch targets never became known
pub const UNKNOWN_FETCH_TARGET: &str = "<UNKNOWN_VAR>";

/// What the engine knows about one cursor
#[derive(Debug, Clone, Default)]
pub struct CursorContext {
    /// DECLARE CURSOR statement
    pub declaration: Option<Statement>,
    /// Columns of the cursor query with their types
    pub columns: Vec<(String, SqlType)>,
    /// OPEN marker
    pub open: Option<Statement>,
    /// CLOSE marker
    pub close: Option<Statement>,
    /// Targets of the most recent FETCH
    pub last_fetch_into: Vec<String>,
    /// FETCH seen before any loop exists
    pub initial_fetch: Option<Statement>,
    /// Fused CURSOR_LOOP
    pub fetch_loop: Option<StmtId>,
    /// The fused loop's WHILE has not exited yet
    pub loop_open: bool,
}

impl CursorContext {
    /// Type of the `index`-th fetched column
    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<SqlType> {
        self.columns
            .get(index)
            .map(|(_, ty)| ty.clone())
            .filter(|ty| !ty.is_unknown())
    }

    /// `fetch_into` of the pending initial fetch
    #[must_use]
    pub fn initial_targets(&self) -> Option<&[String]> {
        match &self.initial_fetch {
            Some(Statement::Fetch { fetch_into, .. }) if !fetch_into.is_empty() => {
                Some(fetch_into)
            }
            _ => None,
        }
    }
}

/// A fused loop that still needs its fetch targets checked at procedure exit
#[derive(Debug, Clone)]
pub struct LoopRecord {
    /// The CURSOR_LOOP statement
    pub node: StmtId,
    /// Targets of the cursor's last FETCH
    pub last_fetch_into: Vec<String>,
}

/// Cursor contexts in declaration order, plus loops already retired
#[derive(Debug, Default)]
pub struct CursorTable {
    contexts: IndexMap<String, CursorContext>,
    retired: Vec<LoopRecord>,
}

impl CursorTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `name`, created empty when the cursor was never declared
    pub fn entry(&mut self, name: &str) -> &mut CursorContext {
        self.contexts.entry(name.to_string()).or_default()
    }

    /// Context of a declared or referenced cursor
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CursorContext> {
        self.contexts.get(name)
    }

    /// DEALLOCATE; a fused loop is kept for reconciliation
    pub fn remove(&mut self, name: &str) -> Option<CursorContext> {
        let context = self.contexts.shift_remove(name)?;
        if let Some(node) = context.fetch_loop {
            self.retired.push(LoopRecord {
                node,
                last_fetch_into: context.last_fetch_into.clone(),
            });
        }
        Some(context)
    }

    /// First context in declaration order without a fused loop
    pub fn first_unfused(&mut self) -> Option<(&str, &mut CursorContext)> {
        self.contexts
            .iter_mut()
            .find(|(_, context)| context.fetch_loop.is_none())
            .map(|(name, context)| (name.as_str(), context))
    }

    /// Context owning the fused loop `node`
    pub fn by_loop(&mut self, node: StmtId) -> Option<&mut CursorContext> {
        self.contexts
            .values_mut()
            .find(|context| context.fetch_loop == Some(node))
    }

    /// Detach the fused loop of `name` so the cursor can fuse again
    pub fn retire_loop(&mut self, name: &str) {
        let Some(context) = self.contexts.get_mut(name) else {
            return;
        };
        if let Some(node) = context.fetch_loop.take() {
            context.loop_open = false;
            self.retired.push(LoopRecord {
                node,
                last_fetch_into: context.last_fetch_into.clone(),
            });
        }
    }

    /// Every fused loop, live or retired; the table is empty afterwards
    pub fn drain_loops(&mut self) -> Vec<LoopRecord> {
        let mut loops = std::mem::take(&mut self.retired);
        loops.extend(self.contexts.drain(..).filter_map(|(_, context)| {
            context.fetch_loop.map(|node| LoopRecord {
                node,
                last_fetch_into: context.last_fetch_into,
            })
        }));
        loops
    }

    /// Number of live contexts
    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no cursor is live
    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Output column names of a SELECT, by alias or last dotted segment
#[must_use]
pub fn select_columns(query: &str) -> Vec<String> {
    let masked = mask_nested(query);
    let Some(select) = regex!(r"(?i)^\s*SELECT\s+(?:DISTINCT\s+)?(?:TOP\s*\(\s*\)\s*|TOP\s+\d+\s+)?")
        .find(&masked)
    else {
        return Vec::new();
    };
    let end = regex!(r"(?i)\b(FROM|INTO|WHERE|GROUP|ORDER)\b")
        .find_at(&masked, select.end())
        .map_or(query.len(), |found| found.start());

    split_top_level(&query[select.end()..end])
        .into_iter()
        .filter_map(column_label)
        .collect()
}

fn column_label(item: &str) -> Option<String> {
    if let Some(caps) = regex!(r"(?i)\bAS\s+(\S+)$").captures(item) {
        return Some(strip_quoting(&caps[1]).to_string());
    }
    if let Some(caps) = regex!(r"^(\S+)\s*=").captures(item) {
        if !caps[1].starts_with('@') {
            return Some(strip_quoting(&caps[1]).to_string());
        }
    }
    let last = item.split_whitespace().last()?;
    let segment = last.rsplit('.').next().unwrap_or(last);
    Some(strip_quoting(segment).to_string())
}

fn strip_quoting(name: &str) -> &str {
    name.trim_start_matches(['[', '"']).trim_end_matches([']', '"'])
}

/// Type guess from a column name alone
#[must_use]
pub fn heuristic_type(column: &str) -> SqlType {
    let upper = column.to_ascii_uppercase();
    if upper.contains("ID") {
        SqlType::int()
    } else if upper.contains("SALARY") || upper.contains("AMOUNT") {
        SqlType::decimal()
    } else if upper.contains("CURRENCY") {
        SqlType::named("CHAR(3)")
    } else {
        SqlType::Unknown
    }
}

/// Columns of a cursor query, typed from the schema when its table is known
#[must_use]
pub fn cursor_columns(query: &str, schema: &SchemaRegistry) -> Vec<(String, SqlType)> {
    let table = regex!(r"(?i)\bFROM\s+([^\s,()]+)")
        .captures(query)
        .map(|caps| caps[1].to_string());

    select_columns(query)
        .into_iter()
        .map(|column| {
            let ty = table
                .as_deref()
                .and_then(|table| schema.column_type(table, &column))
                .cloned()
                .unwrap_or_else(|| heuristic_type(&column));
            (column, ty)
        })
        .collect()
}
