//! Lowering of T-SQL procedure parse events into the procedure AST
//!
//! The engine listens to enter/exit events over a [`tsql_syntax::SyntaxNode`]
//! tree and builds [`tsql_ast::TopLevel`] nodes. It never fails as a whole:
//! anything it cannot read becomes a placeholder plus a [`LowerFault`].

/// Lazily compiled, process-wide regex
macro_rules! regex {
    ($pattern:expr $(,)?) => {{
        static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        PATTERN.get_or_init(|| $crate::compile_pattern($pattern))
    }};
}

pub mod cursor;
pub mod error;
mod extract;
pub mod lower;
pub mod normalize;
pub mod options;
pub mod registry;
pub mod schema;
pub mod scope;
pub mod table;

pub use cursor::{CursorContext, CursorTable};
pub use error::{LowerFault, LowerResult};
pub use lower::{LoweringContext, LoweringOutput, lower_tree, lower_tree_with};
pub use normalize::normalize;
pub use options::LowerOptions;
pub use registry::{Registration, VariableRegistry};
pub use schema::SchemaRegistry;
pub use table::{ColumnSpec, TableDefinition, table_definition};

#[allow(
    clippy::expect_used,
    reason = "only compiles literal patterns from this crate"
)]
fn compile_pattern(pattern: &str) -> regex::Regex {
    regex::Regex::new(pattern).expect("invalid built-in pattern")
}
