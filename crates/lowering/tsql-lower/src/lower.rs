//! The lowering listener
//!
//! [`LoweringContext`] consumes enter/exit events and grows one procedure at
//! a time. Compound statements are allocated in the [`StatementArena`] when
//! they are entered and their nested sequences fill up while the target
//! stack points at them. The finished procedure is materialized into owned
//! [`Statement`] trees when its node exits.
//!
//! Once a statement-level node is entered, everything beneath it is opaque:
//! sub-queries and nested expressions are read through the statement's own
//! text and accessors, never lowered on their own.

use crate::cursor::{CursorContext, CursorTable, UNKNOWN_FETCH_TARGET, cursor_columns};
use crate::error::{LowerFault, LowerResult};
use crate::extract;
use crate::normalize::{collapse_whitespace, normalize, referenced_variables};
use crate::options::LowerOptions;
use crate::registry::{Registration, VariableRegistry};
use crate::schema::SchemaRegistry;
use crate::scope::{
    ControlKind, FrameTag, ListId, PendingStmt, ScopeStack, StatementArena, StmtId,
};
use crate::table::table_definition;
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};
use tsql_ast::{
    Parameter, ParameterMode, ProcedureAst, RaiseLevel, SqlType, Statement, TopLevel, VOID,
};
use tsql_span::Span;
use tsql_syntax::{Listener, SyntaxKind, SyntaxNode, walk};

/// Name of a procedure whose name could not be read
pub const UNKNOWN_PROCEDURE: &str = "<UNKNOWN_PROC>";
/// Name of an unreadable parameter
pub const UNKNOWN_PARAMETER: &str = "<UNKNOWN_PARAM>";
/// Table of an INSERT, UPDATE, DELETE or DROP without a readable target
pub const UNKNOWN_TABLE: &str = "<UNKNOWN_TABLE>";
/// Condition of an IF or WHILE without a readable predicate
pub const UNKNOWN_CONDITION: &str = "<UNKNOWN_CONDITION>";
/// Cursor name that could not be read
pub const UNKNOWN_CURSOR: &str = "<UNKNOWN>";
/// Query of a cursor declared without one
pub const MISSING_QUERY: &str = "<MISSING QUERY>";

/// Condition of every fused cursor loop
pub const FETCH_STATUS_CONDITION: &str = "@@FETCH_STATUS = 0";

/// Result of a lowering session
#[derive(Debug, Clone, Default)]
pub struct LoweringOutput {
    /// Procedures and schemas in the order they closed
    pub ast: Vec<TopLevel>,
    /// Every fault recorded along the way
    pub faults: Vec<LowerFault>,
    /// Tables seen by CREATE TABLE
    pub schema: SchemaRegistry,
}

impl LoweringOutput {
    /// Procedures only, in output order
    pub fn procedures(&self) -> impl Iterator<Item = &ProcedureAst> {
        self.ast.iter().filter_map(TopLevel::as_procedure)
    }

    /// Procedure by exact name
    #[must_use]
    pub fn procedure(&self, name: &str) -> Option<&ProcedureAst> {
        self.procedures().find(|procedure| procedure.name == name)
    }
}

/// Whether the children of an entered node are lowered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Descend,
    Skip,
}

/// Procedure being built
#[derive(Debug)]
struct ProcedureBuilder {
    name: String,
    span: Span,
    parameters: Vec<Parameter>,
    variables: VariableRegistry,
    root: ListId,
}

/// Event-driven lowering engine
///
/// Feed it events through [`Listener`] (or [`walk`] a tree into it) and call
/// [`LoweringContext::finish`] once the stream ends. The schema registry
/// lives for the whole session; everything else is reset per procedure.
#[derive(Debug)]
pub struct LoweringContext {
    options: LowerOptions,
    ignored: FxHashSet<String>,
    arena: StatementArena,
    scopes: ScopeStack,
    procedure: Option<ProcedureBuilder>,
    cursors: CursorTable,
    schema: SchemaRegistry,
    output: Vec<TopLevel>,
    faults: Vec<LowerFault>,
    last_if: Option<StmtId>,
    /// Depth inside a node whose children are not lowered
    opaque_depth: usize,
}

impl Default for LoweringContext {
    fn default() -> Self {
        Self::new(LowerOptions::default())
    }
}

impl LoweringContext {
    /// Fresh session with `options`
    #[must_use]
    pub fn new(options: LowerOptions) -> Self {
        let ignored = options.ignored_set();
        Self {
            options,
            ignored,
            arena: StatementArena::new(),
            scopes: ScopeStack::new(),
            procedure: None,
            cursors: CursorTable::new(),
            schema: SchemaRegistry::new(),
            output: Vec::new(),
            faults: Vec::new(),
            last_if: None,
            opaque_depth: 0,
        }
    }

    /// Top-level nodes finished so far
    #[must_use]
    pub fn output(&self) -> &[TopLevel] {
        &self.output
    }

    /// Faults recorded so far
    #[must_use]
    pub fn faults(&self) -> &[LowerFault] {
        &self.faults
    }

    /// Tables registered so far
    #[must_use]
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Cursor context of the open procedure
    #[must_use]
    pub fn cursor(&self, name: &str) -> Option<&CursorContext> {
        self.cursors.get(name)
    }

    /// Whether a procedure is currently open
    #[must_use]
    pub fn in_procedure(&self) -> bool {
        self.procedure.is_some()
    }

    /// Close the session; an unterminated procedure is still emitted
    #[must_use]
    pub fn finish(mut self) -> LoweringOutput {
        if let Some(procedure) = &self.procedure {
            let fault = LowerFault::UnclosedProcedure {
                name: procedure.name.clone(),
                span: procedure.span.into(),
            };
            self.record(fault);
            self.close_procedure();
        }
        LoweringOutput {
            ast: self.output,
            faults: self.faults,
            schema: self.schema,
        }
    }

    fn record(&mut self, fault: LowerFault) {
        warn!(code = fault.code_name(), "{fault}");
        self.faults.push(fault);
    }

    /// Record a missing fact and hand back the placeholder
    fn placeholder(&mut self, fact: &'static str, node: &SyntaxNode, value: &str) -> String {
        self.record(LowerFault::missing(fact, node));
        value.to_string()
    }

    // ---- dispatch ----

    fn enter_node(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        match node.kind {
            SyntaxKind::CreateProcedure => return self.enter_procedure(node),
            SyntaxKind::IfStatement => return self.enter_if(node),
            SyntaxKind::ElseBranch => return self.enter_else(node),
            SyntaxKind::WhileStatement => return self.enter_while(node),
            SyntaxKind::BeginEndBlock => return self.enter_block(),
            SyntaxKind::TryCatch => return self.enter_try(),
            SyntaxKind::CatchBlock => return self.enter_catch(node),

            SyntaxKind::ProcedureParam => self.lower_parameter(node),
            SyntaxKind::CreateSchema => self.lower_schema(node)?,
            SyntaxKind::DeclareStatement => self.lower_declare(node),
            SyntaxKind::SetStatement => self.lower_set(node),
            SyntaxKind::SelectStatement => self.lower_select(node),
            SyntaxKind::InsertStatement => self.lower_insert(node),
            SyntaxKind::UpdateStatement
            | SyntaxKind::DeleteStatement
            | SyntaxKind::MergeStatement => self.lower_dml(node),
            SyntaxKind::PrintStatement => self.append_leaf(Statement::Raise {
                level: RaiseLevel::Info,
                message: extract::print_message(&node.text),
            }),
            SyntaxKind::ThrowStatement => self.append_leaf(Statement::Raise {
                level: RaiseLevel::Error,
                message: "THROW".to_string(),
            }),
            SyntaxKind::RaiserrorStatement => self.append_leaf(Statement::Raise {
                level: RaiseLevel::Error,
                message: normalize(&node.text),
            }),
            SyntaxKind::ReturnStatement => self.append_leaf(Statement::Return {
                expression: extract::return_expression(&node.text),
            }),
            SyntaxKind::CommitTransaction => self.append_leaf(Statement::Commit),
            SyntaxKind::RollbackTransaction => self.append_leaf(Statement::Rollback),
            SyntaxKind::DeclareCursor => self.lower_declare_cursor(node),
            SyntaxKind::OpenCursor => self.lower_open_cursor(node),
            SyntaxKind::FetchCursor => self.lower_fetch(node),
            SyntaxKind::CloseCursor => self.lower_close_cursor(node),
            SyntaxKind::DeallocateCursor => self.lower_deallocate(node),
            SyntaxKind::CreateTable => self.lower_create_table(node),
            SyntaxKind::DropTable => self.lower_drop_table(node),
            SyntaxKind::DropProcedure => self.lower_drop_procedure(node),
            _ => {}
        }
        Ok(Flow::Descend)
    }

    fn exit_node(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        match node.kind {
            SyntaxKind::CreateProcedure => self.exit_procedure(node),
            SyntaxKind::IfStatement => self.exit_if(node),
            SyntaxKind::WhileStatement => self.exit_while(node),
            SyntaxKind::BeginEndBlock => self.exit_frame(node, FrameTag::Block),
            SyntaxKind::TryCatch => self.exit_try(node),
            SyntaxKind::CatchBlock => self.exit_catch(node),
            _ => Ok(()),
        }
    }

    // ---- appending ----

    /// Sequence the next statement goes to
    fn target(&self) -> Option<ListId> {
        let procedure = self.procedure.as_ref()?;
        Some(self.scopes.current_target().unwrap_or(procedure.root))
    }

    fn then_branch_of_last_if(&self) -> Option<ListId> {
        match self.arena.get(self.last_if?) {
            PendingStmt::If { then_branch, .. } => Some(*then_branch),
            _ => None,
        }
    }

    /// Append to the active target, echoing drops into the last IF
    fn append(&mut self, statement: PendingStmt) -> Option<StmtId> {
        let Some(target) = self.target() else {
            debug!("statement outside a procedure dropped");
            return None;
        };
        let echo = match &statement {
            PendingStmt::Leaf(leaf) => leaf.drop_echo(),
            _ => None,
        };
        let Some((echo, then_branch)) = echo.zip(self.then_branch_of_last_if()) else {
            let id = self.arena.alloc(statement);
            self.arena.push(target, id);
            return Some(id);
        };

        let is_own_echo = matches!(&statement, PendingStmt::Leaf(leaf) if *leaf == echo);
        let id = if is_own_echo && target == then_branch && self.arena.contains_leaf(then_branch, &echo)
        {
            None
        } else {
            let id = self.arena.alloc(statement);
            self.arena.push(target, id);
            Some(id)
        };
        if !self.arena.contains_leaf(then_branch, &echo) {
            debug!(echo = echo.tag(), "drop echoed into IF");
            self.arena.push_leaf(then_branch, echo);
        }
        id
    }

    fn append_leaf(&mut self, statement: Statement) {
        self.append(PendingStmt::Leaf(statement));
    }

    // ---- variables ----

    fn in_catch(&self) -> bool {
        self.scopes.has_control(ControlKind::Catch)
    }

    fn ensure_variable(&mut self, name: &str, inferred: Option<SqlType>) -> Registration {
        if self.in_catch() {
            return Registration::Ignored;
        }
        let Some(procedure) = self.procedure.as_mut() else {
            return Registration::Ignored;
        };
        let registration = procedure.variables.ensure(name, inferred);
        if registration == Registration::Upgraded {
            trace!(variable = name, "variable type learned");
        }
        registration
    }

    fn update_variable_type(&mut self, name: &str, ty: SqlType) {
        if self.in_catch() {
            return;
        }
        if let Some(procedure) = self.procedure.as_mut() {
            procedure.variables.update_type(name, ty);
        }
    }

    // ---- procedure ----

    fn enter_procedure(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        if self.procedure.is_some() {
            return Err(LowerFault::malformed(node, "procedure definitions cannot nest"));
        }
        let name = match extract::procedure_name(node) {
            Some(name) => name,
            None => self.placeholder("procedure name", node, UNKNOWN_PROCEDURE),
        };
        debug!(procedure = %name, "procedure opened");

        self.arena = StatementArena::new();
        self.scopes.clear();
        self.cursors = CursorTable::new();
        self.last_if = None;
        let root = self.arena.new_list();
        self.scopes.push_target(root, FrameTag::Procedure);
        self.procedure = Some(ProcedureBuilder {
            name,
            span: node.span,
            parameters: Vec::new(),
            variables: VariableRegistry::new(self.ignored.clone()),
            root,
        });
        Ok(Flow::Descend)
    }

    fn exit_procedure(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        if self.procedure.is_none() {
            return Err(LowerFault::unbalanced(node));
        }
        self.close_procedure();
        Ok(())
    }

    /// Reconcile loops, materialize and emit the open procedure
    fn close_procedure(&mut self) {
        let Some(procedure) = self.procedure.take() else {
            return;
        };
        for record in self.cursors.drain_loops() {
            if let PendingStmt::CursorLoop { fetch_into, .. } = self.arena.get_mut(record.node) {
                if fetch_into.is_empty() {
                    *fetch_into = if record.last_fetch_into.is_empty() {
                        vec![UNKNOWN_FETCH_TARGET.to_string()]
                    } else {
                        record.last_fetch_into
                    };
                }
            }
        }

        let statements = self.arena.materialize_list(procedure.root);
        debug!(
            procedure = %procedure.name,
            statements = statements.len(),
            "procedure closed"
        );
        self.output.push(TopLevel::Procedure(ProcedureAst {
            name: procedure.name,
            parameters: procedure.parameters,
            variables: procedure.variables.into_variables(),
            return_type: VOID.to_string(),
            statements,
        }));

        self.scopes.clear();
        self.last_if = None;
        self.arena = StatementArena::new();
    }

    fn lower_parameter(&mut self, node: &SyntaxNode) {
        if self.procedure.is_none() {
            return;
        }
        let facts = extract::parameter(node);
        let name = match facts.name {
            Some(name) => name,
            None => self.placeholder("parameter name", node, UNKNOWN_PARAMETER),
        };
        let ty = facts
            .ty
            .unwrap_or_else(|| self.options.default_parameter_type.clone());
        let mode = if facts.output {
            ParameterMode::Out
        } else {
            ParameterMode::In
        };
        if let Some(procedure) = self.procedure.as_mut() {
            procedure.parameters.push(Parameter { name, ty, mode });
        }
    }

    fn lower_schema(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        let schema_name =
            extract::schema_name(node).ok_or_else(|| LowerFault::missing("schema name", node))?;
        self.output.push(TopLevel::CreateSchema { schema_name });
        Ok(())
    }

    // ---- simple statements ----

    fn lower_declare(&mut self, node: &SyntaxNode) {
        if self.procedure.is_none() || self.in_catch() {
            return;
        }
        for local in extract::declared_locals(node) {
            if self.ensure_variable(&local.name, Some(local.ty)) == Registration::Ignored {
                continue;
            }
            if let (Some(default), Some(procedure)) = (local.default, self.procedure.as_mut()) {
                procedure.variables.set_default(&local.name, default);
            }
        }
    }

    fn lower_set(&mut self, node: &SyntaxNode) {
        let text = collapse_whitespace(&node.text);
        let Some(assignment) = extract::assignment(&text) else {
            self.append_leaf(Statement::RawSql {
                query: normalize(&text),
            });
            return;
        };
        self.ensure_variable(&assignment.name, extract::value_type(&assignment.operand));
        let value = assignment.value();
        self.append_leaf(Statement::Set {
            name: assignment.name,
            value,
        });
    }

    fn lower_select(&mut self, node: &SyntaxNode) {
        let query = normalize(&node.text);

        if let Some((target, expression)) = extract::select_assignment(&query) {
            let inferred = extract::from_table(&query)
                .zip(extract::column_of(&expression))
                .and_then(|(table, column)| self.schema.column_type(&table, &column).cloned());
            self.ensure_variable(&target, inferred.clone());
            if let Some(ty) = inferred {
                self.update_variable_type(&target, ty);
            }
            let value = format!("SELECT {target} = {expression}");
            self.append_leaf(Statement::Set {
                name: target,
                value,
            });
            return;
        }

        let into_vars = if extract::has_into(&query) {
            extract::into_variables(&query)
        } else {
            Vec::new()
        };
        for var in &into_vars {
            self.ensure_variable(var, None);
        }
        self.append_leaf(Statement::SelectInto { query, into_vars });
    }

    fn lower_insert(&mut self, node: &SyntaxNode) {
        let query = normalize(&node.text);
        let (table, columns) = extract::insert_target(&query);
        let table = match table {
            Some(table) => table,
            None => self.placeholder("target table", node, UNKNOWN_TABLE),
        };
        self.append_leaf(Statement::Insert {
            query,
            table,
            columns,
        });
    }

    fn lower_dml(&mut self, node: &SyntaxNode) {
        let query = normalize(&node.text);
        let table = match extract::dml_table(&node.kind, &query) {
            Some(table) => table,
            None => self.placeholder("target table", node, UNKNOWN_TABLE),
        };
        let statement = match node.kind {
            SyntaxKind::UpdateStatement => Statement::Update { query, table },
            SyntaxKind::DeleteStatement => Statement::Delete { query, table },
            _ => Statement::Merge { query, table },
        };
        self.append_leaf(statement);
    }

    fn lower_create_table(&mut self, node: &SyntaxNode) {
        let definition = table_definition(node);
        let name = match definition.name {
            Some(name) => {
                self.schema.register_table(
                    &name,
                    definition
                        .columns
                        .iter()
                        .map(|column| (column.name.clone(), column.ty.clone())),
                );
                name
            }
            None => self.placeholder("table name", node, UNKNOWN_TABLE),
        };
        let columns = definition.columns.iter().map(|column| column.entry()).collect();

        let statement = if name.starts_with('#') {
            for column in &definition.columns {
                let bare = column.name.trim_start_matches('[').trim_end_matches(']');
                self.ensure_variable(&format!("@{bare}"), Some(column.ty.clone()));
            }
            Statement::DeclareTempTable {
                table: name,
                columns,
                constraints: definition.constraints,
            }
        } else {
            Statement::CreateTable {
                table_name: name,
                columns,
                constraints: definition.constraints,
            }
        };
        self.append_leaf(statement);
    }

    fn lower_drop_table(&mut self, node: &SyntaxNode) {
        let name = match extract::drop_table_name(node) {
            Some(name) => name,
            None => self.placeholder("table name", node, UNKNOWN_TABLE),
        };
        self.append_leaf(Statement::RawSql {
            query: format!("DROP TABLE {name}"),
        });
    }

    fn lower_drop_procedure(&mut self, node: &SyntaxNode) {
        let procedure = match extract::drop_procedure_name(node) {
            Some(name) => name,
            None => self.placeholder("procedure name", node, UNKNOWN_PROCEDURE),
        };
        self.append_leaf(Statement::DropProcedure { procedure });
    }

    // ---- control flow ----

    fn condition(&mut self, node: &SyntaxNode) -> String {
        match node.accessor_text(&SyntaxKind::SearchCondition) {
            Some(condition) => {
                for variable in referenced_variables(condition) {
                    self.ensure_variable(&variable, None);
                }
                normalize(condition)
            }
            None => self.placeholder("condition", node, UNKNOWN_CONDITION),
        }
    }

    fn enter_if(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        if self.target().is_none() {
            debug!("IF outside a procedure skipped");
            return Ok(Flow::Skip);
        }
        let condition = self.condition(node);
        let then_branch = self.arena.new_list();
        let else_branch = self.arena.new_list();
        let Some(id) = self.append(PendingStmt::If {
            condition,
            then_branch,
            else_branch,
        }) else {
            return Ok(Flow::Skip);
        };
        self.scopes.push_control(ControlKind::If, id);
        self.scopes.push_target(then_branch, FrameTag::Then);
        self.last_if = Some(id);
        Ok(Flow::Descend)
    }

    fn enter_else(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        let else_branch = match self.scopes.top_control() {
            Some(control) if control.kind == ControlKind::If => match self.arena.get(control.node) {
                PendingStmt::If { else_branch, .. } => Some(*else_branch),
                _ => None,
            },
            _ => None,
        };
        match else_branch {
            Some(else_branch) if self.scopes.pop_until(&[FrameTag::Then]).is_some() => {
                debug!("switched to ELSE branch");
                self.scopes.push_target(else_branch, FrameTag::Else);
            }
            _ => self.record(LowerFault::malformed(node, "ELSE without an open IF")),
        }
        Ok(Flow::Descend)
    }

    fn exit_if(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        self.last_if = None;
        self.scopes
            .pop_control(&[ControlKind::If])
            .ok_or_else(|| LowerFault::unbalanced(node))?;
        self.scopes
            .pop_until(&[FrameTag::Then, FrameTag::Else])
            .map(|_| ())
            .ok_or_else(|| LowerFault::unbalanced(node))
    }

    fn enter_while(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        if self.target().is_none() {
            debug!("WHILE outside a procedure skipped");
            return Ok(Flow::Skip);
        }
        let condition = self.condition(node);
        let compact: String = condition
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        if compact == "@@FETCH_STATUS=0" && self.fuse_cursor_loop() {
            return Ok(Flow::Descend);
        }

        let body = self.arena.new_list();
        let Some(id) = self.append(PendingStmt::While { condition, body }) else {
            return Ok(Flow::Skip);
        };
        self.scopes.push_control(ControlKind::While, id);
        self.scopes.push_target(body, FrameTag::WhileBody);
        Ok(Flow::Descend)
    }

    /// Turn the WHILE being entered into a CURSOR_LOOP of the first eligible cursor
    fn fuse_cursor_loop(&mut self) -> bool {
        let Some((name, context)) = self.cursors.first_unfused() else {
            debug!("no cursor to fuse; keeping WHILE");
            return false;
        };
        let cursor_name = name.to_string();
        let fetch_into = context
            .initial_targets()
            .map_or_else(|| context.last_fetch_into.clone(), <[String]>::to_vec);
        let initial_fetch = context.initial_fetch.take();

        let body = self.arena.new_list();
        if let Some(fetch) = initial_fetch {
            self.arena.push_leaf(body, fetch);
        }
        let Some(id) = self.append(PendingStmt::CursorLoop {
            cursor_name: cursor_name.clone(),
            condition: FETCH_STATUS_CONDITION.to_string(),
            fetch_into,
            body,
        }) else {
            return false;
        };

        let context = self.cursors.entry(&cursor_name);
        context.fetch_loop = Some(id);
        context.loop_open = true;
        self.scopes.push_control(ControlKind::CursorLoop, id);
        self.scopes.push_target(body, FrameTag::LoopBody);
        debug!(cursor = %cursor_name, "WHILE fused into cursor loop");
        true
    }

    fn exit_while(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        let control = self
            .scopes
            .pop_control(&[ControlKind::While, ControlKind::CursorLoop])
            .ok_or_else(|| LowerFault::unbalanced(node))?;
        let tag = if control.kind == ControlKind::CursorLoop {
            if let Some(context) = self.cursors.by_loop(control.node) {
                context.loop_open = false;
            }
            FrameTag::LoopBody
        } else {
            FrameTag::WhileBody
        };
        self.exit_frame(node, tag)
    }

    fn enter_block(&mut self) -> LowerResult<Flow> {
        let statements = self.arena.new_list();
        if self.append(PendingStmt::Block { statements }).is_none() {
            return Ok(Flow::Skip);
        }
        self.scopes.push_target(statements, FrameTag::Block);
        Ok(Flow::Descend)
    }

    fn exit_frame(&mut self, node: &SyntaxNode, tag: FrameTag) -> LowerResult<()> {
        self.scopes
            .pop_until(&[tag])
            .map(|_| ())
            .ok_or_else(|| LowerFault::unbalanced(node))
    }

    fn enter_try(&mut self) -> LowerResult<Flow> {
        let body = self.arena.new_list();
        let Some(id) = self.append(PendingStmt::BeginTry { body }) else {
            return Ok(Flow::Skip);
        };
        self.arena.push_leaf(body, Statement::BeginTransaction);
        self.scopes.push_control(ControlKind::Try, id);
        self.scopes.push_target(body, FrameTag::TryBody);
        Ok(Flow::Descend)
    }

    /// Close the TRY body with its COMMIT
    fn seal_try_body(&mut self) {
        if let Some(frame) = self.scopes.pop_until(&[FrameTag::TryBody]) {
            self.arena.push_leaf(frame.list, Statement::Commit);
        }
        self.scopes.seal_try();
    }

    fn enter_catch(&mut self, node: &SyntaxNode) -> LowerResult<Flow> {
        if self.target().is_none() {
            return Ok(Flow::Skip);
        }
        match self.scopes.top_control() {
            Some(control) if control.kind == ControlKind::Try && !control.sealed => {
                self.seal_try_body();
            }
            _ => self.record(LowerFault::malformed(node, "CATCH without an open TRY")),
        }
        let body = self.arena.new_list();
        let Some(id) = self.append(PendingStmt::BeginCatch { body }) else {
            return Ok(Flow::Skip);
        };
        self.scopes.push_control(ControlKind::Catch, id);
        self.scopes.push_target(body, FrameTag::CatchBody);
        Ok(Flow::Descend)
    }

    fn exit_catch(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        self.scopes
            .pop_control(&[ControlKind::Catch])
            .ok_or_else(|| LowerFault::unbalanced(node))?;
        self.exit_frame(node, FrameTag::CatchBody)
    }

    fn exit_try(&mut self, node: &SyntaxNode) -> LowerResult<()> {
        match self.scopes.top_control() {
            Some(control) if control.kind == ControlKind::Try => {
                if !control.sealed {
                    self.seal_try_body();
                }
                self.scopes.pop_control(&[ControlKind::Try]);
                Ok(())
            }
            _ => {
                self.scopes
                    .pop_control(&[ControlKind::Try])
                    .ok_or_else(|| LowerFault::unbalanced(node))?;
                Ok(())
            }
        }
    }

    // ---- cursors ----

    fn cursor_name_of(&mut self, node: &SyntaxNode) -> String {
        match extract::cursor_name(node) {
            Some(name) => name,
            None => self.placeholder("cursor name", node, UNKNOWN_CURSOR),
        }
    }

    fn lower_declare_cursor(&mut self, node: &SyntaxNode) {
        let name = self.cursor_name_of(node);
        let query = match extract::cursor_query(node) {
            Some(query) => normalize(&query),
            None => self.placeholder("cursor query", node, MISSING_QUERY),
        };
        let columns = cursor_columns(&query, &self.schema);
        debug!(cursor = %name, columns = columns.len(), "cursor declared");

        let context = self.cursors.entry(&name);
        context.declaration = Some(Statement::DeclareCursor {
            name: name.clone(),
            query,
        });
        context.columns = columns;
    }

    fn lower_open_cursor(&mut self, node: &SyntaxNode) {
        let cursor_name = self.cursor_name_of(node);
        let context = self.cursors.entry(&cursor_name);
        context.open = Some(Statement::OpenCursor {
            cursor_name: cursor_name.clone(),
        });
        context.close = None;
    }

    fn lower_close_cursor(&mut self, node: &SyntaxNode) {
        let cursor_name = self.cursor_name_of(node);
        self.cursors.entry(&cursor_name).close = Some(Statement::CloseCursor {
            cursor_name: cursor_name.clone(),
        });
    }

    fn lower_deallocate(&mut self, node: &SyntaxNode) {
        let cursor_name = self.cursor_name_of(node);
        if let Some(context) = self.cursors.remove(&cursor_name) {
            if context.initial_fetch.is_some() {
                debug!(cursor = %cursor_name, "unfused FETCH dropped");
            }
        }
    }

    fn lower_fetch(&mut self, node: &SyntaxNode) {
        let cursor_name = self.cursor_name_of(node);
        let targets = extract::fetch_targets(node);
        if targets.is_empty() {
            self.record(LowerFault::missing("fetch targets", node));
        }

        let types: Vec<_> = {
            let context = self.cursors.entry(&cursor_name);
            (0..targets.len()).map(|index| context.column_type(index)).collect()
        };
        for (target, ty) in targets.iter().zip(types) {
            self.ensure_variable(target, ty);
        }

        let context = self.cursors.entry(&cursor_name);
        context.last_fetch_into = targets.clone();
        let (fetch_loop, loop_open) = (context.fetch_loop, context.loop_open);

        match fetch_loop {
            Some(loop_id) if loop_open => {
                if let PendingStmt::CursorLoop {
                    fetch_into, body, ..
                } = self.arena.get_mut(loop_id)
                {
                    *fetch_into = targets;
                    let body = *body;
                    self.scopes.push_target(body, FrameTag::FetchRedirect);
                    trace!(cursor = %cursor_name, "FETCH redirected to loop body");
                }
            }
            Some(_) => {
                self.cursors.retire_loop(&cursor_name);
                self.stash_fetch(cursor_name, targets);
            }
            None => self.stash_fetch(cursor_name, targets),
        }
    }

    fn stash_fetch(&mut self, cursor_name: String, fetch_into: Vec<String>) {
        self.cursors.entry(&cursor_name).initial_fetch = Some(Statement::Fetch {
            cursor_name: cursor_name.clone(),
            fetch_into,
        });
    }
}

impl Listener for LoweringContext {
    fn enter(&mut self, node: &SyntaxNode) {
        if self.opaque_depth > 0 {
            self.opaque_depth += 1;
            return;
        }
        trace!(kind = %node.kind, "enter");
        let flow = self.enter_node(node).unwrap_or_else(|fault| {
            self.record(fault);
            Flow::Skip
        });
        if flow == Flow::Skip || node.kind.is_leaf_statement() || node.kind.is_accessor() {
            self.opaque_depth = 1;
        }
    }

    fn exit(&mut self, node: &SyntaxNode) {
        if self.opaque_depth > 0 {
            self.opaque_depth -= 1;
            return;
        }
        trace!(kind = %node.kind, "exit");
        if let Err(fault) = self.exit_node(node) {
            self.record(fault);
        }
    }
}

/// Lower a whole tree with default options
#[must_use]
pub fn lower_tree(root: &SyntaxNode) -> LoweringOutput {
    lower_tree_with(root, LowerOptions::default())
}

/// Lower a whole tree with `options`
#[must_use]
pub fn lower_tree_with(root: &SyntaxNode, options: LowerOptions) -> LoweringOutput {
    let mut context = LoweringContext::new(options);
    walk(&mut context, root);
    context.finish()
}
