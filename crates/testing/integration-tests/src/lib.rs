//! Syntax tree fixtures for end-to-end lowering tests
//!
//! The helpers mirror what a parser adapter hands the engine: statement
//! nodes carrying their raw text, plus the accessors a grammar variant
//! happens to expose.

pub use tsql_ast::{ProcedureAst, RaiseLevel, SqlType, Statement, TopLevel};
pub use tsql_lower::{LowerOptions, LoweringContext, LoweringOutput, lower_tree, lower_tree_with};
pub use tsql_syntax::{Listener, NodeBuilder, SyntaxEvent, SyntaxKind, SyntaxNode, walk};

/// Statement node read only through its text
#[must_use]
pub fn leaf(kind: SyntaxKind, text: &str) -> SyntaxNode {
    SyntaxNode::leaf(kind, text)
}

/// `CREATE PROCEDURE name AS ...` with a procedure-name accessor
#[must_use]
pub fn procedure(name: &str, body: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    procedure_with_params(name, &[], body)
}

#[must_use]
pub fn procedure_with_params(
    name: &str,
    params: &[&str],
    body: impl IntoIterator<Item = SyntaxNode>,
) -> SyntaxNode {
    NodeBuilder::new(SyntaxKind::CreateProcedure)
        .token("CREATE PROCEDURE")
        .child(leaf(SyntaxKind::ProcedureName, name))
        .children(params.iter().map(|param| leaf(SyntaxKind::ProcedureParam, param)))
        .token("AS")
        .children(body)
        .finish()
}

/// `IF condition then`, with an ELSE wrapper when `otherwise` is given
#[must_use]
pub fn if_statement(
    condition: &str,
    then: impl IntoIterator<Item = SyntaxNode>,
    otherwise: Option<Vec<SyntaxNode>>,
) -> SyntaxNode {
    let builder = NodeBuilder::new(SyntaxKind::IfStatement)
        .token("IF")
        .child(leaf(SyntaxKind::SearchCondition, condition))
        .children(then);
    match otherwise {
        Some(otherwise) => builder
            .child(
                NodeBuilder::new(SyntaxKind::ElseBranch)
                    .token("ELSE")
                    .children(otherwise)
                    .finish(),
            )
            .finish(),
        None => builder.finish(),
    }
}

#[must_use]
pub fn while_loop(condition: &str, body: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    NodeBuilder::new(SyntaxKind::WhileStatement)
        .token("WHILE")
        .child(leaf(SyntaxKind::SearchCondition, condition))
        .children(body)
        .finish()
}

/// `BEGIN ... END`
#[must_use]
pub fn block(body: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    NodeBuilder::new(SyntaxKind::BeginEndBlock)
        .token("BEGIN")
        .children(body)
        .token("END")
        .finish()
}

/// `BEGIN TRY ... END TRY BEGIN CATCH ... END CATCH`
#[must_use]
pub fn try_catch(
    try_body: impl IntoIterator<Item = SyntaxNode>,
    catch_body: impl IntoIterator<Item = SyntaxNode>,
) -> SyntaxNode {
    let catch = NodeBuilder::new(SyntaxKind::CatchBlock)
        .token("BEGIN CATCH")
        .children(catch_body)
        .token("END CATCH")
        .finish();
    NodeBuilder::new(SyntaxKind::TryCatch)
        .token("BEGIN TRY")
        .children(try_body)
        .token("END TRY")
        .child(catch)
        .finish()
}

/// Batch root around top-level nodes
#[must_use]
pub fn script(items: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    NodeBuilder::new(SyntaxKind::Root).children(items).finish()
}

/// Every enter/exit event of `root` in walk order
#[must_use]
pub fn events(root: &SyntaxNode) -> Vec<SyntaxEvent<'_>> {
    struct Recorder<'node> {
        events: Vec<SyntaxEvent<'node>>,
    }

    fn record<'node>(recorder: &mut Recorder<'node>, node: &'node SyntaxNode) {
        recorder.events.push(SyntaxEvent::Enter(node));
        for child in &node.children {
            record(recorder, child);
        }
        recorder.events.push(SyntaxEvent::Exit(node));
    }

    let mut recorder = Recorder { events: Vec::new() };
    record(&mut recorder, root);
    recorder.events
}

/// The only procedure of `output`
///
/// # Panics
///
/// Panics unless exactly one procedure was emitted
#[must_use]
pub fn single_procedure(output: &LoweringOutput) -> &ProcedureAst {
    let procedures: Vec<_> = output.procedures().collect();
    assert_eq!(procedures.len(), 1, "expected one procedure, got {:?}", output.ast);
    procedures[0]
}
