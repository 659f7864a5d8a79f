//! Faults recorded while lowering
//!
//! A fault never stops lowering. Handlers return them, the dispatcher logs
//! them and keeps them in the run's fault log, and the CLI renders them
//! against the source text.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use tsql_syntax::SyntaxNode;

/// Result of one statement handler
pub type LowerResult<T> = Result<T, LowerFault>;

/// Something the engine had to paper over
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum LowerFault {
    /// A fact could not be extracted; a placeholder was emitted
    #[error("could not determine the {fact} of `{kind}`")]
    #[diagnostic(
        code(lower::missing_fact),
        help("the statement was kept with a placeholder value")
    )]
    MissingFact {
        /// What was being looked for
        fact: &'static str,
        /// Rule kind of the node
        kind: String,
        /// Node location
        #[label("{fact} not found here")]
        span: SourceSpan,
    },

    /// An exit event had no open scope to close
    #[error("exit of `{kind}` has no matching open scope")]
    #[diagnostic(code(lower::unbalanced_exit), help("the event was ignored"))]
    UnbalancedExit {
        /// Rule kind of the node
        kind: String,
        /// Node location
        #[label("nothing to close")]
        span: SourceSpan,
    },

    /// The node cannot be lowered at all
    #[error("cannot lower `{kind}`: {reason}")]
    #[diagnostic(code(lower::malformed_node), help("the statement was skipped"))]
    MalformedNode {
        /// Rule kind of the node
        kind: String,
        /// Why it was skipped
        reason: String,
        /// Node location
        #[label("skipped")]
        span: SourceSpan,
    },

    /// The event stream ended inside a procedure
    #[error("procedure `{name}` was never closed")]
    #[diagnostic(
        code(lower::unclosed_procedure),
        help("the statements seen so far were kept")
    )]
    UnclosedProcedure {
        /// Procedure name
        name: String,
        /// Procedure location
        #[label("opened here")]
        span: SourceSpan,
    },
}

impl LowerFault {
    pub(crate) fn missing(fact: &'static str, node: &SyntaxNode) -> Self {
        Self::MissingFact {
            fact,
            kind: node.kind.to_string(),
            span: node.span.into(),
        }
    }

    pub(crate) fn unbalanced(node: &SyntaxNode) -> Self {
        Self::UnbalancedExit {
            kind: node.kind.to_string(),
            span: node.span.into(),
        }
    }

    pub(crate) fn malformed(node: &SyntaxNode, reason: impl Into<String>) -> Self {
        Self::MalformedNode {
            kind: node.kind.to_string(),
            reason: reason.into(),
            span: node.span.into(),
        }
    }

    /// Location of the offending node
    #[must_use]
    pub fn span(&self) -> SourceSpan {
        match self {
            Self::MissingFact { span, .. }
            | Self::UnbalancedExit { span, .. }
            | Self::MalformedNode { span, .. }
            | Self::UnclosedProcedure { span, .. } => *span,
        }
    }

    /// Stable diagnostic code
    #[must_use]
    pub fn code_name(&self) -> &'static str {
        match self {
            Self::MissingFact { .. } => "lower::missing_fact",
            Self::UnbalancedExit { .. } => "lower::unbalanced_exit",
            Self::MalformedNode { .. } => "lower::malformed_node",
            Self::UnclosedProcedure { .. } => "lower::unclosed_procedure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsql_syntax::SyntaxKind;

    #[test]
    fn test_fault_messages() {
        let node = SyntaxNode::leaf(SyntaxKind::InsertStatement, "INSERT");
        let fault = LowerFault::missing("target table", &node);
        assert_eq!(
            fault.to_string(),
            "could not determine the target table of `insert_statement`"
        );
        assert_eq!(fault.span(), SourceSpan::from((0, 6)));
        assert_eq!(fault.code_name(), "lower::missing_fact");

        let code = fault.code().map(|code| code.to_string());
        assert_eq!(code.as_deref(), Some("lower::missing_fact"));
    }

    #[test]
    fn test_unbalanced_exit_message() {
        let node = SyntaxNode::leaf(SyntaxKind::CatchBlock, "BEGIN CATCH END CATCH");
        let fault = LowerFault::unbalanced(&node);
        assert_eq!(
            fault.to_string(),
            "exit of `catch_block` has no matching open scope"
        );
    }
}
