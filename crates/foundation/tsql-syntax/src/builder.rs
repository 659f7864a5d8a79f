//! Programmatic construction of syntax trees
//!
//! Adapters and tests assemble nodes piece by piece; the builder joins the
//! pieces with single spaces and keeps every child span pointing at its own
//! text inside the parent.

use crate::{SyntaxKind, SyntaxNode};
use tsql_span::Span;

enum Piece {
    Token(String),
    Child(SyntaxNode),
}

/// Builds one [`SyntaxNode`] from tokens and child nodes
pub struct NodeBuilder {
    kind: SyntaxKind,
    pieces: Vec<Piece>,
}

impl NodeBuilder {
    /// Start an empty node of `kind`
    #[must_use]
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            pieces: Vec::new(),
        }
    }

    /// Append raw text that belongs to this node only
    #[must_use]
    pub fn token(mut self, text: impl Into<String>) -> Self {
        self.pieces.push(Piece::Token(text.into()));
        self
    }

    /// Append a finished child node
    #[must_use]
    pub fn child(mut self, node: SyntaxNode) -> Self {
        self.pieces.push(Piece::Child(node));
        self
    }

    /// Append every node of `nodes` as a child
    #[must_use]
    pub fn children(mut self, nodes: impl IntoIterator<Item = SyntaxNode>) -> Self {
        self.pieces.extend(nodes.into_iter().map(Piece::Child));
        self
    }

    /// Assemble the node; its span starts at offset 0
    #[must_use]
    pub fn finish(self) -> SyntaxNode {
        let mut text = String::new();
        let mut children = Vec::new();

        for piece in self.pieces {
            if !text.is_empty() {
                text.push(' ');
            }
            let offset = u32::try_from(text.len()).unwrap_or(u32::MAX);
            match piece {
                Piece::Token(token) => text.push_str(&token),
                Piece::Child(mut child) => {
                    text.push_str(&child.text);
                    child.shift(offset.saturating_sub(child.span.start));
                    children.push(child);
                }
            }
        }

        SyntaxNode {
            kind: self.kind,
            span: Span::at(0, text.len()),
            text,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_joins_with_single_spaces() {
        let node = NodeBuilder::new(SyntaxKind::OpenCursor)
            .token("OPEN")
            .child(SyntaxNode::leaf(SyntaxKind::CursorName, "emp_cursor"))
            .finish();

        assert_eq!(node.text, "OPEN emp_cursor");
        assert_eq!(node.span, Span::new(0, 15));
        assert_eq!(node.accessor_text(&SyntaxKind::CursorName), Some("emp_cursor"));
    }

    #[test]
    fn test_child_spans_point_into_parent_text() {
        let condition = NodeBuilder::new(SyntaxKind::SearchCondition)
            .token("@a")
            .token(">")
            .token("1")
            .finish();
        let node = NodeBuilder::new(SyntaxKind::IfStatement)
            .token("IF")
            .child(condition)
            .child(SyntaxNode::leaf(SyntaxKind::PrintStatement, "PRINT 'x'"))
            .finish();

        for child in &node.children {
            assert_eq!(child.span.slice(&node.text), Some(child.text.as_str()));
        }
        assert_eq!(node.text, "IF @a > 1 PRINT 'x'");
    }

    #[test]
    fn test_nested_children_shift_with_their_parent() {
        let inner = NodeBuilder::new(SyntaxKind::FetchCursor)
            .token("FETCH NEXT FROM")
            .child(SyntaxNode::leaf(SyntaxKind::CursorName, "c"))
            .finish();
        let block = NodeBuilder::new(SyntaxKind::BeginEndBlock)
            .token("BEGIN")
            .child(inner)
            .token("END")
            .finish();

        let fetch = &block.children[0];
        let cursor = &fetch.children[0];
        assert_eq!(cursor.span.slice(&block.text), Some("c"));
    }
}
