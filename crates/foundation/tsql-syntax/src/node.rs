//! Syntax nodes and the capability-query accessors over them

use crate::SyntaxKind;
use serde::{Deserialize, Serialize};
use tsql_span::Span;

/// Generic syntax tree node
///
/// `text` is the raw source covered by `span`. Adapters that only know
/// offsets can leave it empty and call [`SyntaxNode::fill_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    /// The kind of this node
    pub kind: SyntaxKind,
    /// Source location
    pub span: Span,
    /// Raw source text of the node
    #[serde(default)]
    pub text: String,
    /// Child nodes in source order
    #[serde(default)]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// A node without children whose span starts at offset 0
    #[must_use]
    pub fn leaf(kind: SyntaxKind, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            span: Span::at(0, text.len()),
            text,
            children: Vec::new(),
        }
    }

    /// First direct child of the given kind
    ///
    /// Grammar variants differ in which sub-rules they expose, so every
    /// accessor is optional and callers fall back to the raw text.
    #[must_use]
    pub fn accessor(&self, kind: &SyntaxKind) -> Option<&Self> {
        self.children.iter().find(|child| child.kind == *kind)
    }

    /// All direct children of the given kind
    pub fn accessors<'node>(&'node self, kind: &'node SyntaxKind) -> impl Iterator<Item = &'node Self> {
        self.children.iter().filter(move |child| child.kind == *kind)
    }

    /// Trimmed text of the first accessor of the given kind, if non-empty
    #[must_use]
    pub fn accessor_text(&self, kind: &SyntaxKind) -> Option<&str> {
        self.accessor(kind)
            .map(|child| child.text.trim())
            .filter(|text| !text.is_empty())
    }

    /// Whether the node exposes an accessor of the given kind
    #[must_use]
    pub fn has_accessor(&self, kind: &SyntaxKind) -> bool {
        self.accessor(kind).is_some()
    }

    /// Fill every empty `text` from `source` using the node spans
    ///
    /// Spans that do not fit the source leave the text empty.
    pub fn fill_text(&mut self, source: &str) {
        if self.text.is_empty() {
            if let Some(text) = self.span.slice(source) {
                self.text = text.to_string();
            }
        }
        for child in &mut self.children {
            child.fill_text(source);
        }
    }

    /// Shift this node and all descendants `by` bytes to the right
    pub fn shift(&mut self, by: u32) {
        self.span = self.span.shifted(by);
        for child in &mut self.children {
            child.shift(by);
        }
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_node() -> SyntaxNode {
        SyntaxNode {
            kind: SyntaxKind::FetchCursor,
            span: Span::new(0, 33),
            text: String::new(),
            children: vec![
                SyntaxNode {
                    kind: SyntaxKind::CursorName,
                    span: Span::new(16, 19),
                    text: String::new(),
                    children: vec![],
                },
                SyntaxNode {
                    kind: SyntaxKind::LocalId,
                    span: Span::new(25, 28),
                    text: String::new(),
                    children: vec![],
                },
                SyntaxNode {
                    kind: SyntaxKind::LocalId,
                    span: Span::new(30, 33),
                    text: String::new(),
                    children: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_fill_text_from_spans() {
        let source = "FETCH NEXT FROM cur INTO @a, @b";
        let mut node = fetch_node();
        node.span = Span::new(0, 31);
        node.children[1].span = Span::new(25, 27);
        node.children[2].span = Span::new(29, 31);
        node.fill_text(source);

        assert_eq!(node.text, source);
        assert_eq!(node.accessor_text(&SyntaxKind::CursorName), Some("cur"));
        let targets: Vec<_> = node
            .accessors(&SyntaxKind::LocalId)
            .map(|child| child.text.as_str())
            .collect();
        assert_eq!(targets, ["@a", "@b"]);
    }

    #[test]
    fn test_missing_accessor_is_none() {
        let node = SyntaxNode::leaf(SyntaxKind::OpenCursor, "OPEN cur");
        assert!(node.accessor(&SyntaxKind::CursorName).is_none());
        assert!(!node.has_accessor(&SyntaxKind::CursorName));
        assert_eq!(node.node_count(), 1);
    }

    #[test]
    fn test_out_of_range_span_leaves_text_empty() {
        let mut node = fetch_node();
        node.fill_text("FETCH");
        assert!(node.text.is_empty());
    }

    #[test]
    fn test_deserialize_adapter_json() {
        let json = r#"{
            "kind": "fetch_cursor_statement",
            "span": { "start": 0, "end": 8 },
            "children": [
                { "kind": "cursor_name", "span": { "start": 6, "end": 8 } }
            ]
        }"#;
        let mut node: SyntaxNode = serde_json::from_str(json).expect("valid node json");
        node.fill_text("FETCH c1");

        assert_eq!(node.kind, SyntaxKind::FetchCursor);
        assert_eq!(node.accessor_text(&SyntaxKind::CursorName), Some("c1"));
    }
}
