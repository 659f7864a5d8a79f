//! Depth-first event replay over a syntax tree

use crate::SyntaxNode;

/// One enter or exit callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxEvent<'node> {
    /// The walker reached a node
    Enter(&'node SyntaxNode),
    /// The walker left a node after all its children
    Exit(&'node SyntaxNode),
}

impl<'node> SyntaxEvent<'node> {
    /// Node the event refers to
    #[must_use]
    pub fn node(&self) -> &'node SyntaxNode {
        match self {
            Self::Enter(node) | Self::Exit(node) => node,
        }
    }
}

/// Consumer of enter/exit events
pub trait Listener {
    /// Called before any child of `node` is visited
    fn enter(&mut self, node: &SyntaxNode);

    /// Called after every child of `node` was visited
    fn exit(&mut self, node: &SyntaxNode);

    /// Dispatch a single event
    fn handle(&mut self, event: SyntaxEvent<'_>) {
        match event {
            SyntaxEvent::Enter(node) => self.enter(node),
            SyntaxEvent::Exit(node) => self.exit(node),
        }
    }
}

/// Replay `root` depth-first, in source order
pub fn walk<L: Listener + ?Sized>(listener: &mut L, root: &SyntaxNode) {
    listener.enter(root);
    for child in &root.children {
        walk(listener, child);
    }
    listener.exit(root);
}
