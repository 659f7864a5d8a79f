//! Syntax-tree contract between an external T-SQL grammar and the lowering engine
//!
//! The grammar itself lives outside this workspace. An adapter converts its
//! concrete syntax tree into [`SyntaxNode`]s, and [`walk`] replays that tree
//! as the ordered enter/exit events a [`Listener`] consumes.

pub mod builder;
pub mod kind;
pub mod node;
pub mod walk;

pub use builder::NodeBuilder;
pub use kind::SyntaxKind;
pub use node::SyntaxNode;
pub use walk::{Listener, SyntaxEvent, walk};
