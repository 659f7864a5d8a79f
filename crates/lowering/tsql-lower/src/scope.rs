//! Statement arena and the two scope stacks
//!
//! Statements under construction live in an arena and refer to their nested
//! sequences by [`ListId`]. The target stack says which sequence the next
//! statement goes to; the control stack remembers which IF, WHILE, TRY or
//! CATCH is open so ELSE and CATCH can find their sibling branch.

use la_arena::{Arena, Idx};
use tsql_ast::Statement;

/// Handle of a statement under construction
pub type StmtId = Idx<PendingStmt>;

/// Handle of a statement sequence under construction
pub type ListId = Idx<StmtList>;

/// Ordered statement handles
#[derive(Debug, Default)]
pub struct StmtList {
    items: Vec<StmtId>,
}

/// A statement whose nested sequences may still grow
#[derive(Debug)]
pub enum PendingStmt {
    /// Finished statement without nested sequences
    Leaf(Statement),
    /// IF with both branches
    If {
        /// Normalized condition
        condition: String,
        /// THEN sequence
        then_branch: ListId,
        /// ELSE sequence
        else_branch: ListId,
    },
    /// WHILE loop
    While {
        /// Normalized condition
        condition: String,
        /// Loop body
        body: ListId,
    },
    /// Fused cursor loop
    CursorLoop {
        /// Iterated cursor
        cursor_name: String,
        /// Loop condition
        condition: String,
        /// Fetch targets, reconciled at procedure exit
        fetch_into: Vec<String>,
        /// Loop body
        body: ListId,
    },
    /// BEGIN ... END
    Block {
        /// Block contents
        statements: ListId,
    },
    /// TRY body
    BeginTry {
        /// TRY contents
        body: ListId,
    },
    /// CATCH body
    BeginCatch {
        /// CATCH contents
        body: ListId,
    },
}

/// Storage for every statement of the procedure being lowered
#[derive(Debug, Default)]
pub struct StatementArena {
    statements: Arena<PendingStmt>,
    lists: Arena<StmtList>,
}

impl StatementArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty sequence
    pub fn new_list(&mut self) -> ListId {
        self.lists.alloc(StmtList::default())
    }

    /// Allocate a statement without placing it in a sequence
    pub fn alloc(&mut self, statement: PendingStmt) -> StmtId {
        self.statements.alloc(statement)
    }

    /// Append an allocated statement to `list`
    pub fn push(&mut self, list: ListId, statement: StmtId) {
        self.lists[list].items.push(statement);
    }

    /// Allocate a finished statement and append it to `list`
    pub fn push_leaf(&mut self, list: ListId, statement: Statement) -> StmtId {
        let id = self.alloc(PendingStmt::Leaf(statement));
        self.push(list, id);
        id
    }

    /// Handles in `list`, in order
    pub fn items(&self, list: ListId) -> &[StmtId] {
        &self.lists[list].items
    }

    /// Whether `list` directly holds a finished statement equal to `statement`
    pub fn contains_leaf(&self, list: ListId, statement: &Statement) -> bool {
        self.items(list)
            .iter()
            .any(|id| matches!(&self.statements[*id], PendingStmt::Leaf(leaf) if leaf == statement))
    }

    /// Statement behind `id`
    pub fn get(&self, id: StmtId) -> &PendingStmt {
        &self.statements[id]
    }

    /// Mutable statement behind `id`
    pub fn get_mut(&mut self, id: StmtId) -> &mut PendingStmt {
        &mut self.statements[id]
    }

    /// Owned statements of `list`, nested sequences included
    pub fn materialize_list(&self, list: ListId) -> Vec<Statement> {
        self.items(list)
            .iter()
            .map(|id| self.materialize(*id))
            .collect()
    }

    /// Owned statement for `id`
    pub fn materialize(&self, id: StmtId) -> Statement {
        match &self.statements[id] {
            PendingStmt::Leaf(statement) => statement.clone(),
            PendingStmt::If {
                condition,
                then_branch,
                else_branch,
            } => Statement::If {
                condition: condition.clone(),
                then_branch: self.materialize_list(*then_branch),
                else_branch: self.materialize_list(*else_branch),
            },
            PendingStmt::While { condition, body } => Statement::While {
                condition: condition.clone(),
                body: self.materialize_list(*body),
            },
            PendingStmt::CursorLoop {
                cursor_name,
                condition,
                fetch_into,
                body,
            } => Statement::CursorLoop {
                cursor_name: cursor_name.clone(),
                condition: condition.clone(),
                fetch_into: fetch_into.clone(),
                body: self.materialize_list(*body),
            },
            PendingStmt::Block { statements } => Statement::Block {
                statements: self.materialize_list(*statements),
            },
            PendingStmt::BeginTry { body } => Statement::BeginTry {
                body: self.materialize_list(*body),
            },
            PendingStmt::BeginCatch { body } => Statement::BeginCatch {
                body: self.materialize_list(*body),
            },
        }
    }
}

/// What pushed a target frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    /// Procedure body; never crossed implicitly
    Procedure,
    /// BEGIN ... END
    Block,
    /// IF branch
    Then,
    /// ELSE branch
    Else,
    /// WHILE body
    WhileBody,
    /// Fused cursor loop body
    LoopBody,
    /// TRY body
    TryBody,
    /// CATCH body
    CatchBody,
    /// A FETCH inside a fused loop body sending later statements back to it
    FetchRedirect,
}

/// Sequence receiving appended statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFrame {
    /// Receiving sequence
    pub list: ListId,
    /// Construct that pushed the frame
    pub tag: FrameTag,
}

/// Open control construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// IF, until its ELSE or exit
    If,
    /// WHILE
    While,
    /// Fused cursor loop
    CursorLoop,
    /// TRY, open until its CATCH
    Try,
    /// CATCH
    Catch,
}

/// One open control construct and its statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    /// Construct kind
    pub kind: ControlKind,
    /// Statement the construct lowers to
    pub node: StmtId,
    /// TRY only: the try body already received its COMMIT
    pub sealed: bool,
}

/// The target stack and the control stack
#[derive(Debug, Default)]
pub struct ScopeStack {
    targets: Vec<TargetFrame>,
    controls: Vec<ControlFrame>,
}

impl ScopeStack {
    /// Empty stacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Send following statements to `list`
    pub fn push_target(&mut self, list: ListId, tag: FrameTag) {
        self.targets.push(TargetFrame { list, tag });
    }

    /// Sequence the next statement goes to
    pub fn current_target(&self) -> Option<ListId> {
        self.targets.last().map(|frame| frame.list)
    }

    /// Innermost target frame
    #[cfg(test)]
    pub fn top_target(&self) -> Option<TargetFrame> {
        self.targets.last().copied()
    }

    /// Pop down to and including the nearest frame tagged with one of `tags`
    ///
    /// A procedure frame is only crossed when `tags` asks for it. Nothing is
    /// popped when no frame matches.
    pub fn pop_until(&mut self, tags: &[FrameTag]) -> Option<TargetFrame> {
        let position = self.targets.iter().rposition(|frame| {
            tags.contains(&frame.tag) || frame.tag == FrameTag::Procedure
        })?;
        let frame = self.targets[position];
        if !tags.contains(&frame.tag) {
            return None;
        }
        self.targets.truncate(position);
        Some(frame)
    }

    /// Open a control construct
    pub fn push_control(&mut self, kind: ControlKind, node: StmtId) {
        self.controls.push(ControlFrame {
            kind,
            node,
            sealed: false,
        });
    }

    /// Innermost open control
    pub fn top_control(&self) -> Option<ControlFrame> {
        self.controls.last().copied()
    }

    /// Mark the innermost open TRY as sealed
    pub fn seal_try(&mut self) -> bool {
        match self.controls.last_mut() {
            Some(frame) if frame.kind == ControlKind::Try => {
                frame.sealed = true;
                true
            }
            _ => false,
        }
    }

    /// Pop down to and including the nearest control of one of `kinds`
    pub fn pop_control(&mut self, kinds: &[ControlKind]) -> Option<ControlFrame> {
        let position = self
            .controls
            .iter()
            .rposition(|frame| kinds.contains(&frame.kind))?;
        let frame = self.controls[position];
        self.controls.truncate(position);
        Some(frame)
    }

    /// Whether a control of `kind` is open anywhere on the stack
    pub fn has_control(&self, kind: ControlKind) -> bool {
        self.controls.iter().any(|frame| frame.kind == kind)
    }

    /// Number of target frames
    #[cfg(test)]
    pub fn target_depth(&self) -> usize {
        self.targets.len()
    }

    /// Drop every frame
    pub fn clear(&mut self) {
        self.targets.clear();
        self.controls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_until_stops_at_procedure() {
        let mut arena = StatementArena::new();
        let root = arena.new_list();
        let block = arena.new_list();
        let mut stack = ScopeStack::new();
        stack.push_target(root, FrameTag::Procedure);
        stack.push_target(block, FrameTag::Block);

        assert!(stack.pop_until(&[FrameTag::Then]).is_none());
        assert_eq!(stack.target_depth(), 2);

        let popped = stack.pop_until(&[FrameTag::Block]);
        assert_eq!(popped.map(|frame| frame.list), Some(block));
        assert_eq!(stack.current_target(), Some(root));

        assert!(stack.pop_until(&[FrameTag::Block]).is_none());
        assert!(stack.pop_until(&[FrameTag::Procedure]).is_some());
        assert_eq!(stack.current_target(), None);
    }

    #[test]
    fn test_pop_until_drops_frames_above_the_match() {
        let mut arena = StatementArena::new();
        let lists: Vec<_> = (0..3).map(|_| arena.new_list()).collect();
        let mut stack = ScopeStack::new();
        stack.push_target(lists[0], FrameTag::LoopBody);
        stack.push_target(lists[1], FrameTag::Block);
        stack.push_target(lists[2], FrameTag::FetchRedirect);

        stack.pop_until(&[FrameTag::Block]);
        assert_eq!(stack.top_target().map(|frame| frame.tag), Some(FrameTag::LoopBody));
    }

    #[test]
    fn test_materialize_nested() {
        let mut arena = StatementArena::new();
        let root = arena.new_list();
        let then_branch = arena.new_list();
        let else_branch = arena.new_list();
        let if_id = arena.alloc(PendingStmt::If {
            condition: "@a = 1".to_string(),
            then_branch,
            else_branch,
        });
        arena.push(root, if_id);
        arena.push_leaf(then_branch, Statement::Commit);
        arena.push_leaf(else_branch, Statement::Rollback);

        assert!(arena.contains_leaf(then_branch, &Statement::Commit));
        assert!(!arena.contains_leaf(root, &Statement::Commit));
        assert_eq!(
            arena.materialize_list(root),
            [Statement::If {
                condition: "@a = 1".to_string(),
                then_branch: vec![Statement::Commit],
                else_branch: vec![Statement::Rollback],
            }]
        );
    }

    #[test]
    fn test_control_stack() {
        let mut arena = StatementArena::new();
        let list = arena.new_list();
        let node = arena.push_leaf(list, Statement::Commit);
        let mut stack = ScopeStack::new();
        stack.push_control(ControlKind::Try, node);
        assert!(stack.seal_try());
        assert_eq!(stack.top_control().map(|frame| frame.sealed), Some(true));

        stack.push_control(ControlKind::If, node);
        assert!(!stack.seal_try());
        assert!(stack.pop_control(&[ControlKind::Catch]).is_none());
        assert!(stack.has_control(ControlKind::Try));
        assert_eq!(
            stack.pop_control(&[ControlKind::Try]).map(|frame| frame.kind),
            Some(ControlKind::Try)
        );
        assert!(stack.top_control().is_none());
        assert!(!stack.has_control(ControlKind::If));
    }
}
