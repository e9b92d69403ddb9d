use crate::tree::{NodeId, NodeKind, Program};

/// Control context at a point in a tree. Loop and switch nesting are depth
/// counters; a function body starts over with neither.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    pub loops: usize,
    pub switches: usize,
    pub functions: usize,
}

impl Context {
    pub fn in_loop(&self) -> bool {
        self.loops > 0
    }

    pub fn in_switch(&self) -> bool {
        self.switches > 0
    }

    pub fn in_function(&self) -> bool {
        self.functions > 0
    }

    /// The context seen by the children of a node of `kind`.
    pub fn enter(self, kind: NodeKind) -> Context {
        if kind.is_function() {
            Context {
                loops: 0,
                switches: 0,
                functions: self.functions + 1,
            }
        } else if kind.is_loop() {
            Context {
                loops: self.loops + 1,
                ..self
            }
        } else if kind.is_switch() {
            Context {
                switches: self.switches + 1,
                ..self
            }
        } else {
            self
        }
    }

    /// Whether a control transfer of `kind` is legal directly in this context.
    /// `continue` is judged by loops alone, even inside a switch.
    pub fn permits(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Break => self.in_loop() || self.in_switch(),
            NodeKind::Continue => self.in_loop(),
            NodeKind::Return => self.in_function(),
            _ => true,
        }
    }
}

/// Whether the subtree at `id` may be placed where `context` holds.
/// Loops, switches and functions inside the candidate extend the context
/// for whatever they enclose.
pub fn admissible(program: &Program, id: NodeId, context: Context) -> bool {
    let mut stack = vec![(id, context)];
    while let Some((id, context)) = stack.pop() {
        let node = &program[id];
        let kind = node.kind();
        if !context.permits(kind) {
            return false;
        }
        let inner = context.enter(kind);
        stack.extend(node.children().into_iter().map(|child| (child, inner)));
    }
    true
}

/// Every node of `kind` under the root that is legal in its own position.
pub fn admissible_in_place(program: &Program, kind: NodeKind) -> Vec<(NodeId, Context)> {
    let mut found = Vec::new();
    let mut stack = vec![(program.root, Context::default())];
    while let Some((id, context)) = stack.pop() {
        let node = &program[id];
        let node_kind = node.kind();
        if node_kind == kind && admissible(program, id, context) {
            found.push((id, context));
        }
        let inner = context.enter(node_kind);
        for child in node.children().into_iter().rev() {
            stack.push((child, inner));
        }
    }
    found
}

/// Whether the whole program respects break/continue/return placement.
pub fn program_is_legal(program: &Program) -> bool {
    admissible(program, program.root, Context::default())
}
