use std::collections::HashMap;

use crate::symbol::Symbol;
use crate::tree::{Node, NodeId, Program};

/// Names introduced by a single node, in the sense of "which bindings does
/// this node create": declarators, a function's own name and parameters, a
/// class name, a catch parameter.
pub fn declared_names(program: &Program, id: NodeId) -> Vec<Symbol> {
    match &program[id] {
        Node::VarDecl { declarators, .. } => declarators.iter().map(|d| d.name).collect(),
        Node::FunctionDecl(f) | Node::FunctionExpr(f) => {
            f.name.into_iter().chain(f.params.iter().copied()).collect()
        }
        Node::Arrow { params, .. } => params.clone(),
        Node::ClassDecl(c) => vec![c.name],
        Node::Try {
            handler: Some(handler),
            ..
        } => handler.param.into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Declaration facts about the reachable part of one tree.
#[derive(Debug, Default)]
pub struct ScopeAnalysis {
    declared: HashMap<NodeId, Vec<Symbol>>,
    functions: HashMap<Symbol, NodeId>,
    classes: HashMap<Symbol, NodeId>,
}

impl ScopeAnalysis {
    pub fn analyze(program: &Program) -> Self {
        let mut analysis = ScopeAnalysis::default();
        for id in program.preorder(program.root) {
            let names = declared_names(program, id);
            if !names.is_empty() {
                analysis.declared.insert(id, names);
            }
            // First declaration in source order wins, like a selector query.
            match &program[id] {
                Node::FunctionDecl(f) => {
                    if let Some(name) = f.name {
                        analysis.functions.entry(name).or_insert(id);
                    }
                }
                Node::ClassDecl(c) => {
                    analysis.classes.entry(c.name).or_insert(id);
                }
                _ => {}
            }
        }
        analysis
    }

    pub fn declared_by(&self, id: NodeId) -> &[Symbol] {
        self.declared.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn function_decl(&self, name: Symbol) -> Option<NodeId> {
        self.functions.get(&name).copied()
    }

    pub fn class_decl(&self, name: Symbol) -> Option<NodeId> {
        self.classes.get(&name).copied()
    }
}
