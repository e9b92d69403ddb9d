use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::analysis::ScopeAnalysis;
use crate::corpus::CorpusEntry;
use crate::environment::{Environment, FunctionIdentity};
use crate::legality::Context;
use crate::symbol::Symbol;
use crate::tree::{Node, NodeId, Program};

/// A declaration from a corpus tree waiting to be appended to the
/// destination's top level.
#[derive(Clone, Debug)]
pub struct PendingImport {
    /// Declaration node inside `source.program`.
    pub decl: NodeId,
    pub source: Rc<CorpusEntry>,
}

/// State of one structural rewrite pass over one destination tree.
pub struct Session {
    mutations: usize,
    max_mutations: usize,
    pub(crate) env: Environment,
    contexts: Vec<Context>,
    /// Keyed by the declared name, interned in the destination.
    pub(crate) pending: IndexMap<Symbol, PendingImport>,
    analysis: ScopeAnalysis,
    stale: bool,
}

impl Session {
    pub fn new(program: &Program, max_mutations: usize) -> Self {
        Self {
            mutations: 0,
            max_mutations,
            env: Environment::new(),
            contexts: Vec::new(),
            pending: IndexMap::new(),
            analysis: ScopeAnalysis::analyze(program),
            stale: false,
        }
    }

    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn has_budget(&self) -> bool {
        self.mutations < self.max_mutations
    }

    pub fn record_mutation(&mut self) {
        self.mutations += 1;
        self.stale = true;
    }

    /// The destination changed shape outside a counted mutation.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Scope analysis of the destination, recomputed if a splice happened
    /// since the last lookup.
    pub fn analysis(&mut self, program: &Program) -> &ScopeAnalysis {
        if self.stale {
            self.analysis = ScopeAnalysis::analyze(program);
            self.stale = false;
        }
        &self.analysis
    }

    /// Control context at the current traversal point.
    pub fn context(&self) -> Context {
        self.contexts.last().copied().unwrap_or_default()
    }

    pub fn pending_imports(&self) -> impl Iterator<Item = (&Symbol, &PendingImport)> {
        self.pending.iter()
    }

    /// Name of the innermost enclosing function, for traces.
    fn function_name<'p>(&self, program: &'p Program) -> &'p str {
        match self.env.current_function() {
            Some(FunctionIdentity::Named(name)) => program.from_sym(name),
            Some(FunctionIdentity::Anonymous) => "<anonymous>",
            None => "<top level>",
        }
    }

    /// Bookkeeping on entering `id`, after any replacement of it.
    pub fn enter(&mut self, program: &Program, id: NodeId) {
        let node = &program[id];
        let kind = node.kind();
        if kind.is_function() {
            let identity = match node {
                Node::FunctionDecl(f) | Node::FunctionExpr(f) => {
                    f.name.map_or(FunctionIdentity::Anonymous, FunctionIdentity::Named)
                }
                _ => FunctionIdentity::Anonymous,
            };
            self.env.enter_function(identity);
            trace!(
                function = self.function_name(program),
                depth = self.env.function_depth(),
                "entered function"
            );
        }

        // A function's own name and parameters are not tracked; inside a
        // function every other declaration is local.
        if !kind.is_function() {
            let names = self.analysis(program).declared_by(id).to_vec();
            self.env.declare(names);
        }

        let context = self.context().enter(kind);
        self.contexts.push(context);
    }

    pub fn leave(&mut self, program: &Program, id: NodeId) {
        if program[id].kind().is_function() {
            trace!(
                function = self.function_name(program),
                depth = self.env.function_depth(),
                "left function"
            );
            self.env.exit_function();
        }
        self.contexts.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tree::NodeKind;

    #[test]
    fn tracks_context_and_scope() {
        let program = parse("var g; while (a) { function f(p) { var local; } }")
            .expect("parsing should succeed");
        let mut session = Session::new(&program, 3);
        let sym = |name: &str| program.symbol_table.lookup(name).expect("interned");

        let order = program.preorder(program.root);
        let function = order
            .iter()
            .copied()
            .find(|id| program[*id].kind() == NodeKind::FunctionDecl)
            .expect("function in tree");

        // Enter everything up to and including the function body's
        // declaration, checking state on the way.
        for id in &order {
            session.enter(&program, *id);
            if *id == function {
                assert!(session.env.in_function());
                assert_eq!(
                    session.env.current_function(),
                    Some(FunctionIdentity::Named(sym("f")))
                );
                assert_eq!(session.function_name(&program), "f");
                assert!(!session.context().in_loop(), "function resets loops");
                assert!(session.context().in_function());
            }
        }
        assert!(session.env.visible(sym("g")));
        assert!(session.env.visible(sym("local")));
        assert!(!session.env.visible(sym("p")));

        for id in order.iter().rev() {
            session.leave(&program, *id);
        }
        assert!(!session.env.in_function());
        assert!(!session.env.visible(sym("local")));
        assert_eq!(session.context(), Context::default());
    }

    #[test]
    fn budget_counts_mutations() {
        let program = parse("x;").expect("parsing should succeed");
        let mut session = Session::new(&program, 1);
        assert!(session.has_budget());
        session.record_mutation();
        assert!(!session.has_budget());
        assert_eq!(session.mutations(), 1);
    }
}
