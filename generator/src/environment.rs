use std::collections::HashSet;

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::symbol::Symbol;

/// Identity of an enclosing function, reported in traces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FunctionIdentity {
    Named(Symbol),
    Anonymous,
}

/// Names visible at the current point of a traversal, in three layers:
/// globals, the innermost function's locals, and names declared inside a
/// subtree that is currently being repaired.
#[derive(Debug, Default)]
pub struct Environment {
    global: HashSet<Symbol>,
    function: HashSet<Symbol>,
    borrowed: HashSet<Symbol>,
    saved: Vec<HashSet<Symbol>>,
    functions: Vec<FunctionIdentity>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_function(&self) -> bool {
        !self.functions.is_empty()
    }

    pub fn function_depth(&self) -> usize {
        self.functions.len()
    }

    pub fn current_function(&self) -> Option<FunctionIdentity> {
        self.functions.last().copied()
    }

    /// Record names declared at the current point: into the function layer
    /// inside a function, the global layer otherwise.
    pub fn declare(&mut self, names: impl IntoIterator<Item = Symbol>) {
        if self.in_function() {
            self.function.extend(names);
        } else {
            self.global.extend(names);
        }
    }

    pub fn declare_borrowed(&mut self, names: impl IntoIterator<Item = Symbol>) {
        self.borrowed.extend(names);
    }

    pub fn clear_borrowed(&mut self) {
        self.borrowed.clear();
    }

    /// Start a function body. Its local layer begins with the enclosing
    /// function's locals, which stay visible from a nested function.
    pub fn enter_function(&mut self, identity: FunctionIdentity) {
        self.saved.push(self.function.clone());
        self.functions.push(identity);
    }

    /// Leave a function body, restoring the enclosing local layer.
    pub fn exit_function(&mut self) {
        self.function = self.saved.pop().unwrap_or_default();
        self.functions.pop();
    }

    pub fn visible(&self, name: Symbol) -> bool {
        self.global.contains(&name) || self.function.contains(&name) || self.borrowed.contains(&name)
    }

    pub fn is_borrowed(&self, name: Symbol) -> bool {
        self.borrowed.contains(&name)
    }

    /// Every visible name, sorted so that a seeded RNG picks reproducibly.
    pub fn visible_names(&self) -> Vec<Symbol> {
        let mut names: Vec<Symbol> = self
            .global
            .union(&self.function)
            .copied()
            .chain(self.borrowed.iter().copied())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// A uniformly chosen visible name, or `None` when nothing is in scope.
    pub fn random_visible<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Symbol> {
        self.visible_names().choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn function_layer_is_restored_on_exit() {
        let mut st = SymbolTable::new();
        let (g, local, nested) = (st.to_sym("g"), st.to_sym("local"), st.to_sym("nested"));
        let mut env = Environment::new();

        env.declare([g]);
        env.enter_function(FunctionIdentity::Anonymous);
        env.declare([local]);
        env.enter_function(FunctionIdentity::Named(nested));
        env.declare([nested]);
        assert!(env.visible(local), "enclosing locals stay visible");
        assert_eq!(env.function_depth(), 2);

        env.exit_function();
        assert!(env.visible(local));
        assert!(!env.visible(nested));

        env.exit_function();
        assert!(!env.in_function());
        assert!(!env.visible(local));
        assert!(env.visible(g));
    }

    #[test]
    fn borrowed_layer_is_discarded() {
        let mut st = SymbolTable::new();
        let tmp = st.to_sym("tmp");
        let mut env = Environment::new();
        env.declare_borrowed([tmp]);
        assert!(env.visible(tmp));
        env.clear_borrowed();
        assert!(!env.visible(tmp));
    }

    #[test]
    fn random_visible_draws_from_all_layers() {
        let mut st = SymbolTable::new();
        let (a, b) = (st.to_sym("a"), st.to_sym("b"));
        let mut env = Environment::new();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(env.random_visible(&mut rng), None);

        env.declare([a]);
        env.declare_borrowed([b]);
        for _ in 0..32 {
            let picked = env.random_visible(&mut rng).expect("names are visible");
            assert!(picked == a || picked == b);
        }
        assert_eq!(env.visible_names(), vec![a, b]);
    }
}
