use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::corpus::{Corpus, CorpusConfig, Sampler};
use crate::emit::emit_node;
use crate::error::CorpusError;
use crate::session::Session;
use crate::tree::{AssignOp, Literal, LogicalOp, Node, NodeId, Program, UnaryOp, UpdateOp};

pub type RNG = StdRng;

/// A Mutator rewrites a value in place and reports how many changes it made.
pub trait Mutator<T> {
    fn mutate(&mut self, obj: &mut T) -> usize;
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Structural replacements allowed per pass.
    pub max_mutations: usize,
    /// Chance that an eligible node is replaced.
    pub p_replace: f64,
    /// Chance that an operator expression gets a new operator.
    pub p_operator: f64,
    /// Chance that a numeric literal gets an edge-case value.
    pub p_literal: f64,
    /// Fixed seed for reproducible runs; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub corpus: CorpusConfig,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_mutations: 5,
            p_replace: 0.05,
            p_operator: 0.25,
            p_literal: 0.25,
            seed: None,
            corpus: CorpusConfig::default(),
        }
    }
}

impl MutationConfig {
    pub fn rng(&self) -> RNG {
        match self.seed {
            Some(seed) => RNG::seed_from_u64(seed),
            None => RNG::from_os_rng(),
        }
    }
}

fn chance(rng: &mut RNG, p: f64) -> bool {
    rng.random_bool(p.clamp(0.0, 1.0))
}

enum Visit {
    Enter { id: NodeId, replaceable: bool },
    Leave(NodeId),
}

/// Replaces randomly chosen subtrees with same-kind subtrees drawn from a
/// sampler, repairing references and importing missing declarations.
pub struct StructuralMutator<S: Sampler> {
    rng: RNG,
    sampler: S,
    max_mutations: usize,
    p_replace: f64,
}

impl<S: Sampler> StructuralMutator<S> {
    pub fn new(sampler: S, config: &MutationConfig, rng: RNG) -> Self {
        Self {
            rng,
            sampler,
            max_mutations: config.max_mutations,
            p_replace: config.p_replace,
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    fn try_replace(&mut self, session: &mut Session, program: &mut Program, id: NodeId) {
        let kind = program[id].kind();
        let context = session.context();
        let Some(sample) = self.sampler.sample(kind, context, &mut self.rng) else {
            debug!(?kind, "no replacement available, skipping site");
            return;
        };
        let copy = program.copy_subtree(&sample.tree.program, sample.node);
        session.prepare_for_insertion(program, copy, &sample.tree, &mut self.rng);
        trace!(replacement = %emit_node(program, copy), "splicing");
        program.replace(id, copy);
        session.record_mutation();
        debug!(
            ?kind,
            from = %sample.tree.path.display(),
            count = session.mutations(),
            "replaced subtree"
        );
    }
}

impl<S: Sampler> Mutator<Program> for StructuralMutator<S> {
    fn mutate(&mut self, program: &mut Program) -> usize {
        let mut session = Session::new(program, self.max_mutations);
        let mut stack = vec![Visit::Enter {
            id: program.root,
            replaceable: false,
        }];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter { id, replaceable } => {
                    let site = replaceable && program[id].kind().is_mutation_site();
                    if site && session.has_budget() && chance(&mut self.rng, self.p_replace) {
                        self.try_replace(&mut session, program, id);
                    }

                    session.enter(program, id);
                    stack.push(Visit::Leave(id));
                    // The declaration heading a for-in/of loop has a shape no
                    // other declaration is guaranteed to share.
                    let fixed = match &program[id] {
                        Node::ForIn { left, .. } | Node::ForOf { left, .. } => Some(*left),
                        _ => None,
                    };
                    for child in program[id].children().into_iter().rev() {
                        stack.push(Visit::Enter {
                            id: child,
                            replaceable: Some(child) != fixed,
                        });
                    }
                }
                Visit::Leave(id) => session.leave(program, id),
            }
        }

        let imported = session.flush_imports(program, &mut self.rng);
        debug!(
            mutations = session.mutations(),
            imported, "structural pass finished"
        );
        session.mutations()
    }
}

/// Swaps operators for others of the same class.
pub struct OperatorMutator {
    rng: RNG,
    p: f64,
}

impl OperatorMutator {
    pub fn new(p: f64, rng: RNG) -> Self {
        Self { rng, p }
    }
}

impl Mutator<Program> for OperatorMutator {
    fn mutate(&mut self, program: &mut Program) -> usize {
        let mut changed = 0;
        for id in program.preorder(program.root) {
            let rng = &mut self.rng;
            let p = self.p;
            let swapped = match &mut program[id] {
                Node::Binary { op, .. } if chance(rng, p) => {
                    let class = op.class();
                    pick(rng, op, class)
                }
                Node::Logical { op, .. } if chance(rng, p) => pick(rng, op, &LogicalOp::ALL),
                Node::Assign { op, .. } if chance(rng, p) => pick(rng, op, &AssignOp::ALL),
                Node::Unary { op, .. } if !op.is_keyword() && chance(rng, p) => {
                    pick(rng, op, &UnaryOp::SYMBOLIC)
                }
                Node::Update { op, .. } if chance(rng, p) => pick(rng, op, &UpdateOp::ALL),
                _ => false,
            };
            if swapped {
                changed += 1;
            }
        }
        trace!(changed, "operator pass finished");
        changed
    }
}

/// Overwrite `op` with a member of `choices`. True if it was touched.
fn pick<T: Copy>(rng: &mut RNG, op: &mut T, choices: &[T]) -> bool {
    match choices.choose(rng) {
        Some(new) => {
            *op = *new;
            true
        }
        None => false,
    }
}

/// Boundary and oddly spelled numbers, kept as source text.
pub const EDGE_NUMBERS: &[&str] = &[
    "0",
    "1",
    "1.00",
    "0.5",
    "1E2",
    "1E02",
    "1E+02",
    "+0",
    "+0.0",
    "0.00",
    "999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999999",
    "0x0",
    "0xffffffff",
    "0xffffffffffffffff",
    "0xabad1dea",
    "123456789012345678901234567890123456789",
    "1000.00",
    "1000000.00",
    "100000.000",
    "100000000",
    "01000",
    "08",
    "09",
    "2.2250738585072011e-308",
];

/// Replaces numeric literals with edge-case values.
pub struct LiteralMutator {
    rng: RNG,
    p: f64,
}

impl LiteralMutator {
    pub fn new(p: f64, rng: RNG) -> Self {
        Self { rng, p }
    }
}

impl Mutator<Program> for LiteralMutator {
    fn mutate(&mut self, program: &mut Program) -> usize {
        let mut changed = 0;
        for id in program.preorder(program.root) {
            let Node::Literal(Literal::Number(raw)) = &mut program[id] else {
                continue;
            };
            if !chance(&mut self.rng, self.p) {
                continue;
            }
            if let Some(edge) = EDGE_NUMBERS.choose(&mut self.rng) {
                *raw = edge.to_string();
                changed += 1;
            }
        }
        trace!(changed, "literal pass finished");
        changed
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    Operators,
    Literals,
    Structural,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Operators, Strategy::Literals, Strategy::Structural];
}

/// Applies exactly one of the three strategies per invocation.
pub struct ProgramMutator<S: Sampler = Corpus> {
    rng: RNG,
    operators: OperatorMutator,
    literals: LiteralMutator,
    structural: StructuralMutator<S>,
}

impl ProgramMutator<Corpus> {
    /// Build a mutator over the corpus named in `config`.
    pub fn from_config(config: &MutationConfig) -> Result<Self, CorpusError> {
        let corpus = Corpus::from_config(&config.corpus)?;
        Ok(Self::new(corpus, config))
    }
}

impl<S: Sampler> ProgramMutator<S> {
    pub fn new(sampler: S, config: &MutationConfig) -> Self {
        let mut rng = config.rng();
        Self {
            operators: OperatorMutator::new(config.p_operator, RNG::from_rng(&mut rng)),
            literals: LiteralMutator::new(config.p_literal, RNG::from_rng(&mut rng)),
            structural: StructuralMutator::new(sampler, config, RNG::from_rng(&mut rng)),
            rng,
        }
    }

    pub fn sampler(&self) -> &S {
        self.structural.sampler()
    }

    pub fn mutate_with(&mut self, strategy: Strategy, program: &mut Program) -> usize {
        let changed = match strategy {
            Strategy::Operators => self.operators.mutate(program),
            Strategy::Literals => self.literals.mutate(program),
            Strategy::Structural => self.structural.mutate(program),
        };
        debug!(?strategy, changed, "mutated program");
        changed
    }

    pub fn pick_strategy(&mut self) -> Strategy {
        let index = self.rng.random_range(0..Strategy::ALL.len());
        Strategy::ALL[index]
    }
}

impl<S: Sampler> Mutator<Program> for ProgramMutator<S> {
    fn mutate(&mut self, program: &mut Program) -> usize {
        let strategy = self.pick_strategy();
        self.mutate_with(strategy, program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Sample;
    use crate::emit::Emit;
    use crate::legality::Context;
    use crate::parser::parse;
    use crate::tree::{BinaryOp, NodeKind};

    struct Nothing;

    impl Sampler for Nothing {
        fn sample(&mut self, _: NodeKind, _: Context, _: &mut RNG) -> Option<Sample> {
            None
        }
    }

    fn seeded(seed: u64) -> RNG {
        RNG::seed_from_u64(seed)
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: MutationConfig = toml::from_str("max_mutations = 2\n[corpus]\np_pool = 0.9\n")
            .expect("config should deserialize");
        assert_eq!(config.max_mutations, 2);
        assert_eq!(config.p_replace, 0.05);
        assert_eq!(config.corpus.p_pool, 0.9);
        assert_eq!(config.corpus.max_attempts, 64);
    }

    #[test]
    fn operators_stay_in_class() {
        let mut program = parse("a = b + c; d = e < f; g = h && i; j = ~k; l++;")
            .expect("parsing should succeed");
        let mut mutator = OperatorMutator::new(1.0, seeded(1));
        assert_eq!(mutator.mutate(&mut program), 9);
        let binaries: Vec<BinaryOp> = program
            .preorder(program.root)
            .into_iter()
            .filter_map(|id| match program[id] {
                Node::Binary { op, .. } => Some(op),
                _ => None,
            })
            .collect();
        assert_eq!(binaries.len(), 2);
        assert!(BinaryOp::ARITHMETIC.contains(&binaries[0]));
        assert!(BinaryOp::COMPARISON.contains(&binaries[1]));
        assert!(parse(&program.emit()).is_ok());
    }

    #[test]
    fn keyword_unary_is_left_alone() {
        let mut program = parse("typeof x; void 0;").expect("parsing should succeed");
        let mut mutator = OperatorMutator::new(1.0, seeded(2));
        assert_eq!(mutator.mutate(&mut program), 0);
        assert_eq!(program.emit(), "typeof x;\nvoid 0;\n");
    }

    #[test]
    fn literal_gate_never_and_always() {
        let mut program = parse("x = 5 + 'five';").expect("parsing should succeed");
        let mut never = LiteralMutator::new(0.0, seeded(3));
        assert_eq!(never.mutate(&mut program), 0);
        assert_eq!(program.emit(), "x = 5 + 'five';\n");

        let mut always = LiteralMutator::new(1.0, seeded(3));
        assert_eq!(always.mutate(&mut program), 1);
        let out = program.emit();
        assert!(out.contains("'five'"), "strings are not touched");
        assert!(parse(&out).is_ok());
    }

    #[test]
    fn structural_without_candidates_changes_nothing() {
        let source = "while (x) {\n  if (y) {\n    break;\n  }\n}\n";
        let mut program = parse(source).expect("parsing should succeed");
        let config = MutationConfig {
            p_replace: 1.0,
            ..MutationConfig::default()
        };
        let mut mutator = StructuralMutator::new(Nothing, &config, seeded(4));
        assert_eq!(mutator.mutate(&mut program), 0);
        assert_eq!(program.emit(), source);
    }

    #[test]
    fn strategy_choice_is_uniformish() {
        let mut mutator = ProgramMutator::new(
            Nothing,
            &MutationConfig {
                seed: Some(5),
                ..MutationConfig::default()
            },
        );
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let strategy = mutator.pick_strategy();
            let index = Strategy::ALL
                .iter()
                .position(|s| *s == strategy)
                .expect("strategy is listed");
            seen[index] += 1;
        }
        assert!(seen.iter().all(|n| *n > 50), "{seen:?}");
    }
}
