mod analysis;
mod corpus;
mod emit;
mod environment;
mod error;
mod hygiene;
mod legality;
mod lexer;
mod mutator;
mod parser;
mod session;
mod symbol;
mod tree;

pub use crate::analysis::{declared_names, ScopeAnalysis};
pub use crate::corpus::{
    list_sources, Corpus, CorpusConfig, CorpusEntry, PinnedSampler, Sample, SamplePool, Sampler,
};
pub use crate::emit::{emit_node, Emit};
pub use crate::environment::{Environment, FunctionIdentity};
pub use crate::error::{CorpusError, ParseError};
pub use crate::hygiene::{BUILTINS, BUILTIN_CONSTRUCTORS};
pub use crate::legality::{admissible, admissible_in_place, program_is_legal, Context};
pub use crate::lexer::{tokenize, Token, TokenKind};
pub use crate::mutator::{
    LiteralMutator, MutationConfig, Mutator, OperatorMutator, ProgramMutator, Strategy,
    StructuralMutator, EDGE_NUMBERS, RNG,
};
pub use crate::parser::{parse, Parser};
pub use crate::session::{PendingImport, Session};
pub use crate::symbol::{Symbol, SymbolTable};
pub use crate::tree::{
    AssignOp, BinaryOp, Literal, LogicalOp, MemberProp, Node, NodeId, NodeKind, Program, UnaryOp,
    UpdateOp, VarKind,
};

/// Parse `source`, apply one mutation strategy, and print the result.
pub fn mutate_source<S: Sampler>(
    source: &str,
    mutator: &mut ProgramMutator<S>,
) -> Result<String, ParseError> {
    let mut program = parse(source)?;
    mutator.mutate(&mut program);
    Ok(program.emit())
}
