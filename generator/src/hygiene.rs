//! Repairs a subtree copied in from a corpus tree so that its references
//! make sense in the destination, queuing the external function and class
//! declarations it depends on.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::analysis::declared_names;
use crate::corpus::CorpusEntry;
use crate::legality::{admissible, Context};
use crate::mutator::RNG;
use crate::session::{PendingImport, Session};
use crate::symbol::Symbol;
use crate::tree::{Node, NodeId, Program};

/// Ambient globals that are never renamed or imported.
pub const BUILTINS: &[&str] = &[
    "console",
    "Math",
    "JSON",
    "Object",
    "Function",
    "String",
    "Number",
    "Boolean",
    "Symbol",
    "BigInt",
    "Reflect",
    "Proxy",
    "Promise",
    "Date",
    "RegExp",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "globalThis",
    "undefined",
    "NaN",
    "Infinity",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "print",
];

/// Constructors that need no class declaration.
pub const BUILTIN_CONSTRUCTORS: &[&str] = &[
    "Map",
    "Set",
    "Array",
    "WeakMap",
    "WeakSet",
    "ArrayBuffer",
    "DataView",
    "Int8Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "Int16Array",
    "Uint16Array",
    "Int32Array",
    "Uint32Array",
    "Float32Array",
    "Float64Array",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DeclKind {
    Function,
    Class,
}

impl Session {
    /// Make the copied subtree at `root` (already in `program`, not yet
    /// reachable) resolve in the current scope. Names declared inside the
    /// subtree stay as they are; every other unresolved reference is
    /// renamed, consistently within this subtree, to a visible name.
    pub fn prepare_for_insertion(
        &mut self,
        program: &mut Program,
        root: NodeId,
        source: &Rc<CorpusEntry>,
        rng: &mut RNG,
    ) {
        let nodes = program.preorder_with_parent(root);
        for (id, _) in &nodes {
            let names = declared_names(program, *id);
            self.env.declare_borrowed(names);
        }

        let mut renames: HashMap<Symbol, Option<Symbol>> = HashMap::new();
        for (id, parent) in nodes {
            // Declaration names and named member properties are stored as
            // plain symbols, so every `Ident` here is a reference.
            let Node::Ident(sym) = program[id] else {
                continue;
            };
            let name = program.from_sym(sym);
            if BUILTINS.contains(&name) {
                continue;
            }

            // Call and construction targets are imported, never renamed.
            let target = parent.and_then(|p| match &program[p] {
                Node::Call { callee, .. } if *callee == id => Some(DeclKind::Function),
                Node::New { callee, .. } if *callee == id => Some(DeclKind::Class),
                _ => None,
            });
            if let Some(kind) = target {
                if kind == DeclKind::Function || !BUILTIN_CONSTRUCTORS.contains(&name) {
                    self.queue_import(program, sym, kind, source);
                }
                continue;
            }

            if self.env.visible(sym) || BUILTIN_CONSTRUCTORS.contains(&name) {
                continue;
            }
            let env = &self.env;
            let replacement = *renames
                .entry(sym)
                .or_insert_with(|| env.random_visible(rng));
            match replacement {
                Some(new) => {
                    trace!(from = name, to = program.from_sym(new), "renamed reference");
                    program[id] = Node::Ident(new);
                }
                None => trace!(reference = name, "no visible name to rename to"),
            }
        }

        self.env.clear_borrowed();
    }

    fn queue_import(
        &mut self,
        program: &Program,
        name: Symbol,
        kind: DeclKind,
        source: &Rc<CorpusEntry>,
    ) {
        if self.env.is_borrowed(name) || self.pending.contains_key(&name) {
            return;
        }
        let analysis = self.analysis(program);
        let present = match kind {
            DeclKind::Function => analysis.function_decl(name),
            DeclKind::Class => analysis.class_decl(name),
        };
        if present.is_some() {
            return;
        }

        let text = program.from_sym(name);
        let Some(source_name) = source.program.symbol_table.lookup(text) else {
            return;
        };
        let decl = match kind {
            DeclKind::Function => source.analysis.function_decl(source_name),
            DeclKind::Class => source.analysis.class_decl(source_name),
        };
        // Imports land at the top level, outside any loop or function.
        let decl = decl.filter(|d| admissible(&source.program, *d, Context::default()));
        if let Some(decl) = decl {
            debug!(decl = text, ?kind, from = %source.path.display(), "queued import");
            self.pending.insert(
                name,
                PendingImport {
                    decl,
                    source: Rc::clone(source),
                },
            );
        }
    }

    /// Append every queued declaration to the top level. Declarations
    /// imported this way are repaired too, and whatever they queue in turn
    /// is flushed in the same loop.
    pub fn flush_imports(&mut self, program: &mut Program, rng: &mut RNG) -> usize {
        let mut next = 0;
        while let Some((_, import)) = self.pending.get_index(next) {
            let import = import.clone();
            let copy = program.copy_subtree(&import.source.program, import.decl);
            self.prepare_for_insertion(program, copy, &import.source, rng);
            program.push_toplevel(copy);
            self.mark_stale();
            next += 1;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::Emit;
    use crate::parser::parse;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn entry(source: &str) -> Rc<CorpusEntry> {
        let program = parse(source).expect("parsing should succeed");
        Rc::new(CorpusEntry::new(PathBuf::from("seed.js"), program))
    }

    fn last_statement(entry: &CorpusEntry) -> NodeId {
        *entry.program.body().last().expect("seed has statements")
    }

    fn idents(program: &Program, root: NodeId) -> Vec<String> {
        program
            .preorder(root)
            .into_iter()
            .filter_map(|id| match program[id] {
                Node::Ident(sym) => Some(program.from_sym(sym).to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn keeps_internal_builtin_and_property_names() {
        let source = entry("{ var t = 1; console.log(t, Math.max(t, 2)); }");
        let mut dst = parse("var unrelated;").expect("parsing should succeed");
        let mut session = Session::new(&dst, 5);
        session.env.declare([dst.to_sym("unrelated")]);
        let mut rng = RNG::seed_from_u64(1);

        let block = last_statement(&source);
        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);

        assert_eq!(idents(&dst, copy), ["console", "t", "Math", "t"]);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn renames_consistently_or_leaves_unresolved() {
        let source = entry("{ total = total + 1; log(total); }");
        let mut dst = Program::new();
        let mut session = Session::new(&dst, 5);
        let mut rng = RNG::seed_from_u64(2);
        let block = last_statement(&source);

        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        assert_eq!(idents(&dst, copy), ["total", "total", "log", "total"]);

        let (a, b) = (dst.to_sym("a"), dst.to_sym("b"));
        session.env.declare([a, b]);
        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        let names = idents(&dst, copy);
        assert_eq!(names[0], names[1]);
        assert_eq!(names[0], names[3]);
        assert!(names[0] == "a" || names[0] == "b");
        assert_eq!(names[2], "log", "call targets are never renamed");
    }

    #[test]
    fn builtin_constructors_are_not_renamed() {
        let source = entry("{ ok = Array.isArray(xs) || xs instanceof Map; }");
        let mut dst = Program::new();
        let mut session = Session::new(&dst, 5);
        session.env.declare([dst.to_sym("local")]);
        let mut rng = RNG::seed_from_u64(7);

        let copy = dst.copy_subtree(&source.program, last_statement(&source));
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        assert_eq!(idents(&dst, copy), ["local", "Array", "local", "local", "Map"]);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn queues_each_declaration_once() {
        let source = entry(
            "function helper(x) { return x + 1; }\nclass Box {}\n{ helper(1); helper(2); new Box(); new Map(); }",
        );
        let mut dst = parse("function other() {}").expect("parsing should succeed");
        let mut session = Session::new(&dst, 5);
        let mut rng = RNG::seed_from_u64(3);
        let block = last_statement(&source);

        for _ in 0..2 {
            let copy = dst.copy_subtree(&source.program, block);
            session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        }
        let queued: Vec<&str> = session
            .pending_imports()
            .map(|(name, _)| dst.from_sym(*name))
            .collect();
        assert_eq!(queued, ["helper", "Box"]);

        assert_eq!(session.flush_imports(&mut dst, &mut rng), 2);
        let out = dst.emit();
        assert_eq!(out.matches("function helper").count(), 1);
        assert_eq!(out.matches("class Box").count(), 1);
    }

    #[test]
    fn skips_declarations_already_present() {
        let source = entry("function helper() {}\n{ helper(); }");
        let mut dst = parse("function helper() { return 0; }").expect("parsing should succeed");
        let mut session = Session::new(&dst, 5);
        let mut rng = RNG::seed_from_u64(4);
        let block = last_statement(&source);
        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn refuses_declarations_illegal_at_top_level() {
        let source = entry("function bad() { break; }\n{ bad(); }");
        let mut dst = Program::new();
        let mut session = Session::new(&dst, 5);
        let mut rng = RNG::seed_from_u64(6);
        let block = last_statement(&source);
        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn flush_follows_transitive_dependencies() {
        let source = entry(
            "function outer() { return inner(); }\nfunction inner() { return 1; }\n{ outer(); }",
        );
        let mut dst = Program::new();
        let mut session = Session::new(&dst, 5);
        let mut rng = RNG::seed_from_u64(5);
        let block = last_statement(&source);
        let copy = dst.copy_subtree(&source.program, block);
        session.prepare_for_insertion(&mut dst, copy, &source, &mut rng);

        assert_eq!(session.flush_imports(&mut dst, &mut rng), 2);
        let out = dst.emit();
        assert!(out.contains("function outer()"));
        assert!(out.contains("function inner()"));
    }
}
