use std::fs;
use std::path::{Path, PathBuf};

use js_splice::{
    emit_node, mutate_source, parse, program_is_legal, Corpus, CorpusConfig, Emit, Literal,
    MutationConfig, Node, NodeKind, PinnedSampler, Program, ProgramMutator, Sample, SamplePool,
    Strategy, EDGE_NUMBERS,
};

fn write_seed(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).expect("write seed");
    path
}

fn config(seed: u64) -> MutationConfig {
    MutationConfig {
        seed: Some(seed),
        ..MutationConfig::default()
    }
}

fn reprint(source: &str) -> String {
    parse(source).expect("parsing should succeed").emit()
}

/// Pins the first block of `source` as the only replacement.
fn pinned_block(dir: &Path, source: &str) -> Sample {
    let path = write_seed(dir, "pinned.js", source);
    let mut corpus = Corpus::new(vec![path.clone()], SamplePool::new(), &CorpusConfig::default());
    corpus
        .sample_at(&path, NodeKind::Block, 0)
        .expect("seed has the block")
}

fn splice(source: &str, sample: Sample, config: &MutationConfig) -> (Program, usize) {
    let mut program = parse(source).expect("parsing should succeed");
    let mut mutator = ProgramMutator::new(PinnedSampler::new(sample), config);
    let changed = mutator.mutate_with(Strategy::Structural, &mut program);
    (program, changed)
}

#[test]
fn zero_replacement_chance_keeps_program() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_seed(dir.path(), "seed.js", "while (x) { if (y) { break; } }");
    let source = "for (var i = 0; i < 3; i++) { if (i == 1) { break; } print(i); }";
    let config = MutationConfig {
        p_replace: 0.0,
        corpus: CorpusConfig {
            seed_dir: Some(dir.path().to_path_buf()),
            ..CorpusConfig::default()
        },
        ..config(1)
    };
    let mut mutator = ProgramMutator::from_config(&config).expect("corpus");
    let mut program = parse(source).expect("parsing should succeed");

    assert_eq!(mutator.mutate_with(Strategy::Structural, &mut program), 0);
    assert_eq!(program.emit(), reprint(source));
}

#[test]
fn splice_imports_called_function() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sample = pinned_block(
        dir.path(),
        "{ helper(3); }\nfunction helper(x) { return x + 1; }",
    );
    let config = MutationConfig {
        p_replace: 1.0,
        max_mutations: 1,
        ..config(2)
    };
    let (program, changed) = splice("helper();\n{ a = 2; }", sample, &config);

    assert_eq!(changed, 1);
    let out = program.emit();
    assert!(out.contains("helper(3);"), "{out}");
    assert!(out.contains("helper();"), "{out}");
    assert_eq!(out.matches("function helper").count(), 1, "{out}");
    assert!(!out.contains("a = 2"), "{out}");
    assert!(program_is_legal(&program));
    parse(&out).expect("mutant reparses");
}

#[test]
fn literal_strategy_uses_edge_values() {
    let config = MutationConfig {
        p_literal: 1.0,
        ..config(3)
    };
    let mut program = parse("var x = 5 + 2;\nvar y = [3, 4.5];\nprint(x, y, 'text');")
        .expect("parsing should succeed");
    let corpus = Corpus::new(Vec::new(), SamplePool::new(), &config.corpus);
    let mut mutator = ProgramMutator::new(corpus, &config);

    assert_eq!(mutator.mutate_with(Strategy::Literals, &mut program), 4);
    for id in program.preorder(program.root) {
        match &program[id] {
            Node::Literal(Literal::Number(raw)) => {
                assert!(EDGE_NUMBERS.contains(&raw.as_str()), "{raw}");
            }
            Node::Literal(Literal::String(raw)) => assert_eq!(raw, "'text'"),
            _ => {}
        }
    }
    parse(&program.emit()).expect("mutant reparses");
}

#[test]
fn unresolved_names_are_renamed_consistently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sample = pinned_block(dir.path(), "{ total = total + 1; }");
    let config = MutationConfig {
        p_replace: 1.0,
        max_mutations: 1,
        ..config(4)
    };
    let (program, changed) =
        splice("var a = 1;\nvar b = 2;\n{ a = 0; }", sample.clone(), &config);

    assert_eq!(changed, 1);
    let out = program.emit();
    assert!(
        out.contains("a = a + 1") || out.contains("b = b + 1"),
        "{out}"
    );
    assert!(!out.contains("total"), "{out}");

    // The corpus tree itself is untouched.
    let original = emit_node(&sample.tree.program, sample.node);
    assert!(original.contains("total = total + 1"), "{original}");
}

#[test]
fn repeated_splices_import_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sample = pinned_block(dir.path(), "{ helper(); }\nfunction helper() { return 1; }");
    let config = MutationConfig {
        p_replace: 1.0,
        max_mutations: 5,
        ..config(5)
    };
    let (program, changed) = splice("{ a = 1; }\n{ a = 2; }\n{ a = 3; }", sample, &config);

    assert_eq!(changed, 3);
    let out = program.emit();
    assert_eq!(out.matches("helper();").count(), 3, "{out}");
    assert_eq!(out.matches("function helper").count(), 1, "{out}");
}

#[test]
fn imports_follow_constructed_classes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sample = pinned_block(
        dir.path(),
        "{ var b = make(2); print(b.v); }\nfunction make(v) { return new Box(v); }\nclass Box { constructor(v) { this.v = v; } }",
    );
    let config = MutationConfig {
        p_replace: 1.0,
        max_mutations: 1,
        ..config(8)
    };
    let (program, changed) = splice("var q = 0;\n{ q = 1; }", sample, &config);

    assert_eq!(changed, 1);
    let out = program.emit();
    assert_eq!(out.matches("function make").count(), 1, "{out}");
    assert_eq!(out.matches("class Box").count(), 1, "{out}");
    assert!(!out.contains("function print"), "{out}");
    assert!(program_is_legal(&program));
}

#[test]
fn budget_bounds_replacements() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sample = pinned_block(dir.path(), "{ b(); }");
    let source = "{ a(1); }\n{ a(2); }\n{ a(3); }\n{ a(4); }";

    let capped = MutationConfig {
        p_replace: 1.0,
        max_mutations: 2,
        ..config(6)
    };
    let (program, changed) = splice(source, sample.clone(), &capped);
    assert_eq!(changed, 2);
    assert_eq!(program.emit().matches("b();").count(), 2);

    let none = MutationConfig {
        p_replace: 1.0,
        max_mutations: 0,
        ..config(6)
    };
    let (program, changed) = splice(source, sample, &none);
    assert_eq!(changed, 0);
    assert_eq!(program.emit(), reprint(source));
}

#[test]
fn mutants_stay_legal_and_printable() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_seed(dir.path(), "loops.js", "while (a) { if (b) { break; } else { continue; } }");
    write_seed(
        dir.path(),
        "returns.js",
        "function f(x) { for (var i = 0; i < x; i++) { if (i > 3) { return i; } } return 0; }",
    );
    write_seed(
        dir.path(),
        "switch.js",
        "switch (k) { case 1: { g(); break; } default: h(); }",
    );
    write_seed(
        dir.path(),
        "classes.js",
        "class Box { constructor(v) { this.v = v; } }\nfunction make(v) { return new Box(v); }\n{ var b = make(2); print(b.v); }",
    );
    write_seed(dir.path(), "try.js", "try { risky(); } catch (e) { print(e); }");
    write_seed(dir.path(), "broken.js", "if (");

    let destinations = [
        "var n = 0;\nwhile (n < 10) { n++; if (n == 5) { continue; } }",
        "function g(y) { if (y) { return y + 1; } { y = y * 2; } return y; }",
        "var t = 1;\nswitch (t) { case 1: { t = 2; break; } }\n{ print(t); }",
        "for (var k in o) { if (k) { break; } }\ntry { x(); } catch (err) { print(err); }",
    ];

    for seed in 0..40 {
        let config = MutationConfig {
            p_replace: 0.5,
            max_mutations: 3,
            corpus: CorpusConfig {
                seed_dir: Some(dir.path().to_path_buf()),
                ..CorpusConfig::default()
            },
            ..config(seed)
        };
        let mut mutator = ProgramMutator::from_config(&config).expect("corpus");
        for source in destinations {
            let mut program = parse(source).expect("parsing should succeed");
            let changed = mutator.mutate_with(Strategy::Structural, &mut program);
            assert!(changed <= 3);
            assert!(program_is_legal(&program), "seed {seed}: {}", program.emit());
            let out = program.emit();
            let reparsed = parse(&out).unwrap_or_else(|err| panic!("seed {seed}: {err}\n{out}"));
            assert!(program_is_legal(&reparsed));
        }
    }
}

#[test]
fn mutate_source_round_trips_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_seed(dir.path(), "seed.js", "{ print(1 + 2); }");
    let config = MutationConfig {
        corpus: CorpusConfig {
            seed_dir: Some(dir.path().to_path_buf()),
            ..CorpusConfig::default()
        },
        ..config(7)
    };
    let mut mutator = ProgramMutator::from_config(&config).expect("corpus");

    for _ in 0..10 {
        let out = mutate_source("var z = 3 * 4;\n{ print(z > 2); }", &mut mutator)
            .expect("source parses");
        parse(&out).expect("mutant reparses");
    }
    assert!(mutate_source("var = ;", &mut mutator).is_err());
}
