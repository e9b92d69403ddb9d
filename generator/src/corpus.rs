//! Seed corpus and replacement sampling.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, PoisonError, RwLock};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::analysis::ScopeAnalysis;
use crate::error::{CorpusError, ParseError};
use crate::legality::{admissible, admissible_in_place, Context};
use crate::mutator::RNG;
use crate::parser::parse;
use crate::tree::{NodeId, NodeKind, Program};

/// A parsed seed plus its scope analysis. Shared read-only between a sample
/// and any imports queued from it.
#[derive(Debug)]
pub struct CorpusEntry {
    pub path: PathBuf,
    pub program: Program,
    pub analysis: ScopeAnalysis,
}

impl CorpusEntry {
    pub fn new(path: PathBuf, program: Program) -> Self {
        let analysis = ScopeAnalysis::analyze(&program);
        Self {
            path,
            program,
            analysis,
        }
    }

    pub fn read(path: &Path) -> Result<Self, CorpusError> {
        let source = fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = parse(&source).map_err(|source| CorpusError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.to_path_buf(), program))
    }
}

/// A candidate replacement: a node inside the tree it came from.
#[derive(Clone, Debug)]
pub struct Sample {
    pub tree: Rc<CorpusEntry>,
    pub node: NodeId,
}

/// Source of replacement subtrees.
pub trait Sampler {
    /// Find a node of `kind` that is legal in its own tree and would be legal
    /// where `context` holds. `None` means the site should be skipped.
    fn sample(&mut self, kind: NodeKind, context: Context, rng: &mut RNG) -> Option<Sample>;
}

/// Append-only list of extra seed paths, typically earlier mutants fed back
/// by a driver. Cloning shares the list.
#[derive(Clone, Debug, Default)]
pub struct SamplePool {
    paths: Arc<RwLock<Vec<PathBuf>>>,
}

impl SamplePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: PathBuf) {
        self.paths
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path);
    }

    pub fn len(&self) -> usize {
        self.paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<PathBuf> {
        self.paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory of static seed files.
    pub seed_dir: Option<PathBuf>,
    /// Directory whose files start out in the dynamic pool.
    pub pool_dir: Option<PathBuf>,
    /// Chance of drawing from the pool when both pool and seeds are non-empty.
    pub p_pool: f64,
    /// Seeds tried per sampling request before the site is skipped.
    pub max_attempts: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            seed_dir: None,
            pool_dir: None,
            p_pool: 0.5,
            max_attempts: 64,
        }
    }
}

/// Lists the JavaScript files under `dir`, sorted for reproducibility.
pub fn list_sources(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let is_source = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "js");
        if is_source {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Samples from a static seed list and a dynamic pool. Static seeds are
/// read and parsed at most once, and unparseable ones are remembered and
/// skipped. Pool entries are read again on every draw, so memory does not
/// grow with the pool.
pub struct Corpus {
    /// Sorted, for lookup by path.
    seeds: Vec<PathBuf>,
    pool: SamplePool,
    p_pool: f64,
    max_attempts: usize,
    cache: HashMap<PathBuf, Option<Rc<CorpusEntry>>>,
    skipped: BTreeMap<&'static str, usize>,
}

impl Corpus {
    pub fn new(mut seeds: Vec<PathBuf>, pool: SamplePool, config: &CorpusConfig) -> Self {
        seeds.sort();
        seeds.dedup();
        Self {
            seeds,
            pool,
            p_pool: config.p_pool.clamp(0.0, 1.0),
            max_attempts: config.max_attempts,
            cache: HashMap::new(),
            skipped: BTreeMap::new(),
        }
    }

    /// Build a corpus from the directories named in `config`.
    pub fn from_config(config: &CorpusConfig) -> Result<Self, CorpusError> {
        let seeds = match &config.seed_dir {
            Some(dir) => list_sources(dir)?,
            None => Vec::new(),
        };
        let pool = SamplePool::new();
        if let Some(dir) = &config.pool_dir {
            for path in list_sources(dir)? {
                pool.push(path);
            }
        }
        debug!(seeds = seeds.len(), pool = pool.len(), "corpus loaded");
        Ok(Self::new(seeds, pool, config))
    }

    pub fn seeds(&self) -> &[PathBuf] {
        &self.seeds
    }

    /// Handle for producers that feed new seeds in.
    pub fn pool(&self) -> &SamplePool {
        &self.pool
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty() && self.pool.is_empty()
    }

    fn pick_path(&self, rng: &mut RNG) -> Option<PathBuf> {
        // Snapshot the length once; a concurrent append only makes it stale.
        let pool_len = self.pool.len();
        let from_pool = match (self.seeds.is_empty(), pool_len == 0) {
            (true, true) => return None,
            (false, true) => false,
            (true, false) => true,
            (false, false) => rng.random_bool(self.p_pool),
        };
        if from_pool {
            self.pool.get(rng.random_range(0..pool_len))
        } else {
            self.seeds.choose(rng).cloned()
        }
    }

    /// Number of parsed trees held in memory.
    pub fn cached(&self) -> usize {
        self.cache.values().filter(|entry| entry.is_some()).count()
    }

    /// Static seeds that could not be used, counted once each by reason.
    pub fn skipped(&self) -> &BTreeMap<&'static str, usize> {
        &self.skipped
    }

    /// Read and parse `path`. Static seeds are cached; anything else is
    /// loaded fresh.
    pub fn load(&mut self, path: &Path) -> Option<Rc<CorpusEntry>> {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }
        let is_seed = self
            .seeds
            .binary_search_by(|seed| seed.as_path().cmp(path))
            .is_ok();
        let entry = match CorpusEntry::read(path) {
            Ok(entry) => Some(Rc::new(entry)),
            Err(err) => {
                debug!(error = ?err, "skipping seed");
                if is_seed {
                    *self.skipped.entry(skip_reason(&err)).or_default() += 1;
                }
                None
            }
        };
        if is_seed {
            self.cache.insert(path.to_path_buf(), entry.clone());
        }
        entry
    }

    /// The `index`-th node of `kind` in `path` that is legal in its own tree.
    /// For reproducing a particular splice.
    pub fn sample_at(&mut self, path: &Path, kind: NodeKind, index: usize) -> Option<Sample> {
        let tree = self.load(path)?;
        let (node, _) = *admissible_in_place(&tree.program, kind).get(index)?;
        Some(Sample { tree, node })
    }
}

fn skip_reason(err: &CorpusError) -> &'static str {
    match err {
        CorpusError::Parse {
            source: ParseError::Unsupported { what, .. },
            ..
        } => *what,
        CorpusError::Parse { .. } => "syntax error",
        CorpusError::Io { .. } | CorpusError::Walk(_) => "unreadable",
    }
}

impl Sampler for Corpus {
    fn sample(&mut self, kind: NodeKind, context: Context, rng: &mut RNG) -> Option<Sample> {
        for attempt in 0..self.max_attempts {
            let path = self.pick_path(rng)?;
            let Some(tree) = self.load(&path) else {
                continue;
            };
            let candidates: Vec<NodeId> = admissible_in_place(&tree.program, kind)
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| admissible(&tree.program, *id, context))
                .collect();
            if let Some(node) = candidates.choose(rng).copied() {
                trace!(?kind, path = %path.display(), attempt, "sampled replacement");
                return Some(Sample { tree, node });
            }
        }
        debug!(?kind, attempts = self.max_attempts, "no admissible candidate");
        None
    }
}

/// Always offers the same node. Useful for replaying a known splice.
pub struct PinnedSampler {
    sample: Sample,
}

impl PinnedSampler {
    pub fn new(sample: Sample) -> Self {
        Self { sample }
    }
}

impl Sampler for PinnedSampler {
    fn sample(&mut self, kind: NodeKind, context: Context, _rng: &mut RNG) -> Option<Sample> {
        let program = &self.sample.tree.program;
        let fits = program[self.sample.node].kind() == kind
            && admissible(program, self.sample.node, context);
        fits.then(|| self.sample.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_seed(dir: &Path, name: &str, source: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).expect("create seed");
        file.write_all(source.as_bytes()).expect("write seed");
        path
    }

    #[test]
    fn skips_unparseable_seeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_seed(dir.path(), "bad.js", "import x from 'y';");
        write_seed(dir.path(), "good.js", "while (a) { a--; }");
        write_seed(dir.path(), "regex.js", "while (s) { s = s.replace(/a+/g, ''); }");
        let config = CorpusConfig {
            seed_dir: Some(dir.path().to_path_buf()),
            ..CorpusConfig::default()
        };
        let mut corpus = Corpus::from_config(&config).expect("corpus");
        assert_eq!(corpus.seeds().len(), 3);

        let mut rng = RNG::seed_from_u64(1);
        for _ in 0..16 {
            let sample = corpus
                .sample(NodeKind::While, Context::default(), &mut rng)
                .expect("good.js offers a loop");
            assert!(sample.tree.path.ends_with("good.js"));
        }
        for seed in corpus.seeds().to_vec() {
            corpus.load(&seed);
        }
        assert_eq!(corpus.skipped().get("regular expression"), Some(&1));
        assert_eq!(corpus.skipped().values().sum::<usize>(), 2, "each bad seed counted once");
        assert_eq!(corpus.cached(), 1);
    }

    #[test]
    fn pool_entries_are_not_retained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seed = write_seed(dir.path(), "seed.js", "{ s(); }");
        let pool = SamplePool::new();
        let config = CorpusConfig {
            p_pool: 1.0,
            ..CorpusConfig::default()
        };
        let mut corpus = Corpus::new(vec![seed.clone()], pool.clone(), &config);
        let mut rng = RNG::seed_from_u64(5);

        for i in 0..200 {
            pool.push(write_seed(dir.path(), &format!("mutant{i}.js"), "{ m(); }"));
            let sample = corpus
                .sample(NodeKind::Block, Context::default(), &mut rng)
                .expect("pool entry is used");
            assert!(sample.tree.path.file_name().is_some_and(|n| n != "seed.js"));
            assert!(corpus.cached() <= 1);
        }
        assert_eq!(pool.len(), 200);

        corpus.load(&seed);
        assert_eq!(corpus.cached(), 1);
    }

    #[test]
    fn respects_destination_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_seed(dir.path(), "seed.js", "while (a) { if (b) { break; } }");
        let config = CorpusConfig {
            seed_dir: Some(dir.path().to_path_buf()),
            max_attempts: 4,
            ..CorpusConfig::default()
        };
        let mut corpus = Corpus::from_config(&config).expect("corpus");
        let mut rng = RNG::seed_from_u64(2);

        assert!(corpus
            .sample(NodeKind::If, Context::default(), &mut rng)
            .is_none());
        let in_loop = Context::default().enter(NodeKind::While);
        assert!(corpus.sample(NodeKind::If, in_loop, &mut rng).is_some());
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        let mut corpus = Corpus::new(Vec::new(), SamplePool::new(), &CorpusConfig::default());
        let mut rng = RNG::seed_from_u64(3);
        assert!(corpus.is_empty());
        assert!(corpus
            .sample(NodeKind::Block, Context::default(), &mut rng)
            .is_none());
    }

    #[test]
    fn draws_from_dynamic_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = SamplePool::new();
        let mut corpus = Corpus::new(Vec::new(), pool.clone(), &CorpusConfig::default());
        let mut rng = RNG::seed_from_u64(4);
        assert!(corpus
            .sample(NodeKind::Block, Context::default(), &mut rng)
            .is_none());

        pool.push(write_seed(dir.path(), "mutant.js", "{ x = 1; }"));
        let sample = corpus
            .sample(NodeKind::Block, Context::default(), &mut rng)
            .expect("pool entry is used");
        assert!(sample.tree.path.ends_with("mutant.js"));
    }

    #[test]
    fn sample_at_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_seed(dir.path(), "blocks.js", "{ a(); }\n{ b(); }");
        let mut corpus = Corpus::new(vec![path.clone()], SamplePool::new(), &CorpusConfig::default());
        let first = corpus.sample_at(&path, NodeKind::Block, 1).expect("second block");
        let again = corpus.sample_at(&path, NodeKind::Block, 1).expect("second block");
        assert_eq!(first.node, again.node);
        assert!(Rc::ptr_eq(&first.tree, &again.tree), "parsed once");
        assert!(corpus.sample_at(&path, NodeKind::Block, 2).is_none());
    }
}
