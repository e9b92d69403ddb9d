use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use colored::Colorize;
use js_splice::{mutate_source, Corpus, MutationConfig, ProgramMutator, RNG};
use rand::Rng;
use short_uuid::ShortUuid;
use similar::TextDiff;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod run;
use crate::run::{run, Exit, RunResult};

#[derive(Parser, Debug)]
#[command(version, about = "Mutation fuzzer for JavaScript engines")]
struct Args {
    /// Engine under test, invoked as `<target> <file.js>`
    target: PathBuf,
    /// Directory of seed programs
    corpus: PathBuf,
    /// Directory interesting mutants are written to
    out: PathBuf,

    /// Reference engine; the target's stdout must match it
    #[arg(short, long)]
    gold: Option<PathBuf>,
    /// Path to .toml configuration for the mutator
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of mutants to try; runs until interrupted if absent
    #[arg(short, long)]
    num_trials: Option<usize>,
    /// Seconds before an engine run counts as a hang
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,
    /// Feed mutants that ran cleanly back into the sample pool
    #[arg(short, long)]
    feedback: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Clean,
    Crash(u8),
    Hang,
    Divergence(String),
}

impl Verdict {
    fn label(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Crash(_) => "crash",
            Verdict::Hang => "hang",
            Verdict::Divergence(_) => "divergence",
        }
    }
}

#[derive(Default)]
struct Tally {
    trials: usize,
    skipped: usize,
    clean: usize,
    crashes: usize,
    hangs: usize,
    divergences: usize,
}

impl Tally {
    fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Clean => self.clean += 1,
            Verdict::Crash(_) => self.crashes += 1,
            Verdict::Hang => self.hangs += 1,
            Verdict::Divergence(_) => self.divergences += 1,
        }
    }

    fn print(&self) {
        println!(
            "{} trials, {} skipped, {} clean, {} crashes, {} hangs, {} divergences",
            self.trials,
            self.skipped,
            self.clean.to_string().green(),
            self.crashes.to_string().red().bold(),
            self.hangs.to_string().yellow(),
            self.divergences.to_string().magenta(),
        );
    }
}

fn init_tracing() {
    let filter = match std::env::var("JS_SPLICE_LOG") {
        Ok(directives) => EnvFilter::builder().parse_lossy(directives),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Args) -> Result<MutationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<MutationConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => MutationConfig::default(),
    };
    config.corpus.seed_dir = Some(cli.corpus.clone());
    Ok(config)
}

/// Uniform over static seeds and pooled mutants.
fn pick_destination(corpus: &Corpus, rng: &mut RNG) -> Option<PathBuf> {
    let seeds = corpus.seeds();
    let total = seeds.len() + corpus.pool().len();
    if total == 0 {
        return None;
    }
    let index = rng.random_range(0..total);
    match seeds.get(index) {
        Some(path) => Some(path.clone()),
        None => corpus.pool().get(index - seeds.len()),
    }
}

/// A signal is a crash and a timeout a hang; otherwise the target must
/// print what the gold engine prints, unless the gold engine hung too.
fn classify(target: &RunResult, gold: Option<&RunResult>) -> Verdict {
    match target.exit {
        Exit::Signal(signal) => return Verdict::Crash(signal),
        Exit::Timeout => return Verdict::Hang,
        Exit::Code(_) | Exit::Unknown => {}
    }
    let Some(gold) = gold.filter(|gold| gold.exit != Exit::Timeout) else {
        return Verdict::Clean;
    };
    let diff = TextDiff::from_lines(&gold.stdout, &target.stdout);
    if diff.ratio() < 1.0 {
        Verdict::Divergence(diff.unified_diff().header("gold", "target").to_string())
    } else {
        Verdict::Clean
    }
}

fn record(out: &Path, verdict: &Verdict, mutant: &str, target: &RunResult) -> Result<PathBuf> {
    let stem = format!("{}-{}", verdict.label(), ShortUuid::generate().to_string());
    let path = out.join(format!("{stem}.js"));
    fs::write(&path, mutant).with_context(|| format!("writing {}", path.display()))?;

    let mut report = format!("exit: {:?}\n", target.exit);
    if let Verdict::Divergence(diff) = verdict {
        report.push_str(diff);
    }
    if !target.stderr.is_empty() {
        report.push_str("stderr:\n");
        report.push_str(&target.stderr);
    }
    let report_path = out.join(format!("{stem}.txt"));
    fs::write(&report_path, report)
        .with_context(|| format!("writing {}", report_path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Args::parse();
    ensure!(cli.out.is_dir(), "output path {} is not a directory", cli.out.display());

    let mut config = load_config(&cli)?;
    let mut rng = config.rng();
    // The harness and the mutator draw from separate streams of one seed.
    config.seed = Some(rng.random());
    let mut mutator = ProgramMutator::from_config(&config).context("loading corpus")?;
    ensure!(
        !mutator.sampler().is_empty(),
        "no .js seeds under {}",
        cli.corpus.display()
    );

    let pool_dir = cli.out.join("pool");
    if cli.feedback {
        fs::create_dir_all(&pool_dir)
            .with_context(|| format!("creating {}", pool_dir.display()))?;
    }

    let timeout = Duration::from_secs(cli.timeout);
    let mut tally = Tally::default();
    for _ in 0..cli.num_trials.unwrap_or(usize::MAX) {
        let Some(destination) = pick_destination(mutator.sampler(), &mut rng) else {
            break;
        };
        tally.trials += 1;
        let source = fs::read_to_string(&destination)
            .with_context(|| format!("reading {}", destination.display()))?;
        let mutant = match mutate_source(&source, &mut mutator) {
            Ok(mutant) => mutant,
            Err(err) => {
                warn!(path = %destination.display(), %err, "seed does not parse");
                tally.skipped += 1;
                continue;
            }
        };

        let target = run(&cli.target, &mutant, timeout)?;
        let gold = match &cli.gold {
            Some(gold) => Some(run(gold, &mutant, timeout)?),
            None => None,
        };
        let verdict = classify(&target, gold.as_ref());
        tally.record(&verdict);
        debug!(from = %destination.display(), verdict = verdict.label(), "trial finished");

        if verdict == Verdict::Clean {
            if cli.feedback {
                let path = pool_dir.join(format!("{}.js", ShortUuid::generate().to_string()));
                fs::write(&path, &mutant).with_context(|| format!("writing {}", path.display()))?;
                mutator.sampler().pool().push(path);
            }
            continue;
        }
        let path = record(&cli.out, &verdict, &mutant, &target)?;
        let label = match &verdict {
            Verdict::Crash(signal) => format!("crash (signal {signal})").red().bold(),
            Verdict::Hang => "hang".yellow(),
            _ => "divergence".magenta(),
        };
        println!("{label}: {}", path.display());
        info!(path = %path.display(), verdict = verdict.label(), "recorded mutant");
    }

    for (reason, count) in mutator.sampler().skipped() {
        info!(reason = *reason, count = *count, "seeds skipped");
    }
    tally.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, exit: Exit) -> RunResult {
        RunResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit,
        }
    }

    #[test]
    fn classifies_by_exit_then_output() {
        let gold = result("1\n2\n", Exit::Code(0));
        assert_eq!(
            classify(&result("", Exit::Signal(11)), Some(&gold)),
            Verdict::Crash(11)
        );
        assert_eq!(classify(&result("1\n", Exit::Timeout), Some(&gold)), Verdict::Hang);
        assert_eq!(classify(&result("1\n2\n", Exit::Code(0)), Some(&gold)), Verdict::Clean);
        assert_eq!(classify(&result("1\n3\n", Exit::Code(0)), None), Verdict::Clean);

        let Verdict::Divergence(diff) = classify(&result("1\n3\n", Exit::Code(1)), Some(&gold))
        else {
            panic!("differing output diverges");
        };
        assert!(diff.starts_with("--- gold\n+++ target\n"), "{diff}");
        assert!(diff.contains("@@"), "{diff}");
        assert!(diff.contains("-2\n"));
        assert!(diff.contains("+3\n"));
    }

    #[test]
    fn hung_gold_is_not_a_reference() {
        let gold = result("partial", Exit::Timeout);
        assert_eq!(classify(&result("done\n", Exit::Code(0)), Some(&gold)), Verdict::Clean);
    }
}
