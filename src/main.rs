use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use latent_pcfg::config::{DEFAULT_BOUNDARY_TAG, DEFAULT_START_SYMBOL};
use latent_pcfg::{parse_treebank, Corpus, InductionConfig, InductionSession, Tree};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "latent-pcfg",
    about = "Split-merge latent-variable PCFG induction over binarized treebanks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Induce a refined grammar from bracketed, binarized trees.
    Induce {
        /// Treebank file (bracketed trees, whitespace separated).
        treebank: PathBuf,
        /// Weight of every tree in the primary treebank.
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
        /// Optional second treebank merged into the corpus.
        #[arg(long)]
        secondary: Option<PathBuf>,
        /// Weight of every tree in the secondary treebank.
        #[arg(long, default_value_t = 1.0)]
        secondary_weight: f64,
        /// Number of split/merge rounds.
        #[arg(long, default_value_t = 2)]
        split_count: usize,
        /// Fraction of new substates merged back per round.
        #[arg(long, default_value_t = 0.0)]
        merge_rate: f64,
        /// Cap on EM iterations per re-estimation.
        #[arg(long, default_value_t = 20)]
        max_em_iterations: usize,
        /// Labels that are never split (repeatable).
        #[arg(long = "start-symbol", default_value = DEFAULT_START_SYMBOL)]
        start_symbols: Vec<String>,
        /// Boundary sentinel tag.
        #[arg(long, default_value = DEFAULT_BOUNDARY_TAG)]
        boundary_tag: String,
        /// Seed for split perturbation.
        #[arg(long)]
        seed: Option<u64>,
        /// Print every substate with its id.
        #[arg(long)]
        states: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Induce {
            treebank,
            weight,
            secondary,
            secondary_weight,
            split_count,
            merge_rate,
            max_em_iterations,
            start_symbols,
            boundary_tag,
            seed,
            states,
        } => {
            let mut config = InductionConfig::default()
                .with_split_count(split_count)
                .with_split_recombine_rate(merge_rate)
                .with_max_em_iterations(max_em_iterations)
                .with_start_symbols(start_symbols)
                .with_boundary_tag(boundary_tag);
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            let secondary = secondary.map(|path| (path, secondary_weight));
            run_induce(&treebank, weight, secondary, config, states)?
        }
    }

    Ok(())
}

fn read_treebank(path: &Path) -> Result<Vec<Tree>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read treebank {}", path.display()))?;
    parse_treebank(&text).with_context(|| format!("failed to parse treebank {}", path.display()))
}

fn run_induce(
    treebank: &Path,
    weight: f64,
    secondary: Option<(PathBuf, f64)>,
    config: InductionConfig,
    print_states: bool,
) -> Result<()> {
    let primary = read_treebank(treebank)?;
    let corpus = match secondary {
        Some((path, secondary_weight)) => {
            let extra = read_treebank(&path)?;
            Corpus::merged(primary, weight, extra, secondary_weight)?
        }
        None => Corpus::from_trees(primary, weight)?,
    };
    let trees = corpus.len();

    let session = InductionSession::new(config, corpus).context("invalid induction setup")?;
    let grammar = session.extract().context("grammar induction failed")?;

    println!("trees\t{trees}");
    println!("states\t{}", grammar.state_index.len());
    println!("unary_rules\t{}", grammar.unary.num_rules());
    println!("binary_rules\t{}", grammar.binary.num_rules());
    println!("log_likelihood\t{:.4}", grammar.log_likelihood);
    println!("fingerprint\t{}", grammar.fingerprint());

    if print_states {
        for (id, name) in grammar.state_index.iter().enumerate() {
            println!("{id}\t{name}");
        }
    }

    Ok(())
}
