//! Marco RAG CLI
//!
//! A retrieval-and-evaluation engine for RAG experiments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marco_rag::{
    config::Config,
    persistence::{
        self, GROUND_TRUTH_FILENAME, METRICS_FILENAME, RETRIEVAL_FILENAME, UNITS_FILENAME,
    },
    pipeline::{load_corpus, load_queries, Pipeline},
    provider::{EmbeddingProvider, RelevanceScorer, RemoteEmbedder, RemoteScorer},
    segmenter::{Segmenter, Strategy},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Marco RAG - segment, retrieve, and evaluate
#[derive(Parser)]
#[command(name = "marco-rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a single document and print or save the units
    Segment {
        /// Path to the document file (text or markdown)
        document: PathBuf,

        /// Segmentation strategy: structural, sliding, semantic, hybrid, auto
        #[arg(short, long, default_value = "structural")]
        strategy: Strategy,

        /// Optional output path for the units (.json or .bin)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline: segment, index, retrieve, label, evaluate
    Run {
        /// Directory holding the corpus (.txt / .md files)
        corpus: PathBuf,

        /// JSON file with the query set
        queries: PathBuf,

        /// Segmentation strategy: structural, sliding, semantic, hybrid, auto
        #[arg(short, long, default_value = "auto")]
        strategy: Strategy,

        /// Number of results per query; overrides the configured value
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Root directory for run output
        #[arg(short, long, default_value = "runs")]
        output: PathBuf,
    },

    /// Re-evaluate a persisted run's retrieval (and answer) quality
    Eval {
        /// Run directory; defaults to the latest run under --runs
        run: Option<PathBuf>,

        /// Root directory holding runs
        #[arg(long, default_value = "runs")]
        runs: PathBuf,

        /// Metric cutoff
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
    },

    /// Show information about a persisted run
    Info {
        /// Run directory; defaults to the latest run under --runs
        run: Option<PathBuf>,

        /// Root directory holding runs
        #[arg(long, default_value = "runs")]
        runs: PathBuf,
    },

    /// Test embedding and scorer connections
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Segment {
            document,
            strategy,
            output,
        } => cmd_segment(document, strategy, output).await,
        Commands::Run {
            corpus,
            queries,
            strategy,
            top_k,
            output,
        } => cmd_run(corpus, queries, strategy, top_k, output).await,
        Commands::Eval { run, runs, top_k } => cmd_eval(run, runs, top_k).await,
        Commands::Info { run, runs } => cmd_info(run, runs),
        Commands::Test => cmd_test().await,
    }
}

fn load_validated_config() -> Result<Config> {
    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build the optional pairwise scorer when its endpoint is configured.
fn make_scorer(config: &Config) -> Option<Arc<dyn RelevanceScorer>> {
    if !config.scorer.is_configured() {
        return None;
    }
    match RemoteScorer::new(config.scorer.clone()) {
        Ok(scorer) => Some(Arc::new(scorer)),
        Err(e) => {
            eprintln!("Scorer unavailable, falling back to cosine ranking: {}", e);
            None
        }
    }
}

fn resolve_run_dir(run: Option<PathBuf>, runs: &PathBuf) -> Result<PathBuf> {
    match run {
        Some(dir) => Ok(dir),
        None => persistence::latest_run(runs).context("No runs found"),
    }
}

async fn cmd_segment(
    document_path: PathBuf,
    strategy: Strategy,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("Loading configuration...");
    let config = load_validated_config()?;

    let text = std::fs::read_to_string(&document_path)
        .with_context(|| format!("Failed to read '{}'", document_path.display()))?;
    let name = document_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    println!("Segmenting document: {}", document_path.display());
    println!("Strategy: {}", strategy);

    let embedder = Arc::new(RemoteEmbedder::new(config.embedding.clone()));
    let segmenter = Segmenter::new(config.chunking.clone(), embedder);

    let start = Instant::now();
    let units = segmenter
        .segment(&text, strategy, &name)
        .await
        .context("Segmentation failed")?;

    println!("\nProduced {} units in {:.2?}:", units.len(), start.elapsed());
    for unit in &units {
        let preview: String = unit.text.chars().take(60).collect();
        println!(
            "  {} [{}..{}] {}",
            unit.unit_id,
            unit.sequence_metadata.start_index,
            unit.sequence_metadata.end_index,
            preview.replace('\n', " ")
        );
    }

    if let Some(output) = output {
        persistence::save_units(&units, &output).context("Failed to save units")?;
        println!("\nUnits saved to: {}", output.display());
    }

    Ok(())
}

async fn cmd_run(
    corpus: PathBuf,
    queries_path: PathBuf,
    strategy: Strategy,
    top_k: Option<usize>,
    output: PathBuf,
) -> Result<()> {
    println!("Loading configuration...");
    let mut config = load_validated_config()?;
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
        config.validate().context("Invalid configuration")?;
    }

    let documents = load_corpus(&corpus).context("Failed to load corpus")?;
    let queries = load_queries(&queries_path).context("Failed to load queries")?;

    println!("Corpus:    {} documents", documents.len());
    println!("Queries:   {}", queries.len());
    println!("Strategy:  {}", strategy);
    println!("Model:     {}", config.embedding.model);

    let embedder = Arc::new(RemoteEmbedder::new(config.embedding.clone()));
    let scorer = make_scorer(&config);
    println!(
        "Ranking:   {}",
        if scorer.is_some() {
            "pairwise scorer with cosine fallback"
        } else {
            "cosine similarity"
        }
    );

    let pipeline = Pipeline::new(&config, embedder, scorer);
    let summary = pipeline
        .run(&documents, &queries, strategy, &output)
        .await
        .context("Pipeline run failed")?;

    summary.print_summary();
    Ok(())
}

async fn cmd_eval(run: Option<PathBuf>, runs: PathBuf, top_k: usize) -> Result<()> {
    println!("Loading configuration...");
    let config = load_validated_config()?;
    let run_dir = resolve_run_dir(run, &runs)?;

    println!("Evaluating run: {}", run_dir.display());

    let embedder = Arc::new(RemoteEmbedder::new(config.embedding.clone()));
    let pipeline = Pipeline::new(&config, embedder, make_scorer(&config));

    let evaluation = pipeline
        .evaluate_run(&run_dir, top_k)
        .context("Evaluation failed")?;

    println!("\nRetrieval metrics (k={}):", top_k);
    println!("{}", "─".repeat(40));
    for (name, value) in &evaluation.summary.mean {
        println!("  {:<14} {:.4}", name, value);
    }
    println!("{}", "─".repeat(40));
    println!(
        "Scored {} queries, skipped {}",
        evaluation.summary.scored_queries, evaluation.summary.skipped_queries
    );

    match pipeline.evaluate_run_answers(&run_dir).await {
        Ok(Some(answer_summary)) => {
            println!("\nAnswer metrics:");
            println!("{}", "─".repeat(40));
            for (name, value) in &answer_summary.mean {
                println!("  {:<14} {:.4}", name, value);
            }
            println!("{}", "─".repeat(40));
            println!(
                "Scored {} answers, skipped {}",
                answer_summary.scored_queries, answer_summary.skipped_queries
            );
        }
        Ok(None) => {
            println!("\nNo answers artifact found; skipping answer evaluation.");
        }
        Err(e) => {
            eprintln!("\nAnswer evaluation failed: {}", e);
        }
    }

    Ok(())
}

fn cmd_info(run: Option<PathBuf>, runs: PathBuf) -> Result<()> {
    let run_dir = resolve_run_dir(run, &runs)?;

    println!("Run Information");
    println!("{}", "─".repeat(40));
    println!("  Run dir:     {}", run_dir.display());

    let units_path = run_dir.join(UNITS_FILENAME);
    if persistence::artifact_exists(&units_path) {
        let units = persistence::load_units(&units_path).context("Failed to load units")?;
        let strategies: std::collections::BTreeSet<&str> = units
            .iter()
            .map(|u| u.sequence_metadata.strategy.as_str())
            .collect();
        println!("  Units:       {}", units.len());
        println!(
            "  Strategies:  {}",
            strategies.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    let retrieval_path = run_dir.join(RETRIEVAL_FILENAME);
    if persistence::artifact_exists(&retrieval_path) {
        let results = persistence::load_retrieval_results(&retrieval_path)
            .context("Failed to load retrieval results")?;
        println!("  Queries:     {}", results.len());
    }

    let gt_path = run_dir.join(GROUND_TRUTH_FILENAME);
    if persistence::artifact_exists(&gt_path) {
        let gt = persistence::load_ground_truth(&gt_path).context("Failed to load ground truth")?;
        println!("  Labelled:    {}", gt.len());
    }

    println!(
        "  Metrics:     {}",
        if persistence::artifact_exists(&run_dir.join(METRICS_FILENAME)) {
            "present"
        } else {
            "absent"
        }
    );

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing capability connections...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Embedding configuration:");
    println!("  API Base:  {}", config.embedding.api_base);
    println!("  Model:     {}", config.embedding.model);
    let key_preview: String = config.embedding.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_preview);
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let embedder = RemoteEmbedder::new(config.embedding.clone());
    println!("Sending test embedding request...");
    match embedder.embed_one("connection test").await {
        Ok(vector) => println!("Embedding ok ({} dimensions)", vector.len()),
        Err(e) => println!("Embedding failed: {}", e),
    }

    if config.scorer.is_configured() {
        println!("\nSending test scoring request...");
        match RemoteScorer::new(config.scorer.clone()) {
            Ok(scorer) => match scorer.score("test query", "test candidate").await {
                Ok(score) => println!("Scorer ok (score {:.3})", score),
                Err(e) => println!("Scorer failed: {}", e),
            },
            Err(e) => println!("Scorer unavailable: {}", e),
        }
    } else {
        println!("\nNo scorer configured; ranking will use cosine similarity.");
    }

    Ok(())
}
