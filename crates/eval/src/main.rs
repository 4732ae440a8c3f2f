//! Evaluation CLI for the branded-ingredient matching engine.
//!
//! Usage:
//!     eval analyze "Aqua, Glycerin, Phenoxyethanol"
//!     eval predict "Glycerin, Niacinamide" --top-k 5
//!     eval benchmark --test-file queries.json --k 10
//!     eval health

use std::collections::HashSet;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use incimatch_engine::Engine;
use incimatch_eval::{mean_average_precision_at_k, mean_ndcg_at_k, mean_recall_at_k};
use incimatch_rank::{RemoteScorer, RemoteScorerConfig, Scorer};
use incimatch_store::{DocumentStore, HttpStore, HttpStoreConfig};

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate branded-ingredient matching quality")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Document store URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    store_url: String,

    /// Remote scorer URL; the overlap heuristic is used when absent
    #[arg(long)]
    scorer_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an INCI list against the branded catalog
    Analyze {
        /// Comma-separated INCI names
        inci: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Predict likely branded blends for an INCI list
    Predict {
        /// Comma-separated INCI names
        inci: String,

        /// Maximum predictions to return
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check store health and warm the graph
    Health,

    /// Run ranking metrics against a labelled query file
    Benchmark {
        /// Path to a JSON file of labelled queries
        #[arg(short, long)]
        test_file: String,

        /// Cutoff rank
        #[arg(short, long, default_value = "10")]
        k: usize,
    },
}

/// One labelled query in a benchmark file.
#[derive(Debug, Deserialize)]
struct BenchmarkCase {
    inci_names: Vec<String>,
    /// Branded ids expected among the predictions
    relevant: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("incimatch=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let store = HttpStore::new(HttpStoreConfig {
        base_url: cli.store_url,
        ..Default::default()
    });

    match cli.scorer_url {
        Some(base_url) => {
            let scorer = RemoteScorer::new(RemoteScorerConfig {
                base_url,
                ..Default::default()
            });
            run(Engine::with_scorer(store, scorer), cli.command).await
        }
        None => run(Engine::new(store), cli.command).await,
    }
}

async fn run<Sc: Scorer + Sync>(engine: Engine<HttpStore, Sc>, command: Commands) -> Result<()> {
    match command {
        Commands::Analyze { inci, format } => run_analyze(&engine, &inci, &format).await,
        Commands::Predict { inci, top_k, format } => {
            run_predict(&engine, &inci, top_k, &format).await
        }
        Commands::Health => run_health(&engine).await,
        Commands::Benchmark { test_file, k } => run_benchmark(&engine, &test_file, k).await,
    }
}

fn split_inci(inci: &str) -> Vec<String> {
    inci.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

async fn run_analyze<Sc: Scorer + Sync>(
    engine: &Engine<HttpStore, Sc>,
    inci: &str,
    format: &str,
) -> Result<()> {
    let names = split_inci(inci);
    println!("Analyzing {} INCI names", names.len());
    println!("---");

    let response = engine.analyze(&names).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    for (i, scored) in response.matched.iter().enumerate() {
        println!(
            "\n{}. {} (Confidence: {:.3})",
            i + 1,
            scored.product_name,
            scored.confidence
        );
        if let Some(supplier) = &scored.supplier {
            println!("   Supplier: {}", supplier);
        }
        println!("   Covers: {}", scored.matched_inci.join(", "));
    }

    if !response.conflicts.is_empty() {
        println!("\nConflicts:");
        for conflict in &response.conflicts {
            println!(
                "   {} could belong to: {}",
                conflict.inci_name,
                conflict.possible_brands.join(", ")
            );
        }
    }

    if !response.unmatched.is_empty() {
        println!("\nUnmatched: {}", response.unmatched.join(", "));
    }

    println!("\n---");
    println!(
        "Overall confidence: {:.3} ({} matched, {:.3}s)",
        response.overall_confidence,
        response.matched.len(),
        response.processing_time_seconds
    );

    Ok(())
}

async fn run_predict<Sc: Scorer + Sync>(
    engine: &Engine<HttpStore, Sc>,
    inci: &str,
    top_k: usize,
    format: &str,
) -> Result<()> {
    let names = split_inci(inci);
    let response = engine.predict(&names, top_k).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Matched INCI: {}", response.matched_inci.join(", "));
    if !response.unmatched.is_empty() {
        println!("Unmatched: {}", response.unmatched.join(", "));
    }
    println!("---");

    for (i, prediction) in response.predictions.iter().enumerate() {
        println!(
            "\n{}. {} (Score: {:.3})",
            i + 1,
            prediction.name.as_deref().unwrap_or(&prediction.branded_id),
            prediction.score
        );
        println!(
            "   Overlap: {}/{} | Supplier/Func/Chem degrees: {}/{}/{}",
            prediction.features.overlap_count,
            prediction.features.branded_inci_total,
            prediction.features.supplier_degree,
            prediction.features.func_degree,
            prediction.features.chem_degree
        );
    }

    println!("\n---");
    println!("Total: {} predictions", response.predictions.len());

    Ok(())
}

async fn run_health<Sc: Scorer + Sync>(engine: &Engine<HttpStore, Sc>) -> Result<()> {
    print!("Checking {} store... ", engine.store().name());

    match engine.store().health_check().await {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }

    let stats = engine.rebuild_graph(true).await?;
    println!(
        "Graph: {} nodes, {} edges | Catalog: {} branded ingredients",
        stats.graph_nodes, stats.graph_edges, stats.catalog_entries
    );

    Ok(())
}

async fn run_benchmark<Sc: Scorer + Sync>(
    engine: &Engine<HttpStore, Sc>,
    test_file: &str,
    k: usize,
) -> Result<()> {
    let raw = std::fs::read_to_string(test_file)
        .with_context(|| format!("reading benchmark file {}", test_file))?;
    let cases: Vec<BenchmarkCase> =
        serde_json::from_str(&raw).context("parsing benchmark file")?;

    println!("Running {} labelled queries (K={})", cases.len(), k);

    let mut batch_preds = Vec::with_capacity(cases.len());
    let mut batch_truths = Vec::with_capacity(cases.len());

    for case in &cases {
        let response = engine.predict(&case.inci_names, k).await?;
        let preds: Vec<String> = response
            .predictions
            .into_iter()
            .map(|prediction| prediction.branded_id)
            .collect();
        let truth: HashSet<String> = case.relevant.iter().cloned().collect();

        tracing::debug!(
            query = %case.inci_names.join(", "),
            predicted = preds.len(),
            relevant = truth.len(),
            "benchmark query done"
        );

        batch_preds.push(preds);
        batch_truths.push(truth);
    }

    println!("---");
    println!("MAP@{}:    {:.4}", k, mean_average_precision_at_k(&batch_preds, &batch_truths, k));
    println!("NDCG@{}:   {:.4}", k, mean_ndcg_at_k(&batch_preds, &batch_truths, k));
    println!("Recall@{}: {:.4}", k, mean_recall_at_k(&batch_preds, &batch_truths, k));

    Ok(())
}
