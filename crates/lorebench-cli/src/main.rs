//! Lorebench CLI - evaluation entry points.
//!
//! # Usage
//!
//! ```bash
//! # Score a ranked prediction file against gold evidence sets
//! lb retrieval --gold gold.jsonl --guess guess.jsonl
//! lb retrieval --gold gold.jsonl --guess guess.jsonl --ks 1,5,100 --rank-keys wikipedia_id,section
//!
//! # Score predicted answers plus the retrieval-gated combined report
//! lb downstream --gold gold.jsonl --guess guess.jsonl
//!
//! # Machine-readable output
//! lb retrieval --gold gold.jsonl --guess guess.jsonl --json
//! ```
//!
//! A malformed input file (duplicate ids, missing predictions, size
//! mismatch) aborts with a non-zero exit status and the integrity message.

mod output;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lorebench_core::config::{DEFAULT_KS, DEFAULT_RANK_KEY};
use lorebench_core::evaluation::{evaluate_downstream, evaluate_retrieval};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Lorebench evaluation CLI.
///
/// Scores prediction files against gold files in the unified record format.
#[derive(Parser)]
#[command(name = "lb", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieval quality: precision@k, recall@k, success-rate@k, R-precision
    Retrieval {
        /// Gold record file (newline-delimited JSON)
        #[arg(long)]
        gold: PathBuf,

        /// Prediction record file (newline-delimited JSON)
        #[arg(long)]
        guess: PathBuf,

        /// Rank cutoffs (comma-separated positive integers)
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_KS.to_vec())]
        ks: Vec<usize>,

        /// Provenance fields identifying a page (comma-separated)
        #[arg(long, value_delimiter = ',', default_values_t = vec![DEFAULT_RANK_KEY.to_string()])]
        rank_keys: Vec<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer quality (em/f1/rougel) plus the retrieval-gated report
    Downstream {
        /// Gold record file (newline-delimited JSON)
        #[arg(long)]
        gold: PathBuf,

        /// Prediction record file (newline-delimited JSON)
        #[arg(long)]
        guess: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Retrieval {
            gold,
            guess,
            mut ks,
            rank_keys,
            json,
        } => {
            if ks.iter().any(|&k| k == 0) {
                bail!("--ks values must be positive integers");
            }
            ks.sort_unstable();
            ks.dedup();

            let report = evaluate_retrieval(&gold, &guess, &ks, &rank_keys)?;
            let rendered = if json {
                output::format_json(&report)
            } else {
                output::format_retrieval(&report)
            };
            println!("{}", rendered);
        }
        Command::Downstream { gold, guess, json } => {
            let rank_keys = vec![DEFAULT_RANK_KEY.to_string()];
            let report = evaluate_downstream(&gold, &guess, &rank_keys)?;
            let rendered = if json {
                output::format_json(&report)
            } else {
                output::format_downstream(&report)
            };
            println!("{}", rendered);
        }
    }

    Ok(())
}
