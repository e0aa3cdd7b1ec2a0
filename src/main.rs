/*
 * SubSweep - Batch Subdomain Brute-Forcer
 *
 * Validates a pool of candidate DNS resolvers, then brute-forces a
 * wordlist against each target domain in sequential, concurrency-bounded
 * batches, appending confirmed hostnames to one file per domain.
 */

mod engine;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use colored::*;
use log::{debug, LevelFilter};

use crate::engine::{default_concurrency, is_valid_ipv4, Engine, ScanConfig, DEFAULT_BATCH_SIZE};

const BANNER: &str = r#"
 ____        _     ____
/ ___| _   _| |__ / ___|_      _____  ___ _ __
\___ \| | | | '_ \\___ \ \ /\ / / _ \/ _ \ '_ \
 ___) | |_| | |_) |___) \ V  V /  __/  __/ |_) |
|____/ \__,_|_.__/|____/ \_/\_/ \___|\___| .__/
                                         |_|
"#;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target domains, comma separated
    #[arg(short = 'd', long = "domains", value_delimiter = ',', required = true)]
    domains: Vec<String>,

    /// File of candidate resolver addresses, one per line
    #[arg(short = 'r', long = "resolvers")]
    resolvers: PathBuf,

    /// Wordlist of candidate subdomain labels, one per line
    #[arg(short = 'w', long = "wordlist")]
    wordlist: PathBuf,

    /// Per-query timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = 3)]
    timeout: u64,

    /// Max in-flight queries (defaults to 2x available cores)
    #[arg(short = 'c', long = "concurrency")]
    concurrency: Option<usize>,

    /// Candidate labels per batch
    #[arg(short = 'b', long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Directory for per-domain result files
    #[arg(short = 'o', long = "output-dir", default_value = "output")]
    output_dir: PathBuf,

    /// Log per-query detail at debug level
    #[arg(long = "debug")]
    debug: bool,
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();
}

/// Read the resolvers file, keeping only well-formed dotted-quad lines.
fn load_resolvers(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading resolvers file {}", path.display()))?;
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_valid_ipv4(line) {
            kept.push(line.to_string());
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!("dropped {} invalid lines from {}", dropped, path.display());
    }
    Ok(kept)
}

/// Read the wordlist. Lines are used verbatim apart from the stripped
/// newline; blank lines cannot form a hostname and are skipped.
fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading wordlist {}", path.display()))?;
    Ok(raw
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    if args.batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    if args.concurrency == Some(0) {
        bail!("concurrency must be at least 1");
    }

    println!("{}", BANNER.bright_cyan());
    println!("{}", "=".repeat(60).bright_yellow());

    let resolvers = load_resolvers(&args.resolvers)?;
    let candidates = load_wordlist(&args.wordlist)?;

    let config = ScanConfig {
        domains: args.domains,
        resolvers,
        candidates,
        timeout: Duration::from_secs(args.timeout),
        concurrency: args.concurrency.unwrap_or_else(default_concurrency),
        batch_size: args.batch_size,
        output_dir: args.output_dir,
    };

    println!(
        "{} {}",
        "Domains:".bright_blue(),
        config.domains.join(", ").bright_green()
    );
    println!(
        "{} {}",
        "Candidate resolvers:".bright_blue(),
        config.resolvers.len().to_string().bright_green()
    );
    println!(
        "{} {}",
        "Wordlist size:".bright_blue(),
        config.candidates.len().to_string().bright_green()
    );
    println!(
        "{} {}",
        "Concurrency cap:".bright_blue(),
        config.concurrency.to_string().bright_green()
    );
    println!(
        "{} {}",
        "Batch size:".bright_blue(),
        config.batch_size.to_string().bright_green()
    );
    println!("{}", "=".repeat(60).bright_yellow());

    let start_time = Local::now();
    let engine = Engine::new(config);
    let summary = engine.run().await?;
    let end_time = Local::now();

    let duration = end_time.signed_duration_since(start_time);
    let minutes = duration.num_minutes();
    let seconds = duration.num_seconds() % 60;

    println!("{}", "=".repeat(60).bright_yellow());
    println!(
        "{} {}",
        "Domains processed:".bright_blue(),
        summary.domains_processed.to_string().bright_green()
    );
    println!(
        "{} {}",
        "Hostnames found:".bright_blue(),
        summary.hostnames_found.to_string().bright_green().bold()
    );
    println!(
        "{} {}",
        "Total duration:".bright_blue(),
        format!("{} minutes {} seconds", minutes, seconds).bright_green()
    );
    println!("{}", "=".repeat(60).bright_yellow());

    Ok(())
}
