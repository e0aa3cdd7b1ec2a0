use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;

/// Well-known name used to probe candidate resolvers.
pub const PROBE_DOMAIN: &str = "google.com";

/// Candidate labels per batch when not overridden on the command line.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Fallback concurrency cap: twice the available cores.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

/// Dotted-quad check for resolver addresses: exactly four parts,
/// each an integer in 0..=255.
pub fn is_valid_ipv4(addr: &str) -> bool {
    let parts: Vec<&str> = addr.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_digit())
                && part.parse::<u8>().is_ok()
        })
}

/// Everything the engine needs for one run, fixed at startup.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub domains: Vec<String>,
    pub resolvers: Vec<String>,
    pub candidates: Vec<String>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub batch_size: usize,
    pub output_dir: PathBuf,
}

/// Outcome of a single DNS query. `Negative` covers every DNS-level
/// failure (NXDOMAIN, no nameservers, protocol error, timeout); anything
/// else is `Fatal` and aborts the run.
#[derive(Debug)]
pub enum QueryVerdict {
    Confirmed(String),
    Negative,
    Fatal(ResolveError),
}

pub(crate) fn classify(err: ResolveError) -> QueryVerdict {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. }
        | ResolveErrorKind::NoConnections
        | ResolveErrorKind::Timeout
        | ResolveErrorKind::Proto(_) => QueryVerdict::Negative,
        _ => QueryVerdict::Fatal(err),
    }
}

/// A resolver that answered the probe query and is usable for the run.
#[derive(Clone)]
pub struct ValidatedResolver {
    pub addr: String,
    pub resolver: Arc<TokioAsyncResolver>,
}

fn build_resolver(addr: &str, timeout: Duration) -> Result<TokioAsyncResolver> {
    let socket_addr: SocketAddr = format!("{}:53", addr)
        .parse()
        .with_context(|| format!("bad resolver address {}", addr))?;

    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig {
        socket_addr,
        protocol: Protocol::Udp,
        tls_dns_name: None,
        trust_negative_responses: false,
        bind_addr: None,
    });

    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.use_hosts_file = false;
    opts.preserve_intermediates = false;
    opts.try_tcp_on_error = false;
    opts.validate = false;

    Ok(TokioAsyncResolver::tokio(config, opts))
}

/// Probe one candidate resolver with an A lookup of [`PROBE_DOMAIN`].
/// `Ok(None)` means the resolver is rejected; only unrecognized error
/// classes surface as `Err`.
async fn validate_resolver(addr: String, timeout: Duration) -> Result<Option<ValidatedResolver>> {
    let resolver = build_resolver(&addr, timeout)?;
    match tokio::time::timeout(timeout, resolver.lookup(PROBE_DOMAIN, RecordType::A)).await {
        Ok(Ok(_)) => {
            debug!("resolver {} confirmed", addr);
            Ok(Some(ValidatedResolver {
                addr,
                resolver: Arc::new(resolver),
            }))
        }
        Ok(Err(err)) => match classify(err) {
            QueryVerdict::Fatal(err) => Err(err.into()),
            _ => {
                debug!("resolver {} rejected", addr);
                Ok(None)
            }
        },
        Err(_) => {
            debug!("resolver {} timed out", addr);
            Ok(None)
        }
    }
}

/// Existence check for one (resolver, domain, candidate) task.
pub(crate) async fn check_subdomain(
    resolver: &TokioAsyncResolver,
    domain: &str,
    candidate: &str,
    timeout: Duration,
) -> QueryVerdict {
    let hostname = format!("{}.{}", candidate, domain);
    match tokio::time::timeout(timeout, resolver.lookup(hostname.as_str(), RecordType::A)).await {
        Ok(Ok(_)) => {
            debug!("confirmed {}", hostname);
            QueryVerdict::Confirmed(hostname)
        }
        Ok(Err(err)) => {
            let verdict = classify(err);
            if matches!(verdict, QueryVerdict::Negative) {
                debug!("{} not found", hostname);
            }
            verdict
        }
        Err(_) => {
            debug!("{} timed out", hostname);
            QueryVerdict::Negative
        }
    }
}

/// Fold completed task verdicts into the batch's unique set. Hostnames
/// confirmed by more than one resolver collapse to a single entry; the
/// first fatal verdict aborts the batch.
pub(crate) fn collect_unique<I>(verdicts: I) -> Result<HashSet<String>, ResolveError>
where
    I: IntoIterator<Item = QueryVerdict>,
{
    let mut unique = HashSet::new();
    for verdict in verdicts {
        match verdict {
            QueryVerdict::Confirmed(hostname) => {
                unique.insert(hostname);
            }
            QueryVerdict::Negative => {}
            QueryVerdict::Fatal(err) => return Err(err),
        }
    }
    Ok(unique)
}

/// Append-only per-domain output file, `<domain>.txt` under the output
/// directory. Never truncated; flushed after every batch so completed
/// batches survive an interrupted run.
pub struct DomainSink {
    path: PathBuf,
    file: File,
}

impl DomainSink {
    pub async fn open(output_dir: &Path, domain: &str) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;
        let path = output_dir.join(format!("{}.txt", domain));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening output file {}", path.display()))?;
        Ok(DomainSink { path, file })
    }

    pub async fn append_batch(&mut self, hostnames: &HashSet<String>) -> Result<()> {
        for hostname in hostnames {
            self.file.write_all(hostname.as_bytes()).await?;
            self.file.write_all(b"\n").await?;
        }
        self.file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Counters reported after a run.
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub resolvers_validated: usize,
    pub domains_processed: usize,
    pub hostnames_found: usize,
}

/// Drives a whole run: resolver validation once, then one domain
/// pipeline at a time. A single semaphore caps in-flight queries across
/// both phases.
pub struct Engine {
    config: ScanConfig,
    limiter: Arc<Semaphore>,
}

impl Engine {
    pub fn new(config: ScanConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.concurrency));
        Engine { config, limiter }
    }

    pub async fn run(&self) -> Result<ScanSummary> {
        println!("{}", "Validating DNS resolvers...".bright_blue());
        let resolvers = self.validate_resolvers().await?;
        if resolvers.is_empty() {
            println!(
                "{}",
                "No valid DNS resolvers, aborting before enumeration".bright_red()
            );
            return Ok(ScanSummary::default());
        }
        println!(
            "{} {}",
            "Validated resolvers:".bright_blue(),
            resolvers.len().to_string().bright_green()
        );

        let mut summary = ScanSummary {
            resolvers_validated: resolvers.len(),
            ..ScanSummary::default()
        };
        for domain in &self.config.domains {
            println!(
                "{} {}",
                "Enumerating domain:".bright_blue(),
                domain.bright_green()
            );
            summary.hostnames_found += self.process_domain(domain, &resolvers).await?;
            summary.domains_processed += 1;
        }
        Ok(summary)
    }

    async fn validate_resolvers(&self) -> Result<Vec<ValidatedResolver>> {
        let bar = ProgressBar::new(self.config.resolvers.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} resolvers")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut handles = Vec::with_capacity(self.config.resolvers.len());
        for addr in &self.config.resolvers {
            let addr = addr.clone();
            let timeout = self.config.timeout;
            let bar = bar.clone();
            let permit = Arc::clone(&self.limiter).acquire_owned().await?;

            handles.push(tokio::spawn(async move {
                let result = validate_resolver(addr, timeout).await;
                bar.inc(1);
                drop(permit);
                result
            }));
        }

        let mut validated = Vec::new();
        for handle in join_all(handles).await {
            if let Some(resolver) = handle?? {
                validated.push(resolver);
            }
        }
        bar.finish_and_clear();
        debug!(
            "confirmed resolver pool: {:?}",
            validated.iter().map(|r| r.addr.as_str()).collect::<Vec<_>>()
        );
        Ok(validated)
    }

    /// One domain, start to finish: consecutive batches of candidates,
    /// each batch flushed to the sink before the next begins.
    async fn process_domain(
        &self,
        domain: &str,
        resolvers: &[ValidatedResolver],
    ) -> Result<usize> {
        let mut sink = DomainSink::open(&self.config.output_dir, domain).await?;
        let batches: Vec<&[String]> = self.config.candidates.chunks(self.config.batch_size).collect();

        let bar = ProgressBar::new(batches.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} batches")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut written = 0;
        for batch in batches {
            let unique = self.run_batch(domain, resolvers, batch).await?;
            written += unique.len();
            sink.append_batch(&unique).await?;
            bar.inc(1);
        }
        bar.finish_and_clear();
        info!(
            "{}: {} hostnames appended to {}",
            domain,
            written,
            sink.path().display()
        );
        Ok(written)
    }

    /// Full resolver x candidate cross-product for one batch, bounded by
    /// the global limiter. Permits are acquired before spawning, so the
    /// queue never outruns the cap.
    async fn run_batch(
        &self,
        domain: &str,
        resolvers: &[ValidatedResolver],
        batch: &[String],
    ) -> Result<HashSet<String>> {
        let mut handles = Vec::with_capacity(resolvers.len() * batch.len());
        for entry in resolvers {
            for candidate in batch {
                let resolver = Arc::clone(&entry.resolver);
                let domain = domain.to_string();
                let candidate = candidate.clone();
                let timeout = self.config.timeout;
                let permit = Arc::clone(&self.limiter).acquire_owned().await?;

                handles.push(tokio::spawn(async move {
                    let verdict = check_subdomain(&resolver, &domain, &candidate, timeout).await;
                    drop(permit);
                    verdict
                }));
            }
        }

        let mut verdicts = Vec::with_capacity(handles.len());
        for handle in join_all(handles).await {
            verdicts.push(handle?);
        }
        Ok(collect_unique(verdicts)?)
    }
}
