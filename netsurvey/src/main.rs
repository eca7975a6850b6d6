use analytics::{classify_record, detect_risks, Report};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dataset_csv::Dataset;
use host_discovery::{discover, DiscoverOptions, DEFAULT_MAX_HOSTS};
use host_probe::{probe_batch, PoolOptions, ProbeOptions, Progress, ScanLimits, TcpProber};
use indicatif::{ProgressBar, ProgressStyle};
use netsurvey_core::ratelimiter::RateLimiter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use render::{ClassifiedHost, Failure, OutputFormat, ScanSummary};

const DEFAULT_DATASET: &str = "netsurvey.csv";

#[derive(Debug, Parser)]
#[command(name = "netsurvey", version, about = "Network inventory: discover, probe, persist and analyse hosts")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./netsurvey.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// List responsive hosts in a range (CIDR, IPs or hostnames, comma or space separated)
    Discover {
        range: String,
        /// Liveness ports, comma/range list. Default: 80,443,22
        #[arg(long)]
        ports: Option<String>,
        /// Timeout per liveness attempt in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Hosts checked concurrently
        #[arg(long)]
        concurrency: Option<usize>,
        /// Host launch pacing; 0 disables it
        #[arg(long)]
        qps: Option<u32>,
        /// Refuse ranges expanding past this many hosts
        #[arg(long)]
        max_hosts: Option<usize>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Discover, probe every live host and append the batch to the dataset
    Scan {
        range: String,
        /// Dataset CSV file
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
        /// Ports: comma/range list (e.g., 22,80,443 or 1-1024,8080). Default: common ports.
        #[arg(long)]
        ports: Option<String>,
        /// Select top N common ports (conflicts with --ports)
        #[arg(long, conflicts_with = "ports")]
        top: Option<usize>,
        /// Timeout per port in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Concurrent connections per host
        #[arg(long)]
        concurrency: Option<usize>,
        /// QPS cap for connection attempts across all hosts; 0 disables pacing
        #[arg(long)]
        qps: Option<u32>,
        /// Retries per port on failure
        #[arg(long)]
        retries: Option<u32>,
        /// Delay between retries in milliseconds
        #[arg(long)]
        retry_delay_ms: Option<u64>,
        /// Hosts probed concurrently
        #[arg(long)]
        workers: Option<usize>,
        /// Refuse ranges expanding past this many hosts
        #[arg(long)]
        max_hosts: Option<usize>,
        /// Upper bound for one host's whole probe, in milliseconds
        #[arg(long)]
        host_timeout_ms: Option<u64>,
        /// Banner read timeout in milliseconds
        #[arg(long)]
        banner_timeout_ms: Option<u64>,
        /// Skip banner reads (no product detection)
        #[arg(long)]
        no_banners: bool,
        /// Skip reverse DNS
        #[arg(long)]
        no_dns: bool,
        /// Skip neighbour table lookups
        #[arg(long)]
        no_mac: bool,
        /// Do not write anything when the scan is interrupted
        #[arg(long)]
        discard_partial: bool,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Distribution tables over the whole dataset
    Report {
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Device role of every record
    Classify {
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Hosts exposing security-sensitive ports
    Risks {
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .try_init();
}

fn print(lines: Vec<String>) {
    for l in lines {
        println!("{}", l);
    }
}

fn pick_format(cli: Option<OutputFormat>, cfg: Option<&String>) -> OutputFormat {
    cli.or_else(|| cfg.map(|s| OutputFormat::from_name(s))).unwrap_or(OutputFormat::Text)
}

fn ports_from(spec: &str) -> Result<Vec<u16>> {
    Ok(host_probe::parse_ports(spec)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Version => {
            println!("netsurvey {} (core {})", env!("CARGO_PKG_VERSION"), netsurvey_core::version());
        }
        Commands::Discover { range, ports, timeout_ms, concurrency, qps, max_hosts, format } => {
            let format = pick_format(format, cfg.discover.format.as_ref());
            let opts = discover_options(&cfg.discover, ports, timeout_ms, concurrency, qps, max_hosts)?;

            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let live = rt.block_on(discover(&range, &opts))?;
            let duration_ms = started.elapsed().as_millis();

            match format {
                OutputFormat::Text => {
                    println!("live hosts ({}):", live.len());
                    for ip in &live {
                        println!("{}", ip);
                    }
                    println!(
                        "(probed on ports {}, took {} ms)",
                        opts.ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(","),
                        duration_ms
                    );
                }
                OutputFormat::Json => {
                    let obj = serde_json::json!({
                        "range": range,
                        "live": live,
                        "ports": opts.ports,
                        "duration_ms": duration_ms,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
                OutputFormat::Jsonl => {
                    for ip in &live {
                        println!("{}", serde_json::json!({ "host": ip }));
                    }
                }
            }
        }
        Commands::Scan {
            range,
            dataset,
            ports,
            top,
            timeout_ms,
            concurrency,
            qps,
            retries,
            retry_delay_ms,
            workers,
            max_hosts,
            host_timeout_ms,
            banner_timeout_ms,
            no_banners,
            no_dns,
            no_mac,
            discard_partial,
            no_progress,
            format,
        } => {
            let s = &cfg.scan;
            let format = pick_format(format, s.format.as_ref());
            let path = dataset.or_else(|| s.dataset.clone()).unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));
            // schema problems surface before any packet is sent
            let store = Dataset::open(&path).with_context(|| format!("opening dataset {}", path.display()))?;

            let ports_vec = match (ports.or_else(|| s.ports.clone()), top.or(s.top)) {
                (Some(spec), _) => ports_from(&spec)?,
                (None, Some(0)) => return Err(anyhow!("--top must be > 0")),
                (None, Some(n)) => host_probe::top_ports(n),
                (None, None) => host_probe::default_top_ports(),
            };
            let mut limits = ScanLimits::default();
            if let Some(ms) = timeout_ms.or(s.timeout_ms) {
                limits.timeout_per_port = Duration::from_millis(ms);
            }
            if let Some(c) = concurrency.or(s.concurrency) {
                limits.per_host_concurrency = c;
            }
            if let Some(r) = retries.or(s.retries) {
                limits.retries = r;
            }
            if let Some(ms) = retry_delay_ms.or(s.retry_delay_ms) {
                limits.retry_delay = Duration::from_millis(ms);
            }
            let qps = qps.or(s.qps).filter(|q| *q > 0);
            let mut pool = PoolOptions::default();
            if let Some(w) = workers.or(s.workers) {
                pool.workers = w;
            }
            if let Some(ms) = host_timeout_ms.or(s.host_timeout_ms) {
                pool.host_timeout = Duration::from_millis(ms);
            }
            let mut probe_opts = ProbeOptions {
                ports: ports_vec,
                limits,
                grab_banners: !no_banners && s.banners.unwrap_or(true),
                resolve_names: !no_dns && s.resolve_names.unwrap_or(true),
                lookup_mac: !no_mac && s.lookup_mac.unwrap_or(true),
                ..Default::default()
            };
            if let Some(ms) = banner_timeout_ms.or(s.banner_timeout_ms) {
                probe_opts.banner_timeout = Duration::from_millis(ms);
            }

            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            // discovery keeps its own pacing; --qps only paces port connections
            let disc_opts = discover_options(&cfg.discover, None, None, None, None, max_hosts)?;
            let live = rt.block_on(discover(&range, &disc_opts))?;
            let discovered = live.len();
            info!(range = %range, live = discovered, "probing live hosts");

            let outcome = rt.block_on(async move {
                probe_opts.limits.qps = qps.map(RateLimiter::new);
                let prober = Arc::new(TcpProber::new(probe_opts));

                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, finishing in-flight probes");
                        on_signal.cancel();
                    }
                });

                let (tx, rx) = watch::channel(Progress::default());
                let bar = if no_progress { None } else { Some(spawn_progress(rx, live.len())) };
                let outcome = probe_batch(live, prober, &pool, cancel, Some(tx)).await;
                if let Some(bar) = bar {
                    let _ = bar.await;
                }
                outcome
            });

            let discarded = outcome.cancelled && discard_partial;
            let written = if discarded {
                warn!(records = outcome.batch.len(), "scan interrupted, discarding partial batch");
                0
            } else {
                store
                    .append(&outcome.batch)
                    .with_context(|| format!("appending to {}", path.display()))?
                    .rows
            };

            let summary = ScanSummary {
                range,
                dataset: path.display().to_string(),
                discovered,
                scanned: outcome.scanned(),
                records_written: written,
                skipped: outcome.skipped.iter().map(|f| Failure { ip: f.ip.to_string(), cause: f.cause.to_string() }).collect(),
                dropped: outcome.dropped.iter().map(|f| Failure { ip: f.ip.to_string(), cause: f.error.to_string() }).collect(),
                unscheduled: outcome.unscheduled,
                cancelled: outcome.cancelled,
                discarded,
                duration_ms: started.elapsed().as_millis(),
            };
            print(render::one(format, &summary, render::summary_text)?);
        }
        Commands::Report { dataset, format } => {
            let (store, format) = open_for_reading(&cfg, dataset, format)?;
            let records = store.snapshot()?;
            let report = Report::build(&records);
            print(render::one(format, &report, render::report_text)?);
        }
        Commands::Classify { dataset, format } => {
            let (store, format) = open_for_reading(&cfg, dataset, format)?;
            let tagged: Vec<ClassifiedHost> = store
                .snapshot()?
                .iter()
                .map(|r| ClassifiedHost { ip: r.ip.clone(), timestamp: render::rfc3339(r.timestamp), role: classify_record(r) })
                .collect();
            print(render::rows(format, &tagged, render::classified_text)?);
        }
        Commands::Risks { dataset, format } => {
            let (store, format) = open_for_reading(&cfg, dataset, format)?;
            let records = store.snapshot()?;
            let findings = detect_risks(&records);
            print(render::rows(format, &findings, render::risk_text)?);
        }
    }
    Ok(())
}

/// Liveness settings: CLI value, then the `discover` config section, then the defaults.
fn discover_options(
    d: &config::DiscoverConfig,
    ports: Option<String>,
    timeout_ms: Option<u64>,
    concurrency: Option<usize>,
    qps: Option<u32>,
    max_hosts: Option<usize>,
) -> Result<DiscoverOptions> {
    let mut opts = DiscoverOptions::default();
    if let Some(spec) = ports.or_else(|| d.ports.clone()) {
        opts.ports = ports_from(&spec)?;
    }
    if let Some(ms) = timeout_ms.or(d.timeout_ms) {
        opts.timeout_per_attempt = Duration::from_millis(ms);
    }
    if let Some(c) = concurrency.or(d.concurrency) {
        opts.concurrency = c;
    }
    opts.qps = qps.or(d.qps).filter(|q| *q > 0);
    opts.max_hosts = max_hosts.or(d.max_hosts).unwrap_or(DEFAULT_MAX_HOSTS);
    Ok(opts)
}

fn open_for_reading(cfg: &config::Config, dataset: Option<PathBuf>, format: Option<OutputFormat>) -> Result<(Dataset, OutputFormat)> {
    let r = &cfg.report;
    let path = dataset
        .or_else(|| r.dataset.clone())
        .or_else(|| cfg.scan.dataset.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET));
    let store = Dataset::open(&path).with_context(|| format!("opening dataset {}", path.display()))?;
    Ok((store, pick_format(format, r.format.as_ref())))
}

/// Mirror the pool's progress channel onto a terminal bar until the sender goes away.
fn spawn_progress(mut rx: watch::Receiver<Progress>, total: usize) -> tokio::task::JoinHandle<()> {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} Probing [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let p = *rx.borrow_and_update();
            pb.set_position(p.completed as u64);
            if p.failed > 0 {
                pb.set_message(format!("{} failed", p.failed));
            }
        }
        pb.finish_and_clear();
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_accepts_a_host_ceiling() {
        let cli = Cli::try_parse_from(["netsurvey", "scan", "10.0.0.0/24", "--max-hosts", "300", "--qps", "50"]).unwrap();
        match cli.command {
            Commands::Scan { max_hosts, qps, .. } => {
                assert_eq!(max_hosts, Some(300));
                assert_eq!(qps, Some(50));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn discovery_pacing_comes_from_its_own_section() {
        let d = config::DiscoverConfig { qps: Some(20), max_hosts: Some(1024), ..Default::default() };
        let opts = discover_options(&d, None, None, None, None, Some(300)).unwrap();
        assert_eq!(opts.qps, Some(20));
        assert_eq!(opts.max_hosts, 300);
        let fallback = discover_options(&d, None, None, None, None, None).unwrap();
        assert_eq!(fallback.max_hosts, 1024);
    }
}
