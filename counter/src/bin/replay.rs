use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ip_top_counter::config::CounterConfig;
use ip_top_counter::ip_counter::{IpCounter, TopEntry};
use ip_top_counter::metrics;
use ip_top_counter::top_k_tracker::ReplacementStrategy;

#[derive(Debug, Parser)]
#[command(name = "ip-top-replay", about = "Count addresses from a log, one per line", long_about = None)]
struct Cli {
    /// Input file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Size of the top list (overrides the config file)
    #[arg(long)]
    top_count: Option<usize>,

    /// Full-list replacement strategy (overrides the config file)
    #[arg(long, value_enum)]
    strategy: Option<ReplacementStrategy>,

    /// JSON config file; defaults to $IP_TOP_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a JSON report instead of the ranked text list
    #[arg(long, default_value = "false")]
    json: bool,

    /// Print at most this many ranked addresses
    #[arg(long)]
    limit: Option<usize>,

    /// Print the Prometheus text exposition when done
    #[arg(long, default_value = "false")]
    metrics: bool,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    requests: u64,
    rejected: u64,
    distinct_addresses: usize,
    top: Vec<TopEntry>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays clean for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CounterConfig::resolve(cli.config.as_deref(), cli.top_count, cli.strategy)?;
    let mut counter = IpCounter::from_config(&config);

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => {
            info!("Replaying {}", path.display());
            Box::new(BufReader::new(File::open(path)?))
        }
        None => {
            info!("Replaying stdin");
            Box::new(io::stdin().lock())
        }
    };

    let mut requests = 0u64;
    let mut rejected = 0u64;
    for line in reader.lines() {
        let line = line?;
        let ip = line.trim();
        if ip.is_empty() || ip.starts_with('#') {
            continue;
        }
        match counter.request_handled(ip) {
            Ok(_) => requests += 1,
            Err(_) => rejected += 1,
        }
    }

    info!(
        "Counted {} requests from {} addresses, rejected {}",
        requests,
        counter.tracked_addresses(),
        rejected
    );

    let mut top = counter.top();
    if let Some(limit) = cli.limit {
        top.truncate(limit);
    }

    if cli.json {
        let report = ReplayReport {
            requests,
            rejected,
            distinct_addresses: counter.tracked_addresses(),
            top,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (i, entry) in top.iter().enumerate() {
            println!("{}. {}", i + 1, entry);
        }
    }

    if cli.metrics {
        counter.publish_gauges();
        eprint!("{}", metrics::render()?);
    }

    Ok(())
}
