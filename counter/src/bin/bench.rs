use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::Rng;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ip_top_counter::address::{key_to_ip, AddressError};
use ip_top_counter::config::CounterConfig;
use ip_top_counter::ip_counter::{IpCounter, TopEntry};
use ip_top_counter::metrics;
use ip_top_counter::shared_counter::SharedIpCounter;
use ip_top_counter::top_k_tracker::ReplacementStrategy;

#[derive(Debug, Parser)]
#[command(name = "ip-top-bench", about = "Feed random addresses through the counter and time it", long_about = None)]
struct Cli {
    /// Number of requests to generate
    #[arg(long, default_value = "500000")]
    counts: usize,

    /// Number of distinct addresses the requests are drawn from
    #[arg(long, default_value = "500")]
    number_of_ips: u32,

    /// Size of the top list (overrides the config file)
    #[arg(long)]
    top_count: Option<usize>,

    /// Full-list replacement strategy (overrides the config file)
    #[arg(long, value_enum)]
    strategy: Option<ReplacementStrategy>,

    /// JSON config file; defaults to $IP_TOP_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads sharing one counter
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Print the Prometheus text exposition when done
    #[arg(long, default_value = "false")]
    metrics: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CounterConfig::resolve(cli.config.as_deref(), cli.top_count, cli.strategy)?;
    if cli.number_of_ips == 0 {
        return Err("--number-of-ips must be positive".into());
    }

    info!(
        "Generating {} requests over {} addresses (top {}, {:?}, {} thread(s))",
        cli.counts,
        cli.number_of_ips,
        config.top_count,
        config.strategy,
        cli.threads.max(1)
    );

    let start = Instant::now();
    let counter = if cli.threads > 1 {
        run_shared(&cli, &config)?
    } else {
        let mut counter = IpCounter::from_config(&config);
        let mut rng = rand::thread_rng();
        for _ in 0..cli.counts {
            let ip = key_to_ip(rng.gen_range(0..cli.number_of_ips)).to_string();
            counter.request_handled(&ip)?;
        }
        counter
    };
    let total = start.elapsed();

    info!(
        "Took {:?} to generate {} counts for a total of {} IPs",
        total,
        cli.counts,
        counter.tracked_addresses()
    );
    info!(
        "Average time to handle each IP is {:?}",
        average(total, cli.counts)
    );

    let start = Instant::now();
    let top = counter.top();
    info!("Took {:?} to get top {}", start.elapsed(), counter.top_count());

    print_ranked(&top);

    if cli.metrics {
        counter.publish_gauges();
        print!("{}", metrics::render()?);
    }

    Ok(())
}

/// Split the load across `--threads` workers hammering one shared counter.
fn run_shared(cli: &Cli, config: &CounterConfig) -> Result<IpCounter, Box<dyn std::error::Error>> {
    let shared = SharedIpCounter::new(IpCounter::from_config(config));
    let per_thread = cli.counts / cli.threads;
    let remainder = cli.counts % cli.threads;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..cli.threads)
            .map(|t| {
                let shared = &shared;
                let requests = per_thread + usize::from(t < remainder);
                let number_of_ips = cli.number_of_ips;
                scope.spawn(move || -> Result<(), AddressError> {
                    let mut rng = rand::thread_rng();
                    for _ in 0..requests {
                        let ip = key_to_ip(rng.gen_range(0..number_of_ips)).to_string();
                        shared.request_handled(&ip)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.join().map_err(|_| "bench worker panicked")??;
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(shared.into_inner())
}

fn average(total: Duration, counts: usize) -> Duration {
    match u32::try_from(counts) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / counts as f64),
    }
}

fn print_ranked(top: &[TopEntry]) {
    for (i, entry) in top.iter().enumerate() {
        println!("{}. {}", i + 1, entry);
    }
}
