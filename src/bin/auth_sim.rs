//! TA / Node / Middleware token exchange simulator.
//!
//! ```bash
//! auth_sim --nodes 200 --workers 4 --tamper-percent 1 --payload-bytes 512 \
//!     --node-jitter 100 --net-ta-node 10 50 --net-node-mw 10 50 \
//!     --db-delay 20 60 --fail-percent 3 --out results.csv
//! ```

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tokensim::config::non_negative;
use tokensim::{report, Config, DelayRange, KeyMaterial, LatencyModel, SleepLatency, SyntheticLatency};

#[derive(Parser, Debug)]
#[command(name = "auth_sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of simulated nodes (non-positive falls back to 1000)
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    nodes: i64,

    /// Concurrent workers (non-positive falls back to 1; capped at nodes)
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    workers: i64,

    /// Chance (0-100) that a node forwards a forged token
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    tamper_percent: f64,

    /// Filler bytes in each request body
    #[arg(long, default_value_t = 500)]
    payload_bytes: usize,

    /// Upper bound of the staggered node start, in ms
    #[arg(long, value_name = "MS", default_value_t = 50)]
    node_jitter: u64,

    /// TA -> Node delay range, in ms [default: 5 20]
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    net_ta_node: Option<Vec<u64>>,

    /// Node -> MW delay range, in ms [default: 5 20]
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    net_node_mw: Option<Vec<u64>>,

    /// DB write delay range, in ms [default: 10 30]
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    db_delay: Option<Vec<u64>>,

    /// Chance (0-100) that a node's request is dropped
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    fail_percent: f64,

    /// CSV file the result row is appended to
    #[arg(long, value_name = "FILE", default_value = "realistic_perf.csv")]
    out: String,

    /// Human-readable summary file
    #[arg(long, value_name = "FILE", default_value = "final.txt")]
    summary: String,

    /// Master seed for reproducible delay/drop/tamper draws
    #[arg(long)]
    seed: Option<u64>,

    /// Account for delays without sleeping
    #[arg(long)]
    no_sleep: bool,
}

fn range(v: Option<Vec<u64>>, default: DelayRange) -> DelayRange {
    match v.as_deref() {
        Some([min, max]) => DelayRange::new(*min, *max),
        _ => default,
    }
}

impl Args {
    fn into_config(self) -> Config {
        let d = Config::default();
        let mut cfg = Config::new(non_negative(self.nodes))
            .with_workers(non_negative(self.workers))
            .with_tamper_percent(self.tamper_percent)
            .with_fail_percent(self.fail_percent)
            .with_payload_bytes(self.payload_bytes)
            .with_node_jitter(self.node_jitter)
            .with_net_ta_node(range(self.net_ta_node, d.net_ta_node))
            .with_net_node_mw(range(self.net_node_mw, d.net_node_mw))
            .with_db_delay(range(self.db_delay, d.db_delay))
            .with_out_file(self.out)
            .with_summary_file(self.summary);
        if let Some(seed) = self.seed {
            cfg = cfg.with_seed(seed);
        }
        cfg
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,tokensim=info")),
        )
        .init();

    let args = Args::parse();
    let no_sleep = args.no_sleep;
    let cfg = args.into_config().validate()?;

    info!(
        nodes = cfg.nodes,
        workers = cfg.effective_workers(),
        net_ta_node = %cfg.net_ta_node,
        net_node_mw = %cfg.net_node_mw,
        db_delay = %cfg.db_delay,
        tamper_percent = cfg.tamper_percent,
        fail_percent = cfg.fail_percent,
        payload_bytes = cfg.payload_bytes,
        no_sleep,
        "simulation parameters"
    );

    let keys = KeyMaterial::derive();
    let synthetic = SyntheticLatency::new();
    let latency: &dyn LatencyModel = if no_sleep { &synthetic } else { &SleepLatency };

    let sim = tokensim::simulate(cfg.clone(), &keys, latency)?;
    let s = &sim.summary;
    let workers = sim.output.workers;

    report::append_csv(&cfg.out_file, workers, s)
        .with_context(|| format!("writing {}", cfg.out_file))?;
    report::append_summary(&cfg.summary_file, workers, s)
        .with_context(|| format!("writing {}", cfg.summary_file))?;

    println!(
        "Done. Avg node time: {} ms, Success: {:.2}%, Dropped: {:.2}%, Wall time: {:.6} s",
        s.avg_us as f64 / 1000.0,
        s.success_pct,
        s.drop_pct,
        s.wall_time.as_secs_f64()
    );
    println!("Results written to: {} and {}", cfg.out_file, cfg.summary_file);
    Ok(())
}
