//! Simulation of a three-party token authentication exchange (Trusted
//! Authority, Node, Middleware) under injected latency, drops and tampering.
//!
//! [`simulate`] runs every configured node across a fixed worker pool and
//! returns the per-node outcomes together with their [`RunSummary`].

pub mod config;
pub mod crypto;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod pool;
pub mod protocols;
pub mod report;
pub mod rng;

pub use config::Config;
pub use crypto::KeyMaterial;
pub use error::{ConfigError, CryptoError, Result, SimError};
pub use latency::{DelayRange, LatencyModel, SleepLatency, SyntheticLatency};
pub use metrics::RunSummary;
pub use pool::{RunOutput, WorkerPool};
pub use protocols::node::NodeOutcome;

/// A finished run: raw outcomes plus their aggregate.
#[derive(Clone, Debug)]
pub struct Simulation {
    pub output: RunOutput,
    pub summary: RunSummary,
}

/// Validate `config`, run all nodes and aggregate the outcomes.
pub fn simulate(config: Config, keys: &KeyMaterial, latency: &dyn LatencyModel) -> Result<Simulation> {
    let config = config.validate()?;
    let output = WorkerPool::new(&config, keys, latency).run()?;
    let summary = RunSummary::from_outcomes(&output.outcomes, config.nodes, output.wall_time);
    Ok(Simulation { output, summary })
}
