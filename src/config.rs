//! Run parameters.

use crate::error::ConfigError;
use crate::latency::DelayRange;

/// Node count used when a non-positive count is requested.
pub const FALLBACK_NODES: usize = 1000;
/// Worker count used when a non-positive count is requested.
pub const FALLBACK_WORKERS: usize = 1;

/// Immutable parameters for one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Number of simulated nodes.
    pub nodes: usize,

    /// Requested number of concurrent workers.
    pub workers: usize,

    /// Probability (0-100) that a node's token is replaced before forwarding.
    pub tamper_percent: f64,

    /// Filler bytes in each request body.
    pub payload_bytes: usize,

    /// Upper bound of the staggered start delay.
    pub node_jitter_ms: u64,

    /// TA -> Node network delay.
    pub net_ta_node: DelayRange,

    /// Node -> MW network delay.
    pub net_node_mw: DelayRange,

    /// DB write delay after validation.
    pub db_delay: DelayRange,

    /// Probability (0-100) that a node's request is dropped.
    pub fail_percent: f64,

    /// CSV target.
    pub out_file: String,

    /// Human-readable summary target.
    pub summary_file: String,

    /// Master seed for the worker streams. `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: 100,
            workers: 2,
            tamper_percent: 0.0,
            payload_bytes: 500,
            node_jitter_ms: 50,
            net_ta_node: DelayRange::new(5, 20),
            net_node_mw: DelayRange::new(5, 20),
            db_delay: DelayRange::new(10, 30),
            fail_percent: 0.0,
            out_file: "realistic_perf.csv".to_string(),
            summary_file: "final.txt".to_string(),
            seed: None,
        }
    }
}

impl Config {
    /// Config with the given node count and all other values at their defaults.
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    /// A config with no delays at all, convenient for fast runs.
    pub fn without_delays(nodes: usize) -> Self {
        Self::new(nodes)
            .with_node_jitter(0)
            .with_net_ta_node(DelayRange::ZERO)
            .with_net_node_mw(DelayRange::ZERO)
            .with_db_delay(DelayRange::ZERO)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_tamper_percent(mut self, p: f64) -> Self {
        self.tamper_percent = p;
        self
    }

    pub fn with_fail_percent(mut self, p: f64) -> Self {
        self.fail_percent = p;
        self
    }

    pub fn with_payload_bytes(mut self, n: usize) -> Self {
        self.payload_bytes = n;
        self
    }

    pub fn with_node_jitter(mut self, ms: u64) -> Self {
        self.node_jitter_ms = ms;
        self
    }

    pub fn with_net_ta_node(mut self, r: DelayRange) -> Self {
        self.net_ta_node = r;
        self
    }

    pub fn with_net_node_mw(mut self, r: DelayRange) -> Self {
        self.net_node_mw = r;
        self
    }

    pub fn with_db_delay(mut self, r: DelayRange) -> Self {
        self.db_delay = r;
        self
    }

    pub fn with_out_file(mut self, path: impl Into<String>) -> Self {
        self.out_file = path.into();
        self
    }

    pub fn with_summary_file(mut self, path: impl Into<String>) -> Self {
        self.summary_file = path.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Apply fallbacks and clamps, and reject inverted delay ranges.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.nodes == 0 {
            self.nodes = FALLBACK_NODES;
        }
        if self.workers == 0 {
            self.workers = FALLBACK_WORKERS;
        }
        self.tamper_percent = clamp_percent(self.tamper_percent);
        self.fail_percent = clamp_percent(self.fail_percent);

        for (name, r) in [
            ("net-ta-node", self.net_ta_node),
            ("net-node-mw", self.net_node_mw),
            ("db-delay", self.db_delay),
        ] {
            if !r.is_valid() {
                return Err(ConfigError::InvalidRange {
                    name,
                    min: r.min_ms,
                    max: r.max_ms,
                });
            }
        }
        Ok(self)
    }

    /// Workers actually spawned: `workers` clamped to `[1, nodes]`.
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, self.nodes.max(1))
    }

    pub fn start_jitter(&self) -> DelayRange {
        DelayRange::up_to(self.node_jitter_ms)
    }
}

/// Map a signed count from the command line onto a usize, `0` for non-positive.
pub fn non_negative(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 100.0)
    }
}
