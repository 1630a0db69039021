//! Fixed worker pool driving node simulations.
//!
//! Workers claim node indices from a shared atomic counter, so every index in
//! `[0, nodes)` is simulated exactly once whatever the worker count. Outcomes
//! go into a mutex-guarded [`ResultCollector`], which is only read after all
//! workers have joined.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::crypto::KeyMaterial;
use crate::error::{Result, SimError};
use crate::latency::LatencyModel;
use crate::protocols::node::{NodeOutcome, NodeSimulator};
use crate::rng::{self, RandomSource};

/// Exactly-once distribution of indices `0..total`.
#[derive(Debug)]
pub struct WorkQueue {
    next: AtomicUsize,
    total: usize,
}

impl WorkQueue {
    pub fn new(total: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            total,
        }
    }

    /// Next unclaimed index, or `None` once all have been handed out.
    pub fn claim(&self) -> Option<usize> {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        (i < self.total).then_some(i)
    }
}

/// Append-only outcome sink shared by all workers.
#[derive(Debug, Default)]
pub struct ResultCollector {
    outcomes: Mutex<Vec<NodeOutcome>>,
}

impl ResultCollector {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            outcomes: Mutex::new(Vec::with_capacity(n)),
        }
    }

    pub fn append(&self, outcome: NodeOutcome) {
        self.outcomes.lock().push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the collector. Order is whatever order appends happened in.
    pub fn drain_all(self) -> Vec<NodeOutcome> {
        self.outcomes.into_inner()
    }
}

/// Everything a finished run hands to aggregation.
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub outcomes: Vec<NodeOutcome>,
    pub wall_time: Duration,
    /// Workers actually spawned.
    pub workers: usize,
    pub seed: u64,
}

pub struct WorkerPool<'a> {
    config: &'a Config,
    keys: &'a KeyMaterial,
    node_keys: &'a KeyMaterial,
    latency: &'a dyn LatencyModel,
}

impl<'a> WorkerPool<'a> {
    pub fn new(config: &'a Config, keys: &'a KeyMaterial, latency: &'a dyn LatencyModel) -> Self {
        Self {
            config,
            keys,
            node_keys: keys,
            latency,
        }
    }

    /// Keys every simulated node is provisioned with, see
    /// [`NodeSimulator::with_node_keys`].
    pub fn with_node_keys(mut self, node_keys: &'a KeyMaterial) -> Self {
        self.node_keys = node_keys;
        self
    }

    /// Simulate every node and block until all workers have exited.
    pub fn run(&self) -> Result<RunOutput> {
        let workers = self.config.effective_workers();
        let seed = self.config.seed.unwrap_or_else(rng::os_seed);
        let queue = WorkQueue::new(self.config.nodes);
        let sink = ResultCollector::with_capacity(self.config.nodes);
        let abort = AtomicBool::new(false);

        info!(nodes = self.config.nodes, workers, seed, "starting run");
        let t0 = Instant::now();

        let joined: Vec<Result<usize>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let (queue, sink, abort) = (&queue, &sink, &abort);
                    s.spawn(move || self.worker_loop(w, seed, queue, sink, abort))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(w, h)| h.join().map_err(|_| SimError::WorkerPanicked(w)).and_then(|r| r))
                .collect()
        });

        let wall_time = t0.elapsed();

        // first failure wins; the others are usually knock-on aborts
        for r in joined {
            r?;
        }

        let outcomes = sink.drain_all();
        info!(
            outcomes = outcomes.len(),
            wall_ms = wall_time.as_millis() as u64,
            "run finished"
        );

        Ok(RunOutput {
            outcomes,
            wall_time,
            workers,
            seed,
        })
    }

    fn worker_loop(
        &self,
        worker: usize,
        seed: u64,
        queue: &WorkQueue,
        sink: &ResultCollector,
        abort: &AtomicBool,
    ) -> Result<usize> {
        let mut rng = RandomSource::for_worker(seed, worker);
        let sim = NodeSimulator::new(self.config, self.keys, self.latency).with_node_keys(self.node_keys);
        let mut done = 0usize;

        while !abort.load(Ordering::Relaxed) {
            let Some(index) = queue.claim() else { break };
            match sim.run(index, &mut rng) {
                Ok(outcome) => {
                    sink.append(outcome);
                    done += 1;
                }
                Err(e) => {
                    error!(worker, node = index, error = %e, "node failed, aborting run");
                    abort.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        debug!(worker, nodes = done, "worker exiting");
        Ok(done)
    }
}
