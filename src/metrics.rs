//! Aggregate statistics over a finished run.

use std::time::Duration;

use crate::protocols::node::NodeOutcome;

/// Summary of one run. Time statistics cover completed (non-dropped) nodes
/// only; percentages are taken against the configured node count.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub nodes: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub dropped: usize,
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub median_us: u64,
    pub success_pct: f64,
    pub drop_pct: f64,
    pub wall_time: Duration,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[NodeOutcome], nodes: usize, wall_time: Duration) -> Self {
        let mut totals: Vec<u64> = Vec::with_capacity(outcomes.len());
        let mut succeeded = 0usize;
        let mut dropped = 0usize;

        for o in outcomes {
            if o.dropped {
                dropped += 1;
            } else {
                totals.push(o.elapsed_us);
            }
            if o.success {
                succeeded += 1;
            }
        }

        let (avg_us, min_us, max_us) = if totals.is_empty() {
            (0, 0, 0)
        } else {
            let sum: u128 = totals.iter().map(|&x| x as u128).sum();
            (
                (sum / totals.len() as u128) as u64,
                totals.iter().copied().min().unwrap_or(0),
                totals.iter().copied().max().unwrap_or(0),
            )
        };

        Self {
            nodes,
            completed: totals.len(),
            succeeded,
            dropped,
            avg_us,
            min_us,
            max_us,
            median_us: median_us(totals),
            success_pct: pct(succeeded, nodes),
            drop_pct: pct(dropped, nodes),
            wall_time,
        }
    }

    /// Completed nodes whose token was rejected.
    pub fn rejected(&self) -> usize {
        self.completed - self.succeeded.min(self.completed)
    }
}

/// Middle value, or the integer mean of the two middle values; `0` if empty.
pub fn median_us(mut xs: Vec<u64>) -> u64 {
    if xs.is_empty() {
        return 0;
    }
    xs.sort_unstable();
    let n = xs.len();
    if n % 2 == 1 {
        xs[n / 2]
    } else {
        ((xs[n / 2 - 1] as u128 + xs[n / 2] as u128) / 2) as u64
    }
}

fn pct(count: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        100.0 * count as f64 / of as f64
    }
}
