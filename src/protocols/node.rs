//! Per-node protocol run.
//!
//! One pass, no retries:
//! start jitter -> TA->Node hop -> drop check -> issue + decrypt ->
//! tamper check -> build request -> Node->MW hop + seal -> MW validate ->
//! DB delay -> done.

use tracing::trace;

use crate::config::Config;
use crate::crypto::{self, KeyMaterial};
use crate::error::Result;
use crate::latency::{LatencyModel, NodeClock};
use crate::protocols::{mw, ta};
use crate::rng::RandomSource;

const NODE_ID_BASE: &str = "node-";

/// Terminal record for one node index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeOutcome {
    pub index: usize,
    /// Wall time of the whole run for this node, in microseconds.
    pub elapsed_us: u64,
    /// Token validated at the middleware.
    pub success: bool,
    /// Request failed before reaching token issuance.
    pub dropped: bool,
}

pub fn node_id(index: usize) -> String {
    format!("{NODE_ID_BASE}{index}")
}

/// `payload_bytes` copies of a letter keyed by `index mod 26`.
pub fn filler(index: usize, payload_bytes: usize) -> String {
    let c = char::from(b'A' + (index % 26) as u8);
    std::iter::repeat(c).take(payload_bytes).collect()
}

pub struct NodeSimulator<'a> {
    config: &'a Config,
    /// Held by the TA and the middleware.
    keys: &'a KeyMaterial,
    /// What the node itself was provisioned with; normally the same set.
    node_keys: &'a KeyMaterial,
    latency: &'a dyn LatencyModel,
}

impl<'a> NodeSimulator<'a> {
    pub fn new(config: &'a Config, keys: &'a KeyMaterial, latency: &'a dyn LatencyModel) -> Self {
        Self {
            config,
            keys,
            node_keys: keys,
            latency,
        }
    }

    /// Provision the node with its own `ta_node` / `node_mw` keys.
    pub fn with_node_keys(mut self, node_keys: &'a KeyMaterial) -> Self {
        self.node_keys = node_keys;
        self
    }

    /// Run node `index` to completion. Only wire or decryption corruption is
    /// an error; drops and rejected tokens are ordinary outcomes.
    pub fn run(&self, index: usize, rng: &mut RandomSource) -> Result<NodeOutcome> {
        let cfg = self.config;
        let mut clock = NodeClock::start(self.latency);

        clock.wait(rng.delay(cfg.start_jitter()));
        clock.wait(rng.delay(cfg.net_ta_node));

        if rng.chance(cfg.fail_percent) {
            let out = NodeOutcome {
                index,
                elapsed_us: clock.elapsed_us(),
                success: false,
                dropped: true,
            };
            trace!(node = index, elapsed_us = out.elapsed_us, "dropped");
            return Ok(out);
        }

        let id = node_id(index);
        let issued = ta::issue(&id, self.keys, rng.entropy());

        let for_node = crypto::decrypt_str(&self.node_keys.ta_node, &issued.enc_for_node)
            .map_err(|e| e.at_node(index))?;
        let mut token = ta::extract_token(&for_node).to_string();

        let tampered = rng.chance(cfg.tamper_percent);
        if tampered {
            token = crypto::random_token_hex(rng.entropy());
        }

        let request = mw::build_request(&id, &token, &filler(index, cfg.payload_bytes));

        clock.wait(rng.delay(cfg.net_node_mw));
        let sealed = mw::seal_request(self.node_keys, &request, rng.entropy());

        let success = mw::validate(self.keys, &issued, &sealed)
            .map_err(|e| e.at_node(index))?
            .accepted();

        clock.wait(rng.delay(cfg.db_delay));

        let out = NodeOutcome {
            index,
            elapsed_us: clock.elapsed_us(),
            success,
            dropped: false,
        };
        trace!(node = index, elapsed_us = out.elapsed_us, success, tampered, "completed");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::{DelayRange, SyntheticLatency};

    fn sim_cfg() -> Config {
        Config::new(1)
            .with_node_jitter(10)
            .with_net_ta_node(DelayRange::new(5, 5))
            .with_net_node_mw(DelayRange::new(7, 7))
            .with_db_delay(DelayRange::new(11, 11))
            .with_payload_bytes(16)
    }

    #[test]
    fn honest_node_succeeds() {
        let cfg = sim_cfg();
        let keys = KeyMaterial::derive();
        let lat = SyntheticLatency::new();
        let mut rng = RandomSource::for_worker(1, 0);

        let out = NodeSimulator::new(&cfg, &keys, &lat).run(3, &mut rng).unwrap();
        assert_eq!(out.index, 3);
        assert!(out.success);
        assert!(!out.dropped);
        // jitter + three hops
        assert_eq!(lat.waits(), 4);
        assert!(out.elapsed_us >= 23_000);
    }

    #[test]
    fn dropped_node_stops_after_first_hop() {
        let cfg = sim_cfg().with_fail_percent(100.0);
        let keys = KeyMaterial::derive();
        let lat = SyntheticLatency::new();
        let mut rng = RandomSource::for_worker(1, 0);

        let out = NodeSimulator::new(&cfg, &keys, &lat).run(0, &mut rng).unwrap();
        assert!(out.dropped);
        assert!(!out.success);
        assert_eq!(lat.waits(), 2);
        assert!(out.elapsed_us >= 5_000);
    }

    #[test]
    fn tampered_node_fails_validation() {
        let cfg = sim_cfg().with_tamper_percent(100.0);
        let keys = KeyMaterial::derive();
        let lat = SyntheticLatency::new();
        let mut rng = RandomSource::for_worker(2, 0);

        let sim = NodeSimulator::new(&cfg, &keys, &lat);
        for i in 0..20 {
            let out = sim.run(i, &mut rng).unwrap();
            assert!(!out.success);
            assert!(!out.dropped);
        }
        // DB delay still applies to rejected requests
        assert_eq!(lat.waits(), 20 * 4);
    }

    #[test]
    fn middleware_with_wrong_key_never_accepts() {
        let keys = KeyMaterial::derive();
        let mut bad = keys.clone();
        bad.ta_mw = crypto::derive_key("someone else");
        let mut rng = RandomSource::for_worker(3, 0);

        let issued = ta::issue("node-0", &keys, rng.entropy());
        let req = mw::build_request("node-0", &issued.token, "");
        let sealed = mw::seal_request(&keys, &req, rng.entropy());
        match mw::validate(&bad, &issued, &sealed) {
            Err(_) => {}
            Ok(v) => assert!(!v.accepted()),
        }
    }

    #[test]
    fn misprovisioned_node_is_a_crypto_error() {
        let cfg = sim_cfg();
        let keys = KeyMaterial::derive();
        let wrong = KeyMaterial::from_passphrases("x", "y", "z");
        let lat = SyntheticLatency::new();
        let mut rng = RandomSource::for_worker(4, 0);

        let err = NodeSimulator::new(&cfg, &keys, &lat)
            .with_node_keys(&wrong)
            .run(9, &mut rng)
            .unwrap_err();
        assert!(matches!(err, crate::SimError::Crypto { node: 9, .. }));
    }

    #[test]
    fn filler_is_keyed_by_index() {
        assert_eq!(filler(0, 3), "AAA");
        assert_eq!(filler(27, 2), "BB");
        assert_eq!(filler(25, 1), "Z");
        assert_eq!(filler(5, 0), "");
    }
}
