use rand_core::{CryptoRng, RngCore};

use crate::crypto::{self, KeyMaterial};

pub const TOKEN_MARKER: &str = "TOKEN:";

/// One token and its two independently encrypted attestations.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    /// `NODE_ID:<id>;TOKEN:<token>` under the TA-Node key.
    pub enc_for_node: String,
    /// `MW_EXPECTS_NODE:<id>;TOKEN:<token>` under the TA-MW key.
    pub enc_for_mw: String,
}

pub fn node_payload(node_id: &str, token: &str) -> String {
    format!("NODE_ID:{node_id};{TOKEN_MARKER}{token}")
}

pub fn mw_payload(node_id: &str, token: &str) -> String {
    format!("MW_EXPECTS_NODE:{node_id};{TOKEN_MARKER}{token}")
}

/// Issue a fresh token for `node_id`.
pub fn issue(
    node_id: &str,
    keys: &KeyMaterial,
    rng: &mut (impl RngCore + CryptoRng),
) -> IssuedToken {
    let token = crypto::random_token_hex(rng);
    let enc_for_node = crypto::encrypt(&keys.ta_node, node_payload(node_id, &token).as_bytes(), rng);
    let enc_for_mw = crypto::encrypt(&keys.ta_mw, mw_payload(node_id, &token).as_bytes(), rng);
    IssuedToken { token, enc_for_node, enc_for_mw }
}

/// Text after the first `TOKEN:` marker, or empty if there is none.
pub fn extract_token(payload: &str) -> &str {
    payload
        .find(TOKEN_MARKER)
        .map(|p| &payload[p + TOKEN_MARKER.len()..])
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn both_views_carry_the_same_token() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let it = issue("node-4", &keys, &mut rng);

        let for_node = crypto::decrypt_str(&keys.ta_node, &it.enc_for_node).unwrap();
        let for_mw = crypto::decrypt_str(&keys.ta_mw, &it.enc_for_mw).unwrap();

        assert_eq!(for_node, format!("NODE_ID:node-4;TOKEN:{}", it.token));
        assert_eq!(for_mw, format!("MW_EXPECTS_NODE:node-4;TOKEN:{}", it.token));
        assert_eq!(extract_token(&for_node), extract_token(&for_mw));
    }

    #[test]
    fn views_are_bound_to_their_keys() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([2u8; 32]);
        let it = issue("node-0", &keys, &mut rng);
        let wrong = crypto::decrypt(&keys.ta_mw, &it.enc_for_node);
        assert!(wrong.map_or(true, |pt| pt != node_payload("node-0", &it.token).into_bytes()));
    }

    #[test]
    fn tokens_are_fresh_per_issue() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([3u8; 32]);
        let a = issue("node-1", &keys, &mut rng);
        let b = issue("node-1", &keys, &mut rng);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn extract_token_without_marker_is_empty() {
        assert_eq!(extract_token("NODE_ID:node-1"), "");
        assert_eq!(extract_token("A;TOKEN:abc"), "abc");
    }
}
