//! Middleware side: the structured request format and token validation.

use rand_core::{CryptoRng, RngCore};

use crate::crypto::{self, KeyMaterial};
use crate::error::CryptoError;
use crate::protocols::ta::{self, IssuedToken, TOKEN_MARKER};

const HEADER_OPEN: &str = "HEADER[";

/// `HEADER[NODE_ID:<id>;TOKEN:<token>]|BODY[<payload>]`
pub fn build_request(node_id: &str, token: &str, body: &str) -> String {
    format!("{HEADER_OPEN}NODE_ID:{node_id};{TOKEN_MARKER}{token}]|BODY[{body}]")
}

/// Token inside the `HEADER[...]` section, or empty if absent.
pub fn header_token(request: &str) -> &str {
    let Some(start) = request.find(HEADER_OPEN).map(|p| p + HEADER_OPEN.len()) else {
        return "";
    };
    let Some(len) = request[start..].find(']') else {
        return "";
    };
    ta::extract_token(&request[start..start + len])
}

/// Node side of the last hop: encrypt the request under the Node-MW key.
pub fn seal_request(
    keys: &KeyMaterial,
    request: &str,
    rng: &mut (impl RngCore + CryptoRng),
) -> String {
    crypto::encrypt(&keys.node_mw, request.as_bytes(), rng)
}

/// What the middleware saw while validating one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validation {
    pub expected: String,
    pub submitted: String,
}

impl Validation {
    pub fn accepted(&self) -> bool {
        self.submitted == self.expected
    }
}

/// Recover the expected token from the TA's attestation and the submitted one
/// from the node's request, and compare them.
pub fn validate(
    keys: &KeyMaterial,
    issued: &IssuedToken,
    sealed_request: &str,
) -> Result<Validation, CryptoError> {
    let from_ta = crypto::decrypt_str(&keys.ta_mw, &issued.enc_for_mw)?;
    let request = crypto::decrypt_str(&keys.node_mw, sealed_request)?;

    Ok(Validation {
        expected: ta::extract_token(&from_ta).to_string(),
        submitted: header_token(&request).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn request_layout() {
        assert_eq!(
            build_request("node-2", "ab12", "CC"),
            "HEADER[NODE_ID:node-2;TOKEN:ab12]|BODY[CC]"
        );
    }

    #[test]
    fn header_token_ignores_body() {
        let req = build_request("node-2", "ab12", "TOKEN:zz");
        assert_eq!(header_token(&req), "ab12");
        assert_eq!(header_token("BODY[x]"), "");
        assert_eq!(header_token("HEADER[TOKEN:abc"), "");
    }

    #[test]
    fn genuine_token_validates() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([4u8; 32]);
        let issued = ta::issue("node-9", &keys, &mut rng);
        let req = build_request("node-9", &issued.token, "JJJ");
        let sealed = seal_request(&keys, &req, &mut rng);

        let v = validate(&keys, &issued, &sealed).unwrap();
        assert!(v.accepted());
        assert_eq!(v.expected, issued.token);
    }

    #[test]
    fn substituted_token_is_rejected() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([5u8; 32]);
        let issued = ta::issue("node-9", &keys, &mut rng);
        let forged = crypto::random_token_hex(&mut rng);
        let sealed = seal_request(&keys, &build_request("node-9", &forged, ""), &mut rng);

        let v = validate(&keys, &issued, &sealed).unwrap();
        assert!(!v.accepted());
        assert_eq!(v.submitted, forged);
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let v = Validation {
            expected: "abcd".into(),
            submitted: "ABCD".into(),
        };
        assert!(!v.accepted());
    }

    #[test]
    fn corrupt_wire_is_an_error() {
        let keys = KeyMaterial::derive();
        let mut rng = ChaCha20Rng::from_seed([6u8; 32]);
        let issued = ta::issue("node-1", &keys, &mut rng);
        assert!(matches!(
            validate(&keys, &issued, "not-a-ciphertext"),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }
}
