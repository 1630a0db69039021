use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const TOKEN_LEN: usize = 16;

/// Separator between the hex IV and the hex ciphertext on the wire.
pub const WIRE_SEP: char = ':';

// AES-128-CBC with PKCS#7 padding (no auth)
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const PASS_TA_NODE: &str = "passphrase_ta_node_v1";
const PASS_NODE_MW: &str = "passphrase_node_mw_v1";
const PASS_TA_MW: &str = "passphrase_ta_mw_v1";

pub type Key = [u8; KEY_LEN];

/// SHA-256(passphrase) truncated to the AES-128 key length.
pub fn derive_key(passphrase: &str) -> Key {
    let digest = Sha256::digest(passphrase.as_bytes());
    let mut k = [0u8; KEY_LEN];
    k.copy_from_slice(&digest[..KEY_LEN]);
    k
}

/// The three channel keys, derived once and shared read-only by every worker.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// TA -> Node.
    pub ta_node: Key,
    /// Node -> MW.
    pub node_mw: Key,
    /// TA -> MW.
    pub ta_mw: Key,
}

impl KeyMaterial {
    /// Keys from the built-in passphrases.
    pub fn derive() -> Self {
        Self::from_passphrases(PASS_TA_NODE, PASS_NODE_MW, PASS_TA_MW)
    }

    pub fn from_passphrases(ta_node: &str, node_mw: &str, ta_mw: &str) -> Self {
        Self {
            ta_node: derive_key(ta_node),
            node_mw: derive_key(node_mw),
            ta_mw: derive_key(ta_mw),
        }
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Encrypt under a fresh random IV and render as `hex(iv):hex(ct)`.
pub fn encrypt(key: &Key, plaintext: &[u8], rng: &mut (impl RngCore + CryptoRng)) -> String {
    let iv = rand_bytes::<IV_LEN>(rng);
    let ct = Aes128CbcEnc::new(&(*key).into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut wire = String::with_capacity(2 * (IV_LEN + ct.len()) + 1);
    wire.push_str(&hex::encode(iv));
    wire.push(WIRE_SEP);
    wire.push_str(&hex::encode(ct));
    wire
}

pub fn decrypt(key: &Key, wire: &str) -> Result<Vec<u8>, CryptoError> {
    let (iv_hex, ct_hex) = wire
        .split_once(WIRE_SEP)
        .ok_or_else(|| CryptoError::MalformedCiphertext("missing separator".into()))?;

    let iv_bytes = hex::decode(iv_hex)
        .map_err(|e| CryptoError::MalformedCiphertext(format!("iv: {e}")))?;
    let ct = hex::decode(ct_hex)
        .map_err(|e| CryptoError::MalformedCiphertext(format!("ciphertext: {e}")))?;

    let iv: [u8; IV_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
        CryptoError::MalformedCiphertext(format!("iv length {} != {IV_LEN}", iv_bytes.len()))
    })?;

    Aes128CbcDec::new(&(*key).into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ct)
        .map_err(|_| CryptoError::Decryption)
}

/// [`decrypt`] for payloads that are text.
pub fn decrypt_str(key: &Key, wire: &str) -> Result<String, CryptoError> {
    let pt = decrypt(key, wire)?;
    String::from_utf8(pt).map_err(|_| CryptoError::InvalidUtf8)
}

pub fn rand_bytes<const N: usize>(rng: &mut impl RngCore) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out);
    out
}

/// Fresh random token, lowercase hex.
pub fn random_token_hex(rng: &mut (impl RngCore + CryptoRng)) -> String {
    hex::encode(rand_bytes::<TOKEN_LEN>(rng))
}

/// Per-stream seed derived from a master seed, a domain tag and an index.
pub fn seed_for(tag: &[u8], master: u64, index: usize) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(tag);
    h.update(&master.to_le_bytes());
    h.update(&(index as u64).to_le_bytes());
    *h.finalize().as_bytes()
}
