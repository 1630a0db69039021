//! Error types for the token exchange simulation.
//!
//! Token mismatches and random drops are not errors; they are recorded as
//! ordinary outcomes. Everything in here aborts the run.

use thiserror::Error;

/// Crate-level error.
#[derive(Debug, Error)]
pub enum SimError {
    /// Rejected run parameters.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Wire decoding or decryption failed inside a node run.
    #[error("node {node}: {source}")]
    Crypto {
        node: usize,
        #[source]
        source: CryptoError,
    },

    /// A worker thread panicked before joining.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// Report output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating a [`crate::config::Config`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A delay range whose lower bound exceeds its upper bound.
    #[error("invalid {name} range: min {min} ms > max {max} ms")]
    InvalidRange {
        name: &'static str,
        min: u64,
        max: u64,
    },
}

/// Errors from the symmetric channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Missing `:` separator, bad hex, or an IV of the wrong length.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Padding check failed, typically a key mismatch.
    #[error("decryption failed")]
    Decryption,

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

impl CryptoError {
    /// Attach the node index this failure happened under.
    pub fn at_node(self, node: usize) -> SimError {
        SimError::Crypto { node, source: self }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
