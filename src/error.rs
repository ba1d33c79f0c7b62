//! Error taxonomy for the benchmark run.
//!
//! Nothing in the crate recovers locally: the first error surfaces to the
//! caller of the sweep and aborts the whole run.

use thiserror::Error;

/// Failures raised while talking to the ledger node.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The node answered with a JSON-RPC error object.
    #[error("rpc call {method} failed: {message}")]
    Rpc { method: String, message: String },

    /// The HTTP request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transaction was mined but reverted.
    #[error("transaction {handle} calling {method} reverted")]
    Reverted { method: String, handle: String },

    /// A response field was missing or malformed.
    #[error("could not decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Calldata could not be built from the contract ABI.
    #[error("abi encoding for {function} failed: {reason}")]
    Abi { function: String, reason: String },

    /// Gas multiplied by the unit price does not fit in 128 bits.
    #[error("cost of {gas} gas at price {price} overflows")]
    Overflow { gas: u64, price: u128 },
}

/// Top level error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A channel operation was issued in the wrong lifecycle phase.
    #[error("channel is in phase {actual}, expected {expected}")]
    OutOfOrder { expected: String, actual: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("could not persist {path}: {reason}")]
    Persistence { path: String, reason: String },
}

pub type BenchResult<T> = Result<T, BenchError>;

impl From<reqwest::Error> for BenchError {
    fn from(e: reqwest::Error) -> Self {
        BenchError::Ledger(LedgerError::Transport(e.to_string()))
    }
}
