pub mod channel;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod quorum;
pub mod signing;
pub mod tools;

#[cfg(test)]
pub mod tests;

pub use config::BenchConfig;
pub use error::{BenchError, BenchResult, LedgerError};
