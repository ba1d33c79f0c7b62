//! Ledger collaborator: accounts, gas price quotes, deployments and
//! contract calls.
//!
//! The benchmark only depends on the [`LedgerClient`] trait. [`RpcLedger`]
//! is the production implementation talking Ethereum JSON-RPC to a local
//! development node.

pub mod artifact;
pub mod rpc;

pub use artifact::ContractArtifact;
pub use rpc::RpcLedger;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::fmt;

use crate::error::BenchResult;

/// Contracts the harness knows how to deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// The watchtower-assisted payment channel under test.
    Channel,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Channel => write!(f, "channel"),
        }
    }
}

/// Opaque handle of a submitted transaction (its hash on RPC ledgers).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contract method invocation with its positional arguments.
///
/// Integer arguments may be built at any width; they are narrowed to the
/// slot types of the deployed contract's ABI when the call is encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub method: &'static str,
    pub args: Vec<DynSolValue>,
}

impl ContractCall {
    pub fn new(method: &'static str, args: Vec<DynSolValue>) -> Self {
        Self { method, args }
    }
}

/// Receipt data the harness cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub gas_used: u64,
}

/// Result of a contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub handle: TxHandle,
    pub address: Address,
}

/// Result of a mined, successful contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub handle: TxHandle,
    pub gas_used: u64,
}

/// Capabilities the benchmark needs from a ledger node.
///
/// Every method resolves only once the node has answered; a reverted
/// transaction is reported as an error, never as an outcome.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Unlocked accounts, in the node's order.
    async fn get_accounts(&self) -> BenchResult<Vec<Address>>;

    /// Current price of one gas unit, in wei.
    async fn get_unit_price(&self) -> BenchResult<u128>;

    async fn get_transaction_receipt(&self, handle: &TxHandle) -> BenchResult<TxReceipt>;

    /// Deploys a fresh instance of `kind`, sent by `deployer`.
    async fn deploy_contract(&self, kind: ContractKind, deployer: Address) -> BenchResult<Deployment>;

    /// Sends `call` to `contract` from `from`, attaching `value` wei.
    async fn submit_transaction(
        &self,
        contract: Address,
        call: &ContractCall,
        from: Address,
        value: u128,
    ) -> BenchResult<TxOutcome>;
}
