//! Ethereum JSON-RPC ledger client for a local development node
//! (Ganache, Anvil, Hardhat) with unlocked accounts.

use alloy_primitives::Address;
use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

use super::{
    ContractArtifact, ContractCall, ContractKind, Deployment, LedgerClient, TxHandle, TxOutcome,
    TxReceipt,
};
use crate::error::{BenchError, BenchResult, LedgerError};

/// JSON-RPC backed [`LedgerClient`].
///
/// Transactions are sent with `eth_sendTransaction` from node-managed
/// accounts; receipts are polled until the node reports them, with no upper
/// bound on the wait.
pub struct RpcLedger {
    client: reqwest::Client,
    rpc_url: String,
    gas_limit: u64,
    receipt_poll: Duration,
    artifacts: HashMap<ContractKind, ContractArtifact>,
    /// Kind of every contract deployed through this client.
    deployed: Mutex<HashMap<Address, ContractKind>>,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(rpc_url: &str, gas_limit: u64, receipt_poll: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
            gas_limit,
            receipt_poll,
            artifacts: HashMap::new(),
            deployed: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers the compiled contract deployed for `kind`.
    pub fn with_artifact(mut self, kind: ContractKind, artifact: ContractArtifact) -> Self {
        self.artifacts.insert(kind, artifact);
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn artifact(&self, kind: ContractKind) -> BenchResult<&ContractArtifact> {
        self.artifacts.get(&kind).ok_or_else(|| {
            BenchError::InvalidParameter(format!("no artifact registered for {} contract", kind))
        })
    }

    async fn request(&self, method: &str, params: Value) -> BenchResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        let body: Value = response.json().await?;
        rpc_result(method, body)
    }

    async fn send_transaction(&self, tx: Value) -> BenchResult<TxHandle> {
        let result = self.request("eth_sendTransaction", json!([tx])).await?;
        let hash = result.as_str().ok_or_else(|| LedgerError::Decode {
            what: "transaction hash".to_string(),
            reason: format!("expected string, got {}", result),
        })?;
        Ok(TxHandle(hash.to_string()))
    }

    /// Polls until the receipt exists. A failed status is reported as a
    /// revert of `label`.
    async fn wait_for_receipt(&self, handle: &TxHandle, label: &str) -> BenchResult<Value> {
        loop {
            let receipt = self
                .request("eth_getTransactionReceipt", json!([handle.0]))
                .await?;
            match check_receipt(receipt, handle, label)? {
                Some(receipt) => return Ok(receipt),
                None => {
                    debug!("receipt for {} not available yet", handle);
                    sleep(self.receipt_poll).await;
                }
            }
        }
    }

    fn transaction(&self, from: Address, to: Option<Address>, data: &[u8], value: u128) -> Value {
        let mut tx = json!({
            "from": from.to_string(),
            "data": format!("0x{}", hex::encode(data)),
            "gas": format!("0x{:x}", self.gas_limit),
            "value": format!("0x{:x}", value),
        });
        if let Some(to) = to {
            tx["to"] = json!(to.to_string());
        }
        tx
    }
}

/// Unwraps a JSON-RPC response body into its `result`.
fn rpc_result(method: &str, mut body: Value) -> BenchResult<Value> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(LedgerError::Rpc {
            method: method.to_string(),
            message,
        }
        .into());
    }
    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(LedgerError::Decode {
            what: format!("{} response", method),
            reason: "missing result".to_string(),
        }
        .into()),
    }
}

/// `None` while the transaction is still pending. A failed status is
/// reported as a revert of `label`.
fn check_receipt(receipt: Value, handle: &TxHandle, label: &str) -> BenchResult<Option<Value>> {
    if receipt.is_null() {
        return Ok(None);
    }
    if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
        return Err(LedgerError::Reverted {
            method: label.to_string(),
            handle: handle.0.clone(),
        }
        .into());
    }
    Ok(Some(receipt))
}

fn contract_address(receipt: &Value, handle: &TxHandle) -> BenchResult<Address> {
    receipt
        .get("contractAddress")
        .and_then(Value::as_str)
        .and_then(|s| Address::from_str(s).ok())
        .ok_or_else(|| {
            LedgerError::Decode {
                what: "contractAddress".to_string(),
                reason: format!("deployment {} returned no address", handle),
            }
            .into()
        })
}

fn quantity(receipt: &Value, field: &str) -> BenchResult<u128> {
    let raw = receipt
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::Decode {
            what: field.to_string(),
            reason: "missing quantity".to_string(),
        })?;
    parse_quantity(raw).map_err(|reason| {
        LedgerError::Decode {
            what: field.to_string(),
            reason,
        }
        .into()
    })
}

/// Parses a hex JSON-RPC quantity such as `0x5208`.
pub fn parse_quantity(raw: &str) -> Result<u128, String> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| format!("{:?} is not a hex quantity", raw))?;
    if digits.is_empty() {
        return Err("empty quantity".to_string());
    }
    u128::from_str_radix(digits, 16).map_err(|e| format!("{:?}: {}", raw, e))
}

fn gas_used(receipt: &Value) -> BenchResult<u64> {
    let gas = quantity(receipt, "gasUsed")?;
    u64::try_from(gas).map_err(|_| {
        LedgerError::Decode {
            what: "gasUsed".to_string(),
            reason: format!("{} exceeds u64", gas),
        }
        .into()
    })
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn get_accounts(&self) -> BenchResult<Vec<Address>> {
        let result = self.request("eth_accounts", json!([])).await?;
        let entries = result.as_array().ok_or_else(|| LedgerError::Decode {
            what: "eth_accounts".to_string(),
            reason: "expected an array".to_string(),
        })?;
        entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .and_then(|s| Address::from_str(s).ok())
                    .ok_or_else(|| {
                        LedgerError::Decode {
                            what: "account".to_string(),
                            reason: entry.to_string(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    async fn get_unit_price(&self) -> BenchResult<u128> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        let raw = result.as_str().ok_or_else(|| LedgerError::Decode {
            what: "gas price".to_string(),
            reason: format!("expected string, got {}", result),
        })?;
        parse_quantity(raw).map_err(|reason| {
            LedgerError::Decode {
                what: "gas price".to_string(),
                reason,
            }
            .into()
        })
    }

    async fn get_transaction_receipt(&self, handle: &TxHandle) -> BenchResult<TxReceipt> {
        let receipt = self.wait_for_receipt(handle, "receipt lookup").await?;
        Ok(TxReceipt {
            gas_used: gas_used(&receipt)?,
        })
    }

    async fn deploy_contract(&self, kind: ContractKind, deployer: Address) -> BenchResult<Deployment> {
        let artifact = self.artifact(kind)?;
        let tx = self.transaction(deployer, None, &artifact.bytecode, 0);
        let handle = self.send_transaction(tx).await?;
        let receipt = self.wait_for_receipt(&handle, "deploy").await?;

        let address = contract_address(&receipt, &handle)?;

        self.deployed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(address, kind);
        debug!("deployed {} contract {} at {}", kind, artifact.name, address);
        Ok(Deployment { handle, address })
    }

    async fn submit_transaction(
        &self,
        contract: Address,
        call: &ContractCall,
        from: Address,
        value: u128,
    ) -> BenchResult<TxOutcome> {
        let kind = self
            .deployed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&contract)
            .copied()
            .ok_or_else(|| {
                BenchError::InvalidParameter(format!("{} was not deployed by this client", contract))
            })?;

        let data = self.artifact(kind)?.encode_call(call)?;
        let tx = self.transaction(from, Some(contract), &data, value);

        let handle = self.send_transaction(tx).await?;
        let receipt = self.wait_for_receipt(&handle, call.method).await?;
        Ok(TxOutcome {
            gas_used: gas_used(&receipt)?,
            handle,
        })
    }
}
