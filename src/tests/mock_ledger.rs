//! In-memory ledger for driver and sweep tests.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{BenchResult, LedgerError};
use crate::ledger::{
    ContractCall, ContractKind, Deployment, LedgerClient, TxHandle, TxOutcome, TxReceipt,
};
use crate::quorum::RESERVED_ACCOUNTS;
use crate::signing::{SigningKey, SigningService};

pub const DEPLOY_GAS: u64 = 3_500_000;
pub const FUND_PRIMARY_BASE_GAS: u64 = 90_000;
/// Extra `aliceFund` gas per registered watchtower.
pub const FUND_PRIMARY_PER_WATCHTOWER_GAS: u64 = 22_000;

/// A contract call as the mock saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub contract: Address,
    pub method: &'static str,
    pub from: Address,
    pub value: u128,
    pub args: Vec<DynSolValue>,
}

impl RecordedCall {
    /// Trailing watchtower index argument, for calls that take one.
    pub fn index_arg(&self) -> Option<usize> {
        self.args.iter().rev().find_map(|arg| match arg {
            DynSolValue::Uint(v, _) => usize::try_from(*v).ok(),
            _ => None,
        })
    }
}

/// Makes `method` revert on contracts registered for `committee_size`
/// watchtowers, optionally only for one index argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRule {
    pub method: &'static str,
    pub committee_size: usize,
    pub index: Option<usize>,
}

#[derive(Default)]
struct MockState {
    next_contract: u8,
    /// Watchtowers registered per contract by `aliceFund`.
    committees: HashMap<Address, Vec<Address>>,
    receipts: HashMap<String, u64>,
    calls: Vec<RecordedCall>,
    deployments: usize,
    price_queries: usize,
    next_tx: u64,
}

pub struct MockLedger {
    accounts: Vec<Address>,
    price: u128,
    gas_table: HashMap<&'static str, u64>,
    faults: Vec<FaultRule>,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Ledger exposing `account_count` unlocked accounts.
    pub fn new(account_count: usize) -> Self {
        let accounts = (0..account_count)
            .map(|i| {
                let mut bytes = [0u8; 20];
                bytes[0] = 0xa0;
                bytes[18..].copy_from_slice(&(i as u16).to_be_bytes());
                Address::from(bytes)
            })
            .collect();
        let gas_table = [
            ("fundingrid", 45_000),
            ("fundWatchtower", 48_000),
            ("open", 30_000),
            ("optimisticAliceClose", 35_000),
            ("optimisticIngridClose", 40_000),
            ("watchtowerClaimState", 50_000),
            ("pessimisticClose", 80_000),
            ("VirtualwatchtowerClaimState", 45_000),
            ("pessimisticVirtualChannelClose", 120_000),
        ]
        .into_iter()
        .collect();

        Self {
            accounts,
            price: 20_000_000_000,
            gas_table,
            faults: Vec::new(),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_price(mut self, price: u128) -> Self {
        self.price = price;
        self
    }

    pub fn with_gas(mut self, method: &'static str, gas: u64) -> Self {
        self.gas_table.insert(method, gas);
        self
    }

    pub fn fail_on(mut self, rule: FaultRule) -> Self {
        self.faults.push(rule);
        self
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn gas_of(&self, method: &str) -> u64 {
        self.gas_table.get(method).copied().unwrap_or(21_000)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    pub fn deployments(&self) -> usize {
        self.state.lock().unwrap().deployments
    }

    pub fn price_queries(&self) -> usize {
        self.state.lock().unwrap().price_queries
    }

    fn record_tx(state: &mut MockState, gas: u64) -> TxHandle {
        state.next_tx += 1;
        let handle = TxHandle(format!("0x{:064x}", state.next_tx));
        state.receipts.insert(handle.0.clone(), gas);
        handle
    }

    fn revert(call: &ContractCall, reason: &str) -> LedgerError {
        LedgerError::Reverted {
            method: call.method.to_string(),
            handle: reason.to_string(),
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_accounts(&self) -> BenchResult<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn get_unit_price(&self) -> BenchResult<u128> {
        self.state.lock().unwrap().price_queries += 1;
        Ok(self.price)
    }

    async fn get_transaction_receipt(&self, handle: &TxHandle) -> BenchResult<TxReceipt> {
        let state = self.state.lock().unwrap();
        let gas_used = state.receipts.get(&handle.0).copied().ok_or_else(|| LedgerError::Rpc {
            method: "eth_getTransactionReceipt".to_string(),
            message: format!("unknown transaction {}", handle),
        })?;
        Ok(TxReceipt { gas_used })
    }

    async fn deploy_contract(&self, _kind: ContractKind, _deployer: Address) -> BenchResult<Deployment> {
        let mut state = self.state.lock().unwrap();
        state.next_contract += 1;
        state.deployments += 1;
        let address = Address::with_last_byte(state.next_contract);
        let handle = Self::record_tx(&mut state, DEPLOY_GAS);
        Ok(Deployment { handle, address })
    }

    async fn submit_transaction(
        &self,
        contract: Address,
        call: &ContractCall,
        from: Address,
        value: u128,
    ) -> BenchResult<TxOutcome> {
        let mut state = self.state.lock().unwrap();
        let recorded = RecordedCall {
            contract,
            method: call.method,
            from,
            value,
            args: call.args.clone(),
        };
        state.calls.push(recorded.clone());

        if call.method == "aliceFund" {
            let watchtowers = match call.args.get(1) {
                Some(DynSolValue::Array(items)) => items
                    .iter()
                    .filter_map(|v| match v {
                        DynSolValue::Address(a) => Some(*a),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
                _ => return Err(Self::revert(call, "missing watchtower list").into()),
            };
            let gas = FUND_PRIMARY_BASE_GAS + FUND_PRIMARY_PER_WATCHTOWER_GAS * watchtowers.len() as u64;
            state.committees.insert(contract, watchtowers);
            let handle = Self::record_tx(&mut state, gas);
            return Ok(TxOutcome { handle, gas_used: gas });
        }

        let committee = state.committees.get(&contract).cloned().unwrap_or_default();

        // Watchtower calls must come from the watchtower they name.
        if matches!(
            call.method,
            "fundWatchtower" | "watchtowerClaimState" | "VirtualwatchtowerClaimState"
        ) {
            let index = recorded
                .index_arg()
                .ok_or_else(|| Self::revert(call, "missing index"))?;
            if committee.get(index) != Some(&from) {
                return Err(Self::revert(call, "sender is not the indexed watchtower").into());
            }
        }

        for rule in &self.faults {
            if rule.method == call.method
                && rule.committee_size == committee.len()
                && rule.index.map_or(true, |i| recorded.index_arg() == Some(i))
            {
                return Err(Self::revert(call, "injected fault").into());
            }
        }

        let gas = self.gas_of(call.method);
        let handle = Self::record_tx(&mut state, gas);
        Ok(TxOutcome { handle, gas_used: gas })
    }
}

/// Number of ledger accounts needed for committees up to `max_committee`.
pub fn accounts_for(max_committee: usize) -> usize {
    RESERVED_ACCOUNTS + max_committee
}

/// Signer that records what it was asked to sign and returns a fixed-length
/// placeholder signature.
#[derive(Default)]
pub struct RecordingSigner {
    requests: Mutex<Vec<(Address, u64, String)>>,
}

impl RecordingSigner {
    pub fn requests(&self) -> Vec<(Address, u64, String)> {
        self.requests.lock().unwrap().clone()
    }
}

impl SigningService for RecordingSigner {
    fn sign(&self, contract: Address, sequence: u64, key: &SigningKey) -> BenchResult<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((contract, sequence, key.as_hex().to_string()));
        Ok(vec![sequence as u8; 65])
    }
}

impl SigningService for std::sync::Arc<RecordingSigner> {
    fn sign(&self, contract: Address, sequence: u64, key: &SigningKey) -> BenchResult<Vec<u8>> {
        self.as_ref().sign(contract, sequence, key)
    }
}
