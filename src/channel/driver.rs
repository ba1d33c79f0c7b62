//! Drives channel instances through their lifecycle and records the gas
//! spent by every transaction.
//!
//! The driver owns no ledger state of its own: each close variant starts from
//! [`ProtocolDriver::deploy`], which replaces the current session with a fresh
//! contract instance. Every call is awaited before the next one is issued.

use alloy_primitives::Address;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::requests::{
    ChannelRequest, ChannelState, StateClaim, VirtualClaim, VirtualState, VirtualTranscript,
};
use super::state::{ChannelPhase, ChannelSession};
use crate::config::{AccountingPolicy, BenchConfig, RoleKeys, ScenarioParams};
use crate::error::{BenchError, BenchResult};
use crate::ledger::{ContractKind, LedgerClient};
use crate::metrics::performance::Metric;
use crate::quorum::{Participants, QuorumParams};
use crate::signing::{SigningKey, SigningService};

/// Gas of one mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseGas {
    pub label: String,
    pub gas: u64,
}

/// Deployment and opening cost of one channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedChannel {
    pub deploy: u64,
    /// Both deposits, every watchtower stake and the `open` call.
    pub open: u64,
}

/// Raw gas of every metric for one committee size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCosts {
    pub quorum: QuorumParams,
    pub deploy: u64,
    pub open: u64,
    pub optimistic_close: u64,
    pub pessimistic_virtual_close: u64,
    pub pessimistic_close: u64,
    /// Every transaction of the scenario in submission order, unweighted.
    pub breakdown: Vec<PhaseGas>,
}

impl ScenarioCosts {
    pub fn gas(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Deploy => self.deploy,
            Metric::Open => self.open,
            Metric::OptimisticClose => self.optimistic_close,
            Metric::PessimisticVirtualClose => self.pessimistic_virtual_close,
            Metric::PessimisticClose => self.pessimistic_close,
        }
    }
}

pub struct ProtocolDriver<L, S> {
    ledger: Arc<L>,
    signer: S,
    keys: RoleKeys,
    scenario: ScenarioParams,
    accounting: AccountingPolicy,
    session: Option<ChannelSession>,
    breakdown: Vec<PhaseGas>,
}

impl<L, S> ProtocolDriver<L, S>
where
    L: LedgerClient,
    S: SigningService,
{
    pub fn new(ledger: Arc<L>, signer: S, config: &BenchConfig) -> Self {
        Self {
            ledger,
            signer,
            keys: config.keys.clone(),
            scenario: config.scenario.clone(),
            accounting: config.accounting,
            session: None,
            breakdown: Vec::new(),
        }
    }

    pub fn phase(&self) -> ChannelPhase {
        self.session
            .as_ref()
            .map(ChannelSession::phase)
            .unwrap_or(ChannelPhase::Uninitialized)
    }

    fn current(&self) -> BenchResult<&ChannelSession> {
        self.session.as_ref().ok_or_else(|| BenchError::OutOfOrder {
            expected: ChannelPhase::Deployed.to_string(),
            actual: ChannelPhase::Uninitialized.to_string(),
        })
    }

    /// Assigns roles for a committee of `committee_size` from the ledger's
    /// accounts.
    pub async fn participants(&self, committee_size: usize) -> BenchResult<Participants> {
        info!("Retrieving accounts");
        let accounts = self.ledger.get_accounts().await?;
        Participants::from_accounts(&accounts, committee_size)
    }

    fn sign(&self, contract: Address, sequence: u64, key: &SigningKey) -> BenchResult<Vec<u8>> {
        self.signer.sign(contract, sequence, key)
    }

    /// Sends `request` to the current contract and advances the session.
    ///
    /// The phase is checked before anything reaches the ledger.
    async fn submit(&mut self, request: ChannelRequest) -> BenchResult<u64> {
        let session = self.current()?;
        session.next_phase(&request)?;
        let contract = session.contract()?;
        let from = session.participants.address_of(request.sender())?;
        let call = request.to_call().ok_or_else(|| {
            BenchError::InvalidParameter(format!("{} is not a contract call", request))
        })?;

        let outcome = self
            .ledger
            .submit_transaction(contract, &call, from, request.value())
            .await?;

        if let Some(session) = self.session.as_mut() {
            session.advance(&request, None)?;
        }
        self.breakdown.push(PhaseGas {
            label: request.to_string(),
            gas: outcome.gas_used,
        });
        Ok(outcome.gas_used)
    }

    /// Deploys a fresh channel contract for `participants` and returns its
    /// deployment gas, read from the deployment receipt.
    pub async fn deploy(&mut self, participants: Participants) -> BenchResult<u64> {
        let mut session = ChannelSession::new(participants)?;
        let request = ChannelRequest::Deploy;
        session.next_phase(&request)?;
        let deployer = session.participants.address_of(request.sender())?;

        info!("Constructing channel contract");
        let deployment = self
            .ledger
            .deploy_contract(ContractKind::Channel, deployer)
            .await?;
        let receipt = self.ledger.get_transaction_receipt(&deployment.handle).await?;
        session.advance(&request, Some(deployment.address))?;

        warn!("Gas for deployment: {}", receipt.gas_used);
        self.session = Some(session);
        self.breakdown.push(PhaseGas {
            label: request.to_string(),
            gas: receipt.gas_used,
        });
        Ok(receipt.gas_used)
    }

    /// Payer deposit, registering `intermediary` and the watchtower set.
    pub async fn fund_primary(
        &mut self,
        intermediary: Address,
        watchtowers: &[Address],
        deposit: u128,
    ) -> BenchResult<u64> {
        let gas = self
            .submit(ChannelRequest::FundPrimary {
                intermediary,
                watchtowers: watchtowers.to_vec(),
                deposit,
            })
            .await?;
        warn!("Gas for payer fund: {}", gas);
        Ok(gas)
    }

    pub async fn fund_intermediary(&mut self, deposit: u128) -> BenchResult<u64> {
        let gas = self.submit(ChannelRequest::FundIntermediary { deposit }).await?;
        warn!("Gas for intermediary fund: {}", gas);
        Ok(gas)
    }

    /// Stake of watchtower `index`. Watchtowers fund in index order.
    pub async fn fund_watchtower(&mut self, index: usize, stake: u128) -> BenchResult<u64> {
        info!("Watchtower {} funding", index);
        let gas = self.submit(ChannelRequest::FundWatchtower { index, stake }).await?;
        info!("Gas for watchtower {}: {}", index, gas);
        Ok(gas)
    }

    pub async fn open(&mut self) -> BenchResult<u64> {
        let gas = self.submit(ChannelRequest::Open).await?;
        warn!("Gas for open call: {}", gas);
        Ok(gas)
    }

    /// Payer proposes the split, intermediary confirms. No watchtower
    /// involvement.
    pub async fn optimistic_close(&mut self) -> BenchResult<u64> {
        let amount = self.scenario.optimistic_close_amount;
        let payer = self
            .submit(ChannelRequest::OptimisticPayerClose { amount })
            .await?;
        let intermediary = self.submit(ChannelRequest::OptimisticIntermediaryClose).await?;
        let total = tally(payer, intermediary, 1)?;
        warn!("Gas used for optimistic close: {}", total);
        Ok(total)
    }

    /// `t` watchtowers claim the state signed by payer and intermediary, then
    /// the intermediary finalizes.
    ///
    /// Each claim is weighted by `claim_cost_multiplier` in the total.
    pub async fn pessimistic_close(&mut self) -> BenchResult<u64> {
        let (contract, threshold) = {
            let session = self.current()?;
            (session.contract()?, session.quorum.threshold)
        };
        let sequence = self.scenario.claim_sequence;
        let payer_sig = self.sign(contract, sequence, &self.keys.payer_key())?;
        let intermediary_sig = self.sign(contract, sequence, &self.keys.intermediary_key())?;

        let mut claims = 0u64;
        for index in 0..threshold {
            info!("Watchtower {} claiming state", index);
            let claim = StateClaim {
                sequence,
                payer_sig: payer_sig.clone(),
                intermediary_sig: intermediary_sig.clone(),
            };
            let gas = self
                .submit(ChannelRequest::WatchtowerClaim { index, claim })
                .await?;
            claims = tally(claims, gas, self.accounting.claim_cost_multiplier)?;
            warn!("Gas used by watchtower claim {}: {}", index, gas);
        }
        warn!("Gas used by watchtower claims in pessimistic close: {}", claims);

        let balances = self.scenario.channel_state;
        let state = ChannelState {
            payer_value: balances.payer_value,
            channel_value: balances.channel_value,
            sequence,
        };
        let close = self
            .submit(ChannelRequest::PessimisticClose { state, payer_sig })
            .await?;
        warn!("Gas used for final pessimistic close call: {}", close);
        tally(claims, close, 1)
    }

    /// Closes the virtual channel between payer and counterparty.
    ///
    /// Both parties' states must reach the quorum on their own, so the
    /// committee makes two rounds of `t` claims over watchtowers `0..t`.
    /// Each claim is weighted by `virtual_claim_cost_multiplier`.
    pub async fn pessimistic_virtual_close(&mut self) -> BenchResult<u64> {
        let (contract, quorum, participants) = {
            let session = self.current()?;
            (
                session.contract()?,
                session.quorum,
                session.participants.clone(),
            )
        };
        let sequence = self.scenario.virtual_claim_sequence;
        let payer_sig = self.sign(contract, sequence, &self.keys.payer_key())?;
        let counterparty_sig = self.sign(contract, sequence, &self.keys.counterparty_key())?;

        let mut claims = 0u64;
        for submitted in 0..quorum.virtual_claims() {
            let index = submitted % quorum.threshold;
            info!("Watchtower {} claiming virtual state", index);
            let claim = VirtualClaim {
                encrypted_state: self.scenario.encrypted_virtual_state.clone(),
                sequence,
                payer_sig: payer_sig.clone(),
                counterparty_sig: counterparty_sig.clone(),
            };
            let gas = self
                .submit(ChannelRequest::VirtualWatchtowerClaim { index, claim })
                .await?;
            claims = tally(claims, gas, self.accounting.virtual_claim_cost_multiplier)?;
            warn!(
                "Gas used by watchtower claim {} for virtual channel: {}",
                submitted, gas
            );
        }
        warn!(
            "Gas used by watchtower claims in pessimistic virtual channel close: {}",
            claims
        );

        let open_sequence = self.scenario.virtual_open_sequence;
        let balances = self.scenario.virtual_state;
        let transcript = VirtualTranscript {
            payer: participants.payer,
            counterparty: participants.counterparty,
            intermediary: participants.intermediary,
            channel_value: balances.channel_value,
            payer_value: balances.payer_value,
            payer_sig: self.sign(contract, open_sequence, &self.keys.payer_key())?,
            intermediary_sig: self.sign(contract, open_sequence, &self.keys.intermediary_key())?,
            counterparty_sig: self.sign(contract, open_sequence, &self.keys.counterparty_key())?,
        };
        let state = VirtualState {
            payer_value: balances.payer_value,
            channel_value: balances.channel_value,
            sequence,
        };
        let close = self
            .submit(ChannelRequest::PessimisticVirtualClose { transcript, state })
            .await?;
        warn!(
            "Gas used for final pessimistic virtual channel close call: {}",
            close
        );
        tally(claims, close, 1)
    }

    /// Deploys a fresh instance, funds it with every role and opens it.
    pub async fn open_channel(&mut self, participants: &Participants) -> BenchResult<OpenedChannel> {
        let deploy = self.deploy(participants.clone()).await?;

        let primary = self
            .fund_primary(
                participants.intermediary,
                &participants.watchtowers,
                self.scenario.payer_deposit,
            )
            .await?;
        let intermediary = self
            .fund_intermediary(self.scenario.intermediary_deposit)
            .await?;

        let mut watchtowers = 0u64;
        for index in 0..participants.committee_size() {
            let gas = self
                .fund_watchtower(index, self.scenario.watchtower_stake)
                .await?;
            watchtowers = tally(watchtowers, gas, 1)?;
        }
        warn!("Gas for watchtowers fund: {}", watchtowers);

        let open_call = self.open().await?;
        let open = [intermediary, watchtowers, open_call]
            .into_iter()
            .try_fold(primary, |total, gas| tally(total, gas, 1))?;
        warn!("Total open gas: {}", open);
        Ok(OpenedChannel { deploy, open })
    }

    /// Measures every metric for a committee of `committee_size`.
    ///
    /// Runs the optimistic, virtual and regular pessimistic close in that
    /// order, each on its own freshly opened instance. The deploy and open
    /// figures come from the first instance.
    pub async fn run_scenario(&mut self, committee_size: usize) -> BenchResult<ScenarioCosts> {
        let quorum = QuorumParams::for_committee(committee_size)?;
        info!(
            "n = {}, f = {}, t = {}",
            quorum.committee_size, quorum.fault_tolerance, quorum.threshold
        );
        let participants = self.participants(committee_size).await?;
        self.breakdown.clear();

        let opened = self.open_channel(&participants).await?;
        let optimistic_close = self.optimistic_close().await?;

        self.open_channel(&participants).await?;
        let pessimistic_virtual_close = self.pessimistic_virtual_close().await?;

        self.open_channel(&participants).await?;
        let pessimistic_close = self.pessimistic_close().await?;

        Ok(ScenarioCosts {
            quorum,
            deploy: opened.deploy,
            open: opened.open,
            optimistic_close,
            pessimistic_virtual_close,
            pessimistic_close,
            breakdown: std::mem::take(&mut self.breakdown),
        })
    }
}

/// `total + gas * weight`, refusing to wrap.
fn tally(total: u64, gas: u64, weight: u64) -> BenchResult<u64> {
    gas.checked_mul(weight)
        .and_then(|weighted| total.checked_add(weighted))
        .ok_or_else(|| {
            BenchError::InvalidParameter(format!(
                "gas total overflows adding {} gas weighted by {} to {}",
                gas, weight, total
            ))
        })
}
