//! Lifecycle of one channel instance.

use alloy_primitives::Address;
use std::fmt;

use super::requests::ChannelRequest;
use crate::error::{BenchError, BenchResult};
use crate::quorum::{Participants, QuorumParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Uninitialized,
    Deployed,
    PayerFunded,
    IntermediaryFunded,
    /// `k` watchtowers have staked.
    WatchtowersFunded(usize),
    Open,
    OptimisticCloseInProgress,
    /// `k` watchtower claims submitted.
    WatchtowerClaims(usize),
    PessimisticClosePending,
    /// `k` virtual channel claims submitted, across both rounds.
    VirtualWatchtowerClaims(usize),
    PessimisticVirtualClosePending,
    Closed,
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPhase::WatchtowersFunded(k) => write!(f, "WatchtowersFunded({})", k),
            ChannelPhase::WatchtowerClaims(k) => write!(f, "WatchtowerClaims({})", k),
            ChannelPhase::VirtualWatchtowerClaims(k) => write!(f, "VirtualWatchtowerClaims({})", k),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One deployed channel together with its committee and current phase.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    pub participants: Participants,
    pub quorum: QuorumParams,
    contract: Option<Address>,
    phase: ChannelPhase,
}

impl ChannelSession {
    pub fn new(participants: Participants) -> BenchResult<Self> {
        let quorum = QuorumParams::for_committee(participants.committee_size())?;
        Ok(Self {
            participants,
            quorum,
            contract: None,
            phase: ChannelPhase::Uninitialized,
        })
    }

    pub fn phase(&self) -> ChannelPhase {
        self.phase
    }

    /// Address of the deployed contract.
    pub fn contract(&self) -> BenchResult<Address> {
        self.contract.ok_or_else(|| BenchError::OutOfOrder {
            expected: ChannelPhase::Deployed.to_string(),
            actual: self.phase.to_string(),
        })
    }

    /// Phase reached if `request` succeeds from the current phase.
    ///
    /// Watchtowers must act in index order: funding runs over `0..n`, claims
    /// over `0..t`, and the virtual close makes two rounds over `0..t`.
    pub fn next_phase(&self, request: &ChannelRequest) -> BenchResult<ChannelPhase> {
        let n = self.quorum.committee_size;
        let t = self.quorum.threshold;
        let virtual_claims = self.quorum.virtual_claims();

        let next = match (self.phase, request) {
            (ChannelPhase::Uninitialized, ChannelRequest::Deploy) => Some(ChannelPhase::Deployed),
            (ChannelPhase::Deployed, ChannelRequest::FundPrimary { .. }) => {
                Some(ChannelPhase::PayerFunded)
            }
            (ChannelPhase::PayerFunded, ChannelRequest::FundIntermediary { .. }) => {
                Some(ChannelPhase::IntermediaryFunded)
            }
            (ChannelPhase::IntermediaryFunded, ChannelRequest::FundWatchtower { index: 0, .. }) => {
                Some(ChannelPhase::WatchtowersFunded(1))
            }
            (ChannelPhase::WatchtowersFunded(k), ChannelRequest::FundWatchtower { index, .. })
                if *index == k && k < n =>
            {
                Some(ChannelPhase::WatchtowersFunded(k + 1))
            }
            (ChannelPhase::WatchtowersFunded(k), ChannelRequest::Open) if k == n => {
                Some(ChannelPhase::Open)
            }
            (ChannelPhase::Open, ChannelRequest::OptimisticPayerClose { .. }) => {
                Some(ChannelPhase::OptimisticCloseInProgress)
            }
            (ChannelPhase::OptimisticCloseInProgress, ChannelRequest::OptimisticIntermediaryClose) => {
                Some(ChannelPhase::Closed)
            }
            (ChannelPhase::Open, ChannelRequest::WatchtowerClaim { index: 0, .. }) => {
                Some(claims_phase(1, t))
            }
            (ChannelPhase::WatchtowerClaims(k), ChannelRequest::WatchtowerClaim { index, .. })
                if *index == k =>
            {
                Some(claims_phase(k + 1, t))
            }
            (ChannelPhase::PessimisticClosePending, ChannelRequest::PessimisticClose { .. }) => {
                Some(ChannelPhase::Closed)
            }
            (ChannelPhase::Open, ChannelRequest::VirtualWatchtowerClaim { index: 0, .. }) => {
                Some(virtual_claims_phase(1, virtual_claims))
            }
            (
                ChannelPhase::VirtualWatchtowerClaims(k),
                ChannelRequest::VirtualWatchtowerClaim { index, .. },
            ) if *index == k % t => Some(virtual_claims_phase(k + 1, virtual_claims)),
            (
                ChannelPhase::PessimisticVirtualClosePending,
                ChannelRequest::PessimisticVirtualClose { .. },
            ) => Some(ChannelPhase::Closed),
            _ => None,
        };

        next.ok_or_else(|| BenchError::OutOfOrder {
            expected: format!("a phase accepting {}", request),
            actual: self.phase.to_string(),
        })
    }

    /// Records a successful `request`. `contract` is set on deployment.
    pub fn advance(&mut self, request: &ChannelRequest, contract: Option<Address>) -> BenchResult<()> {
        self.phase = self.next_phase(request)?;
        if contract.is_some() {
            self.contract = contract;
        }
        Ok(())
    }
}

fn claims_phase(submitted: usize, threshold: usize) -> ChannelPhase {
    if submitted >= threshold {
        ChannelPhase::PessimisticClosePending
    } else {
        ChannelPhase::WatchtowerClaims(submitted)
    }
}

fn virtual_claims_phase(submitted: usize, required: usize) -> ChannelPhase {
    if submitted >= required {
        ChannelPhase::PessimisticVirtualClosePending
    } else {
        ChannelPhase::VirtualWatchtowerClaims(submitted)
    }
}
