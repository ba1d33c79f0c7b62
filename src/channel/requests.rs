//! Typed arguments for every channel contract call.
//!
//! Each [`ChannelRequest`] variant carries exactly what its contract method
//! needs and knows which role sends it and how much value it attaches. Struct
//! arguments are ABI tuples laid out in the contract's field order; the Rust
//! side keeps role names (payer, intermediary, counterparty) and each
//! `sol_value` notes the field names the contract was compiled with.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use std::fmt;

use crate::ledger::ContractCall;
use crate::quorum::Role;

/// Signed state update claimed by a watchtower on the base channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateClaim {
    pub sequence: u64,
    pub payer_sig: Vec<u8>,
    pub intermediary_sig: Vec<u8>,
}

impl StateClaim {
    /// `(autoIncrement, aliceSig, ingridSig)`
    fn sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.sequence),
            DynSolValue::Bytes(self.payer_sig.clone()),
            DynSolValue::Bytes(self.intermediary_sig.clone()),
        ])
    }
}

/// Signed, encrypted virtual channel state claimed by a watchtower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualClaim {
    pub encrypted_state: String,
    pub sequence: u64,
    pub payer_sig: Vec<u8>,
    pub counterparty_sig: Vec<u8>,
}

impl VirtualClaim {
    /// `(Encstate, autoIncrement, aliceSig, bobSig)`
    fn sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            DynSolValue::String(self.encrypted_state.clone()),
            uint(self.sequence),
            DynSolValue::Bytes(self.payer_sig.clone()),
            DynSolValue::Bytes(self.counterparty_sig.clone()),
        ])
    }
}

/// Closing balances of the base channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    pub payer_value: u64,
    pub channel_value: u64,
    pub sequence: u64,
}

impl ChannelState {
    /// `(aliceValue, channelValue, autoIncrement)`
    fn sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.payer_value),
            uint(self.channel_value),
            uint(self.sequence),
        ])
    }
}

/// Closing balances of the virtual channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualState {
    pub payer_value: u64,
    pub channel_value: u64,
    pub sequence: u64,
}

impl VirtualState {
    /// `(aliceValue, VchannelValue, autoIncrement)`
    fn sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.payer_value),
            uint(self.channel_value),
            uint(self.sequence),
        ])
    }
}

/// Opening transcript of the virtual channel, signed by all three parties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTranscript {
    pub payer: Address,
    pub counterparty: Address,
    pub intermediary: Address,
    pub channel_value: u64,
    pub payer_value: u64,
    pub payer_sig: Vec<u8>,
    pub intermediary_sig: Vec<u8>,
    pub counterparty_sig: Vec<u8>,
}

impl VirtualTranscript {
    /// `(Alice, Bob, Ingrid, VchannelValue, ValiceValue, aliceSig, ingridSig, bobSig)`
    fn sol_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            DynSolValue::Address(self.payer),
            DynSolValue::Address(self.counterparty),
            DynSolValue::Address(self.intermediary),
            uint(self.channel_value),
            uint(self.payer_value),
            DynSolValue::Bytes(self.payer_sig.clone()),
            DynSolValue::Bytes(self.intermediary_sig.clone()),
            DynSolValue::Bytes(self.counterparty_sig.clone()),
        ])
    }
}

/// Full-width integer; the encoder narrows it to the contract's slot.
fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}

/// One step of the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequest {
    Deploy,
    /// Payer deposit; registers the intermediary and the watchtower set.
    FundPrimary {
        intermediary: Address,
        watchtowers: Vec<Address>,
        deposit: u128,
    },
    FundIntermediary {
        deposit: u128,
    },
    FundWatchtower {
        index: usize,
        stake: u128,
    },
    Open,
    OptimisticPayerClose {
        amount: u64,
    },
    OptimisticIntermediaryClose,
    WatchtowerClaim {
        index: usize,
        claim: StateClaim,
    },
    PessimisticClose {
        state: ChannelState,
        payer_sig: Vec<u8>,
    },
    VirtualWatchtowerClaim {
        index: usize,
        claim: VirtualClaim,
    },
    PessimisticVirtualClose {
        transcript: VirtualTranscript,
        state: VirtualState,
    },
}

impl ChannelRequest {
    /// Contract method invoked by this request.
    pub fn method(&self) -> &'static str {
        match self {
            ChannelRequest::Deploy => "deploy",
            ChannelRequest::FundPrimary { .. } => "aliceFund",
            ChannelRequest::FundIntermediary { .. } => "fundingrid",
            ChannelRequest::FundWatchtower { .. } => "fundWatchtower",
            ChannelRequest::Open => "open",
            ChannelRequest::OptimisticPayerClose { .. } => "optimisticAliceClose",
            ChannelRequest::OptimisticIntermediaryClose => "optimisticIngridClose",
            ChannelRequest::WatchtowerClaim { .. } => "watchtowerClaimState",
            ChannelRequest::PessimisticClose { .. } => "pessimisticClose",
            ChannelRequest::VirtualWatchtowerClaim { .. } => "VirtualwatchtowerClaimState",
            ChannelRequest::PessimisticVirtualClose { .. } => "pessimisticVirtualChannelClose",
        }
    }

    /// Role that sends the transaction.
    pub fn sender(&self) -> Role {
        match self {
            ChannelRequest::Deploy
            | ChannelRequest::FundPrimary { .. }
            | ChannelRequest::Open
            | ChannelRequest::OptimisticPayerClose { .. } => Role::Payer,
            ChannelRequest::FundIntermediary { .. }
            | ChannelRequest::OptimisticIntermediaryClose
            | ChannelRequest::PessimisticClose { .. }
            | ChannelRequest::PessimisticVirtualClose { .. } => Role::Intermediary,
            ChannelRequest::FundWatchtower { index, .. }
            | ChannelRequest::WatchtowerClaim { index, .. }
            | ChannelRequest::VirtualWatchtowerClaim { index, .. } => Role::Watchtower(*index),
        }
    }

    /// Value attached to the transaction, in wei.
    pub fn value(&self) -> u128 {
        match self {
            ChannelRequest::FundPrimary { deposit, .. }
            | ChannelRequest::FundIntermediary { deposit } => *deposit,
            ChannelRequest::FundWatchtower { stake, .. } => *stake,
            _ => 0,
        }
    }

    /// Contract call for this request; `None` for the deployment, which is a
    /// contract creation rather than a call.
    pub fn to_call(&self) -> Option<ContractCall> {
        let method = self.method();
        let args = match self {
            ChannelRequest::Deploy => return None,
            ChannelRequest::FundPrimary {
                intermediary,
                watchtowers,
                ..
            } => vec![
                DynSolValue::Address(*intermediary),
                DynSolValue::Array(watchtowers.iter().copied().map(DynSolValue::Address).collect()),
            ],
            ChannelRequest::FundIntermediary { .. }
            | ChannelRequest::Open
            | ChannelRequest::OptimisticIntermediaryClose => vec![],
            ChannelRequest::FundWatchtower { index, .. } => vec![uint(*index as u64)],
            ChannelRequest::OptimisticPayerClose { amount } => vec![uint(*amount)],
            ChannelRequest::WatchtowerClaim { index, claim } => {
                vec![claim.sol_value(), uint(*index as u64)]
            }
            ChannelRequest::PessimisticClose { state, payer_sig } => vec![
                state.sol_value(),
                DynSolValue::Bytes(payer_sig.clone()),
                DynSolValue::Array(vec![]),
            ],
            ChannelRequest::VirtualWatchtowerClaim { index, claim } => {
                vec![claim.sol_value(), uint(*index as u64)]
            }
            ChannelRequest::PessimisticVirtualClose { transcript, state } => {
                vec![transcript.sol_value(), state.sol_value(), DynSolValue::Array(vec![])]
            }
        };
        Some(ContractCall::new(method, args))
    }
}

impl fmt::Display for ChannelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRequest::FundWatchtower { index, .. }
            | ChannelRequest::WatchtowerClaim { index, .. }
            | ChannelRequest::VirtualWatchtowerClaim { index, .. } => {
                write!(f, "{}[{}]", self.method(), index)
            }
            _ => write!(f, "{}", self.method()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> StateClaim {
        StateClaim {
            sequence: 3,
            payer_sig: vec![1; 65],
            intermediary_sig: vec![2; 65],
        }
    }

    #[test]
    fn senders_and_values() {
        let fund = ChannelRequest::FundWatchtower { index: 4, stake: 50 };
        assert_eq!(fund.sender(), Role::Watchtower(4));
        assert_eq!(fund.value(), 50);
        assert_eq!(fund.to_string(), "fundWatchtower[4]");

        let close = ChannelRequest::PessimisticClose {
            state: ChannelState { payer_value: 10, channel_value: 17, sequence: 3 },
            payer_sig: vec![],
        };
        assert_eq!(close.sender(), Role::Intermediary);
        assert_eq!(close.value(), 0);
    }

    #[test]
    fn deploy_has_no_call() {
        assert!(ChannelRequest::Deploy.to_call().is_none());
        assert_eq!(ChannelRequest::Deploy.sender(), Role::Payer);
    }

    #[test]
    fn fund_primary_registers_watchtowers() {
        let watchtowers = vec![Address::with_last_byte(3), Address::with_last_byte(4)];
        let call = ChannelRequest::FundPrimary {
            intermediary: Address::with_last_byte(1),
            watchtowers: watchtowers.clone(),
            deposit: 15,
        }
        .to_call()
        .unwrap();
        assert_eq!(call.method, "aliceFund");
        assert_eq!(call.args[0], DynSolValue::Address(Address::with_last_byte(1)));
        assert_eq!(
            call.args[1],
            DynSolValue::Array(watchtowers.into_iter().map(DynSolValue::Address).collect())
        );
    }

    #[test]
    fn claim_follows_contract_field_order() {
        let call = ChannelRequest::WatchtowerClaim { index: 2, claim: claim() }
            .to_call()
            .unwrap();
        assert_eq!(call.args.len(), 2);
        assert_eq!(
            call.args[0],
            DynSolValue::Tuple(vec![
                uint(3),
                DynSolValue::Bytes(vec![1; 65]),
                DynSolValue::Bytes(vec![2; 65]),
            ])
        );
        assert_eq!(call.args[1], uint(2));
    }

    #[test]
    fn virtual_claim_sends_encrypted_state_as_given() {
        let claim = VirtualClaim {
            encrypted_state: "3".to_string(),
            sequence: 4,
            payer_sig: vec![],
            counterparty_sig: vec![],
        };
        let call = ChannelRequest::VirtualWatchtowerClaim { index: 0, claim }
            .to_call()
            .unwrap();
        match &call.args[0] {
            DynSolValue::Tuple(fields) => {
                assert_eq!(fields.len(), 4);
                assert_eq!(fields[0], DynSolValue::String("3".to_string()));
                assert_eq!(fields[1], uint(4));
            }
            other => panic!("unexpected claim value {:?}", other),
        }
    }

    #[test]
    fn finalize_calls_carry_empty_proof_list() {
        let transcript = VirtualTranscript {
            payer: Address::with_last_byte(1),
            counterparty: Address::with_last_byte(3),
            intermediary: Address::with_last_byte(2),
            channel_value: 12,
            payer_value: 3,
            payer_sig: vec![],
            intermediary_sig: vec![],
            counterparty_sig: vec![],
        };
        let call = ChannelRequest::PessimisticVirtualClose {
            transcript,
            state: VirtualState { payer_value: 3, channel_value: 12, sequence: 4 },
        }
        .to_call()
        .unwrap();
        assert_eq!(call.method, "pessimisticVirtualChannelClose");
        assert_eq!(call.args[2], DynSolValue::Array(vec![]));
    }
}
