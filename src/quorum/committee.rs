//! Channel participants and the watchtower committee drawn from the
//! ledger's unlocked accounts.

use alloy_primitives::Address;
use std::fmt;

use crate::error::{BenchError, BenchResult};

/// Accounts reserved ahead of the watchtowers: payer, intermediary,
/// counterparty.
pub const RESERVED_ACCOUNTS: usize = 3;

/// Protocol role of a transaction sender or signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Payer,
    Intermediary,
    Counterparty,
    Watchtower(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Payer => write!(f, "payer"),
            Role::Intermediary => write!(f, "intermediary"),
            Role::Counterparty => write!(f, "counterparty"),
            Role::Watchtower(i) => write!(f, "watchtower[{}]", i),
        }
    }
}

/// Addresses of everyone taking part in one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participants {
    pub payer: Address,
    pub intermediary: Address,
    pub counterparty: Address,
    pub watchtowers: Vec<Address>,
}

impl Participants {
    /// Assigns roles from the ledger's ordered account list: index 0 pays,
    /// 1 intermediates, 2 is the virtual channel counterparty and the next
    /// `committee_size` accounts act as watchtowers.
    pub fn from_accounts(accounts: &[Address], committee_size: usize) -> BenchResult<Self> {
        let needed = RESERVED_ACCOUNTS + committee_size;
        if accounts.len() < needed {
            return Err(BenchError::InvalidParameter(format!(
                "ledger exposes {} accounts, a committee of {} needs {}",
                accounts.len(),
                committee_size,
                needed
            )));
        }
        Ok(Self {
            payer: accounts[0],
            intermediary: accounts[1],
            counterparty: accounts[2],
            watchtowers: accounts[RESERVED_ACCOUNTS..needed].to_vec(),
        })
    }

    pub fn committee_size(&self) -> usize {
        self.watchtowers.len()
    }

    /// Resolves the address acting for `role`.
    pub fn address_of(&self, role: Role) -> BenchResult<Address> {
        match role {
            Role::Payer => Ok(self.payer),
            Role::Intermediary => Ok(self.intermediary),
            Role::Counterparty => Ok(self.counterparty),
            Role::Watchtower(i) => self.watchtowers.get(i).copied().ok_or_else(|| {
                BenchError::InvalidParameter(format!(
                    "watchtower index {} outside committee of {}",
                    i,
                    self.watchtowers.len()
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts(count: usize) -> Vec<Address> {
        (0..count).map(|i| Address::with_last_byte(i as u8 + 1)).collect()
    }

    #[test]
    fn assigns_roles_in_account_order() {
        let accts = accounts(8);
        let p = Participants::from_accounts(&accts, 4).unwrap();
        assert_eq!(p.payer, accts[0]);
        assert_eq!(p.intermediary, accts[1]);
        assert_eq!(p.counterparty, accts[2]);
        assert_eq!(p.watchtowers, accts[3..7].to_vec());
        assert_eq!(p.address_of(Role::Watchtower(3)).unwrap(), accts[6]);
    }

    #[test]
    fn not_enough_accounts() {
        let err = Participants::from_accounts(&accounts(12), 10).unwrap_err();
        assert!(matches!(err, BenchError::InvalidParameter(_)));
    }

    #[test]
    fn watchtower_index_out_of_range() {
        let p = Participants::from_accounts(&accounts(5), 2).unwrap();
        assert!(p.address_of(Role::Watchtower(2)).is_err());
    }
}
