//! Off-ledger authorization signatures for channel state updates.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::fmt;
use std::str::FromStr;

use crate::error::{BenchError, BenchResult};

/// Hex-encoded secp256k1 private key of a protocol role.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl SigningKey {
    pub fn new(hex_key: &str) -> Self {
        Self(hex_key.trim().to_string())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

/// Produces the signatures a channel contract checks when a state update
/// is claimed or a channel is closed.
pub trait SigningService: Send + Sync {
    /// Signs the authorization for `sequence` on the contract at `contract`.
    fn sign(&self, contract: Address, sequence: u64, key: &SigningKey) -> BenchResult<Vec<u8>>;
}

/// Signs locally with secp256k1 keys.
///
/// The signed message is `keccak256(contract ‖ uint256(sequence))` framed as
/// an EIP-191 personal message, so the contract recovers the signer with
/// `ecrecover` over the prefixed hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSigner;

impl LocalSigner {
    /// Digest binding a signature to one contract instance and sequence.
    pub fn authorization_digest(contract: Address, sequence: u64) -> B256 {
        let mut packed = Vec::with_capacity(20 + 32);
        packed.extend_from_slice(contract.as_slice());
        packed.extend_from_slice(&U256::from(sequence).to_be_bytes::<32>());
        keccak256(&packed)
    }

    fn signer(key: &SigningKey) -> BenchResult<PrivateKeySigner> {
        PrivateKeySigner::from_str(key.as_hex().trim_start_matches("0x"))
            .map_err(|e| BenchError::Signing(format!("malformed private key: {}", e)))
    }

    /// Address controlled by `key`.
    pub fn address_of(key: &SigningKey) -> BenchResult<Address> {
        Ok(Self::signer(key)?.address())
    }
}

impl SigningService for LocalSigner {
    fn sign(&self, contract: Address, sequence: u64, key: &SigningKey) -> BenchResult<Vec<u8>> {
        let digest = Self::authorization_digest(contract, sequence);
        let signature = Self::signer(key)?
            .sign_message_sync(digest.as_slice())
            .map_err(|e| BenchError::Signing(e.to_string()))?;
        Ok(signature.as_bytes().to_vec())
    }
}
