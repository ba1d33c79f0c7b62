//! Configuration for one benchmark run.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON config file, environment variables (a `.env` file is honoured) and
//! finally command line flags. The resulting [`BenchConfig`] is handed to the
//! driver and lives exactly as long as the run.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BenchError, BenchResult};
use crate::signing::SigningKey;

// --- Defaults ---

/// Local development node (Ganache / Anvil / Hardhat).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Compiled channel contract, Truffle build layout.
pub const DEFAULT_ARTIFACT_PATH: &str = "build/contracts/Brick.json";

/// Ganache's default block gas limit.
pub const DEFAULT_GAS_LIMIT: u64 = 6_721_975;

/// Fiat value of one unit of the native currency (EUR per ETH snapshot).
pub const DEFAULT_FIAT_PER_NATIVE: f64 = 1668.0;

pub const DEFAULT_OUTPUT_PATH: &str = "data.json";

/// Deterministic development-chain keys for the three channel roles. They
/// hold no value anywhere and only work against a local test node.
pub const DEV_PAYER_KEY: &str = "0x745d76cf93065defcf6bab2ba0e6c5100370b00ee60a4c1d9d8cc100b2d61b0f";
pub const DEV_INTERMEDIARY_KEY: &str =
    "0xc64513bd444614a86d4233a276f0d3eb3c41cbe538df72914c9869f53bf0754b";
pub const DEV_COUNTERPARTY_KEY: &str =
    "0xb0689b5339cabf0a9e237fa829d2398a87ceae81b8c505e7106eacedff817fc5";

/// Ledger connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub rpc_url: String,
    pub artifact_path: PathBuf,
    /// Gas limit attached to every transaction.
    pub gas_limit: u64,
    /// Delay between receipt polls.
    pub receipt_poll_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_poll_ms: 100,
        }
    }
}

impl LedgerSettings {
    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }
}

/// Private keys of the roles that sign state updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleKeys {
    pub payer: String,
    pub intermediary: String,
    pub counterparty: String,
}

impl Default for RoleKeys {
    fn default() -> Self {
        Self {
            payer: DEV_PAYER_KEY.to_string(),
            intermediary: DEV_INTERMEDIARY_KEY.to_string(),
            counterparty: DEV_COUNTERPARTY_KEY.to_string(),
        }
    }
}

impl RoleKeys {
    pub fn payer_key(&self) -> SigningKey {
        SigningKey::new(&self.payer)
    }

    pub fn intermediary_key(&self) -> SigningKey {
        SigningKey::new(&self.intermediary)
    }

    pub fn counterparty_key(&self) -> SigningKey {
        SigningKey::new(&self.counterparty)
    }
}

/// Fixed currency conversion. The rate is a snapshot and never queried live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    pub fiat_per_native: f64,
    pub currency: String,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            fiat_per_native: DEFAULT_FIAT_PER_NATIVE,
            currency: "EUR".to_string(),
        }
    }
}

/// How watchtower claim gas is counted in the close tallies.
///
/// The non-virtual pessimistic close counts every claim twice by default,
/// modelling duplicate or retried submissions; the virtual close counts each
/// claim once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountingPolicy {
    pub claim_cost_multiplier: u64,
    pub virtual_claim_cost_multiplier: u64,
}

impl Default for AccountingPolicy {
    fn default() -> Self {
        Self {
            claim_cost_multiplier: 2,
            virtual_claim_cost_multiplier: 1,
        }
    }
}

/// Inclusive range of committee sizes to benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl Default for SweepRange {
    fn default() -> Self {
        Self {
            start: 10,
            end: 25,
            step: 3,
        }
    }
}

impl SweepRange {
    pub fn validate(&self) -> BenchResult<()> {
        if self.start < 1 {
            return Err(BenchError::InvalidParameter(
                "sweep must start at a committee size of at least 1".to_string(),
            ));
        }
        if self.step < 1 {
            return Err(BenchError::InvalidParameter("sweep step must be at least 1".to_string()));
        }
        if self.start > self.end {
            return Err(BenchError::InvalidParameter(format!(
                "sweep start {} is past its end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Committee sizes in sweep order.
    pub fn sizes(&self) -> BenchResult<Vec<usize>> {
        self.validate()?;
        Ok((self.start..=self.end).step_by(self.step).collect())
    }
}

/// Balances of a regular channel state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBalances {
    pub payer_value: u64,
    pub channel_value: u64,
}

/// Constants used while driving one channel through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    /// Value the payer deposits when opening (wei).
    pub payer_deposit: u128,
    pub intermediary_deposit: u128,
    /// Collateral each watchtower stakes.
    pub watchtower_stake: u128,
    /// Amount the payer proposes in the optimistic close.
    pub optimistic_close_amount: u64,
    /// Sequence number signed for the pessimistic close claims.
    pub claim_sequence: u64,
    /// Sequence number signed for the virtual channel claims.
    pub virtual_claim_sequence: u64,
    /// Sequence number of the virtual channel's opening transcript.
    pub virtual_open_sequence: u64,
    /// Encrypted virtual state carried by virtual claims.
    pub encrypted_virtual_state: String,
    pub channel_state: ChannelBalances,
    pub virtual_state: ChannelBalances,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        // Channel fee of 20 split between the two base channel parties.
        Self {
            payer_deposit: 20 / 2 + 5,
            intermediary_deposit: 20 / 2 + 12,
            watchtower_stake: 50,
            optimistic_close_amount: 5,
            claim_sequence: 3,
            virtual_claim_sequence: 4,
            virtual_open_sequence: 12,
            encrypted_virtual_state: "3".to_string(),
            channel_state: ChannelBalances {
                payer_value: 10,
                channel_value: 17,
            },
            virtual_state: ChannelBalances {
                payer_value: 3,
                channel_value: 12,
            },
        }
    }
}

/// Everything one benchmark run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub ledger: LedgerSettings,
    pub keys: RoleKeys,
    pub pricing: PricingSettings,
    pub accounting: AccountingPolicy,
    pub sweep: SweepRange,
    pub scenario: ScenarioParams,
    pub output_path: PathBuf,
    /// Optional companion report with raw gas figures.
    pub raw_report_path: Option<PathBuf>,
    /// `env_logger` filter, e.g. `warn` or `brickbench=info`.
    pub log_level: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings::default(),
            keys: RoleKeys::default(),
            pricing: PricingSettings::default(),
            accounting: AccountingPolicy::default(),
            sweep: SweepRange::default(),
            scenario: ScenarioParams::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            raw_report_path: None,
            log_level: "warn".to_string(),
        }
    }
}

impl BenchConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> BenchResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BenchError::InvalidParameter(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BenchError::InvalidParameter(format!("malformed config {}: {}", path.display(), e))
        })
    }

    /// Applies environment overrides on top of `self`.
    ///
    /// Role keys fall back to the development keys with a warning when the
    /// corresponding variable is unset.
    pub fn with_env(mut self) -> Self {
        self.apply_vars(|name| std::env::var(name).ok());
        self
    }

    fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("BENCH_RPC_URL") {
            self.ledger.rpc_url = url;
        }
        if let Some(path) = var("BENCH_ARTIFACT") {
            self.ledger.artifact_path = PathBuf::from(path);
        }
        if let Some(level) = var("BENCH_LOG_LEVEL") {
            self.log_level = level;
        }

        let roles: [(&str, &mut String, &str); 3] = [
            ("PAYER_PRIVATE_KEY", &mut self.keys.payer, DEV_PAYER_KEY),
            ("INTERMEDIARY_PRIVATE_KEY", &mut self.keys.intermediary, DEV_INTERMEDIARY_KEY),
            ("COUNTERPARTY_PRIVATE_KEY", &mut self.keys.counterparty, DEV_COUNTERPARTY_KEY),
        ];
        for (name, slot, dev_key) in roles {
            match var(name) {
                Some(key) => *slot = key,
                None if slot.as_str() == dev_key => {
                    warn!("{} not set, using the development-chain key", name);
                }
                None => {}
            }
        }
    }

    /// Installs the `env_logger` backend at the configured level.
    pub fn init_logging(&self) {
        let _ = env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .format_timestamp(None)
            .try_init();
    }
}
