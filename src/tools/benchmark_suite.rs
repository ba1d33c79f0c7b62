// tools/benchmark_suite.rs

//! Committee size sweep.
//!
//! For every committee size in the configured range the suite drives a full
//! scenario (deploy, open and the three close variants, each on its own
//! channel instance), prices the five raw gas figures and appends them to the
//! result series in one step.
//!
//! # Usage Example
//!
//! ```bash
//! # Sweep n = 10, 13, ..., 25 against a local node and write data.json:
//! cargo run --release -- --artifact build/contracts/Brick.json --start 10 --end 25 --step 3
//! ```

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::channel::{PhaseGas, ProtocolDriver};
use crate::config::{BenchConfig, SweepRange};
use crate::error::BenchResult;
use crate::ledger::LedgerClient;
use crate::metrics::{BenchmarkResult, CostMeter, GasMeasurement, Metric};
use crate::signing::SigningService;

/// Everything measured for one committee size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub committee_size: usize,
    pub fault_tolerance: usize,
    pub threshold: usize,
    /// One entry per metric, in artifact order, with raw and fiat cost.
    pub measurements: Vec<GasMeasurement>,
    pub breakdown: Vec<PhaseGas>,
}

/// Result of a complete sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub result: BenchmarkResult,
    pub records: Vec<ScenarioRecord>,
}

pub struct BenchmarkSweep<L, S> {
    driver: ProtocolDriver<L, S>,
    meter: CostMeter<L>,
    range: SweepRange,
}

impl<L, S> BenchmarkSweep<L, S>
where
    L: LedgerClient,
    S: SigningService,
{
    pub fn new(ledger: Arc<L>, signer: S, config: &BenchConfig) -> Self {
        Self {
            driver: ProtocolDriver::new(ledger.clone(), signer, config),
            meter: CostMeter::new(ledger, config.pricing.fiat_per_native),
            range: config.sweep,
        }
    }

    /// Runs the whole range. The first failing committee size aborts the
    /// sweep.
    pub async fn run(&mut self) -> BenchResult<SweepOutcome> {
        let mut result = BenchmarkResult::new();
        let mut records = Vec::new();
        self.run_into(&mut result, &mut records).await?;
        Ok(SweepOutcome { result, records })
    }

    /// Runs the range, appending to `result` and `records` as each committee
    /// size completes.
    ///
    /// A committee size either contributes to every series or to none. On
    /// error, sizes finished earlier stay in `result`.
    pub async fn run_into(
        &mut self,
        result: &mut BenchmarkResult,
        records: &mut Vec<ScenarioRecord>,
    ) -> BenchResult<()> {
        let sizes = self.range.sizes()?;
        info!("Sweeping committee sizes {:?}", sizes);

        for committee_size in sizes {
            let record = match self.measure(committee_size).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Scenario for n = {} failed: {}", committee_size, e);
                    return Err(e);
                }
            };
            result.push_scenario(&record.measurements)?;
            records.push(record);
        }
        Ok(())
    }

    /// Runs the scenario for one committee size and prices every metric.
    pub async fn measure(&mut self, committee_size: usize) -> BenchResult<ScenarioRecord> {
        let costs = self.driver.run_scenario(committee_size).await?;

        let mut measurements = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            let gas = costs.gas(metric);
            let fiat = self.meter.to_fiat(gas).await?;
            info!("n = {} {}: {} gas, {}", committee_size, metric, gas, fiat);
            measurements.push(GasMeasurement {
                metric,
                committee_size,
                gas,
                fiat,
            });
        }

        Ok(ScenarioRecord {
            committee_size,
            fault_tolerance: costs.quorum.fault_tolerance,
            threshold: costs.quorum.threshold,
            measurements,
            breakdown: costs.breakdown,
        })
    }
}
