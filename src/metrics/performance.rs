//! Cost measurements and the per-metric series built from them.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{BenchError, BenchResult};

/// The five cost categories measured for every committee size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Deploy,
    Open,
    OptimisticClose,
    PessimisticVirtualClose,
    PessimisticClose,
}

impl Metric {
    /// Artifact order.
    pub const ALL: [Metric; 5] = [
        Metric::Deploy,
        Metric::Open,
        Metric::OptimisticClose,
        Metric::PessimisticVirtualClose,
        Metric::PessimisticClose,
    ];

    /// Key of the series in the persisted artifact.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Deploy => "deploy",
            Metric::Open => "open",
            Metric::OptimisticClose => "optimisticClose",
            Metric::PessimisticVirtualClose => "pessimisticVirtualClose",
            Metric::PessimisticClose => "pessimisticClose",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Fiat amount. Rendered, and serialized, with exactly two decimals.
///
/// Rounding works on the exact binary value and sends ties away from zero,
/// so `0.125` renders as `0.13` while `2.675` (stored just below) renders as
/// `2.67`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct FiatAmount(f64);

impl FiatAmount {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Decimal::from_f64_retain(self.0) {
            Some(exact) => write!(
                f,
                "{:.2}",
                exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            ),
            None => write!(f, "{:.2}", self.0),
        }
    }
}

impl Serialize for FiatAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Cost of one metric at one committee size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasMeasurement {
    pub metric: Metric,
    pub committee_size: usize,
    pub gas: u64,
    pub fiat: FiatAmount,
}

/// Measurements of one metric, ordered by committee size.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCostSeries {
    pub metric: Metric,
    pub measurements: Vec<GasMeasurement>,
}

impl PhaseCostSeries {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            measurements: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn fiat_values(&self) -> impl Iterator<Item = FiatAmount> + '_ {
        self.measurements.iter().map(|m| m.fiat)
    }
}

impl Serialize for PhaseCostSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.measurements.len()))?;
        for fiat in self.fiat_values() {
            seq.serialize_element(&fiat)?;
        }
        seq.end()
    }
}

/// Every series of a sweep. Serializes to the artifact layout: one array of
/// two-decimal strings per metric key, in [`Metric::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    committee_sizes: Vec<usize>,
    series: Vec<PhaseCostSeries>,
}

impl Default for BenchmarkResult {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkResult {
    pub fn new() -> Self {
        Self {
            committee_sizes: Vec::new(),
            series: Metric::ALL.iter().copied().map(PhaseCostSeries::new).collect(),
        }
    }

    /// Committee sizes recorded so far, in sweep order.
    pub fn committee_sizes(&self) -> &[usize] {
        &self.committee_sizes
    }

    pub fn series(&self, metric: Metric) -> &PhaseCostSeries {
        // `series` holds one entry per metric in `Metric::ALL` order.
        &self.series[metric as usize]
    }

    /// Appends one committee size to every series at once.
    ///
    /// `measurements` must hold exactly one entry per metric, all for the
    /// same committee size, larger than any recorded so far. Nothing is
    /// appended unless every check passes.
    pub fn push_scenario(&mut self, measurements: &[GasMeasurement]) -> BenchResult<()> {
        if measurements.len() != Metric::ALL.len() {
            return Err(BenchError::InvalidParameter(format!(
                "a scenario needs {} measurements, got {}",
                Metric::ALL.len(),
                measurements.len()
            )));
        }
        let committee_size = measurements[0].committee_size;
        for (measurement, metric) in measurements.iter().zip(Metric::ALL) {
            if measurement.metric != metric || measurement.committee_size != committee_size {
                return Err(BenchError::InvalidParameter(format!(
                    "expected {} for n = {}, got {} for n = {}",
                    metric, committee_size, measurement.metric, measurement.committee_size
                )));
            }
        }
        if let Some(last) = self.committee_sizes.last() {
            if committee_size <= *last {
                return Err(BenchError::InvalidParameter(format!(
                    "committee size {} recorded after {}",
                    committee_size, last
                )));
            }
        }

        self.committee_sizes.push(committee_size);
        for (series, measurement) in self.series.iter_mut().zip(measurements) {
            series.measurements.push(*measurement);
        }
        Ok(())
    }

    pub fn print_summary(&self, currency: &str) {
        println!("\n--- Channel Cost Benchmark ({}) ---", currency);
        print!("{:<26}", "n");
        for n in &self.committee_sizes {
            print!("{:>10}", n);
        }
        println!();
        for series in &self.series {
            print!("{:<26}", series.metric.key());
            for fiat in series.fiat_values() {
                print!("{:>10}", fiat.to_string());
            }
            println!();
        }
        println!("-----------------------------------\n");
    }
}

impl Serialize for BenchmarkResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for series in &self.series {
            map.serialize_entry(series.metric.key(), series)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(n: usize, base: f64) -> Vec<GasMeasurement> {
        Metric::ALL
            .iter()
            .enumerate()
            .map(|(i, metric)| GasMeasurement {
                metric: *metric,
                committee_size: n,
                gas: 1_000 * (i as u64 + 1),
                fiat: FiatAmount::new(base + i as f64),
            })
            .collect()
    }

    #[test]
    fn fiat_amounts_render_two_decimals() {
        assert_eq!(FiatAmount::new(1.0).to_string(), "1.00");
        assert_eq!(FiatAmount::new(0.126).to_string(), "0.13");
        assert_eq!(serde_json::to_string(&FiatAmount::new(12.5)).unwrap(), "\"12.50\"");
    }

    #[test]
    fn exact_ties_round_up() {
        assert_eq!(FiatAmount::new(0.125).to_string(), "0.13");
        assert_eq!(FiatAmount::new(0.625).to_string(), "0.63");
        assert_eq!(FiatAmount::new(1.125).to_string(), "1.13");
        assert_eq!(FiatAmount::new(3.375).to_string(), "3.38");
        // not a tie once stored in binary
        assert_eq!(FiatAmount::new(2.675).to_string(), "2.67");
        assert_eq!(FiatAmount::new(1.005).to_string(), "1.00");
    }

    #[test]
    fn artifact_keys_follow_metric_order() {
        let mut result = BenchmarkResult::new();
        result.push_scenario(&scenario(10, 1.0)).unwrap();
        result.push_scenario(&scenario(13, 2.0)).unwrap();

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            "{\"deploy\":[\"1.00\",\"2.00\"],\"open\":[\"2.00\",\"3.00\"],\
             \"optimisticClose\":[\"3.00\",\"4.00\"],\
             \"pessimisticVirtualClose\":[\"4.00\",\"5.00\"],\
             \"pessimisticClose\":[\"5.00\",\"6.00\"]}"
        );
        assert_eq!(result.committee_sizes(), &[10, 13]);
        assert_eq!(result.series(Metric::Open).len(), 2);
    }

    #[test]
    fn incomplete_scenario_appends_nothing() {
        let mut result = BenchmarkResult::new();
        let mut partial = scenario(10, 1.0);
        partial.pop();
        assert!(result.push_scenario(&partial).is_err());

        let mut mixed = scenario(10, 1.0);
        mixed[3].committee_size = 11;
        assert!(result.push_scenario(&mixed).is_err());

        for metric in Metric::ALL {
            assert!(result.series(metric).is_empty());
        }
        assert!(result.committee_sizes().is_empty());
    }

    #[test]
    fn committee_sizes_must_increase() {
        let mut result = BenchmarkResult::new();
        result.push_scenario(&scenario(13, 1.0)).unwrap();
        assert!(result.push_scenario(&scenario(10, 1.0)).is_err());
        assert_eq!(result.series(Metric::Deploy).len(), 1);
    }
}
