//! Gas to fiat conversion.

use log::info;
use std::sync::Arc;

use super::performance::FiatAmount;
use crate::error::{BenchResult, LedgerError};
use crate::ledger::LedgerClient;

const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

/// Prices gas at the ledger's current unit price and converts the result
/// with a fixed fiat rate.
///
/// Every [`CostMeter::to_fiat`] call asks the ledger for the price again;
/// nothing is cached between calls.
pub struct CostMeter<L> {
    ledger: Arc<L>,
    fiat_per_native: f64,
}

impl<L: LedgerClient> CostMeter<L> {
    pub fn new(ledger: Arc<L>, fiat_per_native: f64) -> Self {
        Self {
            ledger,
            fiat_per_native,
        }
    }

    pub async fn to_fiat(&self, gas: u64) -> BenchResult<FiatAmount> {
        let price = self.ledger.get_unit_price().await?;
        info!("Local gas price: {}", price);
        self.fiat_at_price(gas, price)
    }

    /// Conversion at a known unit price.
    pub fn fiat_at_price(&self, gas: u64, price: u128) -> BenchResult<FiatAmount> {
        let wei = u128::from(gas)
            .checked_mul(price)
            .ok_or(LedgerError::Overflow { gas, price })?;
        info!("Local gas cost in wei: {}", wei);

        // Split before converting so large costs keep their sub-unit digits.
        let native = (wei / WEI_PER_NATIVE) as f64
            + (wei % WEI_PER_NATIVE) as f64 / WEI_PER_NATIVE as f64;
        info!("Total gas cost in native currency: {}", native);

        let fiat = FiatAmount::new(native * self.fiat_per_native);
        info!("Total gas cost in fiat: {}", fiat);
        Ok(fiat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::tests::mock_ledger::MockLedger;
    use proptest::prelude::*;

    const GWEI: u128 = 1_000_000_000;

    fn meter(price: u128) -> CostMeter<MockLedger> {
        CostMeter::new(Arc::new(MockLedger::new(60).with_price(price)), 1668.0)
    }

    #[test]
    fn one_native_unit_is_the_fiat_rate() {
        // 1e6 gas at 1e12 wei = 1e18 wei
        let fiat = meter(0).fiat_at_price(1_000_000, 1_000_000_000_000).unwrap();
        assert!((fiat.value() - 1668.0).abs() < 1e-9);
    }

    #[test]
    fn overflow_is_a_ledger_error() {
        let err = meter(0).fiat_at_price(u64::MAX, u128::MAX).unwrap_err();
        assert!(matches!(err, BenchError::Ledger(LedgerError::Overflow { .. })));
    }

    #[tokio::test]
    async fn each_conversion_queries_the_price() {
        let ledger = Arc::new(MockLedger::new(60).with_price(20 * GWEI));
        let meter = CostMeter::new(ledger.clone(), 1668.0);

        let fiat = meter.to_fiat(21_000).await.unwrap();
        assert_eq!(fiat.to_string(), "0.70");
        meter.to_fiat(21_000).await.unwrap();
        assert_eq!(ledger.price_queries(), 2);
    }

    proptest! {
        #[test]
        fn conversion_is_linear(gas in 1u64..20_000_000, gwei in 1u128..500) {
            let meter = meter(0);
            let single = meter.fiat_at_price(gas, gwei * GWEI).unwrap().value();
            let double = meter.fiat_at_price(gas * 2, gwei * GWEI).unwrap().value();
            prop_assert!((double - 2.0 * single).abs() <= 1e-9 * double.max(1.0));
        }
    }
}
