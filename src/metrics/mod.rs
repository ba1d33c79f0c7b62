pub mod cost;
pub mod performance;
pub mod storage;

pub use cost::CostMeter;
pub use performance::{BenchmarkResult, FiatAmount, GasMeasurement, Metric, PhaseCostSeries};
pub use storage::{FileSink, PersistenceSink, RawReport, ResultSink};
