pub mod benchmark_suite;

pub use benchmark_suite::{BenchmarkSweep, ScenarioRecord, SweepOutcome};
