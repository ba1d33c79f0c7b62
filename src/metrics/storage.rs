use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::performance::BenchmarkResult;
use crate::config::AccountingPolicy;
use crate::error::{BenchError, BenchResult};
use crate::tools::benchmark_suite::ScenarioRecord;

/// Destination for persisted documents. Writes replace whatever is stored
/// at `path`.
pub trait PersistenceSink: Send + Sync {
    fn write(&self, path: &Path, content: &str) -> BenchResult<()>;
}

/// Writes to the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSink;

impl PersistenceSink for FileSink {
    fn write(&self, path: &Path, content: &str) -> BenchResult<()> {
        let persistence = |e: std::io::Error| BenchError::Persistence {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let mut file = File::create(path).map_err(persistence)?;
        file.write_all(content.as_bytes()).map_err(persistence)?;
        Ok(())
    }
}

/// Companion document with the raw gas behind every fiat figure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub currency: &'a str,
    pub fiat_per_native: f64,
    pub accounting: AccountingPolicy,
    pub scenarios: &'a [ScenarioRecord],
}

/// Persists sweep results through a [`PersistenceSink`].
pub struct ResultSink<P> {
    sink: P,
    output_path: PathBuf,
}

impl<P: PersistenceSink> ResultSink<P> {
    pub fn new(sink: P, output_path: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    /// Writes the five series as one JSON object, replacing any previous
    /// artifact.
    pub fn persist(&self, result: &BenchmarkResult) -> BenchResult<()> {
        let json = serde_json::to_string_pretty(result).map_err(|e| BenchError::Persistence {
            path: self.output_path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.sink.write(&self.output_path, &json)
    }

    pub fn write_raw_report(&self, path: &Path, report: &RawReport<'_>) -> BenchResult<()> {
        let json = serde_json::to_string_pretty(report).map_err(|e| BenchError::Persistence {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.sink.write(path, &json)
    }
}
