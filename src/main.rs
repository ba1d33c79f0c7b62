use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use brickbench::config::BenchConfig;
use brickbench::ledger::{ContractArtifact, ContractKind, RpcLedger};
use brickbench::metrics::{FileSink, RawReport, ResultSink};
use brickbench::signing::LocalSigner;
use brickbench::tools::BenchmarkSweep;

fn cli() -> App<'static, 'static> {
    App::new("brickbench")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Measures the fiat cost of a watchtower-assisted payment channel across committee sizes")
        .arg(Arg::with_name("config").long("config").takes_value(true).help("JSON config file"))
        .arg(Arg::with_name("rpc-url").long("rpc-url").takes_value(true).help("Ledger JSON-RPC endpoint"))
        .arg(Arg::with_name("artifact").long("artifact").takes_value(true).help("Compiled channel contract (Truffle JSON)"))
        .arg(Arg::with_name("start").long("start").takes_value(true).help("First committee size"))
        .arg(Arg::with_name("end").long("end").takes_value(true).help("Last committee size, inclusive"))
        .arg(Arg::with_name("step").long("step").takes_value(true).help("Committee size increment"))
        .arg(Arg::with_name("output").long("output").short("o").takes_value(true).help("Artifact path"))
        .arg(Arg::with_name("raw-report").long("raw-report").takes_value(true).help("Also write raw gas figures here"))
        .arg(Arg::with_name("fiat-rate").long("fiat-rate").takes_value(true).help("Fiat value of one native unit"))
        .arg(Arg::with_name("claim-multiplier").long("claim-multiplier").takes_value(true).help("Weight of each pessimistic close claim"))
        .arg(Arg::with_name("virtual-claim-multiplier").long("virtual-claim-multiplier").takes_value(true).help("Weight of each virtual close claim"))
        .arg(Arg::with_name("log-level").long("log-level").takes_value(true).help("env_logger filter, e.g. info"))
}

fn parsed<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    matches
        .value_of(name)
        .map(|raw| raw.parse::<T>().with_context(|| format!("invalid --{} value {:?}", name, raw)))
        .transpose()
}

/// Defaults, then the config file, then the environment, then flags.
fn load_config(matches: &ArgMatches) -> Result<BenchConfig> {
    let config = match matches.value_of("config") {
        Some(path) => BenchConfig::from_file(Path::new(path))?,
        None => BenchConfig::default(),
    };
    let mut config = config.with_env();

    if let Some(url) = matches.value_of("rpc-url") {
        config.ledger.rpc_url = url.to_string();
    }
    if let Some(path) = matches.value_of("artifact") {
        config.ledger.artifact_path = PathBuf::from(path);
    }
    if let Some(start) = parsed(matches, "start")? {
        config.sweep.start = start;
    }
    if let Some(end) = parsed(matches, "end")? {
        config.sweep.end = end;
    }
    if let Some(step) = parsed(matches, "step")? {
        config.sweep.step = step;
    }
    if let Some(path) = matches.value_of("output") {
        config.output_path = PathBuf::from(path);
    }
    if let Some(path) = matches.value_of("raw-report") {
        config.raw_report_path = Some(PathBuf::from(path));
    }
    if let Some(rate) = parsed(matches, "fiat-rate")? {
        config.pricing.fiat_per_native = rate;
    }
    if let Some(multiplier) = parsed(matches, "claim-multiplier")? {
        config.accounting.claim_cost_multiplier = multiplier;
    }
    if let Some(multiplier) = parsed(matches, "virtual-claim-multiplier")? {
        config.accounting.virtual_claim_cost_multiplier = multiplier;
    }
    if let Some(level) = matches.value_of("log-level") {
        config.log_level = level.to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables if present
    dotenv::dotenv().ok();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    config.init_logging();
    config.sweep.validate()?;

    let artifact = ContractArtifact::load(&config.ledger.artifact_path)?;
    let ledger = Arc::new(
        RpcLedger::new(
            &config.ledger.rpc_url,
            config.ledger.gas_limit,
            config.ledger.receipt_poll(),
        )
        .with_artifact(ContractKind::Channel, artifact),
    );

    println!("Channel cost benchmark against {}", ledger.rpc_url());
    println!(
        "Committee sizes {}..={} step {}",
        config.sweep.start, config.sweep.end, config.sweep.step
    );

    let mut sweep = BenchmarkSweep::new(ledger, LocalSigner, &config);
    let outcome = sweep.run().await.context("benchmark sweep aborted")?;

    let sink = ResultSink::new(FileSink, config.output_path.clone());
    sink.persist(&outcome.result)?;
    if let Some(path) = &config.raw_report_path {
        let report = RawReport {
            generated_at: chrono::Utc::now(),
            currency: &config.pricing.currency,
            fiat_per_native: config.pricing.fiat_per_native,
            accounting: config.accounting,
            scenarios: &outcome.records,
        };
        sink.write_raw_report(path, &report)?;
        println!("Raw gas report saved to {}", path.display());
    }

    outcome.result.print_summary(&config.pricing.currency);
    println!("Results saved to {}", sink.output_path().display());
    Ok(())
}
