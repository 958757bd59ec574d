mod bootstrap;
mod settings;

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use clap::Parser;
use metrics_core::{Aggregate, DataManager};
use metrics_sources::{DataSource, FileDataSource, RemoteDataSource};
use settings::Settings;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("hpc-metrics v{} starting", env!("CARGO_PKG_VERSION"));

    let manager = fetch(&settings)?;
    print_summary(&manager);

    Ok(())
}

/// Build the configured data source and fetch the requested job.
fn fetch(settings: &Settings) -> Result<DataManager> {
    match settings.source.as_str() {
        "file" => {
            let Some(path) = settings.file.as_ref() else {
                bail!("--file is required when --source is 'file'");
            };
            tracing::info!("loading metrics from {}", path.display());
            let mut source = FileDataSource::with_delimiter(path, settings.delimiter_char()?)?;
            Ok(source.fetch_job_data(&settings.job_id)?)
        }
        "remote" => {
            tracing::info!("connecting to {}", settings.api_base);
            let mut source = RemoteDataSource::connect(settings.remote_config()?)?;
            Ok(source.fetch_job_data(&settings.job_id)?)
        }
        other => bail!("unknown source '{other}'"),
    }
}

/// Print what the manager knows about the job.
fn print_summary(manager: &DataManager) {
    println!("Job ID: {}", manager.job_id().unwrap_or("<none>"));
    println!(
        "Time series length: {} intervals",
        manager.get_time_series_length()
    );

    println!();
    println!("Available metrics:");
    for id in manager.list_available_metrics() {
        println!("  - {id}");
    }

    let Some(context) = manager.job_context() else {
        return;
    };

    println!();
    println!("{context}");
    if let Some(state) = context.get_metadata("jobState") {
        println!("  Job state: {state}");
    }
    if let Some(runtime) = context.get_metadata("runtime") {
        println!("  Runtime: {runtime}");
    }
    if let Some(variant) = context.get_metadata("variantName") {
        println!("  Variant: {variant}");
    }

    let mut benchmark_names: BTreeSet<String> = BTreeSet::new();
    for hash in context.get_node_hashes() {
        let Some(info) = context.get_node_info(hash) else {
            continue;
        };
        println!("  Node {hash}:");
        if let Some(model) = info.cpu.as_ref().and_then(|cpu| cpu.get("Model name")) {
            println!("    CPU: {model}");
        }
        if let Some(benchmarks) = info.benchmarks.as_ref() {
            benchmark_names.extend(benchmarks.keys().cloned());
        }
    }

    if !benchmark_names.is_empty() {
        println!("  Benchmarks (mean across nodes):");
        for name in &benchmark_names {
            if let Some(mean) = context.get_benchmark(name, Aggregate::Mean) {
                println!("    {name}: {mean:.1}");
            }
        }
    }
}
