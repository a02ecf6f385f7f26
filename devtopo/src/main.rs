// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use args::{CmdArgs, Parser, RunConfiguration, Schedule};
use manifest::{GenerationReport, ManifestGenerator, load_inventory_from_file};
use miette::{Context, IntoDiagnostic, miette};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(directives: &str) -> miette::Result<()> {
    let filter = EnvFilter::try_new(directives)
        .into_diagnostic()
        .wrap_err_with(|| format!("invalid tracing configuration '{directives}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| miette!("failed to initialize logging: {e}"))
}

fn summarize(report: &GenerationReport) {
    let written = report.succeeded().count();
    let failed: Vec<_> = report.failed().map(|(node, _)| node).collect();
    if report.cancelled() {
        warn!("generation interrupted after {} nodes", report.nodes().len());
    }
    if failed.is_empty() {
        info!("wrote {written} manifests");
    } else {
        warn!(
            "wrote {written} manifests, {} failed: {}",
            failed.len(),
            failed.join(", ")
        );
    }
}

/// Loads the inventory at `inventory` and writes the manifest of each of its nodes.
fn run_once(
    generator: &ManifestGenerator,
    inventory: &Path,
    cancel: &CancellationToken,
) -> miette::Result<GenerationReport> {
    let nodes = load_inventory_from_file(inventory)
        .into_diagnostic()
        .wrap_err("failed to load device inventory")?;
    let report = generator.generate(&nodes, cancel).into_diagnostic()?;
    summarize(&report);
    Ok(report)
}

async fn run_periodic(
    generator: Arc<ManifestGenerator>,
    inventory: PathBuf,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = cancel.cancelled() => break,
        }
        let generator = generator.clone();
        let inventory = inventory.clone();
        let cancel = cancel.clone();
        match tokio::task::spawn_blocking(move || run_once(&generator, &inventory, &cancel)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("manifest generation failed: {e:?}"),
            Err(e) => error!("manifest generation task failed: {e}"),
        }
    }
}

fn main() -> miette::Result<()> {
    let config = RunConfiguration::try_from(CmdArgs::parse())?;
    init_logging(&config.tracing)?;
    info!("Starting device topology manifest generator...\n{}", config.generator);

    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        info!("interrupted, stopping");
        ctrlc_cancel.cancel();
    })
    .into_diagnostic()
    .wrap_err("failed to set SIGINT handler")?;

    let generator = ManifestGenerator::new(config.generator);
    match config.schedule {
        Schedule::Once => {
            run_once(&generator, &config.inventory, &cancel)?;
        }
        Schedule::Every(period) => {
            info!("regenerating manifests every {period:?}");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .into_diagnostic()?;
            runtime.block_on(run_periodic(
                Arc::new(generator),
                config.inventory,
                period,
                cancel,
            ));
        }
    }
    info!("Shutting down device topology manifest generator");
    Ok(())
}
