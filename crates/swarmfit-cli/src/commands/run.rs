use crate::cli::RunArgs;
use crate::config::{AppConfig, PartialAppConfig};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use swarmfit::{
    core::density::FAILED_DENSITY,
    engine::{
        backend::FileSystemBackend, config::OptimizationConfig, progress::ProgressReporter,
    },
    workflows::{self, optimize::OptimizationResult},
};
use tracing::{info, warn};

pub async fn run(args: RunArgs) -> Result<()> {
    let partial_config = PartialAppConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let AppConfig {
        core,
        layout,
        system,
    } = partial_config.merge_with_cli(&args.overrides)?;

    let backend = FileSystemBackend::new(
        layout,
        system,
        core.parameters.clone(),
        core.temperatures.clone(),
    )?;
    info!(
        "Simulation tree rooted at {}",
        backend.layout().root.display()
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting optimization of {} parameter(s) against {} temperature(s) with {} worker(s)...",
        core.dimension(),
        core.group_size(),
        core.workers
    );
    info!("Invoking the core optimization workflow...");

    let result =
        tokio::task::block_in_place(|| workflows::optimize::run(&core, &backend, &reporter))?;

    print_summary(&core, &result);
    Ok(())
}

fn print_summary(core: &OptimizationConfig, result: &OptimizationResult) {
    let best = &result.global_best;
    info!(
        cost = best.cost,
        iteration = best.iteration,
        "Optimization finished."
    );

    if best.densities.contains(&FAILED_DENSITY) {
        warn!("The best candidate includes failed simulations; check the run directories.");
    }

    println!(
        "✓ Best cost {:.6} (found in iteration {})",
        best.cost, best.iteration
    );
    println!("  Parameters:");
    for (spec, value) in core.parameters.iter().zip(best.parameters.iter()) {
        println!("    {:<16} {}", spec.name, value);
    }
    println!("  Densities:");
    for (spec, density) in core.temperatures.iter().zip(best.densities.iter()) {
        println!(
            "    T = {:>8} K   simulated {:.5}   target {:.5}",
            spec.label(),
            density,
            spec.target_density
        );
    }
    if let Some(path) = &core.run_log_path {
        println!("  Particle history written to: {}", path.display());
    }
}
