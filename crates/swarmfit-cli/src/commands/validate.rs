use crate::cli::ValidateArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use swarmfit::engine::error::EngineError;
use swarmfit::engine::topology::GroupLayout;
use tracing::{info, warn};

pub async fn run(args: ValidateArgs) -> Result<()> {
    let config = PartialAppConfig::from_file(&args.config)?.merge_with_cli(&args.overrides)?;
    let core = &config.core;

    let layout = GroupLayout::for_population(core.population, core.workers, core.group_size())
        .map_err(EngineError::from)?;
    info!(
        workers = layout.pool_size(),
        groups = layout.group_count(),
        "Configuration is valid."
    );

    let build_dir = config.layout.root.join(&config.layout.build_dir);
    if !build_dir.is_dir() {
        warn!("Template directory {} does not exist.", build_dir.display());
        println!(
            "Warning: template directory {} does not exist.",
            build_dir.display()
        );
    }

    println!("Parameters:");
    for spec in &core.parameters {
        println!("  {}", spec);
    }
    println!("Temperatures:");
    for spec in &core.temperatures {
        println!("  {}", spec);
    }

    println!(
        "Worker layout: {} workers in {} groups of {}",
        layout.pool_size(),
        layout.group_count(),
        layout.group_size()
    );
    println!("  {:>6} {:>6} {:<10} {:>10}", "group", "rank", "role", "T [K]");
    for context in layout.contexts() {
        println!(
            "  {:>6} {:>6} {:<10} {:>10}",
            context.group_id,
            context.rank,
            context.role.to_string(),
            core.temperatures[context.temperature_index].label()
        );
    }

    println!("✓ Configuration '{}' is valid.", args.config.display());
    Ok(())
}
