use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "swarmfit - fit force-field parameters to experimental liquid densities with a distributed particle swarm.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the particle-swarm optimization described by a configuration file.
    Run(RunArgs),
    /// Load and check a configuration, and print the worker group layout.
    Validate(ValidateArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override the number of PSO update iterations.
    #[arg(short = 'n', long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the number of particles evaluated per iteration.
    #[arg(short, long, value_name = "INT")]
    pub population: Option<usize>,

    /// Override the worker pool size (must equal population × temperatures).
    #[arg(short, long, value_name = "INT")]
    pub workers: Option<usize>,

    /// Seed the random number generator for a reproducible run.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub equilibration: EquilibrationFlags,

    /// Append per-iteration particle records to this CSV file.
    #[arg(long, value_name = "PATH")]
    pub run_log: Option<PathBuf>,

    /// Override the simulation root directory.
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S pso.w=0.6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags forcing equilibration on or off.
#[derive(Args, Debug, Default, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct EquilibrationFlags {
    /// Generate and run the equilibration simulations before the search.
    #[arg(long)]
    pub equilibrate: bool,
    /// Skip equilibration and reuse the existing equilibration tree.
    #[arg(long)]
    pub no_equilibrate: bool,
}

impl EquilibrationFlags {
    /// The value forced on the command line, if any.
    pub fn forced(self) -> Option<bool> {
        if self.equilibrate {
            Some(true)
        } else if self.no_equilibrate {
            Some(false)
        } else {
            None
        }
    }
}
