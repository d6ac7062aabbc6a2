use crate::error::{CliError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self},
    prelude::*,
};

/// Crates whose events follow the verbosity flags; everything else is capped at WARN.
const OWN_TARGETS: [&str; 2] = ["swarmfit", "swarmfit_cli"];

fn verbosity_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn targets(level: LevelFilter) -> Targets {
    OWN_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::WARN.min(level)), |t, target| {
            t.with_target(*target, level)
        })
}

/// Console filter: `-v` flags raise our own crates, dependencies stay at WARN.
fn stderr_filter(verbosity: u8, quiet: bool) -> Targets {
    targets(verbosity_level(verbosity, quiet))
}

/// File filter: never coarser than DEBUG, so per-worker evaluations are kept on disk
/// even when the console is quiet.
fn file_filter(verbosity: u8) -> Targets {
    targets(verbosity_level(verbosity, false).max(LevelFilter::DEBUG))
}

/// Creates (or truncates) the log file, making missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(CliError::Io)?;
    }
    File::create(path).map_err(CliError::Io)
}

/// Installs the global subscriber: a compact stderr layer, plus a plain-text file
/// layer with thread names when `log_file` is given.
///
/// Worker threads are named `worker-<rank>`, so file logs identify the writer of
/// every event even outside its span.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter(verbosity, quiet));

    let subscriber = tracing_subscriber::registry().with(stderr_layer);

    if let Some(path) = log_file {
        let file = open_log_file(&path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_target(true)
            .with_filter(file_filter(verbosity));

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    debug!(verbosity, quiet, "Logging initialized.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{Level, error, info, info_span, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        ensure_global_logger_is_set();

        error!(target: "swarmfit::engine", "Worker disconnected");
        warn!(target: "swarmfit::engine", "Equilibration failed; continuing");
        info!("Iteration finished");
        debug!("Density averaged");
        trace!("Command received");
    }

    #[test]
    fn verbosity_raises_only_our_own_crates() {
        let filter = stderr_filter(2, false);
        assert!(filter.would_enable("swarmfit::engine::evaluation", &Level::DEBUG));
        assert!(filter.would_enable("swarmfit_cli::commands::run", &Level::DEBUG));
        assert!(!filter.would_enable("swarmfit::engine::comm", &Level::TRACE));
        assert!(!filter.would_enable("tokio::runtime", &Level::INFO));
        assert!(filter.would_enable("tokio::runtime", &Level::WARN));
    }

    #[test]
    fn default_and_quiet_consoles_show_warnings_and_errors() {
        let default = stderr_filter(0, false);
        assert!(default.would_enable("swarmfit::workflows", &Level::WARN));
        assert!(!default.would_enable("swarmfit::workflows", &Level::INFO));

        let quiet = stderr_filter(3, true);
        assert!(quiet.would_enable("swarmfit::workflows", &Level::ERROR));
        assert!(!quiet.would_enable("swarmfit::workflows", &Level::WARN));
        assert!(!quiet.would_enable("tokio::runtime", &Level::WARN));
    }

    #[test]
    fn file_log_keeps_worker_debug_events_at_default_verbosity() {
        let filter = file_filter(0);
        assert!(filter.would_enable("swarmfit::engine::evaluation", &Level::DEBUG));
        assert!(!filter.would_enable("swarmfit::engine::evaluation", &Level::TRACE));
        assert!(!filter.would_enable("tokio::runtime", &Level::INFO));
        assert!(file_filter(3).would_enable("swarmfit::engine::comm", &Level::TRACE));
    }

    #[test]
    #[serial]
    fn file_layer_records_worker_span_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("test.log");

        let file = open_log_file(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_filter(file_filter(0));
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = info_span!(target: "swarmfit::engine", "worker", rank = 3, group = 1, role = "follower");
            let _enter = span.enter();
            debug!(target: "swarmfit::engine::evaluation", "Simulation exited unsuccessfully.");
            debug!(target: "hyper::proto", "ignored dependency chatter");
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Simulation exited unsuccessfully."));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
        assert!(content.contains("rank=3"));
        assert!(!content.contains("ignored dependency chatter"));
    }

    #[test]
    fn log_file_parent_directories_are_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("runs").join("fit-1").join("swarm.log");

        open_log_file(&log_path).unwrap();
        assert!(log_path.is_file());
    }

    #[test]
    fn log_file_that_is_a_directory_is_an_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = open_log_file(temp_dir.path());
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
