//! The worker side of the pool: one call to [`serve`] per worker thread.
//!
//! Evaluating a particle is a four-step protocol shared by the members of a group:
//! the leader prepares the working area, every member simulates its own
//! temperature, and the leader turns the trajectories into densities and a cost.
//! Barriers separate the steps, and every member reaches both of them whatever
//! fails in between.

use super::backend::{RunStatus, SimulationBackend, WorkingArea};
use super::comm::{Command, Envelope, GroupRendezvous, Reply, WorkerEndpoint};
use super::config::OptimizationConfig;
use super::particle::{Particle, UNEVALUATED_COST};
use super::topology::WorkerContext;
use crate::core::cost::density_cost;
use crate::core::density::{DensityEstimate, FAILED_DENSITY};
use tracing::{debug, error, info_span, warn};

/// Serves commands until shutdown or until the coordinator goes away.
pub(crate) fn serve<B>(endpoint: WorkerEndpoint, config: &OptimizationConfig, backend: &B)
where
    B: SimulationBackend + ?Sized,
{
    let WorkerEndpoint {
        context,
        commands,
        replies,
        group,
    } = endpoint;
    let span = info_span!(
        "worker",
        rank = context.rank,
        group = context.group_id,
        role = %context.role
    );
    let _enter = span.enter();
    debug!(temperature = %config.temperatures[context.temperature_index].label(), "Worker started.");

    while let Ok(command) = commands.recv() {
        let reply = match command {
            Command::Evaluate {
                iteration,
                mut particle,
            } => {
                evaluate(&context, &group, config, backend, iteration, &mut particle);
                Reply::Evaluated(particle)
            }
            Command::Equilibrate => Reply::Equilibrated {
                succeeded: equilibrate(&context, backend),
            },
            Command::Shutdown => break,
        };
        let envelope = Envelope {
            rank: context.rank,
            reply,
        };
        if replies.send(envelope).is_err() {
            break;
        }
    }
    debug!("Worker stopped.");
}

fn equilibrate<B>(context: &WorkerContext, backend: &B) -> bool
where
    B: SimulationBackend + ?Sized,
{
    match backend.equilibrate(context.temperature_index) {
        Ok(RunStatus::Succeeded) => true,
        Ok(RunStatus::Failed { code }) => {
            warn!(?code, "Equilibration simulation exited unsuccessfully.");
            false
        }
        Err(e) => {
            warn!(error = %e, "Equilibration simulation could not be run.");
            false
        }
    }
}

/// Runs the evaluation protocol for this worker's share of `particle`.
///
/// Only the leader modifies `particle`; followers hand it back untouched.
fn evaluate<B>(
    context: &WorkerContext,
    group: &GroupRendezvous,
    config: &OptimizationConfig,
    backend: &B,
    iteration: usize,
    particle: &mut Particle,
) where
    B: SimulationBackend + ?Sized,
{
    let area = WorkingArea::new(iteration, context.group_id);

    if context.role.is_leader() {
        group.reset();
        match backend.prepare_working_area(&area, particle.parameters().as_slice()) {
            Ok(()) => group.mark_prepared(),
            Err(e) => warn!(
                %area,
                error = %e,
                "Failed to prepare working area; the group skips simulation."
            ),
        }
    }
    group.wait();

    let succeeded = group.is_prepared() && simulate(context, backend, &area);
    group.record_run(context.temperature_index, succeeded);
    group.wait();

    if context.role.is_leader() {
        aggregate(group, config, backend, &area, particle);
    }
}

fn simulate<B>(context: &WorkerContext, backend: &B, area: &WorkingArea) -> bool
where
    B: SimulationBackend + ?Sized,
{
    match backend.run_simulation(area, context.temperature_index) {
        Ok(RunStatus::Succeeded) => true,
        Ok(RunStatus::Failed { code }) => {
            warn!(%area, ?code, "Simulation exited unsuccessfully.");
            false
        }
        Err(e) => {
            warn!(%area, error = %e, "Simulation could not be run.");
            false
        }
    }
}

fn aggregate<B>(
    group: &GroupRendezvous,
    config: &OptimizationConfig,
    backend: &B,
    area: &WorkingArea,
    particle: &mut Particle,
) where
    B: SimulationBackend + ?Sized,
{
    let densities: Vec<f64> = (0..config.group_size())
        .map(|index| measure_density(group, config, backend, area, index))
        .collect();

    let cost = match density_cost(
        &densities,
        &config.target_densities(),
        &config.temperature_values(),
    ) {
        Ok(cost) => cost,
        Err(e) => {
            error!(%area, error = %e, "Cost evaluation failed.");
            UNEVALUATED_COST
        }
    };

    particle.record_evaluation(densities, cost);
    let improved = particle.update_personal_best();
    debug!(%area, cost, improved, "Particle evaluated.");
}

fn measure_density<B>(
    group: &GroupRendezvous,
    config: &OptimizationConfig,
    backend: &B,
    area: &WorkingArea,
    temperature_index: usize,
) -> f64
where
    B: SimulationBackend + ?Sized,
{
    let temperature = config.temperatures[temperature_index].label();
    if !group.run_succeeded(temperature_index) {
        warn!(%area, %temperature, "No successful simulation; using the failure density.");
        return FAILED_DENSITY;
    }

    let samples = match backend.read_trajectory(area, temperature_index) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(%area, %temperature, error = %e, "Error reading trajectory; using the failure density.");
            return FAILED_DENSITY;
        }
    };

    let estimate = DensityEstimate::from_samples(&samples);
    match estimate {
        DensityEstimate::Averaged { density, window } => {
            debug!(%area, %temperature, density, window, "Density averaged.");
        }
        DensityEstimate::Insufficient { records } => {
            warn!(%area, %temperature, records, "Trajectory too short; using the failure density.");
        }
        DensityEstimate::NonFinite { window } => {
            warn!(%area, %temperature, window, "Non-finite density; using the failure density.");
        }
    }
    estimate.value()
}
