use crate::core::io::run_log::RunLog;
use crate::engine::backend::SimulationBackend;
use crate::engine::comm::{Command, Coordinator, Reply, channels};
use crate::engine::config::OptimizationConfig;
use crate::engine::error::EngineError;
use crate::engine::evaluation::serve;
use crate::engine::particle::Particle;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{GlobalBest, IterationSummary};
use crate::engine::swarm::Swarm;
use crate::engine::topology::GroupLayout;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::thread;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub global_best: GlobalBest,
    /// One entry per iteration, starting with the initial evaluation (iteration 0).
    pub history: Vec<IterationSummary>,
    /// Final state of every particle in the pool, in rank order.
    pub swarm: Vec<Particle>,
}

/// Runs the complete optimization: optional equilibration, the initial evaluation,
/// then `max_iterations` PSO updates of the leader particles.
///
/// Worker threads live for the duration of the call. The worker topology is
/// checked before any simulation work is started.
#[instrument(skip_all, name = "optimization_workflow")]
pub fn run<B>(
    config: &OptimizationConfig,
    backend: &B,
    reporter: &ProgressReporter,
) -> Result<OptimizationResult, EngineError>
where
    B: SimulationBackend + ?Sized,
{
    let layout =
        GroupLayout::for_population(config.population, config.workers, config.group_size())?;
    info!(
        workers = layout.pool_size(),
        groups = layout.group_count(),
        group_size = layout.group_size(),
        dimension = config.dimension(),
        "Starting particle-swarm optimization."
    );

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut run_log = config
        .run_log_path
        .as_deref()
        .map(RunLog::open)
        .transpose()?;

    thread::scope(|scope| {
        let (coordinator, endpoints) = channels(&layout);
        for endpoint in endpoints {
            let name = format!("worker-{}", endpoint.context.rank);
            thread::Builder::new()
                .name(name)
                .spawn_scoped(scope, move || serve(endpoint, config, backend))
                .map_err(|e| EngineError::Initialization(format!("failed to spawn worker: {e}")))?;
        }

        let session = Session {
            coordinator: &coordinator,
            layout: &layout,
            config,
            reporter,
        };
        let result = session.drive(backend, &mut rng, &mut run_log);
        coordinator.shutdown();
        result
    })
}

/// Coordinator-side view of a running optimization.
struct Session<'a, 'r> {
    coordinator: &'a Coordinator,
    layout: &'a GroupLayout,
    config: &'a OptimizationConfig,
    reporter: &'a ProgressReporter<'r>,
}

impl Session<'_, '_> {
    fn drive<B>(
        &self,
        backend: &B,
        rng: &mut StdRng,
        run_log: &mut Option<RunLog>,
    ) -> Result<OptimizationResult, EngineError>
    where
        B: SimulationBackend + ?Sized,
    {
        if self.config.equilibrate {
            self.equilibrate(backend)?;
        } else {
            info!("Equilibration disabled; reusing the existing equilibration tree.");
        }

        self.reporter.report(Progress::IterationsPlanned {
            total: self.config.max_iterations as u64 + 1,
        });

        let mut swarm = Swarm::initialize(*self.layout, &self.config.parameters, rng);
        self.evaluate(&mut swarm, 0)?;
        let first = swarm
            .best_leader()
            .ok_or_else(|| EngineError::Internal("swarm has no leader particles".to_string()))?;
        let mut global_best = GlobalBest::from_particle(first, 0);
        let mut history = Vec::with_capacity(self.config.max_iterations + 1);
        history.push(IterationSummary {
            iteration: 0,
            iteration_best_cost: global_best.cost,
            global_best_cost: global_best.cost,
            improved: true,
        });
        self.finish_iteration(&swarm, 0, &global_best, true, run_log)?;

        for iteration in 1..=self.config.max_iterations {
            swarm.advance_leaders(
                &self.config.parameters,
                &self.config.coefficients,
                &global_best.position,
                rng,
            );
            self.evaluate(&mut swarm, iteration)?;

            let best = swarm
                .best_leader()
                .ok_or_else(|| EngineError::Internal("swarm has no leader particles".to_string()))?;
            let iteration_best_cost = best.cost();
            let improved = global_best.offer(best, iteration);

            history.push(IterationSummary {
                iteration,
                iteration_best_cost,
                global_best_cost: global_best.cost,
                improved,
            });
            self.finish_iteration(&swarm, iteration, &global_best, improved, run_log)?;
        }

        info!(
            cost = global_best.cost,
            found_in = global_best.iteration,
            parameters = ?global_best.parameters.as_slice(),
            "Optimization complete."
        );
        Ok(OptimizationResult {
            global_best,
            history,
            swarm: swarm.into_particles(),
        })
    }

    /// Generates the equilibration inputs, then lets group 0 equilibrate every temperature.
    fn equilibrate<B>(&self, backend: &B) -> Result<(), EngineError>
    where
        B: SimulationBackend + ?Sized,
    {
        self.reporter.phase("Equilibration", || {
            info!("Generating files for equilibration.");
            backend.prepare_equilibration()?;

            let ranks: Vec<usize> = self.layout.members(0).collect();
            for &rank in &ranks {
                self.coordinator.send(rank, Command::Equilibrate)?;
            }
            let failed = self
                .coordinator
                .gather(&ranks)?
                .iter()
                .filter(|reply| !matches!(reply, Reply::Equilibrated { succeeded: true }))
                .count();

            if failed > 0 {
                warn!(
                    failed,
                    total = ranks.len(),
                    "Some equilibration simulations failed; continuing."
                );
                self.reporter.report(Progress::Message(format!(
                    "{failed} of {} equilibration runs failed; continuing without them.",
                    ranks.len()
                )));
            } else {
                info!("Done equilibrating simulations.");
            }
            Ok::<(), EngineError>(())
        })
    }

    /// Scatters the swarm, lets every group evaluate its particle, and gathers it back.
    fn evaluate(&self, swarm: &mut Swarm, iteration: usize) -> Result<(), EngineError> {
        debug!(iteration, "Scattering the swarm.");
        self.coordinator.scatter(iteration, swarm.take_particles())?;
        let particles = self.coordinator.gather_particles()?;
        swarm.reassemble(particles)
    }

    fn finish_iteration(
        &self,
        swarm: &Swarm,
        iteration: usize,
        global_best: &GlobalBest,
        improved: bool,
        run_log: &mut Option<RunLog>,
    ) -> Result<(), EngineError> {
        if let Some(log) = run_log.as_mut() {
            for (_, particle) in swarm.leaders() {
                log.append(&particle.to_log_record(iteration))?;
            }
        }

        if improved {
            info!(
                iteration,
                cost = global_best.cost,
                "New global best found."
            );
        } else {
            info!(iteration, cost = global_best.cost, "Iteration complete.");
        }
        self.reporter.report(Progress::IterationFinish {
            iteration,
            global_best_cost: global_best.cost,
            improved,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::density::FAILED_DENSITY;
    use crate::engine::backend::testing::ScriptedBackend;
    use crate::engine::config::fixtures::builder;
    use crate::engine::particle::UNEVALUATED_COST;
    use crate::engine::topology::TopologyError;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn run_quietly(config: &OptimizationConfig, backend: &ScriptedBackend) -> OptimizationResult {
        run(config, backend, &ProgressReporter::new()).unwrap()
    }

    #[test]
    fn global_best_is_the_lowest_leader_cost_and_followers_stay_unevaluated() {
        let config = builder().build().unwrap();
        let backend = ScriptedBackend::linear();
        let result = run_quietly(&config, &backend);

        assert_eq!(result.history.len(), 2);
        assert_eq!(result.swarm.len(), 4);

        let lowest_leader_cost = [&result.swarm[0], &result.swarm[2]]
            .iter()
            .map(|p| p.best_cost())
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.global_best.cost, lowest_leader_cost);

        for follower in [&result.swarm[1], &result.swarm[3]] {
            assert_eq!(follower.cost(), UNEVALUATED_COST);
            assert!(follower.densities().is_empty());
        }
        for leader in [&result.swarm[0], &result.swarm[2]] {
            assert_eq!(leader.densities().len(), 2);
            assert!(leader.cost() < UNEVALUATED_COST);
        }
    }

    #[test]
    fn global_best_cost_never_increases() {
        let config = builder()
            .max_iterations(6)
            .population(3)
            .build()
            .unwrap();
        let result = run_quietly(&config, &ScriptedBackend::linear());

        assert_eq!(result.history.len(), 7);
        for (previous, next) in result.history.iter().zip(result.history.iter().skip(1)) {
            assert!(next.global_best_cost <= previous.global_best_cost);
            assert!(next.global_best_cost <= next.iteration_best_cost);
            assert_eq!(next.improved, next.global_best_cost < previous.global_best_cost);
        }
        assert_eq!(
            result.global_best.cost,
            result.history.last().unwrap().global_best_cost
        );
    }

    #[test]
    fn every_group_gets_a_working_area_per_iteration() {
        let config = builder().max_iterations(2).build().unwrap();
        let backend = ScriptedBackend::linear();
        run_quietly(&config, &backend);

        let prepared = backend.prepared_areas();
        assert_eq!(prepared.len(), 3 * 2);
        assert_eq!(backend.runs().len(), 3 * 2 * 2);
    }

    #[test]
    fn fixed_seed_reproduces_the_run() {
        let config = builder().max_iterations(3).build().unwrap();
        let first = run_quietly(&config, &ScriptedBackend::linear());
        let second = run_quietly(&config, &ScriptedBackend::linear());
        assert_eq!(first.global_best, second.global_best);
        assert_eq!(first.history, second.history);
    }

    #[test]
    fn population_mismatch_is_fatal_before_any_simulation() {
        let config = builder().workers(Some(6)).build().unwrap();
        let backend = ScriptedBackend::linear();
        let result = run(&config, &backend, &ProgressReporter::new());

        assert!(matches!(
            result,
            Err(EngineError::Topology(TopologyError::PopulationMismatch {
                population: 2,
                expected: 4,
                ..
            }))
        ));
        assert!(backend.prepared_areas().is_empty());
    }

    #[test]
    fn short_trajectories_leave_only_failure_densities() {
        let config = builder().build().unwrap();
        let backend = ScriptedBackend::linear().with_records(5);
        let result = run_quietly(&config, &backend);

        assert_eq!(
            result.global_best.densities,
            vec![FAILED_DENSITY, FAILED_DENSITY]
        );
        assert!(result.global_best.cost > 1000.0);
    }

    #[test]
    fn equilibration_runs_once_per_temperature_before_the_search() {
        let config = builder().equilibrate(true).build().unwrap();
        let backend = ScriptedBackend::linear();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(format!("{event:?}"));
        }));
        run(&config, &backend, &reporter).unwrap();

        assert!(backend.equilibration_prepared());
        assert_eq!(backend.equilibrations(), 2);

        let events = events.lock().unwrap();
        assert!(events[0].contains("Equilibration"));
        assert!(events[1].contains("PhaseFinish"));
        assert!(events[2].contains("IterationsPlanned { total: 2 }"));
        assert_eq!(
            events
                .iter()
                .filter(|e| e.starts_with("IterationFinish"))
                .count(),
            2
        );
    }

    #[test]
    fn failed_equilibration_is_reported_and_the_search_continues() {
        let config = builder().equilibrate(true).build().unwrap();
        let backend = ScriptedBackend::linear().failing_temperature(1);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(format!("{event:?}"));
        }));
        let result = run(&config, &backend, &reporter).unwrap();

        assert_eq!(backend.equilibrations(), 2);
        assert_eq!(result.history.len(), 2);
        let events = events.lock().unwrap();
        let messages: Vec<&String> = events.iter().filter(|e| e.starts_with("Message")).collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("1 of 2 equilibration runs failed"));
    }

    #[test]
    fn blown_up_simulations_never_poison_the_global_best() {
        let config = builder().max_iterations(3).build().unwrap();
        let backend = ScriptedBackend::new(|_, _| f64::NAN);
        let result = run_quietly(&config, &backend);

        assert_eq!(
            result.global_best.densities,
            vec![FAILED_DENSITY, FAILED_DENSITY]
        );
        assert!(result.global_best.cost.is_finite());
        for summary in &result.history {
            assert!(summary.global_best_cost.is_finite());
        }
    }

    #[test]
    fn run_log_gets_one_record_per_leader_and_iteration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let config = builder()
            .max_iterations(2)
            .run_log_path(Some(path.clone()))
            .build()
            .unwrap();
        run_quietly(&config, &ScriptedBackend::linear());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 3);
        assert!(lines[0].starts_with("iteration,position"));
        assert!(lines[1].starts_with("0,"));
        assert!(lines[6].starts_with("2,"));
    }
}
