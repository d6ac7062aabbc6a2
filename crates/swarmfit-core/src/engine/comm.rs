//! Message passing between the coordinator and the worker pool.
//!
//! The coordinator holds one command channel per worker and a single reply
//! channel shared by all of them. Members of a group additionally share a
//! [`GroupRendezvous`] so they can synchronize between the phases of an evaluation.

use super::error::EngineError;
use super::particle::Particle;
use super::topology::{GroupLayout, WorkerContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex};

#[derive(Debug)]
pub(crate) enum Command {
    /// Run the equilibration simulation for the worker's temperature.
    Equilibrate,
    /// Take part in evaluating `particle` for `iteration`.
    Evaluate { iteration: usize, particle: Particle },
    Shutdown,
}

#[derive(Debug)]
pub(crate) enum Reply {
    Equilibrated { succeeded: bool },
    Evaluated(Particle),
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub rank: usize,
    pub reply: Reply,
}

/// Synchronization point shared by the members of one group.
#[derive(Debug)]
pub(crate) struct GroupRendezvous {
    barrier: Barrier,
    prepared: AtomicBool,
    runs: Mutex<Vec<bool>>,
}

impl GroupRendezvous {
    pub fn new(group_size: usize) -> Self {
        Self {
            barrier: Barrier::new(group_size),
            prepared: AtomicBool::new(false),
            runs: Mutex::new(vec![false; group_size]),
        }
    }

    /// Blocks until every member of the group has arrived.
    pub fn wait(&self) {
        self.barrier.wait();
    }

    /// Clears the status left by the previous evaluation. Leader only, before the first barrier.
    pub fn reset(&self) {
        self.prepared.store(false, Ordering::SeqCst);
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.iter_mut().for_each(|ok| *ok = false);
    }

    pub fn mark_prepared(&self) {
        self.prepared.store(true, Ordering::SeqCst);
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn record_run(&self, temperature_index: usize, succeeded: bool) {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs[temperature_index] = succeeded;
    }

    pub fn run_succeeded(&self, temperature_index: usize) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs[temperature_index]
    }
}

/// Everything one worker thread needs to serve commands.
pub(crate) struct WorkerEndpoint {
    pub context: WorkerContext,
    pub commands: Receiver<Command>,
    pub replies: Sender<Envelope>,
    pub group: Arc<GroupRendezvous>,
}

/// Coordinator side of the worker channels.
pub(crate) struct Coordinator {
    senders: Vec<Sender<Command>>,
    replies: Receiver<Envelope>,
}

impl Coordinator {
    pub fn pool_size(&self) -> usize {
        self.senders.len()
    }

    pub fn send(&self, rank: usize, command: Command) -> Result<(), EngineError> {
        self.senders[rank]
            .send(command)
            .map_err(|_| EngineError::WorkerDisconnected { rank })
    }

    /// Hands particle `rank` to worker `rank`.
    pub fn scatter(&self, iteration: usize, particles: Vec<Particle>) -> Result<(), EngineError> {
        if particles.len() != self.pool_size() {
            return Err(EngineError::Internal(format!(
                "cannot scatter {} particles over {} workers",
                particles.len(),
                self.pool_size()
            )));
        }
        for (rank, particle) in particles.into_iter().enumerate() {
            self.send(rank, Command::Evaluate {
                iteration,
                particle,
            })?;
        }
        Ok(())
    }

    /// Waits for one reply from each rank in `ranks` and returns them in rank order.
    pub fn gather(&self, ranks: &[usize]) -> Result<Vec<Reply>, EngineError> {
        let mut slots: Vec<Option<Reply>> = ranks.iter().map(|_| None).collect();
        for _ in ranks {
            let envelope = self.replies.recv().map_err(|_| {
                let missing = ranks
                    .iter()
                    .zip(&slots)
                    .find_map(|(&rank, slot)| slot.is_none().then_some(rank))
                    .unwrap_or_default();
                EngineError::WorkerDisconnected { rank: missing }
            })?;
            let slot = ranks
                .iter()
                .position(|&rank| rank == envelope.rank)
                .ok_or_else(|| {
                    EngineError::Internal(format!("unexpected reply from worker {}", envelope.rank))
                })?;
            if slots[slot].replace(envelope.reply).is_some() {
                return Err(EngineError::Internal(format!(
                    "worker {} replied twice",
                    envelope.rank
                )));
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Gathers the evaluated particles of the whole pool, in rank order.
    pub fn gather_particles(&self) -> Result<Vec<Particle>, EngineError> {
        let ranks: Vec<usize> = (0..self.pool_size()).collect();
        self.gather(&ranks)?
            .into_iter()
            .zip(ranks)
            .map(|(reply, rank)| match reply {
                Reply::Evaluated(particle) => Ok(particle),
                other => Err(EngineError::Internal(format!(
                    "worker {rank} answered an evaluation with {other:?}"
                ))),
            })
            .collect()
    }

    /// Asks every worker to stop. Workers that are already gone are ignored.
    pub fn shutdown(&self) {
        for sender in &self.senders {
            let _ = sender.send(Command::Shutdown);
        }
    }
}

/// Creates the channels and group rendezvous for every worker in `layout`.
pub(crate) fn channels(layout: &GroupLayout) -> (Coordinator, Vec<WorkerEndpoint>) {
    let (reply_tx, reply_rx) = mpsc::channel();
    let groups: Vec<Arc<GroupRendezvous>> = (0..layout.group_count())
        .map(|_| Arc::new(GroupRendezvous::new(layout.group_size())))
        .collect();

    let mut senders = Vec::with_capacity(layout.pool_size());
    let mut endpoints = Vec::with_capacity(layout.pool_size());
    for context in layout.contexts() {
        let (tx, rx) = mpsc::channel();
        senders.push(tx);
        endpoints.push(WorkerEndpoint {
            context,
            commands: rx,
            replies: reply_tx.clone(),
            group: Arc::clone(&groups[context.group_id]),
        });
    }

    (
        Coordinator {
            senders,
            replies: reply_rx,
        },
        endpoints,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::fixtures::parameters;
    use nalgebra::DVector;
    use std::thread;

    fn particle(x: f64) -> Particle {
        Particle::new(DVector::from_vec(vec![x, x]), &parameters())
    }

    #[test]
    fn endpoints_share_a_rendezvous_per_group() {
        let layout = GroupLayout::new(4, 2).unwrap();
        let (coordinator, endpoints) = channels(&layout);
        assert_eq!(coordinator.pool_size(), 4);
        assert!(Arc::ptr_eq(&endpoints[0].group, &endpoints[1].group));
        assert!(!Arc::ptr_eq(&endpoints[1].group, &endpoints[2].group));
        assert_eq!(endpoints[3].context, layout.context(3));
    }

    #[test]
    fn gather_returns_replies_in_rank_order() {
        let layout = GroupLayout::new(3, 1).unwrap();
        let (coordinator, endpoints) = channels(&layout);
        let particles: Vec<Particle> = (0..3).map(|i| particle(i as f64 / 4.0)).collect();
        coordinator.scatter(0, particles.clone()).unwrap();

        // Echo in reverse rank order.
        for endpoint in endpoints.into_iter().rev() {
            match endpoint.commands.recv().unwrap() {
                Command::Evaluate { particle, .. } => endpoint
                    .replies
                    .send(Envelope {
                        rank: endpoint.context.rank,
                        reply: Reply::Evaluated(particle),
                    })
                    .unwrap(),
                other => panic!("unexpected command {other:?}"),
            }
        }

        assert_eq!(coordinator.gather_particles().unwrap(), particles);
    }

    #[test]
    fn gather_reports_disconnected_workers() {
        let layout = GroupLayout::new(2, 2).unwrap();
        let (coordinator, endpoints) = channels(&layout);
        drop(endpoints);
        let result = coordinator.gather(&[0, 1]);
        assert!(matches!(
            result,
            Err(EngineError::WorkerDisconnected { rank: 0 })
        ));
        assert!(matches!(
            coordinator.send(1, Command::Shutdown),
            Err(EngineError::WorkerDisconnected { rank: 1 })
        ));
    }

    #[test]
    fn scatter_rejects_a_mismatched_swarm() {
        let layout = GroupLayout::new(2, 1).unwrap();
        let (coordinator, _endpoints) = channels(&layout);
        let result = coordinator.scatter(0, vec![particle(0.5)]);
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }

    #[test]
    fn rendezvous_status_is_visible_after_the_barrier() {
        let group = GroupRendezvous::new(2);
        thread::scope(|s| {
            s.spawn(|| {
                group.reset();
                group.mark_prepared();
                group.wait();
                group.record_run(0, true);
                group.wait();
            });
            s.spawn(|| {
                group.wait();
                assert!(group.is_prepared());
                group.record_run(1, false);
                group.wait();
                assert!(group.run_succeeded(0));
                assert!(!group.run_succeeded(1));
            });
        });
    }
}
