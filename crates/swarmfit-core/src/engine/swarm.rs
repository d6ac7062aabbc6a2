use super::config::PsoCoefficients;
use super::error::EngineError;
use super::particle::{Particle, compare_costs};
use super::topology::GroupLayout;
use crate::core::models::parameter::ParameterSpec;
use nalgebra::DVector;
use rand::Rng;

/// The full population, one particle per worker, indexed by rank.
///
/// Only the particle held by each group's leader takes part in the search; the
/// remaining particles ride along so that every worker receives one in a scatter.
#[derive(Debug, Clone)]
pub struct Swarm {
    layout: GroupLayout,
    particles: Vec<Particle>,
}

impl Swarm {
    pub fn initialize(layout: GroupLayout, specs: &[ParameterSpec], rng: &mut impl Rng) -> Self {
        let particles = (0..layout.pool_size())
            .map(|_| Particle::random(specs, rng))
            .collect();
        Self { layout, particles }
    }

    pub fn from_particles(layout: GroupLayout, particles: Vec<Particle>) -> Result<Self, EngineError> {
        let mut swarm = Self {
            layout,
            particles: Vec::new(),
        };
        swarm.reassemble(particles)?;
        Ok(swarm)
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn into_particles(self) -> Vec<Particle> {
        self.particles
    }

    /// Hands the particles out for a scatter, leaving the swarm empty until reassembled.
    pub fn take_particles(&mut self) -> Vec<Particle> {
        std::mem::take(&mut self.particles)
    }

    /// Puts gathered particles back, in rank order.
    pub fn reassemble(&mut self, particles: Vec<Particle>) -> Result<(), EngineError> {
        if particles.len() != self.layout.pool_size() {
            return Err(EngineError::Internal(format!(
                "gathered {} particles for a pool of {}",
                particles.len(),
                self.layout.pool_size()
            )));
        }
        self.particles = particles;
        Ok(())
    }

    /// Leader particles as `(rank, particle)`, in group order.
    pub fn leaders(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.layout
            .leader_ranks()
            .map(move |rank| (rank, &self.particles[rank]))
    }

    pub fn followers(&self) -> impl Iterator<Item = (usize, &Particle)> {
        self.layout
            .contexts()
            .filter(|ctx| !ctx.role.is_leader())
            .map(move |ctx| (ctx.rank, &self.particles[ctx.rank]))
    }

    /// Moves every leader particle one PSO step; follower particles are untouched.
    pub fn advance_leaders(
        &mut self,
        specs: &[ParameterSpec],
        coefficients: &PsoCoefficients,
        global_best: &DVector<f64>,
        rng: &mut impl Rng,
    ) {
        for rank in self.layout.leader_ranks() {
            let particle = &mut self.particles[rank];
            particle.update_velocity(coefficients, global_best, rng);
            particle.update_position(specs);
        }
    }

    /// Lowest-cost leader particle; among equal costs the lowest rank wins and a
    /// NaN cost loses to any number.
    pub fn best_leader(&self) -> Option<&Particle> {
        self.leaders()
            .map(|(_, particle)| particle)
            .min_by(|a, b| compare_costs(a.cost(), b.cost()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::fixtures::{coefficients, parameters};
    use crate::engine::particle::UNEVALUATED_COST;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn swarm_with_costs(costs: &[f64]) -> Swarm {
        let layout = GroupLayout::new(costs.len(), 2).unwrap();
        let specs = parameters();
        let mut rng = StdRng::seed_from_u64(5);
        let particles = costs
            .iter()
            .map(|&cost| {
                let mut p = Particle::random(&specs, &mut rng);
                if cost != UNEVALUATED_COST {
                    p.record_evaluation(vec![0.8, 0.7], cost);
                }
                p
            })
            .collect();
        Swarm::from_particles(layout, particles).unwrap()
    }

    #[test]
    fn initialize_creates_one_particle_per_worker() {
        let layout = GroupLayout::new(6, 3).unwrap();
        let swarm = Swarm::initialize(layout, &parameters(), &mut StdRng::seed_from_u64(1));
        assert_eq!(swarm.particles().len(), 6);
        assert_eq!(swarm.leaders().count(), 2);
        assert_eq!(swarm.followers().count(), 4);
    }

    #[test]
    fn best_leader_ignores_followers() {
        let swarm = swarm_with_costs(&[0.5, 0.01, 0.3, 0.02]);
        let best = swarm.best_leader().unwrap();
        assert_eq!(best.cost(), 0.3);
    }

    #[test]
    fn best_leader_prefers_the_lowest_rank_on_ties() {
        let swarm = swarm_with_costs(&[0.3, UNEVALUATED_COST, 0.3, UNEVALUATED_COST]);
        let best = swarm.best_leader().unwrap();
        assert!(std::ptr::eq(best, &swarm.particles()[0]));
    }

    #[test]
    fn nan_leader_cost_never_wins() {
        let swarm = swarm_with_costs(&[f64::NAN, 0.01, 0.7, 0.02, UNEVALUATED_COST, 0.0]);
        let best = swarm.best_leader().unwrap();
        assert!(std::ptr::eq(best, &swarm.particles()[2]));

        let swarm = swarm_with_costs(&[0.7, 0.0, f64::NAN, 0.0]);
        assert!(std::ptr::eq(swarm.best_leader().unwrap(), &swarm.particles()[0]));
    }

    #[test]
    fn all_nan_leaders_fall_back_to_the_lowest_rank() {
        let swarm = swarm_with_costs(&[f64::NAN, 0.1, -f64::NAN, 0.1]);
        assert!(std::ptr::eq(swarm.best_leader().unwrap(), &swarm.particles()[0]));
    }

    #[test]
    fn advancing_moves_only_leaders() {
        let layout = GroupLayout::new(4, 2).unwrap();
        let specs = parameters();
        let mut rng = StdRng::seed_from_u64(9);
        let mut swarm = Swarm::initialize(layout, &specs, &mut rng);
        let before = swarm.particles().to_vec();

        let global_best = DVector::from_vec(vec![1.0, 1.0]);
        swarm.advance_leaders(&specs, &coefficients(), &global_best, &mut rng);

        for (rank, particle) in swarm.followers() {
            assert_eq!(particle, &before[rank]);
        }
        for (rank, particle) in swarm.leaders() {
            assert_ne!(particle.position(), before[rank].position());
        }
    }

    #[test]
    fn reassembling_the_wrong_number_of_particles_fails() {
        let mut swarm = swarm_with_costs(&[0.1, 0.2]);
        let mut particles = swarm.take_particles();
        particles.pop();
        assert!(matches!(
            swarm.reassemble(particles),
            Err(EngineError::Internal(_))
        ));
    }
}
