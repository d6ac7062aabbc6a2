//! Static partition of the worker pool into evaluation groups.
//!
//! Every group evaluates one particle and holds one worker per temperature. The
//! worker with role index 0 leads the group: it prepares the shared working area
//! and aggregates the cost. Roles are assigned here, once, and carried by
//! [`WorkerContext`] everywhere else.

use std::fmt;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    #[inline]
    pub fn is_leader(self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Leader => write!(f, "leader"),
            Role::Follower => write!(f, "follower"),
        }
    }
}

/// Identity of one worker within the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerContext {
    pub rank: usize,
    pub group_id: usize,
    pub role: Role,
    /// Index of the temperature this worker simulates.
    pub temperature_index: usize,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TopologyError {
    #[error("Group size must be at least 1; no temperatures are defined")]
    EmptyGroup,
    #[error("The worker pool is empty")]
    EmptyPool,
    #[error("A pool of {pool} workers cannot be split into groups of {group_size}")]
    Indivisible { pool: usize, group_size: usize },
    #[error(
        "A population of {population} needs {expected} workers ({group_size} per particle), but the pool has {pool}"
    )]
    PopulationMismatch {
        population: usize,
        group_size: usize,
        pool: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLayout {
    pool_size: usize,
    group_size: usize,
}

impl GroupLayout {
    pub fn new(pool_size: usize, group_size: usize) -> Result<Self, TopologyError> {
        if group_size == 0 {
            return Err(TopologyError::EmptyGroup);
        }
        if pool_size == 0 {
            return Err(TopologyError::EmptyPool);
        }
        if pool_size % group_size != 0 {
            return Err(TopologyError::Indivisible {
                pool: pool_size,
                group_size,
            });
        }
        Ok(Self {
            pool_size,
            group_size,
        })
    }

    /// Builds the layout and checks that it yields exactly `population` groups.
    pub fn for_population(
        population: usize,
        pool_size: usize,
        group_size: usize,
    ) -> Result<Self, TopologyError> {
        let layout = Self::new(pool_size, group_size)?;
        if layout.group_count() != population {
            return Err(TopologyError::PopulationMismatch {
                population,
                group_size,
                pool: pool_size,
                expected: population * group_size,
            });
        }
        Ok(layout)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn group_count(&self) -> usize {
        self.pool_size / self.group_size
    }

    /// # Panics
    ///
    /// Panics if `rank` is outside the pool.
    pub fn context(&self, rank: usize) -> WorkerContext {
        assert!(
            rank < self.pool_size,
            "rank {rank} is outside a pool of {}",
            self.pool_size
        );
        let role_index = rank % self.group_size;
        WorkerContext {
            rank,
            group_id: rank / self.group_size,
            role: if role_index == 0 {
                Role::Leader
            } else {
                Role::Follower
            },
            temperature_index: role_index,
        }
    }

    pub fn contexts(&self) -> impl Iterator<Item = WorkerContext> + '_ {
        (0..self.pool_size).map(|rank| self.context(rank))
    }

    /// Ranks of the group leaders, in group order.
    pub fn leader_ranks(&self) -> impl Iterator<Item = usize> {
        (0..self.pool_size).step_by(self.group_size)
    }

    /// Ranks belonging to `group_id`.
    pub fn members(&self, group_id: usize) -> Range<usize> {
        let start = group_id * self.group_size;
        start..start + self.group_size
    }
}
