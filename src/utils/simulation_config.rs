use std::num::NonZeroUsize;
use std::thread;

use crate::utils::{
    constants::{
        DEFAULT_LEAF_CAPACITY, DEFAULT_MAX_DEPTH, DEFAULT_SOFTENING, DEFAULT_THETA,
        DEFAULT_WORLD, GRAVITATIONAL_CONSTANT,
    },
    errors::SimulationError,
    Rectangle,
};

/// What the tree rebuild does with particles that drifted outside the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryPolicy {
    /// Pull positions back onto the world edge before inserting.
    #[default]
    Clamp,
    /// Fail the rebuild with `SimulationError::InsertionOutOfBounds`.
    Reject,
}

/// Tunable values of a simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub world: Rectangle,
    pub gravitational_constant: f64,
    /// Added to the squared distance of every pairwise interaction.
    pub softening: f64,
    /// Barnes-Hut opening angle.
    pub theta: f64,
    pub leaf_capacity: usize,
    pub max_depth: u8,
    pub worker_count: usize,
    pub boundary_policy: BoundaryPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: DEFAULT_WORLD,
            gravitational_constant: GRAVITATIONAL_CONSTANT,
            softening: DEFAULT_SOFTENING,
            theta: DEFAULT_THETA,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            worker_count: default_worker_count(),
            boundary_policy: BoundaryPolicy::Clamp,
        }
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(4)
}

impl SimulationConfig {
    /// Builds a configuration, falling back to the default for every `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_nbody::utils::SimulationConfig;
    ///
    /// let config = SimulationConfig::new(None, None, Some(0.3), None, None, Some(2));
    /// assert_eq!(config.theta, 0.3);
    /// assert_eq!(config.worker_count, 2);
    /// assert_eq!(config.leaf_capacity, SimulationConfig::default().leaf_capacity);
    /// ```
    pub fn new(
        world: Option<Rectangle>,
        softening: Option<f64>,
        theta: Option<f64>,
        leaf_capacity: Option<usize>,
        max_depth: Option<u8>,
        worker_count: Option<usize>,
    ) -> Self {
        let default = Self::default();
        Self {
            world: world.unwrap_or(default.world),
            softening: softening.unwrap_or(default.softening),
            theta: theta.unwrap_or(default.theta),
            leaf_capacity: leaf_capacity.unwrap_or(default.leaf_capacity),
            max_depth: max_depth.unwrap_or(default.max_depth),
            worker_count: worker_count.unwrap_or(default.worker_count),
            ..default
        }
    }

    pub fn with_world(mut self, world: Rectangle) -> Self {
        self.world = world;
        self
    }

    pub fn with_gravitational_constant(mut self, g: f64) -> Self {
        self.gravitational_constant = g;
        self
    }

    pub fn with_softening(mut self, softening: f64) -> Self {
        self.softening = softening;
        self
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_boundary_policy(mut self, boundary_policy: BoundaryPolicy) -> Self {
        self.boundary_policy = boundary_policy;
        self
    }

    /// Checks every value against the range the solver can work with.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.world.is_degenerate() {
            return Err(SimulationError::InvalidConfig("world bounds must have a positive, finite size".to_string()));
        }
        if !(self.gravitational_constant.is_finite() && self.gravitational_constant > 0.0) {
            return Err(SimulationError::InvalidConfig("gravitational constant must be positive".to_string()));
        }
        if !(self.softening.is_finite() && self.softening >= 0.0) {
            return Err(SimulationError::InvalidConfig("softening must be non-negative".to_string()));
        }
        if !(self.theta.is_finite() && self.theta >= 0.0) {
            return Err(SimulationError::InvalidConfig("theta must be non-negative".to_string()));
        }
        if self.leaf_capacity == 0 {
            return Err(SimulationError::InvalidConfig("leaf capacity must be at least 1".to_string()));
        }
        if self.worker_count == 0 {
            return Err(SimulationError::InvalidConfig("worker count must be at least 1".to_string()));
        }
        Ok(())
    }
}
