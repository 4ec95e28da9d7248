//! Per-tick orchestration of the two solvers.
//!
//! In tree mode every tick rebuilds the quadtree from the current positions, fans the
//! force queries out over the worker pool, then integrates every particle. In offload
//! mode the compute bridge advances the whole state and the results are copied back.
//!
//! # Example
//!
//! ```
//! use glam::DVec2;
//! use rs_nbody::particles::{Simulation, SpiralLayout, Spawner};
//! use rs_nbody::utils::SimulationConfig;
//!
//! let config = SimulationConfig::default().with_worker_count(2);
//! let particles = Spawner::spiral(400, config.world.center(), SpiralLayout::default()).unwrap();
//! let mut sim = Simulation::new(particles, config).expect("Failed to initialize simulation");
//!
//! sim.simulate(10, 0.016).expect("Simulation failed");
//! assert_eq!(sim.particles().len(), 400);
//! ```
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use glam::DVec2;
use log::{info, trace, warn};
use rayon::prelude::*;

use crate::compute::ComputeOffload;
use crate::concurrency::WorkerPool;
use crate::particles::{pairwise_potential, Particle, QuadTree, TreeParams, TreeStats};
use crate::utils::{BoundaryPolicy, SimulationConfig, SimulationError};

/// Which solver advances the particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    /// Barnes-Hut tree, parallel solve on the worker pool, CPU integration.
    #[default]
    Tree,
    /// Exact pairwise solve and integration on the compute bridge.
    Offload,
}

/// Wall-clock cost of each phase of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepTimings {
    pub mode: SimulationMode,
    pub tree: Duration,
    pub attraction: Duration,
    pub integration: Duration,
}

impl StepTimings {
    pub fn total(&self) -> Duration {
        self.tree + self.attraction + self.integration
    }
}

/// Counters that live as long as one simulation run and restart on [`Simulation::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulationContext {
    pub ticks: u64,
    /// Deepest leaf seen in any tree built during this run.
    pub max_depth_observed: u8,
    pub last_tree_stats: TreeStats,
    pub particles_clamped: u64,
}

pub struct Simulation {
    particles: Vec<Particle>,
    config: SimulationConfig,
    tree: Arc<QuadTree>,
    pool: WorkerPool,
    offload: Option<ComputeOffload>,
    mode: SimulationMode,
    requested_mode: SimulationMode,
    context: SimulationContext,
}

impl Simulation {
    /// Validates `config` and starts the worker pool.
    pub fn new(particles: Vec<Particle>, config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_count)?;
        let tree = QuadTree::new(config.world, TreeParams::from(&config));
        Ok(Simulation {
            particles,
            config,
            tree: Arc::new(tree),
            pool,
            offload: None,
            mode: SimulationMode::Tree,
            requested_mode: SimulationMode::Tree,
            context: SimulationContext::default(),
        })
    }

    /// Attaches a compute bridge, making [`SimulationMode::Offload`] selectable.
    pub fn with_offload(mut self, offload: ComputeOffload) -> Self {
        self.attach_offload(offload);
        self
    }

    pub fn attach_offload(&mut self, mut offload: ComputeOffload) {
        offload.mark_dirty();
        self.offload = Some(offload);
    }

    /// Detaches the compute bridge, falling back to tree mode from the next tick.
    pub fn detach_offload(&mut self) -> Option<ComputeOffload> {
        if self.requested_mode == SimulationMode::Offload {
            info!("Offload bridge detached, switching to tree mode");
            self.requested_mode = SimulationMode::Tree;
        }
        self.offload.take()
    }

    /// Creates a CPU offload bridge over the current particles and attaches it.
    pub fn enable_cpu_offload(&mut self) -> Result<(), SimulationError> {
        let offload = ComputeOffload::cpu(&self.particles, &self.config)?;
        self.attach_offload(offload);
        Ok(())
    }

    /// Creates a GPU offload bridge over the current particles and attaches it.
    ///
    /// On failure nothing is attached and the simulation keeps running in its current mode.
    #[cfg(feature = "gpu")]
    pub fn enable_gpu_offload(&mut self) -> Result<(), SimulationError> {
        let offload = ComputeOffload::gpu(&self.particles, &self.config)?;
        self.attach_offload(offload);
        Ok(())
    }

    pub fn offload(&self) -> Option<&ComputeOffload> {
        self.offload.as_ref()
    }

    /// Mode used by the most recent tick.
    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Mode the next tick will use.
    pub fn requested_mode(&self) -> SimulationMode {
        self.requested_mode
    }

    /// Selects the solver for the next tick.
    ///
    /// # Errors
    ///
    /// `OffloadUnavailable` when asking for offload mode without an attached bridge.
    pub fn set_mode(&mut self, mode: SimulationMode) -> Result<(), SimulationError> {
        if mode == SimulationMode::Offload && self.offload.is_none() {
            return Err(SimulationError::OffloadUnavailable);
        }
        self.requested_mode = mode;
        Ok(())
    }

    pub fn toggle_mode(&mut self) -> Result<SimulationMode, SimulationError> {
        let next = match self.requested_mode {
            SimulationMode::Tree => SimulationMode::Offload,
            SimulationMode::Offload => SimulationMode::Tree,
        };
        self.set_mode(next)?;
        Ok(next)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Tree built by the most recent tree-mode tick.
    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    /// Shape of the most recent tree.
    pub fn stats(&self) -> TreeStats {
        self.context.last_tree_stats
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Appends a particle; it takes part from the next tick on.
    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
        if let Some(offload) = self.offload.as_mut() {
            offload.mark_dirty();
        }
    }

    /// Replaces every particle and restarts the run counters. The mode is kept.
    pub fn reset(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
        self.context = SimulationContext::default();
        self.tree = Arc::new(QuadTree::new(self.config.world, TreeParams::from(&self.config)));
        if let Some(offload) = self.offload.as_mut() {
            offload.mark_dirty();
        }
    }

    /// Advances every particle by `dt`.
    pub fn step(&mut self, dt: f64) -> Result<StepTimings, SimulationError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimulationError::InvalidTimeStep);
        }
        if self.requested_mode != self.mode {
            info!("Switching simulation mode from {:?} to {:?}", self.mode, self.requested_mode);
            if self.requested_mode == SimulationMode::Offload {
                if let Some(offload) = self.offload.as_mut() {
                    offload.mark_dirty();
                }
            }
            self.mode = self.requested_mode;
        }

        let timings = match self.mode {
            SimulationMode::Tree => self.step_tree(dt)?,
            SimulationMode::Offload => self.step_offload(dt)?,
        };
        self.context.ticks += 1;
        trace!(
            "tick {} ({:?}): tree {:?}, attraction {:?}, integration {:?}",
            self.context.ticks,
            timings.mode,
            timings.tree,
            timings.attraction,
            timings.integration
        );
        Ok(timings)
    }

    /// Runs `steps` ticks of `dt` each.
    pub fn simulate(&mut self, steps: usize, dt: f64) -> Result<(), SimulationError> {
        for _ in 0..steps {
            self.step(dt)?;
        }
        Ok(())
    }

    fn step_tree(&mut self, dt: f64) -> Result<StepTimings, SimulationError> {
        let mut timings = StepTimings {
            mode: SimulationMode::Tree,
            ..StepTimings::default()
        };

        let started = Instant::now();
        self.rebuild_tree()?;
        timings.tree = started.elapsed();

        let started = Instant::now();
        self.solve_attraction()?;
        timings.attraction = started.elapsed();

        let started = Instant::now();
        self.particles.par_iter_mut().for_each(|particle| particle.integrate(dt));
        timings.integration = started.elapsed();

        Ok(timings)
    }

    fn step_offload(&mut self, dt: f64) -> Result<StepTimings, SimulationError> {
        let offload = self.offload.as_mut().ok_or(SimulationError::OffloadUnavailable)?;

        let started = Instant::now();
        offload.run(dt, &self.particles)?;
        offload.copy_into(&mut self.particles)?;

        Ok(StepTimings {
            mode: SimulationMode::Offload,
            attraction: started.elapsed(),
            ..StepTimings::default()
        })
    }

    fn rebuild_tree(&mut self) -> Result<(), SimulationError> {
        if self.config.boundary_policy == BoundaryPolicy::Clamp {
            let world = self.config.world;
            let mut clamped = 0u64;
            for particle in self.particles.iter_mut() {
                if !world.contains(particle.position()) {
                    particle.set_position(world.clamp(particle.position()));
                    clamped += 1;
                }
            }
            if clamped > 0 {
                warn!("Clamped {} particles back into the world bounds", clamped);
                self.context.particles_clamped += clamped;
            }
        }

        // Jobs from a failed batch may still hold the previous tree.
        if Arc::get_mut(&mut self.tree).is_none() {
            self.tree = Arc::new(QuadTree::new(self.config.world, TreeParams::from(&self.config)));
        }
        if let Some(tree) = Arc::get_mut(&mut self.tree) {
            tree.rebuild(&self.particles)?;
        }

        let stats = self.tree.stats();
        self.context.max_depth_observed = self.context.max_depth_observed.max(stats.max_depth);
        self.context.last_tree_stats = stats;
        Ok(())
    }

    /// Splits the particle indices into one contiguous range per worker and queries the
    /// tree for each of them in parallel.
    fn solve_attraction(&mut self) -> Result<(), SimulationError> {
        let count = self.particles.len();
        if count == 0 {
            return Ok(());
        }
        let positions: Arc<Vec<DVec2>> = Arc::new(self.particles.iter().map(Particle::position).collect());
        let slice = count.div_ceil(self.pool.size());
        let (tx, rx) = mpsc::channel::<(usize, Vec<DVec2>)>();

        for begin in (0..count).step_by(slice) {
            let end = (begin + slice).min(count);
            let tree = Arc::clone(&self.tree);
            let positions = Arc::clone(&positions);
            let tx = tx.clone();
            self.pool.queue_job(move || {
                let accelerations = (begin..end)
                    .map(|index| tree.solve_attraction(index, positions[index]))
                    .collect();
                let _ = tx.send((begin, accelerations));
            })?;
        }
        drop(tx);
        self.pool.wait_for_completion()?;

        for (begin, accelerations) in rx.try_iter() {
            for (particle, acceleration) in self.particles[begin..].iter_mut().zip(accelerations) {
                particle.accumulate(acceleration);
            }
        }
        Ok(())
    }

    /// Kinetic plus softened potential energy of the whole system. O(N²).
    pub fn total_energy(&self) -> f64 {
        let g = self.config.gravitational_constant;
        let softening = self.config.softening;
        let particles = &self.particles;
        let kinetic: f64 = particles.iter().map(Particle::kinetic_energy).sum();
        let potential: f64 = particles
            .par_iter()
            .enumerate()
            .map(|(i, a)| {
                particles[i + 1..]
                    .iter()
                    .map(|b| pairwise_potential(a.position().distance(b.position()), a.mass(), b.mass(), g, softening))
                    .sum::<f64>()
            })
            .sum();
        kinetic + potential
    }

    pub fn total_momentum(&self) -> DVec2 {
        self.particles.iter().map(Particle::momentum).sum()
    }

    /// Stops the worker pool and releases the compute bridge.
    pub fn shutdown(&mut self) {
        self.pool.stop();
        self.offload = None;
    }
}
