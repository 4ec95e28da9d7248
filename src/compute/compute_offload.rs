//! Brute-force solver that hands the whole particle state to a compute backend.
//!
//! The bridge keeps a host copy of the latest read-back state. Backends own the
//! current/next buffer pair and swap them after every dispatch.
use glam::{DVec2, Vec2};
use log::debug;

use crate::particles::Particle;
use crate::utils::{SimulationConfig, SimulationError};

/// One particle in the kernel buffer layout: `pos.x, pos.y, vel.x, vel.y`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct ParticleState {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
}

impl ParticleState {
    pub fn from_particle(particle: &Particle) -> Self {
        let position = particle.position().as_vec2();
        let velocity = particle.velocity().as_vec2();
        ParticleState {
            position: position.to_array(),
            velocity: velocity.to_array(),
        }
    }

    pub fn position(&self) -> DVec2 {
        Vec2::from_array(self.position).as_dvec2()
    }

    pub fn velocity(&self) -> DVec2 {
        Vec2::from_array(self.velocity).as_dvec2()
    }
}

/// Scalar arguments of one kernel dispatch.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct KernelParams {
    pub dt: f32,
    pub count: u32,
    pub g: f32,
    pub softening: f32,
}

/// A device able to run the pairwise kernel over a double-buffered particle state.
pub trait ComputeBackend: Send {
    fn name(&self) -> &str;

    /// Replaces the current-state buffer and the masses, reallocating when the count changes.
    fn upload(&mut self, states: &[ParticleState], masses: &[f32]) -> Result<(), SimulationError>;

    /// Runs the kernel from the current buffer into the next one, blocks until it finishes,
    /// copies the next state into `out`, and swaps the two buffers.
    fn dispatch(&mut self, params: KernelParams, out: &mut [ParticleState]) -> Result<(), SimulationError>;
}

/// Host side of the offload path.
pub struct ComputeOffload {
    backend: Box<dyn ComputeBackend>,
    computed: Vec<ParticleState>,
    g: f32,
    softening: f32,
    dirty: bool,
}

impl ComputeOffload {
    /// Wraps `backend` and uploads the initial particle state.
    pub fn new(
        backend: Box<dyn ComputeBackend>,
        particles: &[Particle],
        config: &SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let mut offload = ComputeOffload {
            backend,
            computed: Vec::new(),
            g: config.gravitational_constant as f32,
            softening: config.softening as f32,
            dirty: true,
        };
        offload.upload(particles)?;
        debug!("Compute offload ready on {} with {} particles", offload.backend.name(), particles.len());
        Ok(offload)
    }

    /// Offload running on the rayon-parallel CPU reference backend.
    pub fn cpu(particles: &[Particle], config: &SimulationConfig) -> Result<Self, SimulationError> {
        Self::new(Box::new(super::CpuBruteForceBackend::new()), particles, config)
    }

    /// Offload running the default WGSL kernel on the first high-performance adapter.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` or `KernelBuild` when no usable device exists; the caller must
    /// not enter offload mode in that case.
    #[cfg(feature = "gpu")]
    pub fn gpu(particles: &[Particle], config: &SimulationConfig) -> Result<Self, SimulationError> {
        let backend = super::WgpuBackend::new(&super::PairwiseGravityKernel)?;
        Self::new(Box::new(backend), particles, config)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn particle_count(&self) -> usize {
        self.computed.len()
    }

    /// Forces the next [`ComputeOffload::run`] to re-upload the host particles.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Copies `particles` into the backend's current buffer.
    pub fn upload(&mut self, particles: &[Particle]) -> Result<(), SimulationError> {
        let states: Vec<ParticleState> = particles.iter().map(ParticleState::from_particle).collect();
        let masses: Vec<f32> = particles.iter().map(|p| p.mass() as f32).collect();
        self.backend.upload(&states, &masses)?;
        self.computed = states;
        self.dirty = false;
        Ok(())
    }

    /// Advances the device state by `dt`, uploading `particles` first if the host copy changed.
    pub fn run(&mut self, dt: f64, particles: &[Particle]) -> Result<(), SimulationError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimulationError::InvalidTimeStep);
        }
        if self.dirty || particles.len() != self.computed.len() {
            self.upload(particles)?;
        }
        let params = KernelParams {
            dt: dt as f32,
            count: self.computed.len() as u32,
            g: self.g,
            softening: self.softening,
        };
        self.backend.dispatch(params, &mut self.computed)
    }

    /// State read back by the most recent [`ComputeOffload::run`].
    pub fn computed_particles(&self) -> &[ParticleState] {
        &self.computed
    }

    /// Writes the read-back positions and velocities into `particles`.
    pub fn copy_into(&self, particles: &mut [Particle]) -> Result<(), SimulationError> {
        if particles.len() != self.computed.len() {
            return Err(SimulationError::ParticleCountMismatch {
                expected: self.computed.len(),
                found: particles.len(),
            });
        }
        for (particle, state) in particles.iter_mut().zip(&self.computed) {
            particle.set_state(state.position(), state.velocity());
        }
        Ok(())
    }
}
