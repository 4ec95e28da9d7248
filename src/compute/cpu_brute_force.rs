use glam::DVec2;
use rayon::prelude::*;

use crate::compute::{ComputeBackend, KernelParams, ParticleState};
use crate::particles::pairwise_acceleration;
use crate::utils::SimulationError;

/// Host-memory implementation of the offload kernel contract.
///
/// Runs the same pairwise sum and semi-implicit Euler step as the WGSL kernel, in `f64`,
/// spread over rayon's thread pool. Used as the reference the GPU results are checked against.
#[derive(Debug, Default)]
pub struct CpuBruteForceBackend {
    current: Vec<ParticleState>,
    next: Vec<ParticleState>,
    masses: Vec<f32>,
}

impl CpuBruteForceBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeBackend for CpuBruteForceBackend {
    fn name(&self) -> &str {
        "cpu-brute-force"
    }

    fn upload(&mut self, states: &[ParticleState], masses: &[f32]) -> Result<(), SimulationError> {
        if states.len() != masses.len() {
            return Err(SimulationError::ParticleCountMismatch {
                expected: states.len(),
                found: masses.len(),
            });
        }
        self.current.clear();
        self.current.extend_from_slice(states);
        self.next.resize(states.len(), ParticleState::default());
        self.masses.clear();
        self.masses.extend_from_slice(masses);
        Ok(())
    }

    fn dispatch(&mut self, params: KernelParams, out: &mut [ParticleState]) -> Result<(), SimulationError> {
        let count = params.count as usize;
        if count != self.current.len() || out.len() != count {
            return Err(SimulationError::ParticleCountMismatch {
                expected: self.current.len(),
                found: count.min(out.len()),
            });
        }

        let dt = f64::from(params.dt);
        let g = f64::from(params.g);
        let softening = f64::from(params.softening);
        let current = &self.current;
        let masses = &self.masses;

        self.next.par_iter_mut().enumerate().for_each(|(i, next)| {
            let position = current[i].position();
            let mut acceleration = DVec2::ZERO;
            for (j, (other, &mass)) in current.iter().zip(masses).enumerate() {
                if j != i {
                    acceleration += pairwise_acceleration(position, other.position(), f64::from(mass), g, softening);
                }
            }
            let velocity = current[i].velocity() + acceleration * dt;
            let position = position + velocity * dt;
            *next = ParticleState {
                position: position.as_vec2().to_array(),
                velocity: velocity.as_vec2().to_array(),
            };
        });

        out.copy_from_slice(&self.next);
        std::mem::swap(&mut self.current, &mut self.next);
        Ok(())
    }
}
