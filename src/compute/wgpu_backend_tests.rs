use approx::assert_relative_eq;
use glam::DVec2;
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::compute::{
    ComputeBackend, ComputeKernel, ComputeOffload, CpuBruteForceBackend, KernelParams, PairwiseGravityKernel,
    ParticleState, WgpuBackend,
};
use crate::particles::Particle;
use crate::utils::{SimulationConfig, SimulationError};

/// Opens the GPU backend, or `None` on machines without a usable adapter.
fn gpu_backend() -> Option<WgpuBackend> {
    match WgpuBackend::new(&PairwiseGravityKernel) {
        Ok(backend) => Some(backend),
        Err(SimulationError::DeviceUnavailable(reason)) => {
            warn!("Skipping GPU test: {}", reason);
            None
        }
        Err(e) => panic!("Kernel failed to build: {}", e),
    }
}

fn random_states(count: usize, seed: u64) -> (Vec<ParticleState>, Vec<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let states = (0..count)
        .map(|_| ParticleState {
            position: [rng.random_range(-200.0..200.0), rng.random_range(-200.0..200.0)],
            velocity: [rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)],
        })
        .collect();
    let masses = (0..count).map(|_| rng.random_range(1.0e9..1.0e10)).collect();
    (states, masses)
}

#[test]
fn test_kernel_declares_entry_point() {
    let kernel = PairwiseGravityKernel;
    assert!(kernel.source().contains(&format!("fn {}(", kernel.entry_point())));
    assert!(kernel
        .source()
        .contains(&format!("@workgroup_size({})", kernel.workgroup_size())));
}

#[test]
fn test_gpu_matches_cpu_backend() {
    let Some(mut gpu) = gpu_backend() else {
        return;
    };
    let mut cpu = CpuBruteForceBackend::new();

    // Not a multiple of the workgroup size, so the bounds check in the kernel matters.
    let (states, masses) = random_states(130, 31);
    gpu.upload(&states, &masses).unwrap();
    cpu.upload(&states, &masses).unwrap();

    let config = SimulationConfig::default();
    let params = KernelParams {
        dt: 0.5,
        count: states.len() as u32,
        g: config.gravitational_constant as f32,
        softening: config.softening as f32,
    };

    let mut from_gpu = vec![ParticleState::default(); states.len()];
    let mut from_cpu = vec![ParticleState::default(); states.len()];
    for _ in 0..2 {
        gpu.dispatch(params, &mut from_gpu).unwrap();
        cpu.dispatch(params, &mut from_cpu).unwrap();
    }

    for (g, c) in from_gpu.iter().zip(&from_cpu) {
        assert_relative_eq!(g.position[0], c.position[0], epsilon = 1e-2);
        assert_relative_eq!(g.position[1], c.position[1], epsilon = 1e-2);
        assert_relative_eq!(g.velocity[0], c.velocity[0], epsilon = 1e-3);
        assert_relative_eq!(g.velocity[1], c.velocity[1], epsilon = 1e-3);
    }
}

#[test]
fn test_gpu_dispatch_before_upload_fails() {
    let Some(mut gpu) = gpu_backend() else {
        return;
    };
    let params = KernelParams::default();
    assert!(matches!(
        gpu.dispatch(params, &mut []),
        Err(SimulationError::DeviceDispatch(_))
    ));
}

#[test]
fn test_gpu_offload_round_trip() {
    if gpu_backend().is_none() {
        return;
    }
    let mut particles = vec![
        Particle::new(DVec2::new(-50.0, 0.0), DVec2::ZERO, 1.0e14).unwrap(),
        Particle::new(DVec2::new(50.0, 0.0), DVec2::ZERO, 1.0e14).unwrap(),
    ];
    let config = SimulationConfig::default();
    let mut offload = ComputeOffload::gpu(&particles, &config).expect("Adapter was available a moment ago");
    assert_eq!(offload.backend_name(), "wgpu");
    offload.run(1.0, &particles).unwrap();
    offload.copy_into(&mut particles).unwrap();
    assert!(particles[0].velocity().x > 0.0);
    assert!(particles[1].velocity().x < 0.0);
}
