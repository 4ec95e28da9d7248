use approx::assert_relative_eq;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::particles::{Particle, Simulation, SimulationMode, Spawner};
use crate::utils::{BoundaryPolicy, Rectangle, SimulationConfig, SimulationError};

fn world() -> Rectangle {
    Rectangle::new(0.0, 0.0, 500.0, 500.0)
}

fn config() -> SimulationConfig {
    SimulationConfig::default().with_world(world()).with_worker_count(2)
}

fn pair(mass: f64) -> Vec<Particle> {
    vec![
        Particle::new(DVec2::new(-50.0, 0.0), DVec2::ZERO, mass).unwrap(),
        Particle::new(DVec2::new(50.0, 0.0), DVec2::ZERO, mass).unwrap(),
    ]
}

/// Two equal masses on a circular orbit around the origin.
fn binary(mass: f64, radius: f64, softening: f64, g: f64) -> Vec<Particle> {
    let separation = 2.0 * radius;
    let acceleration = g * mass / (separation * separation + softening);
    let speed = (acceleration * radius).sqrt();
    vec![
        Particle::new(DVec2::new(-radius, 0.0), DVec2::new(0.0, -speed), mass).unwrap(),
        Particle::new(DVec2::new(radius, 0.0), DVec2::new(0.0, speed), mass).unwrap(),
    ]
}

#[test]
fn test_new_rejects_invalid_config() {
    let result = Simulation::new(pair(1.0), config().with_worker_count(0));
    assert!(matches!(result, Err(SimulationError::InvalidConfig(_))));
    let result = Simulation::new(pair(1.0), config().with_theta(f64::NAN));
    assert!(matches!(result, Err(SimulationError::InvalidConfig(_))));
}

#[test]
fn test_step_pulls_particles_together() {
    let mut sim = Simulation::new(pair(1.0e14), config()).expect("Failed to create simulation");
    let timings = sim.step(1.0).expect("Step failed");
    assert_eq!(timings.mode, SimulationMode::Tree);
    assert_eq!(sim.context().ticks, 1);

    let particles = sim.particles();
    assert!(particles[0].position().x > -50.0);
    assert!(particles[1].position().x < 50.0);
    assert_relative_eq!(particles[0].velocity().x, -particles[1].velocity().x, max_relative = 1e-12);
    assert!(particles.iter().all(|p| p.acceleration() == DVec2::ZERO));
    assert_eq!(sim.tree().len(), 2);
    assert_eq!(sim.stats().body_count, 2);
    assert_eq!(sim.stats(), sim.context().last_tree_stats);
}

#[test]
fn test_step_rejects_invalid_time_step() {
    let mut sim = Simulation::new(pair(1.0), config()).unwrap();
    assert_eq!(sim.step(-0.1), Err(SimulationError::InvalidTimeStep));
    assert_eq!(sim.step(f64::NAN), Err(SimulationError::InvalidTimeStep));
    assert_eq!(sim.context().ticks, 0);
}

#[test]
fn test_empty_simulation_steps() {
    let mut sim = Simulation::new(Vec::new(), config()).unwrap();
    sim.simulate(3, 0.1).expect("Empty simulation should step");
    assert_eq!(sim.context().ticks, 3);
    assert!(sim.tree().is_empty());
}

#[test]
fn test_results_do_not_depend_on_worker_count() {
    let particles = Spawner::random(300, world(), 1.0e12, Some(1.0e15), &mut StdRng::seed_from_u64(11)).unwrap();

    let run = |workers: usize| {
        let mut sim = Simulation::new(particles.clone(), config().with_worker_count(workers)).unwrap();
        sim.simulate(5, 0.05).unwrap();
        sim.particles().to_vec()
    };

    let single = run(1);
    assert_eq!(single, run(3));
    assert_eq!(single, run(8));
}

#[test]
fn test_more_workers_than_particles() {
    let mut sim = Simulation::new(pair(1.0e14), config().with_worker_count(16)).unwrap();
    sim.step(1.0).unwrap();
    assert!(sim.particles()[0].velocity().x > 0.0);
}

#[test]
fn test_clamp_policy_pulls_particles_back() {
    let particles = vec![Particle::new(DVec2::new(700.0, -20.0), DVec2::ZERO, 1.0).unwrap()];
    let mut sim = Simulation::new(particles, config()).unwrap();
    sim.step(0.1).unwrap();
    assert_eq!(sim.particles()[0].position(), DVec2::new(500.0, -20.0));
    assert_eq!(sim.context().particles_clamped, 1);
}

#[test]
fn test_reject_policy_fails_the_tick() {
    let particles = vec![
        Particle::new(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap(),
        Particle::new(DVec2::new(0.0, 900.0), DVec2::ZERO, 1.0).unwrap(),
    ];
    let mut sim = Simulation::new(particles, config().with_boundary_policy(BoundaryPolicy::Reject)).unwrap();
    match sim.step(0.1) {
        Err(SimulationError::InsertionOutOfBounds { index, position }) => {
            assert_eq!(index, 1);
            assert_eq!(position, DVec2::new(0.0, 900.0));
        }
        other => panic!("Expected InsertionOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_offload_mode_requires_bridge() {
    let mut sim = Simulation::new(pair(1.0), config()).unwrap();
    assert_eq!(sim.set_mode(SimulationMode::Offload), Err(SimulationError::OffloadUnavailable));
    assert_eq!(sim.toggle_mode(), Err(SimulationError::OffloadUnavailable));
    assert_eq!(sim.requested_mode(), SimulationMode::Tree);
    assert!(sim.offload().is_none());
}

#[test]
fn test_mode_switch_applies_on_next_tick() {
    let mut sim = Simulation::new(pair(1.0e14), config()).unwrap();
    sim.enable_cpu_offload().expect("CPU offload is always available");
    sim.set_mode(SimulationMode::Offload).unwrap();
    assert_eq!(sim.mode(), SimulationMode::Tree);
    assert_eq!(sim.requested_mode(), SimulationMode::Offload);

    let timings = sim.step(0.5).unwrap();
    assert_eq!(timings.mode, SimulationMode::Offload);
    assert_eq!(sim.mode(), SimulationMode::Offload);

    assert_eq!(sim.toggle_mode(), Ok(SimulationMode::Tree));
    let timings = sim.step(0.5).unwrap();
    assert_eq!(timings.mode, SimulationMode::Tree);
}

#[test]
fn test_offload_matches_tree_mode() {
    let mut tree_sim = Simulation::new(pair(1.0e14), config()).unwrap();
    let mut offload_sim = Simulation::new(pair(1.0e14), config()).unwrap();
    offload_sim.enable_cpu_offload().unwrap();
    offload_sim.set_mode(SimulationMode::Offload).unwrap();

    tree_sim.simulate(3, 1.0).unwrap();
    offload_sim.simulate(3, 1.0).unwrap();

    for (a, b) in tree_sim.particles().iter().zip(offload_sim.particles()) {
        assert_relative_eq!(a.position().x, b.position().x, epsilon = 1e-3);
        assert_relative_eq!(a.position().y, b.position().y, epsilon = 1e-3);
        assert_relative_eq!(a.velocity().x, b.velocity().x, epsilon = 1e-3);
    }
}

#[test]
fn test_added_particle_reaches_offload() {
    let mut sim = Simulation::new(pair(1.0e14), config()).unwrap();
    sim.enable_cpu_offload().unwrap();
    sim.set_mode(SimulationMode::Offload).unwrap();
    sim.step(0.1).unwrap();

    sim.add_particle(Particle::new(DVec2::new(0.0, 100.0), DVec2::ZERO, 1.0e14).unwrap());
    sim.step(0.1).unwrap();
    assert_eq!(sim.particles().len(), 3);
    assert_eq!(sim.offload().map(|o| o.particle_count()), Some(3));
    // The newcomer is pulled towards the pair.
    assert!(sim.particles()[2].position().y < 100.0);
}

#[test]
fn test_detach_offload_falls_back_to_tree() {
    let mut sim = Simulation::new(pair(1.0), config()).unwrap();
    sim.enable_cpu_offload().unwrap();
    sim.set_mode(SimulationMode::Offload).unwrap();
    sim.step(0.1).unwrap();

    assert!(sim.detach_offload().is_some());
    assert_eq!(sim.requested_mode(), SimulationMode::Tree);
    assert_eq!(sim.step(0.1).unwrap().mode, SimulationMode::Tree);
}

#[test]
fn test_reset_restarts_counters() {
    let mut sim = Simulation::new(pair(1.0), config()).unwrap();
    sim.simulate(4, 0.1).unwrap();
    sim.reset(vec![Particle::new(DVec2::new(1.0, 1.0), DVec2::ZERO, 1.0).unwrap()]);
    assert_eq!(sim.context().ticks, 0);
    assert_eq!(sim.particles().len(), 1);
    sim.step(0.1).unwrap();
    assert_eq!(sim.tree().len(), 1);
}

#[test]
fn test_binary_orbit_conserves_energy_and_momentum() {
    let config = config();
    let mass = 1.0e14;
    let particles = binary(mass, 50.0, config.softening, config.gravitational_constant);
    let speed = particles[1].velocity().y;
    let mut sim = Simulation::new(particles, config).unwrap();

    let initial_energy = sim.total_energy();
    assert!(initial_energy < 0.0, "bound orbit should have negative energy");
    sim.simulate(1000, 0.01).unwrap();

    let drift = ((sim.total_energy() - initial_energy) / initial_energy).abs();
    assert!(drift < 1e-2, "energy drifted by {}", drift);
    assert!(sim.total_momentum().length() < 1e-6 * mass * speed);
    // Still on roughly the same circle.
    let radius = sim.particles()[0].position().length();
    assert_relative_eq!(radius, 50.0, max_relative = 0.05);
}

#[test]
fn test_shutdown_stops_tree_mode() {
    let mut sim = Simulation::new(pair(1.0), config()).unwrap();
    sim.step(0.1).unwrap();
    sim.shutdown();
    assert_eq!(sim.step(0.1), Err(SimulationError::WorkerPoolStopped));
    assert!(sim.offload().is_none());
}

#[test]
fn test_diagnostics_with_offload_attached() {
    let config = config();
    let mass = 1.0e14;
    let particles = binary(mass, 50.0, config.softening, config.gravitational_constant);
    let mut sim = Simulation::new(particles, config).unwrap();
    let before = sim.total_energy();

    sim.enable_cpu_offload().unwrap();
    assert!(sim.offload().is_some());
    assert_relative_eq!(sim.total_energy(), before, max_relative = 1e-12);
    assert!(sim.total_momentum().length() < 1e-6 * mass);

    sim.set_mode(SimulationMode::Offload).unwrap();
    sim.simulate(10, 0.01).unwrap();
    let drift = ((sim.total_energy() - before) / before).abs();
    assert!(drift < 1e-2, "energy drifted by {}", drift);
}
