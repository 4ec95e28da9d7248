use glam::DVec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::particles::{Particle, Spawner, SpiralLayout};
use crate::utils::{Rectangle, SimulationError, DEFAULT_PARTICLE_MASS};

#[test]
fn test_spiral_rounds_count_down() {
    let layout = SpiralLayout::default();
    let particles = Spawner::spiral(1015, DVec2::ZERO, layout).expect("Failed to spawn spiral");
    assert_eq!(particles.len(), 1000);
    assert!(particles.iter().all(|p| p.velocity() == DVec2::ZERO));
    assert!(particles.iter().all(|p| p.mass() == DEFAULT_PARTICLE_MASS));
}

#[test]
fn test_spiral_stays_within_arm_length() {
    let center = DVec2::new(600.0, 360.0);
    let particles = Spawner::spiral(400, center, SpiralLayout::default()).unwrap();
    // 400 / (2 * 20) = 10 steps per sub-arm, so nothing is further than 9 from the center.
    assert!(particles.iter().all(|p| p.position().distance(center) <= 9.0 + 1e-9));
    let at_center = particles.iter().filter(|p| p.position() == center).count();
    assert_eq!(at_center, 40);
}

#[test]
fn test_spiral_without_arms_is_rejected() {
    let layout = SpiralLayout {
        arms: 0,
        ..SpiralLayout::default()
    };
    assert!(matches!(
        Spawner::spiral(100, DVec2::ZERO, layout),
        Err(SimulationError::InvalidConfig(_))
    ));
}

#[test]
fn test_spiral_too_small_count_is_empty() {
    let particles = Spawner::spiral(10, DVec2::ZERO, SpiralLayout::default()).unwrap();
    assert!(particles.is_empty());
}

#[test]
fn test_random_fills_world() {
    let world = Rectangle::new(0.0, 0.0, 100.0, 50.0);
    let mut rng = StdRng::seed_from_u64(42);
    let particles = Spawner::random(500, world, 2.0, None, &mut rng).unwrap();
    assert_eq!(particles.len(), 500);
    assert!(particles.iter().all(|p| world.contains(p.position())));
    assert!(particles.iter().all(|p| p.mass() == 2.0));
}

#[test]
fn test_random_with_heavy_center() {
    let world = Rectangle::new(10.0, 20.0, 100.0, 100.0);
    let mut rng = StdRng::seed_from_u64(7);
    let particles = Spawner::random(50, world, 1.0, Some(1.0e6), &mut rng).unwrap();
    assert_eq!(particles.len(), 50);
    assert_eq!(particles[0].position(), DVec2::new(10.0, 20.0));
    assert_eq!(particles[0].mass(), 1.0e6);
    assert!(particles[1..].iter().all(|p| p.mass() == 1.0));
}

#[test]
fn test_random_is_reproducible_with_seed() {
    let world = Rectangle::new(0.0, 0.0, 100.0, 100.0);
    let first: Vec<Particle> = Spawner::random(20, world, 1.0, None, &mut StdRng::seed_from_u64(3)).unwrap();
    let second: Vec<Particle> = Spawner::random(20, world, 1.0, None, &mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_random_rejects_invalid_mass() {
    let world = Rectangle::new(0.0, 0.0, 100.0, 100.0);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        Spawner::random(5, world, -1.0, None, &mut rng),
        Err(SimulationError::InvalidMass)
    );
}
