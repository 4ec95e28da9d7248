//! Initial particle layouts.
use std::f64::consts::PI;

use glam::DVec2;
use rand::Rng;

use crate::particles::Particle;
use crate::utils::{Rectangle, SimulationError, DEFAULT_PARTICLE_MASS};

/// Shape of a multi-armed spiral galaxy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpiralLayout {
    pub arms: usize,
    /// Thin sub-arms laid side by side inside each arm.
    pub arm_width: usize,
    /// Angular spacing between sub-arms is `π / arm_spread / arm_width`.
    pub arm_spread: f64,
    /// Each step along an arm turns by `π / twist`.
    pub twist: f64,
    pub mass: f64,
}

impl Default for SpiralLayout {
    fn default() -> Self {
        SpiralLayout {
            arms: 2,
            arm_width: 20,
            arm_spread: 2.0,
            twist: 100.0,
            mass: DEFAULT_PARTICLE_MASS,
        }
    }
}

/// Builds the particle collections a simulation starts from.
pub struct Spawner;

impl Spawner {
    /// Places roughly `count` particles at rest along the arms of a spiral around `center`.
    ///
    /// The count is rounded down to a multiple of `arms * arm_width`.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::DVec2;
    /// use rs_nbody::particles::{SpiralLayout, Spawner};
    ///
    /// let particles = Spawner::spiral(1000, DVec2::new(600.0, 360.0), SpiralLayout::default()).unwrap();
    /// assert_eq!(particles.len(), 1000);
    /// ```
    pub fn spiral(count: usize, center: DVec2, layout: SpiralLayout) -> Result<Vec<Particle>, SimulationError> {
        let per_arm = layout.arms * layout.arm_width;
        if per_arm == 0 {
            return Err(SimulationError::InvalidConfig("spiral needs at least one arm".to_string()));
        }
        let arm_length = count / per_arm;
        let step = 2.0 * PI / layout.arms as f64;

        let mut particles = Vec::with_capacity(arm_length * per_arm);
        for arm in 0..layout.arms {
            let start = arm as f64 * step;
            for strand in 0..layout.arm_width {
                let strand_start = strand as f64 * PI / layout.arm_spread / layout.arm_width as f64;
                for k in 0..arm_length {
                    let angle = start + strand_start + k as f64 * PI / layout.twist;
                    let offset = DVec2::new(angle.cos(), angle.sin()) * k as f64;
                    particles.push(Particle::new(center + offset, DVec2::ZERO, layout.mass)?);
                }
            }
        }
        Ok(particles)
    }

    /// Scatters `count` particles uniformly over `world`, optionally replacing the first
    /// one with a heavy body at the center.
    pub fn random<R: Rng + ?Sized>(
        count: usize,
        world: Rectangle,
        mass: f64,
        heavy_center: Option<f64>,
        rng: &mut R,
    ) -> Result<Vec<Particle>, SimulationError> {
        let mut particles = Vec::with_capacity(count);
        if let Some(heavy_mass) = heavy_center {
            if count > 0 {
                particles.push(Particle::new(world.center(), DVec2::ZERO, heavy_mass)?);
            }
        }
        while particles.len() < count {
            let position = DVec2::new(
                rng.random_range(world.left()..world.right()),
                rng.random_range(world.top()..world.bottom()),
            );
            particles.push(Particle::new(position, DVec2::ZERO, mass)?);
        }
        Ok(particles)
    }
}
