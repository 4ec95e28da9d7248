use crate::utils::Rectangle;

/// Newtonian gravitational constant in SI units.
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674e-11;

/// Added to every squared distance before dividing.
pub const DEFAULT_SOFTENING: f64 = 0.1;

pub const DEFAULT_THETA: f64 = 0.5;
pub const DEFAULT_LEAF_CAPACITY: usize = 1;
pub const DEFAULT_MAX_DEPTH: u8 = 16;

pub const DEFAULT_WORLD_WIDTH: f64 = 1200.0;
pub const DEFAULT_WORLD_HEIGHT: f64 = 720.0;

/// Mass given to every particle by the layout helpers.
pub const DEFAULT_PARTICLE_MASS: f64 = 1.0e10;

pub const DEFAULT_WORLD: Rectangle = Rectangle::new(
    DEFAULT_WORLD_WIDTH / 2.0,
    DEFAULT_WORLD_HEIGHT / 2.0,
    DEFAULT_WORLD_WIDTH / 2.0,
    DEFAULT_WORLD_HEIGHT / 2.0,
);
