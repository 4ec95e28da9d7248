use glam::DVec2;

use crate::utils::SimulationError;

/// Acceleration a point at `target` receives from a point mass at `source`.
///
/// The magnitude is `g * source_mass / (d² + softening)` and the direction is the unit
/// vector from `target` towards `source`. Coincident points contribute nothing.
///
/// # Examples
///
/// ```
/// use glam::DVec2;
/// use rs_nbody::particles::pairwise_acceleration;
///
/// let a = pairwise_acceleration(DVec2::ZERO, DVec2::new(10.0, 0.0), 100.0, 1.0, 0.0);
/// assert!((a.x - 1.0).abs() < 1e-12);
/// assert_eq!(a.y, 0.0);
/// ```
#[inline]
pub fn pairwise_acceleration(
    target: DVec2,
    source: DVec2,
    source_mass: f64,
    g: f64,
    softening: f64,
) -> DVec2 {
    let v = source - target;
    let dist_sq = v.length_squared();
    if dist_sq == 0.0 {
        return DVec2::ZERO;
    }
    v * (g * source_mass / ((dist_sq + softening) * dist_sq.sqrt()))
}

/// A point mass moving in the plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    position: DVec2,
    velocity: DVec2,
    /// Reset to zero by every call to [`Particle::integrate`].
    acceleration: DVec2,
    mass: f64,
}

impl Particle {
    /// Creates a new Particle with an empty acceleration accumulator.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::InvalidMass` if `mass` is not a positive finite number.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::DVec2;
    /// use rs_nbody::particles::Particle;
    /// use rs_nbody::utils::SimulationError;
    ///
    /// let particle = Particle::new(DVec2::new(1.0, 2.0), DVec2::ZERO, 5.0).expect("valid particle");
    /// assert_eq!(particle.mass(), 5.0);
    ///
    /// assert_eq!(Particle::new(DVec2::ZERO, DVec2::ZERO, 0.0), Err(SimulationError::InvalidMass));
    /// ```
    pub fn new(position: DVec2, velocity: DVec2, mass: f64) -> Result<Self, SimulationError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimulationError::InvalidMass);
        }
        Ok(Particle {
            position,
            velocity,
            acceleration: DVec2::ZERO,
            mass,
        })
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn velocity(&self) -> DVec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> DVec2 {
        self.acceleration
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Overwrites position and velocity without integrating, as the offload path does.
    pub fn set_state(&mut self, position: DVec2, velocity: DVec2) {
        self.position = position;
        self.velocity = velocity;
        self.acceleration = DVec2::ZERO;
    }

    pub(crate) fn set_position(&mut self, position: DVec2) {
        self.position = position;
    }

    /// Adds an externally computed acceleration to the accumulator.
    pub fn accumulate(&mut self, acceleration: DVec2) {
        self.acceleration += acceleration;
    }

    /// Adds the pull of a point mass at `other_position` to the acceleration accumulator.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::DVec2;
    /// use rs_nbody::particles::Particle;
    ///
    /// let mut particle = Particle::new(DVec2::ZERO, DVec2::ZERO, 1.0).unwrap();
    /// particle.apply_attraction(DVec2::new(0.0, 2.0), 4.0, 1.0, 0.0);
    /// assert!((particle.acceleration().y - 1.0).abs() < 1e-12);
    /// ```
    pub fn apply_attraction(&mut self, other_position: DVec2, other_mass: f64, g: f64, softening: f64) {
        self.acceleration += pairwise_acceleration(self.position, other_position, other_mass, g, softening);
    }

    /// Advances the particle by `dt` using semi-implicit Euler.
    ///
    /// Velocity is updated first from the accumulated acceleration, then position from
    /// the new velocity. The accumulator is cleared afterwards.
    ///
    /// # Examples
    ///
    /// ```
    /// use glam::DVec2;
    /// use rs_nbody::particles::Particle;
    ///
    /// let mut particle = Particle::new(DVec2::ZERO, DVec2::new(1.0, 0.0), 1.0).unwrap();
    /// particle.accumulate(DVec2::new(0.0, 2.0));
    /// particle.integrate(0.5);
    ///
    /// assert_eq!(particle.velocity(), DVec2::new(1.0, 1.0));
    /// assert_eq!(particle.position(), DVec2::new(0.5, 0.5));
    /// assert_eq!(particle.acceleration(), DVec2::ZERO);
    /// ```
    pub fn integrate(&mut self, dt: f64) {
        self.velocity += self.acceleration * dt;
        self.position += self.velocity * dt;
        self.acceleration = DVec2::ZERO;
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.length_squared()
    }

    pub fn momentum(&self) -> DVec2 {
        self.velocity * self.mass
    }
}

/// Potential energy of a pair under the softened force law used by [`pairwise_acceleration`].
///
/// With softening `ε` the force magnitude is `g·m1·m2 / (d² + ε)`, whose potential is
/// `-(g·m1·m2 / √ε)·(π/2 - atan(d / √ε))`; it reduces to `-g·m1·m2 / d` when `ε` is zero.
pub fn pairwise_potential(distance: f64, mass_a: f64, mass_b: f64, g: f64, softening: f64) -> f64 {
    let gmm = g * mass_a * mass_b;
    if softening > 0.0 {
        let root = softening.sqrt();
        -(gmm / root) * (std::f64::consts::FRAC_PI_2 - (distance / root).atan())
    } else if distance > 0.0 {
        -gmm / distance
    } else {
        f64::NEG_INFINITY
    }
}
