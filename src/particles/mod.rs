mod particle;
mod particle_interactions_barnes_hut;
mod particle_simulation;
mod spawner;

pub use particle::*;
pub use particle_interactions_barnes_hut::*;
pub use particle_simulation::*;
pub use spawner::*;

#[cfg(test)]
mod particle_simulation_tests;
#[cfg(test)]
mod spawner_tests;
