pub mod constants;
pub mod errors;
mod rectangle;
mod simulation_config;

pub use constants::*;
pub use errors::SimulationError;
pub use rectangle::Rectangle;
pub use simulation_config::{BoundaryPolicy, SimulationConfig};
