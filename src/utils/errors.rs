use std::error::Error;
use std::fmt;

use glam::DVec2;

/// Represents errors that can occur while building, solving or stepping a simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Indicates an invalid mass value (zero, negative or not finite).
    InvalidMass,
    /// Indicates an invalid time step (negative or not finite).
    InvalidTimeStep,
    /// Indicates a configuration value outside its accepted range.
    InvalidConfig(String),
    /// A particle lies outside the root region of the tree and could not be inserted.
    InsertionOutOfBounds { index: usize, position: DVec2 },
    /// A worker thread could not be spawned.
    WorkerSpawn(String),
    /// A job was queued after the worker pool began shutting down.
    WorkerPoolStopped,
    /// At least one job of the current batch panicked; its results were discarded.
    WorkerPanicked,
    /// No compatible compute adapter or device could be acquired.
    DeviceUnavailable(String),
    /// The compute kernel failed to compile or its pipeline could not be created.
    KernelBuild(String),
    /// Dispatching the kernel or reading its results back failed.
    DeviceDispatch(String),
    /// Host and device disagree on how many particles are being simulated.
    ParticleCountMismatch { expected: usize, found: usize },
    /// Offload mode was requested without a compute bridge attached.
    OffloadUnavailable,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationError::InvalidMass => write!(f, "Invalid mass value"),
            SimulationError::InvalidTimeStep => write!(f, "Invalid time step"),
            SimulationError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            SimulationError::InsertionOutOfBounds { index, position } => write!(
                f,
                "Particle {} at ({}, {}) lies outside the world bounds",
                index, position.x, position.y
            ),
            SimulationError::WorkerSpawn(msg) => write!(f, "Failed to spawn worker thread: {}", msg),
            SimulationError::WorkerPoolStopped => write!(f, "Worker pool has been stopped"),
            SimulationError::WorkerPanicked => write!(f, "A worker job panicked"),
            SimulationError::DeviceUnavailable(msg) => write!(f, "Compute device unavailable: {}", msg),
            SimulationError::KernelBuild(msg) => write!(f, "Kernel build failed: {}", msg),
            SimulationError::DeviceDispatch(msg) => write!(f, "Kernel dispatch failed: {}", msg),
            SimulationError::ParticleCountMismatch { expected, found } => write!(
                f,
                "Particle count mismatch: expected {}, found {}",
                expected, found
            ),
            SimulationError::OffloadUnavailable => write!(f, "No compute offload bridge is attached"),
        }
    }
}

impl Error for SimulationError {}
