mod compute_offload;
mod cpu_brute_force;
mod kernels;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use compute_offload::*;
pub use cpu_brute_force::CpuBruteForceBackend;
pub use kernels::*;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

#[cfg(test)]
#[cfg(feature = "gpu")]
mod wgpu_backend_tests;
