//! Two-dimensional N-body gravity.
//!
//! Forces are approximated with a Barnes-Hut quadtree queried in parallel by a fixed
//! worker pool, or computed exactly by a brute-force kernel on a compute device.
pub mod utils;
pub mod concurrency;
pub mod compute;
pub mod particles;
