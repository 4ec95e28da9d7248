//! Kernel sources satisfying the offload buffer contract.
//!
//! A kernel reads `params` (binding 0), the current state (binding 1) and the masses
//! (binding 3), and writes the integrated state of every particle into the next-state
//! buffer (binding 2). Each state record is four `f32`: `pos.x, pos.y, vel.x, vel.y`.
use std::borrow::Cow;

/// A WGSL compute kernel honoring the offload buffer layout.
pub trait ComputeKernel {
    fn label(&self) -> &str;

    fn source(&self) -> Cow<'static, str>;

    fn entry_point(&self) -> &str;

    /// Must match the `@workgroup_size` declared by the entry point.
    fn workgroup_size(&self) -> u32;
}

/// Exact pairwise gravity followed by semi-implicit Euler, one invocation per particle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseGravityKernel;

pub const PAIRWISE_GRAVITY_WGSL: &str = r#"
struct Params {
    dt: f32,
    count: u32,
    g: f32,
    softening: f32,
}

struct State {
    position: vec2<f32>,
    velocity: vec2<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> current: array<State>;
@group(0) @binding(2) var<storage, read_write> next: array<State>;
@group(0) @binding(3) var<storage, read> masses: array<f32>;

@compute @workgroup_size(64)
fn attraction(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i >= params.count) {
        return;
    }

    let me = current[i];
    var acceleration = vec2<f32>(0.0, 0.0);
    for (var j: u32 = 0u; j < params.count; j = j + 1u) {
        if (j == i) {
            continue;
        }
        let v = current[j].position - me.position;
        let dist_sq = dot(v, v);
        if (dist_sq > 0.0) {
            acceleration = acceleration + v * (params.g * masses[j] / ((dist_sq + params.softening) * sqrt(dist_sq)));
        }
    }

    let velocity = me.velocity + acceleration * params.dt;
    next[i] = State(me.position + velocity * params.dt, velocity);
}
"#;

impl ComputeKernel for PairwiseGravityKernel {
    fn label(&self) -> &str {
        "Pairwise Gravity Kernel"
    }

    fn source(&self) -> Cow<'static, str> {
        Cow::Borrowed(PAIRWISE_GRAVITY_WGSL)
    }

    fn entry_point(&self) -> &str {
        "attraction"
    }

    fn workgroup_size(&self) -> u32 {
        64
    }
}
