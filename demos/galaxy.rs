use log::{info, warn};
use rs_nbody::particles::{Simulation, SimulationMode, Spawner, SpiralLayout};
use rs_nbody::utils::{SimulationConfig, SimulationError};

const PARTICLES: usize = 8_000;
const STEPS: usize = 200;
const DT: f64 = 0.016;

fn main() -> Result<(), SimulationError> {
    env_logger::init();

    let config = SimulationConfig::default();
    let particles = Spawner::spiral(PARTICLES, config.world.center(), SpiralLayout::default())?;
    let mut sim = Simulation::new(particles, config)?;

    println!("Spawned {} particles on {} workers", sim.particles().len(), sim.worker_count());
    let initial_energy = sim.total_energy();
    println!("Initial energy: {:e} J", initial_energy);

    let mut tree_time = std::time::Duration::ZERO;
    for _ in 0..STEPS / 2 {
        tree_time += sim.step(DT)?.total();
    }
    let stats = sim.context().last_tree_stats;
    println!(
        "Tree mode: {:?} per tick, {} nodes, depth {}",
        tree_time / (STEPS / 2) as u32,
        stats.node_count,
        stats.max_depth
    );

    // Prefer the GPU; the CPU bridge runs the same kernel contract when no adapter exists.
    #[cfg(feature = "gpu")]
    let offload = sim.enable_gpu_offload().or_else(|e| {
        warn!("GPU offload unavailable ({}), using the CPU brute-force backend", e);
        sim.enable_cpu_offload()
    });
    #[cfg(not(feature = "gpu"))]
    let offload = sim.enable_cpu_offload();
    offload?;

    sim.set_mode(SimulationMode::Offload)?;
    if let Some(bridge) = sim.offload() {
        info!("Offloading to {}", bridge.backend_name());
    }

    let mut offload_time = std::time::Duration::ZERO;
    for _ in 0..STEPS / 2 {
        offload_time += sim.step(DT)?.total();
    }
    println!("Offload mode: {:?} per tick", offload_time / (STEPS / 2) as u32);

    let final_energy = sim.total_energy();
    println!("Final energy: {:e} J", final_energy);
    println!(
        "Relative energy drift: {:.3e}",
        ((final_energy - initial_energy) / initial_energy).abs()
    );
    println!("Total momentum: {}", sim.total_momentum());

    sim.shutdown();
    Ok(())
}
