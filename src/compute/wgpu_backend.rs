//! wgpu implementation of the offload kernel contract.
use std::sync::mpsc;

use log::info;
use wgpu::util::DeviceExt;

use crate::compute::{ComputeBackend, ComputeKernel, KernelParams, ParticleState};
use crate::utils::SimulationError;

/// Smallest storage buffer we allocate; zero-sized bindings are invalid.
const MIN_BUFFER_SIZE: u64 = 16;

struct StateBuffers {
    count: usize,
    states: [wgpu::Buffer; 2],
    masses: wgpu::Buffer,
    staging: wgpu::Buffer,
    /// `bind_groups[i]` reads `states[i]` and writes `states[1 - i]`.
    bind_groups: [wgpu::BindGroup; 2],
}

/// Compute backend running a [`ComputeKernel`] on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    workgroup_size: u32,
    buffers: Option<StateBuffers>,
    /// Index of the buffer holding the current state.
    current: usize,
}

impl WgpuBackend {
    /// Picks a high-performance adapter, opens a device and compiles `kernel`.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` when no adapter or device can be acquired, `KernelBuild` when the
    /// shader or its pipeline fails validation.
    pub fn new(kernel: &dyn ComputeKernel) -> Result<Self, SimulationError> {
        pollster::block_on(Self::create(kernel))
    }

    async fn create(kernel: &dyn ComputeKernel) -> Result<Self, SimulationError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| SimulationError::DeviceUnavailable("no suitable GPU adapter found".to_string()))?;

        let adapter_info = adapter.get_info();
        info!("Using compute adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("N-Body Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| SimulationError::DeviceUnavailable(e.to_string()))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kernel.label()),
            source: wgpu::ShaderSource::Wgsl(kernel.source()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Attraction Bind Group Layout"),
            entries: &[
                // params
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // current state
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // next state
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // masses
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Attraction Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Attraction Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(kernel.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(SimulationError::KernelBuild(error.to_string()));
        }
        info!("Built compute kernel '{}' (entry point '{}')", kernel.label(), kernel.entry_point());

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Params Buffer"),
            contents: bytemuck::bytes_of(&KernelParams::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            pipeline,
            bind_group_layout,
            params_buffer,
            workgroup_size: kernel.workgroup_size().max(1),
            buffers: None,
            current: 0,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn allocate(&self, count: usize) -> StateBuffers {
        let state_size = ((count * std::mem::size_of::<ParticleState>()) as u64).max(MIN_BUFFER_SIZE);
        let mass_size = ((count * std::mem::size_of::<f32>()) as u64).max(MIN_BUFFER_SIZE);

        let make_state = |label| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: state_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let states = [make_state("Particle State Buffer A"), make_state("Particle State Buffer B")];

        let masses = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Mass Buffer"),
            size: mass_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Staging Buffer"),
            size: state_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let make_bind_group = |read: usize, label| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: states[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: states[1 - read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: masses.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [make_bind_group(0, "Attraction Bind Group A->B"), make_bind_group(1, "Attraction Bind Group B->A")];

        StateBuffers {
            count,
            states,
            masses,
            staging,
            bind_groups,
        }
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn upload(&mut self, states: &[ParticleState], masses: &[f32]) -> Result<(), SimulationError> {
        if states.len() != masses.len() {
            return Err(SimulationError::ParticleCountMismatch {
                expected: states.len(),
                found: masses.len(),
            });
        }
        if self.buffers.as_ref().map(|b| b.count) != Some(states.len()) {
            self.buffers = Some(self.allocate(states.len()));
        }
        self.current = 0;
        if let Some(buffers) = &self.buffers {
            if !states.is_empty() {
                self.queue.write_buffer(&buffers.states[0], 0, bytemuck::cast_slice(states));
                self.queue.write_buffer(&buffers.masses, 0, bytemuck::cast_slice(masses));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, params: KernelParams, out: &mut [ParticleState]) -> Result<(), SimulationError> {
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| SimulationError::DeviceDispatch("dispatch before upload".to_string()))?;
        let count = params.count as usize;
        if count != buffers.count || out.len() != count {
            return Err(SimulationError::ParticleCountMismatch {
                expected: buffers.count,
                found: count.min(out.len()),
            });
        }
        if count == 0 {
            return Ok(());
        }

        self.queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let next = 1 - self.current;
        let byte_len = (count * std::mem::size_of::<ParticleState>()) as u64;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Attraction Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Attraction Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_groups[self.current], &[]);
            pass.dispatch_workgroups((count as u32).div_ceil(self.workgroup_size), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&buffers.states[next], 0, &buffers.staging, 0, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffers.staging.slice(..byte_len);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| SimulationError::DeviceDispatch(e.to_string()))?
            .map_err(|e| SimulationError::DeviceDispatch(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&data));
        }
        buffers.staging.unmap();

        self.current = next;
        Ok(())
    }
}
