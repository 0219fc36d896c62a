//! Per-frame simulation protocol
//!
//! The solver owns the storage buffers, the compute passes, and the uniform
//! block, and drives the frame: ten ping-ponged lattice sub-steps, then the
//! derived surface, caustic, lighting, obstruction, and cleanup passes in
//! strict order. It is also the only writer of GPU obstruction state and
//! the home of every host readback.

use std::sync::Arc;

use crate::error::{Result, RippleError};
use crate::gfx::context::GpuContext;
use crate::gfx::grid_mesh::SurfaceVertex;
use crate::gfx::interop::SharedVertexBuffer;
use crate::gfx::registry::{BufferRegistry, BufferRole};
use crate::simulation::domain::{Domain, MAX_XDIM, MAX_YDIM};
use crate::simulation::obstruction::{Obstruction, ObstructionArena, MAX_OBSTRUCTIONS};
use crate::simulation::passes::{ComputePasses, ComputeStage};
use crate::simulation::raycast::RayHitRecord;
use crate::simulation::uniforms::{ContourVariable, SimParams};
use crate::wgpu_utils::{
    binding_types, ArrayBuffer, BindGroupBuilder, BindGroupLayoutBuilder, UniformBuffer,
};

/// Lattice sub-step pairs per rendered frame (ten sub-steps total). The
/// constant amortizes simulation cost against one frame; it is not adaptive.
pub const SUBSTEP_PAIRS_PER_FRAME: usize = 5;

/// Tracks which lattice buffer is currently bound as the read side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PingPong {
    reads_a: bool,
}

impl PingPong {
    fn new() -> Self {
        PingPong { reads_a: true }
    }

    fn flip(&mut self) {
        self.reads_a = !self.reads_a;
    }

    fn reads_a(self) -> bool {
        self.reads_a
    }
}

pub struct FluidSolver {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) domain: Domain,
    arena: ObstructionArena,
    pub(crate) registry: BufferRegistry,
    shared_vertices: SharedVertexBuffer,
    pub(crate) passes: ComputePasses,
    bind_group_ab: wgpu::BindGroup,
    bind_group_ba: wgpu::BindGroup,
    pingpong: PingPong,
    pub(crate) params: SimParams,
    pub(crate) uniform: UniformBuffer<SimParams>,
}

impl FluidSolver {
    pub fn new(context: &GpuContext, domain: Domain) -> Result<FluidSolver> {
        let device = context.device.clone();
        let queue = context.queue.clone();
        let nodes = Domain::max_nodes() as usize;

        let arena = ObstructionArena::new();

        let lattice_a = ArrayBuffer::<f32>::new(&device, nodes * 9, false);
        let lattice_b = ArrayBuffer::<f32>::new(&device, nodes * 9, false);
        let floor_flags = ArrayBuffer::<i32>::new(&device, nodes, false);
        let obstructions = ArrayBuffer::<Obstruction>::new_with_data(&device, arena.records(), false);
        let ray_hit = ArrayBuffer::<RayHitRecord>::new_filled(&device, 1, RayHitRecord::miss(), false);
        let vertices = ArrayBuffer::<SurfaceVertex>::new_with_usage(
            &device,
            2 * nodes,
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        );

        let mut registry = BufferRegistry::new();
        registry.register(BufferRole::LatticeA, lattice_a.buffer().clone());
        registry.register(BufferRole::LatticeB, lattice_b.buffer().clone());
        registry.register(BufferRole::FloorFlags, floor_flags.buffer().clone());
        registry.register(BufferRole::Obstructions, obstructions.buffer().clone());
        registry.register(BufferRole::RayHit, ray_hit.buffer().clone());
        registry.register(BufferRole::Vertices, vertices.buffer().clone());

        let shared_vertices = SharedVertexBuffer::new(vertices.buffer().clone());

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fluid compute"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/fluid.wgsl").into()),
        });

        let layout = BindGroupLayoutBuilder::new()
            .next_binding_compute(binding_types::storage_buffer_read_write()) // lattice src
            .next_binding_compute(binding_types::storage_buffer_read_write()) // lattice dst
            .next_binding_compute(binding_types::storage_buffer_read_write()) // vertices
            .next_binding_compute(binding_types::storage_buffer_read_write()) // floor flags
            .next_binding_compute(binding_types::storage_buffer_read_write()) // ray hit
            .next_binding_compute(binding_types::storage_buffer_read_write()) // obstructions
            .next_binding_compute(binding_types::uniform())
            .create(&device, "fluid bindings");

        let params = SimParams {
            x_dim: domain.x_dim() as i32,
            y_dim: domain.y_dim() as i32,
            x_dim_visible: domain.x_dim_visible() as i32,
            y_dim_visible: domain.y_dim_visible() as i32,
            ..SimParams::default()
        };
        let mut uniform = UniformBuffer::new(&device);
        uniform.force_update_content(&queue, params);

        let bind_group_ab = BindGroupBuilder::new(&layout)
            .buffer(lattice_a.buffer())
            .buffer(lattice_b.buffer())
            .buffer(vertices.buffer())
            .buffer(floor_flags.buffer())
            .buffer(ray_hit.buffer())
            .buffer(obstructions.buffer())
            .buffer(uniform.buffer())
            .create(&device, "fluid bindings a-read");

        let bind_group_ba = BindGroupBuilder::new(&layout)
            .buffer(lattice_b.buffer())
            .buffer(lattice_a.buffer())
            .buffer(vertices.buffer())
            .buffer(floor_flags.buffer())
            .buffer(ray_hit.buffer())
            .buffer(obstructions.buffer())
            .buffer(uniform.buffer())
            .create(&device, "fluid bindings b-read");

        let passes = ComputePasses::new(&device, &module, &layout.layout);

        let solver = FluidSolver {
            device,
            queue,
            domain,
            arena,
            registry,
            shared_vertices,
            passes,
            bind_group_ab,
            bind_group_ba,
            pingpong: PingPong::new(),
            params,
            uniform,
        };

        solver.run_stage(ComputeStage::InitializeDomain, (MAX_XDIM, MAX_YDIM, 1));
        log::info!(
            "fluid solver ready: {}x{} active of {}x{} max",
            solver.domain.x_dim(),
            solver.domain.y_dim(),
            MAX_XDIM,
            MAX_YDIM
        );

        Ok(solver)
    }

    pub(crate) fn current_bind_group(&self) -> &wgpu::BindGroup {
        if self.pingpong.reads_a() {
            &self.bind_group_ab
        } else {
            &self.bind_group_ba
        }
    }

    pub(crate) fn run_stage(&self, stage: ComputeStage, extent: (u32, u32, u32)) {
        self.passes.run(
            &self.device,
            &self.queue,
            self.current_bind_group(),
            stage,
            extent,
        );
    }

    pub(crate) fn sync_params(&mut self) {
        self.params.x_dim = self.domain.x_dim() as i32;
        self.params.y_dim = self.domain.y_dim() as i32;
        self.params.x_dim_visible = self.domain.x_dim_visible() as i32;
        self.params.y_dim_visible = self.domain.y_dim_visible() as i32;
        self.uniform.update_content(&self.queue, self.params);
    }

    /// Runs one frame of simulation: ten lattice sub-steps with ping-pong
    /// buffer swapping, then the derived passes in strict order. The trim
    /// pass runs over the maximum extent so shrinking the grid leaves no
    /// stale geometry behind.
    pub fn advance(&mut self) {
        self.sync_params();
        let x = self.domain.x_dim();
        let y = self.domain.y_dim();

        for _ in 0..SUBSTEP_PAIRS_PER_FRAME {
            self.run_stage(ComputeStage::LbmStep, (x, y, 1));
            self.pingpong.flip();
            self.run_stage(ComputeStage::LbmStep, (x, y, 1));
            self.pingpong.flip();
        }

        self.run_stage(ComputeStage::SurfaceVertices, (x, y, 1));
        self.run_stage(ComputeStage::CausticRays, (x, y, 1));
        self.run_stage(ComputeStage::FloorLightIntensity, (x, y, 1));
        self.run_stage(ComputeStage::ApplyFloorLight, (x, y, 1));
        self.run_stage(ComputeStage::PhongShade, (x, y, 2));
        self.run_stage(ComputeStage::ObstructionMotion, (x, y, 1));
        self.run_stage(ComputeStage::TrimStaleVertices, (MAX_XDIM, MAX_YDIM, 2));
    }

    /// Overwrites one GPU obstruction slot. This is the only path that
    /// mutates GPU obstruction state; the host mirror is deliberately left
    /// alone and must be refreshed explicitly when needed.
    pub fn update_obstruction(&mut self, slot: usize, record: Obstruction) -> Result<()> {
        if slot >= MAX_OBSTRUCTIONS {
            return Err(RippleError::SlotOutOfRange {
                slot,
                capacity: MAX_OBSTRUCTIONS,
            });
        }
        self.params.target_slot = slot as i32;
        self.params.staged_obstruction = record;
        self.uniform.force_update_content(&self.queue, self.params);
        self.run_stage(ComputeStage::WriteObstruction, (1, 1, 1));
        self.params.target_slot = -1;
        Ok(())
    }

    /// Replaces the host mirror with the GPU table, picking up transient
    /// motion and collapsed slots.
    pub fn refresh_host_obstructions(&mut self) -> Result<()> {
        let records: Vec<Obstruction> = self.read_back(BufferRole::Obstructions, MAX_OBSTRUCTIONS)?;
        self.arena.refresh_from(&records);
        Ok(())
    }

    pub fn set_inlet_velocity(&mut self, u_max: f32) {
        self.params.u_max = u_max;
    }

    pub fn set_omega(&mut self, omega: f32) {
        self.params.omega = omega;
    }

    pub fn set_contour(&mut self, variable: ContourVariable, min: f32, max: f32) {
        self.params.contour_var = variable as i32;
        self.params.contour_min = min;
        self.params.contour_max = max;
    }

    pub fn set_camera_position(&mut self, position: [f32; 3]) {
        self.params.camera_pos = position;
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn resize_domain(&mut self, x_dim: u32, y_dim: u32) -> Result<()> {
        self.domain.resize(x_dim, y_dim)
    }

    pub fn set_visible(&mut self, x_visible: u32, y_visible: u32) {
        self.domain.set_visible(x_visible, y_visible);
    }

    pub fn arena(&self) -> &ObstructionArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ObstructionArena {
        &mut self.arena
    }

    /// True when lattice buffer "A" is bound as the read side.
    pub fn lattice_reads_a(&self) -> bool {
        self.pingpong.reads_a()
    }

    pub fn shared_vertices(&self) -> &SharedVertexBuffer {
        &self.shared_vertices
    }

    pub fn shared_vertices_mut(&mut self) -> &mut SharedVertexBuffer {
        &mut self.shared_vertices
    }

    pub fn vertex_buffer(&self) -> Result<&wgpu::Buffer> {
        self.registry.get(BufferRole::Vertices)
    }

    /// Blocking copy of `count` elements of a registered buffer back to the
    /// host. The map wait is the only place the engine blocks on the GPU.
    pub(crate) fn read_back<T: bytemuck::Pod>(
        &self,
        role: BufferRole,
        count: usize,
    ) -> Result<Vec<T>> {
        let source = self.registry.get(role)?;
        let staging = ArrayBuffer::<T>::new_staging(&self.device, count);
        let byte_len = (count * std::mem::size_of::<T>()) as u64;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(source, 0, staging.buffer(), 0, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.buffer().slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::MaintainBase::Wait);

        match pollster::block_on(receiver) {
            Ok(Ok(())) => {
                let data = slice.get_mapped_range();
                let out = bytemuck::cast_slice(&data).to_vec();
                drop(data);
                staging.buffer().unmap();
                Ok(out)
            }
            Ok(Err(e)) => Err(RippleError::Readback(e.to_string())),
            Err(_) => Err(RippleError::Readback("map callback dropped".into())),
        }
    }

    /// Current lattice state (the read-side buffer), 9 values per node over
    /// the maximum grid.
    pub fn read_lattice(&self) -> Result<Vec<f32>> {
        let role = if self.pingpong.reads_a() {
            BufferRole::LatticeA
        } else {
            BufferRole::LatticeB
        };
        self.read_back(role, Domain::max_nodes() as usize * 9)
    }

    pub fn read_vertices(&self) -> Result<Vec<SurfaceVertex>> {
        self.read_back(BufferRole::Vertices, Domain::max_nodes() as usize * 2)
    }

    pub fn read_obstructions(&self) -> Result<Vec<Obstruction>> {
        self.read_back(BufferRole::Obstructions, MAX_OBSTRUCTIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::obstruction::Shape;

    #[test]
    fn pingpong_returns_to_start_after_even_steps() {
        let mut tracker = PingPong::new();
        assert!(tracker.reads_a());
        for step in 1..=10 {
            tracker.flip();
            // Odd step counts leave "B" as the read buffer.
            assert_eq!(tracker.reads_a(), step % 2 == 0);
        }
        assert!(tracker.reads_a());
    }

    fn test_solver(x: u32, y: u32) -> Option<FluidSolver> {
        let _ = env_logger::builder().is_test(true).try_init();
        let context = match GpuContext::new_blocking() {
            Ok(context) => context,
            Err(e) => {
                eprintln!("skipping: {e}");
                return None;
            }
        };
        let domain = Domain::new(x, y).unwrap();
        Some(FluidSolver::new(&context, domain).unwrap())
    }

    #[test]
    fn one_frame_keeps_the_lattice_finite() {
        let Some(mut solver) = test_solver(16, 16) else {
            return;
        };
        solver.set_inlet_velocity(0.05);
        solver.set_omega(1.0);
        solver.advance();

        assert!(solver.lattice_reads_a(), "ten sub-steps must restore parity");

        let lattice = solver.read_lattice().unwrap();
        for j in 0..16usize {
            for i in 0..16usize {
                let node = j * MAX_XDIM as usize + i;
                for q in 0..9 {
                    let f = lattice[node * 9 + q];
                    assert!(f.is_finite(), "non-finite f[{q}] at ({i},{j}): {f}");
                }
            }
        }
    }

    #[test]
    fn contour_scalars_stay_in_range_before_shading() {
        let Some(mut solver) = test_solver(16, 16) else {
            return;
        };
        solver.set_inlet_velocity(0.05);
        solver.set_omega(1.0);
        solver.set_contour(ContourVariable::VelocityMagnitude, 0.0, 0.1);
        solver.sync_params();

        // Drive the lattice and the vertex derivation, but stop before the
        // shading pass repacks the scalar as a color.
        for _ in 0..SUBSTEP_PAIRS_PER_FRAME {
            solver.run_stage(ComputeStage::LbmStep, (16, 16, 1));
            solver.pingpong.flip();
            solver.run_stage(ComputeStage::LbmStep, (16, 16, 1));
            solver.pingpong.flip();
        }
        solver.run_stage(ComputeStage::SurfaceVertices, (16, 16, 1));

        let vertices = solver.read_vertices().unwrap();
        for j in 0..16usize {
            for i in 0..16usize {
                let v = vertices[j * MAX_XDIM as usize + i];
                assert!(
                    (0.0..=1.0).contains(&v.color),
                    "contour scalar {} out of range at ({i},{j})",
                    v.color
                );
            }
        }
    }

    #[test]
    fn obstruction_write_targets_exactly_one_slot() {
        let Some(mut solver) = test_solver(32, 32) else {
            return;
        };

        let record = Obstruction::new(Shape::Square, 12.0, 9.0, 3.0);
        solver.update_obstruction(7, record).unwrap();

        let table = solver.read_obstructions().unwrap();
        assert_eq!(table[7], record);
        for (slot, other) in table.iter().enumerate() {
            if slot != 7 {
                assert_eq!(*other, Obstruction::inactive(), "slot {slot} disturbed");
            }
        }
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let Some(mut solver) = test_solver(16, 16) else {
            return;
        };
        let record = Obstruction::new(Shape::Circle, 1.0, 1.0, 2.0);
        assert!(matches!(
            solver.update_obstruction(MAX_OBSTRUCTIONS, record),
            Err(RippleError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn shrinking_the_grid_trims_stale_vertices() {
        let Some(mut solver) = test_solver(64, 64) else {
            return;
        };
        solver.set_inlet_velocity(0.05);
        solver.set_omega(1.0);
        solver.advance();

        // Node (48, 48) carries live geometry at 64x64.
        let vertices = solver.read_vertices().unwrap();
        let node = 48 * MAX_XDIM as usize + 48;
        assert!(vertices[node].position[0] != 0.0 || vertices[node].position[1] != 0.0);

        solver.resize_domain(32, 32).unwrap();
        solver.advance();

        let vertices = solver.read_vertices().unwrap();
        let nodes = Domain::max_nodes() as usize;
        for idx in [node, nodes + node] {
            assert_eq!(vertices[idx].position, [0.0; 3], "stale vertex at {idx}");
            assert_eq!(vertices[idx].color, 0.0);
        }
    }

    #[test]
    fn vanishing_obstructions_collapse_and_free_their_slot() {
        let Some(mut solver) = test_solver(32, 32) else {
            return;
        };

        let slot = solver.arena_mut().claim_slot().unwrap();
        let mut record = Obstruction::new(Shape::Circle, 16.0, 16.0, 4.0);
        solver.arena_mut().set(slot, record).unwrap();
        solver.update_obstruction(slot, record).unwrap();

        record.state = crate::simulation::obstruction::State::Vanishing as i32;
        solver.update_obstruction(slot, record).unwrap();

        // The radius shrinks by 0.9 per frame; 4.0 collapses within 25.
        for _ in 0..25 {
            solver.advance();
        }

        solver.refresh_host_obstructions().unwrap();
        assert_eq!(solver.arena().active_count(), 0);
        assert!(!solver.read_obstructions().unwrap()[slot].is_active());
    }
}
