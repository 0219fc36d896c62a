//! Application facade
//!
//! One object wiring the GPU context, solver, and renderer together and
//! exposing the per-frame entry points the windowing collaborator drives:
//! advance, render, pick, obstruction edits, and parameter setters. Window
//! events, camera math, and image decoding stay outside; matrices, viewport
//! sizes, and decoded pixels are pushed in.

use cgmath::{Matrix4, Vector3};

use crate::gfx::context::GpuContext;
use crate::gfx::interop::{self, InteropRegistration};
use crate::gfx::surface_renderer::SurfaceRenderer;
use crate::gfx::texture_resource::TextureResource;
use crate::simulation::domain::Domain;
use crate::simulation::obstruction::{Obstruction, Shape, State};
use crate::simulation::solver::FluidSolver;
use crate::simulation::uniforms::ContourVariable;

pub struct FluidApp {
    context: GpuContext,
    solver: FluidSolver,
    renderer: SurfaceRenderer,
    env_texture: Option<TextureResource>,
    env_registration: Option<InteropRegistration>,
}

impl FluidApp {
    /// Builds the whole pipeline for an `x_dim` × `y_dim` active grid,
    /// rendering into views of `target_format` at the given viewport size.
    pub fn new(
        x_dim: u32,
        y_dim: u32,
        target_format: wgpu::TextureFormat,
        viewport: (u32, u32),
    ) -> anyhow::Result<FluidApp> {
        let context = GpuContext::new_blocking()?;
        let domain = Domain::new(x_dim, y_dim)?;
        let solver = FluidSolver::new(&context, domain)?;
        let renderer = SurfaceRenderer::new(
            &context.device,
            target_format,
            viewport.0.max(1),
            viewport.1.max(1),
        );

        Ok(FluidApp {
            context,
            solver,
            renderer,
            env_texture: None,
            env_registration: None,
        })
    }

    /// Advances the simulation by one frame (ten lattice sub-steps plus the
    /// derived surface and lighting passes).
    pub fn advance(&mut self) {
        self.solver.advance();
    }

    /// Draws the current state into `target`.
    pub fn render(&mut self, target: &wgpu::TextureView, draw_floor: bool) -> crate::error::Result<()> {
        let vertices = self.solver.vertex_buffer()?.clone();
        self.renderer.render(
            &self.context.device,
            &self.context.queue,
            target,
            &vertices,
            self.solver.domain(),
            draw_floor,
        );
        Ok(())
    }

    /// Renders the floor block into the offscreen floor-light texture.
    pub fn render_floor_to_texture(&mut self) -> crate::error::Result<()> {
        let vertices = self.solver.vertex_buffer()?.clone();
        self.renderer.render_floor_to_texture(
            &self.context.device,
            &self.context.queue,
            &vertices,
            self.solver.domain(),
        );
        Ok(())
    }

    /// Resolves a world-space ray against the fluid surface.
    pub fn pick(
        &mut self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
    ) -> crate::error::Result<Option<[f32; 3]>> {
        self.solver.pick(origin, direction)
    }

    /// Places a new obstruction, claiming a free slot. Returns the slot id,
    /// or `None` when the table is full.
    pub fn add_obstruction(
        &mut self,
        shape: Shape,
        x: f32,
        y: f32,
        r1: f32,
    ) -> crate::error::Result<Option<usize>> {
        let Some(slot) = self.solver.arena_mut().claim_slot() else {
            log::warn!("obstruction table full ({} slots)", self.solver.arena().capacity());
            return Ok(None);
        };
        let record = Obstruction::new(shape, x, y, r1);
        self.solver.arena_mut().set(slot, record)?;
        self.solver.update_obstruction(slot, record)?;
        Ok(Some(slot))
    }

    /// Starts collapsing an obstruction; the transient pass shrinks it to
    /// nothing over the following frames. The mirror slot stays occupied
    /// until [`FluidApp::refresh_obstructions`] observes the collapse.
    pub fn remove_obstruction(&mut self, slot: usize) -> crate::error::Result<()> {
        let mut record = *self.solver.arena().get(slot)?;
        if !record.is_active() {
            return Ok(());
        }
        record.state = State::Vanishing as i32;
        self.solver.arena_mut().set(slot, record)?;
        self.solver.update_obstruction(slot, record)
    }

    /// Moves an obstruction, giving it the velocity implied by the drag.
    pub fn move_obstruction(
        &mut self,
        slot: usize,
        x: f32,
        y: f32,
        u: f32,
        v: f32,
    ) -> crate::error::Result<()> {
        let mut record = *self.solver.arena().get(slot)?;
        record.x = x;
        record.y = y;
        record.u = u;
        record.v = v;
        self.solver.arena_mut().set(slot, record)?;
        self.solver.update_obstruction(slot, record)
    }

    /// Re-reads the GPU obstruction table into the host mirror, freeing
    /// slots whose obstructions have collapsed.
    pub fn refresh_obstructions(&mut self) -> crate::error::Result<()> {
        self.solver.refresh_host_obstructions()
    }

    pub fn set_inlet_velocity(&mut self, u_max: f32) {
        self.solver.set_inlet_velocity(u_max);
    }

    pub fn set_omega(&mut self, omega: f32) {
        self.solver.set_omega(omega);
    }

    pub fn set_contour(&mut self, variable: ContourVariable, min: f32, max: f32) {
        self.solver.set_contour(variable, min, max);
    }

    pub fn set_camera_position(&mut self, position: [f32; 3]) {
        self.solver.set_camera_position(position);
    }

    /// Pushes the collaborator's model and projection matrices in.
    pub fn set_view(&mut self, model: Matrix4<f32>, projection: Matrix4<f32>) {
        self.renderer.set_view(&self.context.queue, model, projection);
    }

    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        self.renderer
            .resize(&self.context.device, width.max(1), height.max(1));
    }

    pub fn resize_domain(&mut self, x_dim: u32, y_dim: u32) -> crate::error::Result<()> {
        self.solver.resize_domain(x_dim, y_dim)
    }

    pub fn set_visible(&mut self, x_visible: u32, y_visible: u32) {
        self.solver.set_visible(x_visible, y_visible);
    }

    /// Uploads the environment map from decoded RGB8 pixels and registers
    /// it read-only for the external compute backend.
    pub fn load_environment(
        &mut self,
        rgb_pixels: &[u8],
        width: u32,
        height: u32,
    ) -> crate::error::Result<()> {
        let texture = TextureResource::create_environment_texture(
            &self.context.device,
            &self.context.queue,
            rgb_pixels,
            width,
            height,
        )?;
        self.env_registration = Some(interop::register_texture(&texture.texture));
        self.env_texture = Some(texture);
        Ok(())
    }

    pub fn env_registration(&self) -> Option<InteropRegistration> {
        self.env_registration
    }

    pub fn floor_light_registration(&self) -> InteropRegistration {
        self.renderer.floor_light_registration()
    }

    pub fn solver(&self) -> &FluidSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut FluidSolver {
        &mut self.solver
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }
}

impl std::fmt::Debug for FluidApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluidApp")
            .field("domain", self.solver.domain())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> Option<FluidApp> {
        let _ = env_logger::builder().is_test(true).try_init();
        match FluidApp::new(32, 32, wgpu::TextureFormat::Rgba8Unorm, (256, 256)) {
            Ok(app) => Some(app),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    fn offscreen_target(app: &FluidApp) -> wgpu::TextureView {
        let texture = app.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: 256,
                height: 256,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    #[test]
    fn frame_and_render_complete() {
        let Some(mut app) = test_app() else {
            return;
        };
        app.set_inlet_velocity(0.05);
        app.set_omega(1.0);
        app.advance();

        let target = offscreen_target(&app);
        app.render(&target, true).unwrap();
        app.render_floor_to_texture().unwrap();
    }

    #[test]
    fn obstruction_lifecycle_through_the_facade() {
        let Some(mut app) = test_app() else {
            return;
        };

        let slot = app
            .add_obstruction(Shape::Circle, 16.0, 16.0, 3.0)
            .unwrap()
            .expect("empty table must have a free slot");
        assert_eq!(app.solver().arena().active_count(), 1);

        app.remove_obstruction(slot).unwrap();
        for _ in 0..25 {
            app.advance();
        }
        app.refresh_obstructions().unwrap();
        assert_eq!(app.solver().arena().active_count(), 0);
    }

    #[test]
    fn env_registration_is_read_only() {
        let Some(mut app) = test_app() else {
            return;
        };

        let pixels = vec![128u8; 4 * 4 * 3];
        app.load_environment(&pixels, 4, 4).unwrap();

        let registration = app.env_registration().unwrap();
        assert_eq!(
            registration.access,
            crate::gfx::interop::InteropAccess::ReadOnly
        );
    }
}
