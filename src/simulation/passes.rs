//! Compute pass dispatch
//!
//! Every GPU stage of the frame is one entry point in a single WGSL module,
//! enumerated here and compiled to its own pipeline at load time. Dispatch
//! extents are given in grid threads; workgroup rounding happens here.
//! Each `run` submits its own command encoder so a stage's storage writes
//! are complete before the next stage is dispatched, matching the original
//! one-barrier-per-dispatch ordering model.

const WORKGROUP_X: u32 = 8;
const WORKGROUP_Y: u32 = 8;

/// The fixed roster of compute stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum ComputeStage {
    /// Seed both lattice buffers with equilibrium distributions.
    InitializeDomain = 0,
    /// One lattice-Boltzmann stream-and-collide sub-step.
    LbmStep,
    /// Derive fluid surface positions and contour scalars from the lattice.
    SurfaceVertices,
    /// Refract light through the surface and deform the floor mesh.
    CausticRays,
    /// Turn floor-mesh compression into light intensity.
    FloorLightIntensity,
    /// Blend intensity and obstruction shadows into floor colors.
    ApplyFloorLight,
    /// Shade both vertex layers.
    PhongShade,
    /// Advance moving and vanishing obstructions.
    ObstructionMotion,
    /// Zero vertex data outside the active sub-rectangle.
    TrimStaleVertices,
    /// Overwrite a single obstruction table slot.
    WriteObstruction,
    /// Reset the ray-intersection scratch to its miss sentinel.
    ResetRayHit,
    /// Test every grid cell's surface quad against the pick ray.
    CastRay,
}

impl ComputeStage {
    pub const ALL: [ComputeStage; 12] = [
        ComputeStage::InitializeDomain,
        ComputeStage::LbmStep,
        ComputeStage::SurfaceVertices,
        ComputeStage::CausticRays,
        ComputeStage::FloorLightIntensity,
        ComputeStage::ApplyFloorLight,
        ComputeStage::PhongShade,
        ComputeStage::ObstructionMotion,
        ComputeStage::TrimStaleVertices,
        ComputeStage::WriteObstruction,
        ComputeStage::ResetRayHit,
        ComputeStage::CastRay,
    ];

    /// WGSL entry point this stage dispatches.
    pub fn entry_point(self) -> &'static str {
        match self {
            ComputeStage::InitializeDomain => "initialize_domain",
            ComputeStage::LbmStep => "lbm_step",
            ComputeStage::SurfaceVertices => "surface_vertices",
            ComputeStage::CausticRays => "caustic_rays",
            ComputeStage::FloorLightIntensity => "floor_light_intensity",
            ComputeStage::ApplyFloorLight => "apply_floor_light",
            ComputeStage::PhongShade => "phong_shade",
            ComputeStage::ObstructionMotion => "obstruction_motion",
            ComputeStage::TrimStaleVertices => "trim_stale_vertices",
            ComputeStage::WriteObstruction => "write_obstruction",
            ComputeStage::ResetRayHit => "reset_ray_hit",
            ComputeStage::CastRay => "cast_ray",
        }
    }
}

/// One compute pipeline per stage, all sharing a bind group layout.
pub struct ComputePasses {
    pipelines: Vec<wgpu::ComputePipeline>,
}

impl ComputePasses {
    pub fn new(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fluid compute layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        let pipelines = ComputeStage::ALL
            .iter()
            .map(|stage| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(stage.entry_point()),
                    layout: Some(&pipeline_layout),
                    module,
                    entry_point: Some(stage.entry_point()),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .collect();

        log::info!("compiled {} compute stages", ComputeStage::ALL.len());

        ComputePasses { pipelines }
    }

    /// Dispatches `stage` over `extent` grid threads and submits, so the
    /// stage's writes are visible to whatever runs next.
    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bind_group: &wgpu::BindGroup,
        stage: ComputeStage,
        extent: (u32, u32, u32),
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(stage.entry_point()),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(stage.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines[stage as usize]);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(
                extent.0.div_ceil(WORKGROUP_X),
                extent.1.div_ceil(WORKGROUP_Y),
                extent.2,
            );
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_are_distinct() {
        let mut names: Vec<&str> = ComputeStage::ALL.iter().map(|s| s.entry_point()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ComputeStage::ALL.len());
    }

    #[test]
    fn stage_discriminants_index_the_roster() {
        for (i, stage) in ComputeStage::ALL.iter().enumerate() {
            assert_eq!(*stage as usize, i);
        }
    }
}
