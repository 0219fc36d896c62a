//! Rasterization of the shared vertex buffer
//!
//! Two indexed draws per frame: the floor block (optional) and the fluid
//! block, both restricted to the visible row count. A separate pipeline
//! rasterizes only the floor block into the offscreen floor-light texture
//! under a fixed orthographic mapping, clearing only that attachment.

use cgmath::Matrix4;

use crate::gfx::grid_mesh::{self, SurfaceVertex};
use crate::gfx::interop::{self, InteropRegistration};
use crate::gfx::texture_resource::TextureResource;
use crate::simulation::domain::{Domain, MAX_XDIM, MAX_YDIM};
use crate::wgpu_utils::{binding_types, BindGroupBuilder, BindGroupLayoutBuilder, UniformBuffer};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewTransforms {
    pub model: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl Default for ViewTransforms {
    fn default() -> Self {
        let identity: Matrix4<f32> = cgmath::SquareMatrix::identity();
        ViewTransforms {
            model: identity.into(),
            projection: identity.into(),
        }
    }
}

pub struct SurfaceRenderer {
    pipeline: wgpu::RenderPipeline,
    floor_pipeline: wgpu::RenderPipeline,
    view_uniforms: UniformBuffer<ViewTransforms>,
    view_bind_group: wgpu::BindGroup,
    depth_texture: TextureResource,
    floor_light: TextureResource,
    floor_light_registration: InteropRegistration,
    index_buffer: wgpu::Buffer,
}

impl SurfaceRenderer {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let indices = grid_mesh::build_grid_indices(MAX_XDIM, MAX_YDIM);
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid indices"),
            size: (indices.len() * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX,
            mapped_at_creation: true,
        });
        index_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::cast_slice(&indices));
        index_buffer.unmap();

        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("surface shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/surface.wgsl").into()),
        });
        let floor_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("floor shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/floor.wgsl").into()),
        });

        let view_layout = BindGroupLayoutBuilder::new()
            .next_binding_vertex(binding_types::uniform())
            .create(device, "view transforms layout");

        let view_uniforms = UniformBuffer::<ViewTransforms>::new(device);
        let view_bind_group = BindGroupBuilder::new(&view_layout)
            .buffer(view_uniforms.buffer())
            .create(device, "view transforms");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("surface pipeline layout"),
            bind_group_layouts: &[&view_layout.layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("surface pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &surface_shader,
                entry_point: Some("vs_main"),
                buffers: &[SurfaceVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &surface_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Triangles wind clockwise and the view matrix may flip the
                // vertical axis, so neither face can be culled.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: TextureResource::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let floor_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("floor pipeline layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });

        let floor_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("floor-to-texture pipeline"),
            layout: Some(&floor_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &floor_shader,
                entry_point: Some("vs_main"),
                buffers: &[SurfaceVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &floor_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba32Float,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let depth_texture = TextureResource::create_depth_texture(device, width, height, "depth");
        let floor_light = TextureResource::create_floor_light_target(device);
        let floor_light_registration = interop::register_texture(&floor_light.texture);

        SurfaceRenderer {
            pipeline,
            floor_pipeline,
            view_uniforms,
            view_bind_group,
            depth_texture,
            floor_light,
            floor_light_registration,
            index_buffer,
        }
    }

    pub fn set_view(&mut self, queue: &wgpu::Queue, model: Matrix4<f32>, projection: Matrix4<f32>) {
        self.view_uniforms.update_content(
            queue,
            ViewTransforms {
                model: model.into(),
                projection: projection.into(),
            },
        );
    }

    /// Recreates the depth buffer for a new viewport.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = TextureResource::create_depth_texture(device, width, height, "depth");
    }

    /// Draws into `target`: optionally the floor block, then always the
    /// fluid block, both over the currently visible rows.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        vertices: &wgpu::Buffer,
        domain: &Domain,
        draw_floor: bool,
    ) {
        let visible = grid_mesh::visible_index_count(MAX_XDIM, domain.y_dim_visible());
        let block = grid_mesh::block_index_count(MAX_XDIM, MAX_YDIM);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("surface render"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("surface pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.06,
                            b: 0.09,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.view_bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            if draw_floor {
                pass.draw_indexed(block..block + visible, 0, 0..1);
            }
            pass.draw_indexed(0..visible, 0, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Rasterizes only the floor block into the floor-light texture. Clears
    /// that attachment and nothing else.
    pub fn render_floor_to_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertices: &wgpu::Buffer,
        domain: &Domain,
    ) {
        let visible = grid_mesh::visible_index_count(MAX_XDIM, domain.y_dim_visible());
        let block = grid_mesh::block_index_count(MAX_XDIM, MAX_YDIM);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("floor-to-texture"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("floor light pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.floor_light.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.floor_pipeline);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(block..block + visible, 0, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn floor_light(&self) -> &TextureResource {
        &self.floor_light
    }

    /// Read-only interop registration for the floor-light texture.
    pub fn floor_light_registration(&self) -> InteropRegistration {
        self.floor_light_registration
    }
}
