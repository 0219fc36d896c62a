//! Graphics subsystem: GPU context, buffer registry, grid geometry,
//! interop handoff, textures, and the surface/floor rasterizer.

pub mod context;
pub mod grid_mesh;
pub mod interop;
pub mod registry;
pub mod surface_renderer;
pub mod texture_resource;

pub use context::GpuContext;
pub use registry::{BufferRegistry, BufferRole};
pub use surface_renderer::SurfaceRenderer;
