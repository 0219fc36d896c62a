// src/lib.rs
//! Ripple
//!
//! An interactive GPU lattice-Boltzmann fluid visualizer built on wgpu:
//! compute passes advance a D2Q9 lattice, derive a deforming water surface
//! with caustic floor lighting, and feed a shared vertex buffer to the
//! rasterizer.

pub mod app;
pub mod error;
pub mod gfx;
pub mod simulation;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::FluidApp;
pub use error::RippleError;
pub use simulation::{ContourVariable, Obstruction, Shape};

/// Creates a fluid visualizer with default render settings.
pub fn default_app(x_dim: u32, y_dim: u32) -> anyhow::Result<FluidApp> {
    FluidApp::new(x_dim, y_dim, wgpu::TextureFormat::Rgba8Unorm, (1280, 720))
}
