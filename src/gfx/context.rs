//! Headless GPU context acquisition
//!
//! The core never owns a window; render targets are texture views handed in
//! by the windowing collaborator, so the context is created without a
//! surface.

use std::sync::Arc;

use crate::error::{Result, RippleError};

/// Shared device and queue for every GPU operation in the engine.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Acquires an adapter and device without a compatible surface.
    ///
    /// Fails with a configuration error when the host has no usable GPU;
    /// nothing in the engine retries this.
    pub async fn new() -> Result<GpuContext> {
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
            .map_err(|e| RippleError::AdapterUnavailable(e.to_string()))?;

        log::info!("using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ripple device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RippleError::DeviceRequest(e.to_string()))?;

        Ok(GpuContext {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Blocking wrapper around [`GpuContext::new`] for synchronous callers.
    pub fn new_blocking() -> Result<GpuContext> {
        pollster::block_on(Self::new())
    }
}
