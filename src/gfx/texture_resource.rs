//! Texture resource management
//!
//! Bundles texture, view, and sampler for the three textures the core owns:
//! the depth buffer, the environment map built from decoded image pixels,
//! and the 1024×1024 float target the floor pass renders into.

use crate::error::{Result, RippleError};

/// Side length of the offscreen floor-light render target.
pub const FLOOR_LIGHT_TEXTURE_SIZE: u32 = 1024;

#[derive(Clone)]
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl TextureResource {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn clamp_linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }

    /// Depth buffer matching the caller's viewport.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Float render target the floor block is rasterized into each frame.
    pub fn create_floor_light_target(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("floor light target"),
            size: wgpu::Extent3d {
                width: FLOOR_LIGHT_TEXTURE_SIZE,
                height: FLOOR_LIGHT_TEXTURE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::clamp_linear_sampler(device, "floor light sampler");

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Builds the environment map from decoded RGB8 pixels.
    ///
    /// Decoding is the asset collaborator's job; this only expands the rows
    /// to RGBA float and uploads them. Short data is a configuration error.
    pub fn create_environment_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgb_pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let need = (width * height * 3) as usize;
        if rgb_pixels.len() < need {
            return Err(RippleError::EnvImageTooShort {
                got: rgb_pixels.len(),
                need,
            });
        }

        let mut texels = vec![0f32; (width * height * 4) as usize];
        for i in 0..(width * height) as usize {
            texels[4 * i] = rgb_pixels[3 * i] as f32 / 255.0;
            texels[4 * i + 1] = rgb_pixels[3 * i + 1] as f32 / 255.0;
            texels[4 * i + 2] = rgb_pixels[3 * i + 2] as f32 / 255.0;
            texels[4 * i + 3] = 1.0;
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("environment texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Self::clamp_linear_sampler(device, "environment sampler");

        log::info!("environment texture uploaded: {}x{}", width, height);

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_image_data_is_rejected() {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let Ok(adapter) =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: None,
                ..Default::default()
            }))
        else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        let Ok((device, queue)) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
        else {
            eprintln!("skipping: no GPU device");
            return;
        };

        let result =
            TextureResource::create_environment_texture(&device, &queue, &[0u8; 10], 4, 4);
        assert!(matches!(
            result,
            Err(RippleError::EnvImageTooShort { got: 10, need: 48 })
        ));
    }
}
