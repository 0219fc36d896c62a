//! Cross-API resource sharing
//!
//! The vertex buffer is alternately owned by the rasterization pipeline and
//! an external compute backend. The original call-order convention is made
//! explicit here as a two-state machine: the backend must `acquire` before
//! touching the buffer and `release` before the rasterizer uses it again.
//! Out-of-order transitions trip a debug assertion and are rejected.

/// How a registered resource may be accessed by the external backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteropAccess {
    /// Backend overwrites the whole resource each frame.
    WriteDiscard,
    /// Backend only samples the resource.
    ReadOnly,
}

/// Registration record handed to the external compute backend.
#[derive(Debug, Clone, Copy)]
pub struct InteropRegistration {
    pub byte_size: u64,
    pub access: InteropAccess,
}

/// Current owner of the shared vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Rasterizer,
    ComputeBackend,
}

/// The shared vertex buffer together with its ownership state.
pub struct SharedVertexBuffer {
    buffer: wgpu::Buffer,
    registration: InteropRegistration,
    owner: Owner,
}

impl SharedVertexBuffer {
    pub fn new(buffer: wgpu::Buffer) -> Self {
        let registration = InteropRegistration {
            byte_size: buffer.size(),
            access: InteropAccess::WriteDiscard,
        };
        log::info!(
            "registered vertex buffer for interop: {} bytes, write-discard",
            registration.byte_size
        );
        SharedVertexBuffer {
            buffer,
            registration,
            owner: Owner::Rasterizer,
        }
    }

    pub fn registration(&self) -> InteropRegistration {
        self.registration
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Hands the buffer to the external compute backend.
    ///
    /// Returns the buffer only if the rasterizer currently owns it; a second
    /// acquire without a release in between is a sequencing bug in the
    /// caller.
    pub fn acquire_for_compute(&mut self) -> Option<&wgpu::Buffer> {
        debug_assert_eq!(
            self.owner,
            Owner::Rasterizer,
            "vertex buffer acquired twice without release"
        );
        if self.owner != Owner::Rasterizer {
            return None;
        }
        self.owner = Owner::ComputeBackend;
        Some(&self.buffer)
    }

    /// Returns the buffer to the rasterizer.
    pub fn release_to_rasterizer(&mut self) {
        debug_assert_eq!(
            self.owner,
            Owner::ComputeBackend,
            "vertex buffer released while the rasterizer already owned it"
        );
        self.owner = Owner::Rasterizer;
    }

    /// Access for the rasterization and compute-dispatch paths, which run
    /// while the rasterizer owns the buffer.
    pub fn buffer(&self) -> &wgpu::Buffer {
        debug_assert_eq!(
            self.owner,
            Owner::Rasterizer,
            "vertex buffer used while owned by the compute backend"
        );
        &self.buffer
    }
}

/// Read-only texture registration (environment map, floor-light map).
pub fn register_texture(texture: &wgpu::Texture) -> InteropRegistration {
    let byte_size = (texture.width() * texture.height()) as u64 * 16;
    InteropRegistration {
        byte_size,
        access: InteropAccess::ReadOnly,
    }
}
