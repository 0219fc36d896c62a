//! Role-keyed storage buffer registry
//!
//! Every GPU-resident buffer the simulation touches is registered under a
//! [`BufferRole`]. Roles are a closed enum rather than strings, so a typo'd
//! lookup cannot compile; looking up a role nothing was registered under is
//! still a fatal configuration error surfaced as [`RippleError`].

use crate::error::{Result, RippleError};

/// The fixed set of storage buffers the compute pipeline operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// Lattice distribution buffer "A" (9 f32 per node).
    LatticeA,
    /// Lattice distribution buffer "B" (9 f32 per node).
    LatticeB,
    /// Per-node i32 floor occupancy flags.
    FloorFlags,
    /// Fixed-capacity obstruction table.
    Obstructions,
    /// Single-record ray intersection scratch.
    RayHit,
    /// Shared surface/floor vertex buffer (also bound for rasterization).
    Vertices,
}

impl BufferRole {
    const COUNT: usize = 6;

    fn index(self) -> usize {
        match self {
            BufferRole::LatticeA => 0,
            BufferRole::LatticeB => 1,
            BufferRole::FloorFlags => 2,
            BufferRole::Obstructions => 3,
            BufferRole::RayHit => 4,
            BufferRole::Vertices => 5,
        }
    }
}

/// Owns the engine's storage buffers, slotted by role.
///
/// Re-registering a role supersedes the previous buffer; exactly one live
/// handle exists per role at any time.
#[derive(Default)]
pub struct BufferRegistry {
    slots: [Option<wgpu::Buffer>; BufferRole::COUNT],
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `buffer` under `role`, dropping any previous holder.
    pub fn register(&mut self, role: BufferRole, buffer: wgpu::Buffer) {
        let slot = &mut self.slots[role.index()];
        if slot.is_some() {
            log::warn!("superseding buffer registered for role {:?}", role);
        }
        *slot = Some(buffer);
    }

    /// Looks up the buffer for `role`.
    ///
    /// An unpopulated role means the engine was wired incorrectly; callers
    /// propagate this as a fatal error rather than retrying.
    pub fn get(&self, role: BufferRole) -> Result<&wgpu::Buffer> {
        self.slots[role.index()]
            .as_ref()
            .ok_or(RippleError::BufferNotRegistered(role))
    }

    pub fn is_registered(&self, role: BufferRole) -> bool {
        self.slots[role.index()].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: None,
            ..Default::default()
        }))
        .ok()?;
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()
    }

    fn dummy_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        })
    }

    #[test]
    fn unregistered_role_is_an_error() {
        let registry = BufferRegistry::new();
        assert!(matches!(
            registry.get(BufferRole::FloorFlags),
            Err(RippleError::BufferNotRegistered(BufferRole::FloorFlags))
        ));
    }

    #[test]
    fn reregistration_supersedes() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };

        let mut registry = BufferRegistry::new();
        registry.register(BufferRole::FloorFlags, dummy_buffer(&device, 64));
        registry.register(BufferRole::FloorFlags, dummy_buffer(&device, 128));

        // The second registration is the only live handle.
        let buffer = registry.get(BufferRole::FloorFlags).unwrap();
        assert_eq!(buffer.size(), 128);
    }

    #[test]
    fn roles_do_not_alias() {
        let Some((device, _queue)) = test_device() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };

        let mut registry = BufferRegistry::new();
        registry.register(BufferRole::LatticeA, dummy_buffer(&device, 16));
        registry.register(BufferRole::LatticeB, dummy_buffer(&device, 32));

        assert_eq!(registry.get(BufferRole::LatticeA).unwrap().size(), 16);
        assert_eq!(registry.get(BufferRole::LatticeB).unwrap().size(), 32);
        assert!(!registry.is_registered(BufferRole::Vertices));
    }
}
