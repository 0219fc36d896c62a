//! Error types for the ripple engine
//!
//! Configuration problems (missing buffers, failed device acquisition) are
//! fatal and surface as errors from the offending call. Range violations are
//! validated and rejected instead of corrupting adjacent GPU memory. A ray
//! pick that finds nothing is not an error and never appears here.

use crate::gfx::registry::BufferRole;

/// Errors produced by the ripple core.
#[derive(Debug, thiserror::Error)]
pub enum RippleError {
    /// No suitable GPU adapter was found on this host.
    #[error("no suitable GPU adapter available: {0}")]
    AdapterUnavailable(String),

    /// The adapter refused to hand out a device with the requested limits.
    #[error("failed to acquire GPU device: {0}")]
    DeviceRequest(String),

    /// A buffer role was looked up before anything was registered under it.
    /// All roles are wired at construction time, so hitting this means the
    /// engine is misconfigured, not that a retry could help.
    #[error("no buffer registered for role {0:?}")]
    BufferNotRegistered(BufferRole),

    /// Obstruction slot id outside `[0, MAX_OBSTRUCTIONS)`.
    #[error("obstruction slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },

    /// Requested grid dimensions exceed the compile-time maximums.
    #[error("grid dims {x}x{y} exceed maximum {max_x}x{max_y}")]
    DimsExceedMax {
        x: u32,
        y: u32,
        max_x: u32,
        max_y: u32,
    },

    /// The decoded environment image is smaller than its stated dimensions.
    #[error("environment image data too short: got {got} bytes, need {need}")]
    EnvImageTooShort { got: usize, need: usize },

    /// A blocking GPU readback failed to map its staging buffer.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

pub type Result<T> = std::result::Result<T, RippleError>;
