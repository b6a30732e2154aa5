//! Per-frame data shared between the host loop and the GPU.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Per-frame uniform data for the gravity compute shader.
///
/// Must match the std140 layout of the shader's uniform block: a float
/// frame time at offset 0 and a uint particle count at offset 4, padded to
/// a 16-byte block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleUbo {
    /// Seconds elapsed since the previous frame.
    pub frame_time: f32,
    /// Total particle count; the shader bounds-checks its invocation index
    /// against it.
    pub particle_count: u32,
    // Explicit tail padding keeps the struct Pod-safe at 16 bytes.
    _pad: [u32; 2],
}

impl ParticleUbo {
    /// Build the uniform payload for one frame.
    pub fn new(frame_time: f32, particle_count: u32) -> Self {
        Self {
            frame_time,
            particle_count,
            _pad: [0; 2],
        }
    }
}

/// Everything a draw or dispatch needs for the frame being recorded.
///
/// The frame's delta time travels to the GPU through [`ParticleUbo`], not
/// through this struct.
pub struct FrameContext {
    /// Frame-in-flight slot index.
    pub frame_index: usize,
    /// Command buffer being recorded for this slot.
    pub command_buffer: vk::CommandBuffer,
    /// Descriptor set for this slot's resources.
    pub descriptor_set: vk::DescriptorSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn ubo_matches_std140_layout() {
        assert_eq!(size_of::<ParticleUbo>(), 16);
        assert_eq!(offset_of!(ParticleUbo, frame_time), 0);
        assert_eq!(offset_of!(ParticleUbo, particle_count), 4);
    }

    #[test]
    fn ubo_bytes_round_trip() {
        let ubo = ParticleUbo::new(0.016, 65536);
        let bytes = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), 16);
        let restored: &ParticleUbo = bytemuck::from_bytes(bytes);
        assert_eq!(*restored, ubo);
    }
}
