//! Rendering subsystem.
//!
//! The only backend is Vulkan; see [`vulkan`]. Per-frame data shared between
//! the host loop and the GPU lives in [`frame`].

pub mod frame;
pub mod vulkan;

pub use frame::{FrameContext, ParticleUbo};
