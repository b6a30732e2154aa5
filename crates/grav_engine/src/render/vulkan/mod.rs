//! Vulkan backend implementation
//!
//! Organized into initialization (window, context), per-frame state
//! (sync, swapchain, renderer) and resources (buffer, descriptors,
//! pipeline).

/// GLFW window wrapper and surface creation
pub mod window;

/// Vulkan instance, device selection and context
pub mod context;

/// Semaphore and fence RAII wrappers
pub mod sync;

/// Swapchain, render pass, framebuffers and presentation
pub mod swapchain;

/// GPU buffer management
pub mod buffer;

/// Descriptor set layouts, pools and writers
pub mod descriptors;

/// Shader modules and graphics/compute pipelines
pub mod pipeline;

/// Frame orchestration
pub mod renderer;

pub use buffer::Buffer;
pub use context::{PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanResult};
pub use descriptors::{DescriptorBinding, DescriptorPool, DescriptorSetLayout, DescriptorWriter};
pub use pipeline::{ComputePipeline, GraphicsPipeline, ShaderModule, VertexInput};
pub use renderer::Renderer;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use window::{Window, WindowError};
