//! Vulkan synchronization primitives
//!
//! RAII wrappers for semaphores and fences, and the per-slot [`FrameSync`]
//! bundle used for frames in flight.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Binary semaphore with RAII cleanup.
pub struct Semaphore {
    device: Device,
    handle: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore in the unsignaled state.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let handle = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// Get the raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.handle, None);
        }
    }
}

/// Fence with RAII cleanup.
pub struct Fence {
    device: Device,
    handle: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled. Frame fences start
    /// signaled so the first wait on each slot returns immediately.
    pub fn new(device: &Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let handle = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// Get the raw fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    /// Block until the fence signals.
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.handle], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to the unsignaled state.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.handle])
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.handle, None);
        }
    }
}

/// Synchronization objects for one frame-in-flight slot.
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to render into.
    pub image_available: Semaphore,
    /// Signaled when rendering finishes; presentation waits on it.
    pub render_finished: Semaphore,
    /// Signaled when the GPU has finished all work for this slot.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create sync objects for one slot. The fence starts signaled.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }
}
