//! Frame orchestration
//!
//! [`Renderer`] owns the swapchain and the per-slot command buffers and
//! drives the begin/end frame cycle. Transient swapchain staleness (out of
//! date, suboptimal, window resize) is handled here by recreating the
//! swapchain; the only unrecoverable recreation outcome is a changed image
//! or depth format, which invalidates pipelines built against the old one.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::swapchain::{Swapchain, MAX_FRAMES_IN_FLIGHT};
use crate::render::vulkan::window::Window;

/// Advance a frame-in-flight slot index.
pub(crate) fn next_frame_index(current: usize, max_frames: usize) -> usize {
    (current + 1) % max_frames
}

/// Owns the swapchain and command buffers; sequences one frame at a time.
pub struct Renderer {
    device: Device,
    swapchain: Swapchain,
    command_buffers: Vec<vk::CommandBuffer>,
    current_image_index: u32,
    current_frame_index: usize,
    frame_started: bool,
}

impl Renderer {
    /// Create a renderer with a swapchain sized to the window's current
    /// framebuffer.
    pub fn new(context: &VulkanContext, window: &Window) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(context, window.framebuffer_extent(), None)?;
        let command_buffers = context.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        Ok(Self {
            device: context.raw_device(),
            swapchain,
            command_buffers,
            current_image_index: 0,
            current_frame_index: 0,
            frame_started: false,
        })
    }

    /// Begin a frame: acquire a swapchain image and start recording the
    /// slot's command buffer.
    ///
    /// Returns `Ok(None)` when the swapchain was out of date; it has been
    /// recreated and the caller should skip this frame and try again.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame(
        &mut self,
        context: &VulkanContext,
        window: &mut Window,
    ) -> VulkanResult<Option<vk::CommandBuffer>> {
        assert!(!self.frame_started, "begin_frame called during a frame");

        let image_index = match self.swapchain.acquire_next_image() {
            Ok((index, _suboptimal)) => {
                // A suboptimal acquire still renders; presentation handles
                // the recreation at end of frame.
                index
            }
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                self.recreate_swapchain(context, window)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.current_image_index = image_index;
        self.frame_started = true;

        let command_buffer = self.command_buffers[self.current_frame_index];
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        Ok(Some(command_buffer))
    }

    /// End the frame: finish recording, submit and present. Recreates the
    /// swapchain if presentation reported it stale or the window resized.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn end_frame(
        &mut self,
        context: &VulkanContext,
        window: &mut Window,
    ) -> VulkanResult<()> {
        assert!(self.frame_started, "end_frame called with no frame started");

        let command_buffer = self.command_buffers[self.current_frame_index];
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let submit_result = self
            .swapchain
            .submit_command_buffers(command_buffer, self.current_image_index);

        self.frame_started = false;
        self.current_frame_index =
            next_frame_index(self.current_frame_index, MAX_FRAMES_IN_FLIGHT);

        match submit_result {
            Ok(suboptimal) => {
                if suboptimal || window.was_resized() {
                    self.recreate_swapchain(context, window)?;
                }
                Ok(())
            }
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                self.recreate_swapchain(context, window)
            }
            Err(e) => Err(e),
        }
    }

    /// Begin the swapchain render pass on the current frame's command
    /// buffer, clearing to black, and set viewport and scissor.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `command_buffer` is not the one
    /// returned by [`Renderer::begin_frame`].
    pub fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass begun outside a frame");
        assert_eq!(
            command_buffer, self.command_buffers[self.current_frame_index],
            "render pass begun on a different frame's command buffer"
        );

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let extent = self.swapchain.extent();
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(self.current_image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    /// End the swapchain render pass.
    ///
    /// # Panics
    ///
    /// Same contract as [`Renderer::begin_swapchain_render_pass`].
    pub fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.frame_started, "render pass ended outside a frame");
        assert_eq!(
            command_buffer, self.command_buffers[self.current_frame_index],
            "render pass ended on a different frame's command buffer"
        );

        unsafe {
            self.device.cmd_end_render_pass(command_buffer);
        }
    }

    /// Tear down and rebuild the swapchain for the current framebuffer
    /// extent.
    ///
    /// Blocks in `wait_events` while the framebuffer extent is zero
    /// (minimized window). Fails with
    /// [`VulkanError::SwapchainFormatChanged`] if the new swapchain's
    /// formats differ from the old one's.
    pub fn recreate_swapchain(
        &mut self,
        context: &VulkanContext,
        window: &mut Window,
    ) -> VulkanResult<()> {
        let mut extent = window.framebuffer_extent();
        while extent.width == 0 || extent.height == 0 {
            window.wait_events();
            extent = window.framebuffer_extent();
        }

        context.wait_idle()?;

        let new_swapchain = Swapchain::new(context, extent, Some(&self.swapchain))?;
        if !new_swapchain.compare_formats(&self.swapchain) {
            return Err(VulkanError::SwapchainFormatChanged);
        }

        log::info!(
            "Swapchain recreated at {}x{}",
            extent.width,
            extent.height
        );

        self.swapchain = new_swapchain;
        window.reset_resized_flag();
        Ok(())
    }

    /// Render pass compatible with the swapchain framebuffers. Stable
    /// across recreations as long as formats do not change.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Current frame-in-flight slot index, in `0..MAX_FRAMES_IN_FLIGHT`.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(
            self.frame_started,
            "frame index queried outside a frame"
        );
        self.current_frame_index
    }

    /// Whether a frame is currently being recorded.
    pub fn is_frame_started(&self) -> bool {
        self.frame_started
    }

    /// Width-over-height of the current swapchain extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_wraps_at_max() {
        assert_eq!(next_frame_index(0, MAX_FRAMES_IN_FLIGHT), 1);
        assert_eq!(next_frame_index(1, MAX_FRAMES_IN_FLIGHT), 0);
    }

    #[test]
    fn frame_index_cycles_over_many_frames() {
        let mut index = 0;
        for frame in 1..=100 {
            index = next_frame_index(index, MAX_FRAMES_IN_FLIGHT);
            assert_eq!(index, frame % MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn frame_index_stays_in_range() {
        let mut index = 0;
        for _ in 0..1000 {
            index = next_frame_index(index, MAX_FRAMES_IN_FLIGHT);
            assert!(index < MAX_FRAMES_IN_FLIGHT);
        }
    }
}
