//! Swapchain management and presentation
//!
//! Owns the swapchain images, depth buffer, render pass, framebuffers and
//! the per-slot synchronization objects. Acquire and submit both live here;
//! the [`crate::render::vulkan::Renderer`] drives them and decides when to
//! recreate.
//!
//! Staleness is reported, not handled: `ERROR_OUT_OF_DATE_KHR` surfaces as
//! an [`VulkanError::Api`] error and a suboptimal acquire/present surfaces
//! as a boolean, leaving the recreation policy to the caller.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::vulkan::buffer;
use crate::render::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vulkan::sync::FrameSync;

/// Number of frames that may be recorded ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Swapchain with render pass, framebuffers and frame synchronization.
pub struct Swapchain {
    device: Device,
    loader: SwapchainLoader,
    handle: vk::SwapchainKHR,

    image_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,

    image_views: Vec<vk::ImageView>,
    depth_images: Vec<vk::Image>,
    depth_image_memories: Vec<vk::DeviceMemory>,
    depth_image_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    frame_sync: Vec<FrameSync>,
    // Fence of the frame slot currently using each swapchain image, or null.
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,

    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Swapchain {
    /// Create a swapchain for the given window extent. Pass the previous
    /// swapchain during recreation so in-flight presentation can finish
    /// against it.
    pub fn new(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        old: Option<&Swapchain>,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let loader = SwapchainLoader::new(context.instance(), &device);

        let surface = context.surface();
        let surface_loader = context.surface_loader();
        let physical = context.physical_device.device;

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical, surface)
                .map_err(VulkanError::Api)?
        };

        let surface_format = Self::choose_surface_format(&formats)?;
        let present_mode = Self::choose_present_mode(&present_modes);
        let extent = Self::choose_extent(&capabilities, window_extent);

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
            image_count = capabilities.max_image_count;
        }

        let graphics_family = context.physical_device.graphics_family;
        let present_family = context.physical_device.present_family;
        let family_indices = [graphics_family, present_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old.map_or(vk::SwapchainKHR::null(), |o| o.handle));

        if graphics_family != present_family {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        } else {
            create_info = create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE);
        }

        let handle = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = unsafe {
            loader
                .get_swapchain_images(handle)
                .map_err(VulkanError::Api)?
        };

        let image_views =
            Self::create_image_views(&device, &images, surface_format.format)?;

        let depth_format = Self::find_depth_format(context)?;
        let (depth_images, depth_image_memories, depth_image_views) =
            Self::create_depth_resources(context, &device, depth_format, extent, images.len())?;

        let render_pass = Self::create_render_pass(&device, surface_format.format, depth_format)?;
        let framebuffers = Self::create_framebuffers(
            &device,
            render_pass,
            &image_views,
            &depth_image_views,
            extent,
        )?;

        let mut frame_sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            frame_sync.push(FrameSync::new(&device)?);
        }
        let images_in_flight = vec![vk::Fence::null(); images.len()];

        log::debug!(
            "Swapchain created: {}x{} {:?} {:?} with {} images",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            handle,
            image_format: surface_format.format,
            depth_format,
            extent,
            image_views,
            depth_images,
            depth_image_memories,
            depth_image_views,
            render_pass,
            framebuffers,
            frame_sync,
            images_in_flight,
            current_frame: 0,
            graphics_queue: context.graphics_queue(),
            present_queue: context.present_queue(),
        })
    }

    fn choose_surface_format(
        formats: &[vk::SurfaceFormatKHR],
    ) -> VulkanResult<vk::SurfaceFormatKHR> {
        if formats.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "no surface formats available".to_string(),
            ));
        }

        Ok(formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .copied()
            .unwrap_or(formats[0]))
    }

    fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
        if modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            // FIFO is the only mode guaranteed to exist.
            vk::PresentModeKHR::FIFO
        }
    }

    fn choose_extent(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        window_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: window_extent.width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: window_extent.height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        }
    }

    fn create_image_views(
        device: &Device,
        images: &[vk::Image],
        format: vk::Format,
    ) -> VulkanResult<Vec<vk::ImageView>> {
        images
            .iter()
            .map(|&image| {
                let create_info = vk::ImageViewCreateInfo::builder()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe {
                    device
                        .create_image_view(&create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    fn find_depth_format(context: &VulkanContext) -> VulkanResult<vk::Format> {
        let candidates = [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ];

        for &format in &candidates {
            let props = unsafe {
                context
                    .instance()
                    .get_physical_device_format_properties(context.physical_device.device, format)
            };
            if props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            {
                return Ok(format);
            }
        }

        Err(VulkanError::InitializationFailed(
            "no supported depth format".to_string(),
        ))
    }

    fn create_depth_resources(
        context: &VulkanContext,
        device: &Device,
        format: vk::Format,
        extent: vk::Extent2D,
        count: usize,
    ) -> VulkanResult<(Vec<vk::Image>, Vec<vk::DeviceMemory>, Vec<vk::ImageView>)> {
        let mut images = Vec::with_capacity(count);
        let mut memories = Vec::with_capacity(count);
        let mut views = Vec::with_capacity(count);

        for _ in 0..count {
            let image_info = vk::ImageCreateInfo::builder()
                .image_type(vk::ImageType::TYPE_2D)
                .extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .format(format)
                .tiling(vk::ImageTiling::OPTIMAL)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let image = unsafe {
                device
                    .create_image(&image_info, None)
                    .map_err(VulkanError::Api)?
            };

            let requirements = unsafe { device.get_image_memory_requirements(image) };
            let memory_type = buffer::find_memory_type(
                context,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;

            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type);

            let memory = unsafe {
                device
                    .allocate_memory(&alloc_info, None)
                    .map_err(VulkanError::Api)?
            };
            unsafe {
                device
                    .bind_image_memory(image, memory, 0)
                    .map_err(VulkanError::Api)?;
            }

            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe {
                device
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };

            images.push(image);
            memories.push(memory);
            views.push(view);
        }

        Ok((images, memories, views))
    }

    fn create_render_pass(
        device: &Device,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<vk::RenderPass> {
        let color_attachment = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let depth_attachment = vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)
            .build();

        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();

        let attachments = [color_attachment, depth_attachment];
        let subpasses = [subpass];
        let dependencies = [dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_framebuffers(
        device: &Device,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        depth_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        image_views
            .iter()
            .zip(depth_views.iter())
            .map(|(&color, &depth)| {
                let attachments = [color, depth];
                let create_info = vk::FramebufferCreateInfo::builder()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                unsafe {
                    device
                        .create_framebuffer(&create_info, None)
                        .map_err(VulkanError::Api)
                }
            })
            .collect()
    }

    /// Wait for the current frame slot and acquire the next swapchain image.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    /// `ERROR_OUT_OF_DATE_KHR` comes back as `Err(VulkanError::Api(..))`.
    pub fn acquire_next_image(&mut self) -> VulkanResult<(u32, bool)> {
        let sync = &self.frame_sync[self.current_frame];
        sync.in_flight.wait()?;

        unsafe {
            self.loader
                .acquire_next_image(
                    self.handle,
                    u64::MAX,
                    sync.image_available.handle(),
                    vk::Fence::null(),
                )
                .map_err(VulkanError::Api)
        }
    }

    /// Submit a recorded command buffer for `image_index` and present it.
    ///
    /// Returns whether presentation reported the swapchain as suboptimal.
    /// Advances the frame slot on success.
    pub fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<bool> {
        let image_index = image_index as usize;

        // If an earlier frame is still rendering to this image, wait for it.
        if self.images_in_flight[image_index] != vk::Fence::null() {
            unsafe {
                self.device
                    .wait_for_fences(&[self.images_in_flight[image_index]], true, u64::MAX)
                    .map_err(VulkanError::Api)?;
            }
        }

        let sync = &self.frame_sync[self.current_frame];
        self.images_in_flight[image_index] = sync.in_flight.handle();

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        sync.in_flight.reset()?;

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], sync.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.handle];
        let image_indices = [image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result =
            unsafe { self.loader.queue_present(self.present_queue, &present_info) };

        // The submit went through either way, so the slot's fence is in
        // flight; rotate even when presentation failed.
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        present_result.map_err(VulkanError::Api)
    }

    /// Whether this swapchain's image and depth formats match another's.
    /// Pipelines and render passes outlive recreations, so a mismatch after
    /// recreating is fatal.
    pub fn compare_formats(&self, other: &Swapchain) -> bool {
        self.image_format == other.image_format && self.depth_format == other.depth_format
    }

    /// Get the render pass compatible with this swapchain's framebuffers.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Get the framebuffer for a swapchain image.
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Get the swapchain image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the swapchain color format.
    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    /// Get the depth attachment format.
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Width-over-height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
            for i in 0..self.depth_images.len() {
                self.device.destroy_image_view(self.depth_image_views[i], None);
                self.device.destroy_image(self.depth_images[i], None);
                self.device.free_memory(self.depth_image_memories[i], None);
            }
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}
