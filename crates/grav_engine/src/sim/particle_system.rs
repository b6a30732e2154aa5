//! Gravity compute and point rendering
//!
//! Each frame runs two GPU passes over the shared particle buffer: a
//! compute dispatch that integrates gravity, then a point-list draw. The
//! dispatch records outside the render pass, bracketed by two buffer
//! memory barriers: one ordering the previous frame's vertex-attribute
//! read before this frame's compute write (frames in flight share the
//! buffer, so without it the dispatch could overlap a still-executing
//! draw), and one making the compute writes visible to this frame's
//! vertex input stage.

use ash::{vk, Device};

use crate::core::config::SimulationConfig;
use crate::render::frame::FrameContext;
use crate::render::vulkan::context::{VulkanContext, VulkanResult};
use crate::render::vulkan::descriptors::DescriptorSetLayout;
use crate::render::vulkan::pipeline::{ComputePipeline, GraphicsPipeline, ShaderModule};
use crate::sim::particles::{Particle, ParticleModel};

/// Orders an earlier draw's vertex-attribute read before a compute write
/// to the same buffer. Recorded with stages VERTEX_INPUT → COMPUTE_SHADER.
fn draw_before_dispatch_barrier(
    buffer: vk::Buffer,
    size: vk::DeviceSize,
) -> vk::BufferMemoryBarrier {
    vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ)
        .dst_access_mask(vk::AccessFlags::SHADER_WRITE)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(size)
        .build()
}

/// Makes compute writes visible to a later draw's vertex-attribute read.
/// Recorded with stages COMPUTE_SHADER → VERTEX_INPUT.
fn dispatch_before_draw_barrier(
    buffer: vk::Buffer,
    size: vk::DeviceSize,
) -> vk::BufferMemoryBarrier {
    vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::SHADER_WRITE)
        .dst_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(size)
        .build()
}

/// Owns the graphics and compute pipelines for the particle field.
pub struct ParticleSystem {
    device: Device,
    graphics_pipeline: GraphicsPipeline,
    compute_pipeline: ComputePipeline,
    workgroup_count: u32,
}

impl ParticleSystem {
    /// Build both pipelines from the configured SPIR-V binaries.
    ///
    /// The graphics pipeline reads only vertex attributes and takes no
    /// descriptor sets; `set_layout` describes the compute shader's storage
    /// and uniform bindings.
    pub fn new(
        context: &VulkanContext,
        config: &SimulationConfig,
        render_pass: vk::RenderPass,
        set_layout: &DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();

        let vertex_shader = ShaderModule::from_file(&device, &config.shaders.vertex)?;
        let fragment_shader = ShaderModule::from_file(&device, &config.shaders.fragment)?;
        let graphics_pipeline = GraphicsPipeline::new(
            &device,
            vertex_shader,
            fragment_shader,
            render_pass,
            &[],
            &Particle::vertex_input(),
        )?;

        let compute_shader = ShaderModule::from_file(&device, &config.shaders.compute)?;
        let compute_pipeline = ComputePipeline::new(&device, compute_shader, &[set_layout])?;

        Ok(Self {
            device,
            graphics_pipeline,
            compute_pipeline,
            workgroup_count: config.workgroup_count(),
        })
    }

    /// Record the gravity integration dispatch for this frame.
    ///
    /// Must be recorded before the swapchain render pass begins. Opens with
    /// a barrier against the previous frame's draw still reading the
    /// buffer, and ends with a barrier ordering the compute writes before
    /// this frame's vertex attribute reads.
    pub fn compute_particles(&self, frame: &FrameContext, model: &ParticleModel) {
        let command_buffer = frame.command_buffer;

        unsafe {
            // The previous frame in flight may still be drawing from this
            // buffer; its read must finish before the dispatch writes.
            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[draw_before_dispatch_barrier(
                    model.buffer_handle(),
                    model.buffer_size(),
                )],
                &[],
            );
        }

        self.compute_pipeline.bind(command_buffer);

        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.compute_pipeline.layout(),
                0,
                &[frame.descriptor_set],
                &[],
            );

            self.device
                .cmd_dispatch(command_buffer, self.workgroup_count, 1, 1);

            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[dispatch_before_draw_barrier(
                    model.buffer_handle(),
                    model.buffer_size(),
                )],
                &[],
            );
        }
    }

    /// Record the point draw for this frame, inside the render pass.
    pub fn render_particles(&self, frame: &FrameContext, model: &ParticleModel) {
        self.graphics_pipeline.bind(frame.command_buffer);
        model.bind(frame.command_buffer);
        model.draw(frame.command_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_waits_for_previous_frames_draw() {
        let barrier = draw_before_dispatch_barrier(vk::Buffer::null(), 1024);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::SHADER_WRITE);
    }

    #[test]
    fn draw_waits_for_compute_writes() {
        let barrier = dispatch_before_draw_barrier(vk::Buffer::null(), 1024);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
    }

    #[test]
    fn barriers_cover_the_whole_buffer() {
        for barrier in [
            draw_before_dispatch_barrier(vk::Buffer::null(), 4096),
            dispatch_before_draw_barrier(vk::Buffer::null(), 4096),
        ] {
            assert_eq!(barrier.offset, 0);
            assert_eq!(barrier.size, 4096);
            assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
            assert_eq!(barrier.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        }
    }
}
