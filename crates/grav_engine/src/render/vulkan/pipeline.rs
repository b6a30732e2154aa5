//! Shader modules and pipeline wrappers
//!
//! SPIR-V binaries are loaded from disk at startup; shader compilation is
//! an offline step (see `scripts/compile_shaders.sh`). The graphics
//! pipeline renders point primitives with dynamic viewport and scissor so
//! it survives swapchain recreation; the compute pipeline advances the
//! particle state.

use ash::{vk, Device};
use std::ffi::CString;
use std::path::Path;

use crate::render::vulkan::context::{VulkanError, VulkanResult};
use crate::render::vulkan::descriptors::DescriptorSetLayout;

/// Compiled SPIR-V shader module.
pub struct ShaderModule {
    device: Device,
    handle: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from raw SPIR-V bytes.
    ///
    /// The byte slice must be 4-byte aligned and a multiple of 4 long, as
    /// required for SPIR-V words.
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(VulkanError::InitializationFailed(
                "SPIR-V byte length is not a multiple of 4".to_string(),
            ));
        }

        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "SPIR-V bytes are not 4-byte aligned".to_string(),
            ));
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let handle = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// Load a shader module from a SPIR-V file on disk.
    pub fn from_file<P: AsRef<Path>>(device: &Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!(
                "failed to read shader {}: {e}",
                path.display()
            ))
        })?;
        Self::from_bytes(device, &bytes)
    }

    /// Get the raw shader module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}

/// Vertex input description supplied by the model that owns the vertex
/// format.
pub struct VertexInput {
    /// Per-vertex buffer bindings.
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    /// Attribute locations within those bindings.
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Graphics pipeline rendering point primitives.
pub struct GraphicsPipeline {
    device: Device,
    handle: vk::Pipeline,
    layout: vk::PipelineLayout,
    // Kept alive for the pipeline's lifetime; some drivers reference them.
    _vertex_shader: ShaderModule,
    _fragment_shader: ShaderModule,
}

impl GraphicsPipeline {
    /// Build a point-list graphics pipeline with dynamic viewport and
    /// scissor.
    pub fn new(
        device: &Device,
        vertex_shader: ShaderModule,
        fragment_shader: ShaderModule,
        render_pass: vk::RenderPass,
        set_layouts: &[&DescriptorSetLayout],
        vertex_input: &VertexInput,
    ) -> VulkanResult<Self> {
        let entry_point = CString::new("main").unwrap();

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(&entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(&entry_point)
                .build(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&vertex_input.bindings)
            .vertex_attribute_descriptions(&vertex_input.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::POINT_LIST)
            .primitive_restart_enable(false);

        // Dynamic, so the same pipeline works across swapchain recreations.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();
        let attachments = [color_blend_attachment];
        let color_blending =
            vk::PipelineColorBlendStateCreateInfo::builder().attachments(&attachments);

        let layout = Self::create_layout(device, set_layouts)?;

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let handle = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| VulkanError::Api(e))?[0]
        };

        Ok(Self {
            device: device.clone(),
            handle,
            layout,
            _vertex_shader: vertex_shader,
            _fragment_shader: fragment_shader,
        })
    }

    fn create_layout(
        device: &Device,
        set_layouts: &[&DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout> {
        let handles: Vec<vk::DescriptorSetLayout> =
            set_layouts.iter().map(|l| l.handle()).collect();
        let create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&handles);
        unsafe {
            device
                .create_pipeline_layout(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Bind the pipeline to a command buffer.
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.handle,
            );
        }
    }

    /// Get the pipeline layout for descriptor binding.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Compute pipeline wrapper.
pub struct ComputePipeline {
    device: Device,
    handle: vk::Pipeline,
    layout: vk::PipelineLayout,
    _shader: ShaderModule,
}

impl ComputePipeline {
    /// Build a compute pipeline from a single compute shader.
    pub fn new(
        device: &Device,
        shader: ShaderModule,
        set_layouts: &[&DescriptorSetLayout],
    ) -> VulkanResult<Self> {
        let entry_point = CString::new("main").unwrap();

        let stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.handle())
            .name(&entry_point)
            .build();

        let handles: Vec<vk::DescriptorSetLayout> =
            set_layouts.iter().map(|l| l.handle()).collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&handles);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(layout)
            .build();

        let handle = unsafe {
            device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| VulkanError::Api(e))?[0]
        };

        Ok(Self {
            device: device.clone(),
            handle,
            layout,
            _shader: shader,
        })
    }

    /// Bind the pipeline to a command buffer.
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.handle,
            );
        }
    }

    /// Get the pipeline layout for descriptor binding.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
