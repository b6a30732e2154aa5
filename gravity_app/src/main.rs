//! Particle gravity simulation
//!
//! Fills a window with a GPU-resident particle cloud: a compute shader
//! integrates gravity each frame, then the same buffer is drawn as point
//! primitives. Configuration comes from `gravity.toml` next to the binary,
//! with defaults for every field.

use ash::vk;
use thiserror::Error;

use grav_engine::core::config::SimulationConfig;
use grav_engine::foundation::{logging, time::FrameTimer};
use grav_engine::render::frame::{FrameContext, ParticleUbo};
use grav_engine::render::vulkan::swapchain::MAX_FRAMES_IN_FLIGHT;
use grav_engine::render::vulkan::{
    Buffer, DescriptorBinding, DescriptorPool, DescriptorSetLayout, DescriptorWriter, Renderer,
    VulkanContext, Window,
};
use grav_engine::sim::{initial_particles, ParticleModel, ParticleSystem};

/// Top-level application error.
#[derive(Error, Debug)]
enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] grav_engine::core::config::ConfigError),

    #[error("window error: {0}")]
    Window(#[from] grav_engine::render::vulkan::WindowError),

    #[error("vulkan error: {0}")]
    Vulkan(#[from] grav_engine::render::vulkan::VulkanError),
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), SimError> {
    let config = SimulationConfig::load_or_default("gravity.toml")?;
    log::info!(
        "Starting simulation: {} particles, {:?} distribution, seed {}",
        config.particle_count,
        config.distribution,
        config.seed
    );

    let mut window = Window::new(
        &config.window.title,
        config.window.width,
        config.window.height,
    )?;
    let context = VulkanContext::new(&mut window, &config.window.title)?;
    let mut renderer = Renderer::new(&context, &window)?;
    let device = context.raw_device();

    // One uniform buffer per frame in flight, persistently mapped. The
    // memory is host-visible but not necessarily coherent, so every write
    // is followed by an explicit flush.
    let ubo_alignment = context
        .physical_device
        .min_uniform_buffer_offset_alignment();
    let mut ubo_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        let mut buffer = Buffer::new(
            &context,
            std::mem::size_of::<ParticleUbo>() as vk::DeviceSize,
            1,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            ubo_alignment,
        )?;
        buffer.map()?;
        ubo_buffers.push(buffer);
    }

    let set_layout = DescriptorSetLayout::new(
        &device,
        &[
            DescriptorBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
            },
            DescriptorBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
            },
        ],
    )?;

    let pool = DescriptorPool::new(
        &device,
        MAX_FRAMES_IN_FLIGHT as u32,
        &[
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: MAX_FRAMES_IN_FLIGHT as u32,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: MAX_FRAMES_IN_FLIGHT as u32,
            },
        ],
    )?;

    let particles = initial_particles(config.particle_count, config.distribution, config.seed);
    let model = ParticleModel::new(&context, &particles)?;

    // Every slot shares the particle storage buffer; the uniform buffer is
    // per slot.
    let mut descriptor_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for ubo_buffer in &ubo_buffers {
        let set = DescriptorWriter::new(&set_layout, &pool)
            .write_buffer(0, model.storage_descriptor_info())
            .write_buffer(1, ubo_buffer.descriptor_info())
            .build(&device)?;
        descriptor_sets.push(set);
    }

    let particle_system =
        ParticleSystem::new(&context, &config, renderer.render_pass(), &set_layout)?;

    let mut timer = FrameTimer::new();
    while !window.should_close() {
        window.poll_events();
        let frame_time = timer.tick();

        if let Some(command_buffer) = renderer.begin_frame(&context, &mut window)? {
            let frame_index = renderer.frame_index();

            let ubo = ParticleUbo::new(frame_time, config.particle_count);
            ubo_buffers[frame_index].write_to_index(&ubo, 0);
            ubo_buffers[frame_index].flush()?;

            let frame = FrameContext {
                frame_index,
                command_buffer,
                descriptor_set: descriptor_sets[frame_index],
            };

            particle_system.compute_particles(&frame, &model);

            renderer.begin_swapchain_render_pass(command_buffer);
            particle_system.render_particles(&frame, &model);
            renderer.end_swapchain_render_pass(command_buffer);

            renderer.end_frame(&context, &mut window)?;
        }
    }

    context.wait_idle()?;
    Ok(())
}
