//! # Grav Engine
//!
//! A small Vulkan engine built for one job: simulating and rendering a large
//! particle cloud whose state lives entirely on the GPU. The host records one
//! compute dispatch (gravity integration over the particle storage buffer)
//! and one point-list render pass per frame; semaphores and fences keep the
//! two in order across the frames in flight.
//!
//! ## Modules
//!
//! - [`foundation`] — logging setup and frame timing.
//! - [`core`] — typed configuration with startup validation.
//! - [`render`] — the Vulkan backend: window, context, swapchain, renderer,
//!   buffers, descriptors and pipelines.
//! - [`sim`] — the particle model and the compute/graphics particle system.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use grav_engine::core::config::SimulationConfig;
//! use grav_engine::render::vulkan::{Renderer, VulkanContext, Window};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SimulationConfig::load_or_default("gravity.toml")?;
//! let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//! let context = VulkanContext::new(&mut window, &config.window.title)?;
//! let mut renderer = Renderer::new(&context, &mut window)?;
//! # let _ = renderer.aspect_ratio();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod foundation;
pub mod render;
pub mod sim;
