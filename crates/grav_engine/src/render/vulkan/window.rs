//! GLFW-based window management for Vulkan rendering
//!
//! Window lifecycle, event processing and Vulkan surface creation. The
//! framebuffer-resize flag is maintained by draining the typed GLFW event
//! receiver during [`Window::poll_events`], so no raw user-pointer callback
//! is involved; the renderer reads and resets the flag around swapchain
//! recreation.

use ash::vk;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW library initialization failed.
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window itself could not be created.
    #[error("window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported error.
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    /// Create a window configured for Vulkan rendering (no client API).
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    /// Whether the user has requested the window to close.
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Process pending window events and update the resize flag.
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.drain_events();
    }

    /// Block until at least one event arrives, then process it. Used while
    /// the framebuffer extent is zero (minimized window) to avoid spinning
    /// the host CPU.
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.drain_events();
    }

    fn drain_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.framebuffer_resized = true;
            }
        }
    }

    /// Current framebuffer extent in pixels.
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        vk::Extent2D {
            width: width as u32,
            height: height as u32,
        }
    }

    /// Whether the framebuffer was resized since the flag was last reset.
    pub fn was_resized(&self) -> bool {
        self.framebuffer_resized
    }

    /// Reset the resize flag after handling a recreation.
    pub fn reset_resized_flag(&mut self) {
        self.framebuffer_resized = false;
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Glfw("failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface using GLFW's built-in functionality
    pub fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Glfw(format!(
                "failed to create Vulkan surface: {result:?}"
            )))
        }
    }
}
