//! GLFW windows without a client API, ready for Vulkan surfaces

use crate::error::{check_vk, BoilerError, BoilerResult};
use ash::vk;
use serde::{Deserialize, Serialize};

/// Size of a window the builder should create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRequest {
    /// Width in screen coordinates
    pub width: u32,
    /// Height in screen coordinates
    pub height: u32,
}

impl WindowRequest {
    /// Request a window of the given size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

/// Initialise GLFW
pub fn init_glfw() -> BoilerResult<glfw::Glfw> {
    glfw::init(glfw::fail_on_errors).map_err(|err| BoilerError::Glfw(format!("initialization failed: {:?}", err)))
}

impl Window {
    /// Initialise GLFW and create a resizable window with no OpenGL context
    pub fn new(title: &str, width: u32, height: u32) -> BoilerResult<Self> {
        Self::with_glfw(init_glfw()?, title, width, height)
    }

    /// Create a resizable window with no OpenGL context using an initialised GLFW
    pub fn with_glfw(mut glfw: glfw::Glfw, title: &str, width: u32, height: u32) -> BoilerResult<Self> {
        if !glfw.vulkan_supported() {
            return Err(BoilerError::Glfw("Vulkan is not supported by GLFW".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or_else(|| BoilerError::Glfw(format!("failed to create a {}x{} window", width, height)))?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self { glfw, window, events })
    }

    /// Wrap a window the application created itself.
    ///
    /// It must have been created with `ClientApiHint::NoApi`.
    pub fn from_parts(
        glfw: glfw::Glfw,
        window: glfw::PWindow,
        events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    ) -> Self {
        Self { glfw, window, events }
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Set or clear the close flag
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window system events
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Events received since the last call
    pub fn flush_events(&self) -> glfw::FlushedMessages<(f64, glfw::WindowEvent)> {
        glfw::flush_messages(&self.events)
    }

    /// Framebuffer size in pixels, zero while minimized
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// The underlying GLFW window
    pub fn handle(&self) -> &glfw::PWindow {
        &self.window
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> BoilerResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| BoilerError::Glfw("no Vulkan instance extensions for window surfaces".to_string()))
    }

    /// Create a surface for this window. The caller owns and destroys it.
    pub fn create_surface(&self, instance: vk::Instance) -> BoilerResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);
        check_vk(result, "CreateSurfaceKHR", "glfwCreateWindowSurface")?;
        Ok(surface)
    }
}
