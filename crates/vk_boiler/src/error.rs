//! Error types for instance and device bootstrapping

use crate::config::ConfigError;
use ash::vk;
use thiserror::Error;

/// Errors raised while building or using a [`crate::BoilerInstance`]
#[derive(Error, Debug)]
pub enum BoilerError {
    /// A Vulkan call returned a failure code
    #[error("vk{function} ({context}) returned {result:?}")]
    Vulkan {
        /// Vulkan function name without the `vk` prefix
        function: &'static str,
        /// Which part of the library made the call
        context: &'static str,
        /// The result code
        result: vk::Result,
    },

    /// An OpenXR call returned a failure code
    #[error("OpenXR {context} returned {result:?}")]
    Xr {
        /// The OpenXR function that failed
        context: &'static str,
        /// The result code
        result: openxr::sys::Result,
    },

    /// The Vulkan loader could not be loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// GLFW could not be initialised or failed to create a window
    #[error("GLFW failure: {0}")]
    Glfw(String),

    /// A required instance layer is not available
    #[error("Required Vulkan layer {0} is not supported")]
    MissingLayer(String),

    /// A required instance extension is not available
    #[error("Required Vulkan instance extension {0} is not supported")]
    MissingInstanceExtension(String),

    /// A required device extension is not available on the chosen device
    #[error("Required Vulkan device extension {0} is not supported")]
    MissingDeviceExtension(String),

    /// No physical device satisfied every requirement
    #[error("No physical device satisfies all requirements ({candidates} candidates rejected)")]
    NoPhysicalDevice {
        /// How many devices were enumerated
        candidates: usize,
    },

    /// The queue family mapper found no family for a mandatory role
    #[error("No queue family supports {0} operations")]
    MissingQueueFamily(&'static str),

    /// An option needs a newer API version than the builder targets
    #[error("Vulkan API version {actual} is too low for {feature}, which needs {required}")]
    ApiVersionTooLow {
        /// The option that was requested
        feature: &'static str,
        /// Minimum version, formatted as major.minor
        required: String,
        /// Targeted version, formatted as major.minor
        actual: String,
    },

    /// API versions must have zero patch and variant
    #[error("Invalid Vulkan API version {0:#x}: patch and variant must be 0")]
    InvalidApiVersion(u32),

    /// More than one custom creator of the same kind was set
    #[error("Attempted to set multiple {0} creators")]
    DuplicateCreator(&'static str),

    /// A name passed to Vulkan contains an interior NUL byte
    #[error("Name {0:?} contains an interior NUL byte")]
    InvalidName(String),

    /// There is no window at the given index
    #[error("This instance doesn't have a window at index {0}")]
    NoWindow(usize),

    /// Validation errors were reported while they were forbidden
    #[error("Vulkan validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for boilerplate operations
pub type BoilerResult<T> = Result<T, BoilerError>;

/// Map a raw Vulkan result to [`BoilerError::Vulkan`] unless it is `SUCCESS`
pub fn check_vk(result: vk::Result, function: &'static str, context: &'static str) -> BoilerResult<()> {
    if result == vk::Result::SUCCESS {
        Ok(())
    } else {
        Err(BoilerError::Vulkan {
            function,
            context,
            result,
        })
    }
}

/// Extension for attaching call-site information to ash results
pub(crate) trait VkResultExt<T> {
    fn vk_context(self, function: &'static str, context: &'static str) -> BoilerResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    fn vk_context(self, function: &'static str, context: &'static str) -> BoilerResult<T> {
        self.map_err(|result| BoilerError::Vulkan {
            function,
            context,
            result,
        })
    }
}

/// Attach the failing function to an OpenXR result
pub(crate) fn xr_context<T>(result: openxr::Result<T>, context: &'static str) -> BoilerResult<T> {
    result.map_err(|result| BoilerError::Xr { context, result })
}
