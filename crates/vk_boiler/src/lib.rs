//! # VkBoiler
//!
//! Vulkan boilerplate for applications built on `ash`.
//!
//! ## Features
//!
//! - **Instance and device bootstrapping**: layers, extensions, validation,
//!   feature negotiation and queue family mapping through [`BoilerBuilder`]
//! - **Windows**: GLFW windows with Vulkan surfaces
//! - **XR**: letting an OpenXR runtime create the instance and device
//! - **Memory**: a VMA allocator ready to use
//! - **Culling**: a view frustum culler for axis-aligned boxes
//! - **Native packaging**: resolving the native library classifier for a host
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_boiler::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     vk_boiler::foundation::logging::init();
//!     let classifier = vk_boiler::natives::host_classifier()?;
//!     log::info!("Native classifier: {}", classifier);
//!
//!     let boiler = BoilerBuilder::new(ash::vk::API_VERSION_1_2, "Quick Start", make_version(1, 0, 0))
//!         .default_validation()
//!         .build()?;
//!     boiler.destroy_initial_objects()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod builder;
pub mod config;
pub mod cull;
mod debug;
pub mod error;
pub mod foundation;
pub mod instance;
pub mod natives;
pub mod publish;
pub mod window;
pub mod xr;

/// Engine name reported to the driver unless the builder overrides it
pub const DEFAULT_ENGINE_NAME: &str = "VkBoiler";

pub use builder::BoilerBuilder;
pub use error::{BoilerError, BoilerResult};
pub use instance::BoilerInstance;

/// Common imports for applications
pub mod prelude {
    pub use crate::builder::device::{DeviceCandidate, PhysicalDeviceSelector, SimpleDeviceSelector};
    pub use crate::builder::hooks::{DeviceCreationContext, PreDeviceCreator, PreInstanceCreator};
    pub use crate::builder::instance::ValidationFeatures;
    pub use crate::builder::queue::{MinimalQueueFamilyMapper, QueueFamilyMapper};
    pub use crate::builder::BoilerBuilder;
    pub use crate::config::{BoilerConfig, Config};
    pub use crate::cull::{Aabb, FrustumCuller};
    pub use crate::error::{BoilerError, BoilerResult};
    pub use crate::foundation::math::Vec3;
    pub use crate::foundation::version::{make_version, ApiVersion};
    pub use crate::instance::{BoilerInstance, QueueFamilies};
    pub use crate::natives::{NativeClassifier, NativesError};
    pub use crate::window::{Window, WindowRequest};
    pub use crate::xr::{XrBoiler, XrBuilder};
}
