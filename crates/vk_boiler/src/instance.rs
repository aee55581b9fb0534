//! The bundle of Vulkan objects produced by [`crate::BoilerBuilder`]

use crate::builder::queue::QueueFamilyMapping;
use crate::debug::DebugMessenger;
use crate::error::{BoilerError, BoilerResult};
use crate::foundation::version::ApiVersion;
use crate::window::Window;
use crate::xr::XrBoiler;
use ash::extensions::khr::Surface;
use ash::vk;
use std::collections::BTreeSet;
use std::mem::ManuallyDrop;

/// Queues fetched from one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFamily {
    /// Family index
    pub index: u32,
    /// Queues created in this family
    pub queues: Vec<vk::Queue>,
}

impl QueueFamily {
    fn fetch(device: &ash::Device, index: u32, count: usize) -> Self {
        let queues = (0..count as u32)
            .map(|queue_index| unsafe { device.get_device_queue(index, queue_index) })
            .collect();
        Self { index, queues }
    }

    /// First queue of the family
    pub fn first(&self) -> Option<vk::Queue> {
        self.queues.first().copied()
    }
}

/// Queues for every role of the queue family mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics queues
    pub graphics: QueueFamily,
    /// Compute queues, possibly the graphics family
    pub compute: QueueFamily,
    /// Transfer queues, possibly the graphics family
    pub transfer: QueueFamily,
    /// Video encode queues, when the extension was enabled and a family supports it
    pub video_encode: Option<QueueFamily>,
    /// Video decode queues, when the extension was enabled and a family supports it
    pub video_decode: Option<QueueFamily>,
    /// Present queue, fetched from the present family when there are windows
    pub present: Option<QueueFamily>,
}

impl QueueFamilies {
    pub(crate) fn fetch(device: &ash::Device, mapping: &QueueFamilyMapping) -> Self {
        let fetch = |allocation: &crate::builder::queue::QueueFamilyAllocation| {
            QueueFamily::fetch(device, allocation.index, allocation.queue_count())
        };
        Self {
            graphics: fetch(&mapping.graphics),
            compute: fetch(&mapping.compute),
            transfer: fetch(&mapping.transfer),
            video_encode: mapping.video_encode.as_ref().map(fetch),
            video_decode: mapping.video_decode.as_ref().map(fetch),
            present: mapping.present_family.map(|index| QueueFamily::fetch(device, index, 1)),
        }
    }
}

/// A window together with the surface created for it
pub struct WindowSurface {
    /// The GLFW window
    pub window: Window,
    /// Its surface, destroyed with the device objects
    pub surface: vk::SurfaceKHR,
}

/// Everything [`crate::BoilerBuilder::build`] creates.
///
/// Dropping it waits for the device to become idle, then destroys the
/// allocator, device, surfaces, debug messenger and instance in that order.
/// Windows are closed and the OpenXR instance released afterwards.
pub struct BoilerInstance {
    pub(crate) allocator: ManuallyDrop<vk_mem::Allocator>,
    pub(crate) device: ash::Device,
    pub(crate) queue_families: QueueFamilies,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) physical_device_name: String,
    pub(crate) surface_loader: Option<Surface>,
    pub(crate) debug_messenger: Option<DebugMessenger>,
    pub(crate) instance: ash::Instance,
    pub(crate) entry: ash::Entry,
    pub(crate) windows: Vec<WindowSurface>,
    pub(crate) api_version: ApiVersion,
    pub(crate) instance_extensions: BTreeSet<String>,
    pub(crate) device_extensions: BTreeSet<String>,
    pub(crate) has_swapchain_maintenance: bool,
    pub(crate) default_timeout: u64,
    pub(crate) device_destroyed: bool,
    pub(crate) xr: Option<XrBoiler>,
}

impl BoilerInstance {
    /// Loaded Vulkan entry points
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The Vulkan instance
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The chosen physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Name the driver reports for the chosen physical device
    pub fn physical_device_name(&self) -> &str {
        &self.physical_device_name
    }

    /// The logical device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Queues created with the device, by role
    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    /// VMA allocator for the logical device
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    /// API version the instance was created with
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Extensions the instance was created with
    pub fn instance_extensions(&self) -> &BTreeSet<String> {
        &self.instance_extensions
    }

    /// Extensions the device was created with
    pub fn device_extensions(&self) -> &BTreeSet<String> {
        &self.device_extensions
    }

    /// Whether `swapchainMaintenance1` of `VK_EXT_swapchain_maintenance1` is enabled
    pub fn has_swapchain_maintenance(&self) -> bool {
        self.has_swapchain_maintenance
    }

    /// OpenXR instance and system, when the builder used an OpenXR runtime
    pub fn xr(&self) -> Option<&XrBoiler> {
        self.xr.as_ref()
    }

    /// Timeout in nanoseconds for fence and semaphore waits
    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    /// Surface extension loader, present when windows were requested
    pub fn surface_loader(&self) -> Option<&Surface> {
        self.surface_loader.as_ref()
    }

    /// Number of windows the builder created
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Window at `index`, in the order the builder requested them
    pub fn glfw_window(&self, index: usize) -> BoilerResult<&Window> {
        self.windows
            .get(index)
            .map(|entry| &entry.window)
            .ok_or(BoilerError::NoWindow(index))
    }

    /// Mutable window at `index`, for polling events
    pub fn glfw_window_mut(&mut self, index: usize) -> BoilerResult<&mut Window> {
        self.windows
            .get_mut(index)
            .map(|entry| &mut entry.window)
            .ok_or(BoilerError::NoWindow(index))
    }

    /// Surface of the window at `index`
    pub fn window_surface(&self, index: usize) -> BoilerResult<vk::SurfaceKHR> {
        self.windows
            .get(index)
            .map(|entry| entry.surface)
            .ok_or(BoilerError::NoWindow(index))
    }

    /// Drain the validation errors reported since the last call.
    ///
    /// Always empty unless validation errors are forbidden.
    pub fn take_validation_errors(&self) -> Vec<String> {
        self.debug_messenger
            .as_ref()
            .map(DebugMessenger::take_errors)
            .unwrap_or_default()
    }

    /// Fail when validation errors were reported while they are forbidden
    pub fn check_validation_errors(&self) -> BoilerResult<()> {
        let errors = self.take_validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BoilerError::Validation(errors))
        }
    }

    /// Whether validation errors are collected instead of only logged
    pub fn forbids_validation_errors(&self) -> bool {
        self.debug_messenger
            .as_ref()
            .map_or(false, DebugMessenger::collects_errors)
    }

    /// Destroy everything the builder created.
    ///
    /// Equivalent to dropping the instance, but reports validation errors
    /// raised during destruction when they are forbidden.
    pub fn destroy_initial_objects(mut self) -> BoilerResult<()> {
        unsafe { self.destroy_device_objects() };
        let errors = self.take_validation_errors();
        drop(self);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BoilerError::Validation(errors))
        }
    }

    unsafe fn destroy_device_objects(&mut self) {
        if self.device_destroyed {
            return;
        }
        self.device_destroyed = true;

        if let Err(err) = self.device.device_wait_idle() {
            log::warn!("vkDeviceWaitIdle failed during teardown: {:?}", err);
        }
        ManuallyDrop::drop(&mut self.allocator);
        self.device.destroy_device(None);

        if let Some(loader) = &self.surface_loader {
            for entry in &mut self.windows {
                loader.destroy_surface(entry.surface, None);
                entry.surface = vk::SurfaceKHR::null();
            }
        }
    }
}

impl Drop for BoilerInstance {
    fn drop(&mut self) {
        unsafe {
            self.destroy_device_objects();
            if let Some(mut messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Destroyed Vulkan objects of {}", self.physical_device_name);
    }
}
