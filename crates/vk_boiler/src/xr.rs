//! OpenXR integration.
//!
//! When [`crate::BoilerBuilder::xr`] is used, the OpenXR runtime creates the
//! Vulkan instance and logical device (`XR_KHR_vulkan_enable2`) and dictates
//! which physical device to use.

use crate::builder::device::DeviceCreator;
use crate::builder::instance::{ApplicationInfo, InstanceCreator};
use crate::error::{xr_context, BoilerError, BoilerResult};
use crate::foundation::version::ApiVersion;
use crate::instance::BoilerInstance;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use openxr as xr;
use std::collections::BTreeSet;

/// A Vulkan session with its frame waiter and frame stream
pub type XrSession = (
    xr::Session<xr::Vulkan>,
    xr::FrameWaiter,
    xr::FrameStream<xr::Vulkan>,
);

/// Options for the OpenXR instance
#[derive(Clone)]
pub struct XrBuilder {
    form_factor: xr::FormFactor,
    extensions: xr::ExtensionSet,
}

impl Default for XrBuilder {
    fn default() -> Self {
        Self {
            form_factor: xr::FormFactor::HEAD_MOUNTED_DISPLAY,
            extensions: xr::ExtensionSet::default(),
        }
    }
}

impl XrBuilder {
    /// Head-mounted display, no extra extensions
    pub fn new() -> Self {
        Self::default()
    }

    /// Form factor of the system to ask the runtime for
    pub fn form_factor(mut self, form_factor: xr::FormFactor) -> Self {
        self.form_factor = form_factor;
        self
    }

    /// OpenXR extensions to enable. `XR_KHR_vulkan_enable2` is always added.
    pub fn extensions(mut self, extensions: xr::ExtensionSet) -> Self {
        self.extensions = extensions;
        self
    }

    /// The extensions the instance will be created with
    pub fn enabled_extensions(&self) -> xr::ExtensionSet {
        let mut extensions = self.extensions.clone();
        extensions.khr_vulkan_enable2 = true;
        extensions
    }

    pub(crate) fn build(self, entry: &ash::Entry, info: &ApplicationInfo<'_>) -> BoilerResult<XrBoiler> {
        let xr_entry = unsafe { xr::Entry::load() }
            .map_err(|err| BoilerError::Loading(format!("OpenXR loader: {}", err)))?;

        let available = xr_context(xr_entry.enumerate_extensions(), "xrEnumerateInstanceExtensionProperties")?;
        if !available.khr_vulkan_enable2 {
            return Err(BoilerError::MissingInstanceExtension("XR_KHR_vulkan_enable2".to_string()));
        }

        let instance = xr_context(
            xr_entry.create_instance(
                &xr::ApplicationInfo {
                    application_name: info.application_name,
                    application_version: info.application_version,
                    engine_name: info.engine_name,
                    engine_version: info.engine_version,
                },
                &self.enabled_extensions(),
                &[],
            ),
            "xrCreateInstance",
        )?;
        let system = xr_context(instance.system(self.form_factor), "xrGetSystem")?;

        let requirements = xr_context(
            instance.graphics_requirements::<xr::Vulkan>(system),
            "xrGetVulkanGraphicsRequirements2KHR",
        )?;
        let min = requirements.min_api_version_supported;
        let max = requirements.max_api_version_supported;
        check_runtime_api_version(
            ApiVersion::from_packed(info.api_version),
            ApiVersion::new(u32::from(min.major()), u32::from(min.minor())),
            ApiVersion::new(u32::from(max.major()), u32::from(max.minor())),
        )?;

        if let Ok(properties) = instance.properties() {
            log::info!(
                "OpenXR runtime {} {:?}",
                properties.runtime_name,
                properties.runtime_version
            );
        }

        Ok(XrBoiler {
            instance,
            system,
            get_instance_proc_addr: entry.static_fn().get_instance_proc_addr,
        })
    }
}

/// Fail when the runtime cannot work with the targeted API version.
///
/// Versions above the runtime's maximum are only logged: runtimes tend to
/// report the newest version they were tested with.
pub fn check_runtime_api_version(targeted: ApiVersion, min: ApiVersion, max: ApiVersion) -> BoilerResult<()> {
    if targeted < min {
        return Err(BoilerError::ApiVersionTooLow {
            feature: "the OpenXR runtime",
            required: min.to_string(),
            actual: targeted.to_string(),
        });
    }
    if targeted > max {
        log::warn!(
            "Vulkan {} is newer than the {} the OpenXR runtime was tested with",
            targeted,
            max
        );
    }
    Ok(())
}

/// OpenXR instance and system the Vulkan objects were created for
pub struct XrBoiler {
    instance: xr::Instance,
    system: xr::SystemId,
    get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
}

impl XrBoiler {
    /// The OpenXR instance
    pub fn instance(&self) -> &xr::Instance {
        &self.instance
    }

    /// The system chosen for the requested form factor
    pub fn system(&self) -> xr::SystemId {
        self.system
    }

    /// Physical device the runtime wants the application to use
    pub fn physical_device(&self, vk_instance: &ash::Instance) -> BoilerResult<vk::PhysicalDevice> {
        let raw = xr_context(
            unsafe {
                self.instance
                    .vulkan_graphics_device(self.system, vk_instance.handle().as_raw() as _)
            },
            "xrGetVulkanGraphicsDevice2KHR",
        )?;
        Ok(vk::PhysicalDevice::from_raw(raw as u64))
    }

    /// Create a session on the graphics queue of `boiler`.
    ///
    /// The session must be dropped before `boiler`.
    pub fn create_session(&self, boiler: &BoilerInstance) -> BoilerResult<XrSession> {
        let create_info = xr::vulkan::SessionCreateInfo {
            instance: boiler.instance().handle().as_raw() as _,
            physical_device: boiler.physical_device().as_raw() as _,
            device: boiler.device().handle().as_raw() as _,
            queue_family_index: boiler.queue_families().graphics.index,
            queue_index: 0,
        };
        xr_context(
            unsafe { self.instance.create_session::<xr::Vulkan>(self.system, &create_info) },
            "xrCreateSession",
        )
    }
}

fn runtime_failure(what: &str, err: xr::sys::Result) -> vk::Result {
    log::error!("OpenXR runtime could not create the Vulkan {}: {:?}", what, err);
    vk::Result::ERROR_INITIALIZATION_FAILED
}

impl InstanceCreator for XrBoiler {
    fn create_instance(&self, entry: &ash::Entry, create_info: &vk::InstanceCreateInfo) -> VkResult<ash::Instance> {
        let raw = unsafe {
            self.instance.create_vulkan_instance(
                self.system,
                std::mem::transmute(self.get_instance_proc_addr),
                (create_info as *const vk::InstanceCreateInfo).cast(),
            )
        }
        .map_err(|err| runtime_failure("instance", err))?
        .map_err(vk::Result::from_raw)?;

        Ok(unsafe { ash::Instance::load(entry.static_fn(), vk::Instance::from_raw(raw as u64)) })
    }
}

impl DeviceCreator for XrBoiler {
    fn create_device(
        &self,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        _device_extensions: &BTreeSet<String>,
        create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<ash::Device> {
        let raw = unsafe {
            self.instance.create_vulkan_device(
                self.system,
                std::mem::transmute(self.get_instance_proc_addr),
                physical_device.as_raw() as _,
                (create_info as *const vk::DeviceCreateInfo).cast(),
            )
        }
        .map_err(|err| runtime_failure("device", err))?
        .map_err(vk::Result::from_raw)?;

        Ok(unsafe { ash::Device::load(instance.fp_v1_0(), vk::Device::from_raw(raw as u64)) })
    }
}
