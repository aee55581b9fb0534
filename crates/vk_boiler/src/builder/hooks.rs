//! Callbacks that run right before the instance or the logical device is created

use super::device::EnabledFeatures;
use super::instance::InstancePlan;
use super::{PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION, SWAPCHAIN_MAINTENANCE_EXTENSION};
use crate::error::BoilerResult;
use crate::foundation::version::ApiVersion;
use ash::extensions::khr::GetPhysicalDeviceProperties2;
use ash::vk;
use std::collections::BTreeSet;

/// Adjusts the instance plan after layers and extensions are resolved
pub trait PreInstanceCreator {
    /// Called once, just before the instance creator
    fn before_instance_creation(&self, plan: &mut InstancePlan) -> BoilerResult<()>;
}

impl<F> PreInstanceCreator for F
where
    F: Fn(&mut InstancePlan) -> BoilerResult<()>,
{
    fn before_instance_creation(&self, plan: &mut InstancePlan) -> BoilerResult<()> {
        self(plan)
    }
}

/// State of the chosen physical device, open to changes until the device is created
pub struct DeviceCreationContext<'a> {
    /// Loaded Vulkan entry points
    pub entry: &'a ash::Entry,
    /// The instance the device belongs to
    pub instance: &'a ash::Instance,
    /// The chosen physical device
    pub physical_device: vk::PhysicalDevice,
    /// Lower of the targeted API version and the device's version
    pub api_version: ApiVersion,
    /// Extensions enabled on the instance
    pub instance_extensions: &'a BTreeSet<String>,
    /// Extensions the device will be created with
    pub device_extensions: &'a mut BTreeSet<String>,
    /// Features the device will be created with
    pub enabled: &'a mut EnabledFeatures,
}

/// Adjusts extensions and features of the chosen device before it is created
pub trait PreDeviceCreator {
    /// Called once per build, after the built-in steps
    fn before_device_creation(&self, context: &mut DeviceCreationContext<'_>) -> BoilerResult<()>;
}

impl<F> PreDeviceCreator for F
where
    F: Fn(&mut DeviceCreationContext<'_>) -> BoilerResult<()>,
{
    fn before_device_creation(&self, context: &mut DeviceCreationContext<'_>) -> BoilerResult<()> {
        self(context)
    }
}

/// Enables `swapchainMaintenance1` when its extension was enabled and the device supports it.
///
/// Registered automatically when the builder creates windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwapchainMaintenance;

impl PreDeviceCreator for SwapchainMaintenance {
    fn before_device_creation(&self, context: &mut DeviceCreationContext<'_>) -> BoilerResult<()> {
        if !context.device_extensions.contains(SWAPCHAIN_MAINTENANCE_EXTENSION) {
            return Ok(());
        }
        let supported = query_swapchain_maintenance(context);
        enable_swapchain_maintenance(context.enabled, supported);
        log::debug!("Swapchain maintenance supported: {}", supported);
        Ok(())
    }
}

fn query_swapchain_maintenance(context: &DeviceCreationContext<'_>) -> bool {
    let mut maintenance = vk::PhysicalDeviceSwapchainMaintenance1FeaturesEXT::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut maintenance);

    if context.api_version >= ApiVersion::V1_1 {
        unsafe {
            context
                .instance
                .get_physical_device_features2(context.physical_device, &mut features2);
        }
    } else if context
        .instance_extensions
        .contains(PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION)
    {
        let loader = GetPhysicalDeviceProperties2::new(context.entry, context.instance);
        unsafe { loader.get_physical_device_features2(context.physical_device, &mut features2) };
    } else {
        return false;
    }
    drop(features2);

    maintenance.swapchain_maintenance1 == vk::TRUE
}

/// Record whether the swapchain maintenance feature should be enabled
pub fn enable_swapchain_maintenance(enabled: &mut EnabledFeatures, supported: bool) {
    enabled.swapchain_maintenance = supported.then(|| {
        vk::PhysicalDeviceSwapchainMaintenance1FeaturesEXT::builder()
            .swapchain_maintenance1(true)
            .build()
    });
}
