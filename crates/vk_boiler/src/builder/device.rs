//! Physical device selection, feature negotiation and logical device creation

use super::names::vk_name;
use crate::foundation::version::ApiVersion;
use ash::prelude::VkResult;
use ash::vk;
use std::collections::BTreeSet;
use std::fmt;
use std::ptr;

/// Summary of a physical device that passed every requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// Device handle
    pub handle: vk::PhysicalDevice,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Driver-reported device name
    pub name: String,
    /// Packed API version the device supports
    pub api_version: u32,
}

impl DeviceCandidate {
    /// Read the candidate summary from device properties
    pub fn from_properties(handle: vk::PhysicalDevice, properties: &vk::PhysicalDeviceProperties) -> Self {
        Self {
            handle,
            device_type: properties.device_type,
            name: vk_name(&properties.device_name),
            api_version: properties.api_version,
        }
    }
}

/// Chooses one device among the acceptable candidates
pub trait PhysicalDeviceSelector {
    /// Index of the chosen candidate, `None` to choose nothing
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize>;
}

impl<F> PhysicalDeviceSelector for F
where
    F: Fn(&[DeviceCandidate]) -> Option<usize>,
{
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        self(candidates)
    }
}

/// Picks the first candidate of the most preferred device type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleDeviceSelector {
    preferred_types: Vec<vk::PhysicalDeviceType>,
}

impl SimpleDeviceSelector {
    /// Prefer device types in the given order, falling back to the first candidate
    pub fn new(preferred_types: impl IntoIterator<Item = vk::PhysicalDeviceType>) -> Self {
        Self {
            preferred_types: preferred_types.into_iter().collect(),
        }
    }
}

impl Default for SimpleDeviceSelector {
    fn default() -> Self {
        Self::new([vk::PhysicalDeviceType::DISCRETE_GPU, vk::PhysicalDeviceType::INTEGRATED_GPU])
    }
}

impl PhysicalDeviceSelector for SimpleDeviceSelector {
    fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        self.preferred_types
            .iter()
            .find_map(|preferred| candidates.iter().position(|candidate| candidate.device_type == *preferred))
            .or_else(|| (!candidates.is_empty()).then_some(0))
    }
}

/// Creates the logical device from a fully populated create info
pub trait DeviceCreator {
    /// Create the device
    fn create_device(
        &self,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device_extensions: &BTreeSet<String>,
        create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<ash::Device>;
}

impl<F> DeviceCreator for F
where
    F: Fn(&ash::Instance, vk::PhysicalDevice, &BTreeSet<String>, &vk::DeviceCreateInfo) -> VkResult<ash::Device>,
{
    fn create_device(
        &self,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device_extensions: &BTreeSet<String>,
        create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<ash::Device> {
        self(instance, physical_device, device_extensions, create_info)
    }
}

/// Calls `vkCreateDevice` directly
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDeviceCreator;

impl DeviceCreator for DefaultDeviceCreator {
    fn create_device(
        &self,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        _device_extensions: &BTreeSet<String>,
        create_info: &vk::DeviceCreateInfo,
    ) -> VkResult<ash::Device> {
        unsafe { instance.create_device(physical_device, create_info, None) }
    }
}

/// Feature structs for every core version.
///
/// `p_next` pointers are always null outside of a query or device creation.
#[derive(Clone, Copy, Default)]
pub struct DeviceFeatures {
    /// Vulkan 1.0 features
    pub v10: vk::PhysicalDeviceFeatures,
    /// Vulkan 1.1 features
    pub v11: vk::PhysicalDeviceVulkan11Features,
    /// Vulkan 1.2 features
    pub v12: vk::PhysicalDeviceVulkan12Features,
    /// Vulkan 1.3 features
    pub v13: vk::PhysicalDeviceVulkan13Features,
}

impl fmt::Debug for DeviceFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFeatures").field("v10", &self.v10).finish_non_exhaustive()
    }
}

impl DeviceFeatures {
    /// Query the supported features, limited to structs `api_version` knows about.
    ///
    /// `VkPhysicalDeviceVulkan11Features` only exists from 1.2 on, so a 1.1
    /// device reports nothing beyond the 1.0 features.
    pub fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice, api_version: ApiVersion) -> Self {
        let mut features = Self::default();
        if api_version < ApiVersion::V1_2 {
            features.v10 = unsafe { instance.get_physical_device_features(physical_device) };
            return features;
        }

        let mut features2 = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut features.v11)
            .push_next(&mut features.v12);
        if api_version >= ApiVersion::V1_3 {
            features2 = features2.push_next(&mut features.v13);
        }

        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let v10 = features2.features;
        drop(features2);

        features.v10 = v10;
        features.clear_chain();
        features
    }

    fn clear_chain(&mut self) {
        self.v11.p_next = ptr::null_mut();
        self.v12.p_next = ptr::null_mut();
        self.v13.p_next = ptr::null_mut();
    }
}

/// Features the logical device is created with
#[derive(Clone, Copy, Default)]
pub struct EnabledFeatures {
    /// Enabled core features
    pub features: DeviceFeatures,
    /// Chain the 1.1 struct into the create info
    pub chain_11: bool,
    /// Chain the 1.2 struct into the create info
    pub chain_12: bool,
    /// Chain the 1.3 struct into the create info
    pub chain_13: bool,
    /// `VK_EXT_swapchain_maintenance1` features, chained when present
    pub swapchain_maintenance: Option<vk::PhysicalDeviceSwapchainMaintenance1FeaturesEXT>,
}

impl EnabledFeatures {
    /// Whether `swapchainMaintenance1` will be enabled
    pub fn has_swapchain_maintenance(&self) -> bool {
        self.swapchain_maintenance
            .map_or(false, |features| features.swapchain_maintenance1 == vk::TRUE)
    }
}

impl fmt::Debug for EnabledFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnabledFeatures")
            .field("features", &self.features)
            .field("chain", &[self.chain_11, self.chain_12, self.chain_13])
            .field("swapchain_maintenance", &self.has_swapchain_maintenance())
            .finish()
    }
}

/// Modifies the features to enable, given the supported ones
pub type FeaturePicker<T> = Box<dyn Fn(&T, &mut T)>;
/// Decides whether the supported features are sufficient
pub type FeatureRequirement<T> = Box<dyn Fn(&T) -> bool>;
/// Arbitrary extra check on a physical device
pub type DeviceRequirement = Box<dyn Fn(&ash::Instance, vk::PhysicalDevice) -> bool>;

/// Feature pickers and requirements for all core versions
#[derive(Default)]
pub struct FeatureRules {
    pub(crate) pickers_10: Vec<FeaturePicker<vk::PhysicalDeviceFeatures>>,
    pub(crate) pickers_11: Vec<FeaturePicker<vk::PhysicalDeviceVulkan11Features>>,
    pub(crate) pickers_12: Vec<FeaturePicker<vk::PhysicalDeviceVulkan12Features>>,
    pub(crate) pickers_13: Vec<FeaturePicker<vk::PhysicalDeviceVulkan13Features>>,
    pub(crate) required_10: Vec<FeatureRequirement<vk::PhysicalDeviceFeatures>>,
    pub(crate) required_11: Vec<FeatureRequirement<vk::PhysicalDeviceVulkan11Features>>,
    pub(crate) required_12: Vec<FeatureRequirement<vk::PhysicalDeviceVulkan12Features>>,
    pub(crate) required_13: Vec<FeatureRequirement<vk::PhysicalDeviceVulkan13Features>>,
}

impl FeatureRules {
    /// Whether every requirement accepts the supported features
    pub fn supports(&self, supported: &DeviceFeatures) -> bool {
        self.required_10.iter().all(|check| check(&supported.v10))
            && self.required_11.iter().all(|check| check(&supported.v11))
            && self.required_12.iter().all(|check| check(&supported.v12))
            && self.required_13.iter().all(|check| check(&supported.v13))
    }

    /// Run every picker and collect the features to enable.
    ///
    /// Only the 1.1, 1.2 and 1.3 structs that have pickers are marked for the
    /// device create info chain.
    pub fn pick(&self, supported: &DeviceFeatures) -> EnabledFeatures {
        let mut features = DeviceFeatures::default();
        for picker in &self.pickers_10 {
            picker(&supported.v10, &mut features.v10);
        }
        for picker in &self.pickers_11 {
            picker(&supported.v11, &mut features.v11);
        }
        for picker in &self.pickers_12 {
            picker(&supported.v12, &mut features.v12);
        }
        for picker in &self.pickers_13 {
            picker(&supported.v13, &mut features.v13);
        }
        features.clear_chain();

        EnabledFeatures {
            features,
            chain_11: !self.pickers_11.is_empty(),
            chain_12: !self.pickers_12.is_empty(),
            chain_13: !self.pickers_13.is_empty(),
            swapchain_maintenance: None,
        }
    }

    /// Lowest API version the registered 1.1+ rules need, and what needs it
    pub fn minimum_api_version(&self) -> Option<(ApiVersion, &'static str)> {
        if !self.pickers_13.is_empty() || !self.required_13.is_empty() {
            Some((ApiVersion::V1_3, "Vulkan 1.3 features"))
        } else if !self.pickers_12.is_empty() || !self.required_12.is_empty() {
            Some((ApiVersion::V1_2, "Vulkan 1.2 features"))
        } else if !self.pickers_11.is_empty() || !self.required_11.is_empty() {
            // The combined 1.1 feature struct was introduced with 1.2
            Some((ApiVersion::V1_2, "Vulkan 1.1 features"))
        } else {
            None
        }
    }
}

/// Why a physical device was not acceptable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRejection {
    /// Required device extensions are missing
    MissingExtensions(Vec<String>),
    /// A required feature is not supported
    MissingFeatures,
    /// No queue family can present to every window
    NoPresentSupport,
    /// An extra device requirement returned false
    ExtraRequirement,
    /// Queue families cannot serve every mandatory role
    QueueFamilies(String),
    /// The OpenXR runtime requires a different physical device
    NotXrDevice,
}

impl fmt::Display for DeviceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExtensions(names) => write!(f, "missing required extensions {}", names.join(", ")),
            Self::MissingFeatures => write!(f, "missing required features"),
            Self::NoPresentSupport => write!(f, "no queue family can present to every window"),
            Self::ExtraRequirement => write!(f, "extra device requirements were not met"),
            Self::QueueFamilies(reason) => write!(f, "{}", reason),
            Self::NotXrDevice => write!(f, "the OpenXR runtime requires another physical device"),
        }
    }
}
