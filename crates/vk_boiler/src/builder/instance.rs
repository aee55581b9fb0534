//! Instance layer and extension planning, and instance creation

use super::names::{to_c_strings, vk_name};
use crate::error::{BoilerError, BoilerResult, VkResultExt};
use crate::foundation::version::ApiVersion;
use ash::prelude::VkResult;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

/// Khronos validation layer
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";
/// LunarG API dump layer
pub const API_DUMP_LAYER: &str = "VK_LAYER_LUNARG_api_dump";
/// Debug utils instance extension
pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";
/// Validation features instance extension
pub const VALIDATION_FEATURES_EXTENSION: &str = "VK_EXT_validation_features";
/// Portability enumeration instance extension
pub const PORTABILITY_ENUMERATION_EXTENSION: &str = "VK_KHR_portability_enumeration";

/// Validation layer features to enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationFeatures {
    /// GPU-assisted validation
    pub gpu_assisted: bool,
    /// Reserve a descriptor binding slot for GPU-assisted validation
    pub gpu_assisted_reserve: bool,
    /// Best practices warnings
    pub best_practices: bool,
    /// `debugPrintfEXT` support in shaders
    pub debug_printf: bool,
    /// Synchronization validation
    pub synchronization: bool,
}

impl ValidationFeatures {
    /// Create a feature set
    pub const fn new(
        gpu_assisted: bool,
        gpu_assisted_reserve: bool,
        best_practices: bool,
        debug_printf: bool,
        synchronization: bool,
    ) -> Self {
        Self {
            gpu_assisted,
            gpu_assisted_reserve,
            best_practices,
            debug_printf,
            synchronization,
        }
    }

    /// Sensible defaults for the targeted API version.
    ///
    /// GPU-assisted validation needs Vulkan 1.1, so 1.0 gets best practices instead.
    pub const fn default_for(api_version: ApiVersion) -> Self {
        if api_version.major == 1 && api_version.minor == 0 {
            Self::new(false, false, true, true, true)
        } else {
            Self::new(true, true, false, true, true)
        }
    }

    /// Features to chain into the instance create info
    pub fn enabled_features(&self) -> Vec<vk::ValidationFeatureEnableEXT> {
        [
            (self.gpu_assisted, vk::ValidationFeatureEnableEXT::GPU_ASSISTED),
            (
                self.gpu_assisted_reserve,
                vk::ValidationFeatureEnableEXT::GPU_ASSISTED_RESERVE_BINDING_SLOT,
            ),
            (self.best_practices, vk::ValidationFeatureEnableEXT::BEST_PRACTICES),
            (self.debug_printf, vk::ValidationFeatureEnableEXT::DEBUG_PRINTF),
            (
                self.synchronization,
                vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION,
            ),
        ]
        .into_iter()
        .filter_map(|(enabled, feature)| enabled.then_some(feature))
        .collect()
    }
}

/// What a name set is made of, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Instance layers
    Layer,
    /// Instance extensions
    InstanceExtension,
    /// Device extensions
    DeviceExtension,
}

/// Names that must be enabled and names that are enabled when available
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionRequest {
    /// Missing any of these is an error
    pub required: BTreeSet<String>,
    /// Enabled only when available
    pub desired: BTreeSet<String>,
}

impl ExtensionRequest {
    /// Required names that are not available, sorted
    pub fn missing_required<'a>(&'a self, available: &BTreeSet<String>) -> Vec<&'a str> {
        self.required
            .iter()
            .filter(|name| !available.contains(*name))
            .map(String::as_str)
            .collect()
    }

    /// Names to enable: all required ones plus the available desired ones
    pub fn resolve(&self, available: &BTreeSet<String>, kind: RequestKind) -> BoilerResult<BTreeSet<String>> {
        if let Some(missing) = self.missing_required(available).first() {
            let missing = (*missing).to_string();
            return Err(match kind {
                RequestKind::Layer => BoilerError::MissingLayer(missing),
                RequestKind::InstanceExtension => BoilerError::MissingInstanceExtension(missing),
                RequestKind::DeviceExtension => BoilerError::MissingDeviceExtension(missing),
            });
        }

        let mut enabled = self.required.clone();
        enabled.extend(self.desired.iter().filter(|name| available.contains(*name)).cloned());
        Ok(enabled)
    }
}

/// Layers, extensions and flags the instance will be created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan {
    /// Enabled layers
    pub layers: BTreeSet<String>,
    /// Enabled extensions
    pub extensions: BTreeSet<String>,
    /// Instance create flags
    pub flags: vk::InstanceCreateFlags,
    /// Validation features to chain, empty when none
    pub validation_features: Vec<vk::ValidationFeatureEnableEXT>,
}

impl InstancePlan {
    /// Decide the enabled extensions and flags once layers are known.
    ///
    /// `available_extensions` must include the extensions provided by the
    /// enabled layers, since validation features come from the validation layer.
    pub fn new(
        layers: BTreeSet<String>,
        extensions: &ExtensionRequest,
        available_extensions: &BTreeSet<String>,
        validation: Option<ValidationFeatures>,
    ) -> BoilerResult<Self> {
        let extensions = extensions.resolve(available_extensions, RequestKind::InstanceExtension)?;

        let flags = if extensions.contains(PORTABILITY_ENUMERATION_EXTENSION) {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let validation_features = match validation {
            Some(features) if extensions.contains(VALIDATION_FEATURES_EXTENSION) => features.enabled_features(),
            _ => Vec::new(),
        };

        Ok(Self {
            layers,
            extensions,
            flags,
            validation_features,
        })
    }
}

/// Creates the `VkInstance` from a fully populated create info
pub trait InstanceCreator {
    /// Create the instance
    fn create_instance(&self, entry: &ash::Entry, create_info: &vk::InstanceCreateInfo) -> VkResult<ash::Instance>;
}

impl<F> InstanceCreator for F
where
    F: Fn(&ash::Entry, &vk::InstanceCreateInfo) -> VkResult<ash::Instance>,
{
    fn create_instance(&self, entry: &ash::Entry, create_info: &vk::InstanceCreateInfo) -> VkResult<ash::Instance> {
        self(entry, create_info)
    }
}

/// Calls `vkCreateInstance` directly
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstanceCreator;

impl InstanceCreator for DefaultInstanceCreator {
    fn create_instance(&self, entry: &ash::Entry, create_info: &vk::InstanceCreateInfo) -> VkResult<ash::Instance> {
        unsafe { entry.create_instance(create_info, None) }
    }
}

/// Names of the instance layers the loader offers
pub(crate) fn available_layers(entry: &ash::Entry) -> BoilerResult<BTreeSet<String>> {
    let properties = entry
        .enumerate_instance_layer_properties()
        .vk_context("EnumerateInstanceLayerProperties", "BoilerBuilder")?;
    Ok(properties.iter().map(|layer| vk_name(&layer.layer_name)).collect())
}

/// Names of the instance extensions offered by the loader and the given layers
pub(crate) fn available_extensions(entry: &ash::Entry, layers: &BTreeSet<String>) -> BoilerResult<BTreeSet<String>> {
    let mut names: BTreeSet<String> = entry
        .enumerate_instance_extension_properties(None)
        .vk_context("EnumerateInstanceExtensionProperties", "BoilerBuilder")?
        .iter()
        .map(|extension| vk_name(&extension.extension_name))
        .collect();

    for layer in to_c_strings(layers)? {
        let layer_extensions = entry
            .enumerate_instance_extension_properties(Some(layer.as_c_str()))
            .vk_context("EnumerateInstanceExtensionProperties", "BoilerBuilder layers")?;
        names.extend(layer_extensions.iter().map(|extension| vk_name(&extension.extension_name)));
    }

    Ok(names)
}

/// Application and engine identification
pub(crate) struct ApplicationInfo<'a> {
    pub application_name: &'a str,
    pub application_version: u32,
    pub engine_name: &'a str,
    pub engine_version: u32,
    pub api_version: u32,
}

/// Create the instance described by `plan` through `creator`
pub(crate) fn create_instance(
    entry: &ash::Entry,
    creator: &dyn InstanceCreator,
    info: &ApplicationInfo<'_>,
    plan: &InstancePlan,
) -> BoilerResult<ash::Instance> {
    let application_name = CString::new(info.application_name)
        .map_err(|_| BoilerError::InvalidName(info.application_name.to_string()))?;
    let engine_name =
        CString::new(info.engine_name).map_err(|_| BoilerError::InvalidName(info.engine_name.to_string()))?;

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&application_name)
        .application_version(info.application_version)
        .engine_name(&engine_name)
        .engine_version(info.engine_version)
        .api_version(info.api_version);

    let layers = to_c_strings(&plan.layers)?;
    let extensions = to_c_strings(&plan.extensions)?;
    let layer_ptrs: Vec<*const std::os::raw::c_char> = layers.iter().map(|name| name.as_ptr()).collect();
    let extension_ptrs: Vec<*const std::os::raw::c_char> = extensions.iter().map(|name| name.as_ptr()).collect();

    let mut validation_features =
        vk::ValidationFeaturesEXT::builder().enabled_validation_features(&plan.validation_features);

    let mut create_info = vk::InstanceCreateInfo::builder()
        .flags(plan.flags)
        .application_info(&app_info)
        .enabled_layer_names(&layer_ptrs)
        .enabled_extension_names(&extension_ptrs);

    if !plan.validation_features.is_empty() {
        create_info = create_info.push_next(&mut validation_features);
    }

    log::debug!(
        "Creating Vulkan instance with layers {:?} and extensions {:?}",
        plan.layers,
        plan.extensions
    );

    creator
        .create_instance(entry, &create_info)
        .vk_context("CreateInstance", "BoilerBuilder")
}
