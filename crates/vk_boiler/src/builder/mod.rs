//! # Boilerplate Builder
//!
//! [`BoilerBuilder`] collects layers, extensions, validation settings,
//! feature rules and windows, then creates the instance, picks a physical
//! device, creates the logical device with its queues and sets up a VMA
//! allocator.
//!
//! ```no_run
//! use vk_boiler::prelude::*;
//!
//! let boiler = BoilerBuilder::new(ash::vk::API_VERSION_1_2, "Example", make_version(0, 1, 0))
//!     .default_validation()
//!     .window(WindowRequest::new(800, 600))
//!     .build()?;
//! println!("Using {}", boiler.physical_device_name());
//! # Ok::<(), BoilerError>(())
//! ```

pub mod device;
pub mod hooks;
pub mod instance;
mod names;
pub mod queue;

use self::device::{
    DefaultDeviceCreator, DeviceCandidate, DeviceCreator, DeviceFeatures, DeviceRejection, DeviceRequirement,
    EnabledFeatures, FeatureRules, PhysicalDeviceSelector, SimpleDeviceSelector,
};
use self::hooks::{DeviceCreationContext, PreDeviceCreator, PreInstanceCreator, SwapchainMaintenance};
use self::instance::{
    ApplicationInfo, DefaultInstanceCreator, ExtensionRequest, InstanceCreator, InstancePlan, RequestKind,
    ValidationFeatures, API_DUMP_LAYER, DEBUG_UTILS_EXTENSION, PORTABILITY_ENUMERATION_EXTENSION,
    VALIDATION_FEATURES_EXTENSION, VALIDATION_LAYER,
};
use self::names::to_c_strings;
use self::queue::{MinimalQueueFamilyMapper, QueueFamilyMapper, QueueFamilyMapping};
use crate::config::BoilerConfig;
use crate::debug::DebugMessenger;
use crate::error::{BoilerError, BoilerResult, VkResultExt};
use crate::foundation::version::{make_version, ApiVersion};
use crate::instance::{BoilerInstance, QueueFamilies, WindowSurface};
use crate::window::{init_glfw, Window, WindowRequest};
use crate::xr::XrBuilder;
use ash::extensions::khr::Surface;
use ash::vk;
use std::collections::BTreeSet;
use std::mem::ManuallyDrop;

/// Swapchain device extension, required whenever there are windows
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";
/// Swapchain maintenance device extension, desired with windows
pub const SWAPCHAIN_MAINTENANCE_EXTENSION: &str = "VK_EXT_swapchain_maintenance1";
/// Surface maintenance instance extension, desired with windows
pub const SURFACE_MAINTENANCE_EXTENSION: &str = "VK_EXT_surface_maintenance1";
/// Surface capabilities 2 instance extension, desired with windows
pub const SURFACE_CAPABILITIES_2_EXTENSION: &str = "VK_KHR_get_surface_capabilities2";
/// Physical device properties 2 instance extension, core since 1.1
pub const PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION: &str = "VK_KHR_get_physical_device_properties2";

/// Device extensions VMA can take advantage of on Vulkan 1.0
pub const VMA_DEVICE_EXTENSIONS: [&str; 4] = [
    "VK_KHR_dedicated_allocation",
    "VK_KHR_get_memory_requirements2",
    "VK_KHR_bind_memory2",
    "VK_EXT_memory_budget",
];

/// Default wait timeout: one second
pub const DEFAULT_TIMEOUT_NANOS: u64 = 1_000_000_000;

/// Layer and extension requests after applying every builder option
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requests {
    /// Instance layers
    pub layers: ExtensionRequest,
    /// Instance extensions
    pub instance_extensions: ExtensionRequest,
    /// Device extensions, checked against every physical device
    pub device_extensions: ExtensionRequest,
}

enum WindowSource {
    Create(WindowRequest),
    Existing(Window),
}

/// Builder for a [`BoilerInstance`]
pub struct BoilerBuilder {
    api_version: u32,
    application_name: String,
    application_version: u32,
    engine_name: String,
    engine_version: u32,
    default_timeout: u64,

    layers: ExtensionRequest,
    instance_extensions: ExtensionRequest,
    device_extensions: ExtensionRequest,

    validation: Option<ValidationFeatures>,
    forbid_validation_errors: bool,

    instance_creator: Box<dyn InstanceCreator>,
    device_creator: Box<dyn DeviceCreator>,
    duplicate_creator: Option<&'static str>,
    has_custom_instance_creator: bool,
    has_custom_device_creator: bool,

    selector: Box<dyn PhysicalDeviceSelector>,
    feature_rules: FeatureRules,
    extra_requirements: Vec<DeviceRequirement>,
    print_rejection_info: bool,
    queue_family_mapper: Box<dyn QueueFamilyMapper>,

    pre_instance_creators: Vec<Box<dyn PreInstanceCreator>>,
    pre_device_creators: Vec<Box<dyn PreDeviceCreator>>,
    xr: Option<XrBuilder>,

    glfw: Option<glfw::Glfw>,
    windows: Vec<WindowSource>,
}

fn extend_names(set: &mut BTreeSet<String>, names: impl IntoIterator<Item = impl Into<String>>) {
    set.extend(names.into_iter().map(Into::into));
}

impl BoilerBuilder {
    /// Start a builder targeting `api_version` (packed, zero patch and variant)
    pub fn new(api_version: u32, application_name: impl Into<String>, application_version: u32) -> Self {
        let mut instance_extensions = ExtensionRequest::default();
        instance_extensions
            .desired
            .insert(PORTABILITY_ENUMERATION_EXTENSION.to_string());

        Self {
            api_version,
            application_name: application_name.into(),
            application_version,
            engine_name: crate::DEFAULT_ENGINE_NAME.to_string(),
            engine_version: make_version(0, 1, 0),
            default_timeout: DEFAULT_TIMEOUT_NANOS,
            layers: ExtensionRequest::default(),
            instance_extensions,
            device_extensions: ExtensionRequest::default(),
            validation: None,
            forbid_validation_errors: false,
            instance_creator: Box::new(DefaultInstanceCreator),
            device_creator: Box::new(DefaultDeviceCreator),
            duplicate_creator: None,
            has_custom_instance_creator: false,
            has_custom_device_creator: false,
            selector: Box::new(SimpleDeviceSelector::default()),
            feature_rules: FeatureRules::default(),
            extra_requirements: Vec::new(),
            print_rejection_info: false,
            queue_family_mapper: Box::new(MinimalQueueFamilyMapper),
            pre_instance_creators: Vec::new(),
            pre_device_creators: Vec::new(),
            xr: None,
            glfw: None,
            windows: Vec::new(),
        }
    }

    /// Seed a builder from a configuration file
    pub fn from_config(config: &BoilerConfig) -> Self {
        let (major, minor, patch) = config.application_version;
        let (api_major, api_minor) = config.api_version;
        let (engine_major, engine_minor, engine_patch) = config.engine_version;

        let mut builder = Self::new(
            ApiVersion::new(api_major, api_minor).packed(),
            config.application_name.clone(),
            make_version(major, minor, patch),
        )
        .engine(
            config.engine_name.clone(),
            make_version(engine_major, engine_minor, engine_patch),
        );

        if config.validation_enabled() {
            builder = builder.default_validation();
        }
        if config.forbid_validation_errors {
            builder = builder.forbid_validation_errors();
        }
        if let Some(window) = config.window {
            builder = builder.window(WindowRequest::new(window.width, window.height));
        }
        builder
    }

    /// Targeted API version
    pub fn api_version(&self) -> ApiVersion {
        ApiVersion::from_packed(self.api_version)
    }

    /// Engine name and packed version reported to the driver
    pub fn engine(mut self, name: impl Into<String>, version: u32) -> Self {
        self.engine_name = name.into();
        self.engine_version = version;
        self
    }

    /// Timeout in nanoseconds exposed through [`BoilerInstance::default_timeout`]
    pub fn default_timeout(mut self, nanos: u64) -> Self {
        self.default_timeout = nanos;
        self
    }

    /// Enable these layers when they are available
    pub fn desired_vk_layers(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.layers.desired, names);
        self
    }

    /// Enable these layers, failing when one is missing
    pub fn required_vk_layers(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.layers.required, names);
        self
    }

    /// Enable these instance extensions when they are available
    pub fn desired_vk_instance_extensions(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.instance_extensions.desired, names);
        self
    }

    /// Enable these instance extensions, failing when one is missing
    pub fn required_vk_instance_extensions(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.instance_extensions.required, names);
        self
    }

    /// Enable these device extensions when the chosen device has them
    pub fn desired_vk_device_extensions(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.device_extensions.desired, names);
        self
    }

    /// Reject physical devices that lack any of these extensions
    pub fn required_vk_device_extensions(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        extend_names(&mut self.device_extensions.required, names);
        self
    }

    /// Enable the validation layer with the given features
    pub fn validation(mut self, features: ValidationFeatures) -> Self {
        self.validation = Some(features);
        self
    }

    /// Enable the validation layer with features suited to the API version
    pub fn default_validation(self) -> Self {
        let features = ValidationFeatures::default_for(self.api_version());
        self.validation(features)
    }

    /// Collect validation errors so they can be reported as failures
    pub fn forbid_validation_errors(mut self) -> Self {
        self.forbid_validation_errors = true;
        self
    }

    /// Log every Vulkan call through the API dump layer
    pub fn api_dump(self) -> Self {
        self.required_vk_layers([API_DUMP_LAYER])
    }

    /// Replace the instance creator. At most one custom creator is allowed.
    pub fn vk_instance_creator(mut self, creator: impl InstanceCreator + 'static) -> Self {
        if self.has_custom_instance_creator {
            self.duplicate_creator.get_or_insert("instance");
        }
        self.has_custom_instance_creator = true;
        self.instance_creator = Box::new(creator);
        self
    }

    /// Replace the device creator. At most one custom creator is allowed.
    pub fn vk_device_creator(mut self, creator: impl DeviceCreator + 'static) -> Self {
        if self.has_custom_device_creator {
            self.duplicate_creator.get_or_insert("device");
        }
        self.has_custom_device_creator = true;
        self.device_creator = Box::new(creator);
        self
    }

    /// Replace the [`SimpleDeviceSelector`] that chooses among acceptable devices
    pub fn physical_device_selector(mut self, selector: impl PhysicalDeviceSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Choose Vulkan 1.0 features to enable, given the supported ones
    pub fn feature_picker_10(
        mut self,
        picker: impl Fn(&vk::PhysicalDeviceFeatures, &mut vk::PhysicalDeviceFeatures) + 'static,
    ) -> Self {
        self.feature_rules.pickers_10.push(Box::new(picker));
        self
    }

    /// Choose Vulkan 1.1 features to enable. Needs API version 1.2.
    pub fn feature_picker_11(
        mut self,
        picker: impl Fn(&vk::PhysicalDeviceVulkan11Features, &mut vk::PhysicalDeviceVulkan11Features) + 'static,
    ) -> Self {
        self.feature_rules.pickers_11.push(Box::new(picker));
        self
    }

    /// Choose Vulkan 1.2 features to enable
    pub fn feature_picker_12(
        mut self,
        picker: impl Fn(&vk::PhysicalDeviceVulkan12Features, &mut vk::PhysicalDeviceVulkan12Features) + 'static,
    ) -> Self {
        self.feature_rules.pickers_12.push(Box::new(picker));
        self
    }

    /// Choose Vulkan 1.3 features to enable
    pub fn feature_picker_13(
        mut self,
        picker: impl Fn(&vk::PhysicalDeviceVulkan13Features, &mut vk::PhysicalDeviceVulkan13Features) + 'static,
    ) -> Self {
        self.feature_rules.pickers_13.push(Box::new(picker));
        self
    }

    /// Reject physical devices whose 1.0 features fail `check`
    pub fn required_features_10(mut self, check: impl Fn(&vk::PhysicalDeviceFeatures) -> bool + 'static) -> Self {
        self.feature_rules.required_10.push(Box::new(check));
        self
    }

    /// Reject physical devices whose 1.1 features fail `check`. Needs API version 1.2.
    pub fn required_features_11(
        mut self,
        check: impl Fn(&vk::PhysicalDeviceVulkan11Features) -> bool + 'static,
    ) -> Self {
        self.feature_rules.required_11.push(Box::new(check));
        self
    }

    /// Reject physical devices whose 1.2 features fail `check`
    pub fn required_features_12(
        mut self,
        check: impl Fn(&vk::PhysicalDeviceVulkan12Features) -> bool + 'static,
    ) -> Self {
        self.feature_rules.required_12.push(Box::new(check));
        self
    }

    /// Reject physical devices whose 1.3 features fail `check`
    pub fn required_features_13(
        mut self,
        check: impl Fn(&vk::PhysicalDeviceVulkan13Features) -> bool + 'static,
    ) -> Self {
        self.feature_rules.required_13.push(Box::new(check));
        self
    }

    /// Reject physical devices for which `requirement` returns false
    pub fn extra_device_requirements(
        mut self,
        requirement: impl Fn(&ash::Instance, vk::PhysicalDevice) -> bool + 'static,
    ) -> Self {
        self.extra_requirements.push(Box::new(requirement));
        self
    }

    /// Log device rejection reasons at info instead of debug level
    pub fn print_device_rejection_info(mut self) -> Self {
        self.print_rejection_info = true;
        self
    }

    /// Replace the [`MinimalQueueFamilyMapper`]
    pub fn queue_family_mapper(mut self, mapper: impl QueueFamilyMapper + 'static) -> Self {
        self.queue_family_mapper = Box::new(mapper);
        self
    }

    /// Create a window; its index is the number of windows added before it
    pub fn window(mut self, request: WindowRequest) -> Self {
        self.windows.push(WindowSource::Create(request));
        self
    }

    /// Use a window the application created, indexed like [`Self::window`]
    pub fn existing_window(mut self, window: Window) -> Self {
        self.windows.push(WindowSource::Existing(window));
        self
    }

    /// Create windows with an already initialised GLFW instead of initialising it
    pub fn glfw(mut self, glfw: glfw::Glfw) -> Self {
        self.glfw = Some(glfw);
        self
    }

    /// Windows the builder will create itself
    pub fn window_requests(&self) -> Vec<WindowRequest> {
        self.windows
            .iter()
            .filter_map(|source| match source {
                WindowSource::Create(request) => Some(*request),
                WindowSource::Existing(_) => None,
            })
            .collect()
    }

    /// Adjust the instance plan right before the instance is created
    pub fn before_instance_creation(mut self, hook: impl PreInstanceCreator + 'static) -> Self {
        self.pre_instance_creators.push(Box::new(hook));
        self
    }

    /// Adjust extensions and features right before the logical device is created
    pub fn before_device_creation(mut self, hook: impl PreDeviceCreator + 'static) -> Self {
        self.pre_device_creators.push(Box::new(hook));
        self
    }

    /// Let an OpenXR runtime create the instance and device, and choose the physical device.
    ///
    /// Cannot be combined with custom instance or device creators.
    pub fn xr(mut self, xr: XrBuilder) -> Self {
        self.xr = Some(xr);
        self
    }

    /// Report configuration mistakes that the chainable methods could not
    pub fn validate(&self) -> BoilerResult<()> {
        if !ApiVersion::is_valid_packed(self.api_version) {
            return Err(BoilerError::InvalidApiVersion(self.api_version));
        }

        if let Some(kind) = self.duplicate_creator {
            return Err(BoilerError::DuplicateCreator(kind));
        }
        if self.xr.is_some() {
            if self.has_custom_instance_creator {
                return Err(BoilerError::DuplicateCreator("instance"));
            }
            if self.has_custom_device_creator {
                return Err(BoilerError::DuplicateCreator("device"));
            }
        }

        let api_version = self.api_version();
        if let Some((required, feature)) = self.feature_rules.minimum_api_version() {
            if api_version < required {
                return Err(BoilerError::ApiVersionTooLow {
                    feature,
                    required: required.to_string(),
                    actual: api_version.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Layers and extensions to request, given GLFW's surface extensions when there are windows
    pub fn requests(&self, window_instance_extensions: Option<&[String]>) -> Requests {
        let mut requests = Requests {
            layers: self.layers.clone(),
            instance_extensions: self.instance_extensions.clone(),
            device_extensions: self.device_extensions.clone(),
        };
        let is_v10 = self.api_version() < ApiVersion::V1_1;

        if let Some(window_extensions) = window_instance_extensions {
            extend_names(&mut requests.instance_extensions.required, window_extensions.iter().cloned());
            extend_names(
                &mut requests.instance_extensions.desired,
                [SURFACE_MAINTENANCE_EXTENSION, SURFACE_CAPABILITIES_2_EXTENSION],
            );
            requests.device_extensions.required.insert(SWAPCHAIN_EXTENSION.to_string());
            requests
                .device_extensions
                .desired
                .insert(SWAPCHAIN_MAINTENANCE_EXTENSION.to_string());
        }

        if is_v10 {
            requests
                .instance_extensions
                .desired
                .insert(PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION.to_string());
            extend_names(&mut requests.device_extensions.desired, VMA_DEVICE_EXTENSIONS);
        }

        if self.validation.is_some() {
            requests.layers.required.insert(VALIDATION_LAYER.to_string());
            extend_names(
                &mut requests.instance_extensions.required,
                [DEBUG_UTILS_EXTENSION, VALIDATION_FEATURES_EXTENSION],
            );
        }
        if self.forbid_validation_errors {
            requests
                .instance_extensions
                .required
                .insert(DEBUG_UTILS_EXTENSION.to_string());
        }

        // Names requested as required need not also be desired
        for request in [
            &mut requests.layers,
            &mut requests.instance_extensions,
            &mut requests.device_extensions,
        ] {
            let required = request.required.clone();
            request.desired.retain(|name| !required.contains(name));
        }

        requests
    }

    /// Create every object. The builder is consumed and cannot be reused.
    pub fn build(mut self) -> BoilerResult<BoilerInstance> {
        self.validate()?;
        let api_version = self.api_version();

        let windows = create_windows(
            std::mem::take(&mut self.windows),
            self.glfw.take(),
            &self.application_name,
        )?;
        let window_extensions = windows
            .first()
            .map(Window::required_instance_extensions)
            .transpose()?;

        let requests = self.requests(window_extensions.as_deref());

        let entry = unsafe { ash::Entry::load() }.map_err(|err| BoilerError::Loading(err.to_string()))?;
        let application_info = ApplicationInfo {
            application_name: &self.application_name,
            application_version: self.application_version,
            engine_name: &self.engine_name,
            engine_version: self.engine_version,
            api_version: self.api_version,
        };
        let xr = match self.xr.take() {
            Some(xr) => Some(xr.build(&entry, &application_info)?),
            None => None,
        };

        let layers = requests
            .layers
            .resolve(&instance::available_layers(&entry)?, RequestKind::Layer)?;
        let available_extensions = instance::available_extensions(&entry, &layers)?;
        let mut plan = InstancePlan::new(layers, &requests.instance_extensions, &available_extensions, self.validation)?;
        for hook in &self.pre_instance_creators {
            hook.before_instance_creation(&mut plan)?;
        }

        let instance_creator: &dyn InstanceCreator = match &xr {
            Some(xr) => xr,
            None => self.instance_creator.as_ref(),
        };
        let vk_instance = instance::create_instance(&entry, instance_creator, &application_info, &plan)?;
        let mut guard = InstanceGuard::new(entry, vk_instance);

        if plan.extensions.contains(DEBUG_UTILS_EXTENSION) {
            guard.debug_messenger = Some(DebugMessenger::new(
                &guard.entry,
                guard.instance()?,
                self.forbid_validation_errors,
            )?);
        }

        if !windows.is_empty() {
            guard.surface_loader = Some(Surface::new(&guard.entry, guard.instance()?));
            for window in &windows {
                let surface = window.create_surface(guard.instance()?.handle())?;
                guard.surfaces.push(surface);
            }
        }

        let xr_device = match &xr {
            Some(xr) => Some(xr.physical_device(guard.instance()?)?),
            None => None,
        };
        let chosen = self.choose_physical_device(&guard, &requests.device_extensions, xr_device)?;
        log::info!(
            "Selected physical device {} ({:?})",
            chosen.candidate.name,
            chosen.candidate.device_type
        );
        let device_api = api_version.min(ApiVersion::from_packed(chosen.candidate.api_version));

        let mut device_extensions = chosen.extensions.clone();
        let mut enabled = self.feature_rules.pick(&chosen.supported);
        {
            let mut context = DeviceCreationContext {
                entry: &guard.entry,
                instance: guard.instance()?,
                physical_device: chosen.candidate.handle,
                api_version: device_api,
                instance_extensions: &plan.extensions,
                device_extensions: &mut device_extensions,
                enabled: &mut enabled,
            };
            if !windows.is_empty() {
                SwapchainMaintenance.before_device_creation(&mut context)?;
            }
            for hook in &self.pre_device_creators {
                hook.before_device_creation(&mut context)?;
            }
        }

        let device_creator: &dyn DeviceCreator = match &xr {
            Some(xr) => xr,
            None => self.device_creator.as_ref(),
        };
        let device = create_device(
            device_creator,
            guard.instance()?,
            &chosen,
            &device_extensions,
            enabled,
        )?;

        let allocator_info = vk_mem::AllocatorCreateInfo::new(guard.instance()?, &device, chosen.candidate.handle)
            .vulkan_api_version(device_api.packed())
            .flags(allocator_flags(device_api, &plan.extensions, &device_extensions));
        let allocator = match vk_mem::Allocator::new(allocator_info) {
            Ok(allocator) => allocator,
            Err(result) => {
                unsafe { device.destroy_device(None) };
                return Err(BoilerError::Vulkan {
                    function: "CreateAllocator",
                    context: "vmaCreateAllocator",
                    result,
                });
            }
        };

        let queue_families = QueueFamilies::fetch(&device, &chosen.mapping);
        let (entry, vk_instance, surface_loader, surfaces, debug_messenger) = guard.disarm()?;
        let windows = windows
            .into_iter()
            .zip(surfaces)
            .map(|(window, surface)| WindowSurface { window, surface })
            .collect();

        Ok(BoilerInstance {
            allocator: ManuallyDrop::new(allocator),
            device,
            queue_families,
            physical_device: chosen.candidate.handle,
            physical_device_name: chosen.candidate.name,
            surface_loader,
            debug_messenger,
            instance: vk_instance,
            entry,
            windows,
            api_version,
            instance_extensions: plan.extensions,
            device_extensions,
            has_swapchain_maintenance: enabled.has_swapchain_maintenance(),
            default_timeout: self.default_timeout,
            device_destroyed: false,
            xr,
        })
    }

    fn choose_physical_device(
        &self,
        guard: &InstanceGuard,
        device_extensions: &ExtensionRequest,
        xr_device: Option<vk::PhysicalDevice>,
    ) -> BoilerResult<AcceptedDevice> {
        let vk_instance = guard.instance()?;
        let physical_devices = unsafe { vk_instance.enumerate_physical_devices() }
            .vk_context("EnumeratePhysicalDevices", "BoilerBuilder")?;

        let mut accepted = Vec::new();
        for physical_device in &physical_devices {
            match self.evaluate_device(guard, *physical_device, device_extensions, xr_device)? {
                Ok(device) => accepted.push(device),
                Err((name, rejection)) => {
                    if self.print_rejection_info {
                        log::info!("Rejected physical device {}: {}", name, rejection);
                    } else {
                        log::debug!("Rejected physical device {}: {}", name, rejection);
                    }
                }
            }
        }

        let candidates: Vec<DeviceCandidate> = accepted.iter().map(|device| device.candidate.clone()).collect();
        match self.selector.choose(&candidates) {
            Some(index) if index < accepted.len() => Ok(accepted.swap_remove(index)),
            _ => Err(BoilerError::NoPhysicalDevice {
                candidates: physical_devices.len(),
            }),
        }
    }

    fn evaluate_device(
        &self,
        guard: &InstanceGuard,
        physical_device: vk::PhysicalDevice,
        device_extensions: &ExtensionRequest,
        xr_device: Option<vk::PhysicalDevice>,
    ) -> BoilerResult<Result<AcceptedDevice, (String, DeviceRejection)>> {
        let vk_instance = guard.instance()?;
        let properties = unsafe { vk_instance.get_physical_device_properties(physical_device) };
        let candidate = DeviceCandidate::from_properties(physical_device, &properties);
        let reject = |rejection| Ok(Err((candidate.name.clone(), rejection)));

        if xr_device.map_or(false, |required| required != physical_device) {
            return reject(DeviceRejection::NotXrDevice);
        }

        let available: BTreeSet<String> = unsafe { vk_instance.enumerate_device_extension_properties(physical_device) }
            .vk_context("EnumerateDeviceExtensionProperties", "BoilerBuilder")?
            .iter()
            .map(|extension| names::vk_name(&extension.extension_name))
            .collect();
        let missing = device_extensions.missing_required(&available);
        if !missing.is_empty() {
            return reject(DeviceRejection::MissingExtensions(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }
        let extensions = device_extensions.resolve(&available, RequestKind::DeviceExtension)?;

        let feature_api = self.api_version().min(ApiVersion::from_packed(properties.api_version));
        let supported = DeviceFeatures::query(vk_instance, physical_device, feature_api);
        if !self.feature_rules.supports(&supported) {
            return reject(DeviceRejection::MissingFeatures);
        }

        let queue_families = unsafe { vk_instance.get_physical_device_queue_family_properties(physical_device) };
        let present_support = guard.present_support(physical_device, queue_families.len())?;
        if !guard.surfaces.is_empty() && !present_support.contains(&true) {
            return reject(DeviceRejection::NoPresentSupport);
        }

        if !self
            .extra_requirements
            .iter()
            .all(|requirement| requirement(vk_instance, physical_device))
        {
            return reject(DeviceRejection::ExtraRequirement);
        }

        let mapping = match self
            .queue_family_mapper
            .map_queue_families(&queue_families, &extensions, &present_support)
        {
            Ok(mapping) => mapping,
            Err(err) => return reject(DeviceRejection::QueueFamilies(err.to_string())),
        };
        if !guard.surfaces.is_empty() && mapping.present_family.is_none() {
            return reject(DeviceRejection::NoPresentSupport);
        }

        Ok(Ok(AcceptedDevice {
            candidate,
            extensions,
            mapping,
            supported,
        }))
    }
}

fn create_windows(
    sources: Vec<WindowSource>,
    glfw: Option<glfw::Glfw>,
    title: &str,
) -> BoilerResult<Vec<Window>> {
    let needs_glfw = sources
        .iter()
        .any(|source| matches!(source, WindowSource::Create(_)));
    let glfw = match glfw {
        Some(glfw) => Some(glfw),
        None if needs_glfw => Some(init_glfw()?),
        None => None,
    };

    sources
        .into_iter()
        .map(|source| match (source, &glfw) {
            (WindowSource::Existing(window), _) => Ok(window),
            (WindowSource::Create(request), Some(glfw)) => {
                Window::with_glfw(glfw.clone(), title, request.width, request.height)
            }
            (WindowSource::Create(_), None) => Err(BoilerError::Glfw("GLFW is not initialised".to_string())),
        })
        .collect()
}

/// VMA flags for the memory helper extensions that were enabled.
///
/// Dedicated allocations and `bind_memory2` are core from 1.1 on, where VMA
/// uses them without flags.
pub fn allocator_flags(
    api_version: ApiVersion,
    instance_extensions: &BTreeSet<String>,
    device_extensions: &BTreeSet<String>,
) -> vk_mem::AllocatorCreateFlags {
    let [dedicated_allocation, memory_requirements2, bind_memory2, memory_budget] = VMA_DEVICE_EXTENSIONS;
    let enabled = |name: &str| device_extensions.contains(name);
    let is_v10 = api_version < ApiVersion::V1_1;

    let mut flags = vk_mem::AllocatorCreateFlags::empty();
    if is_v10 && enabled(dedicated_allocation) && enabled(memory_requirements2) {
        flags |= vk_mem::AllocatorCreateFlags::KHR_DEDICATED_ALLOCATION;
    }
    if is_v10 && enabled(bind_memory2) {
        flags |= vk_mem::AllocatorCreateFlags::KHR_BIND_MEMORY2;
    }
    // The budget query goes through vkGetPhysicalDeviceMemoryProperties2
    if enabled(memory_budget) && (!is_v10 || instance_extensions.contains(PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION)) {
        flags |= vk_mem::AllocatorCreateFlags::EXT_MEMORY_BUDGET;
    }
    flags
}

fn create_device(
    creator: &dyn DeviceCreator,
    vk_instance: &ash::Instance,
    chosen: &AcceptedDevice,
    extensions: &BTreeSet<String>,
    mut enabled: EnabledFeatures,
) -> BoilerResult<ash::Device> {
    let families = chosen.mapping.unique_families();
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family.index)
                .queue_priorities(&family.priorities)
                .build()
        })
        .collect();

    let extension_names = to_c_strings(extensions)?;
    let extension_ptrs: Vec<*const std::os::raw::c_char> = extension_names.iter().map(|name| name.as_ptr()).collect();

    let features = &mut enabled.features;
    let mut create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features.v10);
    if enabled.chain_11 {
        create_info = create_info.push_next(&mut features.v11);
    }
    if enabled.chain_12 {
        create_info = create_info.push_next(&mut features.v12);
    }
    if enabled.chain_13 {
        create_info = create_info.push_next(&mut features.v13);
    }
    if let Some(maintenance) = enabled.swapchain_maintenance.as_mut() {
        create_info = create_info.push_next(maintenance);
    }

    log::debug!("Creating logical device with extensions {:?}", extensions);
    creator
        .create_device(vk_instance, chosen.candidate.handle, extensions, &create_info)
        .vk_context("CreateDevice", "BoilerBuilder")
}

struct AcceptedDevice {
    candidate: DeviceCandidate,
    extensions: BTreeSet<String>,
    mapping: QueueFamilyMapping,
    supported: DeviceFeatures,
}

/// Destroys instance-level objects if the build fails halfway
struct InstanceGuard {
    entry: ash::Entry,
    instance: Option<ash::Instance>,
    surface_loader: Option<Surface>,
    surfaces: Vec<vk::SurfaceKHR>,
    debug_messenger: Option<DebugMessenger>,
}

type InstanceParts = (
    ash::Entry,
    ash::Instance,
    Option<Surface>,
    Vec<vk::SurfaceKHR>,
    Option<DebugMessenger>,
);

impl InstanceGuard {
    fn new(entry: ash::Entry, instance: ash::Instance) -> Self {
        Self {
            entry,
            instance: Some(instance),
            surface_loader: None,
            surfaces: Vec::new(),
            debug_messenger: None,
        }
    }

    fn instance(&self) -> BoilerResult<&ash::Instance> {
        self.instance
            .as_ref()
            .ok_or(BoilerError::Loading("instance was already released".to_string()))
    }

    /// `result[i]` tells whether family `i` can present to every surface
    fn present_support(&self, physical_device: vk::PhysicalDevice, family_count: usize) -> BoilerResult<Vec<bool>> {
        let Some(loader) = &self.surface_loader else {
            return Ok(vec![false; family_count]);
        };

        (0..family_count as u32)
            .map(|family| {
                self.surfaces.iter().try_fold(true, |supported, surface| -> BoilerResult<bool> {
                    let supports = unsafe {
                        loader.get_physical_device_surface_support(physical_device, family, *surface)
                    }
                    .vk_context("GetPhysicalDeviceSurfaceSupportKHR", "BoilerBuilder")?;
                    Ok(supported && supports)
                })
            })
            .collect()
    }

    fn disarm(mut self) -> BoilerResult<InstanceParts> {
        let instance = self
            .instance
            .take()
            .ok_or(BoilerError::Loading("instance was already released".to_string()))?;
        Ok((
            self.entry.clone(),
            instance,
            self.surface_loader.take(),
            std::mem::take(&mut self.surfaces),
            self.debug_messenger.take(),
        ))
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        unsafe {
            if let Some(loader) = &self.surface_loader {
                for surface in self.surfaces.drain(..) {
                    loader.destroy_surface(surface, None);
                }
            }
            if let Some(mut messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(api_version: u32) -> BoilerBuilder {
        BoilerBuilder::new(api_version, "TestApp", make_version(1, 0, 0))
    }

    #[test]
    fn test_invalid_api_version_is_reported() {
        let builder = builder(vk::make_api_version(0, 1, 2, 3));
        assert!(matches!(builder.validate(), Err(BoilerError::InvalidApiVersion(_))));
        assert!(self::builder(vk::API_VERSION_1_2).validate().is_ok());
    }

    #[test]
    fn test_duplicate_creators_are_reported() {
        let creator = |entry: &ash::Entry, info: &vk::InstanceCreateInfo| unsafe { entry.create_instance(info, None) };
        let builder = builder(vk::API_VERSION_1_2)
            .vk_instance_creator(creator)
            .vk_instance_creator(DefaultInstanceCreator);
        assert!(matches!(builder.validate(), Err(BoilerError::DuplicateCreator("instance"))));

        let builder = self::builder(vk::API_VERSION_1_2)
            .vk_device_creator(DefaultDeviceCreator)
            .vk_device_creator(DefaultDeviceCreator);
        assert!(matches!(builder.validate(), Err(BoilerError::DuplicateCreator("device"))));
    }

    #[test]
    fn test_feature_rules_need_matching_api_version() {
        let builder = builder(vk::API_VERSION_1_1).feature_picker_12(|_, enable| {
            enable.timeline_semaphore = vk::TRUE;
        });
        assert!(matches!(
            builder.validate(),
            Err(BoilerError::ApiVersionTooLow { required, actual, .. }) if required == "1.2" && actual == "1.1"
        ));

        let builder = self::builder(vk::API_VERSION_1_3)
            .required_features_13(|supported| supported.dynamic_rendering == vk::TRUE)
            .feature_picker_11(|_, _| {});
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_vulkan_11_feature_rules_need_api_12() {
        let builder = builder(vk::API_VERSION_1_1).required_features_11(|supported| supported.multiview == vk::TRUE);
        assert!(matches!(
            builder.validate(),
            Err(BoilerError::ApiVersionTooLow { feature: "Vulkan 1.1 features", required, actual })
                if required == "1.2" && actual == "1.1"
        ));

        let builder = self::builder(vk::API_VERSION_1_2).feature_picker_11(|supported, enable| {
            enable.multiview = supported.multiview;
        });
        assert!(builder.validate().is_ok());
    }

    #[test]
    fn test_xr_excludes_custom_creators() {
        let builder = builder(vk::API_VERSION_1_2)
            .vk_device_creator(DefaultDeviceCreator)
            .xr(XrBuilder::new());
        assert!(matches!(builder.validate(), Err(BoilerError::DuplicateCreator("device"))));

        let builder = self::builder(vk::API_VERSION_1_2)
            .xr(XrBuilder::new())
            .vk_instance_creator(DefaultInstanceCreator);
        assert!(matches!(builder.validate(), Err(BoilerError::DuplicateCreator("instance"))));

        assert!(self::builder(vk::API_VERSION_1_2).xr(XrBuilder::new()).validate().is_ok());
    }

    #[test]
    fn test_creation_hooks_are_kept_in_order() {
        let builder = builder(vk::API_VERSION_1_2)
            .before_instance_creation(|plan: &mut InstancePlan| -> BoilerResult<()> {
                plan.layers.insert("VK_LAYER_KHRONOS_profiles".to_string());
                Ok(())
            })
            .before_device_creation(|context: &mut DeviceCreationContext<'_>| -> BoilerResult<()> {
                context.device_extensions.insert("VK_KHR_present_id".to_string());
                Ok(())
            })
            .before_device_creation(SwapchainMaintenance);
        assert_eq!(builder.pre_instance_creators.len(), 1);
        assert_eq!(builder.pre_device_creators.len(), 2);

        let mut plan = InstancePlan::new(BTreeSet::new(), &ExtensionRequest::default(), &BTreeSet::new(), None).unwrap();
        builder.pre_instance_creators[0]
            .before_instance_creation(&mut plan)
            .unwrap();
        assert!(plan.layers.contains("VK_LAYER_KHRONOS_profiles"));
    }

    #[test]
    fn test_allocator_flags_follow_enabled_extensions() {
        let names = |list: &[&str]| list.iter().map(|name| (*name).to_string()).collect::<BTreeSet<String>>();
        let no_instance_extensions = BTreeSet::new();

        let all = names(&VMA_DEVICE_EXTENSIONS);
        let flags = allocator_flags(ApiVersion::V1_0, &names(&[PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION]), &all);
        assert_eq!(
            flags,
            vk_mem::AllocatorCreateFlags::KHR_DEDICATED_ALLOCATION
                | vk_mem::AllocatorCreateFlags::KHR_BIND_MEMORY2
                | vk_mem::AllocatorCreateFlags::EXT_MEMORY_BUDGET
        );

        // Dedicated allocations also need VK_KHR_get_memory_requirements2
        let flags = allocator_flags(
            ApiVersion::V1_0,
            &no_instance_extensions,
            &names(&["VK_KHR_dedicated_allocation", "VK_EXT_memory_budget"]),
        );
        assert!(flags.is_empty());

        // Core on 1.1, only the budget needs a flag
        let flags = allocator_flags(ApiVersion::V1_2, &no_instance_extensions, &all);
        assert_eq!(flags, vk_mem::AllocatorCreateFlags::EXT_MEMORY_BUDGET);
        assert!(allocator_flags(ApiVersion::V1_2, &no_instance_extensions, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_portability_enumeration_is_always_desired() {
        let requests = builder(vk::API_VERSION_1_2).requests(None);
        assert!(requests
            .instance_extensions
            .desired
            .contains(PORTABILITY_ENUMERATION_EXTENSION));
        assert!(requests.layers.required.is_empty());
        assert!(requests.device_extensions.required.is_empty());
    }

    #[test]
    fn test_windows_require_swapchain_and_surface_extensions() {
        let glfw_extensions = vec!["VK_KHR_surface".to_string(), "VK_KHR_xcb_surface".to_string()];
        let requests = builder(vk::API_VERSION_1_2).requests(Some(&glfw_extensions));

        assert!(requests.instance_extensions.required.contains("VK_KHR_surface"));
        assert!(requests.instance_extensions.required.contains("VK_KHR_xcb_surface"));
        assert!(requests
            .instance_extensions
            .desired
            .contains(SURFACE_CAPABILITIES_2_EXTENSION));
        assert!(requests.device_extensions.required.contains(SWAPCHAIN_EXTENSION));
        assert!(!requests
            .instance_extensions
            .desired
            .contains(PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION));
    }

    #[test]
    fn test_vulkan_10_desires_allocator_helpers() {
        let requests = builder(vk::API_VERSION_1_0).requests(None);
        assert!(requests
            .instance_extensions
            .desired
            .contains(PHYSICAL_DEVICE_PROPERTIES_2_EXTENSION));
        for extension in VMA_DEVICE_EXTENSIONS {
            assert!(requests.device_extensions.desired.contains(extension));
        }

        let requests = builder(vk::API_VERSION_1_1).requests(None);
        assert!(requests.device_extensions.desired.is_empty());
    }

    #[test]
    fn test_validation_requires_layer_and_extensions() {
        let requests = builder(vk::API_VERSION_1_2).default_validation().requests(None);
        assert!(requests.layers.required.contains(VALIDATION_LAYER));
        assert!(requests.instance_extensions.required.contains(DEBUG_UTILS_EXTENSION));
        assert!(requests
            .instance_extensions
            .required
            .contains(VALIDATION_FEATURES_EXTENSION));
    }

    #[test]
    fn test_default_validation_follows_api_version() {
        let v10 = builder(vk::API_VERSION_1_0).default_validation();
        assert_eq!(v10.validation, Some(ValidationFeatures::new(false, false, true, true, true)));

        let v13 = builder(vk::API_VERSION_1_3).default_validation();
        assert_eq!(v13.validation, Some(ValidationFeatures::new(true, true, false, true, true)));
    }

    #[test]
    fn test_api_dump_and_user_requests() {
        let requests = builder(vk::API_VERSION_1_2)
            .api_dump()
            .desired_vk_layers(["VK_LAYER_MESA_overlay"])
            .required_vk_device_extensions(["VK_KHR_synchronization2"])
            .desired_vk_device_extensions(["VK_KHR_synchronization2", "VK_EXT_mesh_shader"])
            .requests(None);

        assert!(requests.layers.required.contains(API_DUMP_LAYER));
        assert!(requests.layers.desired.contains("VK_LAYER_MESA_overlay"));
        assert!(requests.device_extensions.required.contains("VK_KHR_synchronization2"));
        // Required names are dropped from the desired set
        assert!(!requests.device_extensions.desired.contains("VK_KHR_synchronization2"));
        assert!(requests.device_extensions.desired.contains("VK_EXT_mesh_shader"));
    }

    #[test]
    fn test_forbidding_validation_errors_requires_debug_utils() {
        let requests = builder(vk::API_VERSION_1_2).forbid_validation_errors().requests(None);
        assert!(requests.instance_extensions.required.contains(DEBUG_UTILS_EXTENSION));
        assert!(requests.layers.required.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = BoilerConfig::new("Configured")
            .with_api_version(1, 3)
            .with_validation(true)
            .with_window(640, 480);
        let builder = BoilerBuilder::from_config(&config);

        assert_eq!(builder.api_version(), ApiVersion::V1_3);
        assert_eq!(builder.application_name, "Configured");
        assert_eq!(builder.window_requests(), vec![WindowRequest::new(640, 480)]);
        assert!(builder.validation.is_some());
        assert!(!builder.forbid_validation_errors);
        assert_eq!(builder.engine_name, crate::DEFAULT_ENGINE_NAME);
    }
}
