//! Debug messenger that routes validation messages to the `log` facade

use crate::error::{BoilerResult, VkResultExt};
use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{c_void, CStr};
use std::sync::Mutex;

/// Validation errors collected while they are forbidden
pub(crate) type ValidationSink = Mutex<Vec<String>>;

/// Owns the debug utils messenger and, optionally, the sink it reports into
pub(crate) struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
    // Boxed so the address handed to Vulkan stays stable
    sink: Option<Box<ValidationSink>>,
}

impl DebugMessenger {
    /// Create a messenger; with `collect_errors`, validation errors are kept for later inspection
    pub(crate) fn new(entry: &ash::Entry, instance: &ash::Instance, collect_errors: bool) -> BoilerResult<Self> {
        let loader = DebugUtils::new(entry, instance);
        let sink = collect_errors.then(|| Box::new(Mutex::new(Vec::new())));
        let user_data = sink
            .as_deref()
            .map_or(std::ptr::null_mut(), |sink| sink as *const ValidationSink as *mut c_void);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .user_data(user_data);

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .vk_context("CreateDebugUtilsMessengerEXT", "DebugMessenger")?;

        Ok(Self {
            loader,
            messenger,
            sink,
        })
    }

    /// Drain the collected validation errors
    pub(crate) fn take_errors(&self) -> Vec<String> {
        self.sink
            .as_ref()
            .and_then(|sink| sink.lock().ok().map(|mut errors| std::mem::take(&mut *errors)))
            .unwrap_or_default()
    }

    /// Whether validation errors are being collected
    pub(crate) fn collects_errors(&self) -> bool {
        self.sink.is_some()
    }

    /// Destroy the messenger. Must run before the instance is destroyed.
    pub(crate) unsafe fn destroy(&mut self) {
        if self.messenger != vk::DebugUtilsMessengerEXT::null() {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
            self.messenger = vk::DebugUtilsMessengerEXT::null();
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::info!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    let is_validation_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR)
        && message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION);
    if is_validation_error && !user_data.is_null() {
        let sink = &*(user_data as *const ValidationSink);
        if let Ok(mut errors) = sink.lock() {
            errors.push(message.into_owned());
        }
    }

    vk::FALSE
}
