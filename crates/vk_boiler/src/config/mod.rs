//! Configuration system
//!
//! Application metadata, validation and platform settings that seed a
//! [`crate::BoilerBuilder`]. Files are TOML or RON depending on extension.

pub use serde::{Deserialize, Serialize};

use crate::natives::{self, HostPlatform, NativeClassifier, NativesError};
use crate::publish::PublishTarget;
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Size of the window to create, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Content width
    pub width: u32,
    /// Content height
    pub height: u32,
}

/// # Boilerplate Configuration
///
/// Everything needed to seed a builder without writing code: application
/// metadata, the targeted API version, validation, the native classifier
/// override, and an optional window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoilerConfig {
    /// Application name for Vulkan instance creation (also the window title)
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Targeted Vulkan API version (major, minor)
    pub api_version: (u32, u32),
    /// Engine name reported to the driver
    pub engine_name: String,
    /// Engine version (major, minor, patch)
    pub engine_version: (u32, u32, u32),
    /// Whether to enable validation layers; `None` follows the build type
    pub validation: Option<bool>,
    /// Whether validation errors should be collected and reported as failures
    pub forbid_validation_errors: bool,
    /// Explicit native classifier, overriding host detection
    pub natives: Option<NativeClassifier>,
    /// Log filter used when the environment does not set one
    pub log_level: String,
    /// Window to create, if any
    pub window: Option<WindowConfig>,
    /// Artifact repository for publishing
    pub publish: Option<PublishTarget>,
}

impl Default for BoilerConfig {
    fn default() -> Self {
        Self {
            application_name: "VkBoiler Application".to_string(),
            application_version: (1, 0, 0),
            api_version: (1, 0),
            engine_name: crate::DEFAULT_ENGINE_NAME.to_string(),
            engine_version: (0, 1, 0),
            validation: None,
            forbid_validation_errors: false,
            natives: None,
            log_level: "info".to_string(),
            window: None,
            publish: None,
        }
    }
}

impl Config for BoilerConfig {}

impl BoilerConfig {
    /// Create a configuration for the named application
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Set the targeted API version
    pub fn with_api_version(mut self, major: u32, minor: u32) -> Self {
        self.api_version = (major, minor);
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = Some(enabled);
        self
    }

    /// Request a window of the given size
    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window = Some(WindowConfig { width, height });
        self
    }

    /// Whether validation should be enabled, resolving `None` by build type
    pub fn validation_enabled(&self) -> bool {
        match self.validation {
            Some(enabled) => enabled,
            None => cfg!(debug_assertions),
        }
    }

    /// Resolve the native classifier: explicit value, then environment, then host
    pub fn natives(&self) -> Result<NativeClassifier, NativesError> {
        if let Some(classifier) = self.natives {
            return Ok(classifier);
        }
        natives::host_classifier()
    }

    /// Resolve the native classifier against a given host, ignoring the environment
    pub fn natives_for(&self, host: &HostPlatform) -> Result<NativeClassifier, NativesError> {
        match self.natives {
            Some(classifier) => Ok(classifier),
            None => host.resolve(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.api_version.0 != 1 || self.api_version.1 > 3 {
            return Err(ConfigError::Invalid(format!(
                "Unsupported Vulkan API version {}.{}",
                self.api_version.0, self.api_version.1
            )));
        }

        if let Some(window) = self.window {
            if window.width == 0 || window.height == 0 {
                return Err(ConfigError::Invalid("Window size must be non-zero".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BoilerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(BoilerConfig::new("").validate().is_err());
        assert!(BoilerConfig::new("App").with_api_version(1, 4).validate().is_err());
        assert!(BoilerConfig::new("App").with_api_version(2, 0).validate().is_err());
        assert!(BoilerConfig::new("App").with_window(0, 600).validate().is_err());
        assert!(BoilerConfig::new("App").with_window(800, 600).validate().is_ok());
    }

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let config: BoilerConfig = toml::from_str(
            r#"
                application_name = "HelloTriangle"
                api_version = [1, 3]
                natives = "natives-linux-arm64"

                [window]
                width = 1280
                height = 720
            "#,
        )
        .unwrap();

        assert_eq!(config.application_name, "HelloTriangle");
        assert_eq!(config.api_version, (1, 3));
        assert_eq!(config.natives, Some(NativeClassifier::LinuxArm64));
        assert_eq!(config.window, Some(WindowConfig { width: 1280, height: 720 }));
        assert_eq!(config.engine_name, crate::DEFAULT_ENGINE_NAME);
    }

    #[test]
    fn test_invalid_classifier_is_a_parse_error() {
        let result: Result<BoilerConfig, _> = toml::from_str(r#"natives = "natives-plan9""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_natives_skip_detection() {
        let config = BoilerConfig {
            natives: Some(NativeClassifier::WindowsArm64),
            ..BoilerConfig::default()
        };
        let host = HostPlatform::new("Plan9", "amd64");
        assert_eq!(config.natives_for(&host).unwrap(), NativeClassifier::WindowsArm64);
        assert!(BoilerConfig::default().natives_for(&host).is_err());
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = std::env::temp_dir().join(format!("vk_boiler_config_{}.ron", std::process::id()));
        let config = BoilerConfig::new("RonApp").with_validation(true).with_window(640, 480);

        config.save_to_file(&path).unwrap();
        let loaded = BoilerConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let path = std::env::temp_dir().join(format!("vk_boiler_config_{}.yaml", std::process::id()));
        std::fs::write(&path, "application_name: YamlApp\n").unwrap();
        let result = BoilerConfig::load_from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));

        let result = BoilerConfig::default().save_to_file(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("vk_boiler_missing_{}.toml", std::process::id()));
        let result = BoilerConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
