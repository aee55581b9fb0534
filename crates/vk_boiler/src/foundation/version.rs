//! Vulkan version packing helpers

use ash::vk;
use std::fmt;

/// Pack an application or engine version (variant 0)
pub const fn make_version(major: u32, minor: u32, patch: u32) -> u32 {
    vk::make_api_version(0, major, minor, patch)
}

/// Unpacked Vulkan API version used for feature gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl ApiVersion {
    /// Vulkan 1.0
    pub const V1_0: Self = Self::new(1, 0);
    /// Vulkan 1.1
    pub const V1_1: Self = Self::new(1, 1);
    /// Vulkan 1.2
    pub const V1_2: Self = Self::new(1, 2);
    /// Vulkan 1.3
    pub const V1_3: Self = Self::new(1, 3);

    /// Create an API version
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Unpack a packed version, discarding variant and patch
    pub const fn from_packed(packed: u32) -> Self {
        Self::new(vk::api_version_major(packed), vk::api_version_minor(packed))
    }

    /// Pack this version with zero variant and patch
    pub const fn packed(self) -> u32 {
        vk::make_api_version(0, self.major, self.minor, 0)
    }

    /// Whether a packed version is usable as an API version
    pub const fn is_valid_packed(packed: u32) -> bool {
        vk::api_version_patch(packed) == 0 && vk::api_version_variant(packed) == 0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_matches_vulkan_constants() {
        assert_eq!(ApiVersion::V1_0.packed(), vk::API_VERSION_1_0);
        assert_eq!(ApiVersion::V1_3.packed(), vk::API_VERSION_1_3);
        assert_eq!(ApiVersion::from_packed(vk::API_VERSION_1_2), ApiVersion::V1_2);
    }

    #[test]
    fn test_patch_or_variant_is_invalid() {
        assert!(ApiVersion::is_valid_packed(vk::API_VERSION_1_1));
        assert!(!ApiVersion::is_valid_packed(vk::make_api_version(0, 1, 2, 5)));
        assert!(!ApiVersion::is_valid_packed(vk::make_api_version(1, 1, 2, 0)));
    }

    #[test]
    fn test_ordering() {
        assert!(ApiVersion::V1_0 < ApiVersion::V1_1);
        assert!(ApiVersion::new(2, 0) > ApiVersion::V1_3);
        assert_eq!(ApiVersion::V1_2.to_string(), "1.2");
    }
}
