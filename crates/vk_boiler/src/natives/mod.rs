//! Native platform classifier resolution
//!
//! Maps a host operating-system name and CPU architecture to the classifier
//! of the prebuilt native libraries (GLFW, VMA, OpenXR, the Vulkan loader)
//! that should be linked on that host.
//!
//! The inputs are free text, spelled the way a JVM reports `os.name` and
//! `os.arch`, so the rules are prefix matches rather than exact lookups.

pub mod libraries;

pub use libraries::{required_artifacts, required_libraries, NativeArtifact, NativeLibrary};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable that overrides classifier detection
pub const NATIVES_ENV_VAR: &str = "BOILER_NATIVES";

const UNIX_LIKE_PREFIXES: [&str; 3] = ["Linux", "SunOS", "Unit"];
const MACOS_PREFIXES: [&str; 2] = ["Mac OS X", "Darwin"];
const WINDOWS_PREFIXES: [&str; 1] = ["Windows"];

/// Native classifier errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativesError {
    /// The (OS, architecture) pair matches none of the known platforms
    #[error(
        "Unrecognized or unsupported platform (os: {os_name:?}, arch: {arch:?}). \
         Please set \"{}\" manually",
        NATIVES_ENV_VAR
    )]
    UnsupportedPlatform {
        /// Host operating-system name
        os_name: String,
        /// Host CPU architecture
        arch: String,
    },

    /// An explicit classifier names no known variant
    #[error("Unknown native classifier: {0:?}")]
    InvalidClassifier(String),
}

/// Prebuilt native-library variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeClassifier {
    /// Linux on x86_64 and anything not otherwise matched
    Linux,
    /// Linux on 64-bit ARM
    LinuxArm64,
    /// Linux on 32-bit ARM
    LinuxArm32,
    /// Linux on little-endian POWER
    LinuxPpc64le,
    /// Linux on RISC-V
    LinuxRiscv64,
    /// macOS on Intel
    Macos,
    /// macOS on Apple silicon
    MacosArm64,
    /// Windows on x86_64
    Windows,
    /// Windows on 32-bit x86
    WindowsX86,
    /// Windows on 64-bit ARM
    WindowsArm64,
}

impl NativeClassifier {
    /// Every classifier, in declaration order
    pub const ALL: [Self; 10] = [
        Self::Linux,
        Self::LinuxArm64,
        Self::LinuxArm32,
        Self::LinuxPpc64le,
        Self::LinuxRiscv64,
        Self::Macos,
        Self::MacosArm64,
        Self::Windows,
        Self::WindowsX86,
        Self::WindowsArm64,
    ];

    /// Classifier string, e.g. `natives-linux-arm64`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "natives-linux",
            Self::LinuxArm64 => "natives-linux-arm64",
            Self::LinuxArm32 => "natives-linux-arm32",
            Self::LinuxPpc64le => "natives-linux-ppc64le",
            Self::LinuxRiscv64 => "natives-linux-riscv64",
            Self::Macos => "natives-macos",
            Self::MacosArm64 => "natives-macos-arm64",
            Self::Windows => "natives-windows",
            Self::WindowsX86 => "natives-windows-x86",
            Self::WindowsArm64 => "natives-windows-arm64",
        }
    }

    /// Whether this is one of the linux variants
    pub const fn is_linux(self) -> bool {
        matches!(
            self,
            Self::Linux | Self::LinuxArm64 | Self::LinuxArm32 | Self::LinuxPpc64le | Self::LinuxRiscv64
        )
    }

    /// Whether this is one of the macOS variants
    pub const fn is_macos(self) -> bool {
        matches!(self, Self::Macos | Self::MacosArm64)
    }

    /// Whether this is one of the Windows variants
    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows | Self::WindowsX86 | Self::WindowsArm64)
    }
}

impl fmt::Display for NativeClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NativeClassifier {
    type Err = NativesError;

    /// Accepts both `natives-macos-arm64` and `macos-arm64`
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let full = if trimmed.starts_with("natives-") {
            trimmed.to_string()
        } else {
            format!("natives-{trimmed}")
        };

        Self::ALL
            .into_iter()
            .find(|classifier| classifier.as_str() == full)
            .ok_or_else(|| NativesError::InvalidClassifier(value.to_string()))
    }
}

impl Serialize for NativeClassifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NativeClassifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Resolve the classifier for an (OS name, architecture) pair.
///
/// The first matching rule wins; an OS that is neither unix-like, macOS nor
/// Windows is rejected whatever the architecture.
pub fn resolve(os_name: &str, arch: &str) -> Result<NativeClassifier, NativesError> {
    let starts_with_any = |value: &str, prefixes: &[&str]| prefixes.iter().any(|p| value.starts_with(p));

    if starts_with_any(os_name, &UNIX_LIKE_PREFIXES) {
        let classifier = if starts_with_any(arch, &["arm", "aarch64"]) {
            if arch.contains("64") || arch.starts_with("armv8") {
                NativeClassifier::LinuxArm64
            } else {
                NativeClassifier::LinuxArm32
            }
        } else if arch.starts_with("ppc") {
            NativeClassifier::LinuxPpc64le
        } else if arch.starts_with("riscv") {
            NativeClassifier::LinuxRiscv64
        } else {
            NativeClassifier::Linux
        };
        return Ok(classifier);
    }

    if starts_with_any(os_name, &MACOS_PREFIXES) {
        return Ok(if arch.starts_with("aarch64") {
            NativeClassifier::MacosArm64
        } else {
            NativeClassifier::Macos
        });
    }

    if starts_with_any(os_name, &WINDOWS_PREFIXES) {
        return Ok(if !arch.contains("64") {
            NativeClassifier::WindowsX86
        } else if arch.starts_with("aarch64") {
            NativeClassifier::WindowsArm64
        } else {
            NativeClassifier::Windows
        });
    }

    Err(NativesError::UnsupportedPlatform {
        os_name: os_name.to_string(),
        arch: arch.to_string(),
    })
}

/// Host operating-system name and architecture as free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// Operating-system name, e.g. `Linux` or `Windows 10`
    pub os_name: String,
    /// CPU architecture, e.g. `amd64` or `aarch64`
    pub arch: String,
}

impl HostPlatform {
    /// Create a platform description from explicit names
    pub fn new(os_name: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os_name: os_name.into(),
            arch: arch.into(),
        }
    }

    /// Describe the platform this crate was compiled for
    pub fn detect() -> Self {
        Self::from_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translate Rust target names into the spelling the classifier rules expect
    pub fn from_target(os: &str, arch: &str) -> Self {
        let os_name = match os {
            "linux" | "android" => "Linux",
            "macos" | "ios" => "Mac OS X",
            "windows" => "Windows 10",
            "solaris" | "illumos" => "SunOS",
            "freebsd" => "FreeBSD",
            "openbsd" => "OpenBSD",
            "netbsd" => "NetBSD",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "x86" => "x86",
            "aarch64" => "aarch64",
            "arm" => "arm",
            "powerpc64" => "ppc64le",
            "powerpc" => "ppc",
            "riscv64" => "riscv64",
            other => other,
        };
        Self::new(os_name, arch)
    }

    /// Resolve the classifier for this platform
    pub fn resolve(&self) -> Result<NativeClassifier, NativesError> {
        resolve(&self.os_name, &self.arch)
    }
}

/// Resolve a classifier, letting an explicit value win over detection.
///
/// The override usually comes from configuration or [`NATIVES_ENV_VAR`]; blank
/// overrides are ignored.
pub fn resolve_with_override(
    explicit: Option<&str>,
    host: &HostPlatform,
) -> Result<NativeClassifier, NativesError> {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => {
            let classifier = value.parse()?;
            log::debug!("Using explicit native classifier {}", classifier);
            Ok(classifier)
        }
        None => {
            let classifier = host.resolve()?;
            log::debug!(
                "Resolved native classifier {} for {} / {}",
                classifier,
                host.os_name,
                host.arch
            );
            Ok(classifier)
        }
    }
}

/// Resolve the classifier for this host, honouring [`NATIVES_ENV_VAR`]
pub fn host_classifier() -> Result<NativeClassifier, NativesError> {
    host_classifier_from(|key| std::env::var(key).ok())
}

/// Like [`host_classifier`], reading the override through `lookup`
pub fn host_classifier_from<F>(lookup: F) -> Result<NativeClassifier, NativesError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = lookup(NATIVES_ENV_VAR);
    resolve_with_override(explicit.as_deref(), &HostPlatform::detect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_like_arm_variants() {
        assert_eq!(resolve("Linux", "arm").unwrap(), NativeClassifier::LinuxArm32);
        assert_eq!(resolve("Linux", "armv7l").unwrap(), NativeClassifier::LinuxArm32);
        assert_eq!(resolve("Linux", "armv8l").unwrap(), NativeClassifier::LinuxArm64);
        assert_eq!(resolve("Linux", "arm64").unwrap(), NativeClassifier::LinuxArm64);
        assert_eq!(resolve("SunOS", "aarch64").unwrap(), NativeClassifier::LinuxArm64);
    }

    #[test]
    fn test_unix_like_other_architectures() {
        assert_eq!(resolve("Linux", "ppc64le").unwrap(), NativeClassifier::LinuxPpc64le);
        assert_eq!(resolve("Linux", "riscv64").unwrap(), NativeClassifier::LinuxRiscv64);
        assert_eq!(resolve("Linux", "amd64").unwrap(), NativeClassifier::Linux);
        // Anything unmatched on a unix-like OS falls back to the generic build
        assert_eq!(resolve("Unit", "s390x").unwrap(), NativeClassifier::Linux);
    }

    #[test]
    fn test_darwin_counts_as_macos() {
        assert_eq!(resolve("Darwin", "aarch64").unwrap(), NativeClassifier::MacosArm64);
        assert_eq!(resolve("Darwin", "x86_64").unwrap(), NativeClassifier::Macos);
    }

    #[test]
    fn test_windows_without_64_is_x86() {
        assert_eq!(resolve("Windows 11", "i386").unwrap(), NativeClassifier::WindowsX86);
        assert_eq!(resolve("Windows Server 2022", "x86_64").unwrap(), NativeClassifier::Windows);
    }

    #[test]
    fn test_prefix_match_is_case_sensitive() {
        assert!(resolve("linux", "amd64").is_err());
    }

    #[test]
    fn test_unsupported_message_mentions_override() {
        let err = resolve("Plan9", "amd64").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Unrecognized or unsupported platform"));
        assert!(message.contains(NATIVES_ENV_VAR));
    }

    #[test]
    fn test_classifier_string_round_trip() {
        for classifier in NativeClassifier::ALL {
            assert_eq!(classifier.as_str().parse::<NativeClassifier>().unwrap(), classifier);
        }
        assert_eq!("macos-arm64".parse::<NativeClassifier>().unwrap(), NativeClassifier::MacosArm64);
        assert!(matches!(
            "natives-beos".parse::<NativeClassifier>(),
            Err(NativesError::InvalidClassifier(_))
        ));
    }

    #[test]
    fn test_family_helpers_partition_classifiers() {
        for classifier in NativeClassifier::ALL {
            let families = [classifier.is_linux(), classifier.is_macos(), classifier.is_windows()];
            assert_eq!(families.iter().filter(|f| **f).count(), 1, "{classifier}");
        }
    }

    #[test]
    fn test_from_target_spelling() {
        let host = HostPlatform::from_target("windows", "x86_64");
        assert_eq!(host.resolve().unwrap(), NativeClassifier::Windows);

        let host = HostPlatform::from_target("macos", "aarch64");
        assert_eq!(host.resolve().unwrap(), NativeClassifier::MacosArm64);

        let host = HostPlatform::from_target("linux", "powerpc64");
        assert_eq!(host.resolve().unwrap(), NativeClassifier::LinuxPpc64le);

        let host = HostPlatform::from_target("linux", "powerpc");
        assert_eq!(host.arch, "ppc");
        assert_eq!(host.resolve().unwrap(), NativeClassifier::LinuxPpc64le);

        let host = HostPlatform::from_target("freebsd", "x86_64");
        assert!(host.resolve().is_err());
    }

    #[test]
    fn test_host_classifier_reads_override_variable() {
        let classifier = host_classifier_from(|key| {
            (key == NATIVES_ENV_VAR).then(|| "natives-macos-arm64".to_string())
        })
        .unwrap();
        assert_eq!(classifier, NativeClassifier::MacosArm64);

        let err = host_classifier_from(|_| Some("natives-amiga".to_string())).unwrap_err();
        assert_eq!(err, NativesError::InvalidClassifier("natives-amiga".to_string()));

        // Blank values fall through to detection
        assert_eq!(
            host_classifier_from(|_| Some(" ".to_string())),
            HostPlatform::detect().resolve()
        );
    }

    #[test]
    fn test_override_wins_over_detection() {
        let host = HostPlatform::new("Plan9", "amd64");
        assert_eq!(
            resolve_with_override(Some("natives-linux-riscv64"), &host).unwrap(),
            NativeClassifier::LinuxRiscv64
        );
        assert!(resolve_with_override(Some("   "), &host).is_err());
        assert_eq!(
            resolve_with_override(Some("nonsense"), &host).unwrap_err(),
            NativesError::InvalidClassifier("nonsense".to_string())
        );
    }
}
