//! Native libraries selected by a classifier

use super::NativeClassifier;
use std::fmt;

/// Precompiled native library shipped per platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeLibrary {
    /// Shared runtime support library
    Core,
    /// GLFW windowing
    Glfw,
    /// Vulkan Memory Allocator
    Vma,
    /// OpenXR loader
    OpenXr,
    /// Bundled Vulkan loader, only shipped where the system has none
    Vulkan,
}

impl NativeLibrary {
    /// Short artifact name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Glfw => "glfw",
            Self::Vma => "vma",
            Self::OpenXr => "openxr",
            Self::Vulkan => "vulkan",
        }
    }

    const fn stem(self) -> &'static str {
        match self {
            Self::Core => "boiler",
            Self::Glfw => "glfw",
            Self::Vma => "vma",
            Self::OpenXr => "openxr_loader",
            Self::Vulkan => "vulkan",
        }
    }

    /// File name of this library on the given platform
    pub fn file_name(self, classifier: NativeClassifier) -> String {
        if classifier.is_windows() {
            // The Windows loader is conventionally called vulkan-1.dll
            match self {
                Self::Vulkan => "vulkan-1.dll".to_string(),
                _ => format!("{}.dll", self.stem()),
            }
        } else if classifier.is_macos() {
            format!("lib{}.dylib", self.stem())
        } else {
            format!("lib{}.so", self.stem())
        }
    }
}

impl fmt::Display for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A native library paired with the platform variant to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeArtifact {
    /// Which library
    pub library: NativeLibrary,
    /// Which platform variant
    pub classifier: NativeClassifier,
}

impl NativeArtifact {
    /// File name of the library inside the artifact
    pub fn file_name(&self) -> String {
        self.library.file_name(self.classifier)
    }
}

impl fmt::Display for NativeArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.library, self.classifier)
    }
}

/// Native libraries an application needs on the given platform.
///
/// There is no OpenXR runtime for macOS, and macOS is the only platform
/// without a system Vulkan loader.
pub fn required_libraries(classifier: NativeClassifier) -> Vec<NativeLibrary> {
    let mut libraries = vec![NativeLibrary::Core, NativeLibrary::Glfw, NativeLibrary::Vma];
    if classifier.is_macos() {
        libraries.push(NativeLibrary::Vulkan);
    } else {
        libraries.push(NativeLibrary::OpenXr);
    }
    libraries
}

/// [`required_libraries`] paired with the classifier
pub fn required_artifacts(classifier: NativeClassifier) -> Vec<NativeArtifact> {
    required_libraries(classifier)
        .into_iter()
        .map(|library| NativeArtifact { library, classifier })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macos_bundles_vulkan_but_not_openxr() {
        for classifier in [NativeClassifier::Macos, NativeClassifier::MacosArm64] {
            let libraries = required_libraries(classifier);
            assert!(libraries.contains(&NativeLibrary::Vulkan));
            assert!(!libraries.contains(&NativeLibrary::OpenXr));
        }
    }

    #[test]
    fn test_other_platforms_use_system_vulkan() {
        for classifier in NativeClassifier::ALL.into_iter().filter(|c| !c.is_macos()) {
            let libraries = required_libraries(classifier);
            assert_eq!(
                libraries,
                vec![NativeLibrary::Core, NativeLibrary::Glfw, NativeLibrary::Vma, NativeLibrary::OpenXr]
            );
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(NativeLibrary::Glfw.file_name(NativeClassifier::LinuxArm64), "libglfw.so");
        assert_eq!(NativeLibrary::Glfw.file_name(NativeClassifier::Macos), "libglfw.dylib");
        assert_eq!(NativeLibrary::Glfw.file_name(NativeClassifier::WindowsX86), "glfw.dll");
        assert_eq!(NativeLibrary::Vulkan.file_name(NativeClassifier::Windows), "vulkan-1.dll");
        assert_eq!(NativeLibrary::OpenXr.file_name(NativeClassifier::Linux), "libopenxr_loader.so");
    }

    #[test]
    fn test_artifact_display() {
        let artifacts = required_artifacts(NativeClassifier::Linux);
        assert_eq!(artifacts[1].to_string(), "glfw::natives-linux");
        assert_eq!(artifacts[1].file_name(), "libglfw.so");
    }
}
