//! Classifier resolution for the platforms the native libraries ship for

use vk_boiler::natives::{self, HostPlatform, NativeClassifier, NativeLibrary, NativesError};

#[test]
fn test_unix_like_aarch64_is_linux_arm64() {
    for os_name in ["Linux", "SunOS", "Unit"] {
        assert_eq!(
            natives::resolve(os_name, "aarch64").unwrap(),
            NativeClassifier::LinuxArm64,
            "{}",
            os_name
        );
    }
}

#[test]
fn test_linux_x86_64_is_plain_linux() {
    assert_eq!(natives::resolve("Linux", "x86_64").unwrap(), NativeClassifier::Linux);
    assert_eq!(NativeClassifier::Linux.as_str(), "natives-linux");
}

#[test]
fn test_macos() {
    assert_eq!(natives::resolve("Mac OS X", "aarch64").unwrap(), NativeClassifier::MacosArm64);
    assert_eq!(natives::resolve("Mac OS X", "x86_64").unwrap(), NativeClassifier::Macos);
}

#[test]
fn test_windows() {
    assert_eq!(natives::resolve("Windows 10", "amd64").unwrap(), NativeClassifier::Windows);
    assert_eq!(natives::resolve("Windows 10", "x86").unwrap(), NativeClassifier::WindowsX86);
    assert_eq!(
        natives::resolve("Windows 10", "aarch64").unwrap(),
        NativeClassifier::WindowsArm64
    );
}

#[test]
fn test_unknown_os_fails_for_any_arch() {
    for arch in ["amd64", "x86", "aarch64", "riscv64", ""] {
        let err = natives::resolve("Plan9", arch).unwrap_err();
        assert!(matches!(err, NativesError::UnsupportedPlatform { ref os_name, .. } if os_name == "Plan9"));
        assert!(err.to_string().contains("Unrecognized or unsupported platform"));
        assert!(err.to_string().contains(natives::NATIVES_ENV_VAR));
    }
}

#[test]
fn test_resolution_is_pure() {
    let platforms = [
        ("Linux", "amd64"),
        ("Linux", "arm"),
        ("Mac OS X", "aarch64"),
        ("Windows 11", "x86"),
        ("FreeBSD", "amd64"),
    ];
    for (os_name, arch) in platforms {
        assert_eq!(natives::resolve(os_name, arch), natives::resolve(os_name, arch));
    }
}

#[test]
fn test_override_wins_over_host() {
    let plan9 = HostPlatform::new("Plan9", "amd64");
    let classifier = natives::resolve_with_override(Some("natives-macos-arm64"), &plan9).unwrap();
    assert_eq!(classifier, NativeClassifier::MacosArm64);
    assert!(natives::resolve_with_override(Some("  "), &plan9).is_err());
}

#[test]
fn test_artifacts_for_resolved_classifier() {
    let classifier = HostPlatform::new("Mac OS X", "aarch64").resolve().unwrap();
    let libraries = natives::required_libraries(classifier);
    assert!(libraries.contains(&NativeLibrary::Vulkan));
    assert!(!libraries.contains(&NativeLibrary::OpenXr));

    let artifacts = natives::required_artifacts(classifier);
    assert_eq!(artifacts.len(), libraries.len());
}
