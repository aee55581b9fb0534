//! Prints the native classifier of this host and the libraries it needs

use std::process::ExitCode;
use vk_boiler::natives::{self, HostPlatform};

fn main() -> ExitCode {
    vk_boiler::foundation::logging::init();

    let host = HostPlatform::detect();
    log::debug!("Detected host {} / {}", host.os_name, host.arch);

    let classifier = match natives::host_classifier() {
        Ok(classifier) => classifier,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", classifier);
    for artifact in natives::required_artifacts(classifier) {
        println!("  {} ({})", artifact, artifact.file_name());
    }
    ExitCode::SUCCESS
}
