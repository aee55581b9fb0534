//! Creates a Vulkan instance and device, reports what was chosen and tears it down
//!
//! Usage: `hello_boiler [config.toml | config.ron]`

use glfw::{Action, Key, WindowEvent};
use thiserror::Error;
use vk_boiler::config::ConfigError;
use vk_boiler::prelude::*;

#[derive(Error, Debug)]
enum HelloError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Boiler(#[from] BoilerError),
}

fn load_config() -> Result<BoilerConfig, HelloError> {
    let config = match std::env::args().nth(1) {
        Some(path) => BoilerConfig::load_from_file(&path)?,
        None => BoilerConfig::new("Hello Boiler").with_api_version(1, 2),
    };
    config.validate()?;
    Ok(config)
}

fn run() -> Result<(), HelloError> {
    let config = load_config()?;
    vk_boiler::foundation::logging::init_with_level(&config.log_level);

    match config.natives() {
        Ok(classifier) => log::info!("Native classifier: {}", classifier),
        Err(err) => log::warn!("{}", err),
    }

    let mut boiler = BoilerBuilder::from_config(&config)
        .print_device_rejection_info()
        .build()?;

    log::info!(
        "Created Vulkan {} instance on {}",
        boiler.api_version(),
        boiler.physical_device_name()
    );
    log::info!("Instance extensions: {:?}", boiler.instance_extensions());
    log::info!("Device extensions: {:?}", boiler.device_extensions());
    if boiler.window_count() > 0 {
        log::info!("Swapchain maintenance: {}", boiler.has_swapchain_maintenance());
    }

    let families = boiler.queue_families();
    log::info!(
        "Queue families: graphics {}, compute {}, transfer {}, present {:?}",
        families.graphics.index,
        families.compute.index,
        families.transfer.index,
        families.present.as_ref().map(|family| family.index)
    );

    if boiler.window_count() > 0 {
        let window = boiler.glfw_window_mut(0)?;
        while !window.should_close() {
            window.poll_events();
            let mut close = false;
            for (_, event) in window.flush_events() {
                if let WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close = event {
                    close = true;
                }
            }
            if close {
                window.set_should_close(true);
            }
        }
    }

    boiler.check_validation_errors()?;
    boiler.destroy_initial_objects()?;
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        log::error!("{}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
