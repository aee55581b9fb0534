//! Lets the OpenXR runtime create the Vulkan objects, then runs an empty
//! session until the runtime ends it
//!
//! Usage: `hello_xr [seconds]`

use openxr as xr;
use std::time::{Duration, Instant};
use thiserror::Error;
use vk_boiler::prelude::*;

#[derive(Error, Debug)]
enum HelloXrError {
    #[error(transparent)]
    Boiler(#[from] BoilerError),

    #[error("OpenXR call failed: {0:?}")]
    Xr(xr::sys::Result),

    #[error("The builder did not set up OpenXR")]
    NoXr,
}

impl From<xr::sys::Result> for HelloXrError {
    fn from(result: xr::sys::Result) -> Self {
        Self::Xr(result)
    }
}

fn run() -> Result<(), HelloXrError> {
    vk_boiler::foundation::logging::init();
    let seconds = std::env::args()
        .nth(1)
        .and_then(|value| value.parse().ok())
        .unwrap_or(10);

    let boiler = BoilerBuilder::new(ApiVersion::V1_1.packed(), "Hello XR", make_version(1, 0, 0))
        .default_validation()
        .xr(XrBuilder::new())
        .print_device_rejection_info()
        .build()?;
    log::info!("OpenXR chose {}", boiler.physical_device_name());

    let xr_boiler = boiler.xr().ok_or(HelloXrError::NoXr)?;
    let (session, mut frame_waiter, mut frame_stream) = xr_boiler.create_session(&boiler)?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut events = xr::EventDataBuffer::new();
    let mut running = false;
    let mut exit_requested = false;

    'main: loop {
        while let Some(event) = xr_boiler.instance().poll_event(&mut events)? {
            match event {
                xr::Event::SessionStateChanged(change) => {
                    log::info!("Session state: {:?}", change.state());
                    match change.state() {
                        xr::SessionState::READY => {
                            session.begin(xr::ViewConfigurationType::PRIMARY_STEREO)?;
                            running = true;
                        }
                        xr::SessionState::STOPPING => {
                            session.end()?;
                            running = false;
                        }
                        xr::SessionState::EXITING | xr::SessionState::LOSS_PENDING => break 'main,
                        _ => {}
                    }
                }
                xr::Event::InstanceLossPending(_) => break 'main,
                _ => {}
            }
        }

        if Instant::now() >= deadline {
            if !running {
                break;
            }
            if !exit_requested {
                session.request_exit()?;
                exit_requested = true;
            }
        }

        if !running {
            std::thread::sleep(Duration::from_millis(100));
            continue;
        }

        // Submit empty frames so the runtime keeps the session going
        let state = frame_waiter.wait()?;
        frame_stream.begin()?;
        frame_stream.end(state.predicted_display_time, xr::EnvironmentBlendMode::OPAQUE, &[])?;
    }

    drop((session, frame_waiter, frame_stream));
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
