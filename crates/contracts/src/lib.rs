//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the capture pipeline:
//! the Image / Capture model, device configuration, the depth engine ABI and
//! the error taxonomy. Business crates depend on this crate only, never the
//! other way round.
//!
//! ## Time Model
//! - Device timestamps are microseconds on the sensor clock
//! - System timestamps are nanoseconds on the host clock
//! - The depth engine reports exposure centres in 90 kHz ticks

mod capture;
mod capture_source;
mod device_config;
mod engine;
mod error;
mod image;

pub use capture::*;
pub use capture_source::{CaptureCallback, CaptureSource};
pub use device_config::*;
pub use engine::*;
pub use error::*;
pub use image::*;
