//! Hand tracking mouse control.
//!
//! A webcam observes the operator's hand. A palm detection network finds the hand, and a hand
//! landmark network locates the fingertips and follows the hand from frame to frame. The index
//! fingertip drives the mouse pointer while fingertip pinches trigger clicks:
//!
//! * Pinch index finger and thumb: left click
//! * Pinch middle finger and thumb: right click
//! * Pinch index and middle finger: double click
//!
//! Only a region in the center of the camera image is mapped to the screen, so the whole screen can
//! be reached without moving the hand out of the camera's view.
//!
//! # Environment Variables
//!
//! * `HANDMOUSE_WEBCAM_NAME`: Selects the device to open as the [`Webcam`]. If unset, the first
//!   device that supports a compatible image format will be used.
//! * `HANDMOUSE_MODEL`: Path to the hand landmark ONNX network. Defaults to
//!   `3rdparty/onnx/hand_landmark_full.onnx`.
//! * `HANDMOUSE_PALM_MODEL`: Path to the palm detection ONNX network. Defaults to
//!   `3rdparty/onnx/palm_detection_full.onnx`.
//! * `HANDMOUSE_JPEG_BACKEND`: Configures the JPEG decoder used for Motion JPEG webcam frames.
//!   Allowed values are `mozjpeg` (the default) and `jpeg-decoder`.
//! * `RUST_LOG`: Overrides the log filter configured by [`init_logger!`].
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod cursor;
pub mod detection;
pub mod geometry;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod input;
pub mod nn;
pub mod overlay;
pub mod resolution;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and `handmouse` will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `tract` will always log at *warn* level, unless overridden by `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
